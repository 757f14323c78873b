use swarm_service_config::{Network, PortProtocol};
use tracing::debug;

use super::*;

/// How an existing value must look for a lookup to match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ValueMatch<'a> {
	/// Any value, including none.
	#[default]
	Any,
	/// Exactly this value. `None` only matches entries without a value.
	Exactly(Option<&'a str>),
}

impl ValueMatch<'_> {
	fn matches(self, value: Option<&str>) -> bool {
		match self {
			Self::Any => true,
			Self::Exactly(expected) => expected == value,
		}
	}
}

/// Selects a published port by the fields it must have. Absent fields match anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PortMatch {
	pub target_port: Option<u16>,
	pub protocol: Option<PortProtocol>,
	pub published_port: Option<u16>,
}

impl PortMatch {
	pub const fn target(port: u16) -> Self {
		Self {
			target_port: Some(port),
			protocol: None,
			published_port: None,
		}
	}

	#[must_use]
	pub const fn with_protocol(mut self, protocol: PortProtocol) -> Self {
		self.protocol = Some(protocol);
		self
	}

	pub fn matches(&self, port: &PortConfig) -> bool {
		self.target_port
			.is_none_or(|target| port.target_port == Some(target))
			&& self
				.protocol
				.is_none_or(|protocol| port.effective_protocol() == protocol)
			&& self
				.published_port
				.is_none_or(|published| port.published_port == Some(published))
	}

	fn new_port(&self, published: u16) -> PortConfig {
		PortConfig {
			protocol: self.protocol,
			target_port: self.target_port,
			published_port: Some(published),
			..Default::default()
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MountMode {
	#[default]
	ReadWrite,
	ReadOnly,
}

impl MountMode {
	const fn is_read_only(self) -> bool {
		matches!(self, Self::ReadOnly)
	}
}

// Every operation compares against the current value and only writes on an actual change.
// Dirtiness is always computed against the live snapshot, so reverting an edit cleans it up.
impl ServiceState {
	pub fn has_arg(&self, flag: &str, value: ValueMatch<'_>) -> bool {
		self.current
			.args
			.get(flag)
			.is_some_and(|v| value.matches(v))
	}

	/// Sets a flag, with or without a value.
	pub fn ensure_arg(&mut self, flag: &str, value: Option<&str>) {
		if self.current.args.set(flag, value) {
			debug!(service = %self.name, flag, ?value, "arg set");
		}
	}

	/// Replaces the whole argument list, if it differs in content or order.
	pub fn ensure_args<S: AsRef<str>>(&mut self, args: &[S]) -> AppResult {
		let args = ArgList::parse(args).map_err(|detail| AppError::malformed(&self.name, detail))?;

		if self.current.args != args {
			debug!(service = %self.name, args = ?args.emit(), "args replaced");
			self.current.args = args;
		}

		Ok(())
	}

	pub fn remove_arg(&mut self, flag: &str) {
		if self.current.args.remove(flag) {
			debug!(service = %self.name, flag, "arg removed");
		}
	}

	/// Removes `prefix` and every flag nested under it.
	pub fn remove_args_by_prefix(&mut self, prefix: &str) {
		for flag in self.current.args.flags_under(prefix) {
			self.remove_arg(&flag);
		}
	}

	pub fn has_label(&self, name: &str, value: ValueMatch<'_>) -> bool {
		self.current
			.labels
			.get(name)
			.map(String::as_str)
			.is_some_and(|v| value.matches(Some(v)))
	}

	/// Sets a label. A `None` value removes it.
	pub fn ensure_label(&mut self, name: &str, value: Option<&str>) {
		if ensure_map_entry(&mut self.current.labels, name, value) {
			debug!(service = %self.name, label = name, ?value, "label set");
		}
	}

	pub fn remove_label(&mut self, name: &str) {
		self.ensure_label(name, None);
	}

	/// Removes `prefix` and every label nested under it.
	pub fn remove_labels_by_prefix(&mut self, prefix: &str) {
		let names: Vec<String> = self
			.current
			.labels
			.keys()
			.filter(|name| is_under_prefix(name, prefix))
			.cloned()
			.collect();

		for name in names {
			self.remove_label(&name);
		}
	}

	/// Sets a label on the spawned containers. A `None` value removes it.
	pub fn ensure_container_label(&mut self, name: &str, value: Option<&str>) {
		if ensure_map_entry(&mut self.current.container_labels, name, value) {
			debug!(service = %self.name, label = name, ?value, "container label set");
		}
	}

	pub fn ensure_env(&mut self, name: &str, value: &str) {
		let value = Some(value.to_string());

		if self.current.env.get(name) != Some(&value) {
			debug!(service = %self.name, name, "env set");
			self.current.env.insert(name.to_string(), value);
		}
	}

	pub fn remove_env(&mut self, name: &str) {
		if self.current.env.shift_remove(name).is_some() {
			debug!(service = %self.name, name, "env removed");
		}
	}

	pub fn ensure_constraint(&mut self, constraint: &str) {
		if self.current.constraints.insert(constraint.to_string()) {
			debug!(service = %self.name, constraint, "constraint added");
		}
	}

	/// Attaches the service to a network, identified by its id.
	pub fn ensure_network(&mut self, network: &Network) {
		if !self.current.networks.contains_key(&network.id) {
			debug!(service = %self.name, network = %network.name, "network attached");
			self.current.networks.insert(
				network.id.clone(),
				NetworkAttachmentConfig::new(network.id.clone()),
			);
		}
	}

	/// Moves the attachments to the network identified as `from` over to `network`, keeping
	/// their position.
	pub fn retarget_network(&mut self, from: &str, network: &Network) {
		if !self.current.networks.contains_key(from) {
			return;
		}

		debug!(service = %self.name, network = %network.name, id = %network.id, "network retargeted");

		self.current.networks = std::mem::take(&mut self.current.networks)
			.into_iter()
			.map(|(id, mut attachment)| {
				if id == from {
					attachment.target = network.id.clone();
					(network.id.clone(), attachment)
				} else {
					(id, attachment)
				}
			})
			.collect();
	}

	/// Points the first port matching `selector` to `published`, or publishes a new port.
	pub fn ensure_port(&mut self, published: u16, selector: PortMatch) {
		match self
			.current
			.ports
			.iter_mut()
			.find(|p| selector.matches(p))
		{
			Some(port) if port.published_port == Some(published) => {}
			Some(port) => {
				debug!(service = %self.name, published, ?selector, "port re-published");
				port.published_port = Some(published);
			}
			None => {
				debug!(service = %self.name, published, ?selector, "port published");
				self.current.ports.push(selector.new_port(published));
			}
		}
	}

	/// Removes every published port matching `selector`.
	pub fn remove_port(&mut self, selector: PortMatch) {
		let before = self.current.ports.len();

		self.current.ports.retain(|p| !selector.matches(p));

		if self.current.ports.len() != before {
			debug!(service = %self.name, ?selector, "port removed");
		}
	}

	/// Bind-mounts `source` at `target`, replacing any different mount at the same target.
	pub fn ensure_mount(&mut self, target: &str, source: &str, mode: MountMode) {
		let up_to_date = self.current.mounts.get(target).is_some_and(|m| {
			m.source.as_deref() == Some(source) && m.is_read_only() == mode.is_read_only()
		});

		if !up_to_date {
			debug!(service = %self.name, target, source, ?mode, "mount set");
			self.current.mounts.insert(
				target.to_string(),
				Mount::bind(target, source, mode.is_read_only()),
			);
		}
	}

	pub fn ensure_secret(&mut self, secret: SecretReference) {
		if self.current.secrets.get(&secret.secret_name) != Some(&secret) {
			debug!(service = %self.name, secret = %secret.secret_name, "secret set");
			self.current
				.secrets
				.insert(secret.secret_name.clone(), secret);
		}
	}

	pub fn ensure_config(&mut self, config: ConfigReference) {
		if self.current.configs.get(&config.config_name) != Some(&config) {
			debug!(service = %self.name, config = %config.config_name, "config set");
			self.current
				.configs
				.insert(config.config_name.clone(), config);
		}
	}

	/// Switches to another image. Between two pinned references only the digest counts,
	/// so retagging the same content is left alone.
	pub fn ensure_image(&mut self, image: ImageRef) {
		let unchanged = match (&self.current.image.digest, &image.digest) {
			(Some(current), Some(resolved)) => current == resolved,
			_ => self.current.image == image,
		};

		if !unchanged {
			debug!(service = %self.name, from = %self.current.image, to = %image, "image set");
			self.current.image = image;
		}
	}
}

fn ensure_map_entry(map: &mut StringBTreeMap, name: &str, value: Option<&str>) -> bool {
	if map.get(name).map(String::as_str) == value {
		return false;
	}

	match value {
		Some(value) => {
			map.insert(name.to_string(), value.to_string());
		}
		None => {
			map.remove(name);
		}
	}

	true
}
