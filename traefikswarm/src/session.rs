//! One reconciliation run: load the services in scope, let a command edit them, then preview,
//! confirm and apply the changes.

use std::io::{self, BufRead, Write};

use indexmap::IndexMap;
use swarm_service_config::{Network, Service, StringBTreeMap};
use tracing::{debug, info};

use crate::{
	cluster::Cluster,
	image::ImageRef,
	service::{STACK_IMAGE_LABEL, STACK_NAMESPACE_LABEL, ServiceState},
	*,
};

/// The run-wide switches chosen on the command line.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SessionOptions {
	/// Create missing services and networks.
	pub init: bool,
	/// Apply without asking.
	pub commit: bool,
	/// Stop after showing the changes.
	pub preview: bool,
}

/// How a run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
	NoChanges,
	Previewed,
	Aborted,
	/// The number of services that were created or updated.
	Applied(usize),
}

/// Asks the user whether to go ahead with the changes.
pub trait Confirm {
	fn confirm(&mut self, prompt: &str) -> io::Result<bool>;
}

/// Reads the answer from stdin. Only a literal `yes` confirms.
#[derive(Debug, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
	fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
		let mut stdout = io::stdout();
		write!(stdout, "{prompt}")?;
		stdout.flush()?;

		let mut answer = String::new();
		io::stdin().lock().read_line(&mut answer)?;

		Ok(answer.trim_end_matches(['\r', '\n']) == "yes")
	}
}

const DEFAULT_NETWORK: &str = "default";

pub struct Session<'a> {
	cluster: &'a mut dyn Cluster,
	options: SessionOptions,
	stack: Option<String>,
	/// Services outside of any stack, by name.
	global_services: IndexMap<String, ServiceState>,
	/// Services of the selected stack, by name without the stack prefix.
	services: IndexMap<String, ServiceState>,
	stack_network: Option<Network>,
	/// Networks to create once the changes are confirmed, by name.
	pending_networks: IndexMap<String, Network>,
}

impl<'a> Session<'a> {
	/// Loads the services outside of any stack and, if a stack is given, the services in it.
	///
	/// Services of other stacks are ignored.
	pub fn load(
		cluster: &'a mut dyn Cluster,
		stack: Option<String>,
		options: SessionOptions,
	) -> AppResult<Self> {
		let mut global_services = IndexMap::new();
		let mut services = IndexMap::new();

		for record in cluster.list_services()? {
			let namespace = service_stack(&record).map(str::to_string);

			match (namespace.as_deref(), stack.as_deref()) {
				(None, _) => {
					let service = ServiceState::load(record)?;
					global_services.insert(service.name().to_string(), service);
				}
				(Some(namespace), Some(selected)) if namespace == selected => {
					let service = ServiceState::load(record)?;
					let key = strip_stack(service.name(), selected).to_string();
					services.insert(key, service);
				}
				_ => {}
			}
		}

		debug!(
			global = global_services.len(),
			stack = services.len(),
			"services loaded"
		);

		Ok(Self {
			cluster,
			options,
			stack,
			global_services,
			services,
			stack_network: None,
			pending_networks: IndexMap::new(),
		})
	}

	/// Prefixes `name` with the stack, if there is one.
	pub fn add_stackname(&self, name: &str) -> String {
		match &self.stack {
			Some(stack) => format!("{stack}_{name}"),
			None => name.to_string(),
		}
	}

	fn stack_labels(&self) -> StringBTreeMap {
		self.stack
			.iter()
			.map(|stack| (STACK_NAMESPACE_LABEL.to_string(), stack.clone()))
			.collect()
	}

	fn require_init(&self, kind: &str, name: &str, init: bool) -> AppResult {
		if !(init || self.options.init) {
			bail_precondition!("The {kind} `{name}` is not deployed, use --init to create it");
		}

		info!(kind, name, "creating");

		Ok(())
	}

	/// A service of the selected stack.
	pub fn get_service(&mut self, name: &str) -> Option<&mut ServiceState> {
		self.services.get_mut(name)
	}

	/// A service outside of any stack.
	pub fn get_global_service(&mut self, name: &str) -> Option<&mut ServiceState> {
		self.global_services.get_mut(name)
	}

	/// Looks `name` up in the stack if one is selected, or among the global services otherwise.
	pub fn find_service(&mut self, name: &str) -> AppResult<&mut ServiceState> {
		self.scoped_services()
			.get_mut(name)
			.ok_or_else(|| precondition!("Service `{name}` not found"))
	}

	/// The stack services, or the global ones when no stack is selected.
	const fn scoped_services(&mut self) -> &mut IndexMap<String, ServiceState> {
		if self.stack.is_some() {
			&mut self.services
		} else {
			&mut self.global_services
		}
	}

	/// Returns the service `name` of the selected stack, defining it if it does not exist.
	///
	/// A new service is labelled as part of the stack and attached to its network. Without a stack,
	/// this is a global service.
	pub fn get_or_deploy_service(
		&mut self,
		name: &str,
		image: &ImageRef,
		init: bool,
	) -> AppResult<&mut ServiceState> {
		if !self.scoped_services().contains_key(name) {
			let full_name = self.add_stackname(name);
			self.require_init("service", &full_name, init)?;

			let network = self.stack_network()?;

			let mut service = ServiceState::create_empty(&full_name, image.clone());
			service.ensure_label(STACK_IMAGE_LABEL, Some(&image.to_string()));

			if let Some(stack) = &self.stack {
				service.ensure_label(STACK_NAMESPACE_LABEL, Some(stack));
				service.ensure_container_label(STACK_NAMESPACE_LABEL, Some(stack));
			}

			if let Some(network) = network {
				service.ensure_network(&network);
			}

			self.scoped_services().insert(name.to_string(), service);
		}

		self.find_service(name)
	}

	/// Returns the global service `name`, defining it if it does not exist.
	pub fn get_or_deploy_global_service(
		&mut self,
		name: &str,
		image: &ImageRef,
	) -> AppResult<&mut ServiceState> {
		if !self.global_services.contains_key(name) {
			self.require_init("global service", name, false)?;

			self.global_services.insert(
				name.to_string(),
				ServiceState::create_empty(name, image.clone()),
			);
		}

		self.global_services
			.get_mut(name)
			.ok_or_else(|| precondition!("Service `{name}` not found"))
	}

	/// Finds the network `name` of the stack.
	///
	/// A missing network is only created when the changes are applied. Until then, the returned
	/// network is identified by its name.
	pub fn get_network(&mut self, name: &str) -> AppResult<Network> {
		let full_name = self.add_stackname(name);

		if let Some(network) = self.pending_networks.get(&full_name) {
			return Ok(network.clone());
		}

		if let Some(network) = self.cluster.find_network(&full_name)? {
			return Ok(network);
		}

		self.require_init("network", &full_name, false)?;

		let network = Network {
			id: full_name.clone(),
			name: full_name.clone(),
			driver: Some("overlay".to_string()),
			labels: Some(self.stack_labels()),
			..Default::default()
		};

		self.pending_networks
			.insert(full_name, network.clone());

		Ok(network)
	}

	/// The default network of the selected stack.
	pub fn stack_network(&mut self) -> AppResult<Option<Network>> {
		if self.stack.is_none() {
			return Ok(None);
		}

		if self.stack_network.is_none() {
			self.stack_network = Some(self.get_network(DEFAULT_NETWORK)?);
		}

		Ok(self.stack_network.clone())
	}

	/// Pins `image` to the digest it currently resolves to, pulling it if needed.
	pub fn resolve_image(&mut self, image: &ImageRef) -> AppResult<ImageRef> {
		Ok(self.cluster.resolve_image(image, false)?)
	}

	fn all_services(&self) -> impl Iterator<Item = &ServiceState> {
		self.global_services
			.values()
			.chain(self.services.values())
	}

	/// Shows the pending changes and applies them once confirmed.
	///
	/// Global services are applied before the stack ones. A failure stops the run, and the
	/// services applied before it stay applied.
	pub fn apply_changes(
		&mut self,
		confirm: &mut dyn Confirm,
		out: &mut dyn Write,
	) -> AppResult<Outcome> {
		let mut changes = !self.pending_networks.is_empty();

		for name in self.pending_networks.keys() {
			writeln!(out, "Will create network {name}").map_err(AppError::Terminal)?;
		}

		for service in self.all_services() {
			if let Some(preview) = service.preview()? {
				write!(out, "{preview}").map_err(AppError::Terminal)?;
				changes = true;
			}
		}

		if !changes {
			writeln!(out, "No changes required").map_err(AppError::Terminal)?;
			return Ok(Outcome::NoChanges);
		}

		if self.options.preview {
			return Ok(Outcome::Previewed);
		}

		if !self.options.commit
			&& !confirm
				.confirm("To apply the changes, type 'yes': ")
				.map_err(AppError::Terminal)?
		{
			info!("changes discarded");
			return Ok(Outcome::Aborted);
		}

		self.create_pending_networks()?;

		let mut applied = 0;

		for service in self
			.global_services
			.values_mut()
			.chain(self.services.values_mut())
		{
			if service.apply(self.cluster)? {
				applied += 1;
			}
		}

		Ok(Outcome::Applied(applied))
	}

	fn create_pending_networks(&mut self) -> AppResult {
		for (name, pending) in std::mem::take(&mut self.pending_networks) {
			let labels = pending.labels.clone().unwrap_or_default();
			let network = self.cluster.create_network(&name, &labels)?;

			info!(network = %name, id = %network.id, "network created");

			for service in self
				.global_services
				.values_mut()
				.chain(self.services.values_mut())
			{
				service.retarget_network(&pending.id, &network);
			}

			if self
				.stack_network
				.as_ref()
				.is_some_and(|n| n.id == pending.id)
			{
				self.stack_network = Some(network);
			}
		}

		Ok(())
	}
}

fn service_stack(record: &Service) -> Option<&str> {
	record
		.spec
		.labels
		.as_ref()?
		.get(STACK_NAMESPACE_LABEL)
		.map(String::as_str)
}

fn strip_stack<'n>(name: &'n str, stack: &str) -> &'n str {
	name.strip_prefix(stack)
		.and_then(|rest| rest.strip_prefix('_'))
		.unwrap_or(name)
}
