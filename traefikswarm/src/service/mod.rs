//! The in-memory mirror of a swarm service and the change-tracking operations on it.

use std::sync::LazyLock;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;
use swarm_service_config::{
	ConfigReference, Mount, NetworkAttachmentConfig, Patch, PortConfig, SecretReference, Service,
	ServiceSpec, StringBTreeMap,
};
use tracing::info;

use crate::{cluster::Cluster, image::ImageRef, *};

mod args;
pub use args::*;

mod mutator;
pub use mutator::*;

/// The label holding the stack a service belongs to.
pub const STACK_NAMESPACE_LABEL: &str = "com.docker.stack.namespace";

/// The label holding the image a stack service was deployed with.
pub const STACK_IMAGE_LABEL: &str = "com.docker.stack.image";

/// The namespace of the labels read by the proxy. Keys below it must be dot-separated segments.
pub const ROUTING_LABEL_NAMESPACE: &str = "traefik";

static ROUTING_LABEL_KEY: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^traefik(\.[^.\s]+)*$").expect("Invalid routing label regex")
});

/// An environment map. Entries without `=` have no value.
pub type EnvMap = IndexMap<String, Option<String>>;

/// The collections of a service that the reconciler reads and edits.
#[derive(Clone, Debug, PartialEq, Default)]
pub(crate) struct ServiceFields {
	pub image: ImageRef,
	pub labels: StringBTreeMap,
	pub container_labels: StringBTreeMap,
	pub args: ArgList,
	pub env: EnvMap,
	/// Keyed by the target path inside the container.
	pub mounts: IndexMap<String, Mount>,
	pub constraints: IndexSet<String>,
	/// Keyed by network id.
	pub networks: IndexMap<String, NetworkAttachmentConfig>,
	pub ports: Vec<PortConfig>,
	/// Keyed by secret name.
	pub secrets: IndexMap<String, SecretReference>,
	/// Keyed by config name.
	pub configs: IndexMap<String, ConfigReference>,
}

impl ServiceFields {
	fn from_spec(name: &str, spec: &ServiceSpec) -> AppResult<Self> {
		let labels = spec.labels.clone().unwrap_or_default();

		// Only the dotted namespace is read by the proxy, `traefik-version` and the like are not
		let routing_prefix = format!("{ROUTING_LABEL_NAMESPACE}.");

		if let Some(key) = labels
			.keys()
			.find(|key| key.starts_with(&routing_prefix) && !ROUTING_LABEL_KEY.is_match(key))
		{
			return Err(AppError::malformed(
				name,
				format!("the label `{key}` is not a dotted key"),
			));
		}

		let template = spec.task_template.clone().unwrap_or_default();
		let container = template.container_spec.unwrap_or_default();

		let args = ArgList::parse(container.args.unwrap_or_default())
			.map_err(|detail| AppError::malformed(name, detail))?;

		let env = container
			.env
			.unwrap_or_default()
			.into_iter()
			.map(|entry| match entry.split_once('=') {
				Some((key, value)) => (key.to_string(), Some(value.to_string())),
				None => (entry, None),
			})
			.collect();

		Ok(Self {
			image: container
				.image
				.as_deref()
				.map(ImageRef::parse)
				.unwrap_or_default(),
			labels,
			container_labels: container.labels.unwrap_or_default(),
			args,
			env,
			mounts: container
				.mounts
				.unwrap_or_default()
				.into_iter()
				.map(|m| (m.target.clone(), m))
				.collect(),
			constraints: template
				.placement
				.and_then(|p| p.constraints)
				.unwrap_or_default()
				.into_iter()
				.collect(),
			networks: template
				.networks
				.unwrap_or_default()
				.into_iter()
				.map(|n| (n.target.clone(), n))
				.collect(),
			ports: spec
				.endpoint_spec
				.as_ref()
				.and_then(|e| e.ports.clone())
				.unwrap_or_default(),
			secrets: container
				.secrets
				.unwrap_or_default()
				.into_iter()
				.map(|s| (s.secret_name.clone(), s))
				.collect(),
			configs: container
				.configs
				.unwrap_or_default()
				.into_iter()
				.map(|c| (c.config_name.clone(), c))
				.collect(),
		})
	}

	fn emit_env(&self) -> Vec<String> {
		self.env
			.iter()
			.map(|(key, value)| match value {
				Some(value) => format!("{key}={value}"),
				None => key.clone(),
			})
			.collect()
	}

	/// The collections of `self` that differ from `base`.
	fn diff(&self, base: &Self) -> Patch {
		macro_rules! changed {
			($field:ident, $value:expr) => {
				(self.$field != base.$field).then(|| $value)
			};
		}

		Patch {
			image: changed!(image, self.image.to_string()),
			labels: changed!(labels, self.labels.clone()),
			container_labels: changed!(container_labels, self.container_labels.clone()),
			args: changed!(args, self.args.emit()),
			env: changed!(env, self.emit_env()),
			mounts: changed!(mounts, self.mounts.values().cloned().collect()),
			constraints: changed!(constraints, self.constraints.iter().cloned().collect()),
			networks: changed!(networks, self.networks.values().cloned().collect()),
			ports: changed!(ports, self.ports.clone()),
			secrets: changed!(secrets, self.secrets.values().cloned().collect()),
			configs: changed!(configs, self.configs.values().cloned().collect()),
		}
	}
}

/// One swarm service, as loaded at the start of a run, plus the edits made to it since.
#[derive(Clone, Debug)]
pub struct ServiceState {
	name: String,
	/// The record this state was loaded from. Absent until the service is created.
	live: Option<Service>,
	snapshot: ServiceFields,
	pub(crate) current: ServiceFields,
}

impl ServiceState {
	/// Mirrors a live service.
	pub fn load(service: Service) -> AppResult<Self> {
		let name = service.spec.name.clone();
		let fields = ServiceFields::from_spec(&name, &service.spec)?;

		Ok(Self {
			name,
			live: Some(service),
			snapshot: fields.clone(),
			current: fields,
		})
	}

	/// Starts the definition of a service that does not exist yet.
	pub fn create_empty(name: impl Into<String>, image: ImageRef) -> Self {
		Self {
			name: name.into(),
			live: None,
			snapshot: ServiceFields::default(),
			current: ServiceFields {
				image,
				..Default::default()
			},
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn id(&self) -> Option<&str> {
		self.live.as_ref().map(|s| s.id.as_str())
	}

	pub const fn is_created(&self) -> bool {
		self.live.is_some()
	}

	/// The stack this service was deployed in, if any.
	pub fn stack(&self) -> Option<&str> {
		self.label(STACK_NAMESPACE_LABEL)
	}

	pub const fn image(&self) -> &ImageRef {
		&self.current.image
	}

	pub const fn labels(&self) -> &StringBTreeMap {
		&self.current.labels
	}

	pub fn label(&self, name: &str) -> Option<&str> {
		self.current.labels.get(name).map(String::as_str)
	}

	pub const fn container_labels(&self) -> &StringBTreeMap {
		&self.current.container_labels
	}

	pub const fn args(&self) -> &ArgList {
		&self.current.args
	}

	pub fn env(&self, name: &str) -> Option<&str> {
		self.current.env.get(name).and_then(Option::as_deref)
	}

	pub fn mount(&self, target: &str) -> Option<&Mount> {
		self.current.mounts.get(target)
	}

	pub fn constraints(&self) -> impl Iterator<Item = &str> {
		self.current.constraints.iter().map(String::as_str)
	}

	/// The ids of the attached networks.
	pub fn networks(&self) -> impl Iterator<Item = &str> {
		self.current.networks.keys().map(String::as_str)
	}

	pub fn ports(&self) -> &[PortConfig] {
		&self.current.ports
	}

	pub fn secrets(&self) -> impl Iterator<Item = &SecretReference> {
		self.current.secrets.values()
	}

	pub fn configs(&self) -> impl Iterator<Item = &ConfigReference> {
		self.current.configs.values()
	}

	/// The changes between the live record and the current state.
	pub fn patch(&self) -> Patch {
		let mut patch = self.current.diff(&self.snapshot);

		if !self.is_created() {
			patch.image = Some(self.current.image.to_string());
		}

		patch
	}

	/// The number of collections that differ from the live record.
	pub fn pending(&self) -> usize {
		self.current.diff(&self.snapshot).len()
	}

	/// Whether applying this service would send anything to the cluster.
	pub fn dirty(&self) -> bool {
		!self.is_created() || self.pending() > 0
	}

	/// A human-readable description of what applying would do, if anything.
	pub fn preview(&self) -> AppResult<Option<String>> {
		if !self.dirty() {
			return Ok(None);
		}

		let verb = if self.is_created() { "update" } else { "create" };

		let changes = serde_yaml_ng::to_string(&self.patch()).map_err(|e| {
			AppError::SerializationError {
				target: format!("the changes for `{}`", self.name),
				error: e.to_string(),
			}
		})?;

		let mut report = format!("Will {verb} service {}:\n", self.name);

		for line in changes.lines() {
			report.push_str("  ");
			report.push_str(line);
			report.push('\n');
		}

		Ok(Some(report))
	}

	/// Sends the pending changes to the cluster and adopts the result as the new live state.
	///
	/// Returns false if there was nothing to send.
	pub fn apply(&mut self, cluster: &mut dyn Cluster) -> AppResult<bool> {
		if !self.dirty() {
			return Ok(false);
		}

		let patch = self.patch();

		let result = match &self.live {
			None => {
				info!(service = %self.name, "creating service");
				cluster.create_service(&self.name, &self.current.image, &patch)
			}
			Some(live) => {
				info!(service = %self.name, changes = patch.len(), "updating service");
				cluster.update_service(live, &patch)
			}
		};

		let service = result.map_err(|source| AppError::Apply {
			service: self.name.clone(),
			source,
		})?;

		self.live = Some(service);
		self.snapshot = self.current.clone();

		Ok(true)
	}
}
