//! Rust representations of the service records exposed by a Docker Swarm manager.
//!
//! Only the fields that the reconciler reads or writes are typed. Everything else lands in the
//! flattened `extensions` map of the closest record, so that a record that is read, patched and
//! written back keeps every field it came with.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod patch;
pub use patch::*;

/// Fields of a record that are not modelled explicitly, in the order they were read.
pub type Extensions = IndexMap<String, Value>;

pub type StringBTreeMap = BTreeMap<String, String>;

/// A service as returned by the swarm manager.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Service {
	#[serde(rename = "ID")]
	pub id: String,

	/// The version of the record. Updates must send it back to avoid conflicting writes.
	#[serde(default)]
	pub version: ObjectVersion,

	#[serde(default)]
	pub spec: ServiceSpec,

	#[serde(flatten)]
	pub extensions: Extensions,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectVersion {
	pub index: u64,
}

/// User modifiable configuration for a service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSpec {
	/// Name of the service.
	#[serde(default)]
	pub name: String,

	/// User-defined key/value metadata of the service record.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub labels: Option<StringBTreeMap>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub task_template: Option<TaskSpec>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub endpoint_spec: Option<EndpointSpec>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

impl ServiceSpec {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}

	pub fn container_spec(&self) -> Option<&ContainerSpec> {
		self.task_template
			.as_ref()
			.and_then(|t| t.container_spec.as_ref())
	}

	pub fn container_spec_mut(&mut self) -> &mut ContainerSpec {
		self.task_template
			.get_or_insert_default()
			.container_spec
			.get_or_insert_default()
	}
}

/// The template of the tasks spawned for a service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct TaskSpec {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub container_spec: Option<ContainerSpec>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub placement: Option<Placement>,

	/// Networks the tasks are attached to.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub networks: Option<Vec<NetworkAttachmentConfig>>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

/// The container that runs each task.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerSpec {
	/// The image reference, as `name[:tag][@digest]`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub image: Option<String>,

	/// Labels applied to the spawned containers.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub labels: Option<StringBTreeMap>,

	/// Arguments passed to the image's entrypoint, in order.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub args: Option<Vec<String>>,

	/// Environment entries, as `NAME=value`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub env: Option<Vec<String>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub mounts: Option<Vec<Mount>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub secrets: Option<Vec<SecretReference>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub configs: Option<Vec<ConfigReference>>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

/// A mount inside the service's containers.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Mount {
	/// The path inside the container.
	#[serde(default)]
	pub target: String,

	/// The host path for bind mounts, or the volume name for volumes.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub source: Option<String>,

	/// One of `bind`, `volume`, `tmpfs`, `npipe`, `cluster`.
	#[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
	pub kind: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub read_only: Option<bool>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

impl Mount {
	pub fn bind(target: impl Into<String>, source: impl Into<String>, read_only: bool) -> Self {
		Self {
			target: target.into(),
			source: Some(source.into()),
			kind: Some("bind".to_string()),
			read_only: read_only.then_some(true),
			extensions: Extensions::new(),
		}
	}

	pub fn is_read_only(&self) -> bool {
		self.read_only.unwrap_or(false)
	}
}

/// Scheduling constraints and preferences.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Placement {
	/// Predicates such as `node.role == manager`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub constraints: Option<Vec<String>>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkAttachmentConfig {
	/// The id or name of the network.
	#[serde(default)]
	pub target: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub aliases: Option<Vec<String>>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

impl NetworkAttachmentConfig {
	pub fn new(target: impl Into<String>) -> Self {
		Self {
			target: target.into(),
			..Default::default()
		}
	}
}

/// The ports published by the service.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct EndpointSpec {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub mode: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub ports: Option<Vec<PortConfig>>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
	#[default]
	Tcp,
	Udp,
	Sctp,
}

impl PortProtocol {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Tcp => "tcp",
			Self::Udp => "udp",
			Self::Sctp => "sctp",
		}
	}
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PublishMode {
	Ingress,
	Host,
}

/// A published port.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct PortConfig {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,

	/// Absent means `tcp`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub protocol: Option<PortProtocol>,

	/// The port inside the container.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub target_port: Option<u16>,

	/// The port on the swarm hosts.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub published_port: Option<u16>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub publish_mode: Option<PublishMode>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

impl PortConfig {
	pub fn effective_protocol(&self) -> PortProtocol {
		self.protocol.unwrap_or_default()
	}
}

/// The file a secret or config is exposed as inside the container.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ReferenceFile {
	pub name: String,

	#[serde(flatten)]
	pub extensions: Extensions,
}

impl ReferenceFile {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			extensions: Extensions::new(),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct SecretReference {
	#[serde(rename = "SecretID")]
	pub secret_id: String,

	pub secret_name: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub file: Option<ReferenceFile>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigReference {
	#[serde(rename = "ConfigID")]
	pub config_id: String,

	pub config_name: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub file: Option<ReferenceFile>,

	#[serde(flatten)]
	pub extensions: Extensions,
}

/// A network known to the swarm.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "PascalCase")]
pub struct Network {
	#[serde(rename = "Id")]
	pub id: String,

	pub name: String,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub driver: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub labels: Option<StringBTreeMap>,

	#[serde(flatten)]
	pub extensions: Extensions,
}
