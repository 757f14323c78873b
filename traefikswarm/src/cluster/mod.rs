//! The cluster the services live in, behind a small trait so that the reconciler can run against
//! a docker engine or against a snapshot file.

use std::{
	collections::HashMap,
	fmt::{self, Display},
	io,
	path::PathBuf,
	str::FromStr,
};

use swarm_service_config::{Network, Patch, Service, StringBTreeMap};
use thiserror::Error;
use tracing::debug;

use crate::image::ImageRef;

#[cfg(feature = "engine")]
mod engine;
#[cfg(feature = "engine")]
pub use engine::EngineCluster;

mod snapshot;
pub use snapshot::*;

#[derive(Debug, Error)]
pub enum ClusterError {
	#[cfg(feature = "engine")]
	#[error("Request to the docker engine failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("The docker engine rejected `{request}` with status {status}: {body}")]
	Status {
		request: String,
		status: u16,
		body: String,
	},

	#[error("Could not access the snapshot `{path}`: {source}")]
	Io { path: PathBuf, source: io::Error },

	#[error("Invalid snapshot `{path}`: {source}")]
	InvalidSnapshot {
		path: PathBuf,
		source: serde_json::Error,
	},

	#[error("{kind} `{name}` not found")]
	NotFound { kind: &'static str, name: String },

	#[error("Update of `{service}` is out of sequence (sent version {sent}, current is {current})")]
	VersionConflict {
		service: String,
		sent: u64,
		current: u64,
	},

	#[error("Unsupported cluster target `{target}`: {reason}")]
	UnsupportedTarget { target: String, reason: String },
}

/// The operations the reconciler needs from the cluster.
///
/// Each call is a single request. Nothing is batched or rolled back across calls.
pub trait Cluster {
	fn list_services(&mut self) -> Result<Vec<Service>, ClusterError>;

	fn create_service(
		&mut self,
		name: &str,
		image: &ImageRef,
		patch: &Patch,
	) -> Result<Service, ClusterError>;

	/// Sends the live spec with `patch` overlaid. The change may still be rolling out when this
	/// returns.
	fn update_service(&mut self, live: &Service, patch: &Patch) -> Result<Service, ClusterError>;

	/// Looks a network up by its exact name.
	fn find_network(&mut self, name: &str) -> Result<Option<Network>, ClusterError>;

	/// Creates an attachable overlay network.
	fn create_network(
		&mut self,
		name: &str,
		labels: &StringBTreeMap,
	) -> Result<Network, ClusterError>;

	/// Finds the digest of `image`, pulling it first if requested or if it is not available.
	fn resolve_image(&mut self, image: &ImageRef, pull: bool) -> Result<ImageRef, ClusterError>;
}

/// Where to find a cluster.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
	/// The base url of a docker engine API.
	Engine(String),
	/// A JSON snapshot file, rewritten after every change.
	Snapshot(PathBuf),
	/// An empty cluster that only lives for the duration of the run.
	Memory,
}

const DEFAULT_ENGINE_PORT: u16 = 2375;

impl FromStr for Target {
	type Err = ClusterError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let unsupported = |reason: &str| ClusterError::UnsupportedTarget {
			target: s.to_string(),
			reason: reason.to_string(),
		};

		if s == "memory" {
			Ok(Self::Memory)
		} else if let Some(path) = s.strip_prefix("file:") {
			if path.is_empty() {
				return Err(unsupported("the snapshot path is empty"));
			}

			Ok(Self::Snapshot(PathBuf::from(path)))
		} else if let Some(address) = s.strip_prefix("tcp://") {
			Ok(Self::Engine(format!("http://{}", address.trim_end_matches('/'))))
		} else if s.starts_with("http://") || s.starts_with("https://") {
			Ok(Self::Engine(s.trim_end_matches('/').to_string()))
		} else if s.contains("://") {
			Err(unsupported(
				"only tcp://, http(s)://, file: and memory targets are supported",
			))
		} else if s.is_empty() {
			Err(unsupported("the target is empty"))
		} else if s.contains(':') {
			Ok(Self::Engine(format!("http://{s}")))
		} else {
			Ok(Self::Engine(format!("http://{s}:{DEFAULT_ENGINE_PORT}")))
		}
	}
}

impl Display for Target {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Engine(url) => write!(f, "{url}"),
			Self::Snapshot(path) => write!(f, "file:{}", path.display()),
			Self::Memory => write!(f, "memory"),
		}
	}
}

impl Target {
	pub fn connect(&self) -> Result<Box<dyn Cluster>, ClusterError> {
		debug!(cluster = %self, "connecting");

		match self {
			#[cfg(feature = "engine")]
			Self::Engine(url) => Ok(Box::new(EngineCluster::new(url)?)),
			#[cfg(not(feature = "engine"))]
			Self::Engine(url) => Err(ClusterError::UnsupportedTarget {
				target: url.clone(),
				reason: "built without the `engine` feature".to_string(),
			}),
			Self::Snapshot(path) => Ok(Box::new(SnapshotCluster::open(path)?)),
			Self::Memory => Ok(Box::new(SnapshotCluster::default())),
		}
	}
}

/// Cluster clients, connected on first use and reused afterwards.
#[derive(Default)]
pub struct ClusterRegistry {
	clients: HashMap<Target, Box<dyn Cluster>>,
}

impl ClusterRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers an already connected client for `target`.
	pub fn insert(&mut self, target: Target, client: Box<dyn Cluster>) {
		self.clients.insert(target, client);
	}

	pub fn contains(&self, target: &Target) -> bool {
		self.clients.contains_key(target)
	}

	pub fn connect(&mut self, target: &Target) -> Result<&mut dyn Cluster, ClusterError> {
		if !self.clients.contains_key(target) {
			let client = target.connect()?;
			self.clients.insert(target.clone(), client);
		}

		let client = self
			.clients
			.get_mut(target)
			.ok_or_else(|| ClusterError::NotFound {
				kind: "Cluster",
				name: target.to_string(),
			})?;

		Ok(client.as_mut())
	}
}
