use std::{
	collections::BTreeMap,
	fs::{File, create_dir_all, read_to_string},
	path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use swarm_service_config::{Network, ObjectVersion, Patch, Service, StringBTreeMap};
use tracing::debug;
use uuid::Uuid;

use super::*;

/// The state of a cluster, as stored in a snapshot file.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Snapshot {
	pub services: Vec<Service>,

	pub networks: Vec<Network>,

	/// Image references (`name:tag`) mapped to the digest they resolve to.
	pub images: BTreeMap<String, String>,
}

/// A cluster backed by a [`Snapshot`], optionally persisted to a JSON file after each change.
#[derive(Debug, Default)]
pub struct SnapshotCluster {
	path: Option<PathBuf>,
	state: Snapshot,
}

fn new_id() -> String {
	Uuid::new_v4().simple().to_string()
}

impl SnapshotCluster {
	pub const fn in_memory(state: Snapshot) -> Self {
		Self { path: None, state }
	}

	/// Loads the snapshot at `path`. A missing file is an empty cluster.
	pub fn open(path: &Path) -> Result<Self, ClusterError> {
		let state = if path.exists() {
			let contents = read_to_string(path).map_err(|source| ClusterError::Io {
				path: path.to_path_buf(),
				source,
			})?;

			serde_json::from_str(&contents).map_err(|source| ClusterError::InvalidSnapshot {
				path: path.to_path_buf(),
				source,
			})?
		} else {
			Snapshot::default()
		};

		Ok(Self {
			path: Some(path.to_path_buf()),
			state,
		})
	}

	pub const fn state(&self) -> &Snapshot {
		&self.state
	}

	fn persist(&self) -> Result<(), ClusterError> {
		let Some(path) = &self.path else {
			return Ok(());
		};

		let io_error = |source| ClusterError::Io {
			path: path.clone(),
			source,
		};

		if let Some(parent) = path.parent()
			&& !parent.as_os_str().is_empty()
		{
			create_dir_all(parent).map_err(io_error)?;
		}

		let file = File::create(path).map_err(io_error)?;

		serde_json::to_writer_pretty(file, &self.state).map_err(|source| {
			ClusterError::InvalidSnapshot {
				path: path.clone(),
				source,
			}
		})
	}
}

impl Cluster for SnapshotCluster {
	fn list_services(&mut self) -> Result<Vec<Service>, ClusterError> {
		Ok(self.state.services.clone())
	}

	fn create_service(
		&mut self,
		name: &str,
		image: &ImageRef,
		patch: &Patch,
	) -> Result<Service, ClusterError> {
		let mut spec = patch.to_new_spec(name);
		spec.container_spec_mut().image = Some(image.to_string());

		let service = Service {
			id: new_id(),
			version: ObjectVersion { index: 1 },
			spec,
			..Default::default()
		};

		debug!(service = name, id = %service.id, "service stored");

		self.state.services.push(service.clone());
		self.persist()?;

		Ok(service)
	}

	fn update_service(&mut self, live: &Service, patch: &Patch) -> Result<Service, ClusterError> {
		let stored = self
			.state
			.services
			.iter_mut()
			.find(|s| s.id == live.id)
			.ok_or_else(|| ClusterError::NotFound {
				kind: "Service",
				name: live.spec.name.clone(),
			})?;

		if stored.version != live.version {
			return Err(ClusterError::VersionConflict {
				service: live.spec.name.clone(),
				sent: live.version.index,
				current: stored.version.index,
			});
		}

		let mut spec = live.spec.clone();
		patch.apply_to(&mut spec);

		stored.spec = spec;
		stored.version.index += 1;

		let updated = stored.clone();
		self.persist()?;

		Ok(updated)
	}

	fn find_network(&mut self, name: &str) -> Result<Option<Network>, ClusterError> {
		Ok(self
			.state
			.networks
			.iter()
			.find(|n| n.name == name)
			.cloned())
	}

	fn create_network(
		&mut self,
		name: &str,
		labels: &StringBTreeMap,
	) -> Result<Network, ClusterError> {
		let network = Network {
			id: new_id(),
			name: name.to_string(),
			driver: Some("overlay".to_string()),
			labels: Some(labels.clone()),
			..Default::default()
		};

		self.state.networks.push(network.clone());
		self.persist()?;

		Ok(network)
	}

	fn resolve_image(&mut self, image: &ImageRef, _pull: bool) -> Result<ImageRef, ClusterError> {
		let reference = image.with_tag();

		let digest = self
			.state
			.images
			.get(&reference)
			.ok_or(ClusterError::NotFound {
				kind: "Image",
				name: reference.clone(),
			})?;

		Ok(ImageRef {
			digest: Some(digest.clone()),
			..image.clone()
		})
	}
}

#[cfg(test)]
mod tests {
	use maplit::btreemap;
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn persisted_changes_can_be_reopened() -> Result<(), Box<dyn std::error::Error>> {
		let dir = tempfile::tempdir()?;
		let path = dir.path().join("nested/swarm.json");

		let mut cluster = SnapshotCluster::open(&path)?;

		let patch = Patch {
			labels: Some(btreemap! { "traefik.enable".to_string() => "true".to_string() }),
			..Default::default()
		};

		let created = cluster.create_service("web", &ImageRef::parse("nginx:1.25"), &patch)?;

		let update = Patch {
			args: Some(vec!["--debug".to_string()]),
			..Default::default()
		};

		let updated = cluster.update_service(&created, &update)?;
		assert_eq!(updated.version.index, 2);

		let mut reopened = SnapshotCluster::open(&path)?;
		let services = reopened.list_services()?;

		assert_eq!(services, vec![updated]);

		let container = services[0].spec.container_spec().unwrap();
		assert_eq!(container.image.as_deref(), Some("nginx:1.25"));
		assert_eq!(container.args, Some(vec!["--debug".to_string()]));

		Ok(())
	}

	#[test]
	fn stale_updates_are_rejected() -> Result<(), ClusterError> {
		let mut cluster = SnapshotCluster::default();

		let created = cluster.create_service("web", &ImageRef::parse("nginx"), &Patch::default())?;
		cluster.update_service(&created, &Patch::default())?;

		let result = cluster.update_service(&created, &Patch::default());

		assert!(matches!(
			result,
			Err(ClusterError::VersionConflict {
				sent: 1,
				current: 2,
				..
			})
		));

		Ok(())
	}

	#[test]
	fn images_resolve_to_known_digests() -> Result<(), ClusterError> {
		let mut cluster = SnapshotCluster::in_memory(Snapshot {
			images: btreemap! { "traefik:2.2".to_string() => "sha256:feed".to_string() },
			..Default::default()
		});

		let resolved = cluster.resolve_image(&ImageRef::parse("traefik:2.2@sha256:old"), false)?;

		assert_eq!(resolved.to_string(), "traefik:2.2@sha256:feed");
		assert!(
			cluster
				.resolve_image(&ImageRef::parse("traefik:3.0"), true)
				.is_err()
		);

		Ok(())
	}
}
