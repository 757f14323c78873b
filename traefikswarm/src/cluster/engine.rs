use reqwest::{
	Method, StatusCode,
	blocking::{Client, RequestBuilder, Response},
};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use swarm_service_config::{Network, Patch, Service, ServiceSpec, StringBTreeMap};
use tracing::{debug, info};

use super::*;

const API_VERSION: &str = "v1.41";

/// A docker engine reached over its HTTP API.
#[derive(Debug)]
pub struct EngineCluster {
	client: Client,
	base_url: String,
}

#[derive(Deserialize)]
struct CreatedService {
	#[serde(rename = "ID")]
	id: String,
}

#[derive(Deserialize)]
struct CreatedNetwork {
	#[serde(rename = "Id")]
	id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageInspect {
	#[serde(default)]
	repo_digests: Vec<String>,
}

impl EngineCluster {
	pub fn new(base_url: &str) -> Result<Self, ClusterError> {
		Ok(Self {
			client: Client::builder().build()?,
			base_url: base_url.to_string(),
		})
	}

	fn request(&self, method: Method, path: &str) -> RequestBuilder {
		debug!(%method, path, "engine request");

		self.client
			.request(method, format!("{}/{API_VERSION}{path}", self.base_url))
	}

	fn send(request: RequestBuilder, description: &str) -> Result<Response, ClusterError> {
		let response = request.send()?;
		let status = response.status();

		if status.is_success() {
			Ok(response)
		} else {
			Err(ClusterError::Status {
				request: description.to_string(),
				status: status.as_u16(),
				body: response.text().unwrap_or_default(),
			})
		}
	}

	fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClusterError> {
		Ok(Self::send(self.request(Method::GET, path), &format!("GET {path}"))?.json()?)
	}

	fn inspect_service(&self, id: &str) -> Result<Service, ClusterError> {
		self.get_json(&format!("/services/{id}"))
	}

	fn inspect_image(&self, reference: &str) -> Result<Option<ImageInspect>, ClusterError> {
		let path = format!("/images/{reference}/json");
		let response = self.request(Method::GET, &path).send()?;

		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}

		if !response.status().is_success() {
			return Err(ClusterError::Status {
				request: format!("GET {path}"),
				status: response.status().as_u16(),
				body: response.text().unwrap_or_default(),
			});
		}

		Ok(Some(response.json()?))
	}

	fn pull_image(&self, image: &ImageRef) -> Result<(), ClusterError> {
		info!(image = %image.with_tag(), "pulling image");

		let tag = image.tag.as_deref().unwrap_or("latest");

		let request = self
			.request(Method::POST, "/images/create")
			.query(&[("fromImage", image.name.as_str()), ("tag", tag)]);

		// The progress stream must be drained for the pull to complete
		Self::send(request, "POST /images/create")?.text()?;

		Ok(())
	}

	fn post_spec(
		&self,
		path: &str,
		spec: &ServiceSpec,
		version: Option<u64>,
	) -> Result<Response, ClusterError> {
		let mut request = self.request(Method::POST, path).json(spec);

		if let Some(version) = version {
			request = request.query(&[("version", version)]);
		}

		Self::send(request, &format!("POST {path}"))
	}
}

impl Cluster for EngineCluster {
	fn list_services(&mut self) -> Result<Vec<Service>, ClusterError> {
		self.get_json("/services")
	}

	fn create_service(
		&mut self,
		name: &str,
		image: &ImageRef,
		patch: &Patch,
	) -> Result<Service, ClusterError> {
		let mut spec = patch.to_new_spec(name);
		spec.container_spec_mut().image = Some(image.to_string());

		let created: CreatedService = self
			.post_spec("/services/create", &spec, None)?
			.json()?;

		self.inspect_service(&created.id)
	}

	fn update_service(&mut self, live: &Service, patch: &Patch) -> Result<Service, ClusterError> {
		let mut spec = live.spec.clone();
		patch.apply_to(&mut spec);

		self.post_spec(
			&format!("/services/{}/update", live.id),
			&spec,
			Some(live.version.index),
		)?;

		self.inspect_service(&live.id)
	}

	fn find_network(&mut self, name: &str) -> Result<Option<Network>, ClusterError> {
		let filters = json!({ "name": [name] }).to_string();

		let request = self
			.request(Method::GET, "/networks")
			.query(&[("filters", filters)]);

		let networks: Vec<Network> = Self::send(request, "GET /networks")?.json()?;

		// The name filter matches substrings
		Ok(networks.into_iter().find(|n| n.name == name))
	}

	fn create_network(
		&mut self,
		name: &str,
		labels: &StringBTreeMap,
	) -> Result<Network, ClusterError> {
		let body = json!({
			"Name": name,
			"Driver": "overlay",
			"Attachable": true,
			"Labels": labels,
		});

		let request = self.request(Method::POST, "/networks/create").json(&body);

		let created: CreatedNetwork = Self::send(request, "POST /networks/create")?.json()?;

		Ok(Network {
			id: created.id,
			name: name.to_string(),
			driver: Some("overlay".to_string()),
			labels: Some(labels.clone()),
			..Default::default()
		})
	}

	fn resolve_image(&mut self, image: &ImageRef, pull: bool) -> Result<ImageRef, ClusterError> {
		let reference = image.with_tag();

		let inspect = match self.inspect_image(&reference)? {
			Some(inspect) if !pull => inspect,
			_ => {
				self.pull_image(image)?;
				self.inspect_image(&reference)?
					.ok_or_else(|| ClusterError::NotFound {
						kind: "Image",
						name: reference.clone(),
					})?
			}
		};

		// Locally built images have no repository digest
		let digest = inspect
			.repo_digests
			.first()
			.and_then(|d| d.split_once('@'))
			.map(|(_, digest)| digest.to_string());

		Ok(ImageRef {
			digest,
			..image.clone()
		})
	}
}
