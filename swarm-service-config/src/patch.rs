use serde::{Deserialize, Serialize};

use crate::{
	ConfigReference, Mount, NetworkAttachmentConfig, PortConfig, SecretReference, ServiceSpec,
	StringBTreeMap,
};

/// The set of collections of a service that must be replaced to reach the desired state.
///
/// Every field is a complete replacement value for the corresponding collection. Absent fields
/// leave the record untouched.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Patch {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub image: Option<String>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub labels: Option<StringBTreeMap>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub container_labels: Option<StringBTreeMap>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub args: Option<Vec<String>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub env: Option<Vec<String>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub mounts: Option<Vec<Mount>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub constraints: Option<Vec<String>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub networks: Option<Vec<NetworkAttachmentConfig>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub ports: Option<Vec<PortConfig>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub secrets: Option<Vec<SecretReference>>,

	#[serde(skip_serializing_if = "Option::is_none")]
	pub configs: Option<Vec<ConfigReference>>,
}

impl Patch {
	/// The number of collections touched by this patch.
	pub fn len(&self) -> usize {
		[
			self.image.is_some(),
			self.labels.is_some(),
			self.container_labels.is_some(),
			self.args.is_some(),
			self.env.is_some(),
			self.mounts.is_some(),
			self.constraints.is_some(),
			self.networks.is_some(),
			self.ports.is_some(),
			self.secrets.is_some(),
			self.configs.is_some(),
		]
		.into_iter()
		.filter(|set| *set)
		.count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Overlays the patch onto a service spec, leaving every other field as it was.
	pub fn apply_to(&self, spec: &mut ServiceSpec) {
		if let Some(labels) = &self.labels {
			spec.labels = Some(labels.clone());
		}

		if let Some(ports) = &self.ports {
			spec.endpoint_spec.get_or_insert_default().ports = Some(ports.clone());
		}

		let template = spec.task_template.get_or_insert_default();

		if let Some(constraints) = &self.constraints {
			template.placement.get_or_insert_default().constraints = Some(constraints.clone());
		}

		if let Some(networks) = &self.networks {
			template.networks = Some(networks.clone());
		}

		let container = template.container_spec.get_or_insert_default();

		macro_rules! overlay {
			($($field:ident => $target:ident),*) => {
				$(
					if let Some(value) = &self.$field {
						container.$target = Some(value.clone());
					}
				)*
			};
		}

		overlay!(
			image => image,
			container_labels => labels,
			args => args,
			env => env,
			mounts => mounts,
			secrets => secrets,
			configs => configs
		);
	}

	/// Builds the spec of a service that does not exist yet.
	pub fn to_new_spec(&self, name: &str) -> ServiceSpec {
		let mut spec = ServiceSpec::new(name);
		self.apply_to(&mut spec);
		spec
	}
}
