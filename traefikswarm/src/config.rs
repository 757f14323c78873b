use std::{
	env,
	ffi::OsString,
	path::{Path, PathBuf},
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{fs::*, *};

const DEFAULT_CONFIG_NAMES: [&str; 3] = [
	"traefikswarm.yaml",
	"traefikswarm.toml",
	"traefikswarm.json",
];

/// The settings of the proxy service.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct TraefikConfig {
	/// The name of the global proxy service.
	pub service_name: String,

	/// The image used when the proxy service is created.
	pub image: String,

	/// The ports of the entry points that can be added by name alone.
	pub default_ports: IndexMap<String, u16>,

	/// The ACME directory used by `--acme-staging`.
	pub acme_staging_server: String,
}

impl Default for TraefikConfig {
	fn default() -> Self {
		Self {
			service_name: "traefik".to_string(),
			image: "traefik:2.2".to_string(),
			default_ports: [("http".to_string(), 80), ("https".to_string(), 443)]
				.into_iter()
				.collect(),
			acme_staging_server: "https://acme-staging-v02.api.letsencrypt.org/directory"
				.to_string(),
		}
	}
}

/// The global configuration struct.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
#[serde(deny_unknown_fields)]
pub struct Config {
	#[serde(skip)]
	pub(crate) config_file: Option<PathBuf>,

	/// The cluster to manage.
	pub host: Option<String>,

	/// The stack to operate on. Without it, only services outside of any stack are considered.
	pub stack: Option<String>,

	/// The log filter used when `RUST_LOG` is not set [default: `warn`].
	pub log_level: Option<String>,

	/// Settings for the proxy service.
	pub traefik: TraefikConfig,

	/// The image of the services created by the `forwarder` command.
	pub forwarder_image: String,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			config_file: None,
			host: None,
			stack: None,
			log_level: None,
			traefik: TraefikConfig::default(),
			forwarder_image: "alpine/socat".to_string(),
		}
	}
}

impl Config {
	/// Extracts a config from a yaml, toml or json file.
	pub fn from_file(path: &Path) -> AppResult<Self> {
		let path = get_abs_path(path)?;
		let extension = get_extension(&path)?;

		let mut config: Self = if extension == "yaml" || extension == "yml" {
			deserialize_yaml(&path)?
		} else if extension == "toml" {
			deserialize_toml(&path)?
		} else if extension == "json" {
			deserialize_json(&path)?
		} else {
			return Err(AppError::DeserializationError {
				file: path.clone(),
				error: format!(
					"Invalid config format for `{}`. Allowed formats are: yaml, toml, json",
					path.display()
				),
			});
		};

		config.config_file = Some(path);

		Ok(config)
	}

	/// Loads `explicit` if given, otherwise the first config file found in the current
	/// directory or in the user's config directory. Falls back to the defaults.
	pub fn discover(explicit: Option<&Path>, ignore_files: bool) -> AppResult<Self> {
		let path = match explicit {
			Some(path) => Some(path.to_path_buf()),
			None if ignore_files => None,
			None => find_config_file(),
		};

		match path {
			Some(path) => {
				debug!(path = %path.display(), "loading config");
				Self::from_file(&path)
			}
			None => Ok(Self::default()),
		}
	}

	/// The file this config was loaded from, if any.
	pub fn config_file(&self) -> Option<&Path> {
		self.config_file.as_deref()
	}
}

fn find_config_file() -> Option<PathBuf> {
	for name in DEFAULT_CONFIG_NAMES {
		let path = PathBuf::from(name);

		if path.is_file() {
			return Some(path);
		}
	}

	// Try the xdg path if nothing else was found
	let config_dir = user_config_dir(env::var_os("XDG_CONFIG_HOME"), env::var_os("HOME"))?;

	DEFAULT_CONFIG_NAMES
		.iter()
		.map(|name| config_dir.join(name))
		.find(|path| path.is_file())
}

fn user_config_dir(xdg_config_home: Option<OsString>, home: Option<OsString>) -> Option<PathBuf> {
	let config_home = match xdg_config_home.filter(|dir| !dir.is_empty()) {
		Some(dir) => PathBuf::from(dir),
		None => PathBuf::from(home.filter(|dir| !dir.is_empty())?).join(".config"),
	};

	Some(config_home.join("traefikswarm"))
}
