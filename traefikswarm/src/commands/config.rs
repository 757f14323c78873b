use std::path::PathBuf;

use clap::Args;

use super::{
	parsers::{EntryPointSpec, parse_entrypoint_spec, parse_key_value_pair},
	*,
};
use crate::{
	fs::get_abs_path,
	image::ImageRef,
	routing::{BASIC_AUTH_USERS_LABEL, ENABLE_LABEL, UserList, decode_entrypoints},
	service::{MountMode, ServiceState},
};

const ACME_ARG_PREFIX: &str = "--certificatesResolvers.acme.acme";
const ACME_STORE_TARGET: &str = "/acme.json";
const ACME_DNS_EXE_TARGET: &str = "/usr/local/bin/acme-dns";
const DOCKER_SOCKET: &str = "/var/run/docker.sock";
const API_ROUTER: &str = "traefik-api";

#[allow(clippy::struct_excessive_bools)]
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigCommand {
	/// Entry point to add. The port can be omitted for the entry points with a default port.
	#[arg(long, value_name = "NAME[=PORT[/PROTO]]", value_parser = parse_entrypoint_spec)]
	pub entrypoint_add: Vec<EntryPointSpec>,

	/// Entry point to remove.
	#[arg(long, value_name = "NAME")]
	pub entrypoint_rm: Vec<String>,

	/// Environment variable to set.
	#[arg(long, value_name = "NAME=VALUE", value_parser = parse_key_value_pair)]
	pub env_add: Vec<(String, String)>,

	/// Environment variable to remove.
	#[arg(long, value_name = "NAME")]
	pub env_rm: Vec<String>,

	/// Basic auth user to add to the dashboard.
	#[arg(long, value_name = "USER:HASH")]
	pub user_add: Vec<String>,

	/// Basic auth user to remove from the dashboard.
	#[arg(long, value_name = "USER")]
	pub user_rm: Vec<String>,

	/// Argument to add, without the leading dashes.
	#[arg(long, value_name = "FLAG[=VALUE]")]
	pub arg_add: Vec<String>,

	/// Argument to remove, without the leading dashes.
	#[arg(long, value_name = "FLAG")]
	pub arg_rm: Vec<String>,

	/// Enables the debug log.
	#[arg(long, conflicts_with = "no_debug")]
	pub debug: bool,

	/// Disables the debug log.
	#[arg(long)]
	pub no_debug: bool,

	/// Enables the access log.
	#[arg(long, conflicts_with = "no_accesslog")]
	pub accesslog: bool,

	/// Disables the access log.
	#[arg(long)]
	pub no_accesslog: bool,

	/// Skips the verification of the certificates of the backends.
	#[arg(long, conflicts_with = "no_insecure_tls")]
	pub insecure_tls: bool,

	/// Verifies the certificates of the backends.
	#[arg(long)]
	pub no_insecure_tls: bool,

	/// Enables the API and the dashboard.
	#[arg(long, conflicts_with = "no_api")]
	pub api: bool,

	/// Disables the API and the dashboard.
	#[arg(long)]
	pub no_api: bool,

	/// The e-mail used for the ACME (Let's Encrypt) registration.
	#[arg(long, value_name = "EMAIL")]
	pub acme_email: Option<String>,

	/// Replaces the ACME domains of every entry point.
	#[arg(long, value_name = "DOMAIN")]
	pub acme_domains: Vec<String>,

	/// ACME domain to add to every entry point.
	#[arg(long, value_name = "DOMAIN", conflicts_with = "acme_domains")]
	pub acme_domains_add: Vec<String>,

	/// ACME domain to remove from every entry point.
	#[arg(long, value_name = "DOMAIN", conflicts_with = "acme_domains")]
	pub acme_domains_rm: Vec<String>,

	/// An executable on the docker host that handles the ACME DNS challenge.
	#[arg(long, value_name = "FILE")]
	pub acme_dns_exe: Option<PathBuf>,

	/// The ACME server to use. Takes precedence over the staging flags.
	#[arg(long, value_name = "URL")]
	pub acme_server: Option<String>,

	/// Uses the ACME staging server.
	#[arg(long, conflicts_with = "acme_no_staging")]
	pub acme_staging: bool,

	/// Stops using the ACME staging server.
	#[arg(long)]
	pub acme_no_staging: bool,

	/// The file on the docker host where ACME certificates are stored.
	#[arg(long, value_name = "FILE")]
	pub acme_store: Option<PathBuf>,

	/// Switches the traefik image, pinned to its current digest.
	#[arg(long, value_name = "IMAGE")]
	pub image: Option<String>,
}

impl CommandHandler for ConfigCommand {
	fn execute(self, session: &mut Session<'_>, config: &Config) -> AppResult {
		let settings = &config.traefik;

		let network = session.stack_network()?;

		let image = self
			.image
			.as_deref()
			.map(|image| session.resolve_image(&ImageRef::parse(image)))
			.transpose()?;

		let traefik = session.get_or_deploy_global_service(
			&settings.service_name,
			&ImageRef::parse(&settings.image),
		)?;

		if let Some(image) = image {
			traefik.ensure_image(image);
		}

		// Required for docker access
		traefik.ensure_constraint("node.role == manager");

		if let Some(network) = &network {
			traefik.ensure_network(network);
		}

		self.configure_entrypoints(traefik, config)?;
		self.configure_acme(traefik, config)?;

		for (name, value) in &self.env_add {
			traefik.ensure_env(name, value);
		}

		for name in &self.env_rm {
			traefik.remove_env(name);
		}

		match toggle(self.debug, self.no_debug) {
			Some(true) => traefik.ensure_arg("--log.level", Some("debug")),
			Some(false) => traefik.remove_arg("--log.level"),
			None => {}
		}

		match toggle(self.accesslog, self.no_accesslog) {
			Some(true) => traefik.ensure_arg("--accesslog", None),
			Some(false) => traefik.remove_arg("--accesslog"),
			None => {}
		}

		match toggle(self.insecure_tls, self.no_insecure_tls) {
			Some(true) => traefik.ensure_arg("--serverstransport.insecureskipverify", None),
			Some(false) => traefik.remove_arg("--serverstransport.insecureskipverify"),
			None => {}
		}

		match toggle(self.api, self.no_api) {
			Some(true) => enable_api(traefik),
			Some(false) => {
				traefik.remove_args_by_prefix("--api");
				traefik.remove_labels_by_prefix(&format!("traefik.http.routers.{API_ROUTER}"));
				traefik.remove_labels_by_prefix(&format!("traefik.http.services.{API_ROUTER}"));
			}
			None => {}
		}

		traefik.ensure_arg("--providers.docker", None);
		traefik.ensure_arg("--providers.docker.swarmMode", Some("true"));
		traefik.ensure_arg("--providers.docker.exposedByDefault", Some("false"));

		for arg in &self.arg_rm {
			traefik.remove_arg(&format!("--{arg}"));
		}

		for arg in &self.arg_add {
			match arg.split_once('=') {
				Some((flag, value)) => traefik.ensure_arg(&format!("--{flag}"), Some(value)),
				None => traefik.ensure_arg(&format!("--{arg}"), None),
			}
		}

		traefik.ensure_mount(DOCKER_SOCKET, DOCKER_SOCKET, MountMode::ReadOnly);

		self.configure_users(traefik)
	}
}

impl ConfigCommand {
	fn configure_entrypoints(&self, traefik: &mut ServiceState, config: &Config) -> AppResult {
		let mut entrypoints = decode_entrypoints(traefik)?;

		for name in &self.entrypoint_rm {
			let Some(mut entrypoint) = entrypoints.shift_remove(name) else {
				bail_precondition!("Entry point `{name}` not found");
			};

			entrypoint.remove(traefik, name);
		}

		for EntryPointSpec {
			name,
			port,
			protocol,
		} in &self.entrypoint_add
		{
			let Some(port) = port.or_else(|| config.traefik.default_ports.get(name).copied())
			else {
				bail_precondition!(
					"Non-standard entry point name `{name}`, please specify the port explicitly"
				);
			};

			let entrypoint = entrypoints.entry(name.clone()).or_default();
			entrypoint.set_port(port);
			entrypoint.set_protocol(protocol);

			let secure = name != "http" && protocol.is_empty();
			entrypoint.set_tls(secure);
			entrypoint.set_acme(secure);
		}

		if !self.acme_domains.is_empty() {
			for entrypoint in entrypoints.values_mut() {
				entrypoint.set_acme_domains(&self.acme_domains);
			}
		} else if !self.acme_domains_add.is_empty() || !self.acme_domains_rm.is_empty() {
			for entrypoint in entrypoints.values_mut() {
				let mut domains = entrypoint.acme_domains();

				for domain in &self.acme_domains_add {
					if !domains.contains(domain) {
						domains.push(domain.clone());
					}
				}

				domains.retain(|d| !self.acme_domains_rm.contains(d));

				entrypoint.set_acme_domains(&domains);
			}
		}

		let has_https = entrypoints.contains_key("https");

		if let Some(http) = entrypoints.get_mut("http") {
			if has_https {
				http.redirect_to("https", "https");
			} else {
				http.remove_redirect();
			}
		}

		for (name, entrypoint) in &entrypoints {
			entrypoint.update(traefik, name);
		}

		Ok(())
	}

	fn configure_acme(&self, traefik: &mut ServiceState, config: &Config) -> AppResult {
		if let Some(store) = &self.acme_store {
			let source = get_abs_path(store)?;
			traefik.ensure_mount(
				ACME_STORE_TARGET,
				&source.to_string_lossy(),
				MountMode::ReadWrite,
			);
		}

		if let Some(exe) = &self.acme_dns_exe {
			let source = get_abs_path(exe)?;
			traefik.ensure_mount(
				ACME_DNS_EXE_TARGET,
				&source.to_string_lossy(),
				MountMode::ReadOnly,
			);
			traefik.ensure_arg(
				&format!("{ACME_ARG_PREFIX}.dnsChallenge.provider"),
				Some("exec"),
			);
			traefik.ensure_env("EXEC_PATH", ACME_DNS_EXE_TARGET);
		}

		let ca_server = format!("{ACME_ARG_PREFIX}.caServer");

		if let Some(server) = &self.acme_server {
			traefik.ensure_arg(&ca_server, Some(server));
		} else {
			match toggle(self.acme_staging, self.acme_no_staging) {
				Some(true) => {
					traefik.ensure_arg(&ca_server, Some(&config.traefik.acme_staging_server));
				}
				Some(false) => traefik.remove_arg(&ca_server),
				None => {}
			}
		}

		if let Some(email) = &self.acme_email {
			traefik.ensure_arg(&format!("{ACME_ARG_PREFIX}.email"), Some(email));
		}

		Ok(())
	}

	fn configure_users(&self, traefik: &mut ServiceState) -> AppResult {
		if self.user_add.is_empty() && self.user_rm.is_empty() {
			return Ok(());
		}

		let mut users = UserList::decode(traefik.label(BASIC_AUTH_USERS_LABEL))
			.map_err(|detail| AppError::malformed(traefik.name(), detail))?;

		for user in &self.user_rm {
			users.remove(user);
		}

		for entry in &self.user_add {
			users
				.add(entry)
				.map_err(|detail| precondition!("Invalid user: {detail}"))?;
		}

		traefik.ensure_label(BASIC_AUTH_USERS_LABEL, users.label_value().as_deref());

		Ok(())
	}
}

fn enable_api(traefik: &mut ServiceState) {
	let router = format!("traefik.http.routers.{API_ROUTER}");

	traefik.ensure_arg("--api", None);
	traefik.ensure_arg("--api.dashboard", None);
	traefik.ensure_arg("--api.debug", None);

	traefik.ensure_label(&format!("{router}.entrypoints"), Some("https"));
	traefik.ensure_label(
		&format!("{router}.rule"),
		Some("HostRegexp(`traefik.{domain:.+}`)"),
	);
	traefik.ensure_label(&format!("{router}.priority"), Some("9999"));
	traefik.ensure_label(&format!("{router}.service"), Some("api@internal"));
	traefik.ensure_label(&format!("{router}.middlewares"), Some("traefik-auth"));
	traefik.ensure_label(
		&format!("traefik.http.services.{API_ROUTER}.loadbalancer.server.port"),
		Some("9"),
	);
	traefik.ensure_label(ENABLE_LABEL, Some("true"));
}
