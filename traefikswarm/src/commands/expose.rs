use clap::Args;

use super::*;
use crate::routing::{Route, RouterProtocol};

const DEFAULT_ENTRYPOINT: &str = "https";
const LBSWARM_LABEL: &str = "traefik.docker.lbswarm";

#[allow(clippy::struct_excessive_bools)]
#[derive(Args, Debug, Clone)]
pub struct ExposeCommand {
	/// The service to expose.
	#[arg(value_name = "SERVICE")]
	pub service: String,

	/// The port of the service to route requests to.
	#[arg(value_name = "PORT")]
	pub port: u16,

	/// Entry point to route requests from [default: https].
	#[arg(long, value_name = "NAME")]
	pub entrypoint_add: Vec<String>,

	/// Entry point to stop routing requests from.
	#[arg(long, value_name = "NAME")]
	pub entrypoint_rm: Vec<String>,

	/// Host to route. A `*` matches any sequence of characters.
	#[arg(short = 'H', long, value_name = "HOST")]
	pub host_add: Vec<String>,

	/// Host to stop routing.
	#[arg(long, value_name = "HOST")]
	pub host_rm: Vec<String>,

	/// Uses the swarm load balancer.
	#[arg(long, conflicts_with = "lbtraefik")]
	pub lbswarm: bool,

	/// Uses the traefik load balancer.
	#[arg(long)]
	pub lbtraefik: bool,

	/// The name of the router [default: SERVICE-PORT].
	#[arg(long)]
	pub router: Option<String>,

	/// Uses HTTPS to reach the backend.
	#[arg(long, conflicts_with = "http")]
	pub https: bool,

	/// Uses HTTP to reach the backend.
	#[arg(long)]
	pub http: bool,

	/// Routes raw TCP connections by SNI.
	#[arg(long)]
	pub tcp: bool,

	/// Terminates TLS at the router.
	#[arg(long, conflicts_with = "no_tls")]
	pub tls: bool,

	/// Does not terminate TLS at the router.
	#[arg(long)]
	pub no_tls: bool,
}

impl CommandHandler for ExposeCommand {
	fn execute(self, session: &mut Session<'_>, _: &Config) -> AppResult {
		let service = session.find_service(&self.service)?;

		let router = self
			.router
			.clone()
			.unwrap_or_else(|| format!("{}-{}", service.name(), self.port));

		let protocol = if self.tcp {
			RouterProtocol::Tcp
		} else {
			RouterProtocol::Http
		};

		let mut route = Route::decode(service, protocol, &router)?;

		for entrypoint in &self.entrypoint_rm {
			let Some(index) = route.entrypoints.iter().position(|e| e == entrypoint) else {
				bail_precondition!("Router `{router}` has no entry point `{entrypoint}`");
			};

			route.entrypoints.remove(index);
		}

		for entrypoint in &self.entrypoint_add {
			if !route.entrypoints.contains(entrypoint) {
				route.entrypoints.push(entrypoint.clone());
			}
		}

		if route.entrypoints.is_empty() {
			route.entrypoints.push(DEFAULT_ENTRYPOINT.to_string());
		}

		if !self.host_add.is_empty() || !self.host_rm.is_empty() {
			let mut hosts = route.rule.hosts().to_vec();

			for host in &self.host_rm {
				let Some(index) = hosts.iter().position(|h| h == host) else {
					bail_precondition!("Router `{router}` has no host `{host}`");
				};

				hosts.remove(index);
			}

			for host in &self.host_add {
				if !hosts.contains(host) {
					hosts.push(host.clone());
				}
			}

			route.set_hosts(hosts);
		}

		route.port = Some(self.port);

		match toggle(self.https, self.http) {
			Some(true) => route.scheme = Some("https".to_string()),
			Some(false) => route.scheme = None,
			None => {}
		}

		if let Some(tls) = toggle(self.tls, self.no_tls) {
			route.tls = tls;
		}

		match toggle(self.lbswarm, self.lbtraefik) {
			Some(true) => service.ensure_label(LBSWARM_LABEL, Some("true")),
			Some(false) => service.remove_label(LBSWARM_LABEL),
			None => {}
		}

		route.encode(service);

		Ok(())
	}
}
