use tracing::warn;

use super::{HostRule, RouterProtocol};
use crate::{service::ServiceState, *};

/// The label that opts a service in to the proxy.
pub const ENABLE_LABEL: &str = "traefik.enable";

/// A router of the proxy and the backend it forwards to, as found in the labels of a service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
	pub protocol: RouterProtocol,
	pub router: String,
	pub entrypoints: Vec<String>,
	pub rule: HostRule,
	/// The backend port.
	pub port: Option<u16>,
	/// The backend scheme. Only meaningful for http routers.
	pub scheme: Option<String>,
	/// Whether the router terminates TLS.
	pub tls: bool,
}

impl Route {
	pub fn router_prefix(protocol: RouterProtocol, router: &str) -> String {
		format!("traefik.{protocol}.routers.{router}")
	}

	pub fn backend_prefix(protocol: RouterProtocol, router: &str) -> String {
		format!("traefik.{protocol}.services.{router}.loadbalancer.server")
	}

	/// Reads the router `router` from the labels of `service`. Missing labels give an empty route.
	pub fn decode(service: &ServiceState, protocol: RouterProtocol, router: &str) -> AppResult<Self> {
		let prefix = Self::router_prefix(protocol, router);
		let backend = Self::backend_prefix(protocol, router);

		let entrypoints = service
			.label(&format!("{prefix}.entryPoints"))
			.unwrap_or_default()
			.split(',')
			.filter(|e| !e.is_empty())
			.map(str::to_string)
			.collect();

		let rule = HostRule::decode(service.label(&format!("{prefix}.rule")));

		if let HostRule::Opaque(rule) = &rule {
			warn!(service = %service.name(), router, %rule, "router rule is not a host list");
		}

		let port = service
			.label(&format!("{backend}.port"))
			.map(|port| {
				port.parse::<u16>().map_err(|e| {
					AppError::malformed(
						service.name(),
						format!("router `{router}` has an invalid port `{port}`: {e}"),
					)
				})
			})
			.transpose()?;

		Ok(Self {
			protocol,
			router: router.to_string(),
			entrypoints,
			rule,
			port,
			scheme: service
				.label(&format!("{backend}.scheme"))
				.map(str::to_string),
			tls: service.label(&format!("{prefix}.tls")) == Some("true"),
		})
	}

	/// Replaces the host list, regenerating the rule even if the previous one was not a host list.
	pub fn set_hosts(&mut self, hosts: Vec<String>) {
		self.rule = HostRule::from_hosts(hosts);
	}

	/// Writes the route to the labels of `service`.
	pub fn encode(&self, service: &mut ServiceState) {
		let prefix = Self::router_prefix(self.protocol, &self.router);
		let backend = Self::backend_prefix(self.protocol, &self.router);

		let rule = self.rule.encode(self.protocol);

		service.ensure_label(ENABLE_LABEL, Some("true"));
		service.ensure_label(
			&format!("{prefix}.entryPoints"),
			Some(&self.entrypoints.join(",")),
		);
		service.ensure_label(&format!("{prefix}.service"), Some(&self.router));
		service.ensure_label(&format!("{prefix}.rule"), Some(&rule));

		if self.protocol == RouterProtocol::Http {
			// Hand-written rules keep whatever priority they were given
			if !self.rule.is_opaque() {
				let priority = self.rule.priority(self.protocol).to_string();
				service.ensure_label(&format!("{prefix}.priority"), Some(&priority));
			}

			service.ensure_label(&format!("{backend}.scheme"), self.scheme.as_deref());
		}

		let port = self.port.map(|port| port.to_string());
		service.ensure_label(&format!("{backend}.port"), port.as_deref());

		service.ensure_label(&format!("{prefix}.tls"), self.tls.then_some("true"));
	}
}
