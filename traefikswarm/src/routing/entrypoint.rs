use std::{
	fmt::{self, Display},
	str::FromStr,
};

use indexmap::IndexMap;
use swarm_service_config::PortProtocol;

use crate::{
	service::{PortMatch, ServiceState},
	*,
};

/// The prefix of the proxy arguments that define entry points.
pub const ENTRYPOINT_ARG_PREFIX: &str = "--entrypoints.";

const ADDRESS: &str = "address";
const TLS: &str = "http.tls";
const CERT_RESOLVER: &str = "http.tls.certResolver";
const DOMAINS_MAIN: &str = "http.tls.domains[0].main";
const DOMAINS_SANS: &str = "http.tls.domains[0].sans";
const REDIRECT_TO: &str = "http.redirections.entryPoint.to";
const REDIRECT_SCHEME: &str = "http.redirections.entryPoint.scheme";

/// The certificate resolver configured by the `config` command.
pub const ACME_RESOLVER: &str = "acme";

/// A listen address, as `[host]:port[/protocol]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
	pub host: String,
	pub port: u16,
	/// Empty for the default (tcp).
	pub protocol: String,
}

impl FromStr for Address {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (host, rest) = s
			.rsplit_once(':')
			.ok_or_else(|| format!("the address `{s}` has no port"))?;

		let (port, protocol) = rest.split_once('/').unwrap_or((rest, ""));

		let port = port
			.parse()
			.map_err(|e| format!("the address `{s}` has an invalid port: {e}"))?;

		Ok(Self {
			host: host.to_string(),
			port,
			protocol: protocol.to_string(),
		})
	}
}

impl Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.host, self.port)?;

		if !self.protocol.is_empty() {
			write!(f, "/{}", self.protocol)?;
		}

		Ok(())
	}
}

impl Address {
	pub fn port_protocol(&self) -> PortProtocol {
		match self.protocol.as_str() {
			"udp" => PortProtocol::Udp,
			"sctp" => PortProtocol::Sctp,
			_ => PortProtocol::Tcp,
		}
	}
}

/// Where an entry point redirects its requests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redirect {
	pub entrypoint: String,
	pub scheme: Option<String>,
}

/// A listening endpoint of the proxy, as the settings found under `--entrypoints.<name>.`.
///
/// Settings are kept in the order of the arguments they came from, including the ones without a
/// typed accessor, so that encoding a decoded entry point reproduces its arguments.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EntryPoint {
	settings: IndexMap<String, Option<String>>,
}

impl EntryPoint {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn setting(&self, key: &str) -> Option<Option<&str>> {
		self.settings.get(key).map(Option::as_deref)
	}

	pub fn set(&mut self, key: &str, value: Option<&str>) {
		self.settings
			.insert(key.to_string(), value.map(str::to_string));
	}

	pub fn unset(&mut self, key: &str) {
		self.settings.shift_remove(key);
	}

	pub fn is_empty(&self) -> bool {
		self.settings.is_empty()
	}

	/// The listen address. Absent addresses are `Ok(None)`.
	pub fn address(&self) -> Result<Option<Address>, String> {
		self.setting(ADDRESS)
			.flatten()
			.map(str::parse)
			.transpose()
	}

	pub fn port(&self) -> Option<u16> {
		self.address().ok().flatten().map(|a| a.port)
	}

	/// Changes the port, keeping the host and protocol of an existing address.
	pub fn set_port(&mut self, port: u16) {
		let address = match self.address() {
			Ok(Some(address)) => Address { port, ..address },
			_ => Address {
				host: String::new(),
				port,
				protocol: String::new(),
			},
		};

		self.set(ADDRESS, Some(&address.to_string()));
	}

	/// The transport protocol, empty for tcp. `None` without an address.
	pub fn protocol(&self) -> Option<String> {
		self.address().ok().flatten().map(|a| a.protocol)
	}

	pub fn set_protocol(&mut self, protocol: &str) {
		let address = match self.address() {
			Ok(Some(address)) => Address {
				protocol: protocol.to_string(),
				..address
			},
			_ => Address {
				host: String::new(),
				port: 0,
				protocol: protocol.to_string(),
			},
		};

		self.set(ADDRESS, Some(&address.to_string()));
	}

	/// Whether TLS is enabled. The value of the setting is irrelevant.
	pub fn tls(&self) -> bool {
		self.settings.contains_key(TLS)
	}

	pub fn set_tls(&mut self, enabled: bool) {
		if enabled {
			// An existing value is kept as it is
			if !self.tls() {
				self.set(TLS, None);
			}
		} else {
			self.unset(TLS);
		}
	}

	pub fn acme(&self) -> bool {
		self.setting(CERT_RESOLVER) == Some(Some(ACME_RESOLVER))
	}

	/// Enables the ACME resolver. Disabling only removes a resolver that was the ACME one.
	pub fn set_acme(&mut self, enabled: bool) {
		if enabled {
			self.set(CERT_RESOLVER, Some(ACME_RESOLVER));
		} else if self.acme() {
			self.unset(CERT_RESOLVER);
		}
	}

	/// The main domain followed by the alternate names.
	pub fn acme_domains(&self) -> Vec<String> {
		let mut domains: Vec<String> = self
			.setting(DOMAINS_MAIN)
			.flatten()
			.filter(|main| !main.is_empty())
			.map(str::to_string)
			.into_iter()
			.collect();

		if let Some(sans) = self.setting(DOMAINS_SANS).flatten() {
			domains.extend(
				sans.split(',')
					.filter(|s| !s.is_empty())
					.map(str::to_string),
			);
		}

		domains
	}

	pub fn set_acme_domains(&mut self, domains: &[String]) {
		match domains.split_first() {
			Some((main, sans)) => {
				self.set(DOMAINS_MAIN, Some(main));

				if sans.is_empty() {
					self.unset(DOMAINS_SANS);
				} else {
					self.set(DOMAINS_SANS, Some(&sans.join(",")));
				}
			}
			None => {
				self.unset(DOMAINS_MAIN);
				self.unset(DOMAINS_SANS);
			}
		}
	}

	pub fn redirect(&self) -> Option<Redirect> {
		self.setting(REDIRECT_TO)
			.flatten()
			.map(|to| Redirect {
				entrypoint: to.to_string(),
				scheme: self
					.setting(REDIRECT_SCHEME)
					.flatten()
					.map(str::to_string),
			})
	}

	pub fn redirect_to(&mut self, entrypoint: &str, scheme: &str) {
		self.set(REDIRECT_TO, Some(entrypoint));
		self.set(REDIRECT_SCHEME, Some(scheme));
	}

	pub fn remove_redirect(&mut self) {
		self.unset(REDIRECT_TO);
		self.unset(REDIRECT_SCHEME);
	}

	/// Writes this entry point to the arguments of `service`.
	///
	/// Existing arguments are updated where they are, new ones are appended and the ones that are
	/// no longer wanted are removed. The listen port is published on the swarm, and a port
	/// published for a previous address is withdrawn.
	pub fn update(&self, service: &mut ServiceState, name: &str) {
		let mut desired = self.settings.clone();

		// Domains are only meaningful for the ACME resolver
		if !self.acme() {
			desired.shift_remove(DOMAINS_MAIN);
			desired.shift_remove(DOMAINS_SANS);
		}

		let base = format!("{ENTRYPOINT_ARG_PREFIX}{name}");

		let previous = service
			.args()
			.get(&setting_flag(&base, ADDRESS))
			.flatten()
			.and_then(|address| address.parse::<Address>().ok())
			.map(|address| port_selector(&address));

		let existing: Vec<(String, String)> = service
			.args()
			.iter()
			.filter_map(|(flag, _)| Some((flag.to_string(), setting_key(flag, &base)?.to_string())))
			.collect();

		for (flag, key) in existing {
			match desired.shift_remove(&key) {
				Some(value) => service.ensure_arg(&flag, value.as_deref()),
				None => service.remove_arg(&flag),
			}
		}

		for (key, value) in &desired {
			service.ensure_arg(&setting_flag(&base, key), value.as_deref());
		}

		let current = self.address().ok().flatten().map(|address| port_selector(&address));

		if let Some((_, selector)) = previous
			&& current.is_none_or(|(_, current)| current != selector)
		{
			service.remove_port(selector);
		}

		if let Some((port, selector)) = current {
			service.ensure_port(port, selector);
		}
	}

	/// Removes every argument of this entry point and unpublishes its port.
	pub fn remove(&mut self, service: &mut ServiceState, name: &str) {
		self.settings.clear();
		self.update(service, name);
	}
}

fn port_selector(address: &Address) -> (u16, PortMatch) {
	(
		address.port,
		PortMatch::target(address.port).with_protocol(address.port_protocol()),
	)
}

/// The argument holding `key`. The empty key is the bare `--entrypoints.<name>` flag.
fn setting_flag(base: &str, key: &str) -> String {
	if key.is_empty() {
		base.to_string()
	} else {
		format!("{base}.{key}")
	}
}

/// The inverse of [`setting_flag`], `None` for the flags of other entry points.
fn setting_key<'f>(flag: &'f str, base: &str) -> Option<&'f str> {
	match flag.strip_prefix(base)? {
		"" => Some(""),
		rest => rest.strip_prefix('.'),
	}
}

/// Groups the `--entrypoints.<name>.<key>` arguments of `service` by entry point name.
pub fn decode_entrypoints(service: &ServiceState) -> AppResult<IndexMap<String, EntryPoint>> {
	let mut entrypoints: IndexMap<String, EntryPoint> = IndexMap::new();

	for (flag, value) in service.args().iter() {
		let Some(rest) = flag.strip_prefix(ENTRYPOINT_ARG_PREFIX) else {
			continue;
		};

		// A bare `--entrypoints.<name>` is kept under the empty key
		let (name, key) = rest.split_once('.').unwrap_or((rest, ""));

		if name.is_empty() {
			return Err(AppError::malformed(
				service.name(),
				format!("the argument `{flag}` has no entry point name"),
			));
		}

		entrypoints
			.entry(name.to_string())
			.or_default()
			.set(key, value);
	}

	for (name, entrypoint) in &entrypoints {
		entrypoint.address().map_err(|detail| {
			AppError::malformed(service.name(), format!("entry point `{name}`: {detail}"))
		})?;
	}

	Ok(entrypoints)
}
