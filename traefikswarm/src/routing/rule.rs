use std::fmt::{self, Display};

/// The kind of traffic a router handles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RouterProtocol {
	#[default]
	Http,
	Tcp,
}

impl RouterProtocol {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Http => "http",
			Self::Tcp => "tcp",
		}
	}

	const fn catch_all(self) -> &'static str {
		match self {
			Self::Http => "PathPrefix(`/`)",
			Self::Tcp => "HostSNI(`*`)",
		}
	}

	const fn matcher(self, wildcard: bool) -> &'static str {
		match (self, wildcard) {
			(Self::Http, false) => "Host",
			(Self::Http, true) => "HostRegexp",
			(Self::Tcp, false) => "HostSNI",
			(Self::Tcp, true) => "HostSNIRegexp",
		}
	}
}

impl Display for RouterProtocol {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What a `*` in a host stands for in the regexp matchers.
pub const WILDCARD_PLACEHOLDER: &str = "{domain:.+}";

// Checked in order. Regexp matchers first since they share a prefix with the exact ones.
const HOST_MATCHERS: [(&str, bool); 4] = [
	("HostSNIRegexp", true),
	("HostRegexp", true),
	("HostSNI", false),
	("Host", false),
];

const CATCH_ALL_RULES: [&str; 2] = ["PathPrefix(`/`)", "HostSNI(`*`)"];

/// The host matching part of a router.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostRule {
	/// Matches every request.
	CatchAll,
	/// Matches a list of hosts. Hosts may contain `*` when `wildcard` is set.
	Hosts { hosts: Vec<String>, wildcard: bool },
	/// A rule written by hand, kept as it is.
	Opaque(String),
}

impl HostRule {
	/// Recognizes the rules written by [`HostRule::encode`]. An absent rule is a catch-all.
	pub fn decode(rule: Option<&str>) -> Self {
		let Some(rule) = rule else {
			return Self::CatchAll;
		};

		if CATCH_ALL_RULES.contains(&rule) {
			return Self::CatchAll;
		}

		for (matcher, wildcard) in HOST_MATCHERS {
			let Some(inner) = rule
				.strip_prefix(matcher)
				.and_then(|r| r.strip_prefix("(`"))
				.and_then(|r| r.strip_suffix("`)"))
			else {
				continue;
			};

			let hosts: Vec<String> = inner
				.split("`,`")
				.map(|host| {
					if wildcard {
						host.replace(WILDCARD_PLACEHOLDER, "*")
					} else {
						host.to_string()
					}
				})
				.collect();

			// Anything beyond a plain host list is a combined rule
			if hosts.iter().any(|h| h.is_empty() || h.contains('`')) {
				break;
			}

			return Self::Hosts { hosts, wildcard };
		}

		Self::Opaque(rule.to_string())
	}

	/// A catch-all for an empty list, a wildcard rule if any host contains `*`.
	pub fn from_hosts(hosts: Vec<String>) -> Self {
		if hosts.is_empty() {
			Self::CatchAll
		} else {
			let wildcard = hosts.iter().any(|h| h.contains('*'));
			Self::Hosts { hosts, wildcard }
		}
	}

	pub fn hosts(&self) -> &[String] {
		match self {
			Self::Hosts { hosts, .. } => hosts,
			_ => &[],
		}
	}

	pub const fn is_wildcard(&self) -> bool {
		matches!(self, Self::Hosts { wildcard: true, .. })
	}

	pub const fn is_opaque(&self) -> bool {
		matches!(self, Self::Opaque(_))
	}

	pub fn encode(&self, protocol: RouterProtocol) -> String {
		match self {
			Self::CatchAll => protocol.catch_all().to_string(),
			Self::Opaque(rule) => rule.clone(),
			Self::Hosts { hosts, wildcard } => {
				let hosts: Vec<String> = hosts
					.iter()
					.map(|host| {
						if *wildcard {
							host.replace('*', WILDCARD_PLACEHOLDER)
						} else {
							host.clone()
						}
					})
					.collect();

				format!("{}(`{}`)", protocol.matcher(*wildcard), hosts.join("`,`"))
			}
		}
	}

	/// Longer rules win, and exact host rules always beat wildcard ones of similar length.
	pub fn priority(&self, protocol: RouterProtocol) -> usize {
		let bonus = if self.is_wildcard() { 0 } else { 100 };

		self.encode(protocol).len() + bonus
	}
}
