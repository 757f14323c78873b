/// An entry point to add, as given on the command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryPointSpec {
	pub name: String,
	pub port: Option<u16>,
	pub protocol: String,
}

/// Parses `name[=port[/protocol]]`.
pub fn parse_entrypoint_spec(s: &str) -> Result<EntryPointSpec, String> {
	let (name, address) = match s.split_once('=') {
		Some((name, address)) => (name, Some(address)),
		None => (s, None),
	};

	if name.is_empty() || name.contains(['.', ' ']) {
		return Err(format!("`{name}` is not a valid entry point name"));
	}

	let (port, protocol) = match address {
		Some(address) => {
			let (port, protocol) = address.split_once('/').unwrap_or((address, ""));

			let port = port
				.parse::<u16>()
				.map_err(|e| format!("Invalid port `{port}`: {e}"))?;

			(Some(port), protocol)
		}
		None => (None, ""),
	};

	Ok(EntryPointSpec {
		name: name.to_string(),
		port,
		protocol: protocol.to_string(),
	})
}

/// Parses `key=value`. The value may itself contain `=`.
pub fn parse_key_value_pair(s: &str) -> Result<(String, String), String> {
	match s.split_once('=') {
		Some((key, value)) if !key.trim().is_empty() => {
			Ok((key.trim().to_string(), value.to_string()))
		}
		_ => Err(format!(
			"Invalid key-value pair `{s}`. Only key-value pairs with '=' between them are allowed"
		)),
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn entrypoint_specs() {
		assert_eq!(
			parse_entrypoint_spec("https").unwrap(),
			EntryPointSpec {
				name: "https".to_string(),
				port: None,
				protocol: String::new(),
			}
		);

		assert_eq!(
			parse_entrypoint_spec("dns=53/udp").unwrap(),
			EntryPointSpec {
				name: "dns".to_string(),
				port: Some(53),
				protocol: "udp".to_string(),
			}
		);

		assert!(parse_entrypoint_spec("web=http").is_err());
		assert!(parse_entrypoint_spec("a.b=80").is_err());
		assert!(parse_entrypoint_spec("=80").is_err());
	}

	#[test]
	fn key_value_pairs() {
		assert_eq!(
			parse_key_value_pair("OPTS=-a=1").unwrap(),
			("OPTS".to_string(), "-a=1".to_string())
		);
		assert_eq!(
			parse_key_value_pair("EMPTY=").unwrap(),
			("EMPTY".to_string(), String::new())
		);
		assert!(parse_key_value_pair("NOVALUE").is_err());
	}
}
