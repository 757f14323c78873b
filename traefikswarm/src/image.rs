use std::fmt::{self, Display};

/// A reference to an image, in the `name[:tag][@digest]` form.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct ImageRef {
	pub name: String,
	pub tag: Option<String>,
	pub digest: Option<String>,
}

impl ImageRef {
	pub fn parse(reference: &str) -> Self {
		let mut rest = reference;

		let digest = match rest.rfind('@') {
			Some(i) if i > 0 => {
				let digest = rest[i + 1..].to_string();
				rest = &rest[..i];
				Some(digest)
			}
			_ => None,
		};

		// A colon before the last slash belongs to a registry host, not a tag
		let tag = match rest.rfind(':') {
			Some(i) if i > 0 && !rest[i..].contains('/') => {
				let tag = rest[i + 1..].to_string();
				rest = &rest[..i];
				Some(tag)
			}
			_ => None,
		};

		Self {
			name: rest.to_string(),
			tag,
			digest,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.name.is_empty()
	}

	/// The reference without its digest, as used to find or pull the image.
	pub fn with_tag(&self) -> String {
		match &self.tag {
			Some(tag) => format!("{}:{tag}", self.name),
			None => self.name.clone(),
		}
	}
}

impl Display for ImageRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.with_tag())?;

		if let Some(digest) = &self.digest {
			write!(f, "@{digest}")?;
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn digest_and_tag() {
		let image = ImageRef::parse("traefik:2.2@sha256:0123abcd");

		assert_eq!(image.name, "traefik");
		assert_eq!(image.tag.as_deref(), Some("2.2"));
		assert_eq!(image.digest.as_deref(), Some("sha256:0123abcd"));
		assert_eq!(image.with_tag(), "traefik:2.2");
		assert_eq!(image.to_string(), "traefik:2.2@sha256:0123abcd");
	}

	#[test]
	fn registry_port_is_not_a_tag() {
		let image = ImageRef::parse("registry.local:5000/tools/socat");

		assert_eq!(image.name, "registry.local:5000/tools/socat");
		assert_eq!(image.tag, None);
		assert_eq!(image.to_string(), "registry.local:5000/tools/socat");
	}

	#[test]
	fn bare_name() {
		let image = ImageRef::parse("alpine/socat");

		assert_eq!(image.tag, None);
		assert_eq!(image.digest, None);
		assert_eq!(image.with_tag(), "alpine/socat");
	}
}
