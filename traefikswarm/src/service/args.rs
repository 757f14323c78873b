use indexmap::IndexMap;

/// The process arguments of a service, as an ordered `flag -> value` map.
///
/// A flag without a value (`--api`) is distinct from a flag with an empty value (`--api=`), and
/// both are distinct from an absent flag. Updating an existing flag keeps its position, new flags
/// are appended.
#[derive(Clone, Debug, Default, Eq)]
pub struct ArgList(IndexMap<String, Option<String>>);

impl PartialEq for ArgList {
	// Argument order is significant, unlike the default map equality
	fn eq(&self, other: &Self) -> bool {
		self.0.len() == other.0.len() && self.0.iter().eq(other.0.iter())
	}
}

impl ArgList {
	/// Splits every entry at its first `=`.
	pub fn parse<I, S>(args: I) -> Result<Self, String>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut list = IndexMap::new();

		for arg in args {
			let arg = arg.as_ref();

			let (flag, value) = match arg.split_once('=') {
				Some((flag, value)) => (flag, Some(value.to_string())),
				None => (arg, None),
			};

			if flag.is_empty() {
				return Err(format!("the argument `{arg}` has no flag before its value"));
			}

			list.insert(flag.to_string(), value);
		}

		Ok(Self(list))
	}

	pub fn emit(&self) -> Vec<String> {
		self.0
			.iter()
			.map(|(flag, value)| match value {
				Some(value) => format!("{flag}={value}"),
				None => flag.clone(),
			})
			.collect()
	}

	/// `None` if the flag is absent, `Some(None)` if it is present without a value.
	pub fn get(&self, flag: &str) -> Option<Option<&str>> {
		self.0.get(flag).map(Option::as_deref)
	}

	pub fn contains(&self, flag: &str) -> bool {
		self.0.contains_key(flag)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
		self.0
			.iter()
			.map(|(flag, value)| (flag.as_str(), value.as_deref()))
	}

	/// Flags equal to `prefix` or continuing it after a delimiter.
	pub fn flags_under(&self, prefix: &str) -> Vec<String> {
		self.0
			.keys()
			.filter(|flag| is_under_prefix(flag, prefix))
			.cloned()
			.collect()
	}

	/// Returns true if the list changed.
	pub(crate) fn set(&mut self, flag: &str, value: Option<&str>) -> bool {
		if self.get(flag) == Some(value) {
			return false;
		}

		self.0
			.insert(flag.to_string(), value.map(str::to_string));
		true
	}

	/// Returns true if the flag was present.
	pub(crate) fn remove(&mut self, flag: &str) -> bool {
		self.0.shift_remove(flag).is_some()
	}
}

impl<'a> IntoIterator for &'a ArgList {
	type Item = (&'a String, &'a Option<String>);
	type IntoIter = indexmap::map::Iter<'a, String, Option<String>>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}

/// Whether `key` is `prefix` itself or a key nested below it.
///
/// The character following the prefix must not be alphanumeric, so `--api` covers
/// `--api.dashboard` but not `--apikey`.
pub fn is_under_prefix(key: &str, prefix: &str) -> bool {
	match key.strip_prefix(prefix) {
		Some("") => true,
		Some(rest) => rest
			.chars()
			.next()
			.is_some_and(|c| !c.is_alphanumeric()),
		None => false,
	}
}
