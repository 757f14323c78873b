use indexmap::IndexMap;

/// The label holding the users of the basic-auth middleware that guards the dashboard.
pub const BASIC_AUTH_USERS_LABEL: &str = "traefik.http.middlewares.traefik-auth.basicauth.users";

/// The `user:hash` entries of a basic-auth middleware, in order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserList(IndexMap<String, String>);

fn split_entry(entry: &str) -> Result<(&str, &str), String> {
	match entry.split_once(':') {
		Some((user, hash)) if !user.is_empty() => Ok((user, hash)),
		_ => Err(format!("`{entry}` is not a `user:hash` pair")),
	}
}

impl UserList {
	/// Parses a comma-separated list. Only the first colon of an entry separates the user.
	pub fn decode(value: Option<&str>) -> Result<Self, String> {
		let mut users = IndexMap::new();

		for entry in value
			.unwrap_or_default()
			.split(',')
			.filter(|e| !e.is_empty())
		{
			let (user, hash) = split_entry(entry)?;
			users.insert(user.to_string(), hash.to_string());
		}

		Ok(Self(users))
	}

	/// Adds a `user:hash` entry, replacing the hash of an existing user.
	pub fn add(&mut self, entry: &str) -> Result<(), String> {
		let (user, hash) = split_entry(entry)?;

		self.0.insert(user.to_string(), hash.to_string());

		Ok(())
	}

	/// Removing an absent user is not an error.
	pub fn remove(&mut self, user: &str) -> bool {
		self.0.shift_remove(user).is_some()
	}

	pub fn users(&self) -> impl Iterator<Item = &str> {
		self.0.keys().map(String::as_str)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn encode(&self) -> String {
		self.0
			.iter()
			.map(|(user, hash)| format!("{user}:{hash}"))
			.collect::<Vec<_>>()
			.join(",")
	}

	/// The label value, absent for an empty list.
	pub fn label_value(&self) -> Option<String> {
		(!self.is_empty()).then(|| self.encode())
	}
}
