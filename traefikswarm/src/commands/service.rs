use clap::Args;

use super::{parsers::parse_key_value_pair, *};

#[derive(Args, Debug, Clone)]
pub struct ServiceCommand {
	/// The service to modify.
	#[arg(value_name = "SERVICE")]
	pub service: String,

	/// Environment variable to set.
	#[arg(long, value_name = "NAME=VALUE", value_parser = parse_key_value_pair)]
	pub env_add: Vec<(String, String)>,

	/// Environment variable to remove.
	#[arg(long, value_name = "NAME")]
	pub env_rm: Vec<String>,

	/// Argument to add, without the leading dashes.
	#[arg(long, value_name = "FLAG[=VALUE]")]
	pub arg_add: Vec<String>,

	/// Argument to remove, without the leading dashes.
	#[arg(long, value_name = "FLAG")]
	pub arg_rm: Vec<String>,
}

impl CommandHandler for ServiceCommand {
	fn execute(self, session: &mut Session<'_>, _: &Config) -> AppResult {
		let service = session.find_service(&self.service)?;

		for name in &self.env_rm {
			service.remove_env(name);
		}

		for (name, value) in &self.env_add {
			service.ensure_env(name, value);
		}

		for arg in &self.arg_rm {
			service.remove_arg(&format!("--{arg}"));
		}

		for arg in &self.arg_add {
			match arg.split_once('=') {
				Some((flag, value)) => service.ensure_arg(&format!("--{flag}"), Some(value)),
				None => service.ensure_arg(&format!("--{arg}"), None),
			}
		}

		Ok(())
	}
}
