use clap::Args;

use super::*;
use crate::image::ImageRef;

#[derive(Args, Debug, Clone)]
pub struct ForwarderCommand {
	/// The name of the forwarding service.
	#[arg(value_name = "NAME")]
	pub name: String,

	/// The host traffic is forwarded to.
	#[arg(value_name = "HOST")]
	pub host: String,

	/// The port traffic is forwarded to.
	#[arg(value_name = "PORT", default_value_t = 80)]
	pub port: u16,
}

impl CommandHandler for ForwarderCommand {
	fn execute(self, session: &mut Session<'_>, config: &Config) -> AppResult {
		let Self { name, host, port } = self;

		let image = ImageRef::parse(&config.forwarder_image);

		session
			.get_or_deploy_service(&name, &image, true)?
			.ensure_args(&[
				format!("TCP4-LISTEN:{port},fork"),
				format!("TCP4:{host}:{port}"),
			])
	}
}
