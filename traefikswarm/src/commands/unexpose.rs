use clap::Args;

use super::*;
use crate::service::ROUTING_LABEL_NAMESPACE;

#[derive(Args, Debug, Clone)]
pub struct UnexposeCommand {
	/// The service to un-expose.
	#[arg(value_name = "SERVICE")]
	pub service: String,
}

impl CommandHandler for UnexposeCommand {
	fn execute(self, session: &mut Session<'_>, _: &Config) -> AppResult {
		session
			.find_service(&self.service)?
			.remove_labels_by_prefix(ROUTING_LABEL_NAMESPACE);

		Ok(())
	}
}
