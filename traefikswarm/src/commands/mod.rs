//! The subcommands. Each one edits the services of a [`Session`] and leaves the preview and
//! apply steps to the caller.

use clap::Subcommand;

use crate::{Config, session::Session, *};

mod config;
pub use config::ConfigCommand;

mod expose;
pub use expose::ExposeCommand;

mod forwarder;
pub use forwarder::ForwarderCommand;

mod service;
pub use service::ServiceCommand;

mod unexpose;
pub use unexpose::UnexposeCommand;

pub(crate) mod parsers;

pub trait CommandHandler {
	fn execute(self, session: &mut Session<'_>, config: &Config) -> AppResult;
}

/// The cli commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
	/// Configures the traefik service.
	Config(ConfigCommand),

	/// Routes requests for some hosts to a port of a service.
	Expose(ExposeCommand),

	/// Removes every routing label of a service.
	Unexpose(UnexposeCommand),

	/// Edits the environment and arguments of a service.
	Service(ServiceCommand),

	/// Creates a service that forwards traffic to another host, inside or outside of docker.
	Forwarder(ForwarderCommand),
}

impl CommandHandler for Commands {
	fn execute(self, session: &mut Session<'_>, config: &Config) -> AppResult {
		match self {
			Self::Config(command) => command.execute(session, config),
			Self::Expose(command) => command.execute(session, config),
			Self::Unexpose(command) => command.execute(session, config),
			Self::Service(command) => command.execute(session, config),
			Self::Forwarder(command) => command.execute(session, config),
		}
	}
}

/// Turns a tri-state pair of `--flag`/`--no-flag` switches into an optional setting.
pub(crate) const fn toggle(on: bool, off: bool) -> Option<bool> {
	if on {
		Some(true)
	} else if off {
		Some(false)
	} else {
		None
	}
}

#[cfg(test)]
mod tests;
