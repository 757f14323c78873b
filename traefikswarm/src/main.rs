#![allow(clippy::result_large_err)]

use clap::{CommandFactory, error::ErrorKind};
use traefikswarm::cli::Cli;

fn main() {
	if let Err(e) = traefikswarm::cli::main_entrypoint() {
		let mut cmd = Cli::command();
		cmd.error(ErrorKind::InvalidValue, e).exit();
	}
}
