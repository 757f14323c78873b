use std::{
	io::{self, Write},
	path::PathBuf,
};

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
	cluster::{ClusterRegistry, Target},
	commands::{CommandHandler, Commands},
	session::{Confirm, Outcome, Session, SessionOptions, StdinConfirm},
	*,
};

const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Parser, Debug, Clone)]
#[command(name = "traefikswarm", version, about = "Manage traefik serving a Docker Swarm")]
pub struct Cli {
	/// The target cluster: `tcp://HOST:PORT`, `http(s)://URL`, `file:PATH` or `memory`.
	#[arg(short = 'H', long, value_name = "HOST", env = "TRAEFIKSWARM_HOST")]
	pub host: Option<String>,

	/// The target stack [default: only services outside of any stack].
	#[arg(short = 'S', long = "stackname", value_name = "STACK")]
	pub stack: Option<String>,

	/// Creates the missing services and networks.
	#[arg(long)]
	pub init: bool,

	/// Applies the changes without asking.
	#[arg(long, conflicts_with = "preview")]
	pub commit: bool,

	/// Only shows the changes.
	#[arg(long)]
	pub preview: bool,

	/// Sets a custom config file.
	#[arg(short, long, value_name = "FILE", group = "config-file")]
	pub config: Option<PathBuf>,

	/// Ignores any config files, uses cli instructions only.
	#[arg(long, group = "config-file")]
	pub ignore_config: bool,

	/// Logs every change made to the services.
	#[arg(short, long)]
	pub verbose: bool,

	#[command(subcommand)]
	pub command: Commands,
}

impl Cli {
	/// The config file settings, with the cli flags on top.
	pub fn resolve_config(&self) -> AppResult<Config> {
		let mut config = Config::discover(self.config.as_deref(), self.ignore_config)?;

		if let Some(host) = &self.host {
			config.host = Some(host.clone());
		}

		if let Some(stack) = &self.stack {
			config.stack = Some(stack.clone());
		}

		if self.verbose {
			config.log_level = Some("debug".to_string());
		}

		Ok(config)
	}

	const fn options(&self) -> SessionOptions {
		SessionOptions {
			init: self.init,
			commit: self.commit,
			preview: self.preview,
		}
	}
}

/// Sends the logs to stderr. `RUST_LOG` overrides the configured level.
pub fn init_logging(level: Option<&str>) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(level.unwrap_or(DEFAULT_LOG_LEVEL)));

	// A subscriber may already be installed when running in tests
	let _ = tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(false)
				.with_writer(io::stderr),
		)
		.try_init();
}

pub fn main_entrypoint() -> AppResult<Outcome> {
	let cli = Cli::parse();
	let config = cli.resolve_config()?;

	init_logging(config.log_level.as_deref());

	execute_cli(
		cli,
		&config,
		&mut ClusterRegistry::new(),
		&mut StdinConfirm,
		&mut io::stdout(),
	)
}

/// Runs one command against the cluster selected by the config.
pub fn execute_cli(
	cli: Cli,
	config: &Config,
	registry: &mut ClusterRegistry,
	confirm: &mut dyn Confirm,
	out: &mut dyn Write,
) -> AppResult<Outcome> {
	let Some(host) = config.host.as_deref() else {
		bail_precondition!("No target cluster, use --host or set TRAEFIKSWARM_HOST");
	};

	let target: Target = host.parse()?;

	debug!(cluster = %target, stack = ?config.stack, "starting session");

	let cluster = registry.connect(&target)?;

	let mut session = Session::load(cluster, config.stack.clone(), cli.options())?;

	cli.command.execute(&mut session, config)?;

	session.apply_changes(confirm, out)
}
