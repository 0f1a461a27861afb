use clap::{Arg, ArgMatches, Command};
use std::error::Error;
use std::path::PathBuf;

use replicr::logging::{self, *};
use replicr::{Action, ChangeEvent, Config, Orchestrator, SyncServer};
use tokio_util::sync::CancellationToken;

///////////////////////
// Utility functions //
///////////////////////

fn load_config(matches: &ArgMatches) -> Result<Config, Box<dyn Error>> {
	match matches.get_one::<String>("config") {
		Some(path) => Ok(Config::load(&PathBuf::from(path))?),
		None => Ok(Config::default()),
	}
}

/// Cancel `token` on Ctrl-C
fn cancel_on_interrupt(token: CancellationToken) {
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			warn!("Interrupted, cancelling pending work");
			token.cancel();
		}
	});
}

async fn serve(config: Config, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let mut server_config = config.server;
	if let Some(dir) = matches.get_one::<String>("dir") {
		server_config.root = PathBuf::from(dir);
	}
	if let Some(addr) = matches.get_one::<String>("addr") {
		server_config.addr = addr.clone();
	}
	let shutdown = CancellationToken::new();
	cancel_on_interrupt(shutdown.clone());
	SyncServer::new(&server_config).run(shutdown).await?;
	Ok(())
}

async fn push(config: Config) -> Result<(), Box<dyn Error>> {
	let orch = Orchestrator::from_config(&config)?;
	cancel_on_interrupt(orch.token());
	orch.connect().await?;

	let pending = orch.push_all().await?;
	let mut failed = 0usize;
	for wd in pending {
		if wd.wait_async().await.is_err() {
			failed += 1;
		}
	}
	let stats = orch.stats();
	eprintln!(
		"{} succeeded, {} skipped, {} failed, {} cancelled",
		stats.succeeded, stats.skipped, stats.failed, stats.cancelled
	);
	if failed > 0 {
		return Err(format!("{} entries failed to replicate", failed).into());
	}
	Ok(())
}

async fn apply(config: Config, matches: &ArgMatches) -> Result<(), Box<dyn Error>> {
	let action = Action::parse(matches.get_one::<String>("action").ok_or("apply: action required")?);
	let path = matches.get_one::<String>("path").ok_or("apply: path required")?;
	let event = match matches.get_one::<String>("new-path") {
		Some(new_path) if action == Action::Rename => ChangeEvent::rename(path.as_str(), new_path.as_str()),
		_ => ChangeEvent::new(path.as_str(), action),
	};

	let orch = Orchestrator::from_config(&config)?;
	cancel_on_interrupt(orch.token());
	orch.connect().await?;
	orch.dispatch(event).wait_async().await.map_err(|e| e.to_string())?;
	Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("replicr")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Replicate directory changes to local, remote, SFTP and S3 targets")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.global(true)
				.help("Configuration file (TOML or JSON5)"),
		)
		.subcommand(
			Command::new("serve")
				.about("Run the sync server")
				.arg(Arg::new("dir").long("dir").value_name("DIR").help("Directory to serve"))
				.arg(Arg::new("addr").long("addr").value_name("ADDR").help("Listen address")),
		)
		.subcommand(Command::new("push").about("Replicate the whole source tree to every target"))
		.subcommand(
			Command::new("apply")
				.about("Replicate a single change")
				.arg(Arg::new("action").required(true).help("Action number (1=create .. 5=chmod)"))
				.arg(Arg::new("path").required(true))
				.arg(Arg::new("new-path").help("Destination of a rename")),
		)
		.get_matches();

	let config = load_config(&matches)?;
	logging::init_tracing(&config.log_level);

	match matches.subcommand() {
		Some(("serve", sub)) => serve(config, sub).await,
		Some(("push", _)) => push(config).await,
		Some(("apply", sub)) => apply(config, sub).await,
		_ => Ok(()),
	}
}

// vim: ts=4
