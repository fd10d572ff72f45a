pub mod worker;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use dagu_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = dagu_cli::VERSION,
	rename_all = "kebab",
	styles = dagu_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Run a single sweep and exit.
	#[arg(long)]
	pub once: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = dagu_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let state = worker::WorkerState { db, maintenance: config.maintenance };

	if args.once {
		worker::sweep_once(&state).await;

		return Ok(());
	}

	worker::run_worker(state).await
}
