use std::time::Duration as StdDuration;

use time::OffsetDateTime;
use tokio::time as tokio_time;

use dagu_service::{SweepReport, maintenance};
use dagu_storage::db::Db;

const MIN_INTERVAL_SECONDS: u64 = 1;

pub struct WorkerState {
	pub db: Db,
	pub maintenance: dagu_config::Maintenance,
}

pub async fn run_worker(state: WorkerState) -> color_eyre::Result<()> {
	let interval = sweep_interval(&state.maintenance);

	tracing::info!(interval_seconds = interval.as_secs(), "Maintenance worker started.");

	loop {
		let report = sweep_once(&state).await;

		if !report.is_clean() {
			tracing::error!("Maintenance sweep finished with failed steps.");
		}

		tokio_time::sleep(interval).await;
	}
}

pub async fn sweep_once(state: &WorkerState) -> SweepReport {
	maintenance::run_sweep(&state.db, &state.maintenance, OffsetDateTime::now_utc()).await
}

fn sweep_interval(cfg: &dagu_config::Maintenance) -> StdDuration {
	StdDuration::from_secs(cfg.interval_seconds.max(MIN_INTERVAL_SECONDS))
}
