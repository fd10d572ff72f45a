//! Periodic cleanup run by the worker.

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use dagu_storage::{db::Db, queries};

/// Rows touched by each sweep step. `None` marks a step that failed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
	pub deactivated: Option<u64>,
	pub purged: Option<u64>,
	pub clicks_deleted: Option<u64>,
	pub cache_deleted: Option<u64>,
}
impl SweepReport {
	pub fn is_clean(&self) -> bool {
		self.deactivated.is_some()
			&& self.purged.is_some()
			&& self.clicks_deleted.is_some()
			&& self.cache_deleted.is_some()
	}
}

/// Runs every step even when an earlier one fails.
pub async fn run_sweep(
	db: &Db,
	cfg: &dagu_config::Maintenance,
	now: OffsetDateTime,
) -> SweepReport {
	let pool = &db.pool;
	let report = SweepReport {
		deactivated: step("expiry_sweep", queries::deactivate_expired_listings(pool, now).await),
		purged: step(
			"purge_inactive",
			queries::purge_inactive_listings(
				pool,
				now - Duration::days(cfg.purge_inactive_after_days),
			)
			.await,
		),
		clicks_deleted: step(
			"click_retention",
			queries::delete_clicks_before(pool, now - Duration::days(cfg.click_retention_days))
				.await,
		),
		cache_deleted: step("cache_cleanup", queries::delete_expired_cache(pool, now).await),
	};

	tracing::info!(
		deactivated = report.deactivated,
		purged = report.purged,
		clicks_deleted = report.clicks_deleted,
		cache_deleted = report.cache_deleted,
		"Maintenance sweep finished."
	);

	report
}

fn step(name: &'static str, result: dagu_storage::Result<u64>) -> Option<u64> {
	match result {
		Ok(count) => Some(count),
		Err(err) => {
			tracing::error!(error = %err, step = name, "Maintenance step failed.");

			None
		},
	}
}
