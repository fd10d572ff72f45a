use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use dagu_config::{Maintenance, Postgres};
use dagu_service::{ListingStore, maintenance, pg::PgStore};
use dagu_storage::{
	db::Db,
	models::{NewInstrument, NewListing},
	queries,
};
use dagu_testkit::TestDatabase;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

async fn seed_listing(db: &Db, link: &str, expired_at: OffsetDateTime) -> Uuid {
	let now = OffsetDateTime::now_utc();
	let instrument = queries::upsert_instrument(
		&db.pool,
		&NewInstrument {
			instrument_id: Uuid::new_v4(),
			brand: "boss",
			name: "ds-1",
			category: "effect",
			reference_price: 99_000,
			image_url: None,
			brand_id: None,
			now,
		},
	)
	.await
	.expect("Failed to upsert instrument.");
	let listing = queries::insert_listing(
		&db.pool,
		&NewListing {
			listing_id: Uuid::new_v4(),
			instrument_id: instrument.instrument_id,
			price: 50_000,
			link,
			source: "bunjang",
			title: "boss ds-1",
			owner_id: Some("owner-a"),
			expired_at,
			now,
		},
	)
	.await
	.expect("Failed to insert listing.");

	listing.listing_id
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DAGU_PG_DSN to run."]
async fn sweep_deactivates_expired_and_clears_cache() {
	let Some(base_dsn) = dagu_testkit::env_dsn() else {
		eprintln!("Skipping sweep_deactivates_expired_and_clears_cache; set DAGU_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();
	let expired =
		seed_listing(&db, "https://m.bunjang.co.kr/products/1", now - Duration::hours(1)).await;
	let live =
		seed_listing(&db, "https://m.bunjang.co.kr/products/2", now + Duration::hours(1)).await;

	queries::cache_put(
		&db.pool,
		"stale",
		&serde_json::json!([]),
		now - Duration::hours(2),
		now - Duration::hours(1),
	)
	.await
	.expect("Failed to store cache row.");

	let cfg = Maintenance {
		interval_seconds: 60,
		purge_inactive_after_days: 30,
		click_retention_days: 7,
	};
	let report = maintenance::run_sweep(&db, &cfg, now).await;

	assert!(report.is_clean());
	assert_eq!(report.deactivated, Some(1));
	assert_eq!(report.cache_deleted, Some(1));

	let store = PgStore::new(db);
	let expired_row =
		store.get_listing(expired).await.expect("Query failed.").expect("Listing must exist.");
	let live_row =
		store.get_listing(live).await.expect("Query failed.").expect("Listing must exist.");

	assert!(!expired_row.is_active);
	assert!(live_row.is_active);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DAGU_PG_DSN to run."]
async fn click_is_counted_and_logged_once() {
	let Some(base_dsn) = dagu_testkit::env_dsn() else {
		eprintln!("Skipping click_is_counted_and_logged_once; set DAGU_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let now = OffsetDateTime::now_utc();
	let listing =
		seed_listing(&db, "https://m.bunjang.co.kr/products/3", now + Duration::hours(1)).await;
	let store = PgStore::new(db);
	let row = store
		.record_click(listing, now + Duration::hours(12), now)
		.await
		.expect("Click failed.")
		.expect("Listing must be visible.");

	assert_eq!(row.click_count, 1);
	assert!(row.expired_at > now + Duration::hours(11));

	let clicks: i64 =
		sqlx::query_scalar("SELECT count(*) FROM listing_clicks WHERE listing_id = $1")
			.bind(listing)
			.fetch_one(&store.db().pool)
			.await
			.expect("Failed to count clicks.");

	assert_eq!(clicks, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
