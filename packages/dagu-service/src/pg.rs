//! Postgres-backed implementations of the store seams.

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use dagu_storage::{
	db::Db,
	models::{
		BrandRow, InstrumentFilter, InstrumentRow, ListingFilter, ListingRow, NewBrand,
		NewInstrument, NewListing, PricedListingRow, ReportCounts, ReportState, VisibleListingRow,
	},
	queries,
};

use crate::{BoxFuture, CatalogStore, ListingStore, PayloadCache, Result, SearchLog};

pub struct PgStore {
	db: Db,
}
impl PgStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}

	pub fn db(&self) -> &Db {
		&self.db
	}
}

impl CatalogStore for PgStore {
	fn instrument_candidates<'a>(
		&'a self,
		patterns: &'a [String],
		brand: Option<&'a str>,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<InstrumentRow>>> {
		Box::pin(async move {
			Ok(queries::instrument_candidates(&self.db.pool, patterns, brand, limit).await?)
		})
	}

	fn get_instrument<'a>(
		&'a self,
		instrument_id: Uuid,
	) -> BoxFuture<'a, Result<Option<InstrumentRow>>> {
		Box::pin(async move { Ok(queries::get_instrument(&self.db.pool, instrument_id).await?) })
	}

	fn find_instrument<'a>(
		&'a self,
		brand: &'a str,
		name: &'a str,
	) -> BoxFuture<'a, Result<Option<InstrumentRow>>> {
		Box::pin(async move { Ok(queries::find_instrument(&self.db.pool, brand, name).await?) })
	}

	fn list_instruments<'a>(
		&'a self,
		filter: &'a InstrumentFilter<'a>,
		limit: i64,
		offset: i64,
	) -> BoxFuture<'a, Result<Vec<InstrumentRow>>> {
		Box::pin(async move {
			Ok(queries::list_instruments(&self.db.pool, filter, limit, offset).await?)
		})
	}

	fn delete_instrument<'a>(&'a self, instrument_id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			Ok(queries::delete_instrument(&self.db.pool, instrument_id).await?)
		})
	}

	fn upsert_instrument<'a>(
		&'a self,
		instrument: &'a NewInstrument<'a>,
	) -> BoxFuture<'a, Result<InstrumentRow>> {
		Box::pin(async move { Ok(queries::upsert_instrument(&self.db.pool, instrument).await?) })
	}

	fn upsert_brand<'a>(&'a self, brand: &'a NewBrand<'a>) -> BoxFuture<'a, Result<BrandRow>> {
		Box::pin(async move { Ok(queries::upsert_brand(&self.db.pool, brand).await?) })
	}

	fn brand_id<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, Result<Option<Uuid>>> {
		Box::pin(async move { Ok(queries::find_brand_id(&self.db.pool, slug).await?) })
	}
}

impl ListingStore for PgStore {
	fn visible_listings<'a>(
		&'a self,
		instrument_ids: &'a [Uuid],
		patterns: &'a [String],
		now: OffsetDateTime,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<VisibleListingRow>>> {
		Box::pin(async move {
			let pool = &self.db.pool;

			Ok(queries::visible_listings(pool, instrument_ids, patterns, now, limit).await?)
		})
	}

	fn list_visible<'a>(
		&'a self,
		filter: &'a ListingFilter<'a>,
		now: OffsetDateTime,
		limit: i64,
		offset: i64,
	) -> BoxFuture<'a, Result<Vec<PricedListingRow>>> {
		Box::pin(async move {
			let pool = &self.db.pool;

			Ok(queries::list_visible_listings(pool, filter, now, limit, offset).await?)
		})
	}

	fn get_visible<'a>(
		&'a self,
		listing_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<PricedListingRow>>> {
		Box::pin(async move {
			Ok(queries::get_visible_listing(&self.db.pool, listing_id, now).await?)
		})
	}

	fn find_active_by_link<'a>(&'a self, link: &'a str) -> BoxFuture<'a, Result<Option<Uuid>>> {
		Box::pin(async move {
			Ok(queries::find_active_listing_by_link(&self.db.pool, link).await?)
		})
	}

	fn insert_listing<'a>(
		&'a self,
		listing: &'a NewListing<'a>,
	) -> BoxFuture<'a, Result<ListingRow>> {
		Box::pin(async move { Ok(queries::insert_listing(&self.db.pool, listing).await?) })
	}

	fn get_listing<'a>(&'a self, listing_id: Uuid) -> BoxFuture<'a, Result<Option<ListingRow>>> {
		Box::pin(async move { Ok(queries::get_listing(&self.db.pool, listing_id).await?) })
	}

	fn record_click<'a>(
		&'a self,
		listing_id: Uuid,
		expired_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>> {
		Box::pin(async move {
			let mut tx = self.db.pool.begin().await?;
			let row = queries::record_click(&mut *tx, listing_id, expired_at, now).await?;

			if row.is_some() {
				queries::insert_click(&mut *tx, listing_id, now).await?;
			}

			tx.commit().await?;

			Ok(row)
		})
	}

	fn renew_listing<'a>(
		&'a self,
		listing_id: Uuid,
		expired_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>> {
		Box::pin(async move {
			Ok(queries::renew_listing(&self.db.pool, listing_id, expired_at, now).await?)
		})
	}

	fn update_price<'a>(
		&'a self,
		listing_id: Uuid,
		price: i64,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>> {
		Box::pin(async move {
			Ok(queries::update_listing_price(&self.db.pool, listing_id, price, now).await?)
		})
	}

	fn deactivate_listing<'a>(
		&'a self,
		listing_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>> {
		Box::pin(async move {
			Ok(queries::deactivate_listing(&self.db.pool, listing_id, now).await?)
		})
	}

	fn add_report<'a>(
		&'a self,
		listing_id: Uuid,
		reason: &'a str,
		reporter_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			Ok(queries::insert_report(&self.db.pool, listing_id, reason, reporter_key, now).await?)
		})
	}

	fn report_counts<'a>(&'a self, listing_id: Uuid) -> BoxFuture<'a, Result<ReportCounts>> {
		Box::pin(async move { Ok(queries::report_counts(&self.db.pool, listing_id).await?) })
	}

	fn set_report_state<'a>(
		&'a self,
		listing_id: Uuid,
		state: ReportState,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>> {
		Box::pin(async move {
			Ok(queries::set_report_state(&self.db.pool, listing_id, state, now).await?)
		})
	}
}

impl SearchLog for PgStore {
	fn track_search<'a>(
		&'a self,
		query_key: &'a str,
		display_query: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			Ok(queries::track_search(&self.db.pool, query_key, display_query, now).await?)
		})
	}

	fn record_miss<'a>(
		&'a self,
		normalized_query: &'a str,
		sample_query: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			Ok(queries::record_miss(&self.db.pool, normalized_query, sample_query, now).await?)
		})
	}

	fn popular_terms<'a>(
		&'a self,
		since: OffsetDateTime,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<(String, i64)>>> {
		Box::pin(async move { Ok(queries::popular_terms(&self.db.pool, since, limit).await?) })
	}

	fn most_clicked_instruments<'a>(
		&'a self,
		since: OffsetDateTime,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<(String, i64)>>> {
		Box::pin(async move {
			Ok(queries::most_clicked_instruments(&self.db.pool, since, limit).await?)
		})
	}
}

impl PayloadCache for PgStore {
	fn get<'a>(
		&'a self,
		key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<Value>>> {
		Box::pin(async move { Ok(queries::cache_get(&self.db.pool, key, now).await?) })
	}

	fn put<'a>(
		&'a self,
		key: &'a str,
		payload: &'a Value,
		now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			Ok(queries::cache_put(&self.db.pool, key, payload, now, expires_at).await?)
		})
	}
}
