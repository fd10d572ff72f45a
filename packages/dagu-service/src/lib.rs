pub mod admin;
pub mod browse;
pub mod catalog;
pub mod import;
pub mod listings;
pub mod maintenance;
pub mod pg;
pub mod search;
pub mod shopping;
pub mod time_serde;
pub mod tracking;

mod error;

pub use admin::{
	BrandResponse, InstrumentResponse, LexiconReloadResponse, UpsertBrandRequest,
	UpsertInstrumentRequest,
};
pub use browse::{InstrumentPage, InstrumentQuery, ListingPage, ListingQuery};
pub use error::{Error, Result};
pub use import::{ImportInstrumentsRequest, ImportPrice, ImportReport, ImportRow, ImportRowError};
pub use listings::{
	CreateListingRequest, ListingResponse, OwnerRequest, ReportRequest, ReportResponse,
	UpdatePriceRequest,
};
pub use maintenance::SweepReport;
pub use search::{ItemOrigin, ReferenceInfo, SearchItem, SearchRequest, SearchResponse};
pub use tracking::{PopularSearch, PopularSearchesResponse};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use dagu_config::Config;
use dagu_domain::{ExternalResultItem, LexiconHandle};
use dagu_storage::{
	db::Db,
	models::{
		BrandRow, InstrumentFilter, InstrumentRow, ListingFilter, ListingRow, NewBrand,
		NewInstrument, NewListing, PricedListingRow, ReportCounts, ReportState, VisibleListingRow,
	},
};

use crate::pg::PgStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read and admin access to catalog entries and brands.
pub trait CatalogStore
where
	Self: Send + Sync,
{
	fn instrument_candidates<'a>(
		&'a self,
		patterns: &'a [String],
		brand: Option<&'a str>,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<InstrumentRow>>>;

	fn get_instrument<'a>(
		&'a self,
		instrument_id: Uuid,
	) -> BoxFuture<'a, Result<Option<InstrumentRow>>>;

	fn find_instrument<'a>(
		&'a self,
		brand: &'a str,
		name: &'a str,
	) -> BoxFuture<'a, Result<Option<InstrumentRow>>>;

	fn list_instruments<'a>(
		&'a self,
		filter: &'a InstrumentFilter<'a>,
		limit: i64,
		offset: i64,
	) -> BoxFuture<'a, Result<Vec<InstrumentRow>>>;

	/// `false` when no entry had this id.
	fn delete_instrument<'a>(&'a self, instrument_id: Uuid) -> BoxFuture<'a, Result<bool>>;

	fn upsert_instrument<'a>(
		&'a self,
		instrument: &'a NewInstrument<'a>,
	) -> BoxFuture<'a, Result<InstrumentRow>>;

	fn upsert_brand<'a>(&'a self, brand: &'a NewBrand<'a>) -> BoxFuture<'a, Result<BrandRow>>;

	fn brand_id<'a>(&'a self, slug: &'a str) -> BoxFuture<'a, Result<Option<Uuid>>>;
}

/// User-submitted listings and their counters.
pub trait ListingStore
where
	Self: Send + Sync,
{
	fn visible_listings<'a>(
		&'a self,
		instrument_ids: &'a [Uuid],
		patterns: &'a [String],
		now: OffsetDateTime,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<VisibleListingRow>>>;

	fn list_visible<'a>(
		&'a self,
		filter: &'a ListingFilter<'a>,
		now: OffsetDateTime,
		limit: i64,
		offset: i64,
	) -> BoxFuture<'a, Result<Vec<PricedListingRow>>>;

	fn get_visible<'a>(
		&'a self,
		listing_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<PricedListingRow>>>;

	fn find_active_by_link<'a>(&'a self, link: &'a str) -> BoxFuture<'a, Result<Option<Uuid>>>;

	fn insert_listing<'a>(
		&'a self,
		listing: &'a NewListing<'a>,
	) -> BoxFuture<'a, Result<ListingRow>>;

	fn get_listing<'a>(&'a self, listing_id: Uuid) -> BoxFuture<'a, Result<Option<ListingRow>>>;

	/// Counts one click and extends expiry. `None` when the listing is not visible.
	fn record_click<'a>(
		&'a self,
		listing_id: Uuid,
		expired_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>>;

	fn renew_listing<'a>(
		&'a self,
		listing_id: Uuid,
		expired_at: OffsetDateTime,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>>;

	fn update_price<'a>(
		&'a self,
		listing_id: Uuid,
		price: i64,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>>;

	fn deactivate_listing<'a>(
		&'a self,
		listing_id: Uuid,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>>;

	/// Stores a report. `false` when this reporter already reported the listing.
	fn add_report<'a>(
		&'a self,
		listing_id: Uuid,
		reason: &'a str,
		reporter_key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<bool>>;

	fn report_counts<'a>(&'a self, listing_id: Uuid) -> BoxFuture<'a, Result<ReportCounts>>;

	fn set_report_state<'a>(
		&'a self,
		listing_id: Uuid,
		state: ReportState,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<ListingRow>>>;
}

/// Search counters. Writes are atomic increments.
pub trait SearchLog
where
	Self: Send + Sync,
{
	fn track_search<'a>(
		&'a self,
		query_key: &'a str,
		display_query: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	fn record_miss<'a>(
		&'a self,
		normalized_query: &'a str,
		sample_query: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;

	fn popular_terms<'a>(
		&'a self,
		since: OffsetDateTime,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<(String, i64)>>>;

	fn most_clicked_instruments<'a>(
		&'a self,
		since: OffsetDateTime,
		limit: i64,
	) -> BoxFuture<'a, Result<Vec<(String, i64)>>>;
}

/// Short-lived store for raw external-search payloads.
pub trait PayloadCache
where
	Self: Send + Sync,
{
	fn get<'a>(
		&'a self,
		key: &'a str,
		now: OffsetDateTime,
	) -> BoxFuture<'a, Result<Option<Value>>>;

	fn put<'a>(
		&'a self,
		key: &'a str,
		payload: &'a Value,
		now: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> BoxFuture<'a, Result<()>>;
}

pub trait ShoppingSearch
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a dagu_config::Shopping,
		query: &'a str,
	) -> BoxFuture<'a, dagu_providers::Result<Vec<ExternalResultItem>>>;
}

#[derive(Clone)]
pub struct Stores {
	pub catalog: Arc<dyn CatalogStore>,
	pub listings: Arc<dyn ListingStore>,
	pub search_log: Arc<dyn SearchLog>,
	pub cache: Arc<dyn PayloadCache>,
}

#[derive(Clone)]
pub struct Providers {
	pub shopping: Arc<dyn ShoppingSearch>,
}

pub struct DaguService {
	pub cfg: Config,
	pub lexicon: Arc<LexiconHandle>,
	pub stores: Stores,
	pub providers: Providers,
}

struct DefaultProviders;

impl ShoppingSearch for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a dagu_config::Shopping,
		query: &'a str,
	) -> BoxFuture<'a, dagu_providers::Result<Vec<ExternalResultItem>>> {
		Box::pin(dagu_providers::shopping::search(cfg, query))
	}
}

impl Stores {
	pub fn postgres(db: Db) -> Self {
		let store = Arc::new(PgStore::new(db));

		Self {
			catalog: store.clone(),
			listings: store.clone(),
			search_log: store.clone(),
			cache: store,
		}
	}
}

impl Providers {
	pub fn new(shopping: Arc<dyn ShoppingSearch>) -> Self {
		Self { shopping }
	}
}

impl Default for Providers {
	fn default() -> Self {
		Self { shopping: Arc::new(DefaultProviders) }
	}
}

impl DaguService {
	pub fn new(cfg: Config, db: Db, lexicon: Arc<LexiconHandle>) -> Self {
		Self { cfg, lexicon, stores: Stores::postgres(db), providers: Providers::default() }
	}

	pub fn with_parts(
		cfg: Config,
		lexicon: Arc<LexiconHandle>,
		stores: Stores,
		providers: Providers,
	) -> Self {
		Self { cfg, lexicon, stores, providers }
	}
}
