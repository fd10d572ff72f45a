use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct BrandRow {
	pub brand_id: Uuid,
	pub slug: String,
	pub display_name: String,
	pub logo_url: Option<String>,
	pub description: Option<String>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct InstrumentRow {
	pub instrument_id: Uuid,
	pub brand: String,
	pub name: String,
	pub category: String,
	pub reference_price: i64,
	pub image_url: Option<String>,
	pub brand_id: Option<Uuid>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, sqlx::FromRow)]
pub struct ListingRow {
	pub listing_id: Uuid,
	pub instrument_id: Uuid,
	pub price: i64,
	pub link: String,
	pub source: String,
	pub title: String,
	pub is_active: bool,
	pub is_under_review: bool,
	pub expired_at: OffsetDateTime,
	pub extended_at: Option<OffsetDateTime>,
	pub click_count: i64,
	pub report_count: i32,
	pub owner_id: Option<String>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

/// A visible listing joined with the catalog entry it references.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct VisibleListingRow {
	pub listing_id: Uuid,
	pub instrument_id: Uuid,
	pub price: i64,
	pub link: String,
	pub source: String,
	pub title: String,
	pub click_count: i64,
	pub expired_at: OffsetDateTime,
	pub extended_at: Option<OffsetDateTime>,
	pub created_at: OffsetDateTime,
	pub brand: String,
	pub name: String,
	pub category: String,
	pub reference_price: i64,
	pub image_url: Option<String>,
}

/// A listing row with the reference price of its catalog entry.
#[derive(Clone, Debug, sqlx::FromRow)]
pub struct PricedListingRow {
	#[sqlx(flatten)]
	pub listing: ListingRow,
	pub reference_price: i64,
}

/// Catalog browse filter. Every term must appear in the brand or the name; all strings are
/// expected in lowercase.
#[derive(Clone, Copy, Debug, Default)]
pub struct InstrumentFilter<'a> {
	pub brand: Option<&'a str>,
	pub category: Option<&'a str>,
	pub terms: &'a [String],
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ListingFilter<'a> {
	pub instrument_id: Option<Uuid>,
	pub source: Option<&'a str>,
	pub min_price: Option<i64>,
	pub max_price: Option<i64>,
}

pub struct NewBrand<'a> {
	pub brand_id: Uuid,
	pub slug: &'a str,
	pub display_name: &'a str,
	pub logo_url: Option<&'a str>,
	pub description: Option<&'a str>,
	pub now: OffsetDateTime,
}

pub struct NewInstrument<'a> {
	pub instrument_id: Uuid,
	pub brand: &'a str,
	pub name: &'a str,
	pub category: &'a str,
	pub reference_price: i64,
	pub image_url: Option<&'a str>,
	pub brand_id: Option<Uuid>,
	pub now: OffsetDateTime,
}

pub struct NewListing<'a> {
	pub listing_id: Uuid,
	pub instrument_id: Uuid,
	pub price: i64,
	pub link: &'a str,
	pub source: &'a str,
	pub title: &'a str,
	pub owner_id: Option<&'a str>,
	pub expired_at: OffsetDateTime,
	pub now: OffsetDateTime,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReportCounts {
	pub total: i64,
	pub wrong_price: i64,
}

/// Report bookkeeping written after a new report lands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReportState {
	pub report_count: i32,
	pub deactivate: bool,
	pub under_review: bool,
}
