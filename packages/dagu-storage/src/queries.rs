use serde_json::Value;
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{
		BrandRow, InstrumentFilter, InstrumentRow, ListingFilter, ListingRow, NewBrand,
		NewInstrument, NewListing, PricedListingRow, ReportCounts, ReportState, VisibleListingRow,
	},
};

const INSTRUMENT_COLUMNS: &str = "\
instrument_id, brand, name, category, reference_price, image_url, brand_id, created_at, updated_at";
const LISTING_COLUMNS: &str = "\
listing_id, instrument_id, price, link, source, title, is_active, is_under_review, expired_at, \
extended_at, click_count, report_count, owner_id, created_at, updated_at";
const PRICED_LISTING_COLUMNS: &str = "\
l.listing_id, l.instrument_id, l.price, l.link, l.source, l.title, l.is_active, l.is_under_review, \
l.expired_at, l.extended_at, l.click_count, l.report_count, l.owner_id, l.created_at, \
l.updated_at, i.reference_price";
const ACTIVE_LINK_INDEX: &str = "idx_listings_active_link";

/// `%term%` for ILIKE with the pattern metacharacters escaped.
pub fn like_pattern(term: &str) -> String {
	let mut out = String::with_capacity(term.len() + 2);

	out.push('%');

	for ch in term.chars() {
		if matches!(ch, '%' | '_' | '\\') {
			out.push('\\');
		}

		out.push(ch);
	}

	out.push('%');

	out
}

pub async fn upsert_brand<'e, E>(executor: E, brand: &NewBrand<'_>) -> Result<BrandRow>
where
	E: PgExecutor<'e>,
{
	let row = sqlx::query_as::<_, BrandRow>(
		"\
INSERT INTO brands (brand_id, slug, display_name, logo_url, description, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $6, $6)
ON CONFLICT (slug) DO UPDATE
SET
	display_name = EXCLUDED.display_name,
	logo_url = EXCLUDED.logo_url,
	description = EXCLUDED.description,
	updated_at = EXCLUDED.updated_at
RETURNING brand_id, slug, display_name, logo_url, description, created_at, updated_at",
	)
	.bind(brand.brand_id)
	.bind(brand.slug)
	.bind(brand.display_name)
	.bind(brand.logo_url)
	.bind(brand.description)
	.bind(brand.now)
	.fetch_one(executor)
	.await?;

	Ok(row)
}

pub async fn find_brand_id<'e, E>(executor: E, slug: &str) -> Result<Option<Uuid>>
where
	E: PgExecutor<'e>,
{
	let id = sqlx::query_scalar::<_, Uuid>("SELECT brand_id FROM brands WHERE slug = $1")
		.bind(slug)
		.fetch_optional(executor)
		.await?;

	Ok(id)
}

/// Inserts a catalog entry, or updates the one already stored under the same brand and name.
pub async fn upsert_instrument<'e, E>(
	executor: E,
	instrument: &NewInstrument<'_>,
) -> Result<InstrumentRow>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
INSERT INTO instruments (
	instrument_id,
	brand,
	name,
	category,
	reference_price,
	image_url,
	brand_id,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
ON CONFLICT (brand, name) DO UPDATE
SET
	category = EXCLUDED.category,
	reference_price = EXCLUDED.reference_price,
	image_url = COALESCE(EXCLUDED.image_url, instruments.image_url),
	brand_id = COALESCE(EXCLUDED.brand_id, instruments.brand_id),
	updated_at = EXCLUDED.updated_at
RETURNING {INSTRUMENT_COLUMNS}"
	);
	let row = sqlx::query_as::<_, InstrumentRow>(&sql)
		.bind(instrument.instrument_id)
		.bind(instrument.brand)
		.bind(instrument.name)
		.bind(instrument.category)
		.bind(instrument.reference_price)
		.bind(instrument.image_url)
		.bind(instrument.brand_id)
		.bind(instrument.now)
		.fetch_one(executor)
		.await?;

	Ok(row)
}

pub async fn get_instrument<'e, E>(
	executor: E,
	instrument_id: Uuid,
) -> Result<Option<InstrumentRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT {INSTRUMENT_COLUMNS} FROM instruments WHERE instrument_id = $1");
	let row = sqlx::query_as::<_, InstrumentRow>(&sql)
		.bind(instrument_id)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

pub async fn find_instrument<'e, E>(
	executor: E,
	brand: &str,
	name: &str,
) -> Result<Option<InstrumentRow>>
where
	E: PgExecutor<'e>,
{
	let sql =
		format!("SELECT {INSTRUMENT_COLUMNS} FROM instruments WHERE brand = $1 AND name = $2");
	let row = sqlx::query_as::<_, InstrumentRow>(&sql)
		.bind(brand)
		.bind(name)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

/// Catalog page ordered by brand and name.
pub async fn list_instruments<'e, E>(
	executor: E,
	filter: &InstrumentFilter<'_>,
	limit: i64,
	offset: i64,
) -> Result<Vec<InstrumentRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {INSTRUMENT_COLUMNS}
FROM instruments
WHERE ($1::text IS NULL OR strpos(brand, $1) > 0)
	AND ($2::text IS NULL OR category = $2)
	AND NOT EXISTS (
		SELECT 1
		FROM unnest($3::text[]) AS t(term)
		WHERE strpos(brand, t.term) = 0 AND strpos(name, t.term) = 0
	)
ORDER BY brand, name, instrument_id
LIMIT $4
OFFSET $5"
	);
	let rows = sqlx::query_as::<_, InstrumentRow>(&sql)
		.bind(filter.brand)
		.bind(filter.category)
		.bind(filter.terms)
		.bind(limit)
		.bind(offset)
		.fetch_all(executor)
		.await?;

	Ok(rows)
}

/// Removes a catalog entry together with its listings. Returns `false` when nothing matched.
pub async fn delete_instrument<'e, E>(executor: E, instrument_id: Uuid) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM instruments WHERE instrument_id = $1")
		.bind(instrument_id)
		.execute(executor)
		.await?;

	Ok(result.rows_affected() > 0)
}

/// Catalog entries whose brand or name matches any pattern, or whose brand matches `brand`.
///
/// Name matches rank ahead of brand-only matches so a specific model survives `limit` even when
/// its brand has many shorter entries. Placeholder entries with an empty or `unknown` brand are
/// never candidates.
pub async fn instrument_candidates<'e, E>(
	executor: E,
	patterns: &[String],
	brand: Option<&str>,
	limit: i64,
) -> Result<Vec<InstrumentRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {INSTRUMENT_COLUMNS}
FROM instruments
WHERE brand <> ''
	AND brand <> 'unknown'
	AND (
		brand ILIKE ANY($1)
		OR name ILIKE ANY($1)
		OR ($2::text IS NOT NULL AND (brand = $2 OR strpos(brand, $2) > 0))
	)
ORDER BY
	(name ILIKE ANY($1)) DESC,
	CASE WHEN brand = $2 THEN 0 ELSE 1 END,
	length(name),
	name,
	instrument_id
LIMIT $3"
	);
	let rows = sqlx::query_as::<_, InstrumentRow>(&sql)
		.bind(patterns)
		.bind(brand)
		.bind(limit)
		.fetch_all(executor)
		.await?;

	Ok(rows)
}

pub async fn find_active_listing_by_link<'e, E>(executor: E, link: &str) -> Result<Option<Uuid>>
where
	E: PgExecutor<'e>,
{
	let id = sqlx::query_scalar::<_, Uuid>(
		"SELECT listing_id FROM listings WHERE link = $1 AND is_active LIMIT 1",
	)
	.bind(link)
	.fetch_optional(executor)
	.await?;

	Ok(id)
}

/// Fails with [`Error::ActiveLinkTaken`] when another active listing already holds the link.
pub async fn insert_listing<'e, E>(executor: E, listing: &NewListing<'_>) -> Result<ListingRow>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
INSERT INTO listings (
	listing_id,
	instrument_id,
	price,
	link,
	source,
	title,
	owner_id,
	expired_at,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
RETURNING {LISTING_COLUMNS}"
	);
	let row = sqlx::query_as::<_, ListingRow>(&sql)
		.bind(listing.listing_id)
		.bind(listing.instrument_id)
		.bind(listing.price)
		.bind(listing.link)
		.bind(listing.source)
		.bind(listing.title)
		.bind(listing.owner_id)
		.bind(listing.expired_at)
		.bind(listing.now)
		.fetch_one(executor)
		.await
		.map_err(|err| match err {
			sqlx::Error::Database(db_err) if db_err.constraint() == Some(ACTIVE_LINK_INDEX) =>
				Error::ActiveLinkTaken { link: listing.link.to_string() },
			err => Error::Sqlx(err),
		})?;

	Ok(row)
}

pub async fn get_listing<'e, E>(executor: E, listing_id: Uuid) -> Result<Option<ListingRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE listing_id = $1");
	let row =
		sqlx::query_as::<_, ListingRow>(&sql).bind(listing_id).fetch_optional(executor).await?;

	Ok(row)
}

/// A visible listing with its reference price. Hidden, expired and inactive listings read as
/// absent.
pub async fn get_visible_listing<'e, E>(
	executor: E,
	listing_id: Uuid,
	now: OffsetDateTime,
) -> Result<Option<PricedListingRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {PRICED_LISTING_COLUMNS}
FROM listings l
JOIN instruments i ON i.instrument_id = l.instrument_id
WHERE l.listing_id = $1
	AND l.is_active
	AND NOT l.is_under_review
	AND l.expired_at > $2"
	);
	let row = sqlx::query_as::<_, PricedListingRow>(&sql)
		.bind(listing_id)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

/// Visible listings narrowed by `filter`, newest first.
pub async fn list_visible_listings<'e, E>(
	executor: E,
	filter: &ListingFilter<'_>,
	now: OffsetDateTime,
	limit: i64,
	offset: i64,
) -> Result<Vec<PricedListingRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
SELECT {PRICED_LISTING_COLUMNS}
FROM listings l
JOIN instruments i ON i.instrument_id = l.instrument_id
WHERE l.is_active
	AND NOT l.is_under_review
	AND l.expired_at > $1
	AND ($2::uuid IS NULL OR l.instrument_id = $2)
	AND ($3::text IS NULL OR l.source = $3)
	AND ($4::bigint IS NULL OR l.price >= $4)
	AND ($5::bigint IS NULL OR l.price <= $5)
ORDER BY l.created_at DESC, l.listing_id
LIMIT $6
OFFSET $7"
	);
	let rows = sqlx::query_as::<_, PricedListingRow>(&sql)
		.bind(now)
		.bind(filter.instrument_id)
		.bind(filter.source)
		.bind(filter.min_price)
		.bind(filter.max_price)
		.bind(limit)
		.bind(offset)
		.fetch_all(executor)
		.await?;

	Ok(rows)
}

/// Counts a click on a visible listing and pushes its expiry to `expired_at`.
///
/// Returns `None` when the listing is inactive, under review or already expired.
pub async fn record_click<'e, E>(
	executor: E,
	listing_id: Uuid,
	expired_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<Option<ListingRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
UPDATE listings
SET
	click_count = click_count + 1,
	expired_at = GREATEST(expired_at, $2),
	updated_at = $3
WHERE listing_id = $1
	AND is_active
	AND expired_at > $3
RETURNING {LISTING_COLUMNS}"
	);
	let row = sqlx::query_as::<_, ListingRow>(&sql)
		.bind(listing_id)
		.bind(expired_at)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

pub async fn insert_click<'e, E>(executor: E, listing_id: Uuid, now: OffsetDateTime) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query("INSERT INTO listing_clicks (click_id, listing_id, clicked_at) VALUES ($1, $2, $3)")
		.bind(Uuid::new_v4())
		.bind(listing_id)
		.bind(now)
		.execute(executor)
		.await?;

	Ok(())
}

pub async fn renew_listing<'e, E>(
	executor: E,
	listing_id: Uuid,
	expired_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<Option<ListingRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
UPDATE listings
SET expired_at = $2, extended_at = $3, updated_at = $3
WHERE listing_id = $1 AND is_active
RETURNING {LISTING_COLUMNS}"
	);
	let row = sqlx::query_as::<_, ListingRow>(&sql)
		.bind(listing_id)
		.bind(expired_at)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

pub async fn update_listing_price<'e, E>(
	executor: E,
	listing_id: Uuid,
	price: i64,
	now: OffsetDateTime,
) -> Result<Option<ListingRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
UPDATE listings
SET price = $2, updated_at = $3
WHERE listing_id = $1 AND is_active
RETURNING {LISTING_COLUMNS}"
	);
	let row = sqlx::query_as::<_, ListingRow>(&sql)
		.bind(listing_id)
		.bind(price)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

pub async fn deactivate_listing<'e, E>(
	executor: E,
	listing_id: Uuid,
	now: OffsetDateTime,
) -> Result<Option<ListingRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
UPDATE listings
SET is_active = false, updated_at = $2
WHERE listing_id = $1
RETURNING {LISTING_COLUMNS}"
	);
	let row = sqlx::query_as::<_, ListingRow>(&sql)
		.bind(listing_id)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

/// Stores a report. Returns `false` when the reporter already reported this listing.
pub async fn insert_report<'e, E>(
	executor: E,
	listing_id: Uuid,
	reason: &str,
	reporter_key: &str,
	now: OffsetDateTime,
) -> Result<bool>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
INSERT INTO listing_reports (report_id, listing_id, reason, reporter_key, created_at)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (listing_id, reporter_key) DO NOTHING",
	)
	.bind(Uuid::new_v4())
	.bind(listing_id)
	.bind(reason)
	.bind(reporter_key)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn report_counts<'e, E>(executor: E, listing_id: Uuid) -> Result<ReportCounts>
where
	E: PgExecutor<'e>,
{
	let (total, wrong_price): (i64, i64) = sqlx::query_as(
		"\
SELECT
	count(*)::bigint,
	count(*) FILTER (WHERE reason = 'wrong_price')::bigint
FROM listing_reports
WHERE listing_id = $1",
	)
	.bind(listing_id)
	.fetch_one(executor)
	.await?;

	Ok(ReportCounts { total, wrong_price })
}

pub async fn set_report_state<'e, E>(
	executor: E,
	listing_id: Uuid,
	state: ReportState,
	now: OffsetDateTime,
) -> Result<Option<ListingRow>>
where
	E: PgExecutor<'e>,
{
	let sql = format!(
		"\
UPDATE listings
SET
	report_count = $2,
	is_active = is_active AND NOT $3,
	is_under_review = is_under_review OR $4,
	updated_at = $5
WHERE listing_id = $1
RETURNING {LISTING_COLUMNS}"
	);
	let row = sqlx::query_as::<_, ListingRow>(&sql)
		.bind(listing_id)
		.bind(state.report_count)
		.bind(state.deactivate)
		.bind(state.under_review)
		.bind(now)
		.fetch_optional(executor)
		.await?;

	Ok(row)
}

/// Active, unreviewed and unexpired listings that reference one of `instrument_ids`, or whose
/// title or catalog entry matches one of `patterns`. Cheapest first.
pub async fn visible_listings<'e, E>(
	executor: E,
	instrument_ids: &[Uuid],
	patterns: &[String],
	now: OffsetDateTime,
	limit: i64,
) -> Result<Vec<VisibleListingRow>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, VisibleListingRow>(
		"\
SELECT
	l.listing_id,
	l.instrument_id,
	l.price,
	l.link,
	l.source,
	l.title,
	l.click_count,
	l.expired_at,
	l.extended_at,
	l.created_at,
	i.brand,
	i.name,
	i.category,
	i.reference_price,
	i.image_url
FROM listings l
JOIN instruments i ON i.instrument_id = l.instrument_id
WHERE l.is_active
	AND NOT l.is_under_review
	AND l.expired_at > $3
	AND (
		l.instrument_id = ANY($1)
		OR l.title ILIKE ANY($2)
		OR i.name ILIKE ANY($2)
		OR (i.brand || ' ' || i.name) ILIKE ANY($2)
	)
ORDER BY l.price ASC, l.extended_at DESC NULLS LAST, l.listing_id
LIMIT $4",
	)
	.bind(instrument_ids)
	.bind(patterns)
	.bind(now)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// Adds one search for `query_key`, creating the row on first sight.
pub async fn track_search<'e, E>(
	executor: E,
	query_key: &str,
	display_query: &str,
	now: OffsetDateTime,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO search_queries (query_key, display_query, search_count, last_searched_at)
VALUES ($1, $2, 1, $3)
ON CONFLICT (query_key) DO UPDATE
SET
	search_count = search_queries.search_count + 1,
	display_query = EXCLUDED.display_query,
	last_searched_at = EXCLUDED.last_searched_at",
	)
	.bind(query_key)
	.bind(display_query)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn record_miss<'e, E>(
	executor: E,
	normalized_query: &str,
	sample_query: &str,
	now: OffsetDateTime,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO search_misses (normalized_query, sample_query, miss_count, first_seen_at, last_seen_at)
VALUES ($1, $2, 1, $3, $3)
ON CONFLICT (normalized_query) DO UPDATE
SET
	miss_count = search_misses.miss_count + 1,
	sample_query = EXCLUDED.sample_query,
	last_seen_at = EXCLUDED.last_seen_at",
	)
	.bind(normalized_query)
	.bind(sample_query)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(())
}

/// Most searched terms since `since`, with their counts.
pub async fn popular_terms<'e, E>(
	executor: E,
	since: OffsetDateTime,
	limit: i64,
) -> Result<Vec<(String, i64)>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, (String, i64)>(
		"\
SELECT display_query, search_count
FROM search_queries
WHERE last_searched_at >= $1
ORDER BY search_count DESC, last_searched_at DESC
LIMIT $2",
	)
	.bind(since)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

/// `"{brand} {name}"` of the catalog entries whose listings were clicked most since `since`.
pub async fn most_clicked_instruments<'e, E>(
	executor: E,
	since: OffsetDateTime,
	limit: i64,
) -> Result<Vec<(String, i64)>>
where
	E: PgExecutor<'e>,
{
	let rows = sqlx::query_as::<_, (String, i64)>(
		"\
SELECT i.brand || ' ' || i.name AS term, count(*)::bigint AS clicks
FROM listing_clicks c
JOIN listings l ON l.listing_id = c.listing_id
JOIN instruments i ON i.instrument_id = l.instrument_id
WHERE c.clicked_at >= $1
GROUP BY i.brand, i.name
ORDER BY clicks DESC, term
LIMIT $2",
	)
	.bind(since)
	.bind(limit)
	.fetch_all(executor)
	.await?;

	Ok(rows)
}

pub async fn cache_get<'e, E>(
	executor: E,
	cache_key: &str,
	now: OffsetDateTime,
) -> Result<Option<Value>>
where
	E: PgExecutor<'e>,
{
	let payload = sqlx::query_scalar::<_, Value>(
		"\
UPDATE search_cache
SET hit_count = hit_count + 1, last_hit_at = $2
WHERE cache_key = $1 AND expires_at > $2
RETURNING payload",
	)
	.bind(cache_key)
	.bind(now)
	.fetch_optional(executor)
	.await?;

	Ok(payload)
}

/// Last write wins.
pub async fn cache_put<'e, E>(
	executor: E,
	cache_key: &str,
	payload: &Value,
	now: OffsetDateTime,
	expires_at: OffsetDateTime,
) -> Result<()>
where
	E: PgExecutor<'e>,
{
	sqlx::query(
		"\
INSERT INTO search_cache (cache_key, payload, created_at, expires_at, hit_count)
VALUES ($1, $2, $3, $4, 0)
ON CONFLICT (cache_key) DO UPDATE
SET
	payload = EXCLUDED.payload,
	created_at = EXCLUDED.created_at,
	expires_at = EXCLUDED.expires_at,
	hit_count = 0",
	)
	.bind(cache_key)
	.bind(payload)
	.bind(now)
	.bind(expires_at)
	.execute(executor)
	.await?;

	Ok(())
}

pub async fn deactivate_expired_listings<'e, E>(executor: E, now: OffsetDateTime) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query(
		"\
UPDATE listings
SET is_active = false, updated_at = $1
WHERE is_active AND expired_at <= $1",
	)
	.bind(now)
	.execute(executor)
	.await?;

	Ok(result.rows_affected())
}

pub async fn purge_inactive_listings<'e, E>(executor: E, cutoff: OffsetDateTime) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM listings WHERE NOT is_active AND updated_at < $1")
		.bind(cutoff)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn delete_clicks_before<'e, E>(executor: E, cutoff: OffsetDateTime) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM listing_clicks WHERE clicked_at < $1")
		.bind(cutoff)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}

pub async fn delete_expired_cache<'e, E>(executor: E, now: OffsetDateTime) -> Result<u64>
where
	E: PgExecutor<'e>,
{
	let result = sqlx::query("DELETE FROM search_cache WHERE expires_at <= $1")
		.bind(now)
		.execute(executor)
		.await?;

	Ok(result.rows_affected())
}
