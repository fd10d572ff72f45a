//! External shopping search behind the raw-payload cache and the filter cascade.

use serde_json::Value;
use time::{Duration, OffsetDateTime};

use dagu_domain::{
	Category, ExternalResultItem, FilterCascade, FilterContext, Lexicon, NormalizedRecord,
	filter::build_exclusion_query,
};

use crate::{DaguService, Error, Result};

/// Bumped whenever the cached payload shape changes.
pub const CACHE_SCHEMA_VERSION: i32 = 1;

const CACHE_KIND: &str = "shopping";

/// What the aggregator asks the external search for.
#[derive(Clone, Copy, Debug)]
pub struct ExternalQuery<'a> {
	pub query: &'a str,
	pub display: u32,
	pub brand: Option<&'a str>,
	pub category: Option<Category>,
	pub min_price: Option<i64>,
	pub reference_price: Option<i64>,
}

impl DaguService {
	/// Filtered, most relevant external results for `request`.
	///
	/// Never fails: a missing configuration or an upstream failure yields an empty list.
	pub(crate) async fn external_search(
		&self,
		lexicon: &Lexicon,
		request: &ExternalQuery<'_>,
	) -> Vec<NormalizedRecord> {
		let outgoing = if self.cfg.shopping.use_exclusion_query {
			build_exclusion_query(lexicon, request.query)
		} else {
			request.query.to_string()
		};
		let Some(raw) = self.fetch_raw_items(&outgoing, request).await else {
			return Vec::new();
		};
		let cascade = FilterCascade::new(lexicon, &self.cfg.filter);
		let ctx = FilterContext {
			query: request.query,
			brand: request.brand,
			category: request.category,
			min_price: request.min_price,
			reference_price: request.reference_price,
		};
		let (mut passed, stats) = cascade.evaluate_batch(&raw, &ctx);

		tracing::info!(
			query = %request.query,
			total = stats.total,
			passed = stats.passed,
			rejected = stats.rejected(),
			price = stats.price,
			category_fields = stats.category_fields,
			blacklist = stats.blacklist,
			category = stats.category,
			brand = stats.brand,
			product_type = stats.product_type,
			malformed = stats.malformed,
			"Shopping results filtered."
		);

		rank_records(&mut passed);
		passed.truncate(request.display as usize);

		passed
	}

	async fn fetch_raw_items(
		&self,
		outgoing: &str,
		request: &ExternalQuery<'_>,
	) -> Option<Vec<ExternalResultItem>> {
		let cache_key = if self.cfg.cache.enabled {
			match build_cache_key(outgoing, request) {
				Ok(key) => Some(key),
				Err(err) => {
					tracing::warn!(error = %err, "Cache key build failed.");

					None
				},
			}
		} else {
			None
		};
		let now = OffsetDateTime::now_utc();

		if let Some(key) = cache_key.as_deref()
			&& let Some(items) = self.read_cached_items(key, now).await
		{
			return Some(items);
		}

		let items = match self.providers.shopping.search(&self.cfg.shopping, outgoing).await {
			Ok(items) => items,
			Err(dagu_providers::Error::NotConfigured) => {
				tracing::info!("Shopping search is not configured. Skipping external results.");

				return None;
			},
			Err(err) => {
				tracing::warn!(error = %err, query = %outgoing, "Shopping search failed.");

				return None;
			},
		};

		if let Some(key) = cache_key.as_deref()
			&& !items.is_empty()
		{
			self.store_cached_items(key, &items, now).await;
		}

		Some(items)
	}

	async fn read_cached_items(
		&self,
		key: &str,
		now: OffsetDateTime,
	) -> Option<Vec<ExternalResultItem>> {
		match self.stores.cache.get(key, now).await {
			Ok(Some(payload)) => match serde_json::from_value::<Vec<ExternalResultItem>>(payload) {
				Ok(items) => {
					tracing::info!(
						cache_key_prefix = cache_key_prefix(key),
						hit = true,
						items = items.len(),
						"Cache hit."
					);

					Some(items)
				},
				Err(err) => {
					tracing::warn!(
						error = %err,
						cache_key_prefix = cache_key_prefix(key),
						"Cache payload decode failed."
					);

					None
				},
			},
			Ok(None) => {
				tracing::info!(
					cache_key_prefix = cache_key_prefix(key),
					hit = false,
					"Cache miss."
				);

				None
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					cache_key_prefix = cache_key_prefix(key),
					"Cache read failed."
				);

				None
			},
		}
	}

	async fn store_cached_items(
		&self,
		key: &str,
		items: &[ExternalResultItem],
		now: OffsetDateTime,
	) {
		let payload = match serde_json::to_value(items) {
			Ok(payload) => payload,
			Err(err) => {
				tracing::warn!(error = %err, "Cache payload encode failed.");

				return;
			},
		};
		let expires_at = now + Duration::seconds(self.cfg.cache.ttl_seconds);

		match self.stores.cache.put(key, &payload, now, expires_at).await {
			Ok(()) => tracing::info!(
				cache_key_prefix = cache_key_prefix(key),
				items = items.len(),
				"Cache stored."
			),
			Err(err) => tracing::warn!(
				error = %err,
				cache_key_prefix = cache_key_prefix(key),
				"Cache write failed."
			),
		}
	}
}

/// Most relevant first. Equal scores keep the cheaper offer ahead so truncation drops the pricier
/// duplicates.
pub fn rank_records(records: &mut [NormalizedRecord]) {
	records.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.lprice.cmp(&b.lprice)));
}

pub fn build_cache_key(outgoing: &str, request: &ExternalQuery<'_>) -> Result<String> {
	let payload = serde_json::json!({
		"kind": CACHE_KIND,
		"schema_version": CACHE_SCHEMA_VERSION,
		"query": outgoing.trim().to_lowercase(),
		"display": request.display,
		"brand": request.brand,
		"category": request.category.map(Category::as_str),
		"min_price": request.min_price,
	});

	hash_cache_key(&payload)
}

fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Storage {
		message: format!("Failed to encode cache key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}
