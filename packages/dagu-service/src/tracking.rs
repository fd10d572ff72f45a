//! Search counters and the popular-search feed.

use serde::Serialize;
use time::{Duration, OffsetDateTime};

use dagu_domain::normalize::{normalize, translate_brands};

use crate::{DaguService, Result};

const MIN_TRACKED_CHARS: usize = 2;
const MAX_TRACKED_CHARS: usize = 200;
const MAX_POPULAR: u32 = 10;
const POPULAR_WINDOW_DAYS: i64 = 7;
const CLICK_WINDOW_HOURS: i64 = 24;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PopularSearch {
	pub term: String,
	pub count: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct PopularSearchesResponse {
	pub items: Vec<PopularSearch>,
}

impl DaguService {
	/// Most searched terms of the last week, topped up with recently clicked catalog entries.
	pub async fn popular_searches(&self, limit: Option<u32>) -> Result<PopularSearchesResponse> {
		let limit = limit.unwrap_or(MAX_POPULAR).clamp(1, MAX_POPULAR) as usize;
		let now = OffsetDateTime::now_utc();
		let lexicon = self.lexicon.current();
		let fetch = (limit * 3) as i64;
		let mut seen: Vec<String> = Vec::new();
		let mut items = Vec::with_capacity(limit);
		let terms = self
			.stores
			.search_log
			.popular_terms(now - Duration::days(POPULAR_WINDOW_DAYS), fetch)
			.await?;

		push_unique(&mut items, &mut seen, terms, limit, |term| {
			normalize(&translate_brands(&lexicon, term))
		});

		if items.len() < limit {
			let clicked = self
				.stores
				.search_log
				.most_clicked_instruments(now - Duration::hours(CLICK_WINDOW_HOURS), fetch)
				.await?;

			push_unique(&mut items, &mut seen, clicked, limit, |term| {
				normalize(&translate_brands(&lexicon, term))
			});
		}

		Ok(PopularSearchesResponse { items })
	}

	/// Counts one search for `query`. Failures are logged and swallowed.
	pub(crate) async fn track_query(&self, query: &str) {
		let display = query.trim();
		let key = display.to_lowercase();
		let chars = key.chars().count();

		if !(MIN_TRACKED_CHARS..=MAX_TRACKED_CHARS).contains(&chars) {
			return;
		}
		if let Err(err) =
			self.stores.search_log.track_search(&key, display, OffsetDateTime::now_utc()).await
		{
			tracing::warn!(error = %err, "Search tracking failed.");
		}
	}

	/// Logs a query no catalog entry matched, keyed by its normalized form.
	pub(crate) async fn record_search_miss(&self, query: &str) {
		let normalized = normalize(query);

		if normalized.is_empty() {
			return;
		}
		if let Err(err) =
			self.stores.search_log.record_miss(&normalized, query, OffsetDateTime::now_utc()).await
		{
			tracing::warn!(error = %err, query = %query, "Search miss logging failed.");
		}
	}
}

fn push_unique<F>(
	items: &mut Vec<PopularSearch>,
	seen: &mut Vec<String>,
	terms: Vec<(String, i64)>,
	limit: usize,
	key_of: F,
) where
	F: Fn(&str) -> String,
{
	for (term, count) in terms {
		if items.len() >= limit {
			return;
		}

		let key = key_of(&term);

		if key.is_empty() || seen.contains(&key) {
			continue;
		}

		seen.push(key);
		items.push(PopularSearch { term, count });
	}
}
