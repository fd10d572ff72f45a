//! Search aggregation: catalog resolution, external results and user listings in one price-ordered
//! list.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use dagu_domain::{
	Category, FilterCascade, FilterContext, Lexicon, MatchResult, Matcher, NormalizedRecord,
	listing::discount_rate,
	normalize::{detect_category, extract_brand, normalize, rewrite_query, translate_brands},
	text::clean_title,
};
use dagu_storage::{models::VisibleListingRow, queries};

use crate::{DaguService, Error, Result, shopping::ExternalQuery};

#[derive(Clone, Debug, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub display: Option<u32>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOrigin {
	External,
	Local,
}

/// One merged result row. External and local results share this shape.
#[derive(Clone, Debug, Serialize)]
pub struct SearchItem {
	pub origin: ItemOrigin,
	pub title: String,
	pub link: String,
	pub image: Option<String>,
	pub price: i64,
	pub source: String,
	pub mall_name: Option<String>,
	pub score: u8,
	pub is_used: bool,
	pub listing_id: Option<Uuid>,
	pub instrument_id: Option<Uuid>,
	pub discount_rate: Option<f64>,
	#[serde(with = "crate::time_serde::option")]
	pub extended_at: Option<OffsetDateTime>,
	#[serde(with = "crate::time_serde::option")]
	pub expired_at: Option<OffsetDateTime>,
}

/// How the query was resolved before fetching results.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReferenceInfo {
	pub optimized_query: String,
	pub brand: Option<String>,
	pub category: Option<Category>,
	pub reference_price: Option<i64>,
	pub price_floor: i64,
}

#[derive(Clone, Debug, Serialize)]
pub struct SearchResponse {
	pub query: String,
	pub normalized_query: String,
	pub reference: ReferenceInfo,
	pub matched: Option<MatchResult>,
	pub shortlist: Vec<MatchResult>,
	pub items: Vec<SearchItem>,
	pub external_items: Vec<SearchItem>,
	pub local_items: Vec<SearchItem>,
}

/// Outgoing query and filter targets derived from the raw query and its best catalog match.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchPlan {
	pub query: String,
	pub brand: Option<String>,
	pub category: Option<Category>,
	pub reference_price: Option<i64>,
}

impl DaguService {
	pub async fn search(&self, req: SearchRequest) -> Result<SearchResponse> {
		let query = self.validate_query(&req.query)?;
		let display = self.resolve_display(req.display)?;
		let lexicon = self.lexicon.current();
		let brand = extract_brand(&lexicon, &query);
		let candidates = self
			.load_candidates(&lexicon, &query, brand.as_deref(), self.cfg.search.candidate_limit)
			.await?;
		let matches = Matcher::new(&lexicon).find_best_matches(
			&query,
			&candidates,
			self.cfg.search.min_match_score,
		);
		let shortlist =
			matches.into_iter().take(self.cfg.search.shortlist_size).collect::<Vec<_>>();
		let best = shortlist.first().cloned();
		let plan =
			plan_search(&lexicon, &query, best.as_ref(), self.cfg.search.confident_match_score);
		let external = self
			.external_search(
				&lexicon,
				&ExternalQuery {
					query: &plan.query,
					display,
					brand: plan.brand.as_deref(),
					category: plan.category,
					min_price: None,
					reference_price: plan.reference_price,
				},
			)
			.await
			.into_iter()
			.map(external_item)
			.collect::<Vec<_>>();
		let local = self.local_items(&lexicon, &query, &plan, &shortlist, display).await?;
		let mut items = merge_by_price(external.clone(), local.clone());

		items.truncate(display as usize);

		let ctx = FilterContext {
			query: &plan.query,
			brand: plan.brand.as_deref(),
			category: plan.category,
			min_price: None,
			reference_price: plan.reference_price,
		};
		let price_floor = FilterCascade::new(&lexicon, &self.cfg.filter).price_floor(&ctx);

		tracing::info!(
			query = %query,
			optimized_query = %plan.query,
			matched = best.is_some(),
			external = external.len(),
			local = local.len(),
			"Search completed."
		);

		self.track_query(&query).await;

		if best.is_none() {
			self.record_search_miss(&query).await;
		}

		Ok(SearchResponse {
			normalized_query: normalize(&query),
			query,
			reference: ReferenceInfo {
				optimized_query: plan.query,
				brand: plan.brand,
				category: plan.category,
				reference_price: plan.reference_price,
				price_floor,
			},
			matched: best,
			shortlist,
			items,
			external_items: external,
			local_items: local,
		})
	}

	fn validate_query(&self, raw: &str) -> Result<String> {
		let query = raw.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "Query must be non-empty.".to_string() });
		}
		if query.chars().count() > self.cfg.search.max_query_chars {
			return Err(Error::InvalidRequest {
				message: format!(
					"Query must be at most {} characters.",
					self.cfg.search.max_query_chars
				),
			});
		}

		Ok(query.to_string())
	}

	fn resolve_display(&self, display: Option<u32>) -> Result<u32> {
		let max = self.cfg.search.max_display;

		match display {
			None => Ok(self.cfg.search.default_display),
			Some(display) if (1..=max).contains(&display) => Ok(display),
			Some(_) => Err(Error::InvalidRequest {
				message: format!("Display must be between 1 and {max}."),
			}),
		}
	}

	/// Visible user listings for the shortlist or the raw query text, run through the title
	/// stages of the cascade. No price floor applies to them.
	async fn local_items(
		&self,
		lexicon: &Lexicon,
		query: &str,
		plan: &SearchPlan,
		shortlist: &[MatchResult],
		display: u32,
	) -> Result<Vec<SearchItem>> {
		let instrument_ids = shortlist.iter().map(|result| result.entry.id).collect::<Vec<_>>();
		let mut patterns = vec![queries::like_pattern(&query.to_lowercase())];
		let translated = translate_brands(lexicon, query);
		let translated_pattern = queries::like_pattern(&translated);

		if !patterns.contains(&translated_pattern) {
			patterns.push(translated_pattern);
		}

		let rows = self
			.stores
			.listings
			.visible_listings(
				&instrument_ids,
				&patterns,
				OffsetDateTime::now_utc(),
				i64::from(self.cfg.search.candidate_limit),
			)
			.await?;
		let cascade = FilterCascade::new(lexicon, &self.cfg.filter);
		let mut items = Vec::new();

		for row in rows {
			let lowered = clean_title(&row.title).to_lowercase();

			let verdict = cascade.check_title(&lowered, plan.brand.as_deref(), plan.category);

			if let Some(reason) = verdict {
				tracing::debug!(
					reason = %reason,
					listing_id = %row.listing_id,
					"Local listing rejected."
				);

				continue;
			}

			let score =
				cascade.relevance_score(query, &lowered, row.image_url.as_deref().unwrap_or(""));

			items.push(local_item(row, score));

			if items.len() >= display as usize {
				break;
			}
		}

		Ok(items)
	}
}

/// Builds the outgoing query and filter targets.
///
/// A confident match searches for `"{brand} {name}"` of the catalog entry. The user's own brand
/// replaces the catalog brand only when it differs and is not part of the model name. Without a
/// confident match the raw query is brand-translated and alias-rewritten, and only a known brand
/// is kept as a filter target.
pub fn plan_search(
	lexicon: &Lexicon,
	query: &str,
	best: Option<&MatchResult>,
	confident_score: f32,
) -> SearchPlan {
	let brand = extract_brand(lexicon, query);

	if let Some(best) = best.filter(|best| best.score >= confident_score) {
		let entry = &best.entry;
		let resolved_brand = match brand {
			Some(brand) if brand != entry.brand && !entry.name.contains(brand.as_str()) => brand,
			_ => entry.brand.clone(),
		};

		return SearchPlan {
			query: format!("{resolved_brand} {}", entry.name),
			brand: Some(resolved_brand),
			category: Some(entry.category),
			reference_price: Some(entry.reference_price).filter(|price| *price > 0),
		};
	}

	SearchPlan {
		query: rewrite_query(lexicon, query),
		brand: brand.filter(|brand| lexicon.is_known_brand(brand)),
		category: detect_category(lexicon, query),
		reference_price: None,
	}
}

/// Ascending by price. Among equal prices, the most recently renewed listing comes first.
pub fn merge_by_price(external: Vec<SearchItem>, local: Vec<SearchItem>) -> Vec<SearchItem> {
	let mut merged = external.into_iter().chain(local).collect::<Vec<_>>();

	merged.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| b.extended_at.cmp(&a.extended_at)));

	merged
}

fn external_item(record: NormalizedRecord) -> SearchItem {
	SearchItem {
		origin: ItemOrigin::External,
		title: record.title,
		link: record.link,
		image: Some(record.image).filter(|image| !image.is_empty()),
		price: record.lprice,
		source: record.source,
		mall_name: Some(record.mall_name).filter(|name| !name.is_empty()),
		score: record.score,
		is_used: record.is_used,
		listing_id: None,
		instrument_id: None,
		discount_rate: None,
		extended_at: None,
		expired_at: None,
	}
}

fn local_item(row: VisibleListingRow, score: u8) -> SearchItem {
	SearchItem {
		origin: ItemOrigin::Local,
		title: row.title,
		link: row.link,
		image: row.image_url,
		price: row.price,
		source: row.source,
		mall_name: None,
		score,
		is_used: true,
		listing_id: Some(row.listing_id),
		instrument_id: Some(row.instrument_id),
		discount_rate: Some(discount_rate(row.price, row.reference_price)),
		extended_at: row.extended_at,
		expired_at: Some(row.expired_at),
	}
}
