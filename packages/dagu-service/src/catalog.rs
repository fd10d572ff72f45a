//! Catalog candidate lookup and resolution.

use dagu_domain::{
	CatalogEntry, Category, Lexicon, MatchResult, Matcher,
	normalize::{expand_aliases, extract_brand, tokenize},
};
use dagu_storage::{models::InstrumentRow, queries};

use crate::{DaguService, Result};

impl DaguService {
	/// Catalog entries that could plausibly match `query`, placeholders excluded.
	pub(crate) async fn load_candidates(
		&self,
		lexicon: &Lexicon,
		query: &str,
		brand: Option<&str>,
		limit: u32,
	) -> Result<Vec<CatalogEntry>> {
		let patterns = candidate_patterns(lexicon, query);

		if patterns.is_empty() && brand.is_none() {
			return Ok(Vec::new());
		}

		let rows =
			self.stores.catalog.instrument_candidates(&patterns, brand, i64::from(limit)).await?;

		Ok(rows.iter().map(entry_from_row).filter(|entry| !entry.is_placeholder()).collect())
	}

	/// Best catalog entry for a free-text listing title, if any scores at least
	/// `listings.resolve_min_score`.
	pub(crate) async fn resolve_instrument(
		&self,
		lexicon: &Lexicon,
		title: &str,
	) -> Result<Option<MatchResult>> {
		let brand = extract_brand(lexicon, title);
		let candidates = self
			.load_candidates(
				lexicon,
				title,
				brand.as_deref(),
				self.cfg.listings.resolve_candidate_limit,
			)
			.await?;
		let matcher = Matcher::new(lexicon);

		Ok(matcher
			.find_best_matches(title, &candidates, self.cfg.listings.resolve_min_score)
			.into_iter()
			.next())
	}
}

pub fn entry_from_row(row: &InstrumentRow) -> CatalogEntry {
	let category = row.category.parse::<Category>().unwrap_or_else(|_| {
		tracing::warn!(
			instrument_id = %row.instrument_id,
			category = %row.category,
			"Unknown instrument category."
		);

		Category::Other
	});

	CatalogEntry::new(
		row.instrument_id,
		&row.brand,
		&row.name,
		category,
		row.reference_price,
		row.image_url.clone(),
	)
}

/// ILIKE patterns for the raw query tokens and every alias expansion.
pub fn candidate_patterns(lexicon: &Lexicon, query: &str) -> Vec<String> {
	let mut terms: Vec<String> = Vec::new();

	for term in tokenize(query).into_iter().chain(
		expand_aliases(lexicon, query).into_iter().map(|alias| alias.trim().to_lowercase()),
	) {
		// Single characters match nearly every row.
		if term.chars().count() < 2 || terms.contains(&term) {
			continue;
		}

		terms.push(term);
	}

	terms.iter().map(|term| queries::like_pattern(term)).collect()
}
