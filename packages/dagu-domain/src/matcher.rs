use serde::Serialize;

use crate::{
	catalog::CatalogEntry,
	lexicon::Lexicon,
	normalize::{expand_aliases, extract_brand, normalize, tokenize},
	text::similarity_ratio,
};

pub const DEFAULT_MIN_SCORE: f32 = 0.3;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
	pub entry: CatalogEntry,
	pub score: f32,
}

/// Query-side work shared by every entry scored against the same query.
#[derive(Clone, Debug)]
pub struct PreparedQuery {
	pub raw: String,
	pub normalized: String,
	pub brand: Option<String>,
	known_brand: Option<String>,
	aliases_normalized: Vec<String>,
	aliases_lowered: Vec<String>,
	tokens: Vec<String>,
}

pub struct Matcher<'a> {
	lexicon: &'a Lexicon,
}
impl<'a> Matcher<'a> {
	pub fn new(lexicon: &'a Lexicon) -> Self {
		Self { lexicon }
	}

	pub fn prepare(&self, query: &str) -> PreparedQuery {
		let brand = extract_brand(self.lexicon, query);
		let known_brand = brand
			.as_deref()
			.filter(|brand| self.lexicon.is_known_brand(brand))
			.map(normalize)
			.filter(|brand| !brand.is_empty());
		let aliases = expand_aliases(self.lexicon, query);
		let aliases_normalized = aliases.iter().map(|alias| normalize(alias)).collect();
		let aliases_lowered = aliases.iter().map(|alias| alias.trim().to_lowercase()).collect();
		let mut tokens = tokenize(query);

		for alias in &aliases {
			for token in tokenize(alias) {
				if !tokens.contains(&token) {
					tokens.push(token);
				}
			}
		}

		PreparedQuery {
			raw: query.to_string(),
			normalized: normalize(query),
			brand,
			known_brand,
			aliases_normalized,
			aliases_lowered,
			tokens,
		}
	}

	pub fn score(&self, query: &str, entry: &CatalogEntry) -> f32 {
		self.score_prepared(&self.prepare(query), entry)
	}

	/// Tiered score in `[0.0, 1.0]`. The first tier that applies decides the score.
	pub fn score_prepared(&self, query: &PreparedQuery, entry: &CatalogEntry) -> f32 {
		let name = normalize(&entry.name);
		let brand = normalize(&entry.brand);
		let q = query.normalized.as_str();

		// A known brand in the query must belong to the entry, or the entry is out.
		if let Some(wanted) = query.known_brand.as_deref()
			&& !brand.contains(wanted)
		{
			return 0.0;
		}
		if q.is_empty() {
			return 0.0;
		}
		if q == name {
			return 1.0;
		}
		if q == normalize(&format!("{} {}", entry.brand, entry.name)) {
			return 1.0;
		}
		if query.aliases_normalized.iter().any(|alias| !alias.is_empty() && *alias == name) {
			return 0.95;
		}
		if !name.is_empty() && q.contains(name.as_str()) {
			return 0.9;
		}
		if let Some(start) = name.find(q) {
			let next = name[start + q.len()..].chars().next();

			if next.is_some_and(char::is_alphanumeric) {
				return 0.5;
			}

			let gap = name.chars().count().saturating_sub(q.chars().count()) as f32;

			return 0.7 * (1.0 - 0.05 * gap).max(0.5);
		}

		let raw_name = entry.name.to_lowercase();

		if query
			.aliases_lowered
			.iter()
			.any(|alias| !alias.is_empty() && raw_name.contains(alias.as_str()))
		{
			return 0.6;
		}
		if !query.tokens.is_empty() {
			let matched = query
				.tokens
				.iter()
				.filter(|token| self.token_hits(token, &name, &brand))
				.count();

			if matched > 0 {
				return 0.4 * matched as f32 / query.tokens.len() as f32;
			}
		}

		let ratio = similarity_ratio(q, &name);

		if ratio > 0.6 {
			return 0.3 * ratio;
		}

		0.0
	}

	/// Entries scoring at least `min_score`, best first. Equal scores keep candidate order.
	pub fn find_best_matches(
		&self,
		query: &str,
		candidates: &[CatalogEntry],
		min_score: f32,
	) -> Vec<MatchResult> {
		let prepared = self.prepare(query);
		let mut out: Vec<MatchResult> = candidates
			.iter()
			.map(|entry| MatchResult {
				entry: entry.clone(),
				score: self.score_prepared(&prepared, entry),
			})
			.filter(|result| result.score >= min_score)
			.collect();

		out.sort_by(|a, b| b.score.total_cmp(&a.score));

		out
	}

	fn token_hits(&self, token: &str, name: &str, brand: &str) -> bool {
		let hits = |candidate: &str| {
			let normalized = normalize(candidate);

			!normalized.is_empty() && (name.contains(&normalized) || brand.contains(&normalized))
		};

		hits(token) || self.lexicon.synonyms(token).iter().any(|synonym| hits(synonym))
	}
}
