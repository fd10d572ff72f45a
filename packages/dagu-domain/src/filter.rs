//! Pass/reject cascade for raw external-search results.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
	catalog::Category,
	lexicon::Lexicon,
	text::{clean_title, contains_any_term, contains_term},
};

pub const EXTERNAL_SOURCE: &str = "shopping";

/// One raw result as the external search returns it. Numeric fields arrive as strings or
/// numbers depending on the upstream, so they are kept as text until the cascade parses them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalResultItem {
	pub title: String,
	pub link: String,
	pub image: String,
	#[serde(deserialize_with = "string_or_number")]
	pub lprice: String,
	#[serde(deserialize_with = "string_or_number")]
	pub hprice: String,
	pub mall_name: String,
	#[serde(deserialize_with = "string_or_number")]
	pub product_id: String,
	#[serde(deserialize_with = "string_or_number")]
	pub product_type: String,
	pub brand: String,
	pub maker: String,
	pub category1: String,
	pub category2: String,
	pub category3: String,
	pub category4: String,
}

/// A result that survived the cascade.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
	pub title: String,
	pub link: String,
	pub image: String,
	pub lprice: i64,
	pub hprice: i64,
	pub mall_name: String,
	pub product_id: String,
	pub product_type: i32,
	pub brand: String,
	pub maker: String,
	pub category1: String,
	pub category2: String,
	pub category3: String,
	pub category4: String,
	pub source: String,
	pub score: u8,
	pub is_used: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
	Pass(Box<NormalizedRecord>),
	Reject(RejectReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
	Price,
	CategoryFields,
	Blacklist,
	Category,
	Brand,
	ProductType,
	Malformed,
}
impl RejectReason {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Price => "price",
			Self::CategoryFields => "category_fields",
			Self::Blacklist => "blacklist",
			Self::Category => "category",
			Self::Brand => "brand",
			Self::ProductType => "product_type",
			Self::Malformed => "malformed",
		}
	}
}

impl fmt::Display for RejectReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// What the caller was looking for when the item was fetched.
#[derive(Clone, Copy, Debug, Default)]
pub struct FilterContext<'a> {
	pub query: &'a str,
	pub brand: Option<&'a str>,
	pub category: Option<Category>,
	pub min_price: Option<i64>,
	pub reference_price: Option<i64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FilterStats {
	pub total: u32,
	pub passed: u32,
	pub price: u32,
	pub category_fields: u32,
	pub blacklist: u32,
	pub category: u32,
	pub brand: u32,
	pub product_type: u32,
	pub malformed: u32,
}
impl FilterStats {
	pub fn record(&mut self, verdict: &Verdict) {
		self.total += 1;

		match verdict {
			Verdict::Pass(_) => self.passed += 1,
			Verdict::Reject(reason) => *self.slot(*reason) += 1,
		}
	}

	pub fn rejected(&self) -> u32 {
		self.total - self.passed
	}

	fn slot(&mut self, reason: RejectReason) -> &mut u32 {
		match reason {
			RejectReason::Price => &mut self.price,
			RejectReason::CategoryFields => &mut self.category_fields,
			RejectReason::Blacklist => &mut self.blacklist,
			RejectReason::Category => &mut self.category,
			RejectReason::Brand => &mut self.brand,
			RejectReason::ProductType => &mut self.product_type,
			RejectReason::Malformed => &mut self.malformed,
		}
	}
}

pub struct FilterCascade<'a> {
	lexicon: &'a Lexicon,
	cfg: &'a dagu_config::Filter,
}
impl<'a> FilterCascade<'a> {
	pub fn new(lexicon: &'a Lexicon, cfg: &'a dagu_config::Filter) -> Self {
		Self { lexicon, cfg }
	}

	/// Runs every stage in order and stops at the first rejection.
	pub fn evaluate(&self, item: &ExternalResultItem, ctx: &FilterContext<'_>) -> Verdict {
		let Some(lprice) = parse_price(&item.lprice) else {
			return Verdict::Reject(RejectReason::Price);
		};

		if lprice < self.price_floor(ctx) {
			return Verdict::Reject(RejectReason::Price);
		}
		if self.has_accessory_category(item) {
			return Verdict::Reject(RejectReason::CategoryFields);
		}

		let title = clean_title(&item.title);

		if title.is_empty() {
			return Verdict::Reject(RejectReason::Malformed);
		}

		let lowered = title.to_lowercase();

		if let Some(reason) = self.check_title(&lowered, ctx.brand, ctx.category) {
			return Verdict::Reject(reason);
		}

		let product_type = match parse_product_type(&item.product_type) {
			Some(code) => {
				if !self.cfg.allowed_product_types.contains(&code) {
					return Verdict::Reject(RejectReason::ProductType);
				}

				code
			},
			// An unreadable code says nothing about the listing type.
			None => 1,
		};
		let is_used = self.is_used(&lowered, product_type);
		let score = self.relevance_score(ctx.query, &lowered, &item.image);

		Verdict::Pass(Box::new(NormalizedRecord {
			title,
			link: item.link.trim().to_string(),
			image: item.image.trim().to_string(),
			lprice,
			hprice: parse_price(&item.hprice).unwrap_or(0),
			mall_name: item.mall_name.trim().to_string(),
			product_id: item.product_id.trim().to_string(),
			product_type,
			brand: item.brand.trim().to_string(),
			maker: item.maker.trim().to_string(),
			category1: item.category1.trim().to_string(),
			category2: item.category2.trim().to_string(),
			category3: item.category3.trim().to_string(),
			category4: item.category4.trim().to_string(),
			source: EXTERNAL_SOURCE.to_string(),
			score,
			is_used,
		}))
	}

	/// Filters a batch, keeping upstream order among passing items.
	pub fn evaluate_batch(
		&self,
		items: &[ExternalResultItem],
		ctx: &FilterContext<'_>,
	) -> (Vec<NormalizedRecord>, FilterStats) {
		let mut stats = FilterStats::default();
		let mut passed = Vec::new();

		for item in items {
			let verdict = self.evaluate(item, ctx);

			stats.record(&verdict);

			match verdict {
				Verdict::Pass(record) => passed.push(*record),
				Verdict::Reject(reason) => {
					tracing::debug!(reason = %reason, title = %item.title, "Result rejected.");
				},
			}
		}

		(passed, stats)
	}

	/// Blacklist, category-mismatch and brand-integrity stages over a lowercased title.
	///
	/// User listings go through this subset so both result sources follow the same text rules.
	pub fn check_title(
		&self,
		lowered_title: &str,
		brand: Option<&str>,
		category: Option<Category>,
	) -> Option<RejectReason> {
		if self.is_blacklisted(lowered_title) {
			return Some(RejectReason::Blacklist);
		}
		if let Some(category) = category
			&& self.is_category_mismatch(lowered_title, category)
		{
			return Some(RejectReason::Category);
		}
		if let Some(brand) = brand
			&& !self.brand_integrity(lowered_title, brand, category)
		{
			return Some(RejectReason::Brand);
		}

		None
	}

	/// Lowest acceptable price for a result.
	pub fn price_floor(&self, ctx: &FilterContext<'_>) -> i64 {
		if let Some(min_price) = ctx.min_price {
			return min_price;
		}
		if let Some(reference) = ctx.reference_price.filter(|price| *price > 0) {
			let scaled = (reference as f64 * self.cfg.reference_price_ratio).floor() as i64;

			return scaled.max(self.cfg.reference_price_floor);
		}

		match ctx.category {
			Some(Category::Effect) => self.cfg.min_price_pedal,
			Some(Category::Mic) => self.cfg.min_price_mic,
			_ => self.cfg.min_price_default,
		}
	}

	/// 0-100 heuristic used to order results of equal price.
	pub fn relevance_score(&self, query: &str, lowered_title: &str, image: &str) -> u8 {
		let mut tokens: Vec<String> = Vec::new();

		for token in query.to_lowercase().split_whitespace() {
			if token.chars().count() > 1 && !tokens.iter().any(|seen| seen == token) {
				tokens.push(token.to_string());
			}
		}

		let mut score = 0_u32;

		if !tokens.is_empty() {
			let matched =
				tokens.iter().filter(|token| lowered_title.contains(token.as_str())).count();
			let ratio = matched as f64 / tokens.len() as f64;

			score += (70.0 * ratio).floor() as u32;

			if matched == tokens.len() {
				score += 15;
			}
		}
		if image.contains("http") {
			score += 10;
		}
		if contains_any_term(lowered_title, self.lexicon.used_indicators()) {
			score += 5;
		}
		if contains_any_term(lowered_title, self.lexicon.genuine_indicators()) {
			score += 5;
		}

		score.min(100) as u8
	}

	fn has_accessory_category(&self, item: &ExternalResultItem) -> bool {
		let path = [&item.category1, &item.category2, &item.category3, &item.category4]
			.iter()
			.map(|field| field.trim().to_lowercase())
			.collect::<Vec<_>>()
			.join(" ");

		self.lexicon.accessory_categories().iter().any(|term| path.contains(term.as_str()))
	}

	fn is_blacklisted(&self, lowered_title: &str) -> bool {
		if contains_any_term(lowered_title, self.lexicon.blacklist_exceptions()) {
			return false;
		}

		contains_any_term(lowered_title, self.lexicon.blacklist())
	}

	fn is_category_mismatch(&self, lowered_title: &str, category: Category) -> bool {
		let keywords = self.lexicon.mismatch();
		let hits = |terms: &Vec<String>| contains_any_term(lowered_title, terms);

		match category {
			Category::Guitar | Category::Bass =>
				hits(&keywords.pedal) || hits(&keywords.amp) || hits(&keywords.acoustic),
			Category::Acoustic => hits(&keywords.pedal) || hits(&keywords.amp),
			Category::Effect =>
				!hits(&keywords.effect_confirm) && hits(&keywords.instrument),
			// Amp titles routinely name their onboard effects.
			Category::Amp => hits(&keywords.pedal) && !hits(&keywords.amp),
			Category::Mic => !hits(&keywords.mic_confirm) && hits(&keywords.mic_exclude),
			Category::Keyboard | Category::Drum | Category::Other => false,
		}
	}

	fn brand_integrity(
		&self,
		lowered_title: &str,
		brand: &str,
		category: Option<Category>,
	) -> bool {
		let target = brand.trim().to_lowercase();

		if target.is_empty() || target.contains("pending") || target == "unknown" {
			return true;
		}
		if category.is_some_and(Category::is_electric_string) {
			let mut subs = self.lexicon.sub_brands(&target);

			if subs.is_empty()
				&& let Some(core) = target.split_whitespace().next()
			{
				subs = self.lexicon.sub_brands(core);
			}
			if contains_any_term(lowered_title, subs) {
				return false;
			}
		}

		contains_term(lowered_title, &target)
			|| self
				.lexicon
				.aliases_for_brand(&target)
				.into_iter()
				.any(|alias| contains_term(lowered_title, alias))
	}

	fn is_used(&self, lowered_title: &str, product_type: i32) -> bool {
		contains_any_term(lowered_title, self.lexicon.used_indicators())
			|| self.cfg.used_product_types.contains(&product_type)
	}
}

/// Appends `-term` for every query exclusion the external search understands.
pub fn build_exclusion_query(lexicon: &Lexicon, query: &str) -> String {
	let mut out = query.trim().to_string();

	for term in lexicon.query_exclusions() {
		out.push_str(" -");
		out.push_str(term);
	}

	out
}

pub fn parse_price(raw: &str) -> Option<i64> {
	let trimmed = raw.trim().replace(',', "");

	if trimmed.is_empty() {
		return None;
	}
	if let Ok(value) = trimmed.parse::<i64>() {
		return Some(value);
	}

	trimmed
		.parse::<f64>()
		.ok()
		.filter(|value| value.is_finite() && *value >= 0.0)
		.map(|value| value.floor() as i64)
}

fn parse_product_type(raw: &str) -> Option<i32> {
	let trimmed = raw.trim();

	if trimmed.is_empty() {
		return Some(1);
	}

	trimmed.parse().ok()
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Text(String),
		Int(i64),
		Float(f64),
		Null(()),
	}

	Ok(match Raw::deserialize(deserializer)? {
		Raw::Text(text) => text,
		Raw::Int(value) => value.to_string(),
		Raw::Float(value) => value.to_string(),
		Raw::Null(()) => String::new(),
	})
}
