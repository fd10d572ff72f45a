//! Query understanding: canonical forms, tokens, alias expansion, brand and category inference.

use crate::{catalog::Category, lexicon::Lexicon};

/// Lowercases and removes every hyphen, underscore and whitespace char.
///
/// The result is a comparison key only and is never shown to users.
pub fn normalize(text: &str) -> String {
	text.trim()
		.to_lowercase()
		.chars()
		.filter(|ch| !matches!(ch, '-' | '_') && !ch.is_whitespace())
		.collect()
}

/// Lowercased whitespace tokens, plus the separator-free variant of any token that had one.
pub fn tokenize(query: &str) -> Vec<String> {
	let mut out = Vec::new();

	for token in query.to_lowercase().split_whitespace() {
		push_unique(&mut out, token.to_string());

		if token.contains(['-', '_']) {
			let joined: String = token.chars().filter(|ch| !matches!(ch, '-' | '_')).collect();

			if !joined.is_empty() {
				push_unique(&mut out, joined);
			}
		}
	}

	out
}

/// The query itself followed by every canonical model name it resolves to.
pub fn expand_aliases(lexicon: &Lexicon, query: &str) -> Vec<String> {
	let lowered = query.trim().to_lowercase();
	let mut out = vec![query.to_string()];
	let mut keys = vec![normalize(query), lowered.clone()];

	for token in lowered.split_whitespace() {
		keys.push(normalize(token));
		keys.push(token.to_string());
	}

	for key in keys {
		if let Some(target) = lexicon.model_alias(&key) {
			push_unique(&mut out, target.to_string());
		}
	}

	out
}

/// Best guess at the brand the user typed.
///
/// Localized spellings win over known brand names, and both win over the first-word
/// heuristic. The heuristic refuses words the lexicon knows as model names or category words,
/// which keeps "SM57" or "DS-1" from being read as a brand.
pub fn extract_brand(lexicon: &Lexicon, query: &str) -> Option<String> {
	let lowered = query.trim().to_lowercase();

	if lowered.is_empty() {
		return None;
	}
	if let Some((spelling, _)) =
		earliest_match(&lowered, lexicon.brand_translations().map(|(spelling, _)| spelling))
	{
		return lexicon.translate(spelling).map(str::to_string);
	}
	if let Some((brand, _)) =
		earliest_match(&lowered, lexicon.known_brands().iter().map(String::as_str))
	{
		return Some(brand.to_string());
	}

	let first = lowered.split_whitespace().next()?;

	if first.chars().count() <= 2 {
		return None;
	}
	if lexicon.is_alias_key(first)
		|| lexicon.is_alias_key(&normalize(first))
		|| lexicon.is_category_keyword(first)
		|| lexicon.is_alias_target(first)
	{
		return None;
	}

	Some(first.to_string())
}

/// First category, in detection priority order, with a keyword inside `text`.
pub fn detect_category(lexicon: &Lexicon, text: &str) -> Option<Category> {
	let lowered = text.to_lowercase();

	lexicon
		.category_keywords()
		.iter()
		.find(|(_, words)| words.iter().any(|word| lowered.contains(word.as_str())))
		.map(|(category, _)| *category)
}

/// Rewrites the first localized brand spelling in the query to its canonical brand.
pub fn translate_brands(lexicon: &Lexicon, query: &str) -> String {
	let lowered = query.trim().to_lowercase();
	let Some((spelling, start)) =
		earliest_match(&lowered, lexicon.brand_translations().map(|(spelling, _)| spelling))
	else {
		return lowered;
	};
	let Some(brand) = lexicon.translate(spelling) else {
		return lowered;
	};
	let mut out = String::with_capacity(lowered.len() + brand.len());

	out.push_str(&lowered[..start]);
	out.push_str(brand);
	out.push_str(&lowered[start + spelling.len()..]);

	out
}

/// Brand-translated query with each aliased word replaced by its canonical model name.
///
/// An alias for the whole query wins over per-word replacement. Used when no catalog entry
/// matches confidently enough to build the external query from.
pub fn rewrite_query(lexicon: &Lexicon, query: &str) -> String {
	let translated = translate_brands(lexicon, query);

	if let Some(target) = lexicon
		.model_alias(&normalize(&translated))
		.or_else(|| lexicon.model_alias(&translated))
	{
		return target.to_string();
	}

	translated
		.split_whitespace()
		.map(|token| {
			lexicon
				.model_alias(token)
				.or_else(|| lexicon.model_alias(&normalize(token)))
				.unwrap_or(token)
		})
		.collect::<Vec<_>>()
		.join(" ")
}

/// The candidate occurring earliest in `haystack`; ties go to the longer candidate.
fn earliest_match<'a, I>(haystack: &str, candidates: I) -> Option<(&'a str, usize)>
where
	I: Iterator<Item = &'a str>,
{
	let mut best: Option<(&'a str, usize)> = None;

	for candidate in candidates {
		if candidate.is_empty() {
			continue;
		}

		let Some(position) = haystack.find(candidate) else {
			continue;
		};
		let better = match best {
			None => true,
			Some((current, current_position)) =>
				position < current_position
					|| (position == current_position && candidate.len() > current.len())
					|| (position == current_position
						&& candidate.len() == current.len()
						&& candidate < current),
		};

		if better {
			best = Some((candidate, position));
		}
	}

	best
}

fn push_unique(out: &mut Vec<String>, value: String) {
	if !out.contains(&value) {
		out.push(value);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn lexicon() -> Lexicon {
		Lexicon::builtin().expect("Built-in lexicon must parse.")
	}

	#[test]
	fn normalize_strips_separators() {
		assert_eq!(normalize("DS-1"), "ds1");
		assert_eq!(normalize("ds 1"), "ds1");
		assert_eq!(normalize(" DS_1 "), "ds1");
		assert_eq!(normalize("Les  Paul\tStandard"), "lespaulstandard");
	}

	#[test]
	fn normalize_is_idempotent() {
		for raw in ["DS-1", "  Fender  American_Pro II ", "펜더 스트랫", "", "--__"] {
			let once = normalize(raw);

			assert_eq!(normalize(&once), once);
		}
	}

	#[test]
	fn tokenize_adds_joined_variants() {
		assert_eq!(tokenize("Boss DS-1 ds-1"), vec!["boss", "ds-1", "ds1"]);
		assert!(tokenize("   ").is_empty());
	}

	#[test]
	fn expand_aliases_keeps_query_first() {
		let lexicon = lexicon();
		let expanded = expand_aliases(&lexicon, "ds1");

		assert_eq!(expanded[0], "ds1");
		assert!(expanded.iter().any(|form| form == "DS-1"));

		let expanded = expand_aliases(&lexicon, "펜더 스트랫");

		assert!(expanded.iter().any(|form| form == "Stratocaster"));
	}

	#[test]
	fn extract_brand_prefers_translations() {
		let lexicon = lexicon();

		assert_eq!(extract_brand(&lexicon, "펜더 스트랫").as_deref(), Some("fender"));
		assert_eq!(extract_brand(&lexicon, "Fender Stratocaster").as_deref(), Some("fender"));
		assert_eq!(extract_brand(&lexicon, "Kiwami custom").as_deref(), Some("kiwami"));
	}

	#[test]
	fn extract_brand_skips_model_numbers() {
		let lexicon = lexicon();

		assert_eq!(extract_brand(&lexicon, "SM57"), None);
		assert_eq!(extract_brand(&lexicon, "DS-1"), None);
		assert_eq!(extract_brand(&lexicon, "ab"), None);
		assert_eq!(extract_brand(&lexicon, "  "), None);
	}

	#[test]
	fn detect_category_follows_priority() {
		let lexicon = lexicon();

		assert_eq!(detect_category(&lexicon, "Fender Jazz Bass"), Some(Category::Bass));
		assert_eq!(detect_category(&lexicon, "오버드라이브 페달"), Some(Category::Effect));
		assert_eq!(detect_category(&lexicon, "Marshall JCM800"), Some(Category::Amp));
		assert_eq!(detect_category(&lexicon, "SM57"), Some(Category::Mic));
		assert_eq!(detect_category(&lexicon, "Gibson Les Paul Standard"), None);
	}

	#[test]
	fn translate_brands_rewrites_first_spelling() {
		let lexicon = lexicon();

		assert_eq!(translate_brands(&lexicon, "펜더 재즈마스터"), "fender 재즈마스터");
		assert_eq!(translate_brands(&lexicon, "Gibson LP"), "gibson lp");
	}

	#[test]
	fn rewrite_query_replaces_aliased_words() {
		let lexicon = lexicon();

		assert_eq!(rewrite_query(&lexicon, "ds1"), "DS-1");
		assert_eq!(rewrite_query(&lexicon, "boss ds1"), "boss DS-1");
		assert_eq!(rewrite_query(&lexicon, "  Gibson   Les Paul "), "gibson les paul");
	}
}
