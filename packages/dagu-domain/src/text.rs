use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_script::{Script, UnicodeScript};

static TAG_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]*>").ok());

const ENTITIES: [(&str, &str); 7] = [
	("&nbsp;", " "),
	("&lt;", "<"),
	("&gt;", ">"),
	("&quot;", "\""),
	("&#39;", "'"),
	("&apos;", "'"),
	("&amp;", "&"),
];

/// Strips markup from an upstream title and folds it into plain single-spaced text.
pub fn clean_title(raw: &str) -> String {
	let stripped = match TAG_RE.as_ref() {
		Some(re) => re.replace_all(raw, " ").into_owned(),
		None => raw.to_string(),
	};
	let mut decoded = stripped;

	// `&amp;` goes last so `&amp;lt;` decodes to the literal text `&lt;`.
	for (entity, replacement) in ENTITIES {
		if decoded.contains(entity) {
			decoded = decoded.replace(entity, replacement);
		}
	}

	let folded: String = decoded.nfkc().collect();

	folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whether `term` occurs in `haystack`, both already lowercased.
///
/// Latin terms must sit on ASCII alphanumeric boundaries so short words like "pot" do not fire
/// inside "spot". Terms in other scripts, such as Hangul, match as plain substrings since those
/// words attach particles without a separator.
pub fn contains_term(haystack: &str, term: &str) -> bool {
	if term.is_empty() {
		return false;
	}
	if !is_latin_term(term) {
		return haystack.contains(term);
	}

	haystack.match_indices(term).any(|(start, matched)| {
		let before = haystack[..start].chars().next_back();
		let after = haystack[start + matched.len()..].chars().next();

		!before.is_some_and(|ch| ch.is_ascii_alphanumeric())
			&& !after.is_some_and(|ch| ch.is_ascii_alphanumeric())
	})
}

pub fn contains_any_term<'a, I>(haystack: &str, terms: I) -> bool
where
	I: IntoIterator<Item = &'a String>,
{
	terms.into_iter().any(|term| contains_term(haystack, term))
}

pub fn is_latin_term(term: &str) -> bool {
	term.chars().all(|ch| {
		ch.is_ascii() || matches!(ch.script(), Script::Latin | Script::Common | Script::Inherited)
	})
}

/// Longest-common-subsequence ratio `2 * M / (len_a + len_b)` over chars.
pub fn similarity_ratio(a: &str, b: &str) -> f32 {
	let left: Vec<char> = a.chars().collect();
	let right: Vec<char> = b.chars().collect();
	let total = left.len() + right.len();

	if total == 0 {
		return 1.0;
	}

	let mut prev = vec![0_usize; right.len() + 1];
	let mut row = vec![0_usize; right.len() + 1];

	for l in &left {
		for (j, r) in right.iter().enumerate() {
			row[j + 1] = if l == r { prev[j] + 1 } else { prev[j + 1].max(row[j]) };
		}

		std::mem::swap(&mut prev, &mut row);
	}

	let common = prev[right.len()];

	(2 * common) as f32 / total as f32
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clean_title_strips_markup_and_entities() {
		assert_eq!(
			clean_title("<b>Fender</b>&nbsp;Stratocaster &amp;  Case"),
			"Fender Stratocaster & Case"
		);
		assert_eq!(clean_title("ＦＥＮＤＥＲ\u{00A0}strat"), "FENDER strat");
		assert_eq!(clean_title("<b></b>  "), "");
	}

	#[test]
	fn latin_terms_need_boundaries() {
		assert!(contains_term("fender bridge pickup", "bridge"));
		assert!(!contains_term("cambridge blues", "bridge"));
		assert!(contains_term("ds-1 pedal", "ds-1"));
		assert!(contains_term("펜더case", "case"));
		assert!(!contains_term("showcase", "case"));
	}

	#[test]
	fn hangul_terms_match_as_substrings() {
		assert!(contains_term("펜더스트랫케이스포함", "케이스"));
		assert!(!contains_term("펜더 스트랫", "케이스"));
	}

	#[test]
	fn similarity_ratio_counts_common_subsequence() {
		assert_eq!(similarity_ratio("abcd", "abcd"), 1.0);
		assert_eq!(similarity_ratio("abcd", "wxyz"), 0.0);
		assert!((similarity_ratio("jcm800", "jcm900") - 10.0 / 12.0).abs() < 1e-6);
	}
}
