use std::{
	collections::BTreeMap,
	fs,
	path::{Path, PathBuf},
	sync::{Arc, RwLock},
};

use ahash::{AHashMap, AHashSet};
use serde::Deserialize;

use crate::catalog::Category;

pub type LexiconResult<T, E = LexiconError> = std::result::Result<T, E>;

const BUILTIN_LEXICON: &str = include_str!("../lexicon/default.toml");

/// Order in which query categories are detected. The first category with a keyword hit wins.
const CATEGORY_PRIORITY: [Category; 5] =
	[Category::Bass, Category::Effect, Category::Amp, Category::Acoustic, Category::Mic];

#[derive(Debug, thiserror::Error)]
pub enum LexiconError {
	#[error("Failed to read lexicon file at {path:?}.")]
	Read { path: PathBuf, source: std::io::Error },
	#[error("Failed to parse lexicon document.")]
	Parse { source: toml::de::Error },
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LexiconFile {
	guitar_brands: Vec<String>,
	known_brands: Vec<String>,
	blacklist: Vec<String>,
	blacklist_exceptions: Vec<String>,
	accessory_categories: Vec<String>,
	query_exclusions: Vec<String>,
	used_indicators: Vec<String>,
	genuine_indicators: Vec<String>,
	brand_translations: BTreeMap<String, String>,
	model_aliases: BTreeMap<String, String>,
	brand_hierarchy: BTreeMap<String, Vec<String>>,
	token_synonyms: BTreeMap<String, Vec<String>>,
	category_keywords: CategoryKeywordsFile,
	category_filters: CategoryFiltersFile,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CategoryKeywordsFile {
	bass: Vec<String>,
	effect: Vec<String>,
	amp: Vec<String>,
	acoustic: Vec<String>,
	mic: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CategoryFiltersFile {
	pedal: Vec<String>,
	amp: Vec<String>,
	acoustic: Vec<String>,
	instrument: Vec<String>,
	effect_confirm: Vec<String>,
	mic_confirm: Vec<String>,
	mic_exclude: Vec<String>,
}

/// Keyword sets the filter cascade uses to spot a result whose title belongs to another
/// category than the one searched for.
#[derive(Clone, Debug, Default)]
pub struct MismatchKeywords {
	pub pedal: Vec<String>,
	pub amp: Vec<String>,
	pub acoustic: Vec<String>,
	pub instrument: Vec<String>,
	pub effect_confirm: Vec<String>,
	pub mic_confirm: Vec<String>,
	pub mic_exclude: Vec<String>,
}

/// Immutable lookup tables for query understanding and result filtering.
///
/// Every key is lowercased and trimmed at construction, so lookups expect lowercased input.
/// Model-alias targets keep their display casing.
#[derive(Clone, Debug, Default)]
pub struct Lexicon {
	brand_translations: AHashMap<String, String>,
	model_aliases: AHashMap<String, String>,
	alias_targets: AHashSet<String>,
	brand_hierarchy: AHashMap<String, Vec<String>>,
	token_synonyms: AHashMap<String, Vec<String>>,
	known_brands: Vec<String>,
	known_brand_set: AHashSet<String>,
	category_keywords: Vec<(Category, Vec<String>)>,
	category_keyword_set: AHashSet<String>,
	mismatch: MismatchKeywords,
	blacklist: Vec<String>,
	blacklist_exceptions: Vec<String>,
	accessory_categories: Vec<String>,
	query_exclusions: Vec<String>,
	used_indicators: Vec<String>,
	genuine_indicators: Vec<String>,
}
impl Lexicon {
	/// The table compiled into the binary.
	pub fn builtin() -> LexiconResult<Self> {
		Self::from_toml_str(BUILTIN_LEXICON)
	}

	pub fn load(path: &Path) -> LexiconResult<Self> {
		let raw = fs::read_to_string(path)
			.map_err(|err| LexiconError::Read { path: path.to_path_buf(), source: err })?;

		Self::from_toml_str(&raw)
	}

	pub fn from_toml_str(raw: &str) -> LexiconResult<Self> {
		let file: LexiconFile =
			toml::from_str(raw).map_err(|err| LexiconError::Parse { source: err })?;

		Ok(Self::from_file(file))
	}

	fn from_file(file: LexiconFile) -> Self {
		let brand_translations: AHashMap<String, String> = file
			.brand_translations
			.into_iter()
			.filter_map(|(spelling, brand)| {
				let spelling = clean(&spelling);
				let brand = clean(&brand);

				(!spelling.is_empty() && !brand.is_empty()).then_some((spelling, brand))
			})
			.collect();
		let model_aliases: AHashMap<String, String> = file
			.model_aliases
			.into_iter()
			.filter_map(|(alias, target)| {
				let alias = clean(&alias);
				let target = target.trim().to_string();

				(!alias.is_empty() && !target.is_empty()).then_some((alias, target))
			})
			.collect();
		let alias_targets = model_aliases.values().map(|target| clean(target)).collect();
		let brand_hierarchy = file
			.brand_hierarchy
			.into_iter()
			.filter_map(|(parent, subs)| {
				let parent = clean(&parent);

				(!parent.is_empty()).then(|| (parent, clean_list(subs)))
			})
			.collect();
		let token_synonyms = synonym_groups(file.token_synonyms);
		let mut known_brands = clean_list(
			file.known_brands
				.into_iter()
				.chain(file.guitar_brands)
				.chain(brand_translations.values().cloned())
				.collect(),
		);

		known_brands.sort();

		let known_brand_set = known_brands.iter().cloned().collect();
		let keywords = file.category_keywords;
		let mut by_category: AHashMap<Category, Vec<String>> = AHashMap::new();

		by_category.insert(Category::Bass, clean_list(keywords.bass));
		by_category.insert(Category::Effect, clean_list(keywords.effect));
		by_category.insert(Category::Amp, clean_list(keywords.amp));
		by_category.insert(Category::Acoustic, clean_list(keywords.acoustic));
		by_category.insert(Category::Mic, clean_list(keywords.mic));

		let category_keywords: Vec<(Category, Vec<String>)> = CATEGORY_PRIORITY
			.iter()
			.map(|category| (*category, by_category.remove(category).unwrap_or_default()))
			.collect();
		let category_keyword_set = category_keywords
			.iter()
			.flat_map(|(_, words)| words.iter().cloned())
			.collect();
		let filters = file.category_filters;

		Self {
			brand_translations,
			model_aliases,
			alias_targets,
			brand_hierarchy,
			token_synonyms,
			known_brands,
			known_brand_set,
			category_keywords,
			category_keyword_set,
			mismatch: MismatchKeywords {
				pedal: clean_list(filters.pedal),
				amp: clean_list(filters.amp),
				acoustic: clean_list(filters.acoustic),
				instrument: clean_list(filters.instrument),
				effect_confirm: clean_list(filters.effect_confirm),
				mic_confirm: clean_list(filters.mic_confirm),
				mic_exclude: clean_list(filters.mic_exclude),
			},
			blacklist: clean_list(file.blacklist),
			blacklist_exceptions: clean_list(file.blacklist_exceptions),
			accessory_categories: clean_list(file.accessory_categories),
			query_exclusions: clean_list(file.query_exclusions),
			used_indicators: clean_list(file.used_indicators),
			genuine_indicators: clean_list(file.genuine_indicators),
		}
	}

	pub fn brand_translations(&self) -> impl Iterator<Item = (&str, &str)> {
		self.brand_translations.iter().map(|(spelling, brand)| (spelling.as_str(), brand.as_str()))
	}

	pub fn translate(&self, spelling: &str) -> Option<&str> {
		self.brand_translations.get(spelling).map(String::as_str)
	}

	/// Every localized spelling that maps to `brand`.
	pub fn aliases_for_brand(&self, brand: &str) -> Vec<&str> {
		let mut aliases: Vec<&str> = self
			.brand_translations
			.iter()
			.filter(|(_, canonical)| canonical.as_str() == brand)
			.map(|(spelling, _)| spelling.as_str())
			.collect();

		aliases.sort_unstable();

		aliases
	}

	pub fn model_alias(&self, key: &str) -> Option<&str> {
		self.model_aliases.get(key).map(String::as_str)
	}

	pub fn is_alias_key(&self, key: &str) -> bool {
		self.model_aliases.contains_key(key)
	}

	/// True when `value`, lowercased, is the target of some model alias.
	pub fn is_alias_target(&self, value: &str) -> bool {
		self.alias_targets.contains(value)
	}

	pub fn sub_brands(&self, parent: &str) -> &[String] {
		self.brand_hierarchy.get(parent).map(Vec::as_slice).unwrap_or(&[])
	}

	/// Tokens interchangeable with `token`. The relation is symmetric.
	pub fn synonyms(&self, token: &str) -> &[String] {
		self.token_synonyms.get(token).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn known_brands(&self) -> &[String] {
		&self.known_brands
	}

	pub fn is_known_brand(&self, brand: &str) -> bool {
		self.known_brand_set.contains(brand)
	}

	/// Query-detection keywords in detection priority order.
	pub fn category_keywords(&self) -> &[(Category, Vec<String>)] {
		&self.category_keywords
	}

	pub fn is_category_keyword(&self, word: &str) -> bool {
		self.category_keyword_set.contains(word)
	}

	pub fn mismatch(&self) -> &MismatchKeywords {
		&self.mismatch
	}

	pub fn blacklist(&self) -> &[String] {
		&self.blacklist
	}

	pub fn blacklist_exceptions(&self) -> &[String] {
		&self.blacklist_exceptions
	}

	pub fn accessory_categories(&self) -> &[String] {
		&self.accessory_categories
	}

	pub fn query_exclusions(&self) -> &[String] {
		&self.query_exclusions
	}

	pub fn used_indicators(&self) -> &[String] {
		&self.used_indicators
	}

	pub fn genuine_indicators(&self) -> &[String] {
		&self.genuine_indicators
	}
}

/// Shared holder for the active lexicon.
///
/// Readers take an `Arc` snapshot and keep using it for the rest of their request. A reload
/// swaps the pointer and never mutates a snapshot that is already handed out.
#[derive(Debug)]
pub struct LexiconHandle {
	current: RwLock<Arc<Lexicon>>,
	source: Option<PathBuf>,
}
impl LexiconHandle {
	pub fn new(lexicon: Lexicon) -> Self {
		Self { current: RwLock::new(Arc::new(lexicon)), source: None }
	}

	/// Loads from `path` when given, else from the built-in table.
	pub fn from_source(path: Option<&Path>) -> LexiconResult<Self> {
		let lexicon = match path {
			Some(path) => Lexicon::load(path)?,
			None => Lexicon::builtin()?,
		};

		Ok(Self {
			current: RwLock::new(Arc::new(lexicon)),
			source: path.map(Path::to_path_buf),
		})
	}

	pub fn current(&self) -> Arc<Lexicon> {
		self.current.read().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn reload(&self, lexicon: Lexicon) {
		*self.current.write().unwrap_or_else(|err| err.into_inner()) = Arc::new(lexicon);
	}

	pub fn reload_from(&self, path: &Path) -> LexiconResult<()> {
		let lexicon = Lexicon::load(path)?;

		self.reload(lexicon);

		Ok(())
	}

	/// Re-reads the source the handle was created from.
	pub fn refresh(&self) -> LexiconResult<()> {
		let lexicon = match self.source.as_deref() {
			Some(path) => Lexicon::load(path)?,
			None => Lexicon::builtin()?,
		};

		self.reload(lexicon);

		Ok(())
	}
}

fn clean(raw: &str) -> String {
	raw.trim().to_lowercase()
}

fn clean_list(raw: Vec<String>) -> Vec<String> {
	let mut seen = AHashSet::with_capacity(raw.len());
	let mut out = Vec::with_capacity(raw.len());

	for item in raw {
		let item = clean(&item);

		if item.is_empty() || !seen.insert(item.clone()) {
			continue;
		}

		out.push(item);
	}

	out
}

fn synonym_groups(raw: BTreeMap<String, Vec<String>>) -> AHashMap<String, Vec<String>> {
	let mut out: AHashMap<String, Vec<String>> = AHashMap::new();

	for (key, values) in raw {
		let mut group = vec![key];

		group.extend(values);

		let group = clean_list(group);

		for member in &group {
			let entry = out.entry(member.clone()).or_default();

			for other in &group {
				if other != member && !entry.contains(other) {
					entry.push(other.clone());
				}
			}
		}
	}

	out
}
