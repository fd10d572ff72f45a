use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
#[error("Unknown category {0:?}.")]
pub struct UnknownCategory(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
	Guitar,
	Bass,
	Keyboard,
	Drum,
	Effect,
	Amp,
	Acoustic,
	Mic,
	Other,
}
impl Category {
	pub const ALL: [Category; 9] = [
		Category::Guitar,
		Category::Bass,
		Category::Keyboard,
		Category::Drum,
		Category::Effect,
		Category::Amp,
		Category::Acoustic,
		Category::Mic,
		Category::Other,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Category::Guitar => "guitar",
			Category::Bass => "bass",
			Category::Keyboard => "keyboard",
			Category::Drum => "drum",
			Category::Effect => "effect",
			Category::Amp => "amp",
			Category::Acoustic => "acoustic",
			Category::Mic => "mic",
			Category::Other => "other",
		}
	}

	/// Electric guitar and bass searches get the sub-brand hierarchy check.
	pub fn is_electric_string(self) -> bool {
		matches!(self, Category::Guitar | Category::Bass)
	}
}

impl fmt::Display for Category {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Category {
	type Err = UnknownCategory;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let lowered = s.trim().to_lowercase();

		match lowered.as_str() {
			"guitar" => Ok(Category::Guitar),
			"bass" => Ok(Category::Bass),
			"keyboard" => Ok(Category::Keyboard),
			"drum" => Ok(Category::Drum),
			"effect" | "pedal" => Ok(Category::Effect),
			"amp" => Ok(Category::Amp),
			"acoustic" => Ok(Category::Acoustic),
			"mic" => Ok(Category::Mic),
			"other" => Ok(Category::Other),
			_ => Err(UnknownCategory(s.to_string())),
		}
	}
}

/// One canonical instrument model. `brand` and `name` are the matching keys and are always
/// stored lowercased and trimmed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
	pub id: Uuid,
	pub brand: String,
	pub name: String,
	pub category: Category,
	pub reference_price: i64,
	pub image_url: Option<String>,
}
impl CatalogEntry {
	pub fn new(
		id: Uuid,
		brand: &str,
		name: &str,
		category: Category,
		reference_price: i64,
		image_url: Option<String>,
	) -> Self {
		Self {
			id,
			brand: canonical_key(brand),
			name: canonical_key(name),
			category,
			reference_price: reference_price.max(0),
			image_url,
		}
	}

	/// `"{brand} {name}"`, used as the fallback listing title and the optimized external query.
	pub fn display_name(&self) -> String {
		format!("{} {}", self.brand, self.name).trim().to_string()
	}

	pub fn is_placeholder(&self) -> bool {
		self.brand.is_empty() || self.brand == UNKNOWN_BRAND
	}
}

/// Brand value of entries that were imported before their brand was curated.
pub const UNKNOWN_BRAND: &str = "unknown";

pub fn canonical_key(raw: &str) -> String {
	raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn new_entry_lowercases_keys() {
		let entry =
			CatalogEntry::new(Uuid::nil(), "  BOSS ", "DS-1 ", Category::Effect, 89_000, None);

		assert_eq!(entry.brand, "boss");
		assert_eq!(entry.name, "ds-1");
		assert_eq!(entry.display_name(), "boss ds-1");
	}

	#[test]
	fn category_parses_pedal_alias() {
		assert_eq!("Pedal".parse::<Category>().ok(), Some(Category::Effect));
		assert!("synth".parse::<Category>().is_err());

		for category in Category::ALL {
			assert_eq!(category.as_str().parse::<Category>().ok(), Some(category));
		}
	}
}
