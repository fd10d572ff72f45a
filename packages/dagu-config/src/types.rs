use std::path::PathBuf;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub shopping: Shopping,
	pub search: Search,
	pub cache: Cache,
	pub filter: Filter,
	pub listings: Listings,
	pub maintenance: Maintenance,
	#[serde(default)]
	pub lexicon: LexiconSource,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

/// External shopping-search endpoint. Blank credentials leave the external path disabled.
#[derive(Clone, Debug, Deserialize)]
pub struct Shopping {
	pub api_base: String,
	pub path: String,
	#[serde(default)]
	pub client_id: Option<String>,
	#[serde(default)]
	pub client_secret: Option<String>,
	pub timeout_ms: u64,
	pub page_size: u32,
	pub target_count: u32,
	#[serde(default = "default_sort")]
	pub sort: String,
	#[serde(default = "default_exclude")]
	pub exclude: Option<String>,
	#[serde(default)]
	pub use_exclusion_query: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Search {
	pub max_query_chars: usize,
	pub default_display: u32,
	pub max_display: u32,
	pub candidate_limit: u32,
	pub shortlist_size: usize,
	pub min_match_score: f32,
	pub confident_match_score: f32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Cache {
	pub enabled: bool,
	pub ttl_seconds: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Filter {
	pub min_price_default: i64,
	pub min_price_pedal: i64,
	pub min_price_mic: i64,
	pub reference_price_ratio: f64,
	pub reference_price_floor: i64,
	pub allowed_product_types: Vec<i32>,
	pub used_product_types: Vec<i32>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Listings {
	pub allowed_domains: Vec<String>,
	pub ttl_hours: i64,
	pub click_extend_hours: i64,
	pub renew_hours: i64,
	pub report_threshold: i32,
	pub max_price: i64,
	pub resolve_min_score: f32,
	pub resolve_candidate_limit: u32,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Maintenance {
	pub interval_seconds: u64,
	pub purge_inactive_after_days: i64,
	pub click_retention_days: i64,
}

/// Where the lexicon tables come from. `None` selects the table compiled into the binary.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LexiconSource {
	pub path: Option<PathBuf>,
}

impl Shopping {
	/// Both credentials, when present and non-blank.
	pub fn credentials(&self) -> Option<(&str, &str)> {
		match (self.client_id.as_deref(), self.client_secret.as_deref()) {
			(Some(id), Some(secret)) if !id.trim().is_empty() && !secret.trim().is_empty() =>
				Some((id, secret)),
			_ => None,
		}
	}
}

fn default_sort() -> String {
	"sim".to_string()
}

fn default_exclude() -> Option<String> {
	Some("rental".to_string())
}
