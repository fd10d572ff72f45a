mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Config, Filter, LexiconSource, Listings, Maintenance, Postgres, Search, Service,
	Shopping, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("service.admin_bind", &cfg.service.admin_bind),
		("storage.postgres.dsn", &cfg.storage.postgres.dsn),
		("shopping.api_base", &cfg.shopping.api_base),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.shopping.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "shopping.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if !(1..=100).contains(&cfg.shopping.page_size) {
		return Err(Error::Validation {
			message: "shopping.page_size must be in the range 1-100.".to_string(),
		});
	}
	if cfg.shopping.target_count < cfg.shopping.page_size {
		return Err(Error::Validation {
			message: "shopping.target_count must be at least shopping.page_size.".to_string(),
		});
	}
	if !matches!(cfg.shopping.sort.as_str(), "sim" | "date" | "asc" | "dsc") {
		return Err(Error::Validation {
			message: "shopping.sort must be one of sim, date, asc, or dsc.".to_string(),
		});
	}
	if cfg.search.max_query_chars == 0 {
		return Err(Error::Validation {
			message: "search.max_query_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_display == 0 {
		return Err(Error::Validation {
			message: "search.max_display must be greater than zero.".to_string(),
		});
	}
	if !(1..=cfg.search.max_display).contains(&cfg.search.default_display) {
		return Err(Error::Validation {
			message: "search.default_display must be between 1 and search.max_display."
				.to_string(),
		});
	}
	if cfg.search.candidate_limit == 0 {
		return Err(Error::Validation {
			message: "search.candidate_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.shortlist_size == 0 {
		return Err(Error::Validation {
			message: "search.shortlist_size must be greater than zero.".to_string(),
		});
	}

	for (label, score) in [
		("search.min_match_score", cfg.search.min_match_score),
		("search.confident_match_score", cfg.search.confident_match_score),
		("listings.resolve_min_score", cfg.listings.resolve_min_score),
	] {
		if !score.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if !(0.0..=1.0).contains(&score) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.search.confident_match_score < cfg.search.min_match_score {
		return Err(Error::Validation {
			message: "search.confident_match_score must be at least search.min_match_score."
				.to_string(),
		});
	}
	if cfg.cache.ttl_seconds <= 0 {
		return Err(Error::Validation {
			message: "cache.ttl_seconds must be greater than zero.".to_string(),
		});
	}

	for (label, price) in [
		("filter.min_price_default", cfg.filter.min_price_default),
		("filter.min_price_pedal", cfg.filter.min_price_pedal),
		("filter.min_price_mic", cfg.filter.min_price_mic),
		("filter.reference_price_floor", cfg.filter.reference_price_floor),
	] {
		if price < 0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	let ratio = cfg.filter.reference_price_ratio;

	if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
		return Err(Error::Validation {
			message: "filter.reference_price_ratio must be greater than 0.0 and at most 1.0."
				.to_string(),
		});
	}
	if cfg.filter.allowed_product_types.is_empty() {
		return Err(Error::Validation {
			message: "filter.allowed_product_types must be non-empty.".to_string(),
		});
	}
	if cfg.listings.allowed_domains.is_empty() {
		return Err(Error::Validation {
			message: "listings.allowed_domains must be non-empty.".to_string(),
		});
	}

	for (label, hours) in [
		("listings.ttl_hours", cfg.listings.ttl_hours),
		("listings.click_extend_hours", cfg.listings.click_extend_hours),
		("listings.renew_hours", cfg.listings.renew_hours),
		("maintenance.purge_inactive_after_days", cfg.maintenance.purge_inactive_after_days),
		("maintenance.click_retention_days", cfg.maintenance.click_retention_days),
	] {
		if hours <= 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	if cfg.listings.report_threshold <= 0 {
		return Err(Error::Validation {
			message: "listings.report_threshold must be greater than zero.".to_string(),
		});
	}
	if cfg.listings.max_price <= 0 {
		return Err(Error::Validation {
			message: "listings.max_price must be greater than zero.".to_string(),
		});
	}
	if cfg.listings.resolve_candidate_limit == 0 {
		return Err(Error::Validation {
			message: "listings.resolve_candidate_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.maintenance.interval_seconds == 0 {
		return Err(Error::Validation {
			message: "maintenance.interval_seconds must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.shopping.client_id.as_deref().map(|id| id.trim().is_empty()).unwrap_or(false) {
		cfg.shopping.client_id = None;
	}
	if cfg.shopping.client_secret.as_deref().map(|secret| secret.trim().is_empty()).unwrap_or(false)
	{
		cfg.shopping.client_secret = None;
	}
	if cfg.shopping.exclude.as_deref().map(|exclude| exclude.trim().is_empty()).unwrap_or(false) {
		cfg.shopping.exclude = None;
	}
	if cfg.lexicon.path.as_deref().map(|path| path.as_os_str().is_empty()).unwrap_or(false) {
		cfg.lexicon.path = None;
	}

	cfg.listings.allowed_domains = cfg
		.listings
		.allowed_domains
		.iter()
		.map(|domain| domain.trim().trim_start_matches('.').to_lowercase())
		.filter(|domain| !domain.is_empty())
		.collect();
}
