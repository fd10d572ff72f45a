use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use dagu_domain::{Category, catalog::canonical_key};
use dagu_storage::models::{BrandRow, InstrumentRow, NewBrand, NewInstrument};

use crate::{DaguService, Error, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpsertInstrumentRequest {
	pub brand: String,
	pub name: String,
	pub category: String,
	#[serde(default)]
	pub reference_price: i64,
	#[serde(default)]
	pub image_url: Option<String>,
	#[serde(default)]
	pub brand_slug: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct InstrumentResponse {
	pub instrument_id: Uuid,
	pub brand: String,
	pub name: String,
	pub category: String,
	pub reference_price: i64,
	pub image_url: Option<String>,
	pub brand_id: Option<Uuid>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpsertBrandRequest {
	pub slug: String,
	pub display_name: String,
	#[serde(default)]
	pub logo_url: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BrandResponse {
	pub brand_id: Uuid,
	pub slug: String,
	pub display_name: String,
	pub logo_url: Option<String>,
	pub description: Option<String>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Debug, Serialize)]
pub struct LexiconReloadResponse {
	pub known_brands: usize,
	#[serde(with = "crate::time_serde")]
	pub reloaded_at: OffsetDateTime,
}

impl DaguService {
	/// Inserts a catalog entry or updates the one with the same (brand, name).
	pub async fn upsert_instrument(
		&self,
		req: UpsertInstrumentRequest,
	) -> Result<InstrumentResponse> {
		let brand = canonical_key(&req.brand);
		let name = canonical_key(&req.name);

		if brand.is_empty() || name.is_empty() {
			return Err(Error::InvalidRequest {
				message: "brand and name must be non-empty.".to_string(),
			});
		}

		let category = req.category.parse::<Category>().map_err(|_| Error::InvalidRequest {
			message: format!("Unknown category {:?}.", req.category),
		})?;

		if req.reference_price < 0 {
			return Err(Error::InvalidRequest {
				message: "reference_price must be zero or greater.".to_string(),
			});
		}

		let brand_id = match req.brand_slug.as_deref().map(canonical_key) {
			Some(slug) if !slug.is_empty() => Some(
				self.stores.catalog.brand_id(&slug).await?.ok_or_else(|| Error::NotFound {
					message: format!("Brand {slug:?} not found."),
				})?,
			),
			_ => None,
		};
		let image_url = req.image_url.as_deref().map(str::trim).filter(|url| !url.is_empty());
		let row = self
			.stores
			.catalog
			.upsert_instrument(&NewInstrument {
				instrument_id: Uuid::new_v4(),
				brand: &brand,
				name: &name,
				category: category.as_str(),
				reference_price: req.reference_price,
				image_url,
				brand_id,
				now: OffsetDateTime::now_utc(),
			})
			.await?;

		tracing::info!(
			instrument_id = %row.instrument_id,
			brand = %row.brand,
			name = %row.name,
			"Instrument upserted."
		);

		Ok(instrument_response(row))
	}

	pub async fn upsert_brand(&self, req: UpsertBrandRequest) -> Result<BrandResponse> {
		let slug = canonical_key(&req.slug);
		let display_name = req.display_name.trim();

		if slug.is_empty() || display_name.is_empty() {
			return Err(Error::InvalidRequest {
				message: "slug and display_name must be non-empty.".to_string(),
			});
		}

		let row = self
			.stores
			.catalog
			.upsert_brand(&NewBrand {
				brand_id: Uuid::new_v4(),
				slug: &slug,
				display_name,
				logo_url: req.logo_url.as_deref().map(str::trim).filter(|url| !url.is_empty()),
				description: req.description.as_deref().map(str::trim).filter(|d| !d.is_empty()),
				now: OffsetDateTime::now_utc(),
			})
			.await?;

		tracing::info!(brand_id = %row.brand_id, slug = %row.slug, "Brand upserted.");

		Ok(brand_response(row))
	}

	/// Swaps in a freshly loaded lexicon. In-flight requests keep their snapshot.
	pub fn reload_lexicon(&self) -> Result<LexiconReloadResponse> {
		match self.cfg.lexicon.path.as_deref() {
			Some(path) => self.lexicon.reload_from(path)?,
			None => self.lexicon.refresh()?,
		}

		let known_brands = self.lexicon.current().known_brands().len();

		tracing::info!(known_brands, "Lexicon reloaded.");

		Ok(LexiconReloadResponse { known_brands, reloaded_at: OffsetDateTime::now_utc() })
	}
}

pub(crate) fn instrument_response(row: InstrumentRow) -> InstrumentResponse {
	InstrumentResponse {
		instrument_id: row.instrument_id,
		brand: row.brand,
		name: row.name,
		category: row.category,
		reference_price: row.reference_price,
		image_url: row.image_url,
		brand_id: row.brand_id,
		created_at: row.created_at,
		updated_at: row.updated_at,
	}
}

fn brand_response(row: BrandRow) -> BrandResponse {
	BrandResponse {
		brand_id: row.brand_id,
		slug: row.slug,
		display_name: row.display_name,
		logo_url: row.logo_url,
		description: row.description,
		created_at: row.created_at,
		updated_at: row.updated_at,
	}
}
