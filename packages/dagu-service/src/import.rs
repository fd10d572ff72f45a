//! Bulk catalog import. Rows are processed one by one; a bad row is reported and skipped without
//! aborting the batch.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use dagu_domain::{Category, catalog::canonical_key};
use dagu_storage::models::NewInstrument;

use crate::{DaguService, Error, Result};

pub const MAX_IMPORT_ROWS: usize = 5_000;

#[derive(Clone, Debug, Deserialize)]
pub struct ImportInstrumentsRequest {
	pub rows: Vec<ImportRow>,
	/// Overwrite entries that already exist instead of skipping them.
	#[serde(default)]
	pub update: bool,
	/// Classify every row without writing anything.
	#[serde(default)]
	pub dry_run: bool,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ImportRow {
	#[serde(default)]
	pub brand: String,
	#[serde(default)]
	pub name: String,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub reference_price: Option<ImportPrice>,
	#[serde(default)]
	pub image_url: Option<String>,
}

/// Spreadsheet exports carry prices either as numbers or as text such as `"1,290,000"`.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ImportPrice {
	Number(i64),
	Text(String),
}
impl ImportPrice {
	/// Anything that is not a non-negative whole number counts as no reference price.
	pub fn value(&self) -> i64 {
		match self {
			Self::Number(value) => (*value).max(0),
			Self::Text(raw) => {
				let digits = raw.replace(',', "");
				let digits = digits.trim();

				if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
					digits.parse().unwrap_or(0)
				} else {
					0
				}
			},
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportOutcome {
	Created,
	Updated,
	Skipped,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportRowError {
	/// 1-based position in the submitted rows.
	pub row: usize,
	pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
	pub created: u32,
	pub updated: u32,
	pub skipped: u32,
	pub dry_run: bool,
	pub errors: Vec<ImportRowError>,
}

impl DaguService {
	pub async fn import_instruments(&self, req: ImportInstrumentsRequest) -> Result<ImportReport> {
		if req.rows.len() > MAX_IMPORT_ROWS {
			return Err(Error::InvalidRequest {
				message: format!("At most {MAX_IMPORT_ROWS} rows may be imported at once."),
			});
		}

		let mut report = ImportReport { dry_run: req.dry_run, ..Default::default() };

		for (idx, row) in req.rows.iter().enumerate() {
			match self.import_row(row, req.update, req.dry_run).await {
				Ok(ImportOutcome::Created) => report.created += 1,
				Ok(ImportOutcome::Updated) => report.updated += 1,
				Ok(ImportOutcome::Skipped) => report.skipped += 1,
				Err(err) => {
					tracing::warn!(row = idx + 1, error = %err, "Import row failed.");

					report.errors.push(ImportRowError { row: idx + 1, message: err.to_string() });
				},
			}
		}

		tracing::info!(
			created = report.created,
			updated = report.updated,
			skipped = report.skipped,
			errors = report.errors.len(),
			dry_run = report.dry_run,
			"Instrument import finished."
		);

		Ok(report)
	}

	async fn import_row(
		&self,
		row: &ImportRow,
		update: bool,
		dry_run: bool,
	) -> Result<ImportOutcome> {
		let brand = canonical_key(&row.brand);
		let name = canonical_key(&row.name);

		if brand.is_empty() || name.is_empty() {
			return Err(Error::InvalidRequest {
				message: "brand and name must be non-empty.".to_string(),
			});
		}

		let existing = self.stores.catalog.find_instrument(&brand, &name).await?;
		let outcome = match (existing.is_some(), update) {
			(true, false) => return Ok(ImportOutcome::Skipped),
			(true, true) => ImportOutcome::Updated,
			(false, _) => ImportOutcome::Created,
		};

		if dry_run {
			return Ok(outcome);
		}

		let category = import_category(
			row.category.as_deref(),
			existing.as_ref().map(|stored| stored.category.as_str()),
		);
		let reference_price = row
			.reference_price
			.as_ref()
			.map(ImportPrice::value)
			.or(existing.as_ref().map(|stored| stored.reference_price))
			.unwrap_or(0);
		let image_url = row.image_url.as_deref().map(str::trim).filter(|url| !url.is_empty());

		self.stores
			.catalog
			.upsert_instrument(&NewInstrument {
				instrument_id: Uuid::new_v4(),
				brand: &brand,
				name: &name,
				category,
				reference_price,
				image_url,
				brand_id: None,
				now: OffsetDateTime::now_utc(),
			})
			.await?;

		Ok(outcome)
	}
}

/// A missing or unknown category keeps the stored one; new entries default to guitar.
pub fn import_category<'a>(raw: Option<&str>, existing: Option<&'a str>) -> &'a str {
	match raw.and_then(|raw| raw.parse::<Category>().ok()) {
		Some(category) => category.as_str(),
		None => existing.unwrap_or(Category::Guitar.as_str()),
	}
}
