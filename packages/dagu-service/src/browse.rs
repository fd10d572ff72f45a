//! Paged reads over the catalog and the visible user listings.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use dagu_domain::{Category, Source, catalog::canonical_key};
use dagu_storage::models::{InstrumentFilter, ListingFilter};

use crate::{
	DaguService, Error, InstrumentResponse, ListingResponse, Result,
	admin::instrument_response,
	listings::{listing_not_found, listing_response},
};

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct InstrumentQuery {
	#[serde(default)]
	pub brand: Option<String>,
	#[serde(default)]
	pub category: Option<String>,
	/// Whitespace-separated terms; each must appear in the brand or the name.
	#[serde(default)]
	pub search: Option<String>,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub offset: Option<u32>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ListingQuery {
	#[serde(default)]
	pub instrument_id: Option<Uuid>,
	#[serde(default)]
	pub source: Option<String>,
	#[serde(default)]
	pub min_price: Option<i64>,
	#[serde(default)]
	pub max_price: Option<i64>,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub offset: Option<u32>,
}

#[derive(Clone, Debug, Serialize)]
pub struct InstrumentPage {
	pub items: Vec<InstrumentResponse>,
	pub limit: u32,
	pub offset: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ListingPage {
	pub items: Vec<ListingResponse>,
	pub limit: u32,
	pub offset: u32,
}

impl DaguService {
	pub async fn list_instruments(&self, query: InstrumentQuery) -> Result<InstrumentPage> {
		let (limit, offset) = page_bounds(query.limit, query.offset)?;
		let brand = non_blank(query.brand.as_deref()).map(canonical_key);
		let category = match non_blank(query.category.as_deref()) {
			Some(raw) => Some(raw.parse::<Category>().map_err(|_| Error::InvalidRequest {
				message: format!("Unknown category {raw:?}."),
			})?),
			None => None,
		};
		let terms = query
			.search
			.as_deref()
			.map(|raw| raw.split_whitespace().map(canonical_key).collect::<Vec<_>>())
			.unwrap_or_default();
		let filter = InstrumentFilter {
			brand: brand.as_deref(),
			category: category.map(Category::as_str),
			terms: &terms,
		};
		let rows = self
			.stores
			.catalog
			.list_instruments(&filter, i64::from(limit), i64::from(offset))
			.await?;

		Ok(InstrumentPage {
			items: rows.into_iter().map(instrument_response).collect(),
			limit,
			offset,
		})
	}

	pub async fn get_instrument(&self, instrument_id: Uuid) -> Result<InstrumentResponse> {
		let row = self
			.stores
			.catalog
			.get_instrument(instrument_id)
			.await?
			.ok_or_else(instrument_not_found)?;

		Ok(instrument_response(row))
	}

	/// Removes a catalog entry. Its listings go with it.
	pub async fn delete_instrument(&self, instrument_id: Uuid) -> Result<()> {
		if !self.stores.catalog.delete_instrument(instrument_id).await? {
			return Err(instrument_not_found());
		}

		tracing::info!(instrument_id = %instrument_id, "Instrument deleted.");

		Ok(())
	}

	/// Visible listings only, newest first.
	pub async fn list_listings(&self, query: ListingQuery) -> Result<ListingPage> {
		let (limit, offset) = page_bounds(query.limit, query.offset)?;

		for (field, value) in [("min_price", query.min_price), ("max_price", query.max_price)] {
			if value.is_some_and(|price| price < 0) {
				return Err(Error::InvalidRequest {
					message: format!("{field} must be zero or greater."),
				});
			}
		}

		if let (Some(min), Some(max)) = (query.min_price, query.max_price)
			&& min > max
		{
			return Err(Error::InvalidRequest {
				message: "min_price must not exceed max_price.".to_string(),
			});
		}

		let source = match non_blank(query.source.as_deref()) {
			Some(raw) => Some(raw.parse::<Source>().map_err(|_| Error::InvalidRequest {
				message: format!("Unknown listing source {raw:?}."),
			})?),
			None => None,
		};
		let filter = ListingFilter {
			instrument_id: query.instrument_id,
			source: source.map(Source::as_str),
			min_price: query.min_price,
			max_price: query.max_price,
		};
		let rows = self
			.stores
			.listings
			.list_visible(&filter, OffsetDateTime::now_utc(), i64::from(limit), i64::from(offset))
			.await?;

		Ok(ListingPage {
			items: rows
				.into_iter()
				.map(|row| listing_response(row.listing, Some(row.reference_price)))
				.collect(),
			limit,
			offset,
		})
	}

	/// Hidden, expired and inactive listings read as not found.
	pub async fn get_listing(&self, listing_id: Uuid) -> Result<ListingResponse> {
		let row = self
			.stores
			.listings
			.get_visible(listing_id, OffsetDateTime::now_utc())
			.await?
			.ok_or_else(listing_not_found)?;

		Ok(listing_response(row.listing, Some(row.reference_price)))
	}
}

fn page_bounds(limit: Option<u32>, offset: Option<u32>) -> Result<(u32, u32)> {
	let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE);

	if !(1..=MAX_PAGE_SIZE).contains(&limit) {
		return Err(Error::InvalidRequest {
			message: format!("limit must be between 1 and {MAX_PAGE_SIZE}."),
		});
	}

	Ok((limit, offset.unwrap_or(0)))
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
	raw.map(str::trim).filter(|value| !value.is_empty())
}

fn instrument_not_found() -> Error {
	Error::NotFound { message: "Instrument not found.".to_string() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn page_bounds_default_and_reject_out_of_range() {
		assert_eq!(page_bounds(None, None).expect("Defaults must pass."), (50, 0));
		assert_eq!(page_bounds(Some(200), Some(400)).expect("Max must pass."), (200, 400));
		assert!(page_bounds(Some(0), None).is_err());
		assert!(page_bounds(Some(201), None).is_err());
	}
}
