//! User-submitted second-hand listings: creation, clicks, renewal, reports and owner edits.

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use dagu_domain::{
	ReportReason, Source,
	listing::{discount_rate, is_allowed_link},
};
use dagu_storage::models::{ListingRow, NewListing, ReportCounts, ReportState};

use crate::{DaguService, Error, Result, catalog::entry_from_row};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateListingRequest {
	#[serde(default)]
	pub title: Option<String>,
	#[serde(default)]
	pub instrument_id: Option<Uuid>,
	pub price: i64,
	pub link: String,
	#[serde(default)]
	pub source: Option<String>,
	#[serde(default)]
	pub owner_id: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OwnerRequest {
	pub owner_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UpdatePriceRequest {
	pub owner_id: String,
	pub price: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReportRequest {
	pub reason: String,
	pub reporter_key: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ListingResponse {
	pub listing_id: Uuid,
	pub instrument_id: Uuid,
	pub title: String,
	pub price: i64,
	pub link: String,
	pub source: String,
	pub is_active: bool,
	pub is_under_review: bool,
	pub click_count: i64,
	pub report_count: i32,
	#[serde(with = "crate::time_serde")]
	pub expired_at: OffsetDateTime,
	#[serde(with = "crate::time_serde::option")]
	pub extended_at: Option<OffsetDateTime>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
	pub discount_rate: Option<f64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReportResponse {
	pub listing_id: Uuid,
	pub report_count: i32,
	pub is_active: bool,
	pub is_under_review: bool,
}

impl DaguService {
	pub async fn create_listing(&self, req: CreateListingRequest) -> Result<ListingResponse> {
		let now = OffsetDateTime::now_utc();
		let link = req.link.trim();

		if !is_allowed_link(link, &self.cfg.listings.allowed_domains) {
			return Err(Error::InvalidRequest {
				message: "link must be an http(s) URL on an allowed marketplace.".to_string(),
			});
		}

		self.validate_price(req.price)?;

		let source = match req.source.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
			Some(raw) => raw.parse::<Source>().map_err(|_| Error::InvalidRequest {
				message: format!("Unknown listing source {raw:?}."),
			})?,
			None => Source::infer(link),
		};
		let owner_id = req.owner_id.as_deref().map(str::trim).filter(|id| !id.is_empty());
		let title = req.title.as_deref().map(str::trim).filter(|title| !title.is_empty());

		if self.stores.listings.find_active_by_link(link).await?.is_some() {
			return Err(Error::Conflict {
				message: "An active listing with this link already exists.".to_string(),
			});
		}

		let entry = match req.instrument_id {
			Some(instrument_id) => {
				let row =
					self.stores.catalog.get_instrument(instrument_id).await?.ok_or_else(|| {
						Error::NotFound { message: "Instrument not found.".to_string() }
					})?;

				entry_from_row(&row)
			},
			None => {
				let Some(title) = title else {
					return Err(Error::InvalidRequest {
						message: "title or instrument_id is required.".to_string(),
					});
				};
				let lexicon = self.lexicon.current();
				let resolved = self.resolve_instrument(&lexicon, title).await?;

				match resolved {
					Some(result) => result.entry,
					None => {
						tracing::info!(title = %title, "Listing title did not resolve.");

						return Err(Error::InvalidRequest {
							message: "title does not match any catalog instrument.".to_string(),
						});
					},
				}
			},
		};
		let display_name = entry.display_name();
		let row = self
			.stores
			.listings
			.insert_listing(&NewListing {
				listing_id: Uuid::new_v4(),
				instrument_id: entry.id,
				price: req.price,
				link,
				source: source.as_str(),
				title: title.unwrap_or(display_name.as_str()),
				owner_id,
				expired_at: now + Duration::hours(self.cfg.listings.ttl_hours),
				now,
			})
			.await?;

		tracing::info!(
			listing_id = %row.listing_id,
			instrument_id = %row.instrument_id,
			source = %row.source,
			"Listing created."
		);

		Ok(listing_response(row, Some(entry.reference_price)))
	}

	/// Counts a click and pushes expiry out by `listings.click_extend_hours`.
	pub async fn click_listing(&self, listing_id: Uuid) -> Result<ListingResponse> {
		let now = OffsetDateTime::now_utc();
		let expired_at = now + Duration::hours(self.cfg.listings.click_extend_hours);
		let row = self
			.stores
			.listings
			.record_click(listing_id, expired_at, now)
			.await?
			.ok_or_else(listing_not_found)?;

		Ok(listing_response(row, None))
	}

	pub async fn renew_listing(
		&self,
		listing_id: Uuid,
		req: OwnerRequest,
	) -> Result<ListingResponse> {
		let now = OffsetDateTime::now_utc();

		self.owned_listing(listing_id, &req.owner_id).await?;

		let expired_at = now + Duration::hours(self.cfg.listings.renew_hours);
		let row = self
			.stores
			.listings
			.renew_listing(listing_id, expired_at, now)
			.await?
			.ok_or_else(listing_not_found)?;

		tracing::info!(listing_id = %listing_id, "Listing renewed.");

		Ok(listing_response(row, None))
	}

	pub async fn update_listing_price(
		&self,
		listing_id: Uuid,
		req: UpdatePriceRequest,
	) -> Result<ListingResponse> {
		self.validate_price(req.price)?;
		self.owned_listing(listing_id, &req.owner_id).await?;

		let row = self
			.stores
			.listings
			.update_price(listing_id, req.price, OffsetDateTime::now_utc())
			.await?
			.ok_or_else(listing_not_found)?;

		Ok(listing_response(row, None))
	}

	/// Soft delete by the owner.
	pub async fn deactivate_listing(
		&self,
		listing_id: Uuid,
		req: OwnerRequest,
	) -> Result<ListingResponse> {
		self.owned_listing(listing_id, &req.owner_id).await?;

		let row = self
			.stores
			.listings
			.deactivate_listing(listing_id, OffsetDateTime::now_utc())
			.await?
			.ok_or_else(listing_not_found)?;

		tracing::info!(listing_id = %listing_id, "Listing deactivated.");

		Ok(listing_response(row, None))
	}

	pub async fn report_listing(
		&self,
		listing_id: Uuid,
		req: ReportRequest,
	) -> Result<ReportResponse> {
		let reason = req.reason.parse::<ReportReason>().map_err(|_| Error::InvalidRequest {
			message: format!("Unknown report reason {:?}.", req.reason),
		})?;
		let reporter_key = req.reporter_key.trim();

		if reporter_key.is_empty() {
			return Err(Error::InvalidRequest { message: "reporter_key is required.".to_string() });
		}

		let listing =
			self.stores.listings.get_listing(listing_id).await?.ok_or_else(listing_not_found)?;

		if !listing.is_active {
			return Err(listing_not_found());
		}

		let now = OffsetDateTime::now_utc();

		if !self.stores.listings.add_report(listing_id, reason.as_str(), reporter_key, now).await? {
			return Err(Error::Conflict {
				message: "This reporter already reported the listing.".to_string(),
			});
		}

		let counts = self.stores.listings.report_counts(listing_id).await?;
		let state = report_state(&counts, self.cfg.listings.report_threshold);
		let row = self
			.stores
			.listings
			.set_report_state(listing_id, state, now)
			.await?
			.ok_or_else(listing_not_found)?;

		tracing::info!(
			listing_id = %listing_id,
			reason = reason.as_str(),
			report_count = row.report_count,
			deactivated = state.deactivate,
			under_review = row.is_under_review,
			"Listing reported."
		);

		Ok(ReportResponse {
			listing_id,
			report_count: row.report_count,
			is_active: row.is_active,
			is_under_review: row.is_under_review,
		})
	}

	async fn owned_listing(&self, listing_id: Uuid, owner_id: &str) -> Result<ListingRow> {
		let owner_id = owner_id.trim();

		if owner_id.is_empty() {
			return Err(Error::InvalidRequest { message: "owner_id is required.".to_string() });
		}

		let listing =
			self.stores.listings.get_listing(listing_id).await?.ok_or_else(listing_not_found)?;

		if listing.owner_id.as_deref() != Some(owner_id) {
			return Err(Error::Forbidden {
				message: "Only the listing owner may do this.".to_string(),
			});
		}

		Ok(listing)
	}

	fn validate_price(&self, price: i64) -> Result<()> {
		if !(1..=self.cfg.listings.max_price).contains(&price) {
			return Err(Error::InvalidRequest {
				message: format!("price must be between 1 and {}.", self.cfg.listings.max_price),
			});
		}

		Ok(())
	}
}

/// Deactivation wins over review once wrong-price reports alone reach the threshold.
pub fn report_state(counts: &ReportCounts, threshold: i32) -> ReportState {
	let threshold = i64::from(threshold);
	let deactivate = counts.wrong_price >= threshold;

	ReportState {
		report_count: i32::try_from(counts.total).unwrap_or(i32::MAX),
		deactivate,
		under_review: !deactivate && counts.total >= threshold,
	}
}

pub(crate) fn listing_not_found() -> Error {
	Error::NotFound { message: "Listing not found.".to_string() }
}

pub(crate) fn listing_response(row: ListingRow, reference_price: Option<i64>) -> ListingResponse {
	ListingResponse {
		discount_rate: reference_price.map(|reference| discount_rate(row.price, reference)),
		listing_id: row.listing_id,
		instrument_id: row.instrument_id,
		title: row.title,
		price: row.price,
		link: row.link,
		source: row.source,
		is_active: row.is_active,
		is_under_review: row.is_under_review,
		click_count: row.click_count,
		report_count: row.report_count,
		expired_at: row.expired_at,
		extended_at: row.extended_at,
		created_at: row.created_at,
		updated_at: row.updated_at,
	}
}
