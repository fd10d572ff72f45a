use std::str::FromStr;

use axum::{
	Json, Router,
	extract::{
		Path, Query, State,
		rejection::{JsonRejection, PathRejection},
	},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use dagu_service::{
	BrandResponse, CreateListingRequest, Error as ServiceError, ImportInstrumentsRequest,
	ImportReport, InstrumentPage, InstrumentQuery, InstrumentResponse, LexiconReloadResponse,
	ListingPage, ListingQuery, ListingResponse, OwnerRequest, PopularSearchesResponse,
	ReportRequest, ReportResponse, SearchRequest, SearchResponse, UpdatePriceRequest,
	UpsertBrandRequest, UpsertInstrumentRequest,
};

#[derive(Debug, Deserialize)]
struct SearchParams {
	#[serde(default)]
	q: Option<String>,
	#[serde(default)]
	display: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PopularParams {
	#[serde(default)]
	limit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InstrumentParams {
	#[serde(default)]
	brand: Option<String>,
	#[serde(default)]
	category: Option<String>,
	#[serde(default)]
	search: Option<String>,
	#[serde(default)]
	limit: Option<String>,
	#[serde(default)]
	offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListingParams {
	#[serde(default)]
	instrument: Option<String>,
	#[serde(default)]
	source: Option<String>,
	#[serde(default)]
	min_price: Option<String>,
	#[serde(default)]
	max_price: Option<String>,
	#[serde(default)]
	limit: Option<String>,
	#[serde(default)]
	offset: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message, None),
			ServiceError::Conflict { message } =>
				json_error(StatusCode::CONFLICT, "conflict", message, None),
			ServiceError::Forbidden { message } =>
				json_error(StatusCode::FORBIDDEN, "forbidden", message, None),
			ServiceError::Provider { message } => {
				tracing::error!(error = %message, "Provider error.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "provider_error", message, None)
			},
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Storage error.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message, None)
			},
		}
	}
}

impl From<JsonRejection> for ApiError {
	fn from(err: JsonRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", err.body_text(), None)
	}
}

impl From<PathRejection> for ApiError {
	fn from(err: PathRejection) -> Self {
		json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			err.body_text(),
			Some(vec!["id".to_string()]),
		)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", get(search))
		.route("/v1/searches/popular", get(popular_searches))
		.route("/v1/instruments", get(list_instruments))
		.route("/v1/instruments/{id}", get(get_instrument))
		.route("/v1/listings", get(list_listings).post(create_listing))
		.route("/v1/listings/{id}", get(get_listing))
		.route("/v1/listings/{id}/click", post(click_listing))
		.route("/v1/listings/{id}/renew", post(renew_listing))
		.route("/v1/listings/{id}/report", post(report_listing))
		.route("/v1/listings/{id}/price", post(update_listing_price))
		.route("/v1/listings/{id}/deactivate", post(deactivate_listing))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/instruments", post(upsert_instrument))
		.route("/v1/admin/instruments/import", post(import_instruments))
		.route("/v1/admin/instruments/{id}", delete(delete_instrument))
		.route("/v1/admin/brands", post(upsert_brand))
		.route("/v1/admin/lexicon/reload", post(reload_lexicon))
		.with_state(state)
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

/// A blank parameter counts as absent; anything else must parse.
fn parse_param<T>(field: &str, raw: Option<String>) -> Result<Option<T>, ApiError>
where
	T: FromStr,
{
	let Some(value) = raw.as_deref().map(str::trim).filter(|value| !value.is_empty()) else {
		return Ok(None);
	};

	value.parse::<T>().map(Some).map_err(|_| {
		json_error(
			StatusCode::BAD_REQUEST,
			"invalid_request",
			format!("{field} is not a valid value."),
			Some(vec![field.to_string()]),
		)
	})
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
	let request = SearchRequest {
		query: params.q.unwrap_or_default(),
		display: parse_param("display", params.display)?,
	};
	let response = state.service.search(request).await?;

	Ok(Json(response))
}

async fn popular_searches(
	State(state): State<AppState>,
	Query(params): Query<PopularParams>,
) -> Result<Json<PopularSearchesResponse>, ApiError> {
	let limit = params.limit.and_then(|raw| raw.trim().parse::<u32>().ok());
	let response = state.service.popular_searches(limit).await?;

	Ok(Json(response))
}

async fn list_instruments(
	State(state): State<AppState>,
	Query(params): Query<InstrumentParams>,
) -> Result<Json<InstrumentPage>, ApiError> {
	let query = InstrumentQuery {
		brand: params.brand,
		category: params.category,
		search: params.search,
		limit: parse_param("limit", params.limit)?,
		offset: parse_param("offset", params.offset)?,
	};
	let response = state.service.list_instruments(query).await?;

	Ok(Json(response))
}

async fn get_instrument(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<InstrumentResponse>, ApiError> {
	let Path(id) = id?;
	let response = state.service.get_instrument(id).await?;

	Ok(Json(response))
}

async fn list_listings(
	State(state): State<AppState>,
	Query(params): Query<ListingParams>,
) -> Result<Json<ListingPage>, ApiError> {
	let query = ListingQuery {
		instrument_id: parse_param("instrument", params.instrument)?,
		source: params.source,
		min_price: parse_param("min_price", params.min_price)?,
		max_price: parse_param("max_price", params.max_price)?,
		limit: parse_param("limit", params.limit)?,
		offset: parse_param("offset", params.offset)?,
	};
	let response = state.service.list_listings(query).await?;

	Ok(Json(response))
}

async fn get_listing(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
	let Path(id) = id?;
	let response = state.service.get_listing(id).await?;

	Ok(Json(response))
}

async fn create_listing(
	State(state): State<AppState>,
	payload: Result<Json<CreateListingRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ListingResponse>), ApiError> {
	let Json(payload) = payload?;
	let response = state.service.create_listing(payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn click_listing(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
	let Path(id) = id?;
	let response = state.service.click_listing(id).await?;

	Ok(Json(response))
}

async fn renew_listing(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	payload: Result<Json<OwnerRequest>, JsonRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
	let Path(id) = id?;
	let Json(payload) = payload?;
	let response = state.service.renew_listing(id, payload).await?;

	Ok(Json(response))
}

async fn report_listing(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Json<ReportResponse>, ApiError> {
	let Path(id) = id?;
	let Json(payload) = payload?;
	let response = state.service.report_listing(id, payload).await?;

	Ok(Json(response))
}

async fn update_listing_price(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	payload: Result<Json<UpdatePriceRequest>, JsonRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
	let Path(id) = id?;
	let Json(payload) = payload?;
	let response = state.service.update_listing_price(id, payload).await?;

	Ok(Json(response))
}

async fn deactivate_listing(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
	payload: Result<Json<OwnerRequest>, JsonRejection>,
) -> Result<Json<ListingResponse>, ApiError> {
	let Path(id) = id?;
	let Json(payload) = payload?;
	let response = state.service.deactivate_listing(id, payload).await?;

	Ok(Json(response))
}

async fn upsert_instrument(
	State(state): State<AppState>,
	payload: Result<Json<UpsertInstrumentRequest>, JsonRejection>,
) -> Result<Json<InstrumentResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.upsert_instrument(payload).await?;

	Ok(Json(response))
}

async fn delete_instrument(
	State(state): State<AppState>,
	id: Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode, ApiError> {
	let Path(id) = id?;

	state.service.delete_instrument(id).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn import_instruments(
	State(state): State<AppState>,
	payload: Result<Json<ImportInstrumentsRequest>, JsonRejection>,
) -> Result<Json<ImportReport>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.import_instruments(payload).await?;

	Ok(Json(response))
}

async fn upsert_brand(
	State(state): State<AppState>,
	payload: Result<Json<UpsertBrandRequest>, JsonRejection>,
) -> Result<Json<BrandResponse>, ApiError> {
	let Json(payload) = payload?;
	let response = state.service.upsert_brand(payload).await?;

	Ok(Json(response))
}

async fn reload_lexicon(
	State(state): State<AppState>,
) -> Result<Json<LexiconReloadResponse>, ApiError> {
	let response = state.service.reload_lexicon()?;

	Ok(Json(response))
}
