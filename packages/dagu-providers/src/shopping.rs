//! Client for the external shopping search.

use std::{collections::HashSet, sync::Arc, time::Duration};

use reqwest::{
	Client,
	header::{HeaderMap, HeaderName, HeaderValue},
};
use serde_json::Value;
use tokio::task::JoinSet;

use dagu_domain::ExternalResultItem;

use crate::{Error, Result};

/// Largest `start` offset the upstream accepts.
pub const MAX_START: u32 = 1_000;

const CLIENT_ID_HEADER: HeaderName = HeaderName::from_static("x-naver-client-id");
const CLIENT_SECRET_HEADER: HeaderName = HeaderName::from_static("x-naver-client-secret");

struct PageRequest {
	client: Client,
	url: String,
	headers: HeaderMap,
	query: Arc<str>,
	page_size: u32,
	sort: String,
	exclude: Option<String>,
}

pub fn auth_headers(client_id: &str, client_secret: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(CLIENT_ID_HEADER, HeaderValue::from_str(client_id.trim())?);
	headers.insert(CLIENT_SECRET_HEADER, HeaderValue::from_str(client_secret.trim())?);

	Ok(headers)
}

/// 1-based page offsets covering `target_count` results.
pub fn page_starts(page_size: u32, target_count: u32) -> Vec<u32> {
	if page_size == 0 {
		return Vec::new();
	}

	let mut starts = Vec::new();
	let mut start = 1;

	while start <= target_count.max(1) && start <= MAX_START {
		starts.push(start);
		start += page_size;
	}

	starts
}

/// Fetches every page for `query` concurrently and returns the raw items in page order.
///
/// A page that fails or times out contributes nothing. Items repeated across pages are kept
/// once, keyed by link.
pub async fn search(cfg: &dagu_config::Shopping, query: &str) -> Result<Vec<ExternalResultItem>> {
	let (client_id, client_secret) = cfg.credentials().ok_or(Error::NotConfigured)?;
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let request = Arc::new(PageRequest {
		client,
		url: format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path),
		headers: auth_headers(client_id, client_secret)?,
		query: Arc::from(query),
		page_size: cfg.page_size.min(100),
		sort: cfg.sort.clone(),
		exclude: cfg.exclude.clone(),
	});
	let mut tasks = JoinSet::new();

	for start in page_starts(request.page_size, cfg.target_count) {
		let request = request.clone();

		tasks.spawn(async move { (start, fetch_page(&request, start).await) });
	}

	let mut pages = Vec::new();

	while let Some(joined) = tasks.join_next().await {
		match joined {
			Ok((start, Ok(items))) => pages.push((start, items)),
			Ok((start, Err(err))) => {
				tracing::warn!(error = %err, start, "Shopping search page failed.");
			},
			Err(err) => {
				tracing::warn!(error = %err, "Shopping search page task failed.");
			},
		}
	}

	pages.sort_by_key(|(start, _)| *start);

	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for (_, items) in pages {
		for item in items {
			if !item.link.is_empty() && !seen.insert(item.link.clone()) {
				continue;
			}

			out.push(item);
		}
	}

	tracing::info!(query = %query, items = out.len(), "Shopping search fetched.");

	Ok(out)
}

async fn fetch_page(request: &PageRequest, start: u32) -> Result<Vec<ExternalResultItem>> {
	let mut params = vec![
		("query", request.query.to_string()),
		("display", request.page_size.to_string()),
		("start", start.to_string()),
		("sort", request.sort.clone()),
	];

	if let Some(exclude) = request.exclude.as_deref() {
		params.push(("exclude", exclude.to_string()));
	}

	let res = request
		.client
		.get(&request.url)
		.headers(request.headers.clone())
		.query(&params)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_items(json)
}

/// Reads the `items` array of a search response. Items that do not deserialize are skipped.
pub fn parse_items(json: Value) -> Result<Vec<ExternalResultItem>> {
	let Some(Value::Array(items)) = json.get("items").cloned() else {
		return Err(Error::InvalidResponse {
			message: "Shopping search response is missing items array.".to_string(),
		});
	};
	let mut out = Vec::with_capacity(items.len());

	for raw in items {
		match serde_json::from_value::<ExternalResultItem>(raw) {
			Ok(item) => out.push(item),
			Err(err) => tracing::debug!(error = %err, "Skipping malformed shopping item."),
		}
	}

	Ok(out)
}
