//! Route handlers.
//!
//! # Routes
//! - `GET /addons`: filtered catalog (JSON)
//! - `GET /addons/license/{addon_id}`: license text of one add-on
//! - `GET /addons/analytics`: request counts per user agent
//! - `GET /addons/info`: HTML listing of the whole catalog
//!
//! Upstream failures that the cache cannot absorb become a bodiless
//! `502 Bad Gateway`; error details only go to the logs.

use std::time::Instant;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use crate::fetch::CatalogSource;
use crate::filter::{filter_with, FilterOptions, RequesterContext};
use crate::http::request::request_id_of;
use crate::http::response::{render_info_page, CatalogItem, ResponseFormat};
use crate::http::server::AppState;
use crate::observability::metrics;

/// Query parameters accepted by `GET /addons`.
#[derive(Debug, Default, Deserialize)]
pub struct AddonQuery {
    /// Host version, overriding the user agent.
    pub version: Option<String>,
    /// Host architecture, overriding the user agent.
    pub arch: Option<String>,
    /// `1` to include test-only builds.
    pub test: Option<String>,
    pub query: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub node: Option<String>,
    /// Comma separated Python versions.
    pub python: Option<String>,
}

impl AddonQuery {
    pub fn filter_options(&self) -> FilterOptions {
        FilterOptions {
            query: self.query.clone(),
            kind: self.kind.clone(),
            include_test_builds: self.test.as_deref().map(str::trim) == Some("1"),
            node: self.node.as_deref().map(str::trim).filter(|n| !n.is_empty()).map(str::to_string),
            python: self
                .python
                .as_deref()
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// `GET /addons`
pub async fn list_addons<S: CatalogSource>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    Query(params): Query<AddonQuery>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id_of(&headers);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok());

    state.requests.record(user_agent);

    let ctx = RequesterContext::from_user_agent(user_agent)
        .with_overrides(params.version.as_deref(), params.arch.as_deref());
    let options = params.filter_options();

    let catalog = match state.cache.get().await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "No catalog available");
            metrics::record_request("addons", StatusCode::BAD_GATEWAY.as_u16(), start);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let format = ResponseFormat::for_version(ctx.runtime_version.as_ref());
    let items: Vec<CatalogItem<'_>> = filter_with(&catalog, &ctx, &options)
        .into_iter()
        .map(|filtered| format.item(filtered))
        .collect();

    tracing::debug!(
        request_id = %request_id,
        version = ?ctx.runtime_version.as_ref().map(ToString::to_string),
        arch = ?ctx.architecture,
        format = ?format,
        served = items.len(),
        catalog = catalog.len(),
        "Serving filtered catalog"
    );
    metrics::record_filtered(items.len());
    metrics::record_request("addons", StatusCode::OK.as_u16(), start);

    let cache_control = format!("public, max-age={}", state.cache.ttl().as_secs());
    let mut response = Json(items).into_response();
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    response
}

/// `GET /addons/license/{addon_id}`
pub async fn get_license<S: CatalogSource>(
    State(state): State<AppState<S>>,
    Path(addon_id): Path<String>,
) -> Response {
    let start = Instant::now();

    let catalog = match state.cache.get().await {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::error!(addon = %addon_id, error = %e, "No catalog available for license lookup");
            metrics::record_request("license", StatusCode::BAD_GATEWAY.as_u16(), start);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let Some(license_url) = catalog.get(&addon_id).and_then(|e| e.license_url.clone()) else {
        metrics::record_request("license", StatusCode::NOT_FOUND.as_u16(), start);
        return StatusCode::NOT_FOUND.into_response();
    };

    let text = match state.http.get(&license_url).send().await {
        Ok(response) if response.status().is_success() => response.text().await,
        Ok(response) => {
            tracing::warn!(addon = %addon_id, url = %license_url, status = %response.status(), "License host returned an error");
            metrics::record_request("license", StatusCode::BAD_GATEWAY.as_u16(), start);
            return StatusCode::BAD_GATEWAY.into_response();
        }
        Err(e) => Err(e),
    };

    match text {
        Ok(text) => {
            metrics::record_request("license", StatusCode::OK.as_u16(), start);
            ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text).into_response()
        }
        Err(e) => {
            tracing::warn!(addon = %addon_id, url = %license_url, error = %e, "License fetch failed");
            metrics::record_request("license", StatusCode::BAD_GATEWAY.as_u16(), start);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}

/// `GET /addons/analytics`
pub async fn analytics<S: CatalogSource>(State(state): State<AppState<S>>) -> Response {
    let start = Instant::now();
    let summary = state.requests.summary();
    metrics::record_request("analytics", StatusCode::OK.as_u16(), start);
    Json(summary).into_response()
}

/// `GET /addons/info`
pub async fn info<S: CatalogSource>(State(state): State<AppState<S>>) -> Response {
    let start = Instant::now();
    match state.cache.get().await {
        Ok(catalog) => {
            metrics::record_request("info", StatusCode::OK.as_u16(), start);
            Html(render_info_page(catalog.entries())).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "No catalog available for info page");
            metrics::record_request("info", StatusCode::BAD_GATEWAY.as_u16(), start);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
