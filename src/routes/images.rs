/**
 * Image Search Routes
 * Thin proxies in front of the two stock-photo providers
 */
use axum::{
    extract::Query,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::images::{pexels, unsplash, StockPhoto};
use crate::routes::require_admin;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<StockPhoto>,
}

/// GET /api/images/unsplash?query= (admin)
///
/// Provider failures surface as an empty result set, already swallowed and
/// logged by the adapter; the editor treats no results and provider trouble
/// the same way.
pub async fn search_unsplash(headers: HeaderMap, Query(query): Query<SearchQuery>) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    if query.query.trim().is_empty() {
        return (StatusCode::OK, Json(SearchResponse { results: vec![] })).into_response();
    }

    let results = unsplash::search(query.query.trim()).await;
    (StatusCode::OK, Json(SearchResponse { results })).into_response()
}

/// GET /api/images/pexels?query= (admin)
pub async fn search_pexels(headers: HeaderMap, Query(query): Query<SearchQuery>) -> impl IntoResponse {
    if let Err(err) = require_admin(&headers) {
        return err.into_response();
    }

    if query.query.trim().is_empty() {
        return (StatusCode::OK, Json(SearchResponse { results: vec![] })).into_response();
    }

    let results = pexels::search(query.query.trim()).await;
    (StatusCode::OK, Json(SearchResponse { results })).into_response()
}
