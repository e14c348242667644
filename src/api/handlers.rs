use crate::api::AppState;
use crate::auth::Credentials;
use crate::error::{AppError, Result};
use crate::metadata::SearchResponse;
use crate::metrics::SEARCH_REQUESTS_TOTAL;
use crate::search::SearchRequest;
use axum::{
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::instrument;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Result<Json<HealthResponse>> {
    let stats = state.search.get_stats()?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: stats.total_documents,
    }))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub documents: u64,
}

/// Prometheus metrics endpoint
///
/// Returns metrics in Prometheus text exposition format
pub async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        crate::metrics::gather_metrics(),
    )
}

/// Search charms and bundles.
///
/// Parameters are validated before any credential or index work; an
/// invalid request never reaches the backend.
#[instrument(skip_all)]
pub async fn search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<SearchResponse>> {
    let result = run_search(&state, &headers, &pairs).await;

    let outcome = match &result {
        Ok(_) => "success",
        Err(AppError::BadRequest(_)) => "bad_request",
        Err(AppError::Unauthorized(_)) => "unauthorized",
        Err(_) => "error",
    };
    SEARCH_REQUESTS_TOTAL.with_label_values(&[outcome]).inc();

    result.map(Json)
}

async fn run_search(
    state: &AppState,
    headers: &HeaderMap,
    pairs: &[(String, String)],
) -> Result<SearchResponse> {
    let request = SearchRequest::from_pairs(pairs)?;
    state.assembler.registry().check_includes(&request.include)?;

    let access = state
        .access
        .resolve(&Credentials::from_headers(headers))
        .await?;

    let page = state.search.search(&request, &access).await?;
    Ok(state
        .assembler
        .assemble(page, &request.include, &access)
        .await)
}
