use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use farescope_core::{FlightFilters, SearchCriteria, SearchProgress, SortKey, SortOrder};
use farescope_engine::{HealthReport, HealthStatus, SearchOptions, SearchResult};

use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchFlightsRequest {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub passengers: u32,
    pub cabin_class: Option<String>,
    /// Defaults to every registered source
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub options: SearchOptions,
}

#[derive(Debug, Default, Deserialize)]
pub struct SortRequest {
    pub sort_by: Option<SortKey>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub search_id: Uuid,
    pub cancelled: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/search
/// Dispatch a search across the requested sources and wait for settlement
pub async fn search_flights(
    State(state): State<AppState>,
    Json(req): Json<SearchFlightsRequest>,
) -> Result<Json<SearchResult>, ApiError> {
    let criteria = SearchCriteria {
        origin: req.origin,
        destination: req.destination,
        departure_date: req.departure_date,
        return_date: req.return_date,
        passengers: req.passengers,
        cabin_class: req.cabin_class,
    };

    let result = state
        .orchestrator
        .search_flights(criteria, req.sources.as_deref(), req.options)
        .await?;
    Ok(Json(result))
}

/// POST /v1/search/{id}/filter
/// Pure transform over the cached raw view
pub async fn filter_results(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
    Json(filters): Json<FlightFilters>,
) -> Result<Json<SearchResult>, ApiError> {
    let result = state
        .orchestrator
        .filter_search_results(search_id, filters)
        .await?;
    Ok(Json(result))
}

/// POST /v1/search/{id}/sort
/// Stable sort over the latest cached view
pub async fn sort_results(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
    Json(req): Json<SortRequest>,
) -> Result<Json<SearchResult>, ApiError> {
    let result = state
        .orchestrator
        .sort_search_results(search_id, req.sort_by, req.sort_order)
        .await?;
    Ok(Json(result))
}

/// GET /v1/search/{id}/progress
pub async fn search_progress(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
) -> Result<Json<SearchProgress>, ApiError> {
    state
        .orchestrator
        .get_search_progress(search_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Search {} not found", search_id)))
}

/// GET /v1/search/active
pub async fn active_searches(
    State(state): State<AppState>,
) -> Json<Vec<SearchProgress>> {
    Json(state.orchestrator.get_active_searches().await)
}

/// DELETE /v1/search/{id}
/// Idempotent cooperative cancellation
pub async fn cancel_search(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
) -> Json<CancelResponse> {
    let cancelled = state.orchestrator.cancel_search(search_id).await;
    Json(CancelResponse {
        search_id,
        cancelled,
    })
}

/// GET /v1/health
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.orchestrator.health_check().await;
    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (status, Json(report))
}
