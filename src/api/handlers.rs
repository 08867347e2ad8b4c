use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::executor::QueryError;
use crate::health::HealthMonitor;
use crate::metrics::{MetricsError, MetricsStore, SeedSummary};
use crate::models::{DayMetrics, DayMetricsPatch, Profile};
use crate::report::{Report, ReportTotals, Timeframe};

pub struct AppState {
    pub metrics: Arc<MetricsStore>,
    pub health: Arc<HealthMonitor>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Deserialize)]
pub struct ReportQuery {
    pub timeframe: Option<String>,
    #[serde(default)]
    pub force: bool,
}

#[derive(Deserialize)]
pub struct TotalsQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Deserialize)]
pub struct ProfileQuery {
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub latency_ms: u64,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// "No data yet" reaches callers as a zero-filled 200; only genuine
/// failures map to error statuses so the dashboard can offer a retry.
fn error_response(err: MetricsError) -> ApiError {
    let status = match &err {
        MetricsError::InvalidDateKey(_) => StatusCode::BAD_REQUEST,
        MetricsError::WriteConflict(_) => StatusCode::CONFLICT,
        MetricsError::Query(QueryError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        MetricsError::Query(QueryError::Backend(_)) => StatusCode::BAD_GATEWAY,
    };
    if status.is_server_error() {
        tracing::error!("request failed: {err}");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Get an aggregated report for a user and timeframe
pub async fn get_report(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ReportQuery>,
) -> Result<Json<Report>, ApiError> {
    let timeframe = params
        .timeframe
        .as_deref()
        .map(Timeframe::parse)
        .unwrap_or(Timeframe::Last30Days);

    match state
        .metrics
        .get_report(&user_id, timeframe, params.force)
        .await
    {
        Ok(report) => Ok(Json(report)),
        Err(err) => Err(error_response(err)),
    }
}

/// Get all-time totals for a user
pub async fn get_totals(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<TotalsQuery>,
) -> Result<Json<ReportTotals>, ApiError> {
    match state.metrics.get_totals(&user_id, params.force).await {
        Ok(totals) => Ok(Json(totals)),
        Err(err) => Err(error_response(err)),
    }
}

/// Merge a day's metrics into a user's document
pub async fn upsert_day(
    State(state): State<Arc<AppState>>,
    Path((user_id, date_key)): Path<(String, String)>,
    Json(patch): Json<DayMetricsPatch>,
) -> Result<Json<DayMetrics>, ApiError> {
    match state.metrics.upsert_day(&user_id, &date_key, patch).await {
        Ok(bucket) => Ok(Json(bucket)),
        Err(err) => Err(error_response(err)),
    }
}

/// Get a user's profile, creating it with a referral code on first access
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Query(params): Query<ProfileQuery>,
) -> Result<Json<Profile>, ApiError> {
    match state
        .metrics
        .get_or_create_profile(&user_id, params.email.as_deref())
        .await
    {
        Ok(profile) => Ok(Json(profile)),
        Err(err) => Err(error_response(err)),
    }
}

/// Seed today's bucket for every known user
pub async fn seed_today(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SeedSummary>, ApiError> {
    match state.metrics.ensure_daily_buckets().await {
        Ok(summary) => Ok(Json(summary)),
        Err(err) => Err(error_response(err)),
    }
}

/// Report the store connectivity signal
pub async fn health_status(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let healthy = state.health.is_healthy().await;
    let snapshot = state.health.snapshot().await;
    Json(HealthResponse {
        healthy,
        consecutive_failures: snapshot.consecutive_failures,
        latency_ms: snapshot.latency.as_millis() as u64,
    })
}
