use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

use crate::health::HealthMonitor;
use crate::metrics::MetricsStore;

use super::handlers::{
    get_profile, get_report, get_totals, health_status, seed_today, upsert_day, AppState,
};

pub fn create_api_router(metrics: Arc<MetricsStore>, health: Arc<HealthMonitor>) -> Router {
    let state = Arc::new(AppState { metrics, health });

    let api = Router::new()
        .route("/health", get(health_status))
        .route("/users/{user_id}/report", get(get_report))
        .route("/users/{user_id}/totals", get(get_totals))
        .route("/users/{user_id}/metrics/{date_key}", post(upsert_day))
        .route("/users/{user_id}/profile", get(get_profile))
        .route("/admin/seed-today", post(seed_today))
        .with_state(state);

    Router::new().nest("/api", api).layer(CorsLayer::permissive())
}
