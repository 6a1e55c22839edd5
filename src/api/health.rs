use super::AppState;
use crate::health::{HealthState, HealthStatus};
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::debug;

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthStatus>) {
    debug!("Health check requested");
    let status = state.health.check_health().await;
    let code = match status.status {
        HealthState::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthState::Healthy | HealthState::Degraded => StatusCode::OK,
    };
    (code, Json(status))
}
