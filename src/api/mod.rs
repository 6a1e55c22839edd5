//! HTTP surface: router construction and shared handler state.

pub mod health;
pub mod payments;

use crate::health::HealthChecker;
use crate::middleware::logging::{request_logging_middleware, UuidRequestId};
use crate::services::create_payment::PaymentService;
use crate::workers::payment_jobs::JobQueue;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Built once in `main` and shared with every handler.
pub struct AppState {
    pub payments: PaymentService,
    pub jobs: JobQueue,
    pub health: HealthChecker,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/payment/{gateway}", post(payments::create_payment))
        .route("/payment/{gateway}/async", post(payments::create_payment_async))
        .route("/jobs/status", get(payments::job_status))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn(request_logging_middleware))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}
