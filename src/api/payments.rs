//! Payment creation and job status endpoints.

use super::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::error::{forward_gateway_response, get_request_id_from_headers};
use crate::payments::error::PaymentError;
use crate::payments::types::{CreatePaymentRequest, GatewayKind};
use crate::services::create_payment::CreatePaymentError;
use crate::workers::payment_jobs::{Job, JobStatus};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Serialize, Deserialize)]
pub struct EnqueuedResponse {
    pub job_id: String,
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct JobStatusQuery {
    pub id: Option<String>,
}

/// POST /payment/{gateway}
///
/// Creates the payment at the gateway and persists it before answering. A
/// non-2xx gateway answer is relayed unchanged.
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Response {
    let request_id = get_request_id_from_headers(&headers);

    let (kind, request) = match parse_request(&gateway, &headers, body) {
        Ok(parsed) => parsed,
        Err(e) => return e.with_request_id_opt(request_id).into_response(),
    };

    info!(
        gateway = %kind,
        reference_id = %request.reference_id,
        channel_code = %request.channel_code,
        "Create payment requested"
    );

    match state.payments.create(kind, &request).await {
        Ok(created) => (StatusCode::OK, Json(created.payment)).into_response(),
        Err(CreatePaymentError::Gateway(e)) => match forward_gateway_response(&e) {
            Some(response) => response,
            None => AppError::from(e)
                .with_request_id_opt(request_id)
                .into_response(),
        },
        Err(e) => AppError::from(e)
            .with_request_id_opt(request_id)
            .into_response(),
    }
}

/// POST /payment/{gateway}/async
pub async fn create_payment_async(
    State(state): State<Arc<AppState>>,
    Path(gateway): Path<String>,
    headers: HeaderMap,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<EnqueuedResponse>)> {
    let request_id = get_request_id_from_headers(&headers);
    let with_id = |e: AppError| e.with_request_id_opt(request_id.clone());

    let (kind, request) = parse_request(&gateway, &headers, body).map_err(with_id)?;
    request
        .validate()
        .map_err(|e| with_id(AppError::from(e)))?;
    state
        .payments
        .gateways()
        .get(kind)
        .map_err(|e| with_id(AppError::from(e)))?;

    let job_id = state
        .jobs
        .enqueue(kind, request)
        .await
        .map_err(|e| with_id(AppError::from(e)))?;

    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueuedResponse {
            job_id,
            status: JobStatus::Queued,
        }),
    ))
}

/// GET /jobs/status?id=
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<JobStatusQuery>,
) -> AppResult<Json<Job>> {
    let request_id = get_request_id_from_headers(&headers);

    let job_id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::missing_field("id").with_request_id_opt(request_id.clone()))?;

    state
        .jobs
        .get_status(job_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::job_not_found(job_id).with_request_id_opt(request_id))
}

fn parse_request(
    gateway: &str,
    headers: &HeaderMap,
    body: Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> AppResult<(GatewayKind, CreatePaymentRequest)> {
    let kind = GatewayKind::from_str(gateway)?;
    let Json(mut request) = body.map_err(|rejection| {
        AppError::from(PaymentError::validation(rejection.body_text(), "body"))
    })?;

    if request.client_ip.is_none() {
        request.client_ip = client_ip(headers);
    }

    Ok((kind, request))
}

/// First address in `x-forwarded-for`, else `x-real-ip`.
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
}
