//! Error response formatting
//!
//! Every handler error leaves the service as the same JSON envelope, except
//! non-2xx gateway answers on the synchronous endpoint, which are relayed
//! byte-for-byte with the upstream status.

use crate::error::{AppError, ErrorCode};
use crate::payments::error::PaymentError;
use axum::{
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Standardized error response structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub error: ErrorCode,

    /// Human-readable error message
    pub message: String,

    pub request_id: Option<String>,

    /// RFC 3339 timestamp of the error
    pub timestamp: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Whether the client should retry the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retryable: Option<bool>,
}

impl ErrorResponse {
    pub fn from_app_error(error: &AppError) -> Self {
        Self {
            error: error.error_code(),
            message: error.user_message(),
            request_id: error.request_id.clone(),
            timestamp: Utc::now().to_rfc3339(),
            details: error
                .context
                .as_ref()
                .map(|context| serde_json::json!({ "context": context })),
            retryable: Some(error.is_retryable()),
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation_error(request_id: Option<String>, field: &str, message: &str) -> Self {
        Self {
            error: ErrorCode::ValidationError,
            message: format!("Validation failed for field '{}'", field),
            request_id,
            timestamp: Utc::now().to_rfc3339(),
            details: Some(serde_json::json!({
                "field": field,
                "error": message,
            })),
            retryable: Some(false),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Server error occurred"
            );
        } else {
            tracing::warn!(
                error = ?self,
                request_id = ?self.request_id,
                status = %status_code.as_u16(),
                "Client error occurred"
            );
        }

        let error_response = ErrorResponse::from_app_error(&self);
        (status_code, Json(error_response)).into_response()
    }
}

/// Relays a gateway's non-2xx answer unchanged. Returns `None` for every
/// other error so the caller can fall back to the JSON envelope.
pub fn forward_gateway_response(error: &PaymentError) -> Option<Response> {
    let PaymentError::GatewayResponse {
        gateway,
        status,
        body,
    } = error
    else {
        return None;
    };

    let status_code = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY);
    tracing::warn!(
        gateway = %gateway,
        status = %status_code.as_u16(),
        body_len = body.len(),
        "Forwarding gateway error response"
    );

    let mut response = (status_code, body.clone()).into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Some(response)
}

pub fn get_request_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
