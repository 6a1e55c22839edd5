use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    NetworkError { message: String },

    #[error("Gateway timeout: {gateway} did not answer within {timeout_ms}ms")]
    TimeoutError { gateway: String, timeout_ms: u64 },

    /// Non-2xx answer from the gateway. `body` is the raw response body and is
    /// forwarded to synchronous callers unchanged.
    #[error("{gateway} api error: HTTP {status}")]
    GatewayResponse {
        gateway: String,
        status: u16,
        body: Vec<u8>,
    },

    #[error("Gateway error: gateway={gateway}, message={message}")]
    GatewayError { gateway: String, message: String },

    #[error("failed to decode {gateway} response: {message}")]
    DecodeError { gateway: String, message: String },
}

impl PaymentError {
    pub fn validation(message: impl Into<String>, field: &str) -> Self {
        PaymentError::ValidationError {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            PaymentError::ValidationError { .. } => 400,
            PaymentError::NetworkError { .. } => 502,
            PaymentError::TimeoutError { .. } => 504,
            PaymentError::GatewayResponse { status, .. } => *status,
            PaymentError::GatewayError { .. } => 502,
            PaymentError::DecodeError { .. } => 502,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            PaymentError::ValidationError { message, .. } => message.clone(),
            PaymentError::NetworkError { .. } => {
                "Payment gateway is temporarily unavailable".to_string()
            }
            PaymentError::TimeoutError { .. } => "Payment gateway timed out".to_string(),
            PaymentError::GatewayResponse { .. } => "Payment gateway rejected the request".to_string(),
            PaymentError::GatewayError { message, .. } => message.clone(),
            PaymentError::DecodeError { .. } => {
                "Payment gateway returned an unreadable response".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_response_keeps_upstream_status() {
        let err = PaymentError::GatewayResponse {
            gateway: "xendit".to_string(),
            status: 422,
            body: br#"{"error_code":"API_VALIDATION_ERROR"}"#.to_vec(),
        };
        assert_eq!(err.http_status_code(), 422);
        assert_eq!(err.to_string(), "xendit api error: HTTP 422");
    }

    #[test]
    fn transport_failures_map_to_bad_gateway_family() {
        assert_eq!(
            PaymentError::NetworkError {
                message: "connection refused".to_string()
            }
            .http_status_code(),
            502
        );
        assert_eq!(
            PaymentError::TimeoutError {
                gateway: "nicepay".to_string(),
                timeout_ms: 3000
            }
            .http_status_code(),
            504
        );
    }
}
