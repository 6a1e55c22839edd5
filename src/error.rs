//! Unified error handling for the payment bridge
//!
//! Every layer has its own error type (`PaymentError`, `PersistenceError`,
//! `DatabaseError`, `JobError`); handlers convert them into `AppError`, which
//! owns the HTTP status, error code and user-facing message.

use crate::database::error::{DatabaseError, DatabaseErrorKind};
use crate::payments::error::PaymentError;
use crate::services::create_payment::CreatePaymentError;
use crate::services::payment_persistence::PersistenceError;
use crate::workers::payment_jobs::JobError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "JOB_NOT_FOUND")]
    JobNotFound,
    #[serde(rename = "MISSING_TRANSACTION_ID")]
    MissingTransactionId,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,
    #[serde(rename = "QUEUE_UNAVAILABLE")]
    QueueUnavailable,

    // External errors (502, 504)
    #[serde(rename = "PAYMENT_GATEWAY_ERROR")]
    PaymentGatewayError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Business-level failures
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No job with this id is tracked
    JobNotFound { job_id: String },
    /// Gateway answered without a payment id to key the record on
    MissingTransactionId,
}

/// Infrastructure-level errors (database, queue, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    Database { message: String, is_retryable: bool },
    Queue { message: String },
    Configuration { message: String },
}

/// Payment gateway failures
#[derive(Debug, Clone)]
pub enum ExternalError {
    PaymentGateway {
        gateway: String,
        message: String,
        is_retryable: bool,
    },
    Timeout { service: String, timeout_ms: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    MissingField { field: String },
    InvalidField { field: String, reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_request_id_opt(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: field.to_string(),
        }))
    }

    pub fn job_not_found(job_id: &str) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::JobNotFound {
            job_id: job_id.to_string(),
        }))
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::JobNotFound { .. } => 404,
                DomainError::MissingTransactionId => 502,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => 500,
                InfrastructureError::Queue { .. } => 503,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => 502,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::JobNotFound { .. } => ErrorCode::JobNotFound,
                DomainError::MissingTransactionId => ErrorCode::MissingTransactionId,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Queue { .. } => ErrorCode::QueueUnavailable,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { .. } => ErrorCode::PaymentGatewayError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::JobNotFound { job_id } => format!("Job '{}' not found", job_id),
                DomainError::MissingTransactionId => {
                    "Payment gateway response did not include a payment id".to_string()
                }
            },
            AppErrorKind::Infrastructure(InfrastructureError::Queue { .. }) => {
                "Payment queue is not accepting jobs. Please try again later".to_string()
            }
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway {
                    gateway,
                    message,
                    is_retryable,
                } => {
                    if *is_retryable {
                        format!(
                            "Payment gateway ({}) is temporarily unavailable. Please try again",
                            gateway
                        )
                    } else {
                        format!("Payment gateway ({}) error: {}", gateway, message)
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_ms,
                } => format!(
                    "{} request timed out after {} ms. Please try again",
                    service, timeout_ms
                ),
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::InvalidField { field, reason } => {
                    format!("Invalid value for '{}': {}", field, reason)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Queue { .. } => true,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentGateway { is_retryable, .. } => *is_retryable,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// Conversions from layer error types

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        let kind = match err {
            PaymentError::ValidationError { message, field } => {
                AppErrorKind::Validation(ValidationError::InvalidField {
                    field: field.unwrap_or_else(|| "request".to_string()),
                    reason: message,
                })
            }
            PaymentError::NetworkError { message } => {
                AppErrorKind::External(ExternalError::PaymentGateway {
                    gateway: "gateway".to_string(),
                    message,
                    is_retryable: true,
                })
            }
            PaymentError::TimeoutError {
                gateway,
                timeout_ms,
            } => AppErrorKind::External(ExternalError::Timeout {
                service: gateway,
                timeout_ms,
            }),
            PaymentError::GatewayResponse { gateway, status, .. } => {
                AppErrorKind::External(ExternalError::PaymentGateway {
                    gateway,
                    message: format!("HTTP {}", status),
                    is_retryable: status >= 500,
                })
            }
            PaymentError::GatewayError { gateway, message }
            | PaymentError::DecodeError { gateway, message } => {
                AppErrorKind::External(ExternalError::PaymentGateway {
                    gateway,
                    message,
                    is_retryable: false,
                })
            }
        };

        AppError::new(kind)
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        let is_retryable = err.is_retryable();
        let message = err.to_string();
        let kind = match err.kind {
            DatabaseErrorKind::InvalidValue { message } => {
                AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message,
                    is_retryable: false,
                })
            }
            _ => AppErrorKind::Infrastructure(InfrastructureError::Database {
                message,
                is_retryable,
            }),
        };
        AppError::new(kind)
    }
}

impl From<PersistenceError> for AppError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::MissingTransactionId => {
                AppError::new(AppErrorKind::Domain(DomainError::MissingTransactionId))
            }
            PersistenceError::Database(db) => AppError::from(db),
            PersistenceError::Timeout(_) => {
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message: err.to_string(),
                    is_retryable: true,
                }))
            }
            PersistenceError::InvalidAmount(_) | PersistenceError::Snapshot(_) => {
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Database {
                    message: err.to_string(),
                    is_retryable: false,
                }))
            }
        }
    }
}

impl From<CreatePaymentError> for AppError {
    fn from(err: CreatePaymentError) -> Self {
        match err {
            CreatePaymentError::Gateway(e) => AppError::from(e),
            CreatePaymentError::Persistence(e) => AppError::from(e),
        }
    }
}

impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::NotFound { job_id } => AppError::job_not_found(&job_id),
            JobError::QueueClosed | JobError::EnqueueTimeout { .. } => {
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Queue {
                    message: err.to_string(),
                }))
            }
            JobError::InvalidTransition { .. } => {
                AppError::new(AppErrorKind::Infrastructure(InfrastructureError::Queue {
                    message: err.to_string(),
                }))
            }
        }
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_validation_error_maps_to_400() {
        let error = AppError::from(PaymentError::validation(
            "request_amount must be greater than zero",
            "request_amount",
        ));

        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert!(error.user_message().contains("request_amount"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_unknown_gateway_is_validation_error() {
        let error = AppError::from(PaymentError::validation(
            "unsupported payment gateway: x",
            "gateway",
        ));
        assert_eq!(error.status_code(), 400);
        assert!(error.user_message().contains("'gateway'"));
    }

    #[test]
    fn test_gateway_transport_errors() {
        let network = AppError::from(PaymentError::NetworkError {
            message: "connection reset".to_string(),
        });
        assert_eq!(network.status_code(), 502);
        assert!(network.is_retryable());

        let timeout = AppError::from(PaymentError::TimeoutError {
            gateway: "xendit".to_string(),
            timeout_ms: 30_000,
        });
        assert_eq!(timeout.status_code(), 504);
        assert_eq!(timeout.error_code(), ErrorCode::ExternalServiceTimeout);
    }

    #[test]
    fn test_persistence_errors_map_to_500() {
        let timeout = AppError::from(PersistenceError::Timeout(Duration::from_secs(15)));
        assert_eq!(timeout.status_code(), 500);
        assert_eq!(timeout.error_code(), ErrorCode::DatabaseError);
        assert!(timeout.is_retryable());

        let db = AppError::from(PersistenceError::Database(DatabaseError::from_sqlx(
            sqlx::Error::PoolTimedOut,
        )));
        assert_eq!(db.status_code(), 500);
    }

    #[test]
    fn test_job_not_found() {
        let error = AppError::job_not_found("job-123").with_request_id("req-1");
        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::JobNotFound);
        assert_eq!(error.request_id.as_deref(), Some("req-1"));
    }
}
