//! Payment Persistence Coordinator
//!
//! Writes one gateway payment as a single unit of work: resolve the dimension
//! rows, upsert the channel sub-record, upsert the fact row, commit. Everything
//! runs on one READ COMMITTED transaction; any error or a timeout drops the
//! transaction, which rolls it back.
//!
//! Re-running `save` for the same gateway transaction id updates the existing
//! rows instead of inserting new ones.

use crate::config::PersistenceConfig;
use crate::database::channel_record_repository::{
    ChannelRecordRepository, ChannelTable, SubRecordFields, UpsertEwallet, UpsertQris, UpsertVa,
};
use crate::database::error::DatabaseError;
use crate::database::payment_repository::{PaymentRepository, UpsertPayment};
use crate::database::transaction::begin_read_committed;
use crate::database::now_millis;
use crate::logging::mask_msisdn;
use crate::payments::types::{CreatePaymentRequest, GatewayPayment};
use crate::services::action_fields::{self, ACCOUNT_MOBILE_NUMBER, QR_STRING, VIRTUAL_ACCOUNT_NUMBER};
use crate::services::channel_classifier::{classify, ChannelType};
use crate::services::master_data::{merchant_identity, MasterDataResolver};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

// ============================================================================
// Errors and results
// ============================================================================

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("gateway response carries no transaction id")]
    MissingTransactionId,

    #[error("invalid payment amount: {0}")]
    InvalidAmount(String),

    #[error("failed to snapshot gateway response: {0}")]
    Snapshot(String),

    #[error("persistence did not finish within {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl PersistenceError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PersistenceError::Timeout(_) => true,
            PersistenceError::Database(err) => err.is_retryable(),
            _ => false,
        }
    }
}

/// What a successful save wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub payment_id: Uuid,
    pub transaction_id: String,
    pub channel: ChannelType,
}

/// Seam between request handling and storage.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn save(
        &self,
        payment: &GatewayPayment,
        request: &CreatePaymentRequest,
    ) -> Result<SaveOutcome, PersistenceError>;
}

// ============================================================================
// Channel sub-record
// ============================================================================

/// Channel-specific values for the sub-record a payment gets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelRecord {
    Qris {
        qr_string: String,
    },
    VirtualAccount {
        provider_name: String,
        va_number: String,
    },
    EWallet {
        provider_name: String,
        masked_msisdn: Option<String>,
        response_url: Option<String>,
    },
    Unclassified,
}

impl ChannelRecord {
    pub fn build(
        channel: ChannelType,
        payment: &GatewayPayment,
        request: &CreatePaymentRequest,
    ) -> Self {
        let provider_name = channel_code(payment, request).to_uppercase();

        match channel {
            ChannelType::Qris => ChannelRecord::Qris {
                qr_string: action_fields::extract(&payment.actions, QR_STRING),
            },
            ChannelType::VirtualAccount => ChannelRecord::VirtualAccount {
                provider_name,
                va_number: action_fields::extract(&payment.actions, VIRTUAL_ACCOUNT_NUMBER),
            },
            ChannelType::EWallet => {
                let msisdn = mobile_number(request, payment)
                    .filter(|m| !m.trim().is_empty())
                    .or_else(|| {
                        Some(action_fields::extract(&payment.actions, ACCOUNT_MOBILE_NUMBER))
                            .filter(|m| !m.is_empty())
                    });
                ChannelRecord::EWallet {
                    provider_name,
                    masked_msisdn: msisdn.map(|m| mask_msisdn(&m)),
                    response_url: payment
                        .actions
                        .iter()
                        .find(|a| {
                            a.action_type.eq_ignore_ascii_case("REDIRECT_CUSTOMER")
                                && !a.value.trim().is_empty()
                        })
                        .map(|a| a.value.clone()),
                }
            }
            ChannelType::Unclassified => ChannelRecord::Unclassified,
        }
    }

    pub fn channel_type(&self) -> ChannelType {
        match self {
            ChannelRecord::Qris { .. } => ChannelType::Qris,
            ChannelRecord::VirtualAccount { .. } => ChannelType::VirtualAccount,
            ChannelRecord::EWallet { .. } => ChannelType::EWallet,
            ChannelRecord::Unclassified => ChannelType::Unclassified,
        }
    }

    /// Sub-table this record lives in; `None` for unclassified payments.
    pub fn table(&self) -> Option<ChannelTable> {
        match self {
            ChannelRecord::Qris { .. } => Some(ChannelTable::Qris),
            ChannelRecord::VirtualAccount { .. } => Some(ChannelTable::Va),
            ChannelRecord::EWallet { .. } => Some(ChannelTable::Ewallet),
            ChannelRecord::Unclassified => None,
        }
    }
}

fn channel_code<'a>(payment: &'a GatewayPayment, request: &'a CreatePaymentRequest) -> &'a str {
    let code = payment.channel_code.trim();
    if code.is_empty() {
        request.channel_code.trim()
    } else {
        code
    }
}

fn mobile_number(request: &CreatePaymentRequest, payment: &GatewayPayment) -> Option<String> {
    request
        .channel_properties
        .as_ref()
        .and_then(|p| p.mobile_number().map(str::to_string))
        .or_else(|| {
            payment
                .channel_properties
                .as_ref()
                .and_then(|p| p.mobile_number().map(str::to_string))
        })
}

// ============================================================================
// Conversions
// ============================================================================

pub fn parse_amount(amount: f64) -> Result<BigDecimal, PersistenceError> {
    if !amount.is_finite() {
        return Err(PersistenceError::InvalidAmount(amount.to_string()));
    }
    BigDecimal::from_str(&amount.to_string())
        .map_err(|e| PersistenceError::InvalidAmount(e.to_string()))
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v.trim()).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// ============================================================================
// Coordinator
// ============================================================================

pub struct PaymentPersistenceCoordinator {
    pool: PgPool,
    resolver: MasterDataResolver,
    timeout: Duration,
}

impl PaymentPersistenceCoordinator {
    pub fn new(pool: PgPool, config: &PersistenceConfig) -> Self {
        Self {
            pool,
            resolver: MasterDataResolver::new(config),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn resolver(&self) -> &MasterDataResolver {
        &self.resolver
    }

    async fn save_in_transaction(
        &self,
        transaction_id: &str,
        amount: BigDecimal,
        payment: &GatewayPayment,
        request: &CreatePaymentRequest,
    ) -> Result<SaveOutcome, PersistenceError> {
        let snapshot =
            serde_json::to_value(payment).map_err(|e| PersistenceError::Snapshot(e.to_string()))?;

        let mut tx = begin_read_committed(&self.pool).await?;
        let outcome = self
            .write_all(&mut *tx, transaction_id, amount, snapshot, payment, request)
            .await?;
        tx.commit().await.map_err(DatabaseError::from_sqlx)?;

        Ok(outcome)
    }

    async fn write_all(
        &self,
        conn: &mut PgConnection,
        transaction_id: &str,
        amount: BigDecimal,
        snapshot: serde_json::Value,
        payment: &GatewayPayment,
        request: &CreatePaymentRequest,
    ) -> Result<SaveOutcome, PersistenceError> {
        let now = now_millis();
        let actor = self.resolver.actor().to_string();

        // Dimensions
        let merchant = merchant_identity(
            request.merchant_code.as_deref(),
            request.merchant_name(),
            self.resolver.default_merchant_code(),
        );
        let channel = classify(payment, request);
        let code = channel_code(payment, request);
        let currency = non_blank(&payment.currency).unwrap_or_else(|| request.currency.clone());
        let country = non_blank(&payment.country).unwrap_or_else(|| request.country.clone());

        let merchant_id = self
            .resolver
            .resolve_merchant(&mut *conn, &merchant, now)
            .await?;
        let payment_method_id = self
            .resolver
            .resolve_payment_method(&mut *conn, channel, code, now)
            .await?;
        let currency_id = self
            .resolver
            .resolve_currency(&mut *conn, &currency, now)
            .await?;
        let country_id = self
            .resolver
            .resolve_country(&mut *conn, &country, now)
            .await?;

        // Sub-record
        let created_date = parse_timestamp(payment.created.as_deref())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(now);
        let updated_date = parse_timestamp(payment.updated.as_deref())
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(now);

        let customer = request.customer.clone().unwrap_or_default();
        let url_return = request
            .return_url
            .clone()
            .or_else(|| {
                request
                    .channel_properties
                    .as_ref()
                    .and_then(|p| p.success_return_url.clone())
            })
            .or_else(|| {
                payment
                    .channel_properties
                    .as_ref()
                    .and_then(|p| p.success_return_url.clone())
            });
        let masked_phone = customer.phone.as_deref().map(mask_msisdn);

        let mut fields = SubRecordFields {
            transaction_id: transaction_id.to_string(),
            url_return,
            customer_username: customer.name.clone(),
            customer_msisdn: masked_phone,
            customer_email: customer.email.clone(),
            response_json: snapshot.clone(),
            actor: actor.clone(),
            created_date,
            updated_date,
        };

        let record = ChannelRecord::build(channel, payment, request);

        // A re-save may classify differently; at most one sub-table keeps a row.
        let stale =
            ChannelRecordRepository::delete_except(&mut *conn, transaction_id, record.table())
                .await?;
        if stale > 0 {
            info!(
                transaction_id = %transaction_id,
                channel = %channel,
                removed = stale,
                "replaced sub-record from an earlier classification"
            );
        }

        match record {
            ChannelRecord::Qris { qr_string } => {
                ChannelRecordRepository::upsert_qris(&mut *conn, &UpsertQris { fields, qr_string })
                    .await?;
            }
            ChannelRecord::VirtualAccount {
                provider_name,
                va_number,
            } => {
                let va_provider_id = self
                    .resolver
                    .resolve_va_provider(&mut *conn, &provider_name, now)
                    .await?;
                ChannelRecordRepository::upsert_va(
                    &mut *conn,
                    &UpsertVa {
                        fields,
                        va_provider_id,
                        va_number,
                    },
                )
                .await?;
            }
            ChannelRecord::EWallet {
                provider_name,
                masked_msisdn,
                response_url,
            } => {
                let ewallet_provider_id = self
                    .resolver
                    .resolve_ewallet_provider(&mut *conn, &provider_name, now)
                    .await?;
                if masked_msisdn.is_some() {
                    fields.customer_msisdn = masked_msisdn;
                }
                ChannelRecordRepository::upsert_ewallet(
                    &mut *conn,
                    &UpsertEwallet {
                        fields,
                        ewallet_provider_id,
                        response_url,
                    },
                )
                .await?;
            }
            ChannelRecord::Unclassified => {
                warn!(
                    transaction_id = %transaction_id,
                    channel_code = %code,
                    "payment channel not classified, writing fact row only"
                );
            }
        }

        // Fact row
        let payment_id = PaymentRepository::upsert(
            &mut *conn,
            &UpsertPayment {
                transaction_id: transaction_id.to_string(),
                reference_no: non_blank(&payment.reference_id)
                    .unwrap_or_else(|| request.reference_id.clone()),
                payment_gateway: request.payment_gateway().and_then(non_blank),
                channel_code: non_blank(code),
                merchant_id,
                payment_method_id,
                currency_id,
                country_id,
                amount,
                description: payment
                    .description
                    .clone()
                    .or_else(|| request.description.clone()),
                status: non_blank(&payment.status).unwrap_or_else(|| "UNKNOWN".to_string()),
                callback_url: request.callback_url.clone(),
                expired_at: parse_timestamp(payment.expires_at()),
                response_json: snapshot,
                actor,
                created_date,
                updated_date,
            },
        )
        .await?;

        Ok(SaveOutcome {
            payment_id,
            transaction_id: transaction_id.to_string(),
            channel,
        })
    }
}

#[async_trait]
impl PaymentStore for PaymentPersistenceCoordinator {
    async fn save(
        &self,
        payment: &GatewayPayment,
        request: &CreatePaymentRequest,
    ) -> Result<SaveOutcome, PersistenceError> {
        let transaction_id = payment.payment_request_id.trim();
        if transaction_id.is_empty() {
            return Err(PersistenceError::MissingTransactionId);
        }

        let raw_amount = if payment.request_amount > 0.0 {
            payment.request_amount
        } else {
            request.request_amount
        };
        let amount = parse_amount(raw_amount)?;

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.save_in_transaction(transaction_id, amount, payment, request),
        )
        .await
        {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    transaction_id = %transaction_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "payment persistence timed out, transaction rolled back"
                );
                return Err(PersistenceError::Timeout(self.timeout));
            }
        };

        info!(
            transaction_id = %outcome.transaction_id,
            payment_id = %outcome.payment_id,
            channel = %outcome.channel,
            "payment persisted"
        );
        Ok(outcome)
    }
}
