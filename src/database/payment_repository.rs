use crate::database::error::DatabaseError;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// Payment fact row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub transaction_id: String,
    pub reference_no: String,
    pub payment_gateway: Option<String>,
    pub channel_code: Option<String>,
    pub merchant_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub currency_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub amount: BigDecimal,
    pub description: Option<String>,
    pub status: String,
    pub callback_url: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
    pub response_json: JsonValue,
    pub created_date: i64,
    pub created_user: String,
    pub updated_date: Option<i64>,
    pub updated_user: Option<String>,
    pub data_status: String,
}

/// Values written by one save of the fact row.
#[derive(Debug, Clone)]
pub struct UpsertPayment {
    pub transaction_id: String,
    pub reference_no: String,
    pub payment_gateway: Option<String>,
    pub channel_code: Option<String>,
    pub merchant_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    pub currency_id: Option<Uuid>,
    pub country_id: Option<Uuid>,
    pub amount: BigDecimal,
    pub description: Option<String>,
    pub status: String,
    pub callback_url: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
    pub response_json: JsonValue,
    pub actor: String,
    pub created_date: i64,
    pub updated_date: i64,
}

const PAYMENT_COLUMNS: &str = "id, transaction_id, reference_no, payment_gateway, channel_code, \
     merchant_id, payment_method_id, currency_id, country_id, amount, description, status, \
     callback_url, expired_at, response_json, created_date, created_user, updated_date, \
     updated_user, data_status";

pub struct PaymentRepository;

impl PaymentRepository {
    /// Insert the fact row, or refresh the mutable columns of the existing row
    /// for the same transaction id. Creation audit fields are never rewritten.
    pub async fn upsert(
        conn: &mut PgConnection,
        payment: &UpsertPayment,
    ) -> Result<Uuid, DatabaseError> {
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO payments (
                id, transaction_id, reference_no, payment_gateway, channel_code,
                merchant_id, payment_method_id, currency_id, country_id, amount,
                description, status, callback_url, expired_at, response_json,
                created_date, created_user, updated_date, updated_user, data_status
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                     $16, $17, $18, $17, 'ACTIVE')
             ON CONFLICT (transaction_id) DO UPDATE SET
                reference_no = EXCLUDED.reference_no,
                payment_gateway = EXCLUDED.payment_gateway,
                channel_code = EXCLUDED.channel_code,
                merchant_id = EXCLUDED.merchant_id,
                payment_method_id = EXCLUDED.payment_method_id,
                currency_id = EXCLUDED.currency_id,
                country_id = EXCLUDED.country_id,
                amount = EXCLUDED.amount,
                description = EXCLUDED.description,
                status = EXCLUDED.status,
                callback_url = EXCLUDED.callback_url,
                expired_at = EXCLUDED.expired_at,
                response_json = EXCLUDED.response_json,
                updated_date = EXCLUDED.updated_date,
                updated_user = EXCLUDED.updated_user,
                data_status = 'ACTIVE'
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(&payment.transaction_id)
        .bind(&payment.reference_no)
        .bind(&payment.payment_gateway)
        .bind(&payment.channel_code)
        .bind(payment.merchant_id)
        .bind(payment.payment_method_id)
        .bind(payment.currency_id)
        .bind(payment.country_id)
        .bind(&payment.amount)
        .bind(&payment.description)
        .bind(&payment.status)
        .bind(&payment.callback_url)
        .bind(payment.expired_at)
        .bind(&payment.response_json)
        .bind(payment.created_date)
        .bind(&payment.actor)
        .bind(payment.updated_date)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_by_transaction_id(
        conn: &mut PgConnection,
        transaction_id: &str,
    ) -> Result<Option<PaymentRecord>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM payments WHERE transaction_id = $1",
            PAYMENT_COLUMNS
        );
        sqlx::query_as::<_, PaymentRecord>(&sql)
            .bind(transaction_id)
            .fetch_optional(conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    pub async fn count_by_transaction_id(
        conn: &mut PgConnection,
        transaction_id: &str,
    ) -> Result<i64, DatabaseError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM payments WHERE transaction_id = $1")
            .bind(transaction_id)
            .fetch_one(conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
