use crate::database::error::DatabaseError;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// Columns shared by every channel sub-record.
#[derive(Debug, Clone)]
pub struct SubRecordFields {
    pub transaction_id: String,
    pub url_return: Option<String>,
    pub customer_username: Option<String>,
    pub customer_msisdn: Option<String>,
    pub customer_email: Option<String>,
    pub response_json: JsonValue,
    pub actor: String,
    pub created_date: i64,
    pub updated_date: i64,
}

#[derive(Debug, Clone)]
pub struct UpsertQris {
    pub fields: SubRecordFields,
    pub qr_string: String,
}

#[derive(Debug, Clone)]
pub struct UpsertVa {
    pub fields: SubRecordFields,
    pub va_provider_id: Option<Uuid>,
    pub va_number: String,
}

#[derive(Debug, Clone)]
pub struct UpsertEwallet {
    pub fields: SubRecordFields,
    pub ewallet_provider_id: Option<Uuid>,
    pub response_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct QrisRecord {
    pub id: Uuid,
    pub transaction_id: String,
    pub qr_string: String,
    pub response_json: JsonValue,
    pub created_date: i64,
    pub updated_date: Option<i64>,
    pub data_status: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct VaRecord {
    pub id: Uuid,
    pub transaction_id: String,
    pub va_provider_id: Option<Uuid>,
    pub va_number: String,
    pub response_json: JsonValue,
    pub created_date: i64,
    pub updated_date: Option<i64>,
    pub data_status: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct EwalletRecord {
    pub id: Uuid,
    pub transaction_id: String,
    pub ewallet_provider_id: Option<Uuid>,
    pub customer_msisdn: Option<String>,
    pub response_url: Option<String>,
    pub response_json: JsonValue,
    pub created_date: i64,
    pub updated_date: Option<i64>,
    pub data_status: String,
}

/// Number of sub-records of each type stored for one transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct ChannelRecordCounts {
    pub qris: i64,
    pub va: i64,
    pub ewallet: i64,
}

impl ChannelRecordCounts {
    pub fn total(&self) -> i64 {
        self.qris + self.va + self.ewallet
    }
}

/// The three channel sub-tables keyed by `transaction_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTable {
    Qris,
    Va,
    Ewallet,
}

impl ChannelTable {
    pub const ALL: [ChannelTable; 3] = [ChannelTable::Qris, ChannelTable::Va, ChannelTable::Ewallet];

    pub fn table_name(&self) -> &'static str {
        match self {
            ChannelTable::Qris => "payment_qrises",
            ChannelTable::Va => "payment_vas",
            ChannelTable::Ewallet => "payment_ewallets",
        }
    }
}

pub struct ChannelRecordRepository;

impl ChannelRecordRepository {
    pub async fn upsert_qris(
        conn: &mut PgConnection,
        record: &UpsertQris,
    ) -> Result<Uuid, DatabaseError> {
        let f = &record.fields;
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO payment_qrises (
                id, transaction_id, qr_string, url_return, customer_username,
                customer_msisdn, customer_email, response_json,
                created_date, created_user, updated_date, updated_user, data_status
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $10, 'ACTIVE')
             ON CONFLICT (transaction_id) DO UPDATE SET
                qr_string = EXCLUDED.qr_string,
                response_json = EXCLUDED.response_json,
                updated_date = EXCLUDED.updated_date,
                updated_user = EXCLUDED.updated_user,
                data_status = 'ACTIVE'
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(&f.transaction_id)
        .bind(&record.qr_string)
        .bind(&f.url_return)
        .bind(&f.customer_username)
        .bind(&f.customer_msisdn)
        .bind(&f.customer_email)
        .bind(&f.response_json)
        .bind(f.created_date)
        .bind(&f.actor)
        .bind(f.updated_date)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn upsert_va(
        conn: &mut PgConnection,
        record: &UpsertVa,
    ) -> Result<Uuid, DatabaseError> {
        let f = &record.fields;
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO payment_vas (
                id, transaction_id, va_provider_id, va_number, url_return,
                customer_username, customer_msisdn, customer_email, response_json,
                created_date, created_user, updated_date, updated_user, data_status
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $11, 'ACTIVE')
             ON CONFLICT (transaction_id) DO UPDATE SET
                va_provider_id = EXCLUDED.va_provider_id,
                va_number = EXCLUDED.va_number,
                response_json = EXCLUDED.response_json,
                updated_date = EXCLUDED.updated_date,
                updated_user = EXCLUDED.updated_user,
                data_status = 'ACTIVE'
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(&f.transaction_id)
        .bind(record.va_provider_id)
        .bind(&record.va_number)
        .bind(&f.url_return)
        .bind(&f.customer_username)
        .bind(&f.customer_msisdn)
        .bind(&f.customer_email)
        .bind(&f.response_json)
        .bind(f.created_date)
        .bind(&f.actor)
        .bind(f.updated_date)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn upsert_ewallet(
        conn: &mut PgConnection,
        record: &UpsertEwallet,
    ) -> Result<Uuid, DatabaseError> {
        let f = &record.fields;
        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO payment_ewallets (
                id, transaction_id, ewallet_provider_id, url_return, customer_username,
                customer_msisdn, customer_email, response_url, response_json,
                created_date, created_user, updated_date, updated_user, data_status
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $11, 'ACTIVE')
             ON CONFLICT (transaction_id) DO UPDATE SET
                ewallet_provider_id = EXCLUDED.ewallet_provider_id,
                customer_msisdn = EXCLUDED.customer_msisdn,
                response_url = EXCLUDED.response_url,
                response_json = EXCLUDED.response_json,
                updated_date = EXCLUDED.updated_date,
                updated_user = EXCLUDED.updated_user,
                data_status = 'ACTIVE'
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(&f.transaction_id)
        .bind(record.ewallet_provider_id)
        .bind(&f.url_return)
        .bind(&f.customer_username)
        .bind(&f.customer_msisdn)
        .bind(&f.customer_email)
        .bind(&record.response_url)
        .bind(&f.response_json)
        .bind(f.created_date)
        .bind(&f.actor)
        .bind(f.updated_date)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_qris(
        conn: &mut PgConnection,
        transaction_id: &str,
    ) -> Result<Option<QrisRecord>, DatabaseError> {
        sqlx::query_as::<_, QrisRecord>(
            "SELECT id, transaction_id, qr_string, response_json, created_date, updated_date, data_status
             FROM payment_qrises WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_va(
        conn: &mut PgConnection,
        transaction_id: &str,
    ) -> Result<Option<VaRecord>, DatabaseError> {
        sqlx::query_as::<_, VaRecord>(
            "SELECT id, transaction_id, va_provider_id, va_number, response_json, created_date, updated_date, data_status
             FROM payment_vas WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    pub async fn find_ewallet(
        conn: &mut PgConnection,
        transaction_id: &str,
    ) -> Result<Option<EwalletRecord>, DatabaseError> {
        sqlx::query_as::<_, EwalletRecord>(
            "SELECT id, transaction_id, ewallet_provider_id, customer_msisdn, response_url, response_json,
                    created_date, updated_date, data_status
             FROM payment_ewallets WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .fetch_optional(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    /// Removes the transaction's rows from every sub-table except `keep`.
    /// `None` clears all three. Returns the number of rows deleted.
    pub async fn delete_except(
        conn: &mut PgConnection,
        transaction_id: &str,
        keep: Option<ChannelTable>,
    ) -> Result<u64, DatabaseError> {
        let mut deleted = 0;
        for table in ChannelTable::ALL {
            if Some(table) == keep {
                continue;
            }
            let sql = format!("DELETE FROM {} WHERE transaction_id = $1", table.table_name());
            deleted += sqlx::query(&sql)
                .bind(transaction_id)
                .execute(&mut *conn)
                .await
                .map_err(DatabaseError::from_sqlx)?
                .rows_affected();
        }
        Ok(deleted)
    }

    pub async fn count_for_transaction(
        conn: &mut PgConnection,
        transaction_id: &str,
    ) -> Result<ChannelRecordCounts, DatabaseError> {
        sqlx::query_as::<_, ChannelRecordCounts>(
            "SELECT
                (SELECT COUNT(*) FROM payment_qrises WHERE transaction_id = $1) AS qris,
                (SELECT COUNT(*) FROM payment_vas WHERE transaction_id = $1) AS va,
                (SELECT COUNT(*) FROM payment_ewallets WHERE transaction_id = $1) AS ewallet",
        )
        .bind(transaction_id)
        .fetch_one(conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
