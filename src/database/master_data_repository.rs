//! Lookup and lazy creation of dimension rows (merchants, currencies, countries,
//! payment methods, channel providers).
//!
//! Every dimension is a surrogate UUID plus a natural key guarded by a UNIQUE
//! constraint. Creation is `INSERT .. ON CONFLICT DO NOTHING` followed by a
//! re-read, so concurrent writers for the same key converge on one row.

use crate::database::error::DatabaseError;
use sqlx::PgConnection;
use uuid::Uuid;

/// Static description of one dimension table.
pub trait Dimension: Send + Sync + 'static {
    /// Entity label used in logs and errors.
    const ENTITY: &'static str;
    const TABLE: &'static str;
    const KEY_COLUMN: &'static str;
    const NAME_COLUMN: &'static str;
}

pub struct Merchants;
pub struct Currencies;
pub struct Countries;
pub struct PaymentMethods;
pub struct EwalletProviders;
pub struct VaProviders;

impl Dimension for Merchants {
    const ENTITY: &'static str = "merchant";
    const TABLE: &'static str = "merchants";
    const KEY_COLUMN: &'static str = "code";
    const NAME_COLUMN: &'static str = "name";
}

impl Dimension for Currencies {
    const ENTITY: &'static str = "currency";
    const TABLE: &'static str = "currencies";
    const KEY_COLUMN: &'static str = "code";
    const NAME_COLUMN: &'static str = "name";
}

impl Dimension for Countries {
    const ENTITY: &'static str = "country";
    const TABLE: &'static str = "countries";
    const KEY_COLUMN: &'static str = "country_id";
    const NAME_COLUMN: &'static str = "name";
}

impl Dimension for PaymentMethods {
    const ENTITY: &'static str = "payment_method";
    const TABLE: &'static str = "payment_methods";
    const KEY_COLUMN: &'static str = "name";
    const NAME_COLUMN: &'static str = "display_name";
}

impl Dimension for EwalletProviders {
    const ENTITY: &'static str = "ewallet_provider";
    const TABLE: &'static str = "ewallet_providers";
    const KEY_COLUMN: &'static str = "provider_name";
    const NAME_COLUMN: &'static str = "display_name";
}

impl Dimension for VaProviders {
    const ENTITY: &'static str = "va_provider";
    const TABLE: &'static str = "va_providers";
    const KEY_COLUMN: &'static str = "provider_name";
    const NAME_COLUMN: &'static str = "display_name";
}

/// Values written on creation of a dimension row.
#[derive(Debug, Clone)]
pub struct NewDimension<'a> {
    pub key: &'a str,
    pub display_name: &'a str,
    pub actor: &'a str,
    pub created_at_millis: i64,
}

pub struct MasterDataRepository;

impl MasterDataRepository {
    /// Id of the row for `key`, whatever its `data_status`. The key column is
    /// unique, so a soft-deleted row is reused rather than shadowed.
    pub async fn find_by_natural_key<D: Dimension>(
        conn: &mut PgConnection,
        key: &str,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let sql = format!("SELECT id FROM {} WHERE {} = $1", D::TABLE, D::KEY_COLUMN);
        sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(key)
            .fetch_optional(conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Insert a row unless one with the same key already exists. Returns the
    /// new id when this call created it.
    pub async fn insert_ignore<D: Dimension>(
        conn: &mut PgConnection,
        row: &NewDimension<'_>,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let sql = format!(
            "INSERT INTO {table} (id, {key}, {name}, created_date, created_user, data_status)
             VALUES ($1, $2, $3, $4, $5, 'ACTIVE')
             ON CONFLICT ({key}) DO NOTHING
             RETURNING id",
            table = D::TABLE,
            key = D::KEY_COLUMN,
            name = D::NAME_COLUMN,
        );
        sqlx::query_scalar::<_, Uuid>(&sql)
            .bind(Uuid::now_v7())
            .bind(row.key)
            .bind(row.display_name)
            .bind(row.created_at_millis)
            .bind(row.actor)
            .fetch_optional(conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }

    /// Find by natural key, else create, else re-read the row a concurrent
    /// writer created first.
    pub async fn resolve_or_create<D: Dimension>(
        conn: &mut PgConnection,
        row: &NewDimension<'_>,
    ) -> Result<Uuid, DatabaseError> {
        if let Some(id) = Self::find_by_natural_key::<D>(&mut *conn, row.key).await? {
            return Ok(id);
        }

        if let Some(id) = Self::insert_ignore::<D>(&mut *conn, row).await? {
            tracing::debug!(entity = D::ENTITY, key = %row.key, id = %id, "dimension row created");
            return Ok(id);
        }

        Self::find_by_natural_key::<D>(&mut *conn, row.key)
            .await?
            .ok_or_else(|| DatabaseError::not_found(D::ENTITY, row.key))
    }

    pub async fn count_by_natural_key<D: Dimension>(
        conn: &mut PgConnection,
        key: &str,
    ) -> Result<i64, DatabaseError> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            D::TABLE,
            D::KEY_COLUMN
        );
        sqlx::query_scalar::<_, i64>(&sql)
            .bind(key)
            .fetch_one(conn)
            .await
            .map_err(DatabaseError::from_sqlx)
    }
}
