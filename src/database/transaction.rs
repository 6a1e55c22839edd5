use crate::database::error::DatabaseError;
use sqlx::{PgPool, Postgres, Transaction};

/// Opens a transaction at READ COMMITTED. Natural-key uniqueness is enforced by
/// constraints, not by isolation level.
pub async fn begin_read_committed(
    pool: &PgPool,
) -> Result<Transaction<'static, Postgres>, DatabaseError> {
    let mut tx = pool.begin().await.map_err(DatabaseError::from_sqlx)?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;
    Ok(tx)
}
