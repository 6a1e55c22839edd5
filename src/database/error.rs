use thiserror::Error;

/// Postgres SQLSTATE codes the persistence layer distinguishes.
const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseErrorKind {
    ConnectionError { message: String },
    NotFound { entity: String, id: String },
    UniqueViolation { constraint: Option<String> },
    ForeignKeyViolation { constraint: Option<String> },
    InvalidValue { message: String },
    TransactionConflict { message: String },
    Unknown { message: String },
}

#[derive(Debug, Clone, Error)]
#[error("{}", describe(.kind))]
pub struct DatabaseError {
    pub kind: DatabaseErrorKind,
}

fn describe(kind: &DatabaseErrorKind) -> String {
    match kind {
        DatabaseErrorKind::ConnectionError { message } => {
            format!("database connection error: {}", message)
        }
        DatabaseErrorKind::NotFound { entity, id } => format!("{} not found: {}", entity, id),
        DatabaseErrorKind::UniqueViolation { constraint } => format!(
            "unique constraint violated: {}",
            constraint.as_deref().unwrap_or("unknown")
        ),
        DatabaseErrorKind::ForeignKeyViolation { constraint } => format!(
            "foreign key constraint violated: {}",
            constraint.as_deref().unwrap_or("unknown")
        ),
        DatabaseErrorKind::InvalidValue { message } => format!("invalid value: {}", message),
        DatabaseErrorKind::TransactionConflict { message } => {
            format!("transaction conflict: {}", message)
        }
        DatabaseErrorKind::Unknown { message } => format!("database error: {}", message),
    }
}

impl DatabaseError {
    pub fn new(kind: DatabaseErrorKind) -> Self {
        Self { kind }
    }

    pub fn not_found(entity: &str, id: impl Into<String>) -> Self {
        Self::new(DatabaseErrorKind::NotFound {
            entity: entity.to_string(),
            id: id.into(),
        })
    }

    pub fn from_sqlx(err: sqlx::Error) -> Self {
        let kind = match &err {
            sqlx::Error::RowNotFound => DatabaseErrorKind::NotFound {
                entity: "row".to_string(),
                id: String::new(),
            },
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DatabaseErrorKind::ConnectionError {
                    message: err.to_string(),
                }
            }
            sqlx::Error::Database(db_err) => {
                let constraint = db_err.constraint().map(str::to_string);
                match db_err.code().as_deref() {
                    Some(UNIQUE_VIOLATION) => DatabaseErrorKind::UniqueViolation { constraint },
                    Some(FOREIGN_KEY_VIOLATION) => {
                        DatabaseErrorKind::ForeignKeyViolation { constraint }
                    }
                    Some(NUMERIC_VALUE_OUT_OF_RANGE) => DatabaseErrorKind::InvalidValue {
                        message: db_err.message().to_string(),
                    },
                    Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED) => {
                        DatabaseErrorKind::TransactionConflict {
                            message: db_err.message().to_string(),
                        }
                    }
                    _ => DatabaseErrorKind::Unknown {
                        message: db_err.message().to_string(),
                    },
                }
            }
            _ => DatabaseErrorKind::Unknown {
                message: err.to_string(),
            },
        };
        Self { kind }
    }

    /// Whether the caller may reasonably resubmit the same unit of work.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            DatabaseErrorKind::ConnectionError { .. }
                | DatabaseErrorKind::TransactionConflict { .. }
        )
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        Self::from_sqlx(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = DatabaseError::from_sqlx(sqlx::Error::RowNotFound);
        assert!(matches!(err.kind, DatabaseErrorKind::NotFound { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn pool_timeout_is_retryable() {
        let err = DatabaseError::from_sqlx(sqlx::Error::PoolTimedOut);
        assert!(matches!(err.kind, DatabaseErrorKind::ConnectionError { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn display_names_entity() {
        let err = DatabaseError::not_found("payment", "pr-1");
        assert_eq!(err.to_string(), "payment not found: pr-1");
    }
}
