//! Repository Errors

use uuid::Uuid;

/// Postgres `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Errors that can occur while loading or saving records
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// Optimistic concurrency conflict
    #[error("Concurrency conflict for {aggregate_type} {aggregate_id}: expected version {expected}")]
    ConcurrencyConflict {
        aggregate_type: &'static str,
        aggregate_id: Uuid,
        expected: i64,
    },

    /// Unique constraint violated (carries the constraint name)
    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored row does not satisfy a domain invariant
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                return RepositoryError::UniqueViolation(constraint);
            }
        }
        RepositoryError::Database(err)
    }
}

impl RepositoryError {
    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, RepositoryError::ConcurrencyConflict { .. })
    }

    pub(crate) fn corrupt(what: impl std::fmt::Display) -> Self {
        RepositoryError::Corrupt(what.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_stay_database() {
        let err: RepositoryError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, RepositoryError::Database(_)));
        assert!(!err.is_concurrency_conflict());
    }

    #[test]
    fn test_conflict_message() {
        let id = Uuid::nil();
        let err = RepositoryError::ConcurrencyConflict {
            aggregate_type: "User",
            aggregate_id: id,
            expected: 3,
        };
        assert!(err.is_concurrency_conflict());
        assert_eq!(
            err.to_string(),
            format!("Concurrency conflict for User {}: expected version 3", id)
        );
    }
}
