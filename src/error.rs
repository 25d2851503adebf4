//! Error types for the profile store and the query service.
//!
//! [`StoreError`] is what the storage layer raises. [`ProfileError`] is what
//! the query service hands back to callers: it never carries a raw driver
//! error, only a message, and distinguishes a taken name from every other
//! failure so a UI can say "name already exists".

use thiserror::Error;

/// Failure raised by [`ProfileStore`](crate::store::ProfileStore) and
/// [`ReferenceCatalog`](crate::catalog::ReferenceCatalog).
#[derive(Error, Debug)]
pub enum StoreError {
    /// A UNIQUE constraint rejected the write.
    #[error("constraint violation: {constraint}")]
    ConstraintViolation { constraint: String },

    /// An update targeted a row that no longer exists.
    #[error("car profile not found: {id}")]
    NotFound { id: i64 },

    #[error("storage error: {0}")]
    Storage(sqlx::Error),
}

impl StoreError {
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, StoreError::ConstraintViolation { .. })
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return StoreError::ConstraintViolation {
                    constraint: db_err.message().to_string(),
                };
            }
        }
        StoreError::Storage(err)
    }
}

/// Result type for store and catalog operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Outcome of a query service write.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProfileError {
    #[error("A car with this name already exists")]
    NameTaken(String),

    #[error("Name is required")]
    NameRequired,

    #[error("car profile not found: {0}")]
    NotFound(i64),

    #[error("{0}")]
    Storage(String),
}

impl ProfileError {
    /// Translate a store failure, keeping the profile name for conflicts.
    pub fn from_store(err: StoreError, name: &str) -> Self {
        match err {
            StoreError::ConstraintViolation { .. } => ProfileError::NameTaken(name.to_string()),
            StoreError::NotFound { id } => ProfileError::NotFound(id),
            StoreError::Storage(e) => ProfileError::Storage(e.to_string()),
        }
    }
}
