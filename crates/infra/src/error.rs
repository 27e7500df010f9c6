//! Service-level error taxonomy.

use thiserror::Error;

use hotelstock_core::DomainError;

use crate::store::StoreError;

/// What a ledger operation can fail with, as seen by callers.
///
/// Every failed mutation leaves balances and the log exactly as they were.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient stock: requested {requested}, available {available}")]
    InsufficientStock { requested: i64, available: i64 },

    /// A transfer destination hotel/department is absent or inactive.
    #[error("{0}")]
    ReferenceNotFound(String),

    /// A business conflict (e.g. renaming onto an occupied location).
    #[error("{0}")]
    Conflict(String),

    /// Version conflicts persisted past the retry budget.
    #[error("concurrent modification: {0}")]
    ConcurrencyConflict(String),

    #[error("database error: {0}")]
    Database(String),
}

impl LedgerError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::ConcurrencyConflict(_))
    }
}

impl From<DomainError> for LedgerError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => LedgerError::Validation(msg),
            DomainError::NotFound(msg) => LedgerError::NotFound(msg),
            DomainError::InsufficientStock { requested, available } => {
                LedgerError::InsufficientStock { requested, available }
            }
            DomainError::ReferenceNotFound(msg) => LedgerError::ReferenceNotFound(msg),
            DomainError::Conflict(msg) => LedgerError::Conflict(msg),
            DomainError::InvariantViolation(msg) => LedgerError::Database(format!("invariant violated: {msg}")),
        }
    }
}

impl From<StoreError> for LedgerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Conflict(msg) => LedgerError::ConcurrencyConflict(msg),
            StoreError::Database(msg) => LedgerError::Database(msg),
            StoreError::Integrity(msg) => LedgerError::Database(format!("integrity violation: {msg}")),
        }
    }
}
