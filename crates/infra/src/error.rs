//! Engine error model.

use rust_decimal::Decimal;
use thiserror::Error;

use stockfifo_core::DomainError;

use crate::store::StoreError;

/// Error returned by every engine operation.
///
/// - **User-correctable**: `Validation`, `NotFound`, `InsufficientStock`
/// - **Retryable**: `DuplicateBatchNumber`, `Conflict`
/// - **Fatal**: `LedgerInconsistency`, `InvariantViolation`, `Store`
///
/// Whatever the variant, the failed operation left no partial mutation behind.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    #[error("duplicate batch number: {0}")]
    DuplicateBatchNumber(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("store failure: {0}")]
    Store(StoreError),
}

impl EngineError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::DuplicateBatchNumber(_) | EngineError::Conflict(_)
        )
    }

    pub fn is_user_correctable(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::NotFound(_)
                | EngineError::InsufficientStock { .. }
        )
    }
}

impl From<DomainError> for EngineError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) => EngineError::Validation(msg),
            DomainError::InvalidId(msg) => EngineError::Validation(msg),
            DomainError::InvariantViolation(msg) => EngineError::InvariantViolation(msg),
            DomainError::NotFound(what) => EngineError::NotFound(what),
            DomainError::Conflict(msg) => EngineError::Conflict(msg),
            DomainError::InsufficientStock {
                product,
                available,
                requested,
            } => EngineError::InsufficientStock {
                product,
                available,
                requested,
            },
            DomainError::LedgerInconsistency(msg) => EngineError::LedgerInconsistency(msg),
            DomainError::DuplicateBatchNumber(n) => EngineError::DuplicateBatchNumber(n),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::DuplicateBatchNumber(n) => EngineError::DuplicateBatchNumber(n),
            StoreError::NotFound(what) => EngineError::NotFound(what),
            StoreError::DuplicateKey(key) => EngineError::Conflict(key),
            StoreError::Rejected(domain) => domain.into(),
            other => EngineError::Store(other),
        }
    }
}
