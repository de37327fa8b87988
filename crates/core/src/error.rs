//! Domain error model.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Infrastructure concerns belong elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A requested product or batch does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (e.g. stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// More stock was requested than the product currently holds.
    ///
    /// User-correctable; raised before any mutation happens.
    #[error("insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: Decimal,
        requested: Decimal,
    },

    /// The cached aggregate stock and the batch ledger disagree.
    #[error("ledger inconsistency: {0}")]
    LedgerInconsistency(String),

    /// A generated batch number is already taken.
    #[error("duplicate batch number: {0}")]
    DuplicateBatchNumber(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// A quantity or value left the representable decimal range.
    pub fn overflow(what: impl core::fmt::Display) -> Self {
        Self::Validation(format!("arithmetic overflow: {what}"))
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn insufficient_stock(
        product: impl Into<String>,
        available: Decimal,
        requested: Decimal,
    ) -> Self {
        Self::InsufficientStock {
            product: product.into(),
            available,
            requested,
        }
    }

    pub fn ledger_inconsistency(msg: impl Into<String>) -> Self {
        Self::LedgerInconsistency(msg.into())
    }
}
