use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use stockfifo_core::{BatchId, DomainError, Entity, ExpectedVersion, MovementId, ProductId};
use stockfifo_inventory::{
    BatchNumber, BatchNumberScope, MovementDirection, Product, StockBatch, StockMovement,
};

use std::sync::Arc;

/// Store operation error.
///
/// These are **infrastructure errors** (storage, uniqueness, concurrency) as
/// opposed to business outcomes such as insufficient stock.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store lock poisoned: {0}")]
    LockPoisoned(&'static str),

    #[error("batch number already exists: {0}")]
    DuplicateBatchNumber(String),

    #[error("duplicate key: {0}")]
    DuplicateKey(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The stored record rejected the change (bounds or version check).
    #[error(transparent)]
    Rejected(#[from] DomainError),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Owns every stock batch of every product.
///
/// Batches are never deleted once committed: depleted ones drop out of
/// `available_batches` but stay in `all_batches`.
pub trait BatchLedger: Send + Sync {
    /// Batches with remaining stock, ordered by `(entry_date, id)` ascending.
    fn available_batches(&self, product_id: ProductId) -> Result<Vec<StockBatch>, StoreError>;

    /// Every batch of the product, newest entry first.
    fn all_batches(&self, product_id: ProductId) -> Result<Vec<StockBatch>, StoreError>;

    /// Every batch of every product.
    fn list(&self) -> Result<Vec<StockBatch>, StoreError>;

    fn get(&self, batch_id: BatchId) -> Result<Option<StockBatch>, StoreError>;

    fn find_by_number(&self, number: &BatchNumber) -> Result<Option<StockBatch>, StoreError>;

    /// Batch numbers already allocated in `scope`.
    fn numbers_in_scope(&self, scope: &BatchNumberScope) -> Result<Vec<BatchNumber>, StoreError>;

    /// Persist a new batch. Fails with `DuplicateBatchNumber` instead of
    /// overwriting an existing batch.
    fn create(&self, batch: StockBatch) -> Result<StockBatch, StoreError>;

    /// Decrement the remaining quantity of a batch.
    fn apply_depletion(
        &self,
        batch_id: BatchId,
        amount: Decimal,
        expected: ExpectedVersion,
    ) -> Result<StockBatch, StoreError>;

    /// Rollback hook: give back a depletion of an uncommitted unit of work.
    fn restore_depletion(&self, batch_id: BatchId, amount: Decimal) -> Result<StockBatch, StoreError>;

    /// Rollback hook: drop a batch created by an uncommitted unit of work.
    fn discard_batch(&self, batch_id: BatchId) -> Result<(), StoreError>;
}

/// Search criteria resolved to identifiers. Bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MovementFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub product_id: Option<ProductId>,
    pub direction: Option<MovementDirection>,
    pub batch_id: Option<BatchId>,
}

impl MovementFilter {
    pub fn matches(&self, movement: &StockMovement) -> bool {
        self.from.is_none_or(|from| movement.occurred_at() >= from)
            && self.to.is_none_or(|to| movement.occurred_at() <= to)
            && self.product_id.is_none_or(|p| movement.product_id() == p)
            && self.direction.is_none_or(|d| movement.direction() == d)
            && self.batch_id.is_none_or(|b| movement.batch_id() == b)
    }
}

/// Newest first; the movement id breaks timestamp ties.
pub fn newest_first(movements: &mut [StockMovement]) {
    movements.sort_by(|a, b| {
        b.occurred_at()
            .cmp(&a.occurred_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
}

/// Append-only log of stock movements.
pub trait MovementJournal: Send + Sync {
    fn append(&self, movement: StockMovement) -> Result<StockMovement, StoreError>;

    /// Movements of one product, newest first.
    fn by_product(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError>;

    /// Every movement, newest first.
    fn all(&self) -> Result<Vec<StockMovement>, StoreError>;

    /// Movements matching `filter`, newest first.
    fn search(&self, filter: &MovementFilter) -> Result<Vec<StockMovement>, StoreError>;

    /// Rollback hook: remove a movement appended by an uncommitted unit of work.
    fn retract(&self, movement_id: MovementId) -> Result<(), StoreError>;
}

/// Product master data and the cached stock level.
pub trait ProductCatalog: Send + Sync {
    /// Register a product; references are unique.
    fn insert(&self, product: Product) -> Result<Product, StoreError>;

    fn get(&self, product_id: ProductId) -> Result<Option<Product>, StoreError>;

    fn find_by_reference(&self, reference: &str) -> Result<Option<Product>, StoreError>;

    /// Every product, ordered by reference.
    fn list(&self) -> Result<Vec<Product>, StoreError>;

    fn count(&self) -> Result<usize, StoreError>;

    /// Overwrite the cached stock; returns the previous value.
    fn set_current_stock(&self, product_id: ProductId, stock: Decimal) -> Result<Decimal, StoreError>;
}

impl<S> MovementJournal for Arc<S>
where
    S: MovementJournal + ?Sized,
{
    fn append(&self, movement: StockMovement) -> Result<StockMovement, StoreError> {
        (**self).append(movement)
    }

    fn by_product(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        (**self).by_product(product_id)
    }

    fn all(&self) -> Result<Vec<StockMovement>, StoreError> {
        (**self).all()
    }

    fn search(&self, filter: &MovementFilter) -> Result<Vec<StockMovement>, StoreError> {
        (**self).search(filter)
    }

    fn retract(&self, movement_id: MovementId) -> Result<(), StoreError> {
        (**self).retract(movement_id)
    }
}
