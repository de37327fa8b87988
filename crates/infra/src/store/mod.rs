//! Logical stores the engines read and write.
//!
//! The engines need three stores (batch ledger, movement journal, product
//! catalog) and make no assumption about how they are persisted. In-memory
//! implementations are provided for tests/dev.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::{InMemoryBatchLedger, InMemoryMovementJournal, InMemoryProductCatalog};
pub use r#trait::{BatchLedger, MovementFilter, MovementJournal, ProductCatalog, StoreError};

use std::sync::Arc;

/// Handles to the three stores, shared by every engine.
#[derive(Clone)]
pub struct InventoryStores {
    pub ledger: Arc<dyn BatchLedger>,
    pub journal: Arc<dyn MovementJournal>,
    pub catalog: Arc<dyn ProductCatalog>,
}

impl InventoryStores {
    pub fn new(
        ledger: Arc<dyn BatchLedger>,
        journal: Arc<dyn MovementJournal>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        Self {
            ledger,
            journal,
            catalog,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryBatchLedger::new()),
            Arc::new(InMemoryMovementJournal::new()),
            Arc::new(InMemoryProductCatalog::new()),
        )
    }
}

impl core::fmt::Debug for InventoryStores {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InventoryStores").finish_non_exhaustive()
    }
}
