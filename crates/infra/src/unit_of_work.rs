//! All-or-nothing application of one engine call.
//!
//! Every store mutation goes through a `UnitOfWork`, which keeps an undo log.
//! `commit` forgets the log; anything else (an error, an early return, a
//! panic unwinding through the caller) replays it in reverse.

use rust_decimal::Decimal;

use stockfifo_core::{BatchId, Entity, ExpectedVersion, MovementId, ProductId};
use stockfifo_inventory::{StockBatch, StockMovement};

use crate::error::EngineError;
use crate::store::{InventoryStores, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Undo {
    BatchCreated(BatchId),
    Depleted { batch_id: BatchId, amount: Decimal },
    MovementAppended(MovementId),
    StockCached { product_id: ProductId, previous: Decimal },
}

#[derive(Debug)]
pub struct UnitOfWork<'a> {
    stores: &'a InventoryStores,
    undo: Vec<Undo>,
    finished: bool,
}

impl<'a> UnitOfWork<'a> {
    pub fn begin(stores: &'a InventoryStores) -> Self {
        Self {
            stores,
            undo: Vec::new(),
            finished: false,
        }
    }

    pub fn stores(&self) -> &InventoryStores {
        self.stores
    }

    pub fn create_batch(&mut self, batch: StockBatch) -> Result<StockBatch, StoreError> {
        let created = self.stores.ledger.create(batch)?;
        self.undo.push(Undo::BatchCreated(created.id()));
        Ok(created)
    }

    pub fn deplete(
        &mut self,
        batch_id: BatchId,
        amount: Decimal,
        expected: ExpectedVersion,
    ) -> Result<StockBatch, StoreError> {
        let batch = self.stores.ledger.apply_depletion(batch_id, amount, expected)?;
        self.undo.push(Undo::Depleted { batch_id, amount });
        Ok(batch)
    }

    pub fn append(&mut self, movement: StockMovement) -> Result<StockMovement, StoreError> {
        let appended = self.stores.journal.append(movement)?;
        self.undo.push(Undo::MovementAppended(appended.id()));
        Ok(appended)
    }

    pub fn cache_stock(&mut self, product_id: ProductId, stock: Decimal) -> Result<(), StoreError> {
        let previous = self.stores.catalog.set_current_stock(product_id, stock)?;
        self.undo.push(Undo::StockCached { product_id, previous });
        Ok(())
    }

    pub fn commit(mut self) {
        self.undo.clear();
        self.finished = true;
    }

    /// Undo everything done so far, newest change first.
    ///
    /// Keeps going after a failed step so that as much as possible is undone;
    /// the first failure is returned.
    pub fn rollback(mut self) -> Result<(), StoreError> {
        self.finished = true;
        self.undo_all()
    }

    fn undo_all(&mut self) -> Result<(), StoreError> {
        let mut first_error = None;

        while let Some(step) = self.undo.pop() {
            let outcome = match &step {
                Undo::BatchCreated(batch_id) => self.stores.ledger.discard_batch(*batch_id),
                Undo::Depleted { batch_id, amount } => self
                    .stores
                    .ledger
                    .restore_depletion(*batch_id, *amount)
                    .map(|_| ()),
                Undo::MovementAppended(movement_id) => self.stores.journal.retract(*movement_id),
                Undo::StockCached { product_id, previous } => self
                    .stores
                    .catalog
                    .set_current_stock(*product_id, *previous)
                    .map(|_| ()),
            };

            if let Err(e) = outcome {
                tracing::error!(step = ?step, error = %e, "rollback step failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for UnitOfWork<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.undo.is_empty() {
            tracing::warn!(steps = self.undo.len(), "unit of work dropped uncommitted; rolling back");
            let _ = self.undo_all();
        }
    }
}

/// Run `work` in a fresh unit of work: commit on success, roll back on error.
pub fn run<T>(
    stores: &InventoryStores,
    work: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    let mut uow = UnitOfWork::begin(stores);
    match work(&mut uow) {
        Ok(value) => {
            uow.commit();
            Ok(value)
        }
        Err(err) => {
            tracing::warn!(error = %err, steps = uow.undo.len(), "rolling back unit of work");
            if let Err(rollback_err) = uow.rollback() {
                tracing::error!(error = %rollback_err, "rollback incomplete");
            }
            Err(err)
        }
    }
}
