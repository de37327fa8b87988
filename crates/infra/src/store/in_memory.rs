use std::collections::HashMap;
use std::sync::RwLock;

use rust_decimal::Decimal;

use stockfifo_core::{BatchId, Entity, ExpectedVersion, MovementId, ProductId};
use stockfifo_inventory::{
    BatchNumber, BatchNumberScope, Product, StockBatch, StockMovement, available_in_fifo_order,
};

use super::r#trait::{
    BatchLedger, MovementFilter, MovementJournal, ProductCatalog, StoreError, newest_first,
};

#[derive(Debug, Default)]
struct LedgerState {
    batches: HashMap<BatchId, StockBatch>,
    by_number: HashMap<BatchNumber, BatchId>,
}

/// In-memory batch ledger.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryBatchLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryBatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, StoreError> {
        self.state.read().map_err(|_| StoreError::LockPoisoned("batch ledger"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, LedgerState>, StoreError> {
        self.state.write().map_err(|_| StoreError::LockPoisoned("batch ledger"))
    }

    fn mutate(
        &self,
        batch_id: BatchId,
        change: impl FnOnce(&mut StockBatch) -> Result<(), StoreError>,
    ) -> Result<StockBatch, StoreError> {
        let mut state = self.write()?;
        let batch = state
            .batches
            .get_mut(&batch_id)
            .ok_or_else(|| StoreError::NotFound(format!("batch {batch_id}")))?;

        // Apply to a copy so a rejected change leaves the stored row untouched.
        let mut updated = batch.clone();
        change(&mut updated)?;
        updated.check_invariants()?;
        *batch = updated.clone();
        Ok(updated)
    }
}

impl BatchLedger for InMemoryBatchLedger {
    fn available_batches(&self, product_id: ProductId) -> Result<Vec<StockBatch>, StoreError> {
        let state = self.read()?;
        Ok(available_in_fifo_order(
            state
                .batches
                .values()
                .filter(|b| b.product_id() == product_id)
                .cloned(),
        ))
    }

    fn all_batches(&self, product_id: ProductId) -> Result<Vec<StockBatch>, StoreError> {
        let state = self.read()?;
        let mut batches: Vec<StockBatch> = state
            .batches
            .values()
            .filter(|b| b.product_id() == product_id)
            .cloned()
            .collect();
        batches.sort_by(|a, b| b.fifo_key().cmp(&a.fifo_key()));
        Ok(batches)
    }

    fn list(&self) -> Result<Vec<StockBatch>, StoreError> {
        let state = self.read()?;
        let mut batches: Vec<StockBatch> = state.batches.values().cloned().collect();
        batches.sort_by_key(|b| (b.product_id(), b.fifo_key()));
        Ok(batches)
    }

    fn get(&self, batch_id: BatchId) -> Result<Option<StockBatch>, StoreError> {
        Ok(self.read()?.batches.get(&batch_id).cloned())
    }

    fn find_by_number(&self, number: &BatchNumber) -> Result<Option<StockBatch>, StoreError> {
        let state = self.read()?;
        Ok(state
            .by_number
            .get(number)
            .and_then(|id| state.batches.get(id))
            .cloned())
    }

    fn numbers_in_scope(&self, scope: &BatchNumberScope) -> Result<Vec<BatchNumber>, StoreError> {
        let state = self.read()?;
        Ok(state
            .by_number
            .keys()
            .filter(|n| scope.sequence_of(n).is_some())
            .cloned()
            .collect())
    }

    fn create(&self, batch: StockBatch) -> Result<StockBatch, StoreError> {
        batch.check_invariants()?;
        let mut state = self.write()?;

        if state.by_number.contains_key(batch.batch_number()) {
            return Err(StoreError::DuplicateBatchNumber(batch.batch_number().to_string()));
        }
        if state.batches.contains_key(&batch.id()) {
            return Err(StoreError::DuplicateKey(format!("batch {}", batch.id())));
        }

        state.by_number.insert(batch.batch_number().clone(), batch.id());
        state.batches.insert(batch.id(), batch.clone());
        Ok(batch)
    }

    fn apply_depletion(
        &self,
        batch_id: BatchId,
        amount: Decimal,
        expected: ExpectedVersion,
    ) -> Result<StockBatch, StoreError> {
        self.mutate(batch_id, |batch| Ok(batch.deplete(amount, expected)?))
    }

    fn restore_depletion(&self, batch_id: BatchId, amount: Decimal) -> Result<StockBatch, StoreError> {
        self.mutate(batch_id, |batch| Ok(batch.restore(amount)?))
    }

    fn discard_batch(&self, batch_id: BatchId) -> Result<(), StoreError> {
        let mut state = self.write()?;
        let batch = state
            .batches
            .remove(&batch_id)
            .ok_or_else(|| StoreError::NotFound(format!("batch {batch_id}")))?;
        state.by_number.remove(batch.batch_number());
        Ok(())
    }
}

/// In-memory append-only movement journal.
#[derive(Debug, Default)]
pub struct InMemoryMovementJournal {
    entries: RwLock<Vec<StockMovement>>,
}

impl InMemoryMovementJournal {
    pub fn new() -> Self {
        Self::default()
    }

    fn select(&self, filter: &MovementFilter) -> Result<Vec<StockMovement>, StoreError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| StoreError::LockPoisoned("movement journal"))?;
        let mut found: Vec<StockMovement> =
            entries.iter().filter(|m| filter.matches(m)).cloned().collect();
        newest_first(&mut found);
        Ok(found)
    }
}

impl MovementJournal for InMemoryMovementJournal {
    fn append(&self, movement: StockMovement) -> Result<StockMovement, StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("movement journal"))?;

        if entries.iter().any(|m| m.id() == movement.id()) {
            return Err(StoreError::DuplicateKey(format!("movement {}", movement.id())));
        }
        entries.push(movement.clone());
        Ok(movement)
    }

    fn by_product(&self, product_id: ProductId) -> Result<Vec<StockMovement>, StoreError> {
        self.select(&MovementFilter {
            product_id: Some(product_id),
            ..MovementFilter::default()
        })
    }

    fn all(&self) -> Result<Vec<StockMovement>, StoreError> {
        self.select(&MovementFilter::default())
    }

    fn search(&self, filter: &MovementFilter) -> Result<Vec<StockMovement>, StoreError> {
        self.select(filter)
    }

    fn retract(&self, movement_id: MovementId) -> Result<(), StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("movement journal"))?;
        let idx = entries
            .iter()
            .rposition(|m| m.id() == movement_id)
            .ok_or_else(|| StoreError::NotFound(format!("movement {movement_id}")))?;
        entries.remove(idx);
        Ok(())
    }
}

/// In-memory product catalog.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProductCatalog for InMemoryProductCatalog {
    fn insert(&self, product: Product) -> Result<Product, StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::LockPoisoned("product catalog"))?;

        if products.contains_key(&product.id()) {
            return Err(StoreError::DuplicateKey(format!("product {}", product.id())));
        }
        if products.values().any(|p| p.reference() == product.reference()) {
            return Err(StoreError::DuplicateKey(format!(
                "product reference {}",
                product.reference()
            )));
        }

        products.insert(product.id(), product.clone());
        Ok(product)
    }

    fn get(&self, product_id: ProductId) -> Result<Option<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::LockPoisoned("product catalog"))?;
        Ok(products.get(&product_id).cloned())
    }

    fn find_by_reference(&self, reference: &str) -> Result<Option<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::LockPoisoned("product catalog"))?;
        Ok(products.values().find(|p| p.reference() == reference).cloned())
    }

    fn list(&self) -> Result<Vec<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::LockPoisoned("product catalog"))?;
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by(|a, b| a.reference().cmp(b.reference()));
        Ok(all)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::LockPoisoned("product catalog"))?;
        Ok(products.len())
    }

    fn set_current_stock(&self, product_id: ProductId, stock: Decimal) -> Result<Decimal, StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::LockPoisoned("product catalog"))?;
        let product = products
            .get_mut(&product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;

        let previous = product.current_stock();
        product.set_current_stock(stock)?;
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;
    use stockfifo_core::DomainError;
    use stockfifo_inventory::{MovementDirection, ReceiveBatch};

    fn batch(product_id: ProductId, number: &str, minutes: i64, qty: Decimal) -> StockBatch {
        StockBatch::receive(ReceiveBatch {
            id: BatchId::new(),
            batch_number: BatchNumber::new(number).unwrap(),
            product_id,
            quantity: qty,
            unit_cost: dec!(1),
            entry_date: Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes),
            order_ref: None,
        })
        .unwrap()
    }

    #[test]
    fn ledger_rejects_duplicate_batch_numbers() {
        let ledger = InMemoryBatchLedger::new();
        let product_id = ProductId::new();
        ledger.create(batch(product_id, "LOT-1", 0, dec!(5))).unwrap();

        let err = ledger.create(batch(product_id, "LOT-1", 1, dec!(5))).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateBatchNumber(n) if n == "LOT-1"));
        assert_eq!(ledger.all_batches(product_id).unwrap().len(), 1);
    }

    #[test]
    fn ledger_rejects_rows_whose_value_cannot_be_represented() {
        let ledger = InMemoryBatchLedger::new();
        let mut row = serde_json::to_value(batch(ProductId::new(), "LOT-1", 0, dec!(5))).unwrap();
        for field in ["initial_quantity", "remaining_quantity", "unit_cost"] {
            row[field] = "1000000000000000".into();
        }
        let huge: StockBatch = serde_json::from_value(row).unwrap();

        let err = ledger.create(huge).unwrap_err();
        assert!(matches!(err, StoreError::Rejected(DomainError::Validation(_))));
        assert!(ledger.list().unwrap().is_empty());
    }

    #[test]
    fn available_batches_are_fifo_and_skip_depleted() {
        let ledger = InMemoryBatchLedger::new();
        let product_id = ProductId::new();
        let newer = ledger.create(batch(product_id, "LOT-2", 10, dec!(5))).unwrap();
        let older = ledger.create(batch(product_id, "LOT-1", 0, dec!(5))).unwrap();
        let empty = ledger.create(batch(product_id, "LOT-0", -10, dec!(5))).unwrap();
        ledger.create(batch(ProductId::new(), "LOT-X", -20, dec!(5))).unwrap();

        ledger
            .apply_depletion(empty.id(), dec!(5), ExpectedVersion::Exact(1))
            .unwrap();

        let ids: Vec<_> = ledger
            .available_batches(product_id)
            .unwrap()
            .iter()
            .map(|b| b.id())
            .collect();
        assert_eq!(ids, vec![older.id(), newer.id()]);

        let history: Vec<_> = ledger
            .all_batches(product_id)
            .unwrap()
            .iter()
            .map(|b| b.id())
            .collect();
        assert_eq!(history, vec![newer.id(), older.id(), empty.id()]);
    }

    #[test]
    fn rejected_depletion_leaves_batch_untouched() {
        let ledger = InMemoryBatchLedger::new();
        let b = ledger.create(batch(ProductId::new(), "LOT-1", 0, dec!(5))).unwrap();

        let err = ledger
            .apply_depletion(b.id(), dec!(6), ExpectedVersion::Any)
            .unwrap_err();
        assert!(matches!(err, StoreError::Rejected(DomainError::InvariantViolation(_))));
        assert_eq!(ledger.get(b.id()).unwrap().unwrap(), b);
    }

    #[test]
    fn discard_frees_the_batch_number() {
        let ledger = InMemoryBatchLedger::new();
        let b = ledger.create(batch(ProductId::new(), "LOT-1", 0, dec!(5))).unwrap();
        ledger.discard_batch(b.id()).unwrap();

        assert!(ledger.find_by_number(b.batch_number()).unwrap().is_none());
        ledger.create(batch(ProductId::new(), "LOT-1", 0, dec!(5))).unwrap();
    }

    #[test]
    fn journal_lists_newest_first_and_filters() {
        let journal = InMemoryMovementJournal::new();
        let product_id = ProductId::new();
        let b = batch(product_id, "LOT-1", 0, dec!(5));

        let t = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        let first = journal
            .append(StockMovement::receipt(MovementId::new(), &b, t, "PO-1", None).unwrap())
            .unwrap();
        let second = journal
            .append(
                StockMovement::exit(MovementId::new(), &b, dec!(2), t + Duration::hours(1), "BS-1", None)
                    .unwrap(),
            )
            .unwrap();

        let all: Vec<_> = journal.all().unwrap().iter().map(|m| m.id()).collect();
        assert_eq!(all, vec![second.id(), first.id()]);

        let outs = journal
            .search(&MovementFilter {
                direction: Some(MovementDirection::Out),
                ..MovementFilter::default()
            })
            .unwrap();
        assert_eq!(outs, vec![second.clone()]);

        journal.retract(second.id()).unwrap();
        assert_eq!(journal.by_product(product_id).unwrap(), vec![first]);
    }

    #[test]
    fn catalog_enforces_unique_references() {
        let catalog = InMemoryProductCatalog::new();
        let make = |reference: &str| {
            Product::register(stockfifo_inventory::NewProduct {
                id: ProductId::new(),
                reference: reference.to_string(),
                name: "Flour".to_string(),
                reorder_point: dec!(1),
                unit_of_measure: "KG".to_string(),
            })
            .unwrap()
        };

        let flour = catalog.insert(make("FLR")).unwrap();
        assert!(matches!(catalog.insert(make("FLR")), Err(StoreError::DuplicateKey(_))));

        let previous = catalog.set_current_stock(flour.id(), dec!(12.5)).unwrap();
        assert_eq!(previous, Decimal::ZERO);
        assert_eq!(
            catalog.find_by_reference("FLR").unwrap().unwrap().current_stock(),
            dec!(12.5)
        );
    }
}
