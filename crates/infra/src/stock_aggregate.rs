//! Per-product cached stock, derived from the batch ledger.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockfifo_core::{Entity, ProductId};
use stockfifo_inventory::valuation::checked_total;

use crate::engine::{EngineContext, load_product};
use crate::error::EngineError;
use crate::store::InventoryStores;
use crate::unit_of_work::{self, UnitOfWork};

/// One row of the stock overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: ProductId,
    pub reference: String,
    pub name: String,
    pub current_stock: Decimal,
    pub reorder_point: Decimal,
    pub unit_of_measure: String,
    pub below_reorder_point: bool,
}

#[derive(Debug, Clone)]
pub struct StockAggregate {
    ctx: EngineContext,
}

impl StockAggregate {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Refresh the cached stock of `product_id` from its available batches.
    pub fn recompute(&self, product_id: ProductId) -> Result<Decimal, EngineError> {
        self.ctx.locks.with_locked(&[product_id], || {
            unit_of_work::run(&self.ctx.stores, |uow| recompute_in(uow, product_id))
        })
    }

    /// Cached stock, as last written by `recompute`.
    pub fn current_stock(&self, product_id: ProductId) -> Result<Decimal, EngineError> {
        let product = self
            .ctx
            .locks
            .with_read_locked(&[product_id], || load_product(&self.ctx.stores, product_id))?;
        Ok(product.current_stock())
    }

    /// `current_stock <= reorder_point`.
    pub fn is_below_reorder_point(&self, product_id: ProductId) -> Result<bool, EngineError> {
        let product = self
            .ctx
            .locks
            .with_read_locked(&[product_id], || load_product(&self.ctx.stores, product_id))?;
        Ok(product.is_below_reorder_point())
    }

    /// Compare the cache with the ledger without writing anything.
    ///
    /// Returns the agreed quantity, or `LedgerInconsistency` on drift.
    pub fn verify(&self, product_id: ProductId) -> Result<Decimal, EngineError> {
        let (product, ledger) = self.ctx.locks.with_read_locked(&[product_id], || {
            let product = load_product(&self.ctx.stores, product_id)?;
            let ledger = ledger_stock(&self.ctx.stores, product_id)?;
            Ok::<_, EngineError>((product, ledger))
        })?;

        if product.current_stock() != ledger {
            tracing::error!(
                product = %product.reference(),
                cached = %product.current_stock(),
                ledger = %ledger,
                "stock cache drifted from the batch ledger"
            );
            return Err(EngineError::LedgerInconsistency(format!(
                "product {} caches stock {} but its batches hold {ledger}",
                product.reference(),
                product.current_stock()
            )));
        }
        Ok(ledger)
    }

    /// Every product with its cached stock, by reference.
    pub fn stock_overview(&self) -> Result<Vec<ProductStock>, EngineError> {
        let products = self.ctx.locks.with_store_read_locked(|| self.ctx.stores.catalog.list())?;
        Ok(products
            .into_iter()
            .map(|p| ProductStock {
                product_id: p.id(),
                reference: p.reference().to_string(),
                name: p.name().to_string(),
                current_stock: p.current_stock(),
                reorder_point: p.reorder_point(),
                unit_of_measure: p.unit_of_measure().to_string(),
                below_reorder_point: p.is_below_reorder_point(),
            })
            .collect())
    }
}

fn ledger_stock(stores: &InventoryStores, product_id: ProductId) -> Result<Decimal, EngineError> {
    let batches = stores.ledger.available_batches(product_id)?;
    Ok(checked_total(
        batches.iter().map(|b| Ok(b.remaining_quantity())),
        "stock on hand",
    )?)
}

/// Recompute inside an open unit of work. The caller holds the product lock.
pub(crate) fn recompute_in(uow: &mut UnitOfWork<'_>, product_id: ProductId) -> Result<Decimal, EngineError> {
    // Surfaces NotFound before touching the ledger.
    load_product(uow.stores(), product_id)?;
    let stock = ledger_stock(uow.stores(), product_id)?;
    uow.cache_stock(product_id, stock)?;
    Ok(stock)
}
