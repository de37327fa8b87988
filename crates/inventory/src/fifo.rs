//! FIFO consumption planning.
//!
//! Planning is pure: it decides which batches to deplete, in which order and by
//! how much, without touching any store. The infrastructure layer applies the
//! resulting plan under the product lock.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockfifo_core::{BatchId, DomainError, DomainResult, Entity, ProductId};

use crate::batch::StockBatch;
use crate::batch_number::BatchNumber;
use crate::product::Product;
use crate::valuation::checked_total;

/// One batch touched by a consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Depletion {
    pub batch_id: BatchId,
    pub batch_number: BatchNumber,
    /// Batch version the plan was computed against.
    pub expected_version: u64,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub remaining_after: Decimal,
}

impl Depletion {
    pub fn cost(&self) -> DomainResult<Decimal> {
        self.quantity
            .checked_mul(self.unit_cost)
            .ok_or_else(|| DomainError::overflow(format!("cost taken from batch {}", self.batch_number)))
    }
}

/// Ordered list of depletions satisfying one consumption request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionPlan {
    pub product_id: ProductId,
    pub requested: Decimal,
    pub depletions: Vec<Depletion>,
}

impl ConsumptionPlan {
    pub fn total_quantity(&self) -> Decimal {
        self.depletions.iter().map(|d| d.quantity).sum()
    }

    /// Cost of goods issued, at each batch's historical cost.
    pub fn total_cost(&self) -> DomainResult<Decimal> {
        checked_total(self.depletions.iter().map(Depletion::cost), "cost of goods issued")
    }
}

/// Keep batches with remaining stock, oldest entry first (id breaks ties).
pub fn available_in_fifo_order(batches: impl IntoIterator<Item = StockBatch>) -> Vec<StockBatch> {
    let mut available: Vec<StockBatch> = batches.into_iter().filter(StockBatch::is_available).collect();
    available.sort_by_key(StockBatch::fifo_key);
    available
}

/// Decide how `requested` is taken from `batches`.
///
/// `batches` must be the product's available batches in FIFO order, as
/// returned by the ledger. `product.current_stock()` is the cached aggregate
/// used for the insufficient-stock guard.
pub fn plan_consumption(
    product: &Product,
    requested: Decimal,
    batches: &[StockBatch],
) -> DomainResult<ConsumptionPlan> {
    if requested <= Decimal::ZERO {
        return Err(DomainError::validation(format!(
            "requested quantity must be positive (got {requested})"
        )));
    }

    let available = product.current_stock();
    if requested > available {
        return Err(DomainError::insufficient_stock(product.name(), available, requested));
    }

    if batches.is_empty() {
        return Err(DomainError::ledger_inconsistency(format!(
            "product {} reports stock {available} but has no available batches",
            product.reference()
        )));
    }

    let mut depletions = Vec::new();
    let mut consumed = Decimal::ZERO;
    let mut previous_key = None;

    for batch in batches {
        if batch.product_id() != product.id() {
            return Err(DomainError::invariant(format!(
                "batch {} does not belong to product {}",
                batch.batch_number(),
                product.reference()
            )));
        }
        let key = batch.fifo_key();
        if previous_key.is_some_and(|prev| prev > key) {
            return Err(DomainError::invariant(format!(
                "batches for product {} are not in FIFO order",
                product.reference()
            )));
        }
        previous_key = Some(key);

        let take = batch.remaining_quantity().min(requested - consumed);
        if take <= Decimal::ZERO {
            break;
        }

        depletions.push(Depletion {
            batch_id: batch.id(),
            batch_number: batch.batch_number().clone(),
            expected_version: batch.version(),
            quantity: take,
            unit_cost: batch.unit_cost(),
            remaining_after: batch.remaining_quantity() - take,
        });
        consumed += take;
    }

    if consumed < requested {
        return Err(DomainError::ledger_inconsistency(format!(
            "batches of product {} hold {consumed} but aggregate stock reports {available} (requested {requested})",
            product.reference()
        )));
    }

    Ok(ConsumptionPlan {
        product_id: product.id(),
        requested,
        depletions,
    })
}
