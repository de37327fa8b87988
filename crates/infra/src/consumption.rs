//! FIFO consumption: the outbound side of the ledger.
//!
//! ```text
//! ConsumeStock
//!   ↓
//! 1. Load the product (cached aggregate stock) and its available batches
//!   ↓
//! 2. Plan: insufficient-stock guard, oldest batch first, ledger consistency checks,
//!    cost of goods issued
//!   ↓
//! 3. For each planned depletion:
//!      deplete the batch (version-checked)
//!      append one OUT movement at the batch's historical cost
//!   ↓
//! 4. Recompute the product's cached stock once
//! ```
//!
//! The whole call runs under the product lock inside one unit of work, so a
//! failure at any step leaves the batches, journal and cache as they were.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockfifo_core::{DomainError, Entity, ExpectedVersion, MovementId, ProductId};
use stockfifo_inventory::{ConsumptionPlan, StockBatch, StockMovement, plan_consumption};

use crate::engine::{EngineContext, load_product};
use crate::error::EngineError;
use crate::stock_aggregate::recompute_in;
use crate::unit_of_work::{self, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumeStock {
    pub product_id: ProductId,
    pub quantity: Decimal,
    /// Delivery note (or other exit document) the quantity leaves for.
    pub source_ref: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumption {
    pub plan: ConsumptionPlan,
    /// One OUT movement per batch touched, oldest batch first.
    pub movements: Vec<StockMovement>,
    /// Cost of goods issued, at each batch's historical cost.
    pub cost: Decimal,
    /// Cached stock of the product after the consumption.
    pub stock: Decimal,
}

#[derive(Debug, Clone)]
pub struct ConsumptionEngine {
    ctx: EngineContext,
}

impl ConsumptionEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub fn consume(&self, cmd: ConsumeStock) -> Result<Consumption, EngineError> {
        let product_id = cmd.product_id;
        let consumption = self.ctx.locks.with_locked(&[product_id], || {
            let now = self.ctx.clock.now();
            unit_of_work::run(&self.ctx.stores, |uow| consume_in(uow, now, cmd))
        })?;

        tracing::info!(
            product_id = %product_id,
            quantity = %consumption.plan.total_quantity(),
            cost = %consumption.cost,
            batches = consumption.movements.len(),
            stock = %consumption.stock,
            "stock consumed"
        );
        Ok(consumption)
    }
}

/// Consume inside an open unit of work. The caller holds the product lock.
///
/// Movements are stamped `now`, or the newest touched batch's entry date if
/// the clock reads earlier.
pub(crate) fn consume_in(
    uow: &mut UnitOfWork<'_>,
    now: DateTime<Utc>,
    cmd: ConsumeStock,
) -> Result<Consumption, EngineError> {
    let ConsumeStock {
        product_id,
        quantity,
        source_ref,
        note,
    } = cmd;

    if source_ref.trim().is_empty() {
        return Err(EngineError::Validation("exit document reference cannot be empty".to_string()));
    }

    let product = load_product(uow.stores(), product_id)?;
    let batches = uow.stores().ledger.available_batches(product_id)?;

    let plan = plan_consumption(&product, quantity, &batches).inspect_err(|e| {
        if let DomainError::LedgerInconsistency(msg) = e {
            tracing::error!(product = %product.reference(), "{msg}");
        }
    })?;
    let cost = plan.total_cost()?;

    // Batches are in FIFO order, so the last depletion touches the newest one.
    let newest_entry = plan
        .depletions
        .last()
        .and_then(|d| batches.iter().find(|b| b.id() == d.batch_id))
        .map(StockBatch::entry_date);
    let occurred_at = newest_entry.map_or(now, |entry| entry.max(now));
    let mut movements = Vec::with_capacity(plan.depletions.len());

    for depletion in &plan.depletions {
        let batch = uow.deplete(
            depletion.batch_id,
            depletion.quantity,
            ExpectedVersion::Exact(depletion.expected_version),
        )?;

        let movement = uow.append(StockMovement::exit(
            MovementId::new(),
            &batch,
            depletion.quantity,
            occurred_at,
            source_ref.clone(),
            note.clone(),
        )?)?;

        tracing::debug!(
            batch = %depletion.batch_number,
            taken = %depletion.quantity,
            remaining = %batch.remaining_quantity(),
            "batch depleted"
        );
        movements.push(movement);
    }

    let stock = recompute_in(uow, product_id)?;

    Ok(Consumption {
        plan,
        movements,
        cost,
        stock,
    })
}
