//! Receiving: one supplier order line becomes one batch plus one IN movement.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use stockfifo_core::{BatchId, Entity, MovementId, ProductId};
use stockfifo_inventory::{BatchNumberScope, ReceiveBatch, StockBatch, StockMovement};

use crate::config::EngineConfig;
use crate::engine::{EngineContext, load_product};
use crate::error::EngineError;
use crate::stock_aggregate::recompute_in;
use crate::store::StoreError;
use crate::unit_of_work::{self, UnitOfWork};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveStock {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub order_ref: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub batch: StockBatch,
    pub movement: StockMovement,
    /// Cached stock of the product after the receipt.
    pub stock: Decimal,
}

#[derive(Debug, Clone)]
pub struct ReceivingEngine {
    ctx: EngineContext,
}

impl ReceivingEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    pub fn receive(&self, cmd: ReceiveStock) -> Result<Receipt, EngineError> {
        let product_id = cmd.product_id;
        let receipt = self.ctx.locks.with_locked(&[product_id], || {
            let now = self.ctx.clock.now();
            unit_of_work::run(&self.ctx.stores, |uow| receive_in(uow, &self.ctx.config, now, cmd))
        })?;

        tracing::info!(
            product_id = %product_id,
            batch = %receipt.batch.batch_number(),
            quantity = %receipt.batch.initial_quantity(),
            unit_cost = %receipt.batch.unit_cost(),
            order_ref = %receipt.movement.source_ref(),
            stock = %receipt.stock,
            "stock received"
        );
        Ok(receipt)
    }
}

/// Receive inside an open unit of work. The caller holds the product lock.
///
/// The batch enters at `now`, or at the product's newest entry date if the
/// clock reads earlier, so a new batch never sorts ahead of older stock.
pub(crate) fn receive_in(
    uow: &mut UnitOfWork<'_>,
    config: &EngineConfig,
    now: DateTime<Utc>,
    cmd: ReceiveStock,
) -> Result<Receipt, EngineError> {
    let ReceiveStock {
        product_id,
        quantity,
        unit_cost,
        order_ref,
        note,
    } = cmd;

    if order_ref.trim().is_empty() {
        return Err(EngineError::Validation("order reference cannot be empty".to_string()));
    }

    let product = load_product(uow.stores(), product_id)?;
    let newest_entry = uow
        .stores()
        .ledger
        .all_batches(product_id)?
        .iter()
        .map(StockBatch::entry_date)
        .max();
    let entry_date = match newest_entry {
        Some(newest) if newest > now => {
            tracing::warn!(%now, %newest, "clock behind the newest batch, entering at its date");
            newest
        }
        _ => now,
    };

    let scope = BatchNumberScope::new(
        &config.batch_prefix,
        product.reference(),
        config.batch_ref_chars,
        entry_date.date_naive(),
    )?;
    let taken = uow.stores().ledger.numbers_in_scope(&scope)?;
    let mut sequence = scope.next_sequence(&taken)?;

    let batch_id = BatchId::new();
    let mut attempt = 1;
    let batch = loop {
        let candidate = StockBatch::receive(ReceiveBatch {
            id: batch_id,
            batch_number: scope.number(sequence),
            product_id,
            quantity,
            unit_cost,
            entry_date,
            order_ref: Some(order_ref.clone()),
        })?;

        match uow.create_batch(candidate) {
            Ok(created) => break created,
            Err(StoreError::DuplicateBatchNumber(number)) if attempt < config.batch_number_attempts => {
                tracing::warn!(%number, attempt, "batch number already taken, trying next sequence");
                attempt += 1;
                sequence = scope.after(sequence)?;
            }
            Err(e) => return Err(e.into()),
        }
    };

    let movement = uow.append(StockMovement::receipt(
        MovementId::new(),
        &batch,
        entry_date,
        order_ref,
        note,
    )?)?;

    let stock = recompute_in(uow, product_id)?;
    tracing::debug!(batch = %batch.batch_number(), batch_id = %batch.id(), "batch created");

    Ok(Receipt {
        batch,
        movement,
        stock,
    })
}
