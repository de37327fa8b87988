//! Document-level adapters over the engines.
//!
//! A supplier order or a delivery note touches several products. Each line is
//! still one `receive`/`consume` call, but all lines of a document share one
//! unit of work and hold every involved product lock, so the document is
//! applied entirely or not at all.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockfifo_core::ProductId;

use crate::consumption::{ConsumeStock, Consumption, consume_in};
use crate::engine::EngineContext;
use crate::error::EngineError;
use crate::receiving::{ReceiveStock, Receipt, receive_in};
use crate::unit_of_work;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub product_id: ProductId,
    pub quantity: Decimal,
}

/// Receives every line of a supplier order.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    ctx: EngineContext,
}

impl OrderReceipt {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// One receipt per line, in line order.
    pub fn receive_order(&self, order_ref: &str, lines: &[OrderLine]) -> Result<Vec<Receipt>, EngineError> {
        if lines.is_empty() {
            return Err(EngineError::Validation(format!("order {order_ref} has no lines")));
        }
        let products: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();

        let receipts = self.ctx.locks.with_locked(&products, || {
            let now = self.ctx.clock.now();
            unit_of_work::run(&self.ctx.stores, |uow| {
                lines
                    .iter()
                    .map(|line| {
                        receive_in(
                            uow,
                            &self.ctx.config,
                            now,
                            ReceiveStock {
                                product_id: line.product_id,
                                quantity: line.quantity,
                                unit_cost: line.unit_cost,
                                order_ref: order_ref.to_string(),
                                note: None,
                            },
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
        })?;

        tracing::info!(order_ref, lines = receipts.len(), "order received");
        Ok(receipts)
    }
}

/// Validates delivery notes by consuming every line.
#[derive(Debug, Clone)]
pub struct DeliveryNote {
    ctx: EngineContext,
}

impl DeliveryNote {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// One consumption per line, in line order. Lines of the same product
    /// are consumed one after the other against the updated ledger.
    pub fn validate(
        &self,
        note_number: &str,
        workshop: &str,
        lines: &[DeliveryLine],
    ) -> Result<Vec<Consumption>, EngineError> {
        if lines.is_empty() {
            return Err(EngineError::Validation(format!(
                "delivery note {note_number} has no lines"
            )));
        }
        let products: Vec<ProductId> = lines.iter().map(|l| l.product_id).collect();
        let note = format!("Delivery note {note_number} - {workshop}");

        let consumptions = self.ctx.locks.with_locked(&products, || {
            let now = self.ctx.clock.now();
            unit_of_work::run(&self.ctx.stores, |uow| {
                lines
                    .iter()
                    .map(|line| {
                        consume_in(
                            uow,
                            now,
                            ConsumeStock {
                                product_id: line.product_id,
                                quantity: line.quantity,
                                source_ref: note_number.to_string(),
                                note: Some(note.clone()),
                            },
                        )
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
        })?;

        tracing::info!(note_number, workshop, lines = consumptions.len(), "delivery note validated");
        Ok(consumptions)
    }
}
