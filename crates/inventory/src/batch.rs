use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockfifo_core::{BatchId, DomainError, DomainResult, Entity, ExpectedVersion, ProductId};

use crate::batch_number::BatchNumber;

/// A quantity of one product received together at a fixed unit cost.
///
/// `initial_quantity` and `unit_cost` never change after receipt;
/// `remaining_quantity` only goes down (except when an uncommitted depletion
/// is rolled back). Depleted batches are kept for history and valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBatch {
    id: BatchId,
    batch_number: BatchNumber,
    product_id: ProductId,
    initial_quantity: Decimal,
    remaining_quantity: Decimal,
    unit_cost: Decimal,
    entry_date: DateTime<Utc>,
    order_ref: Option<String>,
    version: u64,
}

/// Command: create a batch from a received order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveBatch {
    pub id: BatchId,
    pub batch_number: BatchNumber,
    pub product_id: ProductId,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub entry_date: DateTime<Utc>,
    pub order_ref: Option<String>,
}

impl StockBatch {
    pub fn receive(cmd: ReceiveBatch) -> DomainResult<Self> {
        if cmd.quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "received quantity must be positive (got {})",
                cmd.quantity
            )));
        }
        if cmd.unit_cost <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "unit cost must be positive (got {})",
                cmd.unit_cost
            )));
        }
        if cmd.quantity.checked_mul(cmd.unit_cost).is_none() {
            return Err(DomainError::overflow(format!(
                "batch value {} x {}",
                cmd.quantity, cmd.unit_cost
            )));
        }

        Ok(Self {
            id: cmd.id,
            batch_number: cmd.batch_number,
            product_id: cmd.product_id,
            initial_quantity: cmd.quantity,
            remaining_quantity: cmd.quantity,
            unit_cost: cmd.unit_cost,
            entry_date: cmd.entry_date,
            order_ref: cmd.order_ref,
            version: 1,
        })
    }

    pub fn batch_number(&self) -> &BatchNumber {
        &self.batch_number
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn initial_quantity(&self) -> Decimal {
        self.initial_quantity
    }

    pub fn remaining_quantity(&self) -> Decimal {
        self.remaining_quantity
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    pub fn entry_date(&self) -> DateTime<Utc> {
        self.entry_date
    }

    pub fn order_ref(&self) -> Option<&str> {
        self.order_ref.as_deref()
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Eligible for FIFO selection.
    pub fn is_available(&self) -> bool {
        self.remaining_quantity > Decimal::ZERO
    }

    /// Remaining quantity valued at the batch's historical cost.
    pub fn value(&self) -> DomainResult<Decimal> {
        self.remaining_quantity
            .checked_mul(self.unit_cost)
            .ok_or_else(|| DomainError::overflow(format!("value of batch {}", self.batch_number)))
    }

    /// Total order used for consumption: oldest entry first, id breaks ties.
    pub fn fifo_key(&self) -> (DateTime<Utc>, BatchId) {
        (self.entry_date, self.id)
    }

    pub fn deplete(&mut self, amount: Decimal, expected: ExpectedVersion) -> DomainResult<()> {
        expected.check(self.version)?;

        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "depletion must be positive (got {amount})"
            )));
        }
        if amount > self.remaining_quantity {
            return Err(DomainError::invariant(format!(
                "cannot take {amount} from batch {} holding {}",
                self.batch_number, self.remaining_quantity
            )));
        }

        self.remaining_quantity -= amount;
        self.version += 1;
        Ok(())
    }

    /// Undo a depletion that was applied inside a failed unit of work.
    pub fn restore(&mut self, amount: Decimal) -> DomainResult<()> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "restored quantity must be positive (got {amount})"
            )));
        }
        let restored = self
            .remaining_quantity
            .checked_add(amount)
            .filter(|r| *r <= self.initial_quantity);
        let Some(restored) = restored else {
            return Err(DomainError::invariant(format!(
                "restoring {amount} to batch {} would exceed its initial quantity {}",
                self.batch_number, self.initial_quantity
            )));
        };

        self.remaining_quantity = restored;
        self.version += 1;
        Ok(())
    }

    /// `0 <= remaining <= initial`, and the initial value is representable.
    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.remaining_quantity < Decimal::ZERO
            || self.remaining_quantity > self.initial_quantity
        {
            return Err(DomainError::invariant(format!(
                "batch {} remaining {} outside [0, {}]",
                self.batch_number, self.remaining_quantity, self.initial_quantity
            )));
        }
        if self.initial_quantity.checked_mul(self.unit_cost).is_none() {
            return Err(DomainError::overflow(format!("value of batch {}", self.batch_number)));
        }
        Ok(())
    }
}

impl Entity for StockBatch {
    type Id = BatchId;

    fn id(&self) -> BatchId {
        self.id
    }
}
