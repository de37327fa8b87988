use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockfifo_core::{BatchId, DomainError, DomainResult, Entity, MovementId, ProductId, ValueObject};

use crate::batch::StockBatch;

/// Direction of a stock movement. The quantity is always positive; the
/// direction carries the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementDirection {
    In,
    Out,
}

impl MovementDirection {
    /// Effect of `quantity` on the stock level.
    pub fn signed(self, quantity: Decimal) -> Decimal {
        match self {
            MovementDirection::In => quantity,
            MovementDirection::Out => -quantity,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MovementDirection::In => "IN",
            MovementDirection::Out => "OUT",
        }
    }
}

impl ValueObject for MovementDirection {}

/// What produced a movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementSource {
    /// Receipt of a supplier order line.
    SupplierOrder,
    /// Consumption for a delivery note (or any other outbound request).
    StockExit,
}

impl MovementSource {
    pub fn tag(self) -> &'static str {
        match self {
            MovementSource::SupplierOrder => "SUPPLIER_ORDER",
            MovementSource::StockExit => "STOCK_EXIT",
        }
    }

    pub fn direction(self) -> MovementDirection {
        match self {
            MovementSource::SupplierOrder => MovementDirection::In,
            MovementSource::StockExit => MovementDirection::Out,
        }
    }
}

/// Immutable journal entry: one quantity change against one batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    id: MovementId,
    product_id: ProductId,
    batch_id: BatchId,
    #[serde(rename = "type")]
    direction: MovementDirection,
    quantity: Decimal,
    unit_cost: Decimal,
    occurred_at: DateTime<Utc>,
    source: MovementSource,
    source_ref: String,
    note: Option<String>,
}

impl StockMovement {
    /// IN movement for a freshly received batch (full initial quantity).
    pub fn receipt(
        id: MovementId,
        batch: &StockBatch,
        occurred_at: DateTime<Utc>,
        order_ref: impl Into<String>,
        note: Option<String>,
    ) -> DomainResult<Self> {
        let order_ref = order_ref.into();
        let note = note.or_else(|| Some(format!("Supplier order receipt: {order_ref}")));
        Self::record(
            id,
            batch,
            MovementSource::SupplierOrder,
            batch.initial_quantity(),
            occurred_at,
            order_ref,
            note,
        )
    }

    /// OUT movement for `quantity` taken from `batch`.
    pub fn exit(
        id: MovementId,
        batch: &StockBatch,
        quantity: Decimal,
        occurred_at: DateTime<Utc>,
        source_ref: impl Into<String>,
        note: Option<String>,
    ) -> DomainResult<Self> {
        let source_ref = source_ref.into();
        let note = note.or_else(|| Some(format!("Stock exit - {source_ref}")));
        Self::record(
            id,
            batch,
            MovementSource::StockExit,
            quantity,
            occurred_at,
            source_ref,
            note,
        )
    }

    fn record(
        id: MovementId,
        batch: &StockBatch,
        source: MovementSource,
        quantity: Decimal,
        occurred_at: DateTime<Utc>,
        source_ref: String,
        note: Option<String>,
    ) -> DomainResult<Self> {
        if quantity <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "movement quantity must be positive (got {quantity})"
            )));
        }
        if quantity > batch.initial_quantity() {
            return Err(DomainError::invariant(format!(
                "movement of {quantity} exceeds batch {} initial quantity {}",
                batch.batch_number(),
                batch.initial_quantity()
            )));
        }

        Ok(Self {
            id,
            product_id: batch.product_id(),
            batch_id: batch.id(),
            direction: source.direction(),
            quantity,
            unit_cost: batch.unit_cost(),
            occurred_at,
            source,
            source_ref,
            note,
        })
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    pub fn direction(&self) -> MovementDirection {
        self.direction
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn signed_quantity(&self) -> Decimal {
        self.direction.signed(self.quantity)
    }

    pub fn unit_cost(&self) -> Decimal {
        self.unit_cost
    }

    /// Cost snapshot of the moved quantity.
    pub fn value(&self) -> DomainResult<Decimal> {
        self.quantity
            .checked_mul(self.unit_cost)
            .ok_or_else(|| DomainError::overflow(format!("value of movement {}", self.id)))
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn source(&self) -> MovementSource {
        self.source
    }

    pub fn source_ref(&self) -> &str {
        &self.source_ref
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// `SOURCE_TAG-source_ref`, as shown in movement listings.
    pub fn reference(&self) -> String {
        if self.source_ref.is_empty() {
            self.source.tag().to_string()
        } else {
            format!("{}-{}", self.source.tag(), self.source_ref)
        }
    }
}

impl Entity for StockMovement {
    type Id = MovementId;

    fn id(&self) -> MovementId {
        self.id
    }
}
