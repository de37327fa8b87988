use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockfifo_core::{DomainError, DomainResult, Entity, ProductId};

/// Product master data plus the cached aggregate stock.
///
/// `current_stock` is a cache: the batch ledger is authoritative and the
/// stock aggregate rewrites this value after every receipt or consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    reference: String,
    name: String,
    current_stock: Decimal,
    reorder_point: Decimal,
    unit_of_measure: String,
}

/// Command: register a product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: ProductId,
    pub reference: String,
    pub name: String,
    pub reorder_point: Decimal,
    pub unit_of_measure: String,
}

impl Product {
    pub fn register(cmd: NewProduct) -> DomainResult<Self> {
        if cmd.reference.trim().is_empty() {
            return Err(DomainError::validation("reference cannot be empty"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if cmd.reorder_point < Decimal::ZERO {
            return Err(DomainError::validation("reorder point cannot be negative"));
        }

        Ok(Self {
            id: cmd.id,
            reference: cmd.reference.trim().to_string(),
            name: cmd.name.trim().to_string(),
            current_stock: Decimal::ZERO,
            reorder_point: cmd.reorder_point,
            unit_of_measure: cmd.unit_of_measure,
        })
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_stock(&self) -> Decimal {
        self.current_stock
    }

    pub fn reorder_point(&self) -> Decimal {
        self.reorder_point
    }

    pub fn unit_of_measure(&self) -> &str {
        &self.unit_of_measure
    }

    /// Overwrite the cached stock level.
    pub fn set_current_stock(&mut self, stock: Decimal) -> DomainResult<()> {
        if stock < Decimal::ZERO {
            return Err(DomainError::invariant(format!(
                "stock of {} cannot go negative ({stock})",
                self.reference
            )));
        }
        self.current_stock = stock;
        Ok(())
    }

    /// Inclusive: a product sitting exactly at its threshold is a shortage.
    pub fn is_below_reorder_point(&self) -> bool {
        self.current_stock <= self.reorder_point
    }

    /// Quantity missing to get back to the reorder point, if flagged.
    pub fn shortage_deficit(&self) -> Option<Decimal> {
        self.is_below_reorder_point()
            .then(|| self.reorder_point - self.current_stock)
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}
