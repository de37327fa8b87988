//! Valuation arithmetic over batches (remaining quantity × historical cost).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockfifo_core::{DomainError, DomainResult, Entity, ProductId};

use crate::batch::StockBatch;
use crate::product::Product;

/// Stock detail for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStockDetail {
    pub product_id: ProductId,
    pub product_name: String,
    /// Cached aggregate stock of the product.
    pub total_quantity: Decimal,
    /// Sum of remaining quantities in the ledger.
    pub ledger_quantity: Decimal,
    pub total_value: Decimal,
    /// Every batch, including depleted ones, newest first.
    pub batches: Vec<StockBatch>,
}

impl ProductStockDetail {
    pub fn from_batches(product: &Product, mut batches: Vec<StockBatch>) -> DomainResult<Self> {
        batches.sort_by(|a, b| b.fifo_key().cmp(&a.fifo_key()));
        let ledger_quantity = checked_total(
            batches.iter().map(|b| Ok(b.remaining_quantity())),
            "ledger quantity",
        )?;
        let total_value = checked_total(batches.iter().map(StockBatch::value), "stock value")?;

        Ok(Self {
            product_id: product.id(),
            product_name: product.name().to_string(),
            total_quantity: product.current_stock(),
            ledger_quantity,
            total_value,
            batches,
        })
    }

    /// Cached aggregate agrees with the ledger.
    pub fn is_consistent(&self) -> bool {
        self.total_quantity == self.ledger_quantity
    }
}

/// Value of all remaining inventory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalValuation {
    pub total_value: Decimal,
    pub product_count: usize,
    pub active_batch_count: usize,
}

impl GlobalValuation {
    pub fn from_batches<'a>(
        product_count: usize,
        batches: impl IntoIterator<Item = &'a StockBatch>,
    ) -> DomainResult<Self> {
        let active: Vec<&StockBatch> = batches.into_iter().filter(|b| b.is_available()).collect();
        let total_value = checked_total(active.iter().map(|b| b.value()), "inventory value")?;

        Ok(Self {
            total_value,
            product_count,
            active_batch_count: active.len(),
        })
    }
}

/// Sums decimals, failing instead of panicking past `Decimal::MAX`.
pub fn checked_total(
    amounts: impl IntoIterator<Item = DomainResult<Decimal>>,
    what: &str,
) -> DomainResult<Decimal> {
    amounts.into_iter().try_fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(amount?)
            .ok_or_else(|| DomainError::overflow(what))
    })
}

/// A product at or below its reorder point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortageAlert {
    pub product_id: ProductId,
    pub reference: String,
    pub product_name: String,
    pub current_stock: Decimal,
    pub reorder_point: Decimal,
    pub deficit: Decimal,
}

impl ShortageAlert {
    pub fn for_product(product: &Product) -> Option<Self> {
        let deficit = product.shortage_deficit()?;
        Some(Self {
            product_id: product.id(),
            reference: product.reference().to_string(),
            product_name: product.name().to_string(),
            current_stock: product.current_stock(),
            reorder_point: product.reorder_point(),
            deficit,
        })
    }

    /// Alerts for every flagged product, largest deficit first.
    pub fn from_products<'a>(products: impl IntoIterator<Item = &'a Product>) -> Vec<Self> {
        let mut alerts: Vec<Self> = products.into_iter().filter_map(Self::for_product).collect();
        alerts.sort_by(|a, b| {
            b.deficit
                .cmp(&a.deficit)
                .then_with(|| a.reference.cmp(&b.reference))
        });
        alerts
    }
}
