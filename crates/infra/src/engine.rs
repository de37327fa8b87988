//! Wiring: one context shared by every engine, and the `StockEngine` facade.

use std::sync::Arc;

use stockfifo_core::{Entity, ProductId};
use stockfifo_inventory::{NewProduct, Product};

use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::consumption::ConsumptionEngine;
use crate::error::EngineError;
use crate::locks::ProductLocks;
use crate::queries::StockQueries;
use crate::receiving::ReceivingEngine;
use crate::stock_aggregate::StockAggregate;
use crate::store::InventoryStores;
use crate::valuation::ValuationEngine;
use crate::workflows::{DeliveryNote, OrderReceipt};

/// Stores, locks, settings and clock. Cloning shares all of them.
#[derive(Debug, Clone)]
pub struct EngineContext {
    pub stores: InventoryStores,
    pub locks: Arc<ProductLocks>,
    pub config: Arc<EngineConfig>,
    pub clock: Arc<dyn Clock>,
}

impl EngineContext {
    pub fn new(stores: InventoryStores, config: EngineConfig) -> Self {
        Self {
            stores,
            locks: Arc::new(ProductLocks::new()),
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }
}

pub(crate) fn load_product(stores: &InventoryStores, product_id: ProductId) -> Result<Product, EngineError> {
    stores
        .catalog
        .get(product_id)?
        .ok_or_else(|| EngineError::NotFound(format!("product {product_id}")))
}

/// Entry point bundling every engine over one set of stores.
///
/// Engines obtained from the same `StockEngine` share product locks, so
/// mutations for a product are serialized across all of them and across
/// threads holding clones.
#[derive(Debug, Clone)]
pub struct StockEngine {
    ctx: EngineContext,
}

impl StockEngine {
    pub fn new(stores: InventoryStores, config: EngineConfig) -> Self {
        Self {
            ctx: EngineContext::new(stores, config),
        }
    }

    /// In-memory stores with default settings.
    pub fn in_memory() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self::new(InventoryStores::in_memory(), config)
    }

    /// Replace the wall clock that stamps batches and movements.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.ctx.clock = clock;
        self
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn stores(&self) -> &InventoryStores {
        &self.ctx.stores
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    /// Add a product to the catalog with zero stock.
    pub fn register_product(&self, cmd: NewProduct) -> Result<Product, EngineError> {
        let product = self.ctx.stores.catalog.insert(Product::register(cmd)?)?;
        tracing::info!(product_id = %product.id(), reference = %product.reference(), "product registered");
        Ok(product)
    }

    pub fn receiving(&self) -> ReceivingEngine {
        ReceivingEngine::new(self.ctx.clone())
    }

    pub fn consumption(&self) -> ConsumptionEngine {
        ConsumptionEngine::new(self.ctx.clone())
    }

    pub fn aggregate(&self) -> StockAggregate {
        StockAggregate::new(self.ctx.clone())
    }

    pub fn valuation(&self) -> ValuationEngine {
        ValuationEngine::new(self.ctx.clone())
    }

    pub fn queries(&self) -> StockQueries {
        StockQueries::new(self.ctx.clone())
    }

    pub fn orders(&self) -> OrderReceipt {
        OrderReceipt::new(self.ctx.clone())
    }

    pub fn deliveries(&self) -> DeliveryNote {
        DeliveryNote::new(self.ctx.clone())
    }
}
