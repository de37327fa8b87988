//! Infrastructure layer: stores, locking, engines and reporting.

pub mod clock;
pub mod config;
pub mod consumption;
pub mod engine;
pub mod error;
pub mod locks;
pub mod queries;
pub mod receiving;
pub mod stock_aggregate;
pub mod store;
pub mod unit_of_work;
pub mod valuation;
pub mod workflows;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use consumption::{ConsumeStock, Consumption, ConsumptionEngine};
pub use engine::{EngineContext, StockEngine};
pub use error::EngineError;
pub use queries::{MovementQuery, MovementView, Page, PageRequest, StockQueries};
pub use receiving::{ReceiveStock, Receipt, ReceivingEngine};
pub use stock_aggregate::{ProductStock, StockAggregate};
pub use store::InventoryStores;
pub use valuation::ValuationEngine;
pub use workflows::{DeliveryLine, DeliveryNote, OrderLine, OrderReceipt};
