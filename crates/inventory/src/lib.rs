//! Inventory domain module (FIFO lot costing).
//!
//! This crate contains business rules for batch-tracked inventory, implemented
//! purely as deterministic domain logic (no IO, no locking, no storage).

pub mod batch;
pub mod batch_number;
pub mod fifo;
pub mod movement;
pub mod product;
pub mod valuation;

pub use batch::{ReceiveBatch, StockBatch};
pub use batch_number::{BatchNumber, BatchNumberScope};
pub use fifo::{ConsumptionPlan, Depletion, available_in_fifo_order, plan_consumption};
pub use movement::{MovementDirection, MovementSource, StockMovement};
pub use product::{NewProduct, Product};
pub use valuation::{GlobalValuation, ProductStockDetail, ShortageAlert};
