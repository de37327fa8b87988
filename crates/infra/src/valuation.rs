//! Read-only valuation reports. Taken under shared locks, so they only ever
//! see committed stock.

use stockfifo_core::ProductId;
use stockfifo_inventory::{GlobalValuation, ProductStockDetail, ShortageAlert};

use crate::engine::{EngineContext, load_product};
use crate::error::EngineError;

#[derive(Debug, Clone)]
pub struct ValuationEngine {
    ctx: EngineContext,
}

impl ValuationEngine {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Quantity and value of one product, with its full batch history.
    pub fn product_detail(&self, product_id: ProductId) -> Result<ProductStockDetail, EngineError> {
        let (product, batches) = self.ctx.locks.with_read_locked(&[product_id], || {
            let product = load_product(&self.ctx.stores, product_id)?;
            let batches = self.ctx.stores.ledger.all_batches(product_id)?;
            Ok::<_, EngineError>((product, batches))
        })?;
        Ok(ProductStockDetail::from_batches(&product, batches)?)
    }

    /// Value of every batch with stock left, across all products.
    pub fn global_valuation(&self) -> Result<GlobalValuation, EngineError> {
        let (product_count, batches) = self.ctx.locks.with_store_read_locked(|| {
            let product_count = self.ctx.stores.catalog.count()?;
            let batches = self.ctx.stores.ledger.list()?;
            Ok::<_, EngineError>((product_count, batches))
        })?;
        Ok(GlobalValuation::from_batches(product_count, &batches)?)
    }

    /// Products at or below their reorder point, largest deficit first.
    pub fn shortage_alerts(&self) -> Result<Vec<ShortageAlert>, EngineError> {
        let products = self.ctx.locks.with_store_read_locked(|| self.ctx.stores.catalog.list())?;
        Ok(ShortageAlert::from_products(&products))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::consumption::ConsumeStock;
    use crate::engine::StockEngine;
    use crate::receiving::ReceiveStock;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use stockfifo_core::Entity;
    use stockfifo_inventory::NewProduct;

    struct Shop {
        engine: StockEngine,
        clock: Arc<ManualClock>,
    }

    fn shop() -> Shop {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 2, 1, 10, 0, 0).unwrap()));
        Shop {
            engine: StockEngine::in_memory().with_clock(clock.clone()),
            clock,
        }
    }

    fn product(engine: &StockEngine, reference: &str, reorder_point: Decimal) -> ProductId {
        engine
            .register_product(NewProduct {
                id: ProductId::new(),
                reference: reference.to_string(),
                name: reference.to_lowercase(),
                reorder_point,
                unit_of_measure: "UNIT".to_string(),
            })
            .unwrap()
            .id()
    }

    fn receive(
        shop: &Shop,
        day: u32,
        product_id: ProductId,
        quantity: Decimal,
        unit_cost: Decimal,
    ) -> Result<(), EngineError> {
        shop.clock.set(Utc.with_ymd_and_hms(2024, 2, day, 10, 0, 0).unwrap());
        shop.engine.receiving().receive(ReceiveStock {
            product_id,
            quantity,
            unit_cost,
            order_ref: "PO-1".to_string(),
            note: None,
        })?;
        Ok(())
    }

    #[test]
    fn global_valuation_counts_only_active_batches() {
        let shop = shop();
        let engine = &shop.engine;
        let a = product(engine, "APPLE", dec!(0));
        let b = product(engine, "BEAN", dec!(0));
        receive(&shop, 1, a, dec!(50), dec!(10)).unwrap();
        receive(&shop, 2, b, dec!(75), dec!(12)).unwrap();
        receive(&shop, 3, b, dec!(3), dec!(99)).unwrap();
        engine
            .consumption()
            .consume(ConsumeStock {
                product_id: b,
                quantity: dec!(75),
                source_ref: "BS-9".to_string(),
                note: None,
            })
            .unwrap();

        let valuation = engine.valuation().global_valuation().unwrap();
        assert_eq!(valuation.product_count, 2);
        assert_eq!(valuation.active_batch_count, 2);
        assert_eq!(valuation.total_value, dec!(797));
    }

    #[test]
    fn product_detail_agrees_with_cached_stock() {
        let shop = shop();
        let engine = &shop.engine;
        let a = product(engine, "APPLE", dec!(0));
        receive(&shop, 1, a, dec!(50), dec!(10)).unwrap();
        receive(&shop, 2, a, dec!(75), dec!(12)).unwrap();

        let detail = engine.valuation().product_detail(a).unwrap();
        assert_eq!(detail.total_quantity, dec!(125));
        assert!(detail.is_consistent());
        assert_eq!(detail.total_value, dec!(1400));
        assert_eq!(detail.batches.len(), 2);
    }

    #[test]
    fn shortage_alerts_include_products_at_threshold() {
        let shop = shop();
        let engine = &shop.engine;
        let at = product(engine, "AT", dec!(10));
        let above = product(engine, "ABOVE", dec!(10));
        let _empty = product(engine, "EMPTY", dec!(4));
        receive(&shop, 1, at, dec!(10), dec!(1)).unwrap();
        receive(&shop, 1, above, dec!(11), dec!(1)).unwrap();

        let alerts = engine.valuation().shortage_alerts().unwrap();
        let refs: Vec<_> = alerts.iter().map(|a| a.reference.as_str()).collect();
        assert_eq!(refs, vec!["EMPTY", "AT"]);
        assert_eq!(alerts[0].deficit, dec!(4));
        assert_eq!(alerts[1].deficit, dec!(0));
    }

    #[test]
    fn value_beyond_the_decimal_range_is_reported_not_panicked() {
        let shop = shop();
        let engine = &shop.engine;
        let big = Decimal::from_i128_with_scale(4 * 10i128.pow(28), 0);
        let a = product(engine, "APPLE", dec!(0));
        let b = product(engine, "BEAN", dec!(0));
        receive(&shop, 1, a, big, dec!(1)).unwrap();
        receive(&shop, 2, b, big, dec!(1)).unwrap();

        let err = engine.valuation().global_valuation().unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let detail = engine.valuation().product_detail(a).unwrap();
        assert_eq!(detail.total_value, big);
    }
}
