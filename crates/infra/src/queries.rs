//! Reporting queries over the journal and the ledger.
//!
//! Thin pass-through: filters are resolved to identifiers, the journal does
//! the selection, and results are paginated and decorated for display.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockfifo_core::{BatchId, Entity, MovementId, ProductId};
use stockfifo_inventory::{BatchNumber, MovementDirection, Product, StockBatch, StockMovement};

use crate::engine::{EngineContext, load_product};
use crate::error::EngineError;
use crate::store::MovementFilter;

/// Movement search criteria. Every field is optional; dates are inclusive days (UTC).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub product_id: Option<ProductId>,
    pub product_reference: Option<String>,
    pub direction: Option<MovementDirection>,
    pub batch_number: Option<String>,
}

/// Zero-based page request. `size: None` uses the configured default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub size: Option<usize>,
}

impl PageRequest {
    pub fn new(page: usize, size: usize) -> Self {
        Self {
            page,
            size: Some(size),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    /// Matches across all pages.
    pub total: usize,
}

impl<T> Page<T> {
    fn slice(all: Vec<T>, page: usize, size: usize) -> Self {
        let total = all.len();
        let items = all.into_iter().skip(page.saturating_mul(size)).take(size).collect();
        Self {
            items,
            page,
            size,
            total,
        }
    }

    fn empty(page: usize, size: usize) -> Self {
        Self::slice(Vec::new(), page, size)
    }

    pub fn total_pages(&self) -> usize {
        self.total.div_ceil(self.size.max(1))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            size: self.size,
            total: self.total,
        }
    }
}

/// A movement decorated with product and batch labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementView {
    pub id: MovementId,
    pub occurred_at: DateTime<Utc>,
    pub direction: MovementDirection,
    pub product_id: ProductId,
    pub product_reference: String,
    pub product_name: String,
    pub batch_id: BatchId,
    pub batch_number: String,
    pub quantity: Decimal,
    pub unit_cost: Decimal,
    pub value: Decimal,
    /// `SOURCE_TAG-source_ref`.
    pub reference: String,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StockQueries {
    ctx: EngineContext,
}

impl StockQueries {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx }
    }

    /// Movements matching `query`, newest first.
    pub fn search_movements(
        &self,
        query: &MovementQuery,
        page: PageRequest,
    ) -> Result<Page<MovementView>, EngineError> {
        let size = self.page_size(page)?;
        self.ctx
            .locks
            .with_store_read_locked(|| self.search_committed(query, page, size))
    }

    fn search_committed(
        &self,
        query: &MovementQuery,
        page: PageRequest,
        size: usize,
    ) -> Result<Page<MovementView>, EngineError> {
        let Some(filter) = self.resolve(query)? else {
            return Ok(Page::empty(page.page, size));
        };

        let found = self.ctx.stores.journal.search(&filter)?;
        let page = Page::slice(found, page.page, size);
        let views = self.views(page.items)?;
        Ok(Page {
            items: views,
            page: page.page,
            size: page.size,
            total: page.total,
        })
    }

    pub fn movements_by_product(&self, product_id: ProductId) -> Result<Vec<MovementView>, EngineError> {
        self.ctx.locks.with_read_locked(&[product_id], || {
            load_product(&self.ctx.stores, product_id)?;
            let movements = self.ctx.stores.journal.by_product(product_id)?;
            self.views(movements)
        })
    }

    pub fn all_movements(&self, page: PageRequest) -> Result<Page<MovementView>, EngineError> {
        self.search_movements(&MovementQuery::default(), page)
    }

    /// Every batch of a product, depleted ones included, newest entry first.
    pub fn batch_history(&self, product_id: ProductId) -> Result<Vec<StockBatch>, EngineError> {
        self.ctx.locks.with_read_locked(&[product_id], || {
            load_product(&self.ctx.stores, product_id)?;
            Ok(self.ctx.stores.ledger.all_batches(product_id)?)
        })
    }

    fn page_size(&self, page: PageRequest) -> Result<usize, EngineError> {
        match page.size {
            None => Ok(self.ctx.config.default_page_size),
            Some(0) => Err(EngineError::Validation("page size must be positive".to_string())),
            Some(size) => Ok(size.min(self.ctx.config.max_page_size)),
        }
    }

    /// `None` when a criterion names something that does not exist, which
    /// matches nothing.
    fn resolve(&self, query: &MovementQuery) -> Result<Option<MovementFilter>, EngineError> {
        if let (Some(from), Some(to)) = (query.from, query.to) {
            if from > to {
                return Err(EngineError::Validation(format!(
                    "date range starts after it ends ({from} > {to})"
                )));
            }
        }

        let mut product_id = query.product_id;
        if let Some(reference) = query.product_reference.as_deref() {
            match self.ctx.stores.catalog.find_by_reference(reference)? {
                Some(p) if product_id.is_none_or(|id| id == p.id()) => product_id = Some(p.id()),
                _ => return Ok(None),
            }
        }

        let mut batch_id = None;
        if let Some(number) = query.batch_number.as_deref() {
            let number = BatchNumber::new(number)?;
            match self.ctx.stores.ledger.find_by_number(&number)? {
                Some(batch) => batch_id = Some(batch.id()),
                None => return Ok(None),
            }
        }

        Ok(Some(MovementFilter {
            from: query.from.map(|d| d.and_time(NaiveTime::MIN).and_utc()),
            to: query.to.map(end_of_day),
            product_id,
            direction: query.direction,
            batch_id,
        }))
    }

    fn views(&self, movements: Vec<StockMovement>) -> Result<Vec<MovementView>, EngineError> {
        let mut products: HashMap<ProductId, Product> = HashMap::new();
        let mut batch_numbers: HashMap<BatchId, String> = HashMap::new();

        movements
            .into_iter()
            .map(|m| -> Result<MovementView, EngineError> {
                if !products.contains_key(&m.product_id()) {
                    let product = load_product(&self.ctx.stores, m.product_id())?;
                    products.insert(m.product_id(), product);
                }
                if !batch_numbers.contains_key(&m.batch_id()) {
                    let batch = self
                        .ctx
                        .stores
                        .ledger
                        .get(m.batch_id())?
                        .ok_or_else(|| EngineError::NotFound(format!("batch {}", m.batch_id())))?;
                    batch_numbers.insert(m.batch_id(), batch.batch_number().to_string());
                }

                let product = &products[&m.product_id()];
                Ok(MovementView {
                    id: m.id(),
                    occurred_at: m.occurred_at(),
                    direction: m.direction(),
                    product_id: m.product_id(),
                    product_reference: product.reference().to_string(),
                    product_name: product.name().to_string(),
                    batch_id: m.batch_id(),
                    batch_number: batch_numbers[&m.batch_id()].clone(),
                    quantity: m.quantity(),
                    unit_cost: m.unit_cost(),
                    value: m.value()?,
                    reference: m.reference(),
                    note: m.note().map(str::to_string),
                })
            })
            .collect()
    }
}

fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.succ_opt()
        .map(|next| next.and_time(NaiveTime::MIN).and_utc() - chrono::Duration::nanoseconds(1))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::consumption::ConsumeStock;
    use crate::engine::StockEngine;
    use crate::receiving::ReceiveStock;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use stockfifo_inventory::NewProduct;

    struct Fixture {
        engine: StockEngine,
        bread: ProductId,
        eggs: ProductId,
        first_batch: String,
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, day, hour, 0, 0).unwrap()
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(at(1, 8)));
        let engine = StockEngine::in_memory().with_clock(clock.clone());
        let mut ids = Vec::new();
        for reference in ["BREAD", "EGGS"] {
            ids.push(
                engine
                    .register_product(NewProduct {
                        id: ProductId::new(),
                        reference: reference.to_string(),
                        name: reference.to_lowercase(),
                        reorder_point: dec!(0),
                        unit_of_measure: "UNIT".to_string(),
                    })
                    .unwrap()
                    .id(),
            );
        }
        let (bread, eggs) = (ids[0], ids[1]);

        let receive = |product_id, day, order: &str| {
            clock.set(at(day, 8));
            engine
                .receiving()
                .receive(ReceiveStock {
                    product_id,
                    quantity: dec!(10),
                    unit_cost: dec!(2),
                    order_ref: order.to_string(),
                    note: None,
                })
                .unwrap()
        };
        let first = receive(bread, 1, "PO-1");
        receive(eggs, 2, "PO-2");
        receive(bread, 3, "PO-3");

        clock.set(at(4, 12));
        engine
            .consumption()
            .consume(ConsumeStock {
                product_id: bread,
                quantity: dec!(15),
                source_ref: "BS-7".to_string(),
                note: None,
            })
            .unwrap();

        Fixture {
            engine,
            bread,
            eggs,
            first_batch: first.batch.batch_number().to_string(),
        }
    }

    #[test]
    fn results_are_newest_first() {
        let f = fixture();
        let page = f.engine.queries().all_movements(PageRequest::default()).unwrap();

        assert_eq!(page.total, 5);
        assert_eq!(page.size, 20);
        let dates: Vec<_> = page.items.iter().map(|m| m.occurred_at).collect();
        let mut sorted = dates.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(dates, sorted);
        assert_eq!(page.items[4].reference, "SUPPLIER_ORDER-PO-1");
    }

    #[test]
    fn date_bounds_are_inclusive_days() {
        let f = fixture();
        let query = MovementQuery {
            from: NaiveDate::from_ymd_opt(2024, 4, 2),
            to: NaiveDate::from_ymd_opt(2024, 4, 3),
            ..MovementQuery::default()
        };
        let page = f.engine.queries().search_movements(&query, PageRequest::default()).unwrap();
        assert_eq!(page.total, 2);
    }

    #[test]
    fn filters_by_reference_direction_and_batch() {
        let f = fixture();
        let queries = f.engine.queries();

        let outs = MovementQuery {
            product_reference: Some("BREAD".to_string()),
            direction: Some(MovementDirection::Out),
            ..MovementQuery::default()
        };
        let page = queries.search_movements(&outs, PageRequest::default()).unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|m| m.reference == "STOCK_EXIT-BS-7"));

        let by_batch = MovementQuery {
            batch_number: Some(f.first_batch.clone()),
            ..MovementQuery::default()
        };
        let page = queries.search_movements(&by_batch, PageRequest::default()).unwrap();
        assert_eq!(page.total, 2);
        assert!(page.items.iter().all(|m| m.batch_number == f.first_batch));

        let mismatch = MovementQuery {
            product_id: Some(f.eggs),
            product_reference: Some("BREAD".to_string()),
            ..MovementQuery::default()
        };
        assert_eq!(queries.search_movements(&mismatch, PageRequest::default()).unwrap().total, 0);

        let unknown = MovementQuery {
            batch_number: Some("LOT-NOPE".to_string()),
            ..MovementQuery::default()
        };
        assert_eq!(queries.search_movements(&unknown, PageRequest::default()).unwrap().total, 0);
    }

    #[test]
    fn pages_are_clamped_and_sliced() {
        let f = fixture();
        let queries = f.engine.queries();

        let second = queries.all_movements(PageRequest::new(1, 2)).unwrap();
        assert_eq!(second.items.len(), 2);
        assert_eq!(second.total_pages(), 3);

        let huge = queries.all_movements(PageRequest::new(0, 10_000)).unwrap();
        assert_eq!(huge.size, 200);

        let err = queries.all_movements(PageRequest::new(0, 0)).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn batch_history_includes_depleted_batches() {
        let f = fixture();
        let history = f.engine.queries().batch_history(f.bread).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].remaining_quantity(), dec!(0));
        assert_eq!(history[0].remaining_quantity(), dec!(5));

        let movements = f.engine.queries().movements_by_product(f.eggs).unwrap();
        assert_eq!(movements.len(), 1);
    }
}
