//! Product-scoped mutual exclusion.
//!
//! Every mutation of a product's batches and cached stock runs while holding
//! that product's lock exclusively. Reports take it shared, so they never see
//! a unit of work half applied or in the middle of a rollback. Reports that
//! span every product take the store-wide lock exclusively instead.
//!
//! The locks guard no data, so a panic inside a locked section does not
//! poison the product for later callers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use stockfifo_core::ProductId;

#[derive(Debug, Default)]
pub struct ProductLocks {
    locks: Mutex<HashMap<ProductId, Arc<RwLock<()>>>>,
    /// Shared by product-scoped sections, exclusive for whole-store reads.
    store: RwLock<()>,
}

impl ProductLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock handles in ascending id order, duplicates removed.
    fn handles(&self, product_ids: &[ProductId]) -> Vec<Arc<RwLock<()>>> {
        let mut ids = product_ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        ids.into_iter()
            .map(|id| locks.entry(id).or_default().clone())
            .collect()
    }

    fn store_shared(&self) -> RwLockReadGuard<'_, ()> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` while holding the locks of every product in `product_ids`.
    ///
    /// Locks are taken in ascending id order so that two callers locking
    /// overlapping sets cannot deadlock. Not reentrant.
    pub fn with_locked<T>(&self, product_ids: &[ProductId], f: impl FnOnce() -> T) -> T {
        let _store = self.store_shared();
        let handles = self.handles(product_ids);
        let _guards: Vec<RwLockWriteGuard<'_, ()>> = handles
            .iter()
            .map(|l| l.write().unwrap_or_else(PoisonError::into_inner))
            .collect();

        f()
    }

    /// Run `f` with the products in `product_ids` shielded from mutation.
    pub fn with_read_locked<T>(&self, product_ids: &[ProductId], f: impl FnOnce() -> T) -> T {
        let _store = self.store_shared();
        let handles = self.handles(product_ids);
        let _guards: Vec<RwLockReadGuard<'_, ()>> = handles
            .iter()
            .map(|l| l.read().unwrap_or_else(PoisonError::into_inner))
            .collect();

        f()
    }

    /// Run `f` while no product-scoped section is in progress.
    pub fn with_store_read_locked<T>(&self, f: impl FnOnce() -> T) -> T {
        let _store = self.store.write().unwrap_or_else(PoisonError::into_inner);
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_product_is_serialized() {
        let locks = Arc::new(ProductLocks::new());
        let product_id = ProductId::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let inside = inside.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    locks.with_locked(&[product_id], || {
                        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                        max_seen.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();

        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn duplicate_ids_do_not_self_deadlock() {
        let locks = ProductLocks::new();
        let id = ProductId::new();
        assert_eq!(locks.with_locked(&[id, id], || 7), 7);
        assert_eq!(locks.with_read_locked(&[id, id], || 8), 8);
    }

    #[test]
    fn panic_inside_a_section_does_not_wedge_the_product() {
        let locks = Arc::new(ProductLocks::new());
        let id = ProductId::new();

        let panicking = {
            let locks = locks.clone();
            thread::spawn(move || locks.with_locked::<()>(&[id], || panic!("boom")))
        };
        assert!(panicking.join().is_err());

        let reporting = {
            let locks = locks.clone();
            thread::spawn(move || locks.with_store_read_locked::<()>(|| panic!("boom")))
        };
        assert!(reporting.join().is_err());

        assert_eq!(locks.with_locked(&[id], || 1), 1);
        assert_eq!(locks.with_read_locked(&[id], || 2), 2);
        assert_eq!(locks.with_store_read_locked(|| 3), 3);
    }

    #[test]
    fn readers_wait_for_the_writer() {
        let locks = Arc::new(ProductLocks::new());
        let id = ProductId::new();
        let state = Arc::new(AtomicUsize::new(0));
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();

        let writer = {
            let locks = locks.clone();
            let state = state.clone();
            thread::spawn(move || {
                locks.with_locked(&[id], || {
                    state.store(1, Ordering::SeqCst);
                    entered_tx.send(()).unwrap();
                    thread::sleep(Duration::from_millis(50));
                    state.store(2, Ordering::SeqCst);
                })
            })
        };

        entered_rx.recv().unwrap();
        assert_eq!(locks.with_read_locked(&[id], || state.load(Ordering::SeqCst)), 2);
        assert_eq!(locks.with_store_read_locked(|| state.load(Ordering::SeqCst)), 2);
        writer.join().unwrap();
    }
}
