//! Per-order mutual exclusion.

use std::collections::HashMap;
use std::sync::Arc;

use common::OrderId;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per order.
///
/// Invoice creation for the same order runs one at a time while different
/// orders proceed independently. Entries nobody holds or waits on are pruned
/// on the next acquire.
#[derive(Debug, Default)]
pub struct OrderLocks {
    locks: Mutex<HashMap<OrderId, Arc<Mutex<()>>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to the order. Access is released when the
    /// guard is dropped, including when the owning future is cancelled.
    pub async fn acquire(&self, order_id: OrderId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // A count of 1 means only the map references it.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(order_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Number of orders with a live lock entry.
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
