//! In-process per-item serialization.
//!
//! A mutation holds the locks of every item it touches from the moment it
//! reads them until its commit lands. Multi-item locks are always taken in
//! ascending id order, so two transfers in opposite directions cannot
//! deadlock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;

use hotelstock_core::ItemId;

#[derive(Debug, Default)]
pub struct ItemLocks {
    inner: Mutex<HashMap<ItemId, Arc<tokio::sync::Mutex<()>>>>,
}

/// Held locks; released on drop.
#[derive(Debug)]
pub struct ItemGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl ItemLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, ids: &[ItemId]) -> ItemGuard {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();

        let mutexes: Vec<_> = {
            let mut map = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Only the map holds an idle entry: no guard and no waiter.
            map.retain(|_, mutex| Arc::strong_count(mutex) > 1);
            ids.iter().map(|id| map.entry(*id).or_default().clone()).collect()
        };

        let mut guards = Vec::with_capacity(mutexes.len());
        for mutex in mutexes {
            guards.push(mutex.lock_owned().await);
        }
        ItemGuard { _guards: guards }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn overlapping_sets_wait_for_each_other() {
        let locks = Arc::new(ItemLocks::new());
        let (a, b) = (ItemId::new(), ItemId::new());

        let held = locks.lock(&[b, a]).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&[a]).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(held);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("lock released")
            .unwrap();
    }

    #[tokio::test]
    async fn disjoint_sets_do_not_block() {
        let locks = ItemLocks::new();
        let _first = locks.lock(&[ItemId::new()]).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.lock(&[ItemId::new()])).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn repeated_ids_lock_once() {
        let locks = ItemLocks::new();
        let id = ItemId::new();
        let guard = tokio::time::timeout(Duration::from_millis(100), locks.lock(&[id, id])).await;
        assert!(guard.is_ok());
    }

    #[tokio::test]
    async fn released_entries_are_pruned() {
        let locks = ItemLocks::new();
        for _ in 0..50 {
            let _guard = locks.lock(&[ItemId::new(), ItemId::new()]).await;
        }
        let held = locks.lock(&[ItemId::new()]).await;
        assert_eq!(locks.tracked(), 1);
        drop(held);
        let _next = locks.lock(&[ItemId::new()]).await;
        assert_eq!(locks.tracked(), 1);
    }
}
