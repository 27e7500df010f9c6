use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use hotelstock_core::{ItemId, TransactionId};
use hotelstock_ledger::{ItemTransaction, LedgerCommit, LocationKey, StockItem};

use super::r#trait::{ItemFilter, LedgerStore, StoreError};

#[derive(Debug, Default)]
struct LedgerState {
    items: HashMap<ItemId, StockItem>,
    keys: HashMap<LocationKey, ItemId>,
    log: Vec<ItemTransaction>,
    logged: HashSet<TransactionId>,
}

/// In-memory ledger store.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, LedgerState>, StoreError> {
        self.state
            .read()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))
    }

    /// Append raw rows without touching balances (seeding legacy data in tests).
    pub fn import_transactions(&self, rows: Vec<ItemTransaction>) -> Result<(), StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))?;
        state.logged.extend(rows.iter().map(|t| t.id));
        state.log.extend(rows);
        Ok(())
    }
}

fn ledger_order(rows: &mut [ItemTransaction]) {
    rows.sort_by_key(|t| (t.created_at, t.id));
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn find_item(&self, id: ItemId) -> Result<Option<StockItem>, StoreError> {
        Ok(self.read()?.items.get(&id).cloned())
    }

    async fn find_item_at(&self, key: &LocationKey) -> Result<Option<StockItem>, StoreError> {
        let state = self.read()?;
        Ok(state.keys.get(key).and_then(|id| state.items.get(id)).cloned())
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<StockItem>, StoreError> {
        let state = self.read()?;
        let mut items: Vec<StockItem> = state.items.values().filter(|i| filter.matches(i)).cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(items)
    }

    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<StockItem>, StoreError> {
        let state = self.read()?;
        Ok(ids.iter().filter_map(|id| state.items.get(id).cloned()).collect())
    }

    async fn transactions_for(
        &self,
        item_ids: &[ItemId],
        before: DateTime<Utc>,
    ) -> Result<Vec<ItemTransaction>, StoreError> {
        let wanted: HashSet<ItemId> = item_ids.iter().copied().collect();
        let state = self.read()?;
        let mut rows: Vec<ItemTransaction> = state
            .log
            .iter()
            .filter(|t| wanted.contains(&t.item_id) && t.created_at < before)
            .cloned()
            .collect();
        ledger_order(&mut rows);
        Ok(rows)
    }

    async fn all_transactions(&self) -> Result<Vec<ItemTransaction>, StoreError> {
        let mut rows = self.read()?.log.clone();
        ledger_order(&mut rows);
        Ok(rows)
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError> {
        if commit.writes.is_empty() {
            if !commit.transactions.is_empty() {
                return Err(StoreError::Integrity(
                    "commit carries log rows without a balance write".to_string(),
                ));
            }
            return Ok(());
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))?;

        // Validate everything before touching state.
        let writing: HashSet<ItemId> = commit.writes.iter().map(|w| w.item.id).collect();
        let mut claimed: HashSet<LocationKey> = HashSet::new();
        for write in &commit.writes {
            let stored = state.items.get(&write.item.id);
            write
                .expected
                .check(stored.map(|i| i.version))
                .map_err(|e| StoreError::Conflict(e.to_string()))?;

            let key = write.item.key();
            if let Some(owner) = state.keys.get(&key) {
                if *owner != write.item.id && !writing.contains(owner) {
                    return Err(StoreError::Conflict(format!(
                        "location key '{}' is already held by item {owner}",
                        key.name
                    )));
                }
            }
            if !claimed.insert(key) {
                return Err(StoreError::Integrity("commit writes one location key twice".to_string()));
            }
        }
        commit
            .check_lockstep(|id| state.items.get(&id).map(|i| i.current_stock))
            .map_err(|e| StoreError::Integrity(e.to_string()))?;
        if commit.transactions.iter().any(|t| state.logged.contains(&t.id)) {
            return Err(StoreError::Integrity("transaction id already in the log".to_string()));
        }

        let LedgerCommit { writes, transactions } = commit;
        for write in writes {
            let item = write.item;
            if let Some(previous) = state.items.get(&item.id).map(StockItem::key) {
                if state.keys.get(&previous) == Some(&item.id) {
                    state.keys.remove(&previous);
                }
            }
            state.keys.insert(item.key(), item.id);
            state.items.insert(item.id, item);
        }
        state.logged.extend(transactions.iter().map(|t| t.id));
        state.log.extend(transactions);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hotelstock_core::{DepartmentId, HotelId};
    use hotelstock_ledger::{Actor, AddStock, ItemDetails, MarkDamage, UpdateItem};

    fn add(name: &str, hotel: HotelId, dept: DepartmentId, qty: i64, existing: Option<&StockItem>) -> LedgerCommit {
        AddStock {
            name: name.into(),
            hotel_id: hotel,
            department_id: dept,
            quantity: qty,
            details: ItemDetails::default(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        }
        .decide(existing)
        .unwrap()
    }

    #[tokio::test]
    async fn commit_then_read_back() {
        let store = InMemoryLedgerStore::new();
        let (hotel, dept) = (HotelId::new(), DepartmentId::new());
        let commit = add("Soap", hotel, dept, 7, None);
        let id = commit.writes[0].item.id;
        store.commit(commit).await.unwrap();

        let item = store.find_item(id).await.unwrap().unwrap();
        assert_eq!(item.current_stock, 7);
        assert_eq!(item.version, 1);
        let key = LocationKey::new("Soap", hotel, dept).unwrap();
        assert_eq!(store.find_item_at(&key).await.unwrap().map(|i| i.id), Some(id));
        assert_eq!(store.transactions_for(&[id], Utc::now() + Duration::seconds(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn stale_version_is_a_conflict_and_changes_nothing() {
        let store = InMemoryLedgerStore::new();
        let commit = add("Soap", HotelId::new(), DepartmentId::new(), 7, None);
        let item = commit.writes[0].item.clone();
        store.commit(commit).await.unwrap();

        let damage = |qty| MarkDamage {
            item_id: item.id,
            quantity: qty,
            remarks: None,
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        store.commit(damage(2).decide(&item).unwrap()).await.unwrap();
        // Decided against version 1 again.
        let err = store.commit(damage(3).decide(&item).unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        assert_eq!(store.find_item(item.id).await.unwrap().unwrap().current_stock, 5);
        assert_eq!(store.all_transactions().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn log_rows_without_a_balance_write_are_rejected() {
        let store = InMemoryLedgerStore::new();
        let LedgerCommit { transactions, .. } = add("Soap", HotelId::new(), DepartmentId::new(), 7, None);
        let orphaned = LedgerCommit {
            writes: vec![],
            transactions,
        };
        assert!(matches!(store.commit(orphaned).await, Err(StoreError::Integrity(_))));
        assert!(store.all_transactions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_creation_at_one_key_is_a_conflict() {
        let store = InMemoryLedgerStore::new();
        let (hotel, dept) = (HotelId::new(), DepartmentId::new());
        let first = add("Soap", hotel, dept, 1, None);
        let second = add("Soap", hotel, dept, 1, None);
        store.commit(first).await.unwrap();
        assert!(matches!(store.commit(second).await, Err(StoreError::Conflict(_))));
    }

    #[tokio::test]
    async fn rename_moves_the_key_index() {
        let store = InMemoryLedgerStore::new();
        let (hotel, dept) = (HotelId::new(), DepartmentId::new());
        let commit = add("Soap", hotel, dept, 1, None);
        let item = commit.writes[0].item.clone();
        store.commit(commit).await.unwrap();

        let update = UpdateItem {
            item_id: item.id,
            name: Some("Hand Soap".into()),
            details: ItemDetails::default(),
            actor: Actor::system(),
            occurred_at: Utc::now(),
        };
        store.commit(update.decide(&item, None).unwrap()).await.unwrap();

        let old = LocationKey::new("Soap", hotel, dept).unwrap();
        let new = LocationKey::new("Hand Soap", hotel, dept).unwrap();
        assert!(store.find_item_at(&old).await.unwrap().is_none());
        assert_eq!(store.find_item_at(&new).await.unwrap().map(|i| i.id), Some(item.id));
    }

    #[tokio::test]
    async fn list_filters_by_scope_search_and_activity() {
        let store = InMemoryLedgerStore::new();
        let (h1, h2, dept) = (HotelId::new(), HotelId::new(), DepartmentId::new());
        store.commit(add("Bath Towel", h1, dept, 1, None)).await.unwrap();
        store.commit(add("Soap", h1, dept, 1, None)).await.unwrap();
        store.commit(add("Towel", h2, dept, 1, None)).await.unwrap();

        let filter = ItemFilter {
            search: Some(" towel ".into()),
            ..ItemFilter::active()
        };
        let names: Vec<_> = store.list_items(&filter).await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Bath Towel", "Towel"]);

        let filter = ItemFilter {
            hotel_id: Some(h1),
            ..ItemFilter::active()
        };
        assert_eq!(store.list_items(&filter).await.unwrap().len(), 2);
    }
}
