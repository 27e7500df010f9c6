use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use hotelstock_core::{DepartmentId, HotelId, ItemId};
use hotelstock_ledger::{ItemTransaction, LedgerCommit, LocationKey, StockItem};

/// Ledger store operation error.
///
/// These are infrastructure errors. Business failures (validation, stock
/// levels) are decided before a commit ever reaches the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A version expectation failed or a location key is already taken.
    #[error("optimistic concurrency check failed: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(String),

    /// The commit would break balance/log lockstep or row invariants.
    #[error("ledger integrity violation: {0}")]
    Integrity(String),
}

/// Scope filter for listing location records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemFilter {
    pub hotel_id: Option<HotelId>,
    pub department_id: Option<DepartmentId>,
    pub item_id: Option<ItemId>,
    /// Case-insensitive substring match on the item name.
    pub search: Option<String>,
    pub include_inactive: bool,
}

impl ItemFilter {
    pub fn active() -> Self {
        Self::default()
    }

    pub fn matches(&self, item: &StockItem) -> bool {
        if !self.include_inactive && !item.active {
            return false;
        }
        if self.hotel_id.is_some_and(|h| h != item.hotel_id)
            || self.department_id.is_some_and(|d| d != item.department_id)
            || self.item_id.is_some_and(|i| i != item.id)
        {
            return false;
        }
        match self.search_term() {
            Some(term) => item.name.to_lowercase().contains(&term),
            None => true,
        }
    }

    /// Normalized search term (trimmed, lowercased), if any.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }
}

/// Stock location records plus the transaction log.
///
/// Implementations must:
/// - apply a commit atomically (every write and every row, or nothing)
/// - reject a write whose `ExpectedVersion` does not match the stored record
/// - keep `(name, hotel_id, department_id)` unique across records
/// - never update or delete a transaction row
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_item(&self, id: ItemId) -> Result<Option<StockItem>, StoreError>;

    /// The record stored at a location key, active or not.
    async fn find_item_at(&self, key: &LocationKey) -> Result<Option<StockItem>, StoreError>;

    /// Records matching `filter`, ordered by name then id.
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<StockItem>, StoreError>;

    /// Records for a set of ids (missing ids are skipped).
    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<StockItem>, StoreError>;

    /// Log rows of the given items with `created_at < before`, in ledger order.
    async fn transactions_for(
        &self,
        item_ids: &[ItemId],
        before: DateTime<Utc>,
    ) -> Result<Vec<ItemTransaction>, StoreError>;

    /// The whole log, in ledger order.
    async fn all_transactions(&self) -> Result<Vec<ItemTransaction>, StoreError>;

    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn find_item(&self, id: ItemId) -> Result<Option<StockItem>, StoreError> {
        (**self).find_item(id).await
    }

    async fn find_item_at(&self, key: &LocationKey) -> Result<Option<StockItem>, StoreError> {
        (**self).find_item_at(key).await
    }

    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<StockItem>, StoreError> {
        (**self).list_items(filter).await
    }

    async fn items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<StockItem>, StoreError> {
        (**self).items_by_ids(ids).await
    }

    async fn transactions_for(
        &self,
        item_ids: &[ItemId],
        before: DateTime<Utc>,
    ) -> Result<Vec<ItemTransaction>, StoreError> {
        (**self).transactions_for(item_ids, before).await
    }

    async fn all_transactions(&self) -> Result<Vec<ItemTransaction>, StoreError> {
        (**self).all_transactions().await
    }

    async fn commit(&self, commit: LedgerCommit) -> Result<(), StoreError> {
        (**self).commit(commit).await
    }
}
