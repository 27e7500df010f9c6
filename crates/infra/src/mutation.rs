//! Ledger mutation pipeline: the only writer of balances and log rows.
//!
//! ```text
//! Command
//!   ↓
//! 1. Resolve references (directory, location keys) without locks
//!   ↓
//! 2. Lock every item involved (ascending id order)
//!   ↓
//! 3. Re-read those items under the lock
//!   ↓
//! 4. Decide (pure domain logic, produces one LedgerCommit)
//!   ↓
//! 5. Commit (version-checked, all-or-nothing)
//! ```
//!
//! A version conflict from step 5 (another process won) restarts the whole
//! pipeline, up to `max_commit_retries` times.

use std::future::Future;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use hotelstock_core::{DepartmentId, Entity, HotelId, ItemId};
use hotelstock_ledger::{
    ensure_positive_quantity, AddStock, DeactivateItem, LedgerCommit, MarkDamage, ReturnToVendor, StockItem,
    Transfer, TransferStock, UpdateItem,
};

use crate::directory::Directory;
use crate::error::LedgerError;
use crate::locks::ItemLocks;
use crate::store::{ItemFilter, LedgerStore};

/// Result of a transfer: both locations after the move, plus the transfer itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub transfer: Transfer,
    pub from: StockItem,
    pub to: StockItem,
}

pub struct LedgerMutationService<S, D> {
    store: S,
    directory: D,
    locks: ItemLocks,
    max_commit_retries: u32,
}

enum Release {
    Damage(MarkDamage),
    Return(ReturnToVendor),
}

impl Release {
    fn item_id(&self) -> ItemId {
        match self {
            Release::Damage(c) => c.item_id,
            Release::Return(c) => c.item_id,
        }
    }

    fn quantity(&self) -> i64 {
        match self {
            Release::Damage(c) => c.quantity,
            Release::Return(c) => c.quantity,
        }
    }

    fn decide(&self, item: &StockItem) -> Result<LedgerCommit, LedgerError> {
        Ok(match self {
            Release::Damage(c) => c.decide(item)?,
            Release::Return(c) => c.decide(item)?,
        })
    }
}

impl<S, D> LedgerMutationService<S, D>
where
    S: LedgerStore,
    D: Directory,
{
    pub fn new(store: S, directory: D, max_commit_retries: u32) -> Self {
        Self {
            store,
            directory,
            locks: ItemLocks::new(),
            max_commit_retries,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    async fn retrying<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T, LedgerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LedgerError>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                Err(err) if err.is_retryable() && retries < self.max_commit_retries => {
                    retries += 1;
                    debug!(operation, retries, error = %err, "commit lost a version race; retrying");
                    tokio::task::yield_now().await;
                }
                other => return other,
            }
        }
    }

    async fn load(&self, id: ItemId) -> Result<StockItem, LedgerError> {
        self.store
            .find_item(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("item {id}")))
    }

    /// Hotel and department must exist and be active.
    async fn ensure_location(&self, hotel_id: HotelId, department_id: DepartmentId) -> Result<(), LedgerError> {
        match self.directory.hotel(hotel_id).await? {
            Some(h) if h.active => {}
            _ => return Err(LedgerError::Validation(format!("hotel {hotel_id} does not exist or is inactive"))),
        }
        match self.directory.department(department_id).await? {
            Some(d) if d.active => Ok(()),
            _ => Err(LedgerError::Validation(format!(
                "department {department_id} does not exist or is inactive"
            ))),
        }
    }

    async fn ensure_destination(
        &self,
        hotel_id: Option<HotelId>,
        department_id: Option<DepartmentId>,
    ) -> Result<(), LedgerError> {
        if let Some(id) = hotel_id {
            if !self.directory.hotel(id).await?.is_some_and(|h| h.active) {
                return Err(LedgerError::ReferenceNotFound(format!("destination hotel {id} not found")));
            }
        }
        if let Some(id) = department_id {
            if !self.directory.department(id).await?.is_some_and(|d| d.active) {
                return Err(LedgerError::ReferenceNotFound(format!("destination department {id} not found")));
            }
        }
        Ok(())
    }

    /// AddStock: find-or-create the location for (name, hotel, department), then receive.
    #[instrument(skip(self, cmd), fields(name = %cmd.name, hotel_id = %cmd.hotel_id, department_id = %cmd.department_id, quantity = cmd.quantity), err)]
    pub async fn add_stock(&self, cmd: AddStock) -> Result<StockItem, LedgerError> {
        let key = cmd.key()?;
        ensure_positive_quantity(cmd.quantity)?;
        self.ensure_location(cmd.hotel_id, cmd.department_id).await?;

        let item = self
            .retrying("add_stock", || async {
                let seen = self.store.find_item_at(&key).await?;
                let _guard = match &seen {
                    Some(item) => Some(self.locks.lock(&[item.id]).await),
                    None => None,
                };
                let existing = self.store.find_item_at(&key).await?;
                if existing.as_ref().map(|i| i.id) != seen.as_ref().map(|i| i.id) {
                    return Err(LedgerError::ConcurrencyConflict(format!(
                        "location '{}' changed while locking",
                        key.name
                    )));
                }

                let commit = cmd.decide(existing.as_ref())?;
                let id = commit
                    .writes
                    .first()
                    .map(|w| w.item.id)
                    .ok_or_else(|| LedgerError::Database("add_stock produced an empty commit".to_string()))?;
                let after = committed(&commit, id)?;
                self.store.commit(commit).await?;
                Ok(after)
            })
            .await?;

        info!(item_id = %item.id, current_stock = item.current_stock, actor = %cmd.actor.username, "stock added");
        Ok(item)
    }

    #[instrument(skip(self, cmd), fields(item_id = %cmd.item_id, quantity = cmd.quantity), err)]
    pub async fn mark_damage(&self, cmd: MarkDamage) -> Result<StockItem, LedgerError> {
        let actor = cmd.actor.username.clone();
        let item = self.release("mark_damage", Release::Damage(cmd)).await?;
        info!(item_id = %item.id, current_stock = item.current_stock, actor = %actor, "damage recorded");
        Ok(item)
    }

    #[instrument(skip(self, cmd), fields(item_id = %cmd.item_id, quantity = cmd.quantity), err)]
    pub async fn return_to_vendor(&self, cmd: ReturnToVendor) -> Result<StockItem, LedgerError> {
        let actor = cmd.actor.username.clone();
        let item = self.release("return_to_vendor", Release::Return(cmd)).await?;
        info!(item_id = %item.id, current_stock = item.current_stock, actor = %actor, "vendor return recorded");
        Ok(item)
    }

    async fn release(&self, operation: &'static str, cmd: Release) -> Result<StockItem, LedgerError> {
        ensure_positive_quantity(cmd.quantity())?;
        let id = cmd.item_id();
        self.retrying(operation, || async {
            let _guard = self.locks.lock(&[id]).await;
            let item = self.load(id).await?;
            let commit = cmd.decide(&item)?;
            let after = committed(&commit, id)?;
            self.store.commit(commit).await?;
            Ok(after)
        })
        .await
    }

    /// Transfer: TRANSFER_OUT on the source and TRANSFER_IN on the (found or
    /// created) destination, committed together.
    #[instrument(skip(self, cmd), fields(item_id = %cmd.item_id, quantity = cmd.quantity), err)]
    pub async fn transfer(&self, cmd: TransferStock) -> Result<TransferOutcome, LedgerError> {
        ensure_positive_quantity(cmd.quantity)?;
        self.load(cmd.item_id).await?;
        self.ensure_destination(cmd.to_hotel_id, cmd.to_department_id).await?;

        let outcome = self
            .retrying("transfer", || async {
                let source = self.load(cmd.item_id).await?;
                let key = cmd.destination_key(&source);
                let seen = self.store.find_item_at(&key).await?;

                let mut ids = vec![source.id];
                ids.extend(seen.as_ref().map(|d| d.id));
                let _guard = self.locks.lock(&ids).await;

                let source = self.load(cmd.item_id).await?;
                if cmd.destination_key(&source) != key {
                    return Err(LedgerError::ConcurrencyConflict(format!(
                        "item {} was renamed while locking",
                        source.id
                    )));
                }
                let destination = self.store.find_item_at(&key).await?;
                if destination.as_ref().map(|d| d.id) != seen.as_ref().map(|d| d.id) {
                    return Err(LedgerError::ConcurrencyConflict(format!(
                        "destination '{}' changed while locking",
                        key.name
                    )));
                }

                let decision = cmd.decide(&source, destination.as_ref())?;
                self.store.commit(decision.commit).await?;
                Ok(TransferOutcome {
                    transfer: decision.transfer,
                    from: decision.source,
                    to: decision.destination,
                })
            })
            .await?;

        info!(
            transfer_id = %outcome.transfer.id(),
            from_item = %outcome.transfer.source().item_id,
            from_hotel = %outcome.transfer.source().hotel_id,
            to_item = %outcome.transfer.destination().item_id,
            to_hotel = %outcome.transfer.destination().hotel_id,
            inter_hotel = outcome.transfer.is_inter_hotel(),
            actor = %cmd.actor.username,
            "transfer recorded"
        );
        Ok(outcome)
    }

    /// Metadata-only change; renaming onto an occupied location key is a conflict.
    #[instrument(skip(self, cmd), fields(item_id = %cmd.item_id), err)]
    pub async fn update_item(&self, cmd: UpdateItem) -> Result<StockItem, LedgerError> {
        let item = self
            .retrying("update_item", || async {
                let _guard = self.locks.lock(&[cmd.item_id]).await;
                let item = self.load(cmd.item_id).await?;
                let clash = match cmd.renamed_key(&item)? {
                    Some(key) => self.store.find_item_at(&key).await?,
                    None => None,
                };
                let commit = cmd.decide(&item, clash.as_ref())?;
                let after = committed(&commit, item.id)?;
                self.store.commit(commit).await?;
                Ok(after)
            })
            .await?;

        info!(item_id = %item.id, actor = %cmd.actor.username, "item updated");
        Ok(item)
    }

    /// Soft delete. The record and its history stay; lists and reports skip it.
    #[instrument(skip(self, cmd), fields(item_id = %cmd.item_id), err)]
    pub async fn deactivate_item(&self, cmd: DeactivateItem) -> Result<StockItem, LedgerError> {
        let item = self
            .retrying("deactivate_item", || async {
                let _guard = self.locks.lock(&[cmd.item_id]).await;
                let item = self.load(cmd.item_id).await?;
                let commit = cmd.decide(&item)?;
                let after = committed(&commit, item.id)?;
                self.store.commit(commit).await?;
                Ok(after)
            })
            .await?;

        info!(item_id = %item.id, actor = %cmd.actor.username, "item deactivated");
        Ok(item)
    }

    pub async fn get_item(&self, id: ItemId) -> Result<StockItem, LedgerError> {
        self.load(id).await
    }

    /// Active items in scope, optionally narrowed by a case-insensitive name search.
    pub async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<StockItem>, LedgerError> {
        let filter = ItemFilter {
            include_inactive: false,
            ..filter.clone()
        };
        Ok(self.store.list_items(&filter).await?)
    }

    /// Active items whose balance is below their reorder level.
    pub async fn reorder_list(&self, filter: &ItemFilter) -> Result<Vec<StockItem>, LedgerError> {
        let mut items = self.list_items(filter).await?;
        items.retain(StockItem::needs_reorder);
        Ok(items)
    }
}

fn committed(commit: &LedgerCommit, id: ItemId) -> Result<StockItem, LedgerError> {
    commit
        .item(id)
        .cloned()
        .ok_or_else(|| LedgerError::Database(format!("commit does not write item {id}")))
}
