//! Ledger commands and the pure decisions that turn them into commits.
//!
//! A decision never touches storage: it receives the current state of the
//! location records involved and returns a [`LedgerCommit`] describing every
//! balance write and every log row, which the store applies all-or-nothing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotelstock_core::{DepartmentId, DomainError, DomainResult, ExpectedVersion, HotelId, ItemId};

use crate::item::{ensure_positive_quantity, ItemDetails, LocationKey, StockItem};
use crate::transaction::{Actor, ItemTransaction, TransactionKind};
use crate::transfer::Transfer;

/// One location record write, guarded by the version it was decided against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemWrite {
    pub item: StockItem,
    pub expected: ExpectedVersion,
}

/// Everything a single mutation writes: balances and log rows, applied as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerCommit {
    pub writes: Vec<ItemWrite>,
    pub transactions: Vec<ItemTransaction>,
}

impl LedgerCommit {
    fn write(mut self, item: StockItem, expected: ExpectedVersion) -> Self {
        self.writes.push(ItemWrite { item, expected });
        self
    }

    fn record(mut self, transaction: ItemTransaction) -> Self {
        self.transactions.push(transaction);
        self
    }

    /// The committed state of one of the written items.
    pub fn item(&self, id: ItemId) -> Option<&StockItem> {
        self.writes.iter().find(|w| w.item.id == id).map(|w| &w.item)
    }

    /// Verify the balance/log lockstep against the stored balances.
    ///
    /// `stored_balance` returns the balance currently persisted for an item
    /// (`None` for a record being inserted). For every written item the new
    /// balance must equal the stored balance plus the signed sum of the rows
    /// this commit appends for it, and every row must belong to a written item.
    pub fn check_lockstep(&self, stored_balance: impl Fn(ItemId) -> Option<i64>) -> DomainResult<()> {
        let mut deltas: HashMap<ItemId, i64> = HashMap::new();
        for tx in &self.transactions {
            if self.item(tx.item_id).is_none() {
                return Err(DomainError::invariant(format!(
                    "transaction {} references item {} which this commit does not write",
                    tx.id, tx.item_id
                )));
            }
            *deltas.entry(tx.item_id).or_default() += tx.signed_quantity();
        }

        for w in &self.writes {
            let before = stored_balance(w.item.id).unwrap_or(0);
            let delta = deltas.get(&w.item.id).copied().unwrap_or(0);
            if before + delta != w.item.current_stock {
                return Err(DomainError::invariant(format!(
                    "item {} balance {} does not match stored {} plus logged {}",
                    w.item.id, w.item.current_stock, before, delta
                )));
            }
            if w.item.current_stock < 0 {
                return Err(DomainError::invariant(format!(
                    "item {} balance would go negative",
                    w.item.id
                )));
            }
        }
        Ok(())
    }
}

fn expected_for(item: &StockItem) -> ExpectedVersion {
    if item.version == 0 {
        ExpectedVersion::NoRecord
    } else {
        ExpectedVersion::Exact(item.version)
    }
}

/// Command: AddStock (find-or-create the location, then receive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddStock {
    pub name: String,
    pub hotel_id: HotelId,
    pub department_id: DepartmentId,
    pub quantity: i64,
    pub details: ItemDetails,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl AddStock {
    pub fn key(&self) -> DomainResult<LocationKey> {
        LocationKey::new(self.name.clone(), self.hotel_id, self.department_id)
    }

    /// `existing` is the record currently stored at [`AddStock::key`], if any.
    pub fn decide(&self, existing: Option<&StockItem>) -> DomainResult<LedgerCommit> {
        ensure_positive_quantity(self.quantity)?;
        let key = self.key()?;

        let (base, next) = match existing {
            Some(item) => {
                if item.key() != key {
                    return Err(DomainError::invariant("existing item does not match the location key"));
                }
                (item.clone(), item.restock(self.quantity, &self.details, self.occurred_at)?)
            }
            None => {
                let opened = StockItem::open(key, &self.details, self.occurred_at)?;
                let next = opened.receive(self.quantity, self.occurred_at)?;
                (opened, next)
            }
        };

        let tx = ItemTransaction::movement(
            &next,
            TransactionKind::Add,
            self.quantity,
            None,
            &self.actor,
            self.occurred_at,
        );
        Ok(LedgerCommit::default().write(next, expected_for(&base)).record(tx))
    }
}

/// Command: MarkDamage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkDamage {
    pub item_id: ItemId,
    pub quantity: i64,
    pub remarks: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl MarkDamage {
    pub fn decide(&self, item: &StockItem) -> DomainResult<LedgerCommit> {
        decide_release(
            item,
            self.item_id,
            TransactionKind::Damage,
            self.quantity,
            &self.remarks,
            &self.actor,
            self.occurred_at,
        )
    }
}

/// Command: ReturnToVendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnToVendor {
    pub item_id: ItemId,
    pub quantity: i64,
    pub remarks: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl ReturnToVendor {
    pub fn decide(&self, item: &StockItem) -> DomainResult<LedgerCommit> {
        decide_release(
            item,
            self.item_id,
            TransactionKind::ReturnVendor,
            self.quantity,
            &self.remarks,
            &self.actor,
            self.occurred_at,
        )
    }
}

fn decide_release(
    item: &StockItem,
    item_id: ItemId,
    kind: TransactionKind,
    quantity: i64,
    remarks: &Option<String>,
    actor: &Actor,
    occurred_at: DateTime<Utc>,
) -> DomainResult<LedgerCommit> {
    if item.id != item_id {
        return Err(DomainError::invariant("item_id mismatch"));
    }
    let next = item.release(quantity, occurred_at)?;
    let tx = ItemTransaction::movement(&next, kind, quantity, remarks.clone(), actor, occurred_at);
    Ok(LedgerCommit::default().write(next, expected_for(item)).record(tx))
}

/// Command: TransferStock.
///
/// Missing destination hotel/department default to the source's own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStock {
    pub item_id: ItemId,
    pub to_hotel_id: Option<HotelId>,
    pub to_department_id: Option<DepartmentId>,
    pub quantity: i64,
    pub remarks: Option<String>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Outcome of a transfer decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferDecision {
    pub commit: LedgerCommit,
    pub transfer: Transfer,
    pub source: StockItem,
    pub destination: StockItem,
}

impl TransferStock {
    pub fn destination_key(&self, source: &StockItem) -> LocationKey {
        LocationKey {
            name: source.name.clone(),
            hotel_id: self.to_hotel_id.unwrap_or(source.hotel_id),
            department_id: self.to_department_id.unwrap_or(source.department_id),
        }
    }

    /// `destination` is the record currently stored at [`TransferStock::destination_key`], if any.
    pub fn decide(&self, source: &StockItem, destination: Option<&StockItem>) -> DomainResult<TransferDecision> {
        ensure_positive_quantity(self.quantity)?;
        if source.id != self.item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }

        let key = self.destination_key(source);
        if key == source.key() {
            return Err(DomainError::validation(
                "transfer destination must differ from the source location",
            ));
        }

        let source_next = source.release(self.quantity, self.occurred_at)?;

        let dest_base = match destination {
            Some(d) => {
                if d.key() != key {
                    return Err(DomainError::invariant("destination does not match the location key"));
                }
                d.clone()
            }
            None => {
                let inherited = ItemDetails {
                    min_stock: Some(source.min_stock),
                    category: source.category.clone(),
                    unit: source.unit.clone(),
                };
                StockItem::open(key, &inherited, self.occurred_at)?
            }
        };
        let dest_next = dest_base.receive(self.quantity, self.occurred_at)?;

        let transfer = Transfer::new(
            source,
            &dest_base,
            self.quantity,
            self.remarks.clone(),
            &self.actor,
            self.occurred_at,
        )?;
        let [out_leg, in_leg] = transfer.legs();

        let commit = LedgerCommit::default()
            .write(source_next.clone(), expected_for(source))
            .write(dest_next.clone(), expected_for(&dest_base))
            .record(out_leg)
            .record(in_leg);

        Ok(TransferDecision {
            commit,
            transfer,
            source: source_next,
            destination: dest_next,
        })
    }
}

/// Command: UpdateItem (descriptive fields only; the balance is ledger-owned).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub item_id: ItemId,
    pub name: Option<String>,
    pub details: ItemDetails,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl UpdateItem {
    /// The location key after the rename, when the name actually changes.
    pub fn renamed_key(&self, item: &StockItem) -> DomainResult<Option<LocationKey>> {
        match &self.name {
            Some(name) => {
                let key = LocationKey::new(name.clone(), item.hotel_id, item.department_id)?;
                Ok((key.name != item.name).then_some(key))
            }
            None => Ok(None),
        }
    }

    /// `clash` is whatever record already occupies the renamed key.
    pub fn decide(&self, item: &StockItem, clash: Option<&StockItem>) -> DomainResult<LedgerCommit> {
        if item.id != self.item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        if let Some(other) = clash {
            if other.id != item.id {
                return Err(DomainError::conflict(format!(
                    "an item named '{}' already exists at this location",
                    other.name
                )));
            }
        }

        let mut next = item.with_details(&self.details, self.occurred_at)?;
        if let Some(key) = self.renamed_key(item)? {
            next.name = key.name;
        }
        Ok(LedgerCommit::default().write(next, expected_for(item)))
    }
}

/// Command: DeactivateItem (soft delete).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeactivateItem {
    pub item_id: ItemId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

impl DeactivateItem {
    pub fn decide(&self, item: &StockItem) -> DomainResult<LedgerCommit> {
        if item.id != self.item_id {
            return Err(DomainError::invariant("item_id mismatch"));
        }
        let next = item.deactivate(self.occurred_at)?;
        Ok(LedgerCommit::default().write(next, expected_for(item)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 2, 8, 30, 0).unwrap()
    }

    fn add(name: &str, hotel: HotelId, dept: DepartmentId, qty: i64) -> AddStock {
        AddStock {
            name: name.into(),
            hotel_id: hotel,
            department_id: dept,
            quantity: qty,
            details: ItemDetails {
                min_stock: Some(10),
                ..ItemDetails::default()
            },
            actor: Actor::new("alice", "STAFF"),
            occurred_at: at(),
        }
    }

    fn stocked(qty: i64) -> StockItem {
        let cmd = add("Rice", HotelId::new(), DepartmentId::new(), qty);
        cmd.decide(None).unwrap().writes.remove(0).item
    }

    #[test]
    fn add_stock_creates_location_with_add_row() {
        let cmd = add("Rice", HotelId::new(), DepartmentId::new(), 100);
        let commit = cmd.decide(None).unwrap();

        assert_eq!(commit.writes.len(), 1);
        let w = &commit.writes[0];
        assert_eq!(w.expected, ExpectedVersion::NoRecord);
        assert_eq!(w.item.current_stock, 100);
        assert_eq!(w.item.version, 1);
        assert_eq!(w.item.min_stock, 10);

        assert_eq!(commit.transactions.len(), 1);
        let tx = &commit.transactions[0];
        assert_eq!(tx.kind, TransactionKind::Add);
        assert_eq!(tx.quantity, 100);
        assert_eq!(tx.item_id, w.item.id);
        assert_eq!(tx.created_by, "alice");
        commit.check_lockstep(|_| None).unwrap();
    }

    #[test]
    fn add_stock_to_existing_location_expects_its_version() {
        let item = stocked(5);
        let cmd = add("Rice", item.hotel_id, item.department_id, 7);
        let commit = cmd.decide(Some(&item)).unwrap();
        assert_eq!(commit.writes[0].expected, ExpectedVersion::Exact(item.version));
        assert_eq!(commit.writes[0].item.current_stock, 12);
        commit.check_lockstep(|_| Some(5)).unwrap();
    }

    #[test]
    fn add_stock_rejects_non_positive_quantity_before_anything_else() {
        let cmd = add("", HotelId::new(), DepartmentId::new(), 0);
        let err = cmd.decide(None).unwrap_err();
        match err {
            DomainError::Validation(msg) => assert!(msg.contains("quantity")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn damage_beyond_balance_is_insufficient_stock() {
        let item = stocked(4);
        let cmd = MarkDamage {
            item_id: item.id,
            quantity: 5,
            remarks: None,
            actor: Actor::system(),
            occurred_at: at(),
        };
        assert_eq!(cmd.decide(&item).unwrap_err(), DomainError::insufficient_stock(5, 4));
    }

    #[test]
    fn return_to_vendor_logs_return_row() {
        let item = stocked(4);
        let cmd = ReturnToVendor {
            item_id: item.id,
            quantity: 4,
            remarks: Some("wrong grade".into()),
            actor: Actor::system(),
            occurred_at: at(),
        };
        let commit = cmd.decide(&item).unwrap();
        assert_eq!(commit.writes[0].item.current_stock, 0);
        assert_eq!(commit.transactions[0].kind, TransactionKind::ReturnVendor);
        assert_eq!(commit.transactions[0].remarks.as_deref(), Some("wrong grade"));
        commit.check_lockstep(|_| Some(4)).unwrap();
    }

    #[test]
    fn transfer_to_new_department_creates_destination() {
        let item = stocked(50);
        let dept2 = DepartmentId::new();
        let cmd = TransferStock {
            item_id: item.id,
            to_hotel_id: None,
            to_department_id: Some(dept2),
            quantity: 20,
            remarks: None,
            actor: Actor::system(),
            occurred_at: at(),
        };
        let decision = cmd.decide(&item, None).unwrap();

        assert_eq!(decision.source.current_stock, 30);
        assert_eq!(decision.destination.current_stock, 20);
        assert_eq!(decision.destination.hotel_id, item.hotel_id);
        assert_eq!(decision.destination.department_id, dept2);
        assert_eq!(decision.destination.min_stock, item.min_stock);
        assert_eq!(decision.commit.writes[1].expected, ExpectedVersion::NoRecord);
        assert!(!decision.transfer.is_inter_hotel());

        let stored = item.current_stock;
        decision
            .commit
            .check_lockstep(|id| (id == item.id).then_some(stored))
            .unwrap();
    }

    #[test]
    fn transfer_onto_itself_is_rejected() {
        let item = stocked(50);
        let cmd = TransferStock {
            item_id: item.id,
            to_hotel_id: Some(item.hotel_id),
            to_department_id: None,
            quantity: 1,
            remarks: None,
            actor: Actor::system(),
            occurred_at: at(),
        };
        assert!(matches!(cmd.decide(&item, None), Err(DomainError::Validation(_))));
    }

    #[test]
    fn rename_onto_occupied_key_conflicts() {
        let item = stocked(1);
        let other = {
            let cmd = add("Flour", item.hotel_id, item.department_id, 1);
            cmd.decide(None).unwrap().writes.remove(0).item
        };
        let cmd = UpdateItem {
            item_id: item.id,
            name: Some("Flour".into()),
            details: ItemDetails::default(),
            actor: Actor::system(),
            occurred_at: at(),
        };
        assert!(matches!(cmd.decide(&item, Some(&other)), Err(DomainError::Conflict(_))));
    }

    #[test]
    fn update_never_touches_the_balance() {
        let item = stocked(9);
        let cmd = UpdateItem {
            item_id: item.id,
            name: Some("Basmati Rice".into()),
            details: ItemDetails {
                min_stock: Some(30),
                ..ItemDetails::default()
            },
            actor: Actor::system(),
            occurred_at: at(),
        };
        let commit = cmd.decide(&item, None).unwrap();
        assert!(commit.transactions.is_empty());
        assert_eq!(commit.writes[0].item.current_stock, 9);
        assert_eq!(commit.writes[0].item.name, "Basmati Rice");
        assert_eq!(commit.writes[0].item.min_stock, 30);
        commit.check_lockstep(|_| Some(9)).unwrap();
    }

    #[test]
    fn lockstep_detects_balance_without_log_row() {
        let item = stocked(9);
        let mut bumped = item.clone();
        bumped.current_stock += 1;
        let commit = LedgerCommit::default().write(bumped, ExpectedVersion::Exact(item.version));
        assert!(matches!(
            commit.check_lockstep(|_| Some(9)),
            Err(DomainError::InvariantViolation(_))
        ));
    }
}
