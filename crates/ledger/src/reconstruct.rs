//! Ledger reconstruction: replay the log over a window.
//!
//! Everything here is a pure function of (item, its log rows, window, lookup
//! tables), so replaying the same immutable log twice gives identical rows.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, Utc};

use hotelstock_core::{DepartmentId, HotelId, ItemId};

use crate::item::StockItem;
use crate::report::{DailyBalanceRow, MovementDetail, MovementTotals, StockReportRow, TransferClass, TransferDetail};
use crate::transaction::{net_quantity, Counterpart, ItemTransaction, TransactionKind};
use crate::window::ReportWindow;

/// Lookup tables the engine needs beyond an item's own rows: item locations
/// (for transfer legs that only carry a `related_id`) and display names.
#[derive(Debug, Clone, Default)]
pub struct LocationIndex {
    items: HashMap<ItemId, Counterpart>,
    hotels: HashMap<HotelId, String>,
    departments: HashMap<DepartmentId, String>,
}

impl LocationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_item(&mut self, item: &StockItem) {
        self.items.insert(item.id, Counterpart::of(item));
    }

    pub fn insert_hotel(&mut self, id: HotelId, name: impl Into<String>) {
        self.hotels.insert(id, name.into());
    }

    pub fn insert_department(&mut self, id: DepartmentId, name: impl Into<String>) {
        self.departments.insert(id, name.into());
    }

    pub fn item_location(&self, id: ItemId) -> Option<Counterpart> {
        self.items.get(&id).copied()
    }

    pub fn hotel_name(&self, id: HotelId) -> Option<String> {
        self.hotels.get(&id).cloned()
    }

    pub fn department_name(&self, id: DepartmentId) -> Option<String> {
        self.departments.get(&id).cloned()
    }
}

/// Counterpart of a transfer leg: the write-time snapshot when present,
/// otherwise the current location of the item named by `related_id`.
pub fn resolve_counterpart(tx: &ItemTransaction, index: &LocationIndex) -> Option<Counterpart> {
    tx.transfer
        .map(|link| link.counterpart)
        .or_else(|| tx.related_id.and_then(|id| index.item_location(id)))
}

/// Classify a transfer leg against the hotel it was written in.
pub fn classify_transfer(tx: &ItemTransaction, index: &LocationIndex) -> (TransferClass, Option<Counterpart>) {
    match resolve_counterpart(tx, index) {
        Some(other) if other.hotel_id != tx.hotel_id => (TransferClass::InterHotel, Some(other)),
        Some(other) => (TransferClass::InterDepartment, Some(other)),
        None => (TransferClass::Unclassified, None),
    }
}

/// Signed sum of every row strictly before `start`.
pub fn opening_balance<'a>(
    transactions: impl IntoIterator<Item = &'a ItemTransaction>,
    start: DateTime<Utc>,
) -> i64 {
    net_quantity(transactions.into_iter().filter(|t| t.created_at < start))
}

/// The rows belonging to `item`, in ledger order (created_at, then id).
fn item_rows<'a>(item: &StockItem, transactions: &'a [ItemTransaction]) -> Vec<&'a ItemTransaction> {
    let mut rows: Vec<&ItemTransaction> = transactions.iter().filter(|t| t.item_id == item.id).collect();
    rows.sort_by_key(|t| (t.created_at, t.id));
    rows
}

fn class_of(tx: &ItemTransaction, index: &LocationIndex) -> (TransferClass, Option<Counterpart>) {
    if tx.kind.is_transfer() {
        classify_transfer(tx, index)
    } else {
        (TransferClass::Unclassified, None)
    }
}

fn transfer_detail(
    tx: &ItemTransaction,
    class: TransferClass,
    other: Option<Counterpart>,
    index: &LocationIndex,
) -> TransferDetail {
    let own_hotel = index.hotel_name(tx.hotel_id);
    let own_dept = index.department_name(tx.department_id);
    let other_hotel = other.and_then(|c| index.hotel_name(c.hotel_id));
    let other_dept = other.and_then(|c| index.department_name(c.department_id));

    let ((from_hotel_name, from_dept_name), (to_hotel_name, to_dept_name)) = match tx.kind {
        TransactionKind::TransferOut => ((own_hotel, own_dept), (other_hotel, other_dept)),
        _ => ((other_hotel, other_dept), (own_hotel, own_dept)),
    };

    TransferDetail {
        kind: tx.kind,
        classification: class,
        quantity: tx.quantity,
        date: tx.created_at,
        remarks: tx.remarks.clone(),
        counterpart_item_id: other.map(|c| c.item_id).or(tx.related_id),
        from_hotel_name,
        from_dept_name,
        to_hotel_name,
        to_dept_name,
    }
}

fn movement_detail(tx: &ItemTransaction) -> MovementDetail {
    MovementDetail {
        date: tx.created_at,
        quantity: tx.quantity,
        remarks: tx.remarks.clone(),
        created_by: tx.created_by.clone(),
    }
}

/// Aggregate stock report row for one item over `window`.
///
/// `transactions` may contain rows of other items; only `item`'s are used.
pub fn stock_report_row(
    item: &StockItem,
    transactions: &[ItemTransaction],
    window: &ReportWindow,
    index: &LocationIndex,
) -> StockReportRow {
    let rows = item_rows(item, transactions);
    let opening = opening_balance(rows.iter().copied(), window.start());

    let mut movements = MovementTotals::default();
    let mut damage_details = Vec::new();
    let mut return_details = Vec::new();
    let mut transfer_details = Vec::new();

    for tx in rows.iter().copied().filter(|t| window.contains(t.created_at)) {
        let (class, other) = class_of(tx, index);
        movements.record(tx.kind, class, tx.quantity);
        match tx.kind {
            TransactionKind::Damage => damage_details.push(movement_detail(tx)),
            TransactionKind::ReturnVendor => return_details.push(movement_detail(tx)),
            TransactionKind::TransferIn | TransactionKind::TransferOut => {
                transfer_details.push(transfer_detail(tx, class, other, index))
            }
            TransactionKind::Add => {}
        }
    }

    let closing = opening + movements.net();

    StockReportRow {
        item_id: item.id,
        name: item.name.clone(),
        hotel_id: item.hotel_id,
        hotel_name: index.hotel_name(item.hotel_id),
        department_id: item.department_id,
        department_name: index.department_name(item.department_id),
        opening_balance: opening,
        movements,
        closing_balance: closing,
        min_reorder_qty: item.min_stock,
        shortage: item.shortage_at(closing),
        damage_details,
        return_details,
        transfer_details,
    }
}

/// Per-day report: one row per calendar day of `window`, each day's closing
/// carried forward as the next day's opening.
pub fn daily_balances(
    item: &StockItem,
    transactions: &[ItemTransaction],
    window: &ReportWindow,
    index: &LocationIndex,
) -> Vec<DailyBalanceRow> {
    let rows = item_rows(item, transactions);

    let mut buckets: BTreeMap<NaiveDate, MovementTotals> = BTreeMap::new();
    for tx in rows.iter().copied().filter(|t| window.contains(t.created_at)) {
        let (class, _) = class_of(tx, index);
        buckets
            .entry(window.local_date(tx.created_at))
            .or_default()
            .record(tx.kind, class, tx.quantity);
    }

    let mut running = opening_balance(rows.iter().copied(), window.start());
    window
        .days()
        .map(|date| {
            let movements = buckets.get(&date).copied().unwrap_or_default();
            let opening = running;
            running = opening + movements.net();
            DailyBalanceRow {
                date,
                opening_balance: opening,
                movements,
                closing_balance: running,
                shortage: item.shortage_at(running),
            }
        })
        .collect()
}
