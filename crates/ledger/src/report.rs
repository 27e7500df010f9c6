//! Derived (never persisted) report rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use hotelstock_core::{DepartmentId, HotelId, ItemId};

use crate::transaction::TransactionKind;

/// How a transfer leg was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferClass {
    InterDepartment,
    InterHotel,
    /// The counterpart location could not be resolved (legacy or corrupt rows).
    Unclassified,
}

/// Categorized movement totals over some span of the log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementTotals {
    pub added: i64,
    pub returned_to_vendor: i64,
    pub damages: i64,
    pub transfer_inter_dept_in: i64,
    pub transfer_inter_dept_out: i64,
    pub transfer_inter_hotel_in: i64,
    pub transfer_inter_hotel_out: i64,
    pub transfer_unclassified_in: i64,
    pub transfer_unclassified_out: i64,
}

impl MovementTotals {
    /// Add one row's quantity to the right bucket. `class` is ignored for non-transfers.
    pub fn record(&mut self, kind: TransactionKind, class: TransferClass, quantity: i64) {
        let bucket = match (kind, class) {
            (TransactionKind::Add, _) => &mut self.added,
            (TransactionKind::ReturnVendor, _) => &mut self.returned_to_vendor,
            (TransactionKind::Damage, _) => &mut self.damages,
            (TransactionKind::TransferIn, TransferClass::InterDepartment) => &mut self.transfer_inter_dept_in,
            (TransactionKind::TransferOut, TransferClass::InterDepartment) => &mut self.transfer_inter_dept_out,
            (TransactionKind::TransferIn, TransferClass::InterHotel) => &mut self.transfer_inter_hotel_in,
            (TransactionKind::TransferOut, TransferClass::InterHotel) => &mut self.transfer_inter_hotel_out,
            (TransactionKind::TransferIn, TransferClass::Unclassified) => &mut self.transfer_unclassified_in,
            (TransactionKind::TransferOut, TransferClass::Unclassified) => &mut self.transfer_unclassified_out,
        };
        *bucket += quantity;
    }

    /// Signed net movement: what closing minus opening must equal.
    pub fn net(&self) -> i64 {
        self.added - self.returned_to_vendor - self.damages
            + self.transfer_inter_dept_in
            - self.transfer_inter_dept_out
            + self.transfer_inter_hotel_in
            - self.transfer_inter_hotel_out
            + self.transfer_unclassified_in
            - self.transfer_unclassified_out
    }

    pub fn unclassified(&self) -> i64 {
        self.transfer_unclassified_in + self.transfer_unclassified_out
    }
}

/// One damage or vendor-return row, for drill-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovementDetail {
    pub date: DateTime<Utc>,
    pub quantity: i64,
    pub remarks: Option<String>,
    pub created_by: String,
}

/// One transfer leg with both ends resolved to display names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferDetail {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub classification: TransferClass,
    pub quantity: i64,
    pub date: DateTime<Utc>,
    pub remarks: Option<String>,
    pub counterpart_item_id: Option<ItemId>,
    pub from_hotel_name: Option<String>,
    pub from_dept_name: Option<String>,
    pub to_hotel_name: Option<String>,
    pub to_dept_name: Option<String>,
}

/// Per-item result of the aggregate stock report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReportRow {
    pub item_id: ItemId,
    pub name: String,
    pub hotel_id: HotelId,
    pub hotel_name: Option<String>,
    pub department_id: DepartmentId,
    pub department_name: Option<String>,
    pub opening_balance: i64,
    #[serde(flatten)]
    pub movements: MovementTotals,
    pub closing_balance: i64,
    pub min_reorder_qty: i64,
    pub shortage: i64,
    pub damage_details: Vec<MovementDetail>,
    pub return_details: Vec<MovementDetail>,
    pub transfer_details: Vec<TransferDetail>,
}

/// One calendar day of the per-item report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyBalanceRow {
    pub date: NaiveDate,
    pub opening_balance: i64,
    #[serde(flatten)]
    pub movements: MovementTotals,
    pub closing_balance: i64,
    pub shortage: i64,
}
