//! Hotel stock ledger domain.
//!
//! Location records, the append-only transaction log, the commands that
//! mutate both in lockstep, and the pure reconstruction of reports from the
//! log. No IO, no HTTP, no storage: the infra crate owns those.

pub mod audit;
pub mod command;
pub mod item;
pub mod reconstruct;
pub mod report;
pub mod transaction;
pub mod transfer;
pub mod window;

pub use audit::{balance_drift, transfer_pairing_violations, BalanceDrift, PairingViolation};
pub use command::{
    AddStock, DeactivateItem, ItemWrite, LedgerCommit, MarkDamage, ReturnToVendor, TransferDecision,
    TransferStock, UpdateItem,
};
pub use item::{ensure_positive_quantity, ItemDetails, LocationKey, StockItem};
pub use reconstruct::{
    classify_transfer, daily_balances, opening_balance, resolve_counterpart, stock_report_row, LocationIndex,
};
pub use report::{DailyBalanceRow, MovementDetail, MovementTotals, StockReportRow, TransferClass, TransferDetail};
pub use transaction::{net_quantity, Actor, Counterpart, ItemTransaction, TransactionKind, TransferLink};
pub use transfer::Transfer;
pub use window::ReportWindow;
