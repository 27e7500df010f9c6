//! Read side: reports replayed from the transaction log.

use std::collections::HashSet;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use hotelstock_core::{DepartmentId, HotelId, ItemId};
use hotelstock_ledger::{
    daily_balances, stock_report_row, DailyBalanceRow, ItemTransaction, LocationIndex, ReportWindow, StockItem,
    StockReportRow,
};

use crate::directory::Directory;
use crate::error::LedgerError;
use crate::store::{ItemFilter, LedgerStore};

/// Which items a stock report covers. Empty scope means every active item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportScope {
    pub hotel_id: Option<HotelId>,
    pub department_id: Option<DepartmentId>,
    pub item_id: Option<ItemId>,
}

impl From<ReportScope> for ItemFilter {
    fn from(scope: ReportScope) -> Self {
        ItemFilter {
            hotel_id: scope.hotel_id,
            department_id: scope.department_id,
            item_id: scope.item_id,
            search: None,
            include_inactive: false,
        }
    }
}

pub struct LedgerReconstructionService<S, D> {
    store: S,
    directory: D,
    offset: FixedOffset,
    max_item_report_days: u64,
}

impl<S, D> LedgerReconstructionService<S, D>
where
    S: LedgerStore,
    D: Directory,
{
    pub fn new(store: S, directory: D, offset: FixedOffset, max_item_report_days: u64) -> Self {
        Self {
            store,
            directory,
            offset,
            max_item_report_days,
        }
    }

    /// Parse request bounds into a window in the configured report timezone.
    pub fn window(&self, from: Option<&str>, to: Option<&str>) -> Result<ReportWindow, LedgerError> {
        Ok(ReportWindow::parse(from, to, self.offset)?)
    }

    /// Lookup tables for the items in scope and every item their transfer
    /// legs point at but the snapshot does not cover.
    async fn index_for(&self, items: &[StockItem], rows: &[ItemTransaction]) -> Result<LocationIndex, LedgerError> {
        let mut index = LocationIndex::new();
        for item in items {
            index.insert_item(item);
        }

        let known: HashSet<ItemId> = items.iter().map(|i| i.id).collect();
        let missing: Vec<ItemId> = rows
            .iter()
            .filter(|t| t.kind.is_transfer() && t.transfer.is_none())
            .filter_map(|t| t.related_id)
            .filter(|id| !known.contains(id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        for item in self.store.items_by_ids(&missing).await? {
            index.insert_item(&item);
        }

        for hotel in self.directory.hotels().await? {
            index.insert_hotel(hotel.id, hotel.name);
        }
        for department in self.directory.departments().await? {
            index.insert_department(department.id, department.name);
        }
        Ok(index)
    }

    /// Aggregate report: one row per active item in scope. No match is an empty report.
    #[instrument(skip(self), fields(from = %window.from_date(), to = %window.to_date()), err)]
    pub async fn stock_report(
        &self,
        scope: ReportScope,
        window: &ReportWindow,
    ) -> Result<Vec<StockReportRow>, LedgerError> {
        let items = self.store.list_items(&scope.into()).await?;
        if items.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<ItemId> = items.iter().map(|i| i.id).collect();
        let rows = self.store.transactions_for(&ids, window.end_exclusive()).await?;
        let index = self.index_for(&items, &rows).await?;

        let report: Vec<StockReportRow> = items
            .iter()
            .map(|item| stock_report_row(item, &rows, window, &index))
            .collect();

        for row in report.iter().filter(|r| r.movements.unclassified() > 0) {
            warn!(
                item_id = %row.item_id,
                unclassified_in = row.movements.transfer_unclassified_in,
                unclassified_out = row.movements.transfer_unclassified_out,
                "transfer legs with an unresolvable counterpart"
            );
        }
        Ok(report)
    }

    /// Per-day report for one item.
    #[instrument(skip(self), fields(item_id = %item_id, from = %window.from_date(), to = %window.to_date()), err)]
    pub async fn item_report(
        &self,
        item_id: ItemId,
        window: &ReportWindow,
    ) -> Result<Vec<DailyBalanceRow>, LedgerError> {
        if window.day_count() > self.max_item_report_days {
            return Err(LedgerError::Validation(format!(
                "item report covers {} days; at most {} are allowed",
                window.day_count(),
                self.max_item_report_days
            )));
        }

        let item = self
            .store
            .find_item(item_id)
            .await?
            .filter(|i| i.active)
            .ok_or_else(|| LedgerError::not_found(format!("item {item_id}")))?;

        let rows = self.store.transactions_for(&[item.id], window.end_exclusive()).await?;
        let index = self.index_for(std::slice::from_ref(&item), &rows).await?;
        let days = daily_balances(&item, &rows, window, &index);

        let unclassified: i64 = days.iter().map(|d| d.movements.unclassified()).sum();
        if unclassified > 0 {
            warn!(item_id = %item.id, unclassified, "transfer legs with an unresolvable counterpart");
        }
        Ok(days)
    }
}
