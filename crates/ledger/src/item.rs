use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotelstock_core::{AggregateRoot, DepartmentId, DomainError, DomainResult, HotelId, ItemId};

/// Identity of a stock location: one item name held by one department of one hotel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationKey {
    pub name: String,
    pub hotel_id: HotelId,
    pub department_id: DepartmentId,
}

impl LocationKey {
    pub fn new(name: impl Into<String>, hotel_id: HotelId, department_id: DepartmentId) -> DomainResult<Self> {
        let name = normalize_name(name.into())?;
        Ok(Self {
            name,
            hotel_id,
            department_id,
        })
    }
}

fn normalize_name(name: String) -> DomainResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("item name cannot be empty"));
    }
    Ok(trimmed.to_string())
}

/// Reject zero and negative quantities before anything else is looked at.
pub fn ensure_positive_quantity(quantity: i64) -> DomainResult<i64> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "quantity must be a positive integer (got {quantity})"
        )));
    }
    Ok(quantity)
}

fn ensure_min_stock(min_stock: i64) -> DomainResult<i64> {
    if min_stock < 0 {
        return Err(DomainError::validation(format!(
            "minStock cannot be negative (got {min_stock})"
        )));
    }
    Ok(min_stock)
}

/// Descriptive fields carried by a stock location besides its balance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDetails {
    pub min_stock: Option<i64>,
    pub category: Option<String>,
    pub unit: Option<String>,
}

/// Aggregate root: the stock location record.
///
/// Holds the current balance for one [`LocationKey`]. The balance only moves
/// through [`StockItem::receive`] and [`StockItem::release`], each of which
/// returns the next state with `version + 1`; the caller commits that state
/// together with the matching ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockItem {
    pub id: ItemId,
    pub name: String,
    pub hotel_id: HotelId,
    pub department_id: DepartmentId,
    pub current_stock: i64,
    pub min_stock: i64,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub active: bool,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    /// A brand-new, empty location record. Version 0 means "never committed";
    /// the first balance change brings it to version 1.
    pub fn open(key: LocationKey, details: &ItemDetails, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        let min_stock = ensure_min_stock(details.min_stock.unwrap_or(0))?;
        Ok(Self {
            id: ItemId::new(),
            name: key.name,
            hotel_id: key.hotel_id,
            department_id: key.department_id,
            current_stock: 0,
            min_stock,
            category: details.category.clone(),
            unit: details.unit.clone(),
            active: true,
            version: 0,
            created_at: occurred_at,
            updated_at: occurred_at,
        })
    }

    pub fn key(&self) -> LocationKey {
        LocationKey {
            name: self.name.clone(),
            hotel_id: self.hotel_id,
            department_id: self.department_id,
        }
    }

    /// Shortage against the reorder level for a given balance.
    pub fn shortage_at(&self, balance: i64) -> i64 {
        (self.min_stock - balance).max(0)
    }

    pub fn needs_reorder(&self) -> bool {
        self.current_stock < self.min_stock
    }

    fn next(&self, occurred_at: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.version = self.version + 1;
        next.updated_at = occurred_at.max(self.updated_at);
        next
    }

    /// Increment the balance. Receiving stock reactivates a deactivated location.
    pub fn receive(&self, quantity: i64, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        let quantity = ensure_positive_quantity(quantity)?;
        let mut next = self.next(occurred_at);
        next.current_stock = self
            .current_stock
            .checked_add(quantity)
            .ok_or_else(|| DomainError::validation("quantity overflows the stock balance"))?;
        next.active = true;
        Ok(next)
    }

    /// Decrement the balance; never below zero.
    pub fn release(&self, quantity: i64, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        let quantity = ensure_positive_quantity(quantity)?;
        if !self.active {
            return Err(DomainError::validation(format!("item {} is inactive", self.id)));
        }
        if self.current_stock < quantity {
            return Err(DomainError::insufficient_stock(quantity, self.current_stock));
        }
        let mut next = self.next(occurred_at);
        next.current_stock = self.current_stock - quantity;
        Ok(next)
    }

    /// Receive stock and refresh whichever details the caller supplied, as one write.
    pub fn restock(&self, quantity: i64, details: &ItemDetails, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        let mut next = self.receive(quantity, occurred_at)?;
        next.apply_details(details)?;
        Ok(next)
    }

    /// Apply descriptive changes (never the balance).
    pub fn with_details(&self, details: &ItemDetails, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        let mut next = self.next(occurred_at);
        next.apply_details(details)?;
        Ok(next)
    }

    fn apply_details(&mut self, details: &ItemDetails) -> DomainResult<()> {
        if let Some(min_stock) = details.min_stock {
            self.min_stock = ensure_min_stock(min_stock)?;
        }
        if details.category.is_some() {
            self.category = details.category.clone();
        }
        if details.unit.is_some() {
            self.unit = details.unit.clone();
        }
        Ok(())
    }

    /// Soft delete: the record and its ledger history stay, reports skip it.
    pub fn deactivate(&self, occurred_at: DateTime<Utc>) -> DomainResult<Self> {
        if !self.active {
            return Err(DomainError::conflict(format!("item {} is already inactive", self.id)));
        }
        let mut next = self.next(occurred_at);
        next.active = false;
        Ok(next)
    }
}

impl AggregateRoot for StockItem {
    type Id = ItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
