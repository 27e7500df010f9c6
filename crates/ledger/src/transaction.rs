use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotelstock_core::{DepartmentId, Entity, HotelId, ItemId, TransactionId, TransferId, ValueObject};

use crate::item::StockItem;

/// Kind of a stock-affecting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Add,
    Damage,
    ReturnVendor,
    TransferIn,
    TransferOut,
}

impl TransactionKind {
    /// +1 for kinds that increase the balance, -1 for kinds that decrease it.
    pub fn sign(self) -> i64 {
        match self {
            TransactionKind::Add | TransactionKind::TransferIn => 1,
            TransactionKind::Damage | TransactionKind::ReturnVendor | TransactionKind::TransferOut => -1,
        }
    }

    pub fn is_transfer(self) -> bool {
        matches!(self, TransactionKind::TransferIn | TransactionKind::TransferOut)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Add => "ADD",
            TransactionKind::Damage => "DAMAGE",
            TransactionKind::ReturnVendor => "RETURN_VENDOR",
            TransactionKind::TransferIn => "TRANSFER_IN",
            TransactionKind::TransferOut => "TRANSFER_OUT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADD" => Some(TransactionKind::Add),
            "DAMAGE" => Some(TransactionKind::Damage),
            "RETURN_VENDOR" => Some(TransactionKind::ReturnVendor),
            "TRANSFER_IN" => Some(TransactionKind::TransferIn),
            "TRANSFER_OUT" => Some(TransactionKind::TransferOut),
            _ => None,
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity attached to every mutation for audit attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub username: String,
    pub role: String,
}

impl Actor {
    pub fn new(username: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            role: role.into(),
        }
    }

    pub fn system() -> Self {
        Self::new("system", "SYSTEM")
    }
}

/// Where the other half of a transfer lives, captured when the transfer is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Counterpart {
    pub item_id: ItemId,
    pub hotel_id: HotelId,
    pub department_id: DepartmentId,
}

impl ValueObject for Counterpart {}

impl Counterpart {
    pub fn of(item: &StockItem) -> Self {
        Self {
            item_id: item.id,
            hotel_id: item.hotel_id,
            department_id: item.department_id,
        }
    }
}

/// Link from a transfer leg to its transfer aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferLink {
    pub transfer_id: TransferId,
    pub counterpart: Counterpart,
}

/// One immutable ledger row.
///
/// `hotel_id` / `department_id` are copied from the item at write time.
/// `related_id` points at the item holding the paired transfer leg; rows written
/// before transfers were linked may carry only that pointer and no [`TransferLink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemTransaction {
    pub id: TransactionId,
    pub item_id: ItemId,
    pub hotel_id: HotelId,
    pub department_id: DepartmentId,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub quantity: i64,
    pub remarks: Option<String>,
    pub related_id: Option<ItemId>,
    pub transfer: Option<TransferLink>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl ItemTransaction {
    /// A non-transfer movement (ADD / DAMAGE / RETURN_VENDOR) against `item`.
    pub fn movement(
        item: &StockItem,
        kind: TransactionKind,
        quantity: i64,
        remarks: Option<String>,
        actor: &Actor,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            item_id: item.id,
            hotel_id: item.hotel_id,
            department_id: item.department_id,
            kind,
            quantity,
            remarks: clean_remarks(remarks),
            related_id: None,
            transfer: None,
            created_by: actor.username.clone(),
            created_at,
        }
    }

    pub fn signed_quantity(&self) -> i64 {
        self.kind.sign() * self.quantity
    }
}

impl Entity for ItemTransaction {
    type Id = TransactionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

pub(crate) fn clean_remarks(remarks: Option<String>) -> Option<String> {
    remarks
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
}

/// Net signed sum of a set of transactions.
pub fn net_quantity<'a>(transactions: impl IntoIterator<Item = &'a ItemTransaction>) -> i64 {
    transactions.into_iter().map(ItemTransaction::signed_quantity).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_wire_names_are_screaming_snake_case() {
        let json = serde_json::to_string(&TransactionKind::ReturnVendor).unwrap();
        assert_eq!(json, "\"RETURN_VENDOR\"");
        assert_eq!(TransactionKind::parse("TRANSFER_OUT"), Some(TransactionKind::TransferOut));
        assert_eq!(TransactionKind::parse("transfer_out"), None);
    }

    #[test]
    fn signs_follow_stock_direction() {
        assert_eq!(TransactionKind::Add.sign(), 1);
        assert_eq!(TransactionKind::TransferIn.sign(), 1);
        assert_eq!(TransactionKind::Damage.sign(), -1);
        assert_eq!(TransactionKind::ReturnVendor.sign(), -1);
        assert_eq!(TransactionKind::TransferOut.sign(), -1);
    }

    #[test]
    fn blank_remarks_are_dropped() {
        assert_eq!(clean_remarks(Some("  ".into())), None);
        assert_eq!(clean_remarks(Some(" torn bag ".into())), Some("torn bag".into()));
    }
}
