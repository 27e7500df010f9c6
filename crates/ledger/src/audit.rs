//! Consistency checks over a stored ledger.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use hotelstock_core::{ItemId, TransactionId, TransferId};

use crate::item::StockItem;
use crate::transaction::{ItemTransaction, TransactionKind};

/// A location whose stored balance disagrees with the signed sum of its log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceDrift {
    pub item_id: ItemId,
    pub name: String,
    pub stored: i64,
    pub derived: i64,
}

/// Compare every item's `current_stock` with its replayed log.
pub fn balance_drift<'a>(
    items: impl IntoIterator<Item = &'a StockItem>,
    transactions: &[ItemTransaction],
) -> Vec<BalanceDrift> {
    let mut derived: HashMap<ItemId, i64> = HashMap::new();
    for tx in transactions {
        *derived.entry(tx.item_id).or_default() += tx.signed_quantity();
    }

    let mut drift: Vec<BalanceDrift> = items
        .into_iter()
        .filter_map(|item| {
            let sum = derived.get(&item.id).copied().unwrap_or(0);
            (sum != item.current_stock).then(|| BalanceDrift {
                item_id: item.id,
                name: item.name.clone(),
                stored: item.current_stock,
                derived: sum,
            })
        })
        .collect();
    drift.sort_by_key(|d| d.item_id);
    drift
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PairingViolation {
    /// A transfer with only one of its two legs in the log.
    Unmatched {
        transfer_id: TransferId,
        transaction_id: TransactionId,
    },
    /// Both legs exist but move different quantities.
    QuantityMismatch {
        transfer_id: TransferId,
        out_quantity: i64,
        in_quantity: i64,
    },
    /// The legs' `related_id`s do not point at each other's items.
    NotReciprocal { transfer_id: TransferId },
    /// More than one OUT or IN leg for the same transfer.
    Duplicate { transfer_id: TransferId, legs: usize },
    /// A transfer leg with no transfer link (legacy rows).
    Unlinked { transaction_id: TransactionId },
}

/// Check that every transfer in the log is exactly one OUT and one IN leg of
/// equal quantity whose `related_id`s reference each other.
pub fn transfer_pairing_violations(transactions: &[ItemTransaction]) -> Vec<PairingViolation> {
    let mut violations = Vec::new();
    let mut by_transfer: BTreeMap<TransferId, Vec<&ItemTransaction>> = BTreeMap::new();

    for tx in transactions.iter().filter(|t| t.kind.is_transfer()) {
        match tx.transfer {
            Some(link) => by_transfer.entry(link.transfer_id).or_default().push(tx),
            None => violations.push(PairingViolation::Unlinked { transaction_id: tx.id }),
        }
    }

    for (transfer_id, legs) in by_transfer {
        let outs: Vec<_> = legs.iter().filter(|t| t.kind == TransactionKind::TransferOut).collect();
        let ins: Vec<_> = legs.iter().filter(|t| t.kind == TransactionKind::TransferIn).collect();

        match (outs.as_slice(), ins.as_slice()) {
            ([out], [inn]) => {
                if out.quantity != inn.quantity {
                    violations.push(PairingViolation::QuantityMismatch {
                        transfer_id,
                        out_quantity: out.quantity,
                        in_quantity: inn.quantity,
                    });
                }
                if out.related_id != Some(inn.item_id) || inn.related_id != Some(out.item_id) {
                    violations.push(PairingViolation::NotReciprocal { transfer_id });
                }
            }
            ([only], []) | ([], [only]) => violations.push(PairingViolation::Unmatched {
                transfer_id,
                transaction_id: only.id,
            }),
            _ => violations.push(PairingViolation::Duplicate {
                transfer_id,
                legs: legs.len(),
            }),
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{AddStock, TransferStock};
    use crate::item::ItemDetails;
    use crate::transaction::Actor;
    use chrono::Utc;
    use hotelstock_core::{DepartmentId, HotelId};

    fn seeded() -> (Vec<StockItem>, Vec<ItemTransaction>) {
        let now = Utc::now();
        let add = AddStock {
            name: "Towels".into(),
            hotel_id: HotelId::new(),
            department_id: DepartmentId::new(),
            quantity: 12,
            details: ItemDetails::default(),
            actor: Actor::system(),
            occurred_at: now,
        };
        let commit = add.decide(None).unwrap();
        let source = commit.writes[0].item.clone();
        let mut log = commit.transactions;

        let transfer = TransferStock {
            item_id: source.id,
            to_hotel_id: None,
            to_department_id: Some(DepartmentId::new()),
            quantity: 5,
            remarks: None,
            actor: Actor::system(),
            occurred_at: now,
        };
        let decision = transfer.decide(&source, None).unwrap();
        log.extend(decision.commit.transactions);
        (vec![decision.source, decision.destination], log)
    }

    #[test]
    fn consistent_ledger_has_no_findings() {
        let (items, log) = seeded();
        assert!(balance_drift(&items, &log).is_empty());
        assert!(transfer_pairing_violations(&log).is_empty());
    }

    #[test]
    fn drift_reports_stored_and_derived() {
        let (mut items, log) = seeded();
        items[0].current_stock += 3;
        let drift = balance_drift(&items, &log);
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].stored, 10);
        assert_eq!(drift[0].derived, 7);
    }

    #[test]
    fn missing_leg_is_unmatched() {
        let (_, mut log) = seeded();
        let removed = log.pop().unwrap();
        let violations = transfer_pairing_violations(&log);
        assert_eq!(violations.len(), 1);
        assert!(matches!(
            violations[0],
            PairingViolation::Unmatched { transfer_id, .. } if Some(transfer_id) == removed.transfer.map(|l| l.transfer_id)
        ));
    }

    #[test]
    fn tampered_legs_are_reported() {
        let (_, mut log) = seeded();
        log[2].quantity = 4;
        log[2].related_id = Some(ItemId::new());
        let violations = transfer_pairing_violations(&log);
        assert!(violations.iter().any(|v| matches!(v, PairingViolation::QuantityMismatch { out_quantity: 5, in_quantity: 4, .. })));
        assert!(violations.iter().any(|v| matches!(v, PairingViolation::NotReciprocal { .. })));

        let mut legacy = log[1].clone();
        legacy.transfer = None;
        log.push(legacy.clone());
        log.push(log[1].clone());
        let violations = transfer_pairing_violations(&log);
        assert!(violations.contains(&PairingViolation::Unlinked { transaction_id: legacy.id }));
        assert!(violations.iter().any(|v| matches!(v, PairingViolation::Duplicate { legs: 3, .. })));
    }
}
