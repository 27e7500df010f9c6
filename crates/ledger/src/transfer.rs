use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hotelstock_core::{DomainError, DomainResult, Entity, TransactionId, TransferId};

use crate::item::{ensure_positive_quantity, StockItem};
use crate::transaction::{clean_remarks, Actor, Counterpart, ItemTransaction, TransactionKind, TransferLink};

/// Aggregate: one logical movement of stock between two locations.
///
/// A transfer owns both of its legs. The legs are produced together by
/// [`Transfer::legs`], so a TRANSFER_OUT without its TRANSFER_IN (or with a
/// different quantity) cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    id: TransferId,
    quantity: i64,
    source: Counterpart,
    destination: Counterpart,
    out_leg_id: TransactionId,
    in_leg_id: TransactionId,
    remarks: Option<String>,
    created_by: String,
    occurred_at: DateTime<Utc>,
}

impl Transfer {
    pub fn new(
        source: &StockItem,
        destination: &StockItem,
        quantity: i64,
        remarks: Option<String>,
        actor: &Actor,
        occurred_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let quantity = ensure_positive_quantity(quantity)?;
        if source.id == destination.id || source.key() == destination.key() {
            return Err(DomainError::validation(
                "transfer destination must differ from the source location",
            ));
        }
        if source.name != destination.name {
            return Err(DomainError::invariant(format!(
                "transfer legs must hold the same item (source '{}', destination '{}')",
                source.name, destination.name
            )));
        }

        Ok(Self {
            id: TransferId::new(),
            quantity,
            source: Counterpart::of(source),
            destination: Counterpart::of(destination),
            out_leg_id: TransactionId::new(),
            in_leg_id: TransactionId::new(),
            remarks: clean_remarks(remarks),
            created_by: actor.username.clone(),
            occurred_at,
        })
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn source(&self) -> &Counterpart {
        &self.source
    }

    pub fn destination(&self) -> &Counterpart {
        &self.destination
    }

    pub fn is_inter_hotel(&self) -> bool {
        self.source.hotel_id != self.destination.hotel_id
    }

    /// Both legs: `[TRANSFER_OUT on source, TRANSFER_IN on destination]`.
    pub fn legs(&self) -> [ItemTransaction; 2] {
        [
            self.leg(self.out_leg_id, TransactionKind::TransferOut, self.source, self.destination),
            self.leg(self.in_leg_id, TransactionKind::TransferIn, self.destination, self.source),
        ]
    }

    fn leg(
        &self,
        id: TransactionId,
        kind: TransactionKind,
        own: Counterpart,
        other: Counterpart,
    ) -> ItemTransaction {
        ItemTransaction {
            id,
            item_id: own.item_id,
            hotel_id: own.hotel_id,
            department_id: own.department_id,
            kind,
            quantity: self.quantity,
            remarks: self.remarks.clone(),
            related_id: Some(other.item_id),
            transfer: Some(TransferLink {
                transfer_id: self.id,
                counterpart: other,
            }),
            created_by: self.created_by.clone(),
            created_at: self.occurred_at,
        }
    }
}

impl Entity for Transfer {
    type Id = TransferId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
