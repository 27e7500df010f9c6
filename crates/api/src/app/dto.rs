use chrono::Utc;
use serde::Deserialize;

use hotelstock_core::{DepartmentId, HotelId, ItemId};
use hotelstock_infra::{ItemFilter, ReportScope};
use hotelstock_ledger::{
    Actor, AddStock, DeactivateItem, ItemDetails, MarkDamage, ReturnToVendor, TransferStock, UpdateItem,
};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddStockRequest {
    pub name: String,
    pub hotel_id: HotelId,
    pub department_id: DepartmentId,
    pub quantity: i64,
    pub min_stock: Option<i64>,
    pub category: Option<String>,
    pub unit: Option<String>,
}

impl AddStockRequest {
    pub fn into_command(self, actor: Actor) -> AddStock {
        AddStock {
            name: self.name,
            hotel_id: self.hotel_id,
            department_id: self.department_id,
            quantity: self.quantity,
            details: ItemDetails {
                min_stock: self.min_stock,
                category: self.category,
                unit: self.unit,
            },
            actor,
            occurred_at: Utc::now(),
        }
    }
}

/// Body shared by damage and vendor-return requests.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    pub item_id: ItemId,
    pub quantity: i64,
    pub remarks: Option<String>,
}

impl ReleaseRequest {
    pub fn into_damage(self, actor: Actor) -> MarkDamage {
        MarkDamage {
            item_id: self.item_id,
            quantity: self.quantity,
            remarks: self.remarks,
            actor,
            occurred_at: Utc::now(),
        }
    }

    pub fn into_return(self, actor: Actor) -> ReturnToVendor {
        ReturnToVendor {
            item_id: self.item_id,
            quantity: self.quantity,
            remarks: self.remarks,
            actor,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub item_id: ItemId,
    pub to_hotel_id: Option<HotelId>,
    pub to_department_id: Option<DepartmentId>,
    pub quantity: i64,
    pub remarks: Option<String>,
}

impl TransferRequest {
    pub fn into_command(self, actor: Actor) -> TransferStock {
        TransferStock {
            item_id: self.item_id,
            to_hotel_id: self.to_hotel_id,
            to_department_id: self.to_department_id,
            quantity: self.quantity,
            remarks: self.remarks,
            actor,
            occurred_at: Utc::now(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub min_stock: Option<i64>,
    pub category: Option<String>,
    pub unit: Option<String>,
}

impl UpdateItemRequest {
    pub fn into_command(self, item_id: ItemId, actor: Actor) -> UpdateItem {
        UpdateItem {
            item_id,
            name: self.name,
            details: ItemDetails {
                min_stock: self.min_stock,
                category: self.category,
                unit: self.unit,
            },
            actor,
            occurred_at: Utc::now(),
        }
    }
}

pub fn deactivate_command(item_id: ItemId, actor: Actor) -> DeactivateItem {
    DeactivateItem {
        item_id,
        actor,
        occurred_at: Utc::now(),
    }
}

// -------------------------
// Query strings
// -------------------------
//
// Ids arrive as raw strings so malformed ones get the same JSON error shape
// as every other validation failure.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemListQuery {
    pub hotel_id: Option<String>,
    pub department_id: Option<String>,
    pub search: Option<String>,
}

impl ItemListQuery {
    pub fn to_filter(&self) -> Result<ItemFilter, axum::response::Response> {
        Ok(ItemFilter {
            hotel_id: errors::parse_optional_id("hotelId", self.hotel_id.as_deref())?,
            department_id: errors::parse_optional_id("departmentId", self.department_id.as_deref())?,
            item_id: None,
            search: self.search.clone(),
            include_inactive: false,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockReportQuery {
    pub hotel_id: Option<String>,
    pub department_id: Option<String>,
    pub item_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl StockReportQuery {
    pub fn to_scope(&self) -> Result<ReportScope, axum::response::Response> {
        Ok(ReportScope {
            hotel_id: errors::parse_optional_id("hotelId", self.hotel_id.as_deref())?,
            department_id: errors::parse_optional_id("departmentId", self.department_id.as_deref())?,
            item_id: errors::parse_optional_id("itemId", self.item_id.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReportQuery {
    pub item_id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

impl ItemReportQuery {
    pub fn item_id(&self) -> Result<ItemId, axum::response::Response> {
        errors::parse_optional_id("itemId", self.item_id.as_deref())?.ok_or_else(|| {
            errors::json_error(
                axum::http::StatusCode::BAD_REQUEST,
                "validation_error",
                "itemId is required",
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_stock_request_reads_camel_case() {
        let hotel = HotelId::new();
        let dept = DepartmentId::new();
        let body = serde_json::json!({
            "name": "Rice",
            "hotelId": hotel.to_string(),
            "departmentId": dept.to_string(),
            "quantity": 12,
            "minStock": 4,
        });
        let req: AddStockRequest = serde_json::from_value(body).unwrap();
        let cmd = req.into_command(Actor::new("alice", "STAFF"));
        assert_eq!(cmd.hotel_id, hotel);
        assert_eq!(cmd.department_id, dept);
        assert_eq!(cmd.details.min_stock, Some(4));
        assert_eq!(cmd.details.category, None);
        assert_eq!(cmd.actor.username, "alice");
    }

    #[test]
    fn malformed_scope_id_is_rejected() {
        let query = StockReportQuery {
            hotel_id: Some("not-a-uuid".into()),
            ..StockReportQuery::default()
        };
        let res = query.to_scope().unwrap_err();
        assert_eq!(res.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn blank_scope_ids_mean_no_filter() {
        let query = StockReportQuery {
            hotel_id: Some("  ".into()),
            ..StockReportQuery::default()
        };
        assert_eq!(query.to_scope().unwrap(), ReportScope::default());
    }

    #[test]
    fn item_report_requires_item_id() {
        let res = ItemReportQuery::default().item_id().unwrap_err();
        assert_eq!(res.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
