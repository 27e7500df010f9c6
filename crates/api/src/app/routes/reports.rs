use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use hotelstock_infra::ItemFilter;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/stock", get(stock_report))
        .route("/item", get(item_report))
        .route("/reconciliation", get(reconciliation))
}

pub async fn stock_report(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::StockReportQuery>,
) -> axum::response::Response {
    let scope = match query.to_scope() {
        Ok(s) => s,
        Err(res) => return res,
    };
    let window = match services.reports.window(query.from.as_deref(), query.to.as_deref()) {
        Ok(w) => w,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    match services.reports.stock_report(scope, &window).await {
        Ok(rows) => (StatusCode::OK, Json(rows)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn item_report(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ItemReportQuery>,
) -> axum::response::Response {
    let item_id = match query.item_id() {
        Ok(id) => id,
        Err(res) => return res,
    };
    let window = match services.reports.window(query.from.as_deref(), query.to.as_deref()) {
        Ok(w) => w,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    match services.reports.item_report(item_id, &window).await {
        Ok(days) => (StatusCode::OK, Json(days)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

/// Deactivated items are included: their history still has to add up.
pub async fn reconciliation(Extension(services): Extension<Arc<AppServices>>) -> axum::response::Response {
    let filter = ItemFilter {
        include_inactive: true,
        ..ItemFilter::default()
    };
    match services.reconciler.reconcile(&filter).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
