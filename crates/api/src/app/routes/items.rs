use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use hotelstock_core::ItemId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(add_stock).get(list_items))
        .route("/reorder", get(reorder_list))
        .route("/damage", post(mark_damage))
        .route("/return", post(return_to_vendor))
        .route("/transfer", post(transfer))
        .route("/:id", get(get_item).put(update_item).delete(deactivate_item))
}

pub async fn add_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::AddStockRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(res) => return res,
    };
    match services.mutations.add_stock(body.into_command(actor.actor())).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn mark_damage(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::ReleaseRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(res) => return res,
    };
    match services.mutations.mark_damage(body.into_damage(actor.actor())).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn return_to_vendor(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::ReleaseRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(res) => return res,
    };
    match services.mutations.return_to_vendor(body.into_return(actor.actor())).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<dto::TransferRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(res) => return res,
    };
    match services.mutations.transfer(body.into_command(actor.actor())).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ItemListQuery>,
) -> axum::response::Response {
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(res) => return res,
    };

    match services.mutations.list_items(&filter).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn reorder_list(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ItemListQuery>,
) -> axum::response::Response {
    let filter = match query.to_filter() {
        Ok(f) => f,
        Err(res) => return res,
    };

    match services.mutations.reorder_list(&filter).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id("item id", &id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.mutations.get_item(item_id).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateItemRequest>, JsonRejection>,
) -> axum::response::Response {
    let body = match errors::json_body(body) {
        Ok(b) => b,
        Err(res) => return res,
    };
    let item_id: ItemId = match errors::parse_id("item id", &id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.mutations.update_item(body.into_command(item_id, actor.actor())).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn deactivate_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match errors::parse_id("item id", &id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .mutations
        .deactivate_item(dto::deactivate_command(item_id, actor.actor()))
        .await
    {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
