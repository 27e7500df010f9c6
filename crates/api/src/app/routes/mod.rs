use axum::{routing::get, Router};

pub mod items;
pub mod reports;
pub mod system;

/// Router for all actor-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/items", items::router())
        .nest("/reports", reports::router())
}
