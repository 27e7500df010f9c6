use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::context::ActorContext;

pub const ACTOR_USERNAME_HEADER: &str = "x-actor-username";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// Derive the request actor from the headers set by the upstream auth layer.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let username = header_value(req.headers(), ACTOR_USERNAME_HEADER)?;
    let role = header_value(req.headers(), ACTOR_ROLE_HEADER)?;

    let actor = ActorContext::new(username, role);
    req.extensions_mut().insert(actor);

    Ok(next.run(req).await)
}

fn header_value(headers: &HeaderMap, name: &str) -> Result<String, StatusCode> {
    let value = headers
        .get(name)
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_str()
        .map_err(|_| StatusCode::UNAUTHORIZED)?
        .trim();

    if value.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(value.to_string())
}
