use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use hotelstock_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        LedgerError::NotFound(_) => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        LedgerError::InsufficientStock { requested, available } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": err.to_string(),
                "requested": requested,
                "available": available,
            })),
        )
            .into_response(),
        LedgerError::ReferenceNotFound(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "reference_not_found", msg)
        }
        LedgerError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        LedgerError::ConcurrencyConflict(_) => {
            json_error(StatusCode::CONFLICT, "concurrency_conflict", err.to_string())
        }
        LedgerError::Database(msg) => {
            tracing::error!(error = %msg, "ledger storage failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "database_error", "internal storage error")
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

/// Unreadable or incomplete bodies are validation errors, not axum's plain-text 422.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(value)| value)
        .map_err(|rejection| json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text()))
}

pub fn parse_id<T: FromStr>(field: &str, raw: &str) -> Result<T, axum::response::Response> {
    raw.trim()
        .parse()
        .map_err(|_| json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("{field} is not a valid id")))
}

/// Blank or absent values mean "not filtered".
pub fn parse_optional_id<T: FromStr>(field: &str, raw: Option<&str>) -> Result<Option<T>, axum::response::Response> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(value) => parse_id(field, value).map(Some),
        None => Ok(None),
    }
}
