use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use crate::app::errors;

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "service": "CraneLedger",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn not_found(uri: Uri) -> axum::response::Response {
    errors::json_error(
        StatusCode::NOT_FOUND,
        "not_found",
        format!("Route {} not found", uri.path()),
    )
}
