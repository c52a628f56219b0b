use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};

use craneledger_infra::workflows::LoanTransfer;

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/loan-transfer", post(loan_transfer))
        .route("/loan-transfer/compensate", post(compensate))
}

/// 201 with both entries, or 409 with the posted entry id when only the
/// lender leg made it.
pub async fn loan_transfer(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<LoanTransfer>, JsonRejection>,
) -> ApiResult {
    let transfer = errors::json_body(body)?;
    let outcome = services
        .intercompany
        .execute(&transfer)
        .await
        .map_err(|e| errors::transfer_error_to_response(e, services.app_env().is_development()))?;
    Ok((StatusCode::CREATED, Json(outcome)).into_response())
}

pub async fn compensate(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CompensateTransferRequest>, JsonRejection>,
) -> ApiResult {
    let body = errors::json_body(body)?;
    let (state, reversal) = services
        .intercompany
        .compensate(body.posted_entry_id, body.date)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "state": state, "reversal": reversal })),
    )
        .into_response())
}
