use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use craneledger_core::{BillId, DomainError, EntityId};
use craneledger_infra::workflows::RecordBillPayment;
use craneledger_invoicing::Bill;

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/:entityId/bills", get(list_bills).post(create_bill))
        .route("/:entityId/bills/:id", get(get_bill))
        .route("/:entityId/bills/:id/post", post(post_bill))
        .route("/:entityId/bills/:id/payments", post(record_payment))
}

pub async fn create_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    body: Result<Json<dto::CreateBillRequest>, JsonRejection>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let body = errors::json_body(body)?;
    let bill = services
        .bills
        .create_bill(body.into_new_bill(entity_id))
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(bill)).into_response())
}

pub async fn list_bills(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    services
        .ledger
        .get_entity(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    let bills = services
        .bills
        .list_bills(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(bills).into_response())
}

pub async fn get_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, id)): Path<(String, String)>,
) -> ApiResult {
    let bill = load_owned(&services, &entity_id, &id).await?;
    Ok(Json(bill).into_response())
}

/// DR expense and GST paid, CR accounts payable.
pub async fn post_bill(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, id)): Path<(String, String)>,
    body: Result<Json<dto::PostBillRequest>, JsonRejection>,
) -> ApiResult {
    let bill = load_owned(&services, &entity_id, &id).await?;
    let body = errors::json_body(body)?;
    let (bill, journal) = services
        .bills
        .post_bill(
            bill.id,
            body.payable_account_id,
            body.expense_account_id,
            body.tax_asset_account_id,
        )
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(serde_json::json!({ "bill": bill, "journal": journal })).into_response())
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, id)): Path<(String, String)>,
    body: Result<Json<RecordBillPayment>, JsonRejection>,
) -> ApiResult {
    let bill = load_owned(&services, &entity_id, &id).await?;
    let body = errors::json_body(body)?;
    let receipt = services
        .bills
        .record_payment(bill.id, body)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

async fn load_owned(
    services: &AppServices,
    entity_id: &str,
    id: &str,
) -> Result<Bill, axum::response::Response> {
    let entity_id: EntityId = errors::parse_id(entity_id)?;
    let id: BillId = errors::parse_id(id)?;
    let bill = services
        .bills
        .get_bill(id)
        .await
        .map_err(|e| services.error_response(e))?;
    if bill.entity_id != entity_id {
        return Err(services.error_response(DomainError::not_found("Bill").into()));
    }
    Ok(bill)
}
