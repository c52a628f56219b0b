use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use craneledger_core::{DomainError, EntityId, InvoiceId};
use craneledger_infra::workflows::RecordPayment;
use craneledger_invoicing::Invoice;

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/:entityId/invoices", get(list_invoices).post(create_invoice))
        .route("/:entityId/invoices/:id", get(get_invoice))
        .route("/:entityId/invoices/:id/post", post(post_invoice))
        .route("/:entityId/invoices/:id/payments", post(record_payment))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    body: Result<Json<dto::CreateInvoiceRequest>, JsonRejection>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let body = errors::json_body(body)?;
    let invoice = services
        .invoices
        .create_invoice(body.into_new_invoice(entity_id))
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(invoice)).into_response())
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    services
        .ledger
        .get_entity(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    let invoices = services
        .invoices
        .list_invoices(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(invoices).into_response())
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, id)): Path<(String, String)>,
) -> ApiResult {
    let invoice = load_owned(&services, &entity_id, &id).await?;
    Ok(Json(invoice).into_response())
}

pub async fn post_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, id)): Path<(String, String)>,
    body: Result<Json<dto::PostInvoiceRequest>, JsonRejection>,
) -> ApiResult {
    let invoice = load_owned(&services, &entity_id, &id).await?;
    let body = errors::json_body(body)?;
    let (invoice, journal) = services
        .invoices
        .post_invoice(
            invoice.id,
            body.receivable_account_id,
            body.revenue_account_id,
            body.tax_liability_account_id,
        )
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(serde_json::json!({ "invoice": invoice, "journal": journal })).into_response())
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, id)): Path<(String, String)>,
    body: Result<Json<RecordPayment>, JsonRejection>,
) -> ApiResult {
    let invoice = load_owned(&services, &entity_id, &id).await?;
    let body = errors::json_body(body)?;
    let receipt = services
        .invoices
        .record_payment(invoice.id, body)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(receipt)).into_response())
}

async fn load_owned(
    services: &AppServices,
    entity_id: &str,
    id: &str,
) -> Result<Invoice, axum::response::Response> {
    let entity_id: EntityId = errors::parse_id(entity_id)?;
    let id: InvoiceId = errors::parse_id(id)?;
    let invoice = services
        .invoices
        .get_invoice(id)
        .await
        .map_err(|e| services.error_response(e))?;
    if invoice.entity_id != entity_id {
        return Err(services.error_response(DomainError::not_found("Invoice").into()));
    }
    Ok(invoice)
}
