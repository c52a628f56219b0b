use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};

use craneledger_core::{AccountId, DomainError, EntityId};

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_entities).post(create_entity))
        .route("/:entityId", get(get_entity))
        .route("/:entityId/accounts", get(list_accounts).post(create_account))
        .route("/:entityId/accounts/:accountId", patch(set_account_active))
        .route("/:entityId/tax-codes", get(list_tax_codes).post(create_tax_code))
        .route("/:entityId/contacts", get(list_contacts).post(create_contact))
        .route("/:entityId/bookings", get(list_bookings))
}

pub async fn create_entity(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateEntityRequest>, JsonRejection>,
) -> ApiResult {
    let body = errors::json_body(body)?;
    let entity = services
        .ledger
        .create_entity(&body.name, body.legal_identifier, body.currency_code.as_deref())
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(entity)).into_response())
}

pub async fn list_entities(Extension(services): Extension<Arc<AppServices>>) -> ApiResult {
    let entities = services
        .ledger
        .list_entities()
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(entities).into_response())
}

pub async fn get_entity(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let entity = services
        .ledger
        .get_entity(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(entity).into_response())
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    body: Result<Json<dto::CreateAccountRequest>, JsonRejection>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let body = errors::json_body(body)?;
    let account = services
        .ledger
        .create_account(body.into_new_account(entity_id))
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(account)).into_response())
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let accounts = services
        .ledger
        .list_accounts(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(accounts).into_response())
}

pub async fn set_account_active(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, account_id)): Path<(String, String)>,
    body: Result<Json<dto::SetAccountActiveRequest>, JsonRejection>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let account_id: AccountId = errors::parse_id(&account_id)?;
    let body = errors::json_body(body)?;

    let account = services
        .ledger
        .get_account(account_id)
        .await
        .map_err(|e| services.error_response(e))?;
    if account.entity_id != entity_id {
        return Err(services.error_response(DomainError::not_found("Account").into()));
    }

    let account = services
        .ledger
        .set_account_active(account_id, body.is_active)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(account).into_response())
}

pub async fn create_tax_code(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    body: Result<Json<dto::CreateTaxCodeRequest>, JsonRejection>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let body = errors::json_body(body)?;
    let tax_code = services
        .ledger
        .create_tax_code(entity_id, &body.name, body.rate)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(tax_code)).into_response())
}

pub async fn list_tax_codes(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let tax_codes = services
        .ledger
        .list_tax_codes(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(tax_codes).into_response())
}

pub async fn create_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    body: Result<Json<dto::CreateContactRequest>, JsonRejection>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let body = errors::json_body(body)?;
    let contact = services
        .contacts
        .create_contact(entity_id, body.contact_type, &body.name, body.email, body.external_ref)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(contact)).into_response())
}

pub async fn list_contacts(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    services
        .ledger
        .get_entity(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    let contacts = services
        .contacts
        .list_contacts(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(contacts).into_response())
}

pub async fn list_bookings(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    services
        .ledger
        .get_entity(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    let bookings = services
        .bookings
        .list_bookings(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(bookings).into_response())
}
