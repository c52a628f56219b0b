use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use craneledger_accounting::PostedJournal;
use craneledger_core::{DomainError, EntityId, JournalEntryId};

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/:entityId/journals", post(post_journal_entry).get(list_by_source_reference))
        .route("/:entityId/journals/:id", get(get_journal_entry))
        .route("/:entityId/journals/:id/reverse", post(reverse_journal_entry))
        .route("/:entityId/journals/:id/reversals", get(list_reversals))
}

pub async fn post_journal_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    body: Result<Json<dto::PostJournalRequest>, JsonRejection>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let body = errors::json_body(body)?;
    let posted = services
        .ledger
        .post_journal_entry(body.into_request(entity_id))
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(posted)).into_response())
}

/// Entries carrying `?sourceReference=`; upstream systems use this to dedupe.
pub async fn list_by_source_reference(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    Query(query): Query<dto::JournalQuery>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let Some(reference) = query.source_reference else {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "sourceReference query parameter is required",
        ));
    };
    services
        .ledger
        .get_entity(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    let entries = services
        .ledger
        .journals_by_source_reference(entity_id, &reference)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(entries).into_response())
}

pub async fn get_journal_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, id)): Path<(String, String)>,
) -> ApiResult {
    let posted = load_owned(&services, &entity_id, &id).await?;
    Ok(Json(posted).into_response())
}

pub async fn reverse_journal_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, id)): Path<(String, String)>,
    body: Result<Json<dto::ReverseJournalRequest>, JsonRejection>,
) -> ApiResult {
    let original = load_owned(&services, &entity_id, &id).await?;
    let body = errors::json_body(body)?;
    let reversal = services
        .ledger
        .reverse_journal_entry(original.entry.id, body.date, &body.reason, body.created_by_user_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(reversal)).into_response())
}

pub async fn list_reversals(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, id)): Path<(String, String)>,
) -> ApiResult {
    let original = load_owned(&services, &entity_id, &id).await?;
    let reversals = services
        .ledger
        .reversals_of(original.entry.id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(reversals).into_response())
}

/// An entry addressed under another entity's path is reported as missing.
async fn load_owned(
    services: &AppServices,
    entity_id: &str,
    id: &str,
) -> Result<PostedJournal, axum::response::Response> {
    let entity_id: EntityId = errors::parse_id(entity_id)?;
    let id: JournalEntryId = errors::parse_id(id)?;
    let posted = services
        .ledger
        .get_journal_entry(id)
        .await
        .map_err(|e| services.error_response(e))?;
    if posted.entry.entity_id != entity_id {
        return Err(services.error_response(DomainError::not_found("Journal entry").into()));
    }
    Ok(posted)
}
