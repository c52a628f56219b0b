use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;

use craneledger_core::EntityId;

use crate::app::errors::{self, ApiResult};
use crate::app::{dto::ReportQuery, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/:entityId/trial-balance", get(trial_balance))
        .route("/:entityId/pnl", get(profit_and_loss))
        .route("/:entityId/balance-sheet", get(balance_sheet))
        .route("/:entityId/booking-summary", get(booking_summary))
        .route("/:entityId/outstanding-deposits", get(outstanding_deposits))
        .route("/:entityId/upcoming-payouts", get(upcoming_payouts))
        .route("/:entityId/margin-report", get(margin_report))
}

fn as_of(query: &ReportQuery) -> Result<NaiveDate, axum::response::Response> {
    match query.as_of.as_deref() {
        Some(raw) => errors::parse_date("asOf", raw),
        None => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "asOf query parameter is required (YYYY-MM-DD)",
        )),
    }
}

fn window(query: &ReportQuery) -> Result<(NaiveDate, NaiveDate), axum::response::Response> {
    match (query.from.as_deref(), query.to.as_deref()) {
        (Some(from), Some(to)) => Ok((errors::parse_date("from", from)?, errors::parse_date("to", to)?)),
        _ => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "from and to query parameters are required (YYYY-MM-DD)",
        )),
    }
}

pub async fn trial_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let as_of = as_of(&query)?;
    let report = services
        .reports
        .trial_balance(entity_id, as_of)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(report).into_response())
}

pub async fn profit_and_loss(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let (from, to) = window(&query)?;
    let report = services
        .reports
        .profit_and_loss(entity_id, from, to)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(report).into_response())
}

pub async fn balance_sheet(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let as_of = as_of(&query)?;
    let report = services
        .reports
        .balance_sheet(entity_id, as_of)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(report).into_response())
}

pub async fn booking_summary(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let (from, to) = window(&query)?;
    let report = services
        .reports
        .booking_summary(entity_id, from, to)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(report).into_response())
}

pub async fn outstanding_deposits(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let rows = services
        .reports
        .outstanding_deposits(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(rows).into_response())
}

pub async fn upcoming_payouts(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let rows = services
        .reports
        .upcoming_payouts(entity_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(rows).into_response())
}

pub async fn margin_report(
    Extension(services): Extension<Arc<AppServices>>,
    Path(entity_id): Path<String>,
    Query(query): Query<ReportQuery>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let (from, to) = window(&query)?;
    let report = services
        .reports
        .margin_report(entity_id, from, to)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(report).into_response())
}
