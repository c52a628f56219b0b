use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use craneledger_bookings::NewBooking;
use craneledger_core::{BookingId, EntityId};

use crate::app::errors::{self, ApiResult};
use crate::app::{dto, services::AppServices};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_booking))
        .route("/:id", get(get_booking))
        .route("/external/:entityId/:externalBookingId", get(get_booking_by_external_id))
        .route("/:id/deposit", post(record_deposit))
        .route("/:id/balance", post(record_balance))
        .route("/:id/payout", post(record_payout))
        .route("/:id/margin", post(recognize_margin))
        .route("/:id/cancel", post(cancel_booking))
        .route("/:id/refund", post(record_refund))
}

pub async fn create_booking(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<NewBooking>, JsonRejection>,
) -> ApiResult {
    let body = errors::json_body(body)?;
    let booking = services
        .bookings
        .create_booking(body)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok((StatusCode::CREATED, Json(booking)).into_response())
}

pub async fn get_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: BookingId = errors::parse_id(&id)?;
    let details = services
        .bookings
        .get_booking(id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(details).into_response())
}

pub async fn get_booking_by_external_id(
    Extension(services): Extension<Arc<AppServices>>,
    Path((entity_id, external_booking_id)): Path<(String, String)>,
) -> ApiResult {
    let entity_id: EntityId = errors::parse_id(&entity_id)?;
    let details = services
        .bookings
        .get_booking_by_external_id(entity_id, &external_booking_id)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(details).into_response())
}

pub async fn record_deposit(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::BookingPaymentRequest>, JsonRejection>,
) -> ApiResult {
    let id: BookingId = errors::parse_id(&id)?;
    let body = errors::json_body(body)?;
    let activity = services
        .bookings
        .record_deposit(id, body.amount, body.date, &body.account_ids, body.include_gst)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(activity).into_response())
}

pub async fn record_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::BookingPaymentRequest>, JsonRejection>,
) -> ApiResult {
    let id: BookingId = errors::parse_id(&id)?;
    let body = errors::json_body(body)?;
    let activity = services
        .bookings
        .record_balance(id, body.amount, body.date, &body.account_ids, body.include_gst)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(activity).into_response())
}

/// Supplier payouts carry no GST; `includeGST` is accepted and ignored.
pub async fn record_payout(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::BookingPaymentRequest>, JsonRejection>,
) -> ApiResult {
    let id: BookingId = errors::parse_id(&id)?;
    let body = errors::json_body(body)?;
    let activity = services
        .bookings
        .record_supplier_payout(id, body.amount, body.date, &body.account_ids)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(activity).into_response())
}

pub async fn recognize_margin(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::MarginRequest>, JsonRejection>,
) -> ApiResult {
    let id: BookingId = errors::parse_id(&id)?;
    let body = errors::json_body(body)?;
    let activity = services
        .bookings
        .recognize_margin(id, body.margin_amount, body.date, &body.account_ids, body.include_gst)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(activity).into_response())
}

pub async fn cancel_booking(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::CancelBookingRequest>, JsonRejection>,
) -> ApiResult {
    let id: BookingId = errors::parse_id(&id)?;
    let body = errors::json_body(body)?;
    let activity = services
        .bookings
        .cancel_booking(id, body.scenario, body.new_supplier_id, body.date, &body.account_ids)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(activity).into_response())
}

pub async fn record_refund(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::RefundRequest>, JsonRejection>,
) -> ApiResult {
    let id: BookingId = errors::parse_id(&id)?;
    let body = errors::json_body(body)?;
    let activity = services
        .bookings
        .record_refund(id, body.amount, body.date, &body.account_ids, body.refund_from_deposit)
        .await
        .map_err(|e| services.error_response(e))?;
    Ok(Json(activity).into_response())
}
