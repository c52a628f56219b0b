use std::str::FromStr;

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde_json::json;
use tracing::{error, warn};

use craneledger_core::DomainError;
use craneledger_infra::workflows::TransferError;
use craneledger_infra::{LedgerError, StoreError};

/// Handlers return the error response through `?`.
pub type ApiResult = Result<axum::response::Response, axum::response::Response>;

/// Map an engine failure to its HTTP status. Engine messages are returned
/// verbatim; backend detail only when `expose_internal` is set.
pub fn ledger_error_to_response(err: LedgerError, expose_internal: bool) -> axum::response::Response {
    match err {
        LedgerError::Domain(DomainError::NotFound(_)) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        LedgerError::Domain(e) => json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
        LedgerError::Store(StoreError::Conflict(msg)) => {
            warn!(detail = %msg, "store conflict");
            json_error(StatusCode::BAD_REQUEST, "conflict", "Resource already exists")
        }
        LedgerError::Store(StoreError::Integrity(msg)) => {
            warn!(detail = %msg, "store integrity violation");
            json_error(
                StatusCode::BAD_REQUEST,
                "integrity_violation",
                "Referenced resource is missing or invalid",
            )
        }
        LedgerError::Store(StoreError::Backend(msg)) => {
            error!(detail = %msg, "store backend failure");
            let message = if expose_internal {
                msg
            } else {
                "Internal server error".to_string()
            };
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
        }
    }
}

pub fn transfer_error_to_response(err: TransferError, expose_internal: bool) -> axum::response::Response {
    match err {
        TransferError::NothingPosted(e) => ledger_error_to_response(e, expose_internal),
        partial @ TransferError::PartiallyCompleted { .. } => {
            json_error(StatusCode::CONFLICT, "partial_completion", partial.to_string())
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

/// Unwrap a JSON body, turning a malformed body into a 400.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, axum::response::Response> {
    body.map(|Json(value)| value)
        .map_err(|rejection| json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text()))
}

/// Parse a path identifier, rejecting malformed ids as a validation error.
pub fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse::<T>()
        .map_err(|e| json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()))
}

/// Parse a required `YYYY-MM-DD` query parameter.
pub fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, axum::response::Response> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            format!("{name} must be a date in YYYY-MM-DD form"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use craneledger_core::{EntityId, JournalEntryId, Money};

    #[test]
    fn domain_errors_map_to_400_and_404() {
        let not_found = ledger_error_to_response(DomainError::not_found("Entity").into(), false);
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let unbalanced =
            ledger_error_to_response(DomainError::unbalanced(Money::from_major(1), Money::ZERO).into(), false);
        assert_eq!(unbalanced.status(), StatusCode::BAD_REQUEST);

        let conflict = ledger_error_to_response(StoreError::Conflict("dup".into()).into(), false);
        assert_eq!(conflict.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn backend_errors_are_500() {
        let resp = ledger_error_to_response(StoreError::Backend("pool closed".into()).into(), false);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn partial_transfer_is_409() {
        let err = TransferError::PartiallyCompleted {
            posted_entry: JournalEntryId::new(),
            error: DomainError::not_found("Account").into(),
        };
        assert_eq!(transfer_error_to_response(err, false).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn malformed_ids_and_dates_are_rejected() {
        assert!(parse_id::<EntityId>("not-a-uuid").is_err());
        assert!(parse_id::<EntityId>(&EntityId::new().to_string()).is_ok());
        assert_eq!(
            parse_date("asOf", "2024-13-01").unwrap_err().status(),
            StatusCode::BAD_REQUEST
        );
    }
}
