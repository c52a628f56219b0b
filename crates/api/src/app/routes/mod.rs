use axum::Router;

pub mod bills;
pub mod bookings;
pub mod entities;
pub mod intercompany;
pub mod invoices;
pub mod journals;
pub mod reports;
pub mod system;

/// Router for every ledger endpoint.
pub fn router() -> Router {
    Router::new()
        .nest(
            "/entities",
            entities::router()
                .merge(journals::router())
                .merge(reports::router())
                .merge(invoices::router())
                .merge(bills::router()),
        )
        .nest("/bookings", bookings::router())
        .nest("/intercompany", intercompany::router())
}
