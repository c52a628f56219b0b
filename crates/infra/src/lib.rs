//! Infrastructure layer: storage backends and the services composed on them.
//!
//! - [`store`]: storage traits with in-memory and PostgreSQL implementations
//! - [`ledger`]: the Ledger Engine (posting, reversal, chart of accounts)
//! - [`reporting`]: the Reporting Engine (statements and booking views)
//! - [`workflows`]: booking, invoice, bill and intercompany workflows built on the engine

pub mod ledger;
pub mod reporting;
pub mod store;
pub mod workflows;

pub use ledger::{LedgerEngine, LedgerError, LedgerResult};
pub use reporting::ReportingEngine;
pub use store::{
    BillStore, BookingStore, ContactStore, InMemoryStore, InvoiceStore, LedgerStore, PostgresStore,
    StoreError, StoreResult,
};
