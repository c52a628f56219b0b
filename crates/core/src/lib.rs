//! `craneledger-core`: ledger foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! typed identifiers, the fixed-point [`Money`] type and the error taxonomy
//! shared by every other crate.

pub mod error;
pub mod id;
pub mod money;

pub use error::{DomainError, DomainResult};
pub use id::{
    AccountId, BillId, BookingEventId, BookingId, ContactId, EntityId, InvoiceId, JournalEntryId,
    JournalLineId, PaymentId, TaxCodeId,
};
pub use money::Money;
