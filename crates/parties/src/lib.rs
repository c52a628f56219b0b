//! Parties domain module (customers, suppliers and intercompany counterparties).
//!
//! Deterministic domain logic only (no IO, no HTTP, no storage).

pub mod contact;

pub use contact::{Contact, ContactType};
