//! Storage boundary for the ledger and the workflows built on it.
//!
//! The traits make no storage assumptions: the in-memory stores back tests and
//! local development, the Postgres stores back production. Every write that
//! must be atomic (a journal with its lines, a payment with its application to
//! an invoice or a bill)
//! is a single trait method so each backend can honour it with its own
//! primitive.

pub mod in_memory;
pub mod postgres;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use craneledger_accounting::{
    Account, JournalEntry, LedgerLine, LedgerPeriod, LegalEntity, PostedJournal, TaxCode,
};
use craneledger_bookings::{Booking, BookingEvent, BookingEventType};
use craneledger_core::{
    AccountId, BillId, BookingId, ContactId, EntityId, InvoiceId, JournalEntryId, TaxCodeId,
};
use craneledger_invoicing::{Bill, BillPaymentApplication, Invoice, Payment, PaymentApplication};
use craneledger_parties::{Contact, ContactType};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// Storage failure.
///
/// These are infrastructure errors as opposed to domain errors: the request
/// itself may have been fine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A referenced row is missing or a check constraint failed.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Chart of accounts and journal persistence.
///
/// `insert_journal` writes the header and every line as one unit: readers
/// never observe a header without its lines.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_entity(&self, entity: &LegalEntity) -> StoreResult<()>;
    async fn get_entity(&self, id: EntityId) -> StoreResult<Option<LegalEntity>>;
    async fn list_entities(&self) -> StoreResult<Vec<LegalEntity>>;

    /// Fails with `Conflict` when `(entity_id, code)` is taken.
    async fn insert_account(&self, account: &Account) -> StoreResult<()>;
    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>>;
    async fn get_account_by_code(&self, entity_id: EntityId, code: &str) -> StoreResult<Option<Account>>;
    /// Accounts of one entity, ordered by code.
    async fn list_accounts(&self, entity_id: EntityId) -> StoreResult<Vec<Account>>;
    async fn set_account_active(&self, id: AccountId, is_active: bool) -> StoreResult<Option<Account>>;

    async fn insert_tax_code(&self, tax_code: &TaxCode) -> StoreResult<()>;
    async fn get_tax_code(&self, id: TaxCodeId) -> StoreResult<Option<TaxCode>>;
    async fn list_tax_codes(&self, entity_id: EntityId) -> StoreResult<Vec<TaxCode>>;

    async fn insert_journal(&self, journal: &PostedJournal) -> StoreResult<()>;
    async fn get_journal(&self, id: JournalEntryId) -> StoreResult<Option<PostedJournal>>;
    /// Entries whose `reverses` points at `original`, oldest first.
    async fn reversals_of(&self, original: JournalEntryId) -> StoreResult<Vec<JournalEntry>>;
    async fn journals_by_source_reference(
        &self,
        entity_id: EntityId,
        reference: &str,
    ) -> StoreResult<Vec<JournalEntry>>;

    /// Activity of POSTED entries for `entity_id` dated within `period`.
    ///
    /// Backends may return one line per journal line or pre-aggregate per
    /// account; callers fold the result with `fold_activity` either way.
    async fn posted_lines(&self, entity_id: EntityId, period: LedgerPeriod) -> StoreResult<Vec<LedgerLine>>;
}

#[async_trait]
pub trait ContactStore: Send + Sync {
    async fn insert_contact(&self, contact: &Contact) -> StoreResult<()>;
    async fn get_contact(&self, id: ContactId) -> StoreResult<Option<Contact>>;
    async fn find_contact(
        &self,
        entity_id: EntityId,
        name: &str,
        contact_type: ContactType,
    ) -> StoreResult<Option<Contact>>;
    async fn list_contacts(&self, entity_id: EntityId) -> StoreResult<Vec<Contact>>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Fails with `Conflict` when the external id is taken for the entity.
    async fn insert_booking(&self, booking: &Booking) -> StoreResult<()>;
    async fn update_booking(&self, booking: &Booking) -> StoreResult<()>;
    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>>;
    async fn get_booking_by_external_id(
        &self,
        entity_id: EntityId,
        external_booking_id: &str,
    ) -> StoreResult<Option<Booking>>;
    async fn list_bookings(&self, entity_id: EntityId) -> StoreResult<Vec<Booking>>;

    async fn insert_booking_event(&self, event: &BookingEvent) -> StoreResult<()>;
    /// Events of one booking, oldest first.
    async fn list_booking_events(&self, booking_id: BookingId) -> StoreResult<Vec<BookingEvent>>;
    /// Bookings of `entity_id` with at least one event of `event_type`.
    async fn bookings_with_event(
        &self,
        entity_id: EntityId,
        event_type: BookingEventType,
    ) -> StoreResult<HashSet<BookingId>>;
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Fails with `Conflict` when the number is taken for the entity.
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()>;
    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>>;
    async fn list_invoices(&self, entity_id: EntityId) -> StoreResult<Vec<Invoice>>;

    /// Store a payment and its application to one invoice as one unit.
    async fn insert_payment(&self, payment: &Payment, application: &PaymentApplication) -> StoreResult<()>;
    async fn applications_for(&self, invoice_id: InvoiceId) -> StoreResult<Vec<PaymentApplication>>;
}

/// Accounts-payable records. Outgoing payments share the payments table with
/// incoming ones.
#[async_trait]
pub trait BillStore: Send + Sync {
    /// Fails with `Conflict` when the number is taken for the entity.
    async fn insert_bill(&self, bill: &Bill) -> StoreResult<()>;
    async fn update_bill(&self, bill: &Bill) -> StoreResult<()>;
    async fn get_bill(&self, id: BillId) -> StoreResult<Option<Bill>>;
    async fn list_bills(&self, entity_id: EntityId) -> StoreResult<Vec<Bill>>;

    /// Store an outgoing payment and its application to one bill as one unit.
    async fn insert_bill_payment(&self, payment: &Payment, application: &BillPaymentApplication) -> StoreResult<()>;
    async fn bill_applications_for(&self, bill_id: BillId) -> StoreResult<Vec<BillPaymentApplication>>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn insert_entity(&self, entity: &LegalEntity) -> StoreResult<()> {
        (**self).insert_entity(entity).await
    }

    async fn get_entity(&self, id: EntityId) -> StoreResult<Option<LegalEntity>> {
        (**self).get_entity(id).await
    }

    async fn list_entities(&self) -> StoreResult<Vec<LegalEntity>> {
        (**self).list_entities().await
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        (**self).insert_account(account).await
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        (**self).get_account(id).await
    }

    async fn get_account_by_code(&self, entity_id: EntityId, code: &str) -> StoreResult<Option<Account>> {
        (**self).get_account_by_code(entity_id, code).await
    }

    async fn list_accounts(&self, entity_id: EntityId) -> StoreResult<Vec<Account>> {
        (**self).list_accounts(entity_id).await
    }

    async fn set_account_active(&self, id: AccountId, is_active: bool) -> StoreResult<Option<Account>> {
        (**self).set_account_active(id, is_active).await
    }

    async fn insert_tax_code(&self, tax_code: &TaxCode) -> StoreResult<()> {
        (**self).insert_tax_code(tax_code).await
    }

    async fn get_tax_code(&self, id: TaxCodeId) -> StoreResult<Option<TaxCode>> {
        (**self).get_tax_code(id).await
    }

    async fn list_tax_codes(&self, entity_id: EntityId) -> StoreResult<Vec<TaxCode>> {
        (**self).list_tax_codes(entity_id).await
    }

    async fn insert_journal(&self, journal: &PostedJournal) -> StoreResult<()> {
        (**self).insert_journal(journal).await
    }

    async fn get_journal(&self, id: JournalEntryId) -> StoreResult<Option<PostedJournal>> {
        (**self).get_journal(id).await
    }

    async fn reversals_of(&self, original: JournalEntryId) -> StoreResult<Vec<JournalEntry>> {
        (**self).reversals_of(original).await
    }

    async fn journals_by_source_reference(
        &self,
        entity_id: EntityId,
        reference: &str,
    ) -> StoreResult<Vec<JournalEntry>> {
        (**self).journals_by_source_reference(entity_id, reference).await
    }

    async fn posted_lines(&self, entity_id: EntityId, period: LedgerPeriod) -> StoreResult<Vec<LedgerLine>> {
        (**self).posted_lines(entity_id, period).await
    }
}

#[async_trait]
impl<S> ContactStore for Arc<S>
where
    S: ContactStore + ?Sized,
{
    async fn insert_contact(&self, contact: &Contact) -> StoreResult<()> {
        (**self).insert_contact(contact).await
    }

    async fn get_contact(&self, id: ContactId) -> StoreResult<Option<Contact>> {
        (**self).get_contact(id).await
    }

    async fn find_contact(
        &self,
        entity_id: EntityId,
        name: &str,
        contact_type: ContactType,
    ) -> StoreResult<Option<Contact>> {
        (**self).find_contact(entity_id, name, contact_type).await
    }

    async fn list_contacts(&self, entity_id: EntityId) -> StoreResult<Vec<Contact>> {
        (**self).list_contacts(entity_id).await
    }
}

#[async_trait]
impl<S> BookingStore for Arc<S>
where
    S: BookingStore + ?Sized,
{
    async fn insert_booking(&self, booking: &Booking) -> StoreResult<()> {
        (**self).insert_booking(booking).await
    }

    async fn update_booking(&self, booking: &Booking) -> StoreResult<()> {
        (**self).update_booking(booking).await
    }

    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        (**self).get_booking(id).await
    }

    async fn get_booking_by_external_id(
        &self,
        entity_id: EntityId,
        external_booking_id: &str,
    ) -> StoreResult<Option<Booking>> {
        (**self).get_booking_by_external_id(entity_id, external_booking_id).await
    }

    async fn list_bookings(&self, entity_id: EntityId) -> StoreResult<Vec<Booking>> {
        (**self).list_bookings(entity_id).await
    }

    async fn insert_booking_event(&self, event: &BookingEvent) -> StoreResult<()> {
        (**self).insert_booking_event(event).await
    }

    async fn list_booking_events(&self, booking_id: BookingId) -> StoreResult<Vec<BookingEvent>> {
        (**self).list_booking_events(booking_id).await
    }

    async fn bookings_with_event(
        &self,
        entity_id: EntityId,
        event_type: BookingEventType,
    ) -> StoreResult<HashSet<BookingId>> {
        (**self).bookings_with_event(entity_id, event_type).await
    }
}

#[async_trait]
impl<S> InvoiceStore for Arc<S>
where
    S: InvoiceStore + ?Sized,
{
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        (**self).insert_invoice(invoice).await
    }

    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        (**self).update_invoice(invoice).await
    }

    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        (**self).get_invoice(id).await
    }

    async fn list_invoices(&self, entity_id: EntityId) -> StoreResult<Vec<Invoice>> {
        (**self).list_invoices(entity_id).await
    }

    async fn insert_payment(&self, payment: &Payment, application: &PaymentApplication) -> StoreResult<()> {
        (**self).insert_payment(payment, application).await
    }

    async fn applications_for(&self, invoice_id: InvoiceId) -> StoreResult<Vec<PaymentApplication>> {
        (**self).applications_for(invoice_id).await
    }
}

#[async_trait]
impl<S> BillStore for Arc<S>
where
    S: BillStore + ?Sized,
{
    async fn insert_bill(&self, bill: &Bill) -> StoreResult<()> {
        (**self).insert_bill(bill).await
    }

    async fn update_bill(&self, bill: &Bill) -> StoreResult<()> {
        (**self).update_bill(bill).await
    }

    async fn get_bill(&self, id: BillId) -> StoreResult<Option<Bill>> {
        (**self).get_bill(id).await
    }

    async fn list_bills(&self, entity_id: EntityId) -> StoreResult<Vec<Bill>> {
        (**self).list_bills(entity_id).await
    }

    async fn insert_bill_payment(&self, payment: &Payment, application: &BillPaymentApplication) -> StoreResult<()> {
        (**self).insert_bill_payment(payment, application).await
    }

    async fn bill_applications_for(&self, bill_id: BillId) -> StoreResult<Vec<BillPaymentApplication>> {
        (**self).bill_applications_for(bill_id).await
    }
}
