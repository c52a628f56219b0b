//! Workflows that compose Ledger Engine postings with their own records.
//!
//! Each workflow validates against the domain types first, posts through the
//! [`LedgerEngine`](crate::ledger::LedgerEngine), and only then stores its own
//! rows, so a rejected posting leaves the workflow state untouched.

pub mod bills;
pub mod bookings;
pub mod intercompany;
pub mod invoices;

use chrono::Utc;
use tracing::{debug, instrument};

use craneledger_core::{ContactId, DomainError, EntityId};
use craneledger_parties::{Contact, ContactType};

use crate::ledger::LedgerResult;
use crate::store::{ContactStore, LedgerStore};

pub use bills::{BillPaymentReceipt, BillWorkflow, RecordBillPayment};
pub use bookings::{BookingActivity, BookingDetails, BookingWorkflow};
pub use intercompany::{IntercompanyTransfer, LoanTransfer, TransferError, TransferOutcome, TransferState};
pub use invoices::{InvoiceWorkflow, PaymentReceipt, RecordPayment};

/// Customer and supplier records of each entity.
#[derive(Debug, Clone)]
pub struct ContactDirectory<L, C> {
    ledger: L,
    contacts: C,
}

impl<L, C> ContactDirectory<L, C>
where
    L: LedgerStore,
    C: ContactStore,
{
    pub fn new(ledger: L, contacts: C) -> Self {
        Self { ledger, contacts }
    }

    #[instrument(skip(self, name, email, external_ref), fields(entity_id = %entity_id), err)]
    pub async fn create_contact(
        &self,
        entity_id: EntityId,
        contact_type: ContactType,
        name: &str,
        email: Option<String>,
        external_ref: Option<String>,
    ) -> LedgerResult<Contact> {
        if self.ledger.get_entity(entity_id).await?.is_none() {
            return Err(DomainError::not_found("Entity").into());
        }
        let contact = Contact::register(entity_id, contact_type, name, email, external_ref, Utc::now())?;
        self.contacts.insert_contact(&contact).await?;
        Ok(contact)
    }

    pub async fn get_contact(&self, id: ContactId) -> LedgerResult<Contact> {
        self.contacts
            .get_contact(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Contact").into())
    }

    pub async fn list_contacts(&self, entity_id: EntityId) -> LedgerResult<Vec<Contact>> {
        Ok(self.contacts.list_contacts(entity_id).await?)
    }
}

/// Return the contact named `name` of `contact_type`, registering it first if
/// the entity has none.
pub(crate) async fn find_or_create_contact<C>(
    contacts: &C,
    entity_id: EntityId,
    contact_type: ContactType,
    name: &str,
    email: Option<String>,
) -> LedgerResult<Contact>
where
    C: ContactStore,
{
    if let Some(existing) = contacts.find_contact(entity_id, name.trim(), contact_type).await? {
        return Ok(existing);
    }
    let contact = Contact::register(entity_id, contact_type, name, email, None, Utc::now())?;
    contacts.insert_contact(&contact).await?;
    debug!(contact_id = %contact.id, contact_type = contact_type.as_str(), "contact registered");
    Ok(contact)
}
