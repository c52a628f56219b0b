//! Booking workflow: every money movement on a crane-hire booking becomes one
//! journal entry plus one booking event.

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, instrument};

use craneledger_accounting::PostedJournal;
use craneledger_bookings::{
    Booking, BookingAccounts, BookingEvent, BookingPosting, CancellationScenario, NewBooking,
};
use craneledger_core::{BookingId, ContactId, DomainError, DomainResult, EntityId, Money};
use craneledger_parties::ContactType;

use super::find_or_create_contact;
use crate::ledger::{LedgerEngine, LedgerResult};
use crate::store::{BookingStore, ContactStore, LedgerStore, StoreError};

/// A booking together with its event history, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    #[serde(flatten)]
    pub booking: Booking,
    pub events: Vec<BookingEvent>,
}

/// Result of one booking operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingActivity {
    pub booking: Booking,
    pub event: BookingEvent,
    /// `None` when the operation had nothing to post.
    pub journal: Option<PostedJournal>,
}

#[derive(Debug, Clone)]
pub struct BookingWorkflow<L, B, C> {
    ledger: LedgerEngine<L>,
    bookings: B,
    contacts: C,
}

impl<L, B, C> BookingWorkflow<L, B, C>
where
    L: LedgerStore,
    B: BookingStore,
    C: ContactStore,
{
    pub fn new(ledger: LedgerEngine<L>, bookings: B, contacts: C) -> Self {
        Self {
            ledger,
            bookings,
            contacts,
        }
    }

    #[instrument(
        skip(self, input),
        fields(entity_id = %input.entity_id, external_booking_id = %input.external_booking_id),
        err
    )]
    pub async fn create_booking(&self, input: NewBooking) -> LedgerResult<Booking> {
        self.ledger.get_entity(input.entity_id).await?;

        let external_id = input.external_booking_id.trim().to_string();
        let duplicate =
            || DomainError::validation(format!("Booking {external_id} already exists for this entity"));
        if self
            .bookings
            .get_booking_by_external_id(input.entity_id, &external_id)
            .await?
            .is_some()
        {
            return Err(duplicate().into());
        }

        let customer = find_or_create_contact(
            &self.contacts,
            input.entity_id,
            ContactType::Customer,
            &input.customer_name,
            input.customer_email.clone(),
        )
        .await?;
        let supplier = match &input.supplier_name {
            Some(name) => Some(
                find_or_create_contact(
                    &self.contacts,
                    input.entity_id,
                    ContactType::Supplier,
                    name,
                    input.supplier_email.clone(),
                )
                .await?,
            ),
            None => None,
        };

        let booking = Booking::register(&input, customer.id, supplier.map(|s| s.id), Utc::now())?;
        match self.bookings.insert_booking(&booking).await {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Err(duplicate().into()),
            Err(err) => return Err(err.into()),
        }
        info!(booking_id = %booking.id, "booking created");
        Ok(booking)
    }

    pub async fn get_booking(&self, id: BookingId) -> LedgerResult<BookingDetails> {
        let booking = self.load(id).await?;
        self.with_events(booking).await
    }

    pub async fn get_booking_by_external_id(
        &self,
        entity_id: EntityId,
        external_booking_id: &str,
    ) -> LedgerResult<BookingDetails> {
        let booking = self
            .bookings
            .get_booking_by_external_id(entity_id, external_booking_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking"))?;
        self.with_events(booking).await
    }

    pub async fn list_bookings(&self, entity_id: EntityId) -> LedgerResult<Vec<Booking>> {
        Ok(self.bookings.list_bookings(entity_id).await?)
    }

    pub async fn record_deposit(
        &self,
        id: BookingId,
        amount: Money,
        date: NaiveDate,
        accounts: &BookingAccounts,
        include_gst: bool,
    ) -> LedgerResult<BookingActivity> {
        self.apply(
            id,
            date,
            |b| BookingPosting::deposit(b, amount, accounts, include_gst),
            |b, now| b.record_deposit(amount, now),
        )
        .await
    }

    pub async fn record_balance(
        &self,
        id: BookingId,
        amount: Money,
        date: NaiveDate,
        accounts: &BookingAccounts,
        include_gst: bool,
    ) -> LedgerResult<BookingActivity> {
        self.apply(
            id,
            date,
            |b| BookingPosting::balance(b, amount, accounts, include_gst),
            |b, now| b.record_balance(amount, now),
        )
        .await
    }

    pub async fn record_supplier_payout(
        &self,
        id: BookingId,
        amount: Money,
        date: NaiveDate,
        accounts: &BookingAccounts,
    ) -> LedgerResult<BookingActivity> {
        self.apply(
            id,
            date,
            |b| BookingPosting::payout(b, amount, accounts),
            |b, now| b.record_payout(amount, now),
        )
        .await
    }

    pub async fn recognize_margin(
        &self,
        id: BookingId,
        amount: Money,
        date: NaiveDate,
        accounts: &BookingAccounts,
        include_gst: bool,
    ) -> LedgerResult<BookingActivity> {
        self.apply(
            id,
            date,
            |b| BookingPosting::margin(b, amount, accounts, include_gst),
            |b, now| b.recognize_margin(amount, now),
        )
        .await
    }

    /// Cancel the booking, or move it to `new_supplier_id` for a transfer.
    pub async fn cancel_booking(
        &self,
        id: BookingId,
        scenario: CancellationScenario,
        new_supplier_id: Option<ContactId>,
        date: NaiveDate,
        accounts: &BookingAccounts,
    ) -> LedgerResult<BookingActivity> {
        if let Some(supplier_id) = new_supplier_id {
            let booking = self.load(id).await?;
            let supplier = self
                .contacts
                .get_contact(supplier_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Supplier"))?;
            supplier.ensure_role(booking.entity_id, ContactType::Supplier)?;
        }

        self.apply(
            id,
            date,
            |b| BookingPosting::cancellation(b, scenario, new_supplier_id, accounts),
            |b, now| b.cancel(scenario, new_supplier_id, now),
        )
        .await
    }

    pub async fn record_refund(
        &self,
        id: BookingId,
        amount: Money,
        date: NaiveDate,
        accounts: &BookingAccounts,
        refund_from_deposit: bool,
    ) -> LedgerResult<BookingActivity> {
        self.apply(
            id,
            date,
            |b| BookingPosting::refund(b, amount, accounts, refund_from_deposit),
            |b, now| {
                b.updated_at = now;
                Ok(())
            },
        )
        .await
    }

    /// Build the posting, check the booking accepts the change, post, then
    /// store the event and the updated booking.
    async fn apply<P, U>(
        &self,
        id: BookingId,
        date: NaiveDate,
        build: P,
        update: U,
    ) -> LedgerResult<BookingActivity>
    where
        P: FnOnce(&Booking) -> DomainResult<BookingPosting>,
        U: FnOnce(&mut Booking, chrono::DateTime<Utc>) -> DomainResult<()>,
    {
        let booking = self.load(id).await?;
        let posting = build(&booking)?;

        let now = Utc::now();
        let mut updated = booking;
        update(&mut updated, now)?;

        let journal = if posting.has_lines() {
            Some(self.ledger.post_journal_entry(posting.to_request(&updated, date)).await?)
        } else {
            None
        };

        let event = BookingEvent::new(
            updated.id,
            posting.event_type,
            posting.amount,
            journal.as_ref().map(|j| j.entry.id),
            posting.metadata,
            now,
        );
        self.bookings.insert_booking_event(&event).await?;
        self.bookings.update_booking(&updated).await?;

        info!(
            booking_id = %updated.id,
            event_type = event.event_type.as_str(),
            status = updated.status.as_str(),
            "booking event recorded"
        );
        Ok(BookingActivity {
            booking: updated,
            event,
            journal,
        })
    }

    async fn load(&self, id: BookingId) -> LedgerResult<Booking> {
        self.bookings
            .get_booking(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Booking").into())
    }

    async fn with_events(&self, booking: Booking) -> LedgerResult<BookingDetails> {
        let events = self.bookings.list_booking_events(booking.id).await?;
        Ok(BookingDetails { booking, events })
    }
}
