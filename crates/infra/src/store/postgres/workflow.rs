use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::instrument;
use uuid::Uuid;

use craneledger_bookings::{Booking, BookingEvent, BookingEventType};
use craneledger_core::{
    BillId, BookingEventId, BookingId, ContactId, EntityId, InvoiceId, JournalEntryId, Money, PaymentId,
};
use craneledger_invoicing::{Bill, BillPaymentApplication, Invoice, Payment, PaymentApplication};
use craneledger_parties::{Contact, ContactType};

use super::{map_sqlx_error, parse_column, PostgresStore};
use crate::store::{
    BillStore, BookingStore, ContactStore, InvoiceStore, StoreError, StoreResult,
};

#[derive(Debug, sqlx::FromRow)]
struct ContactRow {
    id: Uuid,
    entity_id: Uuid,
    contact_type: String,
    name: String,
    email: Option<String>,
    external_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContactRow> for Contact {
    type Error = StoreError;

    fn try_from(row: ContactRow) -> Result<Self, Self::Error> {
        Ok(Contact {
            id: ContactId::from_uuid(row.id),
            entity_id: EntityId::from_uuid(row.entity_id),
            contact_type: parse_column("contact_type", &row.contact_type)?,
            name: row.name,
            email: row.email,
            external_ref: row.external_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    external_booking_id: String,
    entity_id: Uuid,
    customer_id: Uuid,
    supplier_id: Option<Uuid>,
    status: String,
    deposit_amount: Decimal,
    balance_amount: Decimal,
    total_job_amount: Decimal,
    margin_amount: Decimal,
    supplier_payout_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: BookingId::from_uuid(row.id),
            external_booking_id: row.external_booking_id,
            entity_id: EntityId::from_uuid(row.entity_id),
            customer_id: ContactId::from_uuid(row.customer_id),
            supplier_id: row.supplier_id.map(ContactId::from_uuid),
            status: parse_column("status", &row.status)?,
            deposit_amount: Money::new(row.deposit_amount),
            balance_amount: Money::new(row.balance_amount),
            total_job_amount: Money::new(row.total_job_amount),
            margin_amount: Money::new(row.margin_amount),
            supplier_payout_amount: Money::new(row.supplier_payout_amount),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BookingEventRow {
    id: Uuid,
    booking_id: Uuid,
    event_type: String,
    amount: Decimal,
    journal_entry_id: Option<Uuid>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<BookingEventRow> for BookingEvent {
    type Error = StoreError;

    fn try_from(row: BookingEventRow) -> Result<Self, Self::Error> {
        Ok(BookingEvent {
            id: BookingEventId::from_uuid(row.id),
            booking_id: BookingId::from_uuid(row.booking_id),
            event_type: parse_column("event_type", &row.event_type)?,
            amount: Money::new(row.amount),
            journal_entry_id: row.journal_entry_id.map(JournalEntryId::from_uuid),
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    entity_id: Uuid,
    contact_id: Uuid,
    number: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    status: String,
    currency_code: String,
    subtotal_amount: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    external_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = StoreError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: InvoiceId::from_uuid(row.id),
            entity_id: EntityId::from_uuid(row.entity_id),
            contact_id: ContactId::from_uuid(row.contact_id),
            number: row.number,
            issue_date: row.issue_date,
            due_date: row.due_date,
            status: parse_column("status", &row.status)?,
            currency_code: row.currency_code.trim().to_string(),
            subtotal_amount: Money::new(row.subtotal_amount),
            tax_amount: Money::new(row.tax_amount),
            total_amount: Money::new(row.total_amount),
            external_ref: row.external_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ApplicationRow {
    invoice_id: Uuid,
    payment_id: Uuid,
    amount_applied: Decimal,
}

impl From<ApplicationRow> for PaymentApplication {
    fn from(row: ApplicationRow) -> Self {
        PaymentApplication {
            invoice_id: InvoiceId::from_uuid(row.invoice_id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            amount_applied: Money::new(row.amount_applied),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillRow {
    id: Uuid,
    entity_id: Uuid,
    contact_id: Uuid,
    number: String,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    status: String,
    currency_code: String,
    subtotal_amount: Decimal,
    tax_amount: Decimal,
    total_amount: Decimal,
    external_ref: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BillRow> for Bill {
    type Error = StoreError;

    fn try_from(row: BillRow) -> Result<Self, Self::Error> {
        Ok(Bill {
            id: BillId::from_uuid(row.id),
            entity_id: EntityId::from_uuid(row.entity_id),
            contact_id: ContactId::from_uuid(row.contact_id),
            number: row.number,
            issue_date: row.issue_date,
            due_date: row.due_date,
            status: parse_column("status", &row.status)?,
            currency_code: row.currency_code.trim().to_string(),
            subtotal_amount: Money::new(row.subtotal_amount),
            tax_amount: Money::new(row.tax_amount),
            total_amount: Money::new(row.total_amount),
            external_ref: row.external_ref,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BillApplicationRow {
    bill_id: Uuid,
    payment_id: Uuid,
    amount_applied: Decimal,
}

impl From<BillApplicationRow> for BillPaymentApplication {
    fn from(row: BillApplicationRow) -> Self {
        BillPaymentApplication {
            bill_id: BillId::from_uuid(row.bill_id),
            payment_id: PaymentId::from_uuid(row.payment_id),
            amount_applied: Money::new(row.amount_applied),
        }
    }
}

const CONTACT_COLUMNS: &str =
    "id, entity_id, contact_type, name, email, external_ref, created_at, updated_at";

const BOOKING_COLUMNS: &str = "id, external_booking_id, entity_id, customer_id, supplier_id, \
     status, deposit_amount, balance_amount, total_job_amount, margin_amount, \
     supplier_payout_amount, created_at, updated_at";

const INVOICE_COLUMNS: &str = "id, entity_id, contact_id, number, issue_date, due_date, status, \
     currency_code, subtotal_amount, tax_amount, total_amount, external_ref, created_at, updated_at";

const BILL_COLUMNS: &str = "id, entity_id, contact_id, number, issue_date, due_date, status, \
     currency_code, subtotal_amount, tax_amount, total_amount, external_ref, created_at, updated_at";

/// Payment row shared by invoice and bill settlements; runs inside the
/// caller's transaction.
async fn insert_payment_row(conn: &mut sqlx::PgConnection, payment: &Payment) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, entity_id, contact_id, direction, amount, currency_code,
            payment_date, method, external_ref, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(payment.id.as_uuid())
    .bind(payment.entity_id.as_uuid())
    .bind(payment.contact_id.as_uuid())
    .bind(payment.direction.as_str())
    .bind(payment.amount.as_decimal())
    .bind(&payment.currency_code)
    .bind(payment.date)
    .bind(payment.method.as_str())
    .bind(payment.external_ref.as_deref())
    .bind(payment.created_at)
    .execute(conn)
    .await
    .map_err(|e| map_sqlx_error("insert_payment", e))?;
    Ok(())
}

#[async_trait]
impl ContactStore for PostgresStore {
    #[instrument(skip(self, contact), fields(entity_id = %contact.entity_id, contact_id = %contact.id), err)]
    async fn insert_contact(&self, contact: &Contact) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO contacts ({CONTACT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(contact.id.as_uuid())
        .bind(contact.entity_id.as_uuid())
        .bind(contact.contact_type.as_str())
        .bind(&contact.name)
        .bind(contact.email.as_deref())
        .bind(contact.external_ref.as_deref())
        .bind(contact.created_at)
        .bind(contact.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_contact", e))?;
        Ok(())
    }

    async fn get_contact(&self, id: ContactId) -> StoreResult<Option<Contact>> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_contact", e))?;
        row.map(Contact::try_from).transpose()
    }

    async fn find_contact(
        &self,
        entity_id: EntityId,
        name: &str,
        contact_type: ContactType,
    ) -> StoreResult<Option<Contact>> {
        let row = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts \
             WHERE entity_id = $1 AND name = $2 AND contact_type = $3 \
             ORDER BY created_at, id LIMIT 1"
        ))
        .bind(entity_id.as_uuid())
        .bind(name)
        .bind(contact_type.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_contact", e))?;
        row.map(Contact::try_from).transpose()
    }

    async fn list_contacts(&self, entity_id: EntityId) -> StoreResult<Vec<Contact>> {
        let rows = sqlx::query_as::<_, ContactRow>(&format!(
            "SELECT {CONTACT_COLUMNS} FROM contacts WHERE entity_id = $1 ORDER BY name, id"
        ))
        .bind(entity_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_contacts", e))?;
        rows.into_iter().map(Contact::try_from).collect()
    }
}

#[async_trait]
impl BookingStore for PostgresStore {
    #[instrument(
        skip(self, booking),
        fields(entity_id = %booking.entity_id, external_booking_id = %booking.external_booking_id),
        err
    )]
    async fn insert_booking(&self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)"
        ))
        .bind(booking.id.as_uuid())
        .bind(&booking.external_booking_id)
        .bind(booking.entity_id.as_uuid())
        .bind(booking.customer_id.as_uuid())
        .bind(booking.supplier_id.map(Uuid::from))
        .bind(booking.status.as_str())
        .bind(booking.deposit_amount.as_decimal())
        .bind(booking.balance_amount.as_decimal())
        .bind(booking.total_job_amount.as_decimal())
        .bind(booking.margin_amount.as_decimal())
        .bind(booking.supplier_payout_amount.as_decimal())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_booking", e))?;
        Ok(())
    }

    #[instrument(skip(self, booking), fields(booking_id = %booking.id, status = booking.status.as_str()), err)]
    async fn update_booking(&self, booking: &Booking) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                supplier_id = $2,
                status = $3,
                deposit_amount = $4,
                balance_amount = $5,
                total_job_amount = $6,
                margin_amount = $7,
                supplier_payout_amount = $8,
                updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(booking.id.as_uuid())
        .bind(booking.supplier_id.map(Uuid::from))
        .bind(booking.status.as_str())
        .bind(booking.deposit_amount.as_decimal())
        .bind(booking.balance_amount.as_decimal())
        .bind(booking.total_job_amount.as_decimal())
        .bind(booking.margin_amount.as_decimal())
        .bind(booking.supplier_payout_amount.as_decimal())
        .bind(booking.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_booking", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Integrity(format!("booking {} does not exist", booking.id)));
        }
        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_booking", e))?;
        row.map(Booking::try_from).transpose()
    }

    async fn get_booking_by_external_id(
        &self,
        entity_id: EntityId,
        external_booking_id: &str,
    ) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE entity_id = $1 AND external_booking_id = $2"
        ))
        .bind(entity_id.as_uuid())
        .bind(external_booking_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_booking_by_external_id", e))?;
        row.map(Booking::try_from).transpose()
    }

    async fn list_bookings(&self, entity_id: EntityId) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE entity_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(entity_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_bookings", e))?;
        rows.into_iter().map(Booking::try_from).collect()
    }

    #[instrument(skip(self, event), fields(booking_id = %event.booking_id, event_type = event.event_type.as_str()), err)]
    async fn insert_booking_event(&self, event: &BookingEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO booking_events (
                id, booking_id, event_type, amount, journal_entry_id, metadata, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.booking_id.as_uuid())
        .bind(event.event_type.as_str())
        .bind(event.amount.as_decimal())
        .bind(event.journal_entry_id.map(Uuid::from))
        .bind(&event.metadata)
        .bind(event.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_booking_event", e))?;
        Ok(())
    }

    async fn list_booking_events(&self, booking_id: BookingId) -> StoreResult<Vec<BookingEvent>> {
        let rows = sqlx::query_as::<_, BookingEventRow>(
            r#"
            SELECT id, booking_id, event_type, amount, journal_entry_id, metadata, created_at
            FROM booking_events
            WHERE booking_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(booking_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_booking_events", e))?;
        rows.into_iter().map(BookingEvent::try_from).collect()
    }

    async fn bookings_with_event(
        &self,
        entity_id: EntityId,
        event_type: BookingEventType,
    ) -> StoreResult<HashSet<BookingId>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT ev.booking_id
            FROM booking_events ev
            JOIN bookings b ON b.id = ev.booking_id
            WHERE b.entity_id = $1 AND ev.event_type = $2
            "#,
        )
        .bind(entity_id.as_uuid())
        .bind(event_type.as_str())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("bookings_with_event", e))?;
        Ok(ids.into_iter().map(BookingId::from_uuid).collect())
    }
}

#[async_trait]
impl InvoiceStore for PostgresStore {
    #[instrument(skip(self, invoice), fields(entity_id = %invoice.entity_id, number = %invoice.number), err)]
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO invoices ({INVOICE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(invoice.id.as_uuid())
        .bind(invoice.entity_id.as_uuid())
        .bind(invoice.contact_id.as_uuid())
        .bind(&invoice.number)
        .bind(invoice.issue_date)
        .bind(invoice.due_date)
        .bind(invoice.status.as_str())
        .bind(&invoice.currency_code)
        .bind(invoice.subtotal_amount.as_decimal())
        .bind(invoice.tax_amount.as_decimal())
        .bind(invoice.total_amount.as_decimal())
        .bind(invoice.external_ref.as_deref())
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_invoice", e))?;
        Ok(())
    }

    #[instrument(skip(self, invoice), fields(invoice_id = %invoice.id, status = invoice.status.as_str()), err)]
    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let result = sqlx::query("UPDATE invoices SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(invoice.id.as_uuid())
            .bind(invoice.status.as_str())
            .bind(invoice.updated_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_invoice", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Integrity(format!("invoice {} does not exist", invoice.id)));
        }
        Ok(())
    }

    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_invoice", e))?;
        row.map(Invoice::try_from).transpose()
    }

    async fn list_invoices(&self, entity_id: EntityId) -> StoreResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE entity_id = $1 ORDER BY issue_date DESC, number"
        ))
        .bind(entity_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_invoices", e))?;
        rows.into_iter().map(Invoice::try_from).collect()
    }

    #[instrument(
        skip(self, payment, application),
        fields(payment_id = %payment.id, invoice_id = %application.invoice_id),
        err
    )]
    async fn insert_payment(&self, payment: &Payment, application: &PaymentApplication) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let inserted = async {
            insert_payment_row(&mut tx, payment).await?;

            sqlx::query(
                "INSERT INTO payment_applications (invoice_id, payment_id, amount_applied) VALUES ($1, $2, $3)",
            )
            .bind(application.invoice_id.as_uuid())
            .bind(application.payment_id.as_uuid())
            .bind(application.amount_applied.as_decimal())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("insert_payment_application", e))?;

            Ok::<(), StoreError>(())
        }
        .await;

        if let Err(err) = inserted {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn applications_for(&self, invoice_id: InvoiceId) -> StoreResult<Vec<PaymentApplication>> {
        let rows = sqlx::query_as::<_, ApplicationRow>(
            "SELECT invoice_id, payment_id, amount_applied FROM payment_applications WHERE invoice_id = $1",
        )
        .bind(invoice_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("applications_for", e))?;
        Ok(rows.into_iter().map(PaymentApplication::from).collect())
    }
}

#[async_trait]
impl BillStore for PostgresStore {
    #[instrument(skip(self, bill), fields(entity_id = %bill.entity_id, number = %bill.number), err)]
    async fn insert_bill(&self, bill: &Bill) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO bills ({BILL_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(bill.id.as_uuid())
        .bind(bill.entity_id.as_uuid())
        .bind(bill.contact_id.as_uuid())
        .bind(&bill.number)
        .bind(bill.issue_date)
        .bind(bill.due_date)
        .bind(bill.status.as_str())
        .bind(&bill.currency_code)
        .bind(bill.subtotal_amount.as_decimal())
        .bind(bill.tax_amount.as_decimal())
        .bind(bill.total_amount.as_decimal())
        .bind(bill.external_ref.as_deref())
        .bind(bill.created_at)
        .bind(bill.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_bill", e))?;
        Ok(())
    }

    #[instrument(skip(self, bill), fields(bill_id = %bill.id, status = bill.status.as_str()), err)]
    async fn update_bill(&self, bill: &Bill) -> StoreResult<()> {
        let result = sqlx::query("UPDATE bills SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(bill.id.as_uuid())
            .bind(bill.status.as_str())
            .bind(bill.updated_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_bill", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Integrity(format!("bill {} does not exist", bill.id)));
        }
        Ok(())
    }

    async fn get_bill(&self, id: BillId) -> StoreResult<Option<Bill>> {
        let row = sqlx::query_as::<_, BillRow>(&format!("SELECT {BILL_COLUMNS} FROM bills WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_bill", e))?;
        row.map(Bill::try_from).transpose()
    }

    async fn list_bills(&self, entity_id: EntityId) -> StoreResult<Vec<Bill>> {
        let rows = sqlx::query_as::<_, BillRow>(&format!(
            "SELECT {BILL_COLUMNS} FROM bills WHERE entity_id = $1 ORDER BY issue_date DESC, number"
        ))
        .bind(entity_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_bills", e))?;
        rows.into_iter().map(Bill::try_from).collect()
    }

    #[instrument(
        skip(self, payment, application),
        fields(payment_id = %payment.id, bill_id = %application.bill_id),
        err
    )]
    async fn insert_bill_payment(&self, payment: &Payment, application: &BillPaymentApplication) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let inserted = async {
            insert_payment_row(&mut tx, payment).await?;

            sqlx::query("INSERT INTO bill_payments (bill_id, payment_id, amount_applied) VALUES ($1, $2, $3)")
                .bind(application.bill_id.as_uuid())
                .bind(application.payment_id.as_uuid())
                .bind(application.amount_applied.as_decimal())
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("insert_bill_payment", e))?;

            Ok::<(), StoreError>(())
        }
        .await;

        if let Err(err) = inserted {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn bill_applications_for(&self, bill_id: BillId) -> StoreResult<Vec<BillPaymentApplication>> {
        let rows = sqlx::query_as::<_, BillApplicationRow>(
            "SELECT bill_id, payment_id, amount_applied FROM bill_payments WHERE bill_id = $1",
        )
        .bind(bill_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("bill_applications_for", e))?;
        Ok(rows.into_iter().map(BillPaymentApplication::from).collect())
    }
}
