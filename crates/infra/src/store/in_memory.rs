use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use craneledger_accounting::{
    Account, JournalEntry, JournalLine, JournalStatus, LedgerLine, LedgerPeriod, LegalEntity,
    PostedJournal, TaxCode,
};
use craneledger_bookings::{Booking, BookingEvent, BookingEventType};
use craneledger_core::{
    AccountId, BillId, BookingId, ContactId, EntityId, InvoiceId, JournalEntryId, TaxCodeId,
};
use craneledger_invoicing::{Bill, BillPaymentApplication, Invoice, Payment, PaymentApplication};
use craneledger_parties::{Contact, ContactType};

use super::{BillStore, BookingStore, ContactStore, InvoiceStore, LedgerStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct LedgerTables {
    entities: HashMap<EntityId, LegalEntity>,
    accounts: HashMap<AccountId, Account>,
    tax_codes: HashMap<TaxCodeId, TaxCode>,
    /// Headers in commit order.
    entries: Vec<JournalEntry>,
    lines: HashMap<JournalEntryId, Vec<JournalLine>>,
}

impl LedgerTables {
    /// Mirror of the foreign keys and check constraints of the SQL schema.
    fn check_journal(&self, journal: &PostedJournal) -> StoreResult<()> {
        let entry = &journal.entry;
        if !self.entities.contains_key(&entry.entity_id) {
            return Err(StoreError::Integrity(format!(
                "journal entry {} references missing entity {}",
                entry.id, entry.entity_id
            )));
        }
        if self.lines.contains_key(&entry.id) {
            return Err(StoreError::Conflict(format!("journal entry {} already exists", entry.id)));
        }
        for line in &journal.lines {
            if line.journal_entry_id != entry.id {
                return Err(StoreError::Integrity(format!(
                    "line {} belongs to entry {}, not {}",
                    line.id, line.journal_entry_id, entry.id
                )));
            }
            if !self.accounts.contains_key(&line.account_id) {
                return Err(StoreError::Integrity(format!(
                    "line {} references missing account {}",
                    line.id, line.account_id
                )));
            }
            if let Some(tax_code_id) = line.tax_code_id {
                if !self.tax_codes.contains_key(&tax_code_id) {
                    return Err(StoreError::Integrity(format!(
                        "line {} references missing tax code {}",
                        line.id, tax_code_id
                    )));
                }
            }
            if line.debit.is_positive() == line.credit.is_positive()
                || line.debit.is_negative()
                || line.credit.is_negative()
            {
                return Err(StoreError::Integrity(format!(
                    "line {} must carry exactly one positive side",
                    line.id
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BookingTables {
    bookings: HashMap<BookingId, Booking>,
    events: Vec<BookingEvent>,
}

#[derive(Debug, Default)]
struct InvoiceTables {
    invoices: HashMap<InvoiceId, Invoice>,
    payments: Vec<Payment>,
    applications: Vec<PaymentApplication>,
}

#[derive(Debug, Default)]
struct BillTables {
    bills: HashMap<BillId, Bill>,
    payments: Vec<Payment>,
    applications: Vec<BillPaymentApplication>,
}

/// In-memory implementation of every store trait.
///
/// Intended for tests/dev. Each multi-row write runs inside one write-lock
/// critical section, which is what makes it atomic.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    ledger: RwLock<LedgerTables>,
    contacts: RwLock<HashMap<ContactId, Contact>>,
    bookings: RwLock<BookingTables>,
    invoices: RwLock<InvoiceTables>,
    bills: RwLock<BillTables>,
}

fn read<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

fn write<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| StoreError::Backend("lock poisoned".to_string()))
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn insert_entity(&self, entity: &LegalEntity) -> StoreResult<()> {
        let mut tables = write(&self.ledger)?;
        if tables.entities.contains_key(&entity.id) {
            return Err(StoreError::Conflict(format!("entity {} already exists", entity.id)));
        }
        tables.entities.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn get_entity(&self, id: EntityId) -> StoreResult<Option<LegalEntity>> {
        Ok(read(&self.ledger)?.entities.get(&id).cloned())
    }

    async fn list_entities(&self) -> StoreResult<Vec<LegalEntity>> {
        let mut entities: Vec<LegalEntity> = read(&self.ledger)?.entities.values().cloned().collect();
        entities.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(entities)
    }

    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        let mut tables = write(&self.ledger)?;
        if !tables.entities.contains_key(&account.entity_id) {
            return Err(StoreError::Integrity(format!(
                "account {} references missing entity {}",
                account.code, account.entity_id
            )));
        }
        let taken = tables
            .accounts
            .values()
            .any(|a| a.entity_id == account.entity_id && a.code == account.code);
        if taken {
            return Err(StoreError::Conflict(format!(
                "account code {} already exists for entity {}",
                account.code, account.entity_id
            )));
        }
        tables.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        Ok(read(&self.ledger)?.accounts.get(&id).cloned())
    }

    async fn get_account_by_code(&self, entity_id: EntityId, code: &str) -> StoreResult<Option<Account>> {
        Ok(read(&self.ledger)?
            .accounts
            .values()
            .find(|a| a.entity_id == entity_id && a.code == code)
            .cloned())
    }

    async fn list_accounts(&self, entity_id: EntityId) -> StoreResult<Vec<Account>> {
        let mut accounts: Vec<Account> = read(&self.ledger)?
            .accounts
            .values()
            .filter(|a| a.entity_id == entity_id)
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn set_account_active(&self, id: AccountId, is_active: bool) -> StoreResult<Option<Account>> {
        let mut tables = write(&self.ledger)?;
        Ok(tables.accounts.get_mut(&id).map(|account| {
            account.is_active = is_active;
            account.clone()
        }))
    }

    async fn insert_tax_code(&self, tax_code: &TaxCode) -> StoreResult<()> {
        let mut tables = write(&self.ledger)?;
        if !tables.entities.contains_key(&tax_code.entity_id) {
            return Err(StoreError::Integrity(format!(
                "tax code {} references missing entity {}",
                tax_code.name, tax_code.entity_id
            )));
        }
        tables.tax_codes.insert(tax_code.id, tax_code.clone());
        Ok(())
    }

    async fn get_tax_code(&self, id: TaxCodeId) -> StoreResult<Option<TaxCode>> {
        Ok(read(&self.ledger)?.tax_codes.get(&id).cloned())
    }

    async fn list_tax_codes(&self, entity_id: EntityId) -> StoreResult<Vec<TaxCode>> {
        let mut codes: Vec<TaxCode> = read(&self.ledger)?
            .tax_codes
            .values()
            .filter(|t| t.entity_id == entity_id)
            .cloned()
            .collect();
        codes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(codes)
    }

    async fn insert_journal(&self, journal: &PostedJournal) -> StoreResult<()> {
        let mut tables = write(&self.ledger)?;
        tables.check_journal(journal)?;
        tables.entries.push(journal.entry.clone());
        tables.lines.insert(journal.entry.id, journal.lines.clone());
        Ok(())
    }

    async fn get_journal(&self, id: JournalEntryId) -> StoreResult<Option<PostedJournal>> {
        let tables = read(&self.ledger)?;
        let Some(entry) = tables.entries.iter().find(|e| e.id == id) else {
            return Ok(None);
        };
        Ok(Some(PostedJournal {
            entry: entry.clone(),
            lines: tables.lines.get(&id).cloned().unwrap_or_default(),
        }))
    }

    async fn reversals_of(&self, original: JournalEntryId) -> StoreResult<Vec<JournalEntry>> {
        Ok(read(&self.ledger)?
            .entries
            .iter()
            .filter(|e| e.reverses == Some(original))
            .cloned()
            .collect())
    }

    async fn journals_by_source_reference(
        &self,
        entity_id: EntityId,
        reference: &str,
    ) -> StoreResult<Vec<JournalEntry>> {
        Ok(read(&self.ledger)?
            .entries
            .iter()
            .filter(|e| e.entity_id == entity_id && e.source_reference.as_deref() == Some(reference))
            .cloned()
            .collect())
    }

    async fn posted_lines(&self, entity_id: EntityId, period: LedgerPeriod) -> StoreResult<Vec<LedgerLine>> {
        let tables = read(&self.ledger)?;
        let lines = tables
            .entries
            .iter()
            .filter(|e| {
                e.entity_id == entity_id
                    && e.status == JournalStatus::Posted
                    && period.contains(e.date)
            })
            .flat_map(|e| tables.lines.get(&e.id).into_iter().flatten())
            .map(|l| LedgerLine {
                account_id: l.account_id,
                debit: l.debit,
                credit: l.credit,
            })
            .collect();
        Ok(lines)
    }
}

#[async_trait]
impl ContactStore for InMemoryStore {
    async fn insert_contact(&self, contact: &Contact) -> StoreResult<()> {
        let mut contacts = write(&self.contacts)?;
        contacts.insert(contact.id, contact.clone());
        Ok(())
    }

    async fn get_contact(&self, id: ContactId) -> StoreResult<Option<Contact>> {
        Ok(read(&self.contacts)?.get(&id).cloned())
    }

    async fn find_contact(
        &self,
        entity_id: EntityId,
        name: &str,
        contact_type: ContactType,
    ) -> StoreResult<Option<Contact>> {
        Ok(read(&self.contacts)?
            .values()
            .filter(|c| c.entity_id == entity_id && c.name == name && c.contact_type == contact_type)
            .min_by_key(|c| (c.created_at, c.id))
            .cloned())
    }

    async fn list_contacts(&self, entity_id: EntityId) -> StoreResult<Vec<Contact>> {
        let mut contacts: Vec<Contact> = read(&self.contacts)?
            .values()
            .filter(|c| c.entity_id == entity_id)
            .cloned()
            .collect();
        contacts.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(contacts)
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> StoreResult<()> {
        let mut tables = write(&self.bookings)?;
        let taken = tables.bookings.values().any(|b| {
            b.entity_id == booking.entity_id && b.external_booking_id == booking.external_booking_id
        });
        if taken {
            return Err(StoreError::Conflict(format!(
                "booking {} already exists for entity {}",
                booking.external_booking_id, booking.entity_id
            )));
        }
        tables.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_booking(&self, booking: &Booking) -> StoreResult<()> {
        let mut tables = write(&self.bookings)?;
        match tables.bookings.get_mut(&booking.id) {
            Some(existing) => {
                *existing = booking.clone();
                Ok(())
            }
            None => Err(StoreError::Integrity(format!("booking {} does not exist", booking.id))),
        }
    }

    async fn get_booking(&self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(read(&self.bookings)?.bookings.get(&id).cloned())
    }

    async fn get_booking_by_external_id(
        &self,
        entity_id: EntityId,
        external_booking_id: &str,
    ) -> StoreResult<Option<Booking>> {
        Ok(read(&self.bookings)?
            .bookings
            .values()
            .find(|b| b.entity_id == entity_id && b.external_booking_id == external_booking_id)
            .cloned())
    }

    async fn list_bookings(&self, entity_id: EntityId) -> StoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = read(&self.bookings)?
            .bookings
            .values()
            .filter(|b| b.entity_id == entity_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    async fn insert_booking_event(&self, event: &BookingEvent) -> StoreResult<()> {
        let mut tables = write(&self.bookings)?;
        if !tables.bookings.contains_key(&event.booking_id) {
            return Err(StoreError::Integrity(format!(
                "booking event {} references missing booking {}",
                event.id, event.booking_id
            )));
        }
        tables.events.push(event.clone());
        Ok(())
    }

    async fn list_booking_events(&self, booking_id: BookingId) -> StoreResult<Vec<BookingEvent>> {
        Ok(read(&self.bookings)?
            .events
            .iter()
            .filter(|e| e.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn bookings_with_event(
        &self,
        entity_id: EntityId,
        event_type: BookingEventType,
    ) -> StoreResult<HashSet<BookingId>> {
        let tables = read(&self.bookings)?;
        Ok(tables
            .events
            .iter()
            .filter(|e| e.event_type == event_type)
            .filter(|e| {
                tables
                    .bookings
                    .get(&e.booking_id)
                    .is_some_and(|b| b.entity_id == entity_id)
            })
            .map(|e| e.booking_id)
            .collect())
    }
}

#[async_trait]
impl InvoiceStore for InMemoryStore {
    async fn insert_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut tables = write(&self.invoices)?;
        let taken = tables
            .invoices
            .values()
            .any(|i| i.entity_id == invoice.entity_id && i.number == invoice.number);
        if taken {
            return Err(StoreError::Conflict(format!(
                "invoice number {} already exists for entity {}",
                invoice.number, invoice.entity_id
            )));
        }
        tables.invoices.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn update_invoice(&self, invoice: &Invoice) -> StoreResult<()> {
        let mut tables = write(&self.invoices)?;
        match tables.invoices.get_mut(&invoice.id) {
            Some(existing) => {
                *existing = invoice.clone();
                Ok(())
            }
            None => Err(StoreError::Integrity(format!("invoice {} does not exist", invoice.id))),
        }
    }

    async fn get_invoice(&self, id: InvoiceId) -> StoreResult<Option<Invoice>> {
        Ok(read(&self.invoices)?.invoices.get(&id).cloned())
    }

    async fn list_invoices(&self, entity_id: EntityId) -> StoreResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = read(&self.invoices)?
            .invoices
            .values()
            .filter(|i| i.entity_id == entity_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issue_date.cmp(&a.issue_date).then(a.number.cmp(&b.number)));
        Ok(invoices)
    }

    async fn insert_payment(&self, payment: &Payment, application: &PaymentApplication) -> StoreResult<()> {
        let mut tables = write(&self.invoices)?;
        if application.payment_id != payment.id {
            return Err(StoreError::Integrity(format!(
                "application references payment {}, not {}",
                application.payment_id, payment.id
            )));
        }
        if !tables.invoices.contains_key(&application.invoice_id) {
            return Err(StoreError::Integrity(format!(
                "payment application references missing invoice {}",
                application.invoice_id
            )));
        }
        tables.payments.push(payment.clone());
        tables.applications.push(*application);
        Ok(())
    }

    async fn applications_for(&self, invoice_id: InvoiceId) -> StoreResult<Vec<PaymentApplication>> {
        Ok(read(&self.invoices)?
            .applications
            .iter()
            .filter(|a| a.invoice_id == invoice_id)
            .copied()
            .collect())
    }
}

#[async_trait]
impl BillStore for InMemoryStore {
    async fn insert_bill(&self, bill: &Bill) -> StoreResult<()> {
        let mut tables = write(&self.bills)?;
        let taken = tables
            .bills
            .values()
            .any(|b| b.entity_id == bill.entity_id && b.number == bill.number);
        if taken {
            return Err(StoreError::Conflict(format!(
                "bill number {} already exists for entity {}",
                bill.number, bill.entity_id
            )));
        }
        tables.bills.insert(bill.id, bill.clone());
        Ok(())
    }

    async fn update_bill(&self, bill: &Bill) -> StoreResult<()> {
        let mut tables = write(&self.bills)?;
        match tables.bills.get_mut(&bill.id) {
            Some(existing) => {
                *existing = bill.clone();
                Ok(())
            }
            None => Err(StoreError::Integrity(format!("bill {} does not exist", bill.id))),
        }
    }

    async fn get_bill(&self, id: BillId) -> StoreResult<Option<Bill>> {
        Ok(read(&self.bills)?.bills.get(&id).cloned())
    }

    async fn list_bills(&self, entity_id: EntityId) -> StoreResult<Vec<Bill>> {
        let mut bills: Vec<Bill> = read(&self.bills)?
            .bills
            .values()
            .filter(|b| b.entity_id == entity_id)
            .cloned()
            .collect();
        bills.sort_by(|a, b| b.issue_date.cmp(&a.issue_date).then(a.number.cmp(&b.number)));
        Ok(bills)
    }

    async fn insert_bill_payment(&self, payment: &Payment, application: &BillPaymentApplication) -> StoreResult<()> {
        let mut tables = write(&self.bills)?;
        if application.payment_id != payment.id {
            return Err(StoreError::Integrity(format!(
                "application references payment {}, not {}",
                application.payment_id, payment.id
            )));
        }
        if !tables.bills.contains_key(&application.bill_id) {
            return Err(StoreError::Integrity(format!(
                "payment application references missing bill {}",
                application.bill_id
            )));
        }
        tables.payments.push(payment.clone());
        tables.applications.push(*application);
        Ok(())
    }

    async fn bill_applications_for(&self, bill_id: BillId) -> StoreResult<Vec<BillPaymentApplication>> {
        Ok(read(&self.bills)?
            .applications
            .iter()
            .filter(|a| a.bill_id == bill_id)
            .copied()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use craneledger_accounting::{AccountType, JournalLineInput, NewAccount, PostJournalEntry, SourceSystem};
    use craneledger_core::Money;

    async fn seeded() -> (InMemoryStore, LegalEntity, Account, Account) {
        let store = InMemoryStore::new();
        let entity = LegalEntity::new("Crane Co", None, None, Utc::now()).unwrap();
        store.insert_entity(&entity).await.unwrap();
        let open = |code: &str, account_type: AccountType| {
            Account::open(
                NewAccount {
                    entity_id: entity.id,
                    code: code.into(),
                    name: code.into(),
                    account_type,
                    is_bank_account: false,
                    is_active: true,
                },
                Utc::now(),
            )
            .unwrap()
        };
        let bank = open("1000", AccountType::Asset);
        let revenue = open("4000", AccountType::Revenue);
        store.insert_account(&bank).await.unwrap();
        store.insert_account(&revenue).await.unwrap();
        (store, entity, bank, revenue)
    }

    fn journal(entity: &LegalEntity, debit: &Account, credit: &Account, day: u32) -> PostedJournal {
        PostJournalEntry::new(
            entity.id,
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            "Sale",
            SourceSystem::CraneledgerManual,
        )
        .with_line(JournalLineInput::debit(debit.id, Money::from_major(100)))
        .with_line(JournalLineInput::credit(credit.id, Money::from_major(100)))
        .into_posted(|_| None, Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_account_code_conflicts() {
        let (store, entity, bank, _) = seeded().await;
        let mut duplicate = bank.clone();
        duplicate.id = AccountId::new();
        let err = store.insert_account(&duplicate).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        assert_eq!(store.list_accounts(entity.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn journal_with_missing_account_leaves_nothing_behind() {
        let (store, entity, bank, revenue) = seeded().await;
        let mut broken = journal(&entity, &bank, &revenue, 5);
        broken.lines[1].account_id = AccountId::new();

        let err = store.insert_journal(&broken).await.unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
        assert!(store.get_journal(broken.entry.id).await.unwrap().is_none());
        assert!(store
            .posted_lines(entity.id, LedgerPeriod::as_of(NaiveDate::MAX))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn posted_lines_respect_the_period() {
        let (store, entity, bank, revenue) = seeded().await;
        store.insert_journal(&journal(&entity, &bank, &revenue, 5)).await.unwrap();
        store.insert_journal(&journal(&entity, &bank, &revenue, 20)).await.unwrap();

        let as_of = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        assert_eq!(store.posted_lines(entity.id, LedgerPeriod::as_of(as_of)).await.unwrap().len(), 2);

        let window = LedgerPeriod::between(
            NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
        )
        .unwrap();
        assert_eq!(store.posted_lines(entity.id, window).await.unwrap().len(), 2);
        assert!(store.posted_lines(EntityId::new(), window).await.unwrap().is_empty());
    }
}
