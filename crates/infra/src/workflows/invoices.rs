//! Accounts-receivable workflow: draft, post and settle invoices.
//!
//! The invoice status after a payment is always recomputed from the full set
//! of stored payment applications, never adjusted in place.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use craneledger_accounting::PostedJournal;
use craneledger_core::{AccountId, DomainError, EntityId, InvoiceId, Money};
use craneledger_invoicing::{Invoice, NewInvoice, Payment, PaymentApplication, PaymentMethod};
use craneledger_parties::ContactType;

use crate::ledger::{LedgerEngine, LedgerResult};
use crate::store::{ContactStore, InvoiceStore, LedgerStore, StoreError};

/// A payment against one invoice plus the accounts it posts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPayment {
    pub amount: Money,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    #[serde(default)]
    pub external_ref: Option<String>,
    pub bank_account_id: AccountId,
    pub receivable_account_id: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub invoice: Invoice,
    pub payment: Payment,
    pub journal: PostedJournal,
}

#[derive(Debug, Clone)]
pub struct InvoiceWorkflow<L, I, C> {
    ledger: LedgerEngine<L>,
    invoices: I,
    contacts: C,
}

impl<L, I, C> InvoiceWorkflow<L, I, C>
where
    L: LedgerStore,
    I: InvoiceStore,
    C: ContactStore,
{
    pub fn new(ledger: LedgerEngine<L>, invoices: I, contacts: C) -> Self {
        Self {
            ledger,
            invoices,
            contacts,
        }
    }

    #[instrument(skip(self, input), fields(entity_id = %input.entity_id, number = %input.number), err)]
    pub async fn create_invoice(&self, input: NewInvoice) -> LedgerResult<Invoice> {
        self.ledger.get_entity(input.entity_id).await?;
        let contact = self
            .contacts
            .get_contact(input.contact_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Contact"))?;
        contact.ensure_role(input.entity_id, ContactType::Customer)?;

        let invoice = Invoice::draft(input, Utc::now())?;
        match self.invoices.insert_invoice(&invoice).await {
            Ok(()) => Ok(invoice),
            Err(StoreError::Conflict(_)) => Err(DomainError::validation(format!(
                "Invoice number {} already exists for this entity",
                invoice.number
            ))
            .into()),
            Err(err) => Err(err.into()),
        }
    }

    /// Recognize the receivable and move the invoice from DRAFT to SENT.
    #[instrument(skip(self), fields(invoice_id = %id), err)]
    pub async fn post_invoice(
        &self,
        id: InvoiceId,
        receivable_account_id: AccountId,
        revenue_account_id: AccountId,
        tax_liability_account_id: Option<AccountId>,
    ) -> LedgerResult<(Invoice, PostedJournal)> {
        let mut invoice = self.get_invoice(id).await?;
        let request =
            invoice.posting_request(receivable_account_id, revenue_account_id, tax_liability_account_id)?;
        let journal = self.ledger.post_journal_entry(request).await?;

        invoice.mark_sent(Utc::now());
        self.invoices.update_invoice(&invoice).await?;
        info!(journal_entry_id = %journal.entry.id, "invoice posted");
        Ok((invoice, journal))
    }

    /// Post the cash receipt, store the payment with its application, then
    /// recompute the invoice status from every application on record.
    #[instrument(skip(self, input), fields(invoice_id = %id, amount = %input.amount), err)]
    pub async fn record_payment(&self, id: InvoiceId, input: RecordPayment) -> LedgerResult<PaymentReceipt> {
        let mut invoice = self.get_invoice(id).await?;
        let applied = self.invoices.applications_for(id).await?;
        invoice.ensure_payable(input.amount, &applied)?;

        let now = Utc::now();
        let payment = Payment::incoming_for(
            &invoice,
            input.amount,
            input.date,
            input.method,
            input.external_ref,
            now,
        );
        let journal = self
            .ledger
            .post_journal_entry(invoice.payment_request(
                &payment,
                input.bank_account_id,
                input.receivable_account_id,
            ))
            .await?;

        let application = PaymentApplication {
            invoice_id: invoice.id,
            payment_id: payment.id,
            amount_applied: payment.amount,
        };
        self.invoices.insert_payment(&payment, &application).await?;

        let applied = self.invoices.applications_for(id).await?;
        invoice.apply_recomputed_status(&applied, now);
        self.invoices.update_invoice(&invoice).await?;
        info!(
            payment_id = %payment.id,
            status = invoice.status.as_str(),
            "invoice payment recorded"
        );

        Ok(PaymentReceipt {
            invoice,
            payment,
            journal,
        })
    }

    pub async fn get_invoice(&self, id: InvoiceId) -> LedgerResult<Invoice> {
        self.invoices
            .get_invoice(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Invoice").into())
    }

    pub async fn list_invoices(&self, entity_id: EntityId) -> LedgerResult<Vec<Invoice>> {
        Ok(self.invoices.list_invoices(entity_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use craneledger_accounting::{AccountType, NewAccount};
    use craneledger_invoicing::InvoiceStatus;
    use craneledger_parties::Contact;

    use crate::reporting::ReportingEngine;
    use crate::store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        workflow: InvoiceWorkflow<Arc<InMemoryStore>, Arc<InMemoryStore>, Arc<InMemoryStore>>,
        entity_id: EntityId,
        customer: Contact,
        bank: AccountId,
        receivable: AccountId,
        revenue: AccountId,
        gst: AccountId,
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 10, d).unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let ledger = LedgerEngine::new(store.clone());
        let entity = ledger.create_entity("Crane Hire Pty Ltd", None, None).await.unwrap();

        let mut ids = Vec::new();
        for (code, account_type) in [
            ("1000", AccountType::Asset),
            ("1100", AccountType::Asset),
            ("4000", AccountType::Revenue),
            ("2200", AccountType::Liability),
        ] {
            let account = ledger
                .create_account(NewAccount {
                    entity_id: entity.id,
                    code: code.into(),
                    name: code.into(),
                    account_type,
                    is_bank_account: false,
                    is_active: true,
                })
                .await
                .unwrap();
            ids.push(account.id);
        }

        let customer =
            Contact::register(entity.id, ContactType::Customer, "Harbour Builders", None, None, Utc::now())
                .unwrap();
        store.insert_contact(&customer).await.unwrap();

        Fixture {
            workflow: InvoiceWorkflow::new(ledger, store.clone(), store.clone()),
            store,
            entity_id: entity.id,
            customer,
            bank: ids[0],
            receivable: ids[1],
            revenue: ids[2],
            gst: ids[3],
        }
    }

    fn new_invoice(fx: &Fixture, number: &str) -> NewInvoice {
        NewInvoice {
            entity_id: fx.entity_id,
            contact_id: fx.customer.id,
            number: number.into(),
            issue_date: day(1),
            due_date: day(31),
            currency_code: None,
            subtotal_amount: Money::from_major(1000),
            tax_amount: Money::from_major(100),
            external_ref: None,
        }
    }

    fn payment(fx: &Fixture, amount: i64) -> RecordPayment {
        RecordPayment {
            amount: Money::from_major(amount),
            date: day(15),
            method: PaymentMethod::BankTransfer,
            external_ref: None,
            bank_account_id: fx.bank,
            receivable_account_id: fx.receivable,
        }
    }

    #[tokio::test]
    async fn invoice_is_posted_then_settled_in_two_payments() {
        let fx = fixture().await;
        let invoice = fx.workflow.create_invoice(new_invoice(&fx, "INV-001")).await.unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.total_amount, Money::from_major(1100));

        let (sent, journal) = fx
            .workflow
            .post_invoice(invoice.id, fx.receivable, fx.revenue, Some(fx.gst))
            .await
            .unwrap();
        assert_eq!(sent.status, InvoiceStatus::Sent);
        assert_eq!(journal.lines.len(), 3);

        let first = fx.workflow.record_payment(invoice.id, payment(&fx, 600)).await.unwrap();
        assert_eq!(first.invoice.status, InvoiceStatus::Partial);

        let second = fx.workflow.record_payment(invoice.id, payment(&fx, 500)).await.unwrap();
        assert_eq!(second.invoice.status, InvoiceStatus::Paid);
        assert_eq!(fx.store.applications_for(invoice.id).await.unwrap().len(), 2);

        let reports = ReportingEngine::new(fx.store.clone(), fx.store.clone(), fx.store.clone());
        let tb = reports.trial_balance(fx.entity_id, day(31)).await.unwrap();
        assert!(tb.is_balanced);
        let receivable = tb.accounts.iter().find(|r| r.account_id == fx.receivable).unwrap();
        assert!(receivable.balance.is_zero());
    }

    #[tokio::test]
    async fn posting_twice_is_rejected() {
        let fx = fixture().await;
        let invoice = fx.workflow.create_invoice(new_invoice(&fx, "INV-002")).await.unwrap();
        fx.workflow
            .post_invoice(invoice.id, fx.receivable, fx.revenue, Some(fx.gst))
            .await
            .unwrap();
        let err = fx
            .workflow
            .post_invoice(invoice.id, fx.receivable, fx.revenue, Some(fx.gst))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Only DRAFT invoices can be posted");
    }

    #[tokio::test]
    async fn overpayment_leaves_no_payment_behind() {
        let fx = fixture().await;
        let invoice = fx.workflow.create_invoice(new_invoice(&fx, "INV-003")).await.unwrap();

        assert!(fx.workflow.record_payment(invoice.id, payment(&fx, 2000)).await.is_err());
        assert!(fx.store.applications_for(invoice.id).await.unwrap().is_empty());
        assert_eq!(fx.workflow.get_invoice(invoice.id).await.unwrap().status, InvoiceStatus::Draft);
    }

    #[tokio::test]
    async fn failed_receipt_posting_stores_no_payment() {
        let fx = fixture().await;
        let invoice = fx.workflow.create_invoice(new_invoice(&fx, "INV-004")).await.unwrap();
        let mut bad = payment(&fx, 100);
        bad.bank_account_id = AccountId::new();

        let err = fx.workflow.record_payment(invoice.id, bad).await.unwrap_err();
        assert_eq!(err.to_string(), "Account not found");
        assert!(fx.store.applications_for(invoice.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_number_and_non_customer_are_rejected() {
        let fx = fixture().await;
        fx.workflow.create_invoice(new_invoice(&fx, "INV-005")).await.unwrap();
        let err = fx.workflow.create_invoice(new_invoice(&fx, "INV-005")).await.unwrap_err();
        assert_eq!(err.to_string(), "Invoice number INV-005 already exists for this entity");

        let supplier =
            Contact::register(fx.entity_id, ContactType::Supplier, "Big Lift", None, None, Utc::now()).unwrap();
        fx.store.insert_contact(&supplier).await.unwrap();
        let mut input = new_invoice(&fx, "INV-006");
        input.contact_id = supplier.id;
        let err = fx.workflow.create_invoice(input).await.unwrap_err();
        assert_eq!(err.to_string(), "Contact must be of type CUSTOMER");
    }
}
