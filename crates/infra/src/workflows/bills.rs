//! Accounts-payable workflow: draft, post and pay supplier bills.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use craneledger_accounting::PostedJournal;
use craneledger_core::{AccountId, BillId, DomainError, EntityId, Money};
use craneledger_invoicing::{Bill, BillPaymentApplication, NewBill, Payment, PaymentMethod};
use craneledger_parties::ContactType;

use crate::ledger::{LedgerEngine, LedgerResult};
use crate::store::{BillStore, ContactStore, LedgerStore, StoreError};

/// Contacts a bill may be raised against.
const PAYABLE_ROLES: [ContactType; 2] = [ContactType::Supplier, ContactType::Intercompany];

/// A payment made against one bill plus the accounts it posts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordBillPayment {
    pub amount: Money,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    #[serde(default)]
    pub external_ref: Option<String>,
    pub bank_account_id: AccountId,
    pub payable_account_id: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPaymentReceipt {
    pub bill: Bill,
    pub payment: Payment,
    pub journal: PostedJournal,
}

#[derive(Debug, Clone)]
pub struct BillWorkflow<L, B, C> {
    ledger: LedgerEngine<L>,
    bills: B,
    contacts: C,
}

impl<L, B, C> BillWorkflow<L, B, C>
where
    L: LedgerStore,
    B: BillStore,
    C: ContactStore,
{
    pub fn new(ledger: LedgerEngine<L>, bills: B, contacts: C) -> Self {
        Self {
            ledger,
            bills,
            contacts,
        }
    }

    #[instrument(skip(self, input), fields(entity_id = %input.entity_id, number = %input.number), err)]
    pub async fn create_bill(&self, input: NewBill) -> LedgerResult<Bill> {
        self.ledger.get_entity(input.entity_id).await?;
        let contact = self
            .contacts
            .get_contact(input.contact_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Contact"))?;
        contact.ensure_one_of(input.entity_id, &PAYABLE_ROLES)?;

        let bill = Bill::draft(input, Utc::now())?;
        match self.bills.insert_bill(&bill).await {
            Ok(()) => Ok(bill),
            Err(StoreError::Conflict(_)) => Err(DomainError::validation(format!(
                "Bill number {} already exists for this entity",
                bill.number
            ))
            .into()),
            Err(err) => Err(err.into()),
        }
    }

    /// Recognize the expense and payable, then move the bill to SENT.
    #[instrument(skip(self), fields(bill_id = %id), err)]
    pub async fn post_bill(
        &self,
        id: BillId,
        payable_account_id: AccountId,
        expense_account_id: AccountId,
        tax_asset_account_id: Option<AccountId>,
    ) -> LedgerResult<(Bill, PostedJournal)> {
        let mut bill = self.get_bill(id).await?;
        let request = bill.posting_request(payable_account_id, expense_account_id, tax_asset_account_id)?;
        let journal = self.ledger.post_journal_entry(request).await?;

        bill.mark_sent(Utc::now());
        self.bills.update_bill(&bill).await?;
        info!(journal_entry_id = %journal.entry.id, "bill posted");
        Ok((bill, journal))
    }

    #[instrument(skip(self, input), fields(bill_id = %id, amount = %input.amount), err)]
    pub async fn record_payment(&self, id: BillId, input: RecordBillPayment) -> LedgerResult<BillPaymentReceipt> {
        let mut bill = self.get_bill(id).await?;
        let applied = self.bills.bill_applications_for(id).await?;
        bill.ensure_payable(input.amount, &applied)?;

        let now = Utc::now();
        let payment = Payment::outgoing_for(
            &bill,
            input.amount,
            input.date,
            input.method,
            input.external_ref,
            now,
        );
        let journal = self
            .ledger
            .post_journal_entry(bill.payment_request(&payment, input.bank_account_id, input.payable_account_id))
            .await?;

        let application = BillPaymentApplication {
            bill_id: bill.id,
            payment_id: payment.id,
            amount_applied: payment.amount,
        };
        self.bills.insert_bill_payment(&payment, &application).await?;

        let applied = self.bills.bill_applications_for(id).await?;
        bill.apply_recomputed_status(&applied, now);
        self.bills.update_bill(&bill).await?;
        info!(
            payment_id = %payment.id,
            status = bill.status.as_str(),
            "bill payment recorded"
        );

        Ok(BillPaymentReceipt {
            bill,
            payment,
            journal,
        })
    }

    pub async fn get_bill(&self, id: BillId) -> LedgerResult<Bill> {
        self.bills
            .get_bill(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Bill").into())
    }

    pub async fn list_bills(&self, entity_id: EntityId) -> LedgerResult<Vec<Bill>> {
        Ok(self.bills.list_bills(entity_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use craneledger_accounting::{AccountType, NewAccount};
    use craneledger_invoicing::BillStatus;
    use craneledger_parties::Contact;

    use crate::reporting::ReportingEngine;
    use crate::store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        workflow: BillWorkflow<Arc<InMemoryStore>, Arc<InMemoryStore>, Arc<InMemoryStore>>,
        entity_id: EntityId,
        supplier: Contact,
        bank: AccountId,
        gst_paid: AccountId,
        payable: AccountId,
        hire_costs: AccountId,
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, d).unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let ledger = LedgerEngine::new(store.clone());
        let entity = ledger.create_entity("Crane Hire Pty Ltd", None, None).await.unwrap();

        let mut ids = Vec::new();
        for (code, account_type) in [
            ("1000", AccountType::Asset),
            ("1300", AccountType::Asset),
            ("2000", AccountType::Liability),
            ("5100", AccountType::Expense),
        ] {
            let account = ledger
                .create_account(NewAccount {
                    entity_id: entity.id,
                    code: code.into(),
                    name: code.into(),
                    account_type,
                    is_bank_account: code == "1000",
                    is_active: true,
                })
                .await
                .unwrap();
            ids.push(account.id);
        }

        let supplier =
            Contact::register(entity.id, ContactType::Supplier, "Big Lift Cranes", None, None, Utc::now()).unwrap();
        store.insert_contact(&supplier).await.unwrap();

        Fixture {
            workflow: BillWorkflow::new(ledger, store.clone(), store.clone()),
            store,
            entity_id: entity.id,
            supplier,
            bank: ids[0],
            gst_paid: ids[1],
            payable: ids[2],
            hire_costs: ids[3],
        }
    }

    fn new_bill(fx: &Fixture, number: &str) -> NewBill {
        NewBill {
            entity_id: fx.entity_id,
            contact_id: fx.supplier.id,
            number: number.into(),
            issue_date: day(1),
            due_date: day(30),
            currency_code: None,
            subtotal_amount: Money::from_major(2000),
            tax_amount: Money::from_major(200),
            external_ref: None,
        }
    }

    fn payment(fx: &Fixture, amount: i64) -> RecordBillPayment {
        RecordBillPayment {
            amount: Money::from_major(amount),
            date: day(20),
            method: PaymentMethod::BankTransfer,
            external_ref: Some("EFT-889".into()),
            bank_account_id: fx.bank,
            payable_account_id: fx.payable,
        }
    }

    #[tokio::test]
    async fn bill_is_posted_then_paid_off() {
        let fx = fixture().await;
        let bill = fx.workflow.create_bill(new_bill(&fx, "BIG-100")).await.unwrap();
        assert_eq!(bill.status, BillStatus::Draft);
        assert_eq!(bill.total_amount, Money::from_major(2200));

        let (sent, journal) = fx
            .workflow
            .post_bill(bill.id, fx.payable, fx.hire_costs, Some(fx.gst_paid))
            .await
            .unwrap();
        assert_eq!(sent.status, BillStatus::Sent);
        assert_eq!(journal.lines.len(), 3);
        assert_eq!(journal.entry.source_reference, Some(format!("BILL_{}", bill.id)));

        let first = fx.workflow.record_payment(bill.id, payment(&fx, 1000)).await.unwrap();
        assert_eq!(first.bill.status, BillStatus::Partial);
        let second = fx.workflow.record_payment(bill.id, payment(&fx, 1200)).await.unwrap();
        assert_eq!(second.bill.status, BillStatus::Paid);
        assert_eq!(fx.store.bill_applications_for(bill.id).await.unwrap().len(), 2);

        let reports = ReportingEngine::new(fx.store.clone(), fx.store.clone(), fx.store.clone());
        let tb = reports.trial_balance(fx.entity_id, day(30)).await.unwrap();
        assert!(tb.is_balanced);
        let balance = |id: AccountId| tb.accounts.iter().find(|r| r.account_id == id).unwrap().balance;
        assert!(balance(fx.payable).is_zero());
        assert_eq!(balance(fx.hire_costs), Money::from_major(2000));
        assert_eq!(balance(fx.bank), Money::from_major(-2200));
    }

    #[tokio::test]
    async fn intercompany_contact_may_bill_but_customer_may_not() {
        let fx = fixture().await;
        let sister =
            Contact::register(fx.entity_id, ContactType::Intercompany, "Crane Holdings", None, None, Utc::now())
                .unwrap();
        let customer =
            Contact::register(fx.entity_id, ContactType::Customer, "Harbour Builders", None, None, Utc::now())
                .unwrap();
        fx.store.insert_contact(&sister).await.unwrap();
        fx.store.insert_contact(&customer).await.unwrap();

        let mut input = new_bill(&fx, "IC-1");
        input.contact_id = sister.id;
        assert!(fx.workflow.create_bill(input).await.is_ok());

        let mut input = new_bill(&fx, "C-1");
        input.contact_id = customer.id;
        let err = fx.workflow.create_bill(input).await.unwrap_err();
        assert_eq!(err.to_string(), "Contact must be of type SUPPLIER or INTERCOMPANY");
    }

    #[tokio::test]
    async fn duplicate_number_is_rejected() {
        let fx = fixture().await;
        fx.workflow.create_bill(new_bill(&fx, "BIG-101")).await.unwrap();
        let err = fx.workflow.create_bill(new_bill(&fx, "BIG-101")).await.unwrap_err();
        assert_eq!(err.to_string(), "Bill number BIG-101 already exists for this entity");
    }

    #[tokio::test]
    async fn rejected_payments_leave_nothing_behind() {
        let fx = fixture().await;
        let bill = fx.workflow.create_bill(new_bill(&fx, "BIG-102")).await.unwrap();

        assert!(fx.workflow.record_payment(bill.id, payment(&fx, 5000)).await.is_err());

        let mut bad = payment(&fx, 100);
        bad.bank_account_id = AccountId::new();
        let err = fx.workflow.record_payment(bill.id, bad).await.unwrap_err();
        assert_eq!(err.to_string(), "Account not found");

        assert!(fx.store.bill_applications_for(bill.id).await.unwrap().is_empty());
        assert_eq!(fx.workflow.get_bill(bill.id).await.unwrap().status, BillStatus::Draft);
    }

    #[tokio::test]
    async fn unknown_bill_is_not_found() {
        let fx = fixture().await;
        let err = fx.workflow.get_bill(BillId::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "Bill not found");
    }
}
