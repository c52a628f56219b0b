//! Supplier bills: the accounts-payable side.
//!
//! A bill moves through the same status lifecycle as an invoice. Posting
//! recognizes the expense and the payable; each outgoing payment clears part of
//! the payable and the status is refolded from every application on record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use craneledger_accounting::{JournalLineInput, PostJournalEntry, SourceSystem};
use craneledger_core::{AccountId, BillId, ContactId, DomainError, DomainResult, EntityId, Money, PaymentId};

use crate::invoice::{
    currency_or_default, ensure_settles_within, status_for_paid, validate_document, InvoiceStatus,
    Payment, PaymentDirection, PaymentMethod,
};

/// Bills share the invoice status set.
pub type BillStatus = InvoiceStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBill {
    pub entity_id: EntityId,
    pub contact_id: ContactId,
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub currency_code: Option<String>,
    pub subtotal_amount: Money,
    #[serde(default)]
    pub tax_amount: Money,
    #[serde(default)]
    pub external_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: BillId,
    pub entity_id: EntityId,
    pub contact_id: ContactId,
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: BillStatus,
    pub currency_code: String,
    pub subtotal_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    pub fn draft(input: NewBill, now: DateTime<Utc>) -> DomainResult<Self> {
        let (number, total_amount) = validate_document(
            "bill",
            &input.number,
            input.issue_date,
            input.due_date,
            input.subtotal_amount,
            input.tax_amount,
        )?;

        Ok(Self {
            id: BillId::new(),
            entity_id: input.entity_id,
            contact_id: input.contact_id,
            number,
            issue_date: input.issue_date,
            due_date: input.due_date,
            status: BillStatus::Draft,
            currency_code: currency_or_default(input.currency_code),
            subtotal_amount: input.subtotal_amount,
            tax_amount: input.tax_amount,
            total_amount,
            external_ref: input.external_ref,
            created_at: now,
            updated_at: now,
        })
    }

    /// DR expense (subtotal), DR tax asset (tax), CR payable (total).
    pub fn posting_request(
        &self,
        payable_account_id: AccountId,
        expense_account_id: AccountId,
        tax_asset_account_id: Option<AccountId>,
    ) -> DomainResult<PostJournalEntry> {
        if self.status != BillStatus::Draft {
            return Err(DomainError::validation("Only DRAFT bills can be posted"));
        }

        let number = &self.number;
        let mut request = PostJournalEntry::new(
            self.entity_id,
            self.issue_date,
            format!("Bill {number} - {}", self.contact_id),
            SourceSystem::CraneledgerManual,
        )
        .with_reference(format!("BILL_{}", self.id));
        if self.subtotal_amount.is_positive() {
            request = request.with_line(
                JournalLineInput::debit(expense_account_id, self.subtotal_amount)
                    .with_memo(format!("Bill {number} - Expense")),
            );
        }
        request = request.with_line(
            JournalLineInput::credit(payable_account_id, self.total_amount)
                .with_memo(format!("Bill {number}")),
        );
        if self.tax_amount.is_positive() {
            let tax_account = tax_asset_account_id.ok_or_else(|| {
                DomainError::validation("taxAssetAccountId is required when the bill carries tax")
            })?;
            request = request.with_line(
                JournalLineInput::debit(tax_account, self.tax_amount)
                    .with_memo(format!("Bill {number} - GST on Expenses")),
            );
        }
        Ok(request)
    }

    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.status = BillStatus::Sent;
        self.updated_at = now;
    }

    pub fn ensure_payable(&self, amount: Money, applied: &[BillPaymentApplication]) -> DomainResult<()> {
        let paid = Money::sum(applied.iter().map(|a| a.amount_applied));
        ensure_settles_within("bill", self.status, self.total_amount, paid, amount)
    }

    /// Journal request for a payment made: DR payable, CR bank.
    pub fn payment_request(
        &self,
        payment: &Payment,
        bank_account_id: AccountId,
        payable_account_id: AccountId,
    ) -> PostJournalEntry {
        let memo = format!("Payment made - Bill {}", self.number);
        PostJournalEntry::new(
            self.entity_id,
            payment.date,
            format!("Payment for Bill {}", self.number),
            SourceSystem::CraneledgerManual,
        )
        .with_reference(format!("PAYMENT_{}", payment.id))
        .with_line(JournalLineInput::debit(payable_account_id, payment.amount).with_memo(memo.clone()))
        .with_line(JournalLineInput::credit(bank_account_id, payment.amount).with_memo(memo))
    }

    pub fn apply_recomputed_status(&mut self, applied: &[BillPaymentApplication], now: DateTime<Utc>) {
        let paid = Money::sum(applied.iter().map(|a| a.amount_applied));
        self.status = status_for_paid(self.status, self.total_amount, paid);
        self.updated_at = now;
    }
}

impl Payment {
    /// Outgoing payment to the bill's supplier, in the bill currency.
    pub fn outgoing_for(
        bill: &Bill,
        amount: Money,
        date: NaiveDate,
        method: PaymentMethod,
        external_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            entity_id: bill.entity_id,
            contact_id: bill.contact_id,
            direction: PaymentDirection::Outgoing,
            amount,
            currency_code: bill.currency_code.clone(),
            date,
            method,
            external_ref,
            created_at: now,
        }
    }
}

/// Link between an outgoing payment and the bill it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillPaymentApplication {
    pub bill_id: BillId,
    pub payment_id: PaymentId,
    pub amount_applied: Money,
}

#[cfg(test)]
mod tests {
    use super::*;
    use craneledger_accounting::validate_lines;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    fn test_bill(subtotal: i64, tax: i64) -> Bill {
        Bill::draft(
            NewBill {
                entity_id: EntityId::new(),
                contact_id: ContactId::new(),
                number: "BILL-0001".into(),
                issue_date: test_date(),
                due_date: test_date(),
                currency_code: Some("aud".into()),
                subtotal_amount: Money::from_major(subtotal),
                tax_amount: Money::from_major(tax),
                external_ref: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn applied(bill: &Bill, amount: i64) -> BillPaymentApplication {
        BillPaymentApplication {
            bill_id: bill.id,
            payment_id: PaymentId::new(),
            amount_applied: Money::from_major(amount),
        }
    }

    #[test]
    fn posting_debits_expense_and_gst_and_credits_payable() {
        let bill = test_bill(2000, 200);
        assert_eq!(bill.currency_code, "AUD");
        let (payable, expense, gst) = (AccountId::new(), AccountId::new(), AccountId::new());

        let request = bill.posting_request(payable, expense, Some(gst)).unwrap();
        assert_eq!(request.source_reference, Some(format!("BILL_{}", bill.id)));
        assert!(validate_lines(&request.lines).is_ok());

        let line = |id| request.lines.iter().find(|l| l.account_id == id).unwrap();
        assert_eq!(line(expense).debit, Money::from_major(2000));
        assert_eq!(line(gst).debit, Money::from_major(200));
        assert_eq!(line(payable).credit, Money::from_major(2200));
    }

    #[test]
    fn taxed_bill_needs_a_tax_asset_account() {
        let bill = test_bill(100, 10);
        assert_eq!(
            bill.posting_request(AccountId::new(), AccountId::new(), None).unwrap_err(),
            DomainError::validation("taxAssetAccountId is required when the bill carries tax")
        );
        assert_eq!(test_bill(100, 0).posting_request(AccountId::new(), AccountId::new(), None).unwrap().lines.len(), 2);
    }

    #[test]
    fn only_draft_bills_can_be_posted() {
        let mut bill = test_bill(10, 0);
        bill.mark_sent(Utc::now());
        assert_eq!(
            bill.posting_request(AccountId::new(), AccountId::new(), None).unwrap_err(),
            DomainError::validation("Only DRAFT bills can be posted")
        );
    }

    #[test]
    fn payment_debits_payable_and_credits_bank() {
        let bill = test_bill(500, 0);
        let payment = Payment::outgoing_for(&bill, Money::from_major(500), test_date(), PaymentMethod::BankTransfer, None, Utc::now());
        assert_eq!(payment.direction, PaymentDirection::Outgoing);

        let (bank, payable) = (AccountId::new(), AccountId::new());
        let request = bill.payment_request(&payment, bank, payable);
        assert_eq!(request.lines[0].account_id, payable);
        assert!(request.lines[0].debit.is_positive());
        assert_eq!(request.lines[1].account_id, bank);
        assert!(request.lines[1].credit.is_positive());
        assert_eq!(request.description, "Payment for Bill BILL-0001");
    }

    #[test]
    fn status_follows_applied_payments() {
        let mut bill = test_bill(1000, 0);
        bill.mark_sent(Utc::now());

        let first = [applied(&bill, 300)];
        bill.apply_recomputed_status(&first, Utc::now());
        assert_eq!(bill.status, BillStatus::Partial);

        let both = [first[0], applied(&bill, 700)];
        bill.apply_recomputed_status(&both, Utc::now());
        assert_eq!(bill.status, BillStatus::Paid);
    }

    #[test]
    fn voided_and_overpaid_bills_reject_payment() {
        let mut bill = test_bill(100, 0);
        assert!(bill.ensure_payable(Money::from_major(80), &[applied(&bill, 30)]).is_err());
        assert!(bill.ensure_payable(Money::from_major(70), &[applied(&bill, 30)]).is_ok());

        bill.status = BillStatus::Voided;
        assert_eq!(
            bill.ensure_payable(Money::from_major(1), &[]).unwrap_err(),
            DomainError::validation("Cannot record payment for voided bill")
        );
    }

    #[test]
    fn blank_number_is_rejected() {
        let err = Bill::draft(
            NewBill {
                entity_id: EntityId::new(),
                contact_id: ContactId::new(),
                number: "  ".into(),
                issue_date: test_date(),
                due_date: test_date(),
                currency_code: None,
                subtotal_amount: Money::from_major(1),
                tax_amount: Money::ZERO,
                external_ref: None,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::validation("bill number is required"));
    }
}
