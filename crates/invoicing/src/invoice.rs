use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use craneledger_accounting::{JournalLineInput, PostJournalEntry, SourceSystem, DEFAULT_CURRENCY};
use craneledger_core::{
    AccountId, ContactId, DomainError, DomainResult, EntityId, InvoiceId, Money, PaymentId,
};

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Partial,
    Paid,
    Voided,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "DRAFT",
            InvoiceStatus::Sent => "SENT",
            InvoiceStatus::Partial => "PARTIAL",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Voided => "VOIDED",
        }
    }
}

impl FromStr for InvoiceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(InvoiceStatus::Draft),
            "SENT" => Ok(InvoiceStatus::Sent),
            "PARTIAL" => Ok(InvoiceStatus::Partial),
            "PAID" => Ok(InvoiceStatus::Paid),
            "VOIDED" => Ok(InvoiceStatus::Voided),
            other => Err(DomainError::validation(format!("unknown invoice status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewInvoice {
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
pub struct Invoice {
    pub id: InvoiceId,
    pub entity_id: EntityId,
    pub contact_id: ContactId,
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    pub currency_code: String,
    pub subtotal_amount: Money,
    pub tax_amount: Money,
    pub total_amount: Money,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Create a DRAFT invoice; total is subtotal plus tax.
    pub fn draft(input: NewInvoice, now: DateTime<Utc>) -> DomainResult<Self> {
        let (number, total_amount) = validate_document(
            "invoice",
            &input.number,
            input.issue_date,
            input.due_date,
            input.subtotal_amount,
            input.tax_amount,
        )?;

        Ok(Self {
            id: InvoiceId::new(),
            entity_id: input.entity_id,
            contact_id: input.contact_id,
            number,
            issue_date: input.issue_date,
            due_date: input.due_date,
            status: InvoiceStatus::Draft,
            currency_code: currency_or_default(input.currency_code),
            subtotal_amount: input.subtotal_amount,
            tax_amount: input.tax_amount,
            total_amount,
            external_ref: input.external_ref,
            created_at: now,
            updated_at: now,
        })
    }

    /// Journal request recognizing the receivable:
    /// DR receivable (total), CR revenue (subtotal), CR tax liability (tax).
    pub fn posting_request(
        &self,
        receivable_account_id: AccountId,
        revenue_account_id: AccountId,
        tax_liability_account_id: Option<AccountId>,
    ) -> DomainResult<PostJournalEntry> {
        if self.status != InvoiceStatus::Draft {
            return Err(DomainError::validation("Only DRAFT invoices can be posted"));
        }

        let number = &self.number;
        let mut request = PostJournalEntry::new(
            self.entity_id,
            self.issue_date,
            format!("Invoice {number} - {}", self.contact_id),
            SourceSystem::CraneledgerManual,
        )
        .with_reference(format!("INVOICE_{}", self.id))
        .with_line(
            JournalLineInput::debit(receivable_account_id, self.total_amount)
                .with_memo(format!("Invoice {number}")),
        );
        if self.subtotal_amount.is_positive() {
            request = request.with_line(
                JournalLineInput::credit(revenue_account_id, self.subtotal_amount)
                    .with_memo(format!("Invoice {number} - Revenue")),
            );
        }
        if self.tax_amount.is_positive() {
            let tax_account = tax_liability_account_id.ok_or_else(|| {
                DomainError::validation(
                    "taxLiabilityAccountId is required when the invoice carries tax",
                )
            })?;
            request = request.with_line(
                JournalLineInput::credit(tax_account, self.tax_amount)
                    .with_memo(format!("Invoice {number} - GST")),
            );
        }
        Ok(request)
    }

    pub fn mark_sent(&mut self, now: DateTime<Utc>) {
        self.status = InvoiceStatus::Sent;
        self.updated_at = now;
    }

    /// Check a payment of `amount` can be applied given what is already paid.
    pub fn ensure_payable(&self, amount: Money, applied: &[PaymentApplication]) -> DomainResult<()> {
        let paid = Money::sum(applied.iter().map(|a| a.amount_applied));
        ensure_settles_within("invoice", self.status, self.total_amount, paid, amount)
    }

    /// Journal request for a received payment: DR bank, CR receivable.
    pub fn payment_request(
        &self,
        payment: &Payment,
        bank_account_id: AccountId,
        receivable_account_id: AccountId,
    ) -> PostJournalEntry {
        let memo = format!("Payment received - Invoice {}", self.number);
        PostJournalEntry::new(
            self.entity_id,
            payment.date,
            format!("Payment for Invoice {}", self.number),
            SourceSystem::CraneledgerManual,
        )
        .with_reference(format!("PAYMENT_{}", payment.id))
        .with_line(JournalLineInput::debit(bank_account_id, payment.amount).with_memo(memo.clone()))
        .with_line(JournalLineInput::credit(receivable_account_id, payment.amount).with_memo(memo))
    }

    /// Replace the status with the one folded from `applied`.
    pub fn apply_recomputed_status(&mut self, applied: &[PaymentApplication], now: DateTime<Utc>) {
        self.status = recompute_status(self.status, self.total_amount, applied);
        self.updated_at = now;
    }
}

/// Fold every payment application into an invoice status.
///
/// VOIDED is terminal. Otherwise fully paid is PAID, anything paid is PARTIAL
/// and nothing paid leaves the status unchanged.
pub fn recompute_status(
    current: InvoiceStatus,
    total: Money,
    applied: &[PaymentApplication],
) -> InvoiceStatus {
    status_for_paid(current, total, Money::sum(applied.iter().map(|a| a.amount_applied)))
}

/// Status of a document of `total` once `paid` has been applied to it.
pub fn status_for_paid(current: InvoiceStatus, total: Money, paid: Money) -> InvoiceStatus {
    if current == InvoiceStatus::Voided {
        return current;
    }
    if paid.is_positive() && paid >= total {
        InvoiceStatus::Paid
    } else if paid.is_positive() {
        InvoiceStatus::Partial
    } else {
        current
    }
}

/// Checks shared by invoice and bill drafts. Returns the trimmed number and
/// the total.
pub(crate) fn validate_document(
    kind: &str,
    number: &str,
    issue_date: NaiveDate,
    due_date: NaiveDate,
    subtotal: Money,
    tax: Money,
) -> DomainResult<(String, Money)> {
    let number = number.trim();
    if number.is_empty() {
        return Err(DomainError::validation(format!("{kind} number is required")));
    }
    if due_date < issue_date {
        return Err(DomainError::validation("due date must not be before issue date"));
    }
    if subtotal.is_negative() || tax.is_negative() {
        return Err(DomainError::validation(format!("{kind} amounts must be non-negative")));
    }
    let total = Money::try_new((subtotal + tax).as_decimal())?;
    if !total.is_positive() {
        return Err(DomainError::validation(format!("{kind} total must be greater than zero")));
    }
    Ok((number.to_string(), total))
}

pub(crate) fn currency_or_default(code: Option<String>) -> String {
    code.map(|c| c.trim().to_ascii_uppercase())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

/// A payment of `amount` must be positive and must not take `paid` past
/// `total`. Voided documents take no payments.
pub(crate) fn ensure_settles_within(
    kind: &str,
    status: InvoiceStatus,
    total: Money,
    paid: Money,
    amount: Money,
) -> DomainResult<()> {
    if status == InvoiceStatus::Voided {
        return Err(DomainError::validation(format!("Cannot record payment for voided {kind}")));
    }
    if !amount.is_positive() {
        return Err(DomainError::validation("payment amount must be greater than zero"));
    }
    if paid + amount > total {
        return Err(DomainError::validation(format!(
            "payment of {amount} exceeds outstanding balance of {}",
            total - paid
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentDirection {
    Incoming,
    Outgoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Stripe,
    BankTransfer,
    Paypal,
    Cash,
    Other,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Stripe => "STRIPE",
            PaymentMethod::BankTransfer => "BANK_TRANSFER",
            PaymentMethod::Paypal => "PAYPAL",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Other => "OTHER",
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STRIPE" => Ok(PaymentMethod::Stripe),
            "BANK_TRANSFER" => Ok(PaymentMethod::BankTransfer),
            "PAYPAL" => Ok(PaymentMethod::Paypal),
            "CASH" => Ok(PaymentMethod::Cash),
            "OTHER" => Ok(PaymentMethod::Other),
            other => Err(DomainError::validation(format!("unknown payment method: {other}"))),
        }
    }
}

impl PaymentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentDirection::Incoming => "INCOMING",
            PaymentDirection::Outgoing => "OUTGOING",
        }
    }
}

impl FromStr for PaymentDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INCOMING" => Ok(PaymentDirection::Incoming),
            "OUTGOING" => Ok(PaymentDirection::Outgoing),
            other => Err(DomainError::validation(format!("unknown payment direction: {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: PaymentId,
    pub entity_id: EntityId,
    pub contact_id: ContactId,
    pub direction: PaymentDirection,
    pub amount: Money,
    pub currency_code: String,
    pub date: NaiveDate,
    pub method: PaymentMethod,
    pub external_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Incoming payment from the invoice's customer, in the invoice currency.
    pub fn incoming_for(
        invoice: &Invoice,
        amount: Money,
        date: NaiveDate,
        method: PaymentMethod,
        external_ref: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            entity_id: invoice.entity_id,
            contact_id: invoice.contact_id,
            direction: PaymentDirection::Incoming,
            amount,
            currency_code: invoice.currency_code.clone(),
            date,
            method,
            external_ref,
            created_at: now,
        }
    }
}

/// Link between a payment and the invoice it settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentApplication {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub amount_applied: Money,
}

#[cfg(test)]
mod tests {
    use super::*;
    use craneledger_accounting::validate_lines;
    use proptest::prelude::*;

    fn test_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 1).unwrap()
    }

    fn test_invoice(subtotal: i64, tax: i64) -> Invoice {
        Invoice::draft(
            NewInvoice {
                entity_id: EntityId::new(),
                contact_id: ContactId::new(),
                number: "INV-0001".into(),
                issue_date: test_date(),
                due_date: test_date(),
                currency_code: None,
                subtotal_amount: Money::from_major(subtotal),
                tax_amount: Money::from_major(tax),
                external_ref: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn applied(invoice: &Invoice, amount: i64) -> PaymentApplication {
        PaymentApplication {
            invoice_id: invoice.id,
            payment_id: PaymentId::new(),
            amount_applied: Money::from_major(amount),
        }
    }

    #[test]
    fn draft_totals_subtotal_and_tax() {
        let invoice = test_invoice(1000, 100);
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.total_amount, Money::from_major(1100));
        assert_eq!(invoice.currency_code, "AUD");
    }

    #[test]
    fn total_beyond_storable_range_is_rejected() {
        let input = NewInvoice {
            entity_id: EntityId::new(),
            contact_id: ContactId::new(),
            number: "INV-BIG".into(),
            issue_date: test_date(),
            due_date: test_date(),
            currency_code: None,
            subtotal_amount: Money::parse("999999999999999").unwrap(),
            tax_amount: Money::from_major(1),
            external_ref: None,
        };
        let err = Invoice::draft(input, Utc::now()).unwrap_err();
        assert!(err.to_string().starts_with("invalid amount"), "{err}");
    }

    #[test]
    fn posting_request_balances_and_requires_tax_account() {
        let invoice = test_invoice(1000, 100);
        let (ar, revenue, gst) = (AccountId::new(), AccountId::new(), AccountId::new());

        let request = invoice.posting_request(ar, revenue, Some(gst)).unwrap();
        assert_eq!(request.lines.len(), 3);
        assert_eq!(request.source_reference, Some(format!("INVOICE_{}", invoice.id)));
        assert!(validate_lines(&request.lines).is_ok());

        assert!(invoice.posting_request(ar, revenue, None).is_err());
    }

    #[test]
    fn only_drafts_can_be_posted() {
        let mut invoice = test_invoice(10, 0);
        invoice.mark_sent(Utc::now());
        assert_eq!(
            invoice
                .posting_request(AccountId::new(), AccountId::new(), None)
                .unwrap_err(),
            DomainError::validation("Only DRAFT invoices can be posted")
        );
    }

    #[test]
    fn recompute_folds_all_applications() {
        let invoice = test_invoice(1000, 0);
        assert_eq!(recompute_status(InvoiceStatus::Sent, invoice.total_amount, &[]), InvoiceStatus::Sent);
        assert_eq!(
            recompute_status(InvoiceStatus::Sent, invoice.total_amount, &[applied(&invoice, 400)]),
            InvoiceStatus::Partial
        );
        assert_eq!(
            recompute_status(
                InvoiceStatus::Partial,
                invoice.total_amount,
                &[applied(&invoice, 400), applied(&invoice, 600)]
            ),
            InvoiceStatus::Paid
        );
        assert_eq!(
            recompute_status(InvoiceStatus::Voided, invoice.total_amount, &[applied(&invoice, 1000)]),
            InvoiceStatus::Voided
        );
    }

    #[test]
    fn voided_or_overpaid_invoices_reject_payment() {
        let mut invoice = test_invoice(100, 0);
        assert!(invoice.ensure_payable(Money::from_major(60), &[applied(&invoice, 50)]).is_err());
        assert!(invoice.ensure_payable(Money::from_major(50), &[applied(&invoice, 50)]).is_ok());

        invoice.status = InvoiceStatus::Voided;
        assert_eq!(
            invoice.ensure_payable(Money::from_major(1), &[]).unwrap_err(),
            DomainError::validation("Cannot record payment for voided invoice")
        );
    }

    #[test]
    fn payment_request_debits_bank() {
        let invoice = test_invoice(100, 0);
        let payment = Payment::incoming_for(&invoice, Money::from_major(100), test_date(), PaymentMethod::Stripe, None, Utc::now());
        let (bank, ar) = (AccountId::new(), AccountId::new());
        let request = invoice.payment_request(&payment, bank, ar);
        assert_eq!(request.lines[0].account_id, bank);
        assert_eq!(request.lines[1].account_id, ar);
        assert_eq!(request.source_reference, Some(format!("PAYMENT_{}", payment.id)));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Splitting the total into any number of installments ends PAID, and
        /// every proper prefix is PARTIAL.
        #[test]
        fn installments_end_paid(parts in prop::collection::vec(1i64..10_000i64, 1..12)) {
            let total: i64 = parts.iter().sum();
            let invoice = test_invoice(total, 0);
            let mut applications = Vec::new();
            for (i, part) in parts.iter().enumerate() {
                applications.push(applied(&invoice, *part));
                let status = recompute_status(InvoiceStatus::Sent, invoice.total_amount, &applications);
                if i + 1 == parts.len() {
                    prop_assert_eq!(status, InvoiceStatus::Paid);
                } else {
                    prop_assert_eq!(status, InvoiceStatus::Partial);
                }
            }
        }
    }
}
