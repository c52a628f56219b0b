//! Journal lines for booking money movements.
//!
//! GST is 10% and included in the gross amount. The split is computed as
//! `net = round(gross / 1.1)` and `gst = gross - net`, so the credit side always
//! sums exactly to the debit side.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use craneledger_accounting::{JournalLineInput, PostJournalEntry, SourceSystem};
use craneledger_core::{AccountId, ContactId, DomainError, DomainResult, Money};

use crate::booking::{Booking, BookingAccounts, BookingEventType, CancellationScenario};

/// `1.1`: gross-to-net divisor for 10% inclusive GST.
pub const GST_DIVISOR: Decimal = Decimal::from_parts(11, 0, 0, false, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GstSplit {
    pub net: Money,
    pub gst: Money,
}

pub fn gst_inclusive_split(gross: Money, include_gst: bool) -> DomainResult<GstSplit> {
    if !include_gst {
        return Ok(GstSplit { net: gross, gst: Money::ZERO });
    }
    let net = gross.divide(GST_DIVISOR)?;
    Ok(GstSplit { net, gst: gross - net })
}

fn require_positive(amount: Money) -> DomainResult<()> {
    if !amount.is_positive() {
        return Err(DomainError::validation("amount must be greater than zero"));
    }
    Ok(())
}

/// A booking event ready to be posted: its journal lines plus the audit
/// metadata recorded alongside.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingPosting {
    pub event_type: BookingEventType,
    pub amount: Money,
    pub description: String,
    pub lines: Vec<JournalLineInput>,
    pub metadata: serde_json::Value,
}

impl BookingPosting {
    /// Gross received into `debit_account`, split into net income and GST.
    fn gst_inclusive(
        debit_account: AccountId,
        net_account: AccountId,
        gst_account: AccountId,
        gross: Money,
        split: GstSplit,
        memos: [String; 3],
    ) -> Vec<JournalLineInput> {
        let [debit_memo, net_memo, gst_memo] = memos;
        let mut lines = vec![
            JournalLineInput::debit(debit_account, gross).with_memo(debit_memo),
            JournalLineInput::credit(net_account, split.net).with_memo(net_memo),
        ];
        if split.gst.is_positive() {
            lines.push(JournalLineInput::credit(gst_account, split.gst).with_memo(gst_memo));
        }
        lines
    }

    /// DR bank, CR customer deposits held (+ CR GST on income).
    pub fn deposit(
        booking: &Booking,
        amount: Money,
        accounts: &BookingAccounts,
        include_gst: bool,
    ) -> DomainResult<Self> {
        require_positive(amount)?;
        let split = gst_inclusive_split(amount, include_gst)?;
        let ext = &booking.external_booking_id;
        Ok(Self {
            event_type: BookingEventType::Deposit,
            amount,
            description: format!("Deposit received for booking {ext}"),
            lines: Self::gst_inclusive(
                accounts.bank_account_id,
                accounts.customer_deposits_held_account_id,
                accounts.gst_on_income_account_id,
                amount,
                split,
                [
                    format!("Deposit received - Booking {ext}"),
                    format!("Customer deposit held - Booking {ext}"),
                    format!("GST on deposit - Booking {ext}"),
                ],
            ),
            metadata: json!({ "includeGST": include_gst, "gstAmount": split.gst }),
        })
    }

    /// DR bank, CR accounts receivable (+ CR GST on income).
    pub fn balance(
        booking: &Booking,
        amount: Money,
        accounts: &BookingAccounts,
        include_gst: bool,
    ) -> DomainResult<Self> {
        require_positive(amount)?;
        let split = gst_inclusive_split(amount, include_gst)?;
        let ext = &booking.external_booking_id;
        Ok(Self {
            event_type: BookingEventType::Balance,
            amount,
            description: format!("Balance payment for booking {ext}"),
            lines: Self::gst_inclusive(
                accounts.bank_account_id,
                accounts.accounts_receivable_account_id,
                accounts.gst_on_income_account_id,
                amount,
                split,
                [
                    format!("Balance payment received - Booking {ext}"),
                    format!("Balance payment - Booking {ext}"),
                    format!("GST on balance - Booking {ext}"),
                ],
            ),
            metadata: json!({ "includeGST": include_gst, "gstAmount": split.gst }),
        })
    }

    /// DR supplier payouts, CR bank. The booking must have a supplier.
    pub fn payout(booking: &Booking, amount: Money, accounts: &BookingAccounts) -> DomainResult<Self> {
        require_positive(amount)?;
        let supplier_id = booking.ensure_supplier()?;
        let ext = &booking.external_booking_id;
        Ok(Self {
            event_type: BookingEventType::Payout,
            amount,
            description: format!("Supplier payout for booking {ext}"),
            lines: vec![
                JournalLineInput::debit(accounts.supplier_payouts_account_id, amount)
                    .with_memo(format!("Supplier payout - Booking {ext}")),
                JournalLineInput::credit(accounts.bank_account_id, amount)
                    .with_memo(format!("Payment to supplier - Booking {ext}")),
            ],
            metadata: json!({ "supplierId": supplier_id }),
        })
    }

    /// DR customer deposits held, CR margin revenue (+ CR GST on income).
    pub fn margin(
        booking: &Booking,
        amount: Money,
        accounts: &BookingAccounts,
        include_gst: bool,
    ) -> DomainResult<Self> {
        require_positive(amount)?;
        let split = gst_inclusive_split(amount, include_gst)?;
        let ext = &booking.external_booking_id;
        Ok(Self {
            event_type: BookingEventType::Margin,
            amount,
            description: format!("Margin revenue recognized for booking {ext}"),
            lines: Self::gst_inclusive(
                accounts.customer_deposits_held_account_id,
                accounts.margin_revenue_account_id,
                accounts.gst_on_income_account_id,
                amount,
                split,
                [
                    format!("Release deposit for margin - Booking {ext}"),
                    format!("Margin revenue - Booking {ext}"),
                    format!("GST on margin - Booking {ext}"),
                ],
            ),
            metadata: json!({ "includeGST": include_gst, "gstAmount": split.gst }),
        })
    }

    /// Lines for a cancellation. Empty when the booking holds no deposit.
    pub fn cancellation(
        booking: &Booking,
        scenario: CancellationScenario,
        new_supplier_id: Option<ContactId>,
        accounts: &BookingAccounts,
    ) -> DomainResult<Self> {
        booking.check_cancellation(scenario, new_supplier_id)?;
        let deposit = booking.deposit_amount;
        let ext = &booking.external_booking_id;
        let held = accounts.customer_deposits_held_account_id;

        let (description, lines) = match scenario {
            CancellationScenario::DepositKept => (
                format!("Booking cancelled - deposit kept as cancellation fee {ext}"),
                Self::gst_inclusive(
                    held,
                    accounts.margin_revenue_account_id,
                    accounts.gst_on_income_account_id,
                    deposit,
                    gst_inclusive_split(deposit, true)?,
                    [
                        format!("Release deposit (kept) - Booking {ext}"),
                        format!("Cancellation fee revenue - Booking {ext}"),
                        format!("GST on cancellation fee - Booking {ext}"),
                    ],
                ),
            ),
            CancellationScenario::DepositRefunded => (
                format!("Booking cancelled - deposit refunded {ext}"),
                vec![
                    JournalLineInput::debit(held, deposit)
                        .with_memo(format!("Release deposit (refunded) - Booking {ext}")),
                    JournalLineInput::credit(accounts.bank_account_id, deposit)
                        .with_memo(format!("Refund to customer - Booking {ext}")),
                ],
            ),
            CancellationScenario::TransferToNewSupplier => (
                format!("Booking supplier changed - deposit transferred {ext}"),
                vec![
                    JournalLineInput::debit(held, deposit)
                        .with_memo(format!("Transfer from old supplier - Booking {ext}")),
                    JournalLineInput::credit(held, deposit)
                        .with_memo(format!("Transfer to new supplier - Booking {ext}")),
                ],
            ),
        };

        Ok(Self {
            event_type: BookingEventType::Cancel,
            amount: deposit,
            description,
            lines: if deposit.is_positive() { lines } else { Vec::new() },
            metadata: json!({ "scenario": scenario, "newSupplierId": new_supplier_id }),
        })
    }

    /// DR deposits held (or receivables), CR bank.
    pub fn refund(
        booking: &Booking,
        amount: Money,
        accounts: &BookingAccounts,
        refund_from_deposit: bool,
    ) -> DomainResult<Self> {
        require_positive(amount)?;
        let ext = &booking.external_booking_id;
        let source = if refund_from_deposit {
            accounts.customer_deposits_held_account_id
        } else {
            accounts.accounts_receivable_account_id
        };
        Ok(Self {
            event_type: BookingEventType::Refund,
            amount,
            description: format!("Refund issued for booking {ext}"),
            lines: vec![
                JournalLineInput::debit(source, amount)
                    .with_memo(format!("Refund issued - Booking {ext}")),
                JournalLineInput::credit(accounts.bank_account_id, amount)
                    .with_memo(format!("Refund to customer - Booking {ext}")),
            ],
            metadata: json!({ "refundFromDeposit": refund_from_deposit }),
        })
    }

    /// Whether there is anything to post.
    pub fn has_lines(&self) -> bool {
        !self.lines.is_empty()
    }

    /// Journal request for this posting, tagged with the booking's external id.
    pub fn to_request(&self, booking: &Booking, date: NaiveDate) -> PostJournalEntry {
        PostJournalEntry::new(
            booking.entity_id,
            date,
            self.description.clone(),
            SourceSystem::EzycraneApp,
        )
        .with_reference(booking.external_booking_id.clone())
        .with_lines(self.lines.iter().cloned())
    }
}
