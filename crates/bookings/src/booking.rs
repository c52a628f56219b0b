use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use craneledger_core::{
    AccountId, BookingEventId, BookingId, ContactId, DomainError, DomainResult, EntityId,
    JournalEntryId, Money,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            other => Err(DomainError::validation(format!("unknown booking status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingEventType {
    Deposit,
    Balance,
    Payout,
    Margin,
    Cancel,
    Refund,
}

impl BookingEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingEventType::Deposit => "DEPOSIT",
            BookingEventType::Balance => "BALANCE",
            BookingEventType::Payout => "PAYOUT",
            BookingEventType::Margin => "MARGIN",
            BookingEventType::Cancel => "CANCEL",
            BookingEventType::Refund => "REFUND",
        }
    }
}

impl FromStr for BookingEventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEPOSIT" => Ok(BookingEventType::Deposit),
            "BALANCE" => Ok(BookingEventType::Balance),
            "PAYOUT" => Ok(BookingEventType::Payout),
            "MARGIN" => Ok(BookingEventType::Margin),
            "CANCEL" => Ok(BookingEventType::Cancel),
            "REFUND" => Ok(BookingEventType::Refund),
            other => Err(DomainError::validation(format!(
                "unknown booking event type: {other}"
            ))),
        }
    }
}

/// How the customer's deposit is treated when a booking is cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationScenario {
    /// Deposit becomes cancellation-fee revenue.
    DepositKept,
    /// Deposit goes back to the customer.
    DepositRefunded,
    /// Deposit stays held; the job moves to another supplier.
    TransferToNewSupplier,
}

/// Accounts a booking posts against. Supplied per call by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingAccounts {
    pub bank_account_id: AccountId,
    pub customer_deposits_held_account_id: AccountId,
    pub accounts_receivable_account_id: AccountId,
    pub margin_revenue_account_id: AccountId,
    pub supplier_payouts_account_id: AccountId,
    pub gst_on_income_account_id: AccountId,
    #[serde(default)]
    pub gst_on_expenses_account_id: Option<AccountId>,
}

/// Input for registering a booking from the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBooking {
    pub external_booking_id: String,
    pub entity_id: EntityId,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub supplier_name: Option<String>,
    #[serde(default)]
    pub supplier_email: Option<String>,
    pub total_job_amount: Money,
    #[serde(default)]
    pub deposit_amount: Option<Money>,
    #[serde(default)]
    pub margin_amount: Option<Money>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: BookingId,
    pub external_booking_id: String,
    pub entity_id: EntityId,
    pub customer_id: ContactId,
    pub supplier_id: Option<ContactId>,
    pub status: BookingStatus,
    pub deposit_amount: Money,
    pub balance_amount: Money,
    pub total_job_amount: Money,
    pub margin_amount: Money,
    pub supplier_payout_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Register a PENDING booking for already-resolved contacts.
    pub fn register(
        input: &NewBooking,
        customer_id: ContactId,
        supplier_id: Option<ContactId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let external_booking_id = input.external_booking_id.trim();
        if external_booking_id.is_empty() {
            return Err(DomainError::validation("externalBookingId is required"));
        }
        let deposit_amount = input.deposit_amount.unwrap_or(Money::ZERO);
        let margin_amount = input.margin_amount.unwrap_or(Money::ZERO);
        for (field, value) in [
            ("totalJobAmount", input.total_job_amount),
            ("depositAmount", deposit_amount),
            ("marginAmount", margin_amount),
        ] {
            if value.is_negative() {
                return Err(DomainError::validation(format!("{field} must be non-negative")));
            }
        }

        Ok(Self {
            id: BookingId::new(),
            external_booking_id: external_booking_id.to_string(),
            entity_id: input.entity_id,
            customer_id,
            supplier_id,
            status: BookingStatus::Pending,
            deposit_amount,
            balance_amount: Money::ZERO,
            total_job_amount: input.total_job_amount,
            margin_amount,
            supplier_payout_amount: Money::ZERO,
            created_at: now,
            updated_at: now,
        })
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.status == BookingStatus::Cancelled {
            return Err(DomainError::validation(format!(
                "Booking {} is cancelled",
                self.external_booking_id
            )));
        }
        Ok(())
    }

    pub fn record_deposit(&mut self, amount: Money, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open()?;
        self.deposit_amount = amount;
        self.status = BookingStatus::Confirmed;
        self.updated_at = now;
        Ok(())
    }

    pub fn record_balance(&mut self, amount: Money, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open()?;
        self.balance_amount = amount;
        self.updated_at = now;
        Ok(())
    }

    pub fn ensure_supplier(&self) -> DomainResult<ContactId> {
        self.supplier_id
            .ok_or_else(|| DomainError::validation("Booking does not have a supplier assigned"))
    }

    pub fn record_payout(&mut self, amount: Money, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open()?;
        self.ensure_supplier()?;
        self.supplier_payout_amount = amount;
        self.updated_at = now;
        Ok(())
    }

    pub fn recognize_margin(&mut self, amount: Money, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_open()?;
        self.margin_amount = amount;
        self.status = BookingStatus::Completed;
        self.updated_at = now;
        Ok(())
    }

    /// Check a cancellation can proceed; returns the supplier to switch to for
    /// a transfer.
    pub fn check_cancellation(
        &self,
        scenario: CancellationScenario,
        new_supplier_id: Option<ContactId>,
    ) -> DomainResult<Option<ContactId>> {
        if self.status == BookingStatus::Cancelled {
            return Err(DomainError::validation("Booking is already cancelled"));
        }
        match scenario {
            CancellationScenario::TransferToNewSupplier => new_supplier_id
                .map(Some)
                .ok_or_else(|| {
                    DomainError::validation("New supplier ID required for transfer scenario")
                }),
            CancellationScenario::DepositKept | CancellationScenario::DepositRefunded => Ok(None),
        }
    }

    pub fn cancel(
        &mut self,
        scenario: CancellationScenario,
        new_supplier_id: Option<ContactId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        match self.check_cancellation(scenario, new_supplier_id)? {
            Some(supplier_id) => self.supplier_id = Some(supplier_id),
            None => self.status = BookingStatus::Cancelled,
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Audit record of one money movement on a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEvent {
    pub id: BookingEventId,
    pub booking_id: BookingId,
    #[serde(rename = "type")]
    pub event_type: BookingEventType,
    pub amount: Money,
    pub journal_entry_id: Option<JournalEntryId>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl BookingEvent {
    pub fn new(
        booking_id: BookingId,
        event_type: BookingEventType,
        amount: Money,
        journal_entry_id: Option<JournalEntryId>,
        metadata: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: BookingEventId::new(),
            booking_id,
            event_type,
            amount,
            journal_entry_id,
            metadata,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_booking(supplier: Option<ContactId>) -> Booking {
        let input = NewBooking {
            external_booking_id: "EZY-1001".into(),
            entity_id: EntityId::new(),
            customer_name: "Harbour Builders".into(),
            customer_email: None,
            supplier_name: None,
            supplier_email: None,
            total_job_amount: Money::from_major(5500),
            deposit_amount: None,
            margin_amount: None,
        };
        Booking::register(&input, ContactId::new(), supplier, Utc::now()).unwrap()
    }

    #[test]
    fn register_starts_pending_with_zero_amounts() {
        let booking = test_booking(None);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert!(booking.deposit_amount.is_zero());
        assert!(booking.supplier_payout_amount.is_zero());
    }

    #[test]
    fn deposit_then_margin_completes_the_booking() {
        let mut booking = test_booking(None);
        booking.record_deposit(Money::from_major(1100), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);

        booking.recognize_margin(Money::from_major(550), Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Completed);
        assert_eq!(booking.margin_amount, Money::from_major(550));
    }

    #[test]
    fn payout_requires_a_supplier() {
        let mut booking = test_booking(None);
        assert_eq!(
            booking.record_payout(Money::from_major(10), Utc::now()).unwrap_err(),
            DomainError::validation("Booking does not have a supplier assigned")
        );

        let mut with_supplier = test_booking(Some(ContactId::new()));
        with_supplier.record_payout(Money::from_major(10), Utc::now()).unwrap();
        assert_eq!(with_supplier.supplier_payout_amount, Money::from_major(10));
    }

    #[test]
    fn transfer_keeps_status_and_swaps_supplier() {
        let mut booking = test_booking(Some(ContactId::new()));
        booking.record_deposit(Money::from_major(100), Utc::now()).unwrap();
        let replacement = ContactId::new();

        assert!(booking
            .cancel(CancellationScenario::TransferToNewSupplier, None, Utc::now())
            .is_err());
        booking
            .cancel(CancellationScenario::TransferToNewSupplier, Some(replacement), Utc::now())
            .unwrap();
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.supplier_id, Some(replacement));
    }

    #[test]
    fn cancelling_twice_is_rejected() {
        let mut booking = test_booking(None);
        booking.cancel(CancellationScenario::DepositRefunded, None, Utc::now()).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(
            booking
                .cancel(CancellationScenario::DepositKept, None, Utc::now())
                .unwrap_err(),
            DomainError::validation("Booking is already cancelled")
        );
        assert!(booking.record_deposit(Money::from_major(1), Utc::now()).is_err());
    }
}
