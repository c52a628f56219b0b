//! Reporting Engine: read-side aggregation over posted journals and bookings.
//!
//! Statements fold `LedgerStore::posted_lines` into per-account activity and
//! hand it to the pure builders in `craneledger-accounting`. Booking views fold
//! the stored bookings with the builders in `craneledger-bookings`. Nothing
//! here writes.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use tracing::{error, instrument};

use craneledger_accounting::{
    fold_activity, Account, AccountActivity, BalanceSheet, LedgerPeriod, ProfitAndLoss,
    TrialBalance,
};
use craneledger_bookings::{
    booking_summary, margin_report, outstanding_deposits, upcoming_payouts, BookingEventType,
    BookingSummary, MarginReport, OutstandingDeposit, UpcomingPayout,
};
use craneledger_core::{AccountId, ContactId, DomainError, EntityId};

use crate::ledger::LedgerResult;
use crate::store::{BookingStore, ContactStore, LedgerStore};

#[derive(Debug, Clone)]
pub struct ReportingEngine<L, B, C> {
    ledger: L,
    bookings: B,
    contacts: C,
}

impl<L, B, C> ReportingEngine<L, B, C>
where
    L: LedgerStore,
    B: BookingStore,
    C: ContactStore,
{
    pub fn new(ledger: L, bookings: B, contacts: C) -> Self {
        Self {
            ledger,
            bookings,
            contacts,
        }
    }

    /// Every account with activity up to and including `as_of`.
    ///
    /// An unbalanced result means a journal bypassed the engine; it is logged
    /// at error level and still returned so the caller can see the damage.
    #[instrument(skip(self), fields(entity_id = %entity_id), err)]
    pub async fn trial_balance(&self, entity_id: EntityId, as_of: NaiveDate) -> LedgerResult<TrialBalance> {
        let (accounts, activity) = self.activity(entity_id, LedgerPeriod::as_of(as_of)).await?;
        let report = TrialBalance::build(entity_id, as_of, &accounts, &activity);
        if !report.is_balanced {
            error!(
                total_debits = %report.total_debits,
                total_credits = %report.total_credits,
                "trial balance does not balance"
            );
        }
        Ok(report)
    }

    #[instrument(skip(self), fields(entity_id = %entity_id), err)]
    pub async fn profit_and_loss(
        &self,
        entity_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<ProfitAndLoss> {
        let period = LedgerPeriod::between(from, to)?;
        let (accounts, activity) = self.activity(entity_id, period).await?;
        Ok(ProfitAndLoss::build(entity_id, from, to, &accounts, &activity))
    }

    #[instrument(skip(self), fields(entity_id = %entity_id), err)]
    pub async fn balance_sheet(&self, entity_id: EntityId, as_of: NaiveDate) -> LedgerResult<BalanceSheet> {
        let (accounts, activity) = self.activity(entity_id, LedgerPeriod::as_of(as_of)).await?;
        let report = BalanceSheet::build(entity_id, as_of, &accounts, &activity);
        if !report.is_balanced {
            error!(
                total_assets = %report.total_assets,
                total_liabilities = %report.total_liabilities,
                total_equity = %report.total_equity,
                "balance sheet does not balance"
            );
        }
        Ok(report)
    }

    pub async fn booking_summary(
        &self,
        entity_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<BookingSummary> {
        self.require_entity(entity_id).await?;
        let bookings = self.bookings.list_bookings(entity_id).await?;
        Ok(booking_summary(entity_id, from, to, &bookings)?)
    }

    pub async fn outstanding_deposits(&self, entity_id: EntityId) -> LedgerResult<Vec<OutstandingDeposit>> {
        self.require_entity(entity_id).await?;
        let bookings = self.bookings.list_bookings(entity_id).await?;
        let names = self.contact_names(entity_id).await?;
        Ok(outstanding_deposits(&bookings, &names))
    }

    pub async fn upcoming_payouts(&self, entity_id: EntityId) -> LedgerResult<Vec<UpcomingPayout>> {
        self.require_entity(entity_id).await?;
        let bookings = self.bookings.list_bookings(entity_id).await?;
        let paid_out = self
            .bookings
            .bookings_with_event(entity_id, BookingEventType::Payout)
            .await?;
        let names = self.contact_names(entity_id).await?;
        Ok(upcoming_payouts(&bookings, &paid_out, &names))
    }

    pub async fn margin_report(
        &self,
        entity_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> LedgerResult<MarginReport> {
        self.require_entity(entity_id).await?;
        let bookings = self.bookings.list_bookings(entity_id).await?;
        Ok(margin_report(entity_id, from, to, &bookings)?)
    }

    async fn activity(
        &self,
        entity_id: EntityId,
        period: LedgerPeriod,
    ) -> LedgerResult<(Vec<Account>, BTreeMap<AccountId, AccountActivity>)> {
        self.require_entity(entity_id).await?;
        let accounts = self.ledger.list_accounts(entity_id).await?;
        let lines = self.ledger.posted_lines(entity_id, period).await?;
        Ok((accounts, fold_activity(&lines)))
    }

    async fn contact_names(&self, entity_id: EntityId) -> LedgerResult<HashMap<ContactId, String>> {
        Ok(self
            .contacts
            .list_contacts(entity_id)
            .await?
            .into_iter()
            .map(|c| (c.id, c.name))
            .collect())
    }

    async fn require_entity(&self, entity_id: EntityId) -> LedgerResult<()> {
        match self.ledger.get_entity(entity_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::not_found("Entity").into()),
        }
    }
}
