//! Intercompany loan transfer as a two-step saga.
//!
//! ```text
//! LoanTransfer
//!   ↓
//! 1. Lender leg    DR loan to subsidiary / CR bank       (fails → NothingPosted)
//!   ↓
//! 2. Borrower leg  DR bank / CR loan from parent          (fails → PartiallyCompleted)
//!   ↓
//! Completed
//! ```
//!
//! The two entries live in different entities, so there is no shared
//! transaction. A failed second leg is reported with the id of the entry that
//! did post; `compensate` reverses it when an operator decides to unwind.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use craneledger_accounting::{JournalLineInput, PostJournalEntry, PostedJournal, SourceSystem};
use craneledger_core::{AccountId, DomainError, EntityId, JournalEntryId, Money};

use crate::ledger::{LedgerEngine, LedgerError, LedgerResult};
use crate::store::LedgerStore;

/// Loan from `from_entity_id` (lender) to `to_entity_id` (borrower).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTransfer {
    pub from_entity_id: EntityId,
    pub to_entity_id: EntityId,
    pub amount: Money,
    pub date: NaiveDate,
    pub description: String,
    pub from_bank_account_id: AccountId,
    pub from_loan_account_id: AccountId,
    pub to_bank_account_id: AccountId,
    pub to_loan_account_id: AccountId,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl LoanTransfer {
    /// Shared source reference of both legs.
    pub fn reference(&self) -> String {
        format!(
            "INTERCOMPANY_LOAN_FROM_{}_TO_{}",
            self.from_entity_id, self.to_entity_id
        )
    }

    fn lender_leg(&self) -> PostJournalEntry {
        PostJournalEntry::new(
            self.from_entity_id,
            self.date,
            format!("{} - Loan to {}", self.description, self.to_entity_id),
            SourceSystem::CraneledgerManual,
        )
        .with_reference(self.reference())
        .with_line(
            JournalLineInput::debit(self.from_loan_account_id, self.amount)
                .with_memo("Loan advanced to subsidiary"),
        )
        .with_line(JournalLineInput::credit(self.from_bank_account_id, self.amount).with_memo("Cash transferred"))
        .with_created_by(self.created_by.clone())
    }

    fn borrower_leg(&self) -> PostJournalEntry {
        PostJournalEntry::new(
            self.to_entity_id,
            self.date,
            format!("{} - Loan from {}", self.description, self.from_entity_id),
            SourceSystem::CraneledgerManual,
        )
        .with_reference(self.reference())
        .with_line(JournalLineInput::debit(self.to_bank_account_id, self.amount).with_memo("Cash received"))
        .with_line(
            JournalLineInput::credit(self.to_loan_account_id, self.amount)
                .with_memo("Loan received from parent"),
        )
        .with_created_by(self.created_by.clone())
    }
}

/// Progress of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    NotStarted,
    LenderPosted {
        lender_entry_id: JournalEntryId,
    },
    Completed {
        lender_entry_id: JournalEntryId,
        borrower_entry_id: JournalEntryId,
    },
    Compensated {
        lender_entry_id: JournalEntryId,
        reversal_entry_id: JournalEntryId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferOutcome {
    pub state: TransferState,
    pub lender_entry: PostedJournal,
    pub borrower_entry: PostedJournal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// The lender leg was rejected; neither entity changed.
    #[error(transparent)]
    NothingPosted(LedgerError),

    /// The lender leg is on the books but the borrower leg is not.
    #[error(
        "Loan transfer partially completed: entry {posted_entry} was posted but the second leg failed ({error}); reconciliation required"
    )]
    PartiallyCompleted {
        posted_entry: JournalEntryId,
        error: LedgerError,
    },
}

impl TransferError {
    pub fn state(&self) -> TransferState {
        match self {
            TransferError::NothingPosted(_) => TransferState::NotStarted,
            TransferError::PartiallyCompleted { posted_entry, .. } => TransferState::LenderPosted {
                lender_entry_id: *posted_entry,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntercompanyTransfer<S> {
    ledger: LedgerEngine<S>,
}

impl<S> IntercompanyTransfer<S>
where
    S: LedgerStore,
{
    pub fn new(ledger: LedgerEngine<S>) -> Self {
        Self { ledger }
    }

    #[instrument(
        skip(self, transfer),
        fields(from = %transfer.from_entity_id, to = %transfer.to_entity_id, amount = %transfer.amount)
    )]
    pub async fn execute(&self, transfer: &LoanTransfer) -> Result<TransferOutcome, TransferError> {
        if transfer.from_entity_id == transfer.to_entity_id {
            return Err(TransferError::NothingPosted(
                DomainError::validation("Cannot create loan transfer within the same entity").into(),
            ));
        }

        let lender_entry = self
            .ledger
            .post_journal_entry(transfer.lender_leg())
            .await
            .map_err(TransferError::NothingPosted)?;
        info!(lender_entry_id = %lender_entry.entry.id, "lender leg posted");

        let borrower_entry = match self.ledger.post_journal_entry(transfer.borrower_leg()).await {
            Ok(entry) => entry,
            Err(err) => {
                error!(
                    lender_entry_id = %lender_entry.entry.id,
                    error = %err,
                    "borrower leg failed; transfer needs reconciliation"
                );
                return Err(TransferError::PartiallyCompleted {
                    posted_entry: lender_entry.entry.id,
                    error: err,
                });
            }
        };

        Ok(TransferOutcome {
            state: TransferState::Completed {
                lender_entry_id: lender_entry.entry.id,
                borrower_entry_id: borrower_entry.entry.id,
            },
            lender_entry,
            borrower_entry,
        })
    }

    /// Reverse the lender leg of a partially completed transfer.
    pub async fn compensate(
        &self,
        posted_entry: JournalEntryId,
        date: NaiveDate,
    ) -> LedgerResult<(TransferState, PostedJournal)> {
        let reversal = self
            .ledger
            .reverse_journal_entry(
                posted_entry,
                date,
                "Intercompany loan transfer compensation",
                None,
            )
            .await?;
        warn!(
            lender_entry_id = %posted_entry,
            reversal_entry_id = %reversal.entry.id,
            "intercompany transfer compensated"
        );
        Ok((
            TransferState::Compensated {
                lender_entry_id: posted_entry,
                reversal_entry_id: reversal.entry.id,
            },
            reversal,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use craneledger_accounting::{AccountType, LegalEntity, NewAccount};

    use crate::reporting::ReportingEngine;
    use crate::store::InMemoryStore;

    struct Group {
        store: Arc<InMemoryStore>,
        saga: IntercompanyTransfer<Arc<InMemoryStore>>,
        parent: LegalEntity,
        child: LegalEntity,
        transfer: LoanTransfer,
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()
    }

    async fn account(
        ledger: &LedgerEngine<Arc<InMemoryStore>>,
        entity_id: EntityId,
        code: &str,
        account_type: AccountType,
    ) -> AccountId {
        ledger
            .create_account(NewAccount {
                entity_id,
                code: code.into(),
                name: code.into(),
                account_type,
                is_bank_account: code == "1000",
                is_active: true,
            })
            .await
            .unwrap()
            .id
    }

    async fn group() -> Group {
        let store = Arc::new(InMemoryStore::new());
        let ledger = LedgerEngine::new(store.clone());
        let parent = ledger.create_entity("Holdings", None, None).await.unwrap();
        let child = ledger.create_entity("Operations", None, None).await.unwrap();

        let transfer = LoanTransfer {
            from_entity_id: parent.id,
            to_entity_id: child.id,
            amount: Money::from_major(50_000),
            date: day(),
            description: "Working capital".into(),
            from_bank_account_id: account(&ledger, parent.id, "1000", AccountType::Asset).await,
            from_loan_account_id: account(&ledger, parent.id, "1500", AccountType::Asset).await,
            to_bank_account_id: account(&ledger, child.id, "1000", AccountType::Asset).await,
            to_loan_account_id: account(&ledger, child.id, "2500", AccountType::Liability).await,
            created_by: None,
        };

        Group {
            saga: IntercompanyTransfer::new(ledger),
            store,
            parent,
            child,
            transfer,
        }
    }

    #[tokio::test]
    async fn both_legs_post_with_the_shared_reference() {
        let g = group().await;
        let outcome = g.saga.execute(&g.transfer).await.unwrap();

        assert!(matches!(outcome.state, TransferState::Completed { .. }));
        assert_eq!(outcome.lender_entry.entry.entity_id, g.parent.id);
        assert_eq!(outcome.borrower_entry.entry.entity_id, g.child.id);
        let reference = format!("INTERCOMPANY_LOAN_FROM_{}_TO_{}", g.parent.id, g.child.id);
        assert_eq!(outcome.lender_entry.entry.source_reference.as_deref(), Some(reference.as_str()));
        assert_eq!(
            outcome.borrower_entry.entry.description,
            format!("Working capital - Loan from {}", g.parent.id)
        );
        assert_eq!(outcome.lender_entry.lines[0].memo.as_deref(), Some("Loan advanced to subsidiary"));
    }

    #[tokio::test]
    async fn same_entity_transfer_posts_nothing() {
        let g = group().await;
        let mut transfer = g.transfer.clone();
        transfer.to_entity_id = transfer.from_entity_id;

        let err = g.saga.execute(&transfer).await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot create loan transfer within the same entity");
        assert_eq!(err.state(), TransferState::NotStarted);
    }

    #[tokio::test]
    async fn failed_second_leg_is_partial_and_can_be_compensated() {
        let g = group().await;
        let mut transfer = g.transfer.clone();
        transfer.to_loan_account_id = AccountId::new();

        let err = g.saga.execute(&transfer).await.unwrap_err();
        let posted_entry = match &err {
            TransferError::PartiallyCompleted { posted_entry, error } => {
                assert!(error.is_not_found());
                *posted_entry
            }
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(err.state(), TransferState::LenderPosted { lender_entry_id: posted_entry });

        let (state, reversal) = g.saga.compensate(posted_entry, day()).await.unwrap();
        assert_eq!(reversal.entry.reverses, Some(posted_entry));
        assert!(matches!(state, TransferState::Compensated { .. }));

        let reports = ReportingEngine::new(g.store.clone(), g.store.clone(), g.store.clone());
        let tb = reports.trial_balance(g.parent.id, day()).await.unwrap();
        assert!(tb.accounts.iter().all(|row| row.balance.is_zero()));
    }
}
