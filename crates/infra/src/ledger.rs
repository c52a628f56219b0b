//! Ledger Engine: the only write path into the journal.
//!
//! ## Posting Flow
//!
//! ```text
//! PostJournalEntry
//!   ↓
//! 1. Pure validation (non-empty, signs, one side per line, balance)
//!   ↓
//! 2. Referential checks (entity, accounts, tax codes belong to the entity)
//!   ↓
//! 3. Derive per-line tax, assign ids
//!   ↓
//! 4. Persist header + lines as one unit (`LedgerStore::insert_journal`)
//! ```
//!
//! Nothing touches the store before step 1 passes, and step 4 either writes
//! every row or none. Reversals are ordinary postings built from the original
//! entry, so they go through the same checks.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument, warn};

use craneledger_accounting::{
    Account, JournalEntry, LegalEntity, NewAccount, PostJournalEntry, PostedJournal, TaxCode,
};
use craneledger_core::{AccountId, DomainError, EntityId, JournalEntryId, TaxCodeId};

use crate::store::{LedgerStore, StoreError};

/// Failure of an engine operation: either the request was wrong or the
/// storage backend failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl LedgerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::Domain(DomainError::NotFound(_)))
    }
}

/// Journal posting, reversal and chart-of-accounts maintenance over a
/// [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct LedgerEngine<S> {
    store: S,
}

impl<S> LedgerEngine<S>
where
    S: LedgerStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate and persist one journal entry.
    #[instrument(
        skip(self, request),
        fields(entity_id = %request.entity_id, source_system = request.source_system.as_str())
    )]
    pub async fn post_journal_entry(&self, request: PostJournalEntry) -> LedgerResult<PostedJournal> {
        info!(
            source_reference = request.source_reference.as_deref().unwrap_or(""),
            line_count = request.lines.len(),
            "posting journal entry"
        );

        match self.try_post(request).await {
            Ok(journal) => {
                info!(
                    journal_entry_id = %journal.entry.id,
                    line_count = journal.lines.len(),
                    "journal entry posted"
                );
                Ok(journal)
            }
            Err(err) => {
                warn!(error = %err, "journal entry rejected");
                Err(err)
            }
        }
    }

    async fn try_post(&self, request: PostJournalEntry) -> LedgerResult<PostedJournal> {
        request.validate()?;

        let entity = self.require_entity(request.entity_id).await?;

        let mut checked: HashSet<AccountId> = HashSet::new();
        for line in &request.lines {
            if !checked.insert(line.account_id) {
                continue;
            }
            let account = self
                .store
                .get_account(line.account_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Account"))?;
            if account.entity_id != entity.id {
                return Err(DomainError::validation(format!(
                    "account {} does not belong to entity {}",
                    account.code, entity.id
                ))
                .into());
            }
        }

        let mut rates: HashMap<TaxCodeId, Decimal> = HashMap::new();
        for tax_code_id in request.lines.iter().filter_map(|l| l.tax_code_id) {
            if rates.contains_key(&tax_code_id) {
                continue;
            }
            let tax_code = self
                .store
                .get_tax_code(tax_code_id)
                .await?
                .ok_or_else(|| DomainError::not_found("Tax code"))?;
            if tax_code.entity_id != entity.id {
                return Err(DomainError::validation(format!(
                    "tax code {} does not belong to entity {}",
                    tax_code.name, entity.id
                ))
                .into());
            }
            rates.insert(tax_code_id, tax_code.rate);
        }

        let journal = request.into_posted(|id| rates.get(&id).copied(), Utc::now())?;
        self.store.insert_journal(&journal).await?;
        Ok(journal)
    }

    /// Post the mirror image of `original_id` dated `date`.
    ///
    /// The new entry links back through `reverses` and carries the
    /// `REVERSAL_OF_<id>` source reference.
    #[instrument(skip(self, reason, created_by), fields(original_id = %original_id))]
    pub async fn reverse_journal_entry(
        &self,
        original_id: JournalEntryId,
        date: NaiveDate,
        reason: &str,
        created_by: Option<String>,
    ) -> LedgerResult<PostedJournal> {
        let original = self.get_journal_entry(original_id).await?;
        let request = original.reversal(date, reason, created_by)?;
        let reversal = self.post_journal_entry(request).await?;
        info!(
            original_id = %original_id,
            reversal_id = %reversal.entry.id,
            "journal entry reversed"
        );
        Ok(reversal)
    }

    pub async fn get_journal_entry(&self, id: JournalEntryId) -> LedgerResult<PostedJournal> {
        self.store
            .get_journal(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Journal entry").into())
    }

    /// Entries posted as reversals of `original_id`.
    pub async fn reversals_of(&self, original_id: JournalEntryId) -> LedgerResult<Vec<JournalEntry>> {
        Ok(self.store.reversals_of(original_id).await?)
    }

    /// Entries of `entity_id` tagged with `reference`, for upstream dedupe.
    pub async fn journals_by_source_reference(
        &self,
        entity_id: EntityId,
        reference: &str,
    ) -> LedgerResult<Vec<JournalEntry>> {
        Ok(self.store.journals_by_source_reference(entity_id, reference).await?)
    }

    #[instrument(skip(self, legal_identifier), err)]
    pub async fn create_entity(
        &self,
        name: &str,
        legal_identifier: Option<String>,
        currency_code: Option<&str>,
    ) -> LedgerResult<LegalEntity> {
        let entity = LegalEntity::new(name, legal_identifier, currency_code, Utc::now())?;
        self.store.insert_entity(&entity).await?;
        info!(entity_id = %entity.id, "entity created");
        Ok(entity)
    }

    pub async fn get_entity(&self, id: EntityId) -> LedgerResult<LegalEntity> {
        self.require_entity(id).await
    }

    pub async fn list_entities(&self) -> LedgerResult<Vec<LegalEntity>> {
        Ok(self.store.list_entities().await?)
    }

    #[instrument(skip(self, input), fields(entity_id = %input.entity_id, code = %input.code), err)]
    pub async fn create_account(&self, input: NewAccount) -> LedgerResult<Account> {
        self.require_entity(input.entity_id).await?;

        let code = input.code.trim().to_string();
        let duplicate =
            || DomainError::validation(format!("Account code {code} already exists for this entity"));
        if self
            .store
            .get_account_by_code(input.entity_id, &code)
            .await?
            .is_some()
        {
            return Err(duplicate().into());
        }

        let account = Account::open(input, Utc::now())?;
        match self.store.insert_account(&account).await {
            Ok(()) => Ok(account),
            Err(StoreError::Conflict(_)) => Err(duplicate().into()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        self.store
            .get_account(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Account").into())
    }

    pub async fn get_account_by_code(&self, entity_id: EntityId, code: &str) -> LedgerResult<Account> {
        self.store
            .get_account_by_code(entity_id, code)
            .await?
            .ok_or_else(|| DomainError::not_found("Account").into())
    }

    /// Accounts of the entity, ordered by code.
    pub async fn list_accounts(&self, entity_id: EntityId) -> LedgerResult<Vec<Account>> {
        self.require_entity(entity_id).await?;
        Ok(self.store.list_accounts(entity_id).await?)
    }

    pub async fn set_account_active(&self, id: AccountId, is_active: bool) -> LedgerResult<Account> {
        self.store
            .set_account_active(id, is_active)
            .await?
            .ok_or_else(|| DomainError::not_found("Account").into())
    }

    pub async fn create_tax_code(
        &self,
        entity_id: EntityId,
        name: &str,
        rate: Decimal,
    ) -> LedgerResult<TaxCode> {
        self.require_entity(entity_id).await?;
        let tax_code = TaxCode::new(entity_id, name, rate, Utc::now())?;
        self.store.insert_tax_code(&tax_code).await?;
        Ok(tax_code)
    }

    pub async fn list_tax_codes(&self, entity_id: EntityId) -> LedgerResult<Vec<TaxCode>> {
        self.require_entity(entity_id).await?;
        Ok(self.store.list_tax_codes(entity_id).await?)
    }

    async fn require_entity(&self, id: EntityId) -> LedgerResult<LegalEntity> {
        self.store
            .get_entity(id)
            .await?
            .ok_or_else(|| DomainError::not_found("Entity").into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use craneledger_accounting::{
        AccountType, JournalLineInput, JournalStatus, LedgerPeriod, SourceSystem,
    };
    use craneledger_core::Money;

    use crate::store::InMemoryStore;

    struct Books {
        engine: LedgerEngine<InMemoryStore>,
        entity: LegalEntity,
        cash: Account,
        sales: Account,
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, day).unwrap()
    }

    fn amount(s: &str) -> Money {
        Money::parse(s).unwrap()
    }

    async fn open_account(
        engine: &LedgerEngine<InMemoryStore>,
        entity_id: EntityId,
        code: &str,
        account_type: AccountType,
    ) -> Account {
        engine
            .create_account(NewAccount {
                entity_id,
                code: code.into(),
                name: format!("Account {code}"),
                account_type,
                is_bank_account: false,
                is_active: true,
            })
            .await
            .unwrap()
    }

    async fn books() -> Books {
        let engine = LedgerEngine::new(InMemoryStore::new());
        let entity = engine.create_entity("Crane Hire Pty Ltd", None, None).await.unwrap();
        let cash = open_account(&engine, entity.id, "1000", AccountType::Asset).await;
        let sales = open_account(&engine, entity.id, "4000", AccountType::Revenue).await;
        Books { engine, entity, cash, sales }
    }

    fn entry(books: &Books, debit: &str, credit: &str) -> PostJournalEntry {
        PostJournalEntry::new(books.entity.id, date(1), "Crane hire", SourceSystem::CraneledgerManual)
            .with_line(JournalLineInput::debit(books.cash.id, amount(debit)))
            .with_line(JournalLineInput::credit(books.sales.id, amount(credit)))
    }

    #[tokio::test]
    async fn balanced_entry_is_posted() {
        let books = books().await;
        let posted = books
            .engine
            .post_journal_entry(entry(&books, "1000.0000", "1000.0000"))
            .await
            .unwrap();

        assert_eq!(posted.lines.len(), 2);
        assert_eq!(posted.entry.status, JournalStatus::Posted);
        assert_eq!(books.engine.get_journal_entry(posted.entry.id).await.unwrap(), posted);
    }

    #[tokio::test]
    async fn unbalanced_entry_reports_both_totals() {
        let books = books().await;
        let err = books
            .engine
            .post_journal_entry(entry(&books, "1000.00", "900.00"))
            .await
            .unwrap_err();

        match err {
            LedgerError::Domain(DomainError::Unbalanced { debits, credits }) => {
                assert_eq!(debits.to_string(), "1000.0000");
                assert_eq!(credits.to_string(), "900.0000");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn line_with_both_sides_fails_before_any_lookup() {
        let books = books().await;
        let mut line = JournalLineInput::debit(AccountId::new(), amount("1000.00"));
        line.credit = amount("500.00");
        let request = PostJournalEntry::new(EntityId::new(), date(1), "bad", SourceSystem::System)
            .with_line(line);

        let err = books.engine.post_journal_entry(request).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::Domain(DomainError::validation(
                "A line cannot have both debit and credit amounts"
            ))
        );
    }

    #[tokio::test]
    async fn unknown_entity_and_account_are_not_found() {
        let books = books().await;
        let mut request = entry(&books, "10", "10");
        request.entity_id = EntityId::new();
        let err = books.engine.post_journal_entry(request).await.unwrap_err();
        assert_eq!(err.to_string(), "Entity not found");

        let mut request = entry(&books, "10", "10");
        request.lines[1].account_id = AccountId::new();
        let err = books.engine.post_journal_entry(request).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Account not found");
    }

    #[tokio::test]
    async fn account_of_another_entity_is_rejected() {
        let books = books().await;
        let other = books.engine.create_entity("Subsidiary", None, None).await.unwrap();
        let foreign = open_account(&books.engine, other.id, "1000", AccountType::Asset).await;

        let request = PostJournalEntry::new(books.entity.id, date(2), "leak", SourceSystem::System)
            .with_line(JournalLineInput::debit(foreign.id, Money::from_major(5)))
            .with_line(JournalLineInput::credit(books.sales.id, Money::from_major(5)));
        let err = books.engine.post_journal_entry(request).await.unwrap_err();

        assert_eq!(
            err.to_string(),
            format!("account 1000 does not belong to entity {}", books.entity.id)
        );
        let activity = books
            .engine
            .store()
            .posted_lines(books.entity.id, LedgerPeriod::as_of(date(31)))
            .await
            .unwrap();
        assert!(activity.is_empty());
    }

    #[tokio::test]
    async fn tax_is_derived_from_the_code_rate() {
        let books = books().await;
        let gst = books
            .engine
            .create_tax_code(books.entity.id, "GST", Decimal::new(1, 1))
            .await
            .unwrap();

        let request = PostJournalEntry::new(books.entity.id, date(3), "Hire", SourceSystem::EzycraneApp)
            .with_line(JournalLineInput::debit(books.cash.id, Money::from_major(1000)))
            .with_line(JournalLineInput::credit(books.sales.id, Money::from_major(1000)).with_tax_code(gst.id));
        let posted = books.engine.post_journal_entry(request).await.unwrap();

        assert!(posted.lines[0].tax_amount.is_zero());
        assert_eq!(posted.lines[1].tax_amount.to_string(), "-100.0000");

        let mut request = entry(&books, "1", "1");
        request.lines[0].tax_code_id = Some(TaxCodeId::new());
        let err = books.engine.post_journal_entry(request).await.unwrap_err();
        assert_eq!(err.to_string(), "Tax code not found");
    }

    #[tokio::test]
    async fn reversal_swaps_lines_and_links_back() {
        let books = books().await;
        let original = books
            .engine
            .post_journal_entry(entry(&books, "1000.00", "1000.00").with_created_by(Some("ops".into())))
            .await
            .unwrap();

        let reversal = books
            .engine
            .reverse_journal_entry(original.entry.id, date(15), "Duplicate entry", None)
            .await
            .unwrap();

        assert_eq!(reversal.lines.len(), original.lines.len());
        for (rev, orig) in reversal.lines.iter().zip(&original.lines) {
            assert_eq!(rev.account_id, orig.account_id);
            assert_eq!(rev.debit, orig.credit);
            assert_eq!(rev.credit, orig.debit);
        }
        assert_eq!(reversal.entry.reverses, Some(original.entry.id));
        assert_eq!(
            reversal.entry.source_reference,
            Some(format!("REVERSAL_OF_{}", original.entry.id))
        );
        assert_eq!(
            reversal.entry.description,
            "REVERSAL: Duplicate entry (Original: Crane hire)"
        );
        assert_eq!(reversal.entry.source_system, SourceSystem::CraneledgerManual);

        let linked = books.engine.reversals_of(original.entry.id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].id, reversal.entry.id);
    }

    #[tokio::test]
    async fn reversing_a_missing_entry_is_not_found() {
        let books = books().await;
        let err = books
            .engine
            .reverse_journal_entry(JournalEntryId::new(), date(1), "typo", None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Journal entry not found");
    }

    #[tokio::test]
    async fn duplicate_account_code_is_a_validation_error() {
        let books = books().await;
        let err = books
            .engine
            .create_account(NewAccount {
                entity_id: books.entity.id,
                code: "1000".into(),
                name: "Second cash".into(),
                account_type: AccountType::Asset,
                is_bank_account: true,
                is_active: true,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Account code 1000 already exists for this entity");

        let codes: Vec<String> = books
            .engine
            .list_accounts(books.entity.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.code)
            .collect();
        assert_eq!(codes, vec!["1000", "4000"]);
    }

    #[tokio::test]
    async fn accounts_can_be_deactivated() {
        let books = books().await;
        let updated = books.engine.set_account_active(books.sales.id, false).await.unwrap();
        assert!(!updated.is_active);
        assert!(books.engine.set_account_active(AccountId::new(), true).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn duplicate_source_references_are_accepted_and_discoverable() {
        let books = books().await;
        for _ in 0..2 {
            books
                .engine
                .post_journal_entry(entry(&books, "5", "5").with_reference("EZY-7"))
                .await
                .unwrap();
        }
        let tagged = books
            .engine
            .journals_by_source_reference(books.entity.id, "EZY-7")
            .await
            .unwrap();
        assert_eq!(tagged.len(), 2);
    }
}
