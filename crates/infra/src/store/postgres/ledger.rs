use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use tracing::instrument;
use uuid::Uuid;

use craneledger_accounting::{
    Account, JournalEntry, JournalLine, LedgerLine, LedgerPeriod, LegalEntity, PostedJournal,
    TaxCode,
};
use craneledger_core::{AccountId, EntityId, JournalEntryId, JournalLineId, Money, TaxCodeId};

use super::{map_sqlx_error, parse_column, PostgresStore};
use crate::store::{LedgerStore, StoreResult};

#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    id: Uuid,
    name: String,
    legal_identifier: Option<String>,
    currency_code: String,
    created_at: DateTime<Utc>,
}

impl From<EntityRow> for LegalEntity {
    fn from(row: EntityRow) -> Self {
        LegalEntity {
            id: EntityId::from_uuid(row.id),
            name: row.name,
            legal_identifier: row.legal_identifier,
            currency_code: row.currency_code.trim().to_string(),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    entity_id: Uuid,
    code: String,
    name: String,
    account_type: String,
    is_bank_account: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = crate::store::StoreError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: AccountId::from_uuid(row.id),
            entity_id: EntityId::from_uuid(row.entity_id),
            code: row.code,
            name: row.name,
            account_type: parse_column("account_type", &row.account_type)?,
            is_bank_account: row.is_bank_account,
            is_active: row.is_active,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TaxCodeRow {
    id: Uuid,
    entity_id: Uuid,
    name: String,
    rate: Decimal,
    created_at: DateTime<Utc>,
}

impl From<TaxCodeRow> for TaxCode {
    fn from(row: TaxCodeRow) -> Self {
        TaxCode {
            id: TaxCodeId::from_uuid(row.id),
            entity_id: EntityId::from_uuid(row.entity_id),
            name: row.name,
            rate: row.rate,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JournalEntryRow {
    id: Uuid,
    entity_id: Uuid,
    entry_date: NaiveDate,
    description: String,
    source_system: String,
    source_reference: Option<String>,
    status: String,
    reverses: Option<Uuid>,
    created_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<JournalEntryRow> for JournalEntry {
    type Error = crate::store::StoreError;

    fn try_from(row: JournalEntryRow) -> Result<Self, Self::Error> {
        Ok(JournalEntry {
            id: JournalEntryId::from_uuid(row.id),
            entity_id: EntityId::from_uuid(row.entity_id),
            date: row.entry_date,
            description: row.description,
            source_system: parse_column("source_system", &row.source_system)?,
            source_reference: row.source_reference,
            status: parse_column("status", &row.status)?,
            reverses: row.reverses.map(JournalEntryId::from_uuid),
            created_by: row.created_by,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JournalLineRow {
    id: Uuid,
    journal_entry_id: Uuid,
    account_id: Uuid,
    debit: Decimal,
    credit: Decimal,
    tax_code_id: Option<Uuid>,
    tax_amount: Decimal,
    memo: Option<String>,
}

impl From<JournalLineRow> for JournalLine {
    fn from(row: JournalLineRow) -> Self {
        JournalLine {
            id: JournalLineId::from_uuid(row.id),
            journal_entry_id: JournalEntryId::from_uuid(row.journal_entry_id),
            account_id: AccountId::from_uuid(row.account_id),
            debit: Money::new(row.debit),
            credit: Money::new(row.credit),
            tax_code_id: row.tax_code_id.map(TaxCodeId::from_uuid),
            tax_amount: Money::new(row.tax_amount),
            memo: row.memo,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    account_id: Uuid,
    debit: Decimal,
    credit: Decimal,
}

const ENTRY_COLUMNS: &str = "id, entity_id, entry_date, description, source_system, \
     source_reference, status, reverses, created_by, created_at";

const ACCOUNT_COLUMNS: &str =
    "id, entity_id, code, name, account_type, is_bank_account, is_active, created_at";

fn entries(rows: Vec<JournalEntryRow>) -> StoreResult<Vec<JournalEntry>> {
    rows.into_iter().map(JournalEntry::try_from).collect()
}

fn accounts(rows: Vec<AccountRow>) -> StoreResult<Vec<Account>> {
    rows.into_iter().map(Account::try_from).collect()
}

/// Insert header then lines on an open transaction.
async fn insert_journal_rows(
    tx: &mut Transaction<'_, Postgres>,
    journal: &PostedJournal,
) -> StoreResult<()> {
    let entry = &journal.entry;
    sqlx::query(
        r#"
        INSERT INTO journal_entries (
            id, entity_id, entry_date, description, source_system,
            source_reference, status, reverses, created_by, created_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(entry.id.as_uuid())
    .bind(entry.entity_id.as_uuid())
    .bind(entry.date)
    .bind(&entry.description)
    .bind(entry.source_system.as_str())
    .bind(entry.source_reference.as_deref())
    .bind(entry.status.as_str())
    .bind(entry.reverses.map(Uuid::from))
    .bind(entry.created_by.as_deref())
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_journal_entry", e))?;

    for (line_no, line) in journal.lines.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO journal_lines (
                id, journal_entry_id, line_no, account_id, debit, credit,
                tax_code_id, tax_amount, memo
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(line.id.as_uuid())
        .bind(entry.id.as_uuid())
        .bind(line_no as i32)
        .bind(line.account_id.as_uuid())
        .bind(line.debit.as_decimal())
        .bind(line.credit.as_decimal())
        .bind(line.tax_code_id.map(Uuid::from))
        .bind(line.tax_amount.as_decimal())
        .bind(line.memo.as_deref())
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("insert_journal_line", e))?;
    }

    Ok(())
}

#[async_trait]
impl LedgerStore for PostgresStore {
    #[instrument(skip(self, entity), fields(entity_id = %entity.id), err)]
    async fn insert_entity(&self, entity: &LegalEntity) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO entities (id, name, legal_identifier, currency_code, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entity.id.as_uuid())
        .bind(&entity.name)
        .bind(entity.legal_identifier.as_deref())
        .bind(&entity.currency_code)
        .bind(entity.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_entity", e))?;
        Ok(())
    }

    async fn get_entity(&self, id: EntityId) -> StoreResult<Option<LegalEntity>> {
        let row = sqlx::query_as::<_, EntityRow>(
            "SELECT id, name, legal_identifier, currency_code, created_at FROM entities WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_entity", e))?;
        Ok(row.map(LegalEntity::from))
    }

    async fn list_entities(&self) -> StoreResult<Vec<LegalEntity>> {
        let rows = sqlx::query_as::<_, EntityRow>(
            "SELECT id, name, legal_identifier, currency_code, created_at FROM entities ORDER BY created_at, id",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_entities", e))?;
        Ok(rows.into_iter().map(LegalEntity::from).collect())
    }

    #[instrument(skip(self, account), fields(entity_id = %account.entity_id, code = %account.code), err)]
    async fn insert_account(&self, account: &Account) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, entity_id, code, name, account_type, is_bank_account, is_active, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(account.entity_id.as_uuid())
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.is_bank_account)
        .bind(account.is_active)
        .bind(account.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    async fn get_account(&self, id: AccountId) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_account", e))?;
        row.map(Account::try_from).transpose()
    }

    async fn get_account_by_code(&self, entity_id: EntityId, code: &str) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE entity_id = $1 AND code = $2"
        ))
        .bind(entity_id.as_uuid())
        .bind(code)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_account_by_code", e))?;
        row.map(Account::try_from).transpose()
    }

    async fn list_accounts(&self, entity_id: EntityId) -> StoreResult<Vec<Account>> {
        let rows = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE entity_id = $1 ORDER BY code"
        ))
        .bind(entity_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;
        accounts(rows)
    }

    #[instrument(skip(self), fields(account_id = %id), err)]
    async fn set_account_active(&self, id: AccountId, is_active: bool) -> StoreResult<Option<Account>> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "UPDATE accounts SET is_active = $2 WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(is_active)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set_account_active", e))?;
        row.map(Account::try_from).transpose()
    }

    async fn insert_tax_code(&self, tax_code: &TaxCode) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tax_codes (id, entity_id, name, rate, created_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(tax_code.id.as_uuid())
        .bind(tax_code.entity_id.as_uuid())
        .bind(&tax_code.name)
        .bind(tax_code.rate)
        .bind(tax_code.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_tax_code", e))?;
        Ok(())
    }

    async fn get_tax_code(&self, id: TaxCodeId) -> StoreResult<Option<TaxCode>> {
        let row = sqlx::query_as::<_, TaxCodeRow>(
            "SELECT id, entity_id, name, rate, created_at FROM tax_codes WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_tax_code", e))?;
        Ok(row.map(TaxCode::from))
    }

    async fn list_tax_codes(&self, entity_id: EntityId) -> StoreResult<Vec<TaxCode>> {
        let rows = sqlx::query_as::<_, TaxCodeRow>(
            "SELECT id, entity_id, name, rate, created_at FROM tax_codes WHERE entity_id = $1 ORDER BY name",
        )
        .bind(entity_id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_tax_codes", e))?;
        Ok(rows.into_iter().map(TaxCode::from).collect())
    }

    /// One transaction for the header and every line; any failing statement
    /// rolls the whole entry back.
    #[instrument(
        skip(self, journal),
        fields(
            journal_entry_id = %journal.entry.id,
            entity_id = %journal.entry.entity_id,
            line_count = journal.lines.len()
        ),
        err
    )]
    async fn insert_journal(&self, journal: &PostedJournal) -> StoreResult<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        if let Err(err) = insert_journal_rows(&mut tx, journal).await {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(err);
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    #[instrument(skip(self), fields(journal_entry_id = %id), err)]
    async fn get_journal(&self, id: JournalEntryId) -> StoreResult<Option<PostedJournal>> {
        let row = sqlx::query_as::<_, JournalEntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_journal_entry", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, JournalLineRow>(
            r#"
            SELECT id, journal_entry_id, account_id, debit, credit, tax_code_id, tax_amount, memo
            FROM journal_lines
            WHERE journal_entry_id = $1
            ORDER BY line_no ASC
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_journal_lines", e))?;

        Ok(Some(PostedJournal {
            entry: JournalEntry::try_from(row)?,
            lines: lines.into_iter().map(JournalLine::from).collect(),
        }))
    }

    async fn reversals_of(&self, original: JournalEntryId) -> StoreResult<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, JournalEntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE reverses = $1 ORDER BY created_at, id"
        ))
        .bind(original.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("reversals_of", e))?;
        entries(rows)
    }

    async fn journals_by_source_reference(
        &self,
        entity_id: EntityId,
        reference: &str,
    ) -> StoreResult<Vec<JournalEntry>> {
        let rows = sqlx::query_as::<_, JournalEntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries \
             WHERE entity_id = $1 AND source_reference = $2 ORDER BY created_at, id"
        ))
        .bind(entity_id.as_uuid())
        .bind(reference)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("journals_by_source_reference", e))?;
        entries(rows)
    }

    /// Aggregated per account in SQL: one `LedgerLine` per account with activity.
    #[instrument(skip(self), fields(entity_id = %entity_id), err)]
    async fn posted_lines(&self, entity_id: EntityId, period: LedgerPeriod) -> StoreResult<Vec<LedgerLine>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT
                l.account_id,
                COALESCE(SUM(l.debit), 0) AS debit,
                COALESCE(SUM(l.credit), 0) AS credit
            FROM journal_lines l
            JOIN journal_entries e ON e.id = l.journal_entry_id
            WHERE e.entity_id = $1
                AND e.status = 'POSTED'
                AND ($2::date IS NULL OR e.entry_date >= $2)
                AND e.entry_date <= $3
            GROUP BY l.account_id
            "#,
        )
        .bind(entity_id.as_uuid())
        .bind(period.from)
        .bind(period.to)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("posted_lines", e))?;

        Ok(rows
            .into_iter()
            .map(|row| LedgerLine {
                account_id: AccountId::from_uuid(row.account_id),
                debit: Money::new(row.debit),
                credit: Money::new(row.credit),
            })
            .collect())
    }
}
