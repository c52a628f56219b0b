//! Double-entry journal: entries, lines, validation and reversal.
//!
//! Posting is split in two. [`validate_lines`] enforces the line rules and the
//! double-entry invariant without touching storage; [`PostJournalEntry::into_posted`]
//! then derives tax amounts and assigns identifiers. The storage layer persists
//! the resulting [`PostedJournal`] as one atomic unit.

use core::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use craneledger_core::{
    AccountId, DomainError, DomainResult, EntityId, JournalEntryId, JournalLineId, Money,
    TaxCodeId,
};

/// Subsystem that originated an entry. Carried for audit only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceSystem {
    EzycraneApp,
    CraneledgerManual,
    AiCfo,
    XeroSync,
    System,
}

impl SourceSystem {
    pub const ALL: [SourceSystem; 5] = [
        SourceSystem::EzycraneApp,
        SourceSystem::CraneledgerManual,
        SourceSystem::AiCfo,
        SourceSystem::XeroSync,
        SourceSystem::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSystem::EzycraneApp => "EZYCRANE_APP",
            SourceSystem::CraneledgerManual => "CRANELEDGER_MANUAL",
            SourceSystem::AiCfo => "AI_CFO",
            SourceSystem::XeroSync => "XERO_SYNC",
            SourceSystem::System => "SYSTEM",
        }
    }
}

impl FromStr for SourceSystem {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SourceSystem::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown source system: {s}")))
    }
}

/// Entry status. Only `Posted` is produced today; `Voided` is reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalStatus {
    Draft,
    Posted,
    Voided,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Draft => "DRAFT",
            JournalStatus::Posted => "POSTED",
            JournalStatus::Voided => "VOIDED",
        }
    }
}

impl FromStr for JournalStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(JournalStatus::Draft),
            "POSTED" => Ok(JournalStatus::Posted),
            "VOIDED" => Ok(JournalStatus::Voided),
            other => Err(DomainError::validation(format!(
                "unknown journal status: {other}"
            ))),
        }
    }
}

/// A proposed line. Exactly one of `debit` / `credit` must be positive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalLineInput {
    pub account_id: AccountId,
    #[serde(default)]
    pub debit: Money,
    #[serde(default)]
    pub credit: Money,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax_code_id: Option<TaxCodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl JournalLineInput {
    pub fn debit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Money::ZERO,
            tax_code_id: None,
            memo: None,
        }
    }

    pub fn credit(account_id: AccountId, amount: Money) -> Self {
        Self {
            account_id,
            debit: Money::ZERO,
            credit: amount,
            tax_code_id: None,
            memo: None,
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_tax_code(mut self, tax_code_id: TaxCodeId) -> Self {
        self.tax_code_id = Some(tax_code_id);
        self
    }

    /// The same line with debit and credit exchanged.
    pub fn swapped(&self) -> Self {
        Self {
            debit: self.credit,
            credit: self.debit,
            ..self.clone()
        }
    }
}

/// Summed sides of a validated line set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalTotals {
    pub debits: Money,
    pub credits: Money,
}

/// Enforce the line rules, then the double-entry invariant.
///
/// Rules run line by line in input order, so the first offending line decides
/// the error. Balance is only checked once every line is individually valid.
pub fn validate_lines(lines: &[JournalLineInput]) -> DomainResult<JournalTotals> {
    if lines.is_empty() {
        return Err(DomainError::validation(
            "Journal entry must have at least one line",
        ));
    }

    for line in lines {
        if line.debit.is_negative() || line.credit.is_negative() {
            return Err(DomainError::validation(
                "Debit and credit amounts must be non-negative",
            ));
        }
        if line.debit.is_positive() && line.credit.is_positive() {
            return Err(DomainError::validation(
                "A line cannot have both debit and credit amounts",
            ));
        }
        if line.debit.is_zero() && line.credit.is_zero() {
            return Err(DomainError::validation(
                "A line must have either a debit or credit amount",
            ));
        }
    }

    let debits = Money::try_sum(lines.iter().map(|l| l.debit))?;
    let credits = Money::try_sum(lines.iter().map(|l| l.credit))?;

    if !debits.is_equal(&credits) {
        return Err(DomainError::unbalanced(debits, credits));
    }

    Ok(JournalTotals { debits, credits })
}

/// Derived tax for one line: `(debit - credit) * rate`, zero without a rate.
pub fn derive_tax(line: &JournalLineInput, rate: Option<Decimal>) -> Money {
    match rate {
        Some(rate) => (line.debit - line.credit).multiply(rate),
        None => Money::ZERO,
    }
}

/// Source reference carried by a reversal of `original`.
pub fn reversal_reference(original: JournalEntryId) -> String {
    format!("REVERSAL_OF_{original}")
}

/// Request to post one journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostJournalEntry {
    pub entity_id: EntityId,
    pub date: NaiveDate,
    pub description: String,
    pub source_system: SourceSystem,
    #[serde(default)]
    pub source_reference: Option<String>,
    pub lines: Vec<JournalLineInput>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub reverses: Option<JournalEntryId>,
}

impl PostJournalEntry {
    pub fn new(
        entity_id: EntityId,
        date: NaiveDate,
        description: impl Into<String>,
        source_system: SourceSystem,
    ) -> Self {
        Self {
            entity_id,
            date,
            description: description.into(),
            source_system,
            source_reference: None,
            lines: Vec::new(),
            created_by: None,
            reverses: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.source_reference = Some(reference.into());
        self
    }

    pub fn with_line(mut self, line: JournalLineInput) -> Self {
        self.lines.push(line);
        self
    }

    pub fn with_lines(mut self, lines: impl IntoIterator<Item = JournalLineInput>) -> Self {
        self.lines.extend(lines);
        self
    }

    pub fn with_created_by(mut self, created_by: Option<String>) -> Self {
        self.created_by = created_by;
        self
    }

    pub fn validate(&self) -> DomainResult<JournalTotals> {
        validate_lines(&self.lines)
    }

    /// Validate, derive per-line tax and assign identifiers.
    ///
    /// `tax_rate` resolves a tax code to its rate; `None` means the code does
    /// not exist for this entity.
    pub fn into_posted<F>(self, mut tax_rate: F, created_at: DateTime<Utc>) -> DomainResult<PostedJournal>
    where
        F: FnMut(TaxCodeId) -> Option<Decimal>,
    {
        self.validate()?;

        let entry_id = JournalEntryId::new();
        let mut lines = Vec::with_capacity(self.lines.len());
        for input in self.lines {
            let rate = match input.tax_code_id {
                Some(tax_code_id) => Some(
                    tax_rate(tax_code_id).ok_or_else(|| DomainError::not_found("Tax code"))?,
                ),
                None => None,
            };
            let tax_amount = derive_tax(&input, rate);
            lines.push(JournalLine {
                id: JournalLineId::new(),
                journal_entry_id: entry_id,
                account_id: input.account_id,
                debit: input.debit,
                credit: input.credit,
                tax_code_id: input.tax_code_id,
                tax_amount,
                memo: input.memo,
            });
        }

        Ok(PostedJournal {
            entry: JournalEntry {
                id: entry_id,
                entity_id: self.entity_id,
                date: self.date,
                description: self.description,
                source_system: self.source_system,
                source_reference: self.source_reference,
                status: JournalStatus::Posted,
                reverses: self.reverses,
                created_by: self.created_by,
                created_at,
            },
            lines,
        })
    }
}

/// Journal entry header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: JournalEntryId,
    pub entity_id: EntityId,
    pub date: NaiveDate,
    pub description: String,
    pub source_system: SourceSystem,
    pub source_reference: Option<String>,
    pub status: JournalStatus,
    /// Entry this one reverses, if any.
    pub reverses: Option<JournalEntryId>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalLine {
    pub id: JournalLineId,
    pub journal_entry_id: JournalEntryId,
    pub account_id: AccountId,
    pub debit: Money,
    pub credit: Money,
    pub tax_code_id: Option<TaxCodeId>,
    pub tax_amount: Money,
    pub memo: Option<String>,
}

/// A stored entry together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedJournal {
    pub entry: JournalEntry,
    pub lines: Vec<JournalLine>,
}

impl PostedJournal {
    pub fn totals(&self) -> JournalTotals {
        JournalTotals {
            debits: Money::sum(self.lines.iter().map(|l| l.debit)),
            credits: Money::sum(self.lines.iter().map(|l| l.credit)),
        }
    }

    /// Build the request that reverses this entry.
    ///
    /// Lines keep their account, tax code and memo with debit and credit
    /// swapped. The source system is inherited.
    pub fn reversal(
        &self,
        date: NaiveDate,
        reason: &str,
        created_by: Option<String>,
    ) -> DomainResult<PostJournalEntry> {
        if self.entry.status == JournalStatus::Voided {
            return Err(DomainError::validation(
                "Cannot reverse a voided journal entry",
            ));
        }

        let lines = self.lines.iter().map(|line| {
            JournalLineInput {
                account_id: line.account_id,
                debit: line.debit,
                credit: line.credit,
                tax_code_id: line.tax_code_id,
                memo: line.memo.clone(),
            }
            .swapped()
        });

        let mut request = PostJournalEntry::new(
            self.entry.entity_id,
            date,
            format!(
                "REVERSAL: {reason} (Original: {})",
                self.entry.description
            ),
            self.entry.source_system,
        )
        .with_reference(reversal_reference(self.entry.id))
        .with_lines(lines)
        .with_created_by(created_by);
        request.reverses = Some(self.entry.id);
        Ok(request)
    }
}
