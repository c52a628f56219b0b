//! Financial statements derived from posted ledger lines.
//!
//! Builders here are pure folds: the caller supplies the entity's accounts and
//! the posted lines inside a [`LedgerPeriod`]; nothing is cached between runs.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use craneledger_core::{AccountId, DomainError, DomainResult, EntityId, Money};

use crate::chart::{Account, AccountType};

/// Date window over journal entry dates. `from: None` means "since inception".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPeriod {
    pub from: Option<NaiveDate>,
    pub to: NaiveDate,
}

impl LedgerPeriod {
    pub fn as_of(date: NaiveDate) -> Self {
        Self { from: None, to: date }
    }

    pub fn between(from: NaiveDate, to: NaiveDate) -> DomainResult<Self> {
        if from > to {
            return Err(DomainError::validation("from must not be after to"));
        }
        Ok(Self { from: Some(from), to })
    }

    /// Inclusive on both ends.
    pub fn contains(&self, date: NaiveDate) -> bool {
        date <= self.to && self.from.is_none_or(|from| date >= from)
    }
}

/// One posted line, reduced to what the statements need.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerLine {
    pub account_id: AccountId,
    pub debit: Money,
    pub credit: Money,
}

/// Accumulated debit and credit sums for one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountActivity {
    pub debit: Money,
    pub credit: Money,
}

impl AccountActivity {
    /// Debit-positive balance.
    pub fn balance(&self) -> Money {
        self.debit - self.credit
    }

    pub fn is_empty(&self) -> bool {
        self.debit.is_zero() && self.credit.is_zero()
    }
}

/// Sum lines per account.
pub fn fold_activity<'a, I>(lines: I) -> BTreeMap<AccountId, AccountActivity>
where
    I: IntoIterator<Item = &'a LedgerLine>,
{
    let mut activity: BTreeMap<AccountId, AccountActivity> = BTreeMap::new();
    for line in lines {
        let entry = activity.entry(line.account_id).or_default();
        entry.debit += line.debit;
        entry.credit += line.credit;
    }
    activity
}

fn sorted_by_code(accounts: &[Account]) -> Vec<&Account> {
    let mut sorted: Vec<&Account> = accounts.iter().collect();
    sorted.sort_by(|a, b| a.code.cmp(&b.code));
    sorted
}

fn activity_of(activity: &BTreeMap<AccountId, AccountActivity>, id: AccountId) -> AccountActivity {
    activity.get(&id).copied().unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalanceRow {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    pub debit: Money,
    pub credit: Money,
    pub balance: Money,
}

/// Point-in-time listing of every account with activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialBalance {
    pub entity_id: EntityId,
    pub as_of: NaiveDate,
    pub accounts: Vec<TrialBalanceRow>,
    pub total_debits: Money,
    pub total_credits: Money,
    /// `false` means an entry bypassed validation; treat as corruption.
    pub is_balanced: bool,
}

impl TrialBalance {
    pub fn build(
        entity_id: EntityId,
        as_of: NaiveDate,
        accounts: &[Account],
        activity: &BTreeMap<AccountId, AccountActivity>,
    ) -> Self {
        let mut rows = Vec::new();
        let mut total_debits = Money::ZERO;
        let mut total_credits = Money::ZERO;

        for account in sorted_by_code(accounts) {
            let sums = activity_of(activity, account.id);
            if sums.is_empty() {
                continue;
            }
            total_debits += sums.debit;
            total_credits += sums.credit;
            rows.push(TrialBalanceRow {
                account_id: account.id,
                account_code: account.code.clone(),
                account_name: account.name.clone(),
                account_type: account.account_type,
                debit: sums.debit,
                credit: sums.credit,
                balance: sums.balance(),
            });
        }

        Self {
            entity_id,
            as_of,
            accounts: rows,
            total_debits,
            total_credits,
            is_balanced: total_debits.is_equal(&total_credits),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitAndLossRow {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    /// Credit minus debit for every row, expenses included.
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfitAndLoss {
    pub entity_id: EntityId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub revenue: Vec<ProfitAndLossRow>,
    pub expenses: Vec<ProfitAndLossRow>,
    pub total_revenue: Money,
    pub total_expenses: Money,
    pub net_profit: Money,
}

impl ProfitAndLoss {
    pub fn build(
        entity_id: EntityId,
        from: NaiveDate,
        to: NaiveDate,
        accounts: &[Account],
        activity: &BTreeMap<AccountId, AccountActivity>,
    ) -> Self {
        let mut revenue = Vec::new();
        let mut expenses = Vec::new();
        let mut total_revenue = Money::ZERO;
        let mut total_expenses = Money::ZERO;

        for account in sorted_by_code(accounts) {
            if !account.account_type.is_income_statement() {
                continue;
            }
            let amount = -activity_of(activity, account.id).balance();
            if amount.is_zero() {
                continue;
            }
            let row = ProfitAndLossRow {
                account_id: account.id,
                account_code: account.code.clone(),
                account_name: account.name.clone(),
                account_type: account.account_type,
                amount,
            };
            if account.account_type == AccountType::Revenue {
                total_revenue += amount;
                revenue.push(row);
            } else {
                total_expenses += -amount;
                expenses.push(row);
            }
        }

        Self {
            entity_id,
            from,
            to,
            revenue,
            expenses,
            total_revenue,
            total_expenses,
            net_profit: total_revenue - total_expenses,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheetRow {
    pub account_id: AccountId,
    pub account_code: String,
    pub account_name: String,
    pub account_type: AccountType,
    /// Debit minus credit for every row.
    pub balance: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheet {
    pub entity_id: EntityId,
    pub as_of: NaiveDate,
    pub assets: Vec<BalanceSheetRow>,
    pub liabilities: Vec<BalanceSheetRow>,
    pub equity: Vec<BalanceSheetRow>,
    pub total_assets: Money,
    pub total_liabilities: Money,
    pub total_equity: Money,
    /// Assets = liabilities + equity.
    pub is_balanced: bool,
}

impl BalanceSheet {
    pub fn build(
        entity_id: EntityId,
        as_of: NaiveDate,
        accounts: &[Account],
        activity: &BTreeMap<AccountId, AccountActivity>,
    ) -> Self {
        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        let mut equity = Vec::new();
        let mut total_assets = Money::ZERO;
        let mut total_liabilities = Money::ZERO;
        let mut total_equity = Money::ZERO;

        for account in sorted_by_code(accounts) {
            let balance = activity_of(activity, account.id).balance();
            if balance.is_zero() {
                continue;
            }
            let row = BalanceSheetRow {
                account_id: account.id,
                account_code: account.code.clone(),
                account_name: account.name.clone(),
                account_type: account.account_type,
                balance,
            };
            match account.account_type {
                AccountType::Asset => {
                    total_assets += balance;
                    assets.push(row);
                }
                AccountType::Liability => {
                    total_liabilities += -balance;
                    liabilities.push(row);
                }
                AccountType::Equity => {
                    total_equity += -balance;
                    equity.push(row);
                }
                AccountType::Revenue | AccountType::Expense => {}
            }
        }

        Self {
            entity_id,
            as_of,
            assets,
            liabilities,
            equity,
            total_assets,
            total_liabilities,
            total_equity,
            is_balanced: total_assets.is_equal(&(total_liabilities + total_equity)),
        }
    }
}
