//! Chart of accounts: legal entities, accounts and tax codes.

use core::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use craneledger_core::{AccountId, DomainError, DomainResult, EntityId, TaxCodeId};

/// Base currency used when an entity is created without one.
pub const DEFAULT_CURRENCY: &str = "AUD";

/// A legal/accounting unit. Owns accounts, tax codes and journal entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalEntity {
    pub id: EntityId,
    pub name: String,
    pub legal_identifier: Option<String>,
    pub currency_code: String,
    pub created_at: DateTime<Utc>,
}

impl LegalEntity {
    pub fn new(
        name: &str,
        legal_identifier: Option<String>,
        currency_code: Option<&str>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let currency_code = match currency_code {
            Some(code) => normalize_currency(code)?,
            None => DEFAULT_CURRENCY.to_string(),
        };

        Ok(Self {
            id: EntityId::new(),
            name: require_text("name", name)?,
            legal_identifier: legal_identifier
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            currency_code,
            created_at,
        })
    }
}

/// Account classification; decides the normal balance side and which
/// statement an account reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

impl AccountType {
    pub const ALL: [AccountType; 5] = [
        AccountType::Asset,
        AccountType::Liability,
        AccountType::Equity,
        AccountType::Revenue,
        AccountType::Expense,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "ASSET",
            AccountType::Liability => "LIABILITY",
            AccountType::Equity => "EQUITY",
            AccountType::Revenue => "REVENUE",
            AccountType::Expense => "EXPENSE",
        }
    }

    pub fn is_balance_sheet(&self) -> bool {
        matches!(
            self,
            AccountType::Asset | AccountType::Liability | AccountType::Equity
        )
    }

    pub fn is_income_statement(&self) -> bool {
        matches!(self, AccountType::Revenue | AccountType::Expense)
    }
}

impl core::fmt::Display for AccountType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AccountType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                DomainError::validation(
                    "account type must be one of: ASSET, LIABILITY, EQUITY, REVENUE, EXPENSE",
                )
            })
    }
}

/// Input for opening a new account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAccount {
    pub entity_id: EntityId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub is_bank_account: bool,
    pub is_active: bool,
}

/// A node in the chart of accounts. `(entity_id, code)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: AccountId,
    pub entity_id: EntityId,
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub is_bank_account: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn open(input: NewAccount, created_at: DateTime<Utc>) -> DomainResult<Self> {
        Ok(Self {
            id: AccountId::new(),
            entity_id: input.entity_id,
            code: require_text("code", &input.code)?,
            name: require_text("name", &input.name)?,
            account_type: input.account_type,
            is_bank_account: input.is_bank_account,
            is_active: input.is_active,
            created_at,
        })
    }
}

/// Fractional digits a tax rate may carry (`NUMERIC(9,6)`).
pub const TAX_RATE_SCALE: u32 = 6;

/// A tax rate attached to journal lines, e.g. `0.10` for GST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxCode {
    pub id: TaxCodeId,
    pub entity_id: EntityId,
    pub name: String,
    pub rate: Decimal,
    pub created_at: DateTime<Utc>,
}

impl TaxCode {
    pub fn new(
        entity_id: EntityId,
        name: &str,
        rate: Decimal,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(DomainError::validation(
                "tax rate must be between 0 and 1",
            ));
        }
        if rate.normalize().scale() > TAX_RATE_SCALE {
            return Err(DomainError::validation(format!(
                "tax rate must have at most {TAX_RATE_SCALE} decimal places"
            )));
        }
        Ok(Self {
            id: TaxCodeId::new(),
            entity_id,
            name: require_text("name", name)?,
            rate,
            created_at,
        })
    }
}

fn require_text(field: &str, value: &str) -> DomainResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

fn normalize_currency(code: &str) -> DomainResult<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::validation(
            "currency code must be a 3-letter ISO code",
        ));
    }
    Ok(code.to_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn entity_defaults_to_aud() {
        let entity = LegalEntity::new("EzyCrane Pty Ltd", None, None, test_time()).unwrap();
        assert_eq!(entity.currency_code, "AUD");

        let nzd = LegalEntity::new("EzyCrane NZ", None, Some("nzd"), test_time()).unwrap();
        assert_eq!(nzd.currency_code, "NZD");
    }

    #[test]
    fn entity_rejects_blank_name_and_bad_currency() {
        assert!(LegalEntity::new("  ", None, None, test_time()).is_err());
        assert!(LegalEntity::new("Crane Co", None, Some("DOLLARS"), test_time()).is_err());
    }

    #[test]
    fn account_type_parses_case_insensitively() {
        assert_eq!("asset".parse::<AccountType>().unwrap(), AccountType::Asset);
        assert_eq!("EXPENSE".parse::<AccountType>().unwrap(), AccountType::Expense);
        assert!("income".parse::<AccountType>().is_err());
    }

    #[test]
    fn account_serializes_type_in_upper_case() {
        let account = Account::open(
            NewAccount {
                entity_id: EntityId::new(),
                code: "1000".into(),
                name: "Bank".into(),
                account_type: AccountType::Asset,
                is_bank_account: true,
                is_active: true,
            },
            test_time(),
        )
        .unwrap();
        assert!(account.is_active);

        let json = serde_json::to_value(&account).unwrap();
        assert_eq!(json["type"], "ASSET");
        assert_eq!(json["isBankAccount"], true);
    }

    #[test]
    fn tax_rate_must_be_a_fraction() {
        let entity_id = EntityId::new();
        assert!(TaxCode::new(entity_id, "GST", Decimal::new(10, 2), test_time()).is_ok());
        assert!(TaxCode::new(entity_id, "GST", Decimal::new(-1, 2), test_time()).is_err());
        assert!(TaxCode::new(entity_id, "GST", Decimal::new(11, 0), test_time()).is_err());
    }

    #[test]
    fn tax_rate_precision_is_capped_at_six_places() {
        let entity_id = EntityId::new();
        assert!(TaxCode::new(entity_id, "VAT", Decimal::new(123_456, 6), test_time()).is_ok());
        // Trailing zeros do not count.
        assert!(TaxCode::new(entity_id, "GST", Decimal::new(1_000_000_000, 10), test_time()).is_ok());
        assert_eq!(
            TaxCode::new(entity_id, "Odd", Decimal::new(1_234_567, 7), test_time()).unwrap_err(),
            DomainError::validation("tax rate must have at most 6 decimal places")
        );
    }
}
