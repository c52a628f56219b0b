//! Accounting module (chart of accounts, double-entry journal, statements).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. The
//! storage-backed engines in `craneledger-infra` call into this crate for every
//! validation and aggregation rule.

pub mod chart;
pub mod journal;
pub mod statements;

pub use chart::{Account, AccountType, LegalEntity, NewAccount, TaxCode, DEFAULT_CURRENCY};
pub use journal::{
    reversal_reference, validate_lines, JournalEntry, JournalLine, JournalLineInput,
    JournalStatus, JournalTotals, PostJournalEntry, PostedJournal, SourceSystem,
};
pub use statements::{
    fold_activity, AccountActivity, BalanceSheet, BalanceSheetRow, LedgerLine, LedgerPeriod,
    ProfitAndLoss, ProfitAndLossRow, TrialBalance, TrialBalanceRow,
};
