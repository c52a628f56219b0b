use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use craneledger_accounting::{AccountType, JournalLineInput, NewAccount, PostJournalEntry, SourceSystem};
use craneledger_bookings::{BookingAccounts, CancellationScenario};
use craneledger_core::{AccountId, ContactId, EntityId, JournalEntryId, Money};
use craneledger_invoicing::{NewBill, NewInvoice};
use craneledger_parties::ContactType;

fn default_true() -> bool {
    true
}

// -------------------------
// Chart of accounts
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntityRequest {
    pub name: String,
    #[serde(default)]
    pub legal_identifier: Option<String>,
    #[serde(default)]
    pub currency_code: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    #[serde(default)]
    pub is_bank_account: bool,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl CreateAccountRequest {
    pub fn into_new_account(self, entity_id: EntityId) -> NewAccount {
        NewAccount {
            entity_id,
            code: self.code,
            name: self.name,
            account_type: self.account_type,
            is_bank_account: self.is_bank_account,
            is_active: self.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAccountActiveRequest {
    pub is_active: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaxCodeRequest {
    pub name: String,
    pub rate: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateContactRequest {
    #[serde(rename = "type")]
    pub contact_type: ContactType,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub external_ref: Option<String>,
}

// -------------------------
// Journals
// -------------------------

/// Body of `POST /entities/:entityId/journals`; the entity comes from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostJournalRequest {
    pub date: NaiveDate,
    pub description: String,
    pub source_system: SourceSystem,
    #[serde(default)]
    pub source_reference: Option<String>,
    pub lines: Vec<JournalLineInput>,
    #[serde(default)]
    pub created_by_user_id: Option<String>,
}

impl PostJournalRequest {
    pub fn into_request(self, entity_id: EntityId) -> PostJournalEntry {
        PostJournalEntry {
            entity_id,
            date: self.date,
            description: self.description,
            source_system: self.source_system,
            source_reference: self.source_reference,
            lines: self.lines,
            created_by: self.created_by_user_id,
            reverses: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseJournalRequest {
    pub date: NaiveDate,
    pub reason: String,
    #[serde(default)]
    pub created_by_user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalQuery {
    #[serde(default)]
    pub source_reference: Option<String>,
}

// -------------------------
// Reports
// -------------------------

/// Dates stay raw so a missing or malformed value gets a specific message.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    #[serde(default)]
    pub as_of: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
}

// -------------------------
// Bookings
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPaymentRequest {
    pub amount: Money,
    pub date: NaiveDate,
    pub account_ids: BookingAccounts,
    #[serde(default = "default_true", rename = "includeGST")]
    pub include_gst: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarginRequest {
    pub margin_amount: Money,
    pub date: NaiveDate,
    pub account_ids: BookingAccounts,
    #[serde(default = "default_true", rename = "includeGST")]
    pub include_gst: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBookingRequest {
    pub date: NaiveDate,
    pub account_ids: BookingAccounts,
    pub scenario: CancellationScenario,
    #[serde(default)]
    pub new_supplier_id: Option<ContactId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub amount: Money,
    pub date: NaiveDate,
    pub account_ids: BookingAccounts,
    #[serde(default = "default_true")]
    pub refund_from_deposit: bool,
}

// -------------------------
// Invoices
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub contact_id: ContactId,
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub currency_code: Option<String>,
    pub subtotal_amount: Money,
    #[serde(default)]
    pub tax_amount: Money,
    #[serde(default)]
    pub external_ref: Option<String>,
}

impl CreateInvoiceRequest {
    pub fn into_new_invoice(self, entity_id: EntityId) -> NewInvoice {
        NewInvoice {
            entity_id,
            contact_id: self.contact_id,
            number: self.number,
            issue_date: self.issue_date,
            due_date: self.due_date,
            currency_code: self.currency_code,
            subtotal_amount: self.subtotal_amount,
            tax_amount: self.tax_amount,
            external_ref: self.external_ref,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInvoiceRequest {
    pub receivable_account_id: AccountId,
    pub revenue_account_id: AccountId,
    #[serde(default)]
    pub tax_liability_account_id: Option<AccountId>,
}

// -------------------------
// Bills
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBillRequest {
    pub contact_id: ContactId,
    pub number: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    #[serde(default)]
    pub currency_code: Option<String>,
    pub subtotal_amount: Money,
    #[serde(default)]
    pub tax_amount: Money,
    #[serde(default)]
    pub external_ref: Option<String>,
}

impl CreateBillRequest {
    pub fn into_new_bill(self, entity_id: EntityId) -> NewBill {
        NewBill {
            entity_id,
            contact_id: self.contact_id,
            number: self.number,
            issue_date: self.issue_date,
            due_date: self.due_date,
            currency_code: self.currency_code,
            subtotal_amount: self.subtotal_amount,
            tax_amount: self.tax_amount,
            external_ref: self.external_ref,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostBillRequest {
    pub payable_account_id: AccountId,
    pub expense_account_id: AccountId,
    #[serde(default)]
    pub tax_asset_account_id: Option<AccountId>,
}

// -------------------------
// Intercompany
// -------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompensateTransferRequest {
    pub posted_entry_id: JournalEntryId,
    pub date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn booking_payment_defaults_to_gst_inclusive() {
        let accounts = json!({
            "bankAccountId": AccountId::new(),
            "customerDepositsHeldAccountId": AccountId::new(),
            "accountsReceivableAccountId": AccountId::new(),
            "marginRevenueAccountId": AccountId::new(),
            "supplierPayoutsAccountId": AccountId::new(),
            "gstOnIncomeAccountId": AccountId::new(),
        });
        let body: BookingPaymentRequest = serde_json::from_value(json!({
            "amount": "1100.00",
            "date": "2024-10-01",
            "accountIds": accounts.clone(),
        }))
        .unwrap();
        assert!(body.include_gst);
        assert_eq!(body.amount, Money::from_major(1100));

        let body: BookingPaymentRequest = serde_json::from_value(json!({
            "amount": 500,
            "date": "2024-10-01",
            "accountIds": accounts,
            "includeGST": false,
        }))
        .unwrap();
        assert!(!body.include_gst);
    }

    #[test]
    fn account_request_reads_type_and_defaults_active() {
        let body: CreateAccountRequest =
            serde_json::from_value(json!({"code": "1000", "name": "Bank", "type": "ASSET"})).unwrap();
        let account = body.into_new_account(EntityId::new());
        assert_eq!(account.account_type, AccountType::Asset);
        assert!(account.is_active);
        assert!(!account.is_bank_account);
    }

    #[test]
    fn bill_request_defaults_tax_to_zero() {
        let body: CreateBillRequest = serde_json::from_value(json!({
            "contactId": ContactId::new(),
            "number": "BIG-7",
            "issueDate": "2024-11-01",
            "dueDate": "2024-11-30",
            "subtotalAmount": 480,
        }))
        .unwrap();
        let bill = body.into_new_bill(EntityId::new());
        assert!(bill.tax_amount.is_zero());
        assert_eq!(bill.subtotal_amount, Money::from_major(480));

        let post: PostBillRequest = serde_json::from_value(json!({
            "payableAccountId": AccountId::new(),
            "expenseAccountId": AccountId::new(),
        }))
        .unwrap();
        assert!(post.tax_asset_account_id.is_none());
    }
}
