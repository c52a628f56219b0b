//! Invoicing domain module: accounts receivable and accounts payable.
//!
//! Invoices and supplier bills are posted to the ledger once and settled by
//! payments. The paid status is never stored as a running counter: it is
//! recomputed from the full set of payment applications every time a payment
//! lands.

pub mod bill;
pub mod invoice;

pub use bill::{Bill, BillPaymentApplication, BillStatus, NewBill};
pub use invoice::{
    recompute_status, status_for_paid, Invoice, InvoiceStatus, NewInvoice, Payment,
    PaymentApplication, PaymentDirection, PaymentMethod,
};
