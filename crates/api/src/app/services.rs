use std::sync::Arc;

use axum::response::Response;

use craneledger_infra::workflows::{
    BillWorkflow, BookingWorkflow, ContactDirectory, IntercompanyTransfer, InvoiceWorkflow,
};
use craneledger_infra::{
    BillStore, BookingStore, ContactStore, InMemoryStore, InvoiceStore, LedgerEngine, LedgerError, LedgerStore,
    PostgresStore, ReportingEngine,
};

use crate::app::errors;
use crate::config::AppEnv;

pub type SharedLedgerStore = Arc<dyn LedgerStore>;
pub type SharedContactStore = Arc<dyn ContactStore>;
pub type SharedBookingStore = Arc<dyn BookingStore>;
pub type SharedInvoiceStore = Arc<dyn InvoiceStore>;
pub type SharedBillStore = Arc<dyn BillStore>;

/// Engines and workflows shared by every handler.
pub struct AppServices {
    pub ledger: LedgerEngine<SharedLedgerStore>,
    pub reports: ReportingEngine<SharedLedgerStore, SharedBookingStore, SharedContactStore>,
    pub contacts: ContactDirectory<SharedLedgerStore, SharedContactStore>,
    pub bookings: BookingWorkflow<SharedLedgerStore, SharedBookingStore, SharedContactStore>,
    pub invoices: InvoiceWorkflow<SharedLedgerStore, SharedInvoiceStore, SharedContactStore>,
    pub bills: BillWorkflow<SharedLedgerStore, SharedBillStore, SharedContactStore>,
    pub intercompany: IntercompanyTransfer<SharedLedgerStore>,
    app_env: AppEnv,
}

impl AppServices {
    /// Wire every service onto one backend implementing every store trait.
    pub fn from_store<S>(store: Arc<S>, app_env: AppEnv) -> Self
    where
        S: LedgerStore + ContactStore + BookingStore + InvoiceStore + BillStore + 'static,
    {
        let ledger_store: SharedLedgerStore = store.clone();
        let contact_store: SharedContactStore = store.clone();
        let booking_store: SharedBookingStore = store.clone();
        let invoice_store: SharedInvoiceStore = store.clone();
        let bill_store: SharedBillStore = store;

        let ledger = LedgerEngine::new(ledger_store.clone());
        Self {
            reports: ReportingEngine::new(ledger_store.clone(), booking_store.clone(), contact_store.clone()),
            contacts: ContactDirectory::new(ledger_store, contact_store.clone()),
            bookings: BookingWorkflow::new(ledger.clone(), booking_store, contact_store.clone()),
            invoices: InvoiceWorkflow::new(ledger.clone(), invoice_store, contact_store.clone()),
            bills: BillWorkflow::new(ledger.clone(), bill_store, contact_store),
            intercompany: IntercompanyTransfer::new(ledger.clone()),
            ledger,
            app_env,
        }
    }

    pub fn in_memory(app_env: AppEnv) -> Self {
        Self::from_store(Arc::new(InMemoryStore::new()), app_env)
    }

    pub fn postgres(store: PostgresStore, app_env: AppEnv) -> Self {
        Self::from_store(Arc::new(store), app_env)
    }

    pub fn app_env(&self) -> AppEnv {
        self.app_env
    }

    pub fn error_response(&self, err: LedgerError) -> Response {
        errors::ledger_error_to_response(err, self.app_env.is_development())
    }
}
