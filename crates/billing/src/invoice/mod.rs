//! Invoice reconciliation.

mod commands;
mod ledger;
mod service;

pub use commands::{CreateInvoice, InvoiceLine};
pub use ledger::QuantityLedger;
pub use service::InvoiceService;
