//! Billing client contract and adapters.

mod http;
mod local;

use async_trait::async_trait;
use billing::CreateInvoice;
use store::Invoice;

pub use http::HttpBillingClient;
pub use local::LocalBillingClient;

/// Result of asking the billing service to invoice a shipment.
///
/// Transport failures are kept apart from refusals so the caller can report
/// them differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceOutcome {
    /// The invoice was created.
    Created(Invoice),

    /// The billing service could not be reached or did not answer usefully.
    ConnectionFailed(String),

    /// The billing service answered and refused the invoice.
    RemoteRejected(String),
}

/// Trait for creating invoices in the billing service.
#[async_trait]
pub trait BillingClient: Send + Sync {
    async fn create_invoice(&self, request: CreateInvoice) -> InvoiceOutcome;
}
