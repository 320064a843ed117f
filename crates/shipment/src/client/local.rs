//! In-process billing client.

use std::sync::Arc;

use async_trait::async_trait;
use billing::{CreateInvoice, ErrorKind, InvoiceService};
use store::{InvoiceRepository, ItemRepository, OrderRepository};

use super::{BillingClient, InvoiceOutcome};

/// Calls an [`InvoiceService`] running in the same process.
pub struct LocalBillingClient<S> {
    service: Arc<InvoiceService<S>>,
}

impl<S> LocalBillingClient<S> {
    pub fn new(service: Arc<InvoiceService<S>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> BillingClient for LocalBillingClient<S>
where
    S: OrderRepository + InvoiceRepository + ItemRepository,
{
    async fn create_invoice(&self, request: CreateInvoice) -> InvoiceOutcome {
        match self.service.create_invoice(request).await {
            Ok(invoice) => InvoiceOutcome::Created(invoice),
            // A storage failure that is not a data conflict means billing
            // itself is down rather than refusing the request.
            Err(err)
                if err.kind() == ErrorKind::Persistence
                    && !err.store_error().is_some_and(|e| e.is_conflict()) =>
            {
                InvoiceOutcome::ConnectionFailed(err.to_string())
            }
            Err(err) => InvoiceOutcome::RemoteRejected(err.to_string()),
        }
    }
}
