//! HTTP billing client.

use std::time::Duration;

use async_trait::async_trait;
use billing::CreateInvoice;
use serde::Deserialize;
use store::Invoice;

use super::{BillingClient, InvoiceOutcome};

/// Error body returned by the billing API.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Calls the billing API over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBillingClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBillingClient {
    /// Request timeout used when none is configured.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a client for the billing API rooted at `base_url`, for example
    /// `http://billing:3000`.
    ///
    /// Each request, including reading the response body, fails after
    /// `timeout` and is reported as [`InvoiceOutcome::ConnectionFailed`].
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    fn invoices_url(&self) -> String {
        format!("{}/api/v1/invoices", self.base_url)
    }
}

#[async_trait]
impl BillingClient for HttpBillingClient {
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id, shipment_id = %request.shipment_id))]
    async fn create_invoice(&self, request: CreateInvoice) -> InvoiceOutcome {
        let response = match self
            .client
            .post(self.invoices_url())
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "billing request failed");
                return InvoiceOutcome::ConnectionFailed(err.to_string());
            }
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<Invoice>().await {
                Ok(invoice) => InvoiceOutcome::Created(invoice),
                Err(err) => {
                    InvoiceOutcome::ConnectionFailed(format!("malformed billing response: {err}"))
                }
            };
        }

        if status.is_server_error() {
            let reason = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return InvoiceOutcome::ConnectionFailed(reason);
        }

        match response.json::<ErrorBody>().await {
            Ok(body) => InvoiceOutcome::RemoteRejected(body.error),
            Err(_) => InvoiceOutcome::RemoteRejected(status.to_string()),
        }
    }
}
