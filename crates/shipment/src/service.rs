//! Shipment service.

use std::sync::Arc;

use billing::CreateInvoice;
use common::{OrderId, ShipmentId};
use serde::{Deserialize, Serialize};
use store::{NewShipment, Shipment, ShipmentItem, ShipmentRepository, ShipmentStatus};

use crate::client::{BillingClient, InvoiceOutcome};
use crate::error::{Result, ShipmentError};

/// A requested shipment line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentLine {
    pub sku: String,
    pub quantity: i64,
}

impl ShipmentLine {
    pub fn new(sku: impl Into<String>, quantity: i64) -> Self {
        Self {
            sku: sku.into(),
            quantity,
        }
    }
}

/// Service for recording shipments and billing them.
pub struct ShipmentService<S> {
    store: S,
    billing: Arc<dyn BillingClient>,
}

impl<S: ShipmentRepository> ShipmentService<S> {
    /// Creates a new shipment service.
    pub fn new(store: S, billing: Arc<dyn BillingClient>) -> Self {
        Self { store, billing }
    }

    /// Records a confirmed shipment, then asks billing to invoice it.
    ///
    /// The billing call happens after the shipment is stored. If billing
    /// does not create the invoice the shipment is marked
    /// [`ShipmentStatus::Failed`] and the reason is returned.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn create_shipment(
        &self,
        order_id: OrderId,
        lines: Vec<ShipmentLine>,
    ) -> Result<Shipment> {
        let items = validate(lines)?;

        let shipment = self
            .store
            .create_shipment(NewShipment {
                order_id,
                status: ShipmentStatus::Confirmed,
                items,
            })
            .await?;

        let request = shipment.items.iter().fold(
            CreateInvoice::new(shipment.id, order_id),
            |request, item| request.item(item.sku.clone(), i64::from(item.quantity)),
        );

        match self.billing.create_invoice(request).await {
            InvoiceOutcome::Created(invoice) => {
                metrics::counter!("shipments_created_total").increment(1);
                tracing::info!(
                    shipment_id = %shipment.id,
                    invoice_id = %invoice.id,
                    "shipment billed"
                );
                Ok(shipment)
            }
            InvoiceOutcome::ConnectionFailed(reason) => {
                metrics::counter!("shipment_billing_failures_total", "outcome" => "connection_failed")
                    .increment(1);
                self.mark_failed(shipment.id).await;
                Err(ShipmentError::BillingUnavailable {
                    shipment_id: shipment.id,
                    reason,
                })
            }
            InvoiceOutcome::RemoteRejected(reason) => {
                metrics::counter!("shipment_billing_failures_total", "outcome" => "rejected")
                    .increment(1);
                self.mark_failed(shipment.id).await;
                Err(ShipmentError::InvoiceRejected {
                    shipment_id: shipment.id,
                    reason,
                })
            }
        }
    }

    /// Loads a shipment with its lines.
    #[tracing::instrument(skip(self))]
    pub async fn get_shipment(&self, id: ShipmentId) -> Result<Shipment> {
        self.store
            .get_shipment(id)
            .await?
            .ok_or(ShipmentError::NotFound(id))
    }

    async fn mark_failed(&self, id: ShipmentId) {
        if let Err(err) = self
            .store
            .update_shipment_status(id, ShipmentStatus::Failed)
            .await
        {
            tracing::warn!(shipment_id = %id, error = %err, "failed to mark shipment as failed");
        }
    }
}

fn validate(lines: Vec<ShipmentLine>) -> Result<Vec<ShipmentItem>> {
    if lines.is_empty() {
        return Err(ShipmentError::NoItems);
    }

    lines
        .into_iter()
        .map(|line| {
            if line.sku.trim().is_empty() {
                return Err(ShipmentError::SkuRequired);
            }
            match u32::try_from(line.quantity) {
                Ok(quantity) if quantity > 0 => Ok(ShipmentItem {
                    sku: line.sku,
                    quantity,
                }),
                _ => Err(ShipmentError::InvalidQuantity {
                    sku: line.sku,
                    quantity: line.quantity,
                }),
            }
        })
        .collect()
}
