//! Invoice commands.

use common::{OrderId, ShipmentId};
use serde::{Deserialize, Serialize};

/// Command to bill the items of one shipment against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub shipment_id: ShipmentId,
    pub order_id: OrderId,

    /// Lines in request order. The same SKU may appear more than once.
    pub items: Vec<InvoiceLine>,
}

impl CreateInvoice {
    /// Creates a new CreateInvoice command with no lines.
    pub fn new(shipment_id: ShipmentId, order_id: OrderId) -> Self {
        Self {
            shipment_id,
            order_id,
            items: Vec::new(),
        }
    }

    /// Adds a line.
    pub fn item(mut self, sku: impl Into<String>, quantity: i64) -> Self {
        self.items.push(InvoiceLine {
            sku: sku.into(),
            quantity,
        });
        self
    }
}

/// A requested invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub sku: String,
    pub quantity: i64,
}
