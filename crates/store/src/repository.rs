use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    Invoice, InvoiceId, Item, ItemId, NewInvoice, NewOrder, NewShipment, Order, OrderId, Result,
    Shipment, ShipmentId, ShipmentStatus, StoreError,
};

/// Read-only access to the item catalog.
#[async_trait]
pub trait ItemRepository: Send + Sync {
    /// Looks up an item by its identifier.
    async fn item_by_id(&self, id: ItemId) -> Result<Option<Item>>;

    /// Looks up an item by its SKU.
    async fn item_by_sku(&self, sku: &str) -> Result<Option<Item>>;
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Persists an order together with its lines and payments.
    ///
    /// The write is atomic: either the order and all of its lines and
    /// payments become visible, or nothing does.
    async fn create_order(&self, order: NewOrder) -> Result<Order>;

    /// Retrieves an order with its lines (including the catalog item) and
    /// payments.
    ///
    /// Returns None if the order doesn't exist.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    /// Persists an invoice together with its lines.
    ///
    /// Atomic like [`OrderRepository::create_order`]. Implementations also
    /// reject a second invoice for the same shipment and any invoice that
    /// would bill more of an item than the order contains; the quantity check
    /// runs under an exclusive scope for the order so two concurrent writers
    /// cannot both pass it.
    async fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice>;

    /// Retrieves an invoice with its lines.
    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>>;

    /// Retrieves every invoice issued against an order, oldest first.
    ///
    /// Returns an empty list when none exist.
    async fn invoices_for_order(&self, order_id: OrderId) -> Result<Vec<Invoice>>;
}

#[async_trait]
pub trait ShipmentRepository: Send + Sync {
    /// Persists a shipment together with its lines.
    async fn create_shipment(&self, shipment: NewShipment) -> Result<Shipment>;

    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>>;

    /// Changes the status of an existing shipment and returns the updated
    /// record.
    async fn update_shipment_status(
        &self,
        id: ShipmentId,
        status: ShipmentStatus,
    ) -> Result<Shipment>;
}

/// Checks that adding `invoice` to what has already been invoiced keeps every
/// item at or below its ordered quantity.
///
/// `ordered` and `invoiced` map item ids to total quantities for the order.
pub(crate) fn ensure_within_ordered(
    invoice: &NewInvoice,
    ordered: &HashMap<ItemId, u64>,
    invoiced: &HashMap<ItemId, u64>,
) -> Result<()> {
    let mut requested: HashMap<ItemId, u64> = HashMap::new();
    for line in &invoice.items {
        *requested.entry(line.item_id).or_default() += u64::from(line.quantity);
    }

    for (item_id, quantity) in requested {
        let ordered_qty = ordered.get(&item_id).copied().unwrap_or(0);
        let total = invoiced.get(&item_id).copied().unwrap_or(0) + quantity;
        if total > ordered_qty {
            return Err(StoreError::QuantityConflict {
                order_id: invoice.order_id,
                item_id,
                invoiced: total,
                ordered: ordered_qty,
            });
        }
    }

    Ok(())
}
