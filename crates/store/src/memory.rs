use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    Invoice, InvoiceId, InvoiceItem, InvoiceRepository, Item, ItemId, ItemRepository, Money,
    NewInvoice, NewOrder, NewShipment, Order, OrderId, OrderItem, OrderRepository, Payment,
    Result, Shipment, ShipmentId, ShipmentRepository, ShipmentStatus, StoreError,
    repository::ensure_within_ordered,
};

#[derive(Debug, Default)]
struct Sequences {
    item: i64,
    order: i64,
    order_line: i64,
    payment: i64,
    invoice: i64,
    invoice_line: i64,
    shipment: i64,
}

fn next(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Default)]
struct State {
    items: BTreeMap<ItemId, Item>,
    orders: HashMap<OrderId, Order>,
    invoices: BTreeMap<InvoiceId, Invoice>,
    shipments: HashMap<ShipmentId, Shipment>,
    seq: Sequences,
    fail_writes: bool,
}

impl State {
    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

/// In-memory store implementation for testing and local runs.
///
/// Implements every repository trait over one shared state, so a single
/// clone can be handed to each workflow. Every write happens under one
/// write lock, which makes creates atomic and serializes the invoice
/// quantity check.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item to the catalog, or updates the name and price of the
    /// item that already has this SKU.
    pub async fn upsert_item(
        &self,
        sku: impl Into<String>,
        name: impl Into<String>,
        price: Money,
    ) -> Item {
        let sku = sku.into();
        let name = name.into();
        let mut state = self.state.write().await;

        if let Some(existing) = state.items.values_mut().find(|item| item.sku == sku) {
            existing.name = name;
            existing.price = price;
            return existing.clone();
        }

        let id = ItemId::new(next(&mut state.seq.item));
        let item = Item {
            id,
            sku,
            name,
            price,
        };
        state.items.insert(id, item.clone());
        item
    }

    /// Makes every subsequent write fail with [`StoreError::Unavailable`].
    pub async fn set_fail_writes(&self, fail: bool) {
        self.state.write().await.fail_writes = fail;
    }

    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    pub async fn invoice_count(&self) -> usize {
        self.state.read().await.invoices.len()
    }

    pub async fn shipment_count(&self) -> usize {
        self.state.read().await.shipments.len()
    }
}

#[async_trait]
impl ItemRepository for InMemoryStore {
    async fn item_by_id(&self, id: ItemId) -> Result<Option<Item>> {
        Ok(self.state.read().await.items.get(&id).cloned())
    }

    async fn item_by_sku(&self, sku: &str) -> Result<Option<Item>> {
        let state = self.state.read().await;
        Ok(state.items.values().find(|item| item.sku == sku).cloned())
    }
}

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create_order(&self, order: NewOrder) -> Result<Order> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let now = Utc::now();
        let id = OrderId::new(next(&mut state.seq.order));

        let mut items = Vec::with_capacity(order.items.len());
        for line in order.items {
            items.push(OrderItem {
                id: next(&mut state.seq.order_line),
                order_id: id,
                item: line.item,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        let mut payments = Vec::with_capacity(order.payments.len());
        for payment in order.payments {
            payments.push(Payment {
                id: next(&mut state.seq.payment),
                order_id: id,
                method: payment.method,
                amount: payment.amount,
            });
        }

        let order = Order {
            id,
            customer_id: order.customer_id,
            total_amount: order.total_amount,
            status: order.status,
            items,
            payments,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(id, order.clone());

        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn create_invoice(&self, invoice: NewInvoice) -> Result<Invoice> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let order = state
            .orders
            .get(&invoice.order_id)
            .ok_or(StoreError::UnknownOrder(invoice.order_id))?;

        if state
            .invoices
            .values()
            .any(|existing| existing.shipment_id == invoice.shipment_id)
        {
            return Err(StoreError::ShipmentAlreadyInvoiced(invoice.shipment_id));
        }

        let mut ordered: HashMap<ItemId, u64> = HashMap::new();
        for line in &order.items {
            *ordered.entry(line.item.id).or_default() += u64::from(line.quantity);
        }
        let mut invoiced: HashMap<ItemId, u64> = HashMap::new();
        for line in state
            .invoices
            .values()
            .filter(|existing| existing.order_id == invoice.order_id)
            .flat_map(|existing| existing.items.iter())
        {
            *invoiced.entry(line.item_id).or_default() += u64::from(line.quantity);
        }
        ensure_within_ordered(&invoice, &ordered, &invoiced)?;

        let now = Utc::now();
        let id = InvoiceId::new(next(&mut state.seq.invoice));
        let mut items = Vec::with_capacity(invoice.items.len());
        for line in invoice.items {
            items.push(InvoiceItem {
                id: next(&mut state.seq.invoice_line),
                invoice_id: id,
                item_id: line.item_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            });
        }

        let invoice = Invoice {
            id,
            order_id: invoice.order_id,
            shipment_id: invoice.shipment_id,
            total_amount: invoice.total_amount,
            items,
            created_at: now,
            updated_at: now,
        };
        state.invoices.insert(id, invoice.clone());

        Ok(invoice)
    }

    async fn get_invoice(&self, id: InvoiceId) -> Result<Option<Invoice>> {
        Ok(self.state.read().await.invoices.get(&id).cloned())
    }

    async fn invoices_for_order(&self, order_id: OrderId) -> Result<Vec<Invoice>> {
        let state = self.state.read().await;
        Ok(state
            .invoices
            .values()
            .filter(|invoice| invoice.order_id == order_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ShipmentRepository for InMemoryStore {
    async fn create_shipment(&self, shipment: NewShipment) -> Result<Shipment> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let now = Utc::now();
        let id = ShipmentId::new(next(&mut state.seq.shipment));
        let shipment = Shipment {
            id,
            order_id: shipment.order_id,
            status: shipment.status,
            items: shipment.items,
            created_at: now,
            updated_at: now,
        };
        state.shipments.insert(id, shipment.clone());

        Ok(shipment)
    }

    async fn get_shipment(&self, id: ShipmentId) -> Result<Option<Shipment>> {
        Ok(self.state.read().await.shipments.get(&id).cloned())
    }

    async fn update_shipment_status(
        &self,
        id: ShipmentId,
        status: ShipmentStatus,
    ) -> Result<Shipment> {
        let mut state = self.state.write().await;
        state.check_writable()?;

        let shipment = state
            .shipments
            .get_mut(&id)
            .ok_or(StoreError::UnknownShipment(id))?;
        shipment.status = status;
        shipment.updated_at = Utc::now();

        Ok(shipment.clone())
    }
}
