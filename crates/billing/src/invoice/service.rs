//! Invoice service.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use common::{ItemId, Money, OrderId};
use store::{Invoice, InvoiceRepository, ItemRepository, NewInvoice, NewInvoiceItem, Order, OrderRepository};

use crate::catalog::Catalog;
use crate::checked_quantity;
use crate::error::BillingError;
use crate::lock::OrderLocks;

use super::{CreateInvoice, QuantityLedger};

/// Service for billing shipments against orders.
///
/// Holds one lock per order so that the read of prior invoices and the write
/// of the new one never interleave with another invoice for the same order.
pub struct InvoiceService<S> {
    store: S,
    locks: OrderLocks,
}

impl<S> InvoiceService<S>
where
    S: OrderRepository + InvoiceRepository + ItemRepository,
{
    /// Creates a new invoice service over the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            locks: OrderLocks::new(),
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an invoice for a shipment after reconciling the requested
    /// quantities against the order and every invoice already issued for it.
    ///
    /// A rejected request persists nothing, so repeating it against the same
    /// prior state fails the same way.
    #[tracing::instrument(
        skip(self, cmd),
        fields(order_id = %cmd.order_id, shipment_id = %cmd.shipment_id, lines = cmd.items.len())
    )]
    pub async fn create_invoice(&self, cmd: CreateInvoice) -> Result<Invoice, BillingError> {
        let started = Instant::now();
        let result = self.reconcile(cmd).await;
        metrics::histogram!("invoice_reconciliation_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(invoice) => {
                metrics::counter!("invoices_created_total").increment(1);
                tracing::info!(
                    invoice_id = %invoice.id,
                    total = %invoice.total_amount,
                    "invoice created"
                );
            }
            Err(err) => {
                metrics::counter!("invoice_rejections_total", "reason" => err.kind().as_str())
                    .increment(1);
                tracing::warn!(error = %err, "invoice rejected");
            }
        }

        result
    }

    /// Lists the invoices issued against an existing order, oldest first.
    #[tracing::instrument(skip(self))]
    pub async fn invoices_for_order(&self, order_id: OrderId) -> Result<Vec<Invoice>, BillingError> {
        self.load_order(order_id).await?;
        self.store
            .invoices_for_order(order_id)
            .await
            .map_err(BillingError::persistence("failed to retrieve existing invoices"))
    }

    async fn load_order(&self, order_id: OrderId) -> Result<Order, BillingError> {
        self.store
            .get_order(order_id)
            .await
            .map_err(BillingError::persistence("failed to load order"))?
            .ok_or(BillingError::OrderNotFound(order_id))
    }

    async fn reconcile(&self, cmd: CreateInvoice) -> Result<Invoice, BillingError> {
        if cmd.items.is_empty() {
            return Err(BillingError::NoItems);
        }

        // Reject bad quantities before touching the catalog or the store.
        let quantities = cmd
            .items
            .iter()
            .map(|line| checked_quantity(&line.sku, line.quantity))
            .collect::<Result<Vec<_>, _>>()?;

        let _guard = self.locks.acquire(cmd.order_id).await;

        let order = self.load_order(cmd.order_id).await?;
        let invoices = self
            .store
            .invoices_for_order(cmd.order_id)
            .await
            .map_err(BillingError::persistence("failed to retrieve existing invoices"))?;
        let ledger = QuantityLedger::new(&order, &invoices);

        let catalog = Catalog::new(&self.store);
        let mut accepted: Vec<(ItemId, u32)> = Vec::with_capacity(cmd.items.len());
        let mut running: BTreeMap<ItemId, u64> = BTreeMap::new();
        let mut skus: HashMap<ItemId, String> = HashMap::new();

        for (line, quantity) in cmd.items.iter().zip(quantities) {
            let item = catalog.by_sku(&line.sku).await?;
            if !ledger.contains(item.id) {
                return Err(BillingError::ItemNotInOrder {
                    sku: line.sku.clone(),
                });
            }

            let ordered = ledger.ordered(item.id);
            let consumed = ledger.consumed(item.id);
            let requested = u64::from(quantity);
            if requested + consumed > ordered {
                return Err(BillingError::QuantityExceeded {
                    sku: item.sku,
                    requested,
                    remaining: ledger.remaining(item.id),
                    consumed,
                    ordered,
                });
            }

            *running.entry(item.id).or_default() += requested;
            accepted.push((item.id, quantity));
            skus.insert(item.id, item.sku);
        }

        for (&item_id, &requested) in &running {
            if ledger.consumed(item_id) + requested > ledger.ordered(item_id) {
                return Err(BillingError::DuplicateLinesExceeded {
                    sku: skus.remove(&item_id).unwrap_or_default(),
                    requested,
                    remaining: ledger.remaining(item_id),
                    ordered: ledger.ordered(item_id),
                });
            }
        }

        let mut billed: HashMap<ItemId, u64> = HashMap::new();
        let mut total_amount = Money::zero();
        let mut items = Vec::with_capacity(accepted.len());
        for (item_id, quantity) in accepted {
            let offset = billed.entry(item_id).or_insert_with(|| ledger.consumed(item_id));
            for (units, unit_price) in ledger.allocate(item_id, *offset, quantity) {
                total_amount = unit_price
                    .checked_multiply(units)
                    .and_then(|line_total| total_amount.checked_add(line_total))
                    .ok_or(BillingError::AmountOverflow {
                        context: "invoice total",
                    })?;
                items.push(NewInvoiceItem {
                    item_id,
                    quantity: units,
                    unit_price,
                });
            }
            *offset += u64::from(quantity);
        }

        self.store
            .create_invoice(NewInvoice {
                order_id: cmd.order_id,
                shipment_id: cmd.shipment_id,
                total_amount,
                items,
            })
            .await
            .map_err(BillingError::persistence("failed to create invoice"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use common::ShipmentId;
    use store::{InMemoryStore, NewOrderItem, NewPayment, OrderStatus, PaymentMethod};

    async fn seeded_service(lines: &[(&str, u32, i64)]) -> (InvoiceService<InMemoryStore>, Order) {
        let store = InMemoryStore::new();
        let mut items = Vec::new();
        let mut total = Money::zero();
        for &(sku, quantity, dollars) in lines {
            let item = store
                .upsert_item(sku, sku, Money::from_dollars(100))
                .await;
            let unit_price = Money::from_dollars(dollars);
            // Saturates so oversized lines can still be seeded.
            total = unit_price
                .checked_multiply(quantity)
                .and_then(|line_total| total.checked_add(line_total))
                .unwrap_or(Money::from_cents(i64::MAX));
            items.push(NewOrderItem {
                item,
                quantity,
                unit_price,
            });
        }
        store.upsert_item("SKU999", "Unordered", Money::from_dollars(5)).await;

        let order = store
            .create_order(store::NewOrder {
                customer_id: "cust-1".to_string(),
                total_amount: total,
                status: OrderStatus::Pending,
                items,
                payments: vec![NewPayment {
                    method: PaymentMethod::Cod,
                    amount: total,
                }],
            })
            .await
            .unwrap();

        (InvoiceService::new(store), order)
    }

    fn shipment(id: i64) -> ShipmentId {
        ShipmentId::new(id)
    }

    #[tokio::test]
    async fn test_partial_then_exceeding_invoice() {
        let (service, order) = seeded_service(&[("SKU001", 2, 100)]).await;

        let first = service
            .create_invoice(CreateInvoice::new(shipment(101), order.id).item("SKU001", 1))
            .await
            .unwrap();
        assert_eq!(first.total_amount, Money::from_dollars(100));

        let err = service
            .create_invoice(CreateInvoice::new(shipment(102), order.id).item("SKU001", 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::QuantityExceeded {
                requested: 2,
                remaining: 1,
                consumed: 1,
                ordered: 2,
                ..
            }
        ));
        assert_eq!(err.kind(), ErrorKind::QuantityExceeded);
    }

    #[tokio::test]
    async fn test_remaining_quantity_can_be_billed() {
        let (service, order) = seeded_service(&[("SKU001", 2, 100)]).await;

        for id in [101, 102] {
            service
                .create_invoice(CreateInvoice::new(shipment(id), order.id).item("SKU001", 1))
                .await
                .unwrap();
        }

        let invoices = service.invoices_for_order(order.id).await.unwrap();
        assert_eq!(invoices.len(), 2);
    }

    #[tokio::test]
    async fn test_invoice_total_overflow_persists_nothing() {
        let (service, order) = seeded_service(&[("SKU001", 2, 1 << 56)]).await;

        let err = service
            .create_invoice(CreateInvoice::new(shipment(101), order.id).item("SKU001", 2))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::AmountOverflow {
                context: "invoice total"
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(service.store().invoice_count().await, 0);

        let single = service
            .create_invoice(CreateInvoice::new(shipment(102), order.id).item("SKU001", 1))
            .await
            .unwrap();
        assert_eq!(single.total_amount, Money::from_dollars(1 << 56));
    }

    #[tokio::test]
    async fn test_unknown_order() {
        let (service, _) = seeded_service(&[("SKU001", 2, 100)]).await;

        let err = service
            .create_invoice(CreateInvoice::new(shipment(101), OrderId::new(999)).item("SKU001", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::OrderNotFound(id) if id == OrderId::new(999)));
    }

    #[tokio::test]
    async fn test_invalid_quantity_checked_before_lookup() {
        let (service, _) = seeded_service(&[("SKU001", 2, 100)]).await;

        // Neither the order nor the SKU exist; the quantity is reported first.
        for quantity in [0, -3] {
            let err = service
                .create_invoice(
                    CreateInvoice::new(shipment(101), OrderId::new(999)).item("SKU404", quantity),
                )
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                BillingError::InvalidQuantity { ref item, quantity: q } if item == "SKU404" && q == quantity
            ));
        }
    }

    #[tokio::test]
    async fn test_empty_request() {
        let (service, order) = seeded_service(&[("SKU001", 2, 100)]).await;
        let err = service
            .create_invoice(CreateInvoice::new(shipment(101), order.id))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::NoItems));
    }

    #[tokio::test]
    async fn test_item_not_in_order() {
        let (service, order) = seeded_service(&[("SKU001", 2, 100)]).await;

        let err = service
            .create_invoice(CreateInvoice::new(shipment(101), order.id).item("SKU999", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::ItemNotInOrder { ref sku } if sku == "SKU999"));
        assert!(err.to_string().contains("not found in original order"));

        let err = service
            .create_invoice(CreateInvoice::new(shipment(101), order.id).item("SKU404", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ItemNotFound);
    }

    #[tokio::test]
    async fn test_duplicate_lines_jointly_exceeding() {
        let (service, order) = seeded_service(&[("SKU001", 3, 100)]).await;

        let err = service
            .create_invoice(
                CreateInvoice::new(shipment(101), order.id)
                    .item("SKU001", 2)
                    .item("SKU001", 2),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BillingError::DuplicateLinesExceeded {
                requested: 4,
                remaining: 3,
                ordered: 3,
                ..
            }
        ));
        assert_eq!(service.store().invoice_count().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_lines_exceeding_remaining() {
        let (service, order) = seeded_service(&[("SKU001", 3, 100)]).await;
        service
            .create_invoice(CreateInvoice::new(shipment(101), order.id).item("SKU001", 1))
            .await
            .unwrap();

        let err = service
            .create_invoice(
                CreateInvoice::new(shipment(102), order.id)
                    .item("SKU001", 1)
                    .item("SKU001", 2),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::DuplicateLinesExceeded { remaining: 2, .. }));
    }

    #[tokio::test]
    async fn test_prices_from_order_lines() {
        let (service, order) = seeded_service(&[("SKU001", 2, 100), ("SKU001", 2, 80)]).await;

        let first = service
            .create_invoice(CreateInvoice::new(shipment(101), order.id).item("SKU001", 3))
            .await
            .unwrap();
        assert_eq!(first.total_amount, Money::from_dollars(280));
        assert_eq!(first.items.len(), 2);

        let second = service
            .create_invoice(CreateInvoice::new(shipment(102), order.id).item("SKU001", 1))
            .await
            .unwrap();
        assert_eq!(second.total_amount, Money::from_dollars(80));
        assert_eq!(first.total_amount + second.total_amount, order.total_amount);
    }

    #[tokio::test]
    async fn test_second_invoice_for_shipment_is_persistence_conflict() {
        let (service, order) = seeded_service(&[("SKU001", 3, 100)]).await;
        service
            .create_invoice(CreateInvoice::new(shipment(101), order.id).item("SKU001", 1))
            .await
            .unwrap();

        let err = service
            .create_invoice(CreateInvoice::new(shipment(101), order.id).item("SKU001", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.store_error().is_some_and(|e| e.is_conflict()));
    }

    #[tokio::test]
    async fn test_invoices_for_unknown_order() {
        let (service, _) = seeded_service(&[("SKU001", 1, 100)]).await;
        let err = service.invoices_for_order(OrderId::new(42)).await.unwrap_err();
        assert!(matches!(err, BillingError::OrderNotFound(_)));
    }
}
