//! Integration tests for the billing workflows.
//!
//! These tests drive order creation and invoice reconciliation together over
//! one shared store, including concurrent invoice creation for one order.

use std::sync::Arc;

use billing::{
    BillingConfig, BillingError, CreateInvoice, CreateOrder, ErrorKind, InvoiceService,
    OrderService,
};
use common::{Money, OrderId, ShipmentId};
use store::{InMemoryStore, Order, PaymentMethod};

struct Harness {
    store: InMemoryStore,
    orders: OrderService<InMemoryStore>,
    invoices: Arc<InvoiceService<InMemoryStore>>,
}

/// Helper to create both services over a seeded catalog
async fn create_harness() -> Harness {
    let store = InMemoryStore::new();
    store
        .upsert_item("SKU001", "Widget", Money::from_dollars(100))
        .await;
    store
        .upsert_item("SKU002", "Gadget", Money::from_dollars(100))
        .await;
    store
        .upsert_item("SKU003", "Gizmo", Money::from_dollars(25))
        .await;

    Harness {
        orders: OrderService::new(store.clone(), BillingConfig::default()),
        invoices: Arc::new(InvoiceService::new(store.clone())),
        store,
    }
}

async fn place_order(harness: &Harness, lines: &[(&str, i64)], paid: Money) -> Order {
    let mut cmd = CreateOrder::new("cust-1").payment(PaymentMethod::Cod, paid);
    for &(sku, quantity) in lines {
        cmd = cmd.item(sku, quantity);
    }
    harness.orders.create_order(cmd).await.unwrap()
}

mod order_creation {
    use super::*;

    #[tokio::test]
    async fn order_with_matching_payment() {
        let harness = create_harness().await;

        let order = place_order(
            &harness,
            &[("SKU001", 2), ("SKU002", 1)],
            Money::from_dollars(300),
        )
        .await;

        assert_eq!(order.total_amount, Money::from_dollars(300));
        assert_eq!(order.status.as_str(), "PENDING");
        assert_eq!(order.items[0].item.sku, "SKU001");
    }

    #[tokio::test]
    async fn order_with_short_payment() {
        let harness = create_harness().await;

        let err = harness
            .orders
            .create_order(
                CreateOrder::new("cust-1")
                    .item("SKU001", 2)
                    .item("SKU002", 1)
                    .payment(PaymentMethod::Cod, Money::from_dollars(250)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert!(err.to_string().contains("$250.00"));
        assert!(err.to_string().contains("$300.00"));
        assert_eq!(harness.store.order_count().await, 0);
    }
}

mod invoice_reconciliation {
    use super::*;

    #[tokio::test]
    async fn partial_shipments_never_exceed_order() {
        let harness = create_harness().await;
        let order = place_order(&harness, &[("SKU001", 2)], Money::from_dollars(200)).await;

        let first = harness
            .invoices
            .create_invoice(CreateInvoice::new(ShipmentId::new(101), order.id).item("SKU001", 1))
            .await
            .unwrap();
        assert_eq!(first.total_amount, Money::from_dollars(100));

        let err = harness
            .invoices
            .create_invoice(CreateInvoice::new(ShipmentId::new(102), order.id).item("SKU001", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::QuantityExceeded { remaining: 1, .. }));
        assert_eq!(harness.store.invoice_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_order() {
        let harness = create_harness().await;

        let err = harness
            .invoices
            .create_invoice(
                CreateInvoice::new(ShipmentId::new(101), OrderId::new(999)).item("SKU001", 1),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OrderNotFound);
    }

    #[tokio::test]
    async fn non_positive_quantity_persists_nothing() {
        let harness = create_harness().await;
        let order = place_order(&harness, &[("SKU001", 2)], Money::from_dollars(200)).await;

        for quantity in [0, -1] {
            let err = harness
                .invoices
                .create_invoice(
                    CreateInvoice::new(ShipmentId::new(101), order.id)
                        .item("SKU001", 1)
                        .item("SKU001", quantity),
                )
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidQuantity);
        }
        assert_eq!(harness.store.invoice_count().await, 0);
    }

    #[tokio::test]
    async fn catalog_item_outside_order() {
        let harness = create_harness().await;
        let order = place_order(&harness, &[("SKU001", 2)], Money::from_dollars(200)).await;

        let err = harness
            .invoices
            .create_invoice(CreateInvoice::new(ShipmentId::new(101), order.id).item("SKU003", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::ItemNotInOrder { .. }));
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn repeated_rejection_is_stable() {
        let harness = create_harness().await;
        let order = place_order(&harness, &[("SKU001", 2)], Money::from_dollars(200)).await;

        let cmd = CreateInvoice::new(ShipmentId::new(101), order.id)
            .item("SKU001", 2)
            .item("SKU001", 1);

        let first = harness
            .invoices
            .create_invoice(cmd.clone())
            .await
            .unwrap_err()
            .to_string();
        let second = harness
            .invoices
            .create_invoice(cmd)
            .await
            .unwrap_err()
            .to_string();

        assert_eq!(first, second);
        assert_eq!(harness.store.invoice_count().await, 0);
    }

    #[tokio::test]
    async fn fully_invoiced_order_bills_order_total() {
        let harness = create_harness().await;
        let order = place_order(
            &harness,
            &[("SKU001", 2), ("SKU002", 1), ("SKU003", 4)],
            Money::from_dollars(400),
        )
        .await;

        harness
            .invoices
            .create_invoice(
                CreateInvoice::new(ShipmentId::new(101), order.id)
                    .item("SKU001", 1)
                    .item("SKU003", 2),
            )
            .await
            .unwrap();
        harness
            .invoices
            .create_invoice(
                CreateInvoice::new(ShipmentId::new(102), order.id)
                    .item("SKU003", 2)
                    .item("SKU001", 1)
                    .item("SKU002", 1),
            )
            .await
            .unwrap();

        let invoices = harness.invoices.invoices_for_order(order.id).await.unwrap();
        let billed: Money = invoices.iter().map(|invoice| invoice.total_amount).sum();
        assert_eq!(billed, order.total_amount);
    }

    #[tokio::test]
    async fn storage_failure_is_persistence_error() {
        let harness = create_harness().await;
        let order = place_order(&harness, &[("SKU001", 2)], Money::from_dollars(200)).await;
        harness.store.set_fail_writes(true).await;

        let err = harness
            .invoices
            .create_invoice(CreateInvoice::new(ShipmentId::new(101), order.id).item("SKU001", 1))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.to_string().starts_with("failed to create invoice"));
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_invoices_for_one_order_never_overbill() {
        let harness = create_harness().await;
        let order = place_order(&harness, &[("SKU001", 5)], Money::from_dollars(500)).await;

        let attempts = (0..10).map(|n| {
            let invoices = harness.invoices.clone();
            let cmd = CreateInvoice::new(ShipmentId::new(100 + n), order.id).item("SKU001", 2);
            tokio::spawn(async move { invoices.create_invoice(cmd).await })
        });
        let results = futures_util::future::join_all(attempts).await;

        let created = results
            .into_iter()
            .map(|joined| joined.unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(created, 2);

        let invoiced: u64 = harness
            .invoices
            .invoices_for_order(order.id)
            .await
            .unwrap()
            .iter()
            .flat_map(|invoice| invoice.items.iter())
            .map(|line| u64::from(line.quantity))
            .sum();
        assert_eq!(invoiced, 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn different_orders_proceed_independently() {
        let harness = create_harness().await;
        let first = place_order(&harness, &[("SKU001", 1)], Money::from_dollars(100)).await;
        let second = place_order(&harness, &[("SKU001", 1)], Money::from_dollars(100)).await;

        let (a, b) = tokio::join!(
            harness
                .invoices
                .create_invoice(CreateInvoice::new(ShipmentId::new(1), first.id).item("SKU001", 1)),
            harness
                .invoices
                .create_invoice(CreateInvoice::new(ShipmentId::new(2), second.id).item("SKU001", 1)),
        );
        assert!(a.is_ok());
        assert!(b.is_ok());
    }
}
