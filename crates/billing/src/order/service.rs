//! Order service.

use common::{Money, OrderId};
use store::{ItemRepository, NewOrder, NewOrderItem, NewPayment, Order, OrderRepository, OrderStatus};

use crate::catalog::Catalog;
use crate::checked_quantity;
use crate::config::BillingConfig;
use crate::error::BillingError;

use super::CreateOrder;

/// Service for creating and loading orders.
pub struct OrderService<S> {
    store: S,
    config: BillingConfig,
}

impl<S> OrderService<S>
where
    S: OrderRepository + ItemRepository,
{
    /// Creates a new order service over the given store.
    pub fn new(store: S, config: BillingConfig) -> Self {
        Self { store, config }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Creates an order after pricing every line and checking that the
    /// payments add up to exactly the order total.
    ///
    /// Nothing is persisted unless every check passes; the order, its lines
    /// and its payments are then written as one unit.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id, lines = cmd.items.len()))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, BillingError> {
        if cmd.customer_id.trim().is_empty() {
            return Err(BillingError::CustomerIdRequired);
        }

        let quantities = cmd
            .items
            .iter()
            .map(|line| checked_quantity(&line.item.to_string(), line.quantity))
            .collect::<Result<Vec<_>, _>>()?;

        let catalog = Catalog::new(&self.store);
        let mut total_amount = Money::zero();
        let mut items = Vec::with_capacity(cmd.items.len());

        for (line, quantity) in cmd.items.into_iter().zip(quantities) {
            let item = catalog.resolve(&line.item).await?;

            let unit_price = match line.unit_price {
                Some(price) if price.is_positive() => {
                    if !self.config.allow_price_override {
                        return Err(BillingError::PriceOverrideNotAllowed { item: line.item });
                    }
                    price
                }
                _ => item.price,
            };

            total_amount = unit_price
                .checked_multiply(quantity)
                .and_then(|line_total| total_amount.checked_add(line_total))
                .ok_or(BillingError::AmountOverflow {
                    context: "order total",
                })?;
            items.push(NewOrderItem {
                item,
                quantity,
                unit_price,
            });
        }

        let mut total_payment = Money::zero();
        let mut payments = Vec::with_capacity(cmd.payments.len());
        for line in cmd.payments {
            if line.amount.is_negative() {
                return Err(BillingError::NegativePayment {
                    amount: line.amount,
                });
            }
            total_payment =
                total_payment
                    .checked_add(line.amount)
                    .ok_or(BillingError::AmountOverflow {
                        context: "payment total",
                    })?;
            payments.push(NewPayment {
                method: line.method,
                amount: line.amount,
            });
        }

        if total_payment != total_amount {
            tracing::warn!(paid = %total_payment, total = %total_amount, "payment total mismatch");
            return Err(BillingError::PaymentMismatch {
                paid: total_payment,
                total: total_amount,
            });
        }

        let order = self
            .store
            .create_order(NewOrder {
                customer_id: cmd.customer_id,
                total_amount,
                status: OrderStatus::Pending,
                items,
                payments,
            })
            .await
            .map_err(BillingError::persistence("failed to create order"))?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, total = %order.total_amount, "order created");

        Ok(order)
    }

    /// Loads an order with its lines and payments.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, BillingError> {
        self.store
            .get_order(order_id)
            .await
            .map_err(BillingError::persistence("failed to load order"))?
            .ok_or(BillingError::OrderNotFound(order_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ItemRef;
    use crate::error::ErrorKind;
    use crate::order::OrderLine;
    use store::{InMemoryStore, PaymentMethod};

    async fn create_service() -> OrderService<InMemoryStore> {
        let store = InMemoryStore::new();
        store
            .upsert_item("SKU001", "Widget", Money::from_dollars(100))
            .await;
        store
            .upsert_item("SKU002", "Gadget", Money::from_dollars(100))
            .await;
        OrderService::new(store, BillingConfig::default())
    }

    #[tokio::test]
    async fn test_create_order() {
        let service = create_service().await;

        let order = service
            .create_order(
                CreateOrder::new("cust-1")
                    .item("SKU001", 2)
                    .item("SKU002", 1)
                    .payment(PaymentMethod::Cod, Money::from_dollars(300)),
            )
            .await
            .unwrap();

        assert_eq!(order.total_amount, Money::from_dollars(300));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.payments.len(), 1);
        assert_eq!(service.get_order(order.id).await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_payment_mismatch() {
        let service = create_service().await;

        let err = service
            .create_order(
                CreateOrder::new("cust-1")
                    .item("SKU001", 2)
                    .item("SKU002", 1)
                    .payment(PaymentMethod::Cod, Money::from_dollars(250)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        let message = err.to_string();
        assert!(message.contains("250"));
        assert!(message.contains("300"));
        assert_eq!(service.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn test_off_by_one_cent_is_rejected() {
        let service = create_service().await;

        let err = service
            .create_order(
                CreateOrder::new("cust-1")
                    .item("SKU001", 1)
                    .payment(PaymentMethod::Cod, Money::from_cents(9_999)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::PaymentMismatch { .. }));
    }

    #[tokio::test]
    async fn test_zero_item_order() {
        let service = create_service().await;

        let order = service
            .create_order(CreateOrder::new("cust-1"))
            .await
            .unwrap();

        assert!(order.total_amount.is_zero());
        assert!(order.items.is_empty());
    }

    #[tokio::test]
    async fn test_split_payments() {
        let service = create_service().await;

        let order = service
            .create_order(
                CreateOrder::new("cust-1")
                    .item("SKU001", 1)
                    .payment(PaymentMethod::Cod, Money::from_dollars(40))
                    .payment(PaymentMethod::VnPay, Money::from_dollars(60)),
            )
            .await
            .unwrap();

        assert_eq!(order.payments.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_sku_persists_nothing() {
        let service = create_service().await;

        let err = service
            .create_order(
                CreateOrder::new("cust-1")
                    .item("SKU001", 1)
                    .item("SKU404", 1)
                    .payment(PaymentMethod::Cod, Money::from_dollars(100)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::ItemNotFound(ItemRef::Sku(ref s)) if s == "SKU404"));
        assert_eq!(service.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn test_lookup_by_id_prices_like_sku() {
        let service = create_service().await;
        let item = service.store().item_by_sku("SKU001").await.unwrap().unwrap();

        let by_sku = service
            .create_order(
                CreateOrder::new("cust-1")
                    .item("SKU001", 3)
                    .payment(PaymentMethod::Cod, Money::from_dollars(300)),
            )
            .await
            .unwrap();
        let by_id = service
            .create_order(
                CreateOrder::new("cust-1")
                    .item_by_id(item.id, 3)
                    .payment(PaymentMethod::Cod, Money::from_dollars(300)),
            )
            .await
            .unwrap();

        assert_eq!(by_sku.total_amount, by_id.total_amount);
    }

    #[tokio::test]
    async fn test_price_override() {
        let service = create_service().await;
        let mut cmd =
            CreateOrder::new("cust-1").payment(PaymentMethod::Cod, Money::from_dollars(160));
        cmd.items.push(
            OrderLine::new(ItemRef::from("SKU001"), 2).with_unit_price(Money::from_dollars(80)),
        );

        let order = service.create_order(cmd).await.unwrap();
        assert_eq!(order.items[0].unit_price, Money::from_dollars(80));
        assert_eq!(order.total_amount, Money::from_dollars(160));
    }

    #[tokio::test]
    async fn test_price_override_disabled() {
        let service = create_service().await;
        let service = OrderService::new(
            service.store().clone(),
            BillingConfig {
                allow_price_override: false,
            },
        );
        let mut cmd = CreateOrder::new("cust-1");
        cmd.items.push(
            OrderLine::new(ItemRef::from("SKU001"), 1).with_unit_price(Money::from_dollars(1)),
        );

        let err = service.create_order(cmd).await.unwrap_err();
        assert!(matches!(err, BillingError::PriceOverrideNotAllowed { .. }));
    }

    #[tokio::test]
    async fn test_override_price_overflow_is_rejected() {
        let service = create_service().await;
        let mut cmd = CreateOrder::new("cust-1");
        cmd.items.push(
            OrderLine::new(ItemRef::from("SKU001"), 4).with_unit_price(Money::from_cents(1 << 62)),
        );

        let err = service.create_order(cmd).await.unwrap_err();
        assert!(matches!(
            err,
            BillingError::AmountOverflow {
                context: "order total"
            }
        ));
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
        assert_eq!(service.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn test_payment_sum_overflow_is_rejected() {
        let service = create_service().await;
        let half = Money::from_cents(i64::MAX / 2 + 1);

        let err = service
            .create_order(
                CreateOrder::new("cust-1")
                    .item("SKU001", 1)
                    .payment(PaymentMethod::Cod, half)
                    .payment(PaymentMethod::VnPay, half),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BillingError::AmountOverflow {
                context: "payment total"
            }
        ));
        assert_eq!(service.store().order_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_quantity() {
        let service = create_service().await;

        for quantity in [0, -1] {
            let err = service
                .create_order(CreateOrder::new("cust-1").item("SKU001", quantity))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidQuantity);
        }
    }

    #[tokio::test]
    async fn test_negative_payment() {
        let service = create_service().await;

        let err = service
            .create_order(
                CreateOrder::new("cust-1")
                    .payment(PaymentMethod::Cod, Money::from_dollars(-10))
                    .payment(PaymentMethod::Cod, Money::from_dollars(10)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BillingError::NegativePayment { .. }));
    }

    #[tokio::test]
    async fn test_customer_id_required() {
        let service = create_service().await;
        let err = service.create_order(CreateOrder::new("  ")).await.unwrap_err();
        assert!(matches!(err, BillingError::CustomerIdRequired));
    }

    #[tokio::test]
    async fn test_store_failure_is_persistence_error() {
        let service = create_service().await;
        service.store().set_fail_writes(true).await;

        let err = service
            .create_order(
                CreateOrder::new("cust-1")
                    .item("SKU001", 1)
                    .payment(PaymentMethod::Cod, Money::from_dollars(100)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }

    #[tokio::test]
    async fn test_get_missing_order() {
        let service = create_service().await;
        let err = service.get_order(OrderId::new(999)).await.unwrap_err();
        assert!(matches!(err, BillingError::OrderNotFound(_)));
    }
}
