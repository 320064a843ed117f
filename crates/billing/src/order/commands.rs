//! Order commands.

use common::{ItemId, Money};
use store::PaymentMethod;

use crate::catalog::ItemRef;

/// Command to create a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The customer placing the order.
    pub customer_id: String,

    /// Item lines in request order.
    pub items: Vec<OrderLine>,

    /// Payment lines in request order.
    pub payments: Vec<PaymentLine>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command with no lines.
    pub fn new(customer_id: impl Into<String>) -> Self {
        Self {
            customer_id: customer_id.into(),
            items: Vec::new(),
            payments: Vec::new(),
        }
    }

    /// Adds an item line referenced by SKU.
    pub fn item(mut self, sku: &str, quantity: i64) -> Self {
        self.items.push(OrderLine::new(ItemRef::from(sku), quantity));
        self
    }

    /// Adds an item line referenced by catalog id.
    pub fn item_by_id(mut self, id: ItemId, quantity: i64) -> Self {
        self.items.push(OrderLine::new(ItemRef::Id(id), quantity));
        self
    }

    /// Adds a payment line.
    pub fn payment(mut self, method: PaymentMethod, amount: Money) -> Self {
        self.payments.push(PaymentLine { method, amount });
        self
    }
}

/// A requested order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub item: ItemRef,

    /// Requested quantity; must be greater than 0.
    pub quantity: i64,

    /// Caller-supplied unit price. Used instead of the catalog price when
    /// positive.
    pub unit_price: Option<Money>,
}

impl OrderLine {
    pub fn new(item: ItemRef, quantity: i64) -> Self {
        Self {
            item,
            quantity,
            unit_price: None,
        }
    }

    /// Sets a unit price that overrides the catalog price.
    pub fn with_unit_price(mut self, price: Money) -> Self {
        self.unit_price = Some(price);
        self
    }
}

/// A requested payment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLine {
    pub method: PaymentMethod,
    pub amount: Money,
}
