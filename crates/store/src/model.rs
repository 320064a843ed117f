//! Records persisted by the repositories.
//!
//! `New*` types are write-side inputs without identity; the repository
//! returns the persisted record with its assigned id and timestamps.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{InvoiceId, ItemId, Money, OrderId, ShipmentId, StoreError};

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub sku: String,
    pub name: String,
    /// Current catalog price per unit.
    pub price: Money,
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Success,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Success => "SUCCESS",
            OrderStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OrderStatus::Pending),
            "SUCCESS" => Ok(OrderStatus::Success),
            "FAILED" => Ok(OrderStatus::Failed),
            other => Err(StoreError::Corrupt(format!("unknown order status '{other}'"))),
        }
    }
}

/// How a payment line was (or will be) settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PaymentMethod {
    #[serde(rename = "COD")]
    Cod,
    #[serde(rename = "VN_PAY")]
    VnPay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::VnPay => "VN_PAY",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COD" => Ok(PaymentMethod::Cod),
            "VN_PAY" => Ok(PaymentMethod::VnPay),
            other => Err(StoreError::Corrupt(format!("unknown payment method '{other}'"))),
        }
    }
}

/// A customer's order with its lines and payments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: String,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    /// The catalog item this line refers to.
    pub item: Item,
    pub quantity: u32,
    /// Price per unit charged on this line, frozen at order time.
    pub unit_price: Money,
}

impl OrderItem {
    /// Returns quantity * unit_price.
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A payment line within an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub customer_id: String,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub items: Vec<NewOrderItem>,
    pub payments: Vec<NewPayment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub item: Item,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPayment {
    pub method: PaymentMethod,
    pub amount: Money,
}

/// A billing document for the items of one shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub order_id: OrderId,
    pub shipment_id: ShipmentId,
    pub total_amount: Money,
    pub items: Vec<InvoiceItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Total quantity billed for an item on this invoice.
    pub fn quantity_of(&self, item_id: ItemId) -> u64 {
        self.items
            .iter()
            .filter(|line| line.item_id == item_id)
            .map(|line| u64::from(line.quantity))
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: i64,
    pub invoice_id: InvoiceId,
    pub item_id: ItemId,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoice {
    pub order_id: OrderId,
    pub shipment_id: ShipmentId,
    pub total_amount: Money,
    pub items: Vec<NewInvoiceItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInvoiceItem {
    pub item_id: ItemId,
    pub quantity: u32,
    pub unit_price: Money,
}

/// Status of a shipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    #[default]
    Confirmed,
    /// Billing refused or could not be reached for this shipment.
    Failed,
}

impl ShipmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShipmentStatus::Confirmed => "CONFIRMED",
            ShipmentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShipmentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(ShipmentStatus::Confirmed),
            "FAILED" => Ok(ShipmentStatus::Failed),
            other => Err(StoreError::Corrupt(format!("unknown shipment status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shipment {
    pub id: ShipmentId,
    pub order_id: OrderId,
    pub status: ShipmentStatus,
    pub items: Vec<ShipmentItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentItem {
    pub sku: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewShipment {
    pub order_id: OrderId,
    pub status: ShipmentStatus,
    pub items: Vec<ShipmentItem>,
}
