//! Billing workflows.
//!
//! This crate provides:
//! - Catalog lookup by SKU or item id
//! - Order creation with payment/total validation
//! - Invoice creation reconciled against the order and every prior invoice
//! - Per-order serialization of invoice creation

pub mod catalog;
pub mod config;
pub mod error;
pub mod invoice;
pub mod lock;
pub mod order;

pub use catalog::{Catalog, ItemRef};
pub use config::BillingConfig;
pub use error::{BillingError, ErrorKind};
pub use invoice::{CreateInvoice, InvoiceLine, InvoiceService, QuantityLedger};
pub use lock::OrderLocks;
pub use order::{CreateOrder, OrderLine, OrderService, PaymentLine};

/// Converts a requested quantity into a stored one, rejecting anything that
/// is not a positive integer.
pub(crate) fn checked_quantity(item: &str, quantity: i64) -> Result<u32, BillingError> {
    match u32::try_from(quantity) {
        Ok(q) if q > 0 => Ok(q),
        _ => Err(BillingError::InvalidQuantity {
            item: item.to_string(),
            quantity,
        }),
    }
}
