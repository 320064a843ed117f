//! Billing error types.

use common::{Money, OrderId};
use serde::Serialize;
use store::StoreError;
use thiserror::Error;

use crate::catalog::ItemRef;

/// Coarse classification of a [`BillingError`], used by transports to pick
/// a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ItemNotFound,
    OrderNotFound,
    InvalidQuantity,
    InvalidAmount,
    QuantityExceeded,
    InvalidRequest,
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ItemNotFound => "item_not_found",
            ErrorKind::OrderNotFound => "order_not_found",
            ErrorKind::InvalidQuantity => "invalid_quantity",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::QuantityExceeded => "quantity_exceeded",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Persistence => "persistence",
        }
    }
}

/// Errors that can occur during billing operations.
#[derive(Debug, Error)]
pub enum BillingError {
    /// Customer ID is required.
    #[error("Customer ID is required")]
    CustomerIdRequired,

    /// The catalog has no item for the reference.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemRef),

    /// The referenced order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// A request line carries a non-positive quantity.
    #[error("Invalid quantity for item {item}: {quantity} (must be greater than 0)")]
    InvalidQuantity { item: String, quantity: i64 },

    /// A payment line carries a negative amount.
    #[error("Invalid payment amount {amount} (must not be negative)")]
    NegativePayment { amount: Money },

    /// Payments do not add up to the order total.
    #[error("Invalid amount: payment total {paid} does not match order total {total}")]
    PaymentMismatch { paid: Money, total: Money },

    /// An amount does not fit in the money representation.
    #[error("Invalid amount: {context} is too large")]
    AmountOverflow { context: &'static str },

    /// An order line supplied its own price while overrides are disabled.
    #[error("Price override is not allowed for item {item}")]
    PriceOverrideNotAllowed { item: ItemRef },

    /// An invoice request has no lines.
    #[error("Invoice must contain at least one item")]
    NoItems,

    /// The item exists in the catalog but was never ordered.
    #[error("Item {sku} not found in original order")]
    ItemNotInOrder { sku: String },

    /// A single line asks for more than is left to bill.
    #[error(
        "Requested quantity {requested} for item {sku} exceeds available quantity {remaining} (consumed: {consumed}, ordered: {ordered})"
    )]
    QuantityExceeded {
        sku: String,
        requested: u64,
        remaining: u64,
        consumed: u64,
        ordered: u64,
    },

    /// Several lines for the same item jointly ask for more than is left.
    #[error(
        "Duplicate items in request exceed original order quantity for {sku}: requested {requested}, available {remaining} (ordered: {ordered})"
    )]
    DuplicateLinesExceeded {
        sku: String,
        requested: u64,
        remaining: u64,
        ordered: u64,
    },

    /// The underlying store failed.
    #[error("{context}: {source}")]
    Persistence {
        context: &'static str,
        #[source]
        source: StoreError,
    },
}

impl BillingError {
    pub(crate) fn persistence(context: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| BillingError::Persistence { context, source }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            BillingError::ItemNotFound(_) => ErrorKind::ItemNotFound,
            BillingError::OrderNotFound(_) => ErrorKind::OrderNotFound,
            BillingError::InvalidQuantity { .. } => ErrorKind::InvalidQuantity,
            BillingError::NegativePayment { .. }
            | BillingError::PaymentMismatch { .. }
            | BillingError::AmountOverflow { .. } => ErrorKind::InvalidAmount,
            BillingError::QuantityExceeded { .. } | BillingError::DuplicateLinesExceeded { .. } => {
                ErrorKind::QuantityExceeded
            }
            BillingError::CustomerIdRequired
            | BillingError::PriceOverrideNotAllowed { .. }
            | BillingError::NoItems
            | BillingError::ItemNotInOrder { .. } => ErrorKind::InvalidRequest,
            BillingError::Persistence { .. } => ErrorKind::Persistence,
        }
    }

    /// Returns the storage error when the failure came from the store.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            BillingError::Persistence { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_mismatch_reports_both_amounts() {
        let err = BillingError::PaymentMismatch {
            paid: Money::from_dollars(250),
            total: Money::from_dollars(300),
        };
        let message = err.to_string();
        assert!(message.contains("250"));
        assert!(message.contains("300"));
        assert_eq!(err.kind(), ErrorKind::InvalidAmount);
    }

    #[test]
    fn persistence_keeps_source() {
        let err = BillingError::persistence("failed to create order")(StoreError::Unavailable(
            "down".to_string(),
        ));
        assert_eq!(err.kind(), ErrorKind::Persistence);
        assert!(err.to_string().starts_with("failed to create order"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(matches!(err.store_error(), Some(StoreError::Unavailable(_))));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::QuantityExceeded).unwrap();
        assert_eq!(json, "\"quantity_exceeded\"");
        assert_eq!(ErrorKind::QuantityExceeded.as_str(), "quantity_exceeded");
    }
}
