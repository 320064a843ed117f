//! Shipment error types.

use common::ShipmentId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during shipment operations.
#[derive(Debug, Error)]
pub enum ShipmentError {
    /// A shipment needs at least one line.
    #[error("At least one item is required")]
    NoItems,

    /// A line has an empty SKU.
    #[error("SKU is required for all items")]
    SkuRequired,

    /// A line carries a non-positive quantity.
    #[error("Quantity must be greater than 0 for SKU {sku}")]
    InvalidQuantity { sku: String, quantity: i64 },

    /// The shipment does not exist.
    #[error("Shipment not found: {0}")]
    NotFound(ShipmentId),

    /// The billing service could not be reached. The shipment was marked failed.
    #[error("Billing service unavailable for shipment {shipment_id}: {reason}")]
    BillingUnavailable {
        shipment_id: ShipmentId,
        reason: String,
    },

    /// The billing service refused to invoice the shipment. The shipment was
    /// marked failed.
    #[error("Failed to create invoice for shipment {shipment_id}: {reason}")]
    InvoiceRejected {
        shipment_id: ShipmentId,
        reason: String,
    },

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ShipmentError {
    /// Returns true for errors caused by the request itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ShipmentError::NoItems
                | ShipmentError::SkuRequired
                | ShipmentError::InvalidQuantity { .. }
        )
    }
}

/// Convenience type alias for shipment results.
pub type Result<T> = std::result::Result<T, ShipmentError>;
