use thiserror::Error;

use crate::{ItemId, OrderId, ShipmentId};

/// Errors that can occur when interacting with a repository.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An invoice already exists for the shipment.
    #[error("Shipment {0} has already been invoiced")]
    ShipmentAlreadyInvoiced(ShipmentId),

    /// Writing the invoice would bill more of an item than was ordered.
    #[error(
        "Invoiced quantity for item {item_id} on order {order_id} would reach {invoiced}, ordered {ordered}"
    )]
    QuantityConflict {
        order_id: OrderId,
        item_id: ItemId,
        invoiced: u64,
        ordered: u64,
    },

    /// The order referenced by a write does not exist.
    #[error("Order {0} does not exist")]
    UnknownOrder(OrderId),

    /// The shipment referenced by an update does not exist.
    #[error("Shipment {0} does not exist")]
    UnknownShipment(ShipmentId),

    /// The backend refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be mapped back to a record.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl StoreError {
    /// Returns true if the error reports a conflict with existing data rather
    /// than a backend failure.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::ShipmentAlreadyInvoiced(_) | StoreError::QuantityConflict { .. }
        )
    }
}

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StoreError>;
