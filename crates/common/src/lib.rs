//! Shared types for the billing system.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{InvoiceId, ItemId, OrderId, ShipmentId};
