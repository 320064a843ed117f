//! Shipment workflow.
//!
//! A shipment is recorded first and billed afterwards. The billing call goes
//! through a [`BillingClient`], either in-process or over HTTP, and its
//! outcome decides whether the shipment stays confirmed or is marked failed.

pub mod client;
pub mod error;
pub mod service;

pub use client::{BillingClient, HttpBillingClient, InvoiceOutcome, LocalBillingClient};
pub use error::ShipmentError;
pub use service::{ShipmentLine, ShipmentService};
