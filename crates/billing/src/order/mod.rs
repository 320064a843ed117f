//! Order creation.

mod commands;
mod service;

pub use commands::{CreateOrder, OrderLine, PaymentLine};
pub use service::OrderService;
