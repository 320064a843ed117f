pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod repository;

pub use common::{InvoiceId, ItemId, Money, OrderId, ShipmentId};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use model::{
    Invoice, InvoiceItem, Item, NewInvoice, NewInvoiceItem, NewOrder, NewOrderItem, NewPayment,
    NewShipment, Order, OrderItem, OrderStatus, Payment, PaymentMethod, Shipment, ShipmentItem,
    ShipmentStatus,
};
pub use postgres::PostgresStore;
pub use repository::{InvoiceRepository, ItemRepository, OrderRepository, ShipmentRepository};
