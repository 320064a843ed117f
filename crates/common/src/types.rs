use serde::{Deserialize, Serialize};

/// Declares a repository-assigned numeric identifier.
///
/// Each identifier is a distinct type so an order id can never be passed
/// where an invoice id is expected.
macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Creates an identifier from its raw value.
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the raw value.
            pub const fn as_i64(&self) -> i64 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

numeric_id!(
    /// Identifier of a catalog item.
    ItemId
);

numeric_id!(
    /// Identifier of an order.
    OrderId
);

numeric_id!(
    /// Identifier of an invoice.
    InvoiceId
);

numeric_id!(
    /// Identifier of a shipment. At most one invoice exists per shipment.
    ShipmentId
);
