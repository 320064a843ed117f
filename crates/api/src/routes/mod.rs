//! HTTP route handlers.

pub mod invoices;
pub mod observability;
pub mod orders;
pub mod shipments;

use crate::error::ApiError;

/// Parses a numeric path identifier.
pub(crate) fn parse_id<T: From<i64>>(raw: &str) -> Result<T, ApiError> {
    raw.parse::<i64>()
        .map(T::from)
        .map_err(|e| ApiError::BadRequest(format!("Invalid id '{raw}': {e}")))
}
