//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use billing::{BillingError, ErrorKind};
use shipment::ShipmentError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Billing workflow error.
    Billing(BillingError),
    /// Shipment workflow error.
    Shipment(ShipmentError),
}

impl ApiError {
    /// Status code and machine-readable kind for this error.
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            ApiError::Billing(err) => billing_status(err),
            ApiError::Shipment(err) => shipment_status(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Billing(err) => err.to_string(),
            ApiError::Shipment(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %message, kind, "request failed");
        }

        let body = serde_json::json!({ "error": message, "kind": kind });
        (status, axum::Json(body)).into_response()
    }
}

fn billing_status(err: &BillingError) -> (StatusCode, &'static str) {
    let kind = err.kind();
    let status = match kind {
        ErrorKind::ItemNotFound | ErrorKind::OrderNotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidQuantity | ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidAmount => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::QuantityExceeded => StatusCode::CONFLICT,
        ErrorKind::Persistence => {
            if err.store_error().is_some_and(|e| e.is_conflict()) {
                return (StatusCode::CONFLICT, "conflict");
            }
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, kind.as_str())
}

fn shipment_status(err: &ShipmentError) -> (StatusCode, &'static str) {
    match err {
        ShipmentError::NoItems | ShipmentError::SkuRequired => {
            (StatusCode::BAD_REQUEST, "invalid_request")
        }
        ShipmentError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, "invalid_quantity"),
        ShipmentError::NotFound(_) => (StatusCode::NOT_FOUND, "shipment_not_found"),
        ShipmentError::BillingUnavailable { .. } => (StatusCode::BAD_GATEWAY, "billing_unavailable"),
        ShipmentError::InvoiceRejected { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "invoice_rejected")
        }
        ShipmentError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "persistence"),
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        ApiError::Billing(err)
    }
}

impl From<ShipmentError> for ApiError {
    fn from(err: ShipmentError) -> Self {
        ApiError::Shipment(err)
    }
}
