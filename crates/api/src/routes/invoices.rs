//! Invoice endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use billing::CreateInvoice;
use common::OrderId;
use store::Invoice;

use super::parse_id;
use crate::error::ApiError;
use crate::{AppState, Store};

/// POST /api/v1/invoices: bill a shipment against its order.
#[tracing::instrument(skip(state, cmd))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(cmd): Json<CreateInvoice>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let invoice = state.invoices.create_invoice(cmd).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// GET /api/v1/orders/{id}/invoices
#[tracing::instrument(skip(state))]
pub async fn list_for_order<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Invoice>>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let invoices = state.invoices.invoices_for_order(order_id).await?;
    Ok(Json(invoices))
}
