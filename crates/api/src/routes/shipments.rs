//! Shipment endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ShipmentId};
use serde::Deserialize;
use shipment::ShipmentLine;
use store::Shipment;

use super::parse_id;
use crate::error::ApiError;
use crate::{AppState, Store};

#[derive(Debug, Deserialize)]
pub struct CreateShipmentRequest {
    pub order_id: OrderId,
    #[serde(default)]
    pub items: Vec<ShipmentLine>,
}

/// POST /api/v1/shipments: record a shipment and bill it.
#[tracing::instrument(skip(state, req), fields(order_id = %req.order_id))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateShipmentRequest>,
) -> Result<(StatusCode, Json<Shipment>), ApiError> {
    let shipment = state
        .shipments
        .create_shipment(req.order_id, req.items)
        .await?;
    Ok((StatusCode::CREATED, Json(shipment)))
}

/// GET /api/v1/shipments/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Shipment>, ApiError> {
    let shipment_id: ShipmentId = parse_id(&id)?;
    let shipment = state.shipments.get_shipment(shipment_id).await?;
    Ok(Json(shipment))
}
