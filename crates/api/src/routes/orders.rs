//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use billing::{CreateOrder, ItemRef, OrderLine, PaymentLine};
use common::{ItemId, Money, OrderId};
use serde::Deserialize;
use store::{Order, PaymentMethod};

use super::parse_id;
use crate::error::ApiError;
use crate::{AppState, Store};

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub payments: Vec<PaymentRequest>,
}

/// An order line referencing the catalog by `sku` or `item_id`.
#[derive(Debug, Deserialize)]
pub struct OrderItemRequest {
    pub sku: Option<String>,
    pub item_id: Option<ItemId>,
    pub quantity: i64,
    /// Unit price in cents, replacing the catalog price when positive.
    pub unit_price: Option<Money>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    pub method: PaymentMethod,
    /// Amount in cents.
    pub amount: Money,
}

impl TryFrom<CreateOrderRequest> for CreateOrder {
    type Error = ApiError;

    fn try_from(req: CreateOrderRequest) -> Result<Self, Self::Error> {
        let mut cmd = CreateOrder::new(req.customer_id);

        for (index, line) in req.items.into_iter().enumerate() {
            let item = match (line.sku, line.item_id) {
                (Some(sku), _) if !sku.trim().is_empty() => ItemRef::Sku(sku),
                (_, Some(id)) => ItemRef::Id(id),
                _ => {
                    return Err(ApiError::BadRequest(format!(
                        "items[{index}]: sku or item_id is required"
                    )));
                }
            };
            let mut order_line = OrderLine::new(item, line.quantity);
            if let Some(price) = line.unit_price {
                order_line = order_line.with_unit_price(price);
            }
            cmd.items.push(order_line);
        }

        cmd.payments = req
            .payments
            .into_iter()
            .map(|p| PaymentLine {
                method: p.method,
                amount: p.amount,
            })
            .collect();

        Ok(cmd)
    }
}

// -- Handlers --

/// POST /api/v1/orders: price the lines and create the order when payments
/// match the total.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let cmd = CreateOrder::try_from(req)?;
    let order = state.orders.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/v1/orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id: OrderId = parse_id(&id)?;
    let order = state.orders.get_order(order_id).await?;
    Ok(Json(order))
}
