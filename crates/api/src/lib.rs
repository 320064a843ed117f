//! HTTP API server with observability for the billing system.
//!
//! Provides REST endpoints for orders, invoices and shipments, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use billing::{BillingConfig, InvoiceService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use shipment::{BillingClient, HttpBillingClient, LocalBillingClient, ShipmentService};
use store::{InvoiceRepository, ItemRepository, OrderRepository, ShipmentRepository};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Storage backend the server can run on.
pub trait Store:
    OrderRepository + InvoiceRepository + ItemRepository + ShipmentRepository + Clone + 'static
{
}

impl<T> Store for T where
    T: OrderRepository + InvoiceRepository + ItemRepository + ShipmentRepository + Clone + 'static
{
}

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub orders: OrderService<S>,
    pub invoices: Arc<InvoiceService<S>>,
    pub shipments: ShipmentService<S>,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store>(state: Arc<AppState<S>>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::observability::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::observability::health))
        .route("/api/v1/orders", post(routes::orders::create::<S>))
        .route("/api/v1/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/api/v1/orders/{id}/invoices",
            get(routes::invoices::list_for_order::<S>),
        )
        .route("/api/v1/invoices", post(routes::invoices::create::<S>))
        .route("/api/v1/shipments", post(routes::shipments::create::<S>))
        .route("/api/v1/shipments/{id}", get(routes::shipments::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over one store.
///
/// Shipments are billed in-process unless a client for a remote billing API
/// is given.
pub fn create_state<S: Store>(
    store: S,
    config: BillingConfig,
    remote_billing: Option<HttpBillingClient>,
) -> Arc<AppState<S>> {
    let orders = OrderService::new(store.clone(), config);
    let invoices = Arc::new(InvoiceService::new(store.clone()));

    let billing: Arc<dyn BillingClient> = match remote_billing {
        Some(client) => Arc::new(client),
        None => Arc::new(LocalBillingClient::new(invoices.clone())),
    };
    let shipments = ShipmentService::new(store, billing);

    Arc::new(AppState {
        orders,
        invoices,
        shipments,
    })
}
