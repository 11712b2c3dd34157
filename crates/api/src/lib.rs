//! HTTP API for the order fulfillment pipeline.
//!
//! Serves the Cart, Checkout, Order and Payment APIs over axum, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{delete, get, post};
use chrono::Utc;
use event_store::EventStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use state::{AppState, Collaborators, create_state};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check::<S>))
        .route(
            "/cart",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route(
            "/cart/items",
            post(routes::cart::add_item::<S>).put(routes::cart::update_item::<S>),
        )
        .route(
            "/cart/items/{product_id}",
            delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/select", post(routes::cart::select::<S>))
        .route("/cart/checkout", post(routes::checkout::checkout::<S>))
        .route("/checkouts/{id}", get(routes::checkout::get::<S>))
        .route(
            "/orders",
            post(routes::orders::create::<S>).get(routes::orders::list::<S>),
        )
        .route(
            "/orders/{id}",
            get(routes::orders::get::<S>).put(routes::orders::update::<S>),
        )
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route(
            "/payments",
            post(routes::payments::create::<S>).get(routes::payments::list::<S>),
        )
        .route("/payments/refund", post(routes::payments::refund::<S>))
        .route("/payments/order/{order_id}", get(routes::payments::by_order::<S>))
        .route("/payments/{id}", get(routes::payments::get::<S>))
        .route("/payments/{id}/process", post(routes::payments::process::<S>))
        .route("/payments/{id}/cancel", post(routes::payments::cancel::<S>))
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

/// Periodically purges expired reservations and compensates unpaid orders
/// until `shutdown` flips to true.
pub async fn run_sweeper<S: EventStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let now = Utc::now();
                state.checkout.purge_expired(now).await;
                if let Err(e) = state.checkout.sweep_unpaid(now).await {
                    tracing::warn!(error = %e, "unpaid sweep failed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    tracing::info!("sweeper stopped");
                    return;
                }
            }
        }
    }
}
