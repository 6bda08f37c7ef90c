//! HTTP server assembly (§6): route table, middleware stack, and the
//! `AppState` shared across every handler — grounded on the teacher's
//! `server.rs` `AppState`/`create_server` split.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use hookrelay_core::inflight::InFlightTracker;
use hookrelay_core::PluginRegistry;

use crate::agent::Agent;
use crate::config::ConfigAgent;
use crate::dispatch::Dispatcher;
use crate::handlers;
use crate::signature::SignatureValidator;

/// Application state shared across all HTTP handlers (§2).
#[derive(Clone)]
pub struct AppState {
    pub config_agent: Arc<ConfigAgent>,
    pub dispatcher: Arc<Dispatcher>,
    pub signature_validator: Arc<SignatureValidator>,
    pub registry: Arc<PluginRegistry<Agent>>,
}

/// Build the router: liveness, readiness, the webhook sink at
/// `webhook_path`, plugin self-description, and metrics exposition (§6).
pub fn create_server(state: AppState, webhook_path: &str) -> Router {
    Router::new()
        .route("/", get(handlers::liveness))
        .route("/readyz", get(handlers::readiness))
        .route(webhook_path, post(handlers::webhook))
        .route("/plugin-help", get(handlers::plugin_help))
        .route("/metrics", get(handlers::metrics_endpoint))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Drain in-flight dispatch tasks within the grace period (§4.6 step 2,
/// §8 "shutdown safety"). Called after the HTTP listener stops accepting
/// new connections.
pub async fn graceful_shutdown(inflight: InFlightTracker, grace_period: Duration) {
    inflight.stop_accepting();
    let drained = inflight.wait(grace_period).await;
    if drained {
        tracing::info!("graceful shutdown: all dispatch tasks drained");
    } else {
        tracing::warn!(
            remaining = inflight.count(),
            "graceful shutdown: grace period expired with dispatch tasks still in flight"
        );
    }
}
