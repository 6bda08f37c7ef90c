//! The inbound HTTP surface (§6): liveness, readiness, the webhook sink,
//! plugin self-description, and Prometheus exposition.

use std::collections::HashMap;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;

use crate::error::IngestError;
use crate::metrics;
use crate::server::AppState;
use crate::signature::SignatureHeaders;

/// `GET /` — liveness, always 200 (§6).
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// `GET /readyz` — ready only after configuration has loaded successfully
/// at least once (§4.6, §6).
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.config_agent.is_ready() {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready")
    }
}

fn collect_headers(headers: &HeaderMap) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            out.entry(name.as_str().to_string()).or_default().push(value.to_string());
        }
    }
    out
}

/// `POST <webhook-path>` — the webhook sink (§6). Validates the HMAC
/// signature, decodes the payload, and schedules dispatch tasks, returning
/// before any handler completes (§5).
pub async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: axum::body::Bytes) -> impl IntoResponse {
    let signature_headers = SignatureHeaders {
        signature_256: headers.get("X-Hub-Signature-256").and_then(|v| v.to_str().ok()),
        signature_1: headers.get("X-Hub-Signature").and_then(|v| v.to_str().ok()),
        event_type: headers.get("X-GitHub-Event").and_then(|v| v.to_str().ok()),
        delivery_id: headers.get("X-GitHub-Delivery").and_then(|v| v.to_str().ok()),
    };

    let raw_headers = collect_headers(&headers);
    let envelope = match state.signature_validator.validate(signature_headers, body.to_vec(), raw_headers) {
        Ok(envelope) => envelope,
        Err(err) => {
            metrics::record_ingest_status(err.status_code().as_u16());
            return err.into_response();
        }
    };

    let Some(plugin_config) = state.config_agent.snapshot().await else {
        metrics::record_ingest_status(StatusCode::SERVICE_UNAVAILABLE.as_u16());
        return (StatusCode::SERVICE_UNAVAILABLE, "plugin configuration not yet loaded").into_response();
    };

    if let Err(decode_err) = state.dispatcher.dispatch(envelope, plugin_config).await {
        let err = IngestError::Decode(decode_err);
        metrics::record_ingest_status(err.status_code().as_u16());
        return err.into_response();
    }

    metrics::record_ingest_status(StatusCode::OK.as_u16());
    (StatusCode::OK, "Event received. Have a nice day.").into_response()
}

#[derive(Serialize)]
struct PluginHelpEntry {
    name: String,
    description: String,
    commands: Vec<String>,
    events: Vec<&'static str>,
    enabled_for: Vec<String>,
}

#[derive(Serialize)]
struct PluginHelpResponse {
    plugins: Vec<PluginHelpEntry>,
}

/// `GET /plugin-help` — enumerates registered plugins, their commands, and
/// the enabled-repo set, aggregated from each plugin's `HelpProvider` (§2,
/// §4.2 `eventsFor`, §6, §11).
pub async fn plugin_help(State(state): State<AppState>) -> impl IntoResponse {
    let plugin_config = state.config_agent.snapshot().await;
    let mut names: Vec<&str> = state.registry.all_names().into_iter().collect();
    names.sort();

    let plugins = names
        .into_iter()
        .map(|name| {
            let help = state.registry.help_for(name).unwrap_or_default();
            let events = state.registry.events_for(name).into_iter().map(|k| k.label()).collect();
            let enabled_for = plugin_config
                .as_ref()
                .map(|cfg| {
                    cfg.plugins
                        .iter()
                        .filter(|(_, entry)| entry.plugins.iter().any(|p| p == name))
                        .map(|(scope, _)| scope.clone())
                        .collect()
                })
                .unwrap_or_default();
            PluginHelpEntry {
                name: name.to_string(),
                description: help.description,
                commands: help.commands,
                events,
                enabled_for,
            }
        })
        .collect();

    Json(PluginHelpResponse { plugins })
}

/// `GET /metrics` — Prometheus text-format exposition (§6, §10.6).
pub async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    metrics::set_inflight(state.dispatcher.inflight.count());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        metrics::render_prometheus(),
    )
}
