//! # hookrelay-core
//!
//! The provider-agnostic domain model for the hookrelay webhook dispatcher
//! and plugin host: the validated event envelope and its concrete event
//! variants, generic-comment normalization, the plugin registry, the
//! plugin-configuration schema and its merge/validate pipeline, the
//! in-flight dispatch tracker, and the external-forwarder retry policy.
//!
//! This crate has no HTTP framework dependency: ingest (HMAC verification,
//! axum wiring), the external forwarder's HTTP client, and the config
//! agent's file I/O live in `hookrelay-server`, which depends on this crate
//! the way `ultrafast-gateway` depends on `ultrafast-models-sdk`.

pub mod config;
pub mod envelope;
pub mod error;
pub mod event;
pub mod generic_comment;
pub mod inflight;
pub mod registry;
pub mod retry;

pub use config::{ExternalPlugin, OrgRepoPlugins, PluginConfig};
pub use envelope::{EventEnvelope, EventType};
pub use event::{decode, DispatchEvent, EventKind, Repo};
pub use generic_comment::{
    derive as derive_generic_comment, normalize as normalize_action, Derivation, GenericCommentEvent,
    NormalizedAction,
};
pub use inflight::{InFlightGuard, InFlightTracker, ShutdownInProgress};
pub use registry::{HandlerError, HandlerFn, HandlerFuture, HelpProviderFn, PluginHelp, PluginRegistry};
pub use retry::RetryPolicy;
