//! Error types owned by `hookrelay-core`: configuration merge/validation
//! failures (§4.7) and the handler-invocation error re-exported from
//! [`crate::registry`].
//!
//! `hookrelay-core` never reaches for `anyhow`: every fallible path here
//! returns a `thiserror`-derived enum so callers (the config agent in
//! `hookrelay-server`, which owns file I/O and directory walking) can match
//! on failure kind. `anyhow` stays at the process boundary in `main.rs`,
//! matching the teacher's split between typed SDK errors and
//! `anyhow::Result` in the gateway binary.

use thiserror::Error;

pub use crate::registry::HandlerError;

/// Errors merging a supplemental plugin configuration into the main one
/// (§3 "Supplemental configuration", §4.7).
#[derive(Debug, Error)]
pub enum MergeError {
    /// A scalar per-plugin settings block differs between the two sides and
    /// neither side is unset.
    #[error("conflicting settings for plugin `{plugin}`: `{left}` vs `{right}`")]
    ScalarConflict {
        plugin: String,
        left: String,
        right: String,
    },
}

/// Errors validating a fully-merged plugin configuration (§4.7 validator
/// chain).
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("routing table references unknown plugin `{0}`")]
    UnknownPlugin(String),

    #[error("external plugin `{name}` has a malformed endpoint `{endpoint}`: {reason}")]
    MalformedEndpoint {
        name: String,
        endpoint: String,
        reason: String,
    },

    #[error("config-updater rule references unresolved target `{0}`")]
    UnresolvedCrossReference(String),
}
