//! # hookrelay-server
//!
//! The HTTP server half of the hookrelay webhook dispatcher and plugin
//! host: signature-validating ingest, the demultiplexer/handler-runner glue
//! (built on [`hookrelay_core`]'s domain types), the external forwarder, the
//! Config Agent's file-loading and hot-reload loop, metrics exposition, and
//! `main.rs`'s CLI entry point — the way `ultrafast-gateway` hosts
//! `ultrafast-models-sdk`.

pub mod agent;
pub mod clients;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod forwarder;
pub mod handlers;
pub mod metrics;
pub mod panic_capture;
pub mod server;
pub mod signature;
