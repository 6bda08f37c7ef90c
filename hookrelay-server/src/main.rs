//! # hookrelay Binary
//!
//! Entry point for the hookrelay webhook dispatcher and plugin host. Parses
//! the CLI surface named in §6 (reference only, not part of the core), wires
//! up logging, the Config Agent's first load, the Client Bundle, the
//! dispatcher, and the HTTP server, and drives graceful shutdown.
//!
//! ## Usage
//!
//! ```bash
//! # Basic usage with default configuration
//! hookrelay --config hookrelay.toml
//!
//! # Custom host and port
//! hookrelay --host 0.0.0.0 --port 9000
//!
//! # Dry-run: log external forwards instead of sending them
//! hookrelay --dry-run
//! ```
//!
//! ## Environment Variables
//!
//! - `HOOKRELAY_HOST`: server host address
//! - `HOOKRELAY_PORT`: server port
//! - `HOOKRELAY_DRY_RUN`: `1`/`true`/`yes` to enable dry-run
//! - `RUST_LOG`: tracing filter, overrides `--log-level`

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;

use hookrelay_core::inflight::InFlightTracker;
use hookrelay_core::{PluginRegistry, RetryPolicy};

use hookrelay_server::agent::{Agent, ClientBundle};
use hookrelay_server::clients::{
    HttpClusterJobClient, HttpSourceControlClient, NoopChatClient, NoopGitClient, NoopIssueTrackerClient, NoopOwnersResolver,
};
use hookrelay_server::config::{load_hmac_secrets, spawn_reload_loop, ConfigAgent, ServerConfig};
use hookrelay_server::dispatch::{AllowAll, Dispatcher};
use hookrelay_server::forwarder::ExternalForwarder;
use hookrelay_server::panic_capture;
use hookrelay_server::server::{create_server, graceful_shutdown, AppState};
use hookrelay_server::signature::{SignatureValidator, TokenSet};

/// Command line arguments for the hookrelay server.
///
/// Covers the reference CLI surface named in §6: webhook path, listen port,
/// dry-run toggle, grace period, main config path, plugin config path, HMAC
/// secret file path, and optional credentials for the default downstream
/// client adapters.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the main process-settings file (TOML).
    #[arg(short, long, default_value = "hookrelay.toml")]
    config: String,

    /// Port number for the HTTP server. Overrides the value in `--config`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Host address to bind the server to. Overrides the value in `--config`.
    #[arg(long)]
    host: Option<String>,

    /// Logging level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log the would-be external forward instead of sending it.
    #[arg(long)]
    dry_run: bool,

    /// Base URL for the default REST-backed downstream clients
    /// (source control and cluster job submission).
    #[arg(long, default_value = "http://localhost:8080")]
    downstream_base_url: String,

    /// Bearer token for the default downstream clients.
    #[arg(long, default_value = "")]
    downstream_token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt().with_env_filter(&args.log_level).init();
    panic_capture::install();

    let mut server_config = ServerConfig::load(&args.config)?;
    if let Some(host) = args.host {
        server_config.host = host;
    }
    if let Some(port) = args.port {
        server_config.port = port;
    }
    if args.dry_run {
        server_config.dry_run = true;
    }

    let http = reqwest::Client::new();
    let client_bundle = ClientBundle {
        source_control: Arc::new(HttpSourceControlClient::new(http.clone(), &args.downstream_base_url, &args.downstream_token)),
        git: Arc::new(NoopGitClient),
        cluster: Arc::new(HttpClusterJobClient::new(http.clone(), &args.downstream_base_url, &args.downstream_token)),
        owners: Arc::new(NoopOwnersResolver),
        chat: Arc::new(NoopChatClient),
        issue_tracker: Arc::new(NoopIssueTrackerClient),
    };

    // The core ships no plugin business logic (§1 Non-goals); a production
    // deployment registers its own handlers here before boot.
    let registry: Arc<PluginRegistry<Agent>> = Arc::new(build_registry());

    let supplemental_dirs: Vec<PathBuf> = server_config.supplemental_config_dirs.iter().map(PathBuf::from).collect();
    let known_plugins: HashSet<String> = registry.all_names().into_iter().map(str::to_string).collect();

    let config_agent = Arc::new(ConfigAgent::new(
        server_config.plugin_config_path.clone(),
        supplemental_dirs,
        server_config.supplemental_config_suffix.clone(),
        server_config.strict_plugin_validation,
        known_plugins,
    ));

    // First load is fatal on failure (§7 kind 7, first case).
    config_agent.reload().await?;
    spawn_reload_loop(config_agent.clone(), server_config.reload_interval());

    let secrets = load_hmac_secrets(&server_config.hmac_secret_file)?;
    let signature_validator = Arc::new(SignatureValidator::new(TokenSet::new(secrets)));

    let inflight = InFlightTracker::new();
    let forwarder = Arc::new(ExternalForwarder::new(http, RetryPolicy::external_default(), server_config.dry_run));

    let dispatcher = Arc::new(Dispatcher {
        registry: registry.clone(),
        client_bundle,
        inflight: inflight.clone(),
        forwarder,
        repo_enablement: Arc::new(AllowAll),
    });

    let state = AppState {
        config_agent,
        dispatcher,
        signature_validator,
        registry,
    };

    let app = create_server(state, &server_config.webhook_path);

    let addr = SocketAddr::new(server_config.host.parse()?, server_config.port);
    tracing::info!("starting hookrelay server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let grace_period = server_config.grace_period();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            graceful_shutdown(inflight, grace_period).await;
        })
        .await?;

    Ok(())
}

/// The core ships no plugin business logic (§1); this bootstraps an empty
/// registry that a production deployment populates via `register()` calls
/// before the server starts accepting traffic.
fn build_registry() -> PluginRegistry<Agent> {
    PluginRegistry::new()
}

/// Waits for either Ctrl+C or, on Unix, SIGTERM (§4.6 "the shutdown
/// sequence begins on SIGTERM or SIGINT").
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
