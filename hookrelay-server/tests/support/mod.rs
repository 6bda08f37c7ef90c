//! Shared test harness for the `tests/` integration suite, grounded on the
//! teacher's `src/tests/mod.rs` `helpers` module (`create_test_config` /
//! `create_test_server`).

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum_test::TestServer;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use hookrelay_core::inflight::InFlightTracker;
use hookrelay_core::registry::HandlerError;
use hookrelay_core::{EventKind, PluginRegistry, RetryPolicy};

use hookrelay_server::agent::{
    Agent, ChatClient, ClientBundle, ClientError, ClusterJobClient, Comment, GitClient, IssueTrackerClient, OwnersResolver,
    SourceControlClient,
};
use hookrelay_server::config::ConfigAgent;
use hookrelay_server::dispatch::{AllowAll, Dispatcher};
use hookrelay_server::forwarder::ExternalForwarder;
use hookrelay_server::server::{create_server, AppState};
use hookrelay_server::signature::{SignatureValidator, TokenSet};

pub const WEBHOOK_PATH: &str = "/hook";
pub const HMAC_SECRET: &str = "test-secret";

struct NoopScm;
#[async_trait]
impl SourceControlClient for NoopScm {
    async fn create_comment(&self, _org: &str, _repo: &str, _number: u64, _body: &str) -> Result<(), ClientError> {
        Ok(())
    }
    async fn delete_comment(&self, _org: &str, _repo: &str, _comment_id: u64) -> Result<(), ClientError> {
        Ok(())
    }
    async fn list_comments(&self, _org: &str, _repo: &str, _number: u64) -> Result<Vec<Comment>, ClientError> {
        Ok(vec![])
    }
    async fn add_label(&self, _org: &str, _repo: &str, _number: u64, _label: &str) -> Result<(), ClientError> {
        Ok(())
    }
    async fn remove_label(&self, _org: &str, _repo: &str, _number: u64, _label: &str) -> Result<(), ClientError> {
        Ok(())
    }
    async fn merge(&self, _org: &str, _repo: &str, _number: u64) -> Result<(), ClientError> {
        Ok(())
    }
}
struct NoopGit;
#[async_trait]
impl GitClient for NoopGit {
    async fn ensure_clone(&self, _org: &str, _repo: &str) -> Result<(), ClientError> {
        Ok(())
    }
}
struct NoopCluster;
#[async_trait]
impl ClusterJobClient for NoopCluster {
    async fn create_job(&self, _org: &str, _repo: &str, _job_name: &str, _sha: &str) -> Result<(), ClientError> {
        Ok(())
    }
}
struct NoopOwners;
#[async_trait]
impl OwnersResolver for NoopOwners {
    async fn owners_for(&self, _org: &str, _repo: &str, _path: &str) -> Result<Vec<String>, ClientError> {
        Ok(vec![])
    }
}
struct NoopChat;
#[async_trait]
impl ChatClient for NoopChat {
    async fn post_message(&self, _channel: &str, _text: &str) -> Result<(), ClientError> {
        Ok(())
    }
}
struct NoopIssues;
#[async_trait]
impl IssueTrackerClient for NoopIssues {
    async fn file_issue(&self, _title: &str, _body: &str) -> Result<u64, ClientError> {
        Ok(1)
    }
}

pub fn noop_client_bundle() -> ClientBundle {
    ClientBundle {
        source_control: Arc::new(NoopScm),
        git: Arc::new(NoopGit),
        cluster: Arc::new(NoopCluster),
        owners: Arc::new(NoopOwners),
        chat: Arc::new(NoopChat),
        issue_tracker: Arc::new(NoopIssues),
    }
}

fn unique_temp_dir(label: &str) -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut dir = std::env::temp_dir();
    dir.push(format!("hookrelay-it-{label}-{}-{n}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write `plugins.yaml` with the given body and build a [`ConfigAgent`]
/// against it, already reloaded once.
pub async fn config_agent(plugins_yaml: &str, known_plugins: &[&str]) -> Arc<ConfigAgent> {
    let dir = unique_temp_dir("config");
    let main_path = dir.join("plugins.yaml");
    std::fs::write(&main_path, plugins_yaml).unwrap();

    let known: HashSet<String> = known_plugins.iter().map(|s| s.to_string()).collect();
    let agent = Arc::new(ConfigAgent::new(main_path, vec![], "_plugins.yaml", true, known));
    agent.reload().await.expect("test plugin config should load");
    agent
}

/// Build a full [`TestServer`] wired against `registry` and `plugins_yaml`,
/// signing with [`HMAC_SECRET`].
pub async fn test_server(registry: PluginRegistry<Agent>, plugins_yaml: &str, known_plugins: &[&str]) -> TestServer {
    let config_agent = config_agent(plugins_yaml, known_plugins).await;

    let mut secrets = HashSet::new();
    secrets.insert(HMAC_SECRET.to_string());
    let signature_validator = Arc::new(SignatureValidator::new(TokenSet::new(secrets)));

    let registry = Arc::new(registry);
    let forwarder = Arc::new(ExternalForwarder::new(reqwest::Client::new(), RetryPolicy::external_default(), false));
    let dispatcher = Arc::new(Dispatcher {
        registry: registry.clone(),
        client_bundle: noop_client_bundle(),
        inflight: InFlightTracker::new(),
        forwarder,
        repo_enablement: Arc::new(AllowAll),
    });

    let state = AppState {
        config_agent,
        dispatcher,
        signature_validator,
        registry,
    };

    TestServer::new(create_server(state, WEBHOOK_PATH)).unwrap()
}

/// Register a counting no-op handler under `name` for `kind`, returning the
/// shared call counter.
pub fn register_counting_handler(registry: &mut PluginRegistry<Agent>, kind: EventKind, name: &str) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = calls.clone();
    registry.register(
        kind,
        name,
        Arc::new(move |_agent, _event| {
            let calls = calls_clone.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<(), HandlerError>(())
            })
        }),
        None,
    );
    calls
}

/// Register a handler under `name` for `kind` that always panics.
pub fn register_panicking_handler(registry: &mut PluginRegistry<Agent>, kind: EventKind, name: &str) {
    registry.register(
        kind,
        name,
        Arc::new(|_agent, _event| Box::pin(async { panic!("handler exploded in test") })),
        None,
    );
}

/// `X-Hub-Signature-256` header value for `body` under [`HMAC_SECRET`].
pub fn sign(body: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(HMAC_SECRET.as_bytes()).unwrap();
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
