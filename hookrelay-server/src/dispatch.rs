//! The Event Demultiplexer (§4.3, component E) and the Handler Runner
//! (§4.4, component F): resolves a validated envelope into its concrete
//! variant, enforces per-repo enablement, fans out to in-process plugin
//! handlers and the synthetic generic-comment handler, and hands the raw
//! envelope to the external forwarder (§4.5).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use hookrelay_core::{
    decode, derive_generic_comment, inflight::InFlightTracker, DispatchEvent, Derivation, EventEnvelope, EventKind,
    EventType, HandlerFn, PluginConfig, PluginRegistry,
};

use crate::agent::{Agent, ClientBundle};
use crate::forwarder::ExternalForwarder;
use crate::metrics::{self, HandlerLabels};
use crate::panic_capture;

/// The per-repo enablement predicate injected into the demultiplexer (§4.3
/// step 3). Kept as a trait so the server crate can back it with whatever
/// source the deployment wants (a config field, an external service) without
/// the dispatcher depending on the concrete source.
pub trait RepoEnablement: Send + Sync {
    fn enabled(&self, org: &str, repo: &str) -> bool;
}

/// The always-allow default: every repo is enabled unless explicitly denied
/// elsewhere (e.g. absence from the routing table already yields an empty
/// plugin set).
pub struct AllowAll;

impl RepoEnablement for AllowAll {
    fn enabled(&self, _org: &str, _repo: &str) -> bool {
        true
    }
}

/// Denies repos (or whole orgs) named in a static set, `org` or `org/repo`
/// entries — the configured form of §4.3's injected predicate.
pub struct DenyListRepoEnablement {
    denied: HashSet<String>,
}

impl DenyListRepoEnablement {
    pub fn new(denied: HashSet<String>) -> Self {
        Self { denied }
    }
}

impl RepoEnablement for DenyListRepoEnablement {
    fn enabled(&self, org: &str, repo: &str) -> bool {
        !self.denied.contains(org) && !self.denied.contains(&format!("{org}/{repo}"))
    }
}

/// Everything the demultiplexer needs to turn a validated envelope into
/// scheduled dispatch tasks.
pub struct Dispatcher {
    pub registry: Arc<PluginRegistry<Agent>>,
    pub client_bundle: ClientBundle,
    pub inflight: InFlightTracker,
    pub forwarder: Arc<ExternalForwarder>,
    pub repo_enablement: Arc<dyn RepoEnablement>,
}

impl Dispatcher {
    /// §4.3's full algorithm. Decode errors are returned to the caller (the
    /// ingest handler maps them to 400, §7 kind 2); everything after
    /// decoding is fire-and-forget task scheduling — this function returns
    /// as soon as tasks are spawned, before any of them complete (§5).
    pub async fn dispatch(&self, envelope: EventEnvelope, plugin_config: Arc<PluginConfig>) -> Result<(), serde_json::Error> {
        metrics::record_event(envelope.event_type.as_str());

        let event = decode(&envelope.event_type, &envelope.id, &envelope.raw_payload)?;
        let (org, repo) = {
            let (o, r) = event.org_repo();
            (o.to_string(), r.to_string())
        };

        let repo_enabled = self.repo_enablement.enabled(&org, &repo);

        if repo_enabled {
            self.dispatch_in_process(&envelope.event_type, &envelope.id, &event, &org, &repo, &plugin_config);
        } else {
            tracing::debug!(org, repo, "repo disabled, skipping in-process dispatch");
        }

        // External fan-out is gated by the same repo-enablement check (§4.3
        // step 6, §9 "possibly-buggy source behaviour" (ii), preserved).
        if repo_enabled {
            self.dispatch_external(&envelope, &org, &repo, &plugin_config);
        }

        Ok(())
    }

    fn dispatch_in_process(
        &self,
        event_type: &EventType,
        event_id: &str,
        event: &DispatchEvent,
        org: &str,
        repo: &str,
        plugin_config: &Arc<PluginConfig>,
    ) {
        let enabled_names = plugin_config.enabled_plugins(org, repo);

        if let Some(kind) = EventKind::from_event_type(event_type) {
            for (name, handler) in self.registry.matching(kind, &enabled_names) {
                self.spawn_handler(name, handler, event.clone(), org, repo, event_type.as_str(), event_id, plugin_config.clone());
            }
        }

        if event_type.is_comment_source() {
            match derive_generic_comment(event_type, event) {
                Derivation::Built(generic) => {
                    let generic_event = DispatchEvent::GenericComment(generic);
                    for (name, handler) in self.registry.matching(EventKind::GenericComment, &enabled_names) {
                        self.spawn_handler(
                            name,
                            handler,
                            generic_event.clone(),
                            org,
                            repo,
                            event_type.as_str(),
                            event_id,
                            plugin_config.clone(),
                        );
                    }
                }
                Derivation::NotApplicable { should_warn } => {
                    if should_warn {
                        tracing::warn!(
                            event_type = event_type.as_str(),
                            action = event.action(),
                            "could not coerce event into a generic-comment event"
                        );
                    }
                }
            }
        }
    }

    fn dispatch_external(&self, envelope: &EventEnvelope, org: &str, repo: &str, plugin_config: &Arc<PluginConfig>) {
        let matched = plugin_config.external_plugins_for(org, repo, envelope.event_type.as_str());
        for plugin in matched {
            let plugin = plugin.clone();
            let Ok(guard) = self.inflight.enter() else {
                tracing::warn!(plugin = %plugin.name, "shutdown in progress, dropping external forward");
                continue;
            };
            let forwarder = self.forwarder.clone();
            let body = envelope.raw_payload.clone();
            let headers = envelope.headers.clone();
            let event_type = envelope.event_type.as_str().to_string();
            tokio::spawn(async move {
                let _guard = guard;
                forwarder.forward(&plugin, &event_type, &body, &headers).await;
            });
        }
    }

    /// Schedule one F-task (§4.4): enter the in-flight tracker, build the
    /// per-handler agent, run under panic isolation, record metrics.
    #[allow(clippy::too_many_arguments)]
    fn spawn_handler(
        &self,
        name: String,
        handler: HandlerFn<Agent>,
        event: DispatchEvent,
        org: &str,
        repo: &str,
        event_type: &str,
        event_id: &str,
        plugin_config: Arc<PluginConfig>,
    ) {
        let Ok(guard) = self.inflight.enter() else {
            tracing::warn!(plugin = %name, "shutdown in progress, dropping dispatch task");
            return;
        };

        let bundle = self.client_bundle.clone();
        let org = org.to_string();
        let repo = repo.to_string();
        let event_type = event_type.to_string();
        let action = event.action().to_string();
        let event_id = event_id.to_string();
        let issue_number = event.issue_number();

        tokio::spawn(async move {
            let _guard = guard;
            let span = tracing::info_span!(
                "dispatch_handler",
                plugin = %name,
                org = %org,
                repo = %repo,
                event_type = %event_type,
                event_id = %event_id,
            );
            let _enter = span.enter();

            let agent = Arc::new(Agent::new(
                &bundle,
                plugin_config,
                name.clone(),
                org.clone(),
                repo.clone(),
                event_type.clone(),
                event_id.clone(),
                issue_number,
            ));

            let started = Instant::now();
            let result = panic_capture::run_isolated(handler(agent.clone(), event)).await;
            let duration = started.elapsed();
            let took_action = agent.took_action();

            let errored = result.is_err();
            if let Err(ref err) = result {
                tracing::error!(plugin = %name, event_type = %event_type, action = %action, error = %err, "handler error");
            }

            metrics::record_handler(
                HandlerLabels {
                    event_type: event_type.clone(),
                    action: action.clone(),
                    plugin: name.clone(),
                    took_action,
                },
                duration.as_secs_f64(),
                errored,
            );
        });
    }
}
