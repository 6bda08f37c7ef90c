//! The plugin registry (§4.2): a process-global, write-once-at-init
//! collection of name → handler maps, one per [`EventKind`].
//!
//! Re-architected per §9's "dynamic handler dispatch" design note: instead of
//! a hidden global populated by package-init side effects, callers build an
//! explicit [`PluginRegistry`] during a deterministic bootstrap and hand it
//! to the server. `A` is the per-handler agent type the hosting crate
//! defines (client bundle, config snapshot, logger) — `hookrelay-core` stays
//! agnostic of it.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::event::{DispatchEvent, EventKind};

/// Boxed future returned by a plugin handler invocation.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// A registered plugin's handler function: given the per-handler agent and
/// the dispatch event, perform the plugin's action.
pub type HandlerFn<A> = Arc<dyn Fn(Arc<A>, DispatchEvent) -> HandlerFuture + Send + Sync>;

/// Static self-description for a plugin, aggregated by the `/plugin-help`
/// endpoint (§4.2 `eventsFor`, §6, §11).
#[derive(Debug, Clone, Default)]
pub struct PluginHelp {
    pub description: String,
    pub commands: Vec<String>,
}

pub type HelpProviderFn = Arc<dyn Fn() -> PluginHelp + Send + Sync>;

/// An error surfaced from a handler invocation — either the handler's own
/// `Result::Err`, or a caught panic converted by the handler runner (§4.4
/// step 4, §9 "panic isolation").
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build the error value for a caught panic (§4.4 step 4): `panic
    /// caught: <value>. stack is: <trace>`.
    pub fn from_panic(value: &str, stack: &str) -> Self {
        Self {
            message: format!("panic caught: {value}. stack is: {stack}"),
        }
    }
}

struct RegisteredHandler<A> {
    handler: HandlerFn<A>,
    help: Option<HelpProviderFn>,
}

/// Process-global (per-process instance, not per-request) name → handler
/// maps, one per [`EventKind`]. Populated once at bootstrap, read-only
/// thereafter — no locking is required for reads (§4.2, §5 "shared resource
/// policy").
pub struct PluginRegistry<A> {
    handlers: HashMap<EventKind, HashMap<String, RegisteredHandler<A>>>,
}

impl<A> Default for PluginRegistry<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> PluginRegistry<A> {
    pub fn new() -> Self {
        let mut handlers = HashMap::new();
        for kind in [
            EventKind::Issue,
            EventKind::IssueComment,
            EventKind::PullRequest,
            EventKind::Review,
            EventKind::ReviewComment,
            EventKind::Push,
            EventKind::Status,
            EventKind::GenericComment,
        ] {
            handlers.insert(kind, HashMap::new());
        }
        Self { handlers }
    }

    /// Register `name` for `kind`. Idempotent: registering the same name for
    /// the same kind again replaces the previous handler rather than
    /// erroring or duplicating the entry (§4.2).
    pub fn register(
        &mut self,
        kind: EventKind,
        name: impl Into<String>,
        handler: HandlerFn<A>,
        help: Option<HelpProviderFn>,
    ) {
        self.handlers
            .entry(kind)
            .or_default()
            .insert(name.into(), RegisteredHandler { handler, help });
    }

    /// All plugin names registered for `kind`.
    pub fn names_for(&self, kind: EventKind) -> impl Iterator<Item = &str> {
        self.handlers
            .get(&kind)
            .into_iter()
            .flat_map(|m| m.keys().map(|s| s.as_str()))
    }

    /// The event kinds `name` is registered under — used by the
    /// `/plugin-help` aggregator (§4.2 `eventsFor`).
    pub fn events_for(&self, name: &str) -> Vec<EventKind> {
        self.handlers
            .iter()
            .filter(|(_, handlers)| handlers.contains_key(name))
            .map(|(kind, _)| *kind)
            .collect()
    }

    /// All distinct plugin names registered anywhere in the registry.
    pub fn all_names(&self) -> HashSet<&str> {
        self.handlers
            .values()
            .flat_map(|m| m.keys().map(|s| s.as_str()))
            .collect()
    }

    pub fn help_for(&self, name: &str) -> Option<PluginHelp> {
        self.handlers.values().find_map(|m| {
            m.get(name)
                .and_then(|h| h.help.as_ref())
                .map(|provider| provider())
        })
    }

    /// `{h | h ∈ registry[kind] ∩ enabled_names}` — the fan-out-completeness
    /// intersection from §8.
    pub fn matching(&self, kind: EventKind, enabled_names: &HashSet<String>) -> Vec<(String, HandlerFn<A>)> {
        self.handlers
            .get(&kind)
            .map(|m| {
                m.iter()
                    .filter(|(name, _)| enabled_names.contains(*name))
                    .map(|(name, h)| (name.clone(), h.handler.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopAgent;

    fn noop_handler() -> HandlerFn<NoopAgent> {
        Arc::new(|_agent, _event| Box::pin(async { Ok(()) }))
    }

    #[test]
    fn registration_is_idempotent_by_name() {
        let mut registry: PluginRegistry<NoopAgent> = PluginRegistry::new();
        registry.register(EventKind::Push, "size", noop_handler(), None);
        registry.register(EventKind::Push, "size", noop_handler(), None);
        assert_eq!(registry.names_for(EventKind::Push).count(), 1);
    }

    #[test]
    fn matching_intersects_registry_and_routing_table() {
        let mut registry: PluginRegistry<NoopAgent> = PluginRegistry::new();
        registry.register(EventKind::Push, "size", noop_handler(), None);
        registry.register(EventKind::Push, "other", noop_handler(), None);

        let mut enabled = HashSet::new();
        enabled.insert("size".to_string());

        let matched = registry.matching(EventKind::Push, &enabled);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].0, "size");
    }

    #[test]
    fn events_for_reports_every_kind_a_name_is_registered_under() {
        let mut registry: PluginRegistry<NoopAgent> = PluginRegistry::new();
        registry.register(EventKind::Push, "lgtm", noop_handler(), None);
        registry.register(EventKind::GenericComment, "lgtm", noop_handler(), None);

        let mut kinds = registry.events_for("lgtm");
        kinds.sort_by_key(|k| k.label());
        assert_eq!(kinds.len(), 2);
    }
}
