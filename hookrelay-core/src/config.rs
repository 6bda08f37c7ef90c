//! The plugin configuration schema (§3), its merge algorithm for
//! supplemental files (§3 "Supplemental configuration", §4.7), and its
//! validator chain.
//!
//! File loading and directory walking live in `hookrelay-server` (they need
//! `walkdir` and touch the filesystem); this module owns only the schema,
//! the pure merge function, and the pure validators, so they can be unit
//! tested without touching disk.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use crate::error::{MergeError, ValidationError};

/// `plugins: map<orgOrOrgSlashRepo, {...}>` entry (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgRepoPlugins {
    #[serde(default)]
    pub plugins: Vec<String>,
    #[serde(default, rename = "excludedRepos")]
    pub excluded_repos: Vec<String>,
}

/// `externalPlugins` entry (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPlugin {
    pub name: String,
    pub endpoint: String,
    /// Empty means "all events" (§3).
    #[serde(default)]
    pub events: Vec<String>,
}

impl ExternalPlugin {
    /// Whether this entry should receive `event_type` (§4.3 step 6).
    pub fn matches_event(&self, event_type: &str) -> bool {
        self.events.is_empty() || self.events.iter().any(|e| e == event_type)
    }
}

/// A config-updater cross-reference rule (§4.7 "cross-references (e.g.
/// config-updater rules) resolve"). The concrete updater mechanics (mapping
/// a changed file to a target config key in the source-control repo) are an
/// external collaborator's concern; here we only validate that every rule
/// names a non-empty source and target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigUpdaterRule {
    pub source_path: String,
    pub target_config_key: String,
}

/// The full plugin configuration document (§3): per-plugin settings blocks
/// plus the two routing tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub plugins: HashMap<String, OrgRepoPlugins>,

    #[serde(default, rename = "externalPlugins")]
    pub external_plugins: HashMap<String, Vec<ExternalPlugin>>,

    #[serde(default, rename = "configUpdater")]
    pub config_updater: Vec<ConfigUpdaterRule>,

    /// Per-plugin arbitrary settings blocks, keyed by plugin name. Plugin
    /// business logic is out of scope (§1), so these are held as opaque YAML
    /// values; only scalar-conflict detection during merge inspects them.
    #[serde(flatten)]
    pub plugin_settings: HashMap<String, Value>,
}

impl PluginConfig {
    /// The effective set of enabled plugin names for `(org, repo)`: the
    /// union of the org-level entry (minus `excludedRepos`) and the
    /// org/repo-level entry (§3).
    pub fn enabled_plugins(&self, org: &str, repo: &str) -> HashSet<String> {
        let mut enabled = HashSet::new();

        if let Some(org_entry) = self.plugins.get(org) {
            if !org_entry.excluded_repos.iter().any(|r| r == repo) {
                enabled.extend(org_entry.plugins.iter().cloned());
            }
        }

        let org_repo_key = format!("{org}/{repo}");
        if let Some(repo_entry) = self.plugins.get(&org_repo_key) {
            enabled.extend(repo_entry.plugins.iter().cloned());
        }

        enabled
    }

    /// External plugins that match `(org, repo)` and `event_type` (§3, §4.3
    /// step 6).
    pub fn external_plugins_for(&self, org: &str, repo: &str, event_type: &str) -> Vec<&ExternalPlugin> {
        let mut matched = Vec::new();
        if let Some(org_entries) = self.external_plugins.get(org) {
            matched.extend(org_entries.iter().filter(|p| p.matches_event(event_type)));
        }
        let org_repo_key = format!("{org}/{repo}");
        if let Some(repo_entries) = self.external_plugins.get(&org_repo_key) {
            matched.extend(repo_entries.iter().filter(|p| p.matches_event(event_type)));
        }
        matched
    }

    /// Merge `other` (a supplemental file) into `self` (§3, §4.7): plugin
    /// lists union, scalar per-plugin settings must be equal or one side
    /// unset — a genuine conflict is a fatal load error.
    pub fn merge(mut self, other: PluginConfig) -> Result<PluginConfig, MergeError> {
        for (scope, entry) in other.plugins {
            let merged = self.plugins.entry(scope).or_default();
            for name in entry.plugins {
                if !merged.plugins.contains(&name) {
                    merged.plugins.push(name);
                }
            }
            for repo in entry.excluded_repos {
                if !merged.excluded_repos.contains(&repo) {
                    merged.excluded_repos.push(repo);
                }
            }
        }

        for (scope, entries) in other.external_plugins {
            let merged = self.external_plugins.entry(scope).or_default();
            for entry in entries {
                if !merged.contains(&entry) {
                    merged.push(entry);
                }
            }
        }

        for rule in other.config_updater {
            self.config_updater.push(rule);
        }

        for (plugin, value) in other.plugin_settings {
            match self.plugin_settings.get(&plugin) {
                None => {
                    self.plugin_settings.insert(plugin, value);
                }
                Some(existing) if values_equal(existing, &value) => {}
                Some(existing) if is_unset(existing) => {
                    self.plugin_settings.insert(plugin, value);
                }
                Some(existing) if is_unset(&value) => {
                    let _ = existing;
                }
                Some(existing) => {
                    return Err(MergeError::ScalarConflict {
                        plugin,
                        left: format!("{existing:?}"),
                        right: format!("{value:?}"),
                    });
                }
            }
        }

        Ok(self)
    }

    /// The validator chain run after merge (§4.7):
    /// - every plugin name referenced in the routing tables exists in the
    ///   registry, if `strict`;
    /// - external plugin endpoints are well-formed URLs;
    /// - config-updater cross-references resolve.
    pub fn validate(&self, known_plugins: &HashSet<&str>, strict: bool) -> Result<(), ValidationError> {
        if strict {
            for entry in self.plugins.values() {
                for name in &entry.plugins {
                    if !known_plugins.contains(name.as_str()) {
                        return Err(ValidationError::UnknownPlugin(name.clone()));
                    }
                }
            }
        }

        for entries in self.external_plugins.values() {
            for entry in entries {
                let parsed = url::Url::parse(&entry.endpoint).map_err(|e| ValidationError::MalformedEndpoint {
                    name: entry.name.clone(),
                    endpoint: entry.endpoint.clone(),
                    reason: e.to_string(),
                })?;
                if parsed.scheme() != "http" && parsed.scheme() != "https" {
                    return Err(ValidationError::MalformedEndpoint {
                        name: entry.name.clone(),
                        endpoint: entry.endpoint.clone(),
                        reason: format!("unsupported scheme `{}`", parsed.scheme()),
                    });
                }
            }
        }

        for rule in &self.config_updater {
            if rule.source_path.trim().is_empty() || rule.target_config_key.trim().is_empty() {
                return Err(ValidationError::UnresolvedCrossReference(format!(
                    "{} -> {}",
                    rule.source_path, rule.target_config_key
                )));
            }
        }

        Ok(())
    }
}

fn is_unset(value: &Value) -> bool {
    matches!(value, Value::Null)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b
}
