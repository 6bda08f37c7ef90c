//! Server configuration (§10.4) and the Config Agent (§4.7, component A).
//!
//! Two distinct documents live here, grounded on the teacher's `config.rs`
//! three-step `load` → `apply_env_overrides` → `validate` pipeline:
//!
//! - [`ServerConfig`] — the TOML process-level settings named in §6's CLI
//!   surface (listen address, webhook path, grace period, dry-run, the
//!   plugin-config paths, the HMAC secret file path).
//! - [`ConfigAgent`] — loads the YAML plugin configuration (§3) plus any
//!   supplemental directories, merges and validates them, and republishes an
//!   `Arc<PluginConfig>` snapshot on a pointer-publish discipline (§4.7,
//!   §9 "hot-reload"). Readers call [`ConfigAgent::snapshot`] once per
//!   routing decision, matching the teacher's `Arc<RwLock<_>>` pattern in
//!   `metrics.rs`'s `METRICS_COLLECTOR`.

use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use walkdir::WalkDir;

use hookrelay_core::PluginConfig;

/// Process-level settings (§6 CLI surface, §10.4/§10.7), TOML-backed like
/// the teacher's `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// `POST <webhook-path>` (§6), default `/hook`.
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,

    /// When true, the External Forwarder (§4.5, §11) logs the would-be POST
    /// instead of sending it.
    #[serde(default)]
    pub dry_run: bool,

    /// Wall-clock budget for draining in-flight dispatch tasks at shutdown
    /// (§4.6), in seconds.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Path to the main plugin-configuration YAML document (§3, §6).
    #[serde(default = "default_plugin_config_path")]
    pub plugin_config_path: String,

    /// Directories walked for supplemental plugin-configuration files (§3).
    #[serde(default)]
    pub supplemental_config_dirs: Vec<String>,

    /// File-name suffix a supplemental config file must have to be merged
    /// (§3). Files beginning with `..` are always skipped regardless of
    /// suffix (atomically-swapped symlink targets).
    #[serde(default = "default_supplemental_suffix")]
    pub supplemental_config_suffix: String,

    /// Path to a file holding newline-separated HMAC secrets (§4.1, §6).
    #[serde(default = "default_hmac_secret_file")]
    pub hmac_secret_file: String,

    /// How often the Config Agent re-runs the load/merge/validate pipeline
    /// (§4.7: "e.g. every minute"), in seconds.
    #[serde(default = "default_reload_interval_secs")]
    pub reload_interval_secs: u64,

    /// Reject routing-table entries that name an unregistered plugin (§3
    /// invariant iii, §4.7).
    #[serde(default = "default_true")]
    pub strict_plugin_validation: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8888
}
fn default_webhook_path() -> String {
    "/hook".to_string()
}
fn default_grace_period_secs() -> u64 {
    30
}
fn default_plugin_config_path() -> String {
    "plugins.yaml".to_string()
}
fn default_supplemental_suffix() -> String {
    "_plugins.yaml".to_string()
}
fn default_hmac_secret_file() -> String {
    "hmac-secret".to_string()
}
fn default_reload_interval_secs() -> u64 {
    60
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
            dry_run: false,
            grace_period_secs: default_grace_period_secs(),
            plugin_config_path: default_plugin_config_path(),
            supplemental_config_dirs: Vec::new(),
            supplemental_config_suffix: default_supplemental_suffix(),
            hmac_secret_file: default_hmac_secret_file(),
            reload_interval_secs: default_reload_interval_secs(),
            strict_plugin_validation: true,
        }
    }
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ServerConfig = toml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("HOOKRELAY_HOST") {
            if !host.is_empty() {
                self.host = host;
            }
        }
        if let Ok(port) = env::var("HOOKRELAY_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(dry_run) = env::var("HOOKRELAY_DRY_RUN") {
            self.dry_run = matches!(dry_run.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.host.is_empty() {
            anyhow::bail!("server host cannot be empty");
        }
        if self.port == 0 {
            anyhow::bail!("server port must be between 1 and 65535");
        }
        if !self.webhook_path.starts_with('/') {
            anyhow::bail!("webhook_path must start with `/`: {}", self.webhook_path);
        }
        if self.grace_period_secs == 0 {
            anyhow::bail!("grace_period_secs cannot be 0");
        }
        Ok(())
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_secs(self.reload_interval_secs)
    }
}

/// Errors accumulated while walking a single supplemental directory (§3
/// "directory traversal errors are accumulated per-directory and reported
/// together").
#[derive(Debug, thiserror::Error)]
#[error("supplemental config directory `{dir}` had {} error(s): {}", .errors.len(), .errors.join("; "))]
pub struct SupplementalDirError {
    pub dir: String,
    pub errors: Vec<String>,
}

/// The current, validated plugin-configuration snapshot plus the metadata
/// the Config Agent needs to decide whether a routing-table plugin name is
/// known (§4.7 validator chain, §8 "config atomicity").
struct Loaded {
    config: Arc<PluginConfig>,
}

/// Loads, merges, validates, and hot-reloads the plugin configuration
/// (§4.7). Readers call [`ConfigAgent::snapshot`] and always see a complete,
/// validated document — never a half-merged one (§3 invariant i, §8 "config
/// atomicity").
pub struct ConfigAgent {
    main_path: PathBuf,
    supplemental_dirs: Vec<PathBuf>,
    supplemental_suffix: String,
    strict: bool,
    known_plugins: HashSet<String>,
    loaded: RwLock<Option<Loaded>>,
    ready: AtomicBool,
}

impl ConfigAgent {
    pub fn new(
        main_path: impl Into<PathBuf>,
        supplemental_dirs: Vec<PathBuf>,
        supplemental_suffix: impl Into<String>,
        strict: bool,
        known_plugins: HashSet<String>,
    ) -> Self {
        Self {
            main_path: main_path.into(),
            supplemental_dirs,
            supplemental_suffix: supplemental_suffix.into(),
            strict,
            known_plugins,
            loaded: RwLock::new(None),
            ready: AtomicBool::new(false),
        }
    }

    /// Ready only after configuration has loaded successfully at least once
    /// (§4.6 readiness endpoint).
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Option<Arc<PluginConfig>> {
        self.loaded.read().await.as_ref().map(|l| l.config.clone())
    }

    /// Run the full load → walk-supplemental → merge → validate pipeline and
    /// publish the result on success (§4.7).
    ///
    /// The first call is fatal on failure (§7 kind 7, first case); callers
    /// distinguish first-load from reload by whether [`Self::is_ready`] was
    /// already true before calling this.
    pub async fn reload(&self) -> anyhow::Result<()> {
        let main_content = tokio::fs::read_to_string(&self.main_path).await?;
        let mut merged: PluginConfig = serde_yaml::from_str(&main_content)?;

        let mut dir_errors = Vec::new();
        for dir in &self.supplemental_dirs {
            if let Err(e) = self.merge_supplemental_dir(&mut merged, dir).await {
                dir_errors.push(e.to_string());
            }
        }
        if !dir_errors.is_empty() {
            anyhow::bail!("supplemental config errors: {}", dir_errors.join(" | "));
        }

        let known: HashSet<&str> = self.known_plugins.iter().map(|s| s.as_str()).collect();
        merged.validate(&known, self.strict)?;

        *self.loaded.write().await = Some(Loaded {
            config: Arc::new(merged),
        });
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Walk one supplemental directory, skipping `..`-prefixed files
    /// (atomically-swapped symlink targets) and files not ending in the
    /// configured suffix, merging every remaining file into `merged` (§3).
    async fn merge_supplemental_dir(
        &self,
        merged: &mut PluginConfig,
        dir: &Path,
    ) -> Result<(), SupplementalDirError> {
        let mut errors = Vec::new();
        let entries: Vec<PathBuf> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| should_consider_file(entry.file_name().to_string_lossy().as_ref(), &self.supplemental_suffix))
            .map(|entry| entry.into_path())
            .collect();

        for path in entries {
            match read_and_parse(&path).await {
                Ok(supplemental) => {
                    let current = std::mem::take(merged);
                    match current.merge(supplemental) {
                        Ok(m) => *merged = m,
                        Err(e) => errors.push(format!("{}: {e}", path.display())),
                    }
                }
                Err(e) => errors.push(format!("{}: {e}", path.display())),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SupplementalDirError {
                dir: dir.display().to_string(),
                errors,
            })
        }
    }
}

/// §3: "Files whose names begin with `..` ... are skipped. Files whose names
/// end with a configured suffix are parsed and merged" — a file must satisfy
/// both checks to be considered.
fn should_consider_file(name: &str, suffix: &str) -> bool {
    !name.starts_with("..") && name.ends_with(suffix)
}

async fn read_and_parse(path: &Path) -> anyhow::Result<PluginConfig> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_yaml::from_str(&content)?)
}

/// Read newline-separated HMAC secrets from a file, ignoring blank lines
/// (§4.1, §6).
pub fn load_hmac_secrets(path: &str) -> anyhow::Result<HashSet<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(content.lines().map(|l| l.trim()).filter(|l| !l.is_empty()).map(String::from).collect())
}

/// Spawn the periodic reload loop (§4.7: "A periodic reload ... re-runs the
/// same pipeline; reload failures are logged but do not terminate the
/// process", §7 kind 7 second case).
pub fn spawn_reload_loop(agent: Arc<ConfigAgent>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; the caller already did the first load
        loop {
            ticker.tick().await;
            if let Err(err) = agent.reload().await {
                tracing::error!(error = %err, "plugin configuration reload failed, retaining previous snapshot");
            } else {
                tracing::debug!("plugin configuration reloaded");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn skips_dotdot_prefixed_and_wrong_suffix_files() {
        assert!(!should_consider_file("..data_plugins.yaml", "_plugins.yaml"));
        assert!(!should_consider_file("notes.txt", "_plugins.yaml"));
        assert!(should_consider_file("team_plugins.yaml", "_plugins.yaml"));
    }

    #[tokio::test]
    async fn reload_publishes_a_snapshot_and_flips_ready() {
        let dir = tempdir();
        let main_path = dir.join("plugins.yaml");
        std::fs::write(&main_path, "plugins:\n  acme:\n    plugins: [size]\n").unwrap();

        let mut known = HashSet::new();
        known.insert("size".to_string());

        let agent = ConfigAgent::new(main_path, vec![], "_plugins.yaml", true, known);
        assert!(!agent.is_ready());

        agent.reload().await.unwrap();
        assert!(agent.is_ready());

        let snapshot = agent.snapshot().await.unwrap();
        assert!(snapshot.enabled_plugins("acme", "widgets").contains("size"));
    }

    #[tokio::test]
    async fn reload_fails_on_unknown_plugin_in_strict_mode() {
        let dir = tempdir();
        let main_path = dir.join("plugins.yaml");
        std::fs::write(&main_path, "plugins:\n  acme:\n    plugins: [ghost]\n").unwrap();

        let agent = ConfigAgent::new(main_path, vec![], "_plugins.yaml", true, HashSet::new());
        assert!(agent.reload().await.is_err());
        assert!(!agent.is_ready());
    }

    #[tokio::test]
    async fn supplemental_files_are_merged_and_dotdot_files_are_skipped() {
        let dir = tempdir();
        let main_path = dir.join("plugins.yaml");
        std::fs::write(&main_path, "plugins:\n  acme:\n    plugins: [size]\n").unwrap();

        let supplemental_dir = dir.join("supplemental");
        std::fs::create_dir_all(&supplemental_dir).unwrap();
        std::fs::write(
            supplemental_dir.join("team_plugins.yaml"),
            "plugins:\n  acme:\n    plugins: [lgtm]\n",
        )
        .unwrap();
        std::fs::write(
            supplemental_dir.join("..swap_plugins.yaml"),
            "plugins:\n  acme:\n    plugins: [evil]\n",
        )
        .unwrap();

        let mut known = HashSet::new();
        known.insert("size".to_string());
        known.insert("lgtm".to_string());

        let agent = ConfigAgent::new(main_path, vec![supplemental_dir], "_plugins.yaml", true, known);
        agent.reload().await.unwrap();

        let snapshot = agent.snapshot().await.unwrap();
        let enabled = snapshot.enabled_plugins("acme", "widgets");
        assert!(enabled.contains("size"));
        assert!(enabled.contains("lgtm"));
        assert!(!enabled.contains("evil"));
    }

    fn tempdir() -> PathBuf {
        let mut dir = std::env::temp_dir();
        let unique = format!(
            "hookrelay-config-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        );
        dir.push(unique);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn load_hmac_secrets_ignores_blank_lines() {
        let mut file = tempdir();
        file.push("secrets.txt");
        let mut f = std::fs::File::create(&file).unwrap();
        writeln!(f, "old").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "new").unwrap();

        let secrets = load_hmac_secrets(file.to_str().unwrap()).unwrap();
        assert_eq!(secrets.len(), 2);
        assert!(secrets.contains("old"));
        assert!(secrets.contains("new"));
    }
}
