//! The Client Bundle (§2 component C) and the per-handler `Agent` (§4.4).
//!
//! The concrete source-control API client, git client, cluster job client,
//! owners-file resolver, chat client, and issue-tracker clients are
//! deliberately out of scope (§1): they are named here only by the
//! contracts they satisfy. A production deployment supplies real
//! implementations of these traits; this crate ships none.
//!
//! Every client is wrapped in a *scoped* view per handler invocation (§4.4
//! step 2, §9 "scoped client used-flag"): the wrapper forwards every call to
//! the shared client and flips a mutex-guarded boolean on first use, so the
//! handler runner can compute `took_action` without the plugin needing to
//! report it explicitly.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use hookrelay_core::PluginConfig;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client operation failed: {0}")]
    Failed(String),
}

/// A comment on an issue or pull request, as returned by
/// [`SourceControlClient::list_comments`].
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: u64,
    pub author: String,
    pub body: String,
}

/// The source-control API client: commenting, labelling, merging.
#[async_trait]
pub trait SourceControlClient: Send + Sync {
    async fn create_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<(), ClientError>;
    async fn delete_comment(&self, org: &str, repo: &str, comment_id: u64) -> Result<(), ClientError>;
    async fn list_comments(&self, org: &str, repo: &str, number: u64) -> Result<Vec<Comment>, ClientError>;
    async fn add_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<(), ClientError>;
    async fn remove_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<(), ClientError>;
    async fn merge(&self, org: &str, repo: &str, number: u64) -> Result<(), ClientError>;
}

/// Local git working-tree access (clone/fetch a repo for plugins that need
/// to inspect file contents, e.g. OWNERS resolution or diff-based checks).
#[async_trait]
pub trait GitClient: Send + Sync {
    async fn ensure_clone(&self, org: &str, repo: &str) -> Result<(), ClientError>;
}

/// Creates downstream CI job records (the pipeline controller itself is out
/// of scope, §1).
#[async_trait]
pub trait ClusterJobClient: Send + Sync {
    async fn create_job(&self, org: &str, repo: &str, job_name: &str, sha: &str) -> Result<(), ClientError>;
}

/// Resolves OWNERS-file approvers/reviewers for a path.
#[async_trait]
pub trait OwnersResolver: Send + Sync {
    async fn owners_for(&self, org: &str, repo: &str, path: &str) -> Result<Vec<String>, ClientError>;
}

/// Chat notification sink (e.g. Slack).
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), ClientError>;
}

/// Issue-tracker clients for cross-filing (e.g. a bug tracker separate from
/// the source-control service's own issues).
#[async_trait]
pub trait IssueTrackerClient: Send + Sync {
    async fn file_issue(&self, title: &str, body: &str) -> Result<u64, ClientError>;
}

#[derive(Default)]
struct UsedFlag(Mutex<bool>);

impl UsedFlag {
    fn mark(&self) {
        *self.0.lock().expect("used-flag lock poisoned") = true;
    }

    fn get(&self) -> bool {
        *self.0.lock().expect("used-flag lock poisoned")
    }
}

/// Shared handles constructed once at startup (§7 kind 8: construction
/// failure here is fatal). Internally thread-safe; cloned cheaply via `Arc`
/// into every handler's scoped view (§5 "shared resource policy").
#[derive(Clone)]
pub struct ClientBundle {
    pub source_control: Arc<dyn SourceControlClient>,
    pub git: Arc<dyn GitClient>,
    pub cluster: Arc<dyn ClusterJobClient>,
    pub owners: Arc<dyn OwnersResolver>,
    pub chat: Arc<dyn ChatClient>,
    pub issue_tracker: Arc<dyn IssueTrackerClient>,
}

macro_rules! scoped_client {
    ($scoped:ident, $trait_name:ident, { $(async fn $method:ident(&self $(, $arg:ident : $ty:ty)*) -> Result<$ret:ty, ClientError>;)* }) => {
        pub struct $scoped {
            inner: Arc<dyn $trait_name>,
            used: Arc<UsedFlag>,
        }

        impl $scoped {
            fn new(inner: Arc<dyn $trait_name>) -> (Self, Arc<UsedFlag>) {
                let used = Arc::new(UsedFlag::default());
                (Self { inner, used: used.clone() }, used)
            }
        }

        #[async_trait]
        impl $trait_name for $scoped {
            $(
                async fn $method(&self $(, $arg: $ty)*) -> Result<$ret, ClientError> {
                    self.used.mark();
                    self.inner.$method($($arg),*).await
                }
            )*
        }
    };
}

scoped_client!(ScopedSourceControlClient, SourceControlClient, {
    async fn create_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<(), ClientError>;
    async fn delete_comment(&self, org: &str, repo: &str, comment_id: u64) -> Result<(), ClientError>;
    async fn list_comments(&self, org: &str, repo: &str, number: u64) -> Result<Vec<Comment>, ClientError>;
    async fn add_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<(), ClientError>;
    async fn remove_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<(), ClientError>;
    async fn merge(&self, org: &str, repo: &str, number: u64) -> Result<(), ClientError>;
});

scoped_client!(ScopedGitClient, GitClient, {
    async fn ensure_clone(&self, org: &str, repo: &str) -> Result<(), ClientError>;
});

scoped_client!(ScopedClusterJobClient, ClusterJobClient, {
    async fn create_job(&self, org: &str, repo: &str, job_name: &str, sha: &str) -> Result<(), ClientError>;
});

scoped_client!(ScopedOwnersResolver, OwnersResolver, {
    async fn owners_for(&self, org: &str, repo: &str, path: &str) -> Result<Vec<String>, ClientError>;
});

scoped_client!(ScopedChatClient, ChatClient, {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), ClientError>;
});

scoped_client!(ScopedIssueTrackerClient, IssueTrackerClient, {
    async fn file_issue(&self, title: &str, body: &str) -> Result<u64, ClientError>;
});

/// Lazily-usable helper bound to `(org, repo, issueNumber)` for plugins that
/// want to prune stale bot comments (§4.4 step 3). Only constructed on
/// demand via [`Agent::comment_pruner`]; using it marks the scoped
/// source-control client as used like any other call.
pub struct CommentPruner {
    scm: Arc<dyn SourceControlClient>,
    org: String,
    repo: String,
    number: u64,
}

impl CommentPruner {
    /// Delete every comment for which `should_prune` returns `true`,
    /// returning the number deleted.
    pub async fn prune(&self, should_prune: impl Fn(&Comment) -> bool) -> Result<usize, ClientError> {
        let comments = self.scm.list_comments(&self.org, &self.repo, self.number).await?;
        let mut deleted = 0;
        for comment in comments.iter().filter(|c| should_prune(c)) {
            self.scm.delete_comment(&self.org, &self.repo, comment.id).await?;
            deleted += 1;
        }
        Ok(deleted)
    }
}

/// Per-handler execution context (§4.4 step 2): the configuration snapshot,
/// the plugin configuration snapshot, and scoped clients cloned from the
/// bundle so usage can be attributed to this specific invocation.
pub struct Agent {
    pub plugin_config: Arc<PluginConfig>,
    pub org: String,
    pub repo: String,
    pub event_type: String,
    pub event_id: String,
    pub plugin: String,
    pub source_control: ScopedSourceControlClient,
    pub git: ScopedGitClient,
    pub cluster: ScopedClusterJobClient,
    pub owners: ScopedOwnersResolver,
    pub chat: ScopedChatClient,
    pub issue_tracker: ScopedIssueTrackerClient,
    used_flags: Vec<Arc<UsedFlag>>,
    issue_number: Option<u64>,
    source_control_raw: Arc<dyn SourceControlClient>,
    scm_flag: Arc<UsedFlag>,
}

impl Agent {
    pub fn new(
        bundle: &ClientBundle,
        plugin_config: Arc<PluginConfig>,
        plugin: String,
        org: String,
        repo: String,
        event_type: String,
        event_id: String,
        issue_number: Option<u64>,
    ) -> Self {
        let (source_control, scm_flag) = ScopedSourceControlClient::new(bundle.source_control.clone());
        let (git, git_flag) = ScopedGitClient::new(bundle.git.clone());
        let (cluster, cluster_flag) = ScopedClusterJobClient::new(bundle.cluster.clone());
        let (owners, owners_flag) = ScopedOwnersResolver::new(bundle.owners.clone());
        let (chat, chat_flag) = ScopedChatClient::new(bundle.chat.clone());
        let (issue_tracker, issues_flag) = ScopedIssueTrackerClient::new(bundle.issue_tracker.clone());

        Self {
            plugin_config,
            org,
            repo,
            event_type,
            event_id,
            plugin,
            source_control,
            git,
            cluster,
            owners,
            chat,
            issue_tracker,
            used_flags: vec![
                scm_flag.clone(),
                git_flag,
                cluster_flag,
                owners_flag,
                chat_flag,
                issues_flag,
            ],
            issue_number,
            source_control_raw: bundle.source_control.clone(),
            scm_flag,
        }
    }

    /// `took_action = any scoped client reports used()` (§4.4 step 5).
    pub fn took_action(&self) -> bool {
        self.used_flags.iter().any(|flag| flag.get())
    }

    /// Build the lazy comment-pruner helper bound to this event's
    /// `(org, repo, issueNumber)`, or `None` if the event carries no issue
    /// number (§4.4 step 3).
    ///
    /// Shares this agent's own `scm_flag` (via [`PrunerDelegate`]) rather
    /// than minting an independent used-flag, so a plugin that only ever
    /// touches the pruner still flips `took_action` on the agent it came
    /// from.
    pub fn comment_pruner(&self) -> Option<CommentPruner> {
        let number = self.issue_number?;
        let delegate: Arc<dyn SourceControlClient> = Arc::new(PrunerDelegate {
            inner: self.source_control_raw.clone(),
            flag: self.scm_flag.clone(),
        });
        Some(CommentPruner {
            scm: delegate,
            org: self.org.clone(),
            repo: self.repo.clone(),
            number,
        })
    }
}

/// Forwards every call to the agent's real source-control client while
/// flipping the *same* used-flag as the agent's primary scoped client
/// (§4.4 step 3: the pruner is a view onto the same invocation, not a
/// separately-attributed client).
struct PrunerDelegate {
    inner: Arc<dyn SourceControlClient>,
    flag: Arc<UsedFlag>,
}

#[async_trait]
impl SourceControlClient for PrunerDelegate {
    async fn create_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<(), ClientError> {
        self.flag.mark();
        self.inner.create_comment(org, repo, number, body).await
    }
    async fn delete_comment(&self, org: &str, repo: &str, comment_id: u64) -> Result<(), ClientError> {
        self.flag.mark();
        self.inner.delete_comment(org, repo, comment_id).await
    }
    async fn list_comments(&self, org: &str, repo: &str, number: u64) -> Result<Vec<Comment>, ClientError> {
        self.flag.mark();
        self.inner.list_comments(org, repo, number).await
    }
    async fn add_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<(), ClientError> {
        self.flag.mark();
        self.inner.add_label(org, repo, number, label).await
    }
    async fn remove_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<(), ClientError> {
        self.flag.mark();
        self.inner.remove_label(org, repo, number, label).await
    }
    async fn merge(&self, org: &str, repo: &str, number: u64) -> Result<(), ClientError> {
        self.flag.mark();
        self.inner.merge(org, repo, number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeScm {
        comments: Vec<Comment>,
    }

    #[async_trait]
    impl SourceControlClient for FakeScm {
        async fn create_comment(&self, _org: &str, _repo: &str, _number: u64, _body: &str) -> Result<(), ClientError> {
            Ok(())
        }
        async fn delete_comment(&self, _org: &str, _repo: &str, _comment_id: u64) -> Result<(), ClientError> {
            Ok(())
        }
        async fn list_comments(&self, _org: &str, _repo: &str, _number: u64) -> Result<Vec<Comment>, ClientError> {
            Ok(self.comments.clone())
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

    fn bundle(comments: Vec<Comment>) -> ClientBundle {
        ClientBundle {
            source_control: Arc::new(FakeScm { comments }),
            git: Arc::new(NoopGit),
            cluster: Arc::new(NoopCluster),
            owners: Arc::new(NoopOwners),
            chat: Arc::new(NoopChat),
            issue_tracker: Arc::new(NoopIssues),
        }
    }

    fn agent(bundle: &ClientBundle, issue_number: Option<u64>) -> Agent {
        Agent::new(
            bundle,
            Arc::new(PluginConfig::default()),
            "lgtm".to_string(),
            "acme".to_string(),
            "widgets".to_string(),
            "pull_request".to_string(),
            "evt-1".to_string(),
            issue_number,
        )
    }

    #[test]
    fn took_action_is_false_before_any_call() {
        let bundle = bundle(vec![]);
        let agent = agent(&bundle, Some(1));
        assert!(!agent.took_action());
    }

    #[tokio::test]
    async fn took_action_flips_after_an_outbound_call() {
        let bundle = bundle(vec![]);
        let agent = agent(&bundle, Some(1));
        agent.source_control.add_label("acme", "widgets", 1, "size/xs").await.unwrap();
        assert!(agent.took_action());
    }

    #[tokio::test]
    async fn comment_pruner_is_none_without_an_issue_number() {
        let bundle = bundle(vec![]);
        let agent = agent(&bundle, None);
        assert!(agent.comment_pruner().is_none());
    }

    #[tokio::test]
    async fn pruning_through_the_helper_marks_the_agent_as_took_action() {
        let bundle = bundle(vec![
            Comment { id: 1, author: "bot".to_string(), body: "stale".to_string() },
            Comment { id: 2, author: "alice".to_string(), body: "keep".to_string() },
        ]);
        let agent = agent(&bundle, Some(42));
        let pruner = agent.comment_pruner().expect("issue number present");

        let deleted = pruner.prune(|c| c.author == "bot").await.unwrap();
        assert_eq!(deleted, 1);
        assert!(agent.took_action());
    }
}
