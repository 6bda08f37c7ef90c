//! Minimal default adapters for the Client Bundle's traits (§2 component C).
//!
//! The concrete source-control API client is deliberately out of scope
//! (§1): a production deployment supplies its own implementation of
//! [`crate::agent::SourceControlClient`] et al. These adapters exist only so
//! `main.rs` has something to construct and run against by default — each
//! issues a generic REST call to a configurable base URL and bearer token,
//! the way the teacher's `standalone_*` example clients hit a configurable
//! provider endpoint rather than hand-rolling provider-specific wire logic.

use async_trait::async_trait;
use reqwest::Client;

use crate::agent::{ChatClient, ClientError, Comment, GitClient, IssueTrackerClient, OwnersResolver, SourceControlClient};

fn map_err(e: reqwest::Error) -> ClientError {
    ClientError::Failed(e.to_string())
}

/// Generic REST-backed source-control client: `POST/GET/DELETE` against
/// `{base_url}/repos/{org}/{repo}/...` using a bearer token. Swap for a
/// provider-specific SDK in production.
pub struct HttpSourceControlClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpSourceControlClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.bearer_auth(&self.token)
    }
}

#[async_trait]
impl SourceControlClient for HttpSourceControlClient {
    async fn create_comment(&self, org: &str, repo: &str, number: u64, body: &str) -> Result<(), ClientError> {
        let url = format!("{}/repos/{org}/{repo}/issues/{number}/comments", self.base_url);
        self.authed(self.http.post(url))
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await
            .map_err(map_err)?
            .error_for_status()
            .map_err(map_err)?;
        Ok(())
    }

    async fn delete_comment(&self, org: &str, repo: &str, comment_id: u64) -> Result<(), ClientError> {
        let url = format!("{}/repos/{org}/{repo}/issues/comments/{comment_id}", self.base_url);
        self.authed(self.http.delete(url)).send().await.map_err(map_err)?.error_for_status().map_err(map_err)?;
        Ok(())
    }

    async fn list_comments(&self, org: &str, repo: &str, number: u64) -> Result<Vec<Comment>, ClientError> {
        #[derive(serde::Deserialize)]
        struct Raw {
            id: u64,
            #[serde(default)]
            author: String,
            #[serde(default)]
            body: String,
        }
        let url = format!("{}/repos/{org}/{repo}/issues/{number}/comments", self.base_url);
        let raw: Vec<Raw> = self.authed(self.http.get(url)).send().await.map_err(map_err)?.json().await.map_err(map_err)?;
        Ok(raw
            .into_iter()
            .map(|r| Comment {
                id: r.id,
                author: r.author,
                body: r.body,
            })
            .collect())
    }

    async fn add_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<(), ClientError> {
        let url = format!("{}/repos/{org}/{repo}/issues/{number}/labels", self.base_url);
        self.authed(self.http.post(url))
            .json(&serde_json::json!({ "labels": [label] }))
            .send()
            .await
            .map_err(map_err)?
            .error_for_status()
            .map_err(map_err)?;
        Ok(())
    }

    async fn remove_label(&self, org: &str, repo: &str, number: u64, label: &str) -> Result<(), ClientError> {
        let url = format!("{}/repos/{org}/{repo}/issues/{number}/labels/{label}", self.base_url);
        self.authed(self.http.delete(url)).send().await.map_err(map_err)?.error_for_status().map_err(map_err)?;
        Ok(())
    }

    async fn merge(&self, org: &str, repo: &str, number: u64) -> Result<(), ClientError> {
        let url = format!("{}/repos/{org}/{repo}/pulls/{number}/merge", self.base_url);
        self.authed(self.http.put(url)).send().await.map_err(map_err)?.error_for_status().map_err(map_err)?;
        Ok(())
    }
}

/// No-op git client: local working-tree caching is an operational concern
/// outside this core (§1); a real deployment plugs in a `git2`-backed
/// implementation here.
pub struct NoopGitClient;

#[async_trait]
impl GitClient for NoopGitClient {
    async fn ensure_clone(&self, _org: &str, _repo: &str) -> Result<(), ClientError> {
        Ok(())
    }
}

/// Generic REST-backed cluster job client.
pub struct HttpClusterJobClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpClusterJobClient {
    pub fn new(http: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl crate::agent::ClusterJobClient for HttpClusterJobClient {
    async fn create_job(&self, org: &str, repo: &str, job_name: &str, sha: &str) -> Result<(), ClientError> {
        let url = format!("{}/jobs", self.base_url);
        self.http
            .post(url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "org": org, "repo": repo, "job": job_name, "sha": sha }))
            .send()
            .await
            .map_err(map_err)?
            .error_for_status()
            .map_err(map_err)?;
        Ok(())
    }
}

/// No-op OWNERS resolver: resolving OWNERS files requires the git working
/// tree this binary doesn't manage by default.
pub struct NoopOwnersResolver;

#[async_trait]
impl OwnersResolver for NoopOwnersResolver {
    async fn owners_for(&self, _org: &str, _repo: &str, _path: &str) -> Result<Vec<String>, ClientError> {
        Ok(Vec::new())
    }
}

/// No-op chat client: wire in a Slack/webhook-backed implementation for a
/// real deployment.
pub struct NoopChatClient;

#[async_trait]
impl ChatClient for NoopChatClient {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), ClientError> {
        tracing::debug!(channel, text, "chat client not configured, dropping message");
        Ok(())
    }
}

/// No-op issue-tracker client.
pub struct NoopIssueTrackerClient;

#[async_trait]
impl IssueTrackerClient for NoopIssueTrackerClient {
    async fn file_issue(&self, title: &str, _body: &str) -> Result<u64, ClientError> {
        tracing::debug!(title, "issue tracker client not configured, dropping filed issue");
        Ok(0)
    }
}
