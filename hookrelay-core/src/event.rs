//! Concrete, typed event variants decoded from a validated envelope's
//! payload, plus the `EventKind` dimension the plugin registry and routing
//! table are indexed by.

use serde::Deserialize;

use crate::envelope::EventType;

/// The registry/routing dimension a plugin is registered against. Distinct
/// from [`EventType`]: `EventKind::GenericComment` has no wire event type of
/// its own, it is only ever produced by normalization (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Issue,
    IssueComment,
    PullRequest,
    Review,
    ReviewComment,
    Push,
    Status,
    GenericComment,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Issue => "issue",
            EventKind::IssueComment => "issueComment",
            EventKind::PullRequest => "pullRequest",
            EventKind::Review => "review",
            EventKind::ReviewComment => "reviewComment",
            EventKind::Push => "push",
            EventKind::Status => "status",
            EventKind::GenericComment => "genericComment",
        }
    }

    /// The `EventKind` a wire event type dispatches in-process handlers
    /// under, or `None` for unrecognized/wildcard event types (§4.3 step 2:
    /// "for unknown types, decode only the common-repo prefix" — there is no
    /// registry bucket for them).
    pub fn from_event_type(event_type: &EventType) -> Option<Self> {
        match event_type {
            EventType::Issues => Some(EventKind::Issue),
            EventType::IssueComment => Some(EventKind::IssueComment),
            EventType::PullRequest => Some(EventKind::PullRequest),
            EventType::PullRequestReview => Some(EventKind::Review),
            EventType::PullRequestReviewComment => Some(EventKind::ReviewComment),
            EventType::Push => Some(EventKind::Push),
            EventType::Status => Some(EventKind::Status),
            EventType::Other(_) => None,
        }
    }
}

/// Source repo identity, common to every concrete event variant.
#[derive(Debug, Clone, Deserialize)]
pub struct Repo {
    pub org: String,
    pub name: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
}

/// A minimal issue/PR reference embedded in generic-comment derivation.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRef {
    pub number: u64,
    pub state: String,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub assignees: Vec<String>,
    pub author: String,
    #[serde(rename = "htmlUrl")]
    pub html_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueEvent {
    #[serde(skip)]
    pub event_id: String,
    pub repo: Repo,
    pub actor: String,
    #[serde(rename = "htmlUrl")]
    pub html_url: String,
    pub action: String,
    pub issue: IssueRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueCommentEvent {
    #[serde(skip)]
    pub event_id: String,
    pub repo: Repo,
    pub actor: String,
    #[serde(rename = "htmlUrl")]
    pub html_url: String,
    pub action: String,
    pub issue: IssueRef,
    #[serde(rename = "commentId")]
    pub comment_id: u64,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestEvent {
    #[serde(skip)]
    pub event_id: String,
    pub repo: Repo,
    pub actor: String,
    #[serde(rename = "htmlUrl")]
    pub html_url: String,
    pub action: String,
    pub number: u64,
    pub sha: String,
    #[serde(default)]
    pub body: String,
    pub title: String,
    pub state: String,
    #[serde(default)]
    pub assignees: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewEvent {
    #[serde(skip)]
    pub event_id: String,
    pub repo: Repo,
    pub actor: String,
    #[serde(rename = "htmlUrl")]
    pub html_url: String,
    pub action: String,
    #[serde(rename = "reviewId")]
    pub review_id: u64,
    pub body: String,
    pub pull_request: PullRequestEvent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewCommentEvent {
    #[serde(skip)]
    pub event_id: String,
    pub repo: Repo,
    pub actor: String,
    #[serde(rename = "htmlUrl")]
    pub html_url: String,
    pub action: String,
    #[serde(rename = "commentId")]
    pub comment_id: u64,
    pub body: String,
    pub pull_request: PullRequestEvent,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(skip)]
    pub event_id: String,
    pub repo: Repo,
    /// `push` events carry the owner under `owner.name`, not `owner.login`
    /// like every other event (§4.3 edge case).
    #[serde(rename = "owner")]
    pub owner_name: String,
    pub ref_name: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusEvent {
    #[serde(skip)]
    pub event_id: String,
    pub repo: Repo,
    pub context: String,
    pub state: String,
    pub sha: String,
    #[serde(rename = "targetUrl", default)]
    pub target_url: String,
}

/// The common-repo prefix decoded for event types outside the fixed
/// enumeration (§4.3 step 2).
#[derive(Debug, Clone, Deserialize)]
pub struct UnknownEvent {
    #[serde(skip)]
    pub event_id: String,
    pub repo: Repo,
}

/// A decoded, typed event ready for dispatch — the demultiplexer's output
/// for a single plugin invocation.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Issue(IssueEvent),
    IssueComment(IssueCommentEvent),
    PullRequest(PullRequestEvent),
    Review(ReviewEvent),
    ReviewComment(ReviewCommentEvent),
    Push(PushEvent),
    Status(StatusEvent),
    Unknown(UnknownEvent),
    GenericComment(crate::generic_comment::GenericCommentEvent),
}

impl DispatchEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DispatchEvent::Issue(_) => EventKind::Issue,
            DispatchEvent::IssueComment(_) => EventKind::IssueComment,
            DispatchEvent::PullRequest(_) => EventKind::PullRequest,
            DispatchEvent::Review(_) => EventKind::Review,
            DispatchEvent::ReviewComment(_) => EventKind::ReviewComment,
            DispatchEvent::Push(_) => EventKind::Push,
            DispatchEvent::Status(_) => EventKind::Status,
            DispatchEvent::GenericComment(_) => EventKind::GenericComment,
            // Unknown events are never registry-dispatched; `kind()` is only
            // consulted for metric labels in that path.
            DispatchEvent::Unknown(_) => EventKind::Status,
        }
    }

    /// `(org, name)` for the repo-enablement check, reading `owner.name`
    /// instead of `owner.login` for push events per the §4.3 edge case.
    pub fn org_repo(&self) -> (&str, &str) {
        match self {
            DispatchEvent::Issue(e) => (&e.repo.org, &e.repo.name),
            DispatchEvent::IssueComment(e) => (&e.repo.org, &e.repo.name),
            DispatchEvent::PullRequest(e) => (&e.repo.org, &e.repo.name),
            DispatchEvent::Review(e) => (&e.repo.org, &e.repo.name),
            DispatchEvent::ReviewComment(e) => (&e.repo.org, &e.repo.name),
            DispatchEvent::Push(e) => (&e.repo.org, &e.repo.name),
            DispatchEvent::Status(e) => (&e.repo.org, &e.repo.name),
            DispatchEvent::Unknown(e) => (&e.repo.org, &e.repo.name),
            DispatchEvent::GenericComment(e) => (&e.repo.org, &e.repo.name),
        }
    }

    pub fn action(&self) -> &str {
        match self {
            DispatchEvent::Issue(e) => &e.action,
            DispatchEvent::IssueComment(e) => &e.action,
            DispatchEvent::PullRequest(e) => &e.action,
            DispatchEvent::Review(e) => &e.action,
            DispatchEvent::ReviewComment(e) => &e.action,
            DispatchEvent::Push(_) => "push",
            DispatchEvent::Status(e) => &e.state,
            DispatchEvent::Unknown(_) => "",
            DispatchEvent::GenericComment(e) => e.action.as_str(),
        }
    }

    /// The issue/PR number this event is scoped to, if any — used to bind a
    /// lazy comment-pruner helper (§4.4 step 3).
    pub fn issue_number(&self) -> Option<u64> {
        match self {
            DispatchEvent::Issue(e) => Some(e.issue.number),
            DispatchEvent::IssueComment(e) => Some(e.issue.number),
            DispatchEvent::PullRequest(e) => Some(e.number),
            DispatchEvent::Review(e) => Some(e.pull_request.number),
            DispatchEvent::ReviewComment(e) => Some(e.pull_request.number),
            DispatchEvent::GenericComment(e) => Some(e.number),
            _ => None,
        }
    }
}

/// Decode a raw JSON payload into the typed variant for `event_type`,
/// attaching the envelope's event id (§4.3 step 2).
pub fn decode(event_type: &EventType, event_id: &str, payload: &[u8]) -> Result<DispatchEvent, serde_json::Error> {
    let dispatch = match event_type {
        EventType::Issues => {
            let mut e: IssueEvent = serde_json::from_slice(payload)?;
            e.event_id = event_id.to_string();
            DispatchEvent::Issue(e)
        }
        EventType::IssueComment => {
            let mut e: IssueCommentEvent = serde_json::from_slice(payload)?;
            e.event_id = event_id.to_string();
            DispatchEvent::IssueComment(e)
        }
        EventType::PullRequest => {
            let mut e: PullRequestEvent = serde_json::from_slice(payload)?;
            e.event_id = event_id.to_string();
            DispatchEvent::PullRequest(e)
        }
        EventType::PullRequestReview => {
            let mut e: ReviewEvent = serde_json::from_slice(payload)?;
            e.event_id = event_id.to_string();
            DispatchEvent::Review(e)
        }
        EventType::PullRequestReviewComment => {
            let mut e: ReviewCommentEvent = serde_json::from_slice(payload)?;
            e.event_id = event_id.to_string();
            DispatchEvent::ReviewComment(e)
        }
        EventType::Push => {
            let mut e: PushEvent = serde_json::from_slice(payload)?;
            e.event_id = event_id.to_string();
            DispatchEvent::Push(e)
        }
        EventType::Status => {
            let mut e: StatusEvent = serde_json::from_slice(payload)?;
            e.event_id = event_id.to_string();
            DispatchEvent::Status(e)
        }
        EventType::Other(_) => {
            let mut e: UnknownEvent = serde_json::from_slice(payload)?;
            e.event_id = event_id.to_string();
            DispatchEvent::Unknown(e)
        }
    };
    Ok(dispatch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_pull_request_payload() {
        let payload = serde_json::json!({
            "repo": {"org": "acme", "name": "widgets", "fullName": "acme/widgets"},
            "actor": "alice",
            "htmlUrl": "https://example.com/pr/1",
            "action": "opened",
            "number": 1,
            "sha": "deadbeef",
            "body": "",
            "title": "add widget",
            "state": "open",
            "assignees": []
        });
        let decoded = decode(&EventType::PullRequest, "evt-1", payload.to_string().as_bytes()).unwrap();
        match decoded {
            DispatchEvent::PullRequest(e) => {
                assert_eq!(e.event_id, "evt-1");
                assert_eq!(e.number, 1);
                assert_eq!(e.repo.full_name, "acme/widgets");
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn push_event_reads_owner_name_not_login() {
        let payload = serde_json::json!({
            "repo": {"org": "acme", "name": "widgets", "fullName": "acme/widgets"},
            "owner": "acme-bot",
            "ref_name": "refs/heads/main",
            "before": "aaa",
            "after": "bbb"
        });
        let decoded = decode(&EventType::Push, "evt-2", payload.to_string().as_bytes()).unwrap();
        match decoded {
            DispatchEvent::Push(e) => assert_eq!(e.owner_name, "acme-bot"),
            other => panic!("unexpected variant: {:?}", other),
        }
    }
}
