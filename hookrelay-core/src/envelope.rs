//! The validated event envelope produced by the ingress front door.
//!
//! An [`EventEnvelope`] is immutable once built: the raw body has already
//! passed HMAC verification by the time one exists. Everything downstream —
//! the demultiplexer, the handler runner, the external forwarder — reads
//! from it without needing to re-touch the wire format.

use std::collections::HashMap;
use std::fmt;

/// The fixed enumeration of webhook event types this dispatcher understands,
/// plus a wildcard bucket for anything else the provider sends.
///
/// Variants map 1:1 onto the `X-GitHub-Event` header values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    Issues,
    IssueComment,
    PullRequest,
    PullRequestReview,
    PullRequestReviewComment,
    Push,
    Status,
    Other(String),
}

impl EventType {
    /// Parse the raw `X-GitHub-Event` header value.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "issues" => EventType::Issues,
            "issue_comment" => EventType::IssueComment,
            "pull_request" => EventType::PullRequest,
            "pull_request_review" => EventType::PullRequestReview,
            "pull_request_review_comment" => EventType::PullRequestReviewComment,
            "push" => EventType::Push,
            "status" => EventType::Status,
            other => EventType::Other(other.to_string()),
        }
    }

    /// The wire string for this event type, as it appears in the header and
    /// in metric labels.
    pub fn as_str(&self) -> &str {
        match self {
            EventType::Issues => "issues",
            EventType::IssueComment => "issue_comment",
            EventType::PullRequest => "pull_request",
            EventType::PullRequestReview => "pull_request_review",
            EventType::PullRequestReviewComment => "pull_request_review_comment",
            EventType::Push => "push",
            EventType::Status => "status",
            EventType::Other(s) => s.as_str(),
        }
    }

    /// Whether this is one of the five event kinds that can be normalized
    /// into a synthetic generic-comment event (§4.3).
    pub fn is_comment_source(&self) -> bool {
        matches!(
            self,
            EventType::Issues
                | EventType::IssueComment
                | EventType::PullRequest
                | EventType::PullRequestReview
                | EventType::PullRequestReviewComment
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The authenticated, demultiplexed unit of work handed from the signature
/// validator to the event demultiplexer.
///
/// Immutable after construction: nothing downstream is allowed to mutate
/// `raw_payload` or `headers`, since the external forwarder must relay the
/// exact bytes the provider sent.
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub event_type: EventType,
    /// Provider-supplied unique delivery id (`X-GitHub-Delivery`), propagated
    /// into every downstream log record.
    pub id: String,
    pub raw_payload: Vec<u8>,
    pub headers: HashMap<String, Vec<String>>,
}

impl EventEnvelope {
    pub fn new(
        event_type: EventType,
        id: impl Into<String>,
        raw_payload: Vec<u8>,
        headers: HashMap<String, Vec<String>>,
    ) -> Self {
        Self {
            event_type,
            id: id.into(),
            raw_payload,
            headers,
        }
    }

    /// First value of a header, case-sensitive key match (callers normalize
    /// header casing before inserting into the map).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.first()).map(|s| s.as_str())
    }
}
