//! Generic-comment normalization (§3, §4.3, §9 "Generic-comment
//! normalization" design note).
//!
//! Represented as a single conversion function per source variant, each
//! returning either a normalized event or "not applicable" — avoiding the
//! source system's per-event hand-duplication of the coercion logic.

use crate::envelope::EventType;
use crate::event::{DispatchEvent, Repo};

/// The three normalized actions a generic-comment event can carry (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedAction {
    Created,
    Edited,
    Deleted,
}

impl NormalizedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NormalizedAction::Created => "created",
            NormalizedAction::Edited => "edited",
            NormalizedAction::Deleted => "deleted",
        }
    }
}

/// The authoritative, single-pass action mapping from §4.3. Idempotent when
/// re-applied to its own output strings (`normalize("created")` also maps to
/// `Created`), satisfying the §8 "action normalization" property.
pub fn normalize(action: &str) -> Option<NormalizedAction> {
    match action {
        "created" | "opened" | "submitted" => Some(NormalizedAction::Created),
        "edited" => Some(NormalizedAction::Edited),
        "deleted" | "dismissed" => Some(NormalizedAction::Deleted),
        _ => None,
    }
}

/// Non-comment actions that are expected to normalize to ∅ and should not
/// trigger a "could not coerce" warning (§4.3 step 5).
pub fn is_known_non_comment_action(event_type: &EventType, action: &str) -> bool {
    match event_type {
        EventType::Issues => matches!(
            action,
            "closed"
                | "reopened"
                | "labeled"
                | "unlabeled"
                | "assigned"
                | "unassigned"
                | "milestoned"
                | "demilestoned"
                | "locked"
                | "unlocked"
                | "pinned"
                | "unpinned"
                | "transferred"
        ),
        EventType::PullRequest => matches!(
            action,
            "closed"
                | "reopened"
                | "labeled"
                | "unlabeled"
                | "assigned"
                | "unassigned"
                | "review_requested"
                | "review_request_removed"
                | "synchronize"
                | "ready_for_review"
                | "converted_to_draft"
                | "locked"
                | "unlocked"
                | "auto_merge_enabled"
                | "auto_merge_disabled"
        ),
        EventType::PullRequestReviewComment => matches!(action, "resolved" | "unresolved"),
        EventType::PullRequestReview => matches!(action, "dismissed_by_admin"),
        EventType::IssueComment => false,
        _ => false,
    }
}

/// A synthetic normalized event representing "user-authored text
/// appeared/changed/vanished" (§3).
#[derive(Debug, Clone)]
pub struct GenericCommentEvent {
    pub event_id: String,
    pub action: NormalizedAction,
    pub number: u64,
    pub repo: Repo,
    pub author: String,
    pub body: String,
    pub html_url: String,
    pub is_pull_request: bool,
    pub comment_id: Option<u64>,
    pub issue_state: String,
    pub issue_title: String,
    pub issue_body: String,
    pub issue_assignees: Vec<String>,
    pub issue_author: String,
    pub issue_html_url: String,
}

/// The outcome of attempting to derive a generic-comment event from a
/// concrete variant: either a built event, or "not applicable" with a flag
/// for whether the silence should be logged as a warning.
pub enum Derivation {
    Built(GenericCommentEvent),
    NotApplicable { should_warn: bool },
}

/// Derive the generic-comment event from any of the five comment-source
/// variants (§4.3 step 5). Non-comment-source variants (`push`, `status`,
/// unknown) are never passed here — the demultiplexer only calls this for
/// `EventType::is_comment_source()` events.
pub fn derive(event_type: &EventType, event: &DispatchEvent) -> Derivation {
    let action = event.action();
    let normalized = match normalize(action) {
        Some(n) => n,
        None => {
            let should_warn = !is_known_non_comment_action(event_type, action);
            return Derivation::NotApplicable { should_warn };
        }
    };

    let built = match event {
        DispatchEvent::Issue(e) => GenericCommentEvent {
            event_id: e.event_id.clone(),
            action: normalized,
            number: e.issue.number,
            repo: e.repo.clone(),
            author: e.actor.clone(),
            body: e.issue.body.clone(),
            html_url: e.html_url.clone(),
            is_pull_request: false,
            comment_id: None,
            issue_state: e.issue.state.clone(),
            issue_title: e.issue.title.clone(),
            issue_body: e.issue.body.clone(),
            issue_assignees: e.issue.assignees.clone(),
            issue_author: e.issue.author.clone(),
            issue_html_url: e.issue.html_url.clone(),
        },
        DispatchEvent::IssueComment(e) => GenericCommentEvent {
            event_id: e.event_id.clone(),
            action: normalized,
            number: e.issue.number,
            repo: e.repo.clone(),
            author: e.actor.clone(),
            body: e.body.clone(),
            html_url: e.html_url.clone(),
            is_pull_request: false,
            comment_id: Some(e.comment_id),
            issue_state: e.issue.state.clone(),
            issue_title: e.issue.title.clone(),
            issue_body: e.issue.body.clone(),
            issue_assignees: e.issue.assignees.clone(),
            issue_author: e.issue.author.clone(),
            issue_html_url: e.issue.html_url.clone(),
        },
        DispatchEvent::PullRequest(e) => GenericCommentEvent {
            event_id: e.event_id.clone(),
            action: normalized,
            number: e.number,
            repo: e.repo.clone(),
            author: e.actor.clone(),
            body: e.body.clone(),
            html_url: e.html_url.clone(),
            is_pull_request: true,
            comment_id: None,
            issue_state: e.state.clone(),
            issue_title: e.title.clone(),
            issue_body: e.body.clone(),
            issue_assignees: e.assignees.clone(),
            issue_author: e.actor.clone(),
            issue_html_url: e.html_url.clone(),
        },
        DispatchEvent::Review(e) => GenericCommentEvent {
            event_id: e.event_id.clone(),
            action: normalized,
            number: e.pull_request.number,
            repo: e.repo.clone(),
            author: e.actor.clone(),
            body: e.body.clone(),
            html_url: e.html_url.clone(),
            is_pull_request: true,
            comment_id: Some(e.review_id),
            issue_state: e.pull_request.state.clone(),
            issue_title: e.pull_request.title.clone(),
            issue_body: e.pull_request.body.clone(),
            issue_assignees: e.pull_request.assignees.clone(),
            issue_author: e.pull_request.actor.clone(),
            issue_html_url: e.pull_request.html_url.clone(),
        },
        DispatchEvent::ReviewComment(e) => GenericCommentEvent {
            event_id: e.event_id.clone(),
            action: normalized,
            number: e.pull_request.number,
            repo: e.repo.clone(),
            author: e.actor.clone(),
            body: e.body.clone(),
            html_url: e.html_url.clone(),
            is_pull_request: true,
            comment_id: Some(e.comment_id),
            issue_state: e.pull_request.state.clone(),
            issue_title: e.pull_request.title.clone(),
            issue_body: e.pull_request.body.clone(),
            issue_assignees: e.pull_request.assignees.clone(),
            issue_author: e.pull_request.actor.clone(),
            issue_html_url: e.pull_request.html_url.clone(),
        },
        _ => unreachable!("derive() is only called for comment-source event kinds"),
    };

    Derivation::Built(built)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_total_on_listed_actions() {
        assert_eq!(normalize("created"), Some(NormalizedAction::Created));
        assert_eq!(normalize("opened"), Some(NormalizedAction::Created));
        assert_eq!(normalize("submitted"), Some(NormalizedAction::Created));
        assert_eq!(normalize("edited"), Some(NormalizedAction::Edited));
        assert_eq!(normalize("deleted"), Some(NormalizedAction::Deleted));
        assert_eq!(normalize("dismissed"), Some(NormalizedAction::Deleted));
        assert_eq!(normalize("labeled"), None);
    }

    #[test]
    fn mapping_is_idempotent_on_its_own_output() {
        for action in ["created", "edited", "deleted"] {
            let once = normalize(action).unwrap();
            let twice = normalize(once.as_str()).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn labeled_pull_request_is_a_known_non_comment_action() {
        assert!(is_known_non_comment_action(&EventType::PullRequest, "labeled"));
        assert!(!is_known_non_comment_action(&EventType::PullRequest, "weird_action"));
    }
}
