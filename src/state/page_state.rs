//! Page state definitions for tracking crawl progress
//!
//! This module defines every state a page can be in during a crawl.
use serde::Serialize;
use std::fmt;

/// Represents the current state of a page in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageState {
    // ===== Active States =====
    /// Page is in the frontier waiting to be dispatched
    Queued,

    /// Page request is in flight
    Fetching,

    /// Page request is held in the pending queue until the login completes
    WaitingOnLogin,

    // ===== Terminal Success States =====
    /// Page was fetched while the session was valid and its links extracted
    Visited,

    /// Page answered with a redirect that is not a login redirect
    Redirected,

    // ===== Terminal Error States =====
    /// Page returned HTTP 404 or 410
    DeadLink,

    /// Page could not be reached (connection refused, DNS failure, timeout)
    Unreachable,

    /// Page Content-Type is not HTML
    ContentMismatch,

    /// Page request was resolved with an authentication failure
    AuthFailed,

    /// Page fetch failed for other reasons (HTTP 5xx, body read error, etc.)
    Failed,
}

impl PageState {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }

    /// Returns true if this is an active state (page may still be processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Fetching | Self::WaitingOnLogin)
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Visited | Self::Redirected)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::DeadLink
                | Self::Unreachable
                | Self::ContentMismatch
                | Self::AuthFailed
                | Self::Failed
        )
    }

    /// Label used in logs and the crawl report
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Fetching => "fetching",
            Self::WaitingOnLogin => "waiting_on_login",
            Self::Visited => "visited",
            Self::Redirected => "redirected",
            Self::DeadLink => "dead_link",
            Self::Unreachable => "unreachable",
            Self::ContentMismatch => "content_mismatch",
            Self::AuthFailed => "auth_failed",
            Self::Failed => "failed",
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> Vec<Self> {
        vec![
            Self::Queued,
            Self::Fetching,
            Self::WaitingOnLogin,
            Self::Visited,
            Self::Redirected,
            Self::DeadLink,
            Self::Unreachable,
            Self::ContentMismatch,
            Self::AuthFailed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!PageState::Queued.is_terminal());
        assert!(!PageState::Fetching.is_terminal());
        assert!(!PageState::WaitingOnLogin.is_terminal());

        assert!(PageState::Visited.is_terminal());
        assert!(PageState::Redirected.is_terminal());
        assert!(PageState::AuthFailed.is_terminal());
        assert!(PageState::Failed.is_terminal());
    }

    #[test]
    fn test_is_success() {
        assert!(PageState::Visited.is_success());
        assert!(PageState::Redirected.is_success());

        assert!(!PageState::WaitingOnLogin.is_success());
        assert!(!PageState::AuthFailed.is_success());
    }

    #[test]
    fn test_is_error() {
        assert!(PageState::DeadLink.is_error());
        assert!(PageState::Unreachable.is_error());
        assert!(PageState::ContentMismatch.is_error());
        assert!(PageState::AuthFailed.is_error());
        assert!(PageState::Failed.is_error());

        assert!(!PageState::Visited.is_error());
        assert!(!PageState::Queued.is_error());
    }

    #[test]
    fn test_every_state_is_active_or_terminal_exactly_once() {
        for state in PageState::all_states() {
            assert_ne!(state.is_active(), state.is_terminal(), "{:?}", state);
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", PageState::WaitingOnLogin), "waiting_on_login");
        assert_eq!(format!("{}", PageState::Visited), "visited");
        assert_eq!(format!("{}", PageState::AuthFailed), "auth_failed");
    }

    #[test]
    fn test_labels_are_unique() {
        let all = PageState::all_states();
        assert_eq!(all.len(), 10);

        for i in 0..all.len() {
            for j in (i + 1)..all.len() {
                assert_ne!(all[i].as_str(), all[j].as_str());
            }
        }
    }
}
