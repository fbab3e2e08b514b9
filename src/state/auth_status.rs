//! Authentication status of a crawl session

use serde::Serialize;
use std::fmt;

/// Where the crawl session stands with respect to the target site's login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    /// No login has been attempted and no session loss has been seen
    #[default]
    Unknown,

    /// A login is in flight; admitted requests are held in the pending queue
    Authenticating,

    /// The last login succeeded and its cookies are in use
    Authenticated,

    /// Login attempts were exhausted or the crawl was aborted mid-login
    Failed,
}

impl AuthStatus {
    /// Returns true if requests may go straight to the network
    pub fn sends_directly(&self) -> bool {
        matches!(self, Self::Unknown | Self::Authenticated)
    }

    /// Returns true if a session-loss signal in this state starts a login
    pub fn can_start_login(&self) -> bool {
        matches!(self, Self::Unknown | Self::Authenticated)
    }

    /// Returns true once no further login will ever be attempted
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Authenticating => "authenticating",
            Self::Authenticated => "authenticated",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
