//! The crawler's single point of contact with the session layer
//!
//! The crawl loop calls [`RequestGate::before_send`] for every outgoing
//! request, [`RequestGate::after_receive`] for every response and
//! [`RequestGate::allow_link`] for every extracted link. With autologin
//! disabled all three are pass-throughs.

use crate::auth::coordinator::{AuthResolution, AuthenticationCoordinator};
use crate::auth::detector::ResponseView;
use crate::auth::logout::{looks_like_logout, LinkCandidate};
use crate::auth::session::{Admission, Decision, SessionCookies, SessionSnapshot, SessionTicket};
use crate::auth::solver::LoginSolver;
use crate::config::AutologinConfig;
use crate::state::AuthStatus;
use crate::AuthError;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// What the crawler should do with a response
#[derive(Debug)]
pub enum ResponseDecision<R> {
    /// Process the response normally
    Forward(R),

    /// Drop the response; the request waits for a login. If `start_login`
    /// is set the caller must run [`RequestGate::authenticate`].
    TriggerReauth { start_login: bool },

    /// Drop the response and send the request again
    Resend(R),

    /// Drop the response; the request fails with `error`
    Reject { request: R, error: AuthError },
}

impl<R> From<Decision<R>> for ResponseDecision<R> {
    fn from(decision: Decision<R>) -> Self {
        match decision {
            Decision::PassThrough(request) => Self::Forward(request),
            Decision::RetryAfterLogin { start_login } => Self::TriggerReauth { start_login },
            Decision::Resend(request) => Self::Resend(request),
            Decision::Rejected { request, error } => Self::Reject { request, error },
        }
    }
}

/// Request/response hooks and link filter for one crawl
pub struct RequestGate<R> {
    config: AutologinConfig,
    coordinator: Option<Arc<AuthenticationCoordinator<R>>>,
}

impl<R> RequestGate<R> {
    /// Builds the gate for a crawl starting at `base_url`
    pub fn new(config: AutologinConfig, base_url: &Url) -> Result<Self, url::ParseError> {
        let coordinator = if config.enabled {
            Some(Arc::new(AuthenticationCoordinator::new(&config, base_url)?))
        } else {
            None
        };
        Ok(Self {
            config,
            coordinator,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.coordinator.is_some()
    }

    pub fn coordinator(&self) -> Option<&Arc<AuthenticationCoordinator<R>>> {
        self.coordinator.as_ref()
    }

    pub fn status(&self) -> AuthStatus {
        self.coordinator
            .as_ref()
            .map_or(AuthStatus::Unknown, |c| c.status())
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.coordinator.as_ref().map(|c| c.snapshot())
    }

    pub fn cookies(&self) -> SessionCookies {
        self.coordinator
            .as_ref()
            .map(|c| c.cookies())
            .unwrap_or_default()
    }

    /// Hook for every outgoing request
    pub fn before_send(&self, request: R) -> Admission<R> {
        match &self.coordinator {
            Some(coordinator) => coordinator.admit(request),
            None => Admission::Send {
                request,
                ticket: SessionTicket::default(),
            },
        }
    }

    /// Hook for every response
    pub fn after_receive(
        &self,
        request: R,
        ticket: &SessionTicket,
        response: &ResponseView<'_>,
    ) -> ResponseDecision<R> {
        match &self.coordinator {
            Some(coordinator) => coordinator.on_response(request, ticket, response).into(),
            None => ResponseDecision::Forward(request),
        }
    }

    /// Records the cookie updates of a response
    pub fn absorb_cookies(&self, ticket: &SessionTicket, cookies: &[(String, String)]) {
        if let Some(coordinator) = &self.coordinator {
            coordinator.absorb_cookies(ticket, cookies);
        }
    }

    /// Returns false for links the crawler must not follow
    ///
    /// Logout links end the session; links to the login page would only
    /// bounce the crawl back into another login.
    pub fn allow_link(&self, link: &LinkCandidate) -> bool {
        let Some(coordinator) = &self.coordinator else {
            return true;
        };

        if looks_like_logout(link, &self.config) {
            debug!(url = %link.target_url, text = %link.link_text, "Skipping logout link");
            return false;
        }

        if coordinator.detector().is_login_url(&link.target_url) {
            debug!(url = %link.target_url, "Skipping login page link");
            return false;
        }

        true
    }

    /// Runs the login for the caller that got `start_login == true`
    pub async fn authenticate(&self, solver: &dyn LoginSolver) -> AuthResolution<R> {
        match &self.coordinator {
            Some(coordinator) => coordinator.authenticate(solver).await,
            None => AuthResolution::Cancelled,
        }
    }

    /// Resolves everything still waiting on login as cancelled
    pub fn abort(&self) -> Vec<R> {
        self.coordinator
            .as_ref()
            .map(|c| c.abort())
            .unwrap_or_default()
    }
}
