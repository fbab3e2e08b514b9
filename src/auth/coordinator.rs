//! Authentication coordinator
//!
//! Owns the [`SessionState`] of one crawl, decides for every request and
//! response what the session means for it, and runs logins through a
//! [`LoginSolver`].
//!
//! # Serialization
//!
//! The session record sits behind a `std::sync::Mutex` that is only held for
//! synchronous transitions, never across an `.await`. The transition that
//! moves the session into `Authenticating` doubles as the login ownership
//! token: only the caller that performed it sees `start_login == true` and
//! is expected to call [`AuthenticationCoordinator::authenticate`]. Every
//! other caller is queued behind that login.

use crate::auth::detector::{LoginDetector, ResponseView};
use crate::auth::session::{
    Admission, Credentials, Decision, FailureStep, LoginPage, SessionCookies, SessionSnapshot,
    SessionState, SessionTicket,
};
use crate::auth::solver::{LoginReply, LoginRequest, LoginSolver};
use crate::config::AutologinConfig;
use crate::state::AuthStatus;
use crate::AuthError;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use url::Url;

/// Result of a single login attempt
#[derive(Debug)]
pub enum LoginOutcome<R> {
    /// Cookies merged, session is Authenticated under `epoch`; `replay`
    /// holds the requests that were queued, in arrival order
    Succeeded { epoch: u64, replay: Vec<R> },

    /// The attempt failed; more attempts remain
    Failed { error: AuthError },

    /// The attempt failed and was the last one allowed
    Exhausted { failed: Vec<R>, error: AuthError },

    /// No login is in progress (never started, or the crawl was aborted)
    NotAuthenticating,
}

/// How a login run ended
#[derive(Debug)]
pub enum AuthResolution<R> {
    /// Logged in; `replay` holds the queued requests in arrival order
    Authenticated { epoch: u64, replay: Vec<R> },

    /// Gave up; every request in `failed` resolves with `error`
    Exhausted { failed: Vec<R>, error: AuthError },

    /// The crawl was aborted while logging in
    Cancelled,
}

/// Coordinates the session of one crawl across concurrent requests
pub struct AuthenticationCoordinator<R> {
    detector: LoginDetector,
    auth_delay: Duration,
    state: Mutex<SessionState<R>>,
}

impl<R> AuthenticationCoordinator<R> {
    /// Creates a coordinator for a crawl rooted at `base_url`
    ///
    /// The login URL is resolved against `base_url`.
    pub fn new(config: &AutologinConfig, base_url: &Url) -> Result<Self, url::ParseError> {
        let detector = LoginDetector::from_config(config, base_url)?;
        let credentials = Credentials::new(config.username.clone(), config.password.clone());

        Ok(Self {
            detector,
            auth_delay: config.auth_delay(),
            state: Mutex::new(SessionState::new(
                credentials,
                config.max_login_attempts,
                config.pending_queue_capacity,
            )),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn login_url(&self) -> &Url {
        self.detector.login_url()
    }

    pub fn detector(&self) -> &LoginDetector {
        &self.detector
    }

    pub fn status(&self) -> AuthStatus {
        self.lock().status()
    }

    /// Current session cookies; the returned view does not change afterwards
    pub fn cookies(&self) -> SessionCookies {
        self.lock().cookies().clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    /// Routes a request that is about to be sent
    pub fn admit(&self, request: R) -> Admission<R> {
        let admission = self.lock().admit(request);
        match &admission {
            Admission::Send { ticket, .. } => {
                debug!(epoch = ticket.epoch, "Request admitted");
            }
            Admission::Queued => debug!("Request queued until login completes"),
            Admission::Rejected { error, .. } => debug!(%error, "Request rejected"),
        }
        admission
    }

    /// Interprets a response to a request sent under `ticket`
    pub fn on_response(
        &self,
        request: R,
        ticket: &SessionTicket,
        response: &ResponseView<'_>,
    ) -> Decision<R> {
        if !self.detector.is_session_lost(response) {
            self.lock().confirm(ticket.epoch);
            return Decision::PassThrough(request);
        }

        let page = LoginPage {
            url: response.url.clone(),
            body: response.body.to_string(),
        };

        let (before, decision, after) = {
            let mut state = self.lock();
            let before = state.status();
            let decision = state.session_lost(request, ticket.epoch, page);
            (before, decision, state.status())
        };

        match &decision {
            Decision::RetryAfterLogin { start_login: true } => {
                info!(url = %response.url, "Session lost, starting login");
            }
            Decision::RetryAfterLogin { start_login: false } => {
                debug!(url = %response.url, "Session lost, waiting on login in progress");
            }
            Decision::Resend(_) => {
                debug!(
                    url = %response.url,
                    epoch = ticket.epoch,
                    "Response predates the current session, resending"
                );
            }
            Decision::Rejected { error, .. } if before != after => {
                error!(%error, "Logins never produced a usable session, giving up");
            }
            Decision::Rejected { .. } | Decision::PassThrough(_) => {}
        }

        decision
    }

    /// Merges cookies an ordinary page set under the current session
    pub fn absorb_cookies(&self, ticket: &SessionTicket, cookies: &[(String, String)]) {
        self.lock().absorb_cookies(ticket.epoch, cookies);
    }

    /// Runs one login attempt
    pub async fn login(&self, solver: &dyn LoginSolver) -> LoginOutcome<R> {
        let (attempt, request) = {
            let mut state = self.lock();
            let Some(attempt) = state.begin_attempt() else {
                return LoginOutcome::NotAuthenticating;
            };
            let request = LoginRequest {
                login_url: self.detector.login_url().clone(),
                credentials: state.credentials().clone(),
                page: state.last_login_page().cloned(),
                cookies: state.cookies().clone(),
            };
            (attempt, request)
        };

        info!(attempt, solver = solver.name(), "Logging in");

        let reason = match solver.solve(&request).await {
            Ok(LoginReply {
                success: true,
                cookies,
                ..
            }) if !cookies.is_empty() => {
                let count = cookies.len();
                let (epoch, replay) = {
                    let mut state = self.lock();
                    let Some(replay) = state.record_success(cookies) else {
                        return LoginOutcome::NotAuthenticating;
                    };
                    (state.epoch(), replay)
                };
                info!(attempt, epoch, cookies = count, "Login succeeded");
                return LoginOutcome::Succeeded { epoch, replay };
            }
            Ok(reply) => reply
                .error
                .unwrap_or_else(|| "solver returned no cookies".to_string()),
            Err(e) => e.to_string(),
        };

        warn!(attempt, %reason, "Login attempt failed");

        let step = self.lock().record_failure();
        match step {
            FailureStep::Retry { attempt } => LoginOutcome::Failed {
                error: AuthError::LoginAttemptFailed { attempt, reason },
            },
            FailureStep::Exhausted { failed, error } => LoginOutcome::Exhausted { failed, error },
            FailureStep::Abandoned => LoginOutcome::NotAuthenticating,
        }
    }

    /// Logs in, retrying until success or until attempts run out
    ///
    /// Only the caller that received `start_login == true` should call this.
    /// Attempts are spaced by `download-delay-during-auth`.
    pub async fn authenticate(&self, solver: &dyn LoginSolver) -> AuthResolution<R> {
        loop {
            match self.login(solver).await {
                LoginOutcome::Succeeded { epoch, replay } => {
                    info!(epoch, replaying = replay.len(), "Session restored");
                    return AuthResolution::Authenticated { epoch, replay };
                }
                LoginOutcome::Failed { .. } => {
                    if !self.auth_delay.is_zero() {
                        tokio::time::sleep(self.auth_delay).await;
                    }
                }
                LoginOutcome::Exhausted { failed, error } => {
                    error!(%error, failed = failed.len(), "Giving up on login");
                    return AuthResolution::Exhausted { failed, error };
                }
                LoginOutcome::NotAuthenticating => return AuthResolution::Cancelled,
            }
        }
    }

    /// Cancels everything waiting on login and returns it
    pub fn abort(&self) -> Vec<R> {
        let cancelled = self.lock().abort();
        if !cancelled.is_empty() {
            info!(cancelled = cancelled.len(), "Cancelled requests waiting on login");
        }
        cancelled
    }
}
