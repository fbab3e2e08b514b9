//! Per-crawl session record
//!
//! [`SessionState`] is the only state that outlives a single request/response
//! exchange. It is owned by the [`AuthenticationCoordinator`], which wraps it
//! in a mutex; every method here is a synchronous transition of the table
//! below and never performs I/O.
//!
//! | State | Event | Next |
//! |-------|-------|------|
//! | Unknown / Authenticated | request admitted | unchanged, send |
//! | Unknown / Authenticated | session loss | Authenticating, request queued |
//! | Authenticating | request admitted | unchanged, queued or rejected when full |
//! | Authenticating | login success | Authenticated, queue drained in order |
//! | Authenticating | login failure below max | unchanged, retry |
//! | Authenticating | login failure at max | Failed, queue resolved as failed |
//! | Failed | anything | rejected |
//!
//! [`AuthenticationCoordinator`]: crate::auth::AuthenticationCoordinator

use crate::state::AuthStatus;
use crate::AuthError;
use chrono::{DateTime, Utc};
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::HeaderValue;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use url::Url;

/// Username/password pair supplied at configuration time
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Read-only view of the session cookies
///
/// Cloning is cheap; a merge produces a new map so views handed out earlier
/// keep showing the cookies they were taken with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCookies(Arc<BTreeMap<String, String>>);

impl SessionCookies {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The `Cookie` request header these cookies produce for `url`
    ///
    /// The cookies are scoped to the host of `url`, as if it had set them.
    pub fn header_for(&self, url: &Url) -> Option<HeaderValue> {
        if self.0.is_empty() {
            return None;
        }
        let jar = Jar::default();
        for (name, value) in self.0.iter() {
            jar.add_cookie_str(&format!("{}={}; Path=/", name, value), url);
        }
        jar.cookies(url)
    }

    /// Returns a copy with `updates` applied; an empty value deletes the cookie
    pub fn merged<I, K, V>(&self, updates: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = (*self.0).clone();
        for (name, value) in updates {
            let (name, value) = (name.into(), value.into());
            if value.is_empty() {
                map.remove(&name);
            } else {
                map.insert(name, value);
            }
        }
        Self(Arc::new(map))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SessionCookies {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        SessionCookies::default().merged(iter)
    }
}

/// Stamped on every request the gate lets through
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTicket {
    /// Session generation the request was sent under
    pub epoch: u64,

    /// Cookies to attach to the request
    pub cookies: SessionCookies,
}

/// Page that revealed the session loss; handed to the login solver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginPage {
    pub url: Url,
    pub body: String,
}

/// Outcome of admitting a request through the gate
#[derive(Debug)]
pub enum Admission<R> {
    /// Send now, with the given session
    Send { request: R, ticket: SessionTicket },

    /// Held until the login in progress completes
    Queued,

    /// Refused without being sent
    Rejected { request: R, error: AuthError },
}

/// What to do with a received response
#[derive(Debug)]
pub enum Decision<R> {
    /// The session is fine; hand the response on
    PassThrough(R),

    /// The session is lost; the request is now queued for replay after login.
    /// Only the caller that sees `start_login == true` runs the login.
    RetryAfterLogin { start_login: bool },

    /// The response was produced by cookies a later login already replaced;
    /// send the request again with the current session
    Resend(R),

    /// The session is lost and will not be recovered
    Rejected { request: R, error: AuthError },
}

/// Result of recording a failed login attempt
#[derive(Debug)]
pub enum FailureStep<R> {
    /// Attempts remain; try again
    Retry { attempt: u32 },

    /// Attempts are exhausted; every queued request fails with `error`
    Exhausted { failed: Vec<R>, error: AuthError },

    /// The login was abandoned while the attempt ran
    Abandoned,
}

/// Point-in-time copy of the session for reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: AuthStatus,
    pub epoch: u64,
    pub attempts: u32,
    pub total_attempts: u32,
    pub successful_logins: u32,
    pub pending: usize,
    pub cookie_count: usize,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Mutable per-crawl session record
#[derive(Debug)]
pub struct SessionState<R> {
    status: AuthStatus,
    pending: VecDeque<R>,
    capacity: Option<usize>,
    attempts: u32,
    max_attempts: u32,
    credentials: Credentials,
    cookies: SessionCookies,
    epoch: u64,
    last_login_page: Option<LoginPage>,
    last_login_at: Option<DateTime<Utc>>,
    failure: Option<AuthError>,
    total_attempts: u32,
    successful_logins: u32,
    // Logins whose cookies have not yet produced a single authenticated page
    unconfirmed_logins: u32,
}

impl<R> SessionState<R> {
    pub fn new(credentials: Credentials, max_attempts: u32, capacity: Option<usize>) -> Self {
        Self {
            status: AuthStatus::Unknown,
            pending: VecDeque::new(),
            capacity,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            credentials,
            cookies: SessionCookies::default(),
            epoch: 0,
            last_login_page: None,
            last_login_at: None,
            failure: None,
            total_attempts: 0,
            successful_logins: 0,
            unconfirmed_logins: 0,
        }
    }

    pub fn status(&self) -> AuthStatus {
        self.status
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn cookies(&self) -> &SessionCookies {
        &self.cookies
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn last_login_page(&self) -> Option<&LoginPage> {
        self.last_login_page.as_ref()
    }

    pub fn ticket(&self) -> SessionTicket {
        SessionTicket {
            epoch: self.epoch,
            cookies: self.cookies.clone(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            epoch: self.epoch,
            attempts: self.attempts,
            total_attempts: self.total_attempts,
            successful_logins: self.successful_logins,
            pending: self.pending.len(),
            cookie_count: self.cookies.len(),
            last_login_at: self.last_login_at,
        }
    }

    /// "Request admitted" rows of the transition table
    pub fn admit(&mut self, request: R) -> Admission<R> {
        if self.status.sends_directly() {
            return Admission::Send {
                request,
                ticket: self.ticket(),
            };
        }
        if self.status.is_terminal() {
            return Admission::Rejected {
                request,
                error: self.failure_error(),
            };
        }
        match self.enqueue(request) {
            Ok(()) => Admission::Queued,
            Err((request, error)) => Admission::Rejected { request, error },
        }
    }

    /// A response arrived that did not indicate a lost session
    pub fn confirm(&mut self, ticket_epoch: u64) {
        if self.status == AuthStatus::Authenticated && ticket_epoch == self.epoch {
            self.unconfirmed_logins = 0;
        }
    }

    /// "Response indicates unauthenticated" rows of the transition table
    pub fn session_lost(&mut self, request: R, ticket_epoch: u64, page: LoginPage) -> Decision<R> {
        if self.status.is_terminal() {
            return Decision::Rejected {
                request,
                error: self.failure_error(),
            };
        }

        if !self.status.can_start_login() {
            return match self.enqueue(request) {
                Ok(()) => Decision::RetryAfterLogin { start_login: false },
                Err((request, error)) => Decision::Rejected { request, error },
            };
        }

        if ticket_epoch < self.epoch {
            return Decision::Resend(request);
        }

        if self.unconfirmed_logins >= self.max_attempts {
            // Fresh cookies keep bouncing back to the login page
            let error = AuthError::AuthenticationExhausted {
                attempts: self.unconfirmed_logins,
            };
            self.status = AuthStatus::Failed;
            self.failure = Some(error.clone());
            return Decision::Rejected { request, error };
        }

        self.status = AuthStatus::Authenticating;
        self.attempts = 0;
        self.last_login_page = Some(page);
        self.pending.push_back(request);
        Decision::RetryAfterLogin { start_login: true }
    }

    /// Counts a login attempt; returns its 1-based number
    ///
    /// None unless the session is Authenticating.
    pub fn begin_attempt(&mut self) -> Option<u32> {
        if self.status != AuthStatus::Authenticating {
            return None;
        }
        self.attempts += 1;
        self.total_attempts += 1;
        Some(self.attempts)
    }

    /// Merges the solver's cookies, marks the session Authenticated and
    /// takes the queue for replay in the same transition
    ///
    /// Returns None, changing nothing, if the session left Authenticating
    /// while the solver was running (the crawl was aborted).
    pub fn record_success<I, K, V>(&mut self, cookies: I) -> Option<Vec<R>>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        if self.status != AuthStatus::Authenticating {
            return None;
        }
        self.cookies = self.cookies.merged(cookies);
        self.epoch += 1;
        self.attempts = 0;
        self.successful_logins += 1;
        self.unconfirmed_logins += 1;
        self.last_login_at = Some(Utc::now());
        self.status = AuthStatus::Authenticated;
        Some(self.drain_queue())
    }

    /// Records a failed attempt and decides between retry and give-up
    pub fn record_failure(&mut self) -> FailureStep<R> {
        if self.status != AuthStatus::Authenticating {
            return FailureStep::Abandoned;
        }

        if self.attempts < self.max_attempts {
            return FailureStep::Retry {
                attempt: self.attempts,
            };
        }

        let error = AuthError::AuthenticationExhausted {
            attempts: self.attempts,
        };
        self.status = AuthStatus::Failed;
        self.failure = Some(error.clone());
        FailureStep::Exhausted {
            failed: self.pending.drain(..).collect(),
            error,
        }
    }

    /// Takes every queued request in arrival order, once Authenticated
    pub fn drain_queue(&mut self) -> Vec<R> {
        if self.status != AuthStatus::Authenticated {
            return Vec::new();
        }
        self.pending.drain(..).collect()
    }

    /// Merges cookies set by ordinary pages fetched under the current session
    pub fn absorb_cookies(&mut self, ticket_epoch: u64, cookies: &[(String, String)]) {
        if cookies.is_empty() || ticket_epoch != self.epoch || self.status.is_terminal() {
            return;
        }
        self.cookies = self
            .cookies
            .merged(cookies.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Resolves every queued request as cancelled
    ///
    /// A login in progress is abandoned and the session marked Failed.
    pub fn abort(&mut self) -> Vec<R> {
        if self.status == AuthStatus::Authenticating {
            self.status = AuthStatus::Failed;
            self.failure = Some(AuthError::Cancelled);
        }
        self.pending.drain(..).collect()
    }

    fn enqueue(&mut self, request: R) -> Result<(), (R, AuthError)> {
        if let Some(capacity) = self.capacity {
            if self.pending.len() >= capacity {
                return Err((request, AuthError::QueueCapacityExceeded { capacity }));
            }
        }
        self.pending.push_back(request);
        Ok(())
    }

    fn failure_error(&self) -> AuthError {
        self.failure
            .clone()
            .unwrap_or(AuthError::AuthenticationExhausted {
                attempts: self.attempts,
            })
    }
}
