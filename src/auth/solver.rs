//! Login solver interface and the HTTP client for an external solver service
//!
//! The crawl never fills in login forms itself. It hands the login page,
//! credentials and current cookies to a [`LoginSolver`] and gets back either
//! the cookies of a fresh session or a reason for failure.

use crate::auth::session::{Credentials, LoginPage, SessionCookies};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Failure to reach or understand the solver; counts as a failed attempt
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("login solver request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("login solver answered HTTP {status}")]
    Status { status: u16 },

    #[error("invalid login solver URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Everything a solver gets for one attempt
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub login_url: Url,
    pub credentials: Credentials,
    /// Most recent page that revealed the session loss, if any
    pub page: Option<LoginPage>,
    pub cookies: SessionCookies,
}

/// What the solver came back with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReply {
    pub success: bool,
    pub cookies: Vec<(String, String)>,
    pub error: Option<String>,
}

impl LoginReply {
    pub fn solved(cookies: Vec<(String, String)>) -> Self {
        Self {
            success: true,
            cookies,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            cookies: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Obtains session cookies for a login page
#[async_trait]
pub trait LoginSolver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn solve(&self, request: &LoginRequest) -> Result<LoginReply, SolverError>;
}

/// Solver used when no service is configured: every attempt fails
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSolver;

#[async_trait]
impl LoginSolver for NullSolver {
    fn name(&self) -> &'static str {
        "none"
    }

    async fn solve(&self, _request: &LoginRequest) -> Result<LoginReply, SolverError> {
        Ok(LoginReply::failed("no login solver configured"))
    }
}

#[derive(Debug, Serialize)]
struct SolveBody<'a> {
    url: &'a str,
    username: &'a str,
    password: &'a str,
    cookies: Vec<WireCookie>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireCookie {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct SolveResponse {
    status: String,
    #[serde(default)]
    cookies: Vec<WireCookie>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for an autologin-style HTTP service
///
/// Sends `POST {base}/login-cookies` with `{url, username, password, cookies}`
/// and expects `{status, cookies: [{name, value}], error}`. Only a
/// `"solved"` status carrying at least one cookie counts as success.
pub struct HttpLoginSolver {
    client: Client,
    endpoint: Url,
}

impl HttpLoginSolver {
    pub fn new(base_url: &str) -> Result<Self, SolverError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, SolverError> {
        let base = Url::parse(base_url)?;
        let endpoint = if base.path().ends_with('/') {
            base.join("login-cookies")?
        } else {
            Url::parse(&format!("{}/", base))?.join("login-cookies")?
        };
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl std::fmt::Debug for HttpLoginSolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpLoginSolver")
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LoginSolver for HttpLoginSolver {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn solve(&self, request: &LoginRequest) -> Result<LoginReply, SolverError> {
        let body = SolveBody {
            url: request.login_url.as_str(),
            username: request.credentials.username(),
            password: request.credentials.password(),
            cookies: request
                .cookies
                .iter()
                .map(|(name, value)| WireCookie {
                    name: name.to_string(),
                    value: value.to_string(),
                })
                .collect(),
        };

        debug!(endpoint = %self.endpoint, login_url = %request.login_url, "Asking login solver");

        let response = self.client.post(self.endpoint.clone()).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SolverError::Status {
                status: status.as_u16(),
            });
        }

        let reply: SolveResponse = response.json().await?;
        if reply.status == "solved" && !reply.cookies.is_empty() {
            Ok(LoginReply::solved(
                reply
                    .cookies
                    .into_iter()
                    .map(|cookie| (cookie.name, cookie.value))
                    .collect(),
            ))
        } else {
            Ok(LoginReply::failed(reply.error.unwrap_or_else(|| {
                format!("solver returned status '{}'", reply.status)
            })))
        }
    }
}
