//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent
//! - Attaching the session cookies of the request's ticket and collecting
//!   the cookies every response sets, including redirects and errors
//! - Surfacing redirects instead of following them, so login redirects stay
//!   visible to the session gate
//! - Error classification

use crate::auth::{ResponseView, SessionCookies};
use crate::config::UserAgentConfig;
use crate::state::PageState;
use reqwest::cookie::Cookie;
use reqwest::header::{COOKIE, LOCATION};
use reqwest::{redirect::Policy, Client, Response, StatusCode};
use std::time::{Duration, SystemTime};
use url::Url;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Fetched an HTML page
    Page {
        /// URL the page was served from
        final_url: Url,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value
        content_type: String,
        /// Page body content
        body: String,
        /// Cookie updates the page sent; an empty value deletes the cookie
        set_cookies: Vec<(String, String)>,
    },

    /// The server answered with a redirect
    Redirect {
        /// The HTTP status code
        status_code: u16,
        /// Raw `Location` header value
        location: Option<String>,
        set_cookies: Vec<(String, String)>,
    },

    /// Page is not HTML (Content-Type mismatch)
    ContentMismatch {
        /// The actual Content-Type received
        content_type: String,
        set_cookies: Vec<(String, String)>,
    },

    /// HTTP error that maps to a specific page state
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// The page state this error maps to
        state: PageState,
        /// Response body, kept so a login form served with an error status is still seen
        body: String,
        set_cookies: Vec<(String, String)>,
    },

    /// Network error (connection refused, timeout, etc.)
    NetworkError {
        /// Error description
        error: String,
        /// The page state this error maps to
        state: PageState,
    },
}

impl FetchResult {
    /// Cookie updates carried by the response, in header order
    pub fn set_cookies(&self) -> &[(String, String)] {
        match self {
            Self::Page { set_cookies, .. }
            | Self::Redirect { set_cookies, .. }
            | Self::ContentMismatch { set_cookies, .. }
            | Self::HttpError { set_cookies, .. } => set_cookies,
            Self::NetworkError { .. } => &[],
        }
    }

    /// The view of this result the session-loss detector works on
    ///
    /// None for network errors, which say nothing about the session.
    pub fn response_view<'a>(&'a self, url: &'a Url) -> Option<ResponseView<'a>> {
        match self {
            Self::Page {
                final_url,
                status_code,
                body,
                ..
            } => Some(ResponseView {
                url: final_url,
                status: *status_code,
                location: None,
                body,
            }),
            Self::Redirect {
                status_code,
                location,
                ..
            } => Some(ResponseView {
                url,
                status: *status_code,
                location: location.as_deref(),
                body: "",
            }),
            Self::ContentMismatch { .. } => Some(ResponseView {
                url,
                status: 200,
                location: None,
                body: "",
            }),
            Self::HttpError {
                status_code, body, ..
            } => Some(ResponseView {
                url,
                status: *status_code,
                location: None,
                body,
            }),
            Self::NetworkError { .. } => None,
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are never followed: a redirect to the login page is the main
/// signal that the session was lost.
///
/// # Example
///
/// ```no_run
/// use autologin_crawl::config::UserAgentConfig;
/// use autologin_crawl::crawler::build_http_client;
///
/// let config = UserAgentConfig {
///     crawler_name: "AutologinCrawler".to_string(),
///     crawler_version: "0.1".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "ops@example.com".to_string(),
/// };
///
/// let client = build_http_client(&config).unwrap();
/// ```
pub fn build_http_client(config: &UserAgentConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.header_value())
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a URL with the given session cookies
///
/// # Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | HTTP 3xx | Redirect |
/// | HTTP 404 / 410 | HttpError → DeadLink |
/// | Other non-2xx | HttpError → Failed |
/// | 2xx, not HTML | ContentMismatch |
/// | 2xx HTML | Page |
/// | Timeout / connection refused | NetworkError → Unreachable |
/// | Body read error | NetworkError → Failed |
pub async fn fetch_url(client: &Client, url: &Url, cookies: &SessionCookies) -> FetchResult {
    let mut request = client.get(url.clone());
    if let Some(header) = cookies.header_for(url) {
        request = request.header(COOKIE, header);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(e) => return classify_network_error(&e),
    };

    let status = response.status();
    let final_url = response.url().clone();
    let set_cookies = cookie_updates(&response);

    if status.is_redirection() {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        return FetchResult::Redirect {
            status_code: status.as_u16(),
            location,
            set_cookies,
        };
    }

    if !status.is_success() {
        let state = if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            PageState::DeadLink
        } else {
            PageState::Failed
        };
        let body = response.text().await.unwrap_or_default();
        return FetchResult::HttpError {
            status_code: status.as_u16(),
            state,
            body,
            set_cookies,
        };
    }

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !content_type.contains("text/html") {
        return FetchResult::ContentMismatch {
            content_type,
            set_cookies,
        };
    }

    match response.text().await {
        Ok(body) => FetchResult::Page {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
            set_cookies,
        },
        Err(e) => FetchResult::NetworkError {
            error: e.to_string(),
            state: PageState::Failed,
        },
    }
}

fn classify_network_error(e: &reqwest::Error) -> FetchResult {
    if e.is_timeout() {
        FetchResult::NetworkError {
            error: "Request timeout".to_string(),
            state: PageState::Unreachable,
        }
    } else if e.is_connect() {
        FetchResult::NetworkError {
            error: "Connection refused".to_string(),
            state: PageState::Unreachable,
        }
    } else {
        FetchResult::NetworkError {
            error: e.to_string(),
            state: PageState::Failed,
        }
    }
}

/// Reads the response's `Set-Cookie` headers as session updates
///
/// Expired cookies come back with an empty value, which removes them from
/// the session when merged.
fn cookie_updates(response: &Response) -> Vec<(String, String)> {
    let now = SystemTime::now();
    response
        .cookies()
        .map(|cookie| cookie_update(&cookie, now))
        .collect()
}

fn cookie_update(cookie: &Cookie<'_>, now: SystemTime) -> (String, String) {
    let value = if is_expired(cookie.max_age(), cookie.expires(), now) {
        String::new()
    } else {
        cookie.value().to_string()
    };
    (cookie.name().to_string(), value)
}

/// `Max-Age` wins over `Expires` when both are present
fn is_expired(max_age: Option<Duration>, expires: Option<SystemTime>, now: SystemTime) -> bool {
    match (max_age, expires) {
        (Some(max_age), _) => max_age.is_zero(),
        (None, Some(expires)) => expires <= now,
        (None, None) => false,
    }
}
