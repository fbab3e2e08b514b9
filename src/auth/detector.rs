//! Session-loss detection
//!
//! A response means the session is gone when the site sends us to its login
//! page or serves the login form in place of the page we asked for.

use crate::config::AutologinConfig;
use url::Url;

/// The parts of a response the detector looks at
#[derive(Debug, Clone, Copy)]
pub struct ResponseView<'a> {
    /// URL the response was served from
    pub url: &'a Url,

    /// HTTP status code
    pub status: u16,

    /// Raw `Location` header, if any
    pub location: Option<&'a str>,

    /// Response body, empty for redirects and non-HTML content
    pub body: &'a str,
}

/// Configuration-driven predicate for "this page is the login page"
#[derive(Debug, Clone)]
pub struct LoginDetector {
    login_url: Url,
    form_signature: Option<String>,
}

impl LoginDetector {
    pub fn new(login_url: Url, form_signature: Option<String>) -> Self {
        Self {
            login_url,
            form_signature: form_signature.filter(|s| !s.is_empty()),
        }
    }

    pub fn from_config(config: &AutologinConfig, base: &Url) -> Result<Self, url::ParseError> {
        Ok(Self::new(
            config.resolve_login_url(base)?,
            config.login_form_signature.clone(),
        ))
    }

    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    /// Returns true if `url` points at the login page
    ///
    /// Query, fragment and a trailing slash are ignored.
    pub fn is_login_url(&self, url: &Url) -> bool {
        url.host_str() == self.login_url.host_str()
            && url.port_or_known_default() == self.login_url.port_or_known_default()
            && trimmed_path(url) == trimmed_path(&self.login_url)
    }

    /// Returns true if the response indicates a lost or missing session
    ///
    /// Signals, in order: a 3xx whose `Location` resolves to the login page,
    /// a response served from the login page itself, a body carrying the
    /// configured login-form signature.
    pub fn is_session_lost(&self, response: &ResponseView<'_>) -> bool {
        if (300..400).contains(&response.status) {
            return response
                .location
                .and_then(|location| response.url.join(location).ok())
                .is_some_and(|target| self.is_login_url(&target));
        }

        if self.is_login_url(response.url) {
            return true;
        }

        self.form_signature
            .as_deref()
            .is_some_and(|signature| response.body.contains(signature))
    }
}

fn trimmed_path(url: &Url) -> &str {
    let path = url.path().trim_end_matches('/');
    if path.is_empty() {
        "/"
    } else {
        path
    }
}
