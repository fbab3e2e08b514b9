use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use url::Url;

/// Main configuration structure for Autologin-Crawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub autologin: AutologinConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Page the crawl starts from
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// Maximum link depth to follow from the start page
    #[serde(rename = "max-depth")]
    pub max_depth: u32,

    /// Maximum number of page fetches in flight at once
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Delay between two dispatched requests (milliseconds)
    #[serde(rename = "download-delay", default)]
    pub download_delay: u64,

    /// Stop dispatching new pages after this many
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<u32>,

    /// Only follow links on the start page's host
    #[serde(rename = "same-site-only", default = "default_true")]
    pub same_site_only: bool,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the header value: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Session keeping and logout avoidance
#[derive(Clone, Deserialize)]
pub struct AutologinConfig {
    /// Kill switch: when false the gate and the logout classifier are no-ops
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Login page, absolute or relative to the start URL
    #[serde(rename = "login-url")]
    pub login_url: String,

    /// Substring of a query string that the operator knows marks a logout link
    #[serde(rename = "logout-url-marker", default)]
    pub logout_url_marker: Option<String>,

    pub username: String,

    pub password: String,

    /// Consecutive failed logins before the session is given up
    #[serde(rename = "max-login-attempts", default = "default_max_login_attempts")]
    pub max_login_attempts: u32,

    /// Bound on requests held while a login is in progress (unbounded if unset)
    #[serde(rename = "pending-queue-capacity", default)]
    pub pending_queue_capacity: Option<usize>,

    /// Pause between login attempts and dispatch spacing while one runs (milliseconds)
    #[serde(rename = "download-delay-during-auth", default)]
    pub download_delay_during_auth: Option<u64>,

    /// Body fragment that identifies a login form, e.g. `type="password"`
    #[serde(rename = "login-form-signature", default)]
    pub login_form_signature: Option<String>,

    /// Base URL of the external login-solving service
    #[serde(rename = "solver-url", default)]
    pub solver_url: Option<String>,
}

impl AutologinConfig {
    /// Resolves `login_url` against the crawl's start URL
    pub fn resolve_login_url(&self, base: &Url) -> Result<Url, url::ParseError> {
        base.join(&self.login_url)
    }

    /// Delay applied between login attempts and to dispatches during a login
    pub fn auth_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_during_auth.unwrap_or(0))
    }
}

impl Default for AutologinConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            login_url: "/login".to_string(),
            logout_url_marker: None,
            username: String::new(),
            password: String::new(),
            max_login_attempts: default_max_login_attempts(),
            pending_queue_capacity: None,
            download_delay_during_auth: None,
            login_form_signature: None,
            solver_url: None,
        }
    }
}

impl fmt::Debug for AutologinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutologinConfig")
            .field("enabled", &self.enabled)
            .field("login_url", &self.login_url)
            .field("logout_url_marker", &self.logout_url_marker)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("max_login_attempts", &self.max_login_attempts)
            .field("pending_queue_capacity", &self.pending_queue_capacity)
            .field("download_delay_during_auth", &self.download_delay_during_auth)
            .field("login_form_signature", &self.login_form_signature)
            .field("solver_url", &self.solver_url)
            .finish()
    }
}

fn default_true() -> bool {
    true
}

fn default_max_login_attempts() -> u32 {
    3
}
