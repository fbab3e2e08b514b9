//! Autologin-Crawl: an authentication-aware crawl gate
//!
//! This crate keeps a crawl session logged in across many concurrent page
//! fetches, re-authenticates through an external login solver when the site
//! drops the session, and keeps the crawler away from links that would log
//! it out.

pub mod auth;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Autologin-Crawl operations
#[derive(Debug, Error)]
pub enum AutologinError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Crawl task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Session/authentication errors surfaced to queued and rejected requests
///
/// A detected session loss is not an error; it is reported as
/// [`auth::Decision::RetryAfterLogin`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Login attempt {attempt} failed: {reason}")]
    LoginAttemptFailed { attempt: u32, reason: String },

    #[error("Authentication exhausted after {attempts} login attempts")]
    AuthenticationExhausted { attempts: u32 },

    #[error("Pending queue is full ({capacity} requests waiting on login)")]
    QueueCapacityExceeded { capacity: usize },

    #[error("Crawl aborted while request was waiting on login")]
    Cancelled,
}

/// Result type alias for Autologin-Crawl operations
pub type Result<T> = std::result::Result<T, AutologinError>;

// Re-export commonly used types
pub use auth::{looks_like_logout, AuthenticationCoordinator, LinkCandidate, RequestGate};
pub use config::Config;
pub use state::{AuthStatus, PageState};
pub use url::{extract_domain, normalize_url};
