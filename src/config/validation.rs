use crate::config::types::{AutologinConfig, Config, CrawlerConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_autologin_config(&config.autologin)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let start = Url::parse(&config.start_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start_url: {}", e)))?;

    if start.scheme() != "http" && start.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "start_url must use http or https, got '{}'",
            start.scheme()
        )));
    }

    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "max_pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // Crawler name: non-empty, alphanumeric + hyphens only
    if config.crawler_name.is_empty() {
        return Err(ConfigError::Validation(
            "crawler_name cannot be empty".to_string(),
        ));
    }

    if !config
        .crawler_name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "crawler_name must contain only alphanumeric characters and hyphens, got '{}'",
            config.crawler_name
        )));
    }

    Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid contact_url: {}", e)))?;

    validate_email(&config.contact_email)?;

    Ok(())
}

/// Validates the autologin section
///
/// A disabled section is accepted as-is; nothing in it is ever read.
fn validate_autologin_config(config: &AutologinConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.login_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "login_url cannot be empty".to_string(),
        ));
    }

    // Relative login URLs are resolved against the start URL later
    Url::parse("http://placeholder.invalid/")
        .and_then(|base| base.join(&config.login_url))
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid login_url: {}", e)))?;

    if config.username.is_empty() {
        return Err(ConfigError::Validation(
            "username cannot be empty when autologin is enabled".to_string(),
        ));
    }

    if config.max_login_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max_login_attempts must be >= 1, got {}",
            config.max_login_attempts
        )));
    }

    if config.pending_queue_capacity == Some(0) {
        return Err(ConfigError::Validation(
            "pending_queue_capacity must be >= 1 when set".to_string(),
        ));
    }

    if let Some(marker) = &config.logout_url_marker {
        if marker.is_empty() {
            return Err(ConfigError::Validation(
                "logout_url_marker cannot be empty when set".to_string(),
            ));
        }
    }

    if let Some(signature) = &config.login_form_signature {
        if signature.is_empty() {
            return Err(ConfigError::Validation(
                "login_form_signature cannot be empty when set".to_string(),
            ));
        }
    }

    if let Some(solver_url) = &config.solver_url {
        Url::parse(solver_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid solver_url: {}", e)))?;
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    if email.is_empty() {
        return Err(ConfigError::Validation(
            "contact_email cannot be empty".to_string(),
        ));
    }

    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    let local = parts[0];
    let domain = parts[1];

    if local.is_empty() || domain.is_empty() {
        return Err(ConfigError::Validation(format!(
            "Invalid email format: '{}'",
            email
        )));
    }

    if !domain.contains('.') {
        return Err(ConfigError::Validation(format!(
            "Invalid email domain: '{}'",
            email
        )));
    }

    Ok(())
}
