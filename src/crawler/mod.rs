//! Crawler module for web page fetching and processing
//!
//! This module contains the crawl harness around the session gate:
//! - HTTP fetching with session cookies attached
//! - HTML parsing and link extraction
//! - Frontier scheduling and pacing
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;

pub use coordinator::{run_crawl, CrawlCoordinator};
pub use fetcher::{build_http_client, fetch_url, FetchResult};
pub use parser::{parse_html, ParsedPage};
pub use scheduler::{CrawlRequest, EnqueueOutcome, Scheduler};

use crate::auth::{HttpLoginSolver, LoginSolver, NullSolver};
use crate::config::Config;
use crate::output::CrawlReport;
use crate::Result;
use std::sync::Arc;

/// Picks the login solver for a configuration
///
/// Uses the HTTP solver service when `solver-url` is set, otherwise a solver
/// that fails every login.
pub fn solver_for(config: &Config) -> Result<Arc<dyn LoginSolver>> {
    match config.autologin.solver_url.as_deref() {
        Some(url) if config.autologin.enabled => {
            let solver = HttpLoginSolver::new(url)
                .map_err(|e| crate::ConfigError::InvalidUrl(format!("solver-url: {}", e)))?;
            Ok(Arc::new(solver))
        }
        _ => Ok(Arc::new(NullSolver)),
    }
}

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP client and the session gate
/// 2. Pick the login solver from the configuration
/// 3. Schedule and fetch pages, logging in whenever the session is lost
/// 4. Extract and follow links that do not end the session
/// 5. Return the crawl report
pub async fn crawl(config: Config) -> Result<CrawlReport> {
    let solver = solver_for(&config)?;
    run_crawl(config, solver).await
}
