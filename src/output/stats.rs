//! Crawl report
//!
//! Collects per-page outcomes while the crawl runs and renders them for the
//! terminal once it is done.

use crate::auth::SessionSnapshot;
use crate::state::PageState;
use crate::AuthError;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use url::Url;

/// What happened to one page
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub url: Url,
    pub state: PageState,
    pub depth: u32,
    pub status_code: Option<u16>,
    pub title: Option<String>,
    pub error: Option<String>,
}

/// Everything the crawl learned, in the order it learned it
#[derive(Debug, Clone)]
pub struct CrawlReport {
    pages: HashMap<String, PageRecord>,

    /// Page URLs in first-visit order
    visited: Vec<Url>,

    /// Links refused by the session gate
    skipped_links: Vec<Url>,

    /// Requests resolved with an authentication error
    auth_failures: usize,

    /// Session state at the end of the crawl; None with autologin disabled
    pub session: Option<SessionSnapshot>,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for CrawlReport {
    fn default() -> Self {
        Self::new()
    }
}

impl CrawlReport {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            visited: Vec::new(),
            skipped_links: Vec::new(),
            auth_failures: 0,
            session: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    fn record(&mut self, url: &Url, depth: u32) -> &mut PageRecord {
        self.pages
            .entry(url.as_str().to_string())
            .or_insert_with(|| PageRecord {
                url: url.clone(),
                state: PageState::Queued,
                depth,
                status_code: None,
                title: None,
                error: None,
            })
    }

    /// Moves a page to an intermediate or terminal state
    pub fn set_state(&mut self, url: &Url, depth: u32, state: PageState) {
        self.record(url, depth).state = state;
    }

    /// Records a page fetched while the session was valid
    pub fn record_visit(&mut self, url: &Url, depth: u32, status_code: u16, title: Option<String>) {
        let record = self.record(url, depth);
        let first_visit = record.state != PageState::Visited;
        record.state = PageState::Visited;
        record.status_code = Some(status_code);
        record.title = title;
        record.error = None;
        if first_visit {
            self.visited.push(url.clone());
        }
    }

    /// Records a page that ended in an error state
    pub fn record_failure(
        &mut self,
        url: &Url,
        depth: u32,
        state: PageState,
        status_code: Option<u16>,
        error: impl Into<String>,
    ) {
        let record = self.record(url, depth);
        record.state = state;
        record.status_code = status_code;
        record.error = Some(error.into());
    }

    /// Records a page whose request was resolved by the session layer with an error
    pub fn record_auth_failure(&mut self, url: &Url, depth: u32, error: &AuthError) {
        self.auth_failures += 1;
        self.record_failure(url, depth, PageState::AuthFailed, None, error.to_string());
    }

    pub fn record_skipped_link(&mut self, url: &Url) {
        if !self.skipped_links.contains(url) {
            self.skipped_links.push(url.clone());
        }
    }

    pub fn finish(&mut self, session: Option<SessionSnapshot>) {
        self.session = session;
        self.finished_at = Some(Utc::now());
    }

    pub fn page(&self, url: &Url) -> Option<&PageRecord> {
        self.pages.get(url.as_str())
    }

    pub fn pages(&self) -> impl Iterator<Item = &PageRecord> {
        self.pages.values()
    }

    pub fn visited(&self) -> &[Url] {
        &self.visited
    }

    /// Visited pages as `path[?query]`, in first-visit order
    pub fn visited_paths(&self) -> Vec<String> {
        self.visited
            .iter()
            .map(|url| match url.query() {
                Some(query) => format!("{}?{}", url.path(), query),
                None => url.path().to_string(),
            })
            .collect()
    }

    pub fn skipped_links(&self) -> &[Url] {
        &self.skipped_links
    }

    pub fn auth_failures(&self) -> usize {
        self.auth_failures
    }

    /// Count of pages per final state
    pub fn pages_by_state(&self) -> HashMap<PageState, usize> {
        let mut counts = HashMap::new();
        for record in self.pages.values() {
            *counts.entry(record.state).or_insert(0) += 1;
        }
        counts
    }
}

/// Renders the report as JSON for machine consumption
pub fn report_json(report: &CrawlReport) -> Value {
    let mut pages: Vec<&PageRecord> = report.pages.values().collect();
    pages.sort_by(|a, b| a.url.as_str().cmp(b.url.as_str()));

    let by_state: HashMap<&'static str, usize> = report
        .pages_by_state()
        .into_iter()
        .map(|(state, count)| (state.as_str(), count))
        .collect();

    json!({
        "started_at": report.started_at,
        "finished_at": report.finished_at,
        "visited": report.visited.iter().map(Url::as_str).collect::<Vec<_>>(),
        "skipped_links": report.skipped_links.iter().map(Url::as_str).collect::<Vec<_>>(),
        "auth_failures": report.auth_failures,
        "pages_by_state": by_state,
        "pages": pages
            .iter()
            .map(|page| json!({
                "url": page.url.as_str(),
                "state": page.state,
                "depth": page.depth,
                "status_code": page.status_code,
                "title": page.title,
                "error": page.error,
            }))
            .collect::<Vec<_>>(),
        "session": report.session,
    })
}

/// Prints the report to stdout in a formatted manner
pub fn print_report(report: &CrawlReport) {
    println!("=== Crawl Report ===\n");

    println!("Overview:");
    println!("  Started: {}", report.started_at.to_rfc3339());
    if let Some(finished) = report.finished_at {
        let seconds = (finished - report.started_at).num_milliseconds() as f64 / 1000.0;
        println!("  Finished: {} ({:.1}s)", finished.to_rfc3339(), seconds);
    }
    println!("  Pages tracked: {}", report.pages.len());
    println!("  Pages visited: {}", report.visited.len());
    println!("  Links skipped: {}", report.skipped_links.len());
    println!();

    println!("Pages by State:");
    let mut state_counts: Vec<_> = report.pages_by_state().into_iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
    for (state, count) in state_counts {
        println!("  {}: {}", state, count);
    }
    println!();

    println!("Visited ({}):", report.visited.len());
    for url in &report.visited {
        println!("  - {}", url);
    }
    println!();

    if !report.skipped_links.is_empty() {
        println!("Skipped Links ({}):", report.skipped_links.len());
        for url in &report.skipped_links {
            println!("  - {}", url);
        }
        println!();
    }

    match &report.session {
        Some(session) => {
            println!("Session:");
            println!("  Status: {}", session.status);
            println!("  Successful logins: {}", session.successful_logins);
            println!("  Login attempts: {}", session.total_attempts);
            println!("  Session cookies: {}", session.cookie_count);
            if let Some(at) = session.last_login_at {
                println!("  Last login: {}", at.to_rfc3339());
            }
            println!("  Requests failed by auth: {}", report.auth_failures);
        }
        None => println!("Session: autologin disabled"),
    }
}
