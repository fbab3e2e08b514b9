//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl loop that coordinates:
//! - Dispatching requests through the session gate
//! - Running fetches concurrently up to `max-concurrent-requests`
//! - Running the login when the gate asks for one, while other fetches go on
//! - Replaying requests released by a login ahead of new pages
//! - Extracting links and filtering out the ones that would end the session

use crate::auth::{
    Admission, AuthResolution, LinkCandidate, LoginSolver, RequestGate, ResponseDecision,
    SessionTicket,
};
use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult};
use crate::crawler::parser::parse_html;
use crate::crawler::scheduler::{CrawlRequest, EnqueueOutcome, Scheduler};
use crate::output::CrawlReport;
use crate::state::{AuthStatus, PageState};
use crate::{AuthError, Result};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use url::Url;

/// What a finished crawl task hands back to the loop
enum TaskOutput {
    Fetched {
        request: CrawlRequest,
        ticket: SessionTicket,
        result: FetchResult,
    },
    Login(AuthResolution<CrawlRequest>),
}

/// Main crawler coordinator structure
pub struct CrawlCoordinator {
    config: Arc<Config>,
    client: Client,
    gate: Arc<RequestGate<CrawlRequest>>,
    solver: Arc<dyn LoginSolver>,
    scheduler: Scheduler,
    report: CrawlReport,
    in_flight: usize,

    /// Dispatch spacing while a login is running
    auth_delay: Duration,
}

impl CrawlCoordinator {
    /// Creates a coordinator for the configured crawl
    ///
    /// `solver` performs logins whenever the session gate detects that the
    /// site dropped the session.
    pub fn new(config: Config, solver: Arc<dyn LoginSolver>) -> Result<Self> {
        let root = Url::parse(&config.crawler.start_url)?;
        let client = build_http_client(&config.user_agent)?;
        let gate = RequestGate::new(config.autologin.clone(), &root)?;
        let scheduler = Scheduler::new(config.crawler.clone(), root);
        let auth_delay = config.autologin.auth_delay();

        Ok(Self {
            config: Arc::new(config),
            client,
            gate: Arc::new(gate),
            solver,
            scheduler,
            report: CrawlReport::new(),
            in_flight: 0,
            auth_delay,
        })
    }

    pub fn gate(&self) -> &RequestGate<CrawlRequest> {
        &self.gate
    }

    /// Runs the crawl to completion and returns the report
    pub async fn run(mut self) -> Result<CrawlReport> {
        tracing::info!(
            "Starting crawl at {} (autologin {})",
            self.scheduler.root(),
            if self.gate.is_enabled() { "enabled" } else { "disabled" }
        );

        let mut tasks = JoinSet::new();
        let outcome = self.crawl_loop(&mut tasks).await;

        tasks.abort_all();
        for request in self.gate.abort() {
            self.report
                .record_auth_failure(&request.url, request.depth, &AuthError::Cancelled);
        }

        outcome?;

        self.report.finish(self.gate.snapshot());
        tracing::info!(
            "Crawl completed: {} pages visited, {} links skipped, session {}",
            self.report.visited().len(),
            self.report.skipped_links().len(),
            self.gate.status()
        );

        Ok(self.report)
    }

    async fn crawl_loop(&mut self, tasks: &mut JoinSet<TaskOutput>) -> Result<()> {
        let max_in_flight = self.config.crawler.max_concurrent_requests.max(1) as usize;

        loop {
            while self.in_flight < max_in_flight {
                let Some(request) = self.scheduler.next_request() else {
                    break;
                };
                self.dispatch(request, tasks).await;
            }

            let Some(joined) = tasks.join_next().await else {
                if self.scheduler.has_work() {
                    continue;
                }
                tracing::info!("Frontier is empty, crawl complete");
                return Ok(());
            };

            match joined? {
                TaskOutput::Fetched {
                    request,
                    ticket,
                    result,
                } => {
                    self.in_flight -= 1;
                    self.handle_response(request, ticket, result, tasks);
                }
                TaskOutput::Login(resolution) => self.handle_login(resolution),
            }
        }
    }

    /// Passes a request through the gate and starts its fetch if allowed
    async fn dispatch(&mut self, request: CrawlRequest, tasks: &mut JoinSet<TaskOutput>) {
        let url = request.url.clone();
        let depth = request.depth;

        // Requests reach the gate no faster than the auth delay while a login runs
        let authenticating = self.gate.status() == AuthStatus::Authenticating;
        if authenticating {
            self.scheduler.pace_at_least(self.auth_delay).await;
        }

        match self.gate.before_send(request) {
            Admission::Send { request, ticket } => {
                if !authenticating {
                    self.scheduler.pace().await;
                }
                tracing::debug!("Fetching {} (session epoch {})", request.url, ticket.epoch);
                self.report.set_state(&url, depth, PageState::Fetching);

                let client = self.client.clone();
                self.in_flight += 1;
                tasks.spawn(async move {
                    let result = fetch_url(&client, &request.url, &ticket.cookies).await;
                    TaskOutput::Fetched {
                        request,
                        ticket,
                        result,
                    }
                });
            }
            Admission::Queued => {
                tracing::debug!("Holding {} until login completes", url);
                self.report.set_state(&url, depth, PageState::WaitingOnLogin);
            }
            Admission::Rejected { request, error } => {
                tracing::debug!("Not fetching {}: {}", request.url, error);
                self.report.record_auth_failure(&request.url, request.depth, &error);
            }
        }
    }

    fn handle_response(
        &mut self,
        request: CrawlRequest,
        ticket: SessionTicket,
        result: FetchResult,
        tasks: &mut JoinSet<TaskOutput>,
    ) {
        let url = request.url.clone();
        let depth = request.depth;

        // Login redirects and error pages can update the session cookies too
        self.gate.absorb_cookies(&ticket, result.set_cookies());

        let decision = match result.response_view(&url) {
            Some(view) => self.gate.after_receive(request, &ticket, &view),
            None => ResponseDecision::Forward(request),
        };

        match decision {
            ResponseDecision::Forward(request) => self.process_result(request, result),
            ResponseDecision::TriggerReauth { start_login } => {
                self.report.set_state(&url, depth, PageState::WaitingOnLogin);
                if start_login {
                    self.spawn_login(tasks);
                }
            }
            ResponseDecision::Resend(request) => {
                tracing::debug!("Resending {} with the current session", request.url);
                self.scheduler.replay(request);
            }
            ResponseDecision::Reject { request, error } => {
                tracing::debug!("Dropping {}: {}", request.url, error);
                self.report.record_auth_failure(&request.url, request.depth, &error);
            }
        }
    }

    fn spawn_login(&mut self, tasks: &mut JoinSet<TaskOutput>) {
        let gate = Arc::clone(&self.gate);
        let solver = Arc::clone(&self.solver);
        tasks.spawn(async move { TaskOutput::Login(gate.authenticate(solver.as_ref()).await) });
    }

    fn handle_login(&mut self, resolution: AuthResolution<CrawlRequest>) {
        match resolution {
            AuthResolution::Authenticated { replay, .. } => {
                for request in replay {
                    self.scheduler.replay(request);
                }
            }
            AuthResolution::Exhausted { failed, error } => {
                for request in failed {
                    self.report
                        .record_auth_failure(&request.url, request.depth, &error);
                }
            }
            AuthResolution::Cancelled => {}
        }
    }

    /// Records a response the session gate let through and follows its links
    fn process_result(&mut self, request: CrawlRequest, result: FetchResult) {
        let url = &request.url;
        let depth = request.depth;

        match result {
            FetchResult::Page {
                final_url,
                status_code,
                body,
                ..
            } => {
                let parsed = parse_html(&body, &final_url);
                self.report.record_visit(url, depth, status_code, parsed.title);

                let mut added = 0;
                for link in &parsed.links {
                    if self.follow(link, depth + 1) {
                        added += 1;
                    }
                }
                tracing::debug!(
                    "Visited {} ({} links, {} new, {} in frontier)",
                    url,
                    parsed.links.len(),
                    added,
                    self.scheduler.frontier_size()
                );
            }

            FetchResult::Redirect {
                status_code,
                location,
                ..
            } => {
                self.report.set_state(url, depth, PageState::Redirected);
                if let Some(target) = location.as_deref().and_then(|l| url.join(l).ok()) {
                    let link = LinkCandidate::new(target, "").with_origin(url.clone());
                    self.follow(&link, depth);
                }
                tracing::debug!("{} redirected ({})", url, status_code);
            }

            FetchResult::ContentMismatch { content_type, .. } => {
                self.report.record_failure(
                    url,
                    depth,
                    PageState::ContentMismatch,
                    None,
                    format!("Expected HTML, got {}", content_type),
                );
            }

            FetchResult::HttpError {
                status_code, state, ..
            } => {
                self.report.record_failure(
                    url,
                    depth,
                    state,
                    Some(status_code),
                    format!("HTTP {}", status_code),
                );
            }

            FetchResult::NetworkError { error, state } => {
                tracing::warn!("Failed to fetch {}: {}", url, error);
                self.report.record_failure(url, depth, state, None, error);
            }
        }
    }

    /// Adds a link to the frontier unless the session gate forbids it
    fn follow(&mut self, link: &LinkCandidate, depth: u32) -> bool {
        if !self.gate.allow_link(link) {
            self.report.record_skipped_link(&link.target_url);
            return false;
        }

        self.scheduler
            .enqueue(&link.target_url, depth, link.origin_url.as_ref())
            == EnqueueOutcome::Added
    }
}

/// Runs a complete crawl with the given login solver
///
/// # Example
///
/// ```no_run
/// use autologin_crawl::auth::NullSolver;
/// use autologin_crawl::config::load_config;
/// use autologin_crawl::crawler::run_crawl;
/// use std::path::Path;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let report = run_crawl(config, Arc::new(NullSolver)).await?;
/// println!("visited {} pages", report.visited().len());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(config: Config, solver: Arc<dyn LoginSolver>) -> Result<CrawlReport> {
    CrawlCoordinator::new(config, solver)?.run().await
}
