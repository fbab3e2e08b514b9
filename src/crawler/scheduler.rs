//! Scheduler for the crawl frontier
//!
//! This module handles:
//! - FIFO frontier of pages to crawl, deduplicated on the normalized URL
//! - Replay queue for requests released by a completed login, served first
//! - Depth, page-count and same-site limits
//! - Pacing dispatches by the configured download delay

use crate::config::CrawlerConfig;
use crate::url::{is_same_site, normalize_url};
use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};
use url::Url;

/// A page request travelling through the crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlRequest {
    /// Normalized URL to fetch
    pub url: Url,

    /// Link distance from the start page
    pub depth: u32,

    /// Page the link was found on
    pub referer: Option<Url>,
}

impl CrawlRequest {
    pub fn new(url: Url, depth: u32) -> Self {
        Self {
            url,
            depth,
            referer: None,
        }
    }
}

/// Why a URL was or was not added to the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Added,
    Duplicate,
    TooDeep,
    OffSite,
    Invalid,
}

/// Frontier, replay queue and dispatch pacing for one crawl
pub struct Scheduler {
    /// URLs discovered but not yet dispatched, in discovery order
    frontier: VecDeque<CrawlRequest>,

    /// Requests to send again, in the order they were released
    replay: VecDeque<CrawlRequest>,

    /// Normalized URLs ever added to the frontier
    seen: HashSet<String>,

    /// Start page; defines the crawled site
    root: Url,

    config: CrawlerConfig,

    /// Distinct pages handed out from the frontier
    dispatched: u32,

    last_dispatch: Option<Instant>,
}

impl Scheduler {
    /// Creates a scheduler seeded with the start page
    pub fn new(config: CrawlerConfig, root: Url) -> Self {
        let mut scheduler = Self {
            frontier: VecDeque::new(),
            replay: VecDeque::new(),
            seen: HashSet::new(),
            root: root.clone(),
            config,
            dispatched: 0,
            last_dispatch: None,
        };
        scheduler.enqueue(&root, 0, None);
        scheduler
    }

    /// Adds a discovered URL to the frontier
    pub fn enqueue(&mut self, url: &Url, depth: u32, referer: Option<&Url>) -> EnqueueOutcome {
        if depth > self.config.max_depth {
            return EnqueueOutcome::TooDeep;
        }

        if self.config.same_site_only && !is_same_site(&self.root, url) {
            return EnqueueOutcome::OffSite;
        }

        let normalized = match normalize_url(url.as_str()) {
            Ok(normalized) => normalized,
            Err(e) => {
                tracing::debug!("Failed to normalize URL {}: {}", url, e);
                return EnqueueOutcome::Invalid;
            }
        };

        if !self.seen.insert(normalized.as_str().to_string()) {
            return EnqueueOutcome::Duplicate;
        }

        tracing::trace!("Queued {} at depth {}", normalized, depth);
        self.frontier.push_back(CrawlRequest {
            url: normalized,
            depth,
            referer: referer.cloned(),
        });
        EnqueueOutcome::Added
    }

    /// Queues a request to be sent again ahead of the frontier
    pub fn replay(&mut self, request: CrawlRequest) {
        self.replay.push_back(request);
    }

    /// Takes the next request to send
    ///
    /// Replays come first and do not count against `max-pages`.
    pub fn next_request(&mut self) -> Option<CrawlRequest> {
        if let Some(request) = self.replay.pop_front() {
            return Some(request);
        }

        if self
            .config
            .max_pages
            .is_some_and(|max| self.dispatched >= max)
        {
            return None;
        }

        let request = self.frontier.pop_front()?;
        self.dispatched += 1;
        Some(request)
    }

    /// Waits until the download delay since the previous dispatch has passed
    pub async fn pace(&mut self) {
        self.pace_at_least(Duration::ZERO).await;
    }

    /// Like [`Scheduler::pace`], with `floor` as the minimum spacing
    pub async fn pace_at_least(&mut self, floor: Duration) {
        let delay = Duration::from_millis(self.config.download_delay).max(floor);
        if let Some(last) = self.last_dispatch {
            let elapsed = last.elapsed();
            if elapsed < delay {
                tokio::time::sleep(delay - elapsed).await;
            }
        }
        self.last_dispatch = Some(Instant::now());
    }

    /// Returns true if a request could be handed out right now
    pub fn has_work(&self) -> bool {
        !self.replay.is_empty()
            || (!self.frontier.is_empty()
                && self
                    .config
                    .max_pages
                    .map_or(true, |max| self.dispatched < max))
    }

    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    pub fn replay_size(&self) -> usize {
        self.replay.len()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn dispatched(&self) -> u32 {
        self.dispatched
    }

    pub fn root(&self) -> &Url {
        &self.root
    }
}
