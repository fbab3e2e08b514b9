//! Output module for crawl reports
//!
//! This module handles:
//! - Recording per-page outcomes while the crawl runs
//! - Rendering the final report for the terminal

pub mod stats;

pub use stats::{print_report, report_json, CrawlReport, PageRecord};
