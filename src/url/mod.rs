//! URL handling for the crawl frontier
//!
//! Normalization produces the dedup key for the frontier; the domain helpers
//! decide whether a discovered link stays on the crawled site.

mod domain;
mod normalize;

pub use domain::{extract_domain, is_same_site};
pub use normalize::normalize_url;
