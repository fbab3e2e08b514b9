//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `PageState`: Tracks the state of individual pages (queued, fetching, waiting on login, visited, etc.)
//! - `AuthStatus`: Tracks where the crawl session stands with the target site's login

mod auth_status;
mod page_state;

// Re-export main types
pub use auth_status::AuthStatus;
pub use page_state::PageState;
