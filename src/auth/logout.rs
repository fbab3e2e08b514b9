//! Logout link detection
//!
//! Decides whether following a link would end the crawl's own session. The
//! check is purely lexical: the operator's logout marker first, then a fuzzy
//! comparison of every word-boundary token in the link against "logout".

use crate::config::AutologinConfig;
use url::Url;

const LOGOUT_WORD: &str = "logout";

/// Maximum optimal-string-alignment distance for a token to count as "logout"
const MAX_LOGOUT_DISTANCE: usize = 2;

/// A hyperlink found on a page, as handed over by the link extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCandidate {
    /// Absolute target of the link
    pub target_url: Url,

    /// Visible text of the anchor, possibly empty
    pub link_text: String,

    /// Page the link was found on
    pub origin_url: Option<Url>,
}

impl LinkCandidate {
    pub fn new(target_url: Url, link_text: impl Into<String>) -> Self {
        Self {
            target_url,
            link_text: link_text.into(),
            origin_url: None,
        }
    }

    pub fn with_origin(mut self, origin_url: Url) -> Self {
        self.origin_url = Some(origin_url);
        self
    }
}

/// Returns true if following `link` would likely log the session out
///
/// # Rules
///
/// 1. If `logout-url-marker` is configured and occurs in the link's query
///    string, the link is a logout link.
/// 2. Otherwise the path segments, query keys/values and link text are split
///    into alphanumeric tokens (trailing digits stay attached). A token whose
///    look-alike-normalized form is within two edits of "logout" marks the
///    link as a logout link. In link text, adjacent token pairs are also
///    tried joined, so "Log Out" is caught.
///
/// Always false when autologin is disabled.
///
/// # Examples
///
/// ```
/// use autologin_crawl::auth::{looks_like_logout, LinkCandidate};
/// use autologin_crawl::config::AutologinConfig;
/// use url::Url;
///
/// let config = AutologinConfig { enabled: true, ..AutologinConfig::default() };
///
/// let link = LinkCandidate::new(Url::parse("https://example.com/l0gout1").unwrap(), "");
/// assert!(looks_like_logout(&link, &config));
///
/// let link = LinkCandidate::new(Url::parse("https://example.com/page2").unwrap(), "two");
/// assert!(!looks_like_logout(&link, &config));
/// ```
pub fn looks_like_logout(link: &LinkCandidate, config: &AutologinConfig) -> bool {
    if !config.enabled {
        return false;
    }

    if let Some(marker) = config.logout_url_marker.as_deref() {
        if link
            .target_url
            .query()
            .is_some_and(|query| query.contains(marker))
        {
            return true;
        }
    }

    url_tokens(&link.target_url).iter().any(|t| is_logout_token(t))
        || text_tokens(&link.link_text).iter().any(|t| is_logout_token(t))
}

/// Returns true if a single token is "logout" or a near miss of it
pub fn is_logout_token(token: &str) -> bool {
    let len = token.chars().count();
    if len.abs_diff(LOGOUT_WORD.len()) > MAX_LOGOUT_DISTANCE {
        return false;
    }

    let normalized: String = token.chars().map(unconfuse).collect();
    strsim::osa_distance(&normalized, LOGOUT_WORD) <= MAX_LOGOUT_DISTANCE
}

/// Maps digits that are commonly used as letter look-alikes back to letters
fn unconfuse(c: char) -> char {
    match c {
        '0' => 'o',
        '1' => 'l',
        '3' => 'e',
        '4' => 'a',
        '5' => 's',
        '7' => 't',
        '9' => 'g',
        other => other,
    }
}

/// Splits text into lowercase runs of ASCII letters and digits
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_ascii_lowercase())
}

fn url_tokens(url: &Url) -> Vec<String> {
    let mut tokens: Vec<String> = url
        .path_segments()
        .into_iter()
        .flatten()
        .flat_map(|segment| tokenize(segment).collect::<Vec<_>>())
        .collect();

    for (key, value) in url.query_pairs() {
        tokens.extend(tokenize(&key));
        tokens.extend(tokenize(&value));
    }

    tokens
}

fn text_tokens(text: &str) -> Vec<String> {
    let words: Vec<String> = tokenize(text).collect();
    let joined = words.windows(2).map(|pair| format!("{}{}", pair[0], pair[1]));
    let mut tokens: Vec<String> = joined.collect();
    tokens.extend(words);
    tokens
}
