use url::Url;

/// Extracts the domain from a URL
///
/// Returns the lowercase host, or None for URLs without one.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use autologin_crawl::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8000/hidden").unwrap();
/// assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if both URLs point at the same host and port
///
/// Scheme is compared through the effective port, so `http://a/` and
/// `http://a:80/` are the same site while `http://a/` and `https://a/` are not.
pub fn is_same_site(a: &Url, b: &Url) -> bool {
    match (extract_domain(a), extract_domain(b)) {
        (Some(host_a), Some(host_b)) => {
            host_a == host_b && a.port_or_known_default() == b.port_or_known_default()
        }
        _ => false,
    }
}
