use url::Url;

/// File extensions that are never HTML pages
const NON_HTML_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".css", ".js", ".xml",
    ".zip", ".gz", ".mp3", ".mp4", ".avi", ".mov", ".woff", ".woff2", ".ttf",
];

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sitegraph::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Removes a leading `www.` from a host
pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Returns true if the URL lives on the crawl's base host
///
/// `www.example.com` and `example.com` are treated as the same site.
pub fn is_internal(url: &Url, base_host: &str) -> bool {
    match url.host_str() {
        Some(host) => strip_www(&host.to_lowercase()) == strip_www(&base_host.to_lowercase()),
        None => false,
    }
}

/// Moves an internal URL onto the crawl's base host
///
/// Returns `None` for external URLs. `https://www.example.com/a` and
/// `https://example.com/a` both come back spelled with `base_host`, so the two
/// forms share one frontier entry and one page.
pub fn site_url(url: &Url, base_host: &str) -> Option<Url> {
    if !is_internal(url, base_host) {
        return None;
    }
    let base_host = base_host.to_lowercase();
    let mut url = url.clone();
    if url.host_str() != Some(base_host.as_str()) {
        url.set_host(Some(&base_host)).ok()?;
    }
    Some(url)
}

/// Returns false for URLs whose path names a binary or static asset
pub fn is_crawlable_resource(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    !NON_HTML_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_with_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_domain(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_domain(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_is_internal_same_host() {
        let url = Url::parse("https://example.com/a").unwrap();
        assert!(is_internal(&url, "example.com"));
    }

    #[test]
    fn test_is_internal_ignores_www() {
        let url = Url::parse("https://www.example.com/a").unwrap();
        assert!(is_internal(&url, "example.com"));

        let url = Url::parse("https://example.com/a").unwrap();
        assert!(is_internal(&url, "www.example.com"));
    }

    #[test]
    fn test_is_internal_rejects_other_hosts() {
        let url = Url::parse("https://blog.example.com/a").unwrap();
        assert!(!is_internal(&url, "example.com"));

        let url = Url::parse("https://other.org/").unwrap();
        assert!(!is_internal(&url, "example.com"));
    }

    #[test]
    fn test_site_url_folds_www_spellings() {
        let www = Url::parse("https://www.example.com/guide?p=2").unwrap();
        let bare = Url::parse("https://example.com/guide?p=2").unwrap();

        let folded = site_url(&www, "example.com").unwrap();
        assert_eq!(folded.as_str(), "https://example.com/guide?p=2");
        assert_eq!(site_url(&bare, "example.com").unwrap(), folded);

        let onto_www = site_url(&bare, "www.example.com").unwrap();
        assert_eq!(onto_www.as_str(), "https://www.example.com/guide?p=2");
    }

    #[test]
    fn test_site_url_keeps_port_and_rejects_external() {
        let url = Url::parse("http://www.example.com:8080/a").unwrap();
        assert_eq!(
            site_url(&url, "example.com").unwrap().as_str(),
            "http://example.com:8080/a"
        );

        let other = Url::parse("https://blog.example.com/a").unwrap();
        assert!(site_url(&other, "example.com").is_none());
    }

    #[test]
    fn test_crawlable_resource_filter() {
        let page = Url::parse("https://example.com/guide").unwrap();
        assert!(is_crawlable_resource(&page));

        let pdf = Url::parse("https://example.com/files/report.PDF").unwrap();
        assert!(!is_crawlable_resource(&pdf));

        let css = Url::parse("https://example.com/static/site.css?v=3").unwrap();
        assert!(!is_crawlable_resource(&css));
    }
}
