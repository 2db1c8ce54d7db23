use crate::UrlError;
use url::Url;

/// Href prefixes that never point at a fetchable page
const SKIPPED_PREFIXES: &[&str] = &["#", "javascript:", "mailto:", "tel:", "data:"];

/// Normalizes an absolute URL into its canonical dedup form
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Reject anything that is not http or https
/// 3. Lowercase the host (done by the parser for http(s))
/// 4. Remove fragment (everything after #)
/// 5. Remove trailing slashes from the path, except for the root `/`
///
/// The scheme and the query string are kept as-is: two URLs that differ only
/// by query are distinct pages.
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(Url)` - Normalized URL
/// * `Err(UrlError)` - Failed to parse or normalize the URL
///
/// # Examples
///
/// ```
/// use sitegraph::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM/page/#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/page");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    url.set_fragment(None);

    let trimmed = trim_trailing_slash(url.path());
    url.set_path(&trimmed);

    Ok(url)
}

/// Resolves an href found on a page into a normalized absolute URL
///
/// Handles absolute, protocol-relative (`//host/path`) and root- or
/// path-relative forms. Anchors, `javascript:`, `mailto:`, `tel:` and `data:`
/// hrefs are skipped, as is anything that fails to parse. Malformed input is
/// dropped silently rather than reported.
///
/// # Arguments
///
/// * `href` - Raw attribute value
/// * `base` - URL of the page the href appeared on
///
/// # Returns
///
/// * `Some(Url)` - Normalized absolute http(s) URL
/// * `None` - The href does not lead to a crawlable location
pub fn resolve_url(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if SKIPPED_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        return None;
    }

    let joined = base.join(href).ok()?;
    normalize_url(joined.as_str()).ok()
}

fn trim_trailing_slash(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://example.com/blog/post").unwrap()
    }

    #[test]
    fn test_remove_trailing_slash() {
        let result = normalize_url("https://example.com/page/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_keep_root_slash() {
        let result = normalize_url("https://example.com/").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_empty_path_becomes_root() {
        let result = normalize_url("https://example.com").unwrap();
        assert_eq!(result.as_str(), "https://example.com/");
    }

    #[test]
    fn test_remove_fragment() {
        let result = normalize_url("https://example.com/page#section").unwrap();
        assert_eq!(result.as_str(), "https://example.com/page");
    }

    #[test]
    fn test_query_is_preserved() {
        let result = normalize_url("https://example.com/list/?b=2&a=1").unwrap();
        assert_eq!(result.as_str(), "https://example.com/list?b=2&a=1");

        let other = normalize_url("https://example.com/list?page=2").unwrap();
        assert_ne!(result, other);
    }

    #[test]
    fn test_scheme_is_preserved() {
        let result = normalize_url("http://example.com/page").unwrap();
        assert_eq!(result.as_str(), "http://example.com/page");
    }

    #[test]
    fn test_lowercase_host() {
        let result = normalize_url("https://EXAMPLE.COM/Page").unwrap();
        assert_eq!(result.as_str(), "https://example.com/Page");
    }

    #[test]
    fn test_dot_segments_resolved() {
        let result = normalize_url("https://example.com/a/../b/./c").unwrap();
        assert_eq!(result.as_str(), "https://example.com/b/c");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_url("ftp://example.com/page");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        assert!(normalize_url("not a url").is_err());
    }

    #[test]
    fn test_resolve_root_relative() {
        let result = resolve_url("/about/", &base()).unwrap();
        assert_eq!(result.as_str(), "https://example.com/about");
    }

    #[test]
    fn test_resolve_path_relative() {
        let result = resolve_url("other", &base()).unwrap();
        assert_eq!(result.as_str(), "https://example.com/blog/other");
    }

    #[test]
    fn test_resolve_protocol_relative() {
        let result = resolve_url("//cdn.example.org/lib", &base()).unwrap();
        assert_eq!(result.as_str(), "https://cdn.example.org/lib");
    }

    #[test]
    fn test_resolve_absolute_with_fragment() {
        let result = resolve_url("https://example.com/guide/#intro", &base()).unwrap();
        assert_eq!(result.as_str(), "https://example.com/guide");
    }

    #[test]
    fn test_resolve_skips_non_page_hrefs() {
        assert!(resolve_url("", &base()).is_none());
        assert!(resolve_url("#section", &base()).is_none());
        assert!(resolve_url("javascript:void(0)", &base()).is_none());
        assert!(resolve_url("mailto:someone@example.com", &base()).is_none());
        assert!(resolve_url("tel:+15551234", &base()).is_none());
        assert!(resolve_url("ftp://example.com/file", &base()).is_none());
    }
}
