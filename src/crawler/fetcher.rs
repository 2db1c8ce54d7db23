//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with a bounded timeout and redirect limit
//! - Classifying responses into captured outcomes rather than errors

use crate::config::UserAgentConfig;
use reqwest::{header::CONTENT_TYPE, redirect::Policy, Client};
use std::time::{Duration, Instant};

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Result of a fetch operation
#[derive(Debug)]
pub enum FetchResult {
    /// Successfully fetched an HTML page
    Success {
        /// Final URL after redirects
        final_url: String,
        /// HTTP status code
        status_code: u16,
        /// Content-Type header value
        content_type: String,
        /// Page body content
        body: String,
        /// Time until the body was read, in milliseconds
        response_time_ms: u32,
    },

    /// 2xx response whose Content-Type is not HTML
    ContentMismatch {
        /// The actual Content-Type received
        content_type: String,
    },

    /// Non-2xx response
    HttpError {
        /// The HTTP status code
        status_code: u16,
        /// Time until the response headers arrived, in milliseconds
        response_time_ms: u32,
    },

    /// Network error (connection refused, timeout, redirect limit, etc.)
    NetworkError {
        /// Error description
        error: String,
    },
}

impl FetchResult {
    /// Short reason recorded on a failed frontier entry
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::ContentMismatch { content_type } => {
                Some(format!("non-HTML content: {}", content_type))
            }
            Self::HttpError { status_code, .. } => Some(format!("HTTP {}", status_code)),
            Self::NetworkError { error } => Some(error.clone()),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Whole-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use sitegraph::config::UserAgentConfig;
/// use sitegraph::crawler::build_http_client;
///
/// let client = build_http_client(&UserAgentConfig::default(), Duration::from_secs(15)).unwrap();
/// ```
pub fn build_http_client(
    config: &UserAgentConfig,
    timeout: Duration,
) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    Client::builder()
        .user_agent(config.header_value())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true for Content-Type values that carry an HTML document
///
/// A missing header is treated as HTML.
pub fn is_html_content_type(content_type: &str) -> bool {
    let content_type = content_type.trim().to_ascii_lowercase();
    content_type.is_empty() || content_type.contains("text/html") || content_type.contains("xhtml")
}

/// Fetches a URL and classifies the outcome
///
/// | Condition | Result |
/// |-----------|--------|
/// | 2xx with HTML Content-Type | `Success` |
/// | 2xx with other Content-Type | `ContentMismatch` |
/// | Any non-2xx status | `HttpError` |
/// | Timeout, connection failure, redirect limit, body read error | `NetworkError` |
///
/// Failures are values, never `Err`; the caller decides what to persist.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
pub async fn fetch_url(client: &Client, url: &str) -> FetchResult {
    let started = Instant::now();
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(e) => return FetchResult::NetworkError { error: classify_error(&e) },
    };

    let status = response.status();
    if !status.is_success() {
        return FetchResult::HttpError {
            status_code: status.as_u16(),
            response_time_ms: elapsed_ms(started),
        };
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if !is_html_content_type(&content_type) {
        return FetchResult::ContentMismatch { content_type };
    }

    match response.text().await {
        Ok(body) => FetchResult::Success {
            final_url,
            status_code: status.as_u16(),
            content_type,
            body,
            response_time_ms: elapsed_ms(started),
        },
        Err(e) => FetchResult::NetworkError {
            error: format!("Failed to read body: {}", e),
        },
    }
}

fn elapsed_ms(started: Instant) -> u32 {
    u32::try_from(started.elapsed().as_millis()).unwrap_or(u32::MAX)
}

fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_redirect() {
        "Too many redirects".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}
