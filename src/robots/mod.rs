//! Robots.txt handling module
//!
//! The crawler fetches robots.txt once per invocation for the site being
//! crawled and checks every URL against it before fetching.

mod parser;

pub use parser::ParsedRobots;

use reqwest::Client;
use url::Url;

/// Fetches and parses robots.txt for the host of `base_url`
///
/// Any failure (network error, non-2xx status, unreadable body) yields a
/// permissive `ParsedRobots`, so an unreachable robots.txt never blocks a crawl.
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `base_url` - Any URL on the site; only scheme, host and port are used
pub async fn fetch_robots(client: &Client, base_url: &Url) -> ParsedRobots {
    let robots_url = match base_url.join("/robots.txt") {
        Ok(url) => url,
        Err(e) => {
            tracing::debug!("Cannot build robots.txt URL from {}: {}", base_url, e);
            return ParsedRobots::allow_all();
        }
    };

    let response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("robots.txt unreachable at {}: {}", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if !response.status().is_success() {
        tracing::debug!(
            "robots.txt at {} returned {}, allowing all",
            robots_url,
            response.status()
        );
        return ParsedRobots::allow_all();
    }

    match response.text().await {
        Ok(body) => {
            tracing::debug!("Loaded robots.txt from {}", robots_url);
            ParsedRobots::from_content(&body)
        }
        Err(e) => {
            tracing::warn!("Failed to read robots.txt from {}: {}", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}
