//! URL handling module for SiteGraph
//!
//! This module resolves hrefs against the page they were found on, produces
//! the canonical form used as the frontier dedup key, and decides which URLs
//! are internal and worth fetching.

mod domain;
mod normalize;

pub use domain::{extract_domain, is_crawlable_resource, is_internal, site_url, strip_www};
pub use normalize::{normalize_url, resolve_url};
