//! Crawler module for fetching and processing pages
//!
//! This module contains the crawl pipeline:
//! - HTTP fetching with a non-HTML filter
//! - HTML structure and link extraction
//! - Page type classification
//! - The bounded worker pool that runs one batch
//! - Batch coordination and stop signals

mod classify;
mod coordinator;
mod fetcher;
mod parser;
mod scheduler;
mod signal;

pub use classify::{classify_page, PageSignals, PageType};
pub use coordinator::{BatchOutcome, Coordinator, Progress};
pub use fetcher::{build_http_client, fetch_url, is_html_content_type, FetchResult};
pub use parser::{extract_structure, ExtractedLink, ExtractedPage, LinkPosition};
pub use scheduler::ROBOTS_DISALLOWED;
pub use signal::{AnySignal, SessionStopSignal, StopFlag, StopSignal};
