//! Statistics generation from the crawl database
//!
//! This module provides functionality for extracting and displaying
//! session progress, page scores, orphans and link opportunities.

use crate::graph::{detect_orphans, LinkGraph};
use crate::semantic::Opportunity;
use crate::state::FrontierStatus;
use crate::storage::{PageRecord, QueueCounts, SessionRecord, Storage};
use crate::Result;
use std::collections::BTreeMap;

/// Number of pages and opportunities listed in the report
const TOP_N: usize = 10;

/// A page with its analysis scores
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPage {
    pub url: String,
    pub link_equity_score: f64,
    pub health_score: f64,
}

/// Session statistics summary
#[derive(Debug, Clone)]
pub struct SessionStatistics {
    pub session: SessionRecord,

    /// Frontier entries by status
    pub queue: QueueCounts,

    /// Pages persisted, including broken ones
    pub total_pages: u64,

    /// Pages whose status code is not 2xx
    pub broken_pages: u64,

    pub total_links: u64,
    pub internal_links: u64,

    /// Failed frontier entries grouped by reason
    pub failure_summary: BTreeMap<String, u64>,

    /// Highest equity first
    pub top_pages: Vec<ScoredPage>,

    pub average_health: Option<f64>,

    /// Mean fetch time over stored pages, in milliseconds
    pub average_response_ms: Option<f64>,

    /// Successfully fetched pages without an H1
    pub pages_without_h1: u64,

    pub orphan_count: usize,
    pub opportunity_count: usize,
    pub top_opportunities: Vec<Opportunity>,
}

impl SessionStatistics {
    /// `pages_crawled / max_pages` as a percentage
    pub fn progress_percent(&self) -> f64 {
        if self.session.max_pages == 0 {
            return 100.0;
        }
        f64::from(self.session.pages_crawled) / f64::from(self.session.max_pages) * 100.0
    }
}

/// Loads statistics for one session from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `session_id` - The session to report on
///
/// # Returns
///
/// * `Ok(SessionStatistics)` - Successfully loaded statistics
/// * `Err(SiteGraphError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage, session_id: i64) -> Result<SessionStatistics> {
    let session = storage.get_session(session_id)?;
    let queue = storage.count_by_status(session_id)?;
    let pages = storage.load_pages(session_id)?;
    let links = storage.load_links(session_id)?;
    let frontier = storage.load_frontier(session_id)?;
    let opportunities = storage.load_opportunities(session_id)?;

    let mut failure_summary = BTreeMap::new();
    for entry in frontier
        .iter()
        .filter(|e| e.status == FrontierStatus::Failed)
    {
        let reason = entry
            .error_message
            .clone()
            .unwrap_or_else(|| "unknown".to_string());
        *failure_summary.entry(reason).or_insert(0) += 1;
    }

    let mut top_pages: Vec<ScoredPage> = pages
        .iter()
        .map(|p| ScoredPage {
            url: p.normalized_url.clone(),
            link_equity_score: p.link_equity_score,
            health_score: p.health_score,
        })
        .collect();
    top_pages.sort_by(|a, b| {
        b.link_equity_score
            .total_cmp(&a.link_equity_score)
            .then_with(|| a.url.cmp(&b.url))
    });
    top_pages.truncate(TOP_N);

    let average = |value: fn(&PageRecord) -> f64| {
        if pages.is_empty() {
            None
        } else {
            Some(pages.iter().map(value).sum::<f64>() / pages.len() as f64)
        }
    };
    let average_health = average(|p| p.health_score);
    let average_response_ms = average(|p| f64::from(p.response_time_ms));
    let pages_without_h1 = pages
        .iter()
        .filter(|p| (200..300).contains(&p.status_code) && !p.has_h1())
        .count() as u64;

    let graph = LinkGraph::build(&pages, &links);
    let orphan_count = detect_orphans(&session.start_url, &pages, &frontier, &links, &graph).len();

    Ok(SessionStatistics {
        queue,
        total_pages: pages.len() as u64,
        broken_pages: pages
            .iter()
            .filter(|p| !(200..300).contains(&p.status_code))
            .count() as u64,
        total_links: links.len() as u64,
        internal_links: links.iter().filter(|l| l.is_internal).count() as u64,
        failure_summary,
        top_pages,
        average_health,
        average_response_ms,
        pages_without_h1,
        orphan_count,
        opportunity_count: opportunities.len(),
        top_opportunities: opportunities.into_iter().take(TOP_N).collect(),
        session,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &SessionStatistics) {
    let session = &stats.session;
    println!("=== Session {} ===\n", session.id);

    println!("Overview:");
    println!("  Start URL: {}", session.start_url);
    println!("  Status: {}", session.status);
    if let Some(error) = &session.error_message {
        println!("  Error: {}", error);
    }
    println!("  Started: {}", session.started_at);
    if let Some(finished) = &session.finished_at {
        println!("  Finished: {}", finished);
    }
    println!(
        "  Progress: {} / {} pages ({:.1}%)",
        session.pages_crawled,
        session.max_pages,
        stats.progress_percent()
    );
    println!();

    println!("Frontier:");
    println!("  pending: {}", stats.queue.pending);
    println!("  processing: {}", stats.queue.processing);
    println!("  completed: {}", stats.queue.completed);
    println!("  failed: {}", stats.queue.failed);
    println!();

    println!("Pages and Links:");
    println!("  Pages stored: {}", stats.total_pages);
    println!("  Broken pages: {}", stats.broken_pages);
    println!(
        "  Links: {} ({} internal)",
        stats.total_links, stats.internal_links
    );
    if let Some(health) = stats.average_health {
        println!("  Average health: {:.1}", health);
    }
    if let Some(response) = stats.average_response_ms {
        println!("  Average response: {:.0} ms", response);
    }
    println!("  Pages without H1: {}", stats.pages_without_h1);
    println!("  Orphan pages: {}", stats.orphan_count);
    println!();

    if !stats.failure_summary.is_empty() {
        println!("Failures:");
        let mut reasons: Vec<_> = stats.failure_summary.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1));
        for (reason, count) in reasons {
            println!("  {}: {}", reason, count);
        }
        println!();
    }

    if !stats.top_pages.is_empty() {
        println!("Top Pages by Equity:");
        for page in &stats.top_pages {
            println!(
                "  {:>5.1}  health {:>3.0}  {}",
                page.link_equity_score, page.health_score, page.url
            );
        }
        println!();
    }

    println!("Link Opportunities: {}", stats.opportunity_count);
    for opp in &stats.top_opportunities {
        println!(
            "  [{}] {} {} -> {} \"{}\" ({:.2})",
            opp.priority,
            opp.opportunity_type,
            opp.from_url,
            opp.to_url,
            opp.suggested_anchor,
            opp.similarity
        );
        if let Some(point) = &opp.insertion {
            println!(
                "      paragraph {} ({}), {} match {:.2}",
                point.paragraph_index, point.position, point.strength, point.confidence
            );
        }
    }
}
