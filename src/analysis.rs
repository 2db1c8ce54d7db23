//! Post-crawl analysis pass
//!
//! Loads a session snapshot, scores equity and health, detects orphans, and
//! replaces the stored link opportunities. The computation is a pure
//! function of persisted pages and links, so it can be re-run at any time
//! without crawling again.

use crate::config::AnalysisConfig;
use crate::graph::{
    compute_equity, count_internal_outlinks, detect_orphans, health_score, LinkGraph, Orphan,
};
use crate::semantic::{Opportunity, RelevanceEngine};
use crate::storage::{FrontierEntry, LinkRecord, PageRecord, Storage};
use crate::Result;

/// Result of analyzing one session snapshot
#[derive(Debug, Clone)]
pub struct Analysis {
    /// `(normalized_url, link_equity_score, health_score)` per page
    pub scores: Vec<(String, f64, f64)>,
    pub orphans: Vec<Orphan>,
    pub opportunities: Vec<Opportunity>,
}

/// Summary of a persisted analysis run
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub pages_scored: usize,
    pub orphans: Vec<Orphan>,
    pub opportunities: usize,
}

/// Analyzes a snapshot without touching storage
pub fn analyze(
    start_url: &str,
    pages: &[PageRecord],
    links: &[LinkRecord],
    frontier: &[FrontierEntry],
    config: &AnalysisConfig,
) -> Analysis {
    let graph = LinkGraph::build(pages, links);
    let equity = compute_equity(&graph);
    let outlinks = count_internal_outlinks(links);

    let scores = pages
        .iter()
        .map(|page| {
            let url = page.normalized_url.as_str();
            let equity = equity.get(url).copied().unwrap_or(0.0);
            let health = health_score(page, outlinks.get(url).copied().unwrap_or(0));
            (url.to_string(), equity, health)
        })
        .collect();

    let orphans = detect_orphans(start_url, pages, frontier, links, &graph);
    let opportunities = RelevanceEngine::new(pages, &graph, &equity, config).opportunities(&orphans);

    Analysis {
        scores,
        orphans,
        opportunities,
    }
}

/// Analyzes a stored session and writes scores and opportunities back
///
/// # Arguments
///
/// * `storage` - The storage holding the session
/// * `session_id` - The session to analyze
/// * `config` - Relevance thresholds
pub fn analyze_session<S: Storage + ?Sized>(
    storage: &mut S,
    session_id: i64,
    config: &AnalysisConfig,
) -> Result<AnalysisReport> {
    let session = storage.get_session(session_id)?;
    let pages = storage.load_pages(session_id)?;
    let links = storage.load_links(session_id)?;
    let frontier = storage.load_frontier(session_id)?;

    tracing::debug!(
        "Analyzing session {}: {} pages, {} links",
        session_id,
        pages.len(),
        links.len()
    );

    let analysis = analyze(&session.start_url, &pages, &links, &frontier, config);

    storage.update_page_scores(session_id, &analysis.scores)?;
    storage.replace_opportunities(session_id, &analysis.opportunities)?;

    Ok(AnalysisReport {
        pages_scored: analysis.scores.len(),
        orphans: analysis.orphans,
        opportunities: analysis.opportunities.len(),
    })
}
