//! Bounded worker pool for one crawl batch
//!
//! Every leased frontier entry becomes a task on a `JoinSet`; a semaphore caps
//! how many fetches are in flight. Workers fetch and parse but never touch
//! storage: they hand their outcome back to the coordinator, which persists
//! the whole batch.

use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::crawler::parser::{extract_structure, ExtractedPage};
use crate::crawler::signal::StopSignal;
use crate::robots::ParsedRobots;
use crate::storage::FrontierEntry;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Reason recorded when robots.txt forbids a URL
pub const ROBOTS_DISALLOWED: &str = "disallowed by robots.txt";

/// Everything a worker needs, shared by all tasks of a batch
pub struct WorkerContext {
    pub client: Client,
    /// `None` when robots.txt is not respected
    pub robots: Option<Arc<ParsedRobots>>,
    /// Product token matched against robots.txt groups
    pub robots_agent: String,
    pub base_host: String,
    pub min_paragraph_chars: usize,
    pub stop: Arc<dyn StopSignal>,
}

/// What happened to one frontier entry
#[derive(Debug)]
pub enum WorkOutcome {
    /// 2xx HTML page, parsed
    Fetched {
        status_code: u16,
        response_time_ms: u32,
        page: ExtractedPage,
    },

    /// Non-2xx response; recorded as a broken page
    Broken {
        status_code: u16,
        response_time_ms: u32,
    },

    /// Nothing to persist besides the failure reason
    Failed { reason: String },

    /// A stop was observed before fetching; the entry goes back to pending
    Released,
}

/// A frontier entry paired with its outcome
#[derive(Debug)]
pub struct WorkResult {
    pub entry: FrontierEntry,
    pub outcome: WorkOutcome,
}

/// Processes a batch of leased entries with at most `concurrency` fetches in flight
///
/// Results come back in completion order. A task that panics is logged and
/// dropped; its entry stays `processing` until the lease expires and
/// `reclaim_stale` returns it to the queue.
pub async fn run_workers(
    ctx: Arc<WorkerContext>,
    entries: Vec<FrontierEntry>,
    concurrency: usize,
) -> Vec<WorkResult> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();

    for entry in entries {
        let ctx = Arc::clone(&ctx);
        let semaphore = Arc::clone(&semaphore);
        join_set.spawn(async move {
            let outcome = match semaphore.acquire_owned().await {
                Ok(_permit) => process_entry(&ctx, &entry).await,
                Err(_) => WorkOutcome::Released,
            };
            WorkResult { entry, outcome }
        });
    }

    let mut results = Vec::with_capacity(join_set.len());
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::error!("Crawl worker failed: {}", e),
        }
    }
    results
}

/// Fetches and parses a single entry
async fn process_entry(ctx: &WorkerContext, entry: &FrontierEntry) -> WorkOutcome {
    if ctx.stop.is_stopped() {
        tracing::debug!("Stop requested, releasing {}", entry.url);
        return WorkOutcome::Released;
    }

    if let Some(robots) = &ctx.robots {
        if !robots.is_allowed(&entry.url, &ctx.robots_agent) {
            tracing::info!("URL {} disallowed by robots.txt", entry.url);
            return WorkOutcome::Failed {
                reason: ROBOTS_DISALLOWED.to_string(),
            };
        }
    }

    tracing::debug!("Fetching {} (depth {})", entry.url, entry.depth);
    match fetch_url(&ctx.client, &entry.url).await {
        FetchResult::Success {
            final_url,
            status_code,
            body,
            response_time_ms,
            ..
        } => {
            let page_url = match Url::parse(&final_url).or_else(|_| Url::parse(&entry.url)) {
                Ok(url) => url,
                Err(e) => {
                    return WorkOutcome::Failed {
                        reason: format!("Invalid URL: {}", e),
                    }
                }
            };
            let page = extract_structure(&body, &page_url, &ctx.base_host, ctx.min_paragraph_chars);
            WorkOutcome::Fetched {
                status_code,
                response_time_ms,
                page,
            }
        }
        FetchResult::HttpError {
            status_code,
            response_time_ms,
        } => {
            tracing::warn!("{} returned HTTP {}", entry.url, status_code);
            WorkOutcome::Broken {
                status_code,
                response_time_ms,
            }
        }
        other => {
            let reason = other
                .failure_reason()
                .unwrap_or_else(|| "unknown fetch failure".to_string());
            tracing::warn!("Failed to fetch {}: {}", entry.url, reason);
            WorkOutcome::Failed { reason }
        }
    }
}
