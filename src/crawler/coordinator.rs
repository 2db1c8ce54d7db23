//! Crawler coordinator - batch orchestration of a crawl session
//!
//! A crawl is a sequence of batches. Each batch:
//! - Polls the stop signals
//! - Reclaims entries whose processing lease expired
//! - Leases up to `batch-size` pending entries (never more than the page budget left)
//! - Fetches and parses them on the bounded worker pool
//! - Persists pages and links, marks entries, and enqueues child links
//! - Reports progress and decides whether the session is finished
//!
//! Everything material is persisted between batches, so a crash or an
//! external timeout between two invocations loses no work.

use crate::analysis::analyze_session;
use crate::config::Config;
use crate::crawler::classify::{classify_page, PageSignals, PageType};
use crate::crawler::fetcher::build_http_client;
use crate::crawler::parser::ExtractedPage;
use crate::crawler::scheduler::{run_workers, WorkOutcome, WorkResult, WorkerContext};
use crate::crawler::signal::{AnySignal, SessionStopSignal, StopSignal};
use crate::robots::{fetch_robots, ParsedRobots};
use crate::semantic::top_keywords;
use crate::state::SessionStatus;
use crate::storage::{
    lock_storage, FrontierEntry, LinkRecord, NewFrontierEntry, PageRecord, QueueCounts, SharedStorage,
    SqliteStorage, Storage,
};
use crate::url::{extract_domain, is_crawlable_resource, normalize_url, site_url};
use crate::{Result, UrlError};
use chrono::Utc;
use reqwest::Client;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Priority of the start URL and explicit seeds
const SEED_PRIORITY: i32 = 100;
/// Priority of URLs discovered through links
const DISCOVERED_PRIORITY: i32 = 50;
/// Keywords stored per page
const PAGE_KEYWORDS: usize = 10;
/// Pause before polling again when other workers hold every remaining entry
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Snapshot of session progress
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub session_id: i64,
    pub status: SessionStatus,
    pub pages_crawled: u32,
    pub max_pages: u32,
    pub queue: QueueCounts,
}

impl Progress {
    /// `pages_crawled / max_pages`, in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.max_pages == 0 {
            return 1.0;
        }
        (f64::from(self.pages_crawled) / f64::from(self.max_pages)).min(1.0)
    }
}

/// What one batch did and where it left the session
#[derive(Debug, Clone, Copy)]
pub struct BatchOutcome {
    /// Entries fetched or failed in this batch
    pub processed: usize,
    /// Entries returned to pending because a stop was observed
    pub released: usize,
    pub progress: Progress,
    pub stop_requested: bool,
    pub budget_reached: bool,
    pub frontier_exhausted: bool,
}

impl BatchOutcome {
    /// True once the session has reached a terminal status
    pub fn is_finished(&self) -> bool {
        self.progress.status.is_terminal()
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    storage: SharedStorage,
    client: Client,
    session_id: i64,
    /// Page budget of the session, fixed when it was created
    max_pages: u32,
    /// Depth limit of the session, fixed when it was created
    max_depth: u32,
    base_url: Url,
    base_host: String,
    stop_signals: Vec<Arc<dyn StopSignal>>,
    robots: Option<Arc<ParsedRobots>>,
}

impl Coordinator {
    /// Creates a coordinator for the configured start URL
    ///
    /// Resumes the latest non-terminal session for the same start URL unless
    /// `fresh` is set, in which case a new session is created. The start URL
    /// and any extra seeds are enqueued at depth 0; on resume this is a no-op
    /// because enqueueing is idempotent.
    ///
    /// A resumed session keeps the page budget and depth limit it was
    /// created with, even if the configuration changed since.
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `storage` - Opened storage
    /// * `config_hash` - Hash of the configuration file, stored on new sessions
    /// * `fresh` - Start a new session even if one can be resumed
    pub fn new(
        config: Config,
        storage: SqliteStorage,
        config_hash: &str,
        fresh: bool,
    ) -> Result<Self> {
        let base_url = normalize_url(&config.crawl.start_url)?;
        let base_host = extract_domain(&base_url).ok_or(UrlError::MissingHost)?;
        let storage = Arc::new(Mutex::new(storage));

        let (session_id, max_pages, max_depth) = {
            let mut db = lock_storage(&storage)?;
            let resumable = if fresh {
                None
            } else {
                db.find_resumable_session(base_url.as_str())?
            };

            match resumable {
                Some(session) => {
                    tracing::info!(
                        "Resuming session {} ({} of {} pages crawled)",
                        session.id,
                        session.pages_crawled,
                        session.max_pages
                    );
                    if session.config_hash != config_hash {
                        tracing::warn!(
                            "Configuration changed since session {} started; keeping its limits \
                             (max-pages {}, max-depth {})",
                            session.id,
                            session.max_pages,
                            session.max_depth
                        );
                    }
                    (session.id, session.max_pages, session.max_depth)
                }
                None => {
                    let id = db.create_session(
                        base_url.as_str(),
                        config.crawl.max_pages,
                        config.crawl.max_depth,
                        config_hash,
                    )?;
                    tracing::info!("Starting session {} at {}", id, base_url);
                    (id, config.crawl.max_pages, config.crawl.max_depth)
                }
            }
        };

        let mut seeds = vec![NewFrontierEntry {
            url: config.crawl.start_url.clone(),
            normalized_url: base_url.to_string(),
            depth: 0,
            parent_url: None,
            priority: SEED_PRIORITY,
        }];
        for seed in &config.crawl.seeds {
            match normalize_url(seed) {
                Ok(normalized) => seeds.push(NewFrontierEntry {
                    url: seed.clone(),
                    normalized_url: site_url(&normalized, &base_host)
                        .unwrap_or(normalized)
                        .to_string(),
                    depth: 0,
                    parent_url: None,
                    priority: SEED_PRIORITY,
                }),
                Err(e) => tracing::warn!("Skipping seed {}: {}", seed, e),
            }
        }
        let added = lock_storage(&storage)?.enqueue(session_id, &seeds)?;
        tracing::debug!("Seeded {} new frontier entries", added);

        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.crawl.request_timeout_secs),
        )?;

        let session_signal: Arc<dyn StopSignal> =
            Arc::new(SessionStopSignal::new(Arc::clone(&storage), session_id));

        Ok(Self {
            config: Arc::new(config),
            storage,
            client,
            session_id,
            max_pages,
            max_depth,
            base_url,
            base_host,
            stop_signals: vec![session_signal],
            robots: None,
        })
    }

    /// Adds a stop signal, e.g. a `StopFlag` wired to Ctrl-C
    pub fn with_stop_signal(mut self, signal: Arc<dyn StopSignal>) -> Self {
        self.stop_signals.push(signal);
        self
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    /// Shared handle to the underlying storage
    pub fn storage(&self) -> SharedStorage {
        Arc::clone(&self.storage)
    }

    /// Reads current progress from storage
    pub fn progress(&self) -> Result<Progress> {
        let db = lock_storage(&self.storage)?;
        let session = db.get_session(self.session_id)?;
        Ok(Progress {
            session_id: session.id,
            status: session.status,
            pages_crawled: session.pages_crawled,
            max_pages: session.max_pages,
            queue: db.count_by_status(self.session_id)?,
        })
    }

    fn stop_signal(&self) -> Arc<AnySignal> {
        Arc::new(AnySignal::new(self.stop_signals.clone()))
    }

    async fn robots(&mut self) -> Option<Arc<ParsedRobots>> {
        if !self.config.crawl.respect_robots {
            return None;
        }
        if self.robots.is_none() {
            let robots = fetch_robots(&self.client, &self.base_url).await;
            self.robots = Some(Arc::new(robots));
        }
        self.robots.clone()
    }

    /// Runs a single batch
    ///
    /// Returns immediately with no work done if the session is already in a
    /// terminal state.
    pub async fn run_batch(&mut self) -> Result<BatchOutcome> {
        let session = lock_storage(&self.storage)?.get_session(self.session_id)?;
        if session.status.is_terminal() {
            return self.outcome(0, 0, false);
        }
        if session.status == SessionStatus::Seeded {
            lock_storage(&self.storage)?.update_session_status(
                self.session_id,
                SessionStatus::Running,
                None,
            )?;
        }

        let stop = self.stop_signal();
        if stop.is_stopped() {
            tracing::info!("Stop requested before batch");
            self.finish(SessionStatus::Stopped, None)?;
            return self.outcome(0, 0, true);
        }

        let entries = {
            let mut db = lock_storage(&self.storage)?;
            let lease = Duration::from_secs(self.config.crawl.lease_timeout_secs);
            let reclaimed = db.reclaim_stale(self.session_id, lease)?;
            if reclaimed > 0 {
                tracing::info!("Reclaimed {} stale frontier entries", reclaimed);
            }

            let crawled = db.count_pages(self.session_id)?;
            let budget = u64::from(self.max_pages).saturating_sub(crawled);
            let limit = budget.min(u64::from(self.config.crawl.batch_size)) as usize;
            db.dequeue(self.session_id, limit)?
        };

        let leased = entries.len();
        let mut results = Vec::new();
        if leased > 0 {
            tracing::debug!("Leased {} frontier entries", leased);
            let ctx = Arc::new(WorkerContext {
                client: self.client.clone(),
                robots: self.robots().await,
                robots_agent: self.config.user_agent.crawler_name.clone(),
                base_host: self.base_host.clone(),
                min_paragraph_chars: self.config.analysis.min_paragraph_chars,
                stop: stop.clone(),
            });
            results = run_workers(ctx, entries, self.config.crawl.concurrency as usize).await;
        }

        let mut released = 0;
        let mut start_failure = None;
        {
            let mut db = lock_storage(&self.storage)?;
            for result in &results {
                match self.persist(&mut db, result)? {
                    Persisted::Released => released += 1,
                    Persisted::Failed(reason)
                        if self.is_start_url(&result.entry.normalized_url) =>
                    {
                        start_failure = Some(reason);
                    }
                    _ => {}
                }
            }
            let crawled = db.count_pages(self.session_id)?;
            db.set_pages_crawled(self.session_id, crawled.min(u64::from(u32::MAX)) as u32)?;
        }
        let processed = results.len() - released;

        if let Some(reason) = start_failure {
            tracing::error!("Start URL {} failed: {}", self.base_url, reason);
            self.finish(
                SessionStatus::Failed,
                Some(&format!("start URL failed: {}", reason)),
            )?;
            return self.outcome(processed, released, false);
        }

        let stop_requested = released > 0 || stop.is_stopped();
        let progress = self.progress()?;
        tracing::info!(
            "Progress: {}/{} pages ({:.0}%), {} pending, {} processing, {} failed",
            progress.pages_crawled,
            progress.max_pages,
            progress.fraction() * 100.0,
            progress.queue.pending,
            progress.queue.processing,
            progress.queue.failed
        );

        if stop_requested {
            self.finish(SessionStatus::Stopped, None)?;
        } else if progress.pages_crawled >= self.max_pages || progress.queue.is_drained() {
            self.finish(SessionStatus::Completed, None)?;
        }

        self.outcome(processed, released, stop_requested)
    }

    /// Runs at most `max_batches` batches
    ///
    /// Stops early once the session is finished. An unfinished session stays
    /// `running` and can be continued by a later invocation.
    pub async fn run_batches(&mut self, max_batches: usize) -> Result<Progress> {
        for _ in 0..max_batches {
            let outcome = self.run_batch().await?;
            if outcome.is_finished() {
                break;
            }
            if outcome.processed == 0 && outcome.released == 0 {
                tokio::time::sleep(IDLE_POLL).await;
            }
        }
        self.progress()
    }

    /// Runs batches until the session reaches a terminal state
    pub async fn run(&mut self) -> Result<Progress> {
        let started = std::time::Instant::now();
        loop {
            let outcome = self.run_batch().await?;
            if outcome.is_finished() {
                tracing::info!(
                    "Session {} {} after {:?}: {} pages crawled",
                    self.session_id,
                    outcome.progress.status,
                    started.elapsed(),
                    outcome.progress.pages_crawled
                );
                return Ok(outcome.progress);
            }
            if outcome.processed == 0 && outcome.released == 0 {
                // Remaining entries are leased by another invocation.
                tokio::time::sleep(IDLE_POLL).await;
            }
        }
    }

    fn is_start_url(&self, normalized_url: &str) -> bool {
        normalized_url == self.base_url.as_str()
    }

    fn outcome(
        &self,
        processed: usize,
        released: usize,
        stop_requested: bool,
    ) -> Result<BatchOutcome> {
        let progress = self.progress()?;
        Ok(BatchOutcome {
            processed,
            released,
            progress,
            stop_requested,
            budget_reached: progress.pages_crawled >= self.max_pages,
            frontier_exhausted: progress.queue.is_drained(),
        })
    }

    /// Moves the session to a terminal status and runs analysis on completion
    fn finish(&self, status: SessionStatus, error: Option<&str>) -> Result<()> {
        let mut db = lock_storage(&self.storage)?;
        db.update_session_status(self.session_id, status, error)?;

        if status == SessionStatus::Completed && self.config.crawl.analyze_on_complete {
            let report = analyze_session(&mut *db, self.session_id, &self.config.analysis)?;
            tracing::info!(
                "Analysis: {} pages scored, {} orphans, {} opportunities",
                report.pages_scored,
                report.orphans.len(),
                report.opportunities
            );
        }
        Ok(())
    }

    /// Persists one worker result
    fn persist(&self, db: &mut SqliteStorage, result: &WorkResult) -> Result<Persisted> {
        let entry = &result.entry;
        match &result.outcome {
            WorkOutcome::Released => {
                db.release(entry.id)?;
                Ok(Persisted::Released)
            }
            WorkOutcome::Failed { reason } => {
                db.mark_failed(entry.id, reason)?;
                Ok(Persisted::Failed(reason.clone()))
            }
            WorkOutcome::Broken {
                status_code,
                response_time_ms,
            } => {
                let empty = ExtractedPage::default();
                let record = self.page_record(entry, *status_code, *response_time_ms, &empty);
                db.upsert_page(&record)?;
                db.replace_links(self.session_id, &entry.normalized_url, &[])?;
                let reason = format!("HTTP {}", status_code);
                db.mark_failed(entry.id, &reason)?;
                Ok(Persisted::Failed(reason))
            }
            WorkOutcome::Fetched {
                status_code,
                response_time_ms,
                page,
            } => {
                let record = self.page_record(entry, *status_code, *response_time_ms, page);
                db.upsert_page(&record)?;

                let links: Vec<LinkRecord> = page
                    .links
                    .iter()
                    .map(|link| LinkRecord {
                        from_url: entry.normalized_url.clone(),
                        to_url: link.url.to_string(),
                        anchor_text: link.anchor_text.clone(),
                        is_internal: link.is_internal,
                        position: link.position,
                        nofollow: link.nofollow,
                    })
                    .collect();
                db.replace_links(self.session_id, &entry.normalized_url, &links)?;

                let child_depth = entry.depth + 1;
                if child_depth <= self.max_depth {
                    let children: Vec<NewFrontierEntry> = page
                        .links
                        .iter()
                        .filter(|link| link.is_internal && is_crawlable_resource(&link.url))
                        .map(|link| NewFrontierEntry {
                            url: link.url.to_string(),
                            normalized_url: link.url.to_string(),
                            depth: child_depth,
                            parent_url: Some(entry.normalized_url.clone()),
                            priority: DISCOVERED_PRIORITY,
                        })
                        .collect();
                    let added = db.enqueue(self.session_id, &children)?;
                    tracing::debug!(
                        "{}: {} links, {} new frontier entries",
                        entry.url,
                        links.len(),
                        added
                    );
                }

                db.mark_completed(entry.id)?;
                Ok(Persisted::Completed)
            }
        }
    }

    fn page_record(
        &self,
        entry: &FrontierEntry,
        status_code: u16,
        response_time_ms: u32,
        page: &ExtractedPage,
    ) -> PageRecord {
        let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        let signals = PageSignals {
            word_count: page.word_count,
            header_count: page.headers.len(),
            paragraph_count: page.paragraphs.len(),
            list_item_count: page.list_item_count,
            internal_link_count: page.internal_link_count(),
        };
        let page_type = Url::parse(&entry.normalized_url)
            .map(|u| classify_page(&u, &signals))
            .unwrap_or(PageType::Other);

        PageRecord {
            session_id: self.session_id,
            url: entry.url.clone(),
            normalized_url: entry.normalized_url.clone(),
            depth: entry.depth,
            status_code,
            title: page.title.clone(),
            meta_description: page.meta_description.clone(),
            content: page.content.clone(),
            word_count: page.word_count,
            page_type,
            headers: page.headers.clone(),
            paragraphs: page.paragraphs.clone(),
            h1_text: page.h1_text().map(str::to_string),
            keywords: top_keywords(&page.content, PAGE_KEYWORDS),
            internal_link_count: count(page.internal_link_count()),
            external_link_count: count(page.external_link_count()),
            content_link_count: count(page.content_link_count()),
            response_time_ms,
            link_equity_score: 0.0,
            health_score: 0.0,
            crawled_at: Utc::now().to_rfc3339(),
        }
    }
}

/// How a worker result was recorded
enum Persisted {
    Completed,
    Failed(String),
    Released,
}
