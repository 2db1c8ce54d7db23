//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::semantic::Opportunity;
use crate::state::SessionStatus;
use crate::storage::{
    FrontierEntry, LinkRecord, NewFrontierEntry, PageRecord, QueueCounts, SessionRecord,
};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Session not found: {0}")]
    SessionNotFound(i64),

    #[error("Invalid session transition: {from} -> {to}")]
    InvalidTransition {
        from: SessionStatus,
        to: SessionStatus,
    },

    #[error("Unknown {kind} value in database: {value}")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler and the
/// analysis pass. Every frontier query is scoped to one session.
pub trait Storage {
    // ===== Session Management =====

    /// Creates a new session in the `seeded` state
    ///
    /// # Returns
    ///
    /// The ID of the newly created session
    fn create_session(
        &mut self,
        start_url: &str,
        max_pages: u32,
        max_depth: u32,
        config_hash: &str,
    ) -> StorageResult<i64>;

    /// Gets a session by ID
    fn get_session(&self, session_id: i64) -> StorageResult<SessionRecord>;

    /// Gets the most recent session for a start URL, whatever its status
    fn latest_session(&self, start_url: &str) -> StorageResult<Option<SessionRecord>>;

    /// Gets the most recent non-terminal session for a start URL
    fn find_resumable_session(&self, start_url: &str) -> StorageResult<Option<SessionRecord>>;

    /// Moves a session to a new status
    ///
    /// Setting the current status again is a no-op. Illegal transitions
    /// return `StorageError::InvalidTransition`. Terminal statuses stamp
    /// `finished_at`.
    fn update_session_status(
        &mut self,
        session_id: i64,
        status: SessionStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()>;

    /// Records the number of pages crawled so far
    fn set_pages_crawled(&mut self, session_id: i64, pages_crawled: u32) -> StorageResult<()>;

    /// Flags a session so the running crawler stops at its next check
    fn request_stop(&mut self, session_id: i64) -> StorageResult<()>;

    /// Returns true if a stop has been requested for the session
    fn is_stop_requested(&self, session_id: i64) -> StorageResult<bool>;

    // ===== Frontier Management =====

    /// Adds entries to the frontier as `pending`
    ///
    /// Entries whose normalized URL already exists in the session are
    /// ignored, so repeated discovery never changes an entry's depth.
    ///
    /// # Returns
    ///
    /// The number of entries actually added
    fn enqueue(&mut self, session_id: i64, entries: &[NewFrontierEntry]) -> StorageResult<usize>;

    /// Atomically leases up to `limit` pending entries
    ///
    /// Entries are taken breadth-first (`depth ASC`, then priority, then age)
    /// and moved to `processing`. Two callers never receive the same entry.
    fn dequeue(&mut self, session_id: i64, limit: usize) -> StorageResult<Vec<FrontierEntry>>;

    /// Marks a processing entry as completed
    fn mark_completed(&mut self, entry_id: i64) -> StorageResult<()>;

    /// Marks a processing entry as failed with a reason
    fn mark_failed(&mut self, entry_id: i64, reason: &str) -> StorageResult<()>;

    /// Returns a processing entry to `pending` without counting an attempt
    fn release(&mut self, entry_id: i64) -> StorageResult<()>;

    /// Resets entries leased longer than `timeout` back to `pending`
    ///
    /// # Returns
    ///
    /// The number of entries reclaimed
    fn reclaim_stale(&mut self, session_id: i64, timeout: Duration) -> StorageResult<usize>;

    /// Counts frontier entries by status
    fn count_by_status(&self, session_id: i64) -> StorageResult<QueueCounts>;

    /// Gets every frontier entry of the session
    fn load_frontier(&self, session_id: i64) -> StorageResult<Vec<FrontierEntry>>;

    // ===== Pages and Links =====

    /// Inserts a page or overwrites the existing one with the same normalized URL
    ///
    /// Headers and paragraphs are replaced along with the page.
    fn upsert_page(&mut self, page: &PageRecord) -> StorageResult<()>;

    /// Replaces the outgoing links of `from_url`
    fn replace_links(
        &mut self,
        session_id: i64,
        from_url: &str,
        links: &[LinkRecord],
    ) -> StorageResult<()>;

    /// Counts pages of the session
    fn count_pages(&self, session_id: i64) -> StorageResult<u64>;

    /// Loads all pages of the session with their headers and paragraphs
    fn load_pages(&self, session_id: i64) -> StorageResult<Vec<PageRecord>>;

    /// Loads all links of the session
    fn load_links(&self, session_id: i64) -> StorageResult<Vec<LinkRecord>>;

    /// Writes equity and health scores, keyed by normalized URL
    fn update_page_scores(
        &mut self,
        session_id: i64,
        scores: &[(String, f64, f64)],
    ) -> StorageResult<()>;

    // ===== Opportunities =====

    /// Replaces the stored opportunities of the session
    fn replace_opportunities(
        &mut self,
        session_id: i64,
        opportunities: &[Opportunity],
    ) -> StorageResult<()>;

    /// Loads stored opportunities, best first
    fn load_opportunities(&self, session_id: i64) -> StorageResult<Vec<Opportunity>>;
}
