//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Crawl session tracking and resumption support
//! - Frontier queue management with processing leases
//! - Page, header, paragraph and link persistence
//! - Storage of computed link opportunities

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::crawler::{LinkPosition, PageType};
use crate::state::{FrontierStatus, SessionStatus};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Storage handle shared between the coordinator and its stop signal
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Locks shared storage, mapping a poisoned lock to `StorageError::LockPoisoned`
pub fn lock_storage(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage.lock().map_err(|_| StorageError::LockPoisoned)
}

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Represents a crawl session
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub id: i64,
    pub start_url: String,
    pub status: SessionStatus,
    pub max_pages: u32,
    pub max_depth: u32,
    pub pages_crawled: u32,
    pub stop_requested: bool,
    pub error_message: Option<String>,
    pub config_hash: String,
    pub started_at: String,
    pub finished_at: Option<String>,
}

/// A URL about to be added to the frontier
#[derive(Debug, Clone)]
pub struct NewFrontierEntry {
    pub url: String,
    pub normalized_url: String,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub priority: i32,
}

/// Represents a row of the frontier queue
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub id: i64,
    pub session_id: i64,
    pub url: String,
    pub normalized_url: String,
    pub depth: u32,
    pub parent_url: Option<String>,
    pub priority: i32,
    pub status: FrontierStatus,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Frontier entry counts by status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueCounts {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }

    /// True when nothing is waiting and nothing is leased
    pub fn is_drained(&self) -> bool {
        self.pending == 0 && self.processing == 0
    }
}

/// A heading extracted from a page
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderRecord {
    pub level: u8,
    pub text: String,
    pub position: u32,
}

/// A paragraph block extracted from a page
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphRecord {
    pub text: String,
    pub word_count: u32,
    pub position: u32,
}

/// Represents a crawled page
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub session_id: i64,
    pub url: String,
    pub normalized_url: String,
    pub depth: u32,
    pub status_code: u16,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub content: String,
    pub word_count: u32,
    pub page_type: PageType,
    pub headers: Vec<HeaderRecord>,
    pub paragraphs: Vec<ParagraphRecord>,
    /// Text of the first H1
    pub h1_text: Option<String>,
    /// Most frequent body terms
    pub keywords: Vec<String>,
    pub internal_link_count: u32,
    pub external_link_count: u32,
    /// Internal links inside the main content
    pub content_link_count: u32,
    pub response_time_ms: u32,
    pub link_equity_score: f64,
    pub health_score: f64,
    pub crawled_at: String,
}

impl PageRecord {
    pub fn has_h1(&self) -> bool {
        self.h1_text.is_some()
    }
}

/// Represents a hyperlink between two pages
#[derive(Debug, Clone, PartialEq)]
pub struct LinkRecord {
    pub from_url: String,
    pub to_url: String,
    pub anchor_text: String,
    pub is_internal: bool,
    pub position: LinkPosition,
    pub nofollow: bool,
}
