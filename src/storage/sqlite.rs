//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::{LinkPosition, PageType};
use crate::semantic::{
    InsertPosition, InsertionPoint, MatchStrength, Opportunity, OpportunityType, Priority,
};
use crate::state::{FrontierStatus, SessionStatus};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    FrontierEntry, HeaderRecord, LinkRecord, NewFrontierEntry, PageRecord, ParagraphRecord,
    QueueCounts, SessionRecord,
};
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

const SESSION_COLUMNS: &str = "id, start_url, status, max_pages, max_depth, pages_crawled,
    stop_requested, error_message, config_hash, started_at, finished_at";

/// Keywords are stored as one comma-separated column; terms never contain commas
const KEYWORD_SEPARATOR: &str = ",";

const FRONTIER_COLUMNS: &str = "id, session_id, url, normalized_url, depth, parent_url,
    priority, status, error_message, created_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Decodes an enum stored as text, surfacing unknown values as a conversion error
fn decode<T>(
    idx: usize,
    kind: &'static str,
    value: String,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(StorageError::UnknownValue { kind, value }),
        )
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get(0)?,
        start_url: row.get(1)?,
        status: decode(2, "session status", row.get(2)?, SessionStatus::from_db_string)?,
        max_pages: row.get(3)?,
        max_depth: row.get(4)?,
        pages_crawled: row.get(5)?,
        stop_requested: row.get(6)?,
        error_message: row.get(7)?,
        config_hash: row.get(8)?,
        started_at: row.get(9)?,
        finished_at: row.get(10)?,
    })
}

fn frontier_from_row(row: &Row<'_>) -> rusqlite::Result<FrontierEntry> {
    Ok(FrontierEntry {
        id: row.get(0)?,
        session_id: row.get(1)?,
        url: row.get(2)?,
        normalized_url: row.get(3)?,
        depth: row.get(4)?,
        parent_url: row.get(5)?,
        priority: row.get(6)?,
        status: decode(7, "frontier status", row.get(7)?, FrontierStatus::from_db_string)?,
        error_message: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Session Management =====

    fn create_session(
        &mut self,
        start_url: &str,
        max_pages: u32,
        max_depth: u32,
        config_hash: &str,
    ) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO sessions (start_url, status, max_pages, max_depth, config_hash, started_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                start_url,
                SessionStatus::Seeded.to_db_string(),
                max_pages,
                max_depth,
                config_hash,
                now
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_session(&self, session_id: i64) -> StorageResult<SessionRecord> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                params![session_id],
                session_from_row,
            )
            .optional()?
            .ok_or(StorageError::SessionNotFound(session_id))
    }

    fn latest_session(&self, start_url: &str) -> StorageResult<Option<SessionRecord>> {
        let session = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM sessions WHERE start_url = ?1 ORDER BY id DESC LIMIT 1",
                    SESSION_COLUMNS
                ),
                params![start_url],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    fn find_resumable_session(&self, start_url: &str) -> StorageResult<Option<SessionRecord>> {
        let session = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM sessions
                     WHERE start_url = ?1 AND status IN (?2, ?3)
                     ORDER BY id DESC LIMIT 1",
                    SESSION_COLUMNS
                ),
                params![
                    start_url,
                    SessionStatus::Seeded.to_db_string(),
                    SessionStatus::Running.to_db_string()
                ],
                session_from_row,
            )
            .optional()?;
        Ok(session)
    }

    fn update_session_status(
        &mut self,
        session_id: i64,
        status: SessionStatus,
        error_message: Option<&str>,
    ) -> StorageResult<()> {
        let current = self.get_session(session_id)?.status;
        if current == status {
            return Ok(());
        }
        if !current.can_transition_to(status) {
            return Err(StorageError::InvalidTransition {
                from: current,
                to: status,
            });
        }

        let finished_at = status.is_terminal().then(|| Utc::now().to_rfc3339());
        self.conn.execute(
            "UPDATE sessions
             SET status = ?1, error_message = COALESCE(?2, error_message),
                 finished_at = COALESCE(?3, finished_at)
             WHERE id = ?4",
            params![status.to_db_string(), error_message, finished_at, session_id],
        )?;
        Ok(())
    }

    fn set_pages_crawled(&mut self, session_id: i64, pages_crawled: u32) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE sessions SET pages_crawled = ?1 WHERE id = ?2",
            params![pages_crawled, session_id],
        )?;
        Ok(())
    }

    fn request_stop(&mut self, session_id: i64) -> StorageResult<()> {
        let changed = self.conn.execute(
            "UPDATE sessions SET stop_requested = 1 WHERE id = ?1",
            params![session_id],
        )?;
        if changed == 0 {
            return Err(StorageError::SessionNotFound(session_id));
        }
        Ok(())
    }

    fn is_stop_requested(&self, session_id: i64) -> StorageResult<bool> {
        let flag: Option<bool> = self
            .conn
            .query_row(
                "SELECT stop_requested FROM sessions WHERE id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()?;
        flag.ok_or(StorageError::SessionNotFound(session_id))
    }

    // ===== Frontier Management =====

    fn enqueue(&mut self, session_id: i64, entries: &[NewFrontierEntry]) -> StorageResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let now = now_millis();
        let tx = self.conn.transaction()?;
        let mut added = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO frontier
                 (session_id, url, normalized_url, depth, parent_url, priority, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            )?;
            for entry in entries {
                added += stmt.execute(params![
                    session_id,
                    entry.url,
                    entry.normalized_url,
                    entry.depth,
                    entry.parent_url,
                    entry.priority,
                    FrontierStatus::Pending.to_db_string(),
                    now
                ])?;
            }
        }
        tx.commit()?;
        Ok(added)
    }

    fn dequeue(&mut self, session_id: i64, limit: usize) -> StorageResult<Vec<FrontierEntry>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let now = now_millis();
        // IMMEDIATE takes the write lock up front so concurrent dequeuers serialize.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let candidates = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {} FROM frontier
                 WHERE session_id = ?1 AND status = ?2
                 ORDER BY depth ASC, priority DESC, created_at ASC, id ASC
                 LIMIT ?3",
                FRONTIER_COLUMNS
            ))?;
            let rows = stmt.query_map(
                params![
                    session_id,
                    FrontierStatus::Pending.to_db_string(),
                    limit as i64
                ],
                frontier_from_row,
            )?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let mut leased = Vec::with_capacity(candidates.len());
        for mut entry in candidates {
            let changed = tx.execute(
                "UPDATE frontier SET status = ?1, leased_at = ?2, updated_at = ?2
                 WHERE id = ?3 AND status = ?4",
                params![
                    FrontierStatus::Processing.to_db_string(),
                    now,
                    entry.id,
                    FrontierStatus::Pending.to_db_string()
                ],
            )?;
            if changed == 1 {
                entry.status = FrontierStatus::Processing;
                entry.updated_at = now;
                leased.push(entry);
            }
        }

        tx.commit()?;
        Ok(leased)
    }

    fn mark_completed(&mut self, entry_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE frontier SET status = ?1, leased_at = NULL, updated_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![
                FrontierStatus::Completed.to_db_string(),
                now_millis(),
                entry_id,
                FrontierStatus::Processing.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn mark_failed(&mut self, entry_id: i64, reason: &str) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE frontier SET status = ?1, error_message = ?2, leased_at = NULL, updated_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                FrontierStatus::Failed.to_db_string(),
                reason,
                now_millis(),
                entry_id,
                FrontierStatus::Processing.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn release(&mut self, entry_id: i64) -> StorageResult<()> {
        self.conn.execute(
            "UPDATE frontier SET status = ?1, leased_at = NULL, updated_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![
                FrontierStatus::Pending.to_db_string(),
                now_millis(),
                entry_id,
                FrontierStatus::Processing.to_db_string()
            ],
        )?;
        Ok(())
    }

    fn reclaim_stale(&mut self, session_id: i64, timeout: Duration) -> StorageResult<usize> {
        let now = now_millis();
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(timeout_ms);

        let reclaimed = self.conn.execute(
            "UPDATE frontier SET status = ?1, leased_at = NULL, updated_at = ?2
             WHERE session_id = ?3 AND status = ?4
               AND (leased_at IS NULL OR leased_at <= ?5)",
            params![
                FrontierStatus::Pending.to_db_string(),
                now,
                session_id,
                FrontierStatus::Processing.to_db_string(),
                cutoff
            ],
        )?;
        Ok(reclaimed)
    }

    fn count_by_status(&self, session_id: i64) -> StorageResult<QueueCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM frontier WHERE session_id = ?1 GROUP BY status")?;
        let rows = stmt.query_map(params![session_id], |row| {
            let status = decode(0, "frontier status", row.get(0)?, FrontierStatus::from_db_string)?;
            let count: i64 = row.get(1)?;
            Ok((status, count as u64))
        })?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let (status, count) = row?;
            match status {
                FrontierStatus::Pending => counts.pending = count,
                FrontierStatus::Processing => counts.processing = count,
                FrontierStatus::Completed => counts.completed = count,
                FrontierStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }

    fn load_frontier(&self, session_id: i64) -> StorageResult<Vec<FrontierEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM frontier WHERE session_id = ?1 ORDER BY id",
            FRONTIER_COLUMNS
        ))?;
        let rows = stmt.query_map(params![session_id], frontier_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    // ===== Pages and Links =====

    fn upsert_page(&mut self, page: &PageRecord) -> StorageResult<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO pages (session_id, url, normalized_url, depth, status_code, title,
                 meta_description, content, word_count, page_type, h1_text, keywords,
                 internal_link_count, external_link_count, content_link_count,
                 response_time_ms, link_equity_score, health_score, crawled_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                 ?17, ?18, ?19)
             ON CONFLICT(session_id, normalized_url) DO UPDATE SET
                 url = excluded.url,
                 depth = excluded.depth,
                 status_code = excluded.status_code,
                 title = excluded.title,
                 meta_description = excluded.meta_description,
                 content = excluded.content,
                 word_count = excluded.word_count,
                 page_type = excluded.page_type,
                 h1_text = excluded.h1_text,
                 keywords = excluded.keywords,
                 internal_link_count = excluded.internal_link_count,
                 external_link_count = excluded.external_link_count,
                 content_link_count = excluded.content_link_count,
                 response_time_ms = excluded.response_time_ms,
                 crawled_at = excluded.crawled_at",
            params![
                page.session_id,
                page.url,
                page.normalized_url,
                page.depth,
                page.status_code,
                page.title,
                page.meta_description,
                page.content,
                page.word_count,
                page.page_type.to_db_string(),
                page.h1_text,
                page.keywords.join(KEYWORD_SEPARATOR),
                page.internal_link_count,
                page.external_link_count,
                page.content_link_count,
                page.response_time_ms,
                page.link_equity_score,
                page.health_score,
                page.crawled_at
            ],
        )?;

        let page_id: i64 = tx.query_row(
            "SELECT id FROM pages WHERE session_id = ?1 AND normalized_url = ?2",
            params![page.session_id, page.normalized_url],
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM page_headers WHERE page_id = ?1", params![page_id])?;
        tx.execute(
            "DELETE FROM page_paragraphs WHERE page_id = ?1",
            params![page_id],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO page_headers (page_id, level, text, position) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for header in &page.headers {
                stmt.execute(params![page_id, header.level, header.text, header.position])?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO page_paragraphs (page_id, text, word_count, position)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for paragraph in &page.paragraphs {
                stmt.execute(params![
                    page_id,
                    paragraph.text,
                    paragraph.word_count,
                    paragraph.position
                ])?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn replace_links(
        &mut self,
        session_id: i64,
        from_url: &str,
        links: &[LinkRecord],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM links WHERE session_id = ?1 AND from_url = ?2",
            params![session_id, from_url],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO links (session_id, from_url, to_url, anchor_text, is_internal,
                     position_type, nofollow)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for link in links {
                stmt.execute(params![
                    session_id,
                    from_url,
                    link.to_url,
                    link.anchor_text,
                    link.is_internal,
                    link.position.to_db_string(),
                    link.nofollow
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn count_pages(&self, session_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn load_pages(&self, session_id: i64) -> StorageResult<Vec<PageRecord>> {
        let mut headers: HashMap<i64, Vec<HeaderRecord>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT h.page_id, h.level, h.text, h.position
                 FROM page_headers h JOIN pages p ON p.id = h.page_id
                 WHERE p.session_id = ?1
                 ORDER BY h.page_id, h.position",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    HeaderRecord {
                        level: row.get(1)?,
                        text: row.get(2)?,
                        position: row.get(3)?,
                    },
                ))
            })?;
            for row in rows {
                let (page_id, header) = row?;
                headers.entry(page_id).or_default().push(header);
            }
        }

        let mut paragraphs: HashMap<i64, Vec<ParagraphRecord>> = HashMap::new();
        {
            let mut stmt = self.conn.prepare(
                "SELECT g.page_id, g.text, g.word_count, g.position
                 FROM page_paragraphs g JOIN pages p ON p.id = g.page_id
                 WHERE p.session_id = ?1
                 ORDER BY g.page_id, g.position",
            )?;
            let rows = stmt.query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    ParagraphRecord {
                        text: row.get(1)?,
                        word_count: row.get(2)?,
                        position: row.get(3)?,
                    },
                ))
            })?;
            for row in rows {
                let (page_id, paragraph) = row?;
                paragraphs.entry(page_id).or_default().push(paragraph);
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, url, normalized_url, depth, status_code, title,
                 meta_description, content, word_count, page_type, link_equity_score,
                 health_score, crawled_at, h1_text, keywords, internal_link_count,
                 external_link_count, content_link_count, response_time_ms
             FROM pages WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            let id: i64 = row.get(0)?;
            let keywords: String = row.get(15)?;
            Ok((
                id,
                PageRecord {
                    session_id: row.get(1)?,
                    url: row.get(2)?,
                    normalized_url: row.get(3)?,
                    depth: row.get(4)?,
                    status_code: row.get(5)?,
                    title: row.get(6)?,
                    meta_description: row.get(7)?,
                    content: row.get(8)?,
                    word_count: row.get(9)?,
                    page_type: decode(10, "page type", row.get(10)?, PageType::from_db_string)?,
                    headers: Vec::new(),
                    paragraphs: Vec::new(),
                    h1_text: row.get(14)?,
                    keywords: keywords
                        .split(KEYWORD_SEPARATOR)
                        .filter(|k| !k.is_empty())
                        .map(str::to_string)
                        .collect(),
                    internal_link_count: row.get(16)?,
                    external_link_count: row.get(17)?,
                    content_link_count: row.get(18)?,
                    response_time_ms: row.get(19)?,
                    link_equity_score: row.get(11)?,
                    health_score: row.get(12)?,
                    crawled_at: row.get(13)?,
                },
            ))
        })?;

        let mut pages = Vec::new();
        for row in rows {
            let (id, mut page) = row?;
            page.headers = headers.remove(&id).unwrap_or_default();
            page.paragraphs = paragraphs.remove(&id).unwrap_or_default();
            pages.push(page);
        }
        Ok(pages)
    }

    fn load_links(&self, session_id: i64) -> StorageResult<Vec<LinkRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT from_url, to_url, anchor_text, is_internal, position_type, nofollow
             FROM links WHERE session_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            Ok(LinkRecord {
                from_url: row.get(0)?,
                to_url: row.get(1)?,
                anchor_text: row.get(2)?,
                is_internal: row.get(3)?,
                position: decode(4, "link position", row.get(4)?, LinkPosition::from_db_string)?,
                nofollow: row.get(5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn update_page_scores(
        &mut self,
        session_id: i64,
        scores: &[(String, f64, f64)],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "UPDATE pages SET link_equity_score = ?1, health_score = ?2
                 WHERE session_id = ?3 AND normalized_url = ?4",
            )?;
            for (url, equity, health) in scores {
                stmt.execute(params![equity, health, session_id, url])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // ===== Opportunities =====

    fn replace_opportunities(
        &mut self,
        session_id: i64,
        opportunities: &[Opportunity],
    ) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM opportunities WHERE session_id = ?1",
            params![session_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO opportunities (session_id, from_url, to_url, suggested_anchor,
                     similarity_score, opportunity_type, priority, paragraph_index, position,
                     confidence, match_strength)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for opp in opportunities {
                let insertion = opp.insertion.as_ref();
                stmt.execute(params![
                    session_id,
                    opp.from_url,
                    opp.to_url,
                    opp.suggested_anchor,
                    opp.similarity,
                    opp.opportunity_type.to_db_string(),
                    opp.priority.to_db_string(),
                    insertion.map(|i| i.paragraph_index as i64),
                    insertion.map(|i| i.position.to_db_string()),
                    insertion.map(|i| i.confidence),
                    insertion.map(|i| i.strength.to_db_string())
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_opportunities(&self, session_id: i64) -> StorageResult<Vec<Opportunity>> {
        let mut stmt = self.conn.prepare(
            "SELECT from_url, to_url, suggested_anchor, similarity_score, opportunity_type,
                 priority, paragraph_index, position, confidence, match_strength
             FROM opportunities WHERE session_id = ?1
             ORDER BY CASE priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END,
                 similarity_score DESC, id",
        )?;
        let rows = stmt.query_map(params![session_id], |row| {
            let paragraph_index: Option<i64> = row.get(6)?;
            let position: Option<String> = row.get(7)?;
            let confidence: Option<f64> = row.get(8)?;
            let strength: Option<String> = row.get(9)?;

            let insertion = match (paragraph_index, position, confidence, strength) {
                (Some(index), Some(position), Some(confidence), Some(strength)) => {
                    Some(InsertionPoint {
                        paragraph_index: index as usize,
                        position: decode(
                            7,
                            "insert position",
                            position,
                            InsertPosition::from_db_string,
                        )?,
                        confidence,
                        strength: decode(9, "match strength", strength, MatchStrength::from_db_string)?,
                    })
                }
                _ => None,
            };

            Ok(Opportunity {
                from_url: row.get(0)?,
                to_url: row.get(1)?,
                suggested_anchor: row.get(2)?,
                similarity: row.get(3)?,
                opportunity_type: decode(
                    4,
                    "opportunity type",
                    row.get(4)?,
                    OpportunityType::from_db_string,
                )?,
                priority: decode(5, "priority", row.get(5)?, Priority::from_db_string)?,
                insertion,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    fn new_entry(url: &str, depth: u32) -> NewFrontierEntry {
        NewFrontierEntry {
            url: url.to_string(),
            normalized_url: url.to_string(),
            depth,
            parent_url: None,
            priority: 50,
        }
    }

    fn setup() -> (SqliteStorage, i64) {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let session = storage
            .create_session("https://x.test/", 100, 3, "hash")
            .unwrap();
        (storage, session)
    }

    fn sample_page(session_id: i64, url: &str) -> PageRecord {
        PageRecord {
            session_id,
            url: url.to_string(),
            normalized_url: url.to_string(),
            depth: 0,
            status_code: 200,
            title: Some("Home".to_string()),
            meta_description: None,
            content: "Welcome to the site".to_string(),
            word_count: 4,
            page_type: PageType::Homepage,
            headers: vec![HeaderRecord {
                level: 1,
                text: "Welcome".to_string(),
                position: 0,
            }],
            paragraphs: vec![ParagraphRecord {
                text: "Welcome to the site".to_string(),
                word_count: 4,
                position: 0,
            }],
            h1_text: Some("Welcome".to_string()),
            keywords: vec!["welcome".to_string(), "site".to_string()],
            internal_link_count: 3,
            external_link_count: 1,
            content_link_count: 2,
            response_time_ms: 42,
            link_equity_score: 0.0,
            health_score: 0.0,
            crawled_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_create_session_starts_seeded() {
        let (storage, session) = setup();
        let record = storage.get_session(session).unwrap();
        assert_eq!(record.status, SessionStatus::Seeded);
        assert_eq!(record.max_pages, 100);
        assert!(!record.stop_requested);
    }

    #[test]
    fn test_get_missing_session() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert!(matches!(
            storage.get_session(42).unwrap_err(),
            StorageError::SessionNotFound(42)
        ));
    }

    #[test]
    fn test_session_transitions() {
        let (mut storage, session) = setup();

        storage
            .update_session_status(session, SessionStatus::Running, None)
            .unwrap();
        storage
            .update_session_status(session, SessionStatus::Completed, None)
            .unwrap();

        let record = storage.get_session(session).unwrap();
        assert_eq!(record.status, SessionStatus::Completed);
        assert!(record.finished_at.is_some());

        let err = storage
            .update_session_status(session, SessionStatus::Running, None)
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidTransition { .. }));
    }

    #[test]
    fn test_find_resumable_session_skips_terminal() {
        let (mut storage, session) = setup();
        assert_eq!(
            storage
                .find_resumable_session("https://x.test/")
                .unwrap()
                .map(|s| s.id),
            Some(session)
        );

        storage
            .update_session_status(session, SessionStatus::Stopped, None)
            .unwrap();
        assert!(storage
            .find_resumable_session("https://x.test/")
            .unwrap()
            .is_none());
        assert_eq!(
            storage
                .latest_session("https://x.test/")
                .unwrap()
                .map(|s| s.status),
            Some(SessionStatus::Stopped)
        );
    }

    #[test]
    fn test_stop_request() {
        let (mut storage, session) = setup();
        assert!(!storage.is_stop_requested(session).unwrap());
        storage.request_stop(session).unwrap();
        assert!(storage.is_stop_requested(session).unwrap());
    }

    #[test]
    fn test_enqueue_is_idempotent() {
        let (mut storage, session) = setup();
        let entries = vec![new_entry("https://x.test/", 0), new_entry("https://x.test/a", 1)];

        assert_eq!(storage.enqueue(session, &entries).unwrap(), 2);
        assert_eq!(storage.enqueue(session, &entries).unwrap(), 0);

        // Rediscovery at a deeper level never changes the recorded depth
        assert_eq!(
            storage
                .enqueue(session, &[new_entry("https://x.test/a", 3)])
                .unwrap(),
            0
        );
        let frontier = storage.load_frontier(session).unwrap();
        assert_eq!(frontier.len(), 2);
        assert_eq!(frontier[1].depth, 1);
    }

    #[test]
    fn test_enqueue_is_scoped_to_session() {
        let (mut storage, first) = setup();
        let second = storage
            .create_session("https://x.test/", 100, 3, "hash")
            .unwrap();
        let entries = vec![new_entry("https://x.test/", 0)];

        assert_eq!(storage.enqueue(first, &entries).unwrap(), 1);
        assert_eq!(storage.enqueue(second, &entries).unwrap(), 1);
    }

    #[test]
    fn test_dequeue_breadth_first() {
        let (mut storage, session) = setup();
        storage
            .enqueue(
                session,
                &[
                    new_entry("https://x.test/deep", 2),
                    new_entry("https://x.test/mid", 1),
                    new_entry("https://x.test/", 0),
                ],
            )
            .unwrap();

        let batch = storage.dequeue(session, 2).unwrap();
        let depths: Vec<u32> = batch.iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1]);
        assert!(batch.iter().all(|e| e.status == FrontierStatus::Processing));

        let counts = storage.count_by_status(session).unwrap();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.processing, 2);
    }

    #[test]
    fn test_dequeue_never_returns_leased_entries() {
        let (mut storage, session) = setup();
        storage
            .enqueue(
                session,
                &[new_entry("https://x.test/", 0), new_entry("https://x.test/a", 1)],
            )
            .unwrap();

        let first = storage.dequeue(session, 10).unwrap();
        let second = storage.dequeue(session, 10).unwrap();
        assert_eq!(first.len(), 2);
        assert!(second.is_empty());
    }

    #[test]
    fn test_separate_connections_lease_disjoint_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.db");
        let mut storage = SqliteStorage::new(&path).unwrap();
        let session = storage
            .create_session("https://x.test/", 100, 3, "hash")
            .unwrap();
        let entries: Vec<NewFrontierEntry> = (0..40)
            .map(|i| new_entry(&format!("https://x.test/p{}", i), 1))
            .collect();
        storage.enqueue(session, &entries).unwrap();

        // Two invocations, each with its own connection, draining the same session.
        let connections = vec![
            SqliteStorage::new(&path).unwrap(),
            SqliteStorage::new(&path).unwrap(),
        ];
        let workers: Vec<_> = connections
            .into_iter()
            .map(|mut conn| {
                thread::spawn(move || {
                    let mut ids = Vec::new();
                    loop {
                        let batch = conn.dequeue(session, 3).unwrap();
                        if batch.is_empty() {
                            break;
                        }
                        ids.extend(batch.iter().map(|e| e.id));
                    }
                    ids
                })
            })
            .collect();
        let leased: Vec<Vec<i64>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        let total: usize = leased.iter().map(Vec::len).sum();
        let unique: HashSet<i64> = leased.iter().flatten().copied().collect();
        assert_eq!(unique.len(), total, "an entry was leased twice");
        assert_eq!(unique.len(), 40);

        let counts = storage.count_by_status(session).unwrap();
        assert_eq!(counts.pending, 0);
        assert_eq!(counts.processing, 40);
    }

    #[test]
    fn test_interleaved_connections_never_share_a_lease() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crawl.db");
        let mut first = SqliteStorage::new(&path).unwrap();
        let mut second = SqliteStorage::new(&path).unwrap();
        let session = first
            .create_session("https://x.test/", 100, 3, "hash")
            .unwrap();
        let entries: Vec<NewFrontierEntry> = (0..5)
            .map(|i| new_entry(&format!("https://x.test/p{}", i), 1))
            .collect();
        first.enqueue(session, &entries).unwrap();

        let a = first.dequeue(session, 2).unwrap();
        let b = second.dequeue(session, 2).unwrap();
        let c = first.dequeue(session, 2).unwrap();
        assert!(second.dequeue(session, 2).unwrap().is_empty());

        let ids: Vec<i64> = a.iter().chain(&b).chain(&c).map(|e| e.id).collect();
        let unique: HashSet<i64> = ids.iter().copied().collect();
        assert_eq!(ids.len(), 5);
        assert_eq!(unique.len(), 5);
    }

    #[test]
    fn test_mark_completed_and_failed() {
        let (mut storage, session) = setup();
        storage
            .enqueue(
                session,
                &[new_entry("https://x.test/", 0), new_entry("https://x.test/a", 1)],
            )
            .unwrap();
        let batch = storage.dequeue(session, 10).unwrap();

        storage.mark_completed(batch[0].id).unwrap();
        storage.mark_failed(batch[1].id, "HTTP 404").unwrap();

        let counts = storage.count_by_status(session).unwrap();
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 1);
        assert!(counts.is_drained());

        let frontier = storage.load_frontier(session).unwrap();
        assert_eq!(frontier[1].error_message.as_deref(), Some("HTTP 404"));
    }

    #[test]
    fn test_reclaim_stale_respects_timeout() {
        let (mut storage, session) = setup();
        storage
            .enqueue(session, &[new_entry("https://x.test/", 0)])
            .unwrap();
        storage.dequeue(session, 1).unwrap();

        // A fresh lease is not stale yet
        assert_eq!(
            storage
                .reclaim_stale(session, Duration::from_secs(3600))
                .unwrap(),
            0
        );

        assert_eq!(storage.reclaim_stale(session, Duration::ZERO).unwrap(), 1);
        let again = storage.dequeue(session, 1).unwrap();
        assert_eq!(again.len(), 1);
        assert_eq!(again[0].url, "https://x.test/");
    }

    #[test]
    fn test_release_returns_entry_to_pending() {
        let (mut storage, session) = setup();
        storage
            .enqueue(session, &[new_entry("https://x.test/", 0)])
            .unwrap();
        let batch = storage.dequeue(session, 1).unwrap();

        storage.release(batch[0].id).unwrap();
        assert_eq!(storage.count_by_status(session).unwrap().pending, 1);
    }

    #[test]
    fn test_upsert_page_overwrites() {
        let (mut storage, session) = setup();
        let mut page = sample_page(session, "https://x.test/");
        storage.upsert_page(&page).unwrap();

        page.title = Some("Home v2".to_string());
        page.headers.push(HeaderRecord {
            level: 2,
            text: "More".to_string(),
            position: 1,
        });
        storage.upsert_page(&page).unwrap();

        assert_eq!(storage.count_pages(session).unwrap(), 1);
        let pages = storage.load_pages(session).unwrap();
        assert_eq!(pages[0].title.as_deref(), Some("Home v2"));
        assert_eq!(pages[0].headers.len(), 2);
        assert_eq!(pages[0].paragraphs.len(), 1);
        assert_eq!(pages[0].page_type, PageType::Homepage);
        assert!(pages[0].has_h1());
        assert_eq!(pages[0].keywords, vec!["welcome", "site"]);
        assert_eq!(pages[0].internal_link_count, 3);
        assert_eq!(pages[0].external_link_count, 1);
        assert_eq!(pages[0].content_link_count, 2);
        assert_eq!(pages[0].response_time_ms, 42);
    }

    #[test]
    fn test_replace_links() {
        let (mut storage, session) = setup();
        let link = |to: &str| LinkRecord {
            from_url: "https://x.test/".to_string(),
            to_url: to.to_string(),
            anchor_text: "go".to_string(),
            is_internal: true,
            position: LinkPosition::Content,
            nofollow: false,
        };

        storage
            .replace_links(
                session,
                "https://x.test/",
                &[link("https://x.test/a"), link("https://x.test/b")],
            )
            .unwrap();
        storage
            .replace_links(session, "https://x.test/", &[link("https://x.test/c")])
            .unwrap();

        let links = storage.load_links(session).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].to_url, "https://x.test/c");
    }

    #[test]
    fn test_update_page_scores() {
        let (mut storage, session) = setup();
        storage
            .upsert_page(&sample_page(session, "https://x.test/"))
            .unwrap();
        storage
            .update_page_scores(session, &[("https://x.test/".to_string(), 100.0, 80.0)])
            .unwrap();

        let pages = storage.load_pages(session).unwrap();
        assert_eq!(pages[0].link_equity_score, 100.0);
        assert_eq!(pages[0].health_score, 80.0);
    }

    #[test]
    fn test_opportunities_are_replaced_and_ordered() {
        let (mut storage, session) = setup();
        let opp = |to: &str, similarity: f64, priority: Priority| Opportunity {
            from_url: "https://x.test/".to_string(),
            to_url: to.to_string(),
            suggested_anchor: "anchor".to_string(),
            similarity,
            opportunity_type: OpportunityType::SemanticMatch,
            priority,
            insertion: None,
        };

        storage
            .replace_opportunities(session, &[opp("https://x.test/old", 0.9, Priority::High)])
            .unwrap();

        let mut with_point = opp("https://x.test/b", 0.4, Priority::Low);
        with_point.insertion = Some(InsertionPoint {
            paragraph_index: 2,
            position: InsertPosition::Middle,
            confidence: 0.45,
            strength: MatchStrength::Low,
        });
        storage
            .replace_opportunities(
                session,
                &[with_point, opp("https://x.test/a", 0.75, Priority::High)],
            )
            .unwrap();

        let loaded = storage.load_opportunities(session).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].to_url, "https://x.test/a");
        let point = loaded[1].insertion.as_ref().unwrap();
        assert_eq!(point.paragraph_index, 2);
        assert_eq!(point.position, InsertPosition::Middle);
        assert_eq!(point.strength, MatchStrength::Low);
        assert!(loaded[0].insertion.is_none());
    }
}
