//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the SiteGraph database.
//! Frontier timestamps are integer milliseconds so lease expiry can be compared
//! in SQL; session and page timestamps are RFC 3339 text.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Crawl sessions
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    start_url TEXT NOT NULL,
    status TEXT NOT NULL,
    max_pages INTEGER NOT NULL,
    max_depth INTEGER NOT NULL,
    pages_crawled INTEGER NOT NULL DEFAULT 0,
    stop_requested INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_start_url ON sessions(start_url);

-- Resumable URL queue
CREATE TABLE IF NOT EXISTS frontier (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    url TEXT NOT NULL,
    normalized_url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    parent_url TEXT,
    priority INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL,
    error_message TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    leased_at INTEGER,
    UNIQUE(session_id, normalized_url)
);

CREATE INDEX IF NOT EXISTS idx_frontier_dequeue ON frontier(session_id, status, depth, priority);

-- Crawled pages
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    url TEXT NOT NULL,
    normalized_url TEXT NOT NULL,
    depth INTEGER NOT NULL,
    status_code INTEGER NOT NULL,
    title TEXT,
    meta_description TEXT,
    content TEXT NOT NULL DEFAULT '',
    word_count INTEGER NOT NULL DEFAULT 0,
    page_type TEXT NOT NULL,
    h1_text TEXT,
    keywords TEXT NOT NULL DEFAULT '',
    internal_link_count INTEGER NOT NULL DEFAULT 0,
    external_link_count INTEGER NOT NULL DEFAULT 0,
    content_link_count INTEGER NOT NULL DEFAULT 0,
    response_time_ms INTEGER NOT NULL DEFAULT 0,
    link_equity_score REAL NOT NULL DEFAULT 0,
    health_score REAL NOT NULL DEFAULT 0,
    crawled_at TEXT NOT NULL,
    UNIQUE(session_id, normalized_url)
);

CREATE TABLE IF NOT EXISTS page_headers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    level INTEGER NOT NULL,
    text TEXT NOT NULL,
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_page_headers_page ON page_headers(page_id);

CREATE TABLE IF NOT EXISTS page_paragraphs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    page_id INTEGER NOT NULL REFERENCES pages(id) ON DELETE CASCADE,
    text TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    position INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_page_paragraphs_page ON page_paragraphs(page_id);

-- Hyperlinks found on crawled pages
CREATE TABLE IF NOT EXISTS links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    from_url TEXT NOT NULL,
    to_url TEXT NOT NULL,
    anchor_text TEXT NOT NULL,
    is_internal INTEGER NOT NULL,
    position_type TEXT NOT NULL,
    nofollow INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_links_from ON links(session_id, from_url);
CREATE INDEX IF NOT EXISTS idx_links_to ON links(session_id, to_url);

-- Suggested internal links
CREATE TABLE IF NOT EXISTS opportunities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id INTEGER NOT NULL REFERENCES sessions(id),
    from_url TEXT NOT NULL,
    to_url TEXT NOT NULL,
    suggested_anchor TEXT NOT NULL,
    similarity_score REAL NOT NULL,
    opportunity_type TEXT NOT NULL,
    priority TEXT NOT NULL,
    paragraph_index INTEGER,
    position TEXT,
    confidence REAL,
    match_strength TEXT
);

CREATE INDEX IF NOT EXISTS idx_opportunities_session ON opportunities(session_id);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
