use serde::Deserialize;

/// Main configuration structure for SiteGraph
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawl: CrawlConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Builds a configuration with defaults for everything but the start URL
    pub fn for_start_url(start_url: impl Into<String>) -> Self {
        Self {
            crawl: CrawlConfig::new(start_url),
            user_agent: UserAgentConfig::default(),
            analysis: AnalysisConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlConfig {
    /// The URL the crawl starts from; its host defines "internal"
    pub start_url: String,

    /// Additional depth-0 URLs (for example taken from a sitemap)
    #[serde(default)]
    pub seeds: Vec<String>,

    /// Maximum number of pages to persist for a session
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Maximum link depth from the start URL
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Frontier entries dequeued per batch
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Parallel fetch workers within one batch
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long an entry may stay `processing` before it is reclaimed
    #[serde(default = "default_lease_timeout_secs")]
    pub lease_timeout_secs: u64,

    /// Whether robots.txt of the start host is honored
    #[serde(default = "default_true")]
    pub respect_robots: bool,

    /// Run equity and relevance analysis when a session completes
    #[serde(default = "default_true")]
    pub analyze_on_complete: bool,
}

impl CrawlConfig {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            seeds: Vec::new(),
            max_pages: default_max_pages(),
            max_depth: default_max_depth(),
            batch_size: default_batch_size(),
            concurrency: default_concurrency(),
            request_timeout_secs: default_request_timeout_secs(),
            lease_timeout_secs: default_lease_timeout_secs(),
            respect_robots: true,
            analyze_on_complete: true,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the user agent header: `Name/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SiteGraph".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: "https://example.com/bot".to_string(),
            contact_email: "bot@example.com".to_string(),
        }
    }
}

/// Thresholds for the relevance engine
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AnalysisConfig {
    /// Minimum page-level cosine similarity for a semantic match
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,

    /// Minimum paragraph-level cosine similarity for an insertion point
    #[serde(default = "default_paragraph_threshold")]
    pub paragraph_threshold: f64,

    /// Paragraphs shorter than this many characters are ignored
    #[serde(default = "default_min_paragraph_chars")]
    pub min_paragraph_chars: usize,

    /// Upper bound on stored opportunities per session
    #[serde(default = "default_max_opportunities")]
    pub max_opportunities: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            paragraph_threshold: default_paragraph_threshold(),
            min_paragraph_chars: default_min_paragraph_chars(),
            max_opportunities: default_max_opportunities(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "./sitegraph.db".to_string(),
        }
    }
}

fn default_max_pages() -> u32 {
    500
}

fn default_max_depth() -> u32 {
    5
}

fn default_batch_size() -> u32 {
    10
}

fn default_concurrency() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_lease_timeout_secs() -> u64 {
    120
}

fn default_true() -> bool {
    true
}

fn default_similarity_threshold() -> f64 {
    0.3
}

fn default_paragraph_threshold() -> f64 {
    0.4
}

fn default_min_paragraph_chars() -> usize {
    50
}

fn default_max_opportunities() -> usize {
    500
}
