//! Configuration module for SiteGraph
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key except `crawl.start-url` has a default.
//!
//! # Example
//!
//! ```no_run
//! use sitegraph::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sitegraph.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawl.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{AnalysisConfig, Config, CrawlConfig, OutputConfig, UserAgentConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
