//! Output module for reporting crawl progress and results
//!
//! This module handles:
//! - Loading per-session statistics from storage
//! - Printing them for the polling CLI

pub mod stats;

pub use stats::{load_statistics, print_statistics, SessionStatistics};
