//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `FrontierStatus`: lifecycle of a single frontier entry (pending, processing, completed, failed)
//! - `SessionStatus`: lifecycle of a crawl session (seeded, running, completed, stopped, failed)

mod frontier_status;
mod session_status;

pub use frontier_status::FrontierStatus;
pub use session_status::SessionStatus;
