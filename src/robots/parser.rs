//! Robots.txt matching on top of the robotstxt crate

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data
///
/// Matching is delegated to `robotstxt::DefaultMatcher`, which implements
/// Google's longest-match semantics.
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    content: String,
    allow_all: bool,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Creates a permissive ParsedRobots that allows everything
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Returns true if this instance permits every URL without matching
    pub fn is_allow_all(&self) -> bool {
        self.allow_all || self.content.trim().is_empty()
    }

    /// Checks if a URL is allowed for the given user agent token
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path to check
    /// * `user_agent` - Product token of the crawler (e.g. `SiteGraph`)
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.is_allow_all() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, user_agent, url)
    }
}
