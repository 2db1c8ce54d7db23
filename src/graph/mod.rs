//! Link graph and equity engine
//!
//! Builds the internal adjacency list from persisted links and derives:
//! - Link equity (PageRank-style authority, scaled to 0-100)
//! - Health scores from fixed structural deductions
//! - Orphan pages

mod equity;
mod health;
mod orphans;

pub use equity::{compute_equity, DAMPING, ITERATIONS};
pub use health::{count_internal_outlinks, health_score};
pub use orphans::{detect_orphans, Orphan, OrphanKind};

use crate::storage::{LinkRecord, PageRecord};
use std::collections::{BTreeSet, HashMap};

/// Directed graph of internal links between crawled pages
///
/// Nodes are the normalized URLs of persisted pages. Edges are internal
/// links whose source and target are both nodes; self-links and repeated
/// links between the same pair collapse into nothing and a single edge.
#[derive(Debug, Default)]
pub struct LinkGraph {
    nodes: Vec<String>,
    index: HashMap<String, usize>,
    outbound: Vec<Vec<usize>>,
    inbound: Vec<Vec<usize>>,
}

impl LinkGraph {
    /// Builds the graph from a snapshot of pages and links
    pub fn build(pages: &[PageRecord], links: &[LinkRecord]) -> Self {
        let nodes: Vec<String> = pages
            .iter()
            .map(|p| p.normalized_url.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<String, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, url)| (url.clone(), i))
            .collect();

        let mut edges = BTreeSet::new();
        for link in links.iter().filter(|l| l.is_internal) {
            if let (Some(&from), Some(&to)) = (index.get(&link.from_url), index.get(&link.to_url)) {
                if from != to {
                    edges.insert((from, to));
                }
            }
        }

        let mut outbound = vec![Vec::new(); nodes.len()];
        let mut inbound = vec![Vec::new(); nodes.len()];
        for (from, to) in edges {
            outbound[from].push(to);
            inbound[to].push(from);
        }

        Self {
            nodes,
            index,
            outbound,
            inbound,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node URLs in index order
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub(crate) fn outbound(&self, node: usize) -> &[usize] {
        &self.outbound[node]
    }

    pub(crate) fn inbound(&self, node: usize) -> &[usize] {
        &self.inbound[node]
    }

    /// Number of distinct crawled pages this page links to
    pub fn out_degree(&self, url: &str) -> usize {
        self.index.get(url).map_or(0, |&i| self.outbound[i].len())
    }

    /// Number of distinct crawled pages linking to this page
    pub fn in_degree(&self, url: &str) -> usize {
        self.index.get(url).map_or(0, |&i| self.inbound[i].len())
    }

    /// True if `from` links to `to`
    pub fn has_link(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&from), Some(to)) => self.outbound[from].contains(to),
            _ => false,
        }
    }

    /// True if either page links to the other
    pub fn linked_either_way(&self, a: &str, b: &str) -> bool {
        self.has_link(a, b) || self.has_link(b, a)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::crawler::{LinkPosition, PageType};
    use crate::storage::{LinkRecord, PageRecord};

    pub fn page(url: &str, depth: u32) -> PageRecord {
        PageRecord {
            session_id: 1,
            url: url.to_string(),
            normalized_url: url.to_string(),
            depth,
            status_code: 200,
            title: Some("A page".to_string()),
            meta_description: None,
            content: "x".repeat(200),
            word_count: 40,
            page_type: PageType::Content,
            headers: Vec::new(),
            paragraphs: Vec::new(),
            h1_text: None,
            keywords: Vec::new(),
            internal_link_count: 0,
            external_link_count: 0,
            content_link_count: 0,
            response_time_ms: 0,
            link_equity_score: 0.0,
            health_score: 0.0,
            crawled_at: "2024-01-01T00:00:00Z".to_string(),
        }
    }

    pub fn link(from: &str, to: &str) -> LinkRecord {
        LinkRecord {
            from_url: from.to_string(),
            to_url: to.to_string(),
            anchor_text: String::new(),
            is_internal: true,
            position: LinkPosition::Content,
            nofollow: false,
        }
    }
}
