use super::LinkGraph;
use crate::storage::{FrontierEntry, LinkRecord, PageRecord};
use crate::url::is_crawlable_resource;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use url::Url;

/// Why a page counts as an orphan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanKind {
    /// Known from a seed or an outlink but never persisted as a page
    NeverFetched,
    /// Persisted, but no other crawled page links to it
    NoInboundLinks,
}

impl fmt::Display for OrphanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrphanKind::NeverFetched => write!(f, "never fetched"),
            OrphanKind::NoInboundLinks => write!(f, "no inbound links"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub url: String,
    pub kind: OrphanKind,
}

/// Finds orphan pages in a session snapshot
///
/// The start URL is the root of the crawl and is never reported as lacking
/// inbound links. Extra seeds are, since a seed page nothing links to is
/// exactly the kind of page this report exists to surface.
pub fn detect_orphans(
    start_url: &str,
    pages: &[PageRecord],
    frontier: &[FrontierEntry],
    links: &[LinkRecord],
    graph: &LinkGraph,
) -> Vec<Orphan> {
    let fetched: HashSet<&str> = pages.iter().map(|p| p.normalized_url.as_str()).collect();

    let mut known: BTreeSet<&str> = frontier.iter().map(|e| e.normalized_url.as_str()).collect();
    for link in links.iter().filter(|l| l.is_internal) {
        let crawlable = Url::parse(&link.to_url)
            .map(|u| is_crawlable_resource(&u))
            .unwrap_or(false);
        if crawlable {
            known.insert(link.to_url.as_str());
        }
    }

    let mut orphans: Vec<Orphan> = known
        .into_iter()
        .filter(|url| !fetched.contains(url))
        .map(|url| Orphan {
            url: url.to_string(),
            kind: OrphanKind::NeverFetched,
        })
        .collect();

    for url in graph.nodes() {
        if url != start_url && graph.in_degree(url) == 0 {
            orphans.push(Orphan {
                url: url.clone(),
                kind: OrphanKind::NoInboundLinks,
            });
        }
    }

    orphans
}
