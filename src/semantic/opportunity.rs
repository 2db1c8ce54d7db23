//! Link opportunity generation
//!
//! Pages and paragraphs are turned into TF-IDF vectors over the page corpus.
//! Four passes then propose links:
//! - `semantic_match` for similar page pairs not yet linked
//! - `orphan_fix` from the strongest pages to pages nothing links to
//! - `depth_fix` from shallow pages to pages buried deeper than two clicks
//! - `hub_creation` from high-equity pages with few outlinks
//!
//! Every proposal carries an anchor built from shared terms and, when two
//! paragraphs match well enough, an insertion point in the source page.

use super::tfidf::{Corpus, TermVector};
use super::tokenizer::{page_term_counts, term_counts};
use crate::config::AnalysisConfig;
use crate::graph::{LinkGraph, Orphan, OrphanKind};
use crate::storage::PageRecord;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Equity at or above which a page counts as a hub candidate
pub const HUB_EQUITY: f64 = 70.0;
/// Hub candidates have fewer outlinks than this
pub const HUB_MAX_OUTLINKS: usize = 3;
/// Pages deeper than this get depth fixes
pub const DEEP_PAGE_DEPTH: u32 = 2;
/// Sources of depth fixes sit at or above this depth
pub const SHALLOW_PAGE_DEPTH: u32 = 1;
/// Suggestions produced per orphan or hub
const FAN_OUT: usize = 3;
/// Terms used for anchors and insertion positions
const ANCHOR_TERMS: usize = 3;

/// Kind of suggested link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpportunityType {
    SemanticMatch,
    OrphanFix,
    DepthFix,
    HubCreation,
}

impl OpportunityType {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            OpportunityType::SemanticMatch => "semantic_match",
            OpportunityType::OrphanFix => "orphan_fix",
            OpportunityType::DepthFix => "depth_fix",
            OpportunityType::HubCreation => "hub_creation",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "semantic_match" => Some(OpportunityType::SemanticMatch),
            "orphan_fix" => Some(OpportunityType::OrphanFix),
            "depth_fix" => Some(OpportunityType::DepthFix),
            "hub_creation" => Some(OpportunityType::HubCreation),
            _ => None,
        }
    }
}

impl fmt::Display for OpportunityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// High from 0.7 or when both pages share a topic, medium from 0.5
    pub fn for_similarity(similarity: f64, same_topic: bool) -> Self {
        if similarity >= 0.7 || same_topic {
            Priority::High
        } else if similarity >= 0.5 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Where in the source paragraph the link fits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPosition {
    Start,
    Middle,
    End,
}

impl InsertPosition {
    /// Maps a relative offset in `[0, 1]` to a third of the paragraph
    pub fn from_offset(fraction: f64) -> Self {
        if fraction < 1.0 / 3.0 {
            InsertPosition::Start
        } else if fraction < 2.0 / 3.0 {
            InsertPosition::Middle
        } else {
            InsertPosition::End
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            InsertPosition::Start => "start",
            InsertPosition::Middle => "middle",
            InsertPosition::End => "end",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "start" => Some(InsertPosition::Start),
            "middle" => Some(InsertPosition::Middle),
            "end" => Some(InsertPosition::End),
            _ => None,
        }
    }
}

impl fmt::Display for InsertPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Strength of a paragraph-level match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrength {
    High,
    Medium,
    Low,
}

impl MatchStrength {
    /// High from 0.7, medium from 0.5
    pub fn from_similarity(similarity: f64) -> Self {
        if similarity >= 0.7 {
            MatchStrength::High
        } else if similarity >= 0.5 {
            MatchStrength::Medium
        } else {
            MatchStrength::Low
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            MatchStrength::High => "high",
            MatchStrength::Medium => "medium",
            MatchStrength::Low => "low",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "high" => Some(MatchStrength::High),
            "medium" => Some(MatchStrength::Medium),
            "low" => Some(MatchStrength::Low),
            _ => None,
        }
    }
}

impl fmt::Display for MatchStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertionPoint {
    /// Index into the source page's stored paragraphs
    pub paragraph_index: usize,
    pub position: InsertPosition,
    /// Paragraph-level similarity
    pub confidence: f64,
    pub strength: MatchStrength,
}

/// A proposed internal link
#[derive(Debug, Clone, PartialEq)]
pub struct Opportunity {
    pub from_url: String,
    pub to_url: String,
    pub suggested_anchor: String,
    pub similarity: f64,
    pub opportunity_type: OpportunityType,
    pub priority: Priority,
    pub insertion: Option<InsertionPoint>,
}

struct ParagraphProfile {
    index: usize,
    text: String,
    vector: TermVector,
}

struct PageProfile<'a> {
    page: &'a PageRecord,
    equity: f64,
    vector: TermVector,
    paragraphs: Vec<ParagraphProfile>,
}

impl PageProfile<'_> {
    fn url(&self) -> &str {
        &self.page.normalized_url
    }

    fn topic(&self) -> Option<&str> {
        self.vector.top_term()
    }
}

/// Relevance engine over one session snapshot
pub struct RelevanceEngine<'a> {
    config: &'a AnalysisConfig,
    graph: &'a LinkGraph,
    profiles: Vec<PageProfile<'a>>,
}

impl<'a> RelevanceEngine<'a> {
    /// Vectorizes every successfully fetched page and its paragraphs
    ///
    /// Paragraph vectors are weighted with the page corpus so that a term
    /// common across the site counts for little inside a paragraph as well.
    pub fn new(
        pages: &'a [PageRecord],
        graph: &'a LinkGraph,
        equity: &HashMap<String, f64>,
        config: &'a AnalysisConfig,
    ) -> Self {
        let pages: Vec<&PageRecord> = pages
            .iter()
            .filter(|p| (200..300).contains(&p.status_code))
            .collect();
        let counts: Vec<HashMap<String, f64>> = pages.iter().map(|p| page_term_counts(p)).collect();
        let corpus = Corpus::build(&counts);

        let profiles = pages
            .into_iter()
            .zip(counts.iter())
            .map(|(page, counts)| {
                let paragraphs = page
                    .paragraphs
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p.text.chars().count() >= config.min_paragraph_chars)
                    .map(|(index, p)| ParagraphProfile {
                        index,
                        text: p.text.to_lowercase(),
                        vector: corpus.vectorize(&term_counts(&p.text)),
                    })
                    .filter(|p| !p.vector.is_empty())
                    .collect();
                PageProfile {
                    page,
                    equity: equity.get(&page.normalized_url).copied().unwrap_or(0.0),
                    vector: corpus.vectorize(counts),
                    paragraphs,
                }
            })
            .collect();

        Self {
            config,
            graph,
            profiles,
        }
    }

    /// Runs every pass, keeps the best suggestion per page pair, and caps the list
    pub fn opportunities(&self, orphans: &[Orphan]) -> Vec<Opportunity> {
        let mut all = self.semantic_matches();
        all.extend(self.orphan_fixes(orphans));
        all.extend(self.depth_fixes());
        all.extend(self.hub_suggestions());

        all.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.similarity.total_cmp(&a.similarity))
                .then_with(|| a.from_url.cmp(&b.from_url))
                .then_with(|| a.to_url.cmp(&b.to_url))
        });

        let mut seen = HashSet::new();
        all.retain(|o| seen.insert((o.from_url.clone(), o.to_url.clone())));
        all.truncate(self.config.max_opportunities);
        all
    }

    /// Similar page pairs with no link in either direction
    ///
    /// The link is proposed from the page with more equity to the one with
    /// less, so authority flows toward the weaker page.
    pub fn semantic_matches(&self) -> Vec<Opportunity> {
        let mut found = Vec::new();
        for (i, a) in self.profiles.iter().enumerate() {
            for b in &self.profiles[i + 1..] {
                if self.graph.linked_either_way(a.url(), b.url()) {
                    continue;
                }
                let similarity = a.vector.cosine(&b.vector);
                if similarity < self.config.similarity_threshold {
                    continue;
                }
                let (from, to) = if outranks(a, b) { (a, b) } else { (b, a) };
                let same_topic = a.topic().is_some() && a.topic() == b.topic();
                found.push(self.opportunity(
                    from,
                    to,
                    similarity,
                    OpportunityType::SemanticMatch,
                    Priority::for_similarity(similarity, same_topic),
                ));
            }
        }
        found
    }

    /// Links from the highest-equity pages to pages without inbound links
    pub fn orphan_fixes(&self, orphans: &[Orphan]) -> Vec<Opportunity> {
        let mut by_equity: Vec<&PageProfile> = self.profiles.iter().collect();
        by_equity.sort_by(|a, b| {
            b.equity
                .total_cmp(&a.equity)
                .then_with(|| a.url().cmp(b.url()))
        });

        let mut found = Vec::new();
        for orphan in orphans.iter().filter(|o| o.kind == OrphanKind::NoInboundLinks) {
            let Some(target) = self.profile(&orphan.url) else {
                continue;
            };
            for source in by_equity
                .iter()
                .filter(|s| s.url() != target.url() && !self.graph.has_link(s.url(), target.url()))
                .take(FAN_OUT)
            {
                let similarity = source.vector.cosine(&target.vector);
                found.push(self.opportunity(
                    source,
                    target,
                    similarity,
                    OpportunityType::OrphanFix,
                    Priority::High,
                ));
            }
        }
        found
    }

    /// Links from the most similar shallow page to each deep page
    pub fn depth_fixes(&self) -> Vec<Opportunity> {
        let mut found = Vec::new();
        for target in self.profiles.iter().filter(|p| p.page.depth > DEEP_PAGE_DEPTH) {
            let best = self
                .profiles
                .iter()
                .filter(|s| {
                    s.page.depth <= SHALLOW_PAGE_DEPTH
                        && !self.graph.has_link(s.url(), target.url())
                })
                .map(|s| (s, s.vector.cosine(&target.vector)))
                .filter(|(_, similarity)| *similarity > 0.0)
                .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.url().cmp(a.0.url())));

            if let Some((source, similarity)) = best {
                found.push(self.opportunity(
                    source,
                    target,
                    similarity,
                    OpportunityType::DepthFix,
                    Priority::Medium,
                ));
            }
        }
        found
    }

    /// Links from high-equity pages with few outlinks to related pages
    pub fn hub_suggestions(&self) -> Vec<Opportunity> {
        let min_similarity = self.config.similarity_threshold / 2.0;
        let mut found = Vec::new();
        for hub in self.profiles.iter().filter(|p| {
            p.equity >= HUB_EQUITY && self.graph.out_degree(p.url()) < HUB_MAX_OUTLINKS
        }) {
            let mut related: Vec<(&PageProfile, f64)> = self
                .profiles
                .iter()
                .filter(|t| t.url() != hub.url() && !self.graph.has_link(hub.url(), t.url()))
                .map(|t| (t, hub.vector.cosine(&t.vector)))
                .filter(|(_, similarity)| *similarity >= min_similarity)
                .collect();
            related.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.url().cmp(b.0.url())));

            for (target, similarity) in related.into_iter().take(FAN_OUT) {
                let same_topic = hub.topic().is_some() && hub.topic() == target.topic();
                found.push(self.opportunity(
                    hub,
                    target,
                    similarity,
                    OpportunityType::HubCreation,
                    Priority::for_similarity(similarity, same_topic),
                ));
            }
        }
        found
    }

    fn profile(&self, url: &str) -> Option<&PageProfile<'a>> {
        self.profiles.iter().find(|p| p.url() == url)
    }

    fn opportunity(
        &self,
        from: &PageProfile,
        to: &PageProfile,
        similarity: f64,
        opportunity_type: OpportunityType,
        priority: Priority,
    ) -> Opportunity {
        Opportunity {
            from_url: from.url().to_string(),
            to_url: to.url().to_string(),
            suggested_anchor: suggest_anchor(from, to),
            similarity,
            opportunity_type,
            priority,
            insertion: self.insertion_point(from, to),
        }
    }

    /// Best paragraph of `from` to hold a link to `to`
    ///
    /// Each source paragraph is compared with each target paragraph (or the
    /// whole target page when it has none). Only matches at or above the
    /// paragraph threshold qualify.
    fn insertion_point(&self, from: &PageProfile, to: &PageProfile) -> Option<InsertionPoint> {
        let targets: Vec<&TermVector> = if to.paragraphs.is_empty() {
            vec![&to.vector]
        } else {
            to.paragraphs.iter().map(|p| &p.vector).collect()
        };

        let mut best: Option<(&ParagraphProfile, &TermVector, f64)> = None;
        for paragraph in &from.paragraphs {
            for &target in &targets {
                let similarity = paragraph.vector.cosine(target);
                if similarity >= self.config.paragraph_threshold
                    && best.map_or(true, |(_, _, s)| similarity > s)
                {
                    best = Some((paragraph, target, similarity));
                }
            }
        }

        best.map(|(paragraph, target, confidence)| {
            let terms = paragraph.vector.shared_terms(target, ANCHOR_TERMS);
            InsertionPoint {
                paragraph_index: paragraph.index,
                position: locate(&paragraph.text, &terms),
                confidence,
                strength: MatchStrength::from_similarity(confidence),
            }
        })
    }
}

/// True if `a` should link to `b` rather than the reverse
fn outranks(a: &PageProfile, b: &PageProfile) -> bool {
    a.equity
        .total_cmp(&b.equity)
        .then_with(|| b.page.depth.cmp(&a.page.depth))
        .then_with(|| b.url().cmp(a.url()))
        .is_gt()
}

/// Anchor text from the strongest shared terms, else the target's title
fn suggest_anchor(from: &PageProfile, to: &PageProfile) -> String {
    let shared = from.vector.shared_terms(&to.vector, ANCHOR_TERMS);
    if !shared.is_empty() {
        return shared.join(" ");
    }
    match to.page.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => to.url().to_string(),
    }
}

/// Third of lowercase `text` holding the first whole word equal to any term
///
/// Offsets count words, split the same way the tokenizer splits them.
fn locate(text: &str, terms: &[&str]) -> InsertPosition {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    match words.iter().position(|w| terms.contains(w)) {
        Some(index) => InsertPosition::from_offset(index as f64 / words.len() as f64),
        None => InsertPosition::End,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::{link, page};
    use crate::graph::{compute_equity, detect_orphans};
    use crate::storage::ParagraphRecord;

    fn topical(url: &str, depth: u32, title: &str, body: &str) -> PageRecord {
        let mut p = page(url, depth);
        p.title = Some(title.to_string());
        p.content = body.to_string();
        p.paragraphs = vec![ParagraphRecord {
            text: body.to_string(),
            word_count: body.split_whitespace().count() as u32,
            position: 0,
        }];
        p
    }

    fn config() -> AnalysisConfig {
        AnalysisConfig {
            min_paragraph_chars: 10,
            ..AnalysisConfig::default()
        }
    }

    fn site() -> Vec<PageRecord> {
        vec![
            topical(
                "https://x.test/",
                0,
                "Home",
                "Welcome to the shop for garden tools and seeds, delivered fast.",
            ),
            topical(
                "https://x.test/pruning",
                1,
                "Pruning roses",
                "Pruning roses: cut rose canes above outward buds in early spring to keep rose bushes healthy.",
            ),
            topical(
                "https://x.test/rose-care",
                1,
                "Rose pruning guide",
                "A rose pruning guide: cut rose canes above outward buds each spring for healthy rose bushes.",
            ),
            topical(
                "https://x.test/lawn",
                1,
                "Lawn mowing",
                "Mowing the lawn weekly with sharp blades keeps grass dense.",
            ),
        ]
    }

    #[test]
    fn test_semantic_match_between_related_pages() {
        let pages = site();
        let links = vec![
            link("https://x.test/", "https://x.test/pruning"),
            link("https://x.test/", "https://x.test/rose-care"),
            link("https://x.test/", "https://x.test/lawn"),
        ];
        let graph = LinkGraph::build(&pages, &links);
        let equity = compute_equity(&graph);
        let config = config();
        let engine = RelevanceEngine::new(&pages, &graph, &equity, &config);

        let matches = engine.semantic_matches();
        let rose: Vec<&Opportunity> = matches
            .iter()
            .filter(|o| o.from_url.contains("rose") || o.to_url.contains("rose"))
            .filter(|o| o.from_url.contains("pruning") || o.to_url.contains("pruning"))
            .collect();
        assert_eq!(rose.len(), 1);
        let opp = rose[0];
        assert_eq!(opp.opportunity_type, OpportunityType::SemanticMatch);
        assert!(opp.suggested_anchor.contains("roses") || opp.suggested_anchor.contains("rose"));
        let point = opp.insertion.unwrap();
        assert_eq!(point.strength, MatchStrength::from_similarity(point.confidence));

        assert!(!matches
            .iter()
            .any(|o| o.from_url.contains("lawn") || o.to_url.contains("lawn")));
    }

    #[test]
    fn test_existing_link_suppresses_suggestion() {
        let pages = site();
        let links = vec![link("https://x.test/rose-care", "https://x.test/pruning")];
        let graph = LinkGraph::build(&pages, &links);
        let equity = compute_equity(&graph);
        let config = config();
        let engine = RelevanceEngine::new(&pages, &graph, &equity, &config);

        assert!(!engine.semantic_matches().iter().any(|o| {
            (o.from_url.contains("pruning") && o.to_url.contains("rose-care"))
                || (o.from_url.contains("rose-care") && o.to_url.contains("pruning"))
        }));
    }

    #[test]
    fn test_orphan_fix_from_top_pages() {
        let pages = site();
        let links = vec![
            link("https://x.test/", "https://x.test/pruning"),
            link("https://x.test/pruning", "https://x.test/"),
            link("https://x.test/", "https://x.test/lawn"),
        ];
        let graph = LinkGraph::build(&pages, &links);
        let equity = compute_equity(&graph);
        let orphans = detect_orphans("https://x.test/", &pages, &[], &links, &graph);
        let config = config();
        let engine = RelevanceEngine::new(&pages, &graph, &equity, &config);

        let fixes = engine.orphan_fixes(&orphans);
        assert!(fixes
            .iter()
            .all(|o| o.to_url == "https://x.test/rose-care" && o.priority == Priority::High));
        assert_eq!(fixes.len(), 3);
        assert_eq!(fixes[0].from_url, "https://x.test/");
    }

    #[test]
    fn test_depth_fix_for_deep_pages() {
        let mut pages = site();
        pages.push(topical(
            "https://x.test/a/b/c/climbing-roses",
            3,
            "Climbing roses",
            "Climbing roses want pruning in spring and a sturdy trellis for long canes.",
        ));
        let graph = LinkGraph::build(&pages, &[]);
        let equity = compute_equity(&graph);
        let config = config();
        let engine = RelevanceEngine::new(&pages, &graph, &equity, &config);

        let fixes = engine.depth_fixes();
        assert_eq!(fixes.len(), 1);
        assert_eq!(fixes[0].to_url, "https://x.test/a/b/c/climbing-roses");
        assert_eq!(fixes[0].from_url, "https://x.test/pruning");
    }

    #[test]
    fn test_opportunities_are_unique_and_capped() {
        let pages = site();
        let graph = LinkGraph::build(&pages, &[]);
        let equity = compute_equity(&graph);
        let orphans = detect_orphans("https://x.test/", &pages, &[], &[], &graph);
        let mut config = config();
        config.max_opportunities = 4;
        let engine = RelevanceEngine::new(&pages, &graph, &equity, &config);

        let all = engine.opportunities(&orphans);
        assert!(all.len() <= 4);
        let pairs: HashSet<(&str, &str)> = all
            .iter()
            .map(|o| (o.from_url.as_str(), o.to_url.as_str()))
            .collect();
        assert_eq!(pairs.len(), all.len());
        assert!(all.windows(2).all(|w| w[0].priority <= w[1].priority));
    }

    #[test]
    fn test_priority_rules() {
        assert_eq!(Priority::for_similarity(0.75, false), Priority::High);
        assert_eq!(Priority::for_similarity(0.35, true), Priority::High);
        assert_eq!(Priority::for_similarity(0.55, false), Priority::Medium);
        assert_eq!(Priority::for_similarity(0.45, false), Priority::Low);
    }

    #[test]
    fn test_locate_thirds() {
        let text = "roses at the start of a fairly long paragraph about gardens";
        assert_eq!(locate(text, &["roses"]), InsertPosition::Start);
        assert_eq!(locate(text, &["gardens"]), InsertPosition::End);
        assert_eq!(locate(text, &["missing"]), InsertPosition::End);
    }

    #[test]
    fn test_locate_matches_whole_words_only() {
        let text = "prose written about things that grow, and finally one rose";
        assert_eq!(locate(text, &["rose"]), InsertPosition::End);
        assert_eq!(locate(text, &["pro"]), InsertPosition::End);
        assert_eq!(locate("café owners love the rose garden", &["garden"]), InsertPosition::End);
        assert_eq!(locate("café owners love the rose garden", &["owners"]), InsertPosition::Start);
    }

    #[test]
    fn test_match_strength_bands() {
        assert_eq!(MatchStrength::from_similarity(0.72), MatchStrength::High);
        assert_eq!(MatchStrength::from_similarity(0.55), MatchStrength::Medium);
        assert_eq!(MatchStrength::from_similarity(0.41), MatchStrength::Low);
        assert_eq!(
            MatchStrength::from_db_string(MatchStrength::Medium.to_db_string()),
            Some(MatchStrength::Medium)
        );
    }
}
