//! HTML structure extraction
//!
//! This module turns a fetched HTML document into the pieces the link
//! analysis needs:
//! - Title and meta description
//! - Headings H1 to H6 with document position and level
//! - Paragraph blocks above a minimum length
//! - Visible body text and its word count
//! - Hyperlinks with resolved target, anchor text and placement

use crate::storage::{HeaderRecord, ParagraphRecord};
use crate::url::{resolve_url, site_url};
use scraper::{ElementRef, Html, Node, Selector};
use std::fmt;
use url::Url;

const MAX_PARAGRAPH_CHARS: usize = 2_000;
const MAX_PARAGRAPHS: usize = 30;
const MAX_HEADER_CHARS: usize = 500;
const MAX_ANCHOR_CHARS: usize = 500;
const MAX_CONTENT_CHARS: usize = 10_000;

/// Where on the page a link sits, judged from its nearest landmark ancestor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkPosition {
    Content,
    Navigation,
    Header,
    Footer,
}

impl LinkPosition {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Navigation => "navigation",
            Self::Header => "header",
            Self::Footer => "footer",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "content" => Some(Self::Content),
            "navigation" => Some(Self::Navigation),
            "header" => Some(Self::Header),
            "footer" => Some(Self::Footer),
            _ => None,
        }
    }
}

impl fmt::Display for LinkPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// A hyperlink found on a page
#[derive(Debug, Clone)]
pub struct ExtractedLink {
    /// Normalized absolute target
    pub url: Url,
    pub anchor_text: String,
    pub is_internal: bool,
    pub position: LinkPosition,
    pub nofollow: bool,
}

/// Everything extracted from one HTML document
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub headers: Vec<HeaderRecord>,
    pub paragraphs: Vec<ParagraphRecord>,
    /// Visible body text, truncated
    pub content: String,
    /// Word count of the full visible body text
    pub word_count: u32,
    pub list_item_count: usize,
    pub links: Vec<ExtractedLink>,
}

impl ExtractedPage {
    pub fn internal_link_count(&self) -> usize {
        self.links.iter().filter(|l| l.is_internal).count()
    }

    pub fn external_link_count(&self) -> usize {
        self.links.iter().filter(|l| !l.is_internal).count()
    }

    /// Internal links placed in the main content rather than page chrome
    pub fn content_link_count(&self) -> usize {
        self.links
            .iter()
            .filter(|l| l.is_internal && l.position == LinkPosition::Content)
            .count()
    }

    /// Text of the first H1, if the page has one
    pub fn h1_text(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.level == 1)
            .map(|h| h.text.as_str())
    }
}

/// Parses HTML content and extracts page structure
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` anywhere in the document, resolved against `page_url`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - Fragment-only, `javascript:`, `mailto:`, `tel:` and `data:` hrefs
/// - Anything that does not resolve to http(s)
///
/// `rel="nofollow"` links are kept and flagged. Internal targets are spelled
/// with `base_host`, so `www.` and bare-host links to one page agree.
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - URL the document was served from, for resolving relative links
/// * `base_host` - Host of the crawl, for the internal/external split
/// * `min_paragraph_chars` - Paragraphs shorter than this are dropped
///
/// # Example
///
/// ```
/// use sitegraph::crawler::extract_structure;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let page_url = Url::parse("https://example.com/").unwrap();
/// let page = extract_structure(html, &page_url, "example.com", 50);
/// assert_eq!(page.title.as_deref(), Some("Test"));
/// assert_eq!(page.links.len(), 1);
/// ```
pub fn extract_structure(
    html: &str,
    page_url: &Url,
    base_host: &str,
    min_paragraph_chars: usize,
) -> ExtractedPage {
    let document = Html::parse_document(html);

    let body = selector("body")
        .and_then(|s| document.select(&s).next())
        .unwrap_or_else(|| document.root_element());

    let full_text = visible_text(body);
    let word_count = full_text.split_whitespace().count() as u32;

    ExtractedPage {
        title: extract_title(&document),
        meta_description: extract_meta_description(&document),
        headers: extract_headers(&document),
        paragraphs: extract_paragraphs(&document, min_paragraph_chars),
        content: truncate_chars(&full_text, MAX_CONTENT_CHARS),
        word_count,
        list_item_count: selector("li")
            .map(|s| document.select(&s).count())
            .unwrap_or(0),
        links: extract_links(&document, page_url, base_host),
    }
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Collects text nodes under `root`, skipping script-like containers
fn visible_text(root: ElementRef<'_>) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        if let Node::Text(text) = node.value() {
            let hidden = node.ancestors().any(|a| {
                a.value().as_element().map_or(false, |e| {
                    matches!(e.name(), "script" | "style" | "noscript" | "template")
                })
            });
            if !hidden {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    parts.push(trimmed);
                }
            }
        }
    }
    collapse_whitespace(&parts.join(" "))
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(element_text)
        .filter(|s| !s.is_empty())
}

fn extract_meta_description(document: &Html) -> Option<String> {
    let meta_selector = selector("meta[name=\"description\"], meta[name=\"Description\"]")?;

    document
        .select(&meta_selector)
        .filter_map(|e| e.value().attr("content"))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

fn extract_headers(document: &Html) -> Vec<HeaderRecord> {
    let Some(heading_selector) = selector("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };

    document
        .select(&heading_selector)
        .filter_map(|element| {
            let level = element.value().name()[1..].parse::<u8>().ok()?;
            let text = element_text(element);
            if text.is_empty() {
                return None;
            }
            Some((level, truncate_chars(&text, MAX_HEADER_CHARS)))
        })
        .enumerate()
        .map(|(position, (level, text))| HeaderRecord {
            level,
            text,
            position: position as u32,
        })
        .collect()
}

fn extract_paragraphs(document: &Html, min_chars: usize) -> Vec<ParagraphRecord> {
    let Some(p_selector) = selector("p") else {
        return Vec::new();
    };

    document
        .select(&p_selector)
        .map(element_text)
        .filter(|text| text.chars().count() >= min_chars)
        .take(MAX_PARAGRAPHS)
        .enumerate()
        .map(|(position, text)| {
            let text = truncate_chars(&text, MAX_PARAGRAPH_CHARS);
            ParagraphRecord {
                word_count: text.split_whitespace().count() as u32,
                text,
                position: position as u32,
            }
        })
        .collect()
}

fn extract_links(document: &Html, page_url: &Url, base_host: &str) -> Vec<ExtractedLink> {
    let Some(a_selector) = selector("a[href]") else {
        return Vec::new();
    };

    let mut links = Vec::new();
    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_url(href, page_url))
        else {
            continue;
        };

        let nofollow = element
            .value()
            .attr("rel")
            .map_or(false, |rel| {
                rel.split_whitespace()
                    .any(|token| token.eq_ignore_ascii_case("nofollow"))
            });

        let (url, is_internal) = match site_url(&url, base_host) {
            Some(internal) => (internal, true),
            None => (url, false),
        };

        links.push(ExtractedLink {
            is_internal,
            anchor_text: truncate_chars(&anchor_text(element), MAX_ANCHOR_CHARS),
            position: link_position(element),
            nofollow,
            url,
        });
    }
    links
}

/// Anchor text, falling back to an image's alt text or the title attribute
fn anchor_text(element: ElementRef<'_>) -> String {
    let text = element_text(element);
    if !text.is_empty() {
        return text;
    }

    let alt = selector("img[alt]").and_then(|s| {
        element
            .select(&s)
            .filter_map(|img| img.value().attr("alt"))
            .map(collapse_whitespace)
            .find(|alt| !alt.is_empty())
    });

    alt.or_else(|| element.value().attr("title").map(collapse_whitespace))
        .unwrap_or_default()
}

/// Classifies a link by its nearest landmark ancestor
fn link_position(element: ElementRef<'_>) -> LinkPosition {
    for ancestor in element.ancestors() {
        let Some(el) = ancestor.value().as_element() else {
            continue;
        };

        if el.name() == "nav" || el.attr("role") == Some("navigation") {
            return LinkPosition::Navigation;
        }
        match el.name() {
            "main" | "article" => return LinkPosition::Content,
            "header" => return LinkPosition::Header,
            "footer" => return LinkPosition::Footer,
            _ => {}
        }
    }
    LinkPosition::Content
}
