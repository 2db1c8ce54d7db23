//! Rule-based page type classification
//!
//! The rules are heuristics over the URL path and simple structural counts.
//! They approximate a page's role and are not meant to be authoritative.

use std::fmt;
use url::Url;

/// Word count from which a page is considered long-form content
const CONTENT_MIN_WORDS: u32 = 300;

/// Coarse role of a page within its site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageType {
    Homepage,
    Category,
    Product,
    Content,
    Other,
}

impl PageType {
    /// Converts the page type to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Homepage => "homepage",
            Self::Category => "category",
            Self::Product => "product",
            Self::Content => "content",
            Self::Other => "other",
        }
    }

    /// Parses a page type from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "homepage" => Some(Self::Homepage),
            "category" => Some(Self::Category),
            "product" => Some(Self::Product),
            "content" => Some(Self::Content),
            "other" => Some(Self::Other),
            _ => None,
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

/// Structural counts the classifier looks at besides the path
#[derive(Debug, Clone, Copy, Default)]
pub struct PageSignals {
    pub word_count: u32,
    pub header_count: usize,
    pub paragraph_count: usize,
    pub list_item_count: usize,
    pub internal_link_count: usize,
}

impl PageSignals {
    /// Internal links per word of body text
    pub fn link_density(&self) -> f64 {
        self.internal_link_count as f64 / f64::from(self.word_count.max(1))
    }

    /// Share of text blocks that are list items rather than paragraphs
    pub fn list_density(&self) -> f64 {
        let blocks = self.list_item_count + self.paragraph_count;
        if blocks == 0 {
            return 0.0;
        }
        self.list_item_count as f64 / blocks as f64
    }
}

/// Classifies a page
///
/// Rules, first match wins:
///
/// 1. Root path is the homepage
/// 2. A `product`, `products`, `item`, `shop` or `store` segment is a product page
/// 3. A `category`, `tag`, `archive`, `collection` or `collections` segment,
///    or a path ending in `blog`, is a category page
/// 4. 300+ words with at least two headings is content
/// 5. Link-heavy, list-heavy pages are categories
/// 6. 300+ words is content
/// 7. Everything else is other
pub fn classify_page(url: &Url, signals: &PageSignals) -> PageType {
    let path = url.path().to_lowercase();
    if path == "/" || path.is_empty() {
        return PageType::Homepage;
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if segments
        .iter()
        .any(|s| matches!(*s, "product" | "products" | "item" | "shop" | "store"))
    {
        return PageType::Product;
    }

    if segments.iter().any(|s| {
        matches!(
            *s,
            "category" | "tag" | "archive" | "collection" | "collections"
        )
    }) || segments.last() == Some(&"blog")
    {
        return PageType::Category;
    }

    if signals.word_count >= CONTENT_MIN_WORDS && signals.header_count >= 2 {
        return PageType::Content;
    }

    if signals.link_density() > 0.1 && signals.list_density() > 0.5 {
        return PageType::Category;
    }

    if signals.word_count >= CONTENT_MIN_WORDS {
        return PageType::Content;
    }

    PageType::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://x.test{}", path)).unwrap()
    }

    #[test]
    fn test_homepage() {
        assert_eq!(
            classify_page(&url("/"), &PageSignals::default()),
            PageType::Homepage
        );
    }

    #[test]
    fn test_path_rules() {
        let signals = PageSignals::default();
        assert_eq!(classify_page(&url("/shop/red-shoes"), &signals), PageType::Product);
        assert_eq!(classify_page(&url("/products/42"), &signals), PageType::Product);
        assert_eq!(classify_page(&url("/category/news"), &signals), PageType::Category);
        assert_eq!(classify_page(&url("/tag/rust"), &signals), PageType::Category);
        assert_eq!(classify_page(&url("/blog"), &signals), PageType::Category);
        assert_eq!(classify_page(&url("/about"), &signals), PageType::Other);
    }

    #[test]
    fn test_blog_post_is_not_a_category() {
        let signals = PageSignals {
            word_count: 800,
            header_count: 3,
            paragraph_count: 10,
            ..Default::default()
        };
        assert_eq!(
            classify_page(&url("/blog/how-to-link"), &signals),
            PageType::Content
        );
    }

    #[test]
    fn test_long_page_is_content() {
        let signals = PageSignals {
            word_count: 450,
            header_count: 0,
            paragraph_count: 6,
            ..Default::default()
        };
        assert_eq!(classify_page(&url("/guide"), &signals), PageType::Content);
    }

    #[test]
    fn test_link_list_page_is_category() {
        let signals = PageSignals {
            word_count: 120,
            header_count: 1,
            paragraph_count: 1,
            list_item_count: 20,
            internal_link_count: 25,
        };
        assert_eq!(classify_page(&url("/resources"), &signals), PageType::Category);
    }

    #[test]
    fn test_db_string_roundtrip() {
        for page_type in [
            PageType::Homepage,
            PageType::Category,
            PageType::Product,
            PageType::Content,
            PageType::Other,
        ] {
            assert_eq!(
                PageType::from_db_string(page_type.to_db_string()),
                Some(page_type)
            );
        }
    }
}
