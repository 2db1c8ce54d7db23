use crate::storage::PageRecord;
use std::collections::HashMap;

/// Words too common to say anything about a page's topic
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
    "at", "be", "because", "been", "before", "being", "below", "between", "both", "but", "by",
    "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for", "from",
    "further", "get", "had", "has", "have", "having", "he", "her", "here", "hers", "him", "his",
    "how", "i", "if", "in", "into", "is", "it", "its", "just", "may", "me", "might", "more",
    "most", "must", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such",
    "than", "that", "the", "their", "them", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "us", "very", "was", "we", "were", "what",
    "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would", "you",
    "your", "yours",
];

/// Weight of title and H1 terms
pub const PRIMARY_WEIGHT: f64 = 3.0;
/// Weight of H2-H6 terms
pub const SECONDARY_WEIGHT: f64 = 2.0;
/// Weight of body terms
pub const BODY_WEIGHT: f64 = 1.0;

/// Splits text into lowercase terms
///
/// Anything that is not alphanumeric separates terms. Stop words, terms of
/// two characters or fewer, and pure numbers are dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
        .filter(|t| !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Adds every term of `text` to `counts` with the given weight
pub fn add_terms(counts: &mut HashMap<String, f64>, text: &str, weight: f64) {
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0.0) += weight;
    }
}

/// Plain term counts of a text
pub fn term_counts(text: &str) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    add_terms(&mut counts, text, BODY_WEIGHT);
    counts
}

/// The `limit` most frequent terms of `text`, ties broken alphabetically
pub fn top_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(String, f64)> = term_counts(text).into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(term, _)| term).collect()
}

/// Weighted term counts of a whole page
///
/// Title and H1 terms count three times, H2-H6 twice, body text once. The
/// title is weighted like an H1. Heading text is also part of the visible
/// body text, so a heading term collects its body weight on top.
pub fn page_term_counts(page: &PageRecord) -> HashMap<String, f64> {
    let mut counts = HashMap::new();
    if let Some(title) = &page.title {
        add_terms(&mut counts, title, PRIMARY_WEIGHT);
    }
    for header in &page.headers {
        let weight = if header.level == 1 {
            PRIMARY_WEIGHT
        } else {
            SECONDARY_WEIGHT
        };
        add_terms(&mut counts, &header.text, weight);
    }
    add_terms(&mut counts, &page.content, BODY_WEIGHT);
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::test_support::page;
    use crate::storage::HeaderRecord;

    #[test]
    fn test_tokenize_drops_noise() {
        assert_eq!(
            tokenize("The Internal-Linking guide, 2024 edition: it's ON!"),
            vec!["internal", "linking", "guide", "edition"]
        );
    }

    #[test]
    fn test_tokenize_keeps_unicode_words() {
        assert_eq!(tokenize("Café crème brûlée"), vec!["café", "crème", "brûlée"]);
    }

    #[test]
    fn test_top_keywords_by_frequency() {
        let text = "Roses and tulips. Roses need sun; tulips need bulbs. Roses!";
        assert_eq!(top_keywords(text, 2), vec!["roses", "need"]);
        assert_eq!(top_keywords(text, 10).len(), 5);
        assert!(top_keywords("", 10).is_empty());
    }

    #[test]
    fn test_page_weights() {
        let mut p = page("https://x.test/", 0);
        p.title = Some("Rust crawler".to_string());
        p.headers = vec![
            HeaderRecord {
                level: 1,
                text: "Crawler".to_string(),
                position: 0,
            },
            HeaderRecord {
                level: 2,
                text: "Scheduling".to_string(),
                position: 1,
            },
        ];
        // Body text repeats the headings, as extracted pages do.
        p.content = "crawler scheduling".to_string();

        let counts = page_term_counts(&p);
        assert_eq!(counts["rust"], 3.0);
        assert_eq!(counts["crawler"], 3.0 + 3.0 + 1.0);
        assert_eq!(counts["scheduling"], 2.0 + 1.0);
    }
}
