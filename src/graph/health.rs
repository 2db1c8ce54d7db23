use crate::storage::{LinkRecord, PageRecord};
use std::collections::{HashMap, HashSet};

/// Titles treated as missing
const PLACEHOLDER_TITLES: &[&str] = &["no title", "untitled"];

/// Content shorter than this is considered thin
const THIN_CONTENT_CHARS: usize = 100;

/// Counts distinct internal link targets per source page, self-links excluded
pub fn count_internal_outlinks(links: &[LinkRecord]) -> HashMap<&str, usize> {
    let mut targets: HashMap<&str, HashSet<&str>> = HashMap::new();
    for link in links {
        if link.is_internal && link.from_url != link.to_url {
            targets
                .entry(link.from_url.as_str())
                .or_default()
                .insert(link.to_url.as_str());
        }
    }
    targets
        .into_iter()
        .map(|(from, to)| (from, to.len()))
        .collect()
}

/// Scores a page from 100 down, never below 0
///
/// | Condition | Deduction |
/// |---|---|
/// | status is not 200 | 50 |
/// | title missing or a placeholder | 10 |
/// | no internal outlinks | 20 |
/// | 1-2 internal outlinks | 10 |
/// | more than 100 internal outlinks | 15 |
/// | content under 100 characters | 15 |
pub fn health_score(page: &PageRecord, internal_outlinks: usize) -> f64 {
    let mut score: i32 = 100;

    if page.status_code != 200 {
        score -= 50;
    }

    let title_missing = match page.title.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(title) => PLACEHOLDER_TITLES.contains(&title.to_lowercase().as_str()),
    };
    if title_missing {
        score -= 10;
    }

    match internal_outlinks {
        0 => score -= 20,
        1..=2 => score -= 10,
        n if n > 100 => score -= 15,
        _ => {}
    }

    if page.content.chars().count() < THIN_CONTENT_CHARS {
        score -= 15;
    }

    f64::from(score.max(0))
}
