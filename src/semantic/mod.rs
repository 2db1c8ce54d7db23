//! Semantic relevance engine
//!
//! Weighted bag-of-words TF-IDF vectors for pages and paragraphs, cosine
//! similarity, and internal link suggestions.

mod opportunity;
mod tfidf;
mod tokenizer;

pub use opportunity::{
    InsertPosition, InsertionPoint, MatchStrength, Opportunity, OpportunityType, Priority,
    RelevanceEngine,
};
pub use tfidf::{Corpus, TermVector};
pub use tokenizer::{page_term_counts, term_counts, tokenize, top_keywords};
