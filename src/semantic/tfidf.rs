use std::collections::HashMap;

/// Sparse term vector scaled to unit length
///
/// Because every non-empty vector has length 1, cosine similarity is a plain
/// dot product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermVector {
    terms: HashMap<String, f64>,
    /// Length before scaling; 0 for an empty vector
    magnitude: f64,
}

impl TermVector {
    /// Scales raw term weights to unit length, dropping non-positive weights
    pub fn from_weights(weights: HashMap<String, f64>) -> Self {
        let terms: HashMap<String, f64> =
            weights.into_iter().filter(|(_, w)| *w > 0.0).collect();
        let magnitude = terms.values().map(|w| w * w).sum::<f64>().sqrt();
        if magnitude == 0.0 {
            return Self::default();
        }
        Self {
            terms: terms
                .into_iter()
                .map(|(term, w)| (term, w / magnitude))
                .collect(),
            magnitude,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    pub fn weight(&self, term: &str) -> f64 {
        self.terms.get(term).copied().unwrap_or(0.0)
    }

    /// Cosine similarity, in `[0, 1]`
    pub fn cosine(&self, other: &TermVector) -> f64 {
        let (small, large) = if self.terms.len() <= other.terms.len() {
            (self, other)
        } else {
            (other, self)
        };
        let dot: f64 = small
            .terms
            .iter()
            .map(|(term, w)| w * large.weight(term))
            .sum();
        dot.clamp(0.0, 1.0)
    }

    /// Terms present in both vectors, strongest combined weight first
    pub fn shared_terms(&self, other: &TermVector, limit: usize) -> Vec<&str> {
        let mut shared: Vec<(&str, f64)> = self
            .terms
            .iter()
            .filter_map(|(term, w)| {
                let theirs = other.weight(term);
                (theirs > 0.0).then_some((term.as_str(), w * theirs))
            })
            .collect();
        shared.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        shared.into_iter().take(limit).map(|(t, _)| t).collect()
    }

    /// The highest-weighted term; used as a coarse topic label
    pub fn top_term(&self) -> Option<&str> {
        self.terms
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(t, _)| t.as_str())
    }
}

/// Document frequencies over a set of term-count documents
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: usize,
    document_frequency: HashMap<String, usize>,
}

impl Corpus {
    pub fn build<'a, I>(documents: I) -> Self
    where
        I: IntoIterator<Item = &'a HashMap<String, f64>>,
    {
        let mut corpus = Self::default();
        for counts in documents {
            corpus.documents += 1;
            for term in counts.keys() {
                *corpus.document_frequency.entry(term.clone()).or_insert(0) += 1;
            }
        }
        corpus
    }

    pub fn len(&self) -> usize {
        self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }

    /// `ln(N / df)`; terms the corpus has never seen count as appearing once
    pub fn idf(&self, term: &str) -> f64 {
        if self.documents == 0 {
            return 0.0;
        }
        let df = self.document_frequency.get(term).copied().unwrap_or(1).max(1);
        (self.documents as f64 / df as f64).ln().max(0.0)
    }

    /// Builds a unit TF-IDF vector from term counts
    ///
    /// `tf = 0.5 + 0.5 * count / max_count`. Terms found in every document
    /// get an idf of 0 and drop out.
    pub fn vectorize(&self, counts: &HashMap<String, f64>) -> TermVector {
        let max_count = counts.values().copied().fold(0.0_f64, f64::max);
        if max_count <= 0.0 {
            return TermVector::default();
        }
        let weights = counts
            .iter()
            .map(|(term, &count)| {
                let tf = 0.5 + 0.5 * (count / max_count);
                (term.clone(), tf * self.idf(term))
            })
            .collect();
        TermVector::from_weights(weights)
    }
}
