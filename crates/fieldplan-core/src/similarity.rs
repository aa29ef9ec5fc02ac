//! Text similarity for near-duplicate task detection.
//!
//! Texts are split into stem-level tokens (Korean particles and common
//! predicate endings are peeled off), weighted with smoothed TF-IDF fitted
//! over the texts being compared, L2-normalized, and compared by cosine.

use crate::model::TaskText;
use std::collections::{HashMap, HashSet};

/// Case particles removed from the end of Hangul words, longest first.
const PARTICLE_SUFFIXES: &[&str] = &[
    "에서는", "으로는", "에게서", "에서", "에게", "으로", "까지", "부터", "처럼", "보다", "마다",
    "을", "를", "은", "는", "에",
];

/// Predicate endings removed from the end of Hangul words, longest first.
const PREDICATE_SUFFIXES: &[&str] = &[
    "합니다", "하세요", "한다", "하기", "하고", "하여", "해서", "해야", "하다",
];

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "in", "is", "it", "of", "on",
    "or", "the", "to", "with",
];

fn is_hangul(c: char) -> bool {
    ('\u{AC00}'..='\u{D7A3}').contains(&c)
}

/// Split text into comparable stem tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .filter_map(|w| {
            if w.chars().any(is_hangul) {
                Some(stem_hangul(w).to_string())
            } else if w.chars().count() > 1 && !ENGLISH_STOPWORDS.contains(&w) {
                Some(w.to_string())
            } else {
                None
            }
        })
        .collect()
}

/// Peel one predicate ending, or failing that one particle, keeping at least
/// one syllable.
fn stem_hangul(word: &str) -> &str {
    for suffixes in [PREDICATE_SUFFIXES, PARTICLE_SUFFIXES] {
        for suffix in suffixes {
            if let Some(stem) = word.strip_suffix(suffix) {
                if !stem.is_empty() {
                    return stem;
                }
            }
        }
    }
    word
}

/// L2-normalized sparse vector, entries sorted by term index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cosine similarity in `[0, 1]`. Zero when either side has no terms.
    pub fn cosine(&self, other: &SparseVector) -> f64 {
        if self.is_empty() || other.is_empty() {
            return 0.0;
        }
        if self == other {
            return 1.0;
        }

        // Merge-join in index order so the sum is the same for (a, b) and (b, a).
        let (mut i, mut j, mut dot) = (0, 0, 0.0);
        while i < self.entries.len() && j < other.entries.len() {
            let (ti, vi) = self.entries[i];
            let (tj, vj) = other.entries[j];
            match ti.cmp(&tj) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dot += vi * vj;
                    i += 1;
                    j += 1;
                }
            }
        }
        dot.clamp(0.0, 1.0)
    }
}

/// Smoothed TF-IDF weights fitted over a small corpus.
#[derive(Debug, Clone, Default)]
pub struct TfIdfModel {
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
}

impl TfIdfModel {
    /// Fit document frequencies. An empty corpus yields an empty model.
    ///
    /// Term indices follow token order, so the same corpus in any document
    /// order produces the same vectors.
    pub fn fit(docs: &[Vec<String>]) -> Self {
        let mut doc_freq: HashMap<&str, u32> = HashMap::new();
        for doc in docs {
            let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
            for token in unique {
                *doc_freq.entry(token).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<(&str, u32)> = doc_freq.into_iter().collect();
        terms.sort_unstable_by(|a, b| a.0.cmp(b.0));

        // idf = ln((1 + n) / (1 + df)) + 1
        let n = docs.len() as f64;
        let idf = terms
            .iter()
            .map(|&(_, df)| ((1.0 + n) / (1.0 + f64::from(df))).ln() + 1.0)
            .collect();
        let vocab = terms
            .iter()
            .enumerate()
            .map(|(idx, (token, _))| (token.to_string(), idx))
            .collect();

        Self { vocab, idf }
    }

    /// Weight a token list. Unknown tokens are ignored.
    pub fn transform(&self, tokens: &[String]) -> SparseVector {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        for token in tokens {
            if let Some(&idx) = self.vocab.get(token) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, tf)| (idx, tf * self.idf[idx]))
            .collect();
        entries.sort_by_key(|(idx, _)| *idx);

        let norm = entries.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut entries {
                *w /= norm;
            }
        }
        SparseVector { entries }
    }
}

/// Cosine similarity of `query` against each of `others`, with TF-IDF fitted
/// over all of them. No model is built when `others` is empty.
pub fn similarities(query: &str, others: &[&str]) -> Vec<f64> {
    if others.is_empty() {
        return Vec::new();
    }
    let docs: Vec<Vec<String>> = std::iter::once(query)
        .chain(others.iter().copied())
        .map(tokenize)
        .collect();
    let model = TfIdfModel::fit(&docs);
    let q = model.transform(&docs[0]);
    docs[1..]
        .iter()
        .map(|d| q.cosine(&model.transform(d)))
        .collect()
}

/// Vectors for a group of task texts, compared pairwise.
///
/// [`score`](Self::score) takes the larger of the full-text similarity (name
/// and content together) and the name-only similarity, so a regenerated task
/// with the same name but reworded content still matches.
/// [`full_score`](Self::full_score) compares the combined text alone.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    full: Vec<SparseVector>,
    names: Vec<SparseVector>,
}

impl SimilarityIndex {
    pub fn fit(texts: &[TaskText<'_>]) -> Self {
        let full_docs: Vec<Vec<String>> = texts.iter().map(|t| tokenize(&t.combined())).collect();
        let name_docs: Vec<Vec<String>> = texts.iter().map(|t| tokenize(t.name)).collect();

        let full_model = TfIdfModel::fit(&full_docs);
        let name_model = TfIdfModel::fit(&name_docs);

        Self {
            full: full_docs.iter().map(|d| full_model.transform(d)).collect(),
            names: name_docs.iter().map(|d| name_model.transform(d)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.full.len()
    }

    pub fn is_empty(&self) -> bool {
        self.full.is_empty()
    }

    /// Score between entries `a` and `b`.
    pub fn score(&self, a: usize, b: usize) -> f64 {
        let name = self.names[a].cosine(&self.names[b]);
        self.full_score(a, b).max(name)
    }

    /// Name-plus-content similarity between entries `a` and `b`.
    pub fn full_score(&self, a: usize, b: usize) -> f64 {
        self.full[a].cosine(&self.full[b])
    }
}

/// Highest-scoring match of `candidate` among `existing`, if any reaches
/// `threshold` (ties at the threshold count).
pub fn find_duplicate(
    candidate: TaskText<'_>,
    existing: &[TaskText<'_>],
    threshold: f64,
) -> Option<(usize, f64)> {
    if existing.is_empty() {
        return None;
    }
    let mut texts = Vec::with_capacity(existing.len() + 1);
    texts.push(candidate);
    texts.extend_from_slice(existing);
    let index = SimilarityIndex::fit(&texts);

    (0..existing.len())
        .map(|i| (i, index.score(0, i + 1)))
        .filter(|(_, score)| *score >= threshold)
        .max_by(|a, b| a.1.total_cmp(&b.1))
}
