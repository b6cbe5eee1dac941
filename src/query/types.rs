//! Core value types for the query system

use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Sentinel that overflowing scores saturate to
///
/// Callers compare against this value to detect saturation, so it must
/// stay clear of `i64::MAX` while still out-ranking every honest score.
pub const SCORE_SATURATION: i64 = i64::MAX - 4_000_000;

/// Saturating score addition, clamped to the sentinel
pub fn saturating_score_add(a: i64, b: i64) -> i64 {
    a.saturating_add(b).min(SCORE_SATURATION)
}

/// One query word with its per-occurrence weight and byte offset in the
/// query string
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryWord {
    pub word: String,
    pub rank: u32,
    pub position: u32,
}

impl QueryWord {
    pub fn new(word: impl Into<String>, rank: u32, position: u32) -> Self {
        Self {
            word: word.into(),
            rank,
            position,
        }
    }
}

/// Per-query execution mode flags
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct QueryFlags {
    /// Caller will consume only a prefix of the results; enables partial
    /// cursors
    pub can_load_part_of_docs: bool,
    /// Caller guarantees no further AND composition; enables the one-word
    /// optimisation
    pub no_and_expression: bool,
    /// Caller wants a companion id-set for grouping
    pub need_group_by: bool,
    /// Invert the predicate
    pub not: bool,
    /// Highest result index the caller will consume
    pub end: Option<usize>,
}

/// A scored candidate document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredDoc {
    pub doc_id: u32,
    pub score: i64,
}

impl ScoredDoc {
    pub fn new(doc_id: u32, score: i64) -> Self {
        Self { doc_id, score }
    }
}

impl PartialOrd for ScoredDoc {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredDoc {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then(self.doc_id.cmp(&other.doc_id))
    }
}

/// Outcome of one query step: a `doc_id -> score` mapping with the
/// bookkeeping the SQL layer needs
///
/// A set marked `not` represents the complement of its key set; combiners
/// honour the flag without materialising the complement. `rel_total_count`
/// is at least `len()` and exceeds it when only a prefix of postings was
/// consumed.
#[derive(Clone, Debug, Default)]
pub struct ResultSet {
    docs: HashMap<u32, i64>,
    pub not: bool,
    pub rel_total_count: u64,
    /// Pre-filter ids kept for grouping when the mirror filter reduced the
    /// set
    pub group_by: Option<RoaringBitmap>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a score, overwriting any previous entry
    pub fn insert(&mut self, doc_id: u32, score: i64) {
        self.docs.insert(doc_id, score);
    }

    /// Insert a score, adding (saturating) on key collision
    pub fn insert_add(&mut self, doc_id: u32, score: i64) {
        self.docs
            .entry(doc_id)
            .and_modify(|s| *s = saturating_score_add(*s, score))
            .or_insert(score);
    }

    pub fn score(&self, doc_id: u32) -> Option<i64> {
        self.docs.get(&doc_id).copied()
    }

    pub fn contains(&self, doc_id: u32) -> bool {
        self.docs.contains_key(&doc_id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, i64)> + '_ {
        self.docs.iter().map(|(&d, &s)| (d, s))
    }

    /// Drop every key for which `is_deleted` holds, returning the count
    pub fn retain_not_deleted(&mut self, is_deleted: impl Fn(u32) -> bool) -> u64 {
        let before = self.docs.len();
        self.docs.retain(|&doc_id, _| !is_deleted(doc_id));
        (before - self.docs.len()) as u64
    }

    /// Add `other`'s score to every key present in both sets
    pub fn add_scores_from(&mut self, other: &ResultSet) {
        for (doc_id, score) in self.docs.iter_mut() {
            if let Some(extra) = other.score(*doc_id) {
                *score = saturating_score_add(*score, extra);
            }
        }
    }

    /// All candidates as `ScoredDoc`s, in unspecified order
    pub fn scored_docs(&self) -> Vec<ScoredDoc> {
        self.docs
            .iter()
            .map(|(&doc_id, &score)| ScoredDoc { doc_id, score })
            .collect()
    }

    /// The best `top` candidates via the radix selector
    pub fn top(&self, top: usize) -> Vec<ScoredDoc> {
        let mut selector = super::topk::RadixTopK::new(top);
        for (doc_id, score) in self.iter() {
            selector.add(ScoredDoc { doc_id, score });
        }
        selector.into_top()
    }
}

/// Query execution statistics
#[derive(Clone, Debug, Default)]
pub struct QueryStats {
    /// Distinct terms the planner produced entries for
    pub terms_planned: usize,
    /// Segmenter groups the scorer ran over
    pub groups_scored: usize,
    /// Posting records pulled from cursors
    pub postings_read: u64,
    /// Candidates admitted into the result set before composition
    pub candidates_admitted: u64,
    /// Keys dropped by the deletion filter
    pub deleted_dropped: u64,
    /// Query execution time in microseconds
    pub execution_time_us: u64,
}
