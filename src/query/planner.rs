//! Query planning: term entries, per-term statics and LIKE preparation

use tracing::debug;

use crate::error::{FtqlError, Result};
use crate::postings::PostingCursor;
use crate::query::context::QueryContext;
use crate::query::types::{QueryFlags, QueryWord};

/// One distinct query word with its cursor and scoring statics
///
/// The entry exclusively owns its cursor for the query's lifetime.
pub struct TermEntry {
    pub word: String,
    /// Occurrences of this word in the query
    pub query_count: u32,
    /// Sum of per-occurrence ranks, clamped to >= 1
    pub query_rank: u32,
    /// Byte offset of the earliest occurrence in the query string
    pub first_position: u32,
    /// `ilog10(total_documents / doc_count + 1) + 1`
    pub idf: i64,
    /// `floor(sqrt(word_occurrence_total))`, clamped to >= 1
    pub norm_d_t: i64,
    /// Field weight, clamped to >= 1
    pub field_rank: i64,
    pub cursor: Box<dyn PostingCursor>,
}

impl TermEntry {
    /// Byte range the word occupies in the query string
    pub fn span(&self) -> (u32, u32) {
        (self.first_position, self.word.len() as u32)
    }
}

/// Output of the planning phase
pub struct QueryPlan {
    pub terms: Vec<TermEntry>,
    /// `floor(sqrt(sum of query_rank^2))`; handed to the caller for length
    /// normalisation, never applied internally
    pub norm_ranks: u64,
    /// Single-term prefix-consuming path selected
    pub one_word_optimize: bool,
    /// Positional scoring selected (index stores positions)
    pub positional: bool,
}

/// Query planner producing [`QueryPlan`]s for the executor
pub struct QueryPlanner;

impl QueryPlanner {
    /// Build term entries and statics for a word sequence
    pub fn plan(
        ctx: &QueryContext,
        words: &[QueryWord],
        field_rank: u32,
        flags: &QueryFlags,
    ) -> Result<QueryPlan> {
        // Fold repeated words into one entry each, keeping the earliest
        // position and accumulating rank and count.
        let mut folded: Vec<(String, u32, u32, u32)> = Vec::new();
        for word in words {
            match folded.iter().position(|(w, ..)| w == &word.word) {
                Some(i) => {
                    folded[i].1 += 1;
                    folded[i].2 += word.rank;
                }
                None => folded.push((word.word.clone(), 1, word.rank, word.position)),
            }
        }

        let positional = ctx.has_positions();
        let partial = flags.can_load_part_of_docs && folded.len() == 1;
        let one_word_optimize = partial && flags.no_and_expression;
        let field_rank = i64::from(field_rank.max(1));
        let total_documents = ctx.total_documents();

        let mut terms = Vec::with_capacity(folded.len());
        let mut rank_square_sum = 0u64;

        for (word, query_count, query_rank, first_position) in folded {
            let cursor = ctx.open_cursor(&word, positional, partial)?;

            let query_rank = query_rank.max(1);
            rank_square_sum += u64::from(query_rank) * u64::from(query_rank);

            let doc_count = u64::from(cursor.doc_count());
            let idf = if doc_count == 0 {
                0
            } else {
                i64::from((total_documents / doc_count + 1).ilog10()) + 1
            };
            let norm_d_t = isqrt(cursor.word_occurrence_total()).max(1) as i64;

            terms.push(TermEntry {
                word,
                query_count,
                query_rank,
                first_position,
                idf,
                norm_d_t,
                field_rank,
                cursor,
            });
        }

        let norm_ranks = isqrt(rank_square_sum);
        debug!(
            terms = terms.len(),
            one_word_optimize, positional, "query plan built"
        );

        Ok(QueryPlan {
            terms,
            norm_ranks,
            one_word_optimize,
            positional,
        })
    }

    /// Prepare a `LIKE` literal for tokenization
    ///
    /// Strips `%` wildcards and undoes the SQL quote doubling. The raw
    /// literal (wildcards intact) is what the mirror post-filter sends.
    pub fn prepare_like_literal(raw: &str) -> Result<String> {
        let cleaned = raw.replace('%', "").replace("''", "'");
        if cleaned.trim().is_empty() {
            return Err(FtqlError::InvalidQuery(
                "empty LIKE pattern after stripping wildcards".to_string(),
            ));
        }
        Ok(cleaned)
    }
}

/// Integer square root, rounding down
pub(crate) fn isqrt(n: u64) -> u64 {
    if n == 0 {
        return 0;
    }
    let mut r = (n as f64).sqrt() as u64;
    while r.checked_mul(r).map_or(true, |sq| sq > n) {
        r -= 1;
    }
    while (r + 1).checked_mul(r + 1).map_or(false, |sq| sq <= n) {
        r += 1;
    }
    r
}
