//! Query execution: the full scoring pipeline for one predicate
//!
//! Planning, segmentation, per-group scoring, boolean composition with the
//! upstream set, deletion filtering and the mirror post-filter compose
//! strictly bottom-up here.

use std::time::Instant;

use tracing::debug;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::mirror;
use crate::query::combiner;
use crate::query::context::QueryContext;
use crate::query::planner::QueryPlanner;
use crate::query::scorer;
use crate::query::segmenter;
use crate::query::types::{QueryFlags, QueryStats, QueryWord, ResultSet};

/// One query step as handed over by the SQL layer
#[derive(Clone, Debug)]
pub enum SearchQuery {
    /// A tokenized multi-word query (phrase or word list)
    Words(Vec<QueryWord>),
    /// A `LIKE` literal with `%` wildcards and doubled quotes intact
    Like(String),
}

/// Execution outcome: the result set plus statistics
#[derive(Debug)]
pub struct QueryOutput {
    pub result: ResultSet,
    /// Caller-side length normaliser `floor(sqrt(sum of query_rank^2))`;
    /// not applied internally
    pub norm_ranks: u64,
    pub stats: QueryStats,
}

/// Query executor
pub struct SearchExecutor {
    config: SearchConfig,
}

impl SearchExecutor {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Execute one predicate against the index
    ///
    /// `upstream` is the outer boolean context; it is borrowed and never
    /// mutated. The returned mapping is unordered; callers apply top-K
    /// iteration.
    pub fn execute(
        &self,
        ctx: &QueryContext,
        query: SearchQuery,
        field_rank: u32,
        flags: QueryFlags,
        upstream: Option<&ResultSet>,
    ) -> Result<QueryOutput> {
        let start = Instant::now();
        ctx.check_cancelled()?;
        let mut stats = QueryStats::default();

        let (words, like_literal) = match query {
            SearchQuery::Words(words) => (words, None),
            SearchQuery::Like(raw) => {
                let cleaned = QueryPlanner::prepare_like_literal(&raw)?;
                let words = ctx
                    .tokenizer()
                    .tokenize(&cleaned)
                    .into_iter()
                    .map(|t| QueryWord::new(t.word, t.rank, t.position))
                    .collect();
                (words, Some(raw))
            }
        };

        if words.is_empty() {
            stats.execution_time_us = start.elapsed().as_micros() as u64;
            return Ok(QueryOutput {
                result: ResultSet::new(),
                norm_ranks: 0,
                stats,
            });
        }

        let mut plan = QueryPlanner::plan(ctx, &words, field_rank, &flags)?;
        stats.terms_planned = plan.terms.len();

        let groups = segmenter::segment(&plan.terms);
        let one_word_min = plan.one_word_optimize.then_some(self.config.min_result_count);
        // A negated predicate composes with the upstream at the end, not
        // during admission.
        let scoring_upstream = if flags.not { None } else { upstream };

        let mut result = ResultSet::new();
        for group in &groups {
            let part = scorer::score_group(
                &mut plan.terms,
                group,
                plan.positional,
                one_word_min,
                scoring_upstream,
                ctx.cancel_token(),
                &mut stats,
            )?;
            stats.groups_scored += 1;
            combiner::or_merge(&mut result, part);
        }

        if flags.not {
            result = combiner::apply_not(result, upstream);
        } else if let Some(upstream) = upstream {
            combiner::apply_upstream_scores(&mut result, upstream);
        }

        let deletions = ctx.deletions();
        let deleted = result.retain_not_deleted(|doc_id| deletions.contains(doc_id));
        stats.deleted_dropped = deleted;

        result.rel_total_count = if plan.one_word_optimize && upstream.is_none() && !flags.not {
            u64::from(plan.terms[0].cursor.rel_doc_count()).saturating_sub(deleted)
        } else {
            result.len() as u64
        };

        if let Some(raw) = like_literal {
            result = mirror::apply_like_filter(ctx, &raw, result, &flags)?;
        }

        stats.execution_time_us = start.elapsed().as_micros() as u64;
        debug!(
            candidates = result.len(),
            rel_total = result.rel_total_count,
            groups = stats.groups_scored,
            "query executed"
        );

        Ok(QueryOutput {
            result,
            norm_ranks: plan.norm_ranks,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postings::{MemoryIndex, MemoryPostingList, PostingRecord};
    use crate::query::context::{DeletionFilter, QueryContext};
    use std::sync::Arc;

    fn list(records: &[(u32, u32)]) -> MemoryPostingList {
        let mut builder = MemoryPostingList::builder(false);
        for &(doc_id, term_freq) in records {
            builder = builder.push(PostingRecord {
                doc_id,
                term_freq,
                total_terms_in_doc: 10,
                first_position: 0,
            });
        }
        builder.build()
    }

    fn context() -> QueryContext {
        let mut index = MemoryIndex::new(10, false);
        index.insert_list("alpha", list(&[(1, 3), (2, 5), (3, 1)]));
        index.insert_list("beta", list(&[(2, 1), (4, 2)]));
        QueryContext::builder(Arc::new(index)).build()
    }

    fn words(entries: &[(&str, u32)]) -> SearchQuery {
        SearchQuery::Words(
            entries.iter()
                .map(|&(w, pos)| QueryWord::new(w, 1, pos))
                .collect(),
        )
    }

    #[test]
    fn test_single_word_query() {
        let ctx = context();
        let executor = SearchExecutor::new(SearchConfig::default());
        let output = executor
            .execute(&ctx, words(&[("alpha", 0)]), 1, QueryFlags::default(), None)
            .unwrap();

        assert_eq!(output.result.len(), 3);
        assert_eq!(output.result.rel_total_count, 3);
        assert_eq!(output.norm_ranks, 1);
        assert_eq!(output.stats.terms_planned, 1);
    }

    #[test]
    fn test_and_intersection() {
        let ctx = context();
        let executor = SearchExecutor::new(SearchConfig::default());
        let output = executor
            .execute(
                &ctx,
                words(&[("alpha", 0), ("beta", 6)]),
                1,
                QueryFlags::default(),
                None,
            )
            .unwrap();

        assert_eq!(output.result.len(), 1);
        assert!(output.result.contains(2));
    }

    #[test]
    fn test_empty_words_empty_result() {
        let ctx = context();
        let executor = SearchExecutor::new(SearchConfig::default());
        let output = executor
            .execute(&ctx, words(&[]), 1, QueryFlags::default(), None)
            .unwrap();
        assert!(output.result.is_empty());
    }

    #[test]
    fn test_deletion_filter_applied() {
        let deletions = Arc::new(DeletionFilter::new());
        deletions.delete(2);

        let mut index = MemoryIndex::new(10, false);
        index.insert_list("alpha", list(&[(1, 3), (2, 5), (3, 1)]));
        let ctx = QueryContext::builder(Arc::new(index))
            .deletions(deletions)
            .build();

        let executor = SearchExecutor::new(SearchConfig::default());
        let output = executor
            .execute(&ctx, words(&[("alpha", 0)]), 1, QueryFlags::default(), None)
            .unwrap();

        assert_eq!(output.result.len(), 2);
        assert!(!output.result.contains(2));
        assert_eq!(output.stats.deleted_dropped, 1);
        assert_eq!(output.result.rel_total_count, 2);
    }

    #[test]
    fn test_rel_total_count_partial_path() {
        let mut index = MemoryIndex::new(100, false).with_partial_load_limit(2);
        index.insert_list("alpha", list(&[(1, 3), (2, 5), (3, 1), (4, 2)]));
        let ctx = QueryContext::builder(Arc::new(index)).build();

        let executor = SearchExecutor::new(SearchConfig::default());
        let flags = QueryFlags {
            can_load_part_of_docs: true,
            no_and_expression: true,
            ..Default::default()
        };
        let output = executor
            .execute(&ctx, words(&[("alpha", 0)]), 1, flags, None)
            .unwrap();

        // two of four records materialised, but the total stays visible
        assert_eq!(output.result.len(), 2);
        assert_eq!(output.result.rel_total_count, 4);
    }

    #[test]
    fn test_not_composes_with_upstream() {
        let ctx = context();
        let executor = SearchExecutor::new(SearchConfig::default());

        let mut upstream = ResultSet::new();
        for doc in [1u32, 2, 7] {
            upstream.insert(doc, 50);
        }

        let flags = QueryFlags {
            not: true,
            ..Default::default()
        };
        let output = executor
            .execute(&ctx, words(&[("alpha", 0)]), 1, flags, Some(&upstream))
            .unwrap();

        // alpha matches {1,2,3}; upstream keys minus those leave {7}
        assert_eq!(output.result.len(), 1);
        assert!(output.result.contains(7));
        assert!(!output.result.not);
    }

    #[test]
    fn test_upstream_scores_added() {
        let ctx = context();
        let executor = SearchExecutor::new(SearchConfig::default());

        let mut upstream = ResultSet::new();
        upstream.insert(2, 7);

        let output = executor
            .execute(
                &ctx,
                words(&[("alpha", 0)]),
                1,
                QueryFlags::default(),
                Some(&upstream),
            )
            .unwrap();

        // only doc 2 survives the upstream AND, with the upstream score
        // credited on top
        assert_eq!(output.result.len(), 1);
        let alone = executor
            .execute(&ctx, words(&[("alpha", 0)]), 1, QueryFlags::default(), None)
            .unwrap();
        assert_eq!(
            output.result.score(2),
            Some(alone.result.score(2).unwrap() + 7)
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = crate::query::context::CancellationToken::new();
        cancel.cancel();
        let mut index = MemoryIndex::new(10, false);
        index.insert_list("alpha", list(&[(1, 1)]));
        let ctx = QueryContext::builder(Arc::new(index))
            .cancel_token(cancel)
            .build();

        let executor = SearchExecutor::new(SearchConfig::default());
        let err = executor
            .execute(&ctx, words(&[("alpha", 0)]), 1, QueryFlags::default(), None)
            .unwrap_err();
        assert!(matches!(err, crate::error::FtqlError::Cancelled));
    }
}
