//! Mirror post-filter for `LIKE` queries
//!
//! The relational mirror holds the authoritative row data. For a `LIKE`
//! query the scored candidates are only token-level matches; a single
//! confirmatory statement against the mirror decides which of the top
//! ranked candidates actually satisfy the wildcard pattern.

use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::query::context::QueryContext;
use crate::query::types::{QueryFlags, ResultSet};

/// Relational adapter seam
///
/// The statement text carries literally quoted identifiers and values; no
/// parameter binding is assumed. The result is a single integer column.
pub trait MirrorAdapter: Send + Sync {
    fn query_sql(&self, sql: &str) -> Result<Vec<u32>>;
}

/// Binding of a search field to its mirror table
#[derive(Clone)]
pub struct MirrorBinding {
    pub adapter: Arc<dyn MirrorAdapter>,
    pub table: String,
    pub field: String,
    pub id_field: String,
    /// The id field is a replacement field: `doc_id` must be translated
    /// through the context's [`DocIdMap`] around the mirror call
    ///
    /// [`DocIdMap`]: crate::query::context::DocIdMap
    pub id_is_replacement: bool,
}

/// Escape a literal for embedding in a statement by doubling quotes
pub fn escape_like_literal(literal: &str) -> String {
    literal.replace('\'', "''")
}

/// Number of top candidates handed to the mirror
///
/// `end + 1 + 10` rounded up to the next multiple of 100, or the
/// configured minimum result count when the caller gave no end position.
fn prefilter_limit(end: Option<usize>, min_result_count: usize) -> usize {
    match end {
        Some(end) => (end + 11).div_ceil(100) * 100,
        None => min_result_count,
    }
}

/// Confirm the top scored candidates against the mirror `LIKE` predicate
///
/// `raw_literal` is the captured like-string, wildcards and quote doubling
/// intact. Returns the intersection of the scored set with the ids the
/// mirror confirmed; when `need_group_by` is set and the mirror reduced
/// the set, the pre-filter ids are kept as the group-by companion.
pub fn apply_like_filter(
    ctx: &QueryContext,
    raw_literal: &str,
    result: ResultSet,
    flags: &QueryFlags,
) -> Result<ResultSet> {
    let Some(binding) = ctx.mirror() else {
        return Ok(result);
    };
    // A complement-marked set has no candidate ids to confirm.
    if result.not || result.is_empty() {
        return Ok(result);
    }

    let limit = prefilter_limit(flags.end, ctx.config().min_result_count).max(1);
    let mut candidates = result.scored_docs();
    if candidates.len() > limit {
        candidates.select_nth_unstable_by(limit - 1, |a, b| b.cmp(a));
        candidates.truncate(limit);
    }
    candidates.sort_unstable_by(|a, b| b.cmp(a));

    let mut prefilter_ids = Vec::with_capacity(candidates.len());
    let mut statement_ids = Vec::with_capacity(candidates.len());
    for doc in &candidates {
        let external = if binding.id_is_replacement {
            match ctx.doc_id_map().and_then(|m| m.external(doc.doc_id)) {
                Some(id) => id,
                None => {
                    debug!(doc_id = doc.doc_id, "no replacement id, candidate skipped");
                    continue;
                }
            }
        } else {
            doc.doc_id
        };
        prefilter_ids.push(doc.doc_id);
        statement_ids.push(external);
    }

    if statement_ids.is_empty() {
        let mut empty = ResultSet::new();
        empty.rel_total_count = 0;
        return Ok(empty);
    }

    let in_list = statement_ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let sql = format!(
        "SELECT {id} FROM {table} WHERE {field} LIKE '{literal}' AND {id} IN ({in_list})",
        id = binding.id_field,
        table = binding.table,
        field = binding.field,
        literal = raw_literal,
    );

    ctx.check_cancelled()?;
    debug!(candidates = statement_ids.len(), "mirror LIKE filter issued");
    let confirmed = binding.adapter.query_sql(&sql)?;

    let mut filtered = ResultSet::new();
    for external in confirmed {
        let doc_id = if binding.id_is_replacement {
            match ctx.doc_id_map().and_then(|m| m.internal(external)) {
                Some(id) => id,
                None => continue,
            }
        } else {
            external
        };
        if let Some(score) = result.score(doc_id) {
            filtered.insert(doc_id, score);
        }
    }

    filtered.rel_total_count = filtered.len() as u64;
    if flags.need_group_by && filtered.len() < prefilter_ids.len() {
        filtered.group_by = Some(prefilter_ids.into_iter().collect());
    }

    Ok(filtered)
}
