//! Composition of scored results with upstream boolean context
//!
//! The upstream set is borrowed and never mutated; score merging writes
//! into the child set. A set marked `not` stands for the complement of its
//! keys and is never materialised.

use crate::query::types::{saturating_score_add, ResultSet};

/// Whether a candidate may enter the result under the upstream context
pub(crate) fn admits(upstream: Option<&ResultSet>, doc_id: u32) -> bool {
    match upstream {
        None => true,
        Some(u) if u.not => !u.contains(doc_id),
        Some(u) => u.contains(doc_id),
    }
}

/// Fold `part` into `into`, adding scores (saturating) on key collisions
pub(crate) fn or_merge(into: &mut ResultSet, part: ResultSet) {
    for (doc_id, score) in part.iter() {
        into.insert_add(doc_id, score);
    }
}

/// Finish a positive predicate: credit upstream scores to every survivor
pub(crate) fn apply_upstream_scores(result: &mut ResultSet, upstream: &ResultSet) {
    if upstream.not {
        return;
    }
    result.add_scores_from(upstream);
}

/// Finish a negated predicate
///
/// The scored set becomes a complement marker and is AND-merged with the
/// upstream set when one exists: a plain upstream keeps its keys that the
/// scored set excludes; a negated upstream unions into a wider complement.
pub(crate) fn apply_not(mut result: ResultSet, upstream: Option<&ResultSet>) -> ResultSet {
    result.not = true;

    match upstream {
        None => result,
        Some(u) if u.not => {
            // not A AND not B = not (A OR B)
            for (doc_id, score) in u.iter() {
                result.insert_add(doc_id, score);
            }
            result
        }
        Some(u) => {
            let mut kept = ResultSet::new();
            for (doc_id, score) in u.iter() {
                if !result.contains(doc_id) {
                    kept.insert(doc_id, score);
                }
            }
            kept
        }
    }
}
