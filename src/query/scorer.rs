//! Document scoring over merged posting cursors
//!
//! One driver/probe loop serves both scoring modes: the cheapest cursor
//! drives, the remaining cursors are probed with `seek`, and an exact
//! intersection scores the document. The positional mode differs from the
//! simple mode only in the proximity factor applied to each term's
//! contribution.

use tracing::trace;

use crate::error::Result;
use crate::postings::PostingRecord;
use crate::query::combiner;
use crate::query::context::CancellationToken;
use crate::query::planner::TermEntry;
use crate::query::types::{
    saturating_score_add, QueryStats, ResultSet, SCORE_SATURATION,
};

/// Score one segmenter group into a fresh result set
///
/// `one_word_min` enables the single-term early-termination threshold;
/// `upstream` pre-filters admissions per the combiner rules. Cancellation
/// is checked between driver records.
pub(crate) fn score_group(
    terms: &mut [TermEntry],
    group: &[usize],
    positional: bool,
    one_word_min: Option<usize>,
    upstream: Option<&ResultSet>,
    cancel: &CancellationToken,
    stats: &mut QueryStats,
) -> Result<ResultSet> {
    let mut result = ResultSet::new();
    if group.is_empty() {
        return Ok(result);
    }

    for &i in group {
        terms[i].cursor.reset();
    }

    // Cheapest driver first: fewest postings to walk.
    let mut probe_order = group.to_vec();
    probe_order.sort_by_key(|&i| terms[i].cursor.doc_count());
    let driver = probe_order[0];

    let num_terms = group.len();
    let ratio = if num_terms <= 1 {
        1.0
    } else {
        2.0 / (num_terms - 1) as f64
    };

    let mut admitted = 0usize;
    let mut max_term_freq = 0u32;
    // Records of the current candidate, slot-aligned with `group`.
    let mut matched: Vec<Option<PostingRecord>> = vec![None; num_terms];

    loop {
        if cancel.is_cancelled() {
            return Err(crate::error::FtqlError::Cancelled);
        }

        let Some(driver_record) = terms[driver].cursor.next() else {
            break;
        };
        stats.postings_read += 1;

        if let Some(min_count) = one_word_min {
            if admitted >= min_count && driver_record.term_freq < max_term_freq {
                continue;
            }
        }

        let slot = |term: usize| group.iter().position(|&g| g == term).expect("term in group");
        matched.iter_mut().for_each(|m| *m = None);
        matched[slot(driver)] = Some(driver_record);

        let mut agreed = true;
        for &probe in &probe_order[1..] {
            match terms[probe].cursor.seek(driver_record.doc_id) {
                Some(record) if record.doc_id == driver_record.doc_id => {
                    stats.postings_read += 1;
                    matched[slot(probe)] = Some(record);
                }
                _ => {
                    agreed = false;
                    break;
                }
            }
        }
        if !agreed {
            continue;
        }

        if !combiner::admits(upstream, driver_record.doc_id) {
            continue;
        }

        // Walk the group in query-position order so proximity deltas pair
        // each term with its predecessor in the query.
        let mut total = 0i64;
        let mut previous: Option<(usize, PostingRecord)> = None;
        for (slot_idx, &term) in group.iter().enumerate() {
            let record = matched[slot_idx].expect("full agreement");
            let entry = &terms[term];
            let base = per_term_score(entry, &record);

            let contribution = match previous {
                Some((prev_term, prev_record)) if positional => {
                    let factor = proximity_factor(
                        &terms[prev_term],
                        &prev_record,
                        entry,
                        &record,
                        ratio,
                    );
                    ((base as f64 * factor) as i64).min(SCORE_SATURATION)
                }
                _ => base,
            };

            total = saturating_score_add(total, contribution);
            previous = Some((term, record));
        }

        result.insert(driver_record.doc_id, total);
        stats.candidates_admitted += 1;
        admitted += 1;
        if one_word_min.is_some() && driver_record.term_freq > max_term_freq {
            max_term_freq = driver_record.term_freq;
        }
    }

    trace!(candidates = result.len(), "group scored");
    Ok(result)
}

/// The integer per-term score
///
/// `field_rank * query_rank * idf * term_freq * 1_000_000 /
/// (norm_d_t * total_terms_in_doc)`, saturating to the sentinel when the
/// numerator overflows 64-bit arithmetic.
fn per_term_score(entry: &TermEntry, record: &PostingRecord) -> i64 {
    let numerator = entry
        .field_rank
        .checked_mul(i64::from(entry.query_rank))
        .and_then(|v| v.checked_mul(entry.idf))
        .and_then(|v| v.checked_mul(i64::from(record.term_freq)))
        .and_then(|v| v.checked_mul(1_000_000));

    match numerator {
        Some(n) => {
            let denominator = entry
                .norm_d_t
                .saturating_mul(i64::from(record.total_terms_in_doc.max(1)));
            n / denominator
        }
        None => SCORE_SATURATION,
    }
}

/// Proximity factor between a term and its predecessor in the query
///
/// The query-side and document-side position deltas are compared; a small
/// mismatch boosts the contribution, a large one damps it.
fn proximity_factor(
    prev_entry: &TermEntry,
    prev_record: &PostingRecord,
    entry: &TermEntry,
    record: &PostingRecord,
    ratio: f64,
) -> f64 {
    let q_delta = entry.first_position as f64 - prev_entry.first_position as f64;
    let p_delta = record.first_position as f64 - prev_record.first_position as f64;

    let raw = (q_delta - p_delta).abs();
    let delta = if raw < 0.031 {
        0.031
    } else if raw <= 1.1 {
        0.5
    } else if raw <= 2.1 {
        1.0
    } else {
        raw
    };

    (1.0 / delta).powf(ratio) * record.term_freq as f64 * prev_record.term_freq as f64
        / (entry.query_count as f64 * prev_entry.query_count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::postings::MemoryPostingList;

    fn entry(
        word: &str,
        first_position: u32,
        records: &[(u32, u32, u32, u32)],
    ) -> TermEntry {
        let mut builder = MemoryPostingList::builder(true);
        for &(doc_id, term_freq, total_terms_in_doc, position) in records {
            builder = builder.push(PostingRecord {
                doc_id,
                term_freq,
                total_terms_in_doc,
                first_position: position,
            });
        }
        let list = builder.build();
        let occurrence_total = list.word_occurrence_total();

        TermEntry {
            word: word.to_string(),
            query_count: 1,
            query_rank: 1,
            first_position,
            idf: 1,
            norm_d_t: crate::query::planner::isqrt(occurrence_total).max(1) as i64,
            field_rank: 1,
            cursor: Box::new(list.cursor(None)),
        }
    }

    fn run(
        terms: &mut [TermEntry],
        positional: bool,
        one_word_min: Option<usize>,
        upstream: Option<&ResultSet>,
    ) -> ResultSet {
        let group: Vec<usize> = (0..terms.len()).collect();
        let mut stats = QueryStats::default();
        score_group(
            terms,
            &group,
            positional,
            one_word_min,
            upstream,
            &CancellationToken::new(),
            &mut stats,
        )
        .unwrap()
    }

    #[test]
    fn test_single_term_score_ratio() {
        // norm_d_t = isqrt(9) = 3, idf = 1, every doc has 10 terms
        let mut terms = vec![entry(
            "alpha",
            0,
            &[(1, 3, 10, 0), (2, 5, 10, 0), (3, 1, 10, 0)],
        )];
        let result = run(&mut terms, false, None, None);

        assert_eq!(result.len(), 3);
        assert_eq!(result.score(1), Some(100_000));
        assert_eq!(result.score(2), Some(166_666));
        assert_eq!(result.score(3), Some(33_333));
    }

    #[test]
    fn test_two_term_intersection() {
        let mut terms = vec![
            entry("alpha", 0, &[(7, 2, 10, 0), (42, 3, 10, 0)]),
            entry("beta", 6, &[(42, 1, 10, 0), (99, 4, 10, 0)]),
        ];
        let result = run(&mut terms, false, None, None);

        assert_eq!(result.len(), 1);
        // alpha: norm isqrt(5)=2 -> 3_000_000/20 = 150_000
        // beta: norm isqrt(5)=2 -> 1_000_000/20 = 50_000
        assert_eq!(result.score(42), Some(200_000));
    }

    #[test]
    fn test_positional_boost() {
        // query: alpha@0 beta@4; doc 1: alpha@10 beta@14 -> deltas agree
        let mut terms = vec![
            entry("alpha", 0, &[(1, 1, 10, 10)]),
            entry("beta", 4, &[(1, 1, 10, 14)]),
        ];
        let simple = {
            let mut t = vec![
                entry("alpha", 0, &[(1, 1, 10, 10)]),
                entry("beta", 4, &[(1, 1, 10, 14)]),
            ];
            run(&mut t, false, None, None)
        };
        let positional = run(&mut terms, true, None, None);

        // ratio = 2, delta clamps to 0.031, factor = (1/0.031)^2 > 1000
        let simple_score = simple.score(1).unwrap();
        let positional_score = positional.score(1).unwrap();
        assert!(positional_score > simple_score);

        let base = 1_000_000 / 10; // each term contributes 100_000 before the factor
        let factor = (1.0f64 / 0.031).powf(2.0);
        let expected = base as i64 + (base as f64 * factor) as i64;
        assert_eq!(positional_score, expected);
    }

    #[test]
    fn test_positional_mismatch_damps() {
        // doc positions 10 and 30: p_delta = 20 vs q_delta = 4 -> raw 16
        let mut terms = vec![
            entry("alpha", 0, &[(1, 1, 10, 10)]),
            entry("beta", 4, &[(1, 1, 10, 30)]),
        ];
        let result = run(&mut terms, true, None, None);

        let base = 100_000i64;
        let factor = (1.0f64 / 16.0).powf(2.0);
        let expected = base + (base as f64 * factor) as i64;
        assert_eq!(result.score(1), Some(expected));
    }

    #[test]
    fn test_one_word_threshold() {
        let records: Vec<(u32, u32, u32, u32)> = [2u32, 5, 3, 1, 6, 4]
            .iter()
            .enumerate()
            .map(|(i, &tf)| (i as u32 + 1, tf, 10, 0))
            .collect();
        let mut terms = vec![entry("alpha", 0, &records)];
        let result = run(&mut terms, false, Some(3), None);

        // ordinals 0,1,2 admitted below the threshold; 3 (tf=1 < max 5)
        // dropped; 4 (tf=6) raises the max; 5 (tf=4 < 6) dropped
        let mut docs: Vec<u32> = result.iter().map(|(d, _)| d).collect();
        docs.sort_unstable();
        assert_eq!(docs, vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_upstream_prefilter() {
        let mut upstream = ResultSet::new();
        upstream.insert(2, 1);

        let mut terms = vec![entry("alpha", 0, &[(1, 1, 10, 0), (2, 1, 10, 0)])];
        let result = run(&mut terms, false, None, Some(&upstream));

        assert_eq!(result.len(), 1);
        assert!(result.contains(2));
    }

    #[test]
    fn test_saturation_sentinel() {
        let mut terms = vec![entry("alpha", 0, &[(1, 1, 1, 0)])];
        // blow up the numerator: field_rank * query_rank * idf * tf * 1e6
        terms[0].field_rank = i64::MAX / 2;
        terms[0].idf = 3;
        let result = run(&mut terms, false, None, None);

        assert_eq!(result.score(1), Some(SCORE_SATURATION));
    }

    #[test]
    fn test_cancellation_aborts() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut terms = vec![entry("alpha", 0, &[(1, 1, 10, 0)])];
        let group = vec![0];
        let mut stats = QueryStats::default();
        let err = score_group(
            &mut terms,
            &group,
            false,
            None,
            None,
            &cancel,
            &mut stats,
        )
        .unwrap_err();
        assert!(matches!(err, crate::error::FtqlError::Cancelled));
    }
}
