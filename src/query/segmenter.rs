//! Partitioning of overlapping term entries into scoring groups
//!
//! Tokenizers may emit overlapping candidate tokens for the same character
//! range (compound-word variants). A group is a maximal subset of term
//! entries whose occupied ranges `[first_position, first_position + len)`
//! are pairwise disjoint; the scorer runs once per group and the results
//! are OR-merged.

use crate::query::planner::TermEntry;

#[derive(Clone, Copy, Debug)]
struct Span {
    start: u32,
    len: u32,
    rank: u32,
}

impl Span {
    fn end(&self) -> u32 {
        self.start + self.len
    }
}

/// Partition term entries into groups of non-overlapping spans
///
/// Returns index lists into `terms`; every term lands in at least one
/// group, and within a group the spans are pairwise disjoint and sorted by
/// position.
pub fn segment(terms: &[TermEntry]) -> Vec<Vec<usize>> {
    let spans: Vec<Span> = terms
        .iter()
        .map(|t| {
            let (start, len) = t.span();
            Span {
                start,
                len,
                rank: t.query_rank,
            }
        })
        .collect();
    segment_spans(&spans)
}

fn segment_spans(spans: &[Span]) -> Vec<Vec<usize>> {
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by(|&a, &b| {
        spans[a]
            .start
            .cmp(&spans[b].start)
            .then(spans[b].rank.cmp(&spans[a].rank))
    });

    let mut groups: Vec<Vec<usize>> = Vec::new();

    for &i in &order {
        let span = spans[i];
        let placed = groups.iter_mut().any(|group| {
            let last = spans[*group.last().expect("groups are never empty")];
            if span.start >= last.end() {
                group.push(i);
                true
            } else {
                false
            }
        });

        if !placed {
            // Open a new group, prefilled with the group-0 prefix that
            // fits before this span.
            let mut group = Vec::new();
            if let Some(first) = groups.first() {
                for &j in first {
                    let candidate = spans[j];
                    let tail_end = group
                        .last()
                        .map(|&l: &usize| spans[l].end())
                        .unwrap_or(0);
                    if candidate.end() <= span.start && candidate.start >= tail_end {
                        group.push(j);
                    }
                }
            }
            group.push(i);
            groups.push(group);
        }
    }

    // Extend every later group with the compatible tail of group 0 so each
    // group spans the full query.
    if let Some(first) = groups.first().cloned() {
        for group in groups.iter_mut().skip(1) {
            for &j in &first {
                let last = spans[*group.last().expect("groups are never empty")];
                if spans[j].start >= last.end() {
                    group.push(j);
                }
            }
        }
    }

    groups
}
