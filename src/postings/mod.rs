//! Posting lists and the per-term cursor protocol
//!
//! A posting list is the inverted-index entry for one word: a sequence of
//! records ordered by ascending `doc_id`, delta-encoded with the varint
//! codec. The query core never touches the encoded bytes directly; it
//! consumes cursors obtained from a [`CursorSource`].

pub mod codec;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use codec::{decode_varint, encode_varint};

/// One entry in a term's posting list, describing the term's occurrences
/// in one document
///
/// `first_position` is only meaningful when the cursor was obtained with
/// positions enabled; positional scoring must not be selected otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostingRecord {
    pub doc_id: u32,
    pub term_freq: u32,
    pub total_terms_in_doc: u32,
    pub first_position: u32,
}

/// Forward stream over one term's postings with targeted seek
///
/// Successive [`next`](PostingCursor::next) calls yield strictly increasing
/// `doc_id`s; exhaustion is `None`. The cursor is single-consumer and lives
/// for one query.
pub trait PostingCursor: Send {
    /// Advance to the next record, or `None` at the end of the stream
    fn next(&mut self) -> Option<PostingRecord>;

    /// Position at the first record with `doc_id >= target`, or `None`
    ///
    /// After `reset`, `seek(0)` is equivalent to `next()`. Seeking to a
    /// target at or before the current record re-yields the current record.
    fn seek(&mut self, target: u32) -> Option<PostingRecord>;

    /// Rewind to the start of the stream
    fn reset(&mut self);

    /// Number of records this cursor can yield
    ///
    /// For a partial cursor this is the materialised prefix length.
    fn doc_count(&self) -> u32;

    /// Total occurrences of the word across the whole posting list
    fn word_occurrence_total(&self) -> u64;

    /// Number of records in the full underlying list
    ///
    /// Differs from [`doc_count`](PostingCursor::doc_count) only when the
    /// cursor is partial.
    fn rel_doc_count(&self) -> u32;
}

/// Acquisition seam between the query core and the index layer
///
/// A word missing from the index yields an empty cursor, never an error;
/// I/O failures of the backing storage surface as [`FtqlError::IndexIo`]
/// and abort the query.
///
/// [`FtqlError::IndexIo`]: crate::error::FtqlError::IndexIo
pub trait CursorSource: Send + Sync {
    /// Open a cursor for `word`
    ///
    /// `partial` asks for a prefix-only cursor; the source decides the
    /// prefix length. `with_positions` requests meaningful
    /// `first_position` values.
    fn open(&self, word: &str, with_positions: bool, partial: bool)
        -> Result<Box<dyn PostingCursor>>;

    /// Total number of documents in the index
    fn total_documents(&self) -> u64;

    /// Whether the index stores term positions
    fn has_positions(&self) -> bool;
}

const SKIP_INTERVAL: u32 = 64;

#[derive(Clone, Copy, Debug)]
struct SkipEntry {
    /// Index of the first record after this entry
    index: u32,
    /// Byte offset of that record in the encoded data
    offset: u32,
    /// doc_id of the record preceding `index` (0 at the start)
    prev_doc: u32,
    /// doc_id of the record at `index`
    first_doc: u32,
}

/// Encoded in-memory posting list
///
/// Built once by the index layer (or a test fixture) and shared read-only
/// across cursors. Records are delta-encoded varints with a skip entry
/// every [`SKIP_INTERVAL`] records for targeted seeks.
#[derive(Clone, Debug)]
pub struct MemoryPostingList {
    data: Arc<Vec<u8>>,
    skips: Arc<Vec<SkipEntry>>,
    doc_count: u32,
    word_occurrence_total: u64,
    with_positions: bool,
}

impl MemoryPostingList {
    /// Start building a posting list
    pub fn builder(with_positions: bool) -> MemoryPostingListBuilder {
        MemoryPostingListBuilder {
            with_positions,
            records: Vec::new(),
        }
    }

    /// An empty list (the representation of a missing term)
    pub fn empty() -> Self {
        Self {
            data: Arc::new(Vec::new()),
            skips: Arc::new(Vec::new()),
            doc_count: 0,
            word_occurrence_total: 0,
            with_positions: false,
        }
    }

    pub fn doc_count(&self) -> u32 {
        self.doc_count
    }

    pub fn word_occurrence_total(&self) -> u64 {
        self.word_occurrence_total
    }

    /// Open a cursor over this list
    ///
    /// `limit` caps the number of records the cursor may yield; the list's
    /// full statics stay visible through `rel_doc_count` and
    /// `word_occurrence_total`.
    pub fn cursor(&self, limit: Option<u32>) -> MemoryPostingCursor {
        let limit = limit.unwrap_or(self.doc_count).min(self.doc_count);
        MemoryPostingCursor {
            data: Arc::clone(&self.data),
            skips: Arc::clone(&self.skips),
            total: self.doc_count,
            word_occurrence_total: self.word_occurrence_total,
            with_positions: self.with_positions,
            limit,
            pos: 0,
            prev_doc: 0,
            read_index: 0,
            current: None,
        }
    }
}

/// Builder accumulating records in ascending `doc_id` order
pub struct MemoryPostingListBuilder {
    with_positions: bool,
    records: Vec<PostingRecord>,
}

impl MemoryPostingListBuilder {
    /// Append a record; `doc_id` must exceed the previous record's
    pub fn push(mut self, record: PostingRecord) -> Self {
        debug_assert!(
            self.records.last().map_or(true, |p| p.doc_id < record.doc_id),
            "posting doc_ids must strictly increase"
        );
        self.records.push(record);
        self
    }

    /// Encode the accumulated records
    pub fn build(self) -> MemoryPostingList {
        let mut data = Vec::new();
        let mut skips = Vec::new();
        let mut prev_doc = 0u32;
        let mut occurrence_total = 0u64;

        for (i, record) in self.records.iter().enumerate() {
            if i as u32 % SKIP_INTERVAL == 0 {
                skips.push(SkipEntry {
                    index: i as u32,
                    offset: data.len() as u32,
                    prev_doc,
                    first_doc: record.doc_id,
                });
            }

            encode_varint(record.doc_id - prev_doc, &mut data);
            encode_varint(record.term_freq, &mut data);
            encode_varint(record.total_terms_in_doc, &mut data);
            if self.with_positions {
                encode_varint(record.first_position, &mut data);
            }

            prev_doc = record.doc_id;
            occurrence_total += record.term_freq as u64;
        }

        MemoryPostingList {
            data: Arc::new(data),
            skips: Arc::new(skips),
            doc_count: self.records.len() as u32,
            word_occurrence_total: occurrence_total,
            with_positions: self.with_positions,
        }
    }
}

/// Cursor over a [`MemoryPostingList`]
pub struct MemoryPostingCursor {
    data: Arc<Vec<u8>>,
    skips: Arc<Vec<SkipEntry>>,
    total: u32,
    word_occurrence_total: u64,
    with_positions: bool,
    /// Number of records this cursor may yield (prefix length when partial)
    limit: u32,
    pos: usize,
    prev_doc: u32,
    read_index: u32,
    current: Option<PostingRecord>,
}

impl MemoryPostingCursor {
    fn decode_next(&mut self) -> Option<PostingRecord> {
        if self.read_index >= self.limit {
            self.current = None;
            return None;
        }

        let data = self.data.as_slice();
        let delta = decode_varint(data, &mut self.pos).ok()?;
        let term_freq = decode_varint(data, &mut self.pos).ok()?;
        let total_terms_in_doc = decode_varint(data, &mut self.pos).ok()?;
        let first_position = if self.with_positions {
            decode_varint(data, &mut self.pos).ok()?
        } else {
            0
        };

        let doc_id = self.prev_doc + delta;
        self.prev_doc = doc_id;
        self.read_index += 1;

        let record = PostingRecord {
            doc_id,
            term_freq,
            total_terms_in_doc,
            first_position,
        };
        self.current = Some(record);
        Some(record)
    }
}

impl PostingCursor for MemoryPostingCursor {
    fn next(&mut self) -> Option<PostingRecord> {
        self.decode_next()
    }

    fn seek(&mut self, target: u32) -> Option<PostingRecord> {
        if let Some(current) = self.current {
            if current.doc_id >= target {
                return Some(current);
            }
        }

        // Jump over whole skip blocks that end before the target.
        let mut best: Option<&SkipEntry> = None;
        for skip in self.skips.iter() {
            if skip.first_doc <= target && skip.index > self.read_index && skip.index < self.limit {
                best = Some(skip);
            }
        }
        if let Some(skip) = best {
            self.pos = skip.offset as usize;
            self.prev_doc = skip.prev_doc;
            self.read_index = skip.index;
            self.current = None;
        }

        while let Some(record) = self.decode_next() {
            if record.doc_id >= target {
                return Some(record);
            }
        }
        None
    }

    fn reset(&mut self) {
        self.pos = 0;
        self.prev_doc = 0;
        self.read_index = 0;
        self.current = None;
    }

    fn doc_count(&self) -> u32 {
        self.limit
    }

    fn word_occurrence_total(&self) -> u64 {
        self.word_occurrence_total
    }

    fn rel_doc_count(&self) -> u32 {
        self.total
    }
}

/// In-memory index: a [`CursorSource`] over built posting lists
///
/// The production index layer implements [`CursorSource`] over its segment
/// files; this implementation backs embedded use and the test suites.
pub struct MemoryIndex {
    lists: HashMap<String, MemoryPostingList>,
    total_documents: u64,
    with_positions: bool,
    partial_load_limit: u32,
}

impl MemoryIndex {
    pub fn new(total_documents: u64, with_positions: bool) -> Self {
        Self {
            lists: HashMap::new(),
            total_documents,
            with_positions,
            partial_load_limit: 1024,
        }
    }

    /// Set the prefix length handed out for partial cursors
    pub fn with_partial_load_limit(mut self, limit: u32) -> Self {
        self.partial_load_limit = limit;
        self
    }

    /// Register the posting list for a word
    pub fn insert_list(&mut self, word: impl Into<String>, list: MemoryPostingList) {
        self.lists.insert(word.into(), list);
    }
}

impl CursorSource for MemoryIndex {
    fn open(
        &self,
        word: &str,
        _with_positions: bool,
        partial: bool,
    ) -> Result<Box<dyn PostingCursor>> {
        let limit = partial.then_some(self.partial_load_limit);
        match self.lists.get(word) {
            Some(list) => Ok(Box::new(list.cursor(limit))),
            None => Ok(Box::new(MemoryPostingList::empty().cursor(None))),
        }
    }

    fn total_documents(&self) -> u64 {
        self.total_documents
    }

    fn has_positions(&self) -> bool {
        self.with_positions
    }
}
