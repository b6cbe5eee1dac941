//! ftql — full-text query execution core with a SQL mirror post-filter
//!
//! The crate takes a tokenized phrase or a `LIKE` literal, intersects it
//! against an inverted index through per-term posting cursors, scores the
//! candidates with an integer TF/IDF variant (optionally weighted by
//! positional proximity), bounds the outcome with a radix top-K selector,
//! composes it with the outer boolean context, and finally confirms `LIKE`
//! candidates against the relational mirror.
//!
//! The index writer, segment format and SQL front-end live elsewhere; this
//! crate consumes a read-only [`CursorSource`] and a [`MirrorAdapter`].

pub mod config;
pub mod error;
pub mod mirror;
pub mod postings;
pub mod query;
pub mod tokenizer;

pub use config::{SearchConfig, TokenizerConfig};
pub use error::{FtqlError, Result};
pub use mirror::{MirrorAdapter, MirrorBinding};
pub use postings::{CursorSource, MemoryIndex, MemoryPostingList, PostingCursor, PostingRecord};
pub use query::{
    CancellationToken, DeletionFilter, DocIdMap, QueryContext, QueryFlags, QueryOutput,
    QueryStats, QueryWord, RadixTopK, ResultSet, ScoredDoc, SearchExecutor, SearchQuery,
    SCORE_SATURATION,
};
pub use tokenizer::Tokenizer;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
