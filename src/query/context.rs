//! Query execution context
//!
//! The `QueryContext` bundles the shared read-only state a query runs
//! against: the cursor source, tokenizer, deletion filter, doc-id
//! replacement map, mirror binding and the cancellation token.

use parking_lot::RwLock;
use roaring::RoaringBitmap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::{FtqlError, Result};
use crate::mirror::MirrorBinding;
use crate::postings::{CursorSource, PostingCursor};
use crate::tokenizer::Tokenizer;

/// External cancellation token
///
/// Checked between cursor records and before each mirror call; observed
/// cancellation aborts the query without mutating shared state.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Membership structure over deleted doc ids
///
/// Process-lifetime: initialised at table-open, updated as rows are
/// deleted, shared read-only by running queries.
#[derive(Debug, Default)]
pub struct DeletionFilter {
    deleted: RwLock<RoaringBitmap>,
}

impl DeletionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete(&self, doc_id: u32) {
        self.deleted.write().insert(doc_id);
    }

    pub fn contains(&self, doc_id: u32) -> bool {
        self.deleted.read().contains(doc_id)
    }

    pub fn len(&self) -> u64 {
        self.deleted.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.read().is_empty()
    }
}

/// Bidirectional `doc_id <-> external_id` translation for replacement id
/// fields
#[derive(Clone, Debug, Default)]
pub struct DocIdMap {
    to_external: HashMap<u32, u32>,
    to_internal: HashMap<u32, u32>,
}

impl DocIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, doc_id: u32, external_id: u32) {
        self.to_external.insert(doc_id, external_id);
        self.to_internal.insert(external_id, doc_id);
    }

    pub fn external(&self, doc_id: u32) -> Option<u32> {
        self.to_external.get(&doc_id).copied()
    }

    pub fn internal(&self, external_id: u32) -> Option<u32> {
        self.to_internal.get(&external_id).copied()
    }

    pub fn len(&self) -> usize {
        self.to_external.len()
    }

    pub fn is_empty(&self) -> bool {
        self.to_external.is_empty()
    }
}

/// Shared read-only state for one query
pub struct QueryContext {
    source: Arc<dyn CursorSource>,
    tokenizer: Arc<Tokenizer>,
    deletions: Arc<DeletionFilter>,
    doc_id_map: Option<Arc<DocIdMap>>,
    mirror: Option<MirrorBinding>,
    cancel: CancellationToken,
    config: SearchConfig,
}

impl QueryContext {
    /// Create a context builder
    pub fn builder(source: Arc<dyn CursorSource>) -> QueryContextBuilder {
        QueryContextBuilder {
            source,
            tokenizer: None,
            deletions: None,
            doc_id_map: None,
            mirror: None,
            cancel: None,
            config: None,
        }
    }

    pub fn total_documents(&self) -> u64 {
        self.source.total_documents()
    }

    /// Whether the index stores term positions (positional scoring is only
    /// selectable when it does)
    pub fn has_positions(&self) -> bool {
        self.source.has_positions()
    }

    /// Acquire a posting cursor for a word
    pub fn open_cursor(
        &self,
        word: &str,
        with_positions: bool,
        partial: bool,
    ) -> Result<Box<dyn PostingCursor>> {
        self.source.open(word, with_positions, partial)
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn deletions(&self) -> &DeletionFilter {
        &self.deletions
    }

    pub fn doc_id_map(&self) -> Option<&DocIdMap> {
        self.doc_id_map.as_deref()
    }

    pub fn mirror(&self) -> Option<&MirrorBinding> {
        self.mirror.as_ref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Bail out with `FtqlError::Cancelled` if cancellation was observed
    pub fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(FtqlError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Builder for [`QueryContext`]
pub struct QueryContextBuilder {
    source: Arc<dyn CursorSource>,
    tokenizer: Option<Arc<Tokenizer>>,
    deletions: Option<Arc<DeletionFilter>>,
    doc_id_map: Option<Arc<DocIdMap>>,
    mirror: Option<MirrorBinding>,
    cancel: Option<CancellationToken>,
    config: Option<SearchConfig>,
}

impl QueryContextBuilder {
    pub fn tokenizer(mut self, tokenizer: Arc<Tokenizer>) -> Self {
        self.tokenizer = Some(tokenizer);
        self
    }

    pub fn deletions(mut self, deletions: Arc<DeletionFilter>) -> Self {
        self.deletions = Some(deletions);
        self
    }

    pub fn doc_id_map(mut self, map: Arc<DocIdMap>) -> Self {
        self.doc_id_map = Some(map);
        self
    }

    pub fn mirror(mut self, mirror: MirrorBinding) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> QueryContext {
        let config = self.config.unwrap_or_default();
        let tokenizer = self
            .tokenizer
            .unwrap_or_else(|| Arc::new(Tokenizer::new(&config.tokenizer)));

        QueryContext {
            source: self.source,
            tokenizer,
            deletions: self.deletions.unwrap_or_default(),
            doc_id_map: self.doc_id_map,
            mirror: self.mirror,
            cancel: self.cancel.unwrap_or_default(),
            config,
        }
    }
}
