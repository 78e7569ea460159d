//! Merge Iterator
//!
//! K-way ordered merge across all segments in the catalog, yielding one
//! globally sorted sequence of live user-visible (key, value) pairs.
//!
//! ## Semantics
//! - Ordering: user key ascending, byte-lexicographic
//! - Shadowing: for a user key present in several segments, only the entry
//!   from the newest segment is considered; older duplicates are discarded
//! - Tombstones: a winning deletion marker suppresses its key entirely
//! - Prefix filter: the merge stops as soon as the globally smallest
//!   remaining key leaves the prefix (keys are ordered, so prefix
//!   membership never comes back)
//! - Suffix filter: applied to the shadow-resolved winner only; suffixes do
//!   not respect key ordering, so there is no early termination
//!
//! One forward cursor per segment sits in a min-priority heap keyed by
//! (user key ascending, catalog recency ascending), so the popped cursor is
//! always the shadow winner for its key.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::catalog::SegmentCatalog;
use crate::error::Result;
use crate::segment::{self, RecordType, SegmentCursor};

// =============================================================================
// ScanFilter
// =============================================================================

/// Optional key filters for a merge scan
#[derive(Debug, Clone, Default)]
pub struct ScanFilter {
    prefix: Option<Vec<u8>>,
    suffix: Option<Vec<u8>>,
}

impl ScanFilter {
    /// No filtering: every live key is yielded
    pub fn all() -> Self {
        Self::default()
    }

    /// Only yield keys starting with `prefix`; enables early termination
    pub fn with_prefix(mut self, prefix: impl Into<Vec<u8>>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Only yield keys ending with `suffix`
    pub fn with_suffix(mut self, suffix: impl Into<Vec<u8>>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }
}

// =============================================================================
// Heap Entry
// =============================================================================

/// One segment cursor queued by its current user key.
///
/// `recency` is the catalog position (0 = newest); ties on the user key pop
/// the most recent segment first, which makes the first pop per key the
/// shadow winner.
struct HeapEntry {
    user_key: Vec<u8>,
    cursor: Box<dyn SegmentCursor>,
    recency: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.user_key == other.user_key && self.recency == other.recency
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    // BinaryHeap is a max-heap: reverse both components so the smallest key
    // pops first and, on equal keys, the newest segment pops first
    fn cmp(&self, other: &Self) -> Ordering {
        match self.user_key.cmp(&other.user_key) {
            Ordering::Equal => self.recency.cmp(&other.recency).reverse(),
            ord => ord.reverse(),
        }
    }
}

// =============================================================================
// MergeIter
// =============================================================================

/// Lazily evaluated merged view of the catalog's live entries.
///
/// Restartable: each `SegmentCatalog::iter` call builds a fresh pass with
/// its own cursors.
pub struct MergeIter {
    heap: BinaryHeap<HeapEntry>,
    /// Most recently resolved user key, for duplicate shadow discard
    last_key: Option<Vec<u8>>,
    prefix: Option<Vec<u8>>,
    suffix: Option<Vec<u8>>,
    done: bool,
}

impl MergeIter {
    pub(crate) fn new(catalog: &SegmentCatalog, filter: ScanFilter) -> Result<Self> {
        let mut heap = BinaryHeap::with_capacity(catalog.segment_count());

        for (recency, seg) in catalog.segments().iter().enumerate() {
            let mut cursor = match seg.handle().cursor() {
                Ok(cursor) => cursor,
                Err(e) => {
                    tracing::debug!("Merge skipping segment {}: {}", seg.path().display(), e);
                    continue;
                }
            };

            // With a prefix filter, start each cursor at the prefix instead
            // of the segment's first entry
            let positioned = match &filter.prefix {
                Some(prefix) => cursor.seek(prefix),
                None => cursor.seek_first(),
            };

            if let Err(e) = positioned {
                tracing::debug!("Merge seek failed in {}: {}", seg.path().display(), e);
                continue;
            }

            if cursor.valid() {
                heap.push(HeapEntry {
                    user_key: segment::user_key(cursor.key()).to_vec(),
                    cursor,
                    recency,
                });
            }
        }

        Ok(Self {
            heap,
            last_key: None,
            prefix: filter.prefix,
            suffix: filter.suffix,
            done: false,
        })
    }

    /// Advance a popped cursor and requeue it while it still has entries.
    /// A failed advance retires the cursor for the rest of the pass.
    fn advance(&mut self, mut entry: HeapEntry) {
        match entry.cursor.next() {
            Ok(()) => {
                if entry.cursor.valid() {
                    entry.user_key = segment::user_key(entry.cursor.key()).to_vec();
                    self.heap.push(entry);
                }
            }
            Err(e) => {
                tracing::debug!("Merge cursor advance failed: {}", e);
            }
        }
    }
}

impl Iterator for MergeIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some(entry) = self.heap.pop() {
            // Prefix exhaustion ends the whole merge: every remaining key
            // sorts after the current one
            if let Some(prefix) = &self.prefix {
                if !entry.user_key.starts_with(prefix) {
                    self.done = true;
                    self.heap.clear();
                    return None;
                }
            }

            // Older duplicate of an already-resolved key: discard without
            // re-evaluating type or suffix
            if self.last_key.as_ref() == Some(&entry.user_key) {
                self.advance(entry);
                continue;
            }

            self.last_key = Some(entry.user_key.clone());

            let record = segment::record_type(entry.cursor.key());
            let emitted = match record {
                RecordType::Deletion => None,
                RecordType::Value => {
                    let key = entry.user_key.clone();
                    let value = entry.cursor.value().to_vec();
                    match &self.suffix {
                        Some(suffix) if !key.ends_with(suffix) => None,
                        _ => Some((key, value)),
                    }
                }
            };

            self.advance(entry);

            if let Some(pair) = emitted {
                return Some(pair);
            }
        }

        self.done = true;
        None
    }
}
