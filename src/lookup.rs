//! Point Lookup Engine
//!
//! Exact-key lookup across the catalog, newest segment first.
//!
//! Each segment is probed with a seek-to-or-after cursor; the first segment
//! whose positioned entry has a user key exactly equal to the target wins.
//! The winning entry's value is returned as stored, without inspecting the
//! record type — a match on a deletion marker returns the tombstone's
//! payload. Only the merge path filters tombstones.

use crate::catalog::SegmentCatalog;
use crate::error::Result;
use crate::segment::{self, SegmentCursor};

// =============================================================================
// CursorCache
// =============================================================================

/// Per-caller cache of open segment cursors.
///
/// Holds one cursor slot per segment so repeated lookups reuse positions
/// instead of re-opening a cursor per call. Slot `i` corresponds to catalog
/// position `i`; the cache resets itself whenever the segment count changes.
/// One cache per execution context — never shared across threads.
#[derive(Default)]
pub struct CursorCache {
    cursors: Vec<Option<Box<dyn SegmentCursor>>>,
}

impl CursorCache {
    /// Create an empty cache; it sizes itself on first use
    pub fn new() -> Self {
        Self {
            cursors: Vec::new(),
        }
    }

    /// Match the cache to the catalog's segment count, dropping every
    /// cached cursor when the count moved
    fn ensure(&mut self, segment_count: usize) {
        if self.cursors.len() != segment_count {
            self.cursors.clear();
            self.cursors.resize_with(segment_count, || None);
        }
    }

    fn slot(&mut self, i: usize) -> &mut Option<Box<dyn SegmentCursor>> {
        &mut self.cursors[i]
    }
}

// =============================================================================
// Lookup
// =============================================================================

/// Exact-key lookup, newest segment first.
///
/// Returns `Ok(None)` when no segment holds the key. Segments whose cursor
/// cannot be created or positioned are skipped, matching the catalog's
/// skip-on-failure policy.
pub(crate) fn lookup(
    catalog: &SegmentCatalog,
    cache: &mut CursorCache,
    key: &[u8],
) -> Result<Option<Vec<u8>>> {
    cache.ensure(catalog.segment_count());

    for (i, seg) in catalog.segments().iter().enumerate() {
        let slot = cache.slot(i);

        if slot.is_none() {
            match seg.handle().cursor() {
                Ok(cursor) => *slot = Some(cursor),
                Err(e) => {
                    tracing::debug!("Skipping segment {}: {}", seg.path().display(), e);
                    continue;
                }
            }
        }

        let Some(cursor) = slot.as_mut() else {
            continue;
        };

        if let Err(e) = cursor.seek(key) {
            tracing::debug!("Seek failed in {}: {}", seg.path().display(), e);
            *slot = None;
            continue;
        }

        if !cursor.valid() {
            continue;
        }

        if segment::user_key(cursor.key()) == key {
            return Ok(Some(cursor.value().to_vec()));
        }
    }

    Ok(None)
}
