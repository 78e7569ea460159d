//! Batch Lookup Scheduler
//!
//! Parallel fan-out of many point lookups with order-preserving assembly.
//!
//! ## Scheduling
//! Batches below the configured threshold run sequentially on the calling
//! thread. Larger batches are split into contiguous index blocks, one per
//! worker, over a pool sized to hardware parallelism (minimum 2). Workers
//! share only the read-only source; each owns a private cursor cache, so no
//! locking is needed anywhere.
//!
//! ## Output
//! One contiguous buffer holds the bytes of every found value (minimum one
//! byte so the allocation is always live), with a parallel (offset, length)
//! span array and a found-flag array. Unfound entries get span (0, 0).

use bytes::{Bytes, BytesMut};

use crate::config::Config;
use crate::error::Result;
use crate::ShaleError;

// =============================================================================
// LookupSource
// =============================================================================

/// A read-only lookup path the scheduler can fan out over.
///
/// Implemented by `SegmentCatalog` (cursor-cache lookups) and `LogSession`
/// (heuristic log scans). `Cursors` is whatever per-worker state the path
/// needs; it is created once per worker and never shared.
pub trait LookupSource: Sync {
    type Cursors: Send;

    /// Fresh per-worker lookup state
    fn cursors(&self) -> Self::Cursors;

    /// Point lookup; misses and per-segment failures both come back as None
    fn get_with(&self, cursors: &mut Self::Cursors, key: &[u8]) -> Option<Vec<u8>>;
}

// =============================================================================
// BatchResult
// =============================================================================

/// Order-preserving result of a batch lookup
pub struct BatchResult {
    /// Found values back to back; sliced zero-copy via `value`
    buffer: Bytes,
    /// (offset, length) into `buffer` per input key; (0, 0) when unfound
    spans: Vec<(usize, usize)>,
    /// Whether each input key matched
    found: Vec<bool>,
}

impl BatchResult {
    /// Number of input keys
    pub fn len(&self) -> usize {
        self.found.len()
    }

    pub fn is_empty(&self) -> bool {
        self.found.is_empty()
    }

    /// Whether key `i` matched
    pub fn is_found(&self, i: usize) -> bool {
        self.found.get(i).copied().unwrap_or(false)
    }

    /// Value for key `i`, sliced out of the shared buffer without copying
    pub fn value(&self, i: usize) -> Option<Bytes> {
        if !self.is_found(i) {
            return None;
        }
        let (offset, len) = self.spans[i];
        Some(self.buffer.slice(offset..offset + len))
    }

    /// All values in input order
    pub fn values(&self) -> Vec<Option<Bytes>> {
        (0..self.len()).map(|i| self.value(i)).collect()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Execute `keys` against `source`, preserving input order in the result
pub(crate) fn batch_lookup<S: LookupSource>(
    source: &S,
    keys: &[&[u8]],
    config: &Config,
) -> Result<BatchResult> {
    let mut results: Vec<Option<Vec<u8>>> = vec![None; keys.len()];

    if keys.is_empty() {
        return Ok(assemble(&results));
    }

    if keys.len() < config.batch_sequential_threshold {
        let mut cursors = source.cursors();
        for (slot, key) in results.iter_mut().zip(keys) {
            *slot = source.get_with(&mut cursors, key);
        }
    } else {
        let workers = config.batch_workers().min(keys.len());
        let block = (keys.len() + workers - 1) / workers;
        tracing::debug!(
            "Batch of {} keys across {} workers ({} per block)",
            keys.len(),
            workers,
            block
        );

        crossbeam::thread::scope(|scope| {
            for (result_block, key_block) in results.chunks_mut(block).zip(keys.chunks(block)) {
                scope.spawn(move |_| {
                    let mut cursors = source.cursors();
                    for (slot, key) in result_block.iter_mut().zip(key_block) {
                        *slot = source.get_with(&mut cursors, key);
                    }
                });
            }
        })
        .map_err(|_| ShaleError::Worker("batch lookup worker panicked".to_string()))?;
    }

    Ok(assemble(&results))
}

/// Pack per-key results into the contiguous output layout
fn assemble(results: &[Option<Vec<u8>>]) -> BatchResult {
    let total: usize = results.iter().flatten().map(|v| v.len()).sum();

    // Sized exactly to the matched bytes; one byte minimum keeps the
    // allocation valid when nothing matched
    let mut buffer = BytesMut::with_capacity(total.max(1));
    let mut spans = Vec::with_capacity(results.len());
    let mut found = Vec::with_capacity(results.len());

    for result in results {
        match result {
            Some(value) => {
                spans.push((buffer.len(), value.len()));
                buffer.extend_from_slice(value);
                found.push(true);
            }
            None => {
                spans.push((0, 0));
                found.push(false);
            }
        }
    }

    BatchResult {
        buffer: buffer.freeze(),
        spans,
        found,
    }
}
