//! Segment Module
//!
//! A segment is an immutable, sorted, on-disk table of internal-key/value
//! entries produced by an earlier flush or compaction step. The catalog does
//! not care how a segment is laid out on disk — it talks to segments through
//! the traits below, so the binary format is a pluggable implementation
//! detail. `segment::table` is the bundled default format.
//!
//! ## Internal Keys
//! ```text
//! ┌───────────────────────────┬──────────────────────────────┐
//! │ user key (variable)       │ trailer: u64 LE (8 bytes)    │
//! │                           │   (sequence << 8) | type     │
//! └───────────────────────────┴──────────────────────────────┘
//! ```
//! Record type 0 is a deletion marker (tombstone), anything else a value.
//! Raw keys of 8 bytes or fewer carry no trailer; the whole raw key is the
//! user key.

mod table;

use std::path::Path;

use crate::error::Result;

pub use table::{TableFormat, TableReader, TableWriter};

// =============================================================================
// Internal Key Layout
// =============================================================================

/// Size of the internal-key trailer in bytes
pub const TRAILER_SIZE: usize = 8;

/// Record type stored in the low byte of an internal-key trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// Tombstone: the user key was deleted at this sequence number
    Deletion,
    /// Live value
    Value,
}

/// Extract the user-key portion of a raw internal key.
///
/// Raw keys of `TRAILER_SIZE` bytes or fewer have no trailer and are
/// returned whole.
pub fn user_key(raw: &[u8]) -> &[u8] {
    if raw.len() > TRAILER_SIZE {
        &raw[..raw.len() - TRAILER_SIZE]
    } else {
        raw
    }
}

/// Decode the record type from a raw internal key.
///
/// Keys without a trailer are treated as live values.
pub fn record_type(raw: &[u8]) -> RecordType {
    match trailer(raw) {
        Some(t) if t & 0xff == 0 => RecordType::Deletion,
        _ => RecordType::Value,
    }
}

/// Decode the write sequence number from a raw internal key (0 if absent)
pub fn sequence(raw: &[u8]) -> u64 {
    trailer(raw).map(|t| t >> 8).unwrap_or(0)
}

/// Build a raw internal key from its parts
pub fn encode_internal_key(user: &[u8], seq: u64, record: RecordType) -> Vec<u8> {
    let type_byte = match record {
        RecordType::Deletion => 0u64,
        RecordType::Value => 1u64,
    };
    let trailer = (seq << 8) | type_byte;
    let mut raw = Vec::with_capacity(user.len() + TRAILER_SIZE);
    raw.extend_from_slice(user);
    raw.extend_from_slice(&trailer.to_le_bytes());
    raw
}

fn trailer(raw: &[u8]) -> Option<u64> {
    if raw.len() > TRAILER_SIZE {
        let tail = &raw[raw.len() - TRAILER_SIZE..];
        Some(u64::from_le_bytes(tail.try_into().unwrap()))
    } else {
        None
    }
}

// =============================================================================
// Format Traits
// =============================================================================

/// A forward cursor over one segment's sorted entries.
///
/// Positions are always on a whole entry; `key`/`value` may only be called
/// while `valid` returns true.
pub trait SegmentCursor: Send {
    /// Position at the first entry whose user key is >= `target`
    fn seek(&mut self, target: &[u8]) -> Result<()>;

    /// Position at the first entry in the segment
    fn seek_first(&mut self) -> Result<()>;

    /// Advance to the next entry
    fn next(&mut self) -> Result<()>;

    /// Whether the cursor is positioned on an entry
    fn valid(&self) -> bool;

    /// Raw internal key of the current entry
    fn key(&self) -> &[u8];

    /// Value bytes of the current entry
    fn value(&self) -> &[u8];
}

/// An open segment. Hands out independent cursors; shared read-only.
pub trait SegmentHandle: Send + Sync {
    /// Create a fresh cursor over this segment
    fn cursor(&self) -> Result<Box<dyn SegmentCursor>>;
}

/// Opens segment files. Injected into the catalog so the on-disk format
/// stays swappable.
pub trait SegmentFormat: Send + Sync {
    /// Open one segment file; rejecting a file makes the catalog skip it
    fn open(&self, path: &Path) -> Result<Box<dyn SegmentHandle>>;
}
