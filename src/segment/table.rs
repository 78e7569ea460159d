//! Default Segment Format
//!
//! Bundled on-disk segment format with an in-memory index for
//! seek-to-or-after positioning.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ Header (14 bytes)                                       │
//! │   Magic: "SHLT" (4) | Version: u16 (2) | Count: u64 (8) │
//! ├─────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                   │
//! │   [KeyLen: u32][ValLen: u32][InternalKey][Value]        │
//! │   ... repeated, ascending by user key ...               │
//! ├─────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                  │
//! │   [KeyLen: u32][Offset: u64][UserKey]                   │
//! │   ... repeated for each entry ...                       │
//! ├─────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                       │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4) │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Data-block keys are internal keys (user key + trailer); the index block
//! holds bare user keys so a cursor can seek on the user-visible ordering.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::ops::Bound;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::ShaleError;

use super::{encode_internal_key, RecordType, SegmentCursor, SegmentFormat, SegmentHandle};

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a shale table file
pub(crate) const MAGIC: &[u8; 4] = b"SHLT";

/// Current table format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + EntryCount (8) = 14 bytes
pub(crate) const HEADER_SIZE: u64 = 14;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

// =============================================================================
// Format Entry Point
// =============================================================================

/// The bundled segment format. Inject into `SegmentCatalog::open_with_format`
/// or rely on it as the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableFormat;

impl SegmentFormat for TableFormat {
    fn open(&self, path: &Path) -> Result<Box<dyn SegmentHandle>> {
        Ok(Box::new(TableReader::open(path)?))
    }
}

// =============================================================================
// Reader
// =============================================================================

/// Open table file handing out independent cursors.
///
/// The file handle is held open for the reader's lifetime, so a segment
/// whose backing file is deleted from the directory keeps serving reads.
pub struct TableReader {
    /// Open file; cursors clone this handle for independent positions
    file: File,
    /// In-memory index: user key → data-block offset
    index: Arc<BTreeMap<Vec<u8>, u64>>,
    /// Number of entries in the data block
    entry_count: u64,
    /// Where the data block ends and the index block begins
    index_offset: u64,
    /// CRC32 of the data block recorded at build time
    data_crc: u32,
}

impl TableReader {
    /// Open a table for reading, loading the index into memory
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(ShaleError::Segment(format!(
                "Table file too small: {} bytes",
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(ShaleError::Segment(format!(
                "Invalid table magic: expected SHLT, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes(header[4..6].try_into().unwrap());
        if version != VERSION {
            return Err(ShaleError::Segment(format!(
                "Unsupported table version: {}",
                version
            )));
        }

        let entry_count = u64::from_le_bytes(header[6..14].try_into().unwrap());

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = u64::from_le_bytes(footer[0..8].try_into().unwrap());
        let data_crc = u32::from_le_bytes(footer[8..12].try_into().unwrap());

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(ShaleError::Segment(format!(
                "Index offset {} outside file bounds",
                index_offset
            )));
        }

        // Load index into memory
        let mut index = BTreeMap::new();
        file.seek(SeekFrom::Start(index_offset))?;

        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // Parse index entries: [key_len(4)][offset(8)][user_key]
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                break;
            }
            let key_len =
                u32::from_le_bytes(index_data[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;

            let offset = u64::from_le_bytes(index_data[pos..pos + 8].try_into().unwrap());
            pos += 8;

            if pos + key_len > index_data.len() {
                break;
            }
            let key = index_data[pos..pos + key_len].to_vec();
            pos += key_len;

            index.insert(key, offset);
        }

        Ok(Self {
            file,
            index: Arc::new(index),
            entry_count,
            index_offset,
            data_crc,
        })
    }

    /// Number of entries in this table
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Re-read the data block and compare against the recorded CRC
    pub fn verify_checksum(&self) -> Result<bool> {
        let mut file = BufReader::new(self.file.try_clone()?);
        file.seek(SeekFrom::Start(HEADER_SIZE))?;

        let mut remaining = self.index_offset - HEADER_SIZE;
        let mut hasher = crc32fast::Hasher::new();
        let mut chunk = [0u8; 8192];
        while remaining > 0 {
            let want = remaining.min(chunk.len() as u64) as usize;
            file.read_exact(&mut chunk[..want])?;
            hasher.update(&chunk[..want]);
            remaining -= want as u64;
        }

        Ok(hasher.finalize() == self.data_crc)
    }
}

impl SegmentHandle for TableReader {
    fn cursor(&self) -> Result<Box<dyn SegmentCursor>> {
        // Clone the fd so each cursor owns an independent file position
        let file = self.file.try_clone()?;
        Ok(Box::new(TableCursor {
            file: BufReader::new(file),
            index: Arc::clone(&self.index),
            index_offset: self.index_offset,
            current: None,
            next_offset: HEADER_SIZE,
        }))
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Forward cursor over one table's data block
struct TableCursor {
    file: BufReader<File>,
    /// Shared index for seek positioning
    index: Arc<BTreeMap<Vec<u8>, u64>>,
    /// End of the data block
    index_offset: u64,
    /// Buffered current entry: (raw internal key, value)
    current: Option<(Vec<u8>, Vec<u8>)>,
    /// Offset of the entry following the current one
    next_offset: u64,
}

impl TableCursor {
    /// Read the entry at `offset` into the buffer; past-the-data offsets
    /// invalidate the cursor
    fn read_entry_at(&mut self, offset: u64) -> Result<()> {
        if offset >= self.index_offset {
            self.current = None;
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = u32::from_le_bytes(header[0..4].try_into().unwrap()) as usize;
        let val_len = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;

        let mut raw_key = vec![0u8; key_len];
        self.file.read_exact(&mut raw_key)?;

        let mut value = vec![0u8; val_len];
        self.file.read_exact(&mut value)?;

        self.next_offset = offset + 8 + key_len as u64 + val_len as u64;
        self.current = Some((raw_key, value));

        Ok(())
    }
}

impl SegmentCursor for TableCursor {
    fn seek(&mut self, target: &[u8]) -> Result<()> {
        let offset = self
            .index
            .range::<[u8], _>((Bound::Included(target), Bound::Unbounded))
            .next()
            .map(|(_, &off)| off);

        match offset {
            Some(off) => self.read_entry_at(off),
            None => {
                self.current = None;
                Ok(())
            }
        }
    }

    fn seek_first(&mut self) -> Result<()> {
        self.read_entry_at(HEADER_SIZE)
    }

    fn next(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Ok(());
        }
        let offset = self.next_offset;
        self.read_entry_at(offset)
    }

    fn valid(&self) -> bool {
        self.current.is_some()
    }

    fn key(&self) -> &[u8] {
        self.current.as_ref().map(|(k, _)| k.as_slice()).unwrap_or(&[])
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map(|(_, v)| v.as_slice()).unwrap_or(&[])
    }
}

// =============================================================================
// Writer (fixtures and tooling only — the engine never writes)
// =============================================================================

/// Writes sorted entries to a new table file.
///
/// Entries must be added in strictly ascending user-key order.
pub struct TableWriter {
    /// Buffered writer for performance
    writer: BufWriter<File>,
    /// Number of entries written
    entry_count: u64,
    /// Current write position (for index)
    current_offset: u64,
    /// Index: user key → file offset of entry
    index: Vec<(Vec<u8>, u64)>,
    /// Ordering enforcement
    last_user_key: Option<Vec<u8>>,
    /// Running CRC hasher for the data block
    data_hasher: crc32fast::Hasher,
}

impl TableWriter {
    /// Create a new table writer, writing the header immediately
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut writer = BufWriter::new(file);

        // Header with an entry-count placeholder, patched in finish()
        writer.write_all(MAGIC)?;
        writer.write_all(&VERSION.to_le_bytes())?;
        writer.write_all(&0u64.to_le_bytes())?;

        Ok(Self {
            writer,
            entry_count: 0,
            current_offset: HEADER_SIZE,
            index: Vec::new(),
            last_user_key: None,
            data_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Add a live value entry
    pub fn add(&mut self, user_key: &[u8], sequence: u64, value: &[u8]) -> Result<()> {
        self.write_entry(user_key, sequence, RecordType::Value, value)
    }

    /// Add a deletion marker. `payload` is the bytes stored alongside the
    /// tombstone (usually empty).
    pub fn add_tombstone(&mut self, user_key: &[u8], sequence: u64, payload: &[u8]) -> Result<()> {
        self.write_entry(user_key, sequence, RecordType::Deletion, payload)
    }

    fn write_entry(
        &mut self,
        user_key: &[u8],
        sequence: u64,
        record: RecordType,
        value: &[u8],
    ) -> Result<()> {
        if let Some(last) = &self.last_user_key {
            if user_key <= last.as_slice() {
                return Err(ShaleError::InvalidArgument(format!(
                    "Keys must be added in strictly ascending order: {:?} after {:?}",
                    user_key, last
                )));
            }
        }
        self.last_user_key = Some(user_key.to_vec());

        let raw_key = encode_internal_key(user_key, sequence, record);

        // Record offset for index
        self.index.push((user_key.to_vec(), self.current_offset));

        // Entry bytes: [key_len(4)][val_len(4)][internal_key][value]
        let key_len_bytes = (raw_key.len() as u32).to_le_bytes();
        let val_len_bytes = (value.len() as u32).to_le_bytes();

        self.writer.write_all(&key_len_bytes)?;
        self.writer.write_all(&val_len_bytes)?;
        self.writer.write_all(&raw_key)?;
        self.writer.write_all(value)?;

        self.data_hasher.update(&key_len_bytes);
        self.data_hasher.update(&val_len_bytes);
        self.data_hasher.update(&raw_key);
        self.data_hasher.update(value);

        self.current_offset += 8 + raw_key.len() as u64 + value.len() as u64;
        self.entry_count += 1;

        Ok(())
    }

    /// Finish building: write index block and footer, patch the header
    pub fn finish(mut self) -> Result<()> {
        let index_offset = self.current_offset;

        // Index block: [key_len(4)][offset(8)][user_key] per entry
        for (key, offset) in &self.index {
            self.writer.write_all(&(key.len() as u32).to_le_bytes())?;
            self.writer.write_all(&offset.to_le_bytes())?;
            self.writer.write_all(key)?;
        }

        let data_crc = self.data_hasher.finalize();

        // Footer: index_offset (8) + data_crc (4) + padding (4)
        self.writer.write_all(&index_offset.to_le_bytes())?;
        self.writer.write_all(&data_crc.to_le_bytes())?;
        self.writer.write_all(&[0u8; 4])?;

        self.writer.flush()?;

        // Seek back and patch the entry count
        let mut file = self
            .writer
            .into_inner()
            .map_err(|e| ShaleError::Segment(format!("Failed to flush table: {}", e)))?;
        file.seek(SeekFrom::Start(6))?;
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;

        Ok(())
    }
}
