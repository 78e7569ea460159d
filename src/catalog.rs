//! Segment Catalog
//!
//! Owns the set of open segments for a store directory.
//!
//! ## Responsibilities
//! - Discover segment files on open, skipping ones the format rejects
//! - Keep segments ordered newest → oldest (descending path order; paths
//!   encode a monotonically increasing generation number)
//! - Refresh against the directory: open new files, reopen files whose
//!   size changed, leave vanished files in place
//! - Release every handle on close
//!
//! ## Concurrency
//! No internal locks. `open`/`refresh`/`close` must be driven by a single
//! coordinating caller; any number of readers (lookups, batch lookups,
//! scans) may run in parallel with each other between mutations.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::batch::{self, BatchResult, LookupSource};
use crate::config::Config;
use crate::error::Result;
use crate::lookup::{self, CursorCache};
use crate::merge::{MergeIter, ScanFilter};
use crate::segment::{SegmentFormat, SegmentHandle, TableFormat};
use crate::ShaleError;

// =============================================================================
// Segment
// =============================================================================

/// One open segment: path, cached on-disk size, and the format handle
pub struct Segment {
    path: PathBuf,
    file_size: u64,
    handle: Box<dyn SegmentHandle>,
}

impl Segment {
    /// Path this segment was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// On-disk size recorded when the segment was (re)opened
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub(crate) fn handle(&self) -> &dyn SegmentHandle {
        self.handle.as_ref()
    }
}

// =============================================================================
// SegmentCatalog
// =============================================================================

/// The set of open segments for one store directory, newest first
pub struct SegmentCatalog {
    /// Open segments, ordered newest → oldest
    segments: Vec<Segment>,

    /// path → position in `segments`; always consistent with the ordering
    path_index: HashMap<PathBuf, usize>,

    /// Injected segment format
    format: Arc<dyn SegmentFormat>,

    /// Scan extensions and batch tuning
    config: Config,
}

impl SegmentCatalog {
    /// Open a catalog over `dir` using the bundled table format
    pub fn open(dir: &Path, config: Config) -> Result<Self> {
        Self::open_with_format(dir, config, Arc::new(TableFormat))
    }

    /// Open a catalog over `dir` with an injected segment format
    ///
    /// Fails with `NotFound` if `dir` is missing or not a directory, and
    /// with `Empty` if no segment file could be opened. Individual files
    /// the format rejects are skipped.
    pub fn open_with_format(
        dir: &Path,
        config: Config,
        format: Arc<dyn SegmentFormat>,
    ) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ShaleError::NotFound(dir.display().to_string()));
        }

        let mut catalog = Self {
            segments: Vec::new(),
            path_index: HashMap::new(),
            format,
            config,
        };

        for (path, size) in catalog.scan_dir(dir) {
            match catalog.format.open(&path) {
                Ok(handle) => catalog.segments.push(Segment {
                    path,
                    file_size: size,
                    handle,
                }),
                Err(e) => {
                    tracing::debug!("Skipping unreadable segment {}: {}", path.display(), e);
                }
            }
        }

        if catalog.segments.is_empty() {
            return Err(ShaleError::Empty(dir.display().to_string()));
        }

        catalog.sort_newest_first();
        tracing::info!(
            "Opened catalog over {} with {} segments",
            dir.display(),
            catalog.segments.len()
        );

        Ok(catalog)
    }

    /// Rescan `dir` and reconcile the catalog against it.
    ///
    /// Unknown paths are opened and appended; known paths whose on-disk size
    /// differs are reopened and replaced in place; unchanged files are
    /// untouched. Files that vanished from disk are deliberately left in the
    /// catalog — their readers keep serving the data they were opened with.
    ///
    /// Never fails; returns whether anything changed.
    pub fn refresh(&mut self, dir: &Path) -> bool {
        if !dir.is_dir() {
            return false;
        }

        let mut changed = false;

        for (path, size) in self.scan_dir(dir) {
            match self.path_index.get(&path).copied() {
                None => {
                    // New segment file
                    match self.format.open(&path) {
                        Ok(handle) => {
                            tracing::debug!("Catalog refresh: adding {}", path.display());
                            self.path_index.insert(path.clone(), self.segments.len());
                            self.segments.push(Segment {
                                path,
                                file_size: size,
                                handle,
                            });
                            changed = true;
                        }
                        Err(e) => {
                            tracing::debug!(
                                "Catalog refresh: skipping {}: {}",
                                path.display(),
                                e
                            );
                        }
                    }
                }
                Some(idx) => {
                    // Known path: reopen in place when the size moved
                    if self.segments[idx].file_size != size {
                        match self.format.open(&path) {
                            Ok(handle) => {
                                tracing::debug!(
                                    "Catalog refresh: reopening {} ({} bytes)",
                                    path.display(),
                                    size
                                );
                                self.segments[idx] = Segment {
                                    path,
                                    file_size: size,
                                    handle,
                                };
                                changed = true;
                            }
                            Err(e) => {
                                tracing::debug!(
                                    "Catalog refresh: failed to reopen {}: {}",
                                    path.display(),
                                    e
                                );
                            }
                        }
                    }
                }
            }
        }

        if changed {
            self.sort_newest_first();
        }
        changed
    }

    /// Release every segment handle
    pub fn close(self) {
        // Handles drop here; explicit method to mark the lifecycle boundary
    }

    // =========================================================================
    // Read Surface
    // =========================================================================

    /// Point lookup across all segments, newest first.
    ///
    /// `cache` keeps one open cursor per segment across repeated calls; use
    /// one cache per long-lived caller.
    pub fn get(&self, cache: &mut CursorCache, key: &[u8]) -> Result<Option<Vec<u8>>> {
        lookup::lookup(self, cache, key)
    }

    /// Order-preserving batch lookup; parallel above the configured threshold
    pub fn batch_get(&self, keys: &[&[u8]]) -> Result<BatchResult> {
        batch::batch_lookup(self, keys, &self.config)
    }

    /// Merged ascending scan of live entries, with optional filters
    pub fn scan<F>(&self, filter: ScanFilter, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]),
    {
        for (key, value) in self.iter(filter)? {
            callback(&key, &value);
        }
        Ok(())
    }

    /// Lazily evaluated merge iterator; each call starts a fresh pass
    pub fn iter(&self, filter: ScanFilter) -> Result<MergeIter> {
        MergeIter::new(self, filter)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Number of open segments
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Open segments, newest first
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The catalog's configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// List (path, size) for every segment file currently in `dir`
    fn scan_dir(&self, dir: &Path) -> Vec<(PathBuf, u64)> {
        let mut found = Vec::new();

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(_) => return found,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let matches_ext = path
                .extension()
                .map(|ext| ext == self.config.segment_extension.as_str())
                .unwrap_or(false);
            if !matches_ext {
                continue;
            }
            if let Ok(meta) = entry.metadata() {
                found.push((path, meta.len()));
            }
        }

        found
    }

    /// Sort descending by path (generation numbers make newest sort first)
    /// and rebuild the path → index map
    fn sort_newest_first(&mut self) {
        self.segments
            .sort_by(|a, b| b.path.as_os_str().cmp(a.path.as_os_str()));

        self.path_index.clear();
        self.path_index.reserve(self.segments.len());
        for (i, segment) in self.segments.iter().enumerate() {
            self.path_index.insert(segment.path.clone(), i);
        }
    }
}

impl LookupSource for SegmentCatalog {
    type Cursors = CursorCache;

    fn cursors(&self) -> CursorCache {
        CursorCache::new()
    }

    fn get_with(&self, cursors: &mut CursorCache, key: &[u8]) -> Option<Vec<u8>> {
        self.get(cursors, key).unwrap_or(None)
    }
}
