//! Log Catalog
//!
//! Owns read-only memory-mapped views of the store's append logs — writes
//! that have not yet been flushed into a segment.
//!
//! A mapping is a snapshot: the file growing on disk after the map was
//! taken is invisible until `refresh` remaps it. Logs are scanned
//! independently, so the catalog keeps no ordering guarantee.

mod scanner;

use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::batch::{self, BatchResult, LookupSource};
use crate::config::Config;
use crate::error::Result;
use crate::ShaleError;

// =============================================================================
// MappedLog
// =============================================================================

/// One append log: path, open file handle, and its current read-only map.
///
/// All teardown goes through `close`, on every exit path — explicit close,
/// replacement during refresh, and remap failure.
struct MappedLog {
    path: PathBuf,
    file: Option<File>,
    map: Option<Mmap>,
    mapped_len: u64,
}

impl MappedLog {
    /// Open the backing file without mapping it yet
    fn open(path: PathBuf) -> Result<Self> {
        let file = File::open(&path)?;
        Ok(Self {
            path,
            file: Some(file),
            map: None,
            mapped_len: 0,
        })
    }

    /// Bring the mapping in line with the on-disk size.
    ///
    /// Returns false when the log is unusable: the handle is gone, the file
    /// shrank to zero, its size cannot be read, or mapping failed. A false
    /// return from a size/stat failure closes the log; a mapping failure
    /// leaves the handle for the caller to close.
    fn remap_if_needed(&mut self) -> bool {
        let Some(file) = &self.file else {
            return false;
        };

        let size = match file.metadata() {
            Ok(meta) => meta.len(),
            Err(_) => {
                self.close();
                return false;
            }
        };

        if size == 0 {
            self.close();
            return false;
        }

        if size == self.mapped_len && self.map.is_some() {
            return true;
        }

        // Full unmap before remapping
        self.map = None;

        // SAFETY: the map is read-only and the file was opened read-only.
        // Appenders growing the file do not invalidate the mapped prefix.
        match unsafe { Mmap::map(file) } {
            Ok(map) => {
                self.mapped_len = map.len() as u64;
                self.map = Some(map);
                true
            }
            Err(e) => {
                tracing::debug!("Failed to map {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// Single teardown routine: drop the map, then the handle
    fn close(&mut self) {
        self.map = None;
        self.file = None;
        self.mapped_len = 0;
    }

    /// Mapped bytes, if the log is currently usable
    fn data(&self) -> Option<&[u8]> {
        match &self.map {
            Some(map) if !map.is_empty() => Some(&map[..]),
            _ => None,
        }
    }
}

// =============================================================================
// LogSession
// =============================================================================

/// Memory-mapped views of a directory's append logs
pub struct LogSession {
    logs: Vec<MappedLog>,
    config: Config,
}

impl LogSession {
    /// Open a session over every log file in `dir`.
    ///
    /// Fails with `NotFound` if `dir` is missing or not a directory, and
    /// with `Empty` if zero logs end up mapped. Files that cannot be opened
    /// or mapped are skipped, not fatal.
    pub fn open(dir: &Path, config: Config) -> Result<Self> {
        if !dir.is_dir() {
            return Err(ShaleError::NotFound(dir.display().to_string()));
        }

        let mut session = Self {
            logs: Vec::new(),
            config,
        };

        for path in session.scan_dir(dir) {
            match MappedLog::open(path) {
                Ok(mut log) => {
                    if log.remap_if_needed() {
                        session.logs.push(log);
                    } else {
                        log.close();
                    }
                }
                Err(e) => {
                    tracing::debug!("Skipping unreadable log: {}", e);
                }
            }
        }

        if session.logs.is_empty() {
            return Err(ShaleError::Empty(dir.display().to_string()));
        }

        tracing::info!("Opened log session with {} mapped logs", session.logs.len());
        Ok(session)
    }

    /// Reconcile the session against the directory.
    ///
    /// Entries whose file vanished, shrank to zero, or failed to remap are
    /// closed and dropped; kept entries are remapped when their size moved;
    /// newly discovered files are mapped and appended (skipped on failure).
    ///
    /// Never fails; returns whether the set of logs changed.
    pub fn refresh(&mut self, dir: &Path) -> bool {
        if !dir.is_dir() {
            return false;
        }

        let disk: HashSet<PathBuf> = self.scan_dir(dir).into_iter().collect();
        let mut changed = false;

        self.logs.retain_mut(|log| {
            if !disk.contains(&log.path) {
                tracing::debug!("Log refresh: dropping vanished {}", log.path.display());
                log.close();
                changed = true;
                return false;
            }
            if !log.remap_if_needed() {
                tracing::debug!("Log refresh: dropping unmappable {}", log.path.display());
                log.close();
                changed = true;
                return false;
            }
            true
        });

        for path in disk {
            if self.logs.iter().any(|log| log.path == path) {
                continue;
            }
            let Ok(mut log) = MappedLog::open(path) else {
                continue;
            };
            if log.remap_if_needed() {
                tracing::debug!("Log refresh: adding {}", log.path.display());
                self.logs.push(log);
                changed = true;
            } else {
                log.close();
            }
        }

        changed
    }

    /// Unmap and release every log
    pub fn close(mut self) {
        for log in &mut self.logs {
            log.close();
        }
    }

    // =========================================================================
    // Read Surface
    // =========================================================================

    /// Heuristic lookup across all mapped logs.
    ///
    /// Returns the first structurally valid match scanning each log forward
    /// from its start — the chronologically earliest write for the key, not
    /// necessarily the most recent.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if key.is_empty() {
            return Err(ShaleError::InvalidArgument(
                "log lookup requires a non-empty key".to_string(),
            ));
        }

        for log in &self.logs {
            if let Some(data) = log.data() {
                if let Some(value) = scanner::find_value(data, key) {
                    return Ok(Some(value));
                }
            }
        }

        Ok(None)
    }

    /// Order-preserving batch lookup over the log scan path
    pub fn batch_get(&self, keys: &[&[u8]]) -> Result<BatchResult> {
        batch::batch_lookup(self, keys, &self.config)
    }

    /// Number of currently mapped logs
    pub fn log_count(&self) -> usize {
        self.logs.len()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// List every log file currently in `dir`
    fn scan_dir(&self, dir: &Path) -> Vec<PathBuf> {
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
                .map(|ext| ext == self.config.log_extension.as_str())
                .unwrap_or(false);
            if matches_ext {
                found.push(path);
            }
        }

        found
    }
}

impl LookupSource for LogSession {
    type Cursors = ();

    fn cursors(&self) {}

    fn get_with(&self, _cursors: &mut (), key: &[u8]) -> Option<Vec<u8>> {
        self.get(key).unwrap_or(None)
    }
}
