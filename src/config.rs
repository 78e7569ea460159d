//! Configuration for shale
//!
//! Centralized configuration with sensible defaults.

/// Main configuration for a shale store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Directory Scan Configuration
    // -------------------------------------------------------------------------
    /// File extension identifying segment files in a store directory
    pub segment_extension: String,

    /// File extension identifying append-log files in a store directory
    pub log_extension: String,

    // -------------------------------------------------------------------------
    // Batch Lookup Configuration
    // -------------------------------------------------------------------------
    /// Batches smaller than this run sequentially on the calling thread
    pub batch_sequential_threshold: usize,

    /// Cap on batch worker threads; `None` uses hardware parallelism
    pub max_batch_workers: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment_extension: "seg".to_string(),
            log_extension: "log".to_string(),
            batch_sequential_threshold: 32,
            max_batch_workers: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Number of worker threads a batch lookup may use.
    ///
    /// Derived from hardware parallelism, clamped to `max_batch_workers`
    /// when set, and never below 2.
    pub fn batch_workers(&self) -> usize {
        let hardware = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        let cap = self.max_batch_workers.unwrap_or(hardware);
        hardware.min(cap).max(2)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the segment file extension (without the dot)
    pub fn segment_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.segment_extension = ext.into();
        self
    }

    /// Set the append-log file extension (without the dot)
    pub fn log_extension(mut self, ext: impl Into<String>) -> Self {
        self.config.log_extension = ext.into();
        self
    }

    /// Set the batch size below which lookups run sequentially
    pub fn batch_sequential_threshold(mut self, count: usize) -> Self {
        self.config.batch_sequential_threshold = count;
        self
    }

    /// Cap the number of batch worker threads
    pub fn max_batch_workers(mut self, count: usize) -> Self {
        self.config.max_batch_workers = Some(count);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
