//! Error types for shale
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ShaleError
pub type Result<T> = std::result::Result<T, ShaleError>;

/// Unified error type for shale operations
#[derive(Debug, Error)]
pub enum ShaleError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Catalog Errors
    // -------------------------------------------------------------------------
    #[error("Store directory not found: {0}")]
    NotFound(String),

    #[error("No usable files in store directory: {0}")]
    Empty(String),

    // -------------------------------------------------------------------------
    // Segment Errors
    // -------------------------------------------------------------------------
    #[error("Segment error: {0}")]
    Segment(String),

    // -------------------------------------------------------------------------
    // Argument Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Batch worker failed: {0}")]
    Worker(String),
}
