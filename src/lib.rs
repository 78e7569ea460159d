//! # shale
//!
//! A read-only access layer over an LSM-style persisted key-value store:
//! immutable sorted segment files produced by compaction, plus append-only
//! logs holding writes not yet flushed into a segment.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌───────────────────────────┐   ┌──────────────────────────┐
//! │      SegmentCatalog        │   │       LogSession         │
//! │  (segments, newest first)  │   │  (memory-mapped logs)    │
//! └──────┬──────────┬──────────┘   └───────────┬──────────────┘
//!        │          │                          │
//!        ▼          ▼                          ▼
//! ┌────────────┐ ┌────────────┐   ┌──────────────────────────┐
//! │   Point    │ │   Merge    │   │   Heuristic Log Scanner  │
//! │   Lookup   │ │  Iterator  │   │  (varint frame matching) │
//! └──────┬─────┘ └────────────┘   └───────────┬──────────────┘
//!        │                                    │
//!        └────────────────┬───────────────────┘
//!                         ▼
//!              ┌────────────────────┐
//!              │  Batch Scheduler   │
//!              │  (worker fan-out)  │
//!              └────────────────────┘
//! ```
//!
//! The catalog and session are mutated (open/refresh/close) by a single
//! coordinating caller; readers run freely in parallel between mutations.
//! This crate never writes store files — segment creation, compaction, and
//! log rotation belong to the producing engine.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod segment;
pub mod catalog;
pub mod lookup;
pub mod merge;
pub mod batch;
pub mod log;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Result, ShaleError};
pub use config::Config;
pub use catalog::SegmentCatalog;
pub use lookup::CursorCache;
pub use merge::{MergeIter, ScanFilter};
pub use batch::BatchResult;
pub use log::LogSession;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of shale
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
