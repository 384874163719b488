//! Diffing, rating writes and the run orchestration around them.
//!
//! # Module Structure
//!
//! - [`types`] - Core types: `SyncOptions`, `SyncCandidate`, `SyncRunReport`, constants
//! - [`progress`] - Progress reporting: `SyncProgress`, `ProgressCallback`, `emit()`
//! - [`diff`] - Candidate selection and write order
//! - [`executor`] - The write loop: `SyncExecutor`
//! - [`engine`] - Fetch, reconcile and sync operations over a data directory: `Engine`
//!
//! # Example
//!
//! ```ignore
//! use cinesync::sync::{Engine, SyncDirection, SyncProgress};
//!
//! let progress: ProgressCallback = Box::new(|event| {
//!     if let SyncProgress::RatingWritten { title, rating, .. } = event {
//!         println!("{title}: {rating}");
//!     }
//! });
//! let report = engine
//!     .sync(SyncDirection::DoubanToImdb, false, None, Some(&progress))
//!     .await?;
//! println!("Wrote {} ratings", report.success_count);
//! ```

pub mod diff;
pub mod engine;
mod error;
pub mod executor;
mod progress;
mod types;

// Re-export types
pub use types::{
    CandidateState, ItemOutcome, NewItemsSummary, StopSignal, SyncCandidate, SyncOptions,
    SyncRunReport,
};

// Re-export constants
pub use types::{
    DEFAULT_MAX_WRITE_DELAY_MS, DEFAULT_MIN_WRITE_DELAY_MS, DEFAULT_PAGE_SIZE,
    DEFAULT_RESOLVE_CONCURRENCY, INITIAL_BACKOFF_MS, MAX_ATTEMPTS, MAX_BACKOFF_MS,
};

// Re-export progress types
pub use progress::{ProgressCallback, SyncProgress, emit};

pub use crate::entity::platform::SyncDirection;
pub use engine::{Engine, EngineOptions};
pub use error::{EngineError, Result};
pub use executor::SyncExecutor;
