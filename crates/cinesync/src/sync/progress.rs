//! Progress reporting types for fetch and sync runs.
//!
//! The core never depends on a listener: every event goes through [`emit`],
//! which is a no-op without a callback.

use crate::entity::platform::{Platform, SyncDirection};

/// Progress events emitted during fetch, reconcile and sync runs.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// Checking that a platform accepts the stored credentials.
    ValidatingCredentials { platform: Platform },

    /// Credential check finished.
    CredentialsChecked { platform: Platform, valid: bool },

    /// Starting an incremental fetch.
    FetchingPages {
        platform: Platform,
        /// Number of ids already stored locally.
        known: usize,
    },

    /// Fetched one listing page.
    FetchedPage {
        platform: Platform,
        /// Page number (1-indexed).
        page: u32,
        /// Items on this page.
        count: usize,
        /// New items collected so far.
        new_so_far: usize,
        /// Total rated items reported by the platform.
        total: Option<usize>,
    },

    /// Hit an already stored id; no further pages are requested.
    ReachedKnownItem {
        platform: Platform,
        page: u32,
        id: String,
    },

    /// Listing finished.
    FetchComplete { platform: Platform, new_items: usize },

    /// Starting cross-id resolution for the new items.
    ResolvingIds {
        platform: Platform,
        /// Items needing a network lookup.
        misses: usize,
        /// Items answered by the identity cache.
        cached: usize,
        concurrency: usize,
    },

    /// Resolved (or failed to resolve) one cross id.
    ResolvedId {
        platform: Platform,
        local_id: String,
        cross_id: Option<String>,
    },

    /// Resolution failed after all retries; the item is kept without a cross id.
    ResolveFailed {
        platform: Platform,
        local_id: String,
        error: String,
    },

    /// A transient failure is being retried.
    RetryBackoff {
        label: String,
        retry_after_ms: u64,
        attempt: u32,
    },

    /// Identity cache written.
    IdentityCacheSaved { new_mappings: usize, total: usize },

    /// Platform dataset written.
    DatasetSaved {
        platform: Platform,
        added: usize,
        total: usize,
    },

    /// Datasets joined.
    Reconciled {
        douban: usize,
        imdb: usize,
        merged: usize,
    },

    /// Diff computed for a direction.
    CandidatesFound {
        direction: SyncDirection,
        count: usize,
    },

    /// A candidate was dropped because it already failed before.
    SkippedBlacklisted { title: String },

    /// Starting the write loop.
    SyncingRatings {
        direction: SyncDirection,
        count: usize,
        dry_run: bool,
    },

    /// A rating was written on the target.
    RatingWritten {
        title: String,
        item_id: String,
        rating: u8,
    },

    /// A candidate lacked the target id or a usable rating.
    RatingIncomplete { title: String },

    /// The target refused a write.
    RatingFailed { title: String, error: String },

    /// Write loop finished.
    SyncComplete {
        written: usize,
        failed: usize,
        skipped: usize,
    },

    /// Re-fetching the target after successful writes.
    RefreshingTarget { platform: Platform },

    /// Failure ledger table rewritten.
    LedgerCommitted { added: usize, total: usize },

    /// A stop was requested; the run ends after the current step.
    Cancelled,

    /// Warning message (non-fatal).
    Warning { message: String },
}

/// Callback for progress updates.
pub type ProgressCallback = Box<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}
