//! Shared sync types and constants.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::NaiveDate;

use crate::entity::failure::FailureRecord;
use crate::entity::merged::MergedMovie;
use crate::entity::movie::ItemKey;
use crate::entity::platform::{Platform, SyncDirection};
use crate::platform::Jitter;

/// Default number of concurrent cross-id lookups.
pub const DEFAULT_RESOLVE_CONCURRENCY: usize = 4;

/// Default listing page size.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Attempts (first try included) for a transient failure.
pub const MAX_ATTEMPTS: u32 = 3;

/// Initial backoff delay in milliseconds.
pub const INITIAL_BACKOFF_MS: u64 = 500;

/// Maximum backoff delay in milliseconds.
pub const MAX_BACKOFF_MS: u64 = 5_000;

/// Lower bound of the pause between two rating writes.
pub const DEFAULT_MIN_WRITE_DELAY_MS: u64 = 1_000;

/// Upper bound of the pause between two rating writes.
pub const DEFAULT_MAX_WRITE_DELAY_MS: u64 = 3_000;

/// Options for one sync run.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Compute and report candidates without writing anything.
    pub dry_run: bool,
    /// Process at most this many candidates. Disables the post-run refresh.
    pub limit: Option<usize>,
    /// Pause inserted before each write.
    pub write_delay: Jitter,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            limit: None,
            write_delay: Jitter::new(
                Duration::from_millis(DEFAULT_MIN_WRITE_DELAY_MS),
                Duration::from_millis(DEFAULT_MAX_WRITE_DELAY_MS),
            ),
        }
    }
}

/// Cooperative cancellation flag shared between the shell and a run.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    requested: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running operation to stop at its next checkpoint.
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// A merged movie rated on the source side only.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncCandidate {
    pub direction: SyncDirection,
    pub movie: MergedMovie,
}

impl SyncCandidate {
    pub fn new(direction: SyncDirection, movie: MergedMovie) -> Self {
        Self { direction, movie }
    }

    #[must_use]
    pub fn key(&self) -> ItemKey {
        self.movie.key()
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.movie.title
    }

    #[must_use]
    pub fn source_rating(&self) -> Option<u8> {
        self.movie.rating(self.direction.source())
    }

    /// Source rating converted to the target scale.
    #[must_use]
    pub fn target_rating(&self) -> Option<u8> {
        self.source_rating()
            .and_then(|r| self.direction.convert_rating(r))
    }

    #[must_use]
    pub fn target_id(&self) -> Option<&str> {
        self.movie.id(self.direction.target())
    }

    /// Date the source rating was given; used for ordering.
    #[must_use]
    pub fn source_date(&self) -> Option<NaiveDate> {
        self.movie.date_rated(self.direction.source())
    }
}

/// Terminal state of one candidate in a sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateState {
    /// Target id or converted rating missing.
    SkippedIncomplete,
    /// Present in the failure ledger.
    SkippedBlacklisted,
    /// Written on the target with this rating.
    Written { rating: u8 },
    /// Target rejected the write.
    Failed { message: String },
}

/// What happened to one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemOutcome {
    pub key: ItemKey,
    pub title: String,
    pub state: CandidateState,
}

/// Result of a sync run.
#[derive(Debug, Clone)]
pub struct SyncRunReport {
    pub direction: SyncDirection,
    pub dry_run: bool,
    pub limit: Option<usize>,
    /// Number of ratings written.
    pub success_count: usize,
    /// Failure records produced in this run (incomplete and rejected).
    pub failures: Vec<FailureRecord>,
    /// Candidates dropped by the failure ledger.
    pub skipped: Vec<SyncCandidate>,
    /// Per-candidate outcomes in processing order.
    pub outcomes: Vec<ItemOutcome>,
    /// Candidates that would be written (dry run only).
    pub preview: Vec<SyncCandidate>,
    /// Whether the target dataset was re-fetched afterwards.
    pub refreshed: bool,
    /// Whether the run stopped early on request.
    pub cancelled: bool,
}

impl SyncRunReport {
    pub fn new(direction: SyncDirection, dry_run: bool, limit: Option<usize>) -> Self {
        Self {
            direction,
            dry_run,
            limit,
            success_count: 0,
            failures: Vec::new(),
            skipped: Vec::new(),
            outcomes: Vec::new(),
            preview: Vec::new(),
            refreshed: false,
            cancelled: false,
        }
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, CandidateState::Failed { .. }))
            .count()
    }

    #[must_use]
    pub fn incomplete_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.state == CandidateState::SkippedIncomplete)
            .count()
    }

    /// The target is re-fetched only after a real, unlimited run that wrote something.
    #[must_use]
    pub fn should_refresh(&self) -> bool {
        !self.dry_run && self.limit.is_none() && self.success_count > 0
    }
}

/// Summary of one incremental fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItemsSummary {
    pub platform: Platform,
    /// Items added to the local dataset.
    pub new_items: usize,
    pub pages_fetched: u32,
    /// Identity edges learned in this run.
    pub new_mappings: usize,
    /// New items whose cross id could not be resolved.
    pub unresolved: usize,
    /// Dataset size after merging.
    pub total_stored: usize,
    /// Stopped early on request.
    pub cancelled: bool,
    /// A listing page failed after retries; older pages were not reached.
    pub truncated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(direction: SyncDirection) -> SyncCandidate {
        SyncCandidate::new(
            direction,
            MergedMovie {
                douban_id: Some("1292052".into()),
                imdb_id: Some("tt0111161".into()),
                title: "The Shawshank Redemption".into(),
                rating_douban: Some(4),
                rating_imdb: Some(7),
                date_rated_douban: NaiveDate::from_ymd_opt(2023, 1, 2),
                date_rated_imdb: NaiveDate::from_ymd_opt(2022, 6, 1),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_sync_options_default() {
        let options = SyncOptions::default();
        assert!(!options.dry_run);
        assert_eq!(options.limit, None);
        assert_eq!(
            options.write_delay.min(),
            Duration::from_millis(DEFAULT_MIN_WRITE_DELAY_MS)
        );
        assert_eq!(
            options.write_delay.max(),
            Duration::from_millis(DEFAULT_MAX_WRITE_DELAY_MS)
        );
    }

    #[test]
    fn test_stop_signal_is_shared_between_clones() {
        let signal = StopSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_requested());
        signal.request();
        assert!(clone.is_requested());
    }

    #[test]
    fn test_candidate_accessors_follow_direction() {
        let c = candidate(SyncDirection::DoubanToImdb);
        assert_eq!(c.source_rating(), Some(4));
        assert_eq!(c.target_rating(), Some(8));
        assert_eq!(c.target_id(), Some("tt0111161"));
        assert_eq!(c.source_date(), NaiveDate::from_ymd_opt(2023, 1, 2));

        let c = candidate(SyncDirection::ImdbToDouban);
        assert_eq!(c.source_rating(), Some(7));
        assert_eq!(c.target_rating(), Some(7));
        assert_eq!(c.target_id(), Some("1292052"));
        assert_eq!(c.source_date(), NaiveDate::from_ymd_opt(2022, 6, 1));
    }

    #[test]
    fn test_report_counts_and_refresh_rule() {
        let mut report = SyncRunReport::new(SyncDirection::DoubanToImdb, false, None);
        assert!(!report.should_refresh());

        report.success_count = 1;
        report.outcomes.push(ItemOutcome {
            key: ItemKey::new(Some("1".into()), None),
            title: "a".into(),
            state: CandidateState::SkippedIncomplete,
        });
        report.outcomes.push(ItemOutcome {
            key: ItemKey::new(Some("2".into()), Some("tt2".into())),
            title: "b".into(),
            state: CandidateState::Failed {
                message: "rejected".into(),
            },
        });
        assert!(report.should_refresh());
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.incomplete_count(), 1);

        report.limit = Some(5);
        assert!(!report.should_refresh());

        let mut dry = SyncRunReport::new(SyncDirection::DoubanToImdb, true, None);
        dry.success_count = 3;
        assert!(!dry.should_refresh());
    }
}
