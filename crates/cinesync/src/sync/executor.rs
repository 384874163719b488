//! Applies the rating delta for one direction.

use std::sync::Arc;

use chrono::Utc;

use crate::entity::failure::{FailureReason, FailureRecord};
use crate::entity::merged::MergedDataset;
use crate::entity::platform::SyncDirection;
use crate::platform::{ApiRateLimiter, PlatformError, RatingPlatform, short_error_message};
use crate::store::FailureLedger;

use super::diff::{candidates, order_candidates};
use super::error::{EngineError, Result};
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{
    CandidateState, ItemOutcome, StopSignal, SyncCandidate, SyncOptions, SyncRunReport,
};

/// Writes missing ratings to the target platform, one at a time.
pub struct SyncExecutor {
    target: Arc<dyn RatingPlatform>,
    rate_limiter: Option<ApiRateLimiter>,
}

impl SyncExecutor {
    pub fn new(target: Arc<dyn RatingPlatform>) -> Self {
        Self {
            target,
            rate_limiter: None,
        }
    }

    /// Wait on `limiter` before every write, on top of any client-side limiting.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: ApiRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Run one sync pass over `dataset`.
    ///
    /// Candidates already in `ledger` are skipped. In a dry run the remaining
    /// candidates are returned as the preview and nothing is written.
    /// Otherwise each failure is journalled as it happens and the ledger
    /// table is committed before returning, including when `AuthRequired`
    /// aborts the loop.
    #[tracing::instrument(skip_all, fields(direction = %direction, dry_run = options.dry_run))]
    pub async fn run(
        &self,
        dataset: &MergedDataset,
        direction: SyncDirection,
        options: &SyncOptions,
        ledger: &mut FailureLedger,
        stop: &StopSignal,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<SyncRunReport> {
        let actual = self.target.platform();
        if actual != direction.target() {
            return Err(EngineError::ClientMismatch {
                expected: direction.target(),
                actual,
            });
        }

        let mut report = SyncRunReport::new(direction, options.dry_run, options.limit);

        let all = candidates(dataset, direction);
        emit(
            on_progress,
            SyncProgress::CandidatesFound {
                direction,
                count: all.len(),
            },
        );

        let mut pending: Vec<SyncCandidate> = Vec::with_capacity(all.len());
        for candidate in all {
            if ledger.is_blacklisted(&candidate.movie) {
                emit(
                    on_progress,
                    SyncProgress::SkippedBlacklisted {
                        title: candidate.movie.title.clone(),
                    },
                );
                report.outcomes.push(ItemOutcome {
                    key: candidate.key(),
                    title: candidate.movie.title.clone(),
                    state: CandidateState::SkippedBlacklisted,
                });
                report.skipped.push(candidate);
            } else {
                pending.push(candidate);
            }
        }
        order_candidates(&mut pending);

        if options.dry_run {
            tracing::info!(
                candidates = pending.len(),
                blacklisted = report.skipped.len(),
                "Dry run, no ratings written"
            );
            report.preview = pending;
            return Ok(report);
        }

        if let Some(limit) = options.limit {
            pending.truncate(limit);
        }

        emit(
            on_progress,
            SyncProgress::SyncingRatings {
                direction,
                count: pending.len(),
                dry_run: false,
            },
        );

        let aborted = self
            .write_all(pending, options, ledger, stop, &mut report, on_progress)
            .await;

        emit(
            on_progress,
            SyncProgress::SyncComplete {
                written: report.success_count,
                failed: report.failed_count(),
                skipped: report.incomplete_count() + report.skipped.len(),
            },
        );

        let added = ledger.commit()?;
        emit(
            on_progress,
            SyncProgress::LedgerCommitted {
                added,
                total: ledger.len(),
            },
        );

        tracing::info!(
            written = report.success_count,
            failed = report.failed_count(),
            incomplete = report.incomplete_count(),
            blacklisted = report.skipped.len(),
            cancelled = report.cancelled,
            "Sync run finished"
        );

        match aborted {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    /// The write loop. Returns the error that aborted it, if any.
    async fn write_all(
        &self,
        pending: Vec<SyncCandidate>,
        options: &SyncOptions,
        ledger: &mut FailureLedger,
        stop: &StopSignal,
        report: &mut SyncRunReport,
        on_progress: Option<&ProgressCallback>,
    ) -> Option<EngineError> {
        let direction = report.direction;

        for candidate in pending {
            if stop.is_requested() {
                report.cancelled = true;
                emit(on_progress, SyncProgress::Cancelled);
                break;
            }

            let title = candidate.movie.title.clone();
            let (Some(target_id), Some(rating)) = (candidate.target_id(), candidate.target_rating())
            else {
                tracing::debug!(%title, key = %candidate.key(), "Missing target id or rating");
                if let Err(e) = self.record(
                    ledger,
                    report,
                    &candidate,
                    FailureReason::Incomplete,
                    CandidateState::SkippedIncomplete,
                ) {
                    return Some(e);
                }
                emit(on_progress, SyncProgress::RatingIncomplete { title });
                continue;
            };
            let target_id = target_id.to_string();

            options.write_delay.sleep().await;
            if let Some(limiter) = &self.rate_limiter {
                limiter.wait().await;
            }

            match self.target.write_rating(&target_id, rating).await {
                Ok(()) => {
                    report.success_count += 1;
                    tracing::debug!(%title, item_id = %target_id, rating, %direction, "Rating written");
                    report.outcomes.push(ItemOutcome {
                        key: candidate.key(),
                        title: title.clone(),
                        state: CandidateState::Written { rating },
                    });
                    emit(
                        on_progress,
                        SyncProgress::RatingWritten {
                            title,
                            item_id: target_id,
                            rating,
                        },
                    );
                }
                Err(PlatformError::AuthRequired) => {
                    tracing::warn!(%title, "Target refused credentials, aborting run");
                    return Some(EngineError::Platform(PlatformError::AuthRequired));
                }
                Err(e) => {
                    let message = short_error_message(&e);
                    tracing::warn!(%title, item_id = %target_id, error = %message, "Rating write failed");
                    if let Err(store_err) = self.record(
                        ledger,
                        report,
                        &candidate,
                        FailureReason::Rejected {
                            message: message.clone(),
                        },
                        CandidateState::Failed {
                            message: message.clone(),
                        },
                    ) {
                        return Some(store_err);
                    }
                    emit(
                        on_progress,
                        SyncProgress::RatingFailed {
                            title,
                            error: message,
                        },
                    );
                }
            }
        }
        None
    }

    fn record(
        &self,
        ledger: &mut FailureLedger,
        report: &mut SyncRunReport,
        candidate: &SyncCandidate,
        reason: FailureReason,
        state: CandidateState,
    ) -> Result<()> {
        let record = FailureRecord::new(&candidate.movie, candidate.direction, reason, Utc::now());
        ledger.record_failure(record.clone())?;
        report.failures.push(record);
        report.outcomes.push(ItemOutcome {
            key: candidate.key(),
            title: candidate.movie.title.clone(),
            state,
        });
        Ok(())
    }
}
