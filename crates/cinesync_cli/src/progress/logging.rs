use cinesync::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::ValidatingCredentials { platform } => {
                tracing::debug!(%platform, "Validating credentials");
            }

            SyncProgress::CredentialsChecked { platform, valid } => {
                if valid {
                    tracing::info!(%platform, "Credentials valid");
                } else {
                    tracing::warn!(%platform, "Credentials rejected");
                }
            }

            SyncProgress::FetchingPages { platform, known } => {
                tracing::info!(%platform, known, "Fetching ratings");
            }

            SyncProgress::FetchedPage {
                platform,
                page,
                count,
                new_so_far,
                total,
            } => {
                tracing::debug!(%platform, page, count, new_so_far, total = ?total, "Fetched page");
            }

            SyncProgress::ReachedKnownItem { platform, page, id } => {
                tracing::info!(%platform, page, id = %id, "Reached already stored rating");
            }

            SyncProgress::FetchComplete {
                platform,
                new_items,
            } => {
                tracing::info!(%platform, new_items, "Fetch complete");
            }

            SyncProgress::ResolvingIds {
                platform,
                misses,
                cached,
                concurrency,
            } => {
                tracing::info!(%platform, misses, cached, concurrency, "Resolving cross-platform ids");
            }

            SyncProgress::ResolvedId {
                platform,
                local_id,
                cross_id,
            } => {
                tracing::debug!(%platform, local_id = %local_id, cross_id = ?cross_id, "Resolved id");
            }

            SyncProgress::ResolveFailed {
                platform,
                local_id,
                error,
            } => {
                tracing::warn!(%platform, local_id = %local_id, error = %error, "Failed to resolve id");
            }

            SyncProgress::RetryBackoff {
                label,
                retry_after_ms,
                attempt,
            } => {
                tracing::warn!(label = %label, retry_after_ms, attempt, "Transient failure, backing off");
            }

            SyncProgress::IdentityCacheSaved {
                new_mappings,
                total,
            } => {
                tracing::debug!(new_mappings, total, "Identity map saved");
            }

            SyncProgress::DatasetSaved {
                platform,
                added,
                total,
            } => {
                tracing::info!(%platform, added, total, "Dataset saved");
            }

            SyncProgress::Reconciled {
                douban,
                imdb,
                merged,
            } => {
                tracing::info!(douban, imdb, merged, "Datasets reconciled");
            }

            SyncProgress::CandidatesFound { direction, count } => {
                tracing::info!(direction = %direction, count, "Sync candidates found");
            }

            SyncProgress::SkippedBlacklisted { title } => {
                tracing::debug!(title = %title, "Skipped previously failed item");
            }

            SyncProgress::SyncingRatings {
                direction,
                count,
                dry_run,
            } => {
                tracing::info!(direction = %direction, count, dry_run, "Syncing ratings");
            }

            SyncProgress::RatingWritten {
                title,
                item_id,
                rating,
            } => {
                tracing::info!(title = %title, item_id = %item_id, rating, "Rating written");
            }

            SyncProgress::RatingIncomplete { title } => {
                tracing::warn!(title = %title, "Skipped, missing target id or rating");
            }

            SyncProgress::RatingFailed { title, error } => {
                tracing::warn!(title = %title, error = %error, "Rating write failed");
            }

            SyncProgress::SyncComplete {
                written,
                failed,
                skipped,
            } => {
                tracing::info!(written, failed, skipped, "Sync complete");
            }

            SyncProgress::RefreshingTarget { platform } => {
                tracing::info!(%platform, "Refreshing target dataset");
            }

            SyncProgress::LedgerCommitted { added, total } => {
                tracing::debug!(added, total, "Failure ledger saved");
            }

            SyncProgress::Cancelled => {
                tracing::warn!("Run cancelled");
            }

            SyncProgress::Warning { message } => {
                tracing::warn!(message = %message, "Warning");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
