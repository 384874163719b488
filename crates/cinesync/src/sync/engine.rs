//! Orchestration of fetch, reconcile and sync runs.
//!
//! The [`Engine`] owns the data directory layout and one client per
//! platform, and constructs the stores fresh for every operation. Nothing is
//! cached between calls, so each operation sees the files as the previous one
//! left them.
//!
//! # Example
//!
//! ```ignore
//! use cinesync::sync::{Engine, SyncDirection};
//! use cinesync::store::DataLayout;
//!
//! let engine = Engine::new(layout, douban.clone(), imdb, douban);
//! engine.fetch_incremental(Platform::Douban, None).await?;
//! engine.fetch_incremental(Platform::Imdb, None).await?;
//! let report = engine.sync(SyncDirection::DoubanToImdb, true, None, None).await?;
//! for candidate in &report.preview {
//!     println!("{}", candidate.title());
//! }
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use crate::entity::merged::{MergedDataset, MergedMovie};
use crate::entity::platform::{Platform, SyncDirection};
use crate::fetch::{FetchOptions, IncrementalFetcher};
use crate::platform::{ApiRateLimiter, CrossIdResolver, Jitter, RatingPlatform, short_error_message};
use crate::reconcile;
use crate::store::{DataLayout, DatasetStore, FailureLedger, IdentityCache, write_json_atomic};

use super::diff::{candidates, order_candidates};
use super::error::{EngineError, Result};
use super::executor::SyncExecutor;
use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{NewItemsSummary, StopSignal, SyncCandidate, SyncOptions, SyncRunReport};

/// Tunables shared by every operation of an [`Engine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub fetch: FetchOptions,
    /// Pause before each rating write.
    pub write_delay: Jitter,
    /// Extra cap on rating writes per second.
    pub write_rps: Option<u32>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            fetch: FetchOptions::default(),
            write_delay: SyncOptions::default().write_delay,
            write_rps: None,
        }
    }
}

/// Runs fetch, reconcile and sync operations against one data directory.
pub struct Engine {
    layout: DataLayout,
    douban: Arc<dyn RatingPlatform>,
    imdb: Arc<dyn RatingPlatform>,
    resolver: Arc<dyn CrossIdResolver>,
    options: EngineOptions,
    stop: StopSignal,
}

impl Engine {
    pub fn new(
        layout: DataLayout,
        douban: Arc<dyn RatingPlatform>,
        imdb: Arc<dyn RatingPlatform>,
        resolver: Arc<dyn CrossIdResolver>,
    ) -> Self {
        Self {
            layout,
            douban,
            imdb,
            resolver,
            options: EngineOptions::default(),
            stop: StopSignal::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Share `stop` with the caller so it can end a run early.
    #[must_use]
    pub fn with_stop_signal(mut self, stop: StopSignal) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_signal(&self) -> &StopSignal {
        &self.stop
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    fn client(&self, platform: Platform) -> &Arc<dyn RatingPlatform> {
        match platform {
            Platform::Douban => &self.douban,
            Platform::Imdb => &self.imdb,
        }
    }

    /// Check that `platform` accepts the configured credentials.
    #[tracing::instrument(skip_all, fields(%platform))]
    pub async fn validate(
        &self,
        platform: Platform,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<bool> {
        emit(on_progress, SyncProgress::ValidatingCredentials { platform });
        let valid = self.client(platform).validate_credentials().await?;
        emit(
            on_progress,
            SyncProgress::CredentialsChecked { platform, valid },
        );
        if valid {
            tracing::info!(%platform, "Credentials accepted");
        } else {
            tracing::warn!(%platform, "Credentials rejected");
        }
        Ok(valid)
    }

    /// Fetch the ratings added on `platform` since the last run and store them.
    ///
    /// Credentials are checked first: those of `platform`, and Douban's, which
    /// resolves cross ids for both listings.
    pub async fn fetch_incremental(
        &self,
        platform: Platform,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<NewItemsSummary> {
        self.preflight(platform, on_progress).await?;
        self.fetch(platform, false, on_progress).await
    }

    /// Re-crawl the whole listing of `platform`, merging over the stored dataset.
    pub async fn fetch_full(
        &self,
        platform: Platform,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<NewItemsSummary> {
        self.preflight(platform, on_progress).await?;
        self.fetch(platform, true, on_progress).await
    }

    async fn preflight(
        &self,
        platform: Platform,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<()> {
        let mut platforms = vec![platform];
        if platform != Platform::Douban {
            platforms.push(Platform::Douban);
        }
        for platform in platforms {
            if !self.validate(platform, on_progress).await? {
                return Err(EngineError::CredentialsRejected(platform));
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(%platform, full))]
    async fn fetch(
        &self,
        platform: Platform,
        full: bool,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<NewItemsSummary> {
        let path = self.layout.dataset_path(platform);
        let first_scrape = !path.exists();
        let mut dataset = DatasetStore::load(platform, path)?;
        let mut cache = IdentityCache::load(self.layout.identity_map_path())?;

        let existing_ids = if full {
            HashSet::new()
        } else {
            dataset.existing_ids()
        };

        let fetcher = IncrementalFetcher::new(
            Arc::clone(self.client(platform)),
            Arc::clone(&self.resolver),
            self.options.fetch.clone(),
        );
        let outcome = fetcher
            .fetch_new(&existing_ids, &mut cache, &self.stop, on_progress)
            .await?;

        let saved = cache.save()?;
        if saved > 0 {
            emit(
                on_progress,
                SyncProgress::IdentityCacheSaved {
                    new_mappings: saved,
                    total: cache.len(),
                },
            );
        }

        // A complete first scrape of an empty history still marks the platform as scraped
        let complete = !outcome.cancelled && !outcome.truncated;
        let fetched = outcome.items.len();
        let added = dataset.merge(outcome.items);
        if fetched > 0 || (first_scrape && complete) {
            dataset.save()?;
            emit(
                on_progress,
                SyncProgress::DatasetSaved {
                    platform,
                    added,
                    total: dataset.len(),
                },
            );
        }

        let summary = NewItemsSummary {
            platform,
            new_items: added,
            pages_fetched: outcome.pages_fetched,
            new_mappings: outcome.new_mappings,
            unresolved: outcome.unresolved,
            total_stored: dataset.len(),
            cancelled: outcome.cancelled,
            truncated: outcome.truncated,
        };
        tracing::info!(
            %platform,
            new_items = summary.new_items,
            total = summary.total_stored,
            "Dataset updated"
        );
        Ok(summary)
    }

    /// Load the stored dataset of `platform`; missing files are an error.
    pub fn load_dataset(&self, platform: Platform) -> Result<DatasetStore> {
        let path = self.layout.dataset_path(platform);
        if !path.exists() {
            return Err(EngineError::MissingDataset { platform, path });
        }
        Ok(DatasetStore::load(platform, path)?)
    }

    /// Join the two stored datasets.
    #[tracing::instrument(skip_all)]
    pub fn reconcile(&self, on_progress: Option<&ProgressCallback>) -> Result<MergedDataset> {
        let douban = self.load_dataset(Platform::Douban)?;
        let imdb = self.load_dataset(Platform::Imdb)?;

        let merged = reconcile::merge(douban.records(), imdb.records());
        emit(
            on_progress,
            SyncProgress::Reconciled {
                douban: douban.len(),
                imdb: imdb.len(),
                merged: merged.len(),
            },
        );
        tracing::info!(
            douban = douban.len(),
            imdb = imdb.len(),
            merged = merged.len(),
            rated_on_both = merged.rated_on_both(),
            "Reconciled datasets"
        );
        Ok(merged)
    }

    /// Write `dataset` to `merged_ratings.json` and return the path.
    pub fn export_merged(&self, dataset: &MergedDataset) -> Result<PathBuf> {
        let path = self.layout.merged_path();
        let movies: Vec<&MergedMovie> = dataset.values().collect();
        write_json_atomic(&path, &movies)?;
        tracing::debug!(path = %path.display(), movies = movies.len(), "Exported merged dataset");
        Ok(path)
    }

    /// Candidates for syncing from `source` to the other platform, in write order.
    ///
    /// Blacklisted items are included; use [`sync`](Self::sync) with
    /// `dry_run` for the filtered preview.
    pub fn diff(&self, source: Platform) -> Result<Vec<SyncCandidate>> {
        let dataset = self.reconcile(None)?;
        let mut list = candidates(&dataset, SyncDirection::from_source(source));
        order_candidates(&mut list);
        Ok(list)
    }

    /// Write the ratings missing on the target of `direction`.
    ///
    /// A real run checks the target's credentials first, and after writing
    /// at least one rating without a `limit` re-fetches the target so its
    /// dataset reflects the new ratings.
    #[tracing::instrument(skip_all, fields(%direction, dry_run, ?limit))]
    pub async fn sync(
        &self,
        direction: SyncDirection,
        dry_run: bool,
        limit: Option<usize>,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<SyncRunReport> {
        let target = direction.target();
        if !dry_run && !self.validate(target, on_progress).await? {
            return Err(EngineError::CredentialsRejected(target));
        }

        let dataset = self.reconcile(on_progress)?;
        let mut ledger = FailureLedger::open(
            self.layout.failure_table_path(),
            self.layout.failure_journal_path(),
        )?;

        let mut executor = SyncExecutor::new(Arc::clone(self.client(target)));
        if let Some(rps) = self.options.write_rps {
            executor = executor.with_rate_limiter(ApiRateLimiter::new(rps));
        }
        let options = SyncOptions {
            dry_run,
            limit,
            write_delay: self.options.write_delay,
        };

        let mut report = executor
            .run(
                &dataset,
                direction,
                &options,
                &mut ledger,
                &self.stop,
                on_progress,
            )
            .await?;

        if report.should_refresh() && !report.cancelled {
            emit(on_progress, SyncProgress::RefreshingTarget { platform: target });
            match self.fetch(target, false, on_progress).await {
                Ok(_) => report.refreshed = true,
                Err(e) => {
                    let message = format!(
                        "Refreshing {} failed: {}",
                        target.display_name(),
                        short_error_message(&e)
                    );
                    tracing::warn!("{message}");
                    emit(on_progress, SyncProgress::Warning { message });
                }
            }
            if report.refreshed {
                let merged = self.reconcile(on_progress)?;
                self.export_merged(&merged)?;
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::entity::movie::MovieRecord;
    use crate::platform::{ListingPage, PlatformError};

    struct Fixed {
        platform: Platform,
        valid: bool,
        listed: std::sync::Mutex<usize>,
    }

    impl Fixed {
        fn new(platform: Platform, valid: bool) -> Arc<Self> {
            Arc::new(Self {
                platform,
                valid,
                listed: std::sync::Mutex::new(0),
            })
        }
    }

    #[async_trait]
    impl RatingPlatform for Fixed {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn list_page(&self, _o: usize, _s: usize) -> crate::platform::Result<ListingPage> {
            *self.listed.lock().unwrap() += 1;
            Ok(ListingPage::default())
        }

        async fn write_rating(&self, _id: &str, _r: u8) -> crate::platform::Result<()> {
            Err(PlatformError::internal("not expected"))
        }

        async fn validate_credentials(&self) -> crate::platform::Result<bool> {
            Ok(self.valid)
        }
    }

    #[async_trait]
    impl CrossIdResolver for Fixed {
        async fn resolve_cross_id(
            &self,
            _p: Platform,
            _id: &str,
        ) -> crate::platform::Result<Option<String>> {
            Ok(None)
        }
    }

    fn engine(dir: &std::path::Path, valid: bool) -> Engine {
        engine_with(dir, Fixed::new(Platform::Douban, true), Fixed::new(Platform::Imdb, valid))
    }

    fn engine_with(dir: &std::path::Path, douban: Arc<Fixed>, imdb: Arc<Fixed>) -> Engine {
        Engine::new(DataLayout::new(dir, "alice", "ur1"), douban.clone(), imdb, douban)
    }

    #[test]
    fn test_reconcile_requires_both_datasets() {
        let dir = tempfile::tempdir().unwrap();
        let err = engine(dir.path(), true).reconcile(None).unwrap_err();
        assert!(matches!(
            err,
            EngineError::MissingDataset {
                platform: Platform::Douban,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_sync_refuses_rejected_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let err = engine(dir.path(), false)
            .sync(SyncDirection::DoubanToImdb, false, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CredentialsRejected(Platform::Imdb)));
    }

    #[tokio::test]
    async fn test_scrape_refuses_rejected_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let imdb = Fixed::new(Platform::Imdb, false);
        let err = engine_with(dir.path(), Fixed::new(Platform::Douban, true), imdb.clone())
            .fetch_incremental(Platform::Imdb, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CredentialsRejected(Platform::Imdb)));
        assert_eq!(*imdb.listed.lock().unwrap(), 0);
        assert!(!dir.path().join("imdb_ur1_ratings.json").exists());
    }

    #[tokio::test]
    async fn test_imdb_scrape_checks_the_resolving_session() {
        let dir = tempfile::tempdir().unwrap();
        let imdb = Fixed::new(Platform::Imdb, true);
        let err = engine_with(dir.path(), Fixed::new(Platform::Douban, false), imdb.clone())
            .fetch_full(Platform::Imdb, None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::CredentialsRejected(Platform::Douban)));
        assert_eq!(*imdb.listed.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_first_fetch_writes_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), true);
        let summary = engine
            .fetch_incremental(Platform::Douban, None)
            .await
            .unwrap();
        assert_eq!(summary.new_items, 0);
        assert_eq!(summary.pages_fetched, 1);
        assert!(engine.load_dataset(Platform::Douban).unwrap().is_empty());
        assert!(!dir.path().join("identity_map.json").exists());
    }

    #[tokio::test]
    async fn test_cancelled_first_fetch_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), true);
        engine.stop_signal().request();
        let summary = engine
            .fetch_incremental(Platform::Imdb, None)
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert!(!dir.path().join("imdb_ur1_ratings.json").exists());
    }

    #[test]
    fn test_export_merged_writes_values() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), true);
        let merged = reconcile::merge(
            &[MovieRecord {
                douban_id: Some("1".into()),
                title: "Heat".into(),
                rating: Some(4),
                ..Default::default()
            }],
            &[],
        );
        let path = engine.export_merged(&merged).unwrap();
        let movies: Vec<MergedMovie> =
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].rating_douban, Some(4));
    }
}
