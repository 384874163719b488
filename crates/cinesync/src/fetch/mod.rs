//! Incremental crawling of a platform's rating history.
//!
//! Listings are most-recent-first, so a crawl can stop at the first item it
//! already holds. A rating added to an *older* position than the newest
//! stored item is not seen until a full scrape.

mod enrich;

use std::collections::HashSet;
use std::sync::Arc;

use crate::entity::movie::MovieRecord;
use crate::entity::platform::Platform;
use crate::platform::{
    CrossIdResolver, PlatformError, RatingPlatform, Result, short_error_message,
};
use crate::retry::{RetryConfig, with_retry};
use crate::store::IdentityCache;
use crate::sync::{DEFAULT_RESOLVE_CONCURRENCY, ProgressCallback, StopSignal, SyncProgress, emit};

/// Options for an incremental fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Page size; `None` uses the client's natural size.
    pub page_size: Option<usize>,
    /// Concurrent cross-id lookups.
    pub concurrency: usize,
    /// Backoff for page requests and lookups.
    pub retry: RetryConfig,
    /// Hard cap on pages per run.
    pub max_pages: Option<u32>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            page_size: None,
            concurrency: DEFAULT_RESOLVE_CONCURRENCY,
            retry: RetryConfig::default(),
            max_pages: None,
        }
    }
}

/// Result of [`IncrementalFetcher::fetch_new`].
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    /// New items, oldest rating first.
    pub items: Vec<MovieRecord>,
    pub pages_fetched: u32,
    /// The stored id that ended the crawl, if any.
    pub stopped_at: Option<String>,
    /// Identity edges learned.
    pub new_mappings: usize,
    /// Items answered by the identity cache.
    pub cached: usize,
    /// Items left without a cross id.
    pub unresolved: usize,
    pub cancelled: bool,
    /// A page failed after retries and the crawl ended there.
    pub truncated: bool,
}

/// Fetches the ratings added since the last run, for one platform.
pub struct IncrementalFetcher {
    client: Arc<dyn RatingPlatform>,
    resolver: Arc<dyn CrossIdResolver>,
    options: FetchOptions,
}

impl IncrementalFetcher {
    pub fn new(
        client: Arc<dyn RatingPlatform>,
        resolver: Arc<dyn CrossIdResolver>,
        options: FetchOptions,
    ) -> Self {
        Self {
            client,
            resolver,
            options,
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.client.platform()
    }

    /// Crawl pages until a stored id shows up and return the new items.
    ///
    /// Pages are requested one at a time. Cross ids are filled from `cache`,
    /// falling back to the resolver; new edges are added to `cache` but not
    /// saved. `AuthRequired` from the listing or the resolver and other
    /// non-transient listing errors are returned; a page that keeps failing
    /// transiently ends the crawl with `truncated` set.
    #[tracing::instrument(skip_all, fields(platform = %self.platform()))]
    pub async fn fetch_new(
        &self,
        existing_ids: &HashSet<String>,
        cache: &mut IdentityCache,
        stop: &StopSignal,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<FetchOutcome> {
        let platform = self.client.platform();
        let page_size = self
            .options
            .page_size
            .unwrap_or_else(|| self.client.page_size())
            .max(1);

        emit(
            on_progress,
            SyncProgress::FetchingPages {
                platform,
                known: existing_ids.len(),
            },
        );

        let mut outcome = FetchOutcome::default();
        let mut listed: Vec<MovieRecord> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut offset = 0usize;

        loop {
            if stop.is_requested() {
                outcome.cancelled = true;
                emit(on_progress, SyncProgress::Cancelled);
                break;
            }
            if let Some(max) = self.options.max_pages
                && outcome.pages_fetched >= max
            {
                tracing::debug!(%platform, max, "Page cap reached");
                break;
            }

            let label = format!("{platform} page at offset {offset}");
            let page = match with_retry(
                || self.client.list_page(offset, page_size),
                PlatformError::is_transient,
                |e: &PlatformError| short_error_message(e),
                &label,
                &self.options.retry,
                on_progress,
            )
            .await
            {
                Ok(page) => page,
                Err(e) if e.is_transient() => {
                    let message = format!(
                        "{} listing failed at offset {offset}, keeping {} new items: {}",
                        platform.display_name(),
                        listed.len(),
                        short_error_message(&e)
                    );
                    tracing::warn!("{message}");
                    emit(on_progress, SyncProgress::Warning { message });
                    outcome.truncated = true;
                    break;
                }
                Err(e) => return Err(e),
            };
            outcome.pages_fetched += 1;

            if page.items.is_empty() {
                break;
            }

            let count = page.items.len();
            let mut new_on_page = 0usize;
            let mut known_hit: Option<String> = None;
            for item in page.items {
                let Some(id) = item.id_for(platform).map(str::to_string) else {
                    tracing::debug!(%platform, title = %item.title, "Listed item has no id");
                    continue;
                };
                if existing_ids.contains(&id) {
                    known_hit = Some(id);
                    break;
                }
                if seen.insert(id) {
                    listed.push(item);
                    new_on_page += 1;
                }
            }

            emit(
                on_progress,
                SyncProgress::FetchedPage {
                    platform,
                    page: outcome.pages_fetched,
                    count,
                    new_so_far: listed.len(),
                    total: page.total,
                },
            );

            if let Some(id) = known_hit {
                tracing::debug!(%platform, %id, page = outcome.pages_fetched, "Reached stored item");
                emit(
                    on_progress,
                    SyncProgress::ReachedKnownItem {
                        platform,
                        page: outcome.pages_fetched,
                        id: id.clone(),
                    },
                );
                outcome.stopped_at = Some(id);
                break;
            }
            if new_on_page == 0 {
                tracing::debug!(%platform, offset, "Page repeated earlier items, stopping");
                break;
            }
            if !page.has_more {
                break;
            }
            offset += page_size;
        }

        emit(
            on_progress,
            SyncProgress::FetchComplete {
                platform,
                new_items: listed.len(),
            },
        );

        let stats = enrich::enrich_cross_ids(
            platform,
            &mut listed,
            cache,
            &self.resolver,
            self.options.concurrency,
            &self.options.retry,
            stop,
            on_progress,
        )
        .await?;
        if stop.is_requested() {
            outcome.cancelled = true;
        }

        listed.reverse();
        outcome.items = listed;
        outcome.new_mappings = stats.new_mappings;
        outcome.cached = stats.cached;
        outcome.unresolved = stats.unresolved;

        tracing::info!(
            %platform,
            new_items = outcome.items.len(),
            pages = outcome.pages_fetched,
            new_mappings = outcome.new_mappings,
            unresolved = outcome.unresolved,
            "Incremental fetch finished"
        );
        Ok(outcome)
    }
}
