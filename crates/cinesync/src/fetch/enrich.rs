use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;

use crate::entity::movie::MovieRecord;
use crate::entity::platform::Platform;
use crate::platform::{CrossIdResolver, PlatformError, Result, short_error_message};
use crate::retry::{RetryConfig, with_retry};
use crate::store::IdentityCache;
use crate::sync::{ProgressCallback, StopSignal, SyncProgress, emit};

/// Counters from one enrichment pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EnrichStats {
    pub cached: usize,
    pub new_mappings: usize,
    pub unresolved: usize,
}

enum Resolution {
    Found(String),
    Missing,
    Failed(PlatformError),
    Skipped,
}

/// Fill in the cross-platform id of every item.
///
/// Cache hits are applied directly; misses are resolved concurrently (at most
/// `concurrency` in flight) and written back into `cache`. Results are applied
/// in listing order.
///
/// Lookup failures leave the item without a cross id, except `AuthRequired`:
/// it stops the pending lookups and is returned so the caller saves nothing.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn enrich_cross_ids(
    platform: Platform,
    items: &mut [MovieRecord],
    cache: &mut IdentityCache,
    resolver: &Arc<dyn CrossIdResolver>,
    concurrency: usize,
    retry: &RetryConfig,
    stop: &StopSignal,
    on_progress: Option<&ProgressCallback>,
) -> Result<EnrichStats> {
    let other = platform.other();
    let mut stats = EnrichStats::default();
    let mut misses: Vec<(usize, String)> = Vec::new();

    for (i, item) in items.iter_mut().enumerate() {
        let Some(local_id) = item.id_for(platform).map(str::to_string) else {
            continue;
        };
        if let Some(cross_id) = item.id_for(other).map(str::to_string) {
            if cache.record(platform, &local_id, &cross_id) {
                stats.new_mappings += 1;
            }
            continue;
        }
        match cache.lookup(platform, &local_id) {
            Some(cross_id) => {
                item.set_id(other, Some(cross_id.to_string()));
                stats.cached += 1;
            }
            None => misses.push((i, local_id)),
        }
    }

    if misses.is_empty() {
        return Ok(stats);
    }

    let concurrency = concurrency.clamp(1, misses.len());
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let auth_failed = Arc::new(AtomicBool::new(false));

    emit(
        on_progress,
        SyncProgress::ResolvingIds {
            platform,
            misses: misses.len(),
            cached: stats.cached,
            concurrency,
        },
    );

    let mut handles = Vec::with_capacity(misses.len());
    for (_, local_id) in &misses {
        let resolver = Arc::clone(resolver);
        let semaphore = Arc::clone(&semaphore);
        let retry = retry.clone();
        let stop = stop.clone();
        let auth_failed = Arc::clone(&auth_failed);
        let local_id = local_id.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return Resolution::Failed(PlatformError::internal(
                        "Semaphore closed unexpectedly",
                    ));
                }
            };
            if stop.is_requested() || auth_failed.load(Ordering::SeqCst) {
                return Resolution::Skipped;
            }

            let resolver = &resolver;
            let id = local_id.as_str();
            let label = format!("resolve {platform} {id}");
            match with_retry(
                || resolver.resolve_cross_id(platform, id),
                PlatformError::is_transient,
                |e: &PlatformError| short_error_message(e),
                &label,
                &retry,
                None,
            )
            .await
            {
                Ok(Some(cross_id)) => Resolution::Found(cross_id),
                Ok(None) => Resolution::Missing,
                Err(e) => {
                    if e.is_auth() {
                        auth_failed.store(true, Ordering::SeqCst);
                    }
                    Resolution::Failed(e)
                }
            }
        }));
    }

    let mut auth_error: Option<PlatformError> = None;
    for ((index, local_id), handle) in misses.into_iter().zip(handles) {
        match handle.await {
            Ok(Resolution::Found(cross_id)) => {
                if cache.record(platform, &local_id, &cross_id) {
                    stats.new_mappings += 1;
                }
                items[index].set_id(other, Some(cross_id.clone()));
                emit(
                    on_progress,
                    SyncProgress::ResolvedId {
                        platform,
                        local_id,
                        cross_id: Some(cross_id),
                    },
                );
            }
            Ok(Resolution::Missing) => {
                stats.unresolved += 1;
                tracing::debug!(%platform, id = %local_id, "No cross-platform id found");
                emit(
                    on_progress,
                    SyncProgress::ResolvedId {
                        platform,
                        local_id,
                        cross_id: None,
                    },
                );
            }
            Ok(Resolution::Failed(e)) if e.is_auth() => {
                tracing::warn!(%platform, id = %local_id, "Resolver rejected the session");
                auth_error.get_or_insert(e);
            }
            Ok(Resolution::Failed(e)) => {
                stats.unresolved += 1;
                let error = short_error_message(&e);
                tracing::warn!(%platform, id = %local_id, %error, "Cross-id resolution failed");
                emit(
                    on_progress,
                    SyncProgress::ResolveFailed {
                        platform,
                        local_id,
                        error,
                    },
                );
            }
            Ok(Resolution::Skipped) => {
                stats.unresolved += 1;
            }
            Err(e) => {
                stats.unresolved += 1;
                tracing::warn!(%platform, id = %local_id, error = %e, "Resolution task failed");
            }
        }
    }

    match auth_error {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::platform::Result;

    struct MapResolver {
        answers: HashMap<String, Option<String>>,
        calls: Mutex<Vec<String>>,
    }

    impl MapResolver {
        fn new(pairs: &[(&str, Option<&str>)]) -> Arc<Self> {
            Arc::new(Self {
                answers: pairs
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.map(str::to_string)))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CrossIdResolver for MapResolver {
        async fn resolve_cross_id(&self, _platform: Platform, local_id: &str) -> Result<Option<String>> {
            self.calls.lock().unwrap().push(local_id.to_string());
            match self.answers.get(local_id) {
                Some(answer) => Ok(answer.clone()),
                None => Err(PlatformError::api(400, "unknown id")),
            }
        }
    }

    fn douban(id: &str) -> MovieRecord {
        MovieRecord {
            douban_id: Some(id.to_string()),
            title: format!("movie {id}"),
            ..Default::default()
        }
    }

    fn quick_retry() -> RetryConfig {
        RetryConfig::new(Duration::from_millis(1), Duration::from_millis(1), 2).with_jitter(false)
    }

    #[tokio::test]
    async fn test_cache_hits_skip_the_resolver() {
        let resolver = MapResolver::new(&[("2", Some("tt2"))]);
        let dyn_resolver: Arc<dyn CrossIdResolver> = resolver.clone();
        let mut cache = IdentityCache::in_memory();
        cache.insert("1", "tt1");
        let mut items = vec![douban("1"), douban("2")];

        let stats = enrich_cross_ids(
            Platform::Douban,
            &mut items,
            &mut cache,
            &dyn_resolver,
            4,
            &quick_retry(),
            &StopSignal::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(items[0].imdb_id.as_deref(), Some("tt1"));
        assert_eq!(items[1].imdb_id.as_deref(), Some("tt2"));
        assert_eq!(stats.cached, 1);
        assert_eq!(stats.new_mappings, 1);
        assert_eq!(*resolver.calls.lock().unwrap(), vec!["2".to_string()]);
        assert_eq!(cache.lookup(Platform::Douban, "2"), Some("tt2"));
    }

    #[tokio::test]
    async fn test_results_follow_listing_order_and_failures_leave_none() {
        let resolver = MapResolver::new(&[
            ("a", Some("tta")),
            ("b", None),
            ("d", Some("ttd")),
        ]);
        let dyn_resolver: Arc<dyn CrossIdResolver> = resolver;
        let mut cache = IdentityCache::in_memory();
        let mut items = vec![douban("a"), douban("b"), douban("c"), douban("d")];

        let stats = enrich_cross_ids(
            Platform::Douban,
            &mut items,
            &mut cache,
            &dyn_resolver,
            2,
            &quick_retry(),
            &StopSignal::new(),
            None,
        )
        .await
        .unwrap();

        let ids: Vec<_> = items.iter().map(|i| i.imdb_id.clone()).collect();
        assert_eq!(
            ids,
            vec![Some("tta".into()), None, None, Some("ttd".into())]
        );
        assert_eq!(stats.unresolved, 2);
        assert_eq!(stats.new_mappings, 2);
    }

    #[tokio::test]
    async fn test_stop_signal_skips_pending_lookups() {
        let resolver = MapResolver::new(&[("a", Some("tta"))]);
        let dyn_resolver: Arc<dyn CrossIdResolver> = resolver.clone();
        let stop = StopSignal::new();
        stop.request();
        let mut cache = IdentityCache::in_memory();
        let mut items = vec![douban("a")];

        let stats = enrich_cross_ids(
            Platform::Douban,
            &mut items,
            &mut cache,
            &dyn_resolver,
            1,
            &quick_retry(),
            &stop,
            None,
        )
        .await
        .unwrap();

        assert_eq!(stats.unresolved, 1);
        assert!(resolver.calls.lock().unwrap().is_empty());
        assert_eq!(items[0].imdb_id, None);
    }

    struct RejectingResolver {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl CrossIdResolver for RejectingResolver {
        async fn resolve_cross_id(&self, _platform: Platform, _local_id: &str) -> Result<Option<String>> {
            *self.calls.lock().unwrap() += 1;
            Err(PlatformError::AuthRequired)
        }
    }

    #[tokio::test]
    async fn test_rejected_session_stops_pending_lookups() {
        let resolver = Arc::new(RejectingResolver {
            calls: Mutex::new(0),
        });
        let dyn_resolver: Arc<dyn CrossIdResolver> = resolver.clone();
        let mut cache = IdentityCache::in_memory();
        let mut items = vec![douban("a"), douban("b"), douban("c")];

        let err = enrich_cross_ids(
            Platform::Douban,
            &mut items,
            &mut cache,
            &dyn_resolver,
            1,
            &quick_retry(),
            &StopSignal::new(),
            None,
        )
        .await
        .unwrap_err();

        assert!(err.is_auth());
        assert_eq!(*resolver.calls.lock().unwrap(), 1);
        assert!(items.iter().all(|item| item.imdb_id.is_none()));
    }

    #[tokio::test]
    async fn test_listing_provided_cross_id_is_cached() {
        let dyn_resolver: Arc<dyn CrossIdResolver> = MapResolver::new(&[]);
        let mut cache = IdentityCache::in_memory();
        let mut item = douban("5");
        item.imdb_id = Some("tt5".into());
        let mut items = vec![item];

        let stats = enrich_cross_ids(
            Platform::Douban,
            &mut items,
            &mut cache,
            &dyn_resolver,
            4,
            &quick_retry(),
            &StopSignal::new(),
            None,
        )
        .await
        .unwrap();

        assert_eq!(stats.new_mappings, 1);
        assert_eq!(cache.lookup(Platform::Imdb, "tt5"), Some("5"));
    }
}
