use std::path::PathBuf;
use std::sync::Arc;

use cinesync::douban::DoubanClient;
use cinesync::imdb::ImdbClient;
use cinesync::sync::StopSignal;
use cinesync::{
    CrossIdResolver, DataLayout, Engine, EngineError, Platform, RateLimitedClient, RatingPlatform,
    SyncDirection,
};

use crate::config::Config;

/// Build the engine from the configured accounts.
///
/// Each client is wrapped in a [`RateLimitedClient`] unless limiting is
/// disabled. The Douban client also resolves cross ids in both directions.
pub(crate) fn build_engine(
    config: &Config,
    stop: StopSignal,
) -> Result<Engine, Box<dyn std::error::Error>> {
    let data_dir = data_dir(config)?;
    let (douban_user, douban_cookie) = config.credentials(Platform::Douban)?;
    let (imdb_user, imdb_cookie) = config.credentials(Platform::Imdb)?;

    let douban = DoubanClient::new(douban_user, douban_cookie)?;
    let imdb = ImdbClient::new(imdb_user, imdb_cookie)?;

    let (douban, resolver): (Arc<dyn RatingPlatform>, Arc<dyn CrossIdResolver>) =
        match config.requests_per_second(Platform::Douban) {
            Some(rps) => {
                let client = Arc::new(RateLimitedClient::new(douban, rps));
                (client.clone(), client)
            }
            None => {
                let client = Arc::new(douban);
                (client.clone(), client)
            }
        };
    let imdb: Arc<dyn RatingPlatform> = match config.requests_per_second(Platform::Imdb) {
        Some(rps) => Arc::new(RateLimitedClient::new(imdb, rps)),
        None => Arc::new(imdb),
    };

    tracing::debug!(dir = %data_dir.display(), "Using data directory");
    let layout = DataLayout::new(data_dir, douban_user, imdb_user);
    Ok(Engine::new(layout, douban, imdb, resolver)
        .with_options(config.engine_options())
        .with_stop_signal(stop))
}

/// Resolve and create the data directory.
pub(crate) fn data_dir(config: &Config) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let dir = config
        .data_dir()
        .ok_or("Could not determine a data directory; set [data] dir or CINESYNC_DATA_DIR")?;

    if dir.is_relative() && !dir.as_os_str().is_empty() {
        tracing::warn!(
            "Data directory '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            dir.display()
        );
    }
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Direction from `source` to `target`, refusing identical platforms.
pub(crate) fn direction(source: Platform, target: Platform) -> Result<SyncDirection, EngineError> {
    SyncDirection::between(source, target).ok_or(EngineError::SameDirection(source))
}
