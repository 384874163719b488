//! Configuration file support for cinesync.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `CINESYNC_`, e.g., `CINESYNC_DOUBAN_COOKIE`)
//! 3. Config file (./cinesync.toml, then ~/.config/cinesync/config.toml)
//! 4. Built-in defaults
//!
//! The data directory defaults to `~/.local/state/cinesync` on Linux (using
//! the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [data]
//! dir = "/home/alice/.local/state/cinesync"  # optional, this is the default
//!
//! [douban]
//! user_id = "alice"
//! cookie = "bid=...; ck=...; dbcl2=..."  # or use CINESYNC_DOUBAN_COOKIE env var
//!
//! [imdb]
//! user_id = "ur12345678"
//! cookie = "at-main=...; ubid-main=..."  # or use CINESYNC_IMDB_COOKIE env var
//!
//! [sync]
//! concurrency = 4
//! min_write_delay_ms = 1000
//! max_write_delay_ms = 3000
//! ```

use std::path::PathBuf;
use std::time::Duration;

use cinesync::retry::RetryConfig;
use cinesync::sync::{
    DEFAULT_MAX_WRITE_DELAY_MS, DEFAULT_MIN_WRITE_DELAY_MS, DEFAULT_RESOLVE_CONCURRENCY,
};
use cinesync::{EngineOptions, FetchOptions, Platform, platform::Jitter};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

/// Environment variables and the config keys they set.
const ENV_KEYS: [(&str, &str); 10] = [
    ("CINESYNC_DATA_DIR", "data.dir"),
    ("CINESYNC_DOUBAN_USER_ID", "douban.user_id"),
    ("CINESYNC_DOUBAN_COOKIE", "douban.cookie"),
    ("CINESYNC_IMDB_USER_ID", "imdb.user_id"),
    ("CINESYNC_IMDB_COOKIE", "imdb.cookie"),
    ("CINESYNC_SYNC_CONCURRENCY", "sync.concurrency"),
    ("CINESYNC_SYNC_REQUESTS_PER_SECOND", "sync.requests_per_second"),
    ("CINESYNC_SYNC_MIN_WRITE_DELAY_MS", "sync.min_write_delay_ms"),
    ("CINESYNC_SYNC_MAX_WRITE_DELAY_MS", "sync.max_write_delay_ms"),
    ("CINESYNC_SYNC_PAGE_SIZE", "sync.page_size"),
];

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where datasets, the identity map and the failure ledger live.
    pub data: DataConfig,
    pub douban: AccountConfig,
    pub imdb: AccountConfig,
    /// Default sync options.
    pub sync: SyncConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Defaults to the XDG state directory if not specified.
    pub dir: Option<PathBuf>,
}

/// Account on one platform.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Douban user name or IMDb `ur...` id.
    pub user_id: Option<String>,
    /// Raw `Cookie` header of a logged-in browser session.
    pub cookie: Option<String>,
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Concurrent cross-id lookups during a fetch.
    pub concurrency: usize,
    /// Override the per-platform request rate. `0` disables proactive limiting.
    pub requests_per_second: Option<u32>,
    pub min_write_delay_ms: u64,
    pub max_write_delay_ms: u64,
    /// Override the listing page size of both platforms.
    pub page_size: Option<usize>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_RESOLVE_CONCURRENCY,
            requests_per_second: None,
            min_write_delay_ms: DEFAULT_MIN_WRITE_DELAY_MS,
            max_write_delay_ms: DEFAULT_MAX_WRITE_DELAY_MS,
            page_size: None,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/cinesync/config.toml)
    /// 3. Local config file (./cinesync.toml)
    /// 4. Environment variables with CINESYNC_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(proj_dirs) = ProjectDirs::from("", "", "cinesync") {
            let xdg_config = proj_dirs.config_dir().join("config.toml");
            if xdg_config.exists() {
                tracing::debug!("Loading config from {:?}", xdg_config);
                builder = builder.add_source(
                    File::from(xdg_config)
                        .format(FileFormat::Toml)
                        .required(false),
                );
            }
        }

        let local_config = PathBuf::from("cinesync.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./cinesync.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // Nested form: CINESYNC_SYNC__PAGE_SIZE -> sync.page_size
        builder = builder.add_source(
            Environment::with_prefix("CINESYNC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // Flat form for the documented names, whose keys contain underscores
        for (var, key) in ENV_KEYS {
            if let Ok(value) = std::env::var(var) {
                builder = match builder.set_override(key, value) {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!("Ignoring {}: {}", var, e);
                        return Config::default();
                    }
                };
            }
        }

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the data directory, falling back to the default state directory.
    pub fn data_dir(&self) -> Option<PathBuf> {
        self.data.dir.clone().or_else(Self::default_state_dir)
    }

    pub fn account(&self, platform: Platform) -> &AccountConfig {
        match platform {
            Platform::Douban => &self.douban,
            Platform::Imdb => &self.imdb,
        }
    }

    /// User id and cookie for `platform`, or a message naming what is missing.
    pub fn credentials(&self, platform: Platform) -> Result<(&str, &str), String> {
        let account = self.account(platform);
        let env = match platform {
            Platform::Douban => "DOUBAN",
            Platform::Imdb => "IMDB",
        };
        let user_id = account
            .user_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                format!(
                    "No {} user id configured. Set [{}] user_id or CINESYNC_{}_USER_ID.",
                    platform.display_name(),
                    platform,
                    env
                )
            })?;
        let cookie = account
            .cookie
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                format!(
                    "No {} cookie configured. Set [{}] cookie or CINESYNC_{}_COOKIE.",
                    platform.display_name(),
                    platform,
                    env
                )
            })?;
        Ok((user_id, cookie))
    }

    /// Request rate for `platform`; `None` disables proactive limiting.
    pub fn requests_per_second(&self, platform: Platform) -> Option<u32> {
        match self.sync.requests_per_second {
            Some(0) => None,
            Some(rps) => Some(rps),
            None => Some(cinesync::platform::default_rps_for_platform(platform)),
        }
    }

    /// Engine tunables derived from the `[sync]` section.
    pub fn engine_options(&self) -> EngineOptions {
        let min = self.sync.min_write_delay_ms;
        let max = self.sync.max_write_delay_ms.max(min);
        EngineOptions {
            fetch: FetchOptions {
                page_size: self.sync.page_size.filter(|n| *n > 0),
                concurrency: self.sync.concurrency.max(1),
                retry: RetryConfig::default(),
                max_pages: None,
            },
            write_delay: Jitter::new(Duration::from_millis(min), Duration::from_millis(max)),
            write_rps: None,
        }
    }

    /// Get the default config file path.
    #[allow(dead_code)]
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cinesync").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/cinesync` or `~/.local/state/cinesync`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cinesync").map(|dirs| {
            // state_dir() returns None on macOS/Windows, fall back to data_dir
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml_content: &str) -> Config {
        let settings = ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml))
            .build()
            .unwrap();
        settings.try_deserialize().unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.data.dir.is_none());
        assert!(config.douban.user_id.is_none());
        assert!(config.imdb.cookie.is_none());
        assert_eq!(config.sync.concurrency, DEFAULT_RESOLVE_CONCURRENCY);
        assert_eq!(config.sync.min_write_delay_ms, DEFAULT_MIN_WRITE_DELAY_MS);
        assert_eq!(config.sync.max_write_delay_ms, DEFAULT_MAX_WRITE_DELAY_MS);
        assert!(config.sync.page_size.is_none());
    }

    #[test]
    fn test_config_builder_partial_override() {
        let config = from_toml(
            r#"
            [sync]
            concurrency = 8
        "#,
        );

        assert_eq!(config.sync.concurrency, 8);
        // Other values should be defaults
        assert_eq!(config.sync.min_write_delay_ms, DEFAULT_MIN_WRITE_DELAY_MS);
        assert!(config.sync.requests_per_second.is_none());
    }

    #[test]
    fn test_full_config_parsing() {
        let config = from_toml(
            r#"
            [data]
            dir = "/tmp/cinesync"

            [douban]
            user_id = "alice"
            cookie = "ck=abcd; dbcl2=x"

            [imdb]
            user_id = "ur1234567"
            cookie = "at-main=y"

            [sync]
            concurrency = 2
            requests_per_second = 5
            min_write_delay_ms = 10
            max_write_delay_ms = 20
            page_size = 25
        "#,
        );

        assert_eq!(config.data_dir(), Some(PathBuf::from("/tmp/cinesync")));
        assert_eq!(
            config.credentials(Platform::Douban).unwrap(),
            ("alice", "ck=abcd; dbcl2=x")
        );
        assert_eq!(
            config.credentials(Platform::Imdb).unwrap(),
            ("ur1234567", "at-main=y")
        );
        assert_eq!(config.requests_per_second(Platform::Douban), Some(5));
        assert_eq!(config.sync.page_size, Some(25));

        let options = config.engine_options();
        assert_eq!(options.fetch.concurrency, 2);
        assert_eq!(options.fetch.page_size, Some(25));
        assert_eq!(options.write_delay.min(), Duration::from_millis(10));
        assert_eq!(options.write_delay.max(), Duration::from_millis(20));
    }

    #[test]
    fn test_missing_credentials_name_the_variable() {
        let config = from_toml(
            r#"
            [douban]
            user_id = "alice"
        "#,
        );

        let err = config.credentials(Platform::Douban).unwrap_err();
        assert!(err.contains("CINESYNC_DOUBAN_COOKIE"));
        let err = config.credentials(Platform::Imdb).unwrap_err();
        assert!(err.contains("CINESYNC_IMDB_USER_ID"));
    }

    #[test]
    fn test_blank_credentials_count_as_missing() {
        let config = from_toml(
            r#"
            [imdb]
            user_id = "  "
            cookie = "x"
        "#,
        );
        assert!(config.credentials(Platform::Imdb).is_err());
    }

    #[test]
    fn test_requests_per_second_defaults_per_platform() {
        let config = Config::default();
        assert_eq!(
            config.requests_per_second(Platform::Douban),
            Some(cinesync::rate_limits::DOUBAN_DEFAULT_RPS)
        );
        assert_eq!(
            config.requests_per_second(Platform::Imdb),
            Some(cinesync::rate_limits::IMDB_DEFAULT_RPS)
        );
    }

    #[test]
    fn test_zero_requests_per_second_disables_limiting() {
        let config = from_toml(
            r#"
            [sync]
            requests_per_second = 0
        "#,
        );
        assert_eq!(config.requests_per_second(Platform::Imdb), None);
    }

    #[test]
    fn test_inverted_write_delay_is_clamped() {
        let config = from_toml(
            r#"
            [sync]
            min_write_delay_ms = 500
            max_write_delay_ms = 100
        "#,
        );
        let options = config.engine_options();
        assert_eq!(options.write_delay.min(), Duration::from_millis(500));
        assert_eq!(options.write_delay.max(), Duration::from_millis(500));
    }

    #[test]
    fn test_data_dir_defaults_to_state_dir() {
        let config = Config::default();
        assert_eq!(config.data_dir(), Config::default_state_dir());
    }
}
