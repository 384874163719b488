//! cinesync - keeps a user's Douban and IMDb movie ratings in step.
//!
//! This library harvests rating histories incrementally, joins the two
//! datasets into one record per movie and writes the ratings missing on one
//! side through the other platform's rating endpoint.
//!
//! # Features
//!
//! - `douban` - Douban client ([`douban::DoubanClient`]), also the id resolver
//! - `imdb` - IMDb GraphQL client ([`imdb::ImdbClient`])
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use cinesync::{DataLayout, Engine, Platform, SyncDirection};
//! use cinesync::douban::DoubanClient;
//! use cinesync::imdb::ImdbClient;
//!
//! let douban = Arc::new(DoubanClient::new("alice", &douban_cookie)?);
//! let imdb = Arc::new(ImdbClient::new("ur1234567", &imdb_cookie)?);
//! let engine = Engine::new(DataLayout::new(dir, "alice", "ur1234567"), douban.clone(), imdb, douban);
//!
//! engine.fetch_incremental(Platform::Douban, None).await?;
//! engine.fetch_incremental(Platform::Imdb, None).await?;
//! let report = engine.sync(SyncDirection::DoubanToImdb, false, None, None).await?;
//! ```

pub mod entity;
pub mod fetch;
pub mod http;
pub mod platform;
pub mod reconcile;
pub mod retry;
pub mod store;
pub mod sync;

#[cfg(feature = "douban")]
pub mod douban;

#[cfg(feature = "imdb")]
pub mod imdb;

pub use entity::prelude::*;
pub use fetch::{FetchOptions, FetchOutcome, IncrementalFetcher};
pub use platform::{
    ApiRateLimiter, CrossIdResolver, PlatformError, RateLimitedClient, RatingPlatform, rate_limits,
};
pub use store::{DataLayout, DatasetStore, FailureLedger, IdentityCache, StoreError};
pub use sync::{Engine, EngineError, EngineOptions, SyncProgress, SyncRunReport};
