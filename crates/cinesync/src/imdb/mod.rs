//! IMDb client over the GraphQL API used by imdb.com.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for IMDb operations
//! - [`types`] - GraphQL payloads and their conversion to records
//! - [`client`] - The client and its [`RatingPlatform`](crate::platform::RatingPlatform) implementation
//!
//! IMDb cannot answer Douban ids, so cross ids for both platforms are resolved
//! through [`DoubanClient`](crate::douban::DoubanClient).

mod client;
mod error;
mod types;

pub use client::{GRAPHQL_URL, ImdbClient, PAGE_SIZE};
pub use error::ImdbError;
pub use types::{RatingNode, UserRatingsConnection};
