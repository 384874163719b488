//! Douban client for listing, resolving and writing movie ratings.
//!
//! Douban has no public API for user ratings; the client drives the mobile
//! rexxar endpoints and the desktop rating form with the user's browser
//! session cookie.
//!
//! # Module Structure
//!
//! - [`error`] - Error types for Douban operations
//! - [`types`] - Response payloads and their conversion to records
//! - [`client`] - The client and its platform trait implementations
//!
//! ```ignore
//! use cinesync::douban::DoubanClient;
//!
//! let client = DoubanClient::new("alice", &cookie)?;
//! let page = client.list_interests(0, 50).await?;
//! println!("{} rated movies", page.total.unwrap_or_default());
//! ```

mod client;
mod error;
mod types;

pub use client::{
    DoubanClient, MOVIE_BASE, PAGE_SIZE, REXXAR_BASE, ck_from_cookie, extract_imdb_id,
};
pub use error::{DoubanError, short_error_message};
pub use types::{Interest, InterestsPage, SearchResponse};
