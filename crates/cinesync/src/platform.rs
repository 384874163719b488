//! Platform-agnostic traits for rating platform clients.
//!
//! [`RatingPlatform`] covers listing, writing and credential checks;
//! [`CrossIdResolver`] maps ids between the two platforms.
//!
//! ```ignore
//! use cinesync::platform::{RatingPlatform, PlatformError};
//!
//! async fn newest<C: RatingPlatform>(client: &C) -> Result<(), PlatformError> {
//!     let page = client.list_page(0, client.page_size()).await?;
//!     for movie in page.items {
//!         println!("{} {:?}", movie.title, movie.rating);
//!     }
//!     Ok(())
//! }
//! ```

mod errors;
mod rate_limit;
mod types;

pub use errors::{PlatformError, Result, short_error_message};
pub use rate_limit::{ApiRateLimiter, Jitter, RateLimitedClient, default_rps_for_platform, rate_limits};
pub use types::{CrossIdResolver, ListedMovie, ListingPage, ProgressCallback, RatingPlatform};

/// Map an HTTP status to the matching [`PlatformError`].
///
/// 401 becomes `AuthRequired`, 404 `NotFound`, 429 `RateLimited`; anything
/// else is an `Api` error carrying the first line of the body.
pub fn error_for_status(status: u16, resource: &str, body: &str) -> PlatformError {
    match status {
        401 => PlatformError::AuthRequired,
        404 => PlatformError::not_found(resource),
        429 => PlatformError::RateLimited { reset_at: None },
        _ => {
            let message = body.lines().next().unwrap_or_default().trim();
            let message = if message.is_empty() {
                format!("HTTP {status}")
            } else {
                message.chars().take(200).collect()
            };
            PlatformError::api(status, message)
        }
    }
}
