use async_trait::async_trait;

use crate::entity::movie::MovieRecord;
use crate::entity::platform::Platform;

use super::errors::Result;

/// A movie as it appears on a listing page.
///
/// The local id and the platform's own fields are filled; the cross-platform
/// id is filled only when the listing itself carries it.
pub type ListedMovie = MovieRecord;

/// One page of a user's rating history, most recent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub items: Vec<ListedMovie>,
    /// Whether the platform reports further pages.
    pub has_more: bool,
    /// Total number of rated items, when the platform reports it.
    pub total: Option<usize>,
}

pub use crate::sync::ProgressCallback;

/// A platform holding a user's movie ratings.
///
/// Implementations own their credentials; callers never pass cookies or
/// tokens through this interface.
#[async_trait]
pub trait RatingPlatform: Send + Sync {
    /// Which platform this client talks to.
    fn platform(&self) -> Platform;

    /// Natural listing page size for this platform.
    fn page_size(&self) -> usize {
        crate::sync::DEFAULT_PAGE_SIZE
    }

    /// Fetch one listing page at `offset`, most recent ratings first.
    async fn list_page(&self, offset: usize, page_size: usize) -> Result<ListingPage>;

    /// Write `rating` (native scale) for `item_id`.
    async fn write_rating(&self, item_id: &str, rating: u8) -> Result<()>;

    /// Check that the stored credentials are accepted.
    async fn validate_credentials(&self) -> Result<bool>;
}

/// Maps an id on one platform to the same movie's id on the other.
#[async_trait]
pub trait CrossIdResolver: Send + Sync {
    /// Resolve `local_id` (an id on `platform`) to the other platform's id.
    ///
    /// `Ok(None)` means the platform answered but has no mapping.
    async fn resolve_cross_id(&self, platform: Platform, local_id: &str) -> Result<Option<String>>;
}
