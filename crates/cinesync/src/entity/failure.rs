//! Records of sync attempts that must not be retried.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::merged::MergedMovie;
use super::platform::SyncDirection;

/// Why an item ended up in the failure ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The target id or the converted rating was missing.
    Incomplete,
    /// The target platform refused the write.
    Rejected { message: String },
}

/// Deduplication key of the failure ledger.
///
/// Built from descriptive fields rather than ids, so two distinct movies
/// sharing title, dates and ratings collide.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FailureKey {
    pub title: String,
    pub date_rated_douban: Option<NaiveDate>,
    pub date_rated_imdb: Option<NaiveDate>,
    pub rating_douban: Option<u8>,
    pub rating_imdb: Option<u8>,
}

impl FailureKey {
    #[must_use]
    pub fn of(movie: &MergedMovie) -> Self {
        Self {
            title: movie.title.clone(),
            date_rated_douban: movie.date_rated_douban,
            date_rated_imdb: movie.date_rated_imdb,
            rating_douban: movie.rating_douban,
            rating_imdb: movie.rating_imdb,
        }
    }
}

/// One failed sync attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub title: String,
    pub date_rated_douban: Option<NaiveDate>,
    pub date_rated_imdb: Option<NaiveDate>,
    pub rating_douban: Option<u8>,
    pub rating_imdb: Option<u8>,
    pub douban_id: Option<String>,
    pub imdb_id: Option<String>,
    pub direction: SyncDirection,
    pub reason: FailureReason,
    pub failed_at: DateTime<Utc>,
}

impl FailureRecord {
    #[must_use]
    pub fn new(
        movie: &MergedMovie,
        direction: SyncDirection,
        reason: FailureReason,
        failed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: movie.title.clone(),
            date_rated_douban: movie.date_rated_douban,
            date_rated_imdb: movie.date_rated_imdb,
            rating_douban: movie.rating_douban,
            rating_imdb: movie.rating_imdb,
            douban_id: movie.douban_id.clone(),
            imdb_id: movie.imdb_id.clone(),
            direction,
            reason,
            failed_at,
        }
    }

    #[must_use]
    pub fn key(&self) -> FailureKey {
        FailureKey {
            title: self.title.clone(),
            date_rated_douban: self.date_rated_douban,
            date_rated_imdb: self.date_rated_imdb,
            rating_douban: self.rating_douban,
            rating_imdb: self.rating_imdb,
        }
    }

    /// Ids carried by this record, for the id-based exclusion set.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.douban_id
            .as_deref()
            .into_iter()
            .chain(self.imdb_id.as_deref())
    }
}
