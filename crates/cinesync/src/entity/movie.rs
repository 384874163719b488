//! A rated movie as stored in one platform's dataset.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// One rated movie from a single platform's listing.
///
/// The record's local id is the id of the platform whose dataset holds it;
/// the other id is the resolved cross-platform id and may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovieRecord {
    pub douban_id: Option<String>,
    pub imdb_id: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    /// User rating on the platform's native scale. Never `Some(0)`.
    pub rating: Option<u8>,
    pub date_rated: Option<NaiveDate>,
    pub directors: Vec<String>,
    pub actors: Vec<String>,
    pub genres: Vec<String>,
    pub cover_url: Option<String>,
    pub url: Option<String>,
    pub comment: Option<String>,
    /// Platform-wide average rating.
    pub public_rating: Option<f32>,
    pub votes: Option<u64>,
    pub runtime_minutes: Option<u32>,
    pub title_type: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub country: Option<String>,
}

impl MovieRecord {
    /// The id of `platform` carried by this record.
    #[must_use]
    pub fn id_for(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Douban => self.douban_id.as_deref(),
            Platform::Imdb => self.imdb_id.as_deref(),
        }
    }

    /// Set the id of `platform`.
    pub fn set_id(&mut self, platform: Platform, id: Option<String>) {
        match platform {
            Platform::Douban => self.douban_id = id,
            Platform::Imdb => self.imdb_id = id,
        }
    }

    /// Normalise a listed rating: zero means unrated.
    #[inline]
    #[must_use]
    pub fn normalize_rating(value: Option<u8>) -> Option<u8> {
        value.filter(|r| *r > 0)
    }

    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.douban_id.clone(), self.imdb_id.clone())
    }
}

/// Address of a merged movie: the pair of platform ids, either of which may be absent.
///
/// Ordered by Douban id first, then IMDb id, with `None` sorting first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub douban_id: Option<String>,
    pub imdb_id: Option<String>,
}

impl ItemKey {
    pub fn new(douban_id: Option<String>, imdb_id: Option<String>) -> Self {
        Self { douban_id, imdb_id }
    }
}

impl std::fmt::Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "douban:{}/imdb:{}",
            self.douban_id.as_deref().unwrap_or("-"),
            self.imdb_id.as_deref().unwrap_or("-")
        )
    }
}
