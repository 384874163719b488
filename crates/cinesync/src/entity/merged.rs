//! The canonical per-movie record produced by reconciliation.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::movie::ItemKey;
use super::platform::Platform;

/// One movie after joining the Douban and IMDb datasets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergedMovie {
    pub douban_id: Option<String>,
    pub imdb_id: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub directors: Vec<String>,
    pub actors: Vec<String>,
    pub genres: Vec<String>,
    pub cover_url: Option<String>,
    pub country: Option<String>,
    pub rating_douban: Option<u8>,
    pub rating_imdb: Option<u8>,
    pub date_rated_douban: Option<NaiveDate>,
    pub date_rated_imdb: Option<NaiveDate>,
    /// Earliest of the two rating dates.
    pub date_rated_first: Option<NaiveDate>,
    pub url_douban: Option<String>,
    pub url_imdb: Option<String>,
    pub comment: Option<String>,
    pub public_rating_douban: Option<f32>,
    pub public_rating_imdb: Option<f32>,
    pub votes_imdb: Option<u64>,
    pub runtime_minutes: Option<u32>,
    pub title_type: Option<String>,
    pub release_date: Option<NaiveDate>,
}

impl MergedMovie {
    #[must_use]
    pub fn key(&self) -> ItemKey {
        ItemKey::new(self.douban_id.clone(), self.imdb_id.clone())
    }

    #[must_use]
    pub fn id(&self, platform: Platform) -> Option<&str> {
        match platform {
            Platform::Douban => self.douban_id.as_deref(),
            Platform::Imdb => self.imdb_id.as_deref(),
        }
    }

    /// Rating on `platform`, with zero treated as unrated.
    #[must_use]
    pub fn rating(&self, platform: Platform) -> Option<u8> {
        let value = match platform {
            Platform::Douban => self.rating_douban,
            Platform::Imdb => self.rating_imdb,
        };
        value.filter(|r| *r > 0)
    }

    #[must_use]
    pub fn date_rated(&self, platform: Platform) -> Option<NaiveDate> {
        match platform {
            Platform::Douban => self.date_rated_douban,
            Platform::Imdb => self.date_rated_imdb,
        }
    }

    #[must_use]
    pub fn is_rated_on(&self, platform: Platform) -> bool {
        self.rating(platform).is_some()
    }
}

/// Merged movies keyed by [`ItemKey`], iterated in key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedDataset {
    items: BTreeMap<ItemKey, MergedMovie>,
}

impl MergedDataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless the key is already taken. Returns whether it was inserted.
    pub fn insert_first(&mut self, movie: MergedMovie) -> bool {
        match self.items.entry(movie.key()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(movie);
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, key: &ItemKey) -> Option<&MergedMovie> {
        self.items.get(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ItemKey, &MergedMovie)> {
        self.items.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &MergedMovie> {
        self.items.values()
    }

    /// Number of movies rated on both platforms.
    #[must_use]
    pub fn rated_on_both(&self) -> usize {
        self.values()
            .filter(|m| m.is_rated_on(Platform::Douban) && m.is_rated_on(Platform::Imdb))
            .count()
    }

    pub fn into_values(self) -> impl Iterator<Item = MergedMovie> {
        self.items.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(douban: Option<&str>, imdb: Option<&str>, title: &str) -> MergedMovie {
        MergedMovie {
            douban_id: douban.map(str::to_string),
            imdb_id: imdb.map(str::to_string),
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_first_keeps_first_occurrence() {
        let mut dataset = MergedDataset::new();
        assert!(dataset.insert_first(movie(Some("1"), Some("tt1"), "first")));
        assert!(!dataset.insert_first(movie(Some("1"), Some("tt1"), "second")));
        assert_eq!(dataset.len(), 1);
        let key = ItemKey::new(Some("1".into()), Some("tt1".into()));
        assert_eq!(dataset.get(&key).map(|m| m.title.as_str()), Some("first"));
    }

    #[test]
    fn test_rating_treats_zero_as_unrated() {
        let mut m = movie(Some("1"), None, "x");
        m.rating_douban = Some(0);
        m.rating_imdb = Some(8);
        assert_eq!(m.rating(Platform::Douban), None);
        assert!(!m.is_rated_on(Platform::Douban));
        assert!(m.is_rated_on(Platform::Imdb));
    }

    #[test]
    fn test_iteration_is_key_ordered() {
        let mut dataset = MergedDataset::new();
        dataset.insert_first(movie(Some("2"), None, "b"));
        dataset.insert_first(movie(None, Some("tt9"), "c"));
        dataset.insert_first(movie(Some("1"), None, "a"));
        let titles: Vec<_> = dataset.values().map(|m| m.title.clone()).collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }
}
