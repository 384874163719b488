//! Platform and sync-direction enums.
//!
//! Douban rates on a 1–5 star scale, IMDb on 1–10.

use serde::{Deserialize, Serialize};

/// Supported rating platforms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Douban (numeric subject ids, 1–5 stars).
    Douban,
    /// IMDb (`tt` title ids, 1–10).
    Imdb,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::Douban, Platform::Imdb];

    /// The platform on the other side of a sync.
    #[inline]
    #[must_use]
    pub fn other(self) -> Platform {
        match self {
            Platform::Douban => Platform::Imdb,
            Platform::Imdb => Platform::Douban,
        }
    }

    /// Human-facing name.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Douban => "Douban",
            Platform::Imdb => "IMDb",
        }
    }

    /// Highest rating value on the native scale.
    #[must_use]
    pub fn max_rating(self) -> u8 {
        match self {
            Platform::Douban => 5,
            Platform::Imdb => 10,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Douban => write!(f, "douban"),
            Platform::Imdb => write!(f, "imdb"),
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "douban" => Ok(Platform::Douban),
            "imdb" => Ok(Platform::Imdb),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

/// Direction of a one-way rating sync.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    DoubanToImdb,
    ImdbToDouban,
}

impl SyncDirection {
    /// Direction from `source` to `target`, or `None` when they are the same platform.
    #[must_use]
    pub fn between(source: Platform, target: Platform) -> Option<Self> {
        match (source, target) {
            (Platform::Douban, Platform::Imdb) => Some(SyncDirection::DoubanToImdb),
            (Platform::Imdb, Platform::Douban) => Some(SyncDirection::ImdbToDouban),
            _ => None,
        }
    }

    /// Direction whose source is `source`.
    #[must_use]
    pub fn from_source(source: Platform) -> Self {
        match source {
            Platform::Douban => SyncDirection::DoubanToImdb,
            Platform::Imdb => SyncDirection::ImdbToDouban,
        }
    }

    #[must_use]
    pub fn source(self) -> Platform {
        match self {
            SyncDirection::DoubanToImdb => Platform::Douban,
            SyncDirection::ImdbToDouban => Platform::Imdb,
        }
    }

    #[must_use]
    pub fn target(self) -> Platform {
        self.source().other()
    }

    /// Convert a source-scale rating into the target scale.
    ///
    /// Douban stars double into IMDb points; IMDb points pass through unchanged
    /// (values above 5 are left for Douban to reject). Returns `None` for a
    /// zero result.
    #[must_use]
    pub fn convert_rating(self, rating: u8) -> Option<u8> {
        let converted = match self {
            SyncDirection::DoubanToImdb => rating.checked_mul(2)?,
            SyncDirection::ImdbToDouban => rating,
        };
        (converted > 0).then_some(converted)
    }
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source(), self.target())
    }
}

impl std::str::FromStr for SyncDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "douban-to-imdb" => Ok(SyncDirection::DoubanToImdb),
            "imdb-to-douban" => Ok(SyncDirection::ImdbToDouban),
            _ => Err(format!("Unknown sync direction: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_display_and_parse() {
        assert_eq!(Platform::Douban.to_string(), "douban");
        assert_eq!(Platform::Imdb.to_string(), "imdb");
        assert_eq!("IMDb".parse::<Platform>().unwrap(), Platform::Imdb);
        assert_eq!("douban".parse::<Platform>().unwrap(), Platform::Douban);
        assert!("letterboxd".parse::<Platform>().is_err());
    }

    #[test]
    fn test_platform_other_and_scale() {
        assert_eq!(Platform::Douban.other(), Platform::Imdb);
        assert_eq!(Platform::Imdb.other(), Platform::Douban);
        assert_eq!(Platform::Douban.max_rating(), 5);
        assert_eq!(Platform::Imdb.max_rating(), 10);
    }

    #[test]
    fn test_direction_between() {
        assert_eq!(
            SyncDirection::between(Platform::Douban, Platform::Imdb),
            Some(SyncDirection::DoubanToImdb)
        );
        assert_eq!(
            SyncDirection::between(Platform::Imdb, Platform::Douban),
            Some(SyncDirection::ImdbToDouban)
        );
        assert_eq!(SyncDirection::between(Platform::Imdb, Platform::Imdb), None);
    }

    #[test]
    fn test_direction_endpoints() {
        assert_eq!(SyncDirection::DoubanToImdb.source(), Platform::Douban);
        assert_eq!(SyncDirection::DoubanToImdb.target(), Platform::Imdb);
        assert_eq!(
            SyncDirection::from_source(Platform::Imdb),
            SyncDirection::ImdbToDouban
        );
    }

    #[test]
    fn test_convert_rating_doubles_douban_stars() {
        for r in 1..=5u8 {
            assert_eq!(SyncDirection::DoubanToImdb.convert_rating(r), Some(r * 2));
        }
    }

    #[test]
    fn test_convert_rating_passes_imdb_points_through() {
        for r in 1..=5u8 {
            assert_eq!(SyncDirection::ImdbToDouban.convert_rating(r), Some(r));
        }
        assert_eq!(SyncDirection::ImdbToDouban.convert_rating(9), Some(9));
    }

    #[test]
    fn test_convert_rating_zero_is_none() {
        assert_eq!(SyncDirection::DoubanToImdb.convert_rating(0), None);
        assert_eq!(SyncDirection::ImdbToDouban.convert_rating(0), None);
        assert_eq!(SyncDirection::DoubanToImdb.convert_rating(200), None);
    }

    #[test]
    fn test_direction_parse_and_display() {
        assert_eq!(
            "douban-to-imdb".parse::<SyncDirection>().unwrap(),
            SyncDirection::DoubanToImdb
        );
        assert_eq!(
            "imdb_to_douban".parse::<SyncDirection>().unwrap(),
            SyncDirection::ImdbToDouban
        );
        assert_eq!(SyncDirection::DoubanToImdb.to_string(), "douban -> imdb");
    }

    #[test]
    fn test_direction_serde_uses_snake_case() {
        let json = serde_json::to_string(&SyncDirection::ImdbToDouban).unwrap();
        assert_eq!(json, "\"imdb_to_douban\"");
    }
}
