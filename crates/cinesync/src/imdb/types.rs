//! IMDb GraphQL payloads and their conversion to [`MovieRecord`].

use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::entity::movie::MovieRecord;

/// GraphQL envelope: `data` and/or `errors`.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GraphQlError {
    pub message: String,
    pub extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GraphQlErrorExtensions {
    pub code: Option<String>,
}

impl GraphQlError {
    /// Whether the error reports a missing or expired session.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        let code = self
            .extensions
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .unwrap_or_default();
        matches!(code, "UNAUTHENTICATED" | "UNAUTHORIZED" | "FORBIDDEN")
            || self.message.to_ascii_lowercase().contains("not authenticated")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRatingsData {
    pub user_ratings: Option<UserRatingsConnection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserRatingsConnection {
    pub total: Option<usize>,
    pub edges: Vec<RatingEdge>,
    pub page_info: PageInfo,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RatingEdge {
    pub node: RatingNode,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RatingNode {
    pub title: Option<Title>,
    pub user_rating: Option<UserRating>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserRating {
    pub value: Option<u8>,
    /// RFC 3339 timestamp.
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Title {
    pub id: Option<String>,
    pub title_text: Option<TextField>,
    pub release_year: Option<ReleaseYear>,
    pub title_type: Option<TextField>,
    pub release_date: Option<PartialDate>,
    pub ratings_summary: Option<RatingsSummary>,
    pub runtime: Option<Runtime>,
    pub title_genres: Option<TitleGenres>,
    pub principal_credits: Vec<CreditCategory>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TextField {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReleaseYear {
    pub year: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PartialDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RatingsSummary {
    pub aggregate_rating: Option<f32>,
    pub vote_count: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Runtime {
    pub seconds: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TitleGenres {
    pub genres: Vec<GenreItem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GenreItem {
    pub genre: TextField,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreditCategory {
    pub category: Option<CategoryId>,
    pub credits: Vec<Credit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CategoryId {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credit {
    pub name: Option<CreditName>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreditName {
    pub name_text: Option<TextField>,
}

fn text(field: Option<&TextField>) -> Option<String> {
    field
        .and_then(|t| t.text.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl RatingNode {
    /// Convert to an IMDb dataset record; `None` when the title has no id.
    #[must_use]
    pub fn to_record(&self) -> Option<MovieRecord> {
        let title = self.title.as_ref()?;
        let id = title.id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;

        let directors = title
            .principal_credits
            .iter()
            .filter(|c| c.category.as_ref().and_then(|k| k.id.as_deref()) == Some("director"))
            .flat_map(|c| &c.credits)
            .filter_map(|c| text(c.name.as_ref().and_then(|n| n.name_text.as_ref())))
            .collect();

        let release_date = title.release_date.as_ref().and_then(|d| match d {
            PartialDate {
                year: Some(y),
                month: Some(m),
                day: Some(dd),
            } => NaiveDate::from_ymd_opt(*y, *m, *dd),
            _ => None,
        });

        let user_rating = self.user_rating.as_ref();
        Some(MovieRecord {
            douban_id: None,
            imdb_id: Some(id.to_string()),
            title: text(title.title_text.as_ref()).unwrap_or_default(),
            year: title.release_year.as_ref().and_then(|y| y.year),
            rating: MovieRecord::normalize_rating(user_rating.and_then(|r| r.value)),
            date_rated: user_rating
                .and_then(|r| r.date.as_deref())
                .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
                .map(|d| d.naive_utc().date()),
            directors,
            actors: Vec::new(),
            genres: title
                .title_genres
                .as_ref()
                .map(|g| g.genres.iter().filter_map(|g| text(Some(&g.genre))).collect())
                .unwrap_or_default(),
            cover_url: None,
            url: Some(format!("https://www.imdb.com/title/{id}/")),
            comment: None,
            public_rating: title.ratings_summary.as_ref().and_then(|r| r.aggregate_rating),
            votes: title.ratings_summary.as_ref().and_then(|r| r.vote_count),
            runtime_minutes: title
                .runtime
                .as_ref()
                .and_then(|r| r.seconds)
                .map(|s| s / 60)
                .filter(|m| *m > 0),
            title_type: text(title.title_type.as_ref()),
            release_date,
            country: None,
        })
    }
}

/// Data of the `rateTitle` mutation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateTitleData {
    pub rate_title: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"{
        "data": {"userRatings": {
            "total": 2,
            "edges": [
                {"node": {
                    "title": {
                        "id": "tt0111161",
                        "titleText": {"text": "The Shawshank Redemption"},
                        "releaseYear": {"year": 1994},
                        "titleType": {"text": "Movie"},
                        "releaseDate": {"year": 1994, "month": 10, "day": 14},
                        "ratingsSummary": {"aggregateRating": 9.3, "voteCount": 3000000},
                        "runtime": {"seconds": 8520},
                        "titleGenres": {"genres": [{"genre": {"text": "Drama"}}]},
                        "principalCredits": [
                            {"category": {"id": "director"}, "credits": [{"name": {"nameText": {"text": "Frank Darabont"}}}]},
                            {"category": {"id": "cast"}, "credits": [{"name": {"nameText": {"text": "Tim Robbins"}}}]}
                        ]
                    },
                    "userRating": {"value": 9, "date": "2024-01-02T23:30:00Z"}
                }},
                {"node": {"title": {"id": "tt0068646"}, "userRating": null}}
            ],
            "pageInfo": {"hasNextPage": true, "endCursor": "c1"}
        }}
    }"#;

    #[test]
    fn test_node_to_record() {
        let response: GraphQlResponse<UserRatingsData> = serde_json::from_str(PAGE).unwrap();
        assert!(response.errors.is_empty());
        let connection = response.data.unwrap().user_ratings.unwrap();
        assert!(connection.page_info.has_next_page);
        assert_eq!(connection.page_info.end_cursor.as_deref(), Some("c1"));

        let first = connection.edges[0].node.to_record().unwrap();
        assert_eq!(first.imdb_id.as_deref(), Some("tt0111161"));
        assert_eq!(first.title, "The Shawshank Redemption");
        assert_eq!(first.rating, Some(9));
        assert_eq!(first.date_rated, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(first.directors, vec!["Frank Darabont"]);
        assert_eq!(first.genres, vec!["Drama"]);
        assert_eq!(first.runtime_minutes, Some(142));
        assert_eq!(first.release_date, NaiveDate::from_ymd_opt(1994, 10, 14));
        assert_eq!(first.url.as_deref(), Some("https://www.imdb.com/title/tt0111161/"));

        let second = connection.edges[1].node.to_record().unwrap();
        assert_eq!(second.rating, None);
        assert_eq!(second.date_rated, None);
        assert_eq!(second.title, "");
    }

    #[test]
    fn test_auth_error_detection() {
        let response: GraphQlResponse<UserRatingsData> = serde_json::from_str(
            r#"{"data": null, "errors": [{"message": "nope", "extensions": {"code": "UNAUTHENTICATED"}}]}"#,
        )
        .unwrap();
        assert!(response.errors[0].is_auth());
        assert!(!GraphQlError {
            message: "Bad input".into(),
            extensions: None
        }
        .is_auth());
    }
}
