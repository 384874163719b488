//! IMDb GraphQL client.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::error::ImdbError;
use super::types::{GraphQlResponse, RateTitleData, UserRatingsConnection, UserRatingsData};
use crate::entity::platform::Platform;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpHeaders, HttpRequest, HttpTransport, headers};
use crate::platform::{self, ListingPage, PlatformError, RatingPlatform};

/// GraphQL endpoint.
pub const GRAPHQL_URL: &str = "https://api.graphql.imdb.com/";

/// Largest page `userRatings` serves.
pub const PAGE_SIZE: usize = 250;

/// Persisted query hash of the `userRatings` operation.
const USER_RATINGS_HASH: &str = "ebf2387fd2ba45d62fc54ed2ffe3940086af52e700a1b3929a099d5fce23330a";

const RATE_TITLE_MUTATION: &str = "mutation UpdateTitleRating($rating: Int!, $titleId: ID!) { \
     rateTitle(input: {rating: $rating, titleId: $titleId}) { rating { value } } }";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/127.0.0.0 Safari/537.36";

/// IMDb client authenticated by a browser session cookie.
///
/// `userRatings` paginates by cursor. The client remembers the cursor that
/// follows each page it served, keyed by the offset of the next page, so
/// offset-based callers work as long as they request pages in order.
pub struct ImdbClient {
    transport: Arc<dyn HttpTransport>,
    user_id: String,
    cookie: String,
    cursors: Mutex<HashMap<usize, String>>,
}

impl ImdbClient {
    /// Create a client over reqwest with a 30 second timeout.
    pub fn new(user_id: &str, cookie: &str) -> Result<Self, ImdbError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| ImdbError::Config(e.to_string()))?;
        Ok(Self::new_with_transport(user_id, cookie, Arc::new(transport)))
    }

    pub fn new_with_transport(
        user_id: &str,
        cookie: &str,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            transport,
            user_id: user_id.trim().to_string(),
            cookie: cookie.trim().to_string(),
            cursors: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn headers(&self) -> HttpHeaders {
        headers(&[
            ("Cookie", self.cookie.as_str()),
            ("User-Agent", USER_AGENT),
            ("Content-Type", "application/json"),
            ("Accept", "application/json"),
            ("Origin", "https://www.imdb.com"),
            ("Referer", "https://www.imdb.com/"),
        ])
    }

    /// POST one GraphQL document and decode `data`.
    async fn post<T: DeserializeOwned>(&self, payload: &Value) -> Result<T, ImdbError> {
        let body = serde_json::to_vec(payload)?;
        tracing::debug!(operation = %payload["operationName"], "IMDb GraphQL request");
        let response = self
            .transport
            .send(HttpRequest::post(GRAPHQL_URL, self.headers(), body))
            .await?;

        if !response.is_success() {
            let text = response.text();
            let message = text.lines().next().unwrap_or_default().trim();
            return Err(ImdbError::Api {
                status: response.status,
                message: if message.is_empty() {
                    format!("HTTP {}", response.status)
                } else {
                    message.chars().take(200).collect()
                },
            });
        }

        let envelope: GraphQlResponse<T> = response.json()?;
        if let Some(first) = envelope.errors.first() {
            if first.is_auth() {
                return Err(ImdbError::Auth(first.message.clone()));
            }
            if envelope.data.is_none() {
                let messages: Vec<&str> =
                    envelope.errors.iter().map(|e| e.message.as_str()).collect();
                return Err(ImdbError::GraphQl(messages.join("; ")));
            }
            tracing::debug!(errors = envelope.errors.len(), "Partial GraphQL errors ignored");
        }
        envelope
            .data
            .ok_or_else(|| ImdbError::GraphQl("response has no data".to_string()))
    }

    /// Fetch one `userRatings` page after `cursor`.
    pub async fn user_ratings(
        &self,
        first: usize,
        cursor: Option<&str>,
    ) -> Result<UserRatingsConnection, ImdbError> {
        let payload = json!({
            "operationName": "userRatings",
            "variables": {"first": first, "after": cursor},
            "extensions": {"persistedQuery": {"version": 1, "sha256Hash": USER_RATINGS_HASH}},
        });
        let data: UserRatingsData = self.post(&payload).await?;
        Ok(data.user_ratings.unwrap_or_default())
    }

    /// Rate `title_id` with `rating` (1–10).
    pub async fn rate_title(&self, title_id: &str, rating: u8) -> Result<(), ImdbError> {
        let payload = json!({
            "operationName": "UpdateTitleRating",
            "query": RATE_TITLE_MUTATION,
            "variables": {"rating": rating, "titleId": title_id},
        });
        let data: RateTitleData = self.post(&payload).await?;
        if data.rate_title.is_none_or(|v| v.is_null()) {
            return Err(ImdbError::GraphQl(format!("rateTitle returned nothing for {title_id}")));
        }
        tracing::debug!(title_id, rating, "IMDb rating saved");
        Ok(())
    }

    fn cursor_for(&self, offset: usize) -> Result<Option<String>, ImdbError> {
        if offset == 0 {
            return Ok(None);
        }
        let cursors = self
            .cursors
            .lock()
            .map_err(|_| ImdbError::Config("cursor table poisoned".to_string()))?;
        cursors
            .get(&offset)
            .cloned()
            .map(Some)
            .ok_or(ImdbError::MissingCursor(offset))
    }

    fn remember_cursor(&self, next_offset: usize, cursor: String) {
        if let Ok(mut cursors) = self.cursors.lock() {
            cursors.insert(next_offset, cursor);
        }
    }
}

#[async_trait]
impl RatingPlatform for ImdbClient {
    fn platform(&self) -> Platform {
        Platform::Imdb
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    async fn list_page(&self, offset: usize, page_size: usize) -> platform::Result<ListingPage> {
        let cursor = self.cursor_for(offset)?;
        let connection = self.user_ratings(page_size, cursor.as_deref()).await?;

        let has_more = connection.page_info.has_next_page;
        if has_more && let Some(end) = connection.page_info.end_cursor.clone() {
            self.remember_cursor(offset + page_size, end);
        }
        let items = connection
            .edges
            .iter()
            .filter_map(|edge| edge.node.to_record())
            .collect();
        Ok(ListingPage {
            items,
            has_more,
            total: connection.total,
        })
    }

    async fn write_rating(&self, item_id: &str, rating: u8) -> platform::Result<()> {
        let max = Platform::Imdb.max_rating();
        if rating == 0 || rating > max {
            return Err(PlatformError::api(
                400,
                format!("rating {rating} is outside 1-{max}"),
            ));
        }
        Ok(self.rate_title(item_id, rating).await?)
    }

    async fn validate_credentials(&self) -> platform::Result<bool> {
        match self.user_ratings(1, None).await {
            Ok(_) => Ok(true),
            Err(ImdbError::Auth(message)) => {
                tracing::debug!(%message, "IMDb session refused");
                Ok(false)
            }
            Err(ImdbError::Api {
                status: 401 | 403, ..
            }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpMethod, MockTransport, response};

    fn client(transport: &MockTransport) -> ImdbClient {
        ImdbClient::new_with_transport("ur1234567", "session=abc", Arc::new(transport.clone()))
    }

    fn page(ids: &[&str], next: Option<&str>) -> String {
        let edges: Vec<Value> = ids
            .iter()
            .map(|id| {
                json!({"node": {
                    "title": {"id": id, "titleText": {"text": format!("title {id}")}},
                    "userRating": {"value": 7, "date": "2024-05-01T10:00:00Z"}
                }})
            })
            .collect();
        json!({"data": {"userRatings": {
            "total": 3,
            "edges": edges,
            "pageInfo": {"hasNextPage": next.is_some(), "endCursor": next}
        }}})
        .to_string()
    }

    fn body_of(request: &HttpRequest) -> Value {
        serde_json::from_slice(&request.body).unwrap()
    }

    #[tokio::test]
    async fn test_offsets_follow_cursors() {
        let transport = MockTransport::new();
        transport.push_response(HttpMethod::Post, GRAPHQL_URL, response(200, page(&["tt1", "tt2"], Some("c2"))));
        transport.push_response(HttpMethod::Post, GRAPHQL_URL, response(200, page(&["tt3"], None)));
        let imdb = client(&transport);

        let first = imdb.list_page(0, 2).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);
        assert_eq!(first.items[0].imdb_id.as_deref(), Some("tt1"));
        assert_eq!(first.items[0].rating, Some(7));

        let second = imdb.list_page(2, 2).await.unwrap();
        assert_eq!(second.items.len(), 1);
        assert!(!second.has_more);

        let requests = transport.requests();
        assert_eq!(body_of(&requests[0])["variables"]["after"], Value::Null);
        assert_eq!(body_of(&requests[1])["variables"]["after"], "c2");
        assert_eq!(body_of(&requests[1])["variables"]["first"], 2);
    }

    #[tokio::test]
    async fn test_unknown_offset_is_an_error() {
        let transport = MockTransport::new();
        let err = client(&transport).list_page(250, 250).await.unwrap_err();
        assert!(matches!(err, PlatformError::Internal { .. }));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_write_rating_sends_mutation() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            GRAPHQL_URL,
            response(200, r#"{"data": {"rateTitle": {"rating": {"value": 8}}}}"#),
        );

        client(&transport).write_rating("tt0111161", 8).await.unwrap();

        let body = body_of(&transport.requests()[0]);
        assert_eq!(body["variables"]["titleId"], "tt0111161");
        assert_eq!(body["variables"]["rating"], 8);
        assert!(body["query"].as_str().unwrap().contains("rateTitle"));
    }

    #[tokio::test]
    async fn test_write_rating_graphql_rejection() {
        let transport = MockTransport::new();
        transport.push_response(
            HttpMethod::Post,
            GRAPHQL_URL,
            response(200, r#"{"data": null, "errors": [{"message": "Title not rateable"}]}"#),
        );

        match client(&transport).write_rating("tt0000001", 6).await.unwrap_err() {
            PlatformError::Api { message, .. } => assert_eq!(message, "Title not rateable"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_write_rating_out_of_scale() {
        let transport = MockTransport::new();
        assert!(client(&transport).write_rating("tt1", 11).await.is_err());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_validate_credentials() {
        let transport = MockTransport::new();
        transport.push_response(HttpMethod::Post, GRAPHQL_URL, response(200, page(&[], None)));
        transport.push_response(
            HttpMethod::Post,
            GRAPHQL_URL,
            response(
                200,
                r#"{"errors": [{"message": "login", "extensions": {"code": "UNAUTHENTICATED"}}]}"#,
            ),
        );
        transport.push_response(HttpMethod::Post, GRAPHQL_URL, response(403, "Forbidden"));
        transport.push_response(HttpMethod::Post, GRAPHQL_URL, response(500, "boom"));

        let imdb = client(&transport);
        assert!(imdb.validate_credentials().await.unwrap());
        assert!(!imdb.validate_credentials().await.unwrap());
        assert!(!imdb.validate_credentials().await.unwrap());
        assert!(imdb.validate_credentials().await.unwrap_err().is_transient());
    }

    #[tokio::test]
    async fn test_auth_error_on_write_is_auth_required() {
        let transport = MockTransport::new();
        transport.push_response(HttpMethod::Post, GRAPHQL_URL, response(401, ""));
        let err = client(&transport).write_rating("tt1", 5).await.unwrap_err();
        assert!(matches!(err, PlatformError::AuthRequired));
    }
}
