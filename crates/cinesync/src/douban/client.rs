//! Douban client: rating listing, id resolution and rating writes.

use std::sync::{Arc, LazyLock};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use regex::Regex;
use url::Url;
use url::form_urlencoded;

use super::error::DoubanError;
use super::types::{InterestWriteResponse, InterestsPage, SearchResponse};
use crate::entity::platform::Platform;
use crate::http::reqwest_transport::ReqwestTransport;
use crate::http::{HttpHeaders, HttpRequest, HttpResponse, HttpTransport, headers};
use crate::platform::{self, CrossIdResolver, ListingPage, PlatformError, RatingPlatform};

/// Mobile API host serving listings and search.
pub const REXXAR_BASE: &str = "https://m.douban.com/rexxar/api/v2";

/// Desktop host serving subject pages and the rating endpoint.
pub const MOVIE_BASE: &str = "https://movie.douban.com";

/// Listing page size of the interests endpoint.
pub const PAGE_SIZE: usize = 50;

/// Subject fetched by the credential check; its page carries an IMDb id.
const PROBE_SUBJECT: &str = "1298697";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

static IMDB_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"IMDb:</span>\s*(tt\d+)").expect("IMDb id pattern compiles")
});

/// Douban client authenticated by a browser session cookie.
#[derive(Clone)]
pub struct DoubanClient {
    transport: Arc<dyn HttpTransport>,
    user_id: String,
    cookie: String,
}

impl DoubanClient {
    /// Create a client over reqwest with a 30 second timeout.
    pub fn new(user_id: &str, cookie: &str) -> Result<Self, DoubanError> {
        let transport = ReqwestTransport::with_timeout(StdDuration::from_secs(30))
            .map_err(|e| DoubanError::Config(e.to_string()))?;
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
        }
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    fn headers(&self, referer: &str) -> HttpHeaders {
        headers(&[
            ("Cookie", self.cookie.as_str()),
            ("User-Agent", USER_AGENT),
            ("Accept", "application/json, text/plain, */*"),
            ("Accept-Language", "en-US,en;q=0.9,zh-CN;q=0.8,zh;q=0.7"),
            ("Referer", referer),
        ])
    }

    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DoubanError> {
        tracing::debug!(method = request.method.as_str(), url = %request.url, "Douban request");
        let response = self.transport.send(request).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(api_error(&response))
        }
    }

    /// URL of one interests page.
    pub fn interests_url(&self, offset: usize, count: usize) -> Result<String, DoubanError> {
        let base = format!("{REXXAR_BASE}/user/{}/interests", self.user_id);
        let count = count.to_string();
        let start = offset.to_string();
        let url = Url::parse_with_params(
            &base,
            &[
                ("type", "movie"),
                ("status", "done"),
                ("count", count.as_str()),
                ("start", start.as_str()),
                ("for_mobile", "1"),
            ],
        )
        .map_err(|e| DoubanError::Config(format!("interests URL: {e}")))?;
        Ok(url.into())
    }

    fn search_url(imdb_id: &str) -> Result<String, DoubanError> {
        let url = Url::parse_with_params(
            &format!("{REXXAR_BASE}/search"),
            &[("q", imdb_id), ("type", "movie"), ("count", "1")],
        )
        .map_err(|e| DoubanError::Config(format!("search URL: {e}")))?;
        Ok(url.into())
    }

    fn subject_url(douban_id: &str) -> String {
        format!("{MOVIE_BASE}/subject/{douban_id}/")
    }

    /// Fetch one page of the user's watched movies, most recent first.
    pub async fn list_interests(
        &self,
        offset: usize,
        count: usize,
    ) -> Result<InterestsPage, DoubanError> {
        let url = self.interests_url(offset, count)?;
        let response = self
            .send(HttpRequest::get(url, self.headers("https://m.douban.com/")))
            .await?;
        Ok(response.json()?)
    }

    /// IMDb id printed on a subject page. `Ok(None)` when the subject is gone
    /// or the page names no IMDb id.
    pub async fn imdb_id_for(&self, douban_id: &str) -> Result<Option<String>, DoubanError> {
        let request = HttpRequest::get(Self::subject_url(douban_id), self.headers(MOVIE_BASE));
        match self.send(request).await {
            Ok(response) => Ok(extract_imdb_id(&response.text())),
            Err(DoubanError::Api { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Douban subject id of the first search hit for `imdb_id`.
    pub async fn douban_id_for(&self, imdb_id: &str) -> Result<Option<String>, DoubanError> {
        let url = Self::search_url(imdb_id)?;
        let response = self
            .send(HttpRequest::get(url, self.headers("https://m.douban.com/")))
            .await?;
        let search: SearchResponse = response.json()?;
        Ok(search.subjects.first().and_then(|s| s.douban_id()))
    }

    /// Mark `douban_id` as watched with `stars` (1–5).
    pub async fn rate(&self, douban_id: &str, stars: u8) -> Result<(), DoubanError> {
        let ck = ck_from_cookie(&self.cookie)
            .ok_or_else(|| DoubanError::Auth("cookie has no ck token".to_string()))?;

        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("ck", ck)
            .append_pair("interest", "collect")
            .append_pair("rating", &stars.to_string())
            .append_pair("foldcollect", "F")
            .append_pair("tags", "")
            .append_pair("comment", "")
            .finish();

        let mut request_headers = self.headers(&Self::subject_url(douban_id));
        request_headers.push((
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        ));
        let url = format!("{MOVIE_BASE}/j/subject/{douban_id}/interest");
        let response = self
            .send(HttpRequest::post(url, request_headers, body.into_bytes()))
            .await?;

        let answer: InterestWriteResponse = response.json()?;
        if answer.r != 0 {
            return Err(DoubanError::Rejected {
                status: response.status,
                message: answer.msg.unwrap_or_else(|| format!("r={}", answer.r)),
            });
        }
        tracing::debug!(douban_id, stars, "Douban rating saved");
        Ok(())
    }

    /// Whether the cookie still opens a subject page with its IMDb id.
    pub async fn check_session(&self) -> Result<bool, DoubanError> {
        let request = HttpRequest::get(Self::subject_url(PROBE_SUBJECT), self.headers(MOVIE_BASE));
        match self.send(request).await {
            Ok(response) => Ok(extract_imdb_id(&response.text()).is_some()),
            Err(DoubanError::Api {
                status: 401 | 403, ..
            }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

fn api_error(response: &HttpResponse) -> DoubanError {
    let text = response.text();
    let message = text.lines().next().unwrap_or_default().trim();
    DoubanError::Api {
        status: response.status,
        message: if message.is_empty() {
            format!("HTTP {}", response.status)
        } else {
            message.chars().take(200).collect()
        },
    }
}

/// First IMDb id labelled on a subject page.
#[must_use]
pub fn extract_imdb_id(html: &str) -> Option<String> {
    IMDB_ID_PATTERN
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// The `ck` anti-CSRF token carried in the session cookie.
#[must_use]
pub fn ck_from_cookie(cookie: &str) -> Option<&str> {
    cookie
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.trim() == "ck")
        .map(|(_, value)| value.trim().trim_matches('"'))
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl RatingPlatform for DoubanClient {
    fn platform(&self) -> Platform {
        Platform::Douban
    }

    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    async fn list_page(&self, offset: usize, page_size: usize) -> platform::Result<ListingPage> {
        let page = self.list_interests(offset, page_size).await?;
        let items = page
            .interests
            .iter()
            .filter_map(|interest| interest.to_record())
            .collect();
        Ok(ListingPage {
            items,
            has_more: page.has_more(),
            total: page.total,
        })
    }

    async fn write_rating(&self, item_id: &str, rating: u8) -> platform::Result<()> {
        let max = Platform::Douban.max_rating();
        if rating == 0 || rating > max {
            return Err(PlatformError::api(
                400,
                format!("rating {rating} is outside 1-{max}"),
            ));
        }
        Ok(self.rate(item_id, rating).await?)
    }

    async fn validate_credentials(&self) -> platform::Result<bool> {
        if ck_from_cookie(&self.cookie).is_none() {
            tracing::warn!("Douban cookie has no ck token");
            return Ok(false);
        }
        Ok(self.check_session().await?)
    }
}

/// Resolves ids in both directions: Douban subject pages name the IMDb id,
/// and Douban search finds a subject by IMDb id.
#[async_trait]
impl CrossIdResolver for DoubanClient {
    async fn resolve_cross_id(
        &self,
        platform: Platform,
        local_id: &str,
    ) -> platform::Result<Option<String>> {
        let resolved = match platform {
            Platform::Douban => self.imdb_id_for(local_id).await?,
            Platform::Imdb => self.douban_id_for(local_id).await?,
        };
        Ok(resolved)
    }
}
