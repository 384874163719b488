//! Douban API payloads and their conversion to [`MovieRecord`].

use chrono::NaiveDate;
use serde::Deserialize;

use crate::entity::movie::MovieRecord;

/// Number of billed actors kept per movie.
const MAX_ACTORS: usize = 3;

/// One page of `/user/{id}/interests`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterestsPage {
    pub start: usize,
    pub count: usize,
    pub total: Option<usize>,
    pub interests: Vec<Interest>,
}

/// A user's mark on a subject.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Interest {
    pub comment: Option<String>,
    pub rating: Option<InterestRating>,
    /// `YYYY-MM-DD HH:MM:SS`, China time.
    pub create_time: Option<String>,
    pub subject: Option<Subject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterestRating {
    pub value: Option<f32>,
    pub max: Option<u8>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Subject {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub cover_url: Option<String>,
    pub year: Option<Loose>,
    /// `year / countries / genres / directors / actors`.
    pub card_subtitle: Option<String>,
    pub genres: Vec<String>,
    pub directors: Vec<Person>,
    pub actors: Vec<Person>,
    pub rating: Option<SubjectRating>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Person {
    pub name: String,
}

/// Public rating summary of a subject.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SubjectRating {
    pub value: Option<f32>,
    pub count: Option<u64>,
}

/// A field Douban sends as either a number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Loose {
    Number(i64),
    Text(String),
}

impl Loose {
    fn as_i32(&self) -> Option<i32> {
        match self {
            Loose::Number(n) => i32::try_from(*n).ok(),
            Loose::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Response of the rexxar search endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchResponse {
    pub subjects: Vec<SearchSubject>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchSubject {
    pub target_id: Option<Loose>,
    pub title: Option<String>,
}

impl SearchSubject {
    #[must_use]
    pub fn douban_id(&self) -> Option<String> {
        match self.target_id.as_ref()? {
            Loose::Number(n) => Some(n.to_string()),
            Loose::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Loose::Text(_) => None,
        }
    }
}

/// Response of the rating write endpoint; `r == 0` means accepted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InterestWriteResponse {
    pub r: i64,
    pub msg: Option<String>,
}

impl InterestsPage {
    /// Whether later pages exist.
    #[must_use]
    pub fn has_more(&self) -> bool {
        match self.total {
            Some(total) => self.start + self.interests.len() < total,
            None => !self.interests.is_empty(),
        }
    }
}

impl Interest {
    /// Convert to a Douban dataset record; `None` when the subject has no id.
    #[must_use]
    pub fn to_record(&self) -> Option<MovieRecord> {
        let subject = self.subject.as_ref()?;
        let id = subject.id.as_deref().map(str::trim).filter(|s| !s.is_empty())?;

        let rating = self
            .rating
            .as_ref()
            .and_then(|r| r.value)
            .filter(|v| v.is_finite() && *v >= 0.0)
            .map(|v| v.round().min(f32::from(u8::MAX)) as u8);

        Some(MovieRecord {
            douban_id: Some(id.to_string()),
            imdb_id: None,
            title: subject.title.clone().unwrap_or_default(),
            year: subject.year.as_ref().and_then(Loose::as_i32),
            rating: MovieRecord::normalize_rating(rating),
            date_rated: self.create_time.as_deref().and_then(parse_create_time),
            directors: subject.directors.iter().map(|p| p.name.clone()).collect(),
            actors: subject
                .actors
                .iter()
                .take(MAX_ACTORS)
                .map(|p| p.name.clone())
                .collect(),
            genres: subject.genres.clone(),
            cover_url: subject.cover_url.clone(),
            url: subject.url.clone(),
            comment: self.comment.clone().filter(|c| !c.trim().is_empty()),
            public_rating: subject.rating.as_ref().and_then(|r| r.value),
            votes: subject.rating.as_ref().and_then(|r| r.count),
            runtime_minutes: None,
            title_type: None,
            release_date: None,
            country: subject.card_subtitle.as_deref().and_then(country_from_subtitle),
        })
    }
}

/// Date part of `YYYY-MM-DD HH:MM:SS`.
fn parse_create_time(raw: &str) -> Option<NaiveDate> {
    let date = raw.split_whitespace().next()?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Second `/`-separated field of the card subtitle.
fn country_from_subtitle(subtitle: &str) -> Option<String> {
    subtitle
        .split('/')
        .nth(1)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
