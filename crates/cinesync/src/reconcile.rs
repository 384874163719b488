//! Outer join of the Douban and IMDb datasets.
//!
//! Records are joined on the IMDb id first; IMDb records left over are then
//! matched to leftover Douban records by Douban id. Douban's descriptive
//! fields win, IMDb fills the gaps, and anything unmatched passes through
//! with the other side empty.

use std::collections::{HashMap, HashSet};

use crate::entity::merged::{MergedDataset, MergedMovie};
use crate::entity::movie::MovieRecord;

/// Merge the two datasets into one record per movie.
///
/// Deterministic: the same inputs always give the same dataset. When two
/// merged records land on the same key the first one is kept.
#[must_use]
pub fn merge(douban: &[MovieRecord], imdb: &[MovieRecord]) -> MergedDataset {
    let douban = dedup_by(douban, |r| r.douban_id.as_deref());
    let imdb = dedup_by(imdb, |r| r.imdb_id.as_deref());

    let imdb_by_id: HashMap<&str, usize> = imdb
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.imdb_id.as_deref().map(|id| (id, i)))
        .collect();

    let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
    let mut used_imdb: HashSet<usize> = HashSet::new();
    let mut unmatched_douban: Vec<usize> = Vec::new();

    for (d, record) in douban.iter().enumerate() {
        match record
            .imdb_id
            .as_deref()
            .and_then(|id| imdb_by_id.get(id))
            .filter(|i| !used_imdb.contains(*i))
        {
            Some(&i) => {
                used_imdb.insert(i);
                pairs.push((Some(d), Some(i)));
            }
            None => unmatched_douban.push(d),
        }
    }

    // Second pass: IMDb records that know their Douban id.
    let leftover_imdb_by_douban: HashMap<&str, usize> = imdb
        .iter()
        .enumerate()
        .filter(|(i, _)| !used_imdb.contains(i))
        .filter_map(|(i, r)| r.douban_id.as_deref().map(|id| (id, i)))
        .collect();

    for d in unmatched_douban {
        let matched = douban[d]
            .douban_id
            .as_deref()
            .and_then(|id| leftover_imdb_by_douban.get(id))
            .copied()
            .filter(|i| !used_imdb.contains(i));
        if let Some(i) = matched {
            used_imdb.insert(i);
        }
        pairs.push((Some(d), matched));
    }

    for i in 0..imdb.len() {
        if !used_imdb.contains(&i) {
            pairs.push((None, Some(i)));
        }
    }

    let mut dataset = MergedDataset::new();
    for (d, i) in pairs {
        let movie = merge_pair(d.map(|d| douban[d]), i.map(|i| imdb[i]));
        if !dataset.insert_first(movie) {
            tracing::debug!("Dropped duplicate merged record");
        }
    }
    dataset
}

/// Keep the first record per local id; records without one are kept as is.
fn dedup_by<'a>(
    records: &'a [MovieRecord],
    id: impl Fn(&MovieRecord) -> Option<&str>,
) -> Vec<&'a MovieRecord> {
    let mut seen: HashSet<&str> = HashSet::new();
    records
        .iter()
        .filter(|r| match id(*r) {
            Some(local) => seen.insert(local),
            None => true,
        })
        .collect()
}

fn merge_pair(douban: Option<&MovieRecord>, imdb: Option<&MovieRecord>) -> MergedMovie {
    fn pick<T: Clone>(
        douban: Option<&MovieRecord>,
        imdb: Option<&MovieRecord>,
        field: impl Fn(&MovieRecord) -> Option<T>,
    ) -> Option<T> {
        douban.and_then(&field).or_else(|| imdb.and_then(&field))
    }

    fn pick_list(
        douban: Option<&MovieRecord>,
        imdb: Option<&MovieRecord>,
        field: impl Fn(&MovieRecord) -> &Vec<String>,
    ) -> Vec<String> {
        douban
            .map(&field)
            .filter(|v| !v.is_empty())
            .or_else(|| imdb.map(&field))
            .cloned()
            .unwrap_or_default()
    }

    let title = pick(douban, imdb, |r| {
        (!r.title.trim().is_empty()).then(|| r.title.clone())
    })
    .unwrap_or_default();

    let date_rated_douban = douban.and_then(|r| r.date_rated);
    let date_rated_imdb = imdb.and_then(|r| r.date_rated);
    let date_rated_first = match (date_rated_douban, date_rated_imdb) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };

    MergedMovie {
        douban_id: pick(douban, imdb, |r| r.douban_id.clone()),
        imdb_id: pick(douban, imdb, |r| r.imdb_id.clone()),
        title,
        year: pick(douban, imdb, |r| r.year),
        directors: pick_list(douban, imdb, |r| &r.directors),
        actors: pick_list(douban, imdb, |r| &r.actors),
        genres: pick_list(douban, imdb, |r| &r.genres),
        cover_url: pick(douban, imdb, |r| r.cover_url.clone()),
        country: pick(douban, imdb, |r| r.country.clone()),
        rating_douban: douban.and_then(|r| MovieRecord::normalize_rating(r.rating)),
        rating_imdb: imdb.and_then(|r| MovieRecord::normalize_rating(r.rating)),
        date_rated_douban,
        date_rated_imdb,
        date_rated_first,
        url_douban: douban.and_then(|r| r.url.clone()),
        url_imdb: imdb.and_then(|r| r.url.clone()),
        comment: pick(douban, imdb, |r| r.comment.clone()),
        public_rating_douban: douban.and_then(|r| r.public_rating),
        public_rating_imdb: imdb.and_then(|r| r.public_rating),
        votes_imdb: imdb.and_then(|r| r.votes),
        runtime_minutes: pick(douban, imdb, |r| r.runtime_minutes),
        title_type: pick(douban, imdb, |r| r.title_type.clone()),
        release_date: pick(douban, imdb, |r| r.release_date),
    }
}
