//! One platform's local copy of the user's ratings.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::entity::movie::MovieRecord;
use crate::entity::platform::Platform;

use super::{Result, read_json_or_default, write_json_atomic};

/// Stored ratings for one platform, most recently rated first.
#[derive(Debug)]
pub struct DatasetStore {
    platform: Platform,
    path: Option<PathBuf>,
    records: Vec<MovieRecord>,
}

impl DatasetStore {
    /// Load the dataset at `path`; a missing file is an empty dataset.
    pub fn load(platform: Platform, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let records: Vec<MovieRecord> = read_json_or_default(path)?;
        tracing::debug!(%platform, path = %path.display(), records = records.len(), "Loaded dataset");
        Ok(Self {
            platform,
            path: Some(path.to_path_buf()),
            records,
        })
    }

    /// A dataset that is never written to disk.
    pub fn in_memory(platform: Platform, records: Vec<MovieRecord>) -> Self {
        Self {
            platform,
            path: None,
            records,
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn records(&self) -> &[MovieRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Local ids of every stored record; the fetch checkpoint.
    #[must_use]
    pub fn existing_ids(&self) -> HashSet<String> {
        self.records
            .iter()
            .filter_map(|r| r.id_for(self.platform))
            .map(str::to_string)
            .collect()
    }

    /// Merge freshly fetched records into the dataset.
    ///
    /// A fetched record replaces a stored one with the same local id. The
    /// result is re-sorted most recently rated first, undated records last.
    /// Returns the number of ids that were not stored before.
    pub fn merge(&mut self, fetched: Vec<MovieRecord>) -> usize {
        let before = self.existing_ids();
        let platform = self.platform;

        let mut seen: HashSet<String> = HashSet::new();
        let mut merged: Vec<MovieRecord> = Vec::with_capacity(self.records.len() + fetched.len());
        // Fetched items arrive oldest first; walk them newest first so the
        // newest copy of a repeated id wins.
        for record in fetched.into_iter().rev().chain(self.records.drain(..)) {
            let duplicate = record
                .id_for(platform)
                .is_some_and(|id| !seen.insert(id.to_string()));
            if !duplicate {
                merged.push(record);
            }
        }

        merged.sort_by(|a, b| match (a.date_rated, b.date_rated) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        self.records = merged;

        self.existing_ids().difference(&before).count()
    }

    /// Write the dataset back to its file.
    pub fn save(&self) -> Result<()> {
        if let Some(path) = self.path.as_deref() {
            write_json_atomic(path, &self.records)?;
            tracing::debug!(platform = %self.platform, records = self.records.len(), "Saved dataset");
        }
        Ok(())
    }
}
