//! Persistent Douban-id ↔ IMDb-id mapping.
//!
//! At most one live edge per id on either side. Inserting an edge for an
//! already mapped id replaces the old edge on both sides, and loading a file
//! with repeated ids keeps the last occurrence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::entity::platform::Platform;

use super::{Result, read_json_or_default, write_json_atomic};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct IdentityEdge {
    douban_id: String,
    imdb_id: String,
}

/// Bidirectional identity map, loaded once per run.
#[derive(Debug, Default)]
pub struct IdentityCache {
    path: Option<PathBuf>,
    douban_to_imdb: HashMap<String, String>,
    imdb_to_douban: HashMap<String, String>,
    new_mappings: usize,
}

impl IdentityCache {
    /// Load the cache from `path`; a missing file is an empty cache.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let edges: Vec<IdentityEdge> = read_json_or_default(path)?;
        let mut cache = Self {
            path: Some(path.to_path_buf()),
            ..Default::default()
        };
        for edge in edges {
            cache.link(edge.douban_id, edge.imdb_id);
        }
        tracing::debug!(path = %path.display(), edges = cache.len(), "Loaded identity cache");
        Ok(cache)
    }

    /// A cache that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// The other platform's id for `local_id` on `platform`.
    #[must_use]
    pub fn lookup(&self, platform: Platform, local_id: &str) -> Option<&str> {
        match platform {
            Platform::Douban => self.douban_to_imdb.get(local_id),
            Platform::Imdb => self.imdb_to_douban.get(local_id),
        }
        .map(String::as_str)
    }

    /// Record that `local_id` on `platform` maps to `cross_id`.
    ///
    /// Returns whether the cache changed.
    pub fn record(&mut self, platform: Platform, local_id: &str, cross_id: &str) -> bool {
        match platform {
            Platform::Douban => self.insert(local_id, cross_id),
            Platform::Imdb => self.insert(cross_id, local_id),
        }
    }

    /// Insert a Douban → IMDb edge. Returns whether the cache changed.
    pub fn insert(&mut self, douban_id: &str, imdb_id: &str) -> bool {
        if self.douban_to_imdb.get(douban_id).map(String::as_str) == Some(imdb_id) {
            return false;
        }
        self.link(douban_id.to_string(), imdb_id.to_string());
        self.new_mappings += 1;
        true
    }

    fn link(&mut self, douban_id: String, imdb_id: String) {
        if let Some(old_imdb) = self.douban_to_imdb.insert(douban_id.clone(), imdb_id.clone())
            && old_imdb != imdb_id
            && self.imdb_to_douban.get(&old_imdb) == Some(&douban_id)
        {
            self.imdb_to_douban.remove(&old_imdb);
        }
        if let Some(old_douban) = self.imdb_to_douban.insert(imdb_id.clone(), douban_id.clone())
            && old_douban != douban_id
            && self.douban_to_imdb.get(&old_douban) == Some(&imdb_id)
        {
            self.douban_to_imdb.remove(&old_douban);
        }
    }

    /// Number of live edges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.douban_to_imdb.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.douban_to_imdb.is_empty()
    }

    /// Edges added or replaced since load.
    #[must_use]
    pub fn new_mappings(&self) -> usize {
        self.new_mappings
    }

    /// Rewrite the cache file if anything changed. Returns the number of new edges written.
    pub fn save(&mut self) -> Result<usize> {
        let Some(path) = self.path.as_deref() else {
            return Ok(0);
        };
        if self.new_mappings == 0 {
            return Ok(0);
        }

        let mut edges: Vec<IdentityEdge> = self
            .douban_to_imdb
            .iter()
            .map(|(douban_id, imdb_id)| IdentityEdge {
                douban_id: douban_id.clone(),
                imdb_id: imdb_id.clone(),
            })
            .collect();
        edges.sort_by(|a, b| a.douban_id.cmp(&b.douban_id));
        write_json_atomic(path, &edges)?;

        let written = std::mem::take(&mut self.new_mappings);
        tracing::info!(
            path = %path.display(),
            new_mappings = written,
            total = edges.len(),
            "Saved identity cache"
        );
        Ok(written)
    }
}
