//! File-backed stores: per-platform datasets, the identity cache and the
//! failure ledger.
//!
//! Every store is loaded fully at the start of a run and rewritten with an
//! atomic temp-file + rename. The failure journal is the only append-only file.

pub mod dataset;
pub mod failure_ledger;
pub mod identity_cache;

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::entity::platform::Platform;

pub use dataset::DatasetStore;
pub use failure_ledger::FailureLedger;
pub use identity_cache::IdentityCache;

/// Errors from reading or writing store files.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid JSON in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn json(path: &Path, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read a JSON file, returning `T::default()` when it does not exist.
pub(crate) fn read_json_or_default<T>(path: &Path) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(T::default()),
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::json(path, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// Replace `path` with the JSON encoding of `value`.
///
/// The content goes to a uniquely named temp file in the same directory,
/// which is flushed to disk before being renamed over the target.
pub(crate) fn write_json_atomic<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    ensure_parent(path)?;
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| StoreError::json(path, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    temp.write_all(&bytes)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| StoreError::io(temp.path(), e))?;
    temp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    Ok(())
}

/// File locations under the data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    dir: PathBuf,
    douban_user: String,
    imdb_user: String,
}

impl DataLayout {
    pub fn new(
        dir: impl Into<PathBuf>,
        douban_user: impl Into<String>,
        imdb_user: impl Into<String>,
    ) -> Self {
        Self {
            dir: dir.into(),
            douban_user: douban_user.into(),
            imdb_user: imdb_user.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `douban_<user>_ratings.json` or `imdb_<user>_ratings.json`.
    pub fn dataset_path(&self, platform: Platform) -> PathBuf {
        let user = match platform {
            Platform::Douban => &self.douban_user,
            Platform::Imdb => &self.imdb_user,
        };
        self.dir.join(format!("{platform}_{user}_ratings.json"))
    }

    pub fn identity_map_path(&self) -> PathBuf {
        self.dir.join("identity_map.json")
    }

    pub fn failure_table_path(&self) -> PathBuf {
        self.dir.join("failed_sync_items.json")
    }

    pub fn failure_journal_path(&self) -> PathBuf {
        self.dir.join("sync_failures.jsonl")
    }

    pub fn merged_path(&self) -> PathBuf {
        self.dir.join("merged_ratings.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_file_yields_default() {
        let dir = tempfile::tempdir().unwrap();
        let value: Vec<String> = read_json_or_default(&dir.path().join("absent.json")).unwrap();
        assert!(value.is_empty());
    }

    #[test]
    fn test_write_then_read_round_trip_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("values.json");
        write_json_atomic(&path, &vec!["a".to_string(), "b".to_string()]).unwrap();

        let value: Vec<String> = read_json_or_default(&path).unwrap();
        assert_eq!(value, vec!["a", "b"]);
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_overwrite_replaces_content_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        write_json_atomic(&path, &vec!["old"]).unwrap();
        write_json_atomic(&path, &vec!["new", "newer"]).unwrap();

        let back: Vec<String> = read_json_or_default(&path).unwrap();
        assert_eq!(back, vec!["new", "newer"]);
        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("ids.json")]);
    }

    #[test]
    fn test_invalid_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{not json").unwrap();

        let err = read_json_or_default::<Vec<String>>(&path).unwrap_err();
        assert!(matches!(err, StoreError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_layout_paths() {
        let layout = DataLayout::new("/data", "alice", "ur123");
        assert_eq!(
            layout.dataset_path(Platform::Douban),
            PathBuf::from("/data/douban_alice_ratings.json")
        );
        assert_eq!(
            layout.dataset_path(Platform::Imdb),
            PathBuf::from("/data/imdb_ur123_ratings.json")
        );
        assert_eq!(
            layout.failure_journal_path(),
            PathBuf::from("/data/sync_failures.jsonl")
        );
    }
}
