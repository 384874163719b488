//! Durable record of items that failed to sync and must be skipped.
//!
//! Two files back the ledger:
//!
//! - the journal (`sync_failures.jsonl`), appended and fsynced as each
//!   failure happens, whose ids form the id-based exclusion set;
//! - the table (`failed_sync_items.json`), rewritten at the end of a run with
//!   one record per [`FailureKey`], most recent wins.
//!
//! Journal lines that never reached the table (a run that crashed before
//! committing) are folded back in on the next load.

use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::entity::failure::{FailureKey, FailureRecord};
use crate::entity::merged::MergedMovie;

use super::{Result, StoreError, ensure_parent, read_json_or_default, write_json_atomic};

#[derive(Debug, Default)]
pub struct FailureLedger {
    table_path: Option<PathBuf>,
    journal_path: Option<PathBuf>,
    records: Vec<FailureRecord>,
    keys: HashSet<FailureKey>,
    excluded_ids: HashSet<String>,
    pending: Vec<FailureRecord>,
}

impl FailureLedger {
    /// Load the table and the journal.
    pub fn open(table_path: impl AsRef<Path>, journal_path: impl AsRef<Path>) -> Result<Self> {
        let table_path = table_path.as_ref();
        let journal_path = journal_path.as_ref();

        let table: Vec<FailureRecord> = read_json_or_default(table_path)?;
        let journal = read_journal(journal_path)?;

        let excluded_ids = journal
            .iter()
            .flat_map(|r| r.ids())
            .map(str::to_string)
            .collect();
        let records = dedup_keep_last(table.into_iter().chain(journal));
        let keys = records.iter().map(FailureRecord::key).collect();

        let ledger = Self {
            table_path: Some(table_path.to_path_buf()),
            journal_path: Some(journal_path.to_path_buf()),
            records,
            keys,
            excluded_ids,
            pending: Vec::new(),
        };
        tracing::debug!(
            records = ledger.records.len(),
            excluded_ids = ledger.excluded_ids.len(),
            "Loaded failure ledger"
        );
        Ok(ledger)
    }

    /// A ledger with no backing files.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Whether `movie` failed before, by descriptive key or by id.
    #[must_use]
    pub fn is_blacklisted(&self, movie: &MergedMovie) -> bool {
        if self.keys.contains(&FailureKey::of(movie)) {
            return true;
        }
        [movie.douban_id.as_deref(), movie.imdb_id.as_deref()]
            .into_iter()
            .flatten()
            .any(|id| self.excluded_ids.contains(id))
    }

    /// Journal a failure immediately; it joins the table on [`commit`](Self::commit).
    pub fn record_failure(&mut self, record: FailureRecord) -> Result<()> {
        if let Some(path) = self.journal_path.as_deref() {
            append_line(path, &record)?;
        }
        self.pending.push(record);
        Ok(())
    }

    /// Failures recorded since load and not yet committed.
    #[must_use]
    pub fn pending(&self) -> &[FailureRecord] {
        &self.pending
    }

    /// Fold pending failures into the table and rewrite it.
    ///
    /// Returns the number of keys that were not in the table before.
    pub fn commit(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let pending = std::mem::take(&mut self.pending);
        let added = pending
            .iter()
            .map(FailureRecord::key)
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|k| !self.keys.contains(k))
            .count();

        let records = std::mem::take(&mut self.records);
        self.records = dedup_keep_last(records.into_iter().chain(pending));
        self.keys = self.records.iter().map(FailureRecord::key).collect();

        if let Some(path) = self.table_path.as_deref() {
            write_json_atomic(path, &self.records)?;
        }
        tracing::info!(added, total = self.records.len(), "Committed failure ledger");
        Ok(added)
    }

    /// Committed (and recovered) records.
    #[must_use]
    pub fn records(&self) -> &[FailureRecord] {
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
}

/// Keep one record per key: the last one seen, at the first one's position.
fn dedup_keep_last(records: impl IntoIterator<Item = FailureRecord>) -> Vec<FailureRecord> {
    let mut out: Vec<FailureRecord> = Vec::new();
    let mut index: HashMap<FailureKey, usize> = HashMap::new();
    for record in records {
        let key = record.key();
        match index.get(&key) {
            Some(&i) => out[i] = record,
            None => {
                index.insert(key, out.len());
                out.push(record);
            }
        }
    }
    out
}

fn read_journal(path: &Path) -> Result<Vec<FailureRecord>> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    let mut records = Vec::new();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| StoreError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<FailureRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!(
                path = %path.display(),
                line = n + 1,
                error = %e,
                "Skipping malformed failure journal line"
            ),
        }
    }
    Ok(records)
}

fn append_line(path: &Path, record: &FailureRecord) -> Result<()> {
    ensure_parent(path)?;
    let mut line = serde_json::to_vec(record).map_err(|e| StoreError::json(path, e))?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| StoreError::io(path, e))?;
    file.write_all(&line).map_err(|e| StoreError::io(path, e))?;
    file.sync_data().map_err(|e| StoreError::io(path, e))?;
    Ok(())
}
