//! Run-scoped record of every output path touched so far.
//!
//! A `write` always replaces the file. An `append` extends it, and the ledger
//! tells the writer whether a path was already produced earlier in the run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use stencil_renderer::WriteMode;

/// What the ledger knows about one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    pub first_touch_mode: WriteMode,
    pub touch_count: usize,
}

/// The operation the writer should perform for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    /// Create or replace the file.
    Truncate,
    /// Add to the end of the file, creating it if needed.
    Append,
}

impl From<WriteMode> for WriteOp {
    fn from(mode: WriteMode) -> Self {
        match mode {
            WriteMode::Write => WriteOp::Truncate,
            WriteMode::Append => WriteOp::Append,
        }
    }
}

/// Absolute target path → [`LedgerEntry`], owned by one writer for one run.
#[derive(Debug, Default)]
pub struct WriteLedger {
    entries: BTreeMap<PathBuf, LedgerEntry>,
}

impl WriteLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&LedgerEntry> {
        self.entries.get(path)
    }

    pub fn is_touched(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Record a completed write to `path`.
    pub fn record(&mut self, path: &Path, mode: WriteMode) -> LedgerEntry {
        let entry = self
            .entries
            .entry(path.to_path_buf())
            .or_insert(LedgerEntry { first_touch_mode: mode, touch_count: 0 });
        entry.touch_count += 1;
        *entry
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &LedgerEntry)> {
        self.entries.iter().map(|(path, entry)| (path.as_path(), entry))
    }
}
