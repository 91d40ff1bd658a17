//! Inbox scanning and the file stability gate.
//!
//! The inbox is laid out as `<inbox>/<Bank>/<StatementType>/**/*.csv`. Each
//! `<Bank>/<StatementType>` directory feeds exactly one raw table.

use crate::error::{IngestError, Result};
use crate::naming::derive_table_name;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use walkdir::WalkDir;

/// A `<Bank>/<StatementType>` directory and the raw table it feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementDir {
    pub bank: String,
    pub path: PathBuf,
    pub table_name: String,
}

/// Every statement directory under `inbox`, sorted by bank then type.
///
/// Fails with [`IngestError::InboxMissing`] if `inbox` is not a directory.
pub fn statement_dirs(inbox: &Path) -> Result<Vec<StatementDir>> {
    if !inbox.is_dir() {
        return Err(IngestError::InboxMissing(inbox.to_path_buf()));
    }

    let mut dirs = Vec::new();
    for bank_dir in sorted_subdirs(inbox)? {
        let bank = bank_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        for type_dir in sorted_subdirs(&bank_dir)? {
            let table_name = derive_table_name(&type_dir, inbox);
            dirs.push(StatementDir {
                bank: bank.clone(),
                path: type_dir,
                table_name,
            });
        }
    }
    Ok(dirs)
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut subdirs = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            subdirs.push(path);
        }
    }
    subdirs.sort();
    Ok(subdirs)
}

/// CSV files anywhere below `dir` (case-insensitive extension), sorted by path.
pub fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if entry.file_type().is_file() && is_csv(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// `path` relative to `root`, `/`-separated, as stored in the ledger.
pub fn relative_src_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ============================================================================
// Stability Gate
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Size unchanged across the cooldown window
    Stable { size: u64 },
    /// Size changed, or the file could not be read
    Unstable,
}

/// Decides whether a file has finished being written.
pub trait StabilityGate: Send + Sync {
    fn check(&self, path: &Path) -> Stability;
}

/// Samples the size, sleeps for the cooldown, samples again.
#[derive(Debug, Clone)]
pub struct SizeCooldownGate {
    cooldown: Duration,
}

impl SizeCooldownGate {
    pub fn new(cooldown: Duration) -> Self {
        Self { cooldown }
    }
}

fn file_size(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

impl StabilityGate for SizeCooldownGate {
    fn check(&self, path: &Path) -> Stability {
        let Some(before) = file_size(path) else {
            return Stability::Unstable;
        };
        if !self.cooldown.is_zero() {
            std::thread::sleep(self.cooldown);
        }
        match file_size(path) {
            Some(after) if after == before => Stability::Stable { size: after },
            after => {
                debug!(path = %path.display(), before, ?after, "File size changed during cooldown");
                Stability::Unstable
            }
        }
    }
}
