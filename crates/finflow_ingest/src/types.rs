//! Core types for ingestion runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Ledger Types
// ============================================================================

/// One ledger row: a source file that was ingested.
///
/// `(src_path, md5)` is unique. Only `archived_at`/`archived_path` change
/// after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedFile {
    /// Bank directory name the file came from
    pub bank: String,
    /// Derived raw table name
    pub table_name: String,
    /// Original file name
    pub file_name: String,
    /// Path relative to the data root, `/`-separated
    pub src_path: String,
    /// Size in bytes at ingestion time
    pub size: u64,
    /// Lowercase hex md5 of the file contents
    pub md5: String,
    pub ingested_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
    /// Archive location relative to the data root
    pub archived_path: Option<String>,
}

// ============================================================================
// Candidate Types
// ============================================================================

/// A stable, fingerprinted file waiting for the ledger decision.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub path: PathBuf,
    pub src_path: String,
    pub bank: String,
    pub table_name: String,
    pub file_name: String,
    pub size: u64,
    pub md5: String,
}

impl CandidateFile {
    pub fn to_ledger_entry(&self, ingested_at: DateTime<Utc>) -> IngestedFile {
        IngestedFile {
            bank: self.bank.clone(),
            table_name: self.table_name.clone(),
            file_name: self.file_name.clone(),
            src_path: self.src_path.clone(),
            size: self.size,
            md5: self.md5.clone(),
            ingested_at,
            archived_at: None,
            archived_path: None,
        }
    }
}

// ============================================================================
// Run Types
// ============================================================================

/// Terminal state of one file within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// New file committed together with its ledger row
    Ingested { rows: u64 },
    /// Already in the ledger; nothing written
    SkippedDuplicate,
    /// Already in the ledger; rows re-loaded after a table rebuild
    Replayed { rows: u64 },
    /// Size changed during the cooldown or the file vanished
    SkippedUnstable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub path: PathBuf,
    pub table_name: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// Statistics from an ingestion run.
///
/// `ingested` and `skipped` are the counts the orchestrator consumes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    /// Files newly committed to the ledger
    pub ingested: u64,
    /// Files already present in the ledger
    pub skipped: u64,
    /// Files left for a later run because they were still changing
    pub unstable: u64,
    /// Raw rows inserted for new files
    pub rows_inserted: u64,
    /// Raw rows re-inserted from ledgered files after a rebuild
    pub rows_replayed: u64,
    pub files: Vec<FileReport>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, path: PathBuf, table_name: &str, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Ingested { rows } => {
                self.ingested += 1;
                self.rows_inserted += rows;
            }
            FileOutcome::SkippedDuplicate => self.skipped += 1,
            FileOutcome::Replayed { rows } => {
                self.skipped += 1;
                self.rows_replayed += rows;
            }
            FileOutcome::SkippedUnstable => self.unstable += 1,
        }
        self.files.push(FileReport {
            path,
            table_name: table_name.to_string(),
            outcome,
        });
    }
}
