//! Post-run archival of ingested source files.
//!
//! Every ledger row without `archived_at` has its source file moved to
//! `Archive/Bank/<bank>/<YYYY-MM-DD>/<file_name>` under the data root, and the
//! row is stamped with the archive time and location.

use crate::config::IngestConfig;
use crate::error::Result;
use crate::ledger::Ledger;
use crate::scanner::relative_src_path;
use chrono::{DateTime, Utc};
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One file moved into the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedFile {
    /// Former location, relative to the data root
    pub src_path: String,
    /// New location, relative to the data root
    pub archived_to: String,
    pub bank: String,
}

/// Archive every unarchived ledger entry whose source file is still present.
pub fn archive_processed_files(
    conn: &Connection,
    config: &IngestConfig,
) -> Result<Vec<ArchivedFile>> {
    archive_processed_files_at(conn, config, Utc::now())
}

/// As [`archive_processed_files`], partitioning by the UTC date of `now`.
pub fn archive_processed_files_at(
    conn: &Connection,
    config: &IngestConfig,
    now: DateTime<Utc>,
) -> Result<Vec<ArchivedFile>> {
    let ledger = Ledger::new(config.meta_schema.clone());
    ledger.ensure(conn)?;

    let partition = now.format("%Y-%m-%d").to_string();
    let mut summary = Vec::new();
    for entry in ledger.pending_archive(conn)? {
        let src = config.data_root.join(&entry.src_path);
        if !src.is_file() {
            warn!("File {} missing at archive time", src.display());
            continue;
        }

        let target_dir = config.archive_dir().join(&entry.bank).join(&partition);
        fs::create_dir_all(&target_dir)?;
        let target = free_target(&target_dir, &entry.file_name, &entry.md5);
        move_file(&src, &target)?;

        let archived_to = relative_src_path(&target, &config.data_root);
        ledger.mark_archived(conn, &entry.src_path, &entry.md5, &archived_to, &now)?;
        info!("Archived {} to {}", entry.src_path, target.display());

        summary.push(ArchivedFile {
            src_path: entry.src_path,
            archived_to,
            bank: entry.bank,
        });
    }

    info!(archived = summary.len(), "Archival complete");
    Ok(summary)
}

/// `dir/file_name`, or `dir/<stem>-<md5 prefix>.<ext>` if that is taken.
fn free_target(dir: &Path, file_name: &str, md5: &str) -> PathBuf {
    let target = dir.join(file_name);
    if !target.exists() {
        return target;
    }
    let name = Path::new(file_name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffix = &md5[..md5.len().min(8)];
    match name.extension() {
        Some(ext) => dir.join(format!("{}-{}.{}", stem, suffix, ext.to_string_lossy())),
        None => dir.join(format!("{}-{}", stem, suffix)),
    }
}

/// Rename, falling back to copy and remove across filesystems.
fn move_file(src: &Path, target: &Path) -> Result<()> {
    if fs::rename(src, target).is_ok() {
        return Ok(());
    }
    fs::copy(src, target)?;
    fs::remove_file(src)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IngestedFile;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn record(conn: &Connection, config: &IngestConfig, name: &str, content: &str) -> String {
        let dir = config.inbox_dir().join("T-Bank").join("transactions");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        fs::write(&path, content).unwrap();

        let entry = IngestedFile {
            bank: "T-Bank".to_string(),
            table_name: "t_bank_transactions".to_string(),
            file_name: name.to_string(),
            src_path: relative_src_path(&path, &config.data_root),
            size: content.len() as u64,
            md5: crate::fingerprint::file_fingerprint(&path).unwrap(),
            ingested_at: Utc::now(),
            archived_at: None,
            archived_path: None,
        };
        let ledger = Ledger::new(config.meta_schema.clone());
        ledger.ensure(conn).unwrap();
        ledger.record(conn, &entry).unwrap();
        entry.src_path
    }

    #[test]
    fn test_archive_moves_and_stamps() {
        let tmp = TempDir::new().unwrap();
        let config = IngestConfig::for_data_root(tmp.path());
        let conn = Connection::open_in_memory().unwrap();
        let src_path = record(&conn, &config, "a.csv", "id\n1\n");
        let now = Utc.with_ymd_and_hms(2025, 4, 2, 23, 59, 0).unwrap();

        let archived = archive_processed_files_at(&conn, &config, now).unwrap();

        assert_eq!(
            archived,
            vec![ArchivedFile {
                src_path: src_path.clone(),
                archived_to: "Archive/Bank/T-Bank/2025-04-02/a.csv".to_string(),
                bank: "T-Bank".to_string(),
            }]
        );
        assert!(!tmp.path().join(&src_path).exists());
        assert!(tmp.path().join("Archive/Bank/T-Bank/2025-04-02/a.csv").is_file());

        let ledger = Ledger::new("prod_meta");
        assert!(ledger.pending_archive(&conn).unwrap().is_empty());
        let entry = &ledger.list(&conn, None).unwrap()[0];
        assert_eq!(entry.archived_at, Some(now));

        // nothing left to do
        assert!(archive_processed_files_at(&conn, &config, now).unwrap().is_empty());
    }

    #[test]
    fn test_archive_skips_missing_sources() {
        let tmp = TempDir::new().unwrap();
        let config = IngestConfig::for_data_root(tmp.path());
        let conn = Connection::open_in_memory().unwrap();
        let src_path = record(&conn, &config, "gone.csv", "id\n1\n");
        fs::remove_file(tmp.path().join(&src_path)).unwrap();

        let archived = archive_processed_files(&conn, &config).unwrap();

        assert!(archived.is_empty());
        assert_eq!(Ledger::new("prod_meta").pending_archive(&conn).unwrap().len(), 1);
    }

    #[test]
    fn test_free_target_avoids_overwrite() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.csv"), "old").unwrap();

        let target = free_target(tmp.path(), "a.csv", "0123456789abcdef");
        assert_eq!(target, tmp.path().join("a-01234567.csv"));
        assert_eq!(free_target(tmp.path(), "b.csv", "ff"), tmp.path().join("b.csv"));
    }
}
