//! CSV snapshot export of a warehouse relation.

use crate::config::IngestConfig;
use crate::error::Result;
use crate::fingerprint::file_fingerprint;
use crate::sql::{quote_literal, quote_relation};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the rolling copy under `Results/`.
pub const RESULTS_FILE_NAME: &str = "bank_transactions.csv";

/// Written next to every snapshot as `<relation>_manifest_<timestamp>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub table: String,
    pub csv_path: String,
    pub results_path: String,
    pub row_count: u64,
    pub md5: String,
    pub results_md5: String,
    pub created_at_utc: String,
    pub date_folder: String,
    pub timestamp: String,
    #[serde(skip)]
    pub manifest_path: PathBuf,
}

/// Export `relation` (dotted, e.g. `prod_imart.view_bank_transactions`) to a
/// dated snapshot under `Archive/Bank/Exports` and to `Results/`.
pub fn export_csv_snapshot(
    conn: &Connection,
    config: &IngestConfig,
    relation: &str,
) -> Result<ExportManifest> {
    export_csv_snapshot_at(conn, config, relation, Utc::now())
}

pub fn export_csv_snapshot_at(
    conn: &Connection,
    config: &IngestConfig,
    relation: &str,
    now: DateTime<Utc>,
) -> Result<ExportManifest> {
    let date_folder = now.format("%Y%m%d").to_string();
    let timestamp = now.format("%Y%m%d_%H%M%S").to_string();
    let file_stem = relation.replace('.', "_");

    let date_dir = config.exports_dir().join(&date_folder);
    fs::create_dir_all(&date_dir)?;
    fs::create_dir_all(config.results_dir())?;

    let csv_path = date_dir.join(format!("{}_{}.csv", file_stem, timestamp));
    let manifest_path = date_dir.join(format!("{}_manifest_{}.json", file_stem, timestamp));
    let results_path = config.results_dir().join(RESULTS_FILE_NAME);

    let source = quote_relation(relation);
    copy_to_csv(conn, &source, &csv_path)?;
    copy_to_csv(conn, &source, &results_path)?;
    let row_count: i64 =
        conn.query_row(&format!("SELECT COUNT(*) FROM {}", source), [], |row| row.get(0))?;

    let manifest = ExportManifest {
        table: relation.to_string(),
        csv_path: csv_path.display().to_string(),
        results_path: results_path.display().to_string(),
        row_count: row_count.max(0) as u64,
        md5: file_fingerprint(&csv_path)?,
        results_md5: file_fingerprint(&results_path)?,
        created_at_utc: now.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        date_folder,
        timestamp,
        manifest_path,
    };
    fs::write(&manifest.manifest_path, serde_json::to_string_pretty(&manifest)?)?;

    info!(
        relation,
        rows = manifest.row_count,
        "Exported snapshot to {}",
        csv_path.display()
    );
    Ok(manifest)
}

fn copy_to_csv(conn: &Connection, source: &str, target: &Path) -> Result<()> {
    // COPY targets cannot be bound as parameters
    let sql = format!(
        "COPY (SELECT * FROM {}) TO {} (HEADER, DELIMITER ',')",
        source,
        quote_literal(&target.to_string_lossy())
    );
    conn.execute_batch(&sql)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn warehouse() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE SCHEMA prod_imart;
             CREATE TABLE prod_imart.view_bank_transactions (id INTEGER, memo VARCHAR);
             INSERT INTO prod_imart.view_bank_transactions VALUES (1, 'rent'), (2, 'it''s');",
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_export_writes_snapshot_results_and_manifest() {
        let tmp = TempDir::new().unwrap();
        let config = IngestConfig::for_data_root(tmp.path());
        let conn = warehouse();
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 7, 8, 9).unwrap();

        let manifest =
            export_csv_snapshot_at(&conn, &config, "prod_imart.view_bank_transactions", now)
                .unwrap();

        let csv_path = tmp
            .path()
            .join("Archive/Bank/Exports/20250506")
            .join("prod_imart_view_bank_transactions_20250506_070809.csv");
        assert_eq!(manifest.csv_path, csv_path.display().to_string());
        assert_eq!(manifest.row_count, 2);
        assert_eq!(manifest.date_folder, "20250506");
        assert_eq!(manifest.timestamp, "20250506_070809");
        assert_eq!(manifest.created_at_utc, "2025-05-06T07:08:09Z");

        let snapshot = fs::read_to_string(&csv_path).unwrap();
        assert!(snapshot.starts_with("id,memo"));
        let results = fs::read_to_string(tmp.path().join("Results/bank_transactions.csv")).unwrap();
        assert_eq!(snapshot, results);
        assert_eq!(manifest.md5, manifest.results_md5);
        assert_eq!(manifest.md5, format!("{:x}", md5::compute(snapshot.as_bytes())));

        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&manifest.manifest_path).unwrap()).unwrap();
        assert_eq!(written["table"], "prod_imart.view_bank_transactions");
        assert_eq!(written["row_count"], 2);
        assert!(written.get("manifest_path").is_none());
    }

    #[test]
    fn test_export_unknown_relation_fails() {
        let tmp = TempDir::new().unwrap();
        let config = IngestConfig::for_data_root(tmp.path());
        let conn = warehouse();

        assert!(export_csv_snapshot(&conn, &config, "prod_imart.missing").is_err());
    }
}
