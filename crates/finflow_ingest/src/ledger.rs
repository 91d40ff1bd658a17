//! Append-only ingest ledger.
//!
//! One row per ingested source file, keyed by `(src_path, md5)`. Rows are
//! never deleted; only the archival columns are filled in later.

use crate::db::{from_db_timestamp, to_db_timestamp};
use crate::error::{IngestError, Result};
use crate::sql::{create_schema_sql, TableRef};
use crate::types::IngestedFile;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection, Row};

pub const LEDGER_TABLE: &str = "ingest_ledger";

const SELECT_COLUMNS: &str = "bank, table_name, file_name, src_path, size, md5, \
     CAST(ingested_at AS VARCHAR), CAST(archived_at AS VARCHAR), archived_path";

/// Handle to `<meta_schema>.ingest_ledger`.
#[derive(Debug, Clone)]
pub struct Ledger {
    table: TableRef,
}

/// Ledger row as read from DuckDB, before timestamp parsing.
struct LedgerRow {
    bank: String,
    table_name: String,
    file_name: String,
    src_path: String,
    size: i64,
    md5: String,
    ingested_at: String,
    archived_at: Option<String>,
    archived_path: Option<String>,
}

impl LedgerRow {
    fn from_row(row: &Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            bank: row.get(0)?,
            table_name: row.get(1)?,
            file_name: row.get(2)?,
            src_path: row.get(3)?,
            size: row.get(4)?,
            md5: row.get(5)?,
            ingested_at: row.get(6)?,
            archived_at: row.get(7)?,
            archived_path: row.get(8)?,
        })
    }

    fn into_entry(self) -> Result<IngestedFile> {
        let size = u64::try_from(self.size).map_err(|_| {
            IngestError::InvalidState(format!(
                "negative size {} in ledger for {}",
                self.size, self.src_path
            ))
        })?;
        Ok(IngestedFile {
            bank: self.bank,
            table_name: self.table_name,
            file_name: self.file_name,
            src_path: self.src_path,
            size,
            md5: self.md5,
            ingested_at: from_db_timestamp(&self.ingested_at)?,
            archived_at: self.archived_at.as_deref().map(from_db_timestamp).transpose()?,
            archived_path: self.archived_path,
        })
    }
}

impl Ledger {
    pub fn new(meta_schema: impl Into<String>) -> Self {
        Self {
            table: TableRef::new(meta_schema, LEDGER_TABLE),
        }
    }

    /// Create the schema and ledger table if absent.
    ///
    /// Ledgers created before archival tracking get the `archived_path`
    /// column added in place.
    pub fn ensure(&self, conn: &Connection) -> Result<()> {
        conn.execute(&create_schema_sql(&self.table.schema), [])?;
        conn.execute(
            &format!(
                "CREATE TABLE IF NOT EXISTS {} (
                    bank VARCHAR(32),
                    table_name VARCHAR(128),
                    file_name VARCHAR(256),
                    src_path VARCHAR(512),
                    size BIGINT,
                    md5 VARCHAR(32),
                    ingested_at TIMESTAMP,
                    archived_at TIMESTAMP,
                    archived_path VARCHAR(512)
                )",
                self.table
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "ALTER TABLE {} ADD COLUMN IF NOT EXISTS archived_path VARCHAR(512)",
                self.table
            ),
            [],
        )?;
        Ok(())
    }

    /// Whether this exact file content at this path was already ingested.
    pub fn contains(&self, conn: &Connection, src_path: &str, md5: &str) -> Result<bool> {
        let count: i64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE src_path = ? AND md5 = ?",
                self.table
            ),
            [src_path, md5],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Append one ledger row. Runs on the caller's transaction.
    pub fn record(&self, conn: &Connection, entry: &IngestedFile) -> Result<()> {
        let size = i64::try_from(entry.size).map_err(|_| {
            IngestError::InvalidState(format!("file too large to record: {}", entry.src_path))
        })?;
        conn.execute(
            &format!(
                "INSERT INTO {} (bank, table_name, file_name, src_path, size, md5, ingested_at)
                 VALUES (?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP))",
                self.table
            ),
            params![
                entry.bank,
                entry.table_name,
                entry.file_name,
                entry.src_path,
                size,
                entry.md5,
                to_db_timestamp(&entry.ingested_at),
            ],
        )?;
        Ok(())
    }

    /// Rows not yet archived, oldest first.
    pub fn pending_archive(&self, conn: &Connection) -> Result<Vec<IngestedFile>> {
        self.query(
            conn,
            &format!(
                "SELECT {} FROM {} WHERE archived_at IS NULL ORDER BY ingested_at, src_path",
                SELECT_COLUMNS, self.table
            ),
            [],
        )
    }

    /// Stamp a row as archived. Returns the number of rows updated.
    pub fn mark_archived(
        &self,
        conn: &Connection,
        src_path: &str,
        md5: &str,
        archived_path: &str,
        at: &DateTime<Utc>,
    ) -> Result<usize> {
        let updated = conn.execute(
            &format!(
                "UPDATE {} SET archived_at = CAST(? AS TIMESTAMP), archived_path = ?
                 WHERE src_path = ? AND md5 = ?",
                self.table
            ),
            params![to_db_timestamp(at), archived_path, src_path, md5],
        )?;
        Ok(updated)
    }

    /// Most recent rows first; all rows when `limit` is `None`.
    pub fn list(&self, conn: &Connection, limit: Option<usize>) -> Result<Vec<IngestedFile>> {
        let mut sql = format!(
            "SELECT {} FROM {} ORDER BY ingested_at DESC, src_path",
            SELECT_COLUMNS, self.table
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        self.query(conn, &sql, [])
    }

    /// Every row recorded for one raw table, oldest first.
    pub fn known_for_table(
        &self,
        conn: &Connection,
        table_name: &str,
    ) -> Result<Vec<IngestedFile>> {
        self.query(
            conn,
            &format!(
                "SELECT {} FROM {} WHERE table_name = ? ORDER BY ingested_at, src_path",
                SELECT_COLUMNS, self.table
            ),
            [table_name],
        )
    }

    fn query<P: duckdb::Params>(
        &self,
        conn: &Connection,
        sql: &str,
        params: P,
    ) -> Result<Vec<IngestedFile>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params, LedgerRow::from_row)?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?.into_entry()?);
        }
        Ok(entries)
    }
}
