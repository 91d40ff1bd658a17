//! Raw-table manager.
//!
//! Raw tables hold source rows verbatim as text. A table's columns are fixed
//! by the first file that creates it; later files are aligned by column name
//! at insert time.

use crate::db::{table_columns, to_db_timestamp};
use crate::error::Result;
use crate::sql::{
    aligned_insert_sql, create_load_key_index_sql, create_raw_table_sql, create_schema_sql,
    drop_table_sql, read_csv_as_text, TableRef, INGESTED_AT_COLUMN, LOAD_KEY_COLUMN,
};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use std::path::Path;
use tracing::{debug, warn};

/// Header columns of a CSV file as DuckDB reads them. An empty file has none.
pub fn file_columns(conn: &Connection, path: &Path) -> Result<Vec<String>> {
    if std::fs::metadata(path)?.len() == 0 {
        return Ok(Vec::new());
    }
    let sql = format!("DESCRIBE SELECT * FROM {}", read_csv_as_text(path));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

/// Create the raw table and its load-key index if absent.
///
/// An existing table is left untouched even if `header_columns` differ.
pub fn ensure_raw_table(
    conn: &Connection,
    table: &TableRef,
    header_columns: &[String],
) -> Result<()> {
    let create_schema = create_schema_sql(&table.schema);
    let create_table = create_raw_table_sql(table, header_columns);
    let create_index = create_load_key_index_sql(table);

    debug!("CREATE TABLE: {}", create_table);
    conn.execute(&create_schema, [])?;
    conn.execute(&create_table, [])?;
    conn.execute(&create_index, [])?;
    Ok(())
}

/// Drop a raw table (and with it its index).
pub fn drop_raw_table(conn: &Connection, table: &TableRef) -> Result<()> {
    let sql = drop_table_sql(table);
    debug!("DROP TABLE: {}", sql);
    conn.execute(&sql, [])?;
    Ok(())
}

/// Columns present on one side only when aligning a file to its table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaDrift {
    /// In the table, absent from the file: filled with NULL
    pub missing_in_file: Vec<String>,
    /// In the file, absent from the table: not loaded
    pub dropped_from_file: Vec<String>,
}

impl SchemaDrift {
    pub fn between(table_columns: &[String], file_columns: &[String]) -> Self {
        let missing_in_file = table_columns
            .iter()
            .filter(|c| c.as_str() != LOAD_KEY_COLUMN && c.as_str() != INGESTED_AT_COLUMN)
            .filter(|c| !file_columns.contains(c))
            .cloned()
            .collect();
        let dropped_from_file = file_columns
            .iter()
            .filter(|c| !table_columns.contains(c))
            .cloned()
            .collect();
        Self {
            missing_in_file,
            dropped_from_file,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.missing_in_file.is_empty() && self.dropped_from_file.is_empty()
    }
}

/// Ensure the table, then insert the file's distinct rows aligned to it.
///
/// Returns the number of rows inserted. Runs on whatever transaction the
/// caller holds. A file without a header neither creates the table nor
/// fixes its columns.
pub fn load_file(
    conn: &Connection,
    table: &TableRef,
    path: &Path,
    ingested_at: &DateTime<Utc>,
) -> Result<u64> {
    let file_cols = file_columns(conn, path)?;
    if file_cols.is_empty() {
        debug!(path = %path.display(), "Empty file, nothing to insert");
        return Ok(0);
    }
    ensure_raw_table(conn, table, &file_cols)?;

    let table_cols = table_columns(conn, &table.schema, &table.table)?;
    let drift = SchemaDrift::between(&table_cols, &file_cols);
    if !drift.is_empty() {
        warn!(
            path = %path.display(),
            table = %table,
            missing = ?drift.missing_in_file,
            dropped = ?drift.dropped_from_file,
            "File header differs from raw table; aligning by column name"
        );
    }

    let insert = aligned_insert_sql(table, &table_cols, &file_cols, path);
    debug!("INSERT: {}", insert);
    let rows = conn.execute(&insert, [to_db_timestamp(ingested_at)])?;
    Ok(rows as u64)
}
