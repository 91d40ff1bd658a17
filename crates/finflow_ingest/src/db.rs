//! DuckDB connection handling and timestamp conversion.

use crate::error::Result;
use chrono::{DateTime, NaiveDateTime, Utc};
use duckdb::Connection;
use std::path::Path;
use tracing::info;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Open or create the warehouse database, creating its parent directory.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    info!(path = %path.display(), "Database opened");
    Ok(conn)
}

/// Render a UTC instant for binding into `CAST(? AS TIMESTAMP)`.
pub fn to_db_timestamp(at: &DateTime<Utc>) -> String {
    at.naive_utc().format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a `CAST(ts AS VARCHAR)` value back into UTC.
pub fn from_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), TIMESTAMP_PARSE_FORMAT)?;
    Ok(naive.and_utc())
}

/// Whether `schema.table` exists.
pub fn table_exists(conn: &Connection, schema: &str, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
        [schema, table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Column names of `schema.table` in declaration order (empty if absent).
pub fn table_columns(conn: &Connection, schema: &str, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT column_name FROM information_schema.columns \
         WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position",
    )?;
    let rows = stmt.query_map([schema, table], |row| row.get::<_, String>(0))?;
    let mut columns = Vec::new();
    for row in rows {
        columns.push(row?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_parent_directory() {
        let tmp = TempDir::new().unwrap();
        let db_path = tmp.path().join("warehouse").join("analytics.duckdb");

        let conn = open_database(&db_path).unwrap();
        conn.execute_batch("CREATE TABLE t (id BIGINT)").unwrap();
        drop(conn);

        assert!(db_path.exists());
    }

    #[test]
    fn test_timestamp_round_trip_through_duckdb() {
        let conn = Connection::open_in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 15, 8, 30, 0).unwrap();

        let text: String = conn
            .query_row(
                "SELECT CAST(CAST(? AS TIMESTAMP) AS VARCHAR)",
                [to_db_timestamp(&at)],
                |row| row.get(0),
            )
            .unwrap();

        assert_eq!(from_db_timestamp(&text).unwrap(), at);
    }

    #[test]
    fn test_table_columns_in_order() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE SCHEMA s; CREATE TABLE s.t (\"b\" TEXT, \"a\" TEXT)")
            .unwrap();

        assert!(table_exists(&conn, "s", "t").unwrap());
        assert!(!table_exists(&conn, "s", "missing").unwrap());
        assert_eq!(table_columns(&conn, "s", "t").unwrap(), vec!["b", "a"]);
        assert!(table_columns(&conn, "s", "missing").unwrap().is_empty());
    }
}
