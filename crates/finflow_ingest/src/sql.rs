//! SQL text generation.
//!
//! Every schema, table and column name that reaches DuckDB goes through
//! [`quote_identifier`]. Data values never appear in generated text; they are
//! bound as statement parameters by the callers. File paths handed to
//! `read_csv_auto` and `COPY` are the exception: DuckDB binds table function
//! arguments at plan time, so they are rendered with [`quote_literal`].

use crate::fingerprint::row_fingerprint_expression;
use std::fmt;
use std::path::Path;

/// Load-key column present in every raw table.
pub const LOAD_KEY_COLUMN: &str = "__load_key";
/// Ingestion timestamp column present in every raw table.
pub const INGESTED_AT_COLUMN: &str = "__ingested_at";
/// Stand-in for NULL inside the row fingerprint.
pub const NULL_SENTINEL: &str = "<NULL>";

/// Quote an identifier for DuckDB (schema/table/column).
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a schema-qualified table name.
pub fn quote_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

/// Quote a dotted relation name segment by segment (`a.b` → `"a"."b"`).
pub fn quote_relation(path: &str) -> String {
    path.split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

/// Quote a string literal. Only used where DuckDB does not accept a parameter
/// (e.g. the target of `COPY ... TO`).
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// A schema-qualified table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&quote_table(&self.schema, &self.table))
    }
}

pub fn create_schema_sql(schema: &str) -> String {
    format!("CREATE SCHEMA IF NOT EXISTS {}", quote_identifier(schema))
}

pub fn drop_table_sql(table: &TableRef) -> String {
    format!("DROP TABLE IF EXISTS {}", table)
}

/// DDL for a raw table: load key, one text column per header, ingestion timestamp.
pub fn create_raw_table_sql(table: &TableRef, header_columns: &[String]) -> String {
    let mut columns = Vec::with_capacity(header_columns.len() + 2);
    columns.push(format!("{} VARCHAR(32)", quote_identifier(LOAD_KEY_COLUMN)));
    columns.extend(
        header_columns
            .iter()
            .map(|c| format!("{} TEXT", quote_identifier(c))),
    );
    columns.push(format!("{} TIMESTAMP", quote_identifier(INGESTED_AT_COLUMN)));
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        table,
        columns.join(", ")
    )
}

pub fn load_key_index_name(table: &str) -> String {
    format!("ix_{}_bk", table)
}

pub fn create_load_key_index_sql(table: &TableRef) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
        quote_identifier(&load_key_index_name(&table.table)),
        table,
        quote_identifier(LOAD_KEY_COLUMN)
    )
}

/// Table function reading a CSV with every value as text.
pub fn read_csv_as_text(path: &Path) -> String {
    format!(
        "read_csv_auto({}, header = true, all_varchar = true)",
        quote_literal(&path.to_string_lossy())
    )
}

/// `INSERT ... SELECT DISTINCT` aligned to the destination column order.
///
/// Destination columns missing from the file become NULL; file columns the
/// destination lacks are not selected, though they still feed the load key.
/// One parameter: the ingestion timestamp (text, cast to TIMESTAMP).
pub fn aligned_insert_sql(
    table: &TableRef,
    table_columns: &[String],
    file_columns: &[String],
    csv_path: &Path,
) -> String {
    let load_key = row_fingerprint_expression(file_columns);
    let aligned = table_columns
        .iter()
        .map(|col| {
            let ident = quote_identifier(col);
            if col == LOAD_KEY_COLUMN {
                format!("{} AS {}", load_key, ident)
            } else if col == INGESTED_AT_COLUMN {
                format!("CAST(? AS TIMESTAMP) AS {}", ident)
            } else if file_columns.contains(col) {
                format!("{} AS {}", ident, ident)
            } else {
                format!("NULL AS {}", ident)
            }
        })
        .collect::<Vec<_>>();

    format!(
        "INSERT INTO {} SELECT DISTINCT {} FROM {}",
        table,
        aligned.join(", "),
        read_csv_as_text(csv_path)
    )
}
