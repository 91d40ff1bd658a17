//! `finflow ledger`

use super::output::{format_size, format_timestamp, print_json, print_table};
use anyhow::{Context, Result};
use finflow_ingest::db::open_database;
use finflow_ingest::{IngestConfig, IngestedFile, Ledger};

pub struct LedgerArgs {
    pub config: IngestConfig,
    pub limit: Option<usize>,
    pub json: bool,
}

pub fn run(args: LedgerArgs) -> Result<()> {
    let conn = open_database(&args.config.database_path).context("Failed to open warehouse")?;
    let ledger = Ledger::new(args.config.meta_schema.clone());
    ledger.ensure(&conn)?;
    let entries = ledger
        .list(&conn, args.limit)
        .context("Failed to read ingest ledger")?;

    if args.json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("Ledger is empty");
        return Ok(());
    }
    let rows = entries.iter().map(entry_row).collect();
    print_table(&["Ingested", "Table", "Source", "Size", "MD5", "Archived"], rows);
    Ok(())
}

fn entry_row(entry: &IngestedFile) -> Vec<String> {
    vec![
        format_timestamp(&entry.ingested_at),
        entry.table_name.clone(),
        entry.src_path.clone(),
        format_size(entry.size),
        entry.md5.chars().take(8).collect(),
        entry
            .archived_path
            .clone()
            .unwrap_or_else(|| "-".to_string()),
    ]
}
