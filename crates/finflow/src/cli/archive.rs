//! `finflow archive`

use super::output::{print_json, print_table};
use anyhow::{Context, Result};
use finflow_ingest::db::open_database;
use finflow_ingest::{archive_processed_files, IngestConfig};

pub struct ArchiveArgs {
    pub config: IngestConfig,
    pub json: bool,
}

pub fn run(args: ArchiveArgs) -> Result<()> {
    let conn = open_database(&args.config.database_path).context("Failed to open warehouse")?;
    let archived = archive_processed_files(&conn, &args.config).context("Archival failed")?;

    if args.json {
        return print_json(&archived);
    }

    if archived.is_empty() {
        println!("Nothing to archive");
        return Ok(());
    }
    let rows = archived
        .iter()
        .map(|file| vec![file.bank.clone(), file.src_path.clone(), file.archived_to.clone()])
        .collect();
    print_table(&["Bank", "From", "To"], rows);
    println!("Archived {} file(s)", archived.len());
    Ok(())
}
