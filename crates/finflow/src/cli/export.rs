//! `finflow export`

use super::output::print_json;
use anyhow::{Context, Result};
use finflow_ingest::db::open_database;
use finflow_ingest::{export_csv_snapshot, IngestConfig};

pub struct ExportArgs {
    pub config: IngestConfig,
    pub relation: String,
    pub json: bool,
}

pub fn run(args: ExportArgs) -> Result<()> {
    let conn = open_database(&args.config.database_path).context("Failed to open warehouse")?;
    let manifest = export_csv_snapshot(&conn, &args.config, &args.relation)
        .with_context(|| format!("Failed to export {}", args.relation))?;

    if args.json {
        return print_json(&manifest);
    }
    println!("Exported {} rows from {}", manifest.row_count, manifest.table);
    println!("  snapshot: {} (md5 {})", manifest.csv_path, manifest.md5);
    println!("  results:  {} (md5 {})", manifest.results_path, manifest.results_md5);
    println!("  manifest: {}", manifest.manifest_path.display());
    Ok(())
}
