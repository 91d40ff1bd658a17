//! `finflow ingest`

use super::output::{print_json, print_table};
use anyhow::{Context, Result};
use finflow_ingest::{FileOutcome, IngestConfig, Ingestor, RunStats};

pub struct IngestArgs {
    pub config: IngestConfig,
    pub json: bool,
}

pub fn run(args: IngestArgs) -> Result<()> {
    let mut ingestor = Ingestor::open(args.config).context("Failed to open warehouse")?;
    let stats = ingestor.run().context("Ingestion run failed")?;

    if args.json {
        return print_json(&stats);
    }
    print_summary(&stats);
    Ok(())
}

fn outcome_label(outcome: &FileOutcome) -> (&'static str, String) {
    match outcome {
        FileOutcome::Ingested { rows } => ("ingested", rows.to_string()),
        FileOutcome::SkippedDuplicate => ("duplicate", "-".to_string()),
        FileOutcome::Replayed { rows } => ("replayed", rows.to_string()),
        FileOutcome::SkippedUnstable => ("unstable", "-".to_string()),
    }
}

fn print_summary(stats: &RunStats) {
    if !stats.files.is_empty() {
        let rows = stats
            .files
            .iter()
            .map(|report| {
                let (status, rows) = outcome_label(&report.outcome);
                vec![
                    report.path.display().to_string(),
                    report.table_name.clone(),
                    status.to_string(),
                    rows,
                ]
            })
            .collect();
        print_table(&["File", "Table", "Status", "Rows"], rows);
    }

    println!(
        "Ingested {} file(s) ({} rows), skipped {}, unstable {}",
        stats.ingested, stats.rows_inserted, stats.skipped, stats.unstable
    );
    if stats.rows_replayed > 0 {
        println!("Replayed {} row(s) into rebuilt tables", stats.rows_replayed);
    }
}
