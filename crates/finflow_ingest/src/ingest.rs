//! Ingestion driver.
//!
//! Walks the inbox one statement directory at a time. Each file passes the
//! stability gate, is fingerprinted and checked against the ledger, and new
//! files are loaded in their own transaction together with their ledger row.

use crate::config::IngestConfig;
use crate::db::open_database;
use crate::error::{IngestError, Result};
use crate::fingerprint::fingerprint_file;
use crate::ledger::Ledger;
use crate::raw_table::{drop_raw_table, load_file};
use crate::scanner::{
    csv_files, relative_src_path, statement_dirs, SizeCooldownGate, Stability, StabilityGate,
    StatementDir,
};
use crate::sql::{create_schema_sql, TableRef};
use crate::types::{CandidateFile, FileOutcome, RunStats};
use chrono::{DateTime, Utc};
use duckdb::Connection;
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

/// Where a scanned file stands before anything is written.
#[derive(Debug)]
enum Classified {
    Unstable(PathBuf),
    Duplicate(CandidateFile),
    New(CandidateFile),
}

/// Runs ingestion against one DuckDB connection.
pub struct Ingestor {
    conn: Connection,
    config: IngestConfig,
    ledger: Ledger,
    gate: Box<dyn StabilityGate>,
}

impl Ingestor {
    /// Open the configured database and build an ingestor over it.
    pub fn open(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        let conn = open_database(&config.database_path)?;
        Self::with_connection(conn, config)
    }

    pub fn with_connection(conn: Connection, config: IngestConfig) -> Result<Self> {
        config.validate()?;
        let ledger = Ledger::new(config.meta_schema.clone());
        let gate = Box::new(SizeCooldownGate::new(config.stability_cooldown()));
        Ok(Self {
            conn,
            config,
            ledger,
            gate,
        })
    }

    /// Replace the default size/cooldown gate.
    pub fn with_stability_gate(mut self, gate: impl StabilityGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Ingest every stable, not yet ledgered CSV file in the inbox.
    ///
    /// Fails before touching the database if the inbox does not exist. A
    /// failing file aborts the run; files committed before it stay committed.
    pub fn run(&mut self) -> Result<RunStats> {
        let inbox = self.config.inbox_dir();
        let dirs = match statement_dirs(&inbox) {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("{}", e);
                return Err(e);
            }
        };

        self.ledger.ensure(&self.conn)?;
        self.conn
            .execute(&create_schema_sql(&self.config.raw_schema), [])?;

        let mut stats = RunStats::new();
        for dir in &dirs {
            self.ingest_directory(dir, &mut stats)?;
        }

        info!(
            ingested = stats.ingested,
            skipped = stats.skipped,
            unstable = stats.unstable,
            "Ingestion complete. New files: {}, skipped: {}",
            stats.ingested,
            stats.skipped
        );
        Ok(stats)
    }

    fn ingest_directory(&mut self, dir: &StatementDir, stats: &mut RunStats) -> Result<()> {
        let table = TableRef::new(self.config.raw_schema.clone(), dir.table_name.clone());

        let mut new_files = Vec::new();
        let mut known_files = Vec::new();
        for path in csv_files(&dir.path)? {
            match self.classify(dir, path)? {
                Classified::Unstable(path) => {
                    info!("Skipping unstable file: {}", path.display());
                    stats.record(path, &dir.table_name, FileOutcome::SkippedUnstable);
                }
                Classified::Duplicate(candidate) => known_files.push(candidate),
                Classified::New(candidate) => new_files.push(candidate),
            }
        }

        if self.config.reset_policy.rebuilds_table(new_files.len()) {
            for (candidate, rows) in self.rebuild_table(&table, known_files)? {
                stats.record(candidate.path, &dir.table_name, FileOutcome::Replayed { rows });
            }
        } else {
            for candidate in known_files {
                info!("Skipping already processed file: {}", candidate.path.display());
                stats.record(candidate.path, &dir.table_name, FileOutcome::SkippedDuplicate);
            }
        }

        for candidate in new_files {
            let rows = self.ingest_file(&table, &candidate)?;
            stats.record(candidate.path, &dir.table_name, FileOutcome::Ingested { rows });
        }
        Ok(())
    }

    /// Stability first, then fingerprint and ledger lookup.
    ///
    /// The recorded size is the number of bytes hashed; a file whose size
    /// moved after the gate passed it is left for the next run.
    fn classify(&self, dir: &StatementDir, path: PathBuf) -> Result<Classified> {
        let gate_size = match self.gate.check(&path) {
            Stability::Stable { size } => size,
            Stability::Unstable => return Ok(Classified::Unstable(path)),
        };

        let fingerprint = match fingerprint_file(&path) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Could not fingerprint file");
                return Ok(Classified::Unstable(path));
            }
        };
        if fingerprint.size != gate_size {
            debug!(
                path = %path.display(),
                gate_size,
                hashed = fingerprint.size,
                "File changed after the stability check"
            );
            return Ok(Classified::Unstable(path));
        }

        let candidate = CandidateFile {
            src_path: relative_src_path(&path, &self.config.data_root),
            bank: dir.bank.clone(),
            table_name: dir.table_name.clone(),
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            size: fingerprint.size,
            md5: fingerprint.md5,
            path,
        };

        if self
            .ledger
            .contains(&self.conn, &candidate.src_path, &candidate.md5)?
        {
            Ok(Classified::Duplicate(candidate))
        } else {
            Ok(Classified::New(candidate))
        }
    }

    /// Drop `table` and reload every already-ledgered file still in the inbox.
    ///
    /// Files are replayed in the order they were first ingested, so the
    /// rebuilt table takes its columns from the same file as before. Drop and
    /// reload share one transaction, so a failed reload leaves the previous
    /// table in place.
    fn rebuild_table(
        &mut self,
        table: &TableRef,
        mut known: Vec<CandidateFile>,
    ) -> Result<Vec<(CandidateFile, u64)>> {
        let ledger_order: HashMap<(String, String), usize> = self
            .ledger
            .known_for_table(&self.conn, &table.table)?
            .into_iter()
            .enumerate()
            .map(|(position, entry)| ((entry.src_path, entry.md5), position))
            .collect();
        let lost = ledger_order.len().saturating_sub(known.len());
        if lost > 0 {
            warn!(
                table = %table,
                files = lost,
                "Rebuild drops rows of ledgered files no longer in the inbox"
            );
        }
        known.sort_by_key(|c| {
            ledger_order
                .get(&(c.src_path.clone(), c.md5.clone()))
                .copied()
                .unwrap_or(usize::MAX)
        });

        info!(table = %table, replay = known.len(), "Rebuilding raw table");
        let ingested_at = Utc::now();
        let tx = self.conn.transaction()?;
        drop_raw_table(&tx, table)?;
        let mut replayed = Vec::with_capacity(known.len());
        for candidate in known {
            let rows = load_file(&tx, table, &candidate.path, &ingested_at)
                .map_err(|e| fail(&candidate, e))?;
            replayed.push((candidate, rows));
        }
        tx.commit()?;
        Ok(replayed)
    }

    fn ingest_file(&mut self, table: &TableRef, candidate: &CandidateFile) -> Result<u64> {
        let ingested_at = Utc::now();
        let rows = load_and_record(&mut self.conn, &self.ledger, table, candidate, ingested_at)
            .map_err(|e| fail(candidate, e))?;
        info!(
            rows,
            "Ingested {} -> {}",
            candidate.path.display(),
            table
        );
        Ok(rows)
    }
}

/// One transaction: raw rows plus the ledger row, or neither.
fn load_and_record(
    conn: &mut Connection,
    ledger: &Ledger,
    table: &TableRef,
    candidate: &CandidateFile,
    ingested_at: DateTime<Utc>,
) -> Result<u64> {
    let tx = conn.transaction()?;
    let rows = load_file(&tx, table, &candidate.path, &ingested_at)?;
    ledger.record(&tx, &candidate.to_ledger_entry(ingested_at))?;
    tx.commit()?;
    Ok(rows)
}

fn fail(candidate: &CandidateFile, source: IngestError) -> IngestError {
    error!(
        path = %candidate.path.display(),
        table = %candidate.table_name,
        error = %source,
        "Failed to ingest {}",
        candidate.path.display()
    );
    IngestError::ingestion(&candidate.path, source)
}
