//! Finflow Ingest - Idempotent Statement Ingestion
//!
//! Moves bank-statement CSV files from the inbox into a text-typed raw layer
//! inside an embedded DuckDB database, recording every file in an append-only
//! ledger so that re-running the pipeline never loads the same file twice.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────┐     ┌─────────────┐     ┌───────────────┐
//! │    Inbox     │     │  Stability  │     │   Ledger    │     │   Raw table   │
//! │ (To Parse/   │────▶│    gate     │────▶│ (src_path,  │────▶│ (__load_key,  │
//! │  Bank/...)   │     │ (cooldown)  │     │    md5)     │     │  text cols)   │
//! └──────────────┘     └─────────────┘     └─────────────┘     └───────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Fingerprint**: md5 of a whole file (ledger key) or of one row (load key)
//! - **Ledger**: `prod_meta.ingest_ledger`, one row per ingested file
//! - **Raw table**: `prod_raw.<bank>_<statement_type>`, every source column as text
//! - **Reset policy**: what happens to a raw table when its directory gets a new file

pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod fingerprint;
pub mod ingest;
pub mod ledger;
pub mod naming;
pub mod raw_table;
pub mod scanner;
pub mod sql;
pub mod types;

// Re-exports for convenience
pub use archive::{archive_processed_files, ArchivedFile};
pub use config::{ConfigOverrides, IngestConfig, ResetPolicy};
pub use error::{IngestError, Result};
pub use export::{export_csv_snapshot, ExportManifest};
pub use fingerprint::{
    file_fingerprint, fingerprint_file, row_fingerprint_expression, FileFingerprint,
};
pub use ingest::Ingestor;
pub use ledger::Ledger;
pub use naming::derive_table_name;
pub use scanner::{SizeCooldownGate, Stability, StabilityGate, StatementDir};
pub use sql::{quote_identifier, quote_relation, quote_table};
pub use types::{CandidateFile, FileOutcome, FileReport, IngestedFile, RunStats};
