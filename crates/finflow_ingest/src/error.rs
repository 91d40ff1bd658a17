//! Error types for the ingestion layer

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Ingestion error type
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Timestamp error: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("No To Parse folder found at {}", .0.display())]
    InboxMissing(PathBuf),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A per-file transaction failed and was rolled back.
    #[error("Failed to ingest {}: {source}", path.display())]
    Ingestion {
        path: PathBuf,
        #[source]
        source: Box<IngestError>,
    },
}

impl IngestError {
    pub(crate) fn ingestion(path: impl Into<PathBuf>, source: IngestError) -> Self {
        Self::Ingestion {
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, IngestError>;
