//! Configuration for an ingestion run
//!
//! The configuration is resolved once at process start (file, then explicit
//! overrides) and handed to the [`Ingestor`](crate::Ingestor) by value. Nothing
//! in this crate reads process environment on its own.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inbox location relative to the data root.
pub const INBOX_SEGMENTS: &[&str] = &["To Parse", "Bank"];

/// What happens to a raw table when its directory receives a new file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetPolicy {
    /// Drop the raw table before the first new file of a run and rebuild it
    /// from every source file still present in the directory.
    #[default]
    RebuildOnNewFile,
    /// Never drop; new files are appended to the existing raw table.
    Append,
}

impl ResetPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetPolicy::RebuildOnNewFile => "rebuild",
            ResetPolicy::Append => "append",
        }
    }

    /// Whether a directory with `new_files` new files gets its raw table
    /// dropped and rebuilt before they are loaded.
    pub fn rebuilds_table(&self, new_files: usize) -> bool {
        match self {
            ResetPolicy::RebuildOnNewFile => new_files > 0,
            ResetPolicy::Append => false,
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rebuild" | "rebuild_on_new_file" => Ok(ResetPolicy::RebuildOnNewFile),
            "append" => Ok(ResetPolicy::Append),
            other => Err(IngestError::Config(format!(
                "unknown reset policy '{}' (expected 'rebuild' or 'append')",
                other
            ))),
        }
    }
}

/// Main configuration for ingestion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Finance data directory; ledger paths are relative to it
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Path to the DuckDB warehouse file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Seconds a file's size must stay unchanged before it is read
    #[serde(default = "default_stability_seconds")]
    pub stability_seconds: u64,

    /// Schema holding the raw tables
    #[serde(default = "default_raw_schema")]
    pub raw_schema: String,

    /// Schema holding the ingest ledger
    #[serde(default = "default_meta_schema")]
    pub meta_schema: String,

    #[serde(default)]
    pub reset_policy: ResetPolicy,
}

fn default_data_root() -> PathBuf {
    PathBuf::from("/app/data/finance")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("/app/data/warehouse/analytics.duckdb")
}

fn default_stability_seconds() -> u64 {
    8
}

fn default_raw_schema() -> String {
    "prod_raw".to_string()
}

fn default_meta_schema() -> String {
    "prod_meta".to_string()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            data_root: default_data_root(),
            database_path: default_database_path(),
            stability_seconds: default_stability_seconds(),
            raw_schema: default_raw_schema(),
            meta_schema: default_meta_schema(),
            reset_policy: ResetPolicy::default(),
        }
    }
}

/// Explicit values that take precedence over the config file.
///
/// The CLI fills this from flags and their environment fallbacks.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub data_root: Option<PathBuf>,
    pub database_path: Option<PathBuf>,
    pub stability_seconds: Option<u64>,
    pub reset_policy: Option<ResetPolicy>,
}

impl IngestConfig {
    /// Configuration rooted at `data_root` with the database stored inside it.
    pub fn for_data_root(data_root: impl Into<PathBuf>) -> Self {
        let data_root = data_root.into();
        let database_path = data_root.join("warehouse").join("analytics.duckdb");
        Self {
            data_root,
            database_path,
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: IngestConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise start from defaults, then apply overrides.
    pub fn resolve(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        config.validate()?;
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        if let Some(data_root) = overrides.data_root {
            self.data_root = data_root;
        }
        if let Some(database_path) = overrides.database_path {
            self.database_path = database_path;
        }
        if let Some(seconds) = overrides.stability_seconds {
            self.stability_seconds = seconds;
        }
        if let Some(policy) = overrides.reset_policy {
            self.reset_policy = policy;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.raw_schema.trim().is_empty() || self.meta_schema.trim().is_empty() {
            return Err(IngestError::Config("schema names must not be empty".to_string()));
        }
        if self.raw_schema == self.meta_schema {
            return Err(IngestError::Config(format!(
                "raw and meta schema must differ (both '{}')",
                self.raw_schema
            )));
        }
        Ok(())
    }

    /// `<data_root>/To Parse/Bank`
    pub fn inbox_dir(&self) -> PathBuf {
        INBOX_SEGMENTS
            .iter()
            .fold(self.data_root.clone(), |path, segment| path.join(segment))
    }

    /// `<data_root>/Archive/Bank`
    pub fn archive_dir(&self) -> PathBuf {
        self.data_root.join("Archive").join("Bank")
    }

    /// `<data_root>/Archive/Bank/Exports`
    pub fn exports_dir(&self) -> PathBuf {
        self.archive_dir().join("Exports")
    }

    /// `<data_root>/Results`
    pub fn results_dir(&self) -> PathBuf {
        self.data_root.join("Results")
    }

    pub fn stability_cooldown(&self) -> Duration {
        Duration::from_secs(self.stability_seconds)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| IngestError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = IngestConfig::default();
        assert_eq!(config.stability_seconds, 8);
        assert_eq!(config.stability_cooldown(), Duration::from_secs(8));
        assert_eq!(config.raw_schema, "prod_raw");
        assert_eq!(config.meta_schema, "prod_meta");
        assert_eq!(config.reset_policy, ResetPolicy::RebuildOnNewFile);
        assert_eq!(
            config.inbox_dir(),
            PathBuf::from("/app/data/finance/To Parse/Bank")
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: IngestConfig = toml::from_str(
            r#"
            data_root = "/srv/finance"
            reset_policy = "append"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_root, PathBuf::from("/srv/finance"));
        assert_eq!(config.reset_policy, ResetPolicy::Append);
        assert_eq!(config.stability_seconds, 8);
        assert_eq!(config.raw_schema, "prod_raw");
    }

    #[test]
    fn test_overrides_win_over_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("finflow.toml");
        let mut file_config = IngestConfig::for_data_root("/from/file");
        file_config.stability_seconds = 30;
        file_config.save(&path).unwrap();

        let config = IngestConfig::resolve(
            Some(&path),
            ConfigOverrides {
                data_root: Some(PathBuf::from("/from/flag")),
                stability_seconds: Some(0),
                ..ConfigOverrides::default()
            },
        )
        .unwrap();

        assert_eq!(config.data_root, PathBuf::from("/from/flag"));
        assert_eq!(config.stability_seconds, 0);
        assert_eq!(
            config.database_path,
            PathBuf::from("/from/file/warehouse/analytics.duckdb")
        );
    }

    #[test]
    fn test_rejects_shared_schema() {
        let config = IngestConfig {
            meta_schema: "prod_raw".to_string(),
            ..IngestConfig::default()
        };
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));
    }

    #[test]
    fn test_reset_policy_parse() {
        assert_eq!(ResetPolicy::parse("rebuild").unwrap(), ResetPolicy::RebuildOnNewFile);
        assert_eq!(ResetPolicy::parse(" Append ").unwrap(), ResetPolicy::Append);
        assert!(ResetPolicy::parse("truncate").is_err());
    }

    #[test]
    fn test_reset_policy_rebuilds_table() {
        assert!(ResetPolicy::RebuildOnNewFile.rebuilds_table(1));
        assert!(!ResetPolicy::RebuildOnNewFile.rebuilds_table(0));
        assert!(!ResetPolicy::Append.rebuilds_table(3));
    }
}
