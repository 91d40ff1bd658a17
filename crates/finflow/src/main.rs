//! Finflow command-line entry point
//!
//! Invoked once per scheduled run. Every command resolves the same
//! configuration (TOML file, then flags and their environment fallbacks)
//! before touching the warehouse.

use anyhow::Result;
use clap::{Parser, Subcommand};
use finflow_ingest::{ConfigOverrides, ResetPolicy};
use finflow_logging::{init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

#[derive(Parser, Debug)]
#[command(
    name = "finflow",
    version,
    about = "Idempotent bank statement ingestion into DuckDB"
)]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "FINFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Finance data directory containing "To Parse/Bank"
    #[arg(long, global = true, env = "FINANCE_DATA_DIR")]
    data_root: Option<PathBuf>,

    /// DuckDB warehouse file
    #[arg(long, global = true, env = "DUCKDB_PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load new statement files from the inbox into the raw layer
    Ingest {
        /// Seconds a file's size must stay unchanged before it is read
        #[arg(long, env = "RAW_STABILITY_SECONDS")]
        stability_seconds: Option<u64>,

        /// What to do with a raw table whose directory has new files
        #[arg(long, value_parser = parse_reset_policy)]
        reset_policy: Option<ResetPolicy>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move ingested files into the dated archive
    Archive {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a relation to a dated CSV snapshot and Results/
    Export {
        /// Dotted relation name
        #[arg(
            long,
            env = "EXPORT_FINANCE_TABLE",
            default_value = "prod_imart.view_bank_transactions"
        )]
        relation: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show ingest ledger entries, newest first
    Ledger {
        /// Maximum entries to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Show every entry
        #[arg(long, conflicts_with = "limit")]
        all: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the resolved configuration
    Config {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn parse_reset_policy(value: &str) -> std::result::Result<ResetPolicy, String> {
    ResetPolicy::parse(value).map_err(|e| e.to_string())
}

fn command_wants_json(command: &Commands) -> bool {
    match command {
        Commands::Ingest { json, .. } => *json,
        Commands::Archive { json } => *json,
        Commands::Export { json, .. } => *json,
        Commands::Ledger { json, .. } => *json,
        Commands::Config { json } => *json,
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let mut overrides = ConfigOverrides {
        data_root: cli.data_root,
        database_path: cli.database,
        ..ConfigOverrides::default()
    };
    let config_file = cli.config;

    match cli.command {
        Commands::Ingest {
            stability_seconds,
            reset_policy,
            json,
        } => {
            overrides.stability_seconds = stability_seconds;
            overrides.reset_policy = reset_policy;
            let config = cli::resolve_config(config_file.as_deref(), overrides)?;
            cli::ingest::run(cli::ingest::IngestArgs { config, json })
        }
        Commands::Archive { json } => {
            let config = cli::resolve_config(config_file.as_deref(), overrides)?;
            cli::archive::run(cli::archive::ArchiveArgs { config, json })
        }
        Commands::Export { relation, json } => {
            let config = cli::resolve_config(config_file.as_deref(), overrides)?;
            cli::export::run(cli::export::ExportArgs {
                config,
                relation,
                json,
            })
        }
        Commands::Ledger { limit, all, json } => {
            let config = cli::resolve_config(config_file.as_deref(), overrides)?;
            cli::ledger::run(cli::ledger::LedgerArgs {
                config,
                limit: if all { None } else { Some(limit) },
                json,
            })
        }
        Commands::Config { json } => {
            let config = cli::resolve_config(config_file.as_deref(), overrides)?;
            cli::config::run(cli::config::ConfigArgs {
                config,
                config_file,
                json,
            })
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = command_wants_json(&cli.command);

    if let Err(err) = init_logging(LogConfig {
        app_name: "finflow",
        verbose: cli.verbose,
    }) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::output::print_json_error(&err);
            } else {
                eprintln!("Error: {:?}", err);
            }
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_ingest_flags() {
        let cli = Cli::try_parse_from([
            "finflow",
            "--data-root",
            "/srv/finance",
            "ingest",
            "--stability-seconds",
            "0",
            "--reset-policy",
            "append",
            "--json",
        ])
        .unwrap();

        assert_eq!(cli.data_root, Some(PathBuf::from("/srv/finance")));
        match cli.command {
            Commands::Ingest {
                stability_seconds,
                reset_policy,
                json,
            } => {
                assert_eq!(stability_seconds, Some(0));
                assert_eq!(reset_policy, Some(ResetPolicy::Append));
                assert!(json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["finflow", "ledger", "-v", "--database", "/tmp/w.duckdb"])
            .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/w.duckdb")));
        assert!(matches!(cli.command, Commands::Ledger { limit: 20, all: false, .. }));
    }

    #[test]
    fn test_rejects_unknown_reset_policy() {
        assert!(Cli::try_parse_from(["finflow", "ingest", "--reset-policy", "truncate"]).is_err());
    }

    #[test]
    fn test_json_mode_detection() {
        let cli = Cli::try_parse_from(["finflow", "archive", "--json"]).unwrap();
        assert!(command_wants_json(&cli.command));
        let cli = Cli::try_parse_from(["finflow", "config"]).unwrap();
        assert!(!command_wants_json(&cli.command));
    }
}
