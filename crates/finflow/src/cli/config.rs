//! `finflow config`

use super::output::print_json;
use anyhow::Result;
use finflow_ingest::IngestConfig;
use std::path::PathBuf;

pub struct ConfigArgs {
    pub config: IngestConfig,
    pub config_file: Option<PathBuf>,
    pub json: bool,
}

pub fn run(args: ConfigArgs) -> Result<()> {
    let config = &args.config;
    if args.json {
        return print_json(&serde_json::json!({
            "config_file": args.config_file,
            "data_root": config.data_root,
            "inbox_dir": config.inbox_dir(),
            "database_path": config.database_path,
            "stability_seconds": config.stability_seconds,
            "raw_schema": config.raw_schema,
            "meta_schema": config.meta_schema,
            "reset_policy": config.reset_policy.as_str(),
        }));
    }

    let source = args
        .config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());
    println!("Config file:       {}", source);
    println!("Data root:         {}", config.data_root.display());
    println!("Inbox:             {}", config.inbox_dir().display());
    println!("Database:          {}", config.database_path.display());
    println!("Stability window:  {}s", config.stability_seconds);
    println!("Raw schema:        {}", config.raw_schema);
    println!("Meta schema:       {}", config.meta_schema);
    println!("Reset policy:      {}", config.reset_policy.as_str());
    Ok(())
}
