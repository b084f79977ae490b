mod cli;
mod config;
mod tui;

use anyhow::Result;
use clap::Parser; // needed for Cli::parse()
use simplelog::{ConfigBuilder, WriteLogger};
use std::fs::{self, OpenOptions};

use cli::commands::run_cli;
use cli::opts::Cli;
use config::ResolvedConfig;

fn main() -> Result<()> {
    let args = Cli::parse();
    let file_config = config::load_config(args.config.as_deref())?;
    let cfg = config::resolve(&file_config, args.root.as_deref(), args.log_level.as_deref())?;
    init_logging(&cfg);

    log::info!("deckard starting with root {}", cfg.root.display());
    run_cli(args, &cfg)
}

// Logging goes to a file so it never tears the TUI.
fn init_logging(cfg: &ResolvedConfig) {
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Some(dir) = cfg.log_file.parent() {
        let _ = fs::create_dir_all(dir);
    }
    match OpenOptions::new().create(true).append(true).open(&cfg.log_file) {
        Ok(file) => {
            let _ = WriteLogger::init(cfg.log_level, log_config, file);
        }
        Err(e) => eprintln!("warning: cannot open log file {}: {e}", cfg.log_file.display()),
    }
}
