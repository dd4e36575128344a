#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod cli;
mod error_fmt;
mod logging;
mod navigate;
mod rt;
mod supervise;

use std::path::Path;

use clap::Parser;
use rover_config::Config;
use rover_core::RoverError;

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    if let Err(err) = run(cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;

    let level = cli
        .log_level
        .clone()
        .or_else(|| cfg.logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    logging::init(cli.json, &level, &cfg.logging)?;

    match cli.cmd {
        Commands::Supervise {
            duration_ms,
            rt,
            rt_prio,
        } => supervise::run(&cfg, duration_ms, rt, rt_prio, cli.json),
        Commands::Navigate { max_ms, auto } => navigate::run(&cfg, max_ms, auto, cli.json),
        Commands::SelfCheck => supervise::self_check(&cfg, cli.json),
        Commands::PrintConfig => {
            print!("{}", cfg.to_toml()?);
            Ok(())
        }
    }
}

/// An explicit `--config` must exist; the default path falls back to defaults.
fn load_config(explicit: Option<&Path>) -> eyre::Result<Config> {
    let path = match explicit {
        Some(p) => p,
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if !default.exists() {
                return Ok(Config::default());
            }
            default
        }
    };
    rover_config::load_file(path).map_err(|e| RoverError::Config(format!("{e:#}")).into())
}
