//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

/// Config path used when `--config` is not given. A missing file here means
/// "run on defaults"; a missing explicit `--config` is an error.
pub const DEFAULT_CONFIG: &str = "etc/rover.toml";

#[derive(Parser, Debug)]
#[command(name = "rover", version, about = "Rover control CLI")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the hardware supervisor until ctrl-c or the duration elapses
    Supervise {
        /// Stop after this many milliseconds
        #[arg(long, value_name = "MS")]
        duration_ms: Option<u64>,
        /// Enable real-time mode (SCHED_FIFO)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority for the whole process so the 25 ms bus tick keeps its cadence under load. Needs CAP_SYS_NICE or root; on failure a warning is logged and the supervisor runs with normal scheduling."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO (1..=max)
        #[arg(
            long,
            value_name = "PRIO",
            long_help = "SCHED_FIFO priority when --rt is enabled. Range is platform-defined (usually 1..=99) and out-of-range values are clamped. Defaults to the maximum."
        )]
        rt_prio: Option<i32>,
    },
    /// Drive the simulated rover through the four colour targets
    Navigate {
        /// Give up after this many milliseconds
        #[arg(long, value_name = "MS")]
        max_ms: Option<u64>,
        /// Start a run immediately instead of waiting for `start` on stdin
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Start a run immediately.\n\nWithout --auto the engine waits for commands on stdin, one per line: start, stop, pause (toggles), snap (save the next frame) and quit."
        )]
        auto: bool,
    },
    /// Open and close one device session and report the result
    SelfCheck,
    /// Print the effective configuration as TOML
    PrintConfig,
}
