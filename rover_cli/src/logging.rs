//! Console and file logging setup.

use std::path::Path;

use eyre::WrapErr;
use tracing_appender::{non_blocking::NonBlocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::FILE_GUARD;

/// Install the global subscriber. `RUST_LOG` wins over `level` when set.
///
/// Console output goes to stderr so command results on stdout stay clean.
pub fn init(json: bool, level: &str, cfg: &rover_config::Logging) -> eyre::Result<()> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(spec) if !spec.trim().is_empty() => EnvFilter::try_new(spec),
        _ => EnvFilter::try_new(level),
    }
    .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let pretty = (!json).then(|| fmt::layer().with_writer(std::io::stderr).with_target(false));
    let structured = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let writer = match cfg.file.as_deref() {
        Some(path) => Some(file_writer(Path::new(path), cfg.rotation.as_deref())?),
        None => None,
    };
    let file = writer.map(|w| fmt::layer().json().with_ansi(false).with_writer(w));

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(structured)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("init logging: {e}"))
}

fn file_writer(path: &Path, rotation: Option<&str>) -> eyre::Result<NonBlocking> {
    let dir = path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .ok_or_else(|| eyre::eyre!("logging.file {path:?} has no file name"))?;
    let appender = match rotation.unwrap_or("never") {
        "daily" => rolling::daily(dir, name),
        "hourly" => rolling::hourly(dir, name),
        "never" => rolling::never(dir, name),
        other => eyre::bail!("logging.rotation must be never|daily|hourly, got {other:?}"),
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);
    // The guard flushes on drop; keep it for the life of the process.
    let _ = FILE_GUARD.set(guard);
    Ok(writer)
}
