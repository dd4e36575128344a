use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoverError {
    /// The arbiter or the routed bus itself misbehaved.
    #[error("bus error: {0}")]
    Bus(String),
    #[error("failed to open {device}: {reason}")]
    DeviceOpen { device: &'static str, reason: String },
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
