use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TeleopError {
    #[error("hardware error: {0}")]
    Hardware(String),
    /// Device missing or connection lost; loops stop instead of retrying.
    #[error("hardware unavailable: {0}")]
    HardwareFault(String),
    #[error("{kind} id {id} out of range (device has {count})")]
    ChannelOutOfRange {
        kind: &'static str,
        id: usize,
        count: usize,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BuildError {
    #[error("filter window must be >= 1")]
    ZeroWindow,
    #[error("filter order must be in 1..={max}, got {order}")]
    InvalidOrder { order: u32, max: u32 },
    #[error("normalized cutoff must lie in (0, 1), got {0}")]
    InvalidCutoff(f64),
    #[error("sensor range needs low < high, got [{low}, {high}]")]
    InvalidRange { low: f64, high: f64 },
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
