use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device disconnected")]
    Disconnected,
    #[error("{kind} id {id} out of range (device has {count})")]
    ChannelOutOfRange {
        kind: &'static str,
        id: usize,
        count: usize,
    },
    #[error("command rejected: {0}")]
    CommandRejected(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
