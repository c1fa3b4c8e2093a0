use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("device link is closed")]
    Closed,
    #[error("device link read timeout")]
    Timeout,
    #[error("camera has no more frames")]
    Exhausted,
    #[error("serial port error: {0}")]
    Port(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
