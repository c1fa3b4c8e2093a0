use thiserror::Error;

/// Device link failures. The session goes back to idle and the link is
/// closed; the host process keeps running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("device link is closed")]
    Closed,
    #[error("device link timed out")]
    Timeout,
    #[error("device link unavailable: {0}")]
    Unavailable(String),
    #[error("device link io error: {0}")]
    Io(String),
}

/// A calibration pass that cannot produce a usable transform.
/// The previously published transform, if any, stays in place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("no blobs were detected during the calibration window")]
    NoBlobs,
    #[error("only {found} anchors resolved; at least 4 are required")]
    InsufficientPoints { found: usize },
    #[error("anchor layout is degenerate; no projective fit exists")]
    Degenerate,
    #[error("calibration routine failed on the device: {0}")]
    ScriptFailed(String),
    #[error("calibration did not finish within {0} ms")]
    Incomplete(u64),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty line")]
    Empty,
    #[error("malformed {kind} line: {line:?}")]
    Malformed { kind: &'static str, line: String },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ScoringError {
    #[error("no coordinate transform; run calibration first")]
    TransformUnset,
    #[error("point maps to infinity under the current transform")]
    Unmappable,
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing screen geometry")]
    MissingScreen,
    #[error("missing session rules")]
    MissingRules,
    #[error("unknown game mode {0}")]
    UnknownMode(u8),
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
