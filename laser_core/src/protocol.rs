//! Device line protocol.
//!
//! One message per newline-terminated line. There is no framing beyond the
//! newline and no acknowledgement; anything unrecognized is reported as a
//! status line so the host can echo it.

use std::fmt;

use laser_config::Roi;
use laser_config::coords::{parse_blob_line, parse_roi};

use crate::error::ParseError;

pub const READY_LINE: &str = "differencing";
pub const FILE_WRITTEN_LINE: &str = "File written.";
pub const CALIB_STARTED_LINE: &str = "Starting calibration phase";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMessage {
    /// Calibration blob report, raw or numbered.
    Blob { index: Option<u32>, x: i64, y: i64 },
    Roi(Roi),
    FileWritten,
    /// Detection routine is running.
    Ready,
    Hit { x: i64, y: i64 },
    CalibrationStarted,
    ScriptError(String),
    Status(String),
}

fn int(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.strip_suffix(".0").and_then(|i| i.trim().parse().ok()))
}

fn malformed(kind: &'static str, line: &str) -> ParseError {
    ParseError::Malformed {
        kind,
        line: line.to_owned(),
    }
}

/// `x=<int>, y=<int>` after `Blob:`.
fn parse_raw_blob(rest: &str) -> Option<(i64, i64)> {
    let (x, y) = rest.split_once(',')?;
    let x = int(x.trim().strip_prefix("x=")?)?;
    let y = int(y.trim().strip_prefix("y=")?)?;
    Some((x, y))
}

/// `X:<int> # Y:<int>`, spaces optional around either value.
fn parse_hit(line: &str) -> Option<(i64, i64)> {
    let (x, y) = line.split_once('#')?;
    let x = int(x.trim().strip_prefix("X:")?)?;
    let y = int(y.trim().strip_prefix("Y:")?)?;
    Some((x, y))
}

pub fn parse_line(raw: &str) -> Result<DeviceMessage, ParseError> {
    let line = raw.trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }
    if line == FILE_WRITTEN_LINE {
        return Ok(DeviceMessage::FileWritten);
    }
    if line.starts_with(CALIB_STARTED_LINE) {
        return Ok(DeviceMessage::CalibrationStarted);
    }
    if line.starts_with("Error running") {
        return Ok(DeviceMessage::ScriptError(line.to_owned()));
    }
    if let Some(rest) = line.strip_prefix("Blob:") {
        let (x, y) = parse_raw_blob(rest).ok_or_else(|| malformed("blob", line))?;
        return Ok(DeviceMessage::Blob { index: None, x, y });
    }
    if line.starts_with("Blob ") {
        let (i, x, y) = parse_blob_line(line).ok_or_else(|| malformed("blob", line))?;
        return Ok(DeviceMessage::Blob {
            index: Some(i),
            x,
            y,
        });
    }
    if line.starts_with("ROI") {
        return parse_roi(line)
            .map(DeviceMessage::Roi)
            .ok_or_else(|| malformed("ROI", line));
    }
    if line.starts_with("X:") {
        let (x, y) = parse_hit(line).ok_or_else(|| malformed("hit", line))?;
        return Ok(DeviceMessage::Hit { x, y });
    }
    // The board announces readiness inside a longer sentence.
    if line.contains(READY_LINE) {
        return Ok(DeviceMessage::Ready);
    }
    Ok(DeviceMessage::Status(line.to_owned()))
}

impl fmt::Display for DeviceMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceMessage::Blob { index: None, x, y } => write!(f, "Blob: x={x}, y={y}"),
            DeviceMessage::Blob {
                index: Some(i),
                x,
                y,
            } => write!(f, "Blob {i}: X={x}, Y={y}"),
            DeviceMessage::Roi(roi) => write!(f, "ROI: {roi}"),
            DeviceMessage::FileWritten => f.write_str(FILE_WRITTEN_LINE),
            DeviceMessage::Ready => f.write_str(READY_LINE),
            DeviceMessage::Hit { x, y } => write!(f, "X: {x} # Y: {y}"),
            DeviceMessage::CalibrationStarted => f.write_str(CALIB_STARTED_LINE),
            DeviceMessage::ScriptError(s) | DeviceMessage::Status(s) => f.write_str(s),
        }
    }
}
