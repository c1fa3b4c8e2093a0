pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::time::Duration;

/// Error type used at every hardware seam. Concrete backends box their own
/// errors; `laser_core` maps them back to typed link errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Newline-delimited text link to the camera board.
///
/// The link is opened with a read timeout and closed again between the
/// calibration and play phases. `read_line` returns `Ok(None)` when no full
/// line arrived before the timeout expired.
pub trait DeviceLink {
    fn open(&mut self, read_timeout: Duration) -> Result<(), BoxError>;
    fn close(&mut self) -> Result<(), BoxError>;
    fn is_open(&self) -> bool;
    fn read_line(&mut self) -> Result<Option<String>, BoxError>;
    fn write_line(&mut self, line: &str) -> Result<(), BoxError>;
}

/// Produces the centroid list of one camera frame, in camera pixels.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Vec<(f64, f64)>, BoxError>;
}

impl<T: DeviceLink + ?Sized> DeviceLink for Box<T> {
    fn open(&mut self, read_timeout: Duration) -> Result<(), BoxError> {
        (**self).open(read_timeout)
    }

    fn close(&mut self) -> Result<(), BoxError> {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn read_line(&mut self) -> Result<Option<String>, BoxError> {
        (**self).read_line()
    }

    fn write_line(&mut self, line: &str) -> Result<(), BoxError> {
        (**self).write_line(line)
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn next_frame(&mut self) -> Result<Vec<(f64, f64)>, BoxError> {
        (**self).next_frame()
    }
}
