pub mod camera;
pub mod error;
#[cfg(feature = "hardware")]
pub mod serial;
pub mod util;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use laser_traits::{BoxError, Clock, DeviceLink, MonotonicClock};

use crate::error::HwError;

pub use camera::{SimulatedCamera, parse_frames};
#[cfg(feature = "hardware")]
pub use serial::SerialLink;

/// One entry of a simulated device transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// A line the board "sends", delivered by the next read.
    Line(String),
    /// Silence on the wire; consumed by read timeouts.
    Pause(Duration),
}

/// Parse a transcript file.
///
/// Every non-blank line is sent verbatim, except `@pause <ms>` which inserts
/// a quiet period. A malformed pause is kept as a plain line so the host sees
/// (and rejects) it like any other garbage on the wire.
pub fn parse_script(text: &str) -> Vec<ScriptStep> {
    text.lines()
        .map(|l| l.trim_end_matches('\r'))
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            l.trim()
                .strip_prefix("@pause")
                .and_then(|ms| ms.trim().parse::<u64>().ok())
                .map_or_else(
                    || ScriptStep::Line(l.to_string()),
                    |ms| ScriptStep::Pause(Duration::from_millis(ms)),
                )
        })
        .collect()
}

/// Shared view of a simulated link: feed it lines, inspect what the host wrote.
#[derive(Debug, Clone, Default)]
pub struct SimHandle {
    steps: Arc<Mutex<VecDeque<ScriptStep>>>,
    written: Arc<Mutex<Vec<String>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimHandle {
    pub fn push_line(&self, line: impl Into<String>) {
        lock(&self.steps).push_back(ScriptStep::Line(line.into()));
    }

    pub fn push_pause(&self, d: Duration) {
        lock(&self.steps).push_back(ScriptStep::Pause(d));
    }

    pub fn extend(&self, steps: impl IntoIterator<Item = ScriptStep>) {
        lock(&self.steps).extend(steps);
    }

    /// Lines the host wrote to the board, oldest first.
    pub fn written(&self) -> Vec<String> {
        lock(&self.written).clone()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.steps).len()
    }
}

/// Scripted stand-in for the camera board.
///
/// The transcript survives `close`/`open`, which mirrors a real board that
/// keeps talking while the host re-opens its port. An exhausted script or a
/// pause makes `read_line` sleep for the configured timeout on the injected
/// clock, so a `ManualClock` advances exactly as wall time would.
pub struct SimulatedLink {
    handle: SimHandle,
    clock: Arc<dyn Clock + Send + Sync>,
    timeout: Duration,
    open: bool,
    opens: u32,
}

impl Default for SimulatedLink {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLink {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            handle: SimHandle::default(),
            clock,
            timeout: Duration::from_millis(100),
            open: false,
            opens: 0,
        }
    }

    pub fn from_script(steps: Vec<ScriptStep>, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let link = Self::with_clock(clock);
        link.handle.extend(steps);
        link
    }

    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }

    /// How many times the link has been opened.
    pub fn open_count(&self) -> u32 {
        self.opens
    }
}

impl DeviceLink for SimulatedLink {
    fn open(&mut self, read_timeout: Duration) -> Result<(), BoxError> {
        self.timeout = read_timeout.max(Duration::from_millis(1));
        self.open = true;
        self.opens += 1;
        tracing::debug!(
            timeout_ms = self.timeout.as_millis() as u64,
            opens = self.opens,
            "simulated link open"
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        if self.open {
            tracing::debug!("simulated link closed");
        }
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_line(&mut self) -> Result<Option<String>, BoxError> {
        if !self.open {
            return Err(Box::new(HwError::Closed));
        }
        let wait = {
            let mut steps = lock(&self.handle.steps);
            match steps.pop_front() {
                Some(ScriptStep::Line(line)) => return Ok(Some(line)),
                Some(ScriptStep::Pause(d)) => {
                    let wait = d.min(self.timeout);
                    let rest = d.saturating_sub(wait);
                    if !rest.is_zero() {
                        steps.push_front(ScriptStep::Pause(rest));
                    }
                    wait
                }
                None => self.timeout,
            }
        };
        self.clock.sleep(wait);
        Ok(None)
    }

    fn write_line(&mut self, line: &str) -> Result<(), BoxError> {
        if !self.open {
            return Err(Box::new(HwError::Closed));
        }
        tracing::debug!(line, "simulated link write");
        lock(&self.handle.written).push(line.to_string());
        Ok(())
    }
}
