//! Board-side command poller.
//!
//! Watches the shared command log and dispatches the newest command to the
//! firmware. Failing actions are logged and polling continues; only `exit`
//! (or the shutdown flag) stops the loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use laser_traits::clock::Clock;

use crate::command_log::{Command, CommandCursor, CommandLog};
use crate::error::Result;

/// What the board does for each command.
pub trait FirmwareActions {
    /// Run the detection routine until the log says `end`.
    fn start_detection(&mut self) -> Result<()>;
    /// Run one calibration pass.
    fn start_calibration(&mut self) -> Result<()>;
    fn end(&mut self) -> Result<()> {
        Ok(())
    }
    /// Echo the coordinates file.
    fn print_coords(&mut self) -> Result<()>;
    fn test(&mut self) -> Result<()>;
    fn led_off(&mut self) -> Result<()>;
    /// Unrecognized token.
    fn unknown(&mut self, _token: &str) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing new in the log.
    Idle,
    Ran(Command),
    /// The action returned an error; it was logged.
    Failed(Command),
    Exit,
}

pub struct Supervisor<A> {
    log: CommandLog,
    cursor: CommandCursor,
    actions: A,
    clock: Arc<dyn Clock + Send + Sync>,
    poll: Duration,
    shutdown: Option<Arc<AtomicBool>>,
}

impl<A: FirmwareActions> Supervisor<A> {
    /// The cursor starts at line zero, so the newest line already in the log
    /// is dispatched on the first poll.
    pub fn new(
        log_path: impl Into<PathBuf>,
        actions: A,
        clock: Arc<dyn Clock + Send + Sync>,
        poll: Duration,
    ) -> Self {
        Self {
            log: CommandLog::new(log_path),
            cursor: CommandCursor::default(),
            actions,
            clock,
            poll: poll.max(Duration::from_millis(1)),
            shutdown: None,
        }
    }

    /// Stop `run_until_exit` when the flag is set.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = Some(flag);
        self
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    pub fn actions(&self) -> &A {
        &self.actions
    }

    pub fn into_actions(self) -> A {
        self.actions
    }

    pub fn poll_once(&mut self) -> Result<Dispatch> {
        let Some(cmd) = self.cursor.poll(self.log.path())? else {
            return Ok(Dispatch::Idle);
        };
        tracing::info!(command = %cmd, "new command");
        let res = match &cmd {
            Command::Start => self.actions.start_detection(),
            Command::Calib => self.actions.start_calibration(),
            Command::End => self.actions.end(),
            Command::Exit => return Ok(Dispatch::Exit),
            Command::Coords => self.actions.print_coords(),
            Command::Test => self.actions.test(),
            Command::LedOff => self.actions.led_off(),
            Command::Unknown(t) => {
                tracing::warn!(token = %t, "unknown command");
                self.actions.unknown(t)
            }
        };
        match res {
            Ok(()) => Ok(Dispatch::Ran(cmd)),
            Err(e) => {
                tracing::error!(command = %cmd, error = %e, "command failed");
                Ok(Dispatch::Failed(cmd))
            }
        }
    }

    /// Announce with `test`, then poll until `exit`. Returns the number of
    /// polls made.
    pub fn run_until_exit(&mut self) -> Result<u64> {
        self.log.append(&Command::Test)?;
        let mut polls = 0u64;
        loop {
            if self
                .shutdown
                .as_ref()
                .is_some_and(|f| f.load(Ordering::Relaxed))
            {
                tracing::info!(polls, "supervisor stopped by shutdown flag");
                return Ok(polls);
            }
            polls += 1;
            match self.poll_once() {
                Ok(Dispatch::Exit) => {
                    tracing::info!(polls, "exit command received");
                    return Ok(polls);
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "command log poll failed"),
            }
            self.clock.sleep(self.poll);
        }
    }
}
