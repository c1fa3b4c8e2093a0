//! Shared command log.
//!
//! The host appends one token per line; firmware-side supervisors poll the
//! line count and act on the newest line when it grows. If several lines
//! land between two polls only the newest is delivered.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use eyre::WrapErr;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Calib,
    End,
    Exit,
    Coords,
    Test,
    LedOff,
    Unknown(String),
}

impl Command {
    /// Exact match on the trimmed, lowercased token.
    pub fn parse(token: &str) -> Self {
        let t = token.trim().to_lowercase();
        match t.as_str() {
            "start" => Command::Start,
            "calib" => Command::Calib,
            "end" => Command::End,
            "exit" => Command::Exit,
            "coords" => Command::Coords,
            "test" => Command::Test,
            "led_off" => Command::LedOff,
            _ => Command::Unknown(t),
        }
    }

    pub fn as_token(&self) -> &str {
        match self {
            Command::Start => "start",
            Command::Calib => "calib",
            Command::End => "end",
            Command::Exit => "exit",
            Command::Coords => "coords",
            Command::Test => "test",
            Command::LedOff => "led_off",
            Command::Unknown(s) => s,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

/// Append side of the log.
#[derive(Debug, Clone)]
pub struct CommandLog {
    path: PathBuf,
}

impl CommandLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, cmd: &Command) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .wrap_err_with(|| format!("open command log {}", self.path.display()))?;
        // Logs written by older hosts put the newline before the token.
        let prefix = if ends_without_newline(&self.path) { "\n" } else { "" };
        writeln!(f, "{prefix}{}", cmd.as_token())
            .wrap_err_with(|| format!("append to command log {}", self.path.display()))?;
        tracing::debug!(command = %cmd, path = %self.path.display(), "command appended");
        Ok(())
    }

    /// The last non-empty line, if any.
    pub fn last_command(&self) -> Result<Option<Command>> {
        let lines = read_lines(&self.path)?;
        Ok(lines
            .iter()
            .rev()
            .find(|l| !l.trim().is_empty())
            .map(|l| Command::parse(l)))
    }
}

fn ends_without_newline(path: &Path) -> bool {
    std::fs::read(path)
        .ok()
        .and_then(|b| b.last().copied())
        .is_some_and(|b| b != b'\n')
}

/// A missing file reads as empty.
fn read_lines(path: &Path) -> Result<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(text.lines().map(str::to_owned).collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).wrap_err_with(|| format!("read command log {}", path.display())),
    }
}

/// Read side: remembers how many lines it has seen.
#[derive(Debug, Clone, Default)]
pub struct CommandCursor {
    seen: usize,
}

impl CommandCursor {
    /// Start at the current end of the log so old commands are not replayed.
    pub fn at_end(path: &Path) -> Result<Self> {
        Ok(Self {
            seen: read_lines(path)?.len(),
        })
    }

    pub fn seen(&self) -> usize {
        self.seen
    }

    /// One poll. Returns the newest line as a command if the log grew.
    pub fn poll(&mut self, path: &Path) -> Result<Option<Command>> {
        let lines = read_lines(path)?;
        let count = lines.len();
        if count < self.seen {
            tracing::warn!(
                seen = self.seen,
                count,
                "command log shrank; resetting cursor"
            );
            self.seen = count;
            return Ok(None);
        }
        if count == self.seen {
            return Ok(None);
        }
        let skipped = count - self.seen - 1;
        if skipped > 0 {
            tracing::debug!(skipped, "several commands landed between polls; newest wins");
        }
        self.seen = count;
        let newest = lines[count - 1].trim();
        if newest.is_empty() {
            return Ok(None);
        }
        Ok(Some(Command::parse(newest)))
    }
}
