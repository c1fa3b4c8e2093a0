use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Byte accumulator that hands out complete newline-terminated lines.
///
/// Partial lines stay buffered across calls, so a line split over two serial
/// reads (or over two read timeouts) is still delivered whole.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pop the oldest complete line, without its `\n` / `\r\n` terminator.
    /// Invalid UTF-8 is replaced rather than rejected.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|b| *b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&raw[..pos]);
        Some(text.trim_end_matches('\r').to_string())
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// Read from `reader` until `buf` holds a complete line or `timeout` expires.
///
/// Returns `Ok(None)` on timeout or end of stream. Reader timeouts
/// (`TimedOut`/`WouldBlock`) are treated as "no data yet" and polling
/// continues until the deadline.
pub fn read_line_with_timeout<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut LineBuffer,
    timeout: Duration,
) -> Result<Option<String>> {
    if let Some(line) = buf.next_line() {
        return Ok(Some(line));
    }
    let deadline = Instant::now() + timeout;
    let mut chunk = [0u8; 128];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(None),
            Ok(n) => {
                buf.push(&chunk[..n]);
                if let Some(line) = buf.next_line() {
                    return Ok(Some(line));
                }
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {}
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(HwError::Io(e)),
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
    }
}
