use std::io::Write;
use std::time::Duration;

use laser_traits::{BoxError, DeviceLink};

use crate::error::HwError;
use crate::util::{LineBuffer, read_line_with_timeout};

/// Camera board attached over a USB serial port.
pub struct SerialLink {
    port_name: String,
    baud: u32,
    port: Option<Box<dyn serialport::SerialPort>>,
    buf: LineBuffer,
    timeout: Duration,
}

impl SerialLink {
    pub fn new(port_name: impl Into<String>, baud: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud,
            port: None,
            buf: LineBuffer::new(),
            timeout: Duration::from_secs(1),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl DeviceLink for SerialLink {
    fn open(&mut self, read_timeout: Duration) -> Result<(), BoxError> {
        // Re-opening drops the old handle first; the board only allows one reader.
        self.port = None;
        self.buf.clear();
        let port = serialport::new(&self.port_name, self.baud)
            .timeout(read_timeout)
            .open()
            .map_err(|e| HwError::Port(format!("open {}: {e}", self.port_name)))?;
        self.timeout = read_timeout;
        self.port = Some(port);
        tracing::info!(
            port = %self.port_name,
            baud = self.baud,
            timeout_ms = read_timeout.as_millis() as u64,
            "serial link open"
        );
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        if self.port.take().is_some() {
            tracing::info!(port = %self.port_name, "serial link closed");
        }
        self.buf.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn read_line(&mut self) -> Result<Option<String>, BoxError> {
        let port = self.port.as_mut().ok_or(HwError::Closed)?;
        let line = read_line_with_timeout(port, &mut self.buf, self.timeout)?;
        if let Some(l) = &line {
            tracing::trace!(line = %l, "serial rx");
        }
        Ok(line)
    }

    fn write_line(&mut self, line: &str) -> Result<(), BoxError> {
        let port = self.port.as_mut().ok_or(HwError::Closed)?;
        port.write_all(line.as_bytes()).map_err(HwError::Io)?;
        port.write_all(b"\n").map_err(HwError::Io)?;
        port.flush().map_err(HwError::Io)?;
        Ok(())
    }
}
