//! Board side: the supervisor loop driving the firmware routines.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use eyre::WrapErr;
use laser_config::Config;
use laser_core::error::Result;
use laser_core::firmware::{Board, LineSink};
use laser_core::{FirmwareCfg, Supervisor};
use laser_hardware::{SimulatedCamera, parse_frames};
use laser_traits::{Clock, MonotonicClock};

/// The board's console: each line goes to stdout, flushed immediately so a
/// host reading the pipe sees it without delay.
pub struct StdoutSink;

impl LineSink for StdoutSink {
    fn send(&mut self, line: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").wrap_err("write board output")?;
        out.flush().wrap_err("flush board output")
    }
}

/// Poll the command log until `exit` or Ctrl-C. Returns the number of polls.
pub fn supervise(
    cfg: &Config,
    frames_path: &Path,
    firmware_clock: Arc<dyn Clock + Send + Sync>,
    shutdown: Arc<AtomicBool>,
) -> Result<u64> {
    let text = std::fs::read_to_string(frames_path)
        .wrap_err_with(|| format!("read frame script {}", frames_path.display()))?;
    let frames = parse_frames(&text);
    tracing::info!(frames = frames.len(), script = %frames_path.display(), "using simulated camera");

    let board = Board::new(
        SimulatedCamera::new(frames),
        StdoutSink,
        firmware_clock,
        FirmwareCfg::from(&cfg.calibration),
        &cfg.paths.command_log,
        &cfg.paths.coords,
    );
    let mut sup = Supervisor::new(
        &cfg.paths.command_log,
        board,
        Arc::new(MonotonicClock::new()),
        Duration::from_millis(cfg.supervisor.poll_ms),
    )
    .with_shutdown(shutdown);
    tracing::info!(
        log = %sup.log_path().display(),
        poll_ms = cfg.supervisor.poll_ms,
        "supervisor running"
    );
    sup.run_until_exit()
}
