//! Board-side routines: the calibration pass and the hit detector.
//!
//! Both read centroids from a `FrameSource` and report over a `LineSink`
//! using the device line protocol. `Board` wires them into the supervisor.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use laser_config::coords::{self, CoordsFile};
use laser_config::Roi;
use laser_traits::clock::Clock;
use laser_traits::{DeviceLink, FrameSource};

use crate::cluster::BlobClusterer;
use crate::command_log::{Command, CommandLog};
use crate::config::FirmwareCfg;
use crate::error::Result;
use crate::hw_error::map_link_error;
use crate::protocol::{CALIB_STARTED_LINE, DeviceMessage, FILE_WRITTEN_LINE};
use crate::supervisor::FirmwareActions;

/// Where the board prints.
pub trait LineSink {
    fn send(&mut self, line: &str) -> Result<()>;
}

impl LineSink for Vec<String> {
    fn send(&mut self, line: &str) -> Result<()> {
        self.push(line.to_owned());
        Ok(())
    }
}

/// Prints over a device link.
pub struct LinkSink<L>(pub L);

impl<L: DeviceLink> LineSink for LinkSink<L> {
    fn send(&mut self, line: &str) -> Result<()> {
        self.0
            .write_line(line)
            .map_err(|e| eyre::Report::new(map_link_error(e.as_ref())))
    }
}

impl<S: LineSink + ?Sized> LineSink for &mut S {
    fn send(&mut self, line: &str) -> Result<()> {
        (**self).send(line)
    }
}

/// Collect frames for the calibration window, cluster them and write the
/// coordinates file. Positions are truncated to whole pixels for the file.
pub fn run_calibration<F, S>(
    camera: &mut F,
    sink: &mut S,
    clock: &dyn Clock,
    cfg: &FirmwareCfg,
    coords_path: &Path,
) -> Result<CoordsFile>
where
    F: FrameSource + ?Sized,
    S: LineSink + ?Sized,
{
    sink.send(&format!(
        "{CALIB_STARTED_LINE} for {} seconds...",
        cfg.window_ms / 1000
    ))?;
    let mut clusterer = BlobClusterer::new(cfg.cluster);
    let start = clock.now();
    let interval = Duration::from_millis(cfg.frame_interval_ms);
    while clock.ms_since(start) < cfg.window_ms {
        match camera.next_frame() {
            Ok(frame) => {
                if !frame.is_empty() {
                    clusterer.add_frame(&frame);
                }
            }
            Err(e) => sink.send(&format!("Snapshot failed: {e}"))?,
        }
        clock.sleep(interval);
    }

    let points = clusterer.finish()?;
    let blobs: Vec<(i64, i64)> = points
        .iter()
        .map(|p| (p.x.trunc() as i64, p.y.trunc() as i64))
        .collect();
    let roi = Roi::bounding(&blobs).ok_or_else(|| eyre::eyre!("no blobs to bound"))?;

    sink.send("Averaged Blob Coordinates:")?;
    for (i, &(x, y)) in blobs.iter().enumerate() {
        let msg = DeviceMessage::Blob {
            index: Some(i as u32 + 1),
            x,
            y,
        };
        sink.send(&msg.to_string())?;
    }
    let file = CoordsFile { roi, blobs };
    coords::write(coords_path, &file)?;
    sink.send(&DeviceMessage::Roi(roi).to_string())?;
    sink.send(FILE_WRITTEN_LINE)?;
    tracing::info!(
        blobs = file.blobs.len(),
        frames = clusterer.frame_count(),
        %roi,
        "calibration written"
    );
    Ok(file)
}

/// Report hits until the command log's last line is `end`.
///
/// A frame with centroids inside the ROI triggers; only the first frame of
/// each burst is reported. Every reported centroid is also appended to the
/// coordinates file. Returns the number of hit lines sent.
pub fn run_detection<F, S>(
    camera: &mut F,
    sink: &mut S,
    log: &CommandLog,
    coords_path: &Path,
) -> Result<u64>
where
    F: FrameSource + ?Sized,
    S: LineSink + ?Sized,
{
    let roi = coords::load(coords_path)
        .wrap_err("ROI not loaded correctly")?
        .roi;
    sink.send("Saved background image - Now starting frame differencing!")?;
    let mut first = true;
    let mut sent = 0u64;
    loop {
        let frame = camera
            .next_frame()
            .map_err(|e| eyre::eyre!("snapshot failed: {e}"))?;
        let hits: Vec<(f64, f64)> = frame
            .into_iter()
            .filter(|&(x, y)| roi.contains(x, y))
            .collect();
        if hits.is_empty() {
            first = true;
        } else if first {
            first = false;
            for (x, y) in hits {
                let (x, y) = (x.round() as i64, y.round() as i64);
                coords::append_hit(coords_path, x, y)?;
                sink.send(&DeviceMessage::Hit { x, y }.to_string())?;
                sent += 1;
            }
        }
        if log.last_command()? == Some(Command::End) {
            sink.send("End command detected. Exiting loop.")?;
            tracing::info!(sent, "detection stopped");
            return Ok(sent);
        }
    }
}

/// The firmware side of the game: camera, output line and file paths.
pub struct Board<F, S> {
    camera: F,
    sink: S,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: FirmwareCfg,
    log: CommandLog,
    coords_path: PathBuf,
    led_on: bool,
}

impl<F: FrameSource, S: LineSink> Board<F, S> {
    pub fn new(
        camera: F,
        sink: S,
        clock: Arc<dyn Clock + Send + Sync>,
        cfg: FirmwareCfg,
        log_path: impl Into<PathBuf>,
        coords_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            camera,
            sink,
            clock,
            cfg,
            log: CommandLog::new(log_path),
            coords_path: coords_path.into(),
            led_on: true,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn camera(&self) -> &F {
        &self.camera
    }

    pub fn led_on(&self) -> bool {
        self.led_on
    }

    /// Failures are also reported on the line so the host can stop waiting.
    fn report<T>(&mut self, routine: &str, r: Result<T>) -> Result<T> {
        if let Err(e) = &r {
            let line = format!("Error running {routine} : {e}");
            if let Err(send_err) = self.sink.send(&line) {
                tracing::warn!(error = %send_err, "could not report routine failure");
            }
        }
        r
    }
}

impl<F: FrameSource, S: LineSink> FirmwareActions for Board<F, S> {
    fn start_detection(&mut self) -> Result<()> {
        let r = run_detection(&mut self.camera, &mut self.sink, &self.log, &self.coords_path);
        self.report("detection", r).map(|_| ())
    }

    fn start_calibration(&mut self) -> Result<()> {
        let r = run_calibration(
            &mut self.camera,
            &mut self.sink,
            self.clock.as_ref(),
            &self.cfg,
            &self.coords_path,
        );
        self.report("calibration", r).map(|_| ())
    }

    fn end(&mut self) -> Result<()> {
        self.sink.send("End command received.")
    }

    fn print_coords(&mut self) -> Result<()> {
        match std::fs::read_to_string(&self.coords_path) {
            Ok(text) if text.trim().is_empty() => self.sink.send("coords file is empty."),
            Ok(text) => {
                for line in text.lines() {
                    self.sink.send(line.trim())?;
                }
                Ok(())
            }
            Err(e) => self.sink.send(&format!("coords file not found: {e}")),
        }
    }

    fn test(&mut self) -> Result<()> {
        self.sink.send("Now active.")
    }

    fn led_off(&mut self) -> Result<()> {
        self.led_on = false;
        self.sink.send("LED is now inactive.")
    }

    fn unknown(&mut self, token: &str) -> Result<()> {
        self.sink.send(&format!("Unknown command: {token}"))
    }
}
