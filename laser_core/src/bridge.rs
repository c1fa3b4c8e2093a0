//! Host side of the device link and command log.
//!
//! The bridge owns the link exclusively. It closes and reopens it between
//! calibration and play, each time with that phase's read timeout.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use laser_config::Roi;
use laser_traits::DeviceLink;
use laser_traits::clock::Clock;
use nalgebra::Point2;

use crate::anchors::AnchorSet;
use crate::cluster::{BlobClusterer, cmp_yx};
use crate::command_log::{Command, CommandLog};
use crate::config::{ClusterCfg, LinkTimeouts, ScreenGeometry};
use crate::error::{CalibrationError, LinkError, Result};
use crate::hw_error::map_link_error;
use crate::protocol::{DeviceMessage, parse_line};
use crate::transform::{CoordinateMapper, CoordinateTransform, fit_from_blobs};

/// Everything one successful calibration pass produced.
#[derive(Debug, Clone)]
pub struct CalibrationOutcome {
    /// Blob positions, sorted by (y, x). Numbered reports are taken as
    /// averaged; raw ones are merged first.
    pub blobs: Vec<Point2<f64>>,
    pub anchors: AnchorSet,
    pub transform: CoordinateTransform,
    pub roi: Option<Roi>,
    /// Blob lines received before merging.
    pub reports: usize,
}

pub struct HostBridge<L> {
    link: L,
    log: CommandLog,
    timeouts: LinkTimeouts,
    clock: Arc<dyn Clock + Send + Sync>,
    cluster: ClusterCfg,
}

fn link_err(e: &(dyn std::error::Error + 'static)) -> eyre::Report {
    eyre::Report::new(map_link_error(e))
}

impl<L: DeviceLink> HostBridge<L> {
    pub fn new(
        link: L,
        log_path: impl Into<std::path::PathBuf>,
        timeouts: LinkTimeouts,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let board = ClusterCfg::default();
        Self {
            link,
            log: CommandLog::new(log_path),
            timeouts,
            clock,
            cluster: ClusterCfg {
                proximity_px: board.proximity_px * board.scale,
                scale: 1.0,
                ..board
            },
        }
    }

    /// Clustering applied to raw `Blob:` reports, which arrive in the board's
    /// downscaled units. Numbered reports are already averaged and skip it.
    pub fn with_cluster(mut self, cluster: ClusterCfg) -> Self {
        self.cluster = cluster;
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    /// Append a raw command to the log.
    pub fn send(&self, cmd: &Command) -> Result<()> {
        self.log.append(cmd)
    }

    /// Close the link; failures are logged, never raised.
    pub fn close_link(&mut self) {
        if let Err(e) = self.link.close() {
            tracing::warn!(error = %e, "closing device link failed");
        }
    }

    fn reopen(&mut self, timeout_ms: u64) -> Result<()> {
        self.close_link();
        self.link
            .open(Duration::from_millis(timeout_ms))
            .map_err(|e| link_err(e.as_ref()))
    }

    /// One calibration pass. On success the new transform is published to
    /// `mapper`; on any failure the mapper is left untouched.
    pub fn calibrate(
        &mut self,
        screen: &ScreenGeometry,
        mapper: &mut CoordinateMapper,
    ) -> Result<CalibrationOutcome> {
        self.close_link();
        // Stop a detector that may still be running before asking for calib.
        self.log.append(&Command::End)?;
        self.reopen(self.timeouts.calib_ms)?;
        self.log.append(&Command::Calib)?;
        tracing::info!(port_timeout_ms = self.timeouts.calib_ms, "calibration requested");

        let res = self.collect_blobs();
        self.close_link();
        let (clusterer, averaged, roi, reports) = res?;

        let blobs = if averaged.is_empty() {
            clusterer.finish()?
        } else {
            self.sort_averaged(averaged)
        };
        let (anchors, transform) = fit_from_blobs(&blobs, screen)?;
        mapper.publish(transform);
        tracing::info!(
            blobs = blobs.len(),
            anchors = anchors.resolved_count(),
            reports,
            "calibration complete"
        );
        Ok(CalibrationOutcome {
            blobs,
            anchors,
            transform,
            roi,
            reports,
        })
    }

    /// Board-averaged positions go straight to the sorter: scaled, ordered
    /// by (y, x) and truncated like the clusterer's own output.
    fn sort_averaged(&self, averaged: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
        let scale = self.cluster.scale;
        let mut out: Vec<Point2<f64>> = averaged
            .into_iter()
            .map(|p| Point2::new(p.x * scale, p.y * scale))
            .collect();
        out.sort_by(cmp_yx);
        if out.len() > self.cluster.max_clusters {
            tracing::warn!(
                blobs = out.len(),
                kept = self.cluster.max_clusters,
                "dropping surplus averaged blobs"
            );
            out.truncate(self.cluster.max_clusters);
        }
        out
    }

    #[allow(clippy::type_complexity)]
    fn collect_blobs(
        &mut self,
    ) -> Result<(BlobClusterer, Vec<Point2<f64>>, Option<Roi>, usize)> {
        let mut clusterer = BlobClusterer::new(self.cluster);
        let mut averaged = Vec::new();
        let mut roi = None;
        let mut reports = 0usize;
        let start = self.clock.now();
        loop {
            if self.clock.ms_since(start) >= self.timeouts.calib_deadline_ms {
                return Err(eyre::Report::new(CalibrationError::Incomplete(
                    self.timeouts.calib_deadline_ms,
                )));
            }
            let Some(line) = self.link.read_line().map_err(|e| link_err(e.as_ref()))? else {
                continue;
            };
            match parse_line(&line) {
                Ok(DeviceMessage::Blob { index: Some(_), x, y }) => {
                    reports += 1;
                    averaged.push(Point2::new(x as f64, y as f64));
                }
                Ok(DeviceMessage::Blob { index: None, x, y }) => {
                    reports += 1;
                    clusterer.add_frame(&[(x as f64, y as f64)]);
                }
                Ok(DeviceMessage::Roi(r)) => roi = Some(r),
                Ok(DeviceMessage::FileWritten) => {
                    return Ok((clusterer, averaged, roi, reports));
                }
                Ok(DeviceMessage::ScriptError(s)) => {
                    return Err(eyre::Report::new(CalibrationError::ScriptFailed(s)));
                }
                Ok(DeviceMessage::CalibrationStarted) => {
                    tracing::info!("device started calibration");
                }
                Ok(other) => tracing::info!(device = %other, "device"),
                Err(e) => tracing::warn!(error = %e, "unparseable device line"),
            }
        }
    }

    /// Reopen with the play timeout and tell the board to start detecting.
    pub fn open_for_play(&mut self) -> Result<()> {
        self.reopen(self.timeouts.play_ms)?;
        self.log.append(&Command::Start)?;
        tracing::info!(port_timeout_ms = self.timeouts.play_ms, "play started");
        Ok(())
    }

    /// Next message, `None` on a read timeout or an unparseable line.
    pub fn read_message(&mut self) -> std::result::Result<Option<DeviceMessage>, LinkError> {
        let line = match self.link.read_line() {
            Ok(Some(l)) => l,
            Ok(None) => return Ok(None),
            Err(e) => return Err(map_link_error(e.as_ref())),
        };
        match parse_line(&line) {
            Ok(m) => Ok(Some(m)),
            Err(e) => {
                tracing::warn!(error = %e, "unparseable device line");
                Ok(None)
            }
        }
    }

    /// Stop the detector and release the link.
    pub fn finish_play(&mut self) -> Result<()> {
        let r = self.log.append(&Command::End);
        self.close_link();
        r
    }
}
