#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and on-disk formats for the laser range.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `coords` reads and writes the calibration coordinates file.
//! - `leaderboard` is the `name,score,mode` score store.
use std::path::PathBuf;

use serde::Deserialize;

pub mod coords;
pub mod leaderboard;

pub use coords::{CoordsFile, Roi};
pub use leaderboard::{Leaderboard, ScoreEntry};

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Device {
    /// Serial port of the camera board, e.g. `/dev/ttyACM0` or `COM3`.
    pub port: String,
    pub baud: u32,
    /// Read timeout while calibrating (ms).
    pub calib_timeout_ms: u64,
    /// Read timeout while playing (ms). Short, so timers stay responsive.
    pub play_timeout_ms: u64,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            port: "/dev/ttyACM0".into(),
            baud: 9600,
            calib_timeout_ms: 1000,
            play_timeout_ms: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Shared command log watched by the board-side supervisor.
    pub command_log: PathBuf,
    /// Coordinates file written by the calibration routine.
    pub coords: PathBuf,
    pub leaderboard: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            command_log: PathBuf::from("protocol.txt"),
            coords: PathBuf::from("coords.txt"),
            leaderboard: PathBuf::from("leaderboard.txt"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Screen {
    pub width: u32,
    pub height: u32,
    /// Radius of the calibration circles; anchors sit this far inside the margins.
    pub calib_radius: u32,
    pub edge_margin: u32,
    /// Bottom margin is larger to leave room for the ammo bar.
    pub bottom_margin: u32,
}

impl Default for Screen {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 1200,
            calib_radius: 75,
            edge_margin: 20,
            bottom_margin: 100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Length of the blob collection window on the board (ms).
    pub window_ms: u64,
    pub frame_interval_ms: u64,
    /// Detections closer than this (px) to a cluster's first point join it.
    pub proximity_px: f64,
    /// Scale applied by the board to averaged blobs (sensor sub-sampling).
    pub firmware_scale: f64,
    /// Scale applied by the host when re-clustering reported blobs.
    pub host_scale: f64,
    pub max_anchors: usize,
    pub max_per_frame: usize,
    /// Give up on a calibration pass after this long without "File written." (ms).
    pub deadline_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            window_ms: 5000,
            frame_interval_ms: 100,
            proximity_px: 30.0,
            firmware_scale: 0.5,
            host_scale: 1.0,
            max_anchors: 6,
            max_per_frame: 6,
            deadline_ms: 20_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Game {
    pub rounds: u32,
    /// 1 = static, 2 = hide and teleport, 3 = timed
    pub mode: u8,
    /// Width of one scoring ring (px).
    pub ring_step: f64,
    pub rings: usize,
    /// Points per ring, outermost first.
    pub points: Vec<u32>,
    /// Abort a session that runs longer than this (ms); 0 disables.
    pub max_session_ms: u64,
}

impl Default for Game {
    fn default() -> Self {
        Self {
            rounds: 6,
            mode: 1,
            ring_step: 75.0,
            rings: 5,
            points: vec![20, 40, 60, 80, 100],
            max_session_ms: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// A detection this soon after the target hid still counts as a miss.
    pub miss_grace_ms: u64,
    /// Delay after hiding before an unanswered timed round is marked missed.
    pub missed_check_ms: u64,
    pub ready_ms: u64,
    pub start_cue_ms: u64,
    pub end_reveal_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            miss_grace_ms: 100,
            missed_check_ms: 200,
            ready_ms: 3000,
            start_cue_ms: 1000,
            end_reveal_ms: 3000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Modes {
    pub timed_hide_ms: u64,
    pub timed_move_ms: u64,
    pub random_hide_min_ms: u64,
    pub random_hide_max_ms: u64,
    pub random_visible_min_ms: u64,
    pub random_visible_max_ms: u64,
    /// Added on top of the random visible time.
    pub random_visible_pad_ms: u64,
}

impl Default for Modes {
    fn default() -> Self {
        Self {
            timed_hide_ms: 1500,
            timed_move_ms: 3000,
            random_hide_min_ms: 700,
            random_hide_max_ms: 1500,
            random_visible_min_ms: 700,
            random_visible_max_ms: 1500,
            random_visible_pad_ms: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Supervisor {
    pub poll_ms: u64,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self { poll_ms: 200 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LeaderboardCfg {
    pub size: usize,
    /// Entries recorded with this mode show up on every mode's board.
    pub wildcard_mode: u8,
}

impl Default for LeaderboardCfg {
    fn default() -> Self {
        Self {
            size: 10,
            wildcard_mode: 5,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub device: Device,
    pub paths: Paths,
    pub screen: Screen,
    pub calibration: CalibrationCfg,
    pub game: Game,
    pub timing: Timing,
    pub modes: Modes,
    pub supervisor: Supervisor,
    pub leaderboard: LeaderboardCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        if self.device.baud == 0 {
            eyre::bail!("device.baud must be > 0");
        }
        if self.device.calib_timeout_ms == 0 {
            eyre::bail!("device.calib_timeout_ms must be >= 1");
        }
        if self.device.play_timeout_ms == 0 {
            eyre::bail!("device.play_timeout_ms must be >= 1");
        }

        // Screen
        let s = &self.screen;
        let inset_x = 2 * (s.edge_margin + s.calib_radius);
        let inset_y = s.edge_margin + s.bottom_margin + 2 * s.calib_radius;
        if s.width <= inset_x || s.height <= inset_y {
            eyre::bail!("screen.width/height too small for the calibration inset");
        }

        // Calibration
        let c = &self.calibration;
        if !(c.proximity_px.is_finite() && c.proximity_px > 0.0) {
            eyre::bail!("calibration.proximity_px must be > 0");
        }
        if !(c.firmware_scale.is_finite() && c.firmware_scale > 0.0) {
            eyre::bail!("calibration.firmware_scale must be > 0");
        }
        if !(c.host_scale.is_finite() && c.host_scale > 0.0) {
            eyre::bail!("calibration.host_scale must be > 0");
        }
        if !(4..=6).contains(&c.max_anchors) {
            eyre::bail!("calibration.max_anchors must be in [4, 6]");
        }
        if c.max_per_frame == 0 {
            eyre::bail!("calibration.max_per_frame must be >= 1");
        }
        if c.frame_interval_ms == 0 {
            eyre::bail!("calibration.frame_interval_ms must be >= 1");
        }
        if c.window_ms < c.frame_interval_ms {
            eyre::bail!("calibration.window_ms must be >= calibration.frame_interval_ms");
        }
        if c.deadline_ms == 0 {
            eyre::bail!("calibration.deadline_ms must be >= 1");
        }

        // Game
        let g = &self.game;
        if g.rounds == 0 {
            eyre::bail!("game.rounds must be >= 1");
        }
        if !(1..=3).contains(&g.mode) {
            eyre::bail!("game.mode must be 1, 2 or 3");
        }
        if !(g.ring_step.is_finite() && g.ring_step > 0.0) {
            eyre::bail!("game.ring_step must be > 0");
        }
        if g.rings == 0 {
            eyre::bail!("game.rings must be >= 1");
        }
        if g.points.len() != g.rings {
            eyre::bail!(
                "game.points must list one value per ring ({} rings, {} points)",
                g.rings,
                g.points.len()
            );
        }
        // Teleport picks centers far enough from the edges to keep every ring on screen.
        let reach = g.ring_step * g.rings as f64;
        if f64::from(s.width) - 120.0 - 2.0 * reach < 0.0
            || f64::from(s.height) - 200.0 - 2.0 * reach < 0.0
        {
            eyre::bail!("game.ring_step * game.rings is too large for the screen");
        }

        // Timing
        let t = &self.timing;
        if t.missed_check_ms < t.miss_grace_ms {
            eyre::bail!("timing.missed_check_ms must be >= timing.miss_grace_ms");
        }
        if t.ready_ms > 60_000 || t.start_cue_ms > 60_000 || t.end_reveal_ms > 60_000 {
            eyre::bail!("timing cue durations are unreasonably large (>60s)");
        }

        // Modes
        let m = &self.modes;
        if m.timed_hide_ms == 0 || m.timed_move_ms <= m.timed_hide_ms {
            eyre::bail!("modes.timed_move_ms must be > modes.timed_hide_ms > 0");
        }
        if m.random_hide_min_ms == 0 || m.random_hide_min_ms > m.random_hide_max_ms {
            eyre::bail!("modes.random_hide_min_ms must be in [1, random_hide_max_ms]");
        }
        if m.random_visible_min_ms > m.random_visible_max_ms {
            eyre::bail!("modes.random_visible_min_ms must be <= random_visible_max_ms");
        }
        if m.random_visible_min_ms + m.random_visible_pad_ms == 0 {
            eyre::bail!("modes random visible time must be > 0");
        }

        // Supervisor
        if self.supervisor.poll_ms == 0 {
            eyre::bail!("supervisor.poll_ms must be >= 1");
        }

        // Leaderboard
        if self.leaderboard.size == 0 {
            eyre::bail!("leaderboard.size must be >= 1");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
