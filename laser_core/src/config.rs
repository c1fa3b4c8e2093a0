//! Runtime configuration used by the game core.
//!
//! These are separate from the TOML schema in `laser_config`; see
//! `conversions` for the mapping.

use nalgebra::Point2;

/// Projection canvas size and calibration inset, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenGeometry {
    pub width: f64,
    pub height: f64,
    pub calib_radius: f64,
    pub edge_margin: f64,
    pub bottom_margin: f64,
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        Self {
            width: 1600.0,
            height: 1200.0,
            calib_radius: 75.0,
            edge_margin: 20.0,
            bottom_margin: 100.0,
        }
    }
}

impl ScreenGeometry {
    /// Where the target rests before and after a session (and in static mode).
    /// Sits slightly above the middle to clear the ammo bar.
    pub fn rest_center(&self) -> Point2<f64> {
        Point2::new((self.width / 2.0).floor(), (self.height / 2.0).floor() - 50.0)
    }
}

/// Ring scoring rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRules {
    /// Width of one ring band (px).
    pub ring_step: f64,
    /// Points per ring, outermost first; its length is the ring count.
    pub points: Vec<u32>,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            ring_step: 75.0,
            points: vec![20, 40, 60, 80, 100],
        }
    }
}

impl ScoringRules {
    pub fn rings(&self) -> usize {
        self.points.len()
    }

    /// Radius of the outermost ring edge; anything at or beyond misses.
    pub fn outer_radius(&self) -> f64 {
        self.ring_step * self.rings() as f64
    }
}

/// Blob clustering parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterCfg {
    pub proximity_px: f64,
    /// Correction factor applied to every averaged output position.
    pub scale: f64,
    pub max_clusters: usize,
    pub max_per_frame: usize,
}

impl Default for ClusterCfg {
    fn default() -> Self {
        Self {
            proximity_px: 30.0,
            scale: 0.5,
            max_clusters: 6,
            max_per_frame: 6,
        }
    }
}

/// Cue and check delays of a session, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingCfg {
    pub miss_grace_ms: u64,
    pub missed_check_ms: u64,
    pub ready_ms: u64,
    pub start_cue_ms: u64,
    pub end_reveal_ms: u64,
}

impl Default for TimingCfg {
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

/// Hide/show cadence of the moving modes, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeTiming {
    pub timed_hide_ms: u64,
    pub timed_move_ms: u64,
    pub random_hide_ms: (u64, u64),
    pub random_visible_ms: (u64, u64),
    pub random_visible_pad_ms: u64,
}

impl Default for ModeTiming {
    fn default() -> Self {
        Self {
            timed_hide_ms: 1500,
            timed_move_ms: 3000,
            random_hide_ms: (700, 1500),
            random_visible_ms: (700, 1500),
            random_visible_pad_ms: 500,
        }
    }
}

/// Host-side link timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTimeouts {
    pub calib_ms: u64,
    pub play_ms: u64,
    /// Overall budget for one calibration pass.
    pub calib_deadline_ms: u64,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            calib_ms: 1000,
            play_ms: 100,
            calib_deadline_ms: 20_000,
        }
    }
}

/// Board-side calibration window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FirmwareCfg {
    pub window_ms: u64,
    pub frame_interval_ms: u64,
    pub cluster: ClusterCfg,
}

impl Default for FirmwareCfg {
    fn default() -> Self {
        Self {
            window_ms: 5000,
            frame_interval_ms: 100,
            cluster: ClusterCfg::default(),
        }
    }
}
