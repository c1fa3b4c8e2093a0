//! `From` implementations bridging `laser_config` types to `laser_core` types.

use crate::config::{
    ClusterCfg, FirmwareCfg, LinkTimeouts, ModeTiming, ScoringRules, ScreenGeometry, TimingCfg,
};

// ── ScreenGeometry ───────────────────────────────────────────────────────────

impl From<&laser_config::Screen> for ScreenGeometry {
    fn from(c: &laser_config::Screen) -> Self {
        Self {
            width: f64::from(c.width),
            height: f64::from(c.height),
            calib_radius: f64::from(c.calib_radius),
            edge_margin: f64::from(c.edge_margin),
            bottom_margin: f64::from(c.bottom_margin),
        }
    }
}

// ── ScoringRules ─────────────────────────────────────────────────────────────

impl From<&laser_config::Game> for ScoringRules {
    fn from(c: &laser_config::Game) -> Self {
        Self {
            ring_step: c.ring_step,
            points: c.points.clone(),
        }
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&laser_config::Timing> for TimingCfg {
    fn from(c: &laser_config::Timing) -> Self {
        Self {
            miss_grace_ms: c.miss_grace_ms,
            missed_check_ms: c.missed_check_ms,
            ready_ms: c.ready_ms,
            start_cue_ms: c.start_cue_ms,
            end_reveal_ms: c.end_reveal_ms,
        }
    }
}

// ── ModeTiming ───────────────────────────────────────────────────────────────

impl From<&laser_config::Modes> for ModeTiming {
    fn from(c: &laser_config::Modes) -> Self {
        Self {
            timed_hide_ms: c.timed_hide_ms,
            timed_move_ms: c.timed_move_ms,
            random_hide_ms: (c.random_hide_min_ms, c.random_hide_max_ms),
            random_visible_ms: (c.random_visible_min_ms, c.random_visible_max_ms),
            random_visible_pad_ms: c.random_visible_pad_ms,
        }
    }
}

// ── FirmwareCfg ──────────────────────────────────────────────────────────────

impl From<&laser_config::CalibrationCfg> for FirmwareCfg {
    fn from(c: &laser_config::CalibrationCfg) -> Self {
        Self {
            window_ms: c.window_ms,
            frame_interval_ms: c.frame_interval_ms,
            cluster: ClusterCfg {
                proximity_px: c.proximity_px,
                scale: c.firmware_scale,
                max_clusters: c.max_anchors,
                max_per_frame: c.max_per_frame,
            },
        }
    }
}

// ── LinkTimeouts ─────────────────────────────────────────────────────────────

impl From<&laser_config::Config> for LinkTimeouts {
    fn from(c: &laser_config::Config) -> Self {
        Self {
            calib_ms: c.device.calib_timeout_ms,
            play_ms: c.device.play_timeout_ms,
            calib_deadline_ms: c.calibration.deadline_ms,
        }
    }
}

/// Host-side clustering of raw blob reports. Those arrive downscaled by the
/// board, so the camera-pixel threshold is scaled the same way.
pub fn host_cluster_cfg(c: &laser_config::CalibrationCfg) -> ClusterCfg {
    ClusterCfg {
        proximity_px: c.proximity_px * c.firmware_scale,
        scale: c.host_scale,
        max_clusters: c.max_anchors,
        max_per_frame: c.max_per_frame,
    }
}
