#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::must_use_candidate
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Game core for the laser range (hardware-agnostic).
//!
//! The board reports camera-space centroids over a line protocol. This crate
//! turns them into a camera-to-screen transform during calibration and into
//! scored rounds during play. All hardware goes through
//! `laser_traits::DeviceLink`, `laser_traits::FrameSource` and
//! `laser_traits::Clock`.
//!
//! ## Architecture
//!
//! - **Calibration**: `cluster` merges detections across frames, `anchors`
//!   assigns them to the six roles, `transform` fits the homography
//! - **Play**: `CoordinateMapper` maps a hit, `scoring` rates it, and
//!   `RoundMachine` owns the session and its timers
//! - **Link**: `protocol` parses device lines, `command_log` is the shared
//!   file the board polls, `bridge` and `runner` drive both from the host
//! - **Board**: `supervisor` polls the command log, `firmware` holds the
//!   calibration and detection routines

pub mod anchors;
pub mod bridge;
pub mod builder;
pub mod cluster;
pub mod command_log;
pub mod config;
pub mod conversions;
pub mod error;
pub mod events;
pub mod firmware;
pub mod hw_error;
pub mod machine;
pub mod protocol;
pub mod runner;
pub mod schedule;
pub mod scoring;
pub mod session;
pub mod supervisor;
pub mod transform;

pub use anchors::{AnchorRole, AnchorSet, sort_anchors};
pub use bridge::{CalibrationOutcome, HostBridge};
pub use builder::{Missing, RoundMachineBuilder, Set};
pub use cluster::{BlobClusterer, Detection as BlobDetection};
pub use command_log::{Command, CommandCursor, CommandLog};
pub use config::{
    ClusterCfg, FirmwareCfg, LinkTimeouts, ModeTiming, ScoringRules, ScreenGeometry, TimingCfg,
};
pub use error::{
    BuildError, CalibrationError, LinkError, ParseError, Report, Result, ScoringError,
};
pub use events::{GameEvent, RecordingRenderer, Renderer};
pub use machine::{Detection, IgnoreReason, RoundMachine};
pub use protocol::{DeviceMessage, parse_line};
pub use runner::{AbortCause, SessionOptions, SessionSummary, run_session};
pub use scoring::{HitClassifier, HitMarkers, HitOutcome};
pub use session::{AmmoSegment, GameMode, Phase, RoundSession};
pub use supervisor::{Dispatch, FirmwareActions, Supervisor};
pub use transform::{CoordinateMapper, CoordinateTransform, TransformKind};
