//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "laser", version, about = "Laser range CLI")]
pub struct Cli {
    /// Path to config TOML; built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines and print results as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Serial port of the camera board (overrides device.port)
    #[arg(long, value_name = "PORT")]
    pub port: Option<String>,

    /// Replay a device transcript instead of opening the serial port
    #[arg(long, value_name = "FILE", env = "LASER_SIM_SCRIPT")]
    pub sim_script: Option<PathBuf>,

    /// Run simulated devices on a virtual clock (no real waiting)
    #[arg(long, action = ArgAction::SetTrue, env = "LASER_VIRTUAL_TIME")]
    pub virtual_time: bool,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one calibration pass and print the fitted anchors
    Calibrate,
    /// Calibrate, then play one session
    Game {
        /// Player name recorded on the leaderboard
        #[arg(long, default_value = "player")]
        name: String,
        /// 1 = static, 2 = hide and teleport, 3 = timed (overrides game.mode)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
        mode: Option<u8>,
        /// Rounds per session (overrides game.rounds)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        rounds: Option<u32>,
        /// Abort the session after this many ms (overrides game.max_session_ms)
        #[arg(long, value_name = "MS")]
        max_session_ms: Option<u64>,
        /// Seed for target teleports (random when omitted)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Board side: poll the command log and run the firmware routines
    Supervise {
        /// Centroid script standing in for the camera pipeline
        #[arg(long, value_name = "FILE")]
        sim_frames: PathBuf,
    },
    /// Show the best scores for a mode
    Leaderboard {
        #[arg(long, default_value_t = 1)]
        mode: u8,
    },
    /// Print the calibration coordinates file
    Coords,
    /// Append a raw command token to the command log
    Send {
        /// start | calib | end | exit | coords | test | led_off
        token: String,
    },
    /// Quick health check (config, paths, device link)
    SelfCheck,
}
