mod board;
mod cli;
mod error_fmt;
mod play;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use eyre::WrapErr;
use laser_config::Config;
use laser_core::error::Result;
use laser_core::{Command, CommandLog, CoordinateMapper};
use laser_traits::DeviceLink;
use tracing_subscriber::{EnvFilter, Layer, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{ConfigInvalid, exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    if let Err(e) = color_eyre::install() {
        eprintln!("warning: could not install error report hooks: {e}");
    }
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = run(cli) {
        let json = JSON_MODE.get().copied().unwrap_or(false);
        tracing::error!(error = %err, "command failed");
        if json {
            println!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    init_tracing(cli.json, &cli.log_level, &cfg.logging)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed)) {
            tracing::warn!(error = %e, "could not install Ctrl-C handler");
        }
    }

    match &cli.cmd {
        Commands::Calibrate => {
            let clock = play::make_clock(cli.virtual_time);
            let link = play::open_link(
                &cfg,
                cli.port.as_deref(),
                cli.sim_script.as_deref(),
                clock.clone(),
            )?;
            let mut bridge = play::make_bridge(&cfg, link, clock);
            let mut mapper = CoordinateMapper::new();
            let outcome = play::calibrate(&cfg, &mut bridge, &mut mapper)?;
            play::print_calibration(&outcome, cli.json);
        }
        Commands::Game {
            name,
            mode,
            rounds,
            max_session_ms,
            seed,
        } => {
            let clock = play::make_clock(cli.virtual_time);
            let link = play::open_link(
                &cfg,
                cli.port.as_deref(),
                cli.sim_script.as_deref(),
                clock.clone(),
            )?;
            let mut bridge = play::make_bridge(&cfg, link, clock.clone());
            let args = play::GameArgs {
                name: name.clone(),
                mode: *mode,
                rounds: *rounds,
                max_session_ms: *max_session_ms,
                seed: *seed,
            };
            let summary = play::run_game(&cfg, &mut bridge, clock, &args, shutdown, cli.json)?;
            play::print_summary(&summary, cli.json);
        }
        Commands::Supervise { sim_frames } => {
            let polls = board::supervise(
                &cfg,
                sim_frames,
                play::make_clock(cli.virtual_time),
                shutdown,
            )?;
            tracing::info!(polls, "supervisor exited");
        }
        Commands::Leaderboard { mode } => {
            let board = laser_config::Leaderboard::new(&cfg.paths.leaderboard, &cfg.leaderboard);
            let entries = board.top(*mode)?;
            if cli.json {
                println!("{}", serde_json::to_string(&entries)?);
            } else if entries.is_empty() {
                println!("No scores for mode {mode} yet");
            } else {
                for (i, e) in entries.iter().enumerate() {
                    println!("{}. {} {}", i + 1, e.name, e.score);
                }
            }
        }
        Commands::Coords => {
            let file = laser_config::coords::load(&cfg.paths.coords)?;
            if cli.json {
                let v = serde_json::json!({
                    "roi": [file.roi.x1, file.roi.y1, file.roi.x2, file.roi.y2],
                    "blobs": file.blobs.iter().map(|&(x, y)| [x, y]).collect::<Vec<_>>(),
                });
                println!("{v}");
            } else {
                print!("{}", laser_config::coords::render(&file));
            }
        }
        Commands::Send { token } => {
            let cmd = Command::parse(token);
            if let Command::Unknown(t) = &cmd {
                tracing::warn!(token = %t, "sending a token the board does not know");
            }
            CommandLog::new(&cfg.paths.command_log).append(&cmd)?;
            tracing::info!(command = %cmd, log = %cfg.paths.command_log.display(), "command sent");
        }
        Commands::SelfCheck => self_check(&cfg, &cli)?,
    }
    Ok(())
}

/// Built-in defaults when no file is given; every failure maps to exit code 5.
fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let invalid = || ConfigInvalid {
        source: path.display().to_string(),
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))
        .wrap_err_with(invalid)?;
    let cfg = laser_config::load_toml(&text).wrap_err_with(invalid)?;
    cfg.validate().wrap_err_with(invalid)?;
    Ok(cfg)
}

fn init_tracing(json: bool, level: &str, logging: &laser_config::Logging) -> Result<()> {
    let console_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    if json {
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    } else {
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_filter(console_filter)
                .boxed(),
        );
    }

    if let Some(file) = &logging.file {
        let path = Path::new(file);
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let name = path
            .file_name()
            .ok_or_else(|| eyre::eyre!("logging.file has no file name: {file}"))?;
        let appender = match logging.rotation.as_deref().unwrap_or("never") {
            "daily" => tracing_appender::rolling::daily(dir, name),
            "hourly" => tracing_appender::rolling::hourly(dir, name),
            _ => tracing_appender::rolling::never(dir, name),
        };
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))
            .wrap_err("invalid logging.level")?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(file_filter)
                .boxed(),
        );
    }

    if let Err(e) = tracing_subscriber::registry().with(layers).try_init() {
        eprintln!("warning: tracing already initialized: {e}");
    }
    Ok(())
}

fn self_check(cfg: &Config, cli: &Cli) -> Result<()> {
    println!("config: ok");
    for (what, p) in [
        ("command log", &cfg.paths.command_log),
        ("coords", &cfg.paths.coords),
        ("leaderboard", &cfg.paths.leaderboard),
    ] {
        let state = if p.exists() { "present" } else { "not yet written" };
        println!("{what}: {} ({state})", p.display());
    }

    let clock = play::make_clock(cli.virtual_time);
    let mut link = play::open_link(cfg, cli.port.as_deref(), cli.sim_script.as_deref(), clock)?;
    link.open(Duration::from_millis(cfg.device.play_timeout_ms))
        .map_err(|e| eyre::Report::new(laser_core::hw_error::map_link_error(e.as_ref())))
        .wrap_err("open device link")?;
    if let Err(e) = link.close() {
        tracing::warn!(error = %e, "closing device link failed");
    }
    println!("device: ok");
    Ok(())
}
