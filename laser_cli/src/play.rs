//! Host side: link assembly, calibration, and one play session.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use laser_config::{Config, Leaderboard};
use laser_core::conversions::host_cluster_cfg;
use laser_core::error::Result;
use laser_core::{
    AbortCause, CalibrationOutcome, CoordinateMapper, GameEvent, GameMode, HostBridge, Renderer,
    RoundMachine, ScreenGeometry, SessionOptions, SessionSummary, run_session,
};
use laser_traits::{Clock, DeviceLink, ManualClock, MonotonicClock};

/// Clock shared by the link, the bridge and the round machine.
pub fn make_clock(virtual_time: bool) -> Arc<dyn Clock + Send + Sync> {
    if virtual_time {
        Arc::new(ManualClock::new())
    } else {
        Arc::new(MonotonicClock::new())
    }
}

/// Scripted link when a transcript is given, otherwise the serial port.
pub fn open_link(
    cfg: &Config,
    port: Option<&str>,
    sim_script: Option<&std::path::Path>,
    clock: Arc<dyn Clock + Send + Sync>,
) -> Result<Box<dyn DeviceLink>> {
    if let Some(path) = sim_script {
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("read device transcript {}", path.display()))?;
        let steps = laser_hardware::parse_script(&text);
        tracing::info!(script = %path.display(), steps = steps.len(), "using simulated device");
        return Ok(Box::new(laser_hardware::SimulatedLink::from_script(
            steps, clock,
        )));
    }
    let port = port.unwrap_or(&cfg.device.port);
    #[cfg(feature = "hardware")]
    {
        tracing::info!(port, baud = cfg.device.baud, "using serial device");
        let _ = clock;
        Ok(Box::new(laser_hardware::SerialLink::new(
            port,
            cfg.device.baud,
        )))
    }
    #[cfg(not(feature = "hardware"))]
    {
        let _ = clock;
        Err(eyre::Report::new(laser_core::LinkError::Unavailable(format!(
            "cannot open {port}: built without serial support (use --features hardware or --sim-script)"
        ))))
    }
}

pub fn make_bridge<L: DeviceLink>(
    cfg: &Config,
    link: L,
    clock: Arc<dyn Clock + Send + Sync>,
) -> HostBridge<L> {
    HostBridge::new(link, &cfg.paths.command_log, cfg.into(), clock)
        .with_cluster(host_cluster_cfg(&cfg.calibration))
}

pub fn calibrate<L: DeviceLink>(
    cfg: &Config,
    bridge: &mut HostBridge<L>,
    mapper: &mut CoordinateMapper,
) -> Result<CalibrationOutcome> {
    let screen: ScreenGeometry = (&cfg.screen).into();
    bridge.calibrate(&screen, mapper)
}

pub fn print_calibration(out: &CalibrationOutcome, json: bool) {
    if json {
        let anchors: serde_json::Map<String, serde_json::Value> = out
            .anchors
            .resolved()
            .map(|(role, p)| (role.label().to_string(), serde_json::json!([p.x, p.y])))
            .collect();
        let v = serde_json::json!({
            "blobs": out.blobs.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>(),
            "anchors": anchors,
            "reports": out.reports,
            "roi": out.roi.map(|r| [r.x1, r.y1, r.x2, r.y2]),
        });
        println!("{v}");
        return;
    }
    println!(
        "Calibration complete: {} blobs from {} reports",
        out.blobs.len(),
        out.reports
    );
    for (role, p) in out.anchors.resolved() {
        println!("  {} -> ({:.1}, {:.1})", role.label(), p.x, p.y);
    }
    if let Some(roi) = out.roi {
        println!("ROI: {roi}");
    }
}

/// Prints game events as plain lines; the canvas itself lives elsewhere.
pub struct ConsoleRenderer;

impl Renderer for ConsoleRenderer {
    fn render(&mut self, event: &GameEvent) {
        match event {
            GameEvent::SessionStarted {
                player,
                mode,
                rounds,
            } => println!("Session for {player}: {mode}, {rounds} rounds"),
            GameEvent::ReadyCue => println!("Ready..."),
            GameEvent::StartCue => println!("Start!"),
            GameEvent::HitMarked {
                band,
                points,
                score,
                ..
            } => println!("Hit ring {band}: +{points} (score {score})"),
            GameEvent::MissMarked { at: Some(_) } => println!("Miss"),
            GameEvent::MissMarked { at: None } => println!("Missed round"),
            GameEvent::SessionEnding { score } => println!("Session over: {score} points"),
            GameEvent::ScoreRevealed {
                player,
                score,
                mode,
            } => println!("Final score for {player}: {score} ({mode})"),
            GameEvent::SessionAborted => println!("Session aborted"),
            other => tracing::debug!(event = ?other, "render"),
        }
    }
}

/// Events stay in the log when results are printed as JSON.
struct QuietRenderer;

impl Renderer for QuietRenderer {
    fn render(&mut self, event: &GameEvent) {
        tracing::debug!(event = ?event, "render");
    }
}

pub struct GameArgs {
    pub name: String,
    pub mode: Option<u8>,
    pub rounds: Option<u32>,
    pub max_session_ms: Option<u64>,
    pub seed: Option<u64>,
}

/// Calibrate, then play one session to the score reveal.
pub fn run_game<L: DeviceLink>(
    cfg: &Config,
    bridge: &mut HostBridge<L>,
    clock: Arc<dyn Clock + Send + Sync>,
    args: &GameArgs,
    shutdown: Arc<AtomicBool>,
    json: bool,
) -> Result<SessionSummary> {
    let mode = GameMode::try_from(args.mode.unwrap_or(cfg.game.mode))?;
    let rounds = args.rounds.unwrap_or(cfg.game.rounds);
    let mut builder = RoundMachine::builder()
        .with_screen((&cfg.screen).into())
        .with_session(mode, rounds)
        .with_scoring((&cfg.game).into())
        .with_timing((&cfg.timing).into())
        .with_modes((&cfg.modes).into())
        .with_clock(clock);
    if let Some(seed) = args.seed {
        builder = builder.with_seed(seed);
    }
    let mut machine = builder.build()?;

    let mut mapper = CoordinateMapper::new();
    let outcome = calibrate(cfg, bridge, &mut mapper).wrap_err("calibration before play")?;
    if !json {
        print_calibration(&outcome, false);
    }

    let board = Leaderboard::new(&cfg.paths.leaderboard, &cfg.leaderboard);
    let opts = SessionOptions {
        player: args.name.clone(),
        max_session_ms: args.max_session_ms.unwrap_or(cfg.game.max_session_ms),
        shutdown: Some(shutdown),
    };
    let summary = if json {
        run_session(bridge, &mut machine, &mapper, &mut QuietRenderer, Some(&board), &opts)?
    } else {
        run_session(bridge, &mut machine, &mapper, &mut ConsoleRenderer, Some(&board), &opts)?
    };
    if let Some(AbortCause::Link(e)) = &summary.aborted {
        return Err(eyre::Report::new(e.clone()).wrap_err("session aborted"));
    }
    Ok(summary)
}

pub fn print_summary(s: &SessionSummary, json: bool) {
    let aborted = s.aborted.as_ref().map(|a| match a {
        AbortCause::Link(_) => "link",
        AbortCause::Shutdown => "shutdown",
        AbortCause::TimeLimit => "time_limit",
    });
    if json {
        let v = serde_json::json!({
            "player": s.player,
            "mode": s.mode.number(),
            "score": s.score,
            "rounds": s.round_count,
            "shots": s.shots,
            "missed_rounds": s.missed_rounds,
            "dropped_hits": s.dropped_hits,
            "completed": s.completed(),
            "aborted": aborted,
        });
        println!("{v}");
        return;
    }
    match aborted {
        None => println!(
            "{}: {} points, {} hits, {} missed",
            s.player, s.score, s.shots, s.missed_rounds
        ),
        Some(why) => println!(
            "{}: session aborted ({why}) after {} rounds",
            s.player, s.round_count
        ),
    }
}
