//! Host play loop: one link read, one scheduler tick, repeat.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use laser_config::Leaderboard;
use laser_traits::DeviceLink;
use nalgebra::Point2;

use crate::bridge::HostBridge;
use crate::error::{LinkError, Result, ScoringError};
use crate::events::{GameEvent, Renderer};
use crate::machine::{Detection, RoundMachine};
use crate::protocol::DeviceMessage;
use crate::session::GameMode;
use crate::transform::CoordinateMapper;

#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub player: String,
    /// Hard cap on one session; 0 disables it.
    pub max_session_ms: u64,
    pub shutdown: Option<Arc<AtomicBool>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortCause {
    Link(LinkError),
    Shutdown,
    TimeLimit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub player: String,
    pub mode: GameMode,
    pub score: u32,
    pub round_count: u32,
    pub shots: u32,
    pub missed_rounds: u32,
    /// Hit lines dropped because they could not be mapped.
    pub dropped_hits: u32,
    pub aborted: Option<AbortCause>,
}

impl SessionSummary {
    pub fn completed(&self) -> bool {
        self.aborted.is_none()
    }
}

fn shutdown_requested(opts: &SessionOptions) -> bool {
    opts.shutdown
        .as_ref()
        .is_some_and(|f| f.load(Ordering::Relaxed))
}

/// Play one session to the score reveal, or until the link fails, the
/// shutdown flag is set or the time cap is hit. The final score is recorded
/// on `leaderboard` when it is revealed.
pub fn run_session<L, R>(
    bridge: &mut HostBridge<L>,
    machine: &mut RoundMachine,
    mapper: &CoordinateMapper,
    renderer: &mut R,
    leaderboard: Option<&Leaderboard>,
    opts: &SessionOptions,
) -> Result<SessionSummary>
where
    L: DeviceLink,
    R: Renderer + ?Sized,
{
    if !mapper.is_ready() {
        return Err(eyre::Report::new(ScoringError::TransformUnset))
            .wrap_err("play refused until calibration succeeds");
    }
    bridge.open_for_play()?;
    machine.start(&opts.player);
    machine.drain_to(renderer);

    let started = machine.now_ms();
    let mut dropped_hits = 0u32;
    let mut aborted = None;
    let mut revealed = false;

    while !revealed {
        if shutdown_requested(opts) {
            aborted = Some(AbortCause::Shutdown);
            break;
        }
        if opts.max_session_ms > 0
            && machine.now_ms().saturating_sub(started) >= opts.max_session_ms
        {
            tracing::warn!(max_session_ms = opts.max_session_ms, "session time limit hit");
            aborted = Some(AbortCause::TimeLimit);
            break;
        }

        match bridge.read_message() {
            Ok(Some(DeviceMessage::Ready)) => {
                machine.device_ready();
            }
            Ok(Some(DeviceMessage::Hit { x, y })) => {
                match mapper.map(Point2::new(x as f64, y as f64)) {
                    Ok(p) => {
                        if let Detection::Ignored(reason) = machine.on_detection(p) {
                            tracing::debug!(x, y, ?reason, "detection ignored");
                        }
                    }
                    Err(e) => {
                        dropped_hits += 1;
                        tracing::warn!(x, y, error = %e, "hit dropped");
                    }
                }
            }
            Ok(Some(other)) => tracing::debug!(device = %other, "device"),
            Ok(None) => {}
            Err(e) => {
                tracing::error!(error = %e, "device link failed during play");
                aborted = Some(AbortCause::Link(e));
                break;
            }
        }

        machine.tick();
        for ev in machine.take_events() {
            renderer.render(&ev);
            if let GameEvent::ScoreRevealed {
                player,
                score,
                mode,
            } = &ev
            {
                revealed = true;
                if let Some(lb) = leaderboard {
                    if let Err(e) = lb.record(player, *score, mode.number()) {
                        tracing::warn!(error = %e, "leaderboard write failed");
                    }
                }
            }
        }
    }

    if aborted.is_some() {
        machine.abort();
        machine.drain_to(renderer);
    }
    if let Err(e) = bridge.finish_play() {
        tracing::warn!(error = %e, "could not signal end of play");
    }

    let s = machine.session();
    let summary = SessionSummary {
        player: s.player().to_owned(),
        mode: s.mode(),
        score: s.score(),
        round_count: s.round_count(),
        shots: s.shots(),
        missed_rounds: s.missed_rounds(),
        dropped_hits,
        aborted,
    };
    tracing::info!(
        score = summary.score,
        rounds = summary.round_count,
        completed = summary.completed(),
        "session finished"
    );
    Ok(summary)
}
