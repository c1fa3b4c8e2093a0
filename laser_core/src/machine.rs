//! Round state machine: `Idle -> Armed -> Running -> Ending -> Idle`.
//!
//! All timing goes through the scheduled-task queue; nothing here sleeps.
//! Every task carries the generation it was scheduled under and is dropped
//! if the generation has moved on (restart, abort, or the switch to
//! `Ending`).

use std::sync::Arc;
use std::time::Instant;

use laser_traits::clock::Clock;
use nalgebra::Point2;
use rand::Rng;
use rand::rngs::StdRng;

use crate::builder::{Missing, RoundMachineBuilder};
use crate::config::{ModeTiming, ScreenGeometry, TimingCfg};
use crate::error::{BuildError, Result};
use crate::events::{GameEvent, Renderer};
use crate::schedule::{ScheduledTask, TaskKind, TaskQueue};
use crate::scoring::{HitClassifier, HitMarkers, HitOutcome};
use crate::session::{AmmoSegment, GameMode, Phase, RoundResolution, RoundSession, RoundSlot};

/// Teleport keeps the outer ring this far from the left, right and top edges.
pub const TELEPORT_EDGE_PX: f64 = 60.0;
/// Bottom clearance for teleports; leaves room for the ammo bar.
pub const TELEPORT_BOTTOM_PX: f64 = 140.0;

/// What happened to one mapped detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Detection {
    Resolved(HitOutcome),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotRunning,
    /// Timed mode: the window's one shot was already taken.
    Disarmed,
    /// Hidden for longer than the grace period.
    HiddenPastGrace,
    /// Timed mode: the window was already counted.
    WindowResolved,
}

pub struct RoundMachine {
    pub(crate) screen: ScreenGeometry,
    pub(crate) classifier: HitClassifier,
    pub(crate) timing: TimingCfg,
    pub(crate) modes: ModeTiming,
    pub(crate) session: RoundSession,
    pub(crate) phase: Phase,
    pub(crate) awaiting_ready: bool,
    pub(crate) tasks: TaskQueue,
    pub(crate) events: Vec<GameEvent>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,
    pub(crate) rng: StdRng,
}

impl core::fmt::Debug for RoundMachine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RoundMachine")
            .field("phase", &self.phase)
            .field("mode", &self.session.mode)
            .field("round_count", &self.session.round_count)
            .field("score", &self.session.score)
            .field("generation", &self.session.generation)
            .field("pending_tasks", &self.tasks.len())
            .finish()
    }
}

impl RoundMachine {
    pub fn builder() -> RoundMachineBuilder<Missing, Missing> {
        RoundMachineBuilder::default()
    }

    /// Milliseconds since the machine was built, on its clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn session(&self) -> &RoundSession {
        &self.session
    }

    pub fn markers(&self) -> &HitMarkers {
        self.classifier.markers()
    }

    pub fn screen(&self) -> &ScreenGeometry {
        &self.screen
    }

    /// Started and waiting for the device's ready line.
    pub fn awaiting_ready(&self) -> bool {
        self.awaiting_ready
    }

    /// True from `start` until the score is revealed or the session aborts.
    pub fn is_active(&self) -> bool {
        self.awaiting_ready || self.phase != Phase::Idle
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    pub fn next_due_ms(&self) -> Option<u64> {
        self.tasks.next_due()
    }

    /// Change mode or round total between sessions.
    pub fn reconfigure(&mut self, mode: GameMode, rounds: u32) -> Result<()> {
        if self.is_active() {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "mode and rounds cannot change during a session",
            )));
        }
        if rounds == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "rounds must be >= 1",
            )));
        }
        let center = self.screen.rest_center();
        let generation = self.session.generation;
        self.session = RoundSession::new(mode, rounds, center);
        self.session.generation = generation;
        tracing::info!(mode = mode.number(), rounds, "session settings changed");
        Ok(())
    }

    /// Reset for a new player and wait for the device to report ready.
    /// A session already in progress is abandoned.
    pub fn start(&mut self, player: &str) {
        if self.is_active() {
            self.abort();
        }
        let center = self.screen.rest_center();
        self.session.reset(player, center);
        self.session.generation += 1;
        self.classifier.markers_mut().clear();
        self.awaiting_ready = true;
        tracing::info!(
            player,
            mode = self.session.mode.number(),
            rounds = self.session.rounds,
            generation = self.session.generation,
            "session started"
        );
        self.emit(GameEvent::SessionStarted {
            player: player.to_owned(),
            mode: self.session.mode,
            rounds: self.session.rounds,
        });
        self.emit(GameEvent::TargetShown { center });
    }

    /// The device is watching for hits. Returns false if nothing was waiting.
    pub fn device_ready(&mut self) -> bool {
        if self.phase != Phase::Idle || !self.awaiting_ready {
            tracing::debug!(phase = ?self.phase, "ready line outside of a start; ignoring");
            return false;
        }
        self.awaiting_ready = false;
        self.phase = Phase::Armed;
        self.emit(GameEvent::ReadyCue);
        self.schedule(self.timing.ready_ms, TaskKind::StartCue);
        true
    }

    /// Abandon the session and return to idle. Pending tasks are dropped.
    pub fn abort(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        tracing::warn!(
            phase = ?self.phase,
            round_count = self.session.round_count,
            "session aborted"
        );
        self.phase = Phase::Idle;
        self.awaiting_ready = false;
        self.session.armed = false;
        self.session.generation += 1;
        self.tasks.clear();
        self.emit(GameEvent::SessionAborted);
        true
    }

    /// Run every task due by now, including ones scheduled by tasks run in
    /// this call. Returns how many ran.
    pub fn tick(&mut self) -> usize {
        let mut ran = 0;
        loop {
            let now = self.now_ms();
            let Some(task) = self.tasks.pop_due(now) else {
                break;
            };
            if task.generation != self.session.generation {
                tracing::trace!(kind = ?task.kind, generation = task.generation, "stale task");
                continue;
            }
            self.run_task(task.kind, now);
            ran += 1;
        }
        ran
    }

    /// Feed one detection already mapped to screen space.
    pub fn on_detection(&mut self, p: Point2<f64>) -> Detection {
        if self.phase != Phase::Running {
            return Detection::Ignored(IgnoreReason::NotRunning);
        }
        let timed = self.session.mode == GameMode::Timed;
        let center = self.session.target_center;

        if self.session.target_visible {
            if timed {
                if !self.session.armed {
                    tracing::debug!("second detection in a timed window; ignoring");
                    return Detection::Ignored(IgnoreReason::Disarmed);
                }
                self.session.armed = false;
            }
            let outcome = self.classifier.classify(p, center, true);
            return Detection::Resolved(self.resolve_detection(p, outcome));
        }

        let now = self.now_ms();
        let within_grace = self
            .session
            .hidden_at_ms
            .is_some_and(|h| now.saturating_sub(h) <= self.timing.miss_grace_ms);
        if !within_grace {
            return Detection::Ignored(IgnoreReason::HiddenPastGrace);
        }
        if timed && !self.session.slot.is_some_and(|s| !s.resolved) {
            return Detection::Ignored(IgnoreReason::WindowResolved);
        }
        let outcome = self.classifier.classify(p, center, false);
        Detection::Resolved(self.resolve_detection(p, outcome))
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Hand every pending event to `renderer`, oldest first.
    pub fn drain_to<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        for ev in self.events.drain(..) {
            renderer.render(&ev);
        }
    }

    // ── Internals ────────────────────────────────────────────────────────────

    fn emit(&mut self, ev: GameEvent) {
        self.events.push(ev);
    }

    fn schedule(&mut self, delay_ms: u64, kind: TaskKind) {
        let due_ms = self.now_ms().saturating_add(delay_ms);
        self.tasks.push(ScheduledTask {
            due_ms,
            generation: self.session.generation,
            kind,
        });
    }

    fn run_task(&mut self, kind: TaskKind, now: u64) {
        match (kind, self.phase) {
            (TaskKind::StartCue, Phase::Armed) => {
                self.emit(GameEvent::StartCue);
                self.schedule(self.timing.start_cue_ms, TaskKind::BeginRunning);
            }
            (TaskKind::BeginRunning, Phase::Armed) => self.begin_running(),
            (TaskKind::Hide, Phase::Running) => self.hide(now),
            (TaskKind::ShowAndMove { visible_ms }, Phase::Running) => self.show_and_move(visible_ms),
            (TaskKind::MissedCheck { slot }, Phase::Running) => self.resolve_timeout(slot),
            (TaskKind::Reveal, Phase::Ending) => self.reveal(),
            (kind, phase) => {
                tracing::debug!(?kind, ?phase, "task does not apply in this phase");
            }
        }
    }

    fn begin_running(&mut self) {
        self.phase = Phase::Running;
        self.session.target_visible = true;
        let mode = self.session.mode;
        tracing::info!(mode = mode.number(), "rounds running");
        self.emit(GameEvent::Running { mode });
        if mode.moves() {
            self.schedule(0, TaskKind::Hide);
        }
    }

    fn hide(&mut self, now: u64) {
        self.session.target_visible = false;
        self.session.armed = false;
        self.session.hidden_at_ms = Some(now);
        self.emit(GameEvent::TargetHidden);

        if self.session.mode == GameMode::Timed {
            if let Some(slot) = self.session.slot.filter(|s| !s.resolved) {
                self.schedule(
                    self.timing.missed_check_ms,
                    TaskKind::MissedCheck { slot: slot.index },
                );
            }
        }
        let (hide_ms, visible_ms) = self.cycle_durations();
        self.schedule(hide_ms, TaskKind::ShowAndMove { visible_ms });
    }

    fn show_and_move(&mut self, visible_ms: u64) {
        if self.session.mode == GameMode::Timed {
            // The missed check normally lands first; this covers a check
            // delay configured longer than the hide.
            if let Some(slot) = self.session.slot.filter(|s| !s.resolved) {
                self.resolve_timeout(slot.index);
                if self.phase != Phase::Running {
                    return;
                }
            }
        }
        if self.session.round_count <= self.session.rounds {
            self.teleport();
        }
        if self.session.mode == GameMode::Timed {
            if self.session.windows_presented < self.session.rounds {
                self.session.slot = Some(RoundSlot {
                    index: self.session.windows_presented,
                    resolved: false,
                });
                self.session.windows_presented += 1;
                self.session.armed = true;
            } else {
                self.session.slot = None;
            }
        }
        self.session.target_visible = true;
        self.session.hidden_at_ms = None;
        let center = self.session.target_center;
        self.emit(GameEvent::TargetShown { center });
        self.schedule(visible_ms, TaskKind::Hide);
    }

    /// `(hide, visible)` durations for the next cycle.
    fn cycle_durations(&mut self) -> (u64, u64) {
        let m = self.modes;
        match self.session.mode {
            GameMode::Timed => (
                m.timed_hide_ms,
                m.timed_move_ms.saturating_sub(m.timed_hide_ms),
            ),
            GameMode::HideAndTeleport => {
                let hide = self.rng.random_range(m.random_hide_ms.0..=m.random_hide_ms.1);
                let visible = self
                    .rng
                    .random_range(m.random_visible_ms.0..=m.random_visible_ms.1)
                    + m.random_visible_pad_ms;
                (hide, visible)
            }
            GameMode::Static => (0, 0),
        }
    }

    fn teleport(&mut self) {
        let m = self.classifier.rules().outer_radius();
        let x_lo = (TELEPORT_EDGE_PX + m).ceil() as i64;
        let x_hi = (self.screen.width - TELEPORT_EDGE_PX - m).floor() as i64;
        let y_lo = (TELEPORT_EDGE_PX + m).ceil() as i64;
        let y_hi = (self.screen.height - TELEPORT_BOTTOM_PX - m).floor() as i64;
        let to = Point2::new(
            self.rng.random_range(x_lo..=x_hi.max(x_lo)) as f64,
            self.rng.random_range(y_lo..=y_hi.max(y_lo)) as f64,
        );
        self.move_target(to);
    }

    fn move_target(&mut self, to: Point2<f64>) {
        let from = self.session.target_center;
        self.classifier.markers_mut().translate(to - from);
        self.session.target_center = to;
        self.emit(GameEvent::TargetMoved { from, to });
    }

    fn resolve_detection(&mut self, p: Point2<f64>, outcome: HitOutcome) -> HitOutcome {
        if let Some(slot) = self.session.slot.as_mut() {
            slot.resolved = true;
        }
        let (how, points) = match outcome {
            HitOutcome::Scored { points, .. } => (RoundResolution::Hit, points),
            HitOutcome::Miss { .. } => (RoundResolution::Miss, 0),
        };
        let index = self.session.resolve_round(how, points);
        match outcome {
            HitOutcome::Scored { band, points, .. } => self.emit(GameEvent::HitMarked {
                at: p,
                band,
                points,
                score: self.session.score,
            }),
            HitOutcome::Miss { .. } => self.emit(GameEvent::MissMarked { at: Some(p) }),
        }
        self.emit(GameEvent::AmmoChanged {
            index,
            segment: AmmoSegment::Removed,
        });
        tracing::info!(
            round = self.session.round_count,
            points,
            score = self.session.score,
            "round resolved"
        );
        if self.session.is_complete() {
            self.begin_ending();
        }
        outcome
    }

    fn resolve_timeout(&mut self, slot_index: u32) {
        let Some(slot) = self.session.slot.as_mut() else {
            return;
        };
        if slot.index != slot_index || slot.resolved {
            return;
        }
        slot.resolved = true;
        let index = self.session.resolve_round(RoundResolution::TimedOut, 0);
        self.emit(GameEvent::MissMarked { at: None });
        self.emit(GameEvent::AmmoChanged {
            index,
            segment: AmmoSegment::Grayed,
        });
        tracing::info!(
            round = self.session.round_count,
            missed = self.session.missed_rounds,
            "window closed without a shot"
        );
        if self.session.is_complete() {
            self.begin_ending();
        }
    }

    fn begin_ending(&mut self) {
        self.phase = Phase::Ending;
        self.session.armed = false;
        // Retire the running cadence.
        self.session.generation += 1;
        let rest = self.screen.rest_center();
        self.move_target(rest);
        self.session.target_visible = true;
        self.emit(GameEvent::TargetShown { center: rest });
        self.emit(GameEvent::SessionEnding {
            score: self.session.score,
        });
        tracing::info!(
            score = self.session.score,
            shots = self.session.shots,
            missed = self.session.missed_rounds,
            "session ending"
        );
        self.schedule(self.timing.end_reveal_ms, TaskKind::Reveal);
    }

    fn reveal(&mut self) {
        self.phase = Phase::Idle;
        tracing::info!(
            player = %self.session.player,
            score = self.session.score,
            mode = self.session.mode.number(),
            "final score"
        );
        self.emit(GameEvent::ScoreRevealed {
            player: self.session.player.clone(),
            score: self.session.score,
            mode: self.session.mode,
        });
    }
}
