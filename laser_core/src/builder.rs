//! Type-state builder for `RoundMachine`.
//!
//! Screen geometry and the session settings (mode, rounds) must be provided
//! before `build()` is available. `try_build()` is always available for
//! dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use laser_traits::clock::{Clock, MonotonicClock};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::config::{ModeTiming, ScoringRules, ScreenGeometry, TimingCfg};
use crate::error::{BuildError, Result};
use crate::events::GameEvent;
use crate::machine::{RoundMachine, TELEPORT_BOTTOM_PX, TELEPORT_EDGE_PX};
use crate::schedule::TaskQueue;
use crate::scoring::HitClassifier;
use crate::session::{GameMode, Phase, RoundSession};

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

pub struct RoundMachineBuilder<Sc, Ru> {
    screen: Option<ScreenGeometry>,
    mode: Option<GameMode>,
    rounds: Option<u32>,
    scoring: Option<ScoringRules>,
    timing: Option<TimingCfg>,
    modes: Option<ModeTiming>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    seed: Option<u64>,
    _sc: PhantomData<Sc>,
    _ru: PhantomData<Ru>,
}

impl Default for RoundMachineBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            screen: None,
            mode: None,
            rounds: None,
            scoring: None,
            timing: None,
            modes: None,
            clock: None,
            seed: None,
            _sc: PhantomData,
            _ru: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Validate configuration and construct the machine. Used by both
/// `try_build()` and `build()`.
#[allow(clippy::too_many_arguments)]
fn validate_and_build(
    screen: ScreenGeometry,
    mode: GameMode,
    rounds: u32,
    scoring: ScoringRules,
    timing: TimingCfg,
    modes: ModeTiming,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    seed: Option<u64>,
) -> Result<RoundMachine> {
    // ── Validation ───────────────────────────────────────────────────────────
    if !(screen.width.is_finite() && screen.height.is_finite())
        || screen.width <= 0.0
        || screen.height <= 0.0
    {
        return Err(invalid("screen size must be positive"));
    }
    if rounds == 0 {
        return Err(invalid("rounds must be >= 1"));
    }
    if scoring.points.is_empty() {
        return Err(invalid("at least one ring is required"));
    }
    if !scoring.ring_step.is_finite() || scoring.ring_step <= 0.0 {
        return Err(invalid("ring_step must be > 0"));
    }
    let m = scoring.outer_radius();
    if TELEPORT_EDGE_PX + m > screen.width - TELEPORT_EDGE_PX - m
        || TELEPORT_EDGE_PX + m > screen.height - TELEPORT_BOTTOM_PX - m
    {
        return Err(invalid("rings do not fit the teleport area"));
    }
    if timing.missed_check_ms < timing.miss_grace_ms {
        return Err(invalid("missed_check_ms must be >= miss_grace_ms"));
    }
    if modes.timed_hide_ms == 0 || modes.timed_move_ms <= modes.timed_hide_ms {
        return Err(invalid("timed_move_ms must be > timed_hide_ms > 0"));
    }
    let (h_lo, h_hi) = modes.random_hide_ms;
    let (v_lo, v_hi) = modes.random_visible_ms;
    if h_lo == 0 || h_lo > h_hi || v_lo > v_hi {
        return Err(invalid("random duration ranges must be non-empty"));
    }

    // ── Construct ────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(c) => c,
        None => Arc::new(MonotonicClock::new()),
    };
    let epoch = clock.now();
    let rng = match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    };
    let center = screen.rest_center();

    Ok(RoundMachine {
        screen,
        classifier: HitClassifier::new(scoring),
        timing,
        modes,
        session: RoundSession::new(mode, rounds, center),
        phase: Phase::Idle,
        awaiting_ready: false,
        tasks: TaskQueue::new(),
        events: Vec::<GameEvent>::new(),
        clock,
        epoch,
        rng,
    })
}

impl<Sc, Ru> RoundMachineBuilder<Sc, Ru> {
    /// Fallible build available in any type-state; reports the missing piece.
    pub fn try_build(self) -> Result<RoundMachine> {
        let screen = self
            .screen
            .ok_or_else(|| eyre::Report::new(BuildError::MissingScreen))?;
        let (mode, rounds) = self
            .mode
            .zip(self.rounds)
            .ok_or_else(|| eyre::Report::new(BuildError::MissingRules))?;
        validate_and_build(
            screen,
            mode,
            rounds,
            self.scoring.unwrap_or_default(),
            self.timing.unwrap_or_default(),
            self.modes.unwrap_or_default(),
            self.clock,
            self.seed,
        )
    }

    pub fn with_scoring(mut self, scoring: ScoringRules) -> Self {
        self.scoring = Some(scoring);
        self
    }
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }
    pub fn with_modes(mut self, modes: ModeTiming) -> Self {
        self.modes = Some(modes);
        self
    }
    /// Defaults to `MonotonicClock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
    /// Fix the teleport and cadence randomness.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl<Ru> RoundMachineBuilder<Missing, Ru> {
    pub fn with_screen(self, screen: ScreenGeometry) -> RoundMachineBuilder<Set, Ru> {
        RoundMachineBuilder {
            screen: Some(screen),
            mode: self.mode,
            rounds: self.rounds,
            scoring: self.scoring,
            timing: self.timing,
            modes: self.modes,
            clock: self.clock,
            seed: self.seed,
            _sc: PhantomData,
            _ru: PhantomData,
        }
    }
}

impl<Sc> RoundMachineBuilder<Sc, Missing> {
    pub fn with_session(self, mode: GameMode, rounds: u32) -> RoundMachineBuilder<Sc, Set> {
        RoundMachineBuilder {
            screen: self.screen,
            mode: Some(mode),
            rounds: Some(rounds),
            scoring: self.scoring,
            timing: self.timing,
            modes: self.modes,
            clock: self.clock,
            seed: self.seed,
            _sc: PhantomData,
            _ru: PhantomData,
        }
    }
}

impl RoundMachineBuilder<Set, Set> {
    pub fn build(self) -> Result<RoundMachine> {
        self.try_build()
    }
}
