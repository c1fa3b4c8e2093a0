//! Live game state owned by the round machine.

use std::fmt;

use nalgebra::Point2;

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum GameMode {
    /// Target fixed at the rest position, always visible.
    Static = 1,
    /// Random hide and show durations, teleport on every show.
    HideAndTeleport = 2,
    /// Fixed cadence, one armed shot per visible window.
    Timed = 3,
}

impl GameMode {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn moves(self) -> bool {
        !matches!(self, GameMode::Static)
    }
}

impl TryFrom<u8> for GameMode {
    type Error = BuildError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(GameMode::Static),
            2 => Ok(GameMode::HideAndTeleport),
            3 => Ok(GameMode::Timed),
            other => Err(BuildError::UnknownMode(other)),
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameMode::Static => "static",
            GameMode::HideAndTeleport => "hide-and-teleport",
            GameMode::Timed => "timed",
        };
        write!(f, "{s} ({})", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Armed,
    Running,
    Ending,
}

/// One indicator in the ammo bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmmoSegment {
    Present,
    /// Spent by a detection (hit or miss).
    Removed,
    /// Spent by a window that closed without a detection.
    Grayed,
}

/// Ledger entry for one presented window in timed mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundSlot {
    pub index: u32,
    pub resolved: bool,
}

/// How a round was counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundResolution {
    Hit,
    Miss,
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct RoundSession {
    pub(crate) mode: GameMode,
    pub(crate) rounds: u32,
    pub(crate) round_count: u32,
    /// Rounds resolved by a scoring hit.
    pub(crate) shots: u32,
    pub(crate) missed_rounds: u32,
    pub(crate) score: u32,
    pub(crate) target_center: Point2<f64>,
    pub(crate) target_visible: bool,
    pub(crate) armed: bool,
    pub(crate) ammo: Vec<AmmoSegment>,
    pub(crate) generation: u64,
    pub(crate) player: String,
    pub(crate) hidden_at_ms: Option<u64>,
    pub(crate) slot: Option<RoundSlot>,
    pub(crate) windows_presented: u32,
}

impl RoundSession {
    pub(crate) fn new(mode: GameMode, rounds: u32, center: Point2<f64>) -> Self {
        Self {
            mode,
            rounds,
            round_count: 0,
            shots: 0,
            missed_rounds: 0,
            score: 0,
            target_center: center,
            target_visible: true,
            armed: false,
            ammo: vec![AmmoSegment::Present; rounds as usize],
            generation: 0,
            player: String::new(),
            hidden_at_ms: None,
            slot: None,
            windows_presented: 0,
        }
    }

    /// Clear per-session counters for a new player. The generation is kept;
    /// the caller bumps it.
    pub(crate) fn reset(&mut self, player: &str, center: Point2<f64>) {
        let generation = self.generation;
        *self = Self::new(self.mode, self.rounds, center);
        self.generation = generation;
        self.player = player.to_owned();
    }

    /// Count one round. Returns the ammo index that changed.
    pub(crate) fn resolve_round(&mut self, how: RoundResolution, points: u32) -> usize {
        self.round_count += 1;
        match how {
            RoundResolution::Hit => {
                self.shots += 1;
                self.score += points;
            }
            RoundResolution::Miss | RoundResolution::TimedOut => self.missed_rounds += 1,
        }
        let idx = self.rounds.saturating_sub(self.round_count) as usize;
        if let Some(seg) = self.ammo.get_mut(idx) {
            *seg = match how {
                RoundResolution::TimedOut => AmmoSegment::Grayed,
                _ => AmmoSegment::Removed,
            };
        }
        debug_assert_eq!(self.round_count, self.shots + self.missed_rounds);
        idx
    }

    pub fn is_complete(&self) -> bool {
        self.round_count >= self.rounds
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }
    pub fn rounds(&self) -> u32 {
        self.rounds
    }
    pub fn round_count(&self) -> u32 {
        self.round_count
    }
    pub fn shots(&self) -> u32 {
        self.shots
    }
    pub fn missed_rounds(&self) -> u32 {
        self.missed_rounds
    }
    pub fn score(&self) -> u32 {
        self.score
    }
    pub fn target_center(&self) -> Point2<f64> {
        self.target_center
    }
    pub fn target_visible(&self) -> bool {
        self.target_visible
    }
    pub fn armed(&self) -> bool {
        self.armed
    }
    pub fn ammo(&self) -> &[AmmoSegment] {
        &self.ammo
    }
    pub fn generation(&self) -> u64 {
        self.generation
    }
    pub fn player(&self) -> &str {
        &self.player
    }
    pub fn slot(&self) -> Option<RoundSlot> {
        self.slot
    }
}
