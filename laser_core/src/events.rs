//! Render events emitted by the round machine.
//!
//! The core never draws. A front end drains events after each call into the
//! machine and turns them into pixels or sounds.

use nalgebra::Point2;

use crate::session::{AmmoSegment, GameMode};

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    SessionStarted {
        player: String,
        mode: GameMode,
        rounds: u32,
    },
    /// Device confirmed it is watching for hits.
    ReadyCue,
    StartCue,
    Running {
        mode: GameMode,
    },
    TargetShown {
        center: Point2<f64>,
    },
    TargetHidden,
    TargetMoved {
        from: Point2<f64>,
        to: Point2<f64>,
    },
    HitMarked {
        at: Point2<f64>,
        band: usize,
        points: u32,
        score: u32,
    },
    MissMarked {
        at: Option<Point2<f64>>,
    },
    AmmoChanged {
        index: usize,
        segment: AmmoSegment,
    },
    SessionEnding {
        score: u32,
    },
    ScoreRevealed {
        player: String,
        score: u32,
        mode: GameMode,
    },
    SessionAborted,
}

/// Sink for render events.
pub trait Renderer {
    fn render(&mut self, event: &GameEvent);
}

/// Renderer that keeps every event, for tests and replays.
#[derive(Debug, Default, Clone)]
pub struct RecordingRenderer {
    pub events: Vec<GameEvent>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, event: &GameEvent) {
        self.events.push(event.clone());
    }
}

impl<R: Renderer + ?Sized> Renderer for &mut R {
    fn render(&mut self, event: &GameEvent) {
        (**self).render(event);
    }
}
