//! Ring scoring and the hit-marker history.

use nalgebra::{Point2, Vector2};

use crate::config::ScoringRules;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HitOutcome {
    /// Inside the rings. `band` 1 is the innermost ring.
    Scored { band: usize, points: u32, distance: f64 },
    /// Outside the rings, or the target was not showing.
    Miss { distance: f64 },
}

impl HitOutcome {
    pub fn points(&self) -> u32 {
        match self {
            HitOutcome::Scored { points, .. } => *points,
            HitOutcome::Miss { .. } => 0,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, HitOutcome::Scored { .. })
    }

    pub fn distance(&self) -> f64 {
        match self {
            HitOutcome::Scored { distance, .. } | HitOutcome::Miss { distance } => *distance,
        }
    }
}

/// Band for a distance: `ceil(r / step)`, at least 1, or `None` at or past
/// the outer edge.
pub fn ring_band(rules: &ScoringRules, r: f64) -> Option<usize> {
    if !r.is_finite() || r >= rules.outer_radius() {
        return None;
    }
    let band = (r / rules.ring_step).ceil().max(1.0) as usize;
    Some(band.min(rules.rings()))
}

/// Screen positions of scored hits, kept so markers can be redrawn relative
/// to the target after it moves.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitMarkers {
    points: Vec<Point2<f64>>,
}

impl HitMarkers {
    pub fn push(&mut self, p: Point2<f64>) {
        self.points.push(p);
    }

    /// Shift every marker by the target's displacement.
    pub fn translate(&mut self, delta: Vector2<f64>) {
        for p in &mut self.points {
            *p += delta;
        }
    }

    pub fn as_slice(&self) -> &[Point2<f64>] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Turns a mapped screen point into exactly one outcome.
#[derive(Debug, Clone)]
pub struct HitClassifier {
    rules: ScoringRules,
    markers: HitMarkers,
}

impl HitClassifier {
    pub fn new(rules: ScoringRules) -> Self {
        Self {
            rules,
            markers: HitMarkers::default(),
        }
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn markers(&self) -> &HitMarkers {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut HitMarkers {
        &mut self.markers
    }

    /// Classify `p` against a target at `center`. A hidden target always
    /// yields a miss; callers decide whether a hidden-target detection is
    /// classified at all. Scored hits are appended to the marker history.
    pub fn classify(&mut self, p: Point2<f64>, center: Point2<f64>, visible: bool) -> HitOutcome {
        let distance = nalgebra::distance(&p, &center);
        if !visible {
            return HitOutcome::Miss { distance };
        }
        match ring_band(&self.rules, distance) {
            Some(band) => {
                let points = self.rules.points[self.rules.rings() - band];
                self.markers.push(p);
                HitOutcome::Scored {
                    band,
                    points,
                    distance,
                }
            }
            None => HitOutcome::Miss { distance },
        }
    }
}
