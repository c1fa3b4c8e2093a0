//! Scripted frame source standing in for the camera pipeline.

use std::collections::VecDeque;

use laser_traits::{BoxError, FrameSource};

use crate::error::HwError;

/// Parse a frame script: one frame per line, centroids as `x,y` pairs
/// separated by whitespace. `-` is an empty frame. Lines starting with `#`
/// are comments. Unparseable pairs are skipped.
pub fn parse_frames(text: &str) -> Vec<Vec<(f64, f64)>> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|l| {
            if l == "-" {
                return Vec::new();
            }
            l.split_whitespace()
                .filter_map(|pair| {
                    let (x, y) = pair.split_once(',')?;
                    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
                })
                .collect()
        })
        .collect()
}

/// Yields the scripted frames in order, then fails with `HwError::Exhausted`.
#[derive(Debug, Clone, Default)]
pub struct SimulatedCamera {
    frames: VecDeque<Vec<(f64, f64)>>,
    served: u64,
}

impl SimulatedCamera {
    pub fn new(frames: impl IntoIterator<Item = Vec<(f64, f64)>>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            served: 0,
        }
    }

    /// The same frame `n` times.
    pub fn steady(frame: Vec<(f64, f64)>, n: usize) -> Self {
        Self::new(std::iter::repeat_n(frame, n))
    }

    pub fn served(&self) -> u64 {
        self.served
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl FrameSource for SimulatedCamera {
    fn next_frame(&mut self) -> Result<Vec<(f64, f64)>, BoxError> {
        let frame = self.frames.pop_front().ok_or(HwError::Exhausted)?;
        self.served += 1;
        Ok(frame)
    }
}
