//! Cross-frame blob clustering.
//!
//! Detections gathered over the calibration window are grouped greedily: a
//! detection joins the first cluster whose *first* member lies closer than
//! the proximity threshold, otherwise it seeds a new cluster. Clusters are
//! never merged afterwards, even if their means drift together.

use nalgebra::Point2;

use crate::config::ClusterCfg;
use crate::error::CalibrationError;

/// One camera-reported centroid, in raw camera pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub x: f64,
    pub y: f64,
    pub frame: u64,
}

impl Detection {
    pub fn point(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone)]
pub struct Cluster {
    first: Point2<f64>,
    sum_x: f64,
    sum_y: f64,
    members: Vec<Detection>,
}

impl Cluster {
    fn seed(d: Detection) -> Self {
        Self {
            first: d.point(),
            sum_x: d.x,
            sum_y: d.y,
            members: vec![d],
        }
    }

    fn accepts(&self, p: Point2<f64>, threshold: f64) -> bool {
        nalgebra::distance(&self.first, &p) < threshold
    }

    fn join(&mut self, d: Detection) {
        self.sum_x += d.x;
        self.sum_y += d.y;
        self.members.push(d);
    }

    /// Running mean of all members.
    pub fn mean(&self) -> Point2<f64> {
        let n = self.members.len() as f64;
        Point2::new(self.sum_x / n, self.sum_y / n)
    }

    pub fn first(&self) -> Point2<f64> {
        self.first
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[Detection] {
        &self.members
    }
}

/// Order points top-to-bottom, then left-to-right.
pub(crate) fn cmp_yx(a: &Point2<f64>, b: &Point2<f64>) -> std::cmp::Ordering {
    a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x))
}

#[derive(Debug, Clone)]
pub struct BlobClusterer {
    cfg: ClusterCfg,
    clusters: Vec<Cluster>,
    frames: u64,
    detections: usize,
}

impl BlobClusterer {
    pub fn new(cfg: ClusterCfg) -> Self {
        Self {
            cfg,
            clusters: Vec::new(),
            frames: 0,
            detections: 0,
        }
    }

    /// Feed one frame's centroids. At most `max_per_frame` are taken, in
    /// the order reported. Returns the frame id assigned.
    pub fn add_frame(&mut self, points: &[(f64, f64)]) -> u64 {
        let frame = self.frames;
        self.frames += 1;
        for &(x, y) in points.iter().take(self.cfg.max_per_frame) {
            self.add_detection(Detection { x, y, frame });
        }
        frame
    }

    pub fn add_detection(&mut self, d: Detection) {
        if !(d.x.is_finite() && d.y.is_finite()) {
            tracing::debug!(x = d.x, y = d.y, "ignoring non-finite detection");
            return;
        }
        self.detections += 1;
        let p = d.point();
        let threshold = self.cfg.proximity_px;
        match self.clusters.iter_mut().find(|c| c.accepts(p, threshold)) {
            Some(c) => c.join(d),
            None => self.clusters.push(Cluster::seed(d)),
        }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn detection_count(&self) -> usize {
        self.detections
    }

    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Close the window: one averaged position per cluster, rounded to whole
    /// pixels and then scaled, sorted by (y, x) and truncated to
    /// `max_clusters`.
    pub fn finish(&self) -> Result<Vec<Point2<f64>>, CalibrationError> {
        if self.clusters.is_empty() {
            return Err(CalibrationError::NoBlobs);
        }
        let scale = self.cfg.scale;
        let mut out: Vec<Point2<f64>> = self
            .clusters
            .iter()
            .map(|c| {
                let m = c.mean();
                Point2::new(m.x.round() * scale, m.y.round() * scale)
            })
            .collect();
        out.sort_by(cmp_yx);
        if out.len() > self.cfg.max_clusters {
            tracing::warn!(
                clusters = out.len(),
                kept = self.cfg.max_clusters,
                "dropping surplus clusters"
            );
            out.truncate(self.cfg.max_clusters);
        }
        tracing::debug!(
            clusters = out.len(),
            detections = self.detections,
            frames = self.frames,
            "clustering finished"
        );
        Ok(out)
    }
}
