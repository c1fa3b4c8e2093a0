//! Camera to screen projective transform: fitting and application.
//!
//! Fits use Hartley-normalized DLT. Exactly four correspondences are solved
//! directly (8x8 linear system with h33 = 1); more than four go through the
//! SVD least-squares solution.

use nalgebra::{DMatrix, Matrix3, Point2, SMatrix, SVector, Vector3};

use crate::anchors::{AnchorRole, AnchorSet, sort_anchors};
use crate::config::ScreenGeometry;
use crate::error::{CalibrationError, ScoringError};

const EPS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformKind {
    Projective,
}

/// Immutable camera-to-screen mapping. Replaced wholesale on recalibration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateTransform {
    h: Matrix3<f64>,
    kind: TransformKind,
}

impl CoordinateTransform {
    /// Wrap a homography, normalizing it so `h[(2, 2)] == 1`.
    pub fn from_matrix(h: Matrix3<f64>) -> Option<Self> {
        let h = normalize_homography(h)?;
        if !h.iter().all(|v| v.is_finite()) || h.determinant().abs() < EPS {
            return None;
        }
        Some(Self {
            h,
            kind: TransformKind::Projective,
        })
    }

    pub fn identity() -> Self {
        Self {
            h: Matrix3::identity(),
            kind: TransformKind::Projective,
        }
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.h
    }

    pub fn kind(&self) -> TransformKind {
        self.kind
    }

    /// Map one point; `None` if it lands on the line at infinity.
    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Option<Point2<f64>> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        if w.abs() < EPS {
            return None;
        }
        Some(Point2::new(v[0] / w, v[1] / w))
    }
}

/// Screen position of each anchor role: corners and bottom/top midpoints of
/// a rectangle inset by the margins plus the calibration circle radius.
pub fn screen_target(screen: &ScreenGeometry, role: AnchorRole) -> Point2<f64> {
    let r = screen.calib_radius;
    let left = screen.edge_margin + r;
    let right = screen.width - screen.edge_margin - r;
    let mid = screen.width / 2.0;
    let top = screen.edge_margin + r;
    let bottom = screen.height - screen.bottom_margin - r;
    match role {
        AnchorRole::TopLeft => Point2::new(left, top),
        AnchorRole::TopMiddle => Point2::new(mid, top),
        AnchorRole::TopRight => Point2::new(right, top),
        AnchorRole::BottomLeft => Point2::new(left, bottom),
        AnchorRole::BottomMiddle => Point2::new(mid, bottom),
        AnchorRole::BottomRight => Point2::new(right, bottom),
    }
}

pub fn screen_targets(screen: &ScreenGeometry) -> [Point2<f64>; 6] {
    AnchorRole::ALL.map(|r| screen_target(screen, r))
}

/// Fit the transform from resolved anchors, pairing each anchor with the
/// screen target of the same role. Needs at least four resolved anchors.
pub fn solve(
    anchors: &AnchorSet,
    screen: &ScreenGeometry,
) -> Result<CoordinateTransform, CalibrationError> {
    let (src, dst): (Vec<Point2<f64>>, Vec<Point2<f64>>) = anchors
        .resolved()
        .map(|(role, p)| (p, screen_target(screen, role)))
        .unzip();
    if src.len() < 4 {
        return Err(CalibrationError::InsufficientPoints { found: src.len() });
    }
    let h = fit_homography(&src, &dst).ok_or(CalibrationError::Degenerate)?;
    let t = CoordinateTransform::from_matrix(h).ok_or(CalibrationError::Degenerate)?;
    // A valid fit keeps every anchor on the finite side of the plane.
    if src.iter().any(|p| t.apply(*p).is_none()) {
        return Err(CalibrationError::Degenerate);
    }
    tracing::info!(anchors = src.len(), "coordinate transform fitted");
    Ok(t)
}

/// Sort averaged blobs into roles and fit the transform in one step.
pub fn fit_from_blobs(
    blobs: &[Point2<f64>],
    screen: &ScreenGeometry,
) -> Result<(AnchorSet, CoordinateTransform), CalibrationError> {
    let anchors = sort_anchors(blobs);
    let t = solve(&anchors, screen)?;
    Ok((anchors, t))
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > EPS {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points(pts: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = pts.iter().map(|p| (p.x - cx).hypot(p.y - cy)).sum::<f64>() / n;
    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts
        .iter()
        .map(|p| {
            let v = t * Vector3::new(p.x, p.y, 1.0);
            Point2::new(v[0], v[1])
        })
        .collect();
    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < EPS {
        return None;
    }
    Some(h / s)
}

fn denormalize(hn: Matrix3<f64>, t_src: Matrix3<f64>, t_dst: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let t_dst_inv = t_dst.try_inverse()?;
    normalize_homography(t_dst_inv * hn * t_src)
}

/// Estimate `H` with `dst ~ H * src`. Returns `None` for mismatched or
/// too-short inputs and for degenerate layouts.
pub fn fit_homography(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    if src.len() != dst.len() || src.len() < 4 {
        return None;
    }
    let (s, ts) = normalize_points(src);
    let (d, td) = normalize_points(dst);
    let hn = if src.len() == 4 {
        solve_4pt(&s, &d)?
    } else {
        solve_dlt(&s, &d)?
    };
    denormalize(hn, ts, td)
}

fn solve_4pt(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    // Unknowns [h11 h12 h13 h21 h22 h23 h31 h32], h33 = 1:
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();
    for k in 0..4 {
        let (x, y) = (src[k].x, src[k].y);
        let (u, v) = (dst[k].x, dst[k].y);
        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;
        let r1 = r0 + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }
    if a.determinant().abs() < EPS {
        return None;
    }
    let h = a.lu().solve(&b)?;
    Some(Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0))
}

fn solve_dlt(src: &[Point2<f64>], dst: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = src.len();
    let mut a = DMatrix::<f64>::zeros(2 * n, 9);
    for k in 0..n {
        let (x, y) = (src[k].x, src[k].y);
        let (u, v) = (dst[k].x, dst[k].y);
        // [ -x -y -1   0  0  0   u*x u*y u ]
        a[(2 * k, 0)] = -x;
        a[(2 * k, 1)] = -y;
        a[(2 * k, 2)] = -1.0;
        a[(2 * k, 6)] = u * x;
        a[(2 * k, 7)] = u * y;
        a[(2 * k, 8)] = u;
        // [ 0  0  0  -x -y -1   v*x v*y v ]
        a[(2 * k + 1, 3)] = -x;
        a[(2 * k + 1, 4)] = -y;
        a[(2 * k + 1, 5)] = -1.0;
        a[(2 * k + 1, 6)] = v * x;
        a[(2 * k + 1, 7)] = v * y;
        a[(2 * k + 1, 8)] = v;
    }
    let svd = a.svd(true, true);

    // A second vanishing singular value means the null space is not unique.
    let mut sv: Vec<f64> = svd.singular_values.iter().copied().collect();
    sv.sort_by(f64::total_cmp);
    let largest = sv.last().copied().unwrap_or(0.0);
    if sv.len() < 2 || sv[1] <= 1e-9 * largest {
        return None;
    }

    // Null vector: the right singular vector of the smallest singular value.
    let (idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let vt = svd.v_t?;
    let h = vt.row(idx);
    Some(Matrix3::new(
        h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8],
    ))
}

/// Holds the transform published by the latest successful calibration.
#[derive(Debug, Clone, Default)]
pub struct CoordinateMapper {
    current: Option<CoordinateTransform>,
    version: u64,
}

impl CoordinateMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current transform.
    pub fn publish(&mut self, t: CoordinateTransform) {
        self.current = Some(t);
        self.version += 1;
        tracing::info!(version = self.version, "coordinate transform published");
    }

    pub fn transform(&self) -> Option<&CoordinateTransform> {
        self.current.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.current.is_some()
    }

    /// How many transforms have been published so far.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn map(&self, p: Point2<f64>) -> Result<Point2<f64>, ScoringError> {
        let t = self.current.as_ref().ok_or(ScoringError::TransformUnset)?;
        t.apply(p).ok_or(ScoringError::Unmappable)
    }
}
