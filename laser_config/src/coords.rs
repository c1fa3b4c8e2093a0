//! Calibration coordinates file.
//!
//! ```text
//! ROI: (412, 220, 980, 760)
//! Averaged Points:
//! Blob 1: X=412, Y=220
//! Blob 2: X=696, Y=224
//! ```
//!
//! The detection routine later appends `X: <x> # Y: <y>` hit lines to the
//! same file; the loader skips them.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use eyre::WrapErr;

/// Bounding box of the calibration anchors in camera pixels (corner form).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
}

impl Roi {
    /// Smallest box containing every point; `None` for an empty slice.
    pub fn bounding(points: &[(i64, i64)]) -> Option<Self> {
        let (&(x0, y0), rest) = points.split_first()?;
        let mut roi = Self {
            x1: x0,
            y1: y0,
            x2: x0,
            y2: y0,
        };
        for &(x, y) in rest {
            roi.x1 = roi.x1.min(x);
            roi.y1 = roi.y1.min(y);
            roi.x2 = roi.x2.max(x);
            roi.y2 = roi.y2.max(y);
        }
        Some(roi)
    }

    pub fn width(&self) -> i64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i64 {
        self.y2 - self.y1
    }

    /// Inclusive on every edge.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.x1 as f64..=self.x2 as f64).contains(&x) && (self.y1 as f64..=self.y2 as f64).contains(&y)
    }
}

impl std::fmt::Display for Roi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x1, self.y1, self.x2, self.y2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordsFile {
    pub roi: Roi,
    /// Averaged anchor positions, in file order (sorted by y, then x).
    pub blobs: Vec<(i64, i64)>,
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    // The board may print rounded floats ("412.0"); accept a zero fraction.
    s.parse::<i64>()
        .ok()
        .or_else(|| s.strip_suffix(".0").and_then(|i| i.parse().ok()))
}

/// Parse `ROI: (x1, y1, x2, y2)`; whitespace inside the parentheses is optional.
pub fn parse_roi(line: &str) -> Option<Roi> {
    let body = line.trim().strip_prefix("ROI:")?.trim();
    let inner = body.strip_prefix('(')?.strip_suffix(')')?;
    let mut it = inner.split(',').map(parse_int);
    let roi = Roi {
        x1: it.next()??,
        y1: it.next()??,
        x2: it.next()??,
        y2: it.next()??,
    };
    if it.next().is_some() {
        return None;
    }
    Some(roi)
}

/// Parse `Blob <n>: X=<int>, Y=<int>` into `(n, x, y)`.
pub fn parse_blob_line(line: &str) -> Option<(u32, i64, i64)> {
    let rest = line.trim().strip_prefix("Blob")?;
    let (idx, coords) = rest.split_once(':')?;
    let idx = idx.trim().parse::<u32>().ok()?;
    let (x, y) = coords.split_once(',')?;
    let x = parse_int(x.trim().strip_prefix("X=")?)?;
    let y = parse_int(y.trim().strip_prefix("Y=")?)?;
    Some((idx, x, y))
}

pub fn render(file: &CoordsFile) -> String {
    let mut out = format!("ROI: {}\nAveraged Points:\n", file.roi);
    for (i, (x, y)) in file.blobs.iter().enumerate() {
        let _ = writeln!(out, "Blob {}: X={x}, Y={y}", i + 1);
    }
    out
}

/// Parse the coordinates file text. Lines that are neither ROI nor blob
/// lines (headers, hit lines, garbage) are skipped; a missing ROI is an error.
pub fn parse(text: &str) -> eyre::Result<CoordsFile> {
    let mut roi = None;
    let mut blobs = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line == "Averaged Points:" {
            continue;
        }
        if line.starts_with("ROI") {
            match parse_roi(line) {
                Some(r) => roi = Some(r),
                None => tracing::warn!(lineno = lineno + 1, line, "malformed ROI line skipped"),
            }
        } else if line.starts_with("Blob") {
            match parse_blob_line(line) {
                Some((_, x, y)) => blobs.push((x, y)),
                None => tracing::warn!(lineno = lineno + 1, line, "malformed blob line skipped"),
            }
        }
    }
    let roi = roi.ok_or_else(|| eyre::eyre!("coordinates file has no ROI line"))?;
    Ok(CoordsFile { roi, blobs })
}

pub fn load(path: &Path) -> eyre::Result<CoordsFile> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read coordinates file {}", path.display()))?;
    parse(&text).wrap_err_with(|| format!("parse coordinates file {}", path.display()))
}

/// Replace the coordinates file with a fresh calibration result.
pub fn write(path: &Path, file: &CoordsFile) -> eyre::Result<()> {
    std::fs::write(path, render(file))
        .wrap_err_with(|| format!("write coordinates file {}", path.display()))
}

/// Append a detection line (`X: <x> # Y: <y>`).
pub fn append_hit(path: &Path, x: i64, y: i64) -> eyre::Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .wrap_err_with(|| format!("open coordinates file {}", path.display()))?;
    writeln!(f, "X: {x} # Y: {y}")
        .wrap_err_with(|| format!("append hit to {}", path.display()))
}
