//! Assignment of averaged calibration blobs to the six anchor roles.

use nalgebra::Point2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorRole {
    TopLeft,
    TopMiddle,
    TopRight,
    BottomLeft,
    BottomMiddle,
    BottomRight,
}

impl AnchorRole {
    pub const ALL: [AnchorRole; 6] = [
        AnchorRole::TopLeft,
        AnchorRole::TopMiddle,
        AnchorRole::TopRight,
        AnchorRole::BottomLeft,
        AnchorRole::BottomMiddle,
        AnchorRole::BottomRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn label(self) -> &'static str {
        match self {
            AnchorRole::TopLeft => "TL",
            AnchorRole::TopMiddle => "TM",
            AnchorRole::TopRight => "TR",
            AnchorRole::BottomLeft => "BL",
            AnchorRole::BottomMiddle => "BM",
            AnchorRole::BottomRight => "BR",
        }
    }
}

/// Six role slots; a slot is `None` when no blob was assigned to it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AnchorSet {
    slots: [Option<Point2<f64>>; 6],
}

impl AnchorSet {
    pub fn get(&self, role: AnchorRole) -> Option<Point2<f64>> {
        self.slots[role.index()]
    }

    pub fn set(&mut self, role: AnchorRole, p: Point2<f64>) {
        self.slots[role.index()] = Some(p);
    }

    pub fn resolved(&self) -> impl Iterator<Item = (AnchorRole, Point2<f64>)> + '_ {
        AnchorRole::ALL
            .iter()
            .filter_map(|r| self.get(*r).map(|p| (*r, p)))
    }

    pub fn resolved_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }
}

/// Split points into a top and a bottom row by y, then order each row by x.
///
/// The split index is `len / 2`, so an odd count puts the extra point in the
/// bottom row. Both sorts are stable: points with equal y keep their input
/// order when deciding which row they land in. Surplus points beyond three
/// per row are dropped; missing ones leave their roles unresolved.
pub fn sort_anchors(points: &[Point2<f64>]) -> AnchorSet {
    let mut by_y: Vec<Point2<f64>> = points.to_vec();
    by_y.sort_by(|a, b| a.y.total_cmp(&b.y));
    let half = by_y.len() / 2;
    let (top, bottom) = by_y.split_at_mut(half);
    top.sort_by(|a, b| a.x.total_cmp(&b.x));
    bottom.sort_by(|a, b| a.x.total_cmp(&b.x));

    let mut set = AnchorSet::default();
    for (role, p) in AnchorRole::ALL[..3].iter().zip(top.iter()) {
        set.set(*role, *p);
    }
    for (role, p) in AnchorRole::ALL[3..].iter().zip(bottom.iter()) {
        set.set(*role, *p);
    }
    set
}
