use laser_core::error::CalibrationError;
use laser_core::{AnchorRole, BlobClusterer, ClusterCfg, sort_anchors};
use nalgebra::Point2;
use proptest::prelude::*;

fn unscaled() -> ClusterCfg {
    ClusterCfg {
        scale: 1.0,
        ..ClusterCfg::default()
    }
}

#[test]
fn empty_window_has_no_blobs() {
    let mut c = BlobClusterer::new(ClusterCfg::default());
    c.add_frame(&[]);
    c.add_frame(&[]);
    assert_eq!(c.finish(), Err(CalibrationError::NoBlobs));
}

#[test]
fn output_is_rounded_then_scaled() {
    let mut c = BlobClusterer::new(ClusterCfg::default());
    c.add_frame(&[(100.0, 50.0)]);
    c.add_frame(&[(101.0, 51.0)]);
    // mean (100.5, 50.5) rounds away from zero, then halves
    assert_eq!(c.finish().unwrap(), vec![Point2::new(50.5, 25.5)]);
}

#[test]
fn surplus_clusters_are_cut_after_sorting() {
    let mut c = BlobClusterer::new(unscaled());
    let frame: Vec<(f64, f64)> = vec![
        (500.0, 400.0),
        (10.0, 10.0),
        (300.0, 10.0),
        (150.0, 10.0),
        (10.0, 200.0),
        (150.0, 200.0),
    ];
    c.add_frame(&frame);
    c.add_frame(&[(300.0, 200.0)]);
    let out = c.finish().unwrap();
    assert_eq!(out.len(), 6);
    assert_eq!(out[0], Point2::new(10.0, 10.0));
    assert_eq!(out[2], Point2::new(300.0, 10.0));
    assert_eq!(out[5], Point2::new(300.0, 200.0));
    assert!(!out.contains(&Point2::new(500.0, 400.0)));
}

#[test]
fn six_blobs_fill_every_role() {
    let pts = [
        Point2::new(301.0, 21.0),
        Point2::new(19.0, 205.0),
        Point2::new(160.0, 19.0),
        Point2::new(19.0, 19.0),
        Point2::new(301.0, 205.0),
        Point2::new(160.0, 203.0),
    ];
    let set = sort_anchors(&pts);
    assert_eq!(set.get(AnchorRole::TopLeft), Some(Point2::new(19.0, 19.0)));
    assert_eq!(set.get(AnchorRole::TopMiddle), Some(Point2::new(160.0, 19.0)));
    assert_eq!(set.get(AnchorRole::TopRight), Some(Point2::new(301.0, 21.0)));
    assert_eq!(set.get(AnchorRole::BottomLeft), Some(Point2::new(19.0, 205.0)));
    assert_eq!(
        set.get(AnchorRole::BottomMiddle),
        Some(Point2::new(160.0, 203.0))
    );
    assert_eq!(
        set.get(AnchorRole::BottomRight),
        Some(Point2::new(301.0, 205.0))
    );
}

fn distinct_ys(pts: &[Point2<f64>]) -> bool {
    let mut ys: Vec<i64> = pts.iter().map(|p| p.y as i64).collect();
    ys.sort_unstable();
    ys.windows(2).all(|w| w[0] != w[1])
}

proptest! {
    #[test]
    fn stable_point_clusters_to_itself(
        x in 0i32..320,
        y in 0i32..240,
        frames in 1usize..60,
    ) {
        let mut c = BlobClusterer::new(unscaled());
        for _ in 0..frames {
            c.add_frame(&[(f64::from(x), f64::from(y))]);
        }
        prop_assert_eq!(c.clusters().len(), 1);
        prop_assert_eq!(c.finish().unwrap(), vec![Point2::new(f64::from(x), f64::from(y))]);
    }

    #[test]
    fn finished_output_is_sorted_and_bounded(
        frames in prop::collection::vec(
            prop::collection::vec((0.0f64..320.0, 0.0f64..240.0), 0..8),
            1..20,
        ),
    ) {
        let mut c = BlobClusterer::new(ClusterCfg::default());
        for f in &frames {
            c.add_frame(f);
        }
        match c.finish() {
            Ok(out) => {
                prop_assert!(!out.is_empty() && out.len() <= 6);
                for w in out.windows(2) {
                    prop_assert!((w[0].y, w[0].x) <= (w[1].y, w[1].x));
                }
            }
            Err(e) => {
                prop_assert_eq!(e, CalibrationError::NoBlobs);
                prop_assert!(frames.iter().all(Vec::is_empty));
            }
        }
    }

    #[test]
    fn anchor_roles_ignore_input_order(
        (orig, shuffled) in prop::collection::vec((0i32..320, 0i32..240), 4..=6)
            .prop_map(|v| {
                v.into_iter()
                    .map(|(x, y)| Point2::new(f64::from(x), f64::from(y)))
                    .collect::<Vec<_>>()
            })
            .prop_flat_map(|v| (Just(v.clone()), Just(v).prop_shuffle())),
    ) {
        prop_assume!(distinct_ys(&orig));
        prop_assert_eq!(sort_anchors(&orig), sort_anchors(&shuffled));
    }
}
