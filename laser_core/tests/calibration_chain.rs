//! Camera frames through the board's calibration routine, across the link to
//! the host, and on to a scored hit.

use std::sync::Arc;

use approx::assert_relative_eq;
use laser_core::conversions::host_cluster_cfg;
use laser_core::firmware::run_calibration;
use laser_core::transform::screen_target;
use laser_core::{
    AnchorRole, CoordinateMapper, Detection, FirmwareCfg, GameMode, HitOutcome, HostBridge,
    LinkTimeouts, Phase, RoundMachine, ScreenGeometry,
};
use laser_hardware::{ScriptStep, SimulatedCamera, SimulatedLink};
use laser_traits::ManualClock;
use nalgebra::Point2;
use rstest::rstest;
use tempfile::tempdir;

/// Six anchors at full resolution, top row first, each row left to right.
fn grid(x0: f64, y0: f64, dx: f64, dy: f64) -> Vec<(f64, f64)> {
    vec![
        (x0, y0),
        (x0 + dx, y0),
        (x0 + 2.0 * dx, y0),
        (x0, y0 + dy),
        (x0 + dx, y0 + dy),
        (x0 + 2.0 * dx, y0 + dy),
    ]
}

#[rstest]
#[case::wide(grid(38.0, 38.0, 282.0, 372.0))]
#[case::sixty_px(grid(200.0, 200.0, 60.0, 60.0))]
#[case::forty_px(grid(100.0, 100.0, 40.0, 60.0))]
#[case::thirty_px(grid(100.0, 100.0, 30.0, 40.0))]
fn calibrated_center_hit_scores_the_inner_ring(#[case] anchors: Vec<(f64, f64)>) {
    let dir = tempdir().unwrap();
    let clock = ManualClock::new();
    let cfg = laser_config::Config::default();
    let screen = ScreenGeometry::default();

    // Board side
    let mut camera = SimulatedCamera::steady(anchors.clone(), 80);
    let mut lines: Vec<String> = Vec::new();
    let coords = run_calibration(
        &mut camera,
        &mut lines,
        &clock,
        &FirmwareCfg::from(&cfg.calibration),
        &dir.path().join("coords.txt"),
    )
    .unwrap();
    assert_eq!(coords.blobs.len(), 6);
    let halved: Vec<(i64, i64)> = anchors
        .iter()
        .map(|&(x, y)| ((x * 0.5) as i64, (y * 0.5) as i64))
        .collect();
    assert_eq!(coords.blobs, halved);

    // Host side, reading what the board printed
    let steps = lines.into_iter().map(ScriptStep::Line).collect();
    let link = SimulatedLink::from_script(steps, Arc::new(clock.clone()));
    let mut bridge = HostBridge::new(
        link,
        dir.path().join("commands.txt"),
        LinkTimeouts::default(),
        Arc::new(clock.clone()),
    )
    .with_cluster(host_cluster_cfg(&cfg.calibration));
    let mut mapper = CoordinateMapper::new();
    let out = bridge.calibrate(&screen, &mut mapper).unwrap();
    assert_eq!(out.blobs.len(), 6);
    assert_eq!(out.anchors.resolved_count(), 6);
    for (role, &(x, y)) in AnchorRole::ALL.iter().zip(&halved) {
        assert_eq!(out.anchors.get(*role), Some(Point2::new(x as f64, y as f64)));
    }

    // A camera point the same fraction down the middle column as the rest
    // center is down the screen's middle column.
    let tm = out.anchors.get(AnchorRole::TopMiddle).unwrap();
    let bm = out.anchors.get(AnchorRole::BottomMiddle).unwrap();
    let rest = screen.rest_center();
    let top = screen_target(&screen, AnchorRole::TopMiddle);
    let bottom = screen_target(&screen, AnchorRole::BottomMiddle);
    let t = (rest.y - top.y) / (bottom.y - top.y);
    let seen = tm + (bm - tm) * t;
    let hit = mapper.map(seen).unwrap();
    assert_relative_eq!(hit.x, rest.x, epsilon = 1e-3);
    assert_relative_eq!(hit.y, rest.y, epsilon = 1e-3);

    // Static round, target shown at rest center
    let mut machine = RoundMachine::builder()
        .with_screen(screen)
        .with_session(GameMode::Static, 3)
        .with_clock(Arc::new(clock.clone()))
        .with_seed(3)
        .build()
        .unwrap();
    machine.start("ana");
    assert!(machine.device_ready());
    clock.advance_ms(3000);
    machine.tick();
    clock.advance_ms(1000);
    machine.tick();
    assert_eq!(machine.phase(), Phase::Running);

    assert!(matches!(
        machine.on_detection(hit),
        Detection::Resolved(HitOutcome::Scored {
            band: 1,
            points: 100,
            ..
        })
    ));
}
