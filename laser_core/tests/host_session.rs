use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use laser_config::{Leaderboard, LeaderboardCfg, ScoreEntry};
use laser_core::conversions::host_cluster_cfg;
use laser_core::transform::fit_from_blobs;
use laser_core::{
    AbortCause, AnchorRole, CalibrationError, CoordinateMapper, GameEvent, GameMode, HostBridge, LinkError,
    LinkTimeouts, Phase, RecordingRenderer, RoundMachine, ScoringError, ScreenGeometry,
    SessionOptions, run_session,
};
use laser_hardware::{ScriptStep, SimulatedLink};
use laser_traits::{BoxError, DeviceLink, ManualClock};
use nalgebra::Point2;
use tempfile::{TempDir, tempdir};

/// What the board prints for a projector seen at one fifth scale.
const CALIBRATION_TRANSCRIPT: &[&str] = &[
    "Starting calibration phase for 5 seconds...",
    "Averaged Blob Coordinates:",
    "Blob 1: X=19, Y=19",
    "Blob 2: X=160, Y=19",
    "Blob 3: X=301, Y=19",
    "Blob 4: X=19, Y=205",
    "Blob 5: X=160, Y=205",
    "Blob 6: X=301, Y=205",
    "ROI: (19, 19, 301, 205)",
    "File written.",
];

const READY: &str = "Saved background image - Now starting frame differencing!";

struct Rig {
    dir: TempDir,
    clock: ManualClock,
}

impl Rig {
    fn new() -> Self {
        Self {
            dir: tempdir().unwrap(),
            clock: ManualClock::new(),
        }
    }

    fn link(&self, script: &[&str]) -> SimulatedLink {
        let steps = script
            .iter()
            .map(|l| ScriptStep::Line((*l).to_owned()))
            .collect();
        SimulatedLink::from_script(steps, Arc::new(self.clock.clone()))
    }

    fn bridge<L: DeviceLink>(&self, link: L, timeouts: LinkTimeouts) -> HostBridge<L> {
        HostBridge::new(
            link,
            self.dir.path().join("commands.txt"),
            timeouts,
            Arc::new(self.clock.clone()),
        )
    }

    fn machine(&self, mode: GameMode, rounds: u32) -> RoundMachine {
        RoundMachine::builder()
            .with_screen(ScreenGeometry::default())
            .with_session(mode, rounds)
            .with_clock(Arc::new(self.clock.clone()))
            .with_seed(11)
            .build()
            .unwrap()
    }

    fn commands(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("commands.txt")).unwrap_or_default()
    }

    fn leaderboard(&self) -> Leaderboard {
        Leaderboard::new(
            self.dir.path().join("leaderboard.txt"),
            &LeaderboardCfg::default(),
        )
    }
}

fn calibrated_mapper() -> CoordinateMapper {
    let blobs = [
        Point2::new(19.0, 19.0),
        Point2::new(160.0, 19.0),
        Point2::new(301.0, 19.0),
        Point2::new(19.0, 205.0),
        Point2::new(160.0, 205.0),
        Point2::new(301.0, 205.0),
    ];
    let (_, t) = fit_from_blobs(&blobs, &ScreenGeometry::default()).unwrap();
    let mut mapper = CoordinateMapper::new();
    mapper.publish(t);
    mapper
}

fn player(name: &str) -> SessionOptions {
    SessionOptions {
        player: name.into(),
        ..SessionOptions::default()
    }
}

#[test]
fn calibration_publishes_a_transform_from_blob_lines() {
    let rig = Rig::new();
    let mut bridge = rig.bridge(rig.link(CALIBRATION_TRANSCRIPT), LinkTimeouts::default());
    let mut mapper = CoordinateMapper::new();

    let out = bridge
        .calibrate(&ScreenGeometry::default(), &mut mapper)
        .unwrap();
    assert_eq!(out.reports, 6);
    assert_eq!(out.blobs.len(), 6);
    assert_eq!(out.anchors.resolved_count(), 6);
    assert_eq!(out.roi.map(|roi| roi.x2), Some(301));
    assert_eq!(mapper.version(), 1);
    assert!(!bridge.link().is_open());
    assert_eq!(bridge.link().open_count(), 1);
    assert_eq!(rig.commands(), "end\ncalib\n");
}

#[test]
fn averaged_blobs_closer_than_the_threshold_keep_their_roles() {
    // 40 px apart at full resolution, 20 px once the board has halved them
    let rig = Rig::new();
    let link = rig.link(&[
        "Averaged Blob Coordinates:",
        "Blob 1: X=50, Y=50",
        "Blob 2: X=70, Y=50",
        "Blob 3: X=90, Y=50",
        "Blob 4: X=50, Y=80",
        "Blob 5: X=70, Y=80",
        "Blob 6: X=90, Y=80",
        "ROI: (50, 50, 90, 80)",
        "File written.",
    ]);
    let mut bridge = rig
        .bridge(link, LinkTimeouts::default())
        .with_cluster(host_cluster_cfg(&laser_config::Config::default().calibration));
    let mut mapper = CoordinateMapper::new();

    let out = bridge
        .calibrate(&ScreenGeometry::default(), &mut mapper)
        .unwrap();
    assert_eq!(out.reports, 6);
    assert_eq!(out.blobs.len(), 6);
    assert_eq!(out.anchors.resolved_count(), 6);
    assert_eq!(out.anchors.get(AnchorRole::TopLeft), Some(Point2::new(50.0, 50.0)));
    assert_eq!(out.anchors.get(AnchorRole::TopMiddle), Some(Point2::new(70.0, 50.0)));
    assert_eq!(out.anchors.get(AnchorRole::TopRight), Some(Point2::new(90.0, 50.0)));
    assert_eq!(out.anchors.get(AnchorRole::BottomRight), Some(Point2::new(90.0, 80.0)));
}

#[test]
fn raw_blob_reports_merge_within_the_scaled_threshold() {
    let rig = Rig::new();
    let link = rig.link(&[
        "Blob: x=50, y=50",
        "Blob: x=64, y=50",
        "Blob: x=66, y=50",
        "Blob: x=52, y=51",
        "File written.",
    ]);
    let cluster = host_cluster_cfg(&laser_config::Config::default().calibration);
    assert_eq!(cluster.proximity_px, 15.0);
    let mut bridge = rig.bridge(link, LinkTimeouts::default()).with_cluster(cluster);
    let mut mapper = CoordinateMapper::new();

    // Four reports, two clusters: too few anchors to fit
    let err = bridge
        .calibrate(&ScreenGeometry::default(), &mut mapper)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CalibrationError>(),
        Some(CalibrationError::InsufficientPoints { found: 2 })
    ));
    assert!(!mapper.is_ready());
}

#[test]
fn device_script_error_fails_calibration() {
    let rig = Rig::new();
    let link = rig.link(&[
        "Starting calibration phase for 5 seconds...",
        "Error running calibration : camera busy",
    ]);
    let mut bridge = rig.bridge(link, LinkTimeouts::default());
    let mut mapper = CoordinateMapper::new();

    let err = bridge
        .calibrate(&ScreenGeometry::default(), &mut mapper)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CalibrationError>(),
        Some(CalibrationError::ScriptFailed(line)) if line.contains("camera busy")
    ));
    assert!(!mapper.is_ready());
    assert!(!bridge.link().is_open());
}

#[test]
fn silent_device_hits_the_calibration_deadline() {
    let rig = Rig::new();
    let timeouts = LinkTimeouts {
        calib_deadline_ms: 5000,
        ..LinkTimeouts::default()
    };
    let mut bridge = rig.bridge(rig.link(&[]), timeouts);
    let mut mapper = calibrated_mapper();

    let err = bridge
        .calibrate(&ScreenGeometry::default(), &mut mapper)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CalibrationError>(),
        Some(CalibrationError::Incomplete(5000))
    ));
    assert_eq!(rig.clock.elapsed(), Duration::from_millis(5000));
    // The earlier transform survives the failed pass.
    assert_eq!(mapper.version(), 1);
}

#[test]
fn static_session_plays_to_the_reveal_and_records_the_score() {
    let rig = Rig::new();
    let link = rig.link(CALIBRATION_TRANSCRIPT);
    let handle = link.handle();
    let mut bridge = rig.bridge(link, LinkTimeouts::default());
    let mut mapper = CoordinateMapper::new();
    bridge
        .calibrate(&ScreenGeometry::default(), &mut mapper)
        .unwrap();

    handle.push_line("X: 160 # Y: 110");
    handle.push_line(READY);
    handle.push_pause(Duration::from_millis(4000));
    handle.push_line("X: 160 # Y: 110");
    handle.push_line("X: 176 # Y: 110");
    handle.push_line("X: 160 # Y: 190");

    let mut machine = rig.machine(GameMode::Static, 3);
    let mut renderer = RecordingRenderer::default();
    let board = rig.leaderboard();
    let summary = run_session(
        &mut bridge,
        &mut machine,
        &mapper,
        &mut renderer,
        Some(&board),
        &player("ana"),
    )
    .unwrap();

    assert!(summary.completed());
    assert_eq!(summary.score, 180);
    assert_eq!(summary.round_count, 3);
    assert_eq!(summary.shots, 2);
    assert_eq!(summary.missed_rounds, 1);
    assert_eq!(machine.phase(), Phase::Idle);
    assert!(renderer.events.contains(&GameEvent::ScoreRevealed {
        player: "ana".into(),
        score: 180,
        mode: GameMode::Static,
    }));

    assert_eq!(
        board.top(1).unwrap(),
        vec![ScoreEntry {
            name: "ana".into(),
            score: 180,
            mode: 1,
        }]
    );
    assert_eq!(rig.commands(), "end\ncalib\nstart\nend\n");
    assert!(!bridge.link().is_open());
}

/// Opens fine, then fails every read.
struct Unplugged {
    open: bool,
}

impl DeviceLink for Unplugged {
    fn open(&mut self, _read_timeout: Duration) -> Result<(), BoxError> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        self.open = false;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn read_line(&mut self) -> Result<Option<String>, BoxError> {
        Err("device unplugged".into())
    }

    fn write_line(&mut self, _line: &str) -> Result<(), BoxError> {
        Ok(())
    }
}

#[test]
fn link_failure_aborts_the_session() {
    let rig = Rig::new();
    let mut bridge = rig.bridge(Unplugged { open: false }, LinkTimeouts::default());
    let mut machine = rig.machine(GameMode::HideAndTeleport, 5);
    let mut renderer = RecordingRenderer::default();

    let summary = run_session(
        &mut bridge,
        &mut machine,
        &calibrated_mapper(),
        &mut renderer,
        None,
        &player("bo"),
    )
    .unwrap();

    assert_eq!(
        summary.aborted,
        Some(AbortCause::Link(LinkError::Unavailable(
            "device unplugged".into()
        )))
    );
    assert_eq!(summary.round_count, 0);
    assert!(!machine.is_active());
    assert_eq!(renderer.events.last(), Some(&GameEvent::SessionAborted));
    assert!(!bridge.link().is_open());
    assert_eq!(rig.commands(), "start\nend\n");
}

#[test]
fn session_cap_and_shutdown_abort_cleanly() {
    let rig = Rig::new();
    let mapper = calibrated_mapper();
    let mut machine = rig.machine(GameMode::Timed, 3);

    let mut bridge = rig.bridge(rig.link(&[]), LinkTimeouts::default());
    let capped = SessionOptions {
        max_session_ms: 500,
        ..player("cy")
    };
    let summary = run_session(
        &mut bridge,
        &mut machine,
        &mapper,
        &mut RecordingRenderer::default(),
        None,
        &capped,
    )
    .unwrap();
    assert_eq!(summary.aborted, Some(AbortCause::TimeLimit));
    assert_eq!(rig.clock.elapsed(), Duration::from_millis(500));

    let stopped = SessionOptions {
        shutdown: Some(Arc::new(AtomicBool::new(true))),
        ..player("cy")
    };
    let summary = run_session(
        &mut bridge,
        &mut machine,
        &mapper,
        &mut RecordingRenderer::default(),
        None,
        &stopped,
    )
    .unwrap();
    assert_eq!(summary.aborted, Some(AbortCause::Shutdown));
    assert_eq!(machine.phase(), Phase::Idle);
}

#[test]
fn play_is_refused_before_calibration() {
    let rig = Rig::new();
    let mut bridge = rig.bridge(rig.link(&[]), LinkTimeouts::default());
    let mut machine = rig.machine(GameMode::Static, 3);

    let err = run_session(
        &mut bridge,
        &mut machine,
        &CoordinateMapper::new(),
        &mut RecordingRenderer::default(),
        None,
        &player("di"),
    )
    .unwrap_err();
    assert_eq!(
        err.downcast_ref::<ScoringError>(),
        Some(&ScoringError::TransformUnset)
    );
    assert!(!machine.is_active());
    assert_eq!(rig.commands(), "");
}
