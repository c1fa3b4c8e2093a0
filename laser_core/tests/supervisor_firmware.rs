use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use laser_config::Roi;
use laser_config::coords::{self, CoordsFile};
use laser_core::firmware::{Board, LinkSink, LineSink, run_calibration, run_detection};
use laser_core::{Command, CommandLog, Dispatch, FirmwareActions, FirmwareCfg, Result, Supervisor};
use laser_hardware::{SimulatedCamera, SimulatedLink};
use laser_traits::{BoxError, DeviceLink, FrameSource, ManualClock};
use tempfile::tempdir;

/// Six projected anchors seen at twice the board's output scale.
fn anchor_frame() -> Vec<(f64, f64)> {
    vec![
        (38.0, 38.0),
        (320.0, 38.0),
        (602.0, 38.0),
        (38.0, 410.0),
        (320.0, 410.0),
        (602.0, 410.0),
    ]
}

fn roi() -> Roi {
    Roi {
        x1: 19,
        y1: 19,
        x2: 301,
        y2: 205,
    }
}

#[derive(Default)]
struct Recorder {
    calls: Vec<&'static str>,
    fail_calibration: bool,
    exit_after_test: Option<CommandLog>,
}

impl FirmwareActions for Recorder {
    fn start_detection(&mut self) -> Result<()> {
        self.calls.push("detect");
        Ok(())
    }

    fn start_calibration(&mut self) -> Result<()> {
        self.calls.push("calib");
        if self.fail_calibration {
            eyre::bail!("camera busy");
        }
        Ok(())
    }

    fn print_coords(&mut self) -> Result<()> {
        self.calls.push("coords");
        Ok(())
    }

    fn test(&mut self) -> Result<()> {
        self.calls.push("test");
        if let Some(log) = &self.exit_after_test {
            log.append(&Command::Exit)?;
        }
        Ok(())
    }

    fn led_off(&mut self) -> Result<()> {
        self.calls.push("led_off");
        Ok(())
    }
}

fn supervisor<A: FirmwareActions>(path: &Path, actions: A) -> (Supervisor<A>, ManualClock) {
    let clock = ManualClock::new();
    let sup = Supervisor::new(
        path,
        actions,
        Arc::new(clock.clone()),
        Duration::from_millis(10),
    );
    (sup, clock)
}

#[test]
fn supervisor_dispatches_each_new_command() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    let log = CommandLog::new(&path);
    let (mut sup, _clock) = supervisor(&path, Recorder::default());

    assert_eq!(sup.poll_once().unwrap(), Dispatch::Idle);
    log.append(&Command::Start).unwrap();
    assert_eq!(sup.poll_once().unwrap(), Dispatch::Ran(Command::Start));
    assert_eq!(sup.poll_once().unwrap(), Dispatch::Idle);
    log.append(&Command::Coords).unwrap();
    log.append(&Command::LedOff).unwrap();
    assert_eq!(sup.poll_once().unwrap(), Dispatch::Ran(Command::LedOff));
    log.append(&Command::Exit).unwrap();
    assert_eq!(sup.poll_once().unwrap(), Dispatch::Exit);

    assert_eq!(sup.actions().calls, vec!["detect", "led_off"]);
}

#[test]
fn failing_action_does_not_stop_polling() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    let log = CommandLog::new(&path);
    let actions = Recorder {
        fail_calibration: true,
        ..Recorder::default()
    };
    let (mut sup, _clock) = supervisor(&path, actions);

    log.append(&Command::Calib).unwrap();
    assert_eq!(sup.poll_once().unwrap(), Dispatch::Failed(Command::Calib));
    log.append(&Command::parse("reboot")).unwrap();
    assert_eq!(
        sup.poll_once().unwrap(),
        Dispatch::Ran(Command::Unknown("reboot".into()))
    );
    assert_eq!(sup.into_actions().calls, vec!["calib"]);
}

#[test]
fn run_announces_itself_and_stops_on_exit() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    let actions = Recorder {
        exit_after_test: Some(CommandLog::new(&path)),
        ..Recorder::default()
    };
    let (mut sup, clock) = supervisor(&path, actions);

    let polls = sup.run_until_exit().unwrap();
    assert_eq!(polls, 2);
    assert_eq!(sup.actions().calls, vec!["test"]);
    assert_eq!(clock.elapsed(), Duration::from_millis(10));
    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "test\nexit\n");
}

#[test]
fn shutdown_flag_stops_the_loop() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    let flag = Arc::new(AtomicBool::new(true));
    let (sup, _clock) = supervisor(&path, Recorder::default());
    let mut sup = sup.with_shutdown(Arc::clone(&flag));
    assert_eq!(sup.run_until_exit().unwrap(), 0);
    assert!(flag.load(Ordering::Relaxed));
}

#[test]
fn calibration_window_writes_the_coordinates_file() {
    let dir = tempdir().unwrap();
    let coords_path = dir.path().join("coordinates.txt");
    let clock = ManualClock::new();
    let mut camera = SimulatedCamera::steady(anchor_frame(), 80);
    let mut sink: Vec<String> = Vec::new();

    let file = run_calibration(
        &mut camera,
        &mut sink,
        &clock,
        &FirmwareCfg::default(),
        &coords_path,
    )
    .unwrap();

    assert_eq!(camera.served(), 50);
    assert_eq!(clock.elapsed(), Duration::from_millis(5000));
    assert_eq!(file.roi, roi());
    assert_eq!(
        file.blobs,
        vec![(19, 19), (160, 19), (301, 19), (19, 205), (160, 205), (301, 205)]
    );
    assert_eq!(coords::load(&coords_path).unwrap(), file);

    assert_eq!(sink[0], "Starting calibration phase for 5 seconds...");
    assert_eq!(sink[1], "Averaged Blob Coordinates:");
    assert_eq!(sink[2], "Blob 1: X=19, Y=19");
    assert_eq!(sink[7], "Blob 6: X=301, Y=205");
    assert_eq!(sink[8], "ROI: (19, 19, 301, 205)");
    assert_eq!(sink.last().map(String::as_str), Some("File written."));
}

#[test]
fn calibration_truncates_half_pixels_for_the_file() {
    let dir = tempdir().unwrap();
    let coords_path = dir.path().join("coordinates.txt");
    let mut camera = SimulatedCamera::steady(vec![(101.0, 51.0)], 50);
    let mut sink: Vec<String> = Vec::new();
    let file = run_calibration(
        &mut camera,
        &mut sink,
        &ManualClock::new(),
        &FirmwareCfg::default(),
        &coords_path,
    )
    .unwrap();
    assert_eq!(file.blobs, vec![(50, 25)]);
}

#[test]
fn calibration_survives_snapshot_failures_but_needs_blobs() {
    let dir = tempdir().unwrap();
    let coords_path = dir.path().join("coordinates.txt");
    let mut camera = SimulatedCamera::steady(Vec::new(), 3);
    let mut sink: Vec<String> = Vec::new();
    let err = run_calibration(
        &mut camera,
        &mut sink,
        &ManualClock::new(),
        &FirmwareCfg::default(),
        &coords_path,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<laser_core::CalibrationError>(),
        Some(laser_core::CalibrationError::NoBlobs)
    ));
    assert_eq!(
        sink.iter().filter(|l| l.starts_with("Snapshot failed")).count(),
        47
    );
    assert!(!coords_path.exists());
}

/// Replays frames, then writes `end` to the command log and keeps
/// returning empty frames.
struct UntilEnd {
    frames: VecDeque<Vec<(f64, f64)>>,
    log: CommandLog,
}

impl FrameSource for UntilEnd {
    fn next_frame(&mut self) -> std::result::Result<Vec<(f64, f64)>, BoxError> {
        if let Some(f) = self.frames.pop_front() {
            return Ok(f);
        }
        self.log.append(&Command::End).map_err(|e| e.to_string())?;
        Ok(Vec::new())
    }
}

#[test]
fn detection_reports_the_first_frame_of_each_burst() {
    let dir = tempdir().unwrap();
    let coords_path = dir.path().join("coordinates.txt");
    let log = CommandLog::new(dir.path().join("commands.txt"));
    log.append(&Command::Start).unwrap();
    coords::write(
        &coords_path,
        &CoordsFile {
            roi: roi(),
            blobs: vec![(19, 19), (301, 205)],
        },
    )
    .unwrap();

    let mut camera = UntilEnd {
        frames: VecDeque::from(vec![
            vec![],
            vec![(50.2, 49.6)],
            vec![(51.0, 50.0)],
            vec![],
            vec![(500.0, 500.0), (60.0, 60.0)],
            vec![(5.0, 5.0)],
        ]),
        log: log.clone(),
    };
    let mut sink: Vec<String> = Vec::new();
    let sent = run_detection(&mut camera, &mut sink, &log, &coords_path).unwrap();

    assert_eq!(sent, 2);
    assert_eq!(
        sink,
        vec![
            "Saved background image - Now starting frame differencing!",
            "X: 50 # Y: 50",
            "X: 60 # Y: 60",
            "End command detected. Exiting loop.",
        ]
    );
    let text = std::fs::read_to_string(&coords_path).unwrap();
    assert!(text.ends_with("X: 50 # Y: 50\nX: 60 # Y: 60\n"));
    assert_eq!(coords::load(&coords_path).unwrap().roi, roi());
}

#[test]
fn board_reports_routine_failures_on_the_line() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("commands.txt");
    let coords_path = dir.path().join("coordinates.txt");
    let board = Board::new(
        SimulatedCamera::default(),
        Vec::<String>::new(),
        Arc::new(ManualClock::new()),
        FirmwareCfg::default(),
        &log_path,
        &coords_path,
    );
    let (mut sup, _clock) = supervisor(&log_path, board);
    let log = CommandLog::new(&log_path);

    log.append(&Command::Start).unwrap();
    assert_eq!(sup.poll_once().unwrap(), Dispatch::Failed(Command::Start));
    assert_eq!(
        sup.actions().sink().last().map(String::as_str),
        Some("Error running detection : ROI not loaded correctly")
    );

    log.append(&Command::Coords).unwrap();
    sup.poll_once().unwrap();
    assert!(
        sup.actions()
            .sink()
            .last()
            .is_some_and(|l| l.starts_with("coords file not found"))
    );
}

#[test]
fn board_calibrates_then_echoes_coordinates() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("commands.txt");
    let coords_path = dir.path().join("coordinates.txt");
    let board = Board::new(
        SimulatedCamera::steady(anchor_frame(), 50),
        Vec::<String>::new(),
        Arc::new(ManualClock::new()),
        FirmwareCfg::default(),
        &log_path,
        &coords_path,
    );
    let (mut sup, _clock) = supervisor(&log_path, board);
    let log = CommandLog::new(&log_path);

    log.append(&Command::Calib).unwrap();
    assert_eq!(sup.poll_once().unwrap(), Dispatch::Ran(Command::Calib));
    assert!(sup.actions().sink().iter().any(|l| l == "File written."));

    let before = sup.actions().sink().len();
    log.append(&Command::Coords).unwrap();
    sup.poll_once().unwrap();
    let echoed = &sup.actions().sink()[before..];
    assert_eq!(echoed[0], "ROI: (19, 19, 301, 205)");
    assert_eq!(echoed[1], "Averaged Points:");
    assert_eq!(echoed.len(), 8);

    log.append(&Command::LedOff).unwrap();
    sup.poll_once().unwrap();
    assert!(!sup.actions().led_on());

    log.append(&Command::parse("reboot")).unwrap();
    sup.poll_once().unwrap();
    assert_eq!(
        sup.actions().sink().last().map(String::as_str),
        Some("Unknown command: reboot")
    );
}

#[test]
fn link_sink_writes_to_the_device() {
    let mut link = SimulatedLink::new();
    let handle = link.handle();
    link.open(Duration::from_millis(10)).unwrap();
    let mut sink = LinkSink(link);
    sink.send("Now active.").unwrap();
    assert_eq!(handle.written(), vec!["Now active."]);

    sink.0.close().unwrap();
    let err = sink.send("late").unwrap_err();
    assert_eq!(
        err.downcast_ref::<laser_core::LinkError>(),
        Some(&laser_core::LinkError::Closed)
    );
}
