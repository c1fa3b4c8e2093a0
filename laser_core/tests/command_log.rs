use laser_core::{Command, CommandCursor, CommandLog};
use rstest::rstest;
use tempfile::tempdir;

#[test]
fn each_appended_command_is_seen_once() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    let log = CommandLog::new(&path);
    let mut cursor = CommandCursor::at_end(&path).unwrap();
    assert_eq!(cursor.seen(), 0);
    assert_eq!(cursor.poll(&path).unwrap(), None);

    log.append(&Command::Start).unwrap();
    assert_eq!(cursor.poll(&path).unwrap(), Some(Command::Start));
    assert_eq!(cursor.poll(&path).unwrap(), None);

    log.append(&Command::Calib).unwrap();
    assert_eq!(cursor.poll(&path).unwrap(), Some(Command::Calib));
    assert_eq!(cursor.poll(&path).unwrap(), None);
    assert_eq!(cursor.seen(), 2);
}

#[test]
fn only_the_newest_of_several_commands_is_delivered() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    let log = CommandLog::new(&path);
    let mut cursor = CommandCursor::default();

    log.append(&Command::End).unwrap();
    log.append(&Command::Calib).unwrap();
    assert_eq!(cursor.poll(&path).unwrap(), Some(Command::Calib));
    assert_eq!(cursor.seen(), 2);
}

#[test]
fn cursor_created_at_end_skips_history() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    std::fs::write(&path, "start\nend\n").unwrap();
    let mut cursor = CommandCursor::at_end(&path).unwrap();
    assert_eq!(cursor.poll(&path).unwrap(), None);
}

#[test]
fn truncated_log_resets_the_cursor_without_dispatching() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    std::fs::write(&path, "start\nend\ncalib\n").unwrap();
    let mut cursor = CommandCursor::at_end(&path).unwrap();

    std::fs::write(&path, "").unwrap();
    assert_eq!(cursor.poll(&path).unwrap(), None);
    assert_eq!(cursor.seen(), 0);

    CommandLog::new(&path).append(&Command::Exit).unwrap();
    assert_eq!(cursor.poll(&path).unwrap(), Some(Command::Exit));
}

#[test]
fn legacy_log_without_trailing_newline_gets_a_separator() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    std::fs::write(&path, "\nstart\nend").unwrap();
    let log = CommandLog::new(&path);
    log.append(&Command::Coords).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert_eq!(text, "\nstart\nend\ncoords\n");
    assert_eq!(log.last_command().unwrap(), Some(Command::Coords));
}

#[test]
fn blank_newest_line_is_not_a_command() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("commands.txt");
    let mut cursor = CommandCursor::default();
    std::fs::write(&path, "start\n   \n").unwrap();
    assert_eq!(cursor.poll(&path).unwrap(), None);
    assert_eq!(cursor.seen(), 2);
}

#[test]
fn missing_log_reads_as_empty() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nope.txt");
    assert_eq!(CommandLog::new(&path).last_command().unwrap(), None);
    assert_eq!(CommandCursor::default().poll(&path).unwrap(), None);
}

#[rstest]
#[case("start", Command::Start)]
#[case("  CALIB \r", Command::Calib)]
#[case("End", Command::End)]
#[case("exit", Command::Exit)]
#[case("coords", Command::Coords)]
#[case("test", Command::Test)]
#[case("led_off", Command::LedOff)]
#[case("reboot", Command::Unknown("reboot".into()))]
fn tokens_parse_case_insensitively(#[case] raw: &str, #[case] want: Command) {
    assert_eq!(Command::parse(raw), want);
}
