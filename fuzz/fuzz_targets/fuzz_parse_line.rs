#![no_main]
use libfuzzer_sys::fuzz_target;
use laser_core::{Command, DeviceMessage, parse_line};

fuzz_target!(|data: &str| {
    // Whatever the wire carries, the parser must not panic, and anything it
    // accepts must render back to a line it accepts again.
    if let Ok(msg) = parse_line(data) {
        let rendered = msg.to_string();
        if matches!(
            msg,
            DeviceMessage::Blob { .. } | DeviceMessage::Roi(_) | DeviceMessage::Hit { .. }
        ) {
            assert!(parse_line(&rendered).is_ok(), "{rendered:?} no longer parses");
        }
    }
    let _ = Command::parse(data).as_token().len();
});
