#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are both fine; panics are not.
    if let Ok(cfg) = toml::from_str::<laser_config::Config>(data) {
        let _ = cfg.validate();
    }
    // Same for the two line-oriented files the board and host share.
    let _ = laser_config::coords::parse(data);
});
