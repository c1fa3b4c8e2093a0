//! Human-readable error descriptions and structured JSON error formatting.

use std::fmt;

/// Context attached to every config load failure; maps to exit code 5.
#[derive(Debug, Clone)]
pub struct ConfigInvalid {
    pub source: String,
}

impl fmt::Display for ConfigInvalid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid configuration ({})", self.source)
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use laser_core::error::{BuildError, CalibrationError, LinkError, ScoringError};

    // Typed matches first
    if let Some(ci) = err.downcast_ref::<ConfigInvalid>() {
        let root = err.root_cause();
        return format!(
            "What happened: Invalid configuration in {}: {root}.\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. `laser self-check` validates it without touching the device.",
            ci.source
        );
    }

    if let Some(ce) = err.downcast_ref::<CalibrationError>() {
        return match ce {
            CalibrationError::NoBlobs => {
                "What happened: The camera saw no calibration markers.\nLikely causes: Projector off, markers not drawn, or the camera pointed away from the screen.\nHow to fix: Show the calibration screen, check the camera view, then run `laser calibrate` again.".to_string()
            }
            CalibrationError::InsufficientPoints { found } => format!(
                "What happened: Only {found} calibration markers were found; at least 4 are needed.\nLikely causes: Markers cut off at the screen edge, glare, or the camera too close.\nHow to fix: Make all six markers visible to the camera and recalibrate."
            ),
            CalibrationError::Degenerate => {
                "What happened: The marker positions do not span the screen.\nLikely causes: Spurious reflections were taken as markers.\nHow to fix: Remove reflective objects from view and recalibrate.".to_string()
            }
            CalibrationError::ScriptFailed(line) => format!(
                "What happened: The calibration routine failed on the board ({line}).\nLikely causes: Camera busy or the coordinates file not writable.\nHow to fix: Restart the board supervisor and recalibrate."
            ),
            CalibrationError::Incomplete(ms) => format!(
                "What happened: Calibration did not finish within {ms} ms.\nLikely causes: The board supervisor is not running or never saw the `calib` command.\nHow to fix: Start `laser supervise` on the board, check paths.command_log, or raise calibration.deadline_ms."
            ),
        };
    }

    if let Some(le) = err.downcast_ref::<LinkError>() {
        return match le {
            LinkError::Timeout => "What happened: The device link timed out.\nLikely causes: Board unplugged or stalled.\nHow to fix: Reconnect the board and retry.".to_string(),
            LinkError::Closed => "What happened: The device link closed unexpectedly.\nLikely causes: Board reset or cable pulled.\nHow to fix: Reconnect the board and retry.".to_string(),
            LinkError::Unavailable(msg) | LinkError::Io(msg) => format!(
                "What happened: The device link is unavailable ({msg}).\nLikely causes: Wrong port in device.port, port in use, or missing permissions.\nHow to fix: Pass --port or fix [device] in the config; on Linux add yourself to the dialout group."
            ),
        };
    }

    if let Some(ScoringError::TransformUnset) = err.downcast_ref::<ScoringError>() {
        return "What happened: Play was refused because no calibration succeeded.\nLikely causes: The calibration pass before the game failed.\nHow to fix: Run `laser calibrate` and resolve its error first.".to_string();
    }

    if let Some(BuildError::InvalidConfig(msg)) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: Invalid game settings ({msg}).\nLikely causes: Out-of-range values in [game], [timing] or [modes].\nHow to fix: Edit the config file, then rerun."
        );
    }

    // Generic fallback
    let msg = err.to_string();
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: calibration 3, link 4, config 5, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use laser_core::error::{CalibrationError, LinkError};
    if err.downcast_ref::<ConfigInvalid>().is_some() {
        return 5;
    }
    if err.downcast_ref::<CalibrationError>().is_some() {
        return 3;
    }
    if err.downcast_ref::<LinkError>().is_some() {
        return 4;
    }
    1
}

fn reason_name(code: i32) -> &'static str {
    match code {
        3 => "Calibration",
        4 => "Link",
        5 => "Config",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let code = exit_code_for_error(err);
    json!({
        "reason": reason_name(code),
        "code": code,
        "message": humanize(err),
    })
    .to_string()
}
