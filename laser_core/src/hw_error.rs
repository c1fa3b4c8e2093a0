//! Maps `Box<dyn Error>` from the `DeviceLink` boundary to typed `LinkError`.
//!
//! With the `hardware-errors` feature, `laser_hardware::HwError` is
//! downcast precisely; otherwise (and for foreign backends) the message text
//! decides.

use crate::error::LinkError;

pub fn map_link_error(e: &(dyn std::error::Error + 'static)) -> LinkError {
    #[cfg(feature = "hardware-errors")]
    {
        use laser_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Closed | HwError::Exhausted => LinkError::Closed,
                HwError::Timeout => LinkError::Timeout,
                HwError::Port(msg) => LinkError::Unavailable(msg.clone()),
                HwError::Io(io) => LinkError::Io(io.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        LinkError::Timeout
    } else if lower.contains("closed") {
        LinkError::Closed
    } else {
        LinkError::Unavailable(s)
    }
}
