//! Maps `Box<dyn Error>` from collaborator boundaries to typed `TeleopError`.
//!
//! The traits in `teleop_traits` return `Box<dyn Error + Send + Sync>`; this
//! module turns those into our error enum, downcasting
//! `teleop_hardware::HwError` when the `hardware-errors` feature is enabled.

use crate::error::TeleopError;

/// Map a collaborator error to a typed `TeleopError`.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> TeleopError {
    #[cfg(feature = "hardware-errors")]
    {
        use teleop_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::DeviceNotFound(_) | HwError::Disconnected => {
                    TeleopError::HardwareFault(hw.to_string())
                }
                HwError::ChannelOutOfRange { kind, id, count } => TeleopError::ChannelOutOfRange {
                    kind: *kind,
                    id: *id,
                    count: *count,
                },
                HwError::Io(io) => TeleopError::Io(io.to_string()),
                HwError::CommandRejected(_) => TeleopError::Hardware(hw.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("not found") || lower.contains("disconnected") || lower.contains("unavailable")
    {
        TeleopError::HardwareFault(s)
    } else {
        TeleopError::Hardware(s)
    }
}

/// True when the error means the device is gone for good.
#[inline]
pub fn is_fatal(e: &TeleopError) -> bool {
    matches!(e, TeleopError::HardwareFault(_))
}
