//! Human-readable error descriptions and structured JSON error formatting.

use teleop_core::error::{BuildError, TeleopError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML ({}).\nLikely causes: A typo, a misspelled table, or a value of the wrong type.\nHow to fix: Fix the file, or omit --config to run with the built-in defaults.",
            te.message()
        );
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return format!(
            "What happened: A component could not be built ({be}).\nLikely causes: Out-of-range filter or range values in the config.\nHow to fix: Edit the config file, then rerun."
        );
    }

    if let Some(te) = err.downcast_ref::<TeleopError>() {
        return match te {
            TeleopError::HardwareFault(msg) => format!(
                "What happened: A device became unavailable ({msg}).\nLikely causes: Glove unplugged, robot controller unreachable, or a driver fault.\nHow to fix: Check cables and power, then start a new session."
            ),
            TeleopError::ChannelOutOfRange { kind, id, count } => format!(
                "What happened: Requested {kind} {id} but the device has {count}.\nLikely causes: Config ranges do not match the connected glove.\nHow to fix: Make [position]/[fingers] ranges match the device channel count."
            ),
            TeleopError::Transport(msg) => format!(
                "What happened: Telemetry transport failed ({msg}).\nLikely causes: Address already in use, unreachable peer, or a firewall dropping UDP.\nHow to fix: Check telemetry.publish_to / telemetry.listen and that both sides agree on the port."
            ),
            TeleopError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            TeleopError::Io(msg) => format!(
                "What happened: File or device I/O failed ({msg}).\nLikely causes: Missing directory, no write permission, or a full disk.\nHow to fix: Check the output path and permissions."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
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

/// Stable name for the JSON `reason` field.
fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<toml::de::Error>().is_some() || err.downcast_ref::<BuildError>().is_some()
    {
        return "config";
    }
    match err.downcast_ref::<TeleopError>() {
        Some(TeleopError::HardwareFault(_)) => "hardware_unavailable",
        Some(TeleopError::Transport(_)) => "transport",
        Some(TeleopError::Config(_)) => "config",
        Some(TeleopError::ChannelOutOfRange { .. }) => "channel_out_of_range",
        Some(TeleopError::Io(_)) => "io",
        Some(TeleopError::Hardware(_)) => "hardware",
        Some(TeleopError::State(_)) => "state",
        None => "error",
    }
}

/// Exit codes: 2 hardware unavailable, 3 transport, 4 configuration, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "hardware_unavailable" => 2,
        "transport" => 3,
        "config" => 4,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
