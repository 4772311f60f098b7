//! Human-readable error descriptions and structured JSON error formatting.

use afc_core::error::{AfcError, BuildError, FatalReason};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingReverseScaler | BuildError::MissingForwardScaler => {
                "What happened: A detector calibration was not provided to the controller.\nLikely causes: The [analog] section could not be mapped or the builder was not wired.\nHow to fix: Check [analog.reverse] and [analog.forward] in the config.".to_string()
            }
            BuildError::MissingTransport => {
                "What happened: No command transport was provided to the controller.\nLikely causes: Transport failed to initialize.\nHow to fix: Re-run with --log-level=debug to see the transport setup.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(ae) = err.downcast_ref::<AfcError>() {
        return match ae {
            AfcError::Fatal(FatalReason::Watchdog) => "What happened: The slow tick watchdog expired.\nLikely causes: The control loop stalled or the housekeeping timer stopped.\nHow to fix: Check CPU load, consider --rt, or raise watchdog.timeout_ms.".to_string(),
            AfcError::Fatal(FatalReason::BringUp) => {
                let cause = err
                    .chain()
                    .nth(1)
                    .map_or_else(String::new, |c| format!(" Cause: {c}."));
                format!(
                    "What happened: Peripheral bring-up failed.{cause}\nLikely causes: Converter or PWM not wired, or missing bus permissions.\nHow to fix: Verify wiring and SPI access, then restart."
                )
            }
            AfcError::Sensor(msg) => format!(
                "What happened: A converter is not responding ({msg}).\nLikely causes: SPI wiring, chip select, or converter power.\nHow to fix: Check the converter board; the controller treats silent reads as no data."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nHow to fix: Check the --config path and permissions."
        );
    }
    if lower.contains("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this controller ({msg}).\nHow to fix: Fix the reported key or value, then rerun."
        );
    }
    if lower.contains("invalid configuration") {
        let cause = err.source().map_or_else(String::new, |s| format!(" ({s})"));
        return format!(
            "What happened: Configuration is invalid{cause}.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 watchdog, 4 bring-up, 1 anything else.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<AfcError>() {
        Some(AfcError::Fatal(FatalReason::Watchdog)) => 3,
        Some(AfcError::Fatal(FatalReason::BringUp)) => 4,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<AfcError>() {
        Some(AfcError::Fatal(FatalReason::Watchdog)) => "Watchdog",
        Some(AfcError::Fatal(FatalReason::BringUp)) => "BringUp",
        Some(AfcError::Sensor(_)) => "Sensor",
        Some(AfcError::Hardware(_)) => "Hardware",
        Some(_) => "Controller",
        None => "Error",
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
