//! Human-readable error descriptions and structured JSON error formatting.

use station_core::error::{BuildError, ProxyError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingScale => {
                "What happened: No scale was provided to the station.\nLikely causes: The scale proxy was not wired into the builder.\nHow to fix: Pass the scale via with_scale(...).".to_string()
            }
            BuildError::MissingSensor => {
                "What happened: No height sensor was provided to the station.\nLikely causes: The sensor proxy was not wired into the builder.\nHow to fix: Pass the sensor via with_sensor(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<ProxyError>() {
        return match pe {
            ProxyError::DeviceOpen(msg) => format!(
                "What happened: A device could not be opened ({msg}).\nLikely causes: Device unplugged, wrong port in the config, or no permission to access it.\nHow to fix: Check the cable and the [scale] port, and that this user may open the device."
            ),
            ProxyError::DeviceRead(msg) => format!(
                "What happened: The device answered but the reading failed ({msg}).\nLikely causes: Noise on the link, wrong baudrate, or requests sent faster than the scale answers.\nHow to fix: Retry; if it persists check [scale] baudrate and raise pause_ms."
            ),
            ProxyError::ActionFailed(msg) => format!(
                "What happened: A camera could not take its photo ({msg}).\nLikely causes: Camera busy, card full, or the target folder is not writable.\nHow to fix: Check the camera and the photo folder, then take the set again."
            ),
            ProxyError::WorkerTerminated => {
                "What happened: The device worker exited before answering.\nLikely causes: The station was stopped, or the device driver crashed mid-request.\nHow to fix: Rerun the command; run with --log-level=debug if it keeps happening.".to_string()
            }
            ProxyError::DeviceUnavailable => {
                "What happened: The device stopped serving readings.\nLikely causes: The station was stopped, or the device driver crashed.\nHow to fix: Rerun the command; run with --log-level=debug if it keeps happening.".to_string()
            }
            ProxyError::WorkerSpawn(msg) => format!(
                "What happened: No thread could be started for a device ({msg}).\nLikely causes: Process or memory limits reached.\nHow to fix: Check ulimit -u and free memory."
            ),
            ProxyError::Superseded => {
                "What happened: The request was replaced by a newer one before it finished.\nLikely causes: Another command drove the same device at the same time.\nHow to fix: Run one command per device at a time, then retry.".to_string()
            }
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.starts_with("read config") {
        return format!(
            "What happened: The config file could not be read ({msg}).\nLikely causes: Wrong --config path or missing file.\nHow to fix: Pass --config with the path to a station TOML (see etc/station.toml)."
        );
    }

    if lower.contains("invalid configuration") || lower.contains(" must ") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Missing [scale] section or out-of-range values.\nHow to fix: Edit the TOML config and try again."
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

/// Stable name of a proxy failure, used as the JSON `reason`.
pub fn reason_name(err: &ProxyError) -> &'static str {
    match err {
        ProxyError::DeviceOpen(_) => "DeviceOpen",
        ProxyError::DeviceRead(_) => "DeviceRead",
        ProxyError::ActionFailed(_) => "ActionFailed",
        ProxyError::WorkerTerminated => "WorkerTerminated",
        ProxyError::DeviceUnavailable => "DeviceUnavailable",
        ProxyError::WorkerSpawn(_) => "WorkerSpawn",
        ProxyError::Superseded => "Superseded",
    }
}

/// Map proxy failures to stable exit codes; everything else returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ProxyError>() {
        Some(ProxyError::DeviceOpen(_)) => 3,
        Some(ProxyError::DeviceUnavailable) => 4,
        Some(ProxyError::WorkerTerminated) => 5,
        Some(
            ProxyError::DeviceRead(_) | ProxyError::ActionFailed(_) | ProxyError::Superseded,
        ) => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = err
        .downcast_ref::<ProxyError>()
        .map_or("Error", reason_name);
    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
