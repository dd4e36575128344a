//! Human-readable error descriptions, exit codes and structured JSON errors.

use rover_core::RoverError;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(re) = err.downcast_ref::<RoverError>() {
        return match re {
            RoverError::Bus(msg) => format!(
                "What happened: The shared I2C bus failed ({msg}).\nLikely causes: Multiplexer not powered, loose SDA/SCL wiring, or a port routed to the wrong device.\nHow to fix: Check the multiplexer wiring and [bus] ports in the config. The supervisor retries on its own; persistent failures point at the wiring."
            ),
            RoverError::DeviceOpen { device, reason } => format!(
                "What happened: Could not open the {device} ({reason}).\nLikely causes: Device missing from its multiplexer port, wrong address, or no permission on the I2C adapter.\nHow to fix: Verify the device answers on its port (i2cdetect), check the addresses in the config, and that the user is in the i2c group."
            ),
            RoverError::Hardware(msg) => format!(
                "What happened: A device reported an error ({msg}).\nLikely causes: Intermittent wiring or a device that stopped responding mid-run.\nHow to fix: Re-run with --log-level=debug to see which device and step failed."
            ),
            RoverError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing file, malformed TOML, or out-of-range values.\nHow to fix: Edit the config file (see etc/rover.toml for a sample) or check it with `rover print-config`, then rerun."
            ),
            RoverError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: The supervisor never finished its first device session.\nHow to fix: Re-run with --log-level=debug and look for session failures before this error."
            ),
        };
    }

    // String-based heuristics for errors raised before the typed layer
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("ctrl-c") || lower.contains("signal handler") {
        return "What happened: Could not install the ctrl-c handler.\nLikely causes: Another handler is already registered in this process.\nHow to fix: Run the command directly rather than from a wrapper that captures signals.".to_string();
    }

    if lower.contains("log level") || lower.contains("logging") {
        return format!(
            "What happened: Logging could not be set up ({msg}).\nLikely causes: Bad --log-level/RUST_LOG filter or an unwritable [logging] file.\nHow to fix: Use one of error|warn|info|debug|trace and check the log directory exists."
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

/// Stable exit codes; clap keeps 2 for usage errors.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<RoverError>() {
        Some(RoverError::Config(_)) => 3,
        Some(RoverError::Bus(_) | RoverError::DeviceOpen { .. } | RoverError::Hardware(_)) => 4,
        Some(RoverError::State(_)) => 5,
        None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<RoverError>() {
        Some(RoverError::Bus(_)) => "Bus",
        Some(RoverError::DeviceOpen { .. }) => "DeviceOpen",
        Some(RoverError::Hardware(_)) => "Hardware",
        Some(RoverError::Config(_)) => "Config",
        Some(RoverError::State(_)) => "State",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn typed_errors_survive_context() {
        let err = Err::<(), _>(RoverError::Config("fps must be > 0".into()))
            .wrap_err("load config")
            .unwrap_err();
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("fps must be > 0"));
    }

    #[test]
    fn untyped_errors_fall_back() {
        let err = eyre::eyre!("something odd");
        assert_eq!(exit_code_for_error(&err), 1);
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Error");
        assert!(v["message"].as_str().unwrap().contains("something odd"));
    }

    #[test]
    fn device_open_names_the_device() {
        let err = eyre::Report::new(RoverError::DeviceOpen {
            device: "PWM driver",
            reason: "no ack".into(),
        });
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).contains("PWM driver"));
    }
}
