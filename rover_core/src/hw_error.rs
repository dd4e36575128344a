//! Maps `Box<dyn Error>` from trait boundaries to what the core acts on.
//!
//! Device traits return `Box<dyn Error + Send + Sync>`. Three conditions are
//! part of normal operation and travel as marker types from `rover_traits`;
//! everything else is a transport failure that ends the current session. With
//! the `hardware-errors` feature, `rover_hardware::HwError` is downcast for a
//! more precise `RoverError`.

use rover_traits::{BoxError, MeasurementInvalid, NotReady, TargetNotFound};

use crate::error::RoverError;

/// How the core treats a device error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// Encoder read still in flight; try again next tick.
    NotReady,
    /// Sensor answered but the sample is unusable.
    MeasurementInvalid,
    /// Vision found nothing of the requested colour.
    TargetNotFound,
    /// Anything else.
    Transport,
}

pub fn classify(e: &(dyn std::error::Error + 'static)) -> Fault {
    if e.is::<NotReady>() {
        Fault::NotReady
    } else if e.is::<MeasurementInvalid>() {
        Fault::MeasurementInvalid
    } else if e.is::<TargetNotFound>() {
        Fault::TargetNotFound
    } else {
        Fault::Transport
    }
}

/// Map a trait-boundary error to a typed `RoverError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> RoverError {
    #[cfg(feature = "hardware-errors")]
    {
        use rover_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::NotRouted { .. } | HwError::PortRange(_) | HwError::BusPath(_) => {
                    RoverError::Bus(hw.to_string())
                }
                other => RoverError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("bus") || lower.contains("mux") {
        RoverError::Bus(s)
    } else {
        RoverError::Hardware(s)
    }
}

/// Error adapter for `map_err`: types the boxed error and names the step
/// that failed.
pub(crate) fn failed(step: &'static str) -> impl FnOnce(BoxError) -> eyre::Report {
    move |e| eyre::Report::new(map_hw_error(e.as_ref())).wrap_err(step)
}

/// Like [`failed`] for device constructors.
pub(crate) fn open_failed(device: &'static str) -> impl FnOnce(BoxError) -> eyre::Report {
    move |e| {
        eyre::Report::new(RoverError::DeviceOpen {
            device,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_classified() {
        let e: BoxError = Box::new(NotReady);
        assert_eq!(classify(e.as_ref()), Fault::NotReady);
        let e: BoxError = Box::new(MeasurementInvalid);
        assert_eq!(classify(e.as_ref()), Fault::MeasurementInvalid);
        let e: BoxError = Box::new(TargetNotFound);
        assert_eq!(classify(e.as_ref()), Fault::TargetNotFound);
        let e: BoxError = "wire fell off".into();
        assert_eq!(classify(e.as_ref()), Fault::Transport);
    }

    #[test]
    fn string_fallback_spots_bus_errors() {
        let e: BoxError = "mux did not ack".into();
        assert!(matches!(map_hw_error(e.as_ref()), RoverError::Bus(_)));
        let e: BoxError = "checksum mismatch".into();
        assert!(matches!(map_hw_error(e.as_ref()), RoverError::Hardware(_)));
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn routing_errors_map_to_bus() {
        use rover_hardware::error::HwError;
        let e: BoxError = Box::new(HwError::NotRouted { port: 3, mask: 0 });
        assert!(matches!(map_hw_error(e.as_ref()), RoverError::Bus(_)));
        let e: BoxError = Box::new(HwError::NoDevice { address: 0x41 });
        assert!(matches!(map_hw_error(e.as_ref()), RoverError::Hardware(_)));
    }
}
