//! Device implementations for the rover.
//!
//! The `sim` module is always available and backs the CLI demo and the test
//! suites. With the `hardware` feature the bus arbiter can drive a real
//! TCA9548A-style I2C multiplexer through `rppal`.

pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod mux;
pub mod sim;

pub use sim::{
    FaultPoint, PwmWrite, SimArbiter, SimBackend, SimCamera, SimMotors, SimPower, SimPwm,
    SimRanger, SimVision, SimWheels, SimWorld,
};

/// Parse the adapter number out of a Linux I2C device path such as `/dev/i2c-1`.
pub fn bus_number(path: &str) -> error::Result<u8> {
    path.rsplit_once("i2c-")
        .and_then(|(_, n)| n.parse::<u8>().ok())
        .ok_or_else(|| error::HwError::BusPath(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bus_number() {
        assert_eq!(bus_number("/dev/i2c-1").unwrap(), 1);
        assert_eq!(bus_number("/dev/i2c-22").unwrap(), 22);
    }

    #[test]
    fn rejects_bad_bus_path() {
        let err = bus_number("/dev/spidev0.0").unwrap_err();
        assert!(format!("{err}").contains("invalid bus path"));
    }
}
