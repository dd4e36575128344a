//! I2C bus multiplexer (TCA9548A-style): one control byte selects the set of
//! downstream channels.

use rppal::i2c::I2c;
use rover_traits::{BoxError, BusArbiter, DeviceBackend};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::sim::{SimArbiter, SimBackend, SimMotors, SimPower, SimPwm, SimRanger};

/// Default 7-bit address of the multiplexer.
pub const DEFAULT_ADDRESS: u16 = 0x70;

pub struct I2cMux {
    i2c: I2c,
    selected: u8,
}

impl I2cMux {
    pub fn open(bus_path: &str, address: u16) -> Result<Self> {
        let bus = crate::bus_number(bus_path)?;
        let mut i2c = I2c::with_bus(bus).map_err(|e| HwError::I2c(e.to_string()))?;
        i2c.set_slave_address(address)
            .map_err(|e| HwError::I2c(e.to_string()))?;
        Ok(Self { i2c, selected: 0 })
    }

    fn write_mask(&mut self, mask: u8) -> Result<()> {
        self.i2c
            .write(&[mask])
            .map_err(|e| HwError::I2c(e.to_string()))?;
        trace!(mask, "mux channels selected");
        self.selected = mask;
        Ok(())
    }
}

impl BusArbiter for I2cMux {
    fn select_single(&mut self, port: u8) -> std::result::Result<(), BoxError> {
        if port >= 8 {
            return Err(Box::new(HwError::PortRange(port)));
        }
        Ok(self.write_mask(1 << port)?)
    }

    fn select_multiple(&mut self, port_mask: u8) -> std::result::Result<(), BoxError> {
        Ok(self.write_mask(port_mask)?)
    }

    fn close(&mut self) -> std::result::Result<(), BoxError> {
        // Leave every downstream channel disconnected.
        if self.selected != 0 {
            self.write_mask(0)?;
        }
        Ok(())
    }
}

/// Real multiplexer in front of simulated peripherals, for checking the bus
/// wiring on the bench before the rest of the robot is attached.
pub struct BenchBackend {
    sim: SimBackend,
    address: u16,
}

impl BenchBackend {
    pub fn new(sim: SimBackend, address: u16) -> Self {
        Self { sim, address }
    }
}

pub struct BenchArbiter {
    mux: I2cMux,
    sim: SimArbiter,
}

impl BusArbiter for BenchArbiter {
    fn select_single(&mut self, port: u8) -> std::result::Result<(), BoxError> {
        self.mux.select_single(port)?;
        self.sim.select_single(port)
    }

    fn select_multiple(&mut self, port_mask: u8) -> std::result::Result<(), BoxError> {
        self.mux.select_multiple(port_mask)?;
        self.sim.select_multiple(port_mask)
    }

    fn close(&mut self) -> std::result::Result<(), BoxError> {
        let mux = self.mux.close();
        self.sim.close()?;
        mux
    }
}

impl DeviceBackend for BenchBackend {
    type Arbiter = BenchArbiter;
    type Motors = SimMotors;
    type Ranger = SimRanger;
    type Power = SimPower;
    type Pwm = SimPwm;

    fn open_arbiter(&mut self, bus: &str) -> std::result::Result<BenchArbiter, BoxError> {
        let mux = I2cMux::open(bus, self.address)?;
        let sim = self.sim.open_arbiter(bus)?;
        Ok(BenchArbiter { mux, sim })
    }

    fn open_motor_controller(&mut self, bus: &str) -> std::result::Result<SimMotors, BoxError> {
        self.sim.open_motor_controller(bus)
    }

    fn open_distance_sensor(
        &mut self,
        bus: &str,
        address: u8,
        new_address: Option<u8>,
    ) -> std::result::Result<SimRanger, BoxError> {
        self.sim.open_distance_sensor(bus, address, new_address)
    }

    fn open_power_monitor(
        &mut self,
        bus: &str,
        address: u8,
    ) -> std::result::Result<SimPower, BoxError> {
        self.sim.open_power_monitor(bus, address)
    }

    fn open_pwm_driver(&mut self, bus: &str) -> std::result::Result<SimPwm, BoxError> {
        self.sim.open_pwm_driver(bus)
    }
}
