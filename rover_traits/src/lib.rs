//! Collaborator interfaces for the rover control core.
//!
//! Every device the core talks to sits behind one of these traits so the
//! supervisor and the navigation engine can run against real buses or the
//! simulated rig alike. Errors cross the boundary boxed; the few conditions
//! the core must tell apart travel as the marker types in [`markers`].

pub mod clock;
pub mod markers;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use markers::{MeasurementInvalid, NotReady, TargetNotFound};

use std::sync::Arc;
use std::time::Instant;

/// Boxed error used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Routes the shared bus to one or more downstream ports.
pub trait BusArbiter {
    fn select_single(&mut self, port: u8) -> Result<(), BoxError>;
    fn select_multiple(&mut self, port_mask: u8) -> Result<(), BoxError>;
    fn close(&mut self) -> Result<(), BoxError>;
}

/// Time-of-flight distance sensor running in continuous mode.
pub trait DistanceSensor {
    fn start_continuous(&mut self) -> Result<(), BoxError>;
    /// Latest measurement in millimetres. Fails with [`MeasurementInvalid`]
    /// when the sensor reports an out-of-range or unreliable sample.
    fn next_measurement(&mut self) -> Result<u16, BoxError>;
    fn close(&mut self) -> Result<(), BoxError>;
}

pub trait PowerMonitor {
    fn configure(&mut self, shunt_ohms: f32, max_current_a: f32) -> Result<(), BoxError>;
    fn bus_voltage(&mut self) -> Result<f32, BoxError>;
    fn current(&mut self) -> Result<f32, BoxError>;
    fn power(&mut self) -> Result<f32, BoxError>;
}

pub trait PwmDriver {
    fn configure(&mut self) -> Result<(), BoxError>;
    fn set_servo(&mut self, port: u8, angle: f64) -> Result<(), BoxError>;
    fn set_pwm(&mut self, port: u8, value: f64) -> Result<(), BoxError>;
    fn close(&mut self) -> Result<(), BoxError>;
}

pub trait MotorController {
    fn set_motor_speeds(&mut self, left: i8, right: i8) -> Result<(), BoxError>;
    /// Positions from the last completed encoder read; [`NotReady`] while a
    /// read is still in flight.
    fn encoder_positions(&mut self) -> Result<(i32, i32), BoxError>;
    fn start_encoder_read(&mut self) -> Result<(), BoxError>;
    fn close(&mut self) -> Result<(), BoxError>;
}

/// Opens every device of one hardware session.
///
/// Each `open_*` call assumes the caller already routed the bus to the
/// device's port through the arbiter it opened first.
pub trait DeviceBackend {
    type Arbiter: BusArbiter;
    type Motors: MotorController;
    type Ranger: DistanceSensor;
    type Power: PowerMonitor;
    type Pwm: PwmDriver;

    fn open_arbiter(&mut self, bus: &str) -> Result<Self::Arbiter, BoxError>;
    fn open_motor_controller(&mut self, bus: &str) -> Result<Self::Motors, BoxError>;
    /// Open a distance sensor at `address`, re-addressing it to
    /// `new_address` when given.
    fn open_distance_sensor(
        &mut self,
        bus: &str,
        address: u8,
        new_address: Option<u8>,
    ) -> Result<Self::Ranger, BoxError>;
    fn open_power_monitor(&mut self, bus: &str, address: u8) -> Result<Self::Power, BoxError>;
    fn open_pwm_driver(&mut self, bus: &str) -> Result<Self::Pwm, BoxError>;
}

/// Signed speed for each wheel of a four-wheel base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelSpeeds {
    pub front_left: i8,
    pub front_right: i8,
    pub back_left: i8,
    pub back_right: i8,
}

impl WheelSpeeds {
    pub const STOP: Self = Self {
        front_left: 0,
        front_right: 0,
        back_left: 0,
        back_right: 0,
    };
}

/// Sink for four-wheel motor commands.
pub trait WheelDrive {
    fn set_wheel_speeds(&self, speeds: WheelSpeeds) -> Result<(), BoxError>;
}

impl<T: WheelDrive + ?Sized> WheelDrive for Arc<T> {
    fn set_wheel_speeds(&self, speeds: WheelSpeeds) -> Result<(), BoxError> {
        (**self).set_wheel_speeds(speeds)
    }
}

/// One captured camera frame. The core never looks at the pixels.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub captured_at: Instant,
}

pub trait FrameSource {
    /// Drop `count` frames without decoding them.
    fn grab(&mut self, count: usize) -> Result<(), BoxError>;
    /// Block until the next frame; `None` when the device produced nothing.
    fn read(&mut self) -> Result<Option<Frame>, BoxError>;
    /// Persist `frame` for debugging.
    fn save_snapshot(&mut self, frame: &Frame, index: u32) -> Result<(), BoxError>;
}

/// Where a target was seen in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sighting {
    pub x: i32,
    pub radius: i32,
}

pub trait VisionService {
    /// Locate the target of `colour`; fails with [`TargetNotFound`] when it
    /// is not in the frame.
    fn find_target(&mut self, frame: &Frame, colour: &str) -> Result<Sighting, BoxError>;
}
