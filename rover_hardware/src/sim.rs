//! Simulated rover: every collaborator backed by one shared, inspectable world.
//!
//! The world enforces bus routing (a device only answers while the arbiter
//! has its port selected), remembers every actuator write, and can be told to
//! fail a given operation a number of times. A small kinematic model lets the
//! navigation engine chase targets: wheel commands turn the robot and move it
//! towards or away from whichever target the vision service was last asked
//! about.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rover_traits::{
    BoxError, BusArbiter, Clock, DeviceBackend, DistanceSensor, Frame, FrameSource,
    MeasurementInvalid, MonotonicClock, MotorController, NotReady, PowerMonitor, PwmDriver,
    Sighting, TargetNotFound, VisionService, WheelDrive, WheelSpeeds,
};
use tracing::{debug, trace};

use crate::error::HwError;

/// Operations that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FaultPoint {
    ArbiterOpen,
    Select,
    MotorOpen,
    MotorWrite,
    EncoderRead,
    SensorOpen,
    SensorRead,
    PowerOpen,
    PowerRead,
    PwmOpen,
    PwmConfigure,
    PwmWrite,
    WheelWrite,
    CameraRead,
}

impl FaultPoint {
    fn name(self) -> &'static str {
        match self {
            FaultPoint::ArbiterOpen => "arbiter open",
            FaultPoint::Select => "bus select",
            FaultPoint::MotorOpen => "motor controller open",
            FaultPoint::MotorWrite => "motor write",
            FaultPoint::EncoderRead => "encoder read",
            FaultPoint::SensorOpen => "distance sensor open",
            FaultPoint::SensorRead => "distance sensor read",
            FaultPoint::PowerOpen => "power monitor open",
            FaultPoint::PowerRead => "power monitor read",
            FaultPoint::PwmOpen => "pwm driver open",
            FaultPoint::PwmConfigure => "pwm driver configure",
            FaultPoint::PwmWrite => "pwm write",
            FaultPoint::WheelWrite => "wheel write",
            FaultPoint::CameraRead => "camera read",
        }
    }
}

/// A servo or raw PWM write as seen by the driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PwmWrite {
    Servo { port: u8, angle: f64 },
    Pwm { port: u8, value: f64 },
}

#[derive(Debug, Clone, Copy)]
struct Rail {
    address: u8,
    volts: f32,
    amps: f32,
}

#[derive(Debug)]
pub struct SimWorld {
    pub motor_port: u8,
    pub others_port: u8,
    pub selected_mask: u8,
    /// Range seen by the sensor on each bus port.
    pub ranges_mm: [u16; 8],
    /// Ports whose sensor currently reports invalid measurements.
    pub invalid_mask: u8,
    /// Address distance sensors answer on after power-up.
    pub factory_address: u8,
    /// Ports whose sensor was already moved off the factory address.
    pub readdressed_mask: u8,
    pub motor_writes: Vec<(i8, i8)>,
    pub pwm_writes: Vec<PwmWrite>,
    pub wheel_writes: Vec<WheelSpeeds>,
    /// `frames_served` at the time of each entry in `wheel_writes`.
    pub wheel_write_frames: Vec<u64>,
    pub encoder: (i32, i32),
    encoder_in_flight: bool,
    rails: Vec<Rail>,
    pub arbiter_opens: u32,
    pub arbiter_closes: u32,
    pub motor_closes: u32,
    pub sensor_closes: u32,
    pub pwm_closes: u32,
    pub frames_served: u64,
    pub snapshots: Vec<u32>,
    faults: BTreeMap<FaultPoint, u32>,

    // Navigation model.
    /// Ports facing forward (front-left, forward, front-right) driven by the model.
    pub approach_ports: Option<[u8; 3]>,
    pub heading_deg: f64,
    pub bearings_deg: BTreeMap<String, f64>,
    pub current_target: Option<String>,
    pub target_range_mm: f64,
    pub start_range_mm: f64,
}

impl Default for SimWorld {
    fn default() -> Self {
        let bearings_deg = [("red", 40.0), ("blue", 130.0), ("yellow", 220.0), ("green", 310.0)]
            .into_iter()
            .map(|(c, b)| (c.to_string(), b))
            .collect();
        Self {
            motor_port: 6,
            others_port: 7,
            selected_mask: 0,
            ranges_mm: [1000; 8],
            invalid_mask: 0,
            factory_address: 0x29,
            readdressed_mask: 0,
            motor_writes: Vec::new(),
            pwm_writes: Vec::new(),
            wheel_writes: Vec::new(),
            wheel_write_frames: Vec::new(),
            encoder: (0, 0),
            encoder_in_flight: false,
            rails: vec![
                Rail {
                    address: 0x41,
                    volts: 12.1,
                    amps: 0.8,
                },
                Rail {
                    address: 0x44,
                    volts: 11.8,
                    amps: 2.4,
                },
            ],
            arbiter_opens: 0,
            arbiter_closes: 0,
            motor_closes: 0,
            sensor_closes: 0,
            pwm_closes: 0,
            frames_served: 0,
            snapshots: Vec::new(),
            faults: BTreeMap::new(),
            approach_ports: None,
            heading_deg: 0.0,
            bearings_deg,
            current_target: None,
            target_range_mm: 600.0,
            start_range_mm: 600.0,
        }
    }
}

/// Horizontal pixels per degree of bearing error.
const PIXELS_PER_DEGREE: f64 = 8.0;
const FRAME_CENTRE_X: f64 = 320.0;
const FIELD_OF_VIEW_DEG: f64 = 40.0;
/// Millimetres travelled per unit of forward speed per wheel command.
const MM_PER_SPEED_UNIT: f64 = 2.0;
const DEG_PER_SPEED_UNIT: f64 = 0.75;
const MIN_RANGE_MM: f64 = 30.0;
const MAX_RANGE_MM: f64 = 2000.0;

impl SimWorld {
    /// Make `point` fail the next `times` times it is exercised.
    pub fn fail_next(&mut self, point: FaultPoint, times: u32) {
        *self.faults.entry(point).or_insert(0) += times;
    }

    pub fn pending_faults(&self, point: FaultPoint) -> u32 {
        self.faults.get(&point).copied().unwrap_or(0)
    }

    pub fn remove_rail(&mut self, address: u8) {
        self.rails.retain(|r| r.address != address);
    }

    fn trip(&mut self, point: FaultPoint) -> Result<(), HwError> {
        match self.faults.get_mut(&point) {
            Some(n) if *n > 0 => {
                *n -= 1;
                debug!(fault = point.name(), "injected fault");
                Err(HwError::Injected(point.name()))
            }
            _ => Ok(()),
        }
    }

    fn require_routed(&self, port: u8) -> Result<(), HwError> {
        if self.selected_mask & (1 << port) == 0 {
            return Err(HwError::NotRouted {
                port,
                mask: self.selected_mask,
            });
        }
        Ok(())
    }

    fn single_selected_port(&self) -> Result<u8, HwError> {
        if self.selected_mask.count_ones() != 1 {
            return Err(HwError::NotRouted {
                port: 0xff,
                mask: self.selected_mask,
            });
        }
        Ok(self.selected_mask.trailing_zeros() as u8)
    }

    fn apply_wheels(&mut self, s: WheelSpeeds) {
        let fl = f64::from(s.front_left);
        let fr = f64::from(s.front_right);
        let bl = f64::from(s.back_left);
        let br = f64::from(s.back_right);
        let forward = (fl + fr + bl + br) / 4.0;
        let rotation = (fr - fl + br - bl) / 4.0;
        self.heading_deg = (self.heading_deg + rotation * DEG_PER_SPEED_UNIT).rem_euclid(360.0);
        self.target_range_mm = (self.target_range_mm - forward * MM_PER_SPEED_UNIT)
            .clamp(MIN_RANGE_MM, MAX_RANGE_MM);
        self.sync_approach_ranges();
    }

    fn sync_approach_ranges(&mut self) {
        if let Some([front_left, forward, front_right]) = self.approach_ports {
            let straight = self.target_range_mm.round() as u16;
            let diagonal = (self.target_range_mm * 0.6).round() as u16;
            self.ranges_mm[usize::from(forward)] = straight;
            self.ranges_mm[usize::from(front_left)] = diagonal;
            self.ranges_mm[usize::from(front_right)] = diagonal;
        }
    }

    fn look_for(&mut self, colour: &str) -> Option<Sighting> {
        if self.current_target.as_deref() != Some(colour) {
            self.current_target = Some(colour.to_string());
            self.target_range_mm = self.start_range_mm;
            self.sync_approach_ranges();
        }
        let bearing = *self.bearings_deg.get(colour)?;
        // Signed error in (-180, 180]: positive when the target is to the left.
        let mut error = (bearing - self.heading_deg).rem_euclid(360.0);
        if error > 180.0 {
            error -= 360.0;
        }
        if error.abs() > FIELD_OF_VIEW_DEG {
            return None;
        }
        Some(Sighting {
            x: (FRAME_CENTRE_X - error * PIXELS_PER_DEGREE).round() as i32,
            radius: (12000.0 / self.target_range_mm.max(1.0)).round() as i32,
        })
    }
}

pub type SharedWorld = Arc<Mutex<SimWorld>>;

fn lock(world: &SharedWorld) -> MutexGuard<'_, SimWorld> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Backend opening simulated devices that all share one world.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    world: SharedWorld,
}

impl SimBackend {
    pub fn new(world: SimWorld) -> Self {
        Self {
            world: Arc::new(Mutex::new(world)),
        }
    }

    pub fn shared(&self) -> SharedWorld {
        self.world.clone()
    }

    /// Run `f` with the world locked.
    pub fn with_world<R>(&self, f: impl FnOnce(&mut SimWorld) -> R) -> R {
        f(&mut lock(&self.world))
    }
}

impl DeviceBackend for SimBackend {
    type Arbiter = SimArbiter;
    type Motors = SimMotors;
    type Ranger = SimRanger;
    type Power = SimPower;
    type Pwm = SimPwm;

    fn open_arbiter(&mut self, bus: &str) -> Result<SimArbiter, BoxError> {
        let mut w = lock(&self.world);
        w.trip(FaultPoint::ArbiterOpen)?;
        w.arbiter_opens += 1;
        w.selected_mask = 0;
        debug!(bus, "sim arbiter opened");
        Ok(SimArbiter {
            world: self.world.clone(),
        })
    }

    fn open_motor_controller(&mut self, _bus: &str) -> Result<SimMotors, BoxError> {
        let mut w = lock(&self.world);
        w.trip(FaultPoint::MotorOpen)?;
        let port = w.motor_port;
        w.require_routed(port)?;
        w.encoder_in_flight = false;
        Ok(SimMotors {
            world: self.world.clone(),
        })
    }

    fn open_distance_sensor(
        &mut self,
        _bus: &str,
        address: u8,
        new_address: Option<u8>,
    ) -> Result<SimRanger, BoxError> {
        let mut w = lock(&self.world);
        w.trip(FaultPoint::SensorOpen)?;
        let port = w.single_selected_port()?;
        let bit = 1u8 << port;
        let moved = w.readdressed_mask & bit != 0;
        // The factory address only answers until the sensor has been moved,
        // any other address only afterwards.
        if (address == w.factory_address) == moved {
            return Err(Box::new(HwError::NoDevice { address }));
        }
        if new_address.is_some() {
            w.readdressed_mask |= bit;
        }
        trace!(port, address, ?new_address, "sim distance sensor opened");
        Ok(SimRanger {
            world: self.world.clone(),
            port,
        })
    }

    fn open_power_monitor(&mut self, _bus: &str, address: u8) -> Result<SimPower, BoxError> {
        let mut w = lock(&self.world);
        w.trip(FaultPoint::PowerOpen)?;
        let port = w.others_port;
        w.require_routed(port)?;
        if !w.rails.iter().any(|r| r.address == address) {
            return Err(Box::new(HwError::NoDevice { address }));
        }
        Ok(SimPower {
            world: self.world.clone(),
            address,
            configured: false,
        })
    }

    fn open_pwm_driver(&mut self, _bus: &str) -> Result<SimPwm, BoxError> {
        let mut w = lock(&self.world);
        w.trip(FaultPoint::PwmOpen)?;
        let port = w.others_port;
        w.require_routed(port)?;
        Ok(SimPwm {
            world: self.world.clone(),
        })
    }
}

#[derive(Debug)]
pub struct SimArbiter {
    world: SharedWorld,
}

impl BusArbiter for SimArbiter {
    fn select_single(&mut self, port: u8) -> Result<(), BoxError> {
        if port >= 8 {
            return Err(Box::new(HwError::PortRange(port)));
        }
        self.select_multiple(1 << port)
    }

    fn select_multiple(&mut self, port_mask: u8) -> Result<(), BoxError> {
        let mut w = lock(&self.world);
        w.trip(FaultPoint::Select)?;
        w.selected_mask = port_mask;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        let mut w = lock(&self.world);
        w.selected_mask = 0;
        w.arbiter_closes += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SimMotors {
    world: SharedWorld,
}

impl MotorController for SimMotors {
    fn set_motor_speeds(&mut self, left: i8, right: i8) -> Result<(), BoxError> {
        let mut w = lock(&self.world);
        let port = w.motor_port;
        w.require_routed(port)?;
        w.trip(FaultPoint::MotorWrite)?;
        w.motor_writes.push((left, right));
        Ok(())
    }

    fn encoder_positions(&mut self) -> Result<(i32, i32), BoxError> {
        let mut w = lock(&self.world);
        let port = w.motor_port;
        w.require_routed(port)?;
        w.trip(FaultPoint::EncoderRead)?;
        if w.encoder_in_flight {
            // The controller finishes the read before the next poll.
            w.encoder_in_flight = false;
            return Err(Box::new(NotReady));
        }
        if let Some(&(l, r)) = w.motor_writes.last() {
            w.encoder.0 += i32::from(l);
            w.encoder.1 += i32::from(r);
        }
        Ok(w.encoder)
    }

    fn start_encoder_read(&mut self) -> Result<(), BoxError> {
        let mut w = lock(&self.world);
        let port = w.motor_port;
        w.require_routed(port)?;
        w.encoder_in_flight = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), BoxError> {
        lock(&self.world).motor_closes += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SimRanger {
    world: SharedWorld,
    port: u8,
}

impl SimRanger {
    pub fn port(&self) -> u8 {
        self.port
    }
}

impl DistanceSensor for SimRanger {
    fn start_continuous(&mut self) -> Result<(), BoxError> {
        lock(&self.world).require_routed(self.port)?;
        Ok(())
    }

    fn next_measurement(&mut self) -> Result<u16, BoxError> {
        let mut w = lock(&self.world);
        w.require_routed(self.port)?;
        w.trip(FaultPoint::SensorRead)?;
        if w.invalid_mask & (1 << self.port) != 0 {
            return Err(Box::new(MeasurementInvalid));
        }
        Ok(w.ranges_mm[usize::from(self.port)])
    }

    fn close(&mut self) -> Result<(), BoxError> {
        lock(&self.world).sensor_closes += 1;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SimPower {
    world: SharedWorld,
    address: u8,
    configured: bool,
}

impl SimPower {
    fn rail(&self) -> Result<Rail, BoxError> {
        let mut w = lock(&self.world);
        let port = w.others_port;
        w.require_routed(port)?;
        w.trip(FaultPoint::PowerRead)?;
        if !self.configured {
            return Err(Box::new(HwError::I2c("power monitor not configured".into())));
        }
        w.rails
            .iter()
            .find(|r| r.address == self.address)
            .copied()
            .ok_or_else(|| {
                Box::new(HwError::NoDevice {
                    address: self.address,
                }) as BoxError
            })
    }
}

impl PowerMonitor for SimPower {
    fn configure(&mut self, shunt_ohms: f32, max_current_a: f32) -> Result<(), BoxError> {
        if shunt_ohms <= 0.0 || max_current_a <= 0.0 {
            return Err(Box::new(HwError::I2c(format!(
                "bad calibration: shunt {shunt_ohms} ohm, max {max_current_a} A"
            ))));
        }
        self.configured = true;
        Ok(())
    }

    fn bus_voltage(&mut self) -> Result<f32, BoxError> {
        Ok(self.rail()?.volts)
    }

    fn current(&mut self) -> Result<f32, BoxError> {
        Ok(self.rail()?.amps)
    }

    fn power(&mut self) -> Result<f32, BoxError> {
        let rail = self.rail()?;
        Ok(rail.volts * rail.amps)
    }
}

#[derive(Debug)]
pub struct SimPwm {
    world: SharedWorld,
}

impl SimPwm {
    fn write(&mut self, write: PwmWrite) -> Result<(), BoxError> {
        let mut w = lock(&self.world);
        let port = w.others_port;
        w.require_routed(port)?;
        w.trip(FaultPoint::PwmWrite)?;
        w.pwm_writes.push(write);
        Ok(())
    }
}

impl PwmDriver for SimPwm {
    fn configure(&mut self) -> Result<(), BoxError> {
        let mut w = lock(&self.world);
        let port = w.others_port;
        w.require_routed(port)?;
        w.trip(FaultPoint::PwmConfigure)?;
        Ok(())
    }

    fn set_servo(&mut self, port: u8, angle: f64) -> Result<(), BoxError> {
        self.write(PwmWrite::Servo { port, angle })
    }

    fn set_pwm(&mut self, port: u8, value: f64) -> Result<(), BoxError> {
        self.write(PwmWrite::Pwm { port, value })
    }

    fn close(&mut self) -> Result<(), BoxError> {
        let mut w = lock(&self.world);
        let port = w.others_port;
        w.require_routed(port)?;
        w.pwm_closes += 1;
        Ok(())
    }
}

/// Four-wheel base moving the simulated robot.
#[derive(Debug, Clone)]
pub struct SimWheels {
    world: SharedWorld,
}

impl SimWheels {
    pub fn new(backend: &SimBackend) -> Self {
        Self {
            world: backend.shared(),
        }
    }
}

impl WheelDrive for SimWheels {
    fn set_wheel_speeds(&self, speeds: WheelSpeeds) -> Result<(), BoxError> {
        let mut w = lock(&self.world);
        w.trip(FaultPoint::WheelWrite)?;
        w.wheel_writes.push(speeds);
        let served = w.frames_served;
        w.wheel_write_frames.push(served);
        w.apply_wheels(speeds);
        Ok(())
    }
}

/// Camera producing blank 640x480 frames at a fixed rate.
#[derive(Debug)]
pub struct SimCamera<C: Clock = MonotonicClock> {
    world: SharedWorld,
    clock: C,
    period: Duration,
}

impl SimCamera<MonotonicClock> {
    pub fn new(backend: &SimBackend, fps: u32) -> Self {
        Self::with_clock(backend, fps, MonotonicClock::new())
    }
}

impl<C: Clock> SimCamera<C> {
    pub fn with_clock(backend: &SimBackend, fps: u32, clock: C) -> Self {
        Self {
            world: backend.shared(),
            clock,
            period: Duration::from_micros(1_000_000 / u64::from(fps.max(1))),
        }
    }
}

impl<C: Clock> FrameSource for SimCamera<C> {
    fn grab(&mut self, count: usize) -> Result<(), BoxError> {
        lock(&self.world).frames_served += count as u64;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, BoxError> {
        self.clock.sleep(self.period);
        let mut w = lock(&self.world);
        w.trip(FaultPoint::CameraRead)?;
        w.frames_served += 1;
        Ok(Some(Frame {
            width: 640,
            height: 480,
            pixels: Vec::new(),
            captured_at: self.clock.now(),
        }))
    }

    fn save_snapshot(&mut self, _frame: &Frame, index: u32) -> Result<(), BoxError> {
        lock(&self.world).snapshots.push(index);
        Ok(())
    }
}

/// Vision service answering from the world's target bearings.
#[derive(Debug, Clone)]
pub struct SimVision {
    world: SharedWorld,
}

impl SimVision {
    pub fn new(backend: &SimBackend) -> Self {
        Self {
            world: backend.shared(),
        }
    }
}

impl VisionService for SimVision {
    fn find_target(&mut self, _frame: &Frame, colour: &str) -> Result<Sighting, BoxError> {
        lock(&self.world)
            .look_for(colour)
            .ok_or_else(|| Box::new(TargetNotFound) as BoxError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SimBackend {
        SimBackend::default()
    }

    #[test]
    fn sensor_requires_routing() {
        let mut b = backend();
        let mut arb = b.open_arbiter("/dev/i2c-1").unwrap();
        arb.select_single(2).unwrap();
        let mut s = b.open_distance_sensor("/dev/i2c-1", 0x29, Some(0x32)).unwrap();
        assert_eq!(s.port(), 2);
        assert_eq!(s.next_measurement().unwrap(), 1000);
        arb.select_single(3).unwrap();
        assert!(s.next_measurement().is_err());
        arb.select_multiple(0b0000_1100).unwrap();
        assert!(s.next_measurement().is_ok());
    }

    #[test]
    fn readdressed_sensor_only_answers_on_new_address() {
        let mut b = backend();
        let mut arb = b.open_arbiter("/dev/i2c-1").unwrap();
        arb.select_single(0).unwrap();
        b.open_distance_sensor("/dev/i2c-1", 0x29, Some(0x30)).unwrap();
        assert!(b.open_distance_sensor("/dev/i2c-1", 0x29, Some(0x30)).is_err());
        assert!(b.open_distance_sensor("/dev/i2c-1", 0x30, None).is_ok());
    }

    #[test]
    fn factory_address_opens_without_readdressing() {
        let mut b = backend();
        let mut arb = b.open_arbiter("/dev/i2c-1").unwrap();
        arb.select_single(4).unwrap();
        assert!(b.open_distance_sensor("/dev/i2c-1", 0x29, None).is_ok());
        assert!(b.open_distance_sensor("/dev/i2c-1", 0x29, None).is_ok());
        assert!(b.open_distance_sensor("/dev/i2c-1", 0x34, None).is_err());
    }

    #[test]
    fn invalid_measurement_is_marker_error() {
        let mut b = backend();
        b.with_world(|w| w.invalid_mask = 1);
        let mut arb = b.open_arbiter("/dev/i2c-1").unwrap();
        arb.select_single(0).unwrap();
        let mut s = b.open_distance_sensor("/dev/i2c-1", 0x29, Some(0x30)).unwrap();
        let err = s.next_measurement().unwrap_err();
        assert!(err.downcast_ref::<MeasurementInvalid>().is_some());
    }

    #[test]
    fn injected_fault_fires_once() {
        let mut b = backend();
        b.with_world(|w| w.fail_next(FaultPoint::ArbiterOpen, 1));
        assert!(b.open_arbiter("/dev/i2c-1").is_err());
        assert!(b.open_arbiter("/dev/i2c-1").is_ok());
    }

    #[test]
    fn encoder_alternates_ready_and_not_ready() {
        let mut b = backend();
        let mut arb = b.open_arbiter("/dev/i2c-1").unwrap();
        arb.select_single(6).unwrap();
        let mut m = b.open_motor_controller("/dev/i2c-1").unwrap();
        m.set_motor_speeds(3, -3).unwrap();
        assert_eq!(m.encoder_positions().unwrap(), (3, -3));
        m.start_encoder_read().unwrap();
        let err = m.encoder_positions().unwrap_err();
        assert!(err.downcast_ref::<NotReady>().is_some());
    }

    #[test]
    fn forward_drive_closes_range() {
        let b = backend();
        b.with_world(|w| w.approach_ports = Some([1, 2, 3]));
        let mut vision = SimVision::new(&b);
        let frame = Frame {
            width: 640,
            height: 480,
            pixels: Vec::new(),
            captured_at: std::time::Instant::now(),
        };
        let _ = vision.find_target(&frame, "red");
        let wheels = SimWheels::new(&b);
        let fwd = WheelSpeeds {
            front_left: 10,
            front_right: 10,
            back_left: 10,
            back_right: 10,
        };
        wheels.set_wheel_speeds(fwd).unwrap();
        b.with_world(|w| {
            assert_eq!(w.ranges_mm[2], 580);
            assert_eq!(w.ranges_mm[1], 348);
        });
    }

    #[test]
    fn rotation_brings_target_into_view() {
        let b = backend();
        let mut vision = SimVision::new(&b);
        let frame = Frame {
            width: 640,
            height: 480,
            pixels: Vec::new(),
            captured_at: std::time::Instant::now(),
        };
        b.with_world(|w| w.heading_deg = 180.0);
        assert!(vision.find_target(&frame, "red").is_err());
        b.with_world(|w| w.heading_deg = 40.0);
        let s = vision.find_target(&frame, "red").unwrap();
        assert_eq!(s.x, 320);
    }
}
