//! Desired actuator state and the latest published sensor snapshots.
//!
//! One mutex guards everything so no caller ever sees half of an update. The
//! supervisor's tick loop is the only reader that talks to hardware; other
//! threads only go through the methods here.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval of [`ActuatorStore::current_distance_readings`].
pub const READINGS_POLL: Duration = Duration::from_millis(10);

/// What a PWM driver port should be driven to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PwmTarget {
    ServoAngle(f64),
    RawPwm(f64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadingError {
    /// Sensor answered with an unusable sample.
    MeasurementInvalid,
}

/// One distance channel's latest value. `distance_mm` is 0 whenever `error`
/// is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reading {
    pub distance_mm: u16,
    pub error: Option<ReadingError>,
}

/// All distance channels captured in one tick, in configured port order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistanceReadings {
    /// `None` until the first capture.
    pub capture_time: Option<Instant>,
    pub readings: Vec<Reading>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerReading {
    pub bus_voltage: f32,
    pub current: f32,
    pub power: f32,
    pub read_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    motor_left: i8,
    motor_right: i8,
    pwm_targets: BTreeMap<u8, PwmTarget>,
    dirty: BTreeSet<u8>,
    distance_enabled: bool,
    distance: DistanceReadings,
    power: BTreeMap<usize, PowerReading>,
    encoders: Option<(i32, i32)>,
}

#[derive(Debug)]
pub struct ActuatorStore {
    inner: Mutex<Inner>,
}

impl Default for ActuatorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorStore {
    /// Empty store with distance sensing enabled.
    pub fn new() -> Self {
        Self::with_distance_enabled(true)
    }

    pub fn with_distance_enabled(enabled: bool) -> Self {
        Self {
            inner: Mutex::new(Inner {
                distance_enabled: enabled,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_motor_speeds(&self, left: i8, right: i8) {
        let mut g = self.lock();
        g.motor_left = left;
        g.motor_right = right;
    }

    pub fn motor_speeds(&self) -> (i8, i8) {
        let g = self.lock();
        (g.motor_left, g.motor_right)
    }

    pub fn set_servo(&self, port: u8, angle: f64) {
        self.set_target(port, PwmTarget::ServoAngle(angle));
    }

    pub fn set_pwm(&self, port: u8, value: f64) {
        self.set_target(port, PwmTarget::RawPwm(value));
    }

    fn set_target(&self, port: u8, target: PwmTarget) {
        let mut g = self.lock();
        g.pwm_targets.insert(port, target);
        g.dirty.insert(port);
    }

    pub fn pwm_target(&self, port: u8) -> Option<PwmTarget> {
        self.lock().pwm_targets.get(&port).copied()
    }

    /// Current value of every dirty port, clearing the dirty set in the same
    /// critical section.
    pub fn take_dirty(&self) -> Vec<(u8, PwmTarget)> {
        let mut g = self.lock();
        let dirty = std::mem::take(&mut g.dirty);
        dirty
            .into_iter()
            .filter_map(|port| g.pwm_targets.get(&port).map(|&t| (port, t)))
            .collect()
    }

    /// Mark every tracked port dirty so a fresh session re-applies it.
    pub fn mark_all_dirty(&self) {
        let mut g = self.lock();
        let ports: Vec<u8> = g.pwm_targets.keys().copied().collect();
        g.dirty.extend(ports);
    }

    pub fn set_distance_enabled(&self, enabled: bool) {
        self.lock().distance_enabled = enabled;
    }

    pub fn distance_enabled(&self) -> bool {
        self.lock().distance_enabled
    }

    /// Replace the published reading set.
    pub fn publish_distance(&self, readings: DistanceReadings) {
        self.lock().distance = readings;
    }

    /// Latest reading set, or `None` before the first capture.
    pub fn try_distance_readings(&self) -> Option<DistanceReadings> {
        let g = self.lock();
        g.distance.capture_time.map(|_| g.distance.clone())
    }

    /// Latest reading set, blocking until one has been captured.
    pub fn current_distance_readings(&self) -> DistanceReadings {
        loop {
            if let Some(r) = self.try_distance_readings() {
                return r;
            }
            thread::sleep(READINGS_POLL);
        }
    }

    /// Like [`Self::current_distance_readings`] but gives up once `cancel`
    /// is raised.
    pub fn wait_distance_readings(&self, cancel: &AtomicBool) -> Option<DistanceReadings> {
        loop {
            if let Some(r) = self.try_distance_readings() {
                return Some(r);
            }
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            thread::sleep(READINGS_POLL);
        }
    }

    pub fn publish_power(&self, monitor: usize, reading: PowerReading) {
        self.lock().power.insert(monitor, reading);
    }

    /// Latest reading per monitor index, ordered by index.
    pub fn power_readings(&self) -> Vec<(usize, PowerReading)> {
        self.lock().power.iter().map(|(&i, &r)| (i, r)).collect()
    }

    pub fn publish_encoders(&self, positions: (i32, i32)) {
        self.lock().encoders = Some(positions);
    }

    pub fn encoder_positions(&self) -> Option<(i32, i32)> {
        self.lock().encoders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_snapshot_keeps_latest_value_per_port() {
        let store = ActuatorStore::new();
        store.set_servo(1, 10.0);
        store.set_pwm(2, 0.5);
        store.set_pwm(1, 0.25);
        store.set_servo(2, -30.0);
        assert_eq!(
            store.take_dirty(),
            vec![(1, PwmTarget::RawPwm(0.25)), (2, PwmTarget::ServoAngle(-30.0))]
        );
        assert!(store.take_dirty().is_empty());
    }

    #[test]
    fn mark_all_dirty_restores_every_target() {
        let store = ActuatorStore::new();
        store.set_servo(3, 45.0);
        store.set_pwm(0, 1.0);
        let _ = store.take_dirty();
        store.mark_all_dirty();
        assert_eq!(store.take_dirty().len(), 2);
    }

    #[test]
    fn readings_absent_until_first_capture() {
        let store = ActuatorStore::new();
        assert!(store.try_distance_readings().is_none());
        store.publish_distance(DistanceReadings {
            capture_time: Some(Instant::now()),
            readings: vec![Reading {
                distance_mm: 120,
                error: None,
            }],
        });
        let r = store.try_distance_readings().expect("published");
        assert_eq!(r.readings[0].distance_mm, 120);
    }

    #[test]
    fn current_readings_wait_for_first_publish() {
        let store = std::sync::Arc::new(ActuatorStore::new());
        let reader = {
            let store = store.clone();
            thread::spawn(move || store.current_distance_readings())
        };
        thread::sleep(Duration::from_millis(30));
        assert!(!reader.is_finished(), "returned before any capture");

        let published = DistanceReadings {
            capture_time: Some(Instant::now()),
            readings: vec![
                Reading {
                    distance_mm: 640,
                    error: None,
                },
                Reading {
                    distance_mm: 0,
                    error: Some(ReadingError::MeasurementInvalid),
                },
            ],
        };
        store.publish_distance(published.clone());
        assert_eq!(reader.join().expect("reader panicked"), published);
    }

    #[test]
    fn wait_gives_up_on_cancel() {
        let store = ActuatorStore::new();
        let cancel = AtomicBool::new(true);
        assert!(store.wait_distance_readings(&cancel).is_none());
    }
}
