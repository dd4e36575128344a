//! Four-wheel speed mapping.

use rover_traits::{BoxError, WheelDrive, WheelSpeeds};

use crate::store::ActuatorStore;

/// Body-frame motion request. Positive rotation turns left.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DriveCommand {
    pub forward: f64,
    pub sideways: f64,
    pub rotation: f64,
}

impl DriveCommand {
    pub const STOP: Self = Self {
        forward: 0.0,
        sideways: 0.0,
        rotation: 0.0,
    };

    pub fn rotate(rotation: f64) -> Self {
        Self {
            rotation,
            ..Self::STOP
        }
    }

    /// Mix into per-wheel speeds, each clamped to `±limit`.
    pub fn wheel_speeds(self, limit: f64) -> WheelSpeeds {
        let Self {
            forward: f,
            sideways: s,
            rotation: r,
        } = self;
        WheelSpeeds {
            front_left: clamp_speed(f - s - r, limit),
            front_right: clamp_speed(f + s + r, limit),
            back_left: clamp_speed(f + s - r, limit),
            back_right: clamp_speed(f - s + r, limit),
        }
    }
}

/// Clamp to `±limit`, then to the `i8` range. Float-to-int `as` saturates at
/// the integer bounds and maps NaN to 0.
pub fn clamp_speed(value: f64, limit: f64) -> i8 {
    let limit = limit.abs();
    value.max(-limit).min(limit) as i8
}

/// Differential mix-down: each side runs at the mean of its two wheels.
///
/// Lets a navigation run steer a rover whose motors belong to a running
/// [`HardwareSupervisor`](crate::HardwareSupervisor): hand the engine an
/// `Arc<ActuatorStore>` as its drive and the supervisor applies the speeds
/// on its next tick. The `rover` binary drives the simulated wheels directly
/// and does not wire this up.
impl WheelDrive for ActuatorStore {
    fn set_wheel_speeds(&self, speeds: WheelSpeeds) -> Result<(), BoxError> {
        let left = mean(speeds.front_left, speeds.back_left);
        let right = mean(speeds.front_right, speeds.back_right);
        self.set_motor_speeds(left, right);
        Ok(())
    }
}

fn mean(a: i8, b: i8) -> i8 {
    // Mean of two i8 always fits.
    ((i16::from(a) + i16::from(b)) / 2) as i8
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn straight_ahead_drives_all_wheels_equally() {
        let w = DriveCommand {
            forward: 10.0,
            ..DriveCommand::STOP
        }
        .wheel_speeds(80.0);
        assert_eq!(
            w,
            WheelSpeeds {
                front_left: 10,
                front_right: 10,
                back_left: 10,
                back_right: 10
            }
        );
    }

    #[test]
    fn rotation_spins_diagonals_against_each_other() {
        let w = DriveCommand::rotate(8.0).wheel_speeds(80.0);
        assert_eq!((w.front_left, w.back_right), (-8, 8));
        assert_eq!((w.front_right, w.back_left), (8, -8));
    }

    #[test]
    fn limit_applies_before_integer_range() {
        assert_eq!(clamp_speed(500.0, 80.0), 80);
        assert_eq!(clamp_speed(-500.0, 80.0), -80);
        assert_eq!(clamp_speed(500.0, 1000.0), i8::MAX);
        assert_eq!(clamp_speed(-500.0, 1000.0), i8::MIN);
        assert_eq!(clamp_speed(f64::NAN, 80.0), 0);
    }

    #[test]
    fn store_receives_side_averages() {
        let store = ActuatorStore::new();
        store
            .set_wheel_speeds(WheelSpeeds {
                front_left: 10,
                front_right: -8,
                back_left: 20,
                back_right: 8,
            })
            .unwrap();
        assert_eq!(store.motor_speeds(), (15, 0));
        store
            .set_wheel_speeds(WheelSpeeds {
                front_left: i8::MIN,
                front_right: i8::MAX,
                back_left: i8::MIN,
                back_right: i8::MAX,
            })
            .unwrap();
        assert_eq!(store.motor_speeds(), (i8::MIN, i8::MAX));
    }

    proptest! {
        #[test]
        fn wheels_never_exceed_limit(
            f in -1e6f64..1e6,
            s in -1e6f64..1e6,
            r in -1e6f64..1e6,
            limit in 1.0f64..200.0,
        ) {
            let w = DriveCommand { forward: f, sideways: s, rotation: r }.wheel_speeds(limit);
            for v in [w.front_left, w.front_right, w.back_left, w.back_right] {
                prop_assert!(f64::from(v).abs() <= limit.min(128.0));
            }
        }
    }
}
