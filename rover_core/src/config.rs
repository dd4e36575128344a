//! Runtime configuration for the supervisor and the navigation engine.
//!
//! These are separate from the TOML-deserialized schema in `rover_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

/// One power monitor the supervisor tries to bring up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerMonitorCfg {
    pub address: u8,
    pub shunt_ohms: f32,
    pub max_current_a: f32,
}

#[derive(Debug, Clone)]
pub struct SupervisorCfg {
    pub bus_path: String,
    pub motor_port: u8,
    /// Port shared by the power monitors and the PWM driver.
    pub others_port: u8,
    pub tick: Duration,
    /// Minimum spacing between power telemetry polls.
    pub power_interval: Duration,
    /// Whether distance sensing starts enabled.
    pub distance_enabled: bool,
    /// One distance channel per port, in reading order.
    pub distance_ports: Vec<u8>,
    pub distance_default_address: u8,
    pub distance_base_address: u8,
    pub power_monitors: Vec<PowerMonitorCfg>,
}

impl Default for SupervisorCfg {
    fn default() -> Self {
        Self {
            bus_path: "/dev/i2c-1".to_string(),
            motor_port: 6,
            others_port: 7,
            tick: Duration::from_millis(25),
            power_interval: Duration::from_secs(1),
            distance_enabled: true,
            distance_ports: vec![0, 1, 2, 3, 4, 5],
            distance_default_address: 0x29,
            distance_base_address: 0x30,
            power_monitors: vec![
                PowerMonitorCfg {
                    address: 0x41,
                    shunt_ohms: 0.1,
                    max_current_a: 10.0,
                },
                PowerMonitorCfg {
                    address: 0x44,
                    shunt_ohms: 0.05,
                    max_current_a: 10.0,
                },
            ],
        }
    }
}

impl SupervisorCfg {
    /// Arbiter mask routing every distance sensor at once.
    pub fn distance_mask(&self) -> u8 {
        self.distance_ports
            .iter()
            .fold(0u8, |mask, &p| mask | 1u8.checked_shl(u32::from(p)).unwrap_or(0))
    }

    /// Address the sensor on `port` is moved to.
    pub fn distance_address(&self, port: u8) -> u8 {
        self.distance_base_address.wrapping_add(port)
    }
}

/// Bus ports of the five navigation sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavPorts {
    pub side_left: u8,
    pub front_left: u8,
    pub forward: u8,
    pub front_right: u8,
    pub side_right: u8,
}

impl Default for NavPorts {
    fn default() -> Self {
        Self {
            side_left: 0,
            front_left: 1,
            forward: 2,
            front_right: 3,
            side_right: 4,
        }
    }
}

impl NavPorts {
    /// Ports in channel order: side-left, front-left, forward, front-right, side-right.
    pub fn in_order(&self) -> [u8; 5] {
        [
            self.side_left,
            self.front_left,
            self.forward,
            self.front_right,
            self.side_right,
        ]
    }
}

/// Steering and approach tuning.
#[derive(Debug, Clone)]
pub struct TuningCfg {
    pub rotate_speed: f64,
    /// Used while the target is in view but not yet confirmed ahead.
    pub slow_rotate_speed: f64,
    /// Wheel speeds are clamped to `±limit_speed`.
    pub limit_speed: f64,
    pub forward_speed: f64,
    pub x_straight_ahead: i32,
    pub x_plus_or_minus: i32,
    pub direction_adjust_factor: f64,
    /// Sideways speed per millimetre of side-channel imbalance; 0 disables it.
    pub side_adjust_factor: f64,
    /// Consecutive centred sightings before the robot drives at the target.
    pub fix_confirmations: u32,
    pub forward_close_mm: u16,
    pub diagonal_close_mm: u16,
}

impl Default for TuningCfg {
    fn default() -> Self {
        Self {
            rotate_speed: 8.0,
            slow_rotate_speed: 5.0,
            limit_speed: 80.0,
            forward_speed: 5.0,
            x_straight_ahead: 320,
            x_plus_or_minus: 80,
            direction_adjust_factor: 0.08,
            side_adjust_factor: 0.0,
            fix_confirmations: 2,
            forward_close_mm: 110,
            diagonal_close_mm: 70,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NavigationCfg {
    pub bus_path: String,
    pub fps: u32,
    pub pause_poll: Duration,
    /// Sensor sweeps taken before the first frame of a run.
    pub priming_reads: u32,
    pub distance_default_address: u8,
    pub ports: NavPorts,
    pub tuning: TuningCfg,
}

impl Default for NavigationCfg {
    fn default() -> Self {
        Self {
            bus_path: "/dev/i2c-1".to_string(),
            fps: 15,
            pause_poll: Duration::from_millis(100),
            priming_reads: 5,
            distance_default_address: 0x29,
            ports: NavPorts::default(),
            tuning: TuningCfg::default(),
        }
    }
}

impl NavigationCfg {
    pub fn frame_period(&self) -> Duration {
        Duration::from_micros(crate::util::period_us(self.fps))
    }
}
