#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the rover control core.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Every section is optional; missing keys fall back to the tuned defaults
//!   the robot shipped with.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Number of downstream ports on the bus multiplexer.
pub const BUS_PORTS: u8 = 8;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Bus {
    /// I2C adapter device node
    pub path: String,
    /// Multiplexer port wired to the motor controller
    pub motor_port: u8,
    /// Multiplexer port shared by the power monitors and the PWM driver
    pub others_port: u8,
    /// 7-bit address of the multiplexer itself (hardware builds only)
    pub mux_address: u16,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            path: "/dev/i2c-1".to_string(),
            motor_port: 6,
            others_port: 7,
            mux_address: 0x70,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Supervisor {
    pub tick_ms: u64,
    /// Minimum spacing between power telemetry polls
    pub power_interval_ms: u64,
    /// Initial state of distance sensing (can be toggled at runtime)
    pub distance_enabled: bool,
    /// One distance channel per listed multiplexer port, in reading order
    pub distance_ports: Vec<u8>,
    /// Factory address of the distance sensors
    pub distance_default_address: u8,
    /// Sensor on port `p` is moved to `distance_base_address + p`
    pub distance_base_address: u8,
}

impl Default for Supervisor {
    fn default() -> Self {
        Self {
            tick_ms: 25,
            power_interval_ms: 1000,
            distance_enabled: true,
            distance_ports: vec![0, 1, 2, 3, 4, 5],
            distance_default_address: 0x29,
            distance_base_address: 0x30,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
pub struct PowerMonitor {
    pub address: u8,
    pub shunt_ohms: f32,
    #[serde(default = "default_max_current_a")]
    pub max_current_a: f32,
}

fn default_max_current_a() -> f32 {
    10.0
}

fn default_power_monitors() -> Vec<PowerMonitor> {
    vec![
        PowerMonitor {
            address: 0x41,
            shunt_ohms: 0.1,
            max_current_a: 10.0,
        },
        // Motor rail carries more current through a smaller shunt.
        PowerMonitor {
            address: 0x44,
            shunt_ohms: 0.05,
            max_current_a: 10.0,
        },
    ]
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
#[serde(default)]
pub struct NavigationPorts {
    pub side_left: u8,
    pub front_left: u8,
    pub forward: u8,
    pub front_right: u8,
    pub side_right: u8,
}

impl Default for NavigationPorts {
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

impl NavigationPorts {
    pub fn as_array(&self) -> [u8; 5] {
        [
            self.side_left,
            self.front_left,
            self.forward,
            self.front_right,
            self.side_right,
        ]
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Navigation {
    pub fps: u32,
    pub rotate_speed: f64,
    pub slow_rotate_speed: f64,
    pub limit_speed: f64,
    pub forward_speed: f64,
    /// Pixel column of the camera's optical axis
    pub x_straight_ahead: i32,
    /// Half-width of the "centred" pixel window
    pub x_plus_or_minus: i32,
    /// Rotation per pixel of target offset while advancing
    pub direction_adjust_factor: f64,
    /// Sideways speed per mm of side-channel imbalance (0 = no correction)
    pub side_adjust_factor: f64,
    /// Consecutive centred sightings before advancing
    pub fix_confirmations: u32,
    pub forward_close_mm: u16,
    pub diagonal_close_mm: u16,
    pub pause_poll_ms: u64,
    /// Sensor sweeps taken before the first frame of a run
    pub priming_reads: u32,
    pub distance_default_address: u8,
    pub ports: NavigationPorts,
}

impl Default for Navigation {
    fn default() -> Self {
        Self {
            fps: 15,
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
            pause_poll_ms: 100,
            priming_reads: 5,
            distance_default_address: 0x29,
            ports: NavigationPorts::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub bus: Bus,
    #[serde(default)]
    pub supervisor: Supervisor,
    #[serde(default = "default_power_monitors")]
    pub power_monitors: Vec<PowerMonitor>,
    #[serde(default)]
    pub navigation: Navigation,
    #[serde(default)]
    pub logging: Logging,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bus: Bus::default(),
            supervisor: Supervisor::default(),
            power_monitors: default_power_monitors(),
            navigation: Navigation::default(),
            logging: Logging::default(),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn to_toml(&self) -> eyre::Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre::eyre!("serialize config: {e}"))
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Bus
        if self.bus.path.trim().is_empty() {
            eyre::bail!("bus.path must not be empty");
        }
        if self.bus.motor_port >= BUS_PORTS || self.bus.others_port >= BUS_PORTS {
            eyre::bail!("bus ports must be < {BUS_PORTS}");
        }
        if self.bus.motor_port == self.bus.others_port {
            eyre::bail!("bus.motor_port and bus.others_port must differ");
        }

        // Supervisor
        if self.supervisor.tick_ms == 0 {
            eyre::bail!("supervisor.tick_ms must be >= 1");
        }
        if self.supervisor.tick_ms > 1000 {
            eyre::bail!("supervisor.tick_ms is unreasonably large (>1s)");
        }
        if self.supervisor.power_interval_ms == 0 {
            eyre::bail!("supervisor.power_interval_ms must be >= 1");
        }
        check_ports("supervisor.distance_ports", &self.supervisor.distance_ports)?;
        if self
            .supervisor
            .distance_base_address
            .checked_add(BUS_PORTS)
            .is_none_or(|top| top > 0x78)
        {
            eyre::bail!("supervisor.distance_base_address leaves the 7-bit address range");
        }

        // Power monitors
        let mut seen = BTreeSet::new();
        for pm in &self.power_monitors {
            if !seen.insert(pm.address) {
                eyre::bail!("power_monitors: duplicate address {:#04x}", pm.address);
            }
            if pm.shunt_ohms <= 0.0 || !pm.shunt_ohms.is_finite() {
                eyre::bail!("power_monitors.shunt_ohms must be > 0");
            }
            if pm.max_current_a <= 0.0 || !pm.max_current_a.is_finite() {
                eyre::bail!("power_monitors.max_current_a must be > 0");
            }
        }

        // Navigation
        let nav = &self.navigation;
        if nav.fps == 0 {
            eyre::bail!("navigation.fps must be > 0");
        }
        if nav.pause_poll_ms == 0 {
            eyre::bail!("navigation.pause_poll_ms must be >= 1");
        }
        if nav.limit_speed <= 0.0 {
            eyre::bail!("navigation.limit_speed must be > 0");
        }
        if nav.rotate_speed < 0.0 || nav.slow_rotate_speed < 0.0 || nav.forward_speed < 0.0 {
            eyre::bail!("navigation speeds must be >= 0");
        }
        if nav.slow_rotate_speed > nav.rotate_speed {
            eyre::bail!("navigation.slow_rotate_speed must not exceed navigation.rotate_speed");
        }
        if nav.direction_adjust_factor < 0.0 || nav.side_adjust_factor < 0.0 {
            eyre::bail!("navigation adjust factors must be >= 0");
        }
        if nav.x_plus_or_minus < 0 {
            eyre::bail!("navigation.x_plus_or_minus must be >= 0");
        }
        if nav.fix_confirmations == 0 {
            eyre::bail!("navigation.fix_confirmations must be >= 1");
        }
        if nav.forward_close_mm == 0 || nav.diagonal_close_mm == 0 {
            eyre::bail!("navigation close thresholds must be > 0");
        }
        check_ports("navigation.ports", &nav.ports.as_array())?;

        Ok(())
    }
}

fn check_ports(what: &str, ports: &[u8]) -> eyre::Result<()> {
    let mut seen = BTreeSet::new();
    for &p in ports {
        if p >= BUS_PORTS {
            eyre::bail!("{what}: port {p} out of range (< {BUS_PORTS})");
        }
        if !seen.insert(p) {
            eyre::bail!("{what}: duplicate port {p}");
        }
    }
    Ok(())
}
