//! `From` implementations bridging `rover_config` types to `rover_core` types.

use std::time::Duration;

use crate::config::{NavPorts, NavigationCfg, PowerMonitorCfg, SupervisorCfg, TuningCfg};

// ── SupervisorCfg ────────────────────────────────────────────────────────────

impl From<&rover_config::PowerMonitor> for PowerMonitorCfg {
    fn from(c: &rover_config::PowerMonitor) -> Self {
        Self {
            address: c.address,
            shunt_ohms: c.shunt_ohms,
            max_current_a: c.max_current_a,
        }
    }
}

impl From<&rover_config::Config> for SupervisorCfg {
    fn from(c: &rover_config::Config) -> Self {
        let s = &c.supervisor;
        Self {
            bus_path: c.bus.path.clone(),
            motor_port: c.bus.motor_port,
            others_port: c.bus.others_port,
            tick: Duration::from_millis(s.tick_ms),
            power_interval: Duration::from_millis(s.power_interval_ms),
            distance_enabled: s.distance_enabled,
            distance_ports: s.distance_ports.clone(),
            distance_default_address: s.distance_default_address,
            distance_base_address: s.distance_base_address,
            power_monitors: c.power_monitors.iter().map(PowerMonitorCfg::from).collect(),
        }
    }
}

// ── NavigationCfg ────────────────────────────────────────────────────────────

impl From<&rover_config::NavigationPorts> for NavPorts {
    fn from(c: &rover_config::NavigationPorts) -> Self {
        Self {
            side_left: c.side_left,
            front_left: c.front_left,
            forward: c.forward,
            front_right: c.front_right,
            side_right: c.side_right,
        }
    }
}

impl From<&rover_config::Navigation> for TuningCfg {
    fn from(c: &rover_config::Navigation) -> Self {
        Self {
            rotate_speed: c.rotate_speed,
            slow_rotate_speed: c.slow_rotate_speed,
            limit_speed: c.limit_speed,
            forward_speed: c.forward_speed,
            x_straight_ahead: c.x_straight_ahead,
            x_plus_or_minus: c.x_plus_or_minus,
            direction_adjust_factor: c.direction_adjust_factor,
            side_adjust_factor: c.side_adjust_factor,
            fix_confirmations: c.fix_confirmations,
            forward_close_mm: c.forward_close_mm,
            diagonal_close_mm: c.diagonal_close_mm,
        }
    }
}

impl From<&rover_config::Config> for NavigationCfg {
    fn from(c: &rover_config::Config) -> Self {
        let n = &c.navigation;
        Self {
            bus_path: c.bus.path.clone(),
            fps: n.fps,
            pause_poll: Duration::from_millis(n.pause_poll_ms),
            priming_reads: n.priming_reads,
            distance_default_address: n.distance_default_address,
            ports: NavPorts::from(&n.ports),
            tuning: TuningCfg::from(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_agree_with_schema_defaults() {
        let cfg = rover_config::Config::default();
        let sup = SupervisorCfg::from(&cfg);
        let want = SupervisorCfg::default();
        assert_eq!(sup.tick, want.tick);
        assert_eq!(sup.distance_ports, want.distance_ports);
        assert_eq!(sup.power_monitors, want.power_monitors);

        let nav = NavigationCfg::from(&cfg);
        assert_eq!(nav.fps, 15);
        assert_eq!(nav.ports, NavPorts::default());
        assert_eq!(nav.tuning.fix_confirmations, 2);
    }

    #[test]
    fn distance_mask_covers_configured_ports() {
        let sup = SupervisorCfg::default();
        assert_eq!(sup.distance_mask(), 0x3f);
        assert_eq!(sup.distance_address(4), 0x34);
    }
}
