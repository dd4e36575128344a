//! One hardware session: every device handle the supervisor holds between a
//! successful setup and the next failure or shutdown.
//!
//! Handles are released in `Drop`, so every exit path (setup failure halfway
//! through, a failed tick, cancellation) closes exactly what was opened.

use eyre::WrapErr;
use rover_traits::{BusArbiter, DeviceBackend, DistanceSensor, MotorController, PowerMonitor, PwmDriver};
use tracing::{debug, info, warn};

use crate::config::SupervisorCfg;
use crate::error::Result;
use crate::hw_error::{failed, open_failed};

pub(crate) struct Session<B: DeviceBackend> {
    pub(crate) arbiter: B::Arbiter,
    others_port: u8,
    pub(crate) motors: Option<B::Motors>,
    pub(crate) rangers: Vec<B::Ranger>,
    /// Open monitors with their index in the configured list.
    pub(crate) power: Vec<(usize, B::Power)>,
    pub(crate) pwm: Option<B::Pwm>,
}

impl<B: DeviceBackend> Session<B> {
    pub(crate) fn open(backend: &mut B, cfg: &SupervisorCfg) -> Result<Self> {
        let arbiter = backend
            .open_arbiter(&cfg.bus_path)
            .map_err(open_failed("bus arbiter"))?;
        let mut session = Self {
            arbiter,
            others_port: cfg.others_port,
            motors: None,
            rangers: Vec::with_capacity(cfg.distance_ports.len()),
            power: Vec::new(),
            pwm: None,
        };

        session
            .arbiter
            .select_single(cfg.motor_port)
            .map_err(failed("select motor port"))?;
        session.motors = Some(
            backend
                .open_motor_controller(&cfg.bus_path)
                .map_err(open_failed("motor controller"))?,
        );

        for &port in &cfg.distance_ports {
            session
                .arbiter
                .select_single(port)
                .map_err(failed("select distance sensor port"))?;
            let mut ranger = open_ranger(backend, cfg, port)
                .wrap_err_with(|| format!("distance sensor on port {port}"))?;
            let started = ranger.start_continuous();
            // Keep it so Drop closes it even when starting failed.
            session.rangers.push(ranger);
            started.map_err(failed("start continuous measurement"))?;
        }

        session
            .arbiter
            .select_single(cfg.others_port)
            .map_err(failed("select others port"))?;
        for (index, pm) in cfg.power_monitors.iter().enumerate() {
            let opened = backend
                .open_power_monitor(&cfg.bus_path, pm.address)
                .and_then(|mut m| m.configure(pm.shunt_ohms, pm.max_current_a).map(|()| m));
            match opened {
                Ok(m) => session.power.push((index, m)),
                Err(e) => warn!(
                    error = %e,
                    address = format_args!("{:#04x}", pm.address),
                    "power monitor unavailable; skipping for this session"
                ),
            }
        }
        session.pwm = Some(
            backend
                .open_pwm_driver(&cfg.bus_path)
                .map_err(open_failed("pwm driver"))?,
        );
        if let Some(pwm) = session.pwm.as_mut() {
            pwm.configure().map_err(failed("configure pwm driver"))?;
        }

        info!(
            distance_channels = session.rangers.len(),
            power_monitors = session.power.len(),
            "hardware session open"
        );
        Ok(session)
    }
}

/// Move the sensor off the factory address; if it no longer answers there it
/// was moved by an earlier session.
fn open_ranger<B: DeviceBackend>(backend: &mut B, cfg: &SupervisorCfg, port: u8) -> Result<B::Ranger> {
    let assigned = cfg.distance_address(port);
    match backend.open_distance_sensor(&cfg.bus_path, cfg.distance_default_address, Some(assigned)) {
        Ok(r) => Ok(r),
        Err(first) => {
            debug!(port, error = %first, "factory address silent; trying assigned address");
            backend
                .open_distance_sensor(&cfg.bus_path, assigned, None)
                .map_err(open_failed("distance sensor"))
        }
    }
}

impl<B: DeviceBackend> Drop for Session<B> {
    fn drop(&mut self) {
        if let Some(mut pwm) = self.pwm.take() {
            // The driver only answers while its port is routed.
            match self.arbiter.select_single(self.others_port) {
                Ok(()) => {
                    if let Err(e) = pwm.close() {
                        warn!(error = %e, "closing pwm driver failed");
                    }
                }
                Err(e) => warn!(error = %e, "could not route pwm driver for close"),
            }
        }
        for mut ranger in self.rangers.drain(..) {
            if let Err(e) = ranger.close() {
                warn!(error = %e, "closing distance sensor failed");
            }
        }
        if let Some(mut motors) = self.motors.take() {
            if let Err(e) = motors.close() {
                warn!(error = %e, "closing motor controller failed");
            }
        }
        if let Err(e) = self.arbiter.close() {
            warn!(error = %e, "closing bus arbiter failed");
        }
        debug!("hardware session closed");
    }
}
