//! Hardware supervisor: keeps one device session alive at a fixed tick rate
//! and rebuilds it from scratch whenever anything on the bus fails.
//!
//! Each tick reads the distance sensors, writes changed motor speeds, polls
//! the encoders, writes dirty PWM/servo ports and (at a slower cadence) reads
//! the power monitors. Only the supervisor thread touches device handles; the
//! rest of the process goes through [`ActuatorStore`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use eyre::WrapErr;
use rover_traits::{
    BoxError, BusArbiter, Clock, DeviceBackend, DistanceSensor, MonotonicClock, MotorController,
    PowerMonitor, PwmDriver,
};
use tracing::{debug, info, trace, warn};

use crate::config::SupervisorCfg;
use crate::error::Result;
use crate::hw_error::{Fault, classify, failed};
use crate::session::Session;
use crate::store::{ActuatorStore, DistanceReadings, PowerReading, PwmTarget, Reading, ReadingError};

pub const RECOVERY_BANNER: &str = "===== !!! WARNING !!! BUS FAILURE; TRYING TO RECOVER =====";

pub struct HardwareSupervisor<B: DeviceBackend, C: Clock = MonotonicClock> {
    backend: B,
    store: Arc<ActuatorStore>,
    cfg: SupervisorCfg,
    clock: C,
    /// Taken on the first steady-state entry; later sessions find it empty.
    ready: Option<xch::Sender<()>>,
    ready_rx: xch::Receiver<()>,
    sessions: Arc<AtomicU64>,
}

/// Per-session bookkeeping that must not survive a recovery.
#[derive(Debug, Default)]
struct TickState {
    last_motors: Option<(i8, i8)>,
    last_power: Option<Instant>,
}

impl<B: DeviceBackend> HardwareSupervisor<B, MonotonicClock> {
    pub fn new(backend: B, store: Arc<ActuatorStore>, cfg: SupervisorCfg) -> Self {
        Self::with_clock(backend, store, cfg, MonotonicClock::new())
    }
}

impl<B: DeviceBackend, C: Clock> HardwareSupervisor<B, C> {
    pub fn with_clock(backend: B, store: Arc<ActuatorStore>, cfg: SupervisorCfg, clock: C) -> Self {
        let (tx, rx) = xch::bounded(1);
        Self {
            backend,
            store,
            cfg,
            clock,
            ready: Some(tx),
            ready_rx: rx,
            sessions: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn store(&self) -> &Arc<ActuatorStore> {
        &self.store
    }

    /// Receives one message the first time any session reaches its tick loop.
    pub fn ready_signal(&self) -> xch::Receiver<()> {
        self.ready_rx.clone()
    }

    /// Sessions started so far, including the current one.
    pub fn session_count(&self) -> u64 {
        self.sessions.load(Ordering::Relaxed)
    }

    /// Run sessions back to back until `shutdown` is raised. A failed session
    /// is logged and immediately replaced; there is no retry limit.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!(tick_ms = self.cfg.tick.as_millis() as u64, "supervisor started");
        while !shutdown.load(Ordering::Relaxed) {
            let n = self.sessions.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(session = n, "starting hardware session");
            if let Err(e) = self.run_session(shutdown) {
                if shutdown.load(Ordering::Relaxed) {
                    debug!(error = %e, "session ended during shutdown");
                    break;
                }
                warn!(session = n, error = %format!("{e:#}"), "hardware session failed");
                warn!("{RECOVERY_BANNER}");
            }
        }
        info!(sessions = self.session_count(), "supervisor stopped");
    }

    /// Open one session and tick it until cancelled (`Ok`) or until a device
    /// call fails (`Err`). Handles are closed on both paths.
    pub fn run_session(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let mut session = Session::open(&mut self.backend, &self.cfg).wrap_err("session setup failed")?;
        // Hardware may have lost its programmed state.
        self.store.mark_all_dirty();
        if let Some(tx) = self.ready.take() {
            let _ = tx.try_send(());
            info!("hardware initialised");
        }

        let mut state = TickState::default();
        let mut next = self.clock.now() + self.cfg.tick;
        while !shutdown.load(Ordering::Relaxed) {
            self.clock.sleep_until(next);
            let now = self.clock.now();
            next += self.cfg.tick;
            if next < now {
                // Fell behind; drop the missed ticks instead of bursting.
                next = now + self.cfg.tick;
            }
            self.tick(&mut session, &mut state, now).wrap_err("tick failed")?;
        }
        Ok(())
    }

    fn tick(&self, s: &mut Session<B>, state: &mut TickState, now: Instant) -> Result<()> {
        if self.store.distance_enabled() {
            let readings = self.read_distances(s)?;
            self.store.publish_distance(readings);
        }
        self.drive_motors(s, state)?;
        self.poll_encoders(s)?;
        self.write_pwm(s)?;
        self.poll_power(s, state, now);
        Ok(())
    }

    fn read_distances(&self, s: &mut Session<B>) -> Result<DistanceReadings> {
        s.arbiter
            .select_multiple(self.cfg.distance_mask())
            .map_err(failed("select distance sensors"))?;
        let mut readings = Vec::with_capacity(s.rangers.len());
        for ranger in &mut s.rangers {
            let reading = match ranger.next_measurement() {
                Ok(mm) => Reading {
                    distance_mm: mm,
                    error: None,
                },
                Err(e) if classify(e.as_ref()) == Fault::MeasurementInvalid => Reading {
                    distance_mm: 0,
                    error: Some(ReadingError::MeasurementInvalid),
                },
                Err(e) => return Err(failed("read distance sensor")(e)),
            };
            readings.push(reading);
        }
        trace!(?readings, "distance readings");
        Ok(DistanceReadings {
            capture_time: Some(self.clock.now()),
            readings,
        })
    }

    fn drive_motors(&self, s: &mut Session<B>, state: &mut TickState) -> Result<()> {
        // The encoder poll below talks to the controller too.
        s.arbiter
            .select_single(self.cfg.motor_port)
            .map_err(failed("select motor port"))?;
        let wanted = self.store.motor_speeds();
        if state.last_motors == Some(wanted) {
            return Ok(());
        }
        if let Some(motors) = s.motors.as_mut() {
            motors
                .set_motor_speeds(wanted.0, wanted.1)
                .map_err(failed("write motor speeds"))?;
            debug!(left = wanted.0, right = wanted.1, "motor speeds applied");
            state.last_motors = Some(wanted);
        }
        Ok(())
    }

    fn poll_encoders(&self, s: &mut Session<B>) -> Result<()> {
        let Some(motors) = s.motors.as_mut() else {
            return Ok(());
        };
        match motors.encoder_positions() {
            Ok(positions) => {
                trace!(?positions, "encoder positions");
                self.store.publish_encoders(positions);
                motors
                    .start_encoder_read()
                    .map_err(failed("start encoder read"))?;
            }
            Err(e) if classify(e.as_ref()) == Fault::NotReady => {}
            Err(e) => warn!(error = %e, "encoder read failed"),
        }
        Ok(())
    }

    fn write_pwm(&self, s: &mut Session<B>) -> Result<()> {
        let dirty = self.store.take_dirty();
        s.arbiter
            .select_single(self.cfg.others_port)
            .map_err(failed("select others port"))?;
        let Some(pwm) = s.pwm.as_mut() else {
            return Ok(());
        };
        for (port, target) in dirty {
            let written = match target {
                PwmTarget::ServoAngle(angle) => pwm.set_servo(port, angle),
                PwmTarget::RawPwm(value) => pwm.set_pwm(port, value),
            };
            written.map_err(failed("write pwm port"))?;
            trace!(port, ?target, "pwm target applied");
        }
        Ok(())
    }

    /// Runs after `write_pwm`, which leaves the others port selected.
    fn poll_power(&self, s: &mut Session<B>, state: &mut TickState, now: Instant) {
        if state
            .last_power
            .is_some_and(|t| now.saturating_duration_since(t) < self.cfg.power_interval)
        {
            return;
        }
        state.last_power = Some(now);
        for (index, monitor) in &mut s.power {
            match read_power(monitor, now) {
                Ok(r) => {
                    debug!(
                        monitor = *index,
                        volts = r.bus_voltage,
                        amps = r.current,
                        watts = r.power,
                        "power reading"
                    );
                    self.store.publish_power(*index, r);
                }
                Err(e) => debug!(monitor = *index, error = %e, "power read failed; skipping this cycle"),
            }
        }
    }
}

fn read_power<P: PowerMonitor>(monitor: &mut P, now: Instant) -> std::result::Result<PowerReading, BoxError> {
    Ok(PowerReading {
        bus_voltage: monitor.bus_voltage()?,
        current: monitor.current()?,
        power: monitor.power()?,
        read_at: now,
    })
}

impl<B, C> HardwareSupervisor<B, C>
where
    B: DeviceBackend + Send + 'static,
    C: Clock + Send + 'static,
{
    /// Run the supervisor on its own thread.
    pub fn spawn(mut self) -> SupervisorHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let ready = self.ready_signal();
        let sessions = self.sessions.clone();
        let flag = shutdown.clone();
        let join = std::thread::Builder::new()
            .name("hw-supervisor".into())
            .spawn(move || self.run(&flag));
        let join = match join {
            Ok(j) => Some(j),
            Err(e) => {
                warn!(error = %e, "failed to spawn supervisor thread");
                None
            }
        };
        SupervisorHandle {
            shutdown,
            ready,
            ready_seen: AtomicBool::new(false),
            sessions,
            join,
        }
    }
}

/// Owner of a supervisor thread. Dropping it cancels and joins the thread.
pub struct SupervisorHandle {
    shutdown: Arc<AtomicBool>,
    ready: xch::Receiver<()>,
    ready_seen: AtomicBool,
    sessions: Arc<AtomicU64>,
    join: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// Wait for the first session to reach its tick loop. Returns `false` on
    /// timeout or when the supervisor stopped before that.
    pub fn wait_ready(&self, timeout: Duration) -> bool {
        if self.ready_seen.load(Ordering::Relaxed) {
            return true;
        }
        let ok = self.ready.recv_timeout(timeout).is_ok();
        if ok {
            self.ready_seen.store(true, Ordering::Relaxed);
        }
        ok
    }

    pub fn session_count(&self) -> u64 {
        self.sessions.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Cancel the loop and wait for the current session to close.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join.take() {
            match handle.join() {
                Ok(()) => trace!("supervisor thread joined"),
                Err(e) => warn!(?e, "supervisor thread panicked"),
            }
        }
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
