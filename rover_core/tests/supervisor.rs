//! Supervisor sessions against the simulated bus: steady state, skipped
//! peripherals and whole-session recovery.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use rover_core::{ActuatorStore, HardwareSupervisor, PwmTarget, ReadingError, SupervisorCfg};
use rover_hardware::{FaultPoint, PwmWrite, SimBackend, SimWorld};

fn fast_cfg() -> SupervisorCfg {
    SupervisorCfg {
        tick: Duration::from_millis(2),
        power_interval: Duration::from_millis(20),
        ..SupervisorCfg::default()
    }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn steady_state_publishes_and_applies() {
    let backend = SimBackend::default();
    backend.with_world(|w| w.ranges_mm[3] = 250);
    let store = Arc::new(ActuatorStore::new());
    store.set_servo(1, 30.0);
    store.set_motor_speeds(10, -10);

    let sup = HardwareSupervisor::new(backend.clone(), store.clone(), fast_cfg());
    let handle = sup.spawn();
    assert!(handle.wait_ready(WAIT));
    assert!(handle.wait_ready(Duration::ZERO), "readiness is sticky");

    let readings = store.current_distance_readings();
    assert_eq!(readings.readings.len(), 6);
    assert_eq!(readings.readings[3].distance_mm, 250);
    assert!(readings.capture_time.is_some());

    assert!(wait_until(WAIT, || store.power_readings().len() == 2));
    assert!(wait_until(WAIT, || store.encoder_positions().is_some()));
    assert!(wait_until(WAIT, || backend.with_world(|w| !w.pwm_writes.is_empty())));

    thread::sleep(Duration::from_millis(20));
    handle.shutdown();

    backend.with_world(|w| {
        assert_eq!(w.pwm_writes, vec![PwmWrite::Servo { port: 1, angle: 30.0 }]);
        // Unchanged speeds are written once per session.
        assert_eq!(w.motor_writes, vec![(10, -10)]);
        assert_eq!(w.arbiter_opens, 1);
        assert_eq!(w.arbiter_closes, 1);
        assert_eq!(w.pwm_closes, 1);
        assert_eq!(w.sensor_closes, 6);
        assert_eq!(w.readdressed_mask, 0x3f);
    });
}

#[test]
fn changed_targets_are_written_on_next_tick() {
    let backend = SimBackend::default();
    let store = Arc::new(ActuatorStore::new());
    let handle = HardwareSupervisor::new(backend.clone(), store.clone(), fast_cfg()).spawn();
    assert!(handle.wait_ready(WAIT));

    store.set_pwm(4, 0.75);
    store.set_motor_speeds(3, 3);
    assert!(wait_until(WAIT, || backend.with_world(|w| w
        .pwm_writes
        .contains(&PwmWrite::Pwm { port: 4, value: 0.75 }))));
    assert!(wait_until(WAIT, || backend.with_world(|w| w.motor_writes.last() == Some(&(3, 3)))));
    assert_eq!(store.pwm_target(4), Some(PwmTarget::RawPwm(0.75)));
    drop(handle);
}

#[test]
fn bus_failure_restarts_session_and_reapplies_state() {
    let backend = SimBackend::default();
    let store = Arc::new(ActuatorStore::new());
    store.set_servo(2, 90.0);
    store.set_motor_speeds(20, 20);

    let mut sup = HardwareSupervisor::new(backend.clone(), store.clone(), fast_cfg());
    let ready = sup.ready_signal();
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = shutdown.clone();
    let join = thread::spawn(move || {
        sup.run(&flag);
        sup.session_count()
    });

    assert!(ready.recv_timeout(WAIT).is_ok());
    assert!(wait_until(WAIT, || backend.with_world(|w| w.pwm_writes.len() == 1)));

    backend.with_world(|w| w.fail_next(FaultPoint::SensorRead, 1));
    assert!(wait_until(WAIT, || backend.with_world(|w| w.pwm_writes.len() == 2)));

    // Recovery does not signal readiness again.
    assert!(ready.recv_timeout(Duration::from_millis(50)).is_err());

    shutdown.store(true, Ordering::Relaxed);
    let sessions = join.join().expect("supervisor thread");
    assert_eq!(sessions, 2);

    backend.with_world(|w| {
        assert_eq!(w.pending_faults(FaultPoint::SensorRead), 0);
        assert_eq!(w.pwm_writes[0], w.pwm_writes[1]);
        assert_eq!(w.motor_writes, vec![(20, 20), (20, 20)]);
        assert_eq!(w.arbiter_opens, 2);
        assert_eq!(w.arbiter_closes, 2);
        assert_eq!(w.sensor_closes, 12);
    });
}

#[test]
fn failed_setup_releases_what_was_opened() {
    let backend = SimBackend::default();
    backend.with_world(|w| w.fail_next(FaultPoint::PwmConfigure, 2));
    let store = Arc::new(ActuatorStore::new());
    let handle = HardwareSupervisor::new(backend.clone(), store, fast_cfg()).spawn();
    assert!(handle.wait_ready(WAIT));
    assert_eq!(handle.session_count(), 3);

    backend.with_world(|w| {
        assert_eq!(w.arbiter_opens, 3);
        assert_eq!(w.arbiter_closes, 2);
        // The unconfigured driver is still closed on the way out.
        assert_eq!(w.pwm_closes, 2);
        assert_eq!(w.motor_closes, 2);
    });
    handle.shutdown();
}

#[test]
fn missing_power_monitor_is_skipped() {
    let mut world = SimWorld::default();
    world.remove_rail(0x44);
    let backend = SimBackend::new(world);
    let store = Arc::new(ActuatorStore::new());
    let handle = HardwareSupervisor::new(backend, store.clone(), fast_cfg()).spawn();
    assert!(handle.wait_ready(WAIT));
    assert!(wait_until(WAIT, || !store.power_readings().is_empty()));
    thread::sleep(Duration::from_millis(50));

    let readings = store.power_readings();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0].0, 0);
    assert!((readings[0].1.bus_voltage - 12.1).abs() < 1e-6);
    assert_eq!(handle.session_count(), 1);
}

#[test]
fn invalid_measurement_is_reported_per_channel() {
    let backend = SimBackend::default();
    backend.with_world(|w| w.invalid_mask = 1 << 2);
    let store = Arc::new(ActuatorStore::new());
    let handle = HardwareSupervisor::new(backend, store.clone(), fast_cfg()).spawn();
    assert!(handle.wait_ready(WAIT));

    let r = store.current_distance_readings();
    assert_eq!(r.readings[2].error, Some(ReadingError::MeasurementInvalid));
    assert_eq!(r.readings[2].distance_mm, 0);
    assert_eq!(r.readings[1].error, None);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(handle.session_count(), 1);
}

#[test]
fn distance_sensing_can_be_disabled() {
    let backend = SimBackend::default();
    let store = Arc::new(ActuatorStore::with_distance_enabled(false));
    let handle = HardwareSupervisor::new(backend, store.clone(), fast_cfg()).spawn();
    assert!(handle.wait_ready(WAIT));
    thread::sleep(Duration::from_millis(30));
    assert!(store.try_distance_readings().is_none());

    store.set_distance_enabled(true);
    assert!(wait_until(WAIT, || store.try_distance_readings().is_some()));
}

#[test]
fn sensors_keep_their_assigned_address_across_sessions() {
    let backend = SimBackend::default();
    // Already moved by an earlier process.
    backend.with_world(|w| w.readdressed_mask = 0x3f);
    let store = Arc::new(ActuatorStore::new());
    let handle = HardwareSupervisor::new(backend, store, fast_cfg()).spawn();
    assert!(handle.wait_ready(WAIT));
    assert_eq!(handle.session_count(), 1);
}
