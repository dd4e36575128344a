//! `supervise` and `self-check`: the hardware supervisor on the selected backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eyre::WrapErr;
use rover_config::Config;
use rover_core::{ActuatorStore, HardwareSupervisor, RoverError, SupervisorCfg, SupervisorHandle};
use rover_hardware::{SimBackend, SimWorld};
use serde_json::json;
use tracing::info;

use crate::rt;

/// How long the first session may take to open every device.
const READY_TIMEOUT: Duration = Duration::from_secs(5);
const POLL: Duration = Duration::from_millis(50);

/// Simulated world wired the way the config says the robot is.
pub fn sim_world(cfg: &Config) -> SimWorld {
    let mut world = SimWorld::default();
    world.motor_port = cfg.bus.motor_port;
    world.others_port = cfg.bus.others_port;
    world.factory_address = cfg.supervisor.distance_default_address;
    world
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn spawn_supervisor(cfg: &Config, store: Arc<ActuatorStore>) -> SupervisorHandle {
    use rover_hardware::mux::BenchBackend;
    let backend = BenchBackend::new(SimBackend::new(sim_world(cfg)), cfg.bus.mux_address);
    HardwareSupervisor::new(backend, store, SupervisorCfg::from(cfg)).spawn()
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn spawn_supervisor(cfg: &Config, store: Arc<ActuatorStore>) -> SupervisorHandle {
    let backend = SimBackend::new(sim_world(cfg));
    HardwareSupervisor::new(backend, store, SupervisorCfg::from(cfg)).spawn()
}

fn start(cfg: &Config) -> eyre::Result<(SupervisorHandle, Arc<ActuatorStore>)> {
    let store = Arc::new(ActuatorStore::with_distance_enabled(
        cfg.supervisor.distance_enabled,
    ));
    let handle = spawn_supervisor(cfg, store.clone());
    if !handle.wait_ready(READY_TIMEOUT) {
        let sessions = handle.session_count();
        return Err(RoverError::State(format!(
            "devices did not come up within {}s ({sessions} session attempts)",
            READY_TIMEOUT.as_secs()
        ))
        .into());
    }
    Ok((handle, store))
}

pub fn run(
    cfg: &Config,
    duration_ms: Option<u64>,
    rt_mode: bool,
    rt_prio: Option<i32>,
    json_out: bool,
) -> eyre::Result<()> {
    rt::setup_rt_once(rt_mode, rt_prio);

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .wrap_err("install ctrl-c handler")?;

    let (handle, store) = start(cfg)?;
    info!(
        tick_ms = cfg.supervisor.tick_ms,
        duration_ms, "supervisor running; ctrl-c to stop"
    );

    let deadline = duration_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
    while !stop.load(Ordering::Relaxed) && deadline.is_none_or(|d| Instant::now() < d) {
        if !handle.is_running() {
            break;
        }
        std::thread::sleep(POLL);
    }

    let sessions = handle.session_count();
    handle.shutdown();
    print_snapshot(&store, sessions, json_out);
    Ok(())
}

/// One session opened, ticked and closed cleanly.
pub fn self_check(cfg: &Config, json_out: bool) -> eyre::Result<()> {
    let (handle, _store) = start(cfg)?;
    let sessions = handle.session_count();
    handle.shutdown();
    if json_out {
        println!("{}", json!({ "ok": true, "sessions": sessions }));
    } else {
        println!("self-check OK ({sessions} session(s))");
    }
    Ok(())
}

fn print_snapshot(store: &ActuatorStore, sessions: u64, json_out: bool) {
    // The supervisor is gone; a blocking read would never return.
    let distance = store.try_distance_readings();
    let power = store.power_readings();
    let encoders = store.encoder_positions();

    if json_out {
        let readings = distance.map(|d| {
            d.readings
                .iter()
                .map(|r| match r.error {
                    Some(_) => serde_json::Value::Null,
                    None => json!(r.distance_mm),
                })
                .collect::<Vec<_>>()
        });
        let rails: Vec<_> = power
            .iter()
            .map(|(idx, p)| {
                json!({
                    "monitor": idx,
                    "bus_voltage": p.bus_voltage,
                    "current": p.current,
                    "power": p.power,
                })
            })
            .collect();
        println!(
            "{}",
            json!({
                "sessions": sessions,
                "distance_mm": readings,
                "power": rails,
                "encoders": encoders,
            })
        );
        return;
    }

    println!("sessions: {sessions}");
    if let Some(distance) = distance {
        let text: Vec<String> = distance
            .readings
            .iter()
            .map(|r| match r.error {
                Some(_) => "invalid".to_string(),
                None => format!("{}mm", r.distance_mm),
            })
            .collect();
        println!("distance: {}", text.join(" "));
    } else {
        println!("distance: (no capture)");
    }
    for (idx, p) in &power {
        println!(
            "power[{idx}]: {:.2} V {:.3} A {:.2} W",
            p.bus_voltage, p.current, p.power
        );
    }
    if let Some((left, right)) = encoders {
        println!("encoders: {left} {right}");
    }
}
