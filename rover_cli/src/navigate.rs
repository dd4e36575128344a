//! `navigate`: the navigation engine on the simulated rig, driven from stdin.

use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel as xch;
use eyre::WrapErr;
use rover_config::Config;
use rover_core::{InputEvent, NavigationCfg, NavigationEngine, Rig, RoverError, RunOutcome};
use rover_hardware::{SimBackend, SimCamera, SimVision, SimWheels};
use rover_traits::MonotonicClock;
use serde_json::json;
use tracing::{info, warn};

use crate::supervise::sim_world;

const POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Event(InputEvent),
    Quit,
}

fn parse_line(line: &str) -> Option<Line> {
    match line.trim().to_ascii_lowercase().as_str() {
        "start" => Some(Line::Event(InputEvent::Start)),
        "stop" => Some(Line::Event(InputEvent::Stop)),
        "pause" => Some(Line::Event(InputEvent::PauseToggle)),
        "snap" => Some(Line::Event(InputEvent::Snapshot)),
        "quit" | "exit" => Some(Line::Quit),
        _ => None,
    }
}

/// Forward stdin lines until EOF; the channel disconnects when stdin closes.
fn spawn_stdin_reader() -> eyre::Result<xch::Receiver<String>> {
    let (tx, rx) = xch::unbounded();
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .wrap_err("spawn stdin reader")?;
    Ok(rx)
}

pub fn run(cfg: &Config, max_ms: Option<u64>, auto: bool, json_out: bool) -> eyre::Result<()> {
    let nav_cfg = NavigationCfg::from(cfg);
    let ports = nav_cfg.ports;
    let mut world = sim_world(cfg);
    world.factory_address = nav_cfg.distance_default_address;
    world.approach_ports = Some([ports.front_left, ports.forward, ports.front_right]);
    let backend = SimBackend::new(world);
    let rig = Rig {
        backend: backend.clone(),
        camera: SimCamera::new(&backend, nav_cfg.fps),
        vision: SimVision::new(&backend),
        drive: SimWheels::new(&backend),
    };

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
        .wrap_err("install ctrl-c handler")?;

    let engine = NavigationEngine::spawn(rig, nav_cfg, MonotonicClock::new());
    let events = engine.events();
    if auto {
        engine.start();
    } else {
        info!("commands: start | stop | pause | snap | quit");
    }

    let input = spawn_stdin_reader()?;
    let mut stdin_open = true;
    let deadline = max_ms.map(|ms| Instant::now() + Duration::from_millis(ms));
    loop {
        if stop.load(Ordering::Relaxed) || deadline.is_some_and(|d| Instant::now() >= d) {
            break;
        }
        if auto && !engine.is_running() && engine.last_outcome().is_some() {
            break;
        }

        let lines = if stdin_open {
            input.clone()
        } else {
            xch::never()
        };
        let msg = xch::select! {
            recv(lines) -> msg => Some(msg),
            default(POLL) => None,
        };
        match msg {
            None => {}
            Some(Ok(line)) => match parse_line(&line) {
                Some(Line::Event(event)) => {
                    if !events.send(event) {
                        break;
                    }
                }
                Some(Line::Quit) => break,
                None if line.trim().is_empty() => {}
                None => warn!(command = %line.trim(), "unknown command"),
            },
            Some(Err(_)) => {
                // stdin closed: without --auto nothing else can start a run
                if !auto {
                    break;
                }
                stdin_open = false;
            }
        }
    }

    engine.stop();
    let outcome = engine.last_outcome();
    let reached = engine.targets_reached();
    let snapshots = backend.with_world(|w| w.snapshots.len());
    engine.shutdown();

    let label = match &outcome {
        None => "none".to_string(),
        Some(RunOutcome::Completed) => "completed".to_string(),
        Some(RunOutcome::Cancelled) => "cancelled".to_string(),
        Some(RunOutcome::Failed(reason)) => format!("failed: {reason}"),
    };
    if json_out {
        println!(
            "{}",
            json!({ "outcome": label, "targets_reached": reached, "snapshots": snapshots })
        );
    } else {
        println!("outcome: {label}");
        println!("targets reached: {reached}");
    }

    match outcome {
        Some(RunOutcome::Failed(reason)) => Err(RoverError::Hardware(reason).into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_line("start"), Some(Line::Event(InputEvent::Start)));
        assert_eq!(parse_line("  PAUSE \n"), Some(Line::Event(InputEvent::PauseToggle)));
        assert_eq!(parse_line("snap"), Some(Line::Event(InputEvent::Snapshot)));
        assert_eq!(parse_line("quit"), Some(Line::Quit));
        assert_eq!(parse_line("fly"), None);
    }
}
