//! Autonomous "visit four coloured targets" behaviour.
//!
//! [`NavigationEngine`] owns a dispatcher thread that receives control events
//! and starts or stops run threads. A run owns the rig (bus session, camera,
//! vision service, wheels) for its lifetime and hands it back when it ends,
//! so at most one run ever touches the devices.

pub mod drive;
pub mod run;
pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel as xch;
use rover_traits::{Clock, DeviceBackend, FrameSource, VisionService, WheelDrive};
use tracing::{debug, info, warn};

pub use drive::{DriveCommand, clamp_speed};
pub use run::{Rig, RunControl, RunOutcome, run_sequence};
pub use state::{Colour, NavigationState, Navigator, Phase, Step, TARGET_SEQUENCE};

use crate::config::NavigationCfg;

/// Discrete controls, typically mapped from a gamepad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Start,
    Stop,
    PauseToggle,
    Snapshot,
}

enum Command {
    Input(InputEvent),
    /// Stop and acknowledge once the run thread has exited.
    StopAndWait(xch::Sender<()>),
    Shutdown,
}

/// Cloneable sender for [`InputEvent`]s.
#[derive(Clone)]
pub struct EventSink {
    tx: xch::Sender<Command>,
}

impl EventSink {
    /// Queue an event. Returns `false` once the engine is gone.
    pub fn send(&self, event: InputEvent) -> bool {
        self.tx.send(Command::Input(event)).is_ok()
    }
}

#[derive(Default)]
struct Shared {
    running: AtomicBool,
    control: RunControl,
    last_outcome: Mutex<Option<RunOutcome>>,
}

pub struct NavigationEngine {
    tx: xch::Sender<Command>,
    shared: Arc<Shared>,
    join: Option<JoinHandle<()>>,
}

impl NavigationEngine {
    /// Spawn the dispatcher. Nothing moves until `start`.
    pub fn spawn<B, F, V, D, C>(rig: Rig<B, F, V, D>, cfg: NavigationCfg, clock: C) -> Self
    where
        B: DeviceBackend + Send + 'static,
        F: FrameSource + Send + 'static,
        V: VisionService + Send + 'static,
        D: WheelDrive + Send + 'static,
        C: Clock + Clone + Send + 'static,
    {
        let (tx, rx) = xch::bounded(16);
        let shared = Arc::new(Shared::default());
        let dispatcher = Dispatcher {
            rig: Some(rig),
            cfg,
            clock,
            shared: shared.clone(),
            active: None,
        };
        let join = std::thread::Builder::new()
            .name("nav-dispatch".into())
            .spawn(move || dispatcher.run(&rx));
        let join = match join {
            Ok(j) => Some(j),
            Err(e) => {
                warn!(error = %e, "failed to spawn navigation dispatcher");
                None
            }
        };
        Self { tx, shared, join }
    }

    pub fn start(&self) {
        self.send(InputEvent::Start);
    }

    /// Cancel the current run and block until it has exited.
    pub fn stop(&self) {
        let (ack_tx, ack_rx) = xch::bounded(1);
        if self.tx.send(Command::StopAndWait(ack_tx)).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    pub fn pause_or_resume(&self) {
        self.send(InputEvent::PauseToggle);
    }

    /// Save the next processed frame.
    pub fn request_snapshot(&self) {
        self.send(InputEvent::Snapshot);
    }

    pub fn events(&self) -> EventSink {
        EventSink {
            tx: self.tx.clone(),
        }
    }

    fn send(&self, event: InputEvent) {
        if self.tx.send(Command::Input(event)).is_err() {
            warn!(?event, "navigation dispatcher gone");
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.shared.control.paused.load(Ordering::Relaxed)
    }

    /// Targets reached by the current or most recent run.
    pub fn targets_reached(&self) -> usize {
        self.shared.control.reached.load(Ordering::Relaxed)
    }

    pub fn last_outcome(&self) -> Option<RunOutcome> {
        self.shared
            .last_outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop any run and join the dispatcher.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        let _ = self.tx.send(Command::Shutdown);
        if let Some(handle) = self.join.take() {
            if let Err(e) = handle.join() {
                warn!(?e, "navigation dispatcher panicked");
            }
        }
    }
}

impl Drop for NavigationEngine {
    fn drop(&mut self) {
        self.close();
    }
}

struct ActiveRun<R> {
    done: xch::Receiver<()>,
    join: JoinHandle<(R, RunOutcome)>,
}

struct Dispatcher<B, F, V, D, C> {
    /// `None` while a run holds it.
    rig: Option<Rig<B, F, V, D>>,
    cfg: NavigationCfg,
    clock: C,
    shared: Arc<Shared>,
    active: Option<ActiveRun<Rig<B, F, V, D>>>,
}

impl<B, F, V, D, C> Dispatcher<B, F, V, D, C>
where
    B: DeviceBackend + Send + 'static,
    F: FrameSource + Send + 'static,
    V: VisionService + Send + 'static,
    D: WheelDrive + Send + 'static,
    C: Clock + Clone + Send + 'static,
{
    fn run(mut self, rx: &xch::Receiver<Command>) {
        loop {
            let done = self
                .active
                .as_ref()
                .map_or_else(xch::never, |a| a.done.clone());
            xch::select! {
                recv(done) -> _ => self.reap(),
                recv(rx) -> cmd => match cmd {
                    Ok(Command::Input(event)) => self.handle(event),
                    Ok(Command::StopAndWait(ack)) => {
                        self.stop_run();
                        let _ = ack.send(());
                    }
                    Ok(Command::Shutdown) | Err(_) => {
                        self.stop_run();
                        debug!("navigation dispatcher exiting");
                        return;
                    }
                },
            }
        }
    }

    fn handle(&mut self, event: InputEvent) {
        debug!(?event, "input event");
        match event {
            InputEvent::Start => self.start_run(),
            InputEvent::Stop => self.stop_run(),
            InputEvent::PauseToggle => {
                let paused = !self.shared.control.paused.fetch_xor(true, Ordering::Relaxed);
                info!(paused, "pause toggled");
            }
            InputEvent::Snapshot => self.shared.control.snapshot.store(true, Ordering::Relaxed),
        }
    }

    fn start_run(&mut self) {
        if self.active.is_some() {
            info!("navigation already running");
            return;
        }
        let Some(mut rig) = self.rig.take() else {
            warn!("navigation rig unavailable after an earlier failure");
            return;
        };
        let ctl = &self.shared.control;
        ctl.cancel.store(false, Ordering::Relaxed);
        ctl.paused.store(false, Ordering::Relaxed);
        ctl.snapshot.store(false, Ordering::Relaxed);
        ctl.reached.store(0, Ordering::Relaxed);
        let ctl = ctl.clone();
        let cfg = self.cfg.clone();
        let clock = self.clock.clone();
        let (done_tx, done_rx) = xch::bounded(1);
        let spawned = std::thread::Builder::new()
            .name("nav-run".into())
            .spawn(move || {
                let outcome = run_sequence(&mut rig, &cfg, &ctl, &clock);
                let _ = done_tx.send(());
                (rig, outcome)
            });
        match spawned {
            Ok(join) => {
                self.shared.running.store(true, Ordering::Relaxed);
                self.active = Some(ActiveRun {
                    done: done_rx,
                    join,
                });
                info!("navigation started");
            }
            Err(e) => warn!(error = %e, "failed to spawn navigation run"),
        }
    }

    fn stop_run(&mut self) {
        if self.active.is_none() {
            debug!("navigation not running");
            return;
        }
        self.shared.control.cancel.store(true, Ordering::Relaxed);
        self.reap();
    }

    /// Join the finished (or cancelled) run and take the rig back.
    fn reap(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let outcome = match active.join.join() {
            Ok((rig, outcome)) => {
                self.rig = Some(rig);
                outcome
            }
            Err(_) => RunOutcome::Failed("navigation run panicked".to_string()),
        };
        match &outcome {
            RunOutcome::Completed => info!("navigation completed"),
            RunOutcome::Cancelled => info!("navigation stopped"),
            RunOutcome::Failed(reason) => warn!(%reason, "navigation run failed"),
        }
        self.shared.control.paused.store(false, Ordering::Relaxed);
        self.shared.running.store(false, Ordering::Relaxed);
        *self
            .shared
            .last_outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(outcome);
    }
}
