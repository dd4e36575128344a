//! One navigation run: from `start` until the sequence completes, the run is
//! cancelled, or a device fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rover_traits::{
    BusArbiter, Clock, DeviceBackend, DistanceSensor, FrameSource, VisionService, WheelDrive,
    WheelSpeeds,
};
use tracing::{debug, info, trace, warn};

use super::state::{Navigator, TARGET_SEQUENCE};
use crate::config::NavigationCfg;
use crate::error::Result;
use crate::filter::DistanceFilter;
use crate::hw_error::{Fault, classify, failed, open_failed};
use crate::util::whole_periods;

/// Back-off when the camera has no frame ready.
const NO_FRAME_WAIT: Duration = Duration::from_millis(1);

/// Everything a run drives: its own bus session, the camera, the vision
/// service and the wheels.
pub struct Rig<B, F, V, D> {
    pub backend: B,
    pub camera: F,
    pub vision: V,
    pub drive: D,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// All targets reached.
    Completed,
    Cancelled,
    /// A device failed; the reason is the error chain.
    Failed(String),
}

/// Flags shared between a run and whoever controls it.
#[derive(Debug, Clone, Default)]
pub struct RunControl {
    pub cancel: Arc<AtomicBool>,
    pub paused: Arc<AtomicBool>,
    pub snapshot: Arc<AtomicBool>,
    pub reached: Arc<AtomicUsize>,
}

impl RunControl {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// The five navigation sensors behind a dedicated arbiter, closed on drop.
struct SensorSession<B: DeviceBackend> {
    arbiter: B::Arbiter,
    channels: Vec<(u8, B::Ranger)>,
}

impl<B: DeviceBackend> SensorSession<B> {
    fn open(backend: &mut B, cfg: &NavigationCfg) -> Result<Self> {
        let arbiter = backend
            .open_arbiter(&cfg.bus_path)
            .map_err(open_failed("bus arbiter"))?;
        let mut session = Self {
            arbiter,
            channels: Vec::with_capacity(5),
        };
        for port in cfg.ports.in_order() {
            session
                .arbiter
                .select_single(port)
                .map_err(failed("select distance sensor port"))?;
            let mut ranger = backend
                .open_distance_sensor(&cfg.bus_path, cfg.distance_default_address, None)
                .map_err(open_failed("distance sensor"))?;
            let started = ranger.start_continuous();
            session.channels.push((port, ranger));
            started.map_err(failed("start continuous measurement"))?;
        }
        Ok(session)
    }

    /// One sweep over every channel. Invalid measurements count as "nothing
    /// seen".
    fn read_into(&mut self, filters: &mut [DistanceFilter; 5]) -> Result<()> {
        for ((port, ranger), filter) in self.channels.iter_mut().zip(filters.iter_mut()) {
            self.arbiter
                .select_single(*port)
                .map_err(failed("select distance sensor port"))?;
            let mm = match ranger.next_measurement() {
                Ok(mm) => mm,
                Err(e) if classify(e.as_ref()) == Fault::MeasurementInvalid => 0,
                Err(e) => return Err(failed("read distance sensor")(e)),
            };
            filter.accumulate(mm);
        }
        Ok(())
    }
}

impl<B: DeviceBackend> Drop for SensorSession<B> {
    fn drop(&mut self) {
        for (port, mut ranger) in self.channels.drain(..) {
            if let Err(e) = ranger.close() {
                warn!(port, error = %e, "closing distance sensor failed");
            }
        }
        if let Err(e) = self.arbiter.close() {
            warn!(error = %e, "closing bus arbiter failed");
        }
    }
}

/// Drive one run to its end and leave the wheels at rest.
pub fn run_sequence<B, F, V, D, C>(
    rig: &mut Rig<B, F, V, D>,
    cfg: &NavigationCfg,
    ctl: &RunControl,
    clock: &C,
) -> RunOutcome
where
    B: DeviceBackend,
    F: FrameSource,
    V: VisionService,
    D: WheelDrive,
    C: Clock,
{
    let outcome = match drive_sequence(rig, cfg, ctl, clock) {
        Ok(outcome) => outcome,
        Err(e) => RunOutcome::Failed(format!("{e:#}")),
    };
    if let Err(e) = rig.drive.set_wheel_speeds(WheelSpeeds::STOP) {
        warn!(error = %e, "could not stop wheels");
    }
    outcome
}

fn drive_sequence<B, F, V, D, C>(
    rig: &mut Rig<B, F, V, D>,
    cfg: &NavigationCfg,
    ctl: &RunControl,
    clock: &C,
) -> Result<RunOutcome>
where
    B: DeviceBackend,
    F: FrameSource,
    V: VisionService,
    D: WheelDrive,
    C: Clock,
{
    let mut sensors = SensorSession::open(&mut rig.backend, cfg)?;
    let mut filters: [DistanceFilter; 5] = Default::default();
    for _ in 0..cfg.priming_reads {
        if ctl.cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        sensors.read_into(&mut filters)?;
    }

    let mut nav = Navigator::new(cfg.tuning.clone());
    let frame_period = cfg.frame_period();
    let min_frame_gap = Duration::from_secs(1) / (cfg.fps.max(1) + 1);
    let started = clock.now();
    let mut target_started = started;
    let mut last_frame: Option<Instant> = None;
    let mut frames_read: u64 = 0;
    let mut snapshots: u32 = 0;
    info!(colour = %TARGET_SEQUENCE[0], "run started");

    while let Some(colour) = nav.current_target() {
        if ctl.cancelled() {
            return Ok(RunOutcome::Cancelled);
        }
        if ctl.paused.load(Ordering::Relaxed) {
            nav.set_paused(true);
            let paused_at = clock.now();
            while ctl.paused.load(Ordering::Relaxed) {
                if ctl.cancelled() {
                    return Ok(RunOutcome::Cancelled);
                }
                rig.drive
                    .set_wheel_speeds(WheelSpeeds::STOP)
                    .map_err(failed("stop wheels"))?;
                clock.sleep(cfg.pause_poll);
            }
            nav.resume(clock.now().saturating_duration_since(paused_at));
            // Time spent paused is not lag behind the camera.
            last_frame = None;
        }

        if let Some(last) = last_frame {
            let skip = whole_periods(clock.now().saturating_duration_since(last), frame_period);
            if skip > 0 {
                debug!(skip, "behind the camera; dropping frames");
                rig.camera.grab(skip).map_err(failed("grab frames"))?;
            }
        }
        let Some(frame) = rig.camera.read().map_err(failed("read frame"))? else {
            trace!("no frame");
            clock.sleep(NO_FRAME_WAIT);
            continue;
        };
        let now = clock.now();
        if let Some(last) = last_frame {
            if now.saturating_duration_since(last) < min_frame_gap {
                debug!("loop running faster than the camera");
            }
        }
        last_frame = Some(now);
        frames_read += 1;

        if ctl.snapshot.swap(false, Ordering::Relaxed) {
            snapshots += 1;
            match rig.camera.save_snapshot(&frame, snapshots) {
                Ok(()) => info!(index = snapshots, "snapshot saved"),
                Err(e) => warn!(error = %e, "snapshot failed"),
            }
        }

        let sighting = match rig.vision.find_target(&frame, colour.name()) {
            Ok(s) => Some(s),
            Err(e) => {
                if classify(e.as_ref()) != Fault::TargetNotFound {
                    debug!(error = %e, "vision service failed");
                }
                None
            }
        };
        nav.observe(sighting);
        sensors.read_into(&mut filters)?;

        // First second after start: sensors settle, wheels stay put.
        if frames_read <= u64::from(cfg.fps) {
            continue;
        }

        let step = nav.step(now, &filters);
        if let Some(reached) = step.reached {
            ctl.reached.fetch_add(1, Ordering::Relaxed);
            info!(
                colour = %reached,
                target_ms = now.saturating_duration_since(target_started).as_millis() as u64,
                total_ms = now.saturating_duration_since(started).as_millis() as u64,
                "target reached"
            );
            target_started = now;
            if let Some(next) = nav.current_target() {
                info!(colour = %next, "next target");
            }
        }
        if let Some(wheels) = step.wheels {
            rig.drive
                .set_wheel_speeds(wheels)
                .map_err(failed("set wheel speeds"))?;
        }
    }
    info!(
        total_ms = clock.now().saturating_duration_since(started).as_millis() as u64,
        "all targets reached"
    );
    Ok(RunOutcome::Completed)
}
