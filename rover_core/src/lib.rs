#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Rover control core (hardware-agnostic).
//!
//! All device access goes through the collaborator traits in `rover_traits`.
//!
//! ## Architecture
//!
//! - **Filter**: three-sample median per distance channel (`filter`)
//! - **Store**: desired actuator values plus published sensor snapshots, one
//!   lock for all of it (`store`)
//! - **Supervisor**: fixed-rate device session with whole-session recovery
//!   (`supervisor`, `session`)
//! - **Navigation**: target-seeking phase machine, run loop and input
//!   dispatcher (`navigation`)
//! - **Errors**: trait-boundary classification (`hw_error`) and the typed
//!   `RoverError` (`error`)

pub mod config;
pub mod conversions;
pub mod error;
pub mod filter;
pub mod hw_error;
pub mod navigation;
mod session;
pub mod store;
pub mod supervisor;
pub mod util;

pub use config::{NavPorts, NavigationCfg, PowerMonitorCfg, SupervisorCfg, TuningCfg};
pub use error::{Report, Result, RoverError};
pub use filter::DistanceFilter;
pub use navigation::{EventSink, InputEvent, NavigationEngine, Rig, RunOutcome};
pub use store::{ActuatorStore, DistanceReadings, PowerReading, PwmTarget, Reading, ReadingError};
pub use supervisor::{HardwareSupervisor, RECOVERY_BANNER, SupervisorHandle};
