//! Target-approach state machine.
//!
//! `Navigator` is pure: it is fed sightings and filtered distances together
//! with the current time and answers with wheel commands. The run loop owns
//! it, so no locking is involved.

use std::fmt;
use std::time::{Duration, Instant};

use rover_traits::{Sighting, WheelSpeeds};
use tracing::{debug, info};

use super::drive::DriveCommand;
use crate::config::TuningCfg;
use crate::filter::DistanceFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colour {
    Red,
    Blue,
    Yellow,
    Green,
}

impl Colour {
    /// Name the vision service knows the colour by.
    pub fn name(self) -> &'static str {
        match self {
            Colour::Red => "red",
            Colour::Blue => "blue",
            Colour::Yellow => "yellow",
            Colour::Green => "green",
        }
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Order in which targets are visited.
pub const TARGET_SEQUENCE: [Colour; 4] = [Colour::Red, Colour::Blue, Colour::Yellow, Colour::Green];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Rotating,
    Advancing,
    Reversing,
}

// Channel order of the filters handed to `Navigator::step`.
pub const SIDE_LEFT: usize = 0;
pub const FRONT_LEFT: usize = 1;
pub const FORWARD: usize = 2;
pub const FRONT_RIGHT: usize = 3;
pub const SIDE_RIGHT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    pub target_index: usize,
    pub phase: Phase,
    pub ball_fixed: bool,
    pub rough_direction_count: u32,
    pub ball_x: i32,
    pub perceived_size: i32,
    pub ball_in_view: bool,
    pub advance_start: Option<Instant>,
    pub advance_duration: Duration,
    /// Whether the target was fixed when reversing began.
    pub approach_succeeded: bool,
    pub paused: bool,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            target_index: 0,
            phase: Phase::Rotating,
            ball_fixed: false,
            rough_direction_count: 0,
            ball_x: 0,
            perceived_size: 0,
            ball_in_view: false,
            advance_start: None,
            advance_duration: Duration::ZERO,
            approach_succeeded: false,
            paused: false,
        }
    }
}

/// Result of one [`Navigator::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Step {
    /// Wheel command to issue, if any.
    pub wheels: Option<WheelSpeeds>,
    /// Target completed during this step.
    pub reached: Option<Colour>,
}

#[derive(Debug, Clone)]
pub struct Navigator {
    tuning: TuningCfg,
    state: NavigationState,
}

impl Navigator {
    pub fn new(tuning: TuningCfg) -> Self {
        Self {
            tuning,
            state: NavigationState::default(),
        }
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn current_target(&self) -> Option<Colour> {
        TARGET_SEQUENCE.get(self.state.target_index).copied()
    }

    pub fn is_finished(&self) -> bool {
        self.state.target_index >= TARGET_SEQUENCE.len()
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.state.paused = paused;
    }

    /// Leave a pause that lasted `paused_for`.
    ///
    /// The advance/reverse clock is shifted by the pause so time spent
    /// stopped is not charged to the current phase.
    pub fn resume(&mut self, paused_for: Duration) {
        if let Some(started) = self.state.advance_start {
            self.state.advance_start = Some(started + paused_for);
        }
        self.state.paused = false;
    }

    fn centred(&self, x: i32) -> bool {
        (x - self.tuning.x_straight_ahead).abs() <= self.tuning.x_plus_or_minus
    }

    /// Feed the vision result for the current frame.
    pub fn observe(&mut self, sighting: Option<Sighting>) {
        let centred = sighting.is_some_and(|s| self.centred(s.x));
        let st = &mut self.state;
        match sighting {
            Some(s) => {
                st.ball_x = s.x;
                st.perceived_size = s.radius;
                st.ball_in_view = true;
                if centred {
                    st.rough_direction_count += 1;
                    st.ball_fixed = true;
                } else {
                    st.rough_direction_count = 0;
                }
            }
            None => {
                st.ball_in_view = false;
                st.ball_fixed = false;
                st.rough_direction_count = 0;
            }
        }
    }

    /// Start over on the current target.
    fn reset_target(&mut self) {
        let st = &mut self.state;
        st.phase = Phase::Rotating;
        st.ball_fixed = false;
        st.rough_direction_count = 0;
        st.ball_in_view = false;
        st.advance_start = None;
        st.advance_duration = Duration::ZERO;
        st.approach_succeeded = false;
    }

    /// Advance the phase machine. Paused or finished navigators only ever
    /// command a stop.
    pub fn step(&mut self, now: Instant, filters: &[DistanceFilter; 5]) -> Step {
        if self.state.paused || self.is_finished() {
            return Step {
                wheels: Some(WheelSpeeds::STOP),
                reached: None,
            };
        }
        let mut reached = None;

        if self.state.phase == Phase::Reversing {
            let started = self.state.advance_start.unwrap_or(now);
            if now.saturating_duration_since(started) < self.state.advance_duration {
                return Step::default();
            }
            let succeeded = self.state.approach_succeeded;
            let colour = self.current_target();
            self.reset_target();
            if succeeded {
                self.state.target_index += 1;
                reached = colour;
                if self.is_finished() {
                    return Step {
                        wheels: Some(WheelSpeeds::STOP),
                        reached,
                    };
                }
            } else {
                info!(colour = ?colour, "approach failed; searching again");
            }
        }

        if self.state.phase == Phase::Rotating {
            if self.state.rough_direction_count < self.tuning.fix_confirmations {
                let speed = if self.state.ball_in_view {
                    self.tuning.slow_rotate_speed
                } else {
                    self.tuning.rotate_speed
                };
                return Step {
                    wheels: Some(DriveCommand::rotate(speed).wheel_speeds(self.tuning.limit_speed)),
                    reached,
                };
            }
            debug!(x = self.state.ball_x, "target fixed; advancing");
            self.state.phase = Phase::Advancing;
            self.state.advance_start = Some(now);
        }

        // Advancing.
        if self.state.ball_fixed && !self.close_enough(filters) {
            let cmd = DriveCommand {
                forward: self.tuning.forward_speed,
                sideways: self.sideways_correction(filters),
                rotation: self.tuning.direction_adjust_factor
                    * f64::from(self.tuning.x_straight_ahead - self.state.ball_x),
            };
            return Step {
                wheels: Some(cmd.wheel_speeds(self.tuning.limit_speed)),
                reached,
            };
        }
        let started = self.state.advance_start.unwrap_or(now);
        self.state.advance_duration = now.saturating_duration_since(started);
        self.state.advance_start = Some(now);
        self.state.approach_succeeded = self.state.ball_fixed;
        self.state.phase = Phase::Reversing;
        debug!(
            advance_ms = self.state.advance_duration.as_millis() as u64,
            succeeded = self.state.approach_succeeded,
            "reversing"
        );
        let back = DriveCommand {
            forward: -self.tuning.forward_speed,
            ..DriveCommand::STOP
        };
        Step {
            wheels: Some(back.wheel_speeds(self.tuning.limit_speed)),
            reached,
        }
    }

    /// Forward channel within reach and both diagonals close.
    pub fn close_enough(&self, filters: &[DistanceFilter; 5]) -> bool {
        let near = |f: &DistanceFilter, max: u16| !f.is_far() && f.best_guess() <= max;
        near(&filters[FORWARD], self.tuning.forward_close_mm)
            && near(&filters[FRONT_LEFT], self.tuning.diagonal_close_mm)
            && near(&filters[FRONT_RIGHT], self.tuning.diagonal_close_mm)
    }

    /// Positive moves left. Pushes away from the nearer side wall; only when
    /// both side channels have a near reading.
    fn sideways_correction(&self, filters: &[DistanceFilter; 5]) -> f64 {
        let (left, right) = (&filters[SIDE_LEFT], &filters[SIDE_RIGHT]);
        if left.is_far() || right.is_far() {
            return 0.0;
        }
        self.tuning.side_adjust_factor * (f64::from(left.best_guess()) - f64::from(right.best_guess()))
    }
}
