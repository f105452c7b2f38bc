//! Draggable modal sheet used by the listing editor.
//!
//! The controller is a frame-driven state machine: the host forwards gestures
//! and calls [`SheetController::tick`] once per frame with the elapsed time.
//! The offset is measured downward from the fully open position, so `0.0` is
//! open and `container_height` is off-screen. Invalid calls are silent no-ops.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::SheetConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SheetState {
    Closed,
    Opening,
    Open,
    Dragging { offset: f64 },
    Closing,
}

impl SheetState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::Open => "open",
            Self::Dragging { .. } => "dragging",
            Self::Closing => "closing",
        }
    }
}

/// Reported by [`SheetController::tick`] when an animation finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetSettled {
    Opened,
    /// Spring brought a short drag back to the open position.
    Returned,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SheetSnapshot {
    pub state: SheetState,
    pub offset: f64,
    pub visible: bool,
}

// Spring is considered at rest below these.
const REST_DISTANCE: f64 = 0.5;
const REST_VELOCITY: f64 = 0.5;
const SPRING_STEP_SECS: f64 = 0.001;
const MAX_SPRING_STEPS: u32 = 10_000;

#[derive(Debug, Clone, PartialEq)]
enum Motion {
    Tween {
        from: f64,
        to: f64,
        elapsed: Duration,
        duration: Duration,
    },
    /// Unit-mass spring; clamps at the target instead of overshooting.
    Spring {
        position: f64,
        velocity: f64,
        target: f64,
        tension: f64,
        friction: f64,
        at_rest: bool,
    },
}

impl Motion {
    fn tween(from: f64, to: f64, duration: Duration) -> Self {
        Self::Tween {
            from,
            to,
            elapsed: Duration::ZERO,
            duration,
        }
    }

    fn target(&self) -> f64 {
        match self {
            Self::Tween { to, .. } => *to,
            Self::Spring { target, .. } => *target,
        }
    }

    fn is_done(&self) -> bool {
        match self {
            Self::Tween {
                elapsed, duration, ..
            } => elapsed >= duration,
            Self::Spring { at_rest, .. } => *at_rest,
        }
    }

    /// Advance by `dt` and return the new position.
    fn advance(&mut self, dt: Duration) -> f64 {
        match self {
            Self::Tween {
                from,
                to,
                elapsed,
                duration,
            } => {
                *elapsed = (*elapsed + dt).min(*duration);
                if duration.is_zero() {
                    return *to;
                }
                let t = elapsed.as_secs_f64() / duration.as_secs_f64();
                *from + (*to - *from) * ease_in_out_cubic(t)
            }
            Self::Spring {
                position,
                velocity,
                target,
                tension,
                friction,
                at_rest,
            } => {
                if *at_rest {
                    return *target;
                }
                let total = dt.as_secs_f64();
                let steps = ((total / SPRING_STEP_SECS).ceil() as u32).clamp(1, MAX_SPRING_STEPS);
                let h = total / f64::from(steps);
                for _ in 0..steps {
                    let before = *position - *target;
                    let accel = -*tension * before - *friction * *velocity;
                    *velocity += accel * h;
                    *position += *velocity * h;
                    let after = *position - *target;
                    let crossed = after == 0.0 || (before != 0.0 && before.signum() != after.signum());
                    let resting = after.abs() < REST_DISTANCE && velocity.abs() < REST_VELOCITY;
                    if crossed || resting {
                        *position = *target;
                        *velocity = 0.0;
                        *at_rest = true;
                        break;
                    }
                }
                *position
            }
        }
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(3) / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct SheetController {
    config: SheetConfig,
    state: SheetState,
    offset: f64,
    motion: Option<Motion>,
}

impl Default for SheetController {
    fn default() -> Self {
        Self::new(SheetConfig::default())
    }
}

impl SheetController {
    pub fn new(config: SheetConfig) -> Self {
        Self {
            config,
            state: SheetState::Closed,
            offset: 0.0,
            motion: None,
        }
    }

    pub fn state(&self) -> SheetState {
        self.state
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Sheet content is rendered whenever the sheet is not closed.
    pub fn is_visible(&self) -> bool {
        self.state != SheetState::Closed
    }

    pub fn is_animating(&self) -> bool {
        self.motion.is_some()
    }

    pub fn config(&self) -> &SheetConfig {
        &self.config
    }

    pub fn snapshot(&self) -> SheetSnapshot {
        SheetSnapshot {
            state: self.state,
            offset: self.offset,
            visible: self.is_visible(),
        }
    }

    pub fn open(&mut self) {
        if self.state != SheetState::Closed {
            debug!(state = self.state.name(), "open ignored");
            return;
        }
        self.offset = self.config.container_height;
        self.motion = Some(Motion::tween(
            self.offset,
            0.0,
            self.config.open_duration(),
        ));
        self.transition(SheetState::Opening);
    }

    pub fn on_drag_move(&mut self, dy: f64) {
        if !dy.is_finite() {
            warn!(dy, "ignoring non-finite drag move");
            return;
        }
        if !matches!(self.state, SheetState::Open | SheetState::Dragging { .. }) {
            return;
        }
        // A new drag takes over from a return spring still in flight.
        self.motion = None;
        self.offset = dy.max(0.0);
        let offset = self.offset;
        self.transition(SheetState::Dragging { offset });
    }

    pub fn on_drag_release(&mut self, dy: f64) {
        if !matches!(self.state, SheetState::Dragging { .. }) {
            return;
        }
        let dy = if dy.is_finite() {
            dy
        } else {
            warn!(dy, "non-finite drag release, using last offset");
            self.offset
        };
        if dy > self.config.dismiss_threshold {
            self.start_close(self.config.dismiss_duration());
            return;
        }
        self.motion = Some(Motion::Spring {
            position: self.offset,
            velocity: 0.0,
            target: 0.0,
            tension: self.config.spring_tension,
            friction: self.config.spring_friction,
            at_rest: self.offset == 0.0,
        });
        self.transition(SheetState::Open);
    }

    pub fn close(&mut self) {
        if !matches!(
            self.state,
            SheetState::Open | SheetState::Dragging { .. } | SheetState::Opening
        ) {
            return;
        }
        self.start_close(self.config.close_duration());
    }

    /// Advance the running animation. Returns the completion, if one happened.
    pub fn tick(&mut self, dt: Duration) -> Option<SheetSettled> {
        if !self.config.animations_enabled {
            return self.settle();
        }
        let motion = self.motion.as_mut()?;
        self.offset = motion.advance(dt);
        if motion.is_done() {
            self.finish()
        } else {
            None
        }
    }

    /// Jump to the end of the running animation.
    pub fn settle(&mut self) -> Option<SheetSettled> {
        let motion = self.motion.as_ref()?;
        self.offset = motion.target();
        self.finish()
    }

    fn start_close(&mut self, duration: Duration) {
        self.motion = Some(Motion::tween(
            self.offset,
            self.config.container_height,
            duration,
        ));
        self.transition(SheetState::Closing);
    }

    fn finish(&mut self) -> Option<SheetSettled> {
        self.motion = None;
        let settled = match self.state {
            SheetState::Opening => {
                self.offset = 0.0;
                self.transition(SheetState::Open);
                SheetSettled::Opened
            }
            SheetState::Open => {
                self.offset = 0.0;
                SheetSettled::Returned
            }
            SheetState::Closing => {
                self.offset = 0.0;
                self.transition(SheetState::Closed);
                SheetSettled::Closed
            }
            SheetState::Closed | SheetState::Dragging { .. } => return None,
        };
        debug!(?settled, "sheet animation settled");
        Some(settled)
    }

    fn transition(&mut self, next: SheetState) {
        if self.state.name() != next.name() {
            debug!(from = self.state.name(), to = next.name(), "sheet transition");
        }
        self.state = next;
    }
}
