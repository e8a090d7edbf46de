//! Revoxelization scheduling for a body rotating inside a time window.
//!
//! Re-rasterizing the body is expensive, so it happens only while the body is
//! actually turning, and then only once every `cadence` steps:
//!
//! ```text
//!  step:  0 ......... start ──────────────────────────── end ........ total
//!  phase:   Idle      │ Rotating                         │ Settled
//!  plan:  Advance(1)  │ Rv(c) Rv(c) Rv(c) ... Rv(c, clamped)│ Advance(1)
//! ```
//!
//! The phase and every decision are pure functions of the current step, so
//! the scheduler carries no mutable counters that could drift from the
//! solver's clock.

use nalgebra::{Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::geometry::RotationIncrement;
use crate::units::{Quantity, UnitSystem};

/// Rotation phase of the body at a given step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RotationPhase {
    /// Before the rotation window; geometry is static.
    Idle,
    /// Inside the rotation window; geometry is re-rasterized every cadence.
    Rotating,
    /// After the rotation window; geometry is static again.
    Settled,
}

impl RotationPhase {
    /// Get a human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Rotating => "rotating",
            Self::Settled => "settled",
        }
    }
}

/// Interval of continuous rotation, in simulation steps.
///
/// Deserialization goes through [`RotationWindow::new`], so a decoded window
/// obeys the same invariants as a constructed one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WindowFields")]
pub struct RotationWindow {
    start: u64,
    end: u64,
    rate: f64,
    axis: Unit<Vector3<f64>>,
    cadence: u64,
}

/// Wire form of [`RotationWindow`].
#[derive(Deserialize)]
struct WindowFields {
    start: u64,
    end: u64,
    rate: f64,
    axis: Vector3<f64>,
    cadence: u64,
}

impl TryFrom<WindowFields> for RotationWindow {
    type Error = CoreError;

    fn try_from(fields: WindowFields) -> CoreResult<Self> {
        let axis = Some(fields.axis)
            .filter(|a| a.iter().all(|c| c.is_finite()))
            .and_then(|a| Unit::try_new(a, 1e-12))
            .ok_or_else(|| CoreError::InvalidRotationWindow {
                reason: format!("rotation axis {:?} is not a finite non-zero vector", fields.axis),
            })?;
        Self::new(fields.start, fields.end, fields.rate, axis, fields.cadence)
    }
}

impl RotationWindow {
    /// Create a window rotating at `rate` rad/step about `axis` during
    /// `[start, end)`, re-rasterizing every `cadence` steps.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRotationWindow`] when `end < start`,
    /// `cadence == 0` or `rate` is not finite.
    pub fn new(
        start: u64,
        end: u64,
        rate: f64,
        axis: Unit<Vector3<f64>>,
        cadence: u64,
    ) -> CoreResult<Self> {
        if end < start {
            return Err(CoreError::InvalidRotationWindow {
                reason: format!("end step {end} is before start step {start}"),
            });
        }
        if cadence == 0 {
            return Err(CoreError::InvalidRotationWindow {
                reason: "revoxelization cadence must be at least 1 step".to_string(),
            });
        }
        if !rate.is_finite() {
            return Err(CoreError::InvalidRotationWindow {
                reason: format!("angular rate {rate} is not finite"),
            });
        }
        Ok(Self {
            start,
            end,
            rate,
            axis,
            cadence,
        })
    }

    /// Build a window from physical times (s) and angular rate (rad/s).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRotationWindow`] when the times are
    /// negative, not finite or `end_s < start_s`, plus the checks of
    /// [`RotationWindow::new`].
    pub fn from_si(
        units: &UnitSystem,
        start_s: f64,
        end_s: f64,
        rate_rad_s: f64,
        axis: Unit<Vector3<f64>>,
        cadence: u64,
    ) -> CoreResult<Self> {
        for (name, value) in [("start", start_s), ("end", end_s)] {
            if !value.is_finite() || value < 0.0 {
                return Err(CoreError::InvalidRotationWindow {
                    reason: format!("{name} time {value} s must be finite and >= 0"),
                });
            }
        }
        if end_s < start_s {
            return Err(CoreError::InvalidRotationWindow {
                reason: format!("end time {end_s} s is before start time {start_s} s"),
            });
        }
        let rate = units.to_sim(rate_rad_s, Quantity::AngularVelocity);
        Self::new(units.steps(start_s), units.steps(end_s), rate, axis, cadence)
    }

    /// First rotating step.
    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    /// First step after the window.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Angular rate in rad/step.
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Rotation axis.
    #[must_use]
    pub fn axis(&self) -> Unit<Vector3<f64>> {
        self.axis
    }

    /// Steps between re-rasterizations.
    #[must_use]
    pub fn cadence(&self) -> u64 {
        self.cadence
    }

    /// Window length in steps.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the window contains no step.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Total angle swept over the window (radians).
    #[must_use]
    pub fn total_angle(&self) -> f64 {
        self.rate * self.len() as f64
    }

    /// Number of revoxelizations covering the whole cadence.
    #[must_use]
    pub fn full_triggers(&self) -> u64 {
        self.len() / self.cadence
    }

    /// Number of revoxelizations including a final clamped one.
    #[must_use]
    pub fn total_triggers(&self) -> u64 {
        self.len().div_ceil(self.cadence)
    }

    /// Whether the window starts at or before the last step of the run.
    #[must_use]
    pub fn activates_within(&self, total_steps: u64) -> bool {
        !self.is_empty() && self.start <= total_steps
    }
}

/// What the loop should do for the next iteration.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum StepPlan {
    /// Advance the solver with unchanged geometry.
    Advance {
        /// Steps to advance.
        steps: u64,
    },
    /// Rotate the body, re-rasterize it, then advance.
    Revoxelize {
        /// Steps to advance after rasterization.
        steps: u64,
        /// Rotation to apply before rasterization.
        increment: RotationIncrement,
        /// Instantaneous angular velocity (rad/step) for moving-wall voxels.
        angular_velocity: Vector3<f64>,
    },
}

impl StepPlan {
    /// Steps the solver advances under this plan.
    #[must_use]
    pub fn steps(&self) -> u64 {
        match self {
            Self::Advance { steps } | Self::Revoxelize { steps, .. } => *steps,
        }
    }

    /// Whether this plan re-rasterizes the body.
    #[must_use]
    pub fn is_revoxelize(&self) -> bool {
        matches!(self, Self::Revoxelize { .. })
    }
}

/// Decides, per step, whether the body must be rotated and re-rasterized.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "SchedulerFields")]
pub struct RevoxelizationScheduler {
    window: Option<RotationWindow>,
    default_steps: u64,
}

/// Wire form of [`RevoxelizationScheduler`].
#[derive(Deserialize)]
struct SchedulerFields {
    window: Option<RotationWindow>,
    default_steps: u64,
}

impl From<SchedulerFields> for RevoxelizationScheduler {
    fn from(fields: SchedulerFields) -> Self {
        Self::new(fields.window, fields.default_steps)
    }
}

impl RevoxelizationScheduler {
    /// Create a scheduler advancing `default_steps` per iteration outside the window.
    ///
    /// A `default_steps` of zero is treated as one.
    #[must_use]
    pub fn new(window: Option<RotationWindow>, default_steps: u64) -> Self {
        Self {
            window,
            default_steps: default_steps.max(1),
        }
    }

    /// Scheduler for a static body.
    #[must_use]
    pub fn stationary(default_steps: u64) -> Self {
        Self::new(None, default_steps)
    }

    /// The configured window, if any.
    #[must_use]
    pub fn window(&self) -> Option<&RotationWindow> {
        self.window.as_ref()
    }

    /// Steps per iteration outside the window.
    #[must_use]
    pub fn default_steps(&self) -> u64 {
        self.default_steps
    }

    /// Rotation phase at step `t`.
    #[must_use]
    pub fn phase(&self, t: u64) -> RotationPhase {
        match &self.window {
            None => RotationPhase::Idle,
            Some(w) if t < w.start => RotationPhase::Idle,
            Some(w) if t < w.end => RotationPhase::Rotating,
            Some(_) => RotationPhase::Settled,
        }
    }

    /// Plan the next iteration starting at step `t`.
    #[must_use]
    pub fn decide(&self, t: u64) -> StepPlan {
        let Some(w) = &self.window else {
            return StepPlan::Advance {
                steps: self.default_steps,
            };
        };

        match self.phase(t) {
            RotationPhase::Idle => StepPlan::Advance {
                // land exactly on the window start
                steps: self.default_steps.min(w.start - t),
            },
            RotationPhase::Settled => StepPlan::Advance {
                steps: self.default_steps,
            },
            RotationPhase::Rotating => {
                let since_start = t - w.start;
                let steps = w.cadence - since_start % w.cadence;
                let rotated_steps = steps.min(w.end - t);
                StepPlan::Revoxelize {
                    steps,
                    increment: RotationIncrement::new(w.axis, w.rate * rotated_steps as f64),
                    angular_velocity: w.axis.into_inner() * w.rate,
                }
            }
        }
    }
}
