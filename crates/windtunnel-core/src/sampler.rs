//! Output sampling decoupled from the solver step rate.
//!
//! Two independent decisions are made after every loop iteration:
//!
//! - **Frames**: `N = round(frame_rate × video_seconds)` output instants are
//!   spread evenly over the `T` simulated steps of the run. A frame is due
//!   whenever the simulated clock passes one of those instants. Choosing a
//!   video longer than the simulated time slows playback down, a shorter one
//!   speeds it up.
//! - **Forces/torques**: sampled on every iteration when enabled.
//!
//! Raw solver forces and torques are turned into area and area-length
//! coefficients by converting to SI and dividing by the dynamic pressure of
//! the reference flow. The lateral force and the pitch torque change sign
//! between the solver frame and the body frame:
//!
//! ```text
//! CdA  =  Fy / q      CrAl =  Ty / (q L)
//! ClA  =  Fz / q      CpAl = -Tx / (q L)
//! CsA  = -Fx / q      CyAl =  Tz / (q L)
//! ```

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::units::{Quantity, UnitSystem};

/// Default output frame rate (Hz).
pub const DEFAULT_FRAME_RATE: f64 = 60.0;

/// Output timing configuration in simulation units.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleCadence {
    /// Planned simulated duration in steps.
    pub total_steps: u64,
    /// Desired output (video) duration in seconds.
    pub video_seconds: f64,
    /// Output frame rate (Hz).
    pub frame_rate: f64,
    /// Whether frames are written at all.
    pub visual_output: bool,
    /// Whether forces and torques are sampled every iteration.
    pub force_sampling: bool,
}

impl SampleCadence {
    /// Cadence with the default 60 Hz frame rate.
    #[must_use]
    pub fn new(total_steps: u64, video_seconds: f64) -> Self {
        Self {
            total_steps,
            video_seconds,
            frame_rate: DEFAULT_FRAME_RATE,
            visual_output: false,
            force_sampling: true,
        }
    }

    /// Set the frame rate.
    #[must_use]
    pub fn with_frame_rate(mut self, frame_rate: f64) -> Self {
        self.frame_rate = frame_rate;
        self
    }

    /// Enable or disable frame output.
    #[must_use]
    pub fn with_visual_output(mut self, enabled: bool) -> Self {
        self.visual_output = enabled;
        self
    }

    /// Enable or disable force/torque sampling.
    #[must_use]
    pub fn with_force_sampling(mut self, enabled: bool) -> Self {
        self.force_sampling = enabled;
        self
    }
}

/// Evenly spaced grid of output instants over the simulated run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FrameClockFields")]
pub struct FrameClock {
    total_steps: u64,
    frames: u64,
}

/// Wire form of [`FrameClock`].
#[derive(Deserialize)]
struct FrameClockFields {
    total_steps: u64,
    frames: u64,
}

impl TryFrom<FrameClockFields> for FrameClock {
    type Error = CoreError;

    fn try_from(fields: FrameClockFields) -> CoreResult<Self> {
        if fields.total_steps == 0 || fields.frames == 0 {
            return Err(CoreError::InvalidSampling {
                reason: format!(
                    "{} frames over {} steps is not a frame grid",
                    fields.frames, fields.total_steps
                ),
            });
        }
        Ok(Self {
            total_steps: fields.total_steps,
            frames: fields.frames,
        })
    }
}

impl FrameClock {
    /// Build the grid for `total_steps` simulated steps and a video of
    /// `video_seconds` at `frame_rate`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSampling`] when the run is empty or the
    /// video would contain no frame.
    pub fn new(total_steps: u64, video_seconds: f64, frame_rate: f64) -> CoreResult<Self> {
        if total_steps == 0 {
            return Err(CoreError::InvalidSampling {
                reason: "total simulated duration is zero steps".to_string(),
            });
        }
        if !(video_seconds.is_finite() && video_seconds > 0.0) {
            return Err(CoreError::InvalidSampling {
                reason: format!("video duration {video_seconds} s must be finite and > 0"),
            });
        }
        if !(frame_rate.is_finite() && frame_rate > 0.0) {
            return Err(CoreError::InvalidSampling {
                reason: format!("frame rate {frame_rate} Hz must be finite and > 0"),
            });
        }
        let frames = (frame_rate * video_seconds).round();
        if frames < 1.0 {
            return Err(CoreError::InvalidSampling {
                reason: format!("{video_seconds} s at {frame_rate} Hz yields no frame"),
            });
        }
        Ok(Self {
            total_steps,
            frames: frames as u64,
        })
    }

    /// Number of output instants.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Simulated steps between consecutive output instants.
    #[must_use]
    pub fn spacing(&self) -> f64 {
        self.total_steps as f64 / self.frames as f64
    }

    /// Simulated step of output instant `k`.
    #[must_use]
    pub fn instant(&self, k: u64) -> f64 {
        k as f64 * self.spacing()
    }

    /// Number of output instants at or before step `t`.
    #[must_use]
    pub fn frames_reached(&self, t: u64) -> u64 {
        // floor(t * N / T) + 1, in integers so long runs do not drift
        let passed = (u128::from(t) * u128::from(self.frames)) / u128::from(self.total_steps);
        u64::try_from(passed)
            .unwrap_or(u64::MAX)
            .saturating_add(1)
            .min(self.frames)
    }

    /// Whether an output instant lies in `(previous, current]`.
    ///
    /// With `previous == None` the interval is closed at step zero, so the
    /// first frame is always emitted. At most one frame is due per call.
    #[must_use]
    pub fn frame_due(&self, previous: Option<u64>, current: u64) -> bool {
        let before = previous.map_or(0, |t| self.frames_reached(t));
        self.frames_reached(current) > before
    }
}

/// Force coefficients of one sampled step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForceSample {
    /// Simulation step.
    pub step: u64,
    /// Physical time (s).
    pub time_s: f64,
    /// Drag area `CdA` (m²).
    pub cda: f64,
    /// Lift area `ClA` (m²).
    pub cla: f64,
    /// Side-force area `CsA` (m²).
    pub csa: f64,
}

impl ForceSample {
    /// Coefficients in file column order.
    #[must_use]
    pub fn values(&self) -> [f64; 3] {
        [self.cda, self.cla, self.csa]
    }
}

/// Torque coefficients of one sampled step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TorqueSample {
    /// Simulation step.
    pub step: u64,
    /// Physical time (s).
    pub time_s: f64,
    /// Roll coefficient `CrAl` (m³).
    pub cral: f64,
    /// Pitch coefficient `CpAl` (m³).
    pub cpal: f64,
    /// Yaw coefficient `CyAl` (m³).
    pub cyal: f64,
}

impl TorqueSample {
    /// Coefficients in file column order.
    #[must_use]
    pub fn values(&self) -> [f64; 3] {
        [self.cral, self.cpal, self.cyal]
    }
}

/// Frame and force/torque sampling decisions for a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputSampler {
    units: UnitSystem,
    frames: Option<FrameClock>,
    force_sampling: bool,
}

impl OutputSampler {
    /// Create a sampler from a cadence.
    ///
    /// The frame grid is only validated when visual output is enabled.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidSampling`] when visual output is enabled
    /// with an invalid frame grid.
    pub fn new(cadence: &SampleCadence, units: UnitSystem) -> CoreResult<Self> {
        let frames = if cadence.visual_output {
            Some(FrameClock::new(
                cadence.total_steps,
                cadence.video_seconds,
                cadence.frame_rate,
            )?)
        } else {
            None
        };
        Ok(Self {
            units,
            frames,
            force_sampling: cadence.force_sampling,
        })
    }

    /// The frame grid, when visual output is enabled.
    #[must_use]
    pub fn frame_clock(&self) -> Option<&FrameClock> {
        self.frames.as_ref()
    }

    /// Whether a frame must be written after moving from `previous` to `current`.
    #[must_use]
    pub fn frame_due(&self, previous: Option<u64>, current: u64) -> bool {
        self.frames
            .as_ref()
            .is_some_and(|clock| clock.frame_due(previous, current))
    }

    /// Whether forces and torques are recorded for this iteration.
    #[must_use]
    pub fn force_sample_due(&self) -> bool {
        self.force_sampling
    }

    /// Dynamic pressure `q` used for force coefficients (Pa).
    #[must_use]
    pub fn force_reference(&self) -> f64 {
        self.units.dynamic_pressure()
    }

    /// `q × L` used for torque coefficients.
    #[must_use]
    pub fn torque_reference(&self) -> f64 {
        self.units.dynamic_pressure() * self.units.si_length()
    }

    /// Convert a raw solver force (simulation units) into coefficients.
    #[must_use]
    pub fn force_sample(&self, step: u64, force: &Vector3<f64>) -> ForceSample {
        let q = self.force_reference();
        let f = force * self.units.scale(Quantity::Force);
        ForceSample {
            step,
            time_s: self.units.seconds_at(step),
            cda: f.y / q,
            cla: f.z / q,
            csa: -f.x / q,
        }
    }

    /// Convert a raw solver torque (simulation units) into coefficients.
    #[must_use]
    pub fn torque_sample(&self, step: u64, torque: &Vector3<f64>) -> TorqueSample {
        let ql = self.torque_reference();
        let t = torque * self.units.scale(Quantity::Torque);
        TorqueSample {
            step,
            time_s: self.units.seconds_at(step),
            cral: t.y / ql,
            cpal: -t.x / ql,
            cyal: t.z / ql,
        }
    }
}
