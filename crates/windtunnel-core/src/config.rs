//! Run configuration.
//!
//! A [`RunConfig`] is an immutable value describing one run in physical
//! units. [`RunConfig::plan`] validates it and derives everything the control
//! loop needs in simulation units.
//!
//! # Example
//!
//! ```rust
//! use windtunnel_core::config::{RotationConfig, RunConfig};
//!
//! let config = RunConfig::default()
//!     .with_duration(0.5)
//!     .with_rotation(RotationConfig::new(0.1, 0.3, 1.57));
//!
//! let plan = config.plan().unwrap();
//! assert!(plan.reynolds > 1.0e6);
//! ```

use std::path::PathBuf;

use nalgebra::{Unit, Vector3};
use serde::{Deserialize, Serialize};

use crate::domain::{resolution, GridResolution, StoragePrecision};
use crate::error::{CoreError, CoreResult};
use crate::sampler::{OutputSampler, SampleCadence, DEFAULT_FRAME_RATE};
use crate::schedule::{RevoxelizationScheduler, RotationWindow};
use crate::units::{reynolds, UnitSystem};

/// Physical reference flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Free-stream speed (m/s).
    pub velocity_m_s: f64,
    /// Characteristic length of the body (m).
    pub length_m: f64,
    /// Kinematic viscosity (m²/s).
    pub viscosity_m2_s: f64,
    /// Density (kg/m³).
    pub density_kg_m3: f64,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            velocity_m_s: 17.0,
            length_m: 1.0,
            viscosity_m2_s: 1.48e-5,
            density_kg_m3: 1.225,
        }
    }
}

/// Lattice sizing and simulation-unit reference values.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatticeConfig {
    /// Box aspect ratio (x, y, z).
    pub aspect: [f64; 3],
    /// Device memory budget (MiB).
    pub memory_mb: u64,
    /// Population storage precision.
    pub precision: StoragePrecision,
    /// Body length as a fraction of the box `y` extent.
    pub length_fraction: f64,
    /// Inflow velocity in simulation units.
    pub velocity: f64,
    /// Reference density in simulation units.
    pub density: f64,
    /// Steps advanced per iteration while the body is static.
    pub default_steps: u64,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            aspect: [0.5, 1.0, 0.8],
            memory_mb: 1000,
            precision: StoragePrecision::Fp16C,
            length_fraction: 0.33,
            velocity: 0.1,
            density: 1.0,
            default_steps: 1,
        }
    }
}

/// Continuous rotation of the body during a time window.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Rotation start (s).
    pub start_s: f64,
    /// Rotation end (s).
    pub end_s: f64,
    /// Angular rate (rad/s).
    pub rate_rad_s: f64,
    /// Rotation axis in the domain frame.
    pub axis: [f64; 3],
    /// Steps between re-rasterizations.
    pub cadence: u64,
}

impl RotationConfig {
    /// Pitch rotation about x, re-rasterized every step.
    #[must_use]
    pub fn new(start_s: f64, end_s: f64, rate_rad_s: f64) -> Self {
        Self {
            start_s,
            end_s,
            rate_rad_s,
            ..Self::default()
        }
    }

    /// Set the re-rasterization cadence.
    #[must_use]
    pub fn with_cadence(mut self, cadence: u64) -> Self {
        self.cadence = cadence;
        self
    }

    /// Set the rotation axis.
    #[must_use]
    pub fn with_axis(mut self, axis: [f64; 3]) -> Self {
        self.axis = axis;
        self
    }

    /// Validated unit axis.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidRotationWindow`] for a zero or non-finite axis.
    pub fn unit_axis(&self) -> CoreResult<Unit<Vector3<f64>>> {
        let v = Vector3::from(self.axis);
        if !v.iter().all(|c| c.is_finite()) {
            return Err(CoreError::InvalidRotationWindow {
                reason: format!("rotation axis {:?} is not finite", self.axis),
            });
        }
        Unit::try_new(v, 1e-12).ok_or_else(|| CoreError::InvalidRotationWindow {
            reason: "rotation axis has zero length".to_string(),
        })
    }
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            start_s: 0.0,
            end_s: 0.0,
            rate_rad_s: 1.57,
            axis: [1.0, 0.0, 0.0],
            cadence: 1,
        }
    }
}

/// Placement of the body mesh in the box.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Mesh file handed to the mesh collaborator.
    pub mesh: PathBuf,
    /// Base pitch angle (degrees).
    pub pitch_deg: f64,
    /// Base yaw angle (degrees).
    pub yaw_deg: f64,
    /// Offset from the box center, in multiples of the body length.
    pub offset: [f64; 3],
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            mesh: PathBuf::from("stl/body.stl"),
            pitch_deg: 90.0,
            yaw_deg: 0.0,
            offset: [0.0, -0.5, 0.0],
        }
    }
}

/// Camera used for exported frames.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Rotation about the vertical axis (degrees).
    pub rx_deg: f64,
    /// Elevation (degrees).
    pub ry_deg: f64,
    /// Field of view (degrees).
    pub fov_deg: f64,
    /// Zoom factor.
    pub zoom: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            rx_deg: -30.0,
            ry_deg: 20.0,
            fov_deg: 100.0,
            zoom: 1.25,
        }
    }
}

/// Run length and output switches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Simulated duration (s).
    pub duration_s: f64,
    /// Length of the exported video (s).
    pub video_s: f64,
    /// Video frame rate (Hz).
    pub frame_rate: f64,
    /// Write frames to `png/`.
    pub visual_output: bool,
    /// Record force and torque coefficients every iteration.
    pub force_sampling: bool,
    /// Camera for exported frames.
    pub camera: CameraConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            duration_s: 1.0,
            video_s: 10.0,
            frame_rate: DEFAULT_FRAME_RATE,
            visual_output: false,
            force_sampling: true,
            camera: CameraConfig::default(),
        }
    }
}

/// Complete description of one run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Physical reference flow.
    pub flow: FlowConfig,
    /// Lattice sizing.
    pub lattice: LatticeConfig,
    /// Body placement.
    pub body: BodyConfig,
    /// Optional rotation window.
    pub rotation: Option<RotationConfig>,
    /// Run length and outputs.
    pub output: OutputConfig,
}

impl RunConfig {
    /// Set the simulated duration.
    #[must_use]
    pub fn with_duration(mut self, duration_s: f64) -> Self {
        self.output.duration_s = duration_s;
        self
    }

    /// Set the video length.
    #[must_use]
    pub fn with_video(mut self, video_s: f64) -> Self {
        self.output.video_s = video_s;
        self
    }

    /// Set the rotation window.
    #[must_use]
    pub fn with_rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = Some(rotation);
        self
    }

    /// Set the device memory budget.
    #[must_use]
    pub fn with_memory(mut self, memory_mb: u64) -> Self {
        self.lattice.memory_mb = memory_mb;
        self
    }

    /// Enable or disable frame output.
    #[must_use]
    pub fn with_visual_output(mut self, enabled: bool) -> Self {
        self.output.visual_output = enabled;
        self
    }

    /// Enable or disable force sampling.
    #[must_use]
    pub fn with_force_sampling(mut self, enabled: bool) -> Self {
        self.output.force_sampling = enabled;
        self
    }

    /// Validate the configuration and derive simulation-unit parameters.
    ///
    /// # Errors
    ///
    /// Returns the first [`CoreError`] found: invalid units, rotation window,
    /// output sampling or domain.
    pub fn plan(&self) -> CoreResult<RunPlan> {
        let grid = resolution(
            self.lattice.aspect,
            self.lattice.memory_mb,
            self.lattice.precision,
        )?;

        let fraction = self.lattice.length_fraction;
        if !(fraction.is_finite() && fraction > 0.0 && fraction <= 1.0) {
            return Err(CoreError::InvalidDomain {
                reason: format!("length fraction {fraction} must lie in (0, 1]"),
            });
        }
        let sim_length = fraction * f64::from(grid.y);

        let units = UnitSystem::new(
            sim_length,
            self.lattice.velocity,
            self.lattice.density,
            self.flow.length_m,
            self.flow.velocity_m_s,
            self.flow.density_kg_m3,
        )?;
        let sim_viscosity = units.viscosity_to_sim(self.flow.viscosity_m2_s)?;

        let duration = self.output.duration_s;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(CoreError::InvalidSampling {
                reason: format!("simulated duration {duration} s must be finite and > 0"),
            });
        }
        let total_steps = units.steps(duration);
        if total_steps == 0 {
            return Err(CoreError::InvalidSampling {
                reason: format!("simulated duration {duration} s is shorter than one step"),
            });
        }

        let window = match &self.rotation {
            Some(r) => Some(RotationWindow::from_si(
                &units,
                r.start_s,
                r.end_s,
                r.rate_rad_s,
                r.unit_axis()?,
                r.cadence,
            )?),
            None => None,
        };

        let cadence = SampleCadence::new(total_steps, self.output.video_s)
            .with_frame_rate(self.output.frame_rate)
            .with_visual_output(self.output.visual_output)
            .with_force_sampling(self.output.force_sampling);
        let sampler = OutputSampler::new(&cadence, units)?;
        let scheduler = RevoxelizationScheduler::new(window, self.lattice.default_steps);

        Ok(RunPlan {
            grid,
            units,
            sim_length,
            sim_viscosity,
            total_steps,
            reynolds: reynolds(
                self.flow.length_m,
                self.flow.velocity_m_s,
                self.flow.viscosity_m2_s,
            ),
            scheduler,
            sampler,
        })
    }
}

/// Validated, simulation-unit view of a [`RunConfig`].
#[derive(Clone, Debug, PartialEq)]
pub struct RunPlan {
    /// Lattice size.
    pub grid: GridResolution,
    /// Unit conversion for the run.
    pub units: UnitSystem,
    /// Body length in cells.
    pub sim_length: f64,
    /// Kinematic viscosity in simulation units.
    pub sim_viscosity: f64,
    /// Last simulated step of the run.
    pub total_steps: u64,
    /// Physical Reynolds number.
    pub reynolds: f64,
    /// Revoxelization scheduler.
    pub scheduler: RevoxelizationScheduler,
    /// Output sampler.
    pub sampler: OutputSampler,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let plan = RunConfig::default().plan().unwrap();
        assert!((plan.sim_length - 0.33 * f64::from(plan.grid.y)).abs() < 1e-9);
        assert!((plan.reynolds - 17.0 / 1.48e-5).abs() < 1.0);
        assert!(plan.scheduler.window().is_none());
        assert!(plan.sampler.force_sample_due());
        assert!(plan.sampler.frame_clock().is_none());
        assert_eq!(plan.total_steps, plan.units.steps(1.0));

        let re_sim = reynolds(plan.sim_length, 0.1, plan.sim_viscosity);
        assert!(((re_sim - plan.reynolds) / plan.reynolds).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_flow_rejected() {
        let mut config = RunConfig::default();
        config.flow.viscosity_m2_s = 0.0;
        assert!(matches!(
            config.plan(),
            Err(CoreError::InvalidUnitConfiguration { quantity: "si_viscosity", .. })
        ));

        let mut config = RunConfig::default();
        config.flow.velocity_m_s = -17.0;
        assert!(matches!(
            config.plan(),
            Err(CoreError::InvalidUnitConfiguration { .. })
        ));
    }

    #[test]
    fn test_inverted_rotation_window_rejected() {
        let config = RunConfig::default().with_rotation(RotationConfig::new(10.0, 1.5, 1.57));
        assert!(matches!(
            config.plan(),
            Err(CoreError::InvalidRotationWindow { .. })
        ));

        let config = RunConfig::default()
            .with_rotation(RotationConfig::new(0.1, 0.2, 1.57).with_cadence(0));
        assert!(config.plan().is_err());

        let config = RunConfig::default()
            .with_rotation(RotationConfig::new(0.1, 0.2, 1.57).with_axis([0.0; 3]));
        assert!(config.plan().is_err());
    }

    #[test]
    fn test_visual_output_validates_video() {
        let config = RunConfig::default().with_visual_output(true).with_video(0.0);
        assert!(matches!(
            config.plan(),
            Err(CoreError::InvalidSampling { .. })
        ));
        let plan = RunConfig::default().with_visual_output(true).plan().unwrap();
        assert_eq!(plan.sampler.frame_clock().map(|c| c.frame_count()), Some(600));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "flow": { "velocity_m_s": 20.0 },
            "rotation": { "start_s": 0.1, "end_s": 0.2, "cadence": 4 },
            "output": { "duration_s": 0.5, "visual_output": true }
        }"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert!((config.flow.velocity_m_s - 20.0).abs() < 1e-12);
        assert!((config.flow.length_m - 1.0).abs() < 1e-12);
        assert_eq!(config.lattice.precision, StoragePrecision::Fp16C);
        let rotation = config.rotation.as_ref().unwrap();
        assert_eq!(rotation.cadence, 4);
        assert_eq!(rotation.axis, [1.0, 0.0, 0.0]);
        assert!(config.output.visual_output);
        assert!(config.output.force_sampling);
    }

    #[test]
    fn test_json_round_trip() {
        let config = RunConfig::default().with_rotation(RotationConfig::new(0.1, 0.3, 2.0));
        let json = serde_json::to_string_pretty(&config).unwrap();
        let back: RunConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
