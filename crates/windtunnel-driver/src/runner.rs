//! The simulation control loop.
//!
//! ```text
//!   setup: place body → rasterize → inflow → advance(0) → status
//!                               │
//!          ┌────────────────────▼─────────────────────┐
//!          │  while t ≤ total                          │
//!          │    plan = scheduler.decide(t)             │
//!          │    Revoxelize? rotate mesh, rasterize     │
//!          │    solver.advance(plan.steps)             │
//!          │    frame due?  render into png/           │
//!          │    sampling?   forces.dat / torques.dat   │
//!          └────────────────────┬─────────────────────┘
//!                               ▼
//!                         final status
//! ```
//!
//! Any collaborator error ends the run. A status snapshot is still written
//! before the error is returned.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use windtunnel_core::config::{RunConfig, RunPlan};
use windtunnel_core::sampler::{ForceSample, TorqueSample};
use windtunnel_core::schedule::{RotationPhase, StepPlan};

use crate::collab::{BodyMesh, FrameRenderer, Solver, BODY_FLAGS};
use crate::error::{DriverError, DriverResult};
use crate::output::{CoefficientLog, RunDirectory, FORCES_HEADER, TORQUES_HEADER};
use crate::setup::place_body;

/// What a finished run did.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Loop iterations.
    pub iterations: u64,
    /// Solver step at exit.
    pub final_step: u64,
    /// Re-rasterizations during the rotation window.
    pub revoxelizations: u64,
    /// Frames written.
    pub frames: u64,
    /// Force and torque rows written.
    pub force_samples: u64,
    /// Total rotation applied to the body (rad).
    pub accumulated_angle: f64,
    /// Last force sample.
    pub last_force: Option<ForceSample>,
    /// Last torque sample.
    pub last_torque: Option<TorqueSample>,
}

/// Logs at each tenth of the run.
struct Progress {
    total: u64,
    tenth: u64,
    next: u64,
}

impl Progress {
    fn new(total: u64) -> Self {
        let tenth = (total / 10).max(1);
        Self {
            total,
            tenth,
            next: tenth,
        }
    }

    fn update(&mut self, t: u64) {
        if t < self.next {
            return;
        }
        let percent = (t.min(self.total) * 100) / self.total.max(1);
        tracing::info!("Progress {}% (step {} of {})", percent, t, self.total);
        while self.next <= t {
            self.next += self.tenth;
        }
    }
}

/// Drives a solver through one configured run.
#[derive(Clone, Debug)]
pub struct SimulationLoop {
    config: RunConfig,
    plan: RunPlan,
}

impl SimulationLoop {
    /// Validate `config` and derive the run plan.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Config`] when the configuration is rejected.
    pub fn new(config: RunConfig) -> DriverResult<Self> {
        let plan = config.plan()?;
        Ok(Self { config, plan })
    }

    /// The configuration of this run.
    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// The derived plan.
    #[must_use]
    pub fn plan(&self) -> &RunPlan {
        &self.plan
    }

    /// Run to completion.
    ///
    /// `mesh` is the raw body as loaded; it is placed, then rotated in place
    /// during the rotation window.
    ///
    /// # Errors
    ///
    /// Returns the first collaborator error. The solver status is persisted
    /// into the data directory before it is returned.
    pub fn run<S, R>(
        &self,
        solver: &mut S,
        mesh: &mut S::Mesh,
        renderer: &mut R,
        dirs: &RunDirectory,
    ) -> DriverResult<RunReport>
    where
        S: Solver,
        R: FrameRenderer,
    {
        self.log_parameters();

        match self.drive(solver, mesh, renderer, dirs) {
            Ok(report) => {
                solver.persist_status(dirs.data())?;
                tracing::info!(
                    "Run complete: {} iterations, {} revoxelizations, {} frames",
                    report.iterations,
                    report.revoxelizations,
                    report.frames
                );
                Ok(report)
            }
            Err(err) => {
                tracing::error!("Run stopped at step {}: {}", solver.simulated_time(), err);
                if let Err(status_err) = solver.persist_status(dirs.data()) {
                    tracing::warn!("Status snapshot after failure also failed: {}", status_err);
                }
                Err(err)
            }
        }
    }

    fn log_parameters(&self) {
        let plan = &self.plan;
        tracing::info!("Re = {:.0}", plan.reynolds);
        tracing::info!(
            "Grid {}x{}x{} ({:.0} MiB), body length {:.1} cells",
            plan.grid.x,
            plan.grid.y,
            plan.grid.z,
            plan.grid.memory_mb(self.config.lattice.precision),
            plan.sim_length
        );
        tracing::info!(
            "{} steps of {:.3e} s, viscosity {:.3e} (simulation units)",
            plan.total_steps,
            plan.units.seconds_at(1),
            plan.sim_viscosity
        );
        if let Some(w) = plan.scheduler.window() {
            tracing::info!(
                "Rotation window [{}, {}) every {} steps, {} revoxelizations, {:.4} rad",
                w.start(),
                w.end(),
                w.cadence(),
                w.total_triggers(),
                w.total_angle()
            );
            if !w.activates_within(plan.total_steps) {
                tracing::warn!("Rotation window starts after the run ends");
            }
        }
    }

    fn drive<S, R>(
        &self,
        solver: &mut S,
        mesh: &mut S::Mesh,
        renderer: &mut R,
        dirs: &RunDirectory,
    ) -> DriverResult<RunReport>
    where
        S: Solver,
        R: FrameRenderer,
    {
        let plan = &self.plan;
        let scheduler = &plan.scheduler;
        let sampler = &plan.sampler;
        let camera = self.config.output.camera;

        // setup
        let placement = place_body(
            mesh,
            &self.config.body,
            &solver.domain_center(),
            plan.sim_length,
        )?;
        let mut geometry = placement.geometry();
        solver.rasterize(mesh, BODY_FLAGS, &geometry.pivot(), &Vector3::zeros())?;
        solver.configure_flow(&Vector3::new(0.0, plan.units.sim_velocity(), 0.0))?;
        solver.advance(0)?;
        solver.persist_status(dirs.data())?;

        let mut logs = if sampler.force_sample_due() {
            let forces = CoefficientLog::create(dirs.forces_path(), FORCES_HEADER)?;
            let torques = CoefficientLog::create(dirs.torques_path(), TORQUES_HEADER)?;
            tracing::info!(
                "Sampling into {} and {}",
                forces.path().display(),
                torques.path().display()
            );
            Some((forces, torques))
        } else {
            None
        };

        let total = plan.total_steps;
        let mut report = RunReport::default();
        let mut progress = Progress::new(total);
        let mut previous: Option<u64> = None;
        let mut t = solver.simulated_time();
        let mut phase = scheduler.phase(t);

        while t <= total {
            let current = scheduler.phase(t);
            if current != phase {
                tracing::info!(
                    "Rotation {} -> {} at step {}",
                    phase.name(),
                    current.name(),
                    t
                );
                phase = current;
            }

            let step_plan = scheduler.decide(t);
            if let StepPlan::Revoxelize {
                increment,
                angular_velocity,
                ..
            } = step_plan
            {
                let delta = geometry.apply_increment(&increment);
                let pivot = geometry.pivot();
                mesh.rotate(&delta, &pivot);
                solver.rasterize(mesh, BODY_FLAGS, &pivot, &angular_velocity)?;
                report.revoxelizations += 1;
                tracing::debug!(
                    "Revoxelized at step {}: {:.6} rad total",
                    t,
                    geometry.accumulated_angle()
                );
            }

            solver.advance(step_plan.steps())?;
            let next = solver.simulated_time();
            if next <= t {
                return Err(DriverError::SolverDivergence {
                    step: next,
                    reason: format!("time did not advance past step {t}"),
                });
            }
            t = next;

            if sampler.frame_due(previous, t) {
                renderer.set_camera(&camera);
                if let Some(frame) = renderer.write_frame(dirs.frames(), t)? {
                    tracing::debug!("Frame {} at step {}", frame.display(), t);
                    report.frames += 1;
                }
            }
            previous = Some(t);

            if let Some((forces, torques)) = logs.as_mut() {
                let force = sampler.force_sample(t, &solver.read_back_forces(BODY_FLAGS)?);
                let torque = sampler.torque_sample(
                    t,
                    &solver.read_back_torques(&geometry.pivot(), BODY_FLAGS)?,
                );
                forces.append(force.step, force.time_s, force.values())?;
                torques.append(torque.step, torque.time_s, torque.values())?;
                report.force_samples += 1;
                report.last_force = Some(force);
                report.last_torque = Some(torque);
            }

            report.iterations += 1;
            progress.update(t);
        }

        if phase == RotationPhase::Rotating {
            tracing::warn!("Run ended inside the rotation window");
        }

        report.final_step = t;
        report.accumulated_angle = geometry.accumulated_angle();
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};

    use windtunnel_core::config::RotationConfig;

    use windtunnel_core::config::CameraConfig;

    use crate::collab::NoFrames;
    use crate::synthetic::{BoxMesh, SyntheticRenderer, SyntheticSolver};

    fn small_config() -> RunConfig {
        RunConfig::default().with_memory(1).with_duration(0.01)
    }

    /// Renderer whose every frame fails to encode.
    struct BrokenEncoder;

    impl FrameRenderer for BrokenEncoder {
        fn set_camera(&mut self, _camera: &CameraConfig) {}

        fn write_frame(&mut self, _dir: &Path, step: u64) -> DriverResult<Option<PathBuf>> {
            Err(DriverError::Render {
                step,
                reason: "encoder unavailable".to_string(),
            })
        }
    }

    fn body() -> BoxMesh {
        BoxMesh::new(Vector3::new(0.25, 1.0, 0.25))
    }

    fn line_count(path: &Path) -> usize {
        fs::read_to_string(path).unwrap().lines().count()
    }

    #[test]
    fn test_static_run_samples_every_iteration() {
        let export = tempfile::tempdir().unwrap();
        let config = small_config();
        let sim = SimulationLoop::new(config.clone()).unwrap();
        let total = sim.plan().total_steps;
        assert!(total > 5, "total {total}");

        let dirs = RunDirectory::create(export.path(), "static", &config).unwrap();
        let mut solver = SyntheticSolver::new(sim.plan().grid);
        let report = sim.run(&mut solver, &mut body(), &mut NoFrames, &dirs).unwrap();

        assert_eq!(report.iterations, total + 1);
        assert_eq!(report.final_step, total + 1);
        assert_eq!(report.force_samples, report.iterations);
        assert_eq!(report.revoxelizations, 0);
        assert_eq!(solver.rasterizations(), &[0]);
        assert_eq!(solver.status_writes(), 2);

        let rows = report.force_samples as usize;
        assert_eq!(line_count(&dirs.forces_path()), rows + 1);
        assert_eq!(line_count(&dirs.torques_path()), rows + 1);

        // drag is positive and points along the inflow
        let force = report.last_force.unwrap();
        assert!(force.cda > 0.0);
        assert!(force.csa.abs() < 1e-12);
    }

    #[test]
    fn test_rotation_window_applies_full_angle() {
        let export = tempfile::tempdir().unwrap();
        let config = small_config()
            .with_rotation(RotationConfig::new(0.002, 0.006, 1.57).with_cadence(3));
        let sim = SimulationLoop::new(config.clone()).unwrap();
        let window = *sim.plan().scheduler.window().unwrap();
        assert!(window.end() < sim.plan().total_steps);

        let dirs = RunDirectory::create(export.path(), "rotation", &config).unwrap();
        let mut solver = SyntheticSolver::new(sim.plan().grid);
        let report = sim.run(&mut solver, &mut body(), &mut NoFrames, &dirs).unwrap();

        // [4, 11) every 3 steps: 4 and 7 are full, 10 is clamped to one step
        assert_eq!(window.full_triggers(), 2);
        assert_eq!(window.total_triggers(), 3);
        assert_eq!(report.revoxelizations, window.total_triggers());
        assert!((report.accumulated_angle - window.total_angle()).abs() < 1e-12);
        // initial rasterization plus one per trigger, all inside the window
        let steps = solver.rasterizations();
        assert_eq!(steps.len() as u64, 1 + window.total_triggers());
        assert!(steps[1..]
            .iter()
            .all(|s| *s >= window.start() && *s < window.end()));
    }

    #[test]
    fn test_divergence_still_persists_status() {
        let export = tempfile::tempdir().unwrap();
        let config = small_config();
        let sim = SimulationLoop::new(config.clone()).unwrap();
        let dirs = RunDirectory::create(export.path(), "diverged", &config).unwrap();

        let mut solver = SyntheticSolver::new(sim.plan().grid).with_divergence_at(5);
        let err = sim
            .run(&mut solver, &mut body(), &mut NoFrames, &dirs)
            .unwrap_err();
        assert!(err.is_divergence());

        // setup snapshot plus the one written on failure
        assert_eq!(solver.status_writes(), 2);
        assert!(dirs.data().join("status.txt").is_file());
        // samples taken at steps 1..=4 survive
        assert_eq!(line_count(&dirs.forces_path()), 5);
    }

    #[test]
    fn test_disabled_sampling_writes_no_files() {
        let export = tempfile::tempdir().unwrap();
        let config = small_config().with_force_sampling(false);
        let sim = SimulationLoop::new(config.clone()).unwrap();
        let dirs = RunDirectory::create(export.path(), "quiet", &config).unwrap();

        let mut solver = SyntheticSolver::new(sim.plan().grid);
        let report = sim.run(&mut solver, &mut body(), &mut NoFrames, &dirs).unwrap();
        assert_eq!(report.force_samples, 0);
        assert!(report.last_force.is_none());
        assert!(!dirs.forces_path().exists());
        assert!(!dirs.torques_path().exists());
    }

    #[test]
    fn test_frames_follow_video_grid() {
        let export = tempfile::tempdir().unwrap();
        // 0.1 s of video at 60 Hz
        let config = small_config().with_visual_output(true).with_video(0.1);
        let sim = SimulationLoop::new(config.clone()).unwrap();
        let clock = *sim.plan().sampler.frame_clock().unwrap();
        assert_eq!(clock.frame_count(), 6);

        let dirs = RunDirectory::create(export.path(), "frames", &config).unwrap();
        let mut solver = SyntheticSolver::new(sim.plan().grid);
        let mut renderer = SyntheticRenderer::new();
        let report = sim.run(&mut solver, &mut body(), &mut renderer, &dirs).unwrap();

        assert_eq!(report.frames, 6);
        assert_eq!(renderer.frames().len(), 6);
        assert_eq!(renderer.frames()[0], 1);
        assert_eq!(fs::read_dir(dirs.frames()).unwrap().count(), 6);
    }

    #[test]
    fn test_headless_renderer_counts_no_frames() {
        let export = tempfile::tempdir().unwrap();
        let config = small_config().with_visual_output(true).with_video(0.1);
        let sim = SimulationLoop::new(config.clone()).unwrap();
        let dirs = RunDirectory::create(export.path(), "headless", &config).unwrap();

        let mut solver = SyntheticSolver::new(sim.plan().grid);
        let report = sim.run(&mut solver, &mut body(), &mut NoFrames, &dirs).unwrap();
        assert_eq!(report.frames, 0);
        assert_eq!(fs::read_dir(dirs.frames()).unwrap().count(), 0);
    }

    #[test]
    fn test_render_failure_stops_run() {
        let export = tempfile::tempdir().unwrap();
        let config = small_config().with_visual_output(true).with_video(0.1);
        let sim = SimulationLoop::new(config.clone()).unwrap();
        let dirs = RunDirectory::create(export.path(), "broken", &config).unwrap();

        let mut solver = SyntheticSolver::new(sim.plan().grid);
        let err = sim
            .run(&mut solver, &mut body(), &mut BrokenEncoder, &dirs)
            .unwrap_err();
        assert!(matches!(err, DriverError::Render { step: 1, .. }));
        assert!(!err.is_divergence());

        // the first frame is due after the first step; nothing runs past it
        assert_eq!(solver.simulated_time(), 1);
        assert_eq!(solver.status_writes(), 2);
        assert!(dirs.data().join("status.txt").is_file());
        // frames come before sampling, so only the header was written
        assert_eq!(line_count(&dirs.forces_path()), 1);
    }

    #[test]
    fn test_unwritable_data_dir_is_io_error() {
        let export = tempfile::tempdir().unwrap();
        let config = small_config();
        let sim = SimulationLoop::new(config.clone()).unwrap();
        let dirs = RunDirectory::create(export.path(), "gone", &config).unwrap();
        fs::remove_dir_all(dirs.root()).unwrap();

        let mut solver = SyntheticSolver::new(sim.plan().grid);
        let err = sim
            .run(&mut solver, &mut body(), &mut NoFrames, &dirs)
            .unwrap_err();
        assert!(matches!(err, DriverError::Io { .. }));
        assert_eq!(solver.simulated_time(), 0);
        assert_eq!(solver.status_writes(), 0);
    }

    #[test]
    fn test_invalid_config_rejected_before_run() {
        let config = small_config().with_rotation(RotationConfig::new(0.006, 0.002, 1.0));
        assert!(matches!(
            SimulationLoop::new(config),
            Err(DriverError::Config(_))
        ));
    }
}
