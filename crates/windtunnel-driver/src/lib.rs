//! Windtunnel Driver - control loop for a rotating body in a lattice solver
//!
//! This crate runs a configured wind-tunnel experiment against an external
//! solver. It owns no numerics: the solver, the mesh and the renderer are
//! reached through the traits in [`collab`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Driver Pipeline                                │
//! │                                                                         │
//! │  ┌──────────────┐    ┌───────────────────┐    ┌────────────────────┐   │
//! │  │ RunConfig    │    │ SimulationLoop     │    │ Solver             │   │
//! │  │ (JSON, SI)   │───▶│                    │───▶│ advance/rasterize  │   │
//! │  │              │    │ scheduler, sampler │◀───│ forces/torques     │   │
//! │  └──────────────┘    └─────────┬─────────┘    └────────────────────┘   │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                     ┌────────────────────┐    ┌────────────────────┐   │
//! │                     │ RunDirectory       │    │ CoefficientTable   │   │
//! │                     │ forces.dat, png/   │───▶│ steady-state means │   │
//! │                     └────────────────────┘    └────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use windtunnel_core::config::{RotationConfig, RunConfig};
//! use windtunnel_driver::collab::{MeshSource, NoFrames};
//! use windtunnel_driver::synthetic::{BoxMeshSource, SyntheticSolver};
//! use windtunnel_driver::{RunDirectory, SimulationLoop};
//!
//! # fn main() -> Result<(), windtunnel_driver::DriverError> {
//! let config = RunConfig::default()
//!     .with_duration(0.5)
//!     .with_rotation(RotationConfig::new(0.1, 0.3, 1.57));
//!
//! let sim = SimulationLoop::new(config.clone())?;
//! let dirs = RunDirectory::create(std::path::Path::new("export"), "pitch", &config)?;
//! let mut mesh = BoxMeshSource::default().load(&config.body.mesh)?;
//! let mut solver = SyntheticSolver::new(sim.plan().grid);
//!
//! let report = sim.run(&mut solver, &mut mesh, &mut NoFrames, &dirs)?;
//! println!("{} revoxelizations", report.revoxelizations);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collab;
pub mod error;
pub mod output;
pub mod runner;
pub mod setup;
pub mod summary;
pub mod synthetic;

pub use collab::{BodyMesh, FrameRenderer, MeshSource, Solver, VoxelFlags, BODY_FLAGS};
pub use error::{DriverError, DriverResult};
pub use output::{read_config, CoefficientLog, RunDirectory};
pub use runner::{RunReport, SimulationLoop};
pub use summary::{CoefficientTable, SteadyState};
