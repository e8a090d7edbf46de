//! Windtunnel Core - unit, geometry and timing logic for rotating-body runs
//!
//! This crate holds the pure parts of a wind-tunnel run: everything that can
//! be decided from the configuration and the current simulation step without
//! touching the solver.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              RunConfig (SI)                              │
//! └───────────────────────────────────┬─────────────────────────────────────┘
//!                                     │ plan()
//!                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                               UnitSystem                                 │
//! │          metre / second / kilogram  ⇄  lattice units (Re preserved)      │
//! └───────────┬───────────────────────────────────────────┬─────────────────┘
//!             │                                           │
//!             ▼                                           ▼
//! ┌───────────────────────────┐             ┌───────────────────────────────┐
//! │ RevoxelizationScheduler   │             │ OutputSampler                 │
//! │  Idle → Rotating → Settled│             │  frame grid (video time)      │
//! │  StepPlan per iteration   │             │  force / torque coefficients  │
//! └─────────────┬─────────────┘             └───────────────────────────────┘
//!               │ RotationIncrement
//!               ▼
//! ┌───────────────────────────┐
//! │ GeometryState             │
//! │  pivot + accumulated pose │
//! └───────────────────────────┘
//! ```
//!
//! Every clock (solver steps, rotation window, video frames) is evaluated as a
//! function of the current simulation step, never as a counter of its own.
//!
//! # Example
//!
//! ```rust
//! use windtunnel_core::units::{reynolds, Quantity, UnitSystem};
//!
//! // 330 cells and 0.1 lattice velocity stand for 1 m at 17 m/s
//! let units = UnitSystem::new(330.0, 0.1, 1.0, 1.0, 17.0, 1.225).unwrap();
//! let nu = units.viscosity_to_sim(1.48e-5).unwrap();
//!
//! let re = reynolds(330.0, 0.1, nu);
//! assert!((re - 17.0 / 1.48e-5).abs() / re < 1e-9);
//! assert!((units.to_si(330.0, Quantity::Length) - 1.0).abs() < 1e-12);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod domain;
pub mod error;
pub mod geometry;
pub mod sampler;
pub mod schedule;
pub mod units;

pub use config::{RunConfig, RunPlan};
pub use domain::{GridResolution, StoragePrecision};
pub use error::{CoreError, CoreResult};
pub use geometry::{GeometryState, RotationIncrement};
pub use sampler::{ForceSample, FrameClock, OutputSampler, SampleCadence, TorqueSample};
pub use schedule::{RevoxelizationScheduler, RotationPhase, RotationWindow, StepPlan};
pub use units::{Quantity, UnitSystem};

/// Core crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
