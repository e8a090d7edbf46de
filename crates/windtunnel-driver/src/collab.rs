//! Interfaces of the external collaborators.
//!
//! The driver never touches lattice numerics, mesh rasterization or image
//! encoding. It talks to those capabilities only through the traits below:
//!
//! ```text
//!                    ┌───────────────────┐
//!                    │  SimulationLoop   │
//!                    └──┬──────┬──────┬──┘
//!          load/place   │      │      │  set_camera / write_frame
//!        ┌──────────────┘      │      └──────────────┐
//!        ▼                     ▼                     ▼
//! ┌──────────────┐   ┌───────────────────┐   ┌───────────────┐
//! │ MeshSource / │   │ Solver            │   │ FrameRenderer │
//! │ BodyMesh     │   │ advance/rasterize │   │               │
//! └──────────────┘   │ forces/torques    │   └───────────────┘
//!                    │ persist_status    │
//!                    └───────────────────┘
//! ```

use std::path::{Path, PathBuf};

use nalgebra::{Rotation3, Vector3};
use windtunnel_core::config::CameraConfig;

use crate::error::DriverResult;

bitflags::bitflags! {
    /// Voxel flag mask passed to rasterization and force read-back.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct VoxelFlags: u8 {
        /// Solid boundary.
        const SOLID = 0b0000_0001;
        /// Equilibrium boundary.
        const EQUILIBRIUM = 0b0000_0010;
        /// Marker for the body whose forces are integrated.
        const FIXED = 0b0100_0000;
    }
}

/// Flags of the body voxels: solid and included in force integration.
pub const BODY_FLAGS: VoxelFlags = VoxelFlags::SOLID.union(VoxelFlags::FIXED);

/// A triangle mesh the driver can scale, move and rotate.
pub trait BodyMesh {
    /// Axis-aligned bounding-box extents.
    fn bounding_size(&self) -> Vector3<f64>;

    /// Bounding-box center.
    fn center(&self) -> Vector3<f64>;

    /// Scale every vertex about the origin.
    fn scale(&mut self, factor: f64);

    /// Translate every vertex.
    fn translate(&mut self, offset: &Vector3<f64>);

    /// Rotate every vertex about `pivot`.
    fn rotate(&mut self, rotation: &Rotation3<f64>, pivot: &Vector3<f64>);
}

/// Loads meshes from disk.
pub trait MeshSource {
    /// Mesh type produced.
    type Mesh: BodyMesh;

    /// Load the mesh stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DriverError::Mesh`] or [`crate::DriverError::Io`].
    fn load(&self, path: &Path) -> DriverResult<Self::Mesh>;
}

/// The lattice solver advancing the fluid state.
pub trait Solver {
    /// Mesh type the solver can rasterize.
    type Mesh: BodyMesh;

    /// Center of the simulation box in cell coordinates.
    fn domain_center(&self) -> Vector3<f64>;

    /// Set the initial and boundary inflow velocity (simulation units).
    ///
    /// # Errors
    ///
    /// Returns a solver error when the velocity cannot be applied.
    fn configure_flow(&mut self, inflow: &Vector3<f64>) -> DriverResult<()>;

    /// Advance `steps` time steps. `advance(0)` only initializes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DriverError::SolverDivergence`] on numerical failure.
    fn advance(&mut self, steps: u64) -> DriverResult<()>;

    /// Current simulation step.
    fn simulated_time(&self) -> u64;

    /// Rasterize `mesh` into voxel `flags`, giving moving-wall voxels the
    /// velocity of a rotation about `pivot` at `angular_velocity` (rad/step).
    ///
    /// # Errors
    ///
    /// Returns a solver error when rasterization fails.
    fn rasterize(
        &mut self,
        mesh: &Self::Mesh,
        flags: VoxelFlags,
        pivot: &Vector3<f64>,
        angular_velocity: &Vector3<f64>,
    ) -> DriverResult<()>;

    /// Total force on voxels matching `flags` (simulation units).
    ///
    /// # Errors
    ///
    /// Returns a solver error when read-back fails.
    fn read_back_forces(&mut self, flags: VoxelFlags) -> DriverResult<Vector3<f64>>;

    /// Total torque about `pivot` on voxels matching `flags` (simulation units).
    ///
    /// # Errors
    ///
    /// Returns a solver error when read-back fails.
    fn read_back_torques(
        &mut self,
        pivot: &Vector3<f64>,
        flags: VoxelFlags,
    ) -> DriverResult<Vector3<f64>>;

    /// Write a status snapshot into `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DriverError::Io`] when the snapshot cannot be written.
    fn persist_status(&mut self, dir: &Path) -> DriverResult<()>;
}

/// Renders and stores visual frames.
pub trait FrameRenderer {
    /// Position the camera for the next frame.
    fn set_camera(&mut self, camera: &CameraConfig);

    /// Render the current state into `dir`.
    ///
    /// Returns the written file, or `None` when the renderer stores nothing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::DriverError::Render`] or [`crate::DriverError::Io`].
    fn write_frame(&mut self, dir: &Path, step: u64) -> DriverResult<Option<PathBuf>>;
}

/// Renderer for headless runs; any frame request is ignored.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFrames;

impl FrameRenderer for NoFrames {
    fn set_camera(&mut self, _camera: &CameraConfig) {}

    fn write_frame(&mut self, _dir: &Path, _step: u64) -> DriverResult<Option<PathBuf>> {
        Ok(None)
    }
}
