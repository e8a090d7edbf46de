//! Deterministic stand-ins for the solver, mesh and renderer.
//!
//! Used for dry runs of a configuration and by the tests. The synthetic solver
//! does no fluid dynamics: its force is the dynamic pressure of the inflow on
//! the frontal area of the last rasterized mesh, with a slow lift oscillation,
//! so rotating the body visibly changes the recorded coefficients.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::{Rotation3, Vector3};
use windtunnel_core::config::CameraConfig;
use windtunnel_core::GridResolution;

use crate::collab::{BodyMesh, FrameRenderer, MeshSource, Solver, VoxelFlags};
use crate::error::{DriverError, DriverResult};

// ============================================================================
// Mesh
// ============================================================================

/// Box-shaped body given by its eight corners.
#[derive(Clone, Debug, PartialEq)]
pub struct BoxMesh {
    corners: [Vector3<f64>; 8],
}

impl BoxMesh {
    /// Axis-aligned box of `size` centered at the origin.
    #[must_use]
    pub fn new(size: Vector3<f64>) -> Self {
        let h = size * 0.5;
        let mut corners = [Vector3::zeros(); 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            *corner = Vector3::new(
                if i & 1 == 0 { -h.x } else { h.x },
                if i & 2 == 0 { -h.y } else { h.y },
                if i & 4 == 0 { -h.z } else { h.z },
            );
        }
        Self { corners }
    }

    fn bounds(&self) -> (Vector3<f64>, Vector3<f64>) {
        self.corners.iter().fold(
            (Vector3::repeat(f64::INFINITY), Vector3::repeat(f64::NEG_INFINITY)),
            |(lo, hi), c| (lo.inf(c), hi.sup(c)),
        )
    }
}

impl BodyMesh for BoxMesh {
    fn bounding_size(&self) -> Vector3<f64> {
        let (lo, hi) = self.bounds();
        hi - lo
    }

    fn center(&self) -> Vector3<f64> {
        let (lo, hi) = self.bounds();
        (lo + hi) * 0.5
    }

    fn scale(&mut self, factor: f64) {
        for c in &mut self.corners {
            *c *= factor;
        }
    }

    fn translate(&mut self, offset: &Vector3<f64>) {
        for c in &mut self.corners {
            *c += offset;
        }
    }

    fn rotate(&mut self, rotation: &Rotation3<f64>, pivot: &Vector3<f64>) {
        for c in &mut self.corners {
            *c = pivot + rotation * (*c - pivot);
        }
    }
}

/// Produces a [`BoxMesh`] for any mesh path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxMeshSource {
    size: Vector3<f64>,
}

impl BoxMeshSource {
    /// Source of boxes with the given raw extents.
    #[must_use]
    pub fn new(size: Vector3<f64>) -> Self {
        Self { size }
    }
}

impl Default for BoxMeshSource {
    /// A slender body, four times longer than it is wide.
    fn default() -> Self {
        Self::new(Vector3::new(0.25, 1.0, 0.25))
    }
}

impl MeshSource for BoxMeshSource {
    type Mesh = BoxMesh;

    fn load(&self, path: &Path) -> DriverResult<BoxMesh> {
        tracing::debug!("Synthetic mesh stands in for {}", path.display());
        Ok(BoxMesh::new(self.size))
    }
}

// ============================================================================
// Solver
// ============================================================================

/// Deterministic solver with optional injected divergence.
#[derive(Clone, Debug)]
pub struct SyntheticSolver {
    grid: GridResolution,
    step: u64,
    inflow: Vector3<f64>,
    frontal_area: f64,
    lever: f64,
    rasterizations: Vec<u64>,
    status_writes: u64,
    diverge_at: Option<u64>,
}

impl SyntheticSolver {
    /// Solver for a box of `grid` cells.
    #[must_use]
    pub fn new(grid: GridResolution) -> Self {
        Self {
            grid,
            step: 0,
            inflow: Vector3::zeros(),
            frontal_area: 0.0,
            lever: 0.0,
            rasterizations: Vec::new(),
            status_writes: 0,
            diverge_at: None,
        }
    }

    /// Fail with a divergence once the run reaches `step`.
    #[must_use]
    pub fn with_divergence_at(mut self, step: u64) -> Self {
        self.diverge_at = Some(step);
        self
    }

    /// Steps at which the body was rasterized.
    #[must_use]
    pub fn rasterizations(&self) -> &[u64] {
        &self.rasterizations
    }

    /// Number of status snapshots written.
    #[must_use]
    pub fn status_writes(&self) -> u64 {
        self.status_writes
    }

    /// Frontal area of the last rasterized body (cells²).
    #[must_use]
    pub fn frontal_area(&self) -> f64 {
        self.frontal_area
    }

    fn drag(&self) -> f64 {
        0.5 * self.inflow.norm_squared() * self.frontal_area
    }

    fn lift(&self) -> f64 {
        0.1 * self.drag() * (self.step as f64 * 0.01).sin()
    }
}

impl Solver for SyntheticSolver {
    type Mesh = BoxMesh;

    fn domain_center(&self) -> Vector3<f64> {
        self.grid.center()
    }

    fn configure_flow(&mut self, inflow: &Vector3<f64>) -> DriverResult<()> {
        self.inflow = *inflow;
        Ok(())
    }

    fn advance(&mut self, steps: u64) -> DriverResult<()> {
        let target = self.step + steps;
        if let Some(step) = self.diverge_at.filter(|d| *d <= target) {
            self.step = step;
            return Err(DriverError::SolverDivergence {
                step,
                reason: "synthetic divergence".to_string(),
            });
        }
        self.step = target;
        Ok(())
    }

    fn simulated_time(&self) -> u64 {
        self.step
    }

    fn rasterize(
        &mut self,
        mesh: &BoxMesh,
        _flags: VoxelFlags,
        _pivot: &Vector3<f64>,
        _angular_velocity: &Vector3<f64>,
    ) -> DriverResult<()> {
        // inflow runs along +y
        let size = mesh.bounding_size();
        self.frontal_area = size.x * size.z;
        self.lever = 0.25 * size.y;
        self.rasterizations.push(self.step);
        Ok(())
    }

    fn read_back_forces(&mut self, _flags: VoxelFlags) -> DriverResult<Vector3<f64>> {
        Ok(Vector3::new(0.0, self.drag(), self.lift()))
    }

    fn read_back_torques(
        &mut self,
        _pivot: &Vector3<f64>,
        _flags: VoxelFlags,
    ) -> DriverResult<Vector3<f64>> {
        Ok(Vector3::new(-self.lift() * self.lever, 0.0, 0.0))
    }

    fn persist_status(&mut self, dir: &Path) -> DriverResult<()> {
        let path = dir.join("status.txt");
        let text = format!(
            "step {}\ngrid {}x{}x{}\nrasterizations {}\n",
            self.step,
            self.grid.x,
            self.grid.y,
            self.grid.z,
            self.rasterizations.len()
        );
        fs::write(&path, text).map_err(|e| DriverError::io(&path, e))?;
        self.status_writes += 1;
        Ok(())
    }
}

// ============================================================================
// Renderer
// ============================================================================

/// Writes a small text record per frame instead of an image.
#[derive(Clone, Debug, Default)]
pub struct SyntheticRenderer {
    camera: Option<CameraConfig>,
    frames: Vec<u64>,
}

impl SyntheticRenderer {
    /// Create a renderer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Steps at which frames were written.
    #[must_use]
    pub fn frames(&self) -> &[u64] {
        &self.frames
    }
}

impl FrameRenderer for SyntheticRenderer {
    fn set_camera(&mut self, camera: &CameraConfig) {
        self.camera = Some(*camera);
    }

    fn write_frame(&mut self, dir: &Path, step: u64) -> DriverResult<Option<PathBuf>> {
        let camera = self.camera.ok_or_else(|| DriverError::Render {
            step,
            reason: "camera not set".to_string(),
        })?;
        let path = dir.join(format!("frame_{step:09}.txt"));
        let text = format!(
            "step {step}\ncamera {} {} {} {}\n",
            camera.rx_deg, camera.ry_deg, camera.fov_deg, camera.zoom
        );
        fs::write(&path, text).map_err(|e| DriverError::io(&path, e))?;
        self.frames.push(step);
        Ok(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_box_mesh_transforms() {
        let mut mesh = BoxMesh::new(Vector3::new(1.0, 2.0, 3.0));
        assert!((mesh.bounding_size() - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-12);

        mesh.scale(2.0);
        mesh.translate(&Vector3::new(10.0, 0.0, 0.0));
        assert!((mesh.center() - Vector3::new(10.0, 0.0, 0.0)).norm() < 1e-12);

        let pivot = mesh.center();
        mesh.rotate(&Rotation3::from_axis_angle(&Vector3::z_axis(), FRAC_PI_2), &pivot);
        assert!((mesh.bounding_size() - Vector3::new(4.0, 2.0, 6.0)).norm() < 1e-9);
        assert!((mesh.center() - pivot).norm() < 1e-9);
    }

    #[test]
    fn test_divergence_stops_at_step() {
        let mut solver = SyntheticSolver::new(GridResolution::new(8, 8, 8)).with_divergence_at(5);
        solver.advance(3).unwrap();
        let err = solver.advance(4).unwrap_err();
        assert!(matches!(err, DriverError::SolverDivergence { step: 5, .. }));
        assert_eq!(solver.simulated_time(), 5);
    }

    #[test]
    fn test_drag_follows_frontal_area() {
        let mut solver = SyntheticSolver::new(GridResolution::new(8, 8, 8));
        solver.configure_flow(&Vector3::new(0.0, 0.1, 0.0)).unwrap();

        let mut mesh = BoxMesh::new(Vector3::new(1.0, 4.0, 2.0));
        solver
            .rasterize(&mesh, VoxelFlags::SOLID, &Vector3::zeros(), &Vector3::zeros())
            .unwrap();
        let narrow = solver.read_back_forces(VoxelFlags::SOLID).unwrap().y;

        mesh.rotate(&Rotation3::from_axis_angle(&Vector3::x_axis(), FRAC_PI_2), &Vector3::zeros());
        solver
            .rasterize(&mesh, VoxelFlags::SOLID, &Vector3::zeros(), &Vector3::zeros())
            .unwrap();
        let broad = solver.read_back_forces(VoxelFlags::SOLID).unwrap().y;

        assert!((narrow - 0.5 * 0.01 * 2.0).abs() < 1e-12);
        assert!((solver.frontal_area() - 4.0).abs() < 1e-9);
        assert!((broad - 0.5 * 0.01 * 4.0).abs() < 1e-9);
        assert_eq!(solver.rasterizations(), &[0, 0]);
    }

    #[test]
    fn test_renderer_needs_camera() {
        let dir = tempfile::tempdir().unwrap();
        let mut renderer = SyntheticRenderer::new();
        assert!(matches!(
            renderer.write_frame(dir.path(), 1),
            Err(DriverError::Render { step: 1, .. })
        ));
        assert!(renderer.frames().is_empty());

        renderer.set_camera(&CameraConfig::default());
        let frame = renderer.write_frame(dir.path(), 12).unwrap().unwrap();
        assert_eq!(frame, dir.path().join("frame_000000012.txt"));
        assert_eq!(renderer.frames(), &[12]);
    }
}
