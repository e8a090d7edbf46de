//! Body placement in the simulation box.
//!
//! The mesh is scaled so its `y` extent equals the body length in cells,
//! centered on the box center plus the configured offset, then turned to its
//! base attitude about its own center. The placed center becomes the pivot of
//! every later rotation and the reference point for torques.

use nalgebra::Vector3;
use windtunnel_core::config::BodyConfig;
use windtunnel_core::geometry::{initial_attitude, GeometryState};

use crate::collab::BodyMesh;
use crate::error::{DriverError, DriverResult};

/// Where the body ended up after placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Placement {
    /// Factor applied to the raw mesh.
    pub scale: f64,
    /// Body center in cell coordinates.
    pub center: Vector3<f64>,
}

impl Placement {
    /// Geometry state pivoting about the placed center.
    #[must_use]
    pub fn geometry(&self) -> GeometryState {
        GeometryState::new(self.center)
    }
}

/// Scale, move and orient `mesh` inside a box centered at `domain_center`.
///
/// # Errors
///
/// Returns [`DriverError::Mesh`] when the mesh has no extent along `y` or the
/// body length is not positive.
pub fn place_body<M: BodyMesh>(
    mesh: &mut M,
    body: &BodyConfig,
    domain_center: &Vector3<f64>,
    sim_length: f64,
) -> DriverResult<Placement> {
    let extent = mesh.bounding_size().y;
    if !(extent.is_finite() && extent > 0.0 && sim_length.is_finite() && sim_length > 0.0) {
        return Err(DriverError::Mesh {
            path: body.mesh.clone(),
            reason: format!("cannot scale y extent {extent} to {sim_length} cells"),
        });
    }

    let scale = sim_length / extent;
    mesh.scale(scale);

    let target = domain_center + Vector3::from(body.offset) * sim_length;
    let shift = target - mesh.center();
    mesh.translate(&shift);

    let center = mesh.center();
    mesh.rotate(&initial_attitude(body.pitch_deg, body.yaw_deg), &center);

    tracing::debug!(
        "Placed body: scale {:.4}, center ({:.1}, {:.1}, {:.1})",
        scale,
        center.x,
        center.y,
        center.z
    );

    Ok(Placement { scale, center })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::BoxMesh;

    #[test]
    fn test_place_body_scales_and_centers() {
        let mut mesh = BoxMesh::new(Vector3::new(0.5, 2.0, 0.25));
        let body = BodyConfig {
            pitch_deg: 180.0,
            ..BodyConfig::default()
        };
        let center = Vector3::new(50.0, 100.0, 80.0);

        let placement = place_body(&mut mesh, &body, &center, 66.0).unwrap();
        assert!((placement.scale - 33.0).abs() < 1e-12);

        // half a body length below the box center along y
        let expected = Vector3::new(50.0, 67.0, 80.0);
        assert!((placement.center - expected).norm() < 1e-9);
        assert!((mesh.center() - expected).norm() < 1e-9);

        // a half turn about x keeps the extents
        let size = mesh.bounding_size();
        assert!((size.y - 66.0).abs() < 1e-9);
        assert!((size.x - 16.5).abs() < 1e-9);
    }

    #[test]
    fn test_quarter_pitch_swaps_extents() {
        let mut mesh = BoxMesh::new(Vector3::new(1.0, 4.0, 2.0));
        let body = BodyConfig {
            pitch_deg: 90.0,
            offset: [0.0; 3],
            ..BodyConfig::default()
        };
        let placement = place_body(&mut mesh, &body, &Vector3::zeros(), 40.0).unwrap();
        assert!(placement.center.norm() < 1e-9);

        // 180 - 90 = 90 degrees about x exchanges y and z
        let size = mesh.bounding_size();
        assert!((size.z - 40.0).abs() < 1e-9);
        assert!((size.y - 20.0).abs() < 1e-9);
        assert!(placement.geometry().accumulated_angle().abs() < 1e-12);
    }

    #[test]
    fn test_flat_mesh_rejected() {
        let mut mesh = BoxMesh::new(Vector3::new(1.0, 0.0, 1.0));
        let err = place_body(&mut mesh, &BodyConfig::default(), &Vector3::zeros(), 10.0);
        assert!(matches!(err, Err(DriverError::Mesh { .. })));
    }
}
