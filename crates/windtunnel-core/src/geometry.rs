//! Pose bookkeeping for the rotating body.
//!
//! The mesh itself lives with the external mesh collaborator; this module only
//! tracks how far the body has been rotated since it was placed and about which
//! point. Every change goes through [`GeometryState::apply_increment`], which
//! returns the delta rotation the caller must also hand to the mesh before
//! requesting a new rasterization.

use nalgebra::{Rotation3, Unit, Vector3};
use serde::{Deserialize, Serialize};

/// A rotation by `angle` radians about a fixed body axis.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RotationIncrement {
    /// Unit rotation axis.
    pub axis: Unit<Vector3<f64>>,
    /// Rotation angle in radians.
    pub angle: f64,
}

impl RotationIncrement {
    /// Create an increment about `axis`.
    #[must_use]
    pub fn new(axis: Unit<Vector3<f64>>, angle: f64) -> Self {
        Self { axis, angle }
    }

    /// Rotation matrix of this increment.
    #[must_use]
    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::from_axis_angle(&self.axis, self.angle)
    }
}

/// Current orientation and pivot of the body.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryState {
    pivot: Vector3<f64>,
    orientation: Rotation3<f64>,
    accumulated_angle: f64,
    increments: u64,
}

impl GeometryState {
    /// Body placed with no rotation applied yet.
    #[must_use]
    pub fn new(pivot: Vector3<f64>) -> Self {
        Self {
            pivot,
            orientation: Rotation3::identity(),
            accumulated_angle: 0.0,
            increments: 0,
        }
    }

    /// Compose `increment` onto the current orientation.
    ///
    /// Returns the delta rotation to forward to the mesh.
    pub fn apply_increment(&mut self, increment: &RotationIncrement) -> Rotation3<f64> {
        let delta = increment.rotation();
        self.orientation = delta * self.orientation;
        self.accumulated_angle += increment.angle;
        self.increments += 1;
        delta
    }

    /// Rotation center (simulation units).
    #[must_use]
    pub fn pivot(&self) -> Vector3<f64> {
        self.pivot
    }

    /// Rotation applied since the body was placed.
    #[must_use]
    pub fn orientation(&self) -> Rotation3<f64> {
        self.orientation
    }

    /// Sum of all increment angles (radians).
    #[must_use]
    pub fn accumulated_angle(&self) -> f64 {
        self.accumulated_angle
    }

    /// Number of increments applied.
    #[must_use]
    pub fn increment_count(&self) -> u64 {
        self.increments
    }
}

/// Initial attitude of the body: `Rz(yaw) · Ry(0) · Rx(180° − pitch)`.
///
/// A pitch of 90° leaves the body pointing along the inflow.
#[must_use]
pub fn initial_attitude(pitch_deg: f64, yaw_deg: f64) -> Rotation3<f64> {
    let rz = Rotation3::from_axis_angle(&Vector3::z_axis(), yaw_deg.to_radians());
    let ry = Rotation3::from_axis_angle(&Vector3::y_axis(), 0.0);
    let rx = Rotation3::from_axis_angle(&Vector3::x_axis(), (180.0 - pitch_deg).to_radians());
    rz * ry * rx
}
