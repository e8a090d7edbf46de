//! Simulation box sizing.
//!
//! The grid is chosen from a box aspect ratio and a device memory budget: the
//! aspect ratio is scaled uniformly until the cell count times the bytes per
//! cell fills the budget.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Number of discrete velocities of the D3Q19 lattice.
pub const VELOCITY_SET: u64 = 19;

/// Storage precision of the lattice populations.
///
/// Only affects memory sizing and the name of the data directory; the solver
/// variant itself is selected when the solver is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoragePrecision {
    /// 32-bit float populations.
    #[default]
    #[serde(rename = "FP32")]
    Fp32,
    /// 16-bit populations, IEEE half compression.
    #[serde(rename = "FP16S")]
    Fp16S,
    /// 16-bit populations, custom compression.
    #[serde(rename = "FP16C")]
    Fp16C,
}

impl StoragePrecision {
    /// Directory label for exported data.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Fp32 => "FP32",
            Self::Fp16S => "FP16S",
            Self::Fp16C => "FP16C",
        }
    }

    /// Bytes per population value.
    #[must_use]
    pub const fn population_bytes(&self) -> u64 {
        match self {
            Self::Fp32 => 4,
            Self::Fp16S | Self::Fp16C => 2,
        }
    }

    /// Device bytes per cell: populations, density, velocity, flags and force field.
    #[must_use]
    pub const fn bytes_per_cell(&self) -> u64 {
        VELOCITY_SET * self.population_bytes() + 4 + 12 + 1 + 12
    }
}

/// Grid size in cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridResolution {
    /// Cells along x.
    pub x: u32,
    /// Cells along y.
    pub y: u32,
    /// Cells along z.
    pub z: u32,
}

impl GridResolution {
    /// Create a resolution.
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Total number of cells, saturating at `u64::MAX`.
    #[must_use]
    pub fn cells(&self) -> u64 {
        u64::from(self.x)
            .saturating_mul(u64::from(self.y))
            .saturating_mul(u64::from(self.z))
    }

    /// Exact device bytes at `precision`, `None` past `u64::MAX`.
    #[must_use]
    pub fn device_bytes(&self, precision: StoragePrecision) -> Option<u64> {
        u64::from(self.x)
            .checked_mul(u64::from(self.y))?
            .checked_mul(u64::from(self.z))?
            .checked_mul(precision.bytes_per_cell())
    }

    /// Geometric center in cell coordinates.
    #[must_use]
    pub fn center(&self) -> Vector3<f64> {
        Vector3::new(
            0.5 * f64::from(self.x) - 0.5,
            0.5 * f64::from(self.y) - 0.5,
            0.5 * f64::from(self.z) - 0.5,
        )
    }

    /// Device memory needed at `precision`, in MiB.
    #[must_use]
    pub fn memory_mb(&self, precision: StoragePrecision) -> f64 {
        let cells = f64::from(self.x) * f64::from(self.y) * f64::from(self.z);
        cells * precision.bytes_per_cell() as f64 / 1_048_576.0
    }
}

/// Largest grid with the given aspect ratio that fits in `memory_mb` MiB.
///
/// # Errors
///
/// Returns [`CoreError::InvalidDomain`] when the aspect ratio or budget is
/// non-positive, or the budget is too small for a single cell per axis.
pub fn resolution(
    aspect: [f64; 3],
    memory_mb: u64,
    precision: StoragePrecision,
) -> CoreResult<GridResolution> {
    if aspect.iter().any(|a| !(a.is_finite() && *a > 0.0)) {
        return Err(CoreError::InvalidDomain {
            reason: format!("aspect ratio {aspect:?} must be finite and > 0"),
        });
    }
    if memory_mb == 0 {
        return Err(CoreError::InvalidDomain {
            reason: "memory budget must be > 0 MiB".to_string(),
        });
    }

    let unit_box_mb =
        aspect[0] * aspect[1] * aspect[2] * precision.bytes_per_cell() as f64 / 1_048_576.0;
    let scaling = (memory_mb as f64 / unit_box_mb).cbrt();
    let [x, y, z] = aspect.map(|a| (scaling * a).round());

    if [x, y, z].iter().any(|n| *n < 1.0 || *n > f64::from(u32::MAX)) {
        return Err(CoreError::InvalidDomain {
            reason: format!("{memory_mb} MiB does not fit aspect ratio {aspect:?}"),
        });
    }
    let grid = GridResolution::new(x as u32, y as u32, z as u32);
    if grid.device_bytes(precision).is_none() {
        return Err(CoreError::InvalidDomain {
            reason: format!("{memory_mb} MiB exceeds the addressable byte range"),
        });
    }
    Ok(grid)
}
