//! Physical (SI) ⇄ simulation unit conversion.
//!
//! The simulation works in non-dimensional lattice units. A run fixes three
//! reference pairs (length, velocity, density), and every other quantity is
//! derived from them:
//!
//! ```text
//! metre    = si_length / sim_length
//! second   = metre * sim_velocity / si_velocity
//! kilogram = (si_density / sim_density) * metre³
//! ```
//!
//! Because viscosity is converted with the same `metre²/second` factor as
//! `length * velocity`, the Reynolds number of the physical setup is exactly
//! the Reynolds number seen by the solver.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Kind of physical quantity handled by [`UnitSystem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    /// Length in metres.
    Length,
    /// Time in seconds.
    Time,
    /// Velocity in m/s.
    Velocity,
    /// Density in kg/m³.
    Density,
    /// Kinematic viscosity in m²/s.
    KinematicViscosity,
    /// Force in newtons.
    Force,
    /// Torque in newton-metres.
    Torque,
    /// Angular velocity in rad/s.
    AngularVelocity,
}

impl Quantity {
    /// All quantity kinds, in display order.
    pub const ALL: [Self; 8] = [
        Self::Length,
        Self::Time,
        Self::Velocity,
        Self::Density,
        Self::KinematicViscosity,
        Self::Force,
        Self::Torque,
        Self::AngularVelocity,
    ];

    /// SI unit symbol.
    #[must_use]
    pub const fn si_symbol(&self) -> &'static str {
        match self {
            Self::Length => "m",
            Self::Time => "s",
            Self::Velocity => "m/s",
            Self::Density => "kg/m^3",
            Self::KinematicViscosity => "m^2/s",
            Self::Force => "N",
            Self::Torque => "N m",
            Self::AngularVelocity => "rad/s",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Length => "length",
            Self::Time => "time",
            Self::Velocity => "velocity",
            Self::Density => "density",
            Self::KinematicViscosity => "kinematic viscosity",
            Self::Force => "force",
            Self::Torque => "torque",
            Self::AngularVelocity => "angular velocity",
        }
    }
}

/// Bidirectional mapping between SI quantities and simulation units.
///
/// Built once per run and never mutated; it is `Copy` so every component can
/// hold its own read-only value. Only the six reference values are read back
/// on deserialization; the factors are derived again.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UnitFields")]
pub struct UnitSystem {
    sim_length: f64,
    sim_velocity: f64,
    sim_density: f64,
    si_length: f64,
    si_velocity: f64,
    si_density: f64,
    /// Metres per simulation length unit.
    metre: f64,
    /// Seconds per simulation time step.
    second: f64,
    /// Kilograms per simulation mass unit.
    kilogram: f64,
}

/// Wire form of [`UnitSystem`].
#[derive(Deserialize)]
struct UnitFields {
    sim_length: f64,
    sim_velocity: f64,
    sim_density: f64,
    si_length: f64,
    si_velocity: f64,
    si_density: f64,
}

impl TryFrom<UnitFields> for UnitSystem {
    type Error = CoreError;

    fn try_from(f: UnitFields) -> CoreResult<Self> {
        Self::new(
            f.sim_length,
            f.sim_velocity,
            f.sim_density,
            f.si_length,
            f.si_velocity,
            f.si_density,
        )
    }
}

impl UnitSystem {
    /// Derive the conversion factors from three reference pairs.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUnitConfiguration`] when any argument is
    /// zero, negative or not finite.
    pub fn new(
        sim_length: f64,
        sim_velocity: f64,
        sim_density: f64,
        si_length: f64,
        si_velocity: f64,
        si_density: f64,
    ) -> CoreResult<Self> {
        let sim_length = CoreError::require_positive("sim_length", sim_length)?;
        let sim_velocity = CoreError::require_positive("sim_velocity", sim_velocity)?;
        let sim_density = CoreError::require_positive("sim_density", sim_density)?;
        let si_length = CoreError::require_positive("si_length", si_length)?;
        let si_velocity = CoreError::require_positive("si_velocity", si_velocity)?;
        let si_density = CoreError::require_positive("si_density", si_density)?;

        let metre = si_length / sim_length;
        let second = metre * sim_velocity / si_velocity;
        let kilogram = si_density / sim_density * metre * metre * metre;

        Ok(Self {
            sim_length,
            sim_velocity,
            sim_density,
            si_length,
            si_velocity,
            si_density,
            metre,
            second,
            kilogram,
        })
    }

    /// SI value of one simulation unit of `quantity`.
    #[must_use]
    pub fn scale(&self, quantity: Quantity) -> f64 {
        let (m, s, kg) = (self.metre, self.second, self.kilogram);
        match quantity {
            Quantity::Length => m,
            Quantity::Time => s,
            Quantity::Velocity => m / s,
            Quantity::Density => kg / (m * m * m),
            Quantity::KinematicViscosity => m * m / s,
            Quantity::Force => kg * m / (s * s),
            Quantity::Torque => kg * m * m / (s * s),
            Quantity::AngularVelocity => 1.0 / s,
        }
    }

    /// Convert an SI value into simulation units.
    #[must_use]
    pub fn to_sim(&self, si_value: f64, quantity: Quantity) -> f64 {
        si_value / self.scale(quantity)
    }

    /// Convert a simulation-unit value into SI.
    #[must_use]
    pub fn to_si(&self, sim_value: f64, quantity: Quantity) -> f64 {
        sim_value * self.scale(quantity)
    }

    /// Convert a physical kinematic viscosity, rejecting non-positive values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidUnitConfiguration`] when `si_viscosity`
    /// is zero, negative or not finite.
    pub fn viscosity_to_sim(&self, si_viscosity: f64) -> CoreResult<f64> {
        let nu = CoreError::require_positive("si_viscosity", si_viscosity)?;
        Ok(self.to_sim(nu, Quantity::KinematicViscosity))
    }

    /// Whole number of simulation steps covering `si_time` seconds (rounded).
    #[must_use]
    pub fn steps(&self, si_time: f64) -> u64 {
        let steps = self.to_sim(si_time, Quantity::Time).round();
        if steps.is_finite() && steps > 0.0 {
            steps as u64
        } else {
            0
        }
    }

    /// Physical time in seconds at simulation step `step`.
    #[must_use]
    pub fn seconds_at(&self, step: u64) -> f64 {
        self.to_si(step as f64, Quantity::Time)
    }

    /// Reference simulation length.
    #[must_use]
    pub fn sim_length(&self) -> f64 {
        self.sim_length
    }

    /// Reference simulation velocity.
    #[must_use]
    pub fn sim_velocity(&self) -> f64 {
        self.sim_velocity
    }

    /// Reference simulation density.
    #[must_use]
    pub fn sim_density(&self) -> f64 {
        self.sim_density
    }

    /// Physical characteristic length (m).
    #[must_use]
    pub fn si_length(&self) -> f64 {
        self.si_length
    }

    /// Physical characteristic velocity (m/s).
    #[must_use]
    pub fn si_velocity(&self) -> f64 {
        self.si_velocity
    }

    /// Physical reference density (kg/m³).
    #[must_use]
    pub fn si_density(&self) -> f64 {
        self.si_density
    }

    /// Dynamic pressure `0.5 ρ u²` of the reference flow, in Pa.
    #[must_use]
    pub fn dynamic_pressure(&self) -> f64 {
        0.5 * self.si_density * self.si_velocity * self.si_velocity
    }
}

/// Reynolds number `u L / ν` in any consistent unit system.
#[must_use]
pub fn reynolds(length: f64, velocity: f64, viscosity: f64) -> f64 {
    velocity * length / viscosity
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_units() -> UnitSystem {
        UnitSystem::new(330.0, 0.1, 1.0, 1.0, 17.0, 1.225).unwrap()
    }

    #[test]
    fn test_decoding_rederives_factors() {
        let units = reference_units();
        let json = serde_json::to_string(&units).unwrap();
        let back: UnitSystem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, units);

        // stale factors are ignored in favour of the reference values
        let tampered = json.replace("\"metre\":", "\"metre\":1e9,\"_old_metre\":");
        let back: UnitSystem = serde_json::from_str(&tampered).unwrap();
        assert!((back.scale(Quantity::Length) - 1.0 / 330.0).abs() < 1e-15);

        let negative = r#"{
            "sim_length": 330.0, "sim_velocity": 0.1, "sim_density": 1.0,
            "si_length": -1.0, "si_velocity": 17.0, "si_density": 1.225
        }"#;
        assert!(matches!(
            serde_json::from_str::<UnitSystem>(negative),
            Err(e) if e.to_string().contains("si_length")
        ));
    }

    fn rel_close(a: f64, b: f64, tol: f64) -> bool {
        ((a - b) / b).abs() < tol
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        assert!(UnitSystem::new(0.0, 0.1, 1.0, 1.0, 17.0, 1.225).is_err());
        assert!(UnitSystem::new(330.0, 0.1, 1.0, -1.0, 17.0, 1.225).is_err());
        assert!(UnitSystem::new(330.0, 0.1, 1.0, 1.0, 0.0, 1.225).is_err());
        assert!(UnitSystem::new(330.0, f64::NAN, 1.0, 1.0, 17.0, 1.225).is_err());

        let units = reference_units();
        assert!(matches!(
            units.viscosity_to_sim(0.0),
            Err(CoreError::InvalidUnitConfiguration { quantity: "si_viscosity", .. })
        ));
        assert!(units.viscosity_to_sim(-1.0e-5).is_err());
    }

    #[test]
    fn test_round_trip_every_quantity() {
        let units = reference_units();
        for quantity in Quantity::ALL {
            for x in [1.0e-6, 0.37, 1.0, 42.0, 1.0e5] {
                let back = units.to_sim(units.to_si(x, quantity), quantity);
                assert!(rel_close(back, x, 1e-12), "{quantity:?}: {x} -> {back}");
                let back = units.to_si(units.to_sim(x, quantity), quantity);
                assert!(rel_close(back, x, 1e-12), "{quantity:?}: {x} -> {back}");
            }
        }
    }

    #[test]
    fn test_reference_pairs_map_onto_each_other() {
        let units = reference_units();
        assert!(rel_close(units.to_sim(1.0, Quantity::Length), 330.0, 1e-12));
        assert!(rel_close(units.to_sim(17.0, Quantity::Velocity), 0.1, 1e-12));
        assert!(rel_close(units.to_sim(1.225, Quantity::Density), 1.0, 1e-12));
    }

    #[test]
    fn test_reynolds_preserved() {
        for (l, u, nu) in [(1.0, 17.0, 1.48e-5), (0.2, 3.0, 1.0e-6), (4.0, 0.5, 2.0e-3)] {
            let units = UnitSystem::new(128.0, 0.05, 1.0, l, u, 1.0).unwrap();
            let re_si = reynolds(l, u, nu);
            let re_sim = reynolds(
                units.sim_length(),
                units.sim_velocity(),
                units.viscosity_to_sim(nu).unwrap(),
            );
            assert!(rel_close(re_sim, re_si, 1e-9), "{re_si} vs {re_sim}");
        }
    }

    #[test]
    fn test_reference_scenario() {
        let units = reference_units();
        let nu_sim = units.viscosity_to_sim(1.48e-5).unwrap();

        // 1 step = (1/330) m * 0.1 / 17 m/s
        let dt = units.to_si(1.0, Quantity::Time);
        assert!(rel_close(dt, 1.0 / 330.0 * 0.1 / 17.0, 1e-12));
        assert!(rel_close(nu_sim, 1.48e-5 * dt * 330.0 * 330.0, 1e-12));

        let re = reynolds(330.0, 0.1, nu_sim);
        assert!(rel_close(re, 1.15e6, 0.01), "Re = {re}");
    }

    #[test]
    fn test_steps_rounds_to_whole_steps() {
        let units = reference_units();
        let per_second = 1.0 / units.to_si(1.0, Quantity::Time);
        assert_eq!(units.steps(1.0), per_second.round() as u64);
        assert_eq!(units.steps(0.0), 0);
        assert_eq!(units.steps(-2.0), 0);
        assert!((units.seconds_at(units.steps(1.0)) - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_dynamic_pressure() {
        let units = reference_units();
        assert!((units.dynamic_pressure() - 0.5 * 1.225 * 17.0 * 17.0).abs() < 1e-9);
    }
}
