//! Interferometric encoder/modulator.

use std::f64::consts::PI;

use crate::constants::db_to_amplitude;
use crate::errors::SimError;
use crate::math::{phasor, Scalar};

use super::model::{ComponentModel, SMap};

/// Mach–Zehnder amplitude modulator.
///
/// Two-port (`in`, `out`) with transmission `cos(Δφ/2)·e^(jΔφ/2)` under an
/// insertion-loss factor: the balanced-interferometer transfer function with
/// one arm driven by phase `Δφ`. `Δφ = 0` is the bar (fully transmitting)
/// state; `Δφ = π` is full extinction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MziModulator {
    delta_phase_rad: Scalar,
    insertion_loss_db: Scalar,
}

impl MziModulator {
    /// Creates a modulator at drive phase `delta_phase_rad` in `[0, 2π]`.
    pub fn new(delta_phase_rad: Scalar, insertion_loss_db: Scalar) -> Result<Self, SimError> {
        if !(0.0..=2.0 * PI).contains(&delta_phase_rad) {
            return Err(SimError::invalid_parameter(
                "mzi_modulator",
                "delta_phase_rad",
                format!("must lie in [0, 2π], got {delta_phase_rad}"),
            ));
        }
        if insertion_loss_db < 0.0 {
            return Err(SimError::invalid_parameter(
                "mzi_modulator",
                "insertion_loss_db",
                format!("must be non-negative, got {insertion_loss_db}"),
            ));
        }
        Ok(Self {
            delta_phase_rad,
            insertion_loss_db,
        })
    }

    /// Fully transmitting (bar-state) modulator with the given insertion loss.
    pub fn bar(insertion_loss_db: Scalar) -> Result<Self, SimError> {
        Self::new(0.0, insertion_loss_db)
    }

    /// Field transmission magnitude at the configured drive phase.
    #[must_use]
    pub fn transmission(&self) -> Scalar {
        (self.delta_phase_rad / 2.0).cos().abs() * db_to_amplitude(self.insertion_loss_db)
    }
}

impl ComponentModel for MziModulator {
    fn kind(&self) -> &'static str {
        "mzi_modulator"
    }

    fn ports(&self) -> Vec<String> {
        vec!["in".into(), "out".into()]
    }

    fn scattering(&self, wavelength_nm: Scalar) -> Result<SMap, SimError> {
        if wavelength_nm <= 0.0 || !wavelength_nm.is_finite() {
            return Err(SimError::invalid_parameter(
                self.kind(),
                "wavelength_nm",
                format!("must be positive and finite, got {wavelength_nm}"),
            ));
        }
        let half = self.delta_phase_rad / 2.0;
        let t = half.cos() * db_to_amplitude(self.insertion_loss_db);
        let mut map = SMap::new();
        map.insert_symmetric("in", "out", phasor(half) * t);
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn bar_state_transmits_fully() {
        let m = MziModulator::bar(0.0).unwrap();
        let map = m.scattering(1550.0).unwrap();
        assert_relative_eq!(map.coeff("in", "out").norm(), 1.0, epsilon = 1.0e-12);
        assert!(map.is_reciprocal(1.0e-12));
        assert!(map.is_passive(1.0e-12));
    }

    #[test]
    fn cross_state_extinguishes() {
        let m = MziModulator::new(PI, 0.0).unwrap();
        let map = m.scattering(1550.0).unwrap();
        assert_relative_eq!(map.coeff("in", "out").norm(), 0.0, epsilon = 1.0e-12);
    }

    #[test]
    fn quadrature_point_halves_power() {
        let m = MziModulator::new(PI / 2.0, 0.0).unwrap();
        let map = m.scattering(1550.0).unwrap();
        assert_relative_eq!(map.coeff("in", "out").norm_sqr(), 0.5, epsilon = 1.0e-12);
    }

    #[test]
    fn drive_phase_outside_range_is_rejected() {
        assert!(MziModulator::new(-0.1, 0.0).is_err());
        assert!(MziModulator::new(7.0, 0.0).is_err());
    }
}
