//! Straight waveguides, bends, and dispersive effective-index models.

use std::f64::consts::PI;

use crate::constants::db_to_amplitude;
use crate::errors::SimError;
use crate::math::{phasor, Scalar};

use super::model::{ComponentModel, SMap};

/// Trait for wavelength-dependent effective-index models.
pub trait DispersionModel {
    /// Effective index at a vacuum wavelength (nm). Fails with
    /// [`SimError::InvalidParameter`] outside the model's validity range.
    fn effective_index(&self, wavelength_nm: Scalar) -> Result<Scalar, SimError>;
}

/// First-order dispersion around a reference wavelength, valid on a
/// documented interval.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearDispersion {
    n_ref: Scalar,
    slope_per_nm: Scalar,
    lambda_ref_nm: Scalar,
    valid_nm: (Scalar, Scalar),
}

impl LinearDispersion {
    /// Creates a linear dispersion model `n(λ) = n_ref + slope·(λ − λ_ref)`
    /// valid on `valid_nm = (min, max)`.
    pub fn new(
        n_ref: Scalar,
        slope_per_nm: Scalar,
        lambda_ref_nm: Scalar,
        valid_nm: (Scalar, Scalar),
    ) -> Result<Self, SimError> {
        if n_ref <= 0.0 {
            return Err(SimError::invalid_parameter(
                "dispersion model",
                "n_ref",
                format!("effective index must be positive, got {n_ref}"),
            ));
        }
        if valid_nm.0 <= 0.0 || valid_nm.1 <= valid_nm.0 {
            return Err(SimError::invalid_parameter(
                "dispersion model",
                "valid_nm",
                format!("range must satisfy 0 < min < max, got {valid_nm:?}"),
            ));
        }
        Ok(Self {
            n_ref,
            slope_per_nm,
            lambda_ref_nm,
            valid_nm,
        })
    }

    /// The documented validity interval (nm).
    #[must_use]
    pub fn valid_range(&self) -> (Scalar, Scalar) {
        self.valid_nm
    }
}

impl DispersionModel for LinearDispersion {
    fn effective_index(&self, wavelength_nm: Scalar) -> Result<Scalar, SimError> {
        if wavelength_nm < self.valid_nm.0 || wavelength_nm > self.valid_nm.1 {
            return Err(SimError::invalid_parameter(
                "dispersion model",
                "wavelength_nm",
                format!(
                    "{wavelength_nm} nm outside validity range [{}, {}] nm",
                    self.valid_nm.0, self.valid_nm.1
                ),
            ));
        }
        Ok(self.n_ref + self.slope_per_nm * (wavelength_nm - self.lambda_ref_nm))
    }
}

/// Accumulated propagation phase for a physical path: `2π·n_eff·L/λ`.
fn propagation_phase(n_eff: Scalar, length_um: Scalar, wavelength_nm: Scalar) -> Scalar {
    2.0 * PI * n_eff * (length_um * 1.0e3) / wavelength_nm
}

/// Straight single-mode waveguide segment.
///
/// Symmetric two-port (`in`, `out`): amplitude `10^(−loss_dB·L/20)`, phase
/// `2π·n_eff(λ)·L/λ`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Waveguide {
    length_um: Scalar,
    loss_db_per_cm: Scalar,
    index: LinearDispersion,
}

impl Waveguide {
    /// Creates a straight waveguide of `length_um` with propagation loss in
    /// dB/cm and the given effective-index model.
    pub fn new(
        length_um: Scalar,
        loss_db_per_cm: Scalar,
        index: LinearDispersion,
    ) -> Result<Self, SimError> {
        if length_um <= 0.0 {
            return Err(SimError::invalid_parameter(
                "waveguide",
                "length_um",
                format!("must be positive, got {length_um}"),
            ));
        }
        if loss_db_per_cm < 0.0 {
            return Err(SimError::invalid_parameter(
                "waveguide",
                "loss_db_per_cm",
                format!("must be non-negative, got {loss_db_per_cm}"),
            ));
        }
        Ok(Self {
            length_um,
            loss_db_per_cm,
            index,
        })
    }

    /// Physical length in micrometres.
    #[must_use]
    pub fn length_um(&self) -> Scalar {
        self.length_um
    }

    /// Expected propagation phase at a wavelength, for reference checks.
    pub fn phase_at(&self, wavelength_nm: Scalar) -> Result<Scalar, SimError> {
        let n = self.index.effective_index(wavelength_nm)?;
        Ok(propagation_phase(n, self.length_um, wavelength_nm))
    }
}

impl ComponentModel for Waveguide {
    fn kind(&self) -> &'static str {
        "waveguide"
    }

    fn ports(&self) -> Vec<String> {
        vec!["in".into(), "out".into()]
    }

    fn scattering(&self, wavelength_nm: Scalar) -> Result<SMap, SimError> {
        let n = self.index.effective_index(wavelength_nm)?;
        let phase = propagation_phase(n, self.length_um, wavelength_nm);
        let amp = db_to_amplitude(self.loss_db_per_cm * self.length_um * 1.0e-4);
        let mut map = SMap::new();
        map.insert_symmetric("in", "out", amp * phasor(phase));
        Ok(map)
    }
}

/// Circular waveguide bend.
///
/// Same propagation law as [`Waveguide`] over the arc length, plus a radius
/// dependent excess loss per traversal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bend {
    radius_um: Scalar,
    angle_deg: Scalar,
    excess_loss_db: Scalar,
    index: LinearDispersion,
}

impl Bend {
    /// Creates a bend of `radius_um` sweeping `angle_deg` with a fixed excess
    /// loss per traversal.
    pub fn new(
        radius_um: Scalar,
        angle_deg: Scalar,
        excess_loss_db: Scalar,
        index: LinearDispersion,
    ) -> Result<Self, SimError> {
        if radius_um <= 0.0 {
            return Err(SimError::invalid_parameter(
                "bend",
                "radius_um",
                format!("must be positive, got {radius_um}"),
            ));
        }
        if !(0.0..=360.0).contains(&angle_deg) || angle_deg == 0.0 {
            return Err(SimError::invalid_parameter(
                "bend",
                "angle_deg",
                format!("must lie in (0, 360], got {angle_deg}"),
            ));
        }
        if excess_loss_db < 0.0 {
            return Err(SimError::invalid_parameter(
                "bend",
                "excess_loss_db",
                format!("must be non-negative, got {excess_loss_db}"),
            ));
        }
        Ok(Self {
            radius_um,
            angle_deg,
            excess_loss_db,
            index,
        })
    }

    fn arc_length_um(&self) -> Scalar {
        2.0 * PI * self.radius_um * self.angle_deg / 360.0
    }
}

impl ComponentModel for Bend {
    fn kind(&self) -> &'static str {
        "bend"
    }

    fn ports(&self) -> Vec<String> {
        vec!["in".into(), "out".into()]
    }

    fn scattering(&self, wavelength_nm: Scalar) -> Result<SMap, SimError> {
        let n = self.index.effective_index(wavelength_nm)?;
        let phase = propagation_phase(n, self.arc_length_um(), wavelength_nm);
        let amp = db_to_amplitude(self.excess_loss_db);
        let mut map = SMap::new();
        map.insert_symmetric("in", "out", amp * phasor(phase));
        Ok(map)
    }
}
