//! Detector / absorbing termination.

use crate::errors::SimError;
use crate::math::Scalar;

use super::model::{ComponentModel, SMap};

/// One-port absorbing detector.
///
/// Exposes only an absorbed-fraction coefficient; there is no return path,
/// so its scattering map is empty and every incident wave terminates here.
/// The photocurrent read-out is `absorbed_fraction · |a|²` for the incident
/// amplitude `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detector {
    absorbed_fraction: Scalar,
}

impl Detector {
    /// Creates a detector absorbing the given power fraction, in (0, 1].
    pub fn new(absorbed_fraction: Scalar) -> Result<Self, SimError> {
        if !(absorbed_fraction > 0.0 && absorbed_fraction <= 1.0) {
            return Err(SimError::invalid_parameter(
                "detector",
                "absorbed_fraction",
                format!("must lie in (0, 1], got {absorbed_fraction}"),
            ));
        }
        Ok(Self { absorbed_fraction })
    }

    /// Ideal black detector absorbing everything.
    #[must_use]
    pub fn ideal() -> Self {
        Self {
            absorbed_fraction: 1.0,
        }
    }

    /// Fraction of incident power converted to photocurrent.
    #[must_use]
    pub fn absorbed_fraction(&self) -> Scalar {
        self.absorbed_fraction
    }
}

impl ComponentModel for Detector {
    fn kind(&self) -> &'static str {
        "detector"
    }

    fn ports(&self) -> Vec<String> {
        vec!["in".into()]
    }

    fn scattering(&self, wavelength_nm: Scalar) -> Result<SMap, SimError> {
        if wavelength_nm <= 0.0 || !wavelength_nm.is_finite() {
            return Err(SimError::invalid_parameter(
                self.kind(),
                "wavelength_nm",
                format!("must be positive and finite, got {wavelength_nm}"),
            ));
        }
        Ok(SMap::new())
    }
}
