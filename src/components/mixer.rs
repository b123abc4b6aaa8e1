//! Calibrated nonlinear sum-frequency mixer.

use crate::calibration::{CalibrationRecord, CalibrationTable};
use crate::channels::sum_frequency;
use crate::constants::{db_to_amplitude, same_channel};
use crate::errors::SimError;
use crate::math::{CScalar, Scalar};

use super::model::{ComponentModel, SMap};

/// Compact model of a sum-frequency mixing element.
///
/// The element is bound to one calibrated wavelength pair `(λ_a, λ_b)`. A
/// carrier matching `λ_a` on port `a` (or `λ_b` on port `b`) converts to the
/// exact sum-frequency wavelength on port `sfg` with amplitude
/// `sqrt(efficiency)`; unconverted energy continues to the matching through
/// port with amplitude `sqrt(1 − efficiency)`. Any other carrier passes to
/// its through port unconverted. The model is deliberately non-reciprocal.
///
/// Simultaneous carriers outside the calibrated pair never generate
/// additional mixing products: a multi-pair mixing region needs its own
/// validated compact model and is rejected here by construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SumFrequencyMixer {
    lambda_a_nm: Scalar,
    lambda_b_nm: Scalar,
    record: CalibrationRecord,
}

impl SumFrequencyMixer {
    /// Calibration key for this element kind.
    pub const KIND: &'static str = "sfg_mixer";

    /// Binds a mixer to the calibrated record for `(λ_a, λ_b)`.
    ///
    /// Fails with [`SimError::MissingCalibration`] when the table has no
    /// record for the pair.
    pub fn from_calibration(
        table: &CalibrationTable,
        lambda_a_nm: Scalar,
        lambda_b_nm: Scalar,
    ) -> Result<Self, SimError> {
        let record = table.lookup(Self::KIND, lambda_a_nm, lambda_b_nm)?;
        Ok(Self {
            lambda_a_nm,
            lambda_b_nm,
            record,
        })
    }

    /// The calibrated input pair `(λ_a, λ_b)` in nm.
    #[must_use]
    pub fn pair(&self) -> (Scalar, Scalar) {
        (self.lambda_a_nm, self.lambda_b_nm)
    }

    /// Exact sum-frequency output wavelength in nm.
    #[must_use]
    pub fn output_wavelength_nm(&self) -> Scalar {
        sum_frequency(self.lambda_a_nm, self.lambda_b_nm)
    }

    /// Calibrated conversion efficiency.
    #[must_use]
    pub fn efficiency(&self) -> Scalar {
        self.record.efficiency
    }

    fn couple_input(
        &self,
        map: &mut SMap,
        wavelength_nm: Scalar,
        pump_nm: Scalar,
        input: &str,
        through: &str,
    ) {
        let alpha = db_to_amplitude(self.record.loss_db);
        if same_channel(wavelength_nm, pump_nm) {
            let converted = CScalar::new(self.record.efficiency.sqrt() * alpha, 0.0);
            let residue = CScalar::new((1.0 - self.record.efficiency).sqrt() * alpha, 0.0);
            map.insert_translated(input, "sfg", converted, self.output_wavelength_nm());
            map.insert(input, through, residue);
        } else {
            map.insert(input, through, CScalar::new(alpha, 0.0));
        }
    }
}

impl ComponentModel for SumFrequencyMixer {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn ports(&self) -> Vec<String> {
        ["a", "b", "sfg", "thru_a", "thru_b"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn scattering(&self, wavelength_nm: Scalar) -> Result<SMap, SimError> {
        if wavelength_nm <= 0.0 || !wavelength_nm.is_finite() {
            return Err(SimError::invalid_parameter(
                Self::KIND,
                "wavelength_nm",
                format!("must be positive and finite, got {wavelength_nm}"),
            ));
        }
        let mut map = SMap::new();
        self.couple_input(&mut map, wavelength_nm, self.lambda_a_nm, "a", "thru_a");
        self.couple_input(&mut map, wavelength_nm, self.lambda_b_nm, "b", "thru_b");
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn table() -> CalibrationTable {
        CalibrationTable::parse("sfg_mixer 1064 1550 0.35 0.1").unwrap()
    }

    #[test]
    fn output_wavelength_satisfies_reciprocal_sum() {
        let mixer = SumFrequencyMixer::from_calibration(&table(), 1064.0, 1550.0).unwrap();
        let out = mixer.output_wavelength_nm();
        assert_relative_eq!(1.0 / out, 1.0 / 1064.0 + 1.0 / 1550.0, epsilon = 1.0e-15);
    }

    #[test]
    fn matched_carrier_splits_between_product_and_through() {
        let mixer = SumFrequencyMixer::from_calibration(&table(), 1064.0, 1550.0).unwrap();
        let map = mixer.scattering(1064.0).unwrap();

        let alpha = db_to_amplitude(0.1);
        let converted = map.get("a", "sfg").unwrap();
        assert_relative_eq!(converted.coeff.norm(), 0.35f64.sqrt() * alpha, epsilon = 1.0e-12);
        assert_relative_eq!(
            converted.translated_nm.unwrap(),
            mixer.output_wavelength_nm(),
            epsilon = 1.0e-12
        );
        assert_relative_eq!(
            map.coeff("a", "thru_a").norm(),
            0.65f64.sqrt() * alpha,
            epsilon = 1.0e-12
        );
        // Energy splits without gain: eff + (1 - eff) under the loss factor.
        assert!(map.is_passive(1.0e-12));
    }

    #[test]
    fn unmatched_carrier_passes_through_unconverted() {
        let mixer = SumFrequencyMixer::from_calibration(&table(), 1064.0, 1550.0).unwrap();
        let map = mixer.scattering(1310.0).unwrap();
        assert!(map.get("a", "sfg").is_none());
        assert_relative_eq!(
            map.coeff("a", "thru_a").norm(),
            db_to_amplitude(0.1),
            epsilon = 1.0e-12
        );
    }

    #[test]
    fn mixer_is_directional() {
        let mixer = SumFrequencyMixer::from_calibration(&table(), 1064.0, 1550.0).unwrap();
        let map = mixer.scattering(1064.0).unwrap();
        assert!(!map.is_reciprocal(1.0e-12));
    }

    #[test]
    fn uncalibrated_pair_is_rejected_at_binding() {
        let err = SumFrequencyMixer::from_calibration(&table(), 1310.0, 1550.0).unwrap_err();
        assert!(matches!(err, SimError::MissingCalibration { .. }));
    }
}
