//! Logical values, carrier channels, and exact sum-frequency arithmetic.
//!
//! A fixed bijective table maps the ternary values {−1, 0, +1} onto three
//! reference carrier wavelengths. Mixing two reference carriers produces one
//! of six derived output channels whose wavelengths follow from exact
//! reciprocal-space addition, never from an approximation.

use crate::constants::{quantize_pm, same_channel};
use crate::errors::SimError;
use crate::math::Scalar;

/// A balanced ternary logic value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Trit {
    /// Logical −1.
    Minus,
    /// Logical 0.
    Zero,
    /// Logical +1.
    Plus,
}

impl Trit {
    /// Numeric value in {−1, 0, +1}.
    #[must_use]
    pub const fn value(self) -> i8 {
        match self {
            Self::Minus => -1,
            Self::Zero => 0,
            Self::Plus => 1,
        }
    }

    /// Ternary product of two values.
    #[must_use]
    pub const fn product(self, other: Self) -> Self {
        match self.value() * other.value() {
            -1 => Self::Minus,
            1 => Self::Plus,
            _ => Self::Zero,
        }
    }

    /// All three values in ascending order.
    pub const ALL: [Self; 3] = [Self::Minus, Self::Zero, Self::Plus];
}

/// Sum-frequency wavelength of two carriers: `1/λ_out = 1/λ_a + 1/λ_b`.
///
/// Computed in reciprocal space exactly; the result is never quantized.
#[must_use]
pub fn sum_frequency(lambda_a_nm: Scalar, lambda_b_nm: Scalar) -> Scalar {
    (lambda_a_nm * lambda_b_nm) / (lambda_a_nm + lambda_b_nm)
}

/// One of the six derived output channels produced by mixing two reference
/// carriers.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutputChannel {
    /// Exact sum-frequency wavelength of this channel (nm).
    pub wavelength_nm: Scalar,
    /// Ternary product the channel decodes to.
    pub product: Trit,
    /// The unordered input-value pair that lands on this channel.
    pub inputs: (Trit, Trit),
}

/// The fixed value↔channel table: three reference input carriers and the six
/// derived sum-frequency output channels.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTable {
    inputs: [(Trit, Scalar); 3],
    outputs: Vec<OutputChannel>,
}

impl ChannelTable {
    /// The reference table {−1 → 1550 nm, 0 → 1310 nm, +1 → 1064 nm}.
    #[must_use]
    pub fn reference() -> Self {
        Self::new(1550.0, 1310.0, 1064.0).expect("reference channels are distinct")
    }

    /// Builds a table from three reference wavelengths.
    ///
    /// Fails with [`SimError::InvalidParameter`] when the three carriers or
    /// any of the derived sum-frequency channels collide, which would break
    /// the bijective decode.
    pub fn new(minus_nm: Scalar, zero_nm: Scalar, plus_nm: Scalar) -> Result<Self, SimError> {
        for (name, value) in [
            ("minus_nm", minus_nm),
            ("zero_nm", zero_nm),
            ("plus_nm", plus_nm),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SimError::invalid_parameter(
                    "channel table",
                    name,
                    format!("reference wavelength must be positive, got {value}"),
                ));
            }
        }

        let inputs = [
            (Trit::Minus, minus_nm),
            (Trit::Zero, zero_nm),
            (Trit::Plus, plus_nm),
        ];

        let mut outputs = Vec::with_capacity(6);
        for (i, &(va, la)) in inputs.iter().enumerate() {
            for &(vb, lb) in &inputs[i..] {
                outputs.push(OutputChannel {
                    wavelength_nm: sum_frequency(la, lb),
                    product: va.product(vb),
                    inputs: (va, vb),
                });
            }
        }

        let mut keys: Vec<i64> = inputs
            .iter()
            .map(|&(_, l)| quantize_pm(l))
            .chain(outputs.iter().map(|o| quantize_pm(o.wavelength_nm)))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        if keys.len() != inputs.len() + outputs.len() {
            return Err(SimError::invalid_parameter(
                "channel table",
                "reference_wavelengths",
                "derived sum-frequency channels collide; decode would not be bijective",
            ));
        }

        Ok(Self { inputs, outputs })
    }

    /// Carrier wavelength for a logical value.
    #[must_use]
    pub fn encode(&self, value: Trit) -> Scalar {
        self.inputs
            .iter()
            .find(|(v, _)| *v == value)
            .map(|&(_, l)| l)
            .expect("table covers all trits")
    }

    /// The three reference input channels.
    #[must_use]
    pub fn input_channels(&self) -> &[(Trit, Scalar)] {
        &self.inputs
    }

    /// The six derived sum-frequency output channels.
    #[must_use]
    pub fn output_channels(&self) -> &[OutputChannel] {
        &self.outputs
    }

    /// Decodes a carrier wavelength to the derived output channel it carries.
    #[must_use]
    pub fn decode_output(&self, wavelength_nm: Scalar) -> Option<&OutputChannel> {
        self.outputs
            .iter()
            .find(|o| same_channel(o.wavelength_nm, wavelength_nm))
    }

    /// Decodes a carrier wavelength to a logical value, checking derived
    /// output channels first, then the reference inputs.
    #[must_use]
    pub fn decode(&self, wavelength_nm: Scalar) -> Option<Trit> {
        if let Some(out) = self.decode_output(wavelength_nm) {
            return Some(out.product);
        }
        self.inputs
            .iter()
            .find(|&&(_, l)| same_channel(l, wavelength_nm))
            .map(|&(v, _)| v)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn sum_frequency_is_exact_in_reciprocal_space() {
        let out = sum_frequency(1550.0, 1064.0);
        assert_relative_eq!(1.0 / out, 1.0 / 1550.0 + 1.0 / 1064.0, epsilon = 1.0e-15);
    }

    #[test]
    fn reference_table_has_nine_distinct_channels() {
        let table = ChannelTable::reference();
        assert_eq!(table.output_channels().len(), 6);
        // (+1, +1) lands at 532 nm exactly: 1064*1064/2128.
        let plus_plus = table
            .decode_output(532.0)
            .expect("plus-plus channel present");
        assert_eq!(plus_plus.product, Trit::Plus);
        assert_eq!(plus_plus.inputs, (Trit::Plus, Trit::Plus));
    }

    #[test]
    fn products_decode_through_the_inverse_table() {
        let table = ChannelTable::reference();
        for a in Trit::ALL {
            for b in Trit::ALL {
                let out = sum_frequency(table.encode(a), table.encode(b));
                assert_eq!(table.decode(out), Some(a.product(b)), "{a:?} x {b:?}");
            }
        }
    }

    #[test]
    fn input_channels_decode_to_their_own_value() {
        let table = ChannelTable::reference();
        assert_eq!(table.decode(1550.0), Some(Trit::Minus));
        assert_eq!(table.decode(1310.0), Some(Trit::Zero));
        assert_eq!(table.decode(1064.0), Some(Trit::Plus));
        assert_eq!(table.decode(1234.5), None);
    }

    #[test]
    fn colliding_references_are_rejected() {
        let err = ChannelTable::new(1550.0, 1550.0, 1064.0).unwrap_err();
        assert!(matches!(err, SimError::InvalidParameter { .. }));
    }
}
