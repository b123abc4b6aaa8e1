//! Shared error types used across submodules.
//!
//! Every variant is a deterministic modeling defect, never a transient
//! condition, and carries enough context (instance path, port, wavelength,
//! parameter name) to locate the defect without re-running.

use thiserror::Error;

use crate::math::Scalar;

/// Top-level error type for the crate.
#[derive(Debug, Clone, Error)]
pub enum SimError {
    /// A physical or structural parameter falls outside its documented
    /// validity range. Models never silently extrapolate.
    #[error("invalid parameter `{name}` for {location}: {reason}")]
    InvalidParameter {
        /// Component kind, instance path, or input location.
        location: String,
        /// Name of the offending parameter.
        name: &'static str,
        /// What was wrong with the value.
        reason: String,
    },
    /// A nonlinear element has no calibration record for its wavelength pair.
    #[error("missing calibration for `{kind}` at ({lambda_a_nm} nm, {lambda_b_nm} nm)")]
    MissingCalibration {
        /// Component kind the lookup was keyed on.
        kind: String,
        /// First wavelength of the requested pair.
        lambda_a_nm: Scalar,
        /// Second wavelength of the requested pair.
        lambda_b_nm: Scalar,
    },
    /// A connection or exposed port references a port that does not exist.
    #[error("dangling port `{instance}.{port}` in netlist `{netlist}`")]
    DanglingPort {
        /// Netlist in which the reference appears.
        netlist: String,
        /// Instance name the reference points at.
        instance: String,
        /// Port name the reference points at.
        port: String,
    },
    /// An endpoint participates in more than one connection or exposure.
    #[error("endpoint `{instance}.{port}` used more than once in netlist `{netlist}`")]
    DuplicateConnection {
        /// Netlist in which the conflict appears.
        netlist: String,
        /// Instance name of the conflicting endpoint.
        instance: String,
        /// Port name of the conflicting endpoint.
        port: String,
    },
    /// A sub-circuit directly or indirectly instantiates itself.
    #[error("cyclic instantiation: {path}")]
    CyclicInstantiation {
        /// Instantiation path that closed the cycle, outermost first.
        path: String,
    },
    /// The scattering solve produced a singular, non-convergent, or
    /// non-physical system. Surfaced instead of NaN/Inf results.
    #[error("unstable network at {wavelength_nm} nm: {detail}")]
    UnstableNetwork {
        /// Carrier wavelength of the failing solve.
        wavelength_nm: Scalar,
        /// What the solver observed.
        detail: String,
    },
}

impl SimError {
    /// Shorthand for an [`SimError::InvalidParameter`] with formatted context.
    #[must_use]
    pub fn invalid_parameter(
        location: impl Into<String>,
        name: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            location: location.into(),
            name,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_locating_context() {
        let err = SimError::DanglingPort {
            netlist: "row0".into(),
            instance: "cell2".into(),
            port: "sfg".into(),
        };
        let text = err.to_string();
        assert!(text.contains("row0"));
        assert!(text.contains("cell2.sfg"));

        let err = SimError::invalid_parameter("waveguide", "length_um", "must be positive");
        assert!(err.to_string().contains("length_um"));
    }
}
