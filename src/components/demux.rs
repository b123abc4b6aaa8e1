//! Wavelength demultiplexer, combiner, and power splitter.

use crate::constants::db_to_amplitude;
use crate::errors::SimError;
use crate::math::{CScalar, Scalar};

use super::model::{ComponentModel, SMap};

const LN_2: Scalar = std::f64::consts::LN_2;

/// Gaussian passband field amplitude with a cross-channel isolation floor.
fn passband_amplitude(
    wavelength_nm: Scalar,
    center_nm: Scalar,
    fwhm_nm: Scalar,
    floor_amplitude: Scalar,
) -> Scalar {
    let detune = (wavelength_nm - center_nm) / fwhm_nm;
    let power = (-4.0 * LN_2 * detune * detune).exp();
    power.sqrt().max(floor_amplitude)
}

fn validate_grid(
    location: &str,
    channels_nm: &[Scalar],
    bandwidth_fwhm_nm: Scalar,
    isolation_db: Scalar,
) -> Result<(), SimError> {
    if channels_nm.is_empty() {
        return Err(SimError::invalid_parameter(
            location,
            "channels_nm",
            "at least one channel is required",
        ));
    }
    if channels_nm.iter().any(|&c| c <= 0.0 || !c.is_finite()) {
        return Err(SimError::invalid_parameter(
            location,
            "channels_nm",
            "channel centers must be positive and finite",
        ));
    }
    if bandwidth_fwhm_nm <= 0.0 {
        return Err(SimError::invalid_parameter(
            location,
            "bandwidth_fwhm_nm",
            format!("must be positive, got {bandwidth_fwhm_nm}"),
        ));
    }
    if isolation_db <= 0.0 {
        return Err(SimError::invalid_parameter(
            location,
            "isolation_db",
            format!("must be positive, got {isolation_db}"),
        ));
    }
    Ok(())
}

/// Wavelength demultiplexer: one input, one output per channel.
///
/// Each `in ↔ out{k}` coupling is a Gaussian passband centred on channel
/// `k`'s reference wavelength, clamped below by the cross-channel isolation
/// floor. Reciprocal; per-carrier amplitudes are normalized whenever the
/// floor would push the branch total above unity, so the element stays
/// passive.
#[derive(Debug, Clone, PartialEq)]
pub struct Demultiplexer {
    channels_nm: Vec<Scalar>,
    bandwidth_fwhm_nm: Scalar,
    isolation_db: Scalar,
}

impl Demultiplexer {
    /// Creates a demultiplexer over the given channel grid.
    pub fn new(
        channels_nm: Vec<Scalar>,
        bandwidth_fwhm_nm: Scalar,
        isolation_db: Scalar,
    ) -> Result<Self, SimError> {
        validate_grid("demultiplexer", &channels_nm, bandwidth_fwhm_nm, isolation_db)?;
        Ok(Self {
            channels_nm,
            bandwidth_fwhm_nm,
            isolation_db,
        })
    }

    /// Channel centers in nm, in output-port order.
    #[must_use]
    pub fn channels_nm(&self) -> &[Scalar] {
        &self.channels_nm
    }

    /// Branch amplitudes at a carrier, normalized to keep the split passive.
    fn branch_amplitudes(&self, wavelength_nm: Scalar) -> Vec<Scalar> {
        let floor = db_to_amplitude(self.isolation_db);
        let mut amps: Vec<Scalar> = self
            .channels_nm
            .iter()
            .map(|&c| passband_amplitude(wavelength_nm, c, self.bandwidth_fwhm_nm, floor))
            .collect();
        let total: Scalar = amps.iter().map(|a| a * a).sum();
        if total > 1.0 {
            let scale = total.sqrt().recip();
            for a in &mut amps {
                *a *= scale;
            }
        }
        amps
    }
}

impl ComponentModel for Demultiplexer {
    fn kind(&self) -> &'static str {
        "demux"
    }

    fn ports(&self) -> Vec<String> {
        let mut ports = vec!["in".to_string()];
        ports.extend((0..self.channels_nm.len()).map(|k| format!("out{k}")));
        ports
    }

    fn scattering(&self, wavelength_nm: Scalar) -> Result<SMap, SimError> {
        if wavelength_nm <= 0.0 || !wavelength_nm.is_finite() {
            return Err(SimError::invalid_parameter(
                self.kind(),
                "wavelength_nm",
                format!("must be positive and finite, got {wavelength_nm}"),
            ));
        }
        let mut map = SMap::new();
        for (k, amp) in self.branch_amplitudes(wavelength_nm).into_iter().enumerate() {
            map.insert_symmetric("in", &format!("out{k}"), CScalar::new(amp, 0.0));
        }
        Ok(map)
    }
}

/// Wavelength-selective combiner: one input per channel, one output.
///
/// The time-reverse of [`Demultiplexer`]: input `k` couples to `out` through
/// the channel-`k` passband.
#[derive(Debug, Clone, PartialEq)]
pub struct Combiner {
    channels_nm: Vec<Scalar>,
    bandwidth_fwhm_nm: Scalar,
    isolation_db: Scalar,
}

impl Combiner {
    /// Creates a combiner over the given channel grid.
    pub fn new(
        channels_nm: Vec<Scalar>,
        bandwidth_fwhm_nm: Scalar,
        isolation_db: Scalar,
    ) -> Result<Self, SimError> {
        validate_grid("combiner", &channels_nm, bandwidth_fwhm_nm, isolation_db)?;
        Ok(Self {
            channels_nm,
            bandwidth_fwhm_nm,
            isolation_db,
        })
    }

    /// Number of input ports.
    #[must_use]
    pub fn inputs(&self) -> usize {
        self.channels_nm.len()
    }
}

impl ComponentModel for Combiner {
    fn kind(&self) -> &'static str {
        "combiner"
    }

    fn ports(&self) -> Vec<String> {
        let mut ports: Vec<String> = (0..self.channels_nm.len())
            .map(|k| format!("in{k}"))
            .collect();
        ports.push("out".to_string());
        ports
    }

    fn scattering(&self, wavelength_nm: Scalar) -> Result<SMap, SimError> {
        if wavelength_nm <= 0.0 || !wavelength_nm.is_finite() {
            return Err(SimError::invalid_parameter(
                self.kind(),
                "wavelength_nm",
                format!("must be positive and finite, got {wavelength_nm}"),
            ));
        }
        let floor = db_to_amplitude(self.isolation_db);
        let mut amps: Vec<Scalar> = self
            .channels_nm
            .iter()
            .map(|&c| passband_amplitude(wavelength_nm, c, self.bandwidth_fwhm_nm, floor))
            .collect();
        // The out-port branch total is the passivity bound here, same
        // normalization as the demultiplexer.
        let total: Scalar = amps.iter().map(|a| a * a).sum();
        if total > 1.0 {
            let scale = total.sqrt().recip();
            for a in &mut amps {
                *a *= scale;
            }
        }
        let mut map = SMap::new();
        for (k, amp) in amps.into_iter().enumerate() {
            map.insert_symmetric(&format!("in{k}"), "out", CScalar::new(amp, 0.0));
        }
        Ok(map)
    }
}

/// Broadband 1×N power splitter.
///
/// `in ↔ out{k}` with amplitude `1/√N` under an excess-loss factor,
/// wavelength-independent. Also serves as an N→1 incoherent power combiner
/// when driven in reverse; fan-out in a netlist is always through an explicit
/// splitter instance, never an implicit multi-connection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splitter {
    outputs: usize,
    excess_loss_db: Scalar,
}

impl Splitter {
    /// Creates a 1×`outputs` splitter.
    pub fn new(outputs: usize, excess_loss_db: Scalar) -> Result<Self, SimError> {
        if outputs == 0 {
            return Err(SimError::invalid_parameter(
                "splitter",
                "outputs",
                "must have at least one output",
            ));
        }
        if excess_loss_db < 0.0 {
            return Err(SimError::invalid_parameter(
                "splitter",
                "excess_loss_db",
                format!("must be non-negative, got {excess_loss_db}"),
            ));
        }
        Ok(Self {
            outputs,
            excess_loss_db,
        })
    }

    /// Number of output branches.
    #[must_use]
    pub fn outputs(&self) -> usize {
        self.outputs
    }
}

impl ComponentModel for Splitter {
    fn kind(&self) -> &'static str {
        "splitter"
    }

    fn ports(&self) -> Vec<String> {
        let mut ports = vec!["in".to_string()];
        ports.extend((0..self.outputs).map(|k| format!("out{k}")));
        ports
    }

    fn scattering(&self, wavelength_nm: Scalar) -> Result<SMap, SimError> {
        if wavelength_nm <= 0.0 || !wavelength_nm.is_finite() {
            return Err(SimError::invalid_parameter(
                self.kind(),
                "wavelength_nm",
                format!("must be positive and finite, got {wavelength_nm}"),
            ));
        }
        let amp = db_to_amplitude(self.excess_loss_db) / (self.outputs as Scalar).sqrt();
        let mut map = SMap::new();
        for k in 0..self.outputs {
            map.insert_symmetric("in", &format!("out{k}"), CScalar::new(amp, 0.0));
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn grid() -> Vec<Scalar> {
        vec![532.0, 586.96, 630.71, 655.0, 709.79, 775.0]
    }

    #[test]
    fn on_channel_carrier_routes_to_its_port() {
        let demux = Demultiplexer::new(grid(), 2.0, 30.0).unwrap();
        let map = demux.scattering(532.0).unwrap();
        let on = map.coeff("in", "out0").norm_sqr();
        let off = map.coeff("in", "out3").norm_sqr();
        assert!(on > 0.99, "passband peak should be near unity, got {on}");
        assert!(off < 1.1e-3, "isolation floor should cap leakage, got {off}");
    }

    #[test]
    fn demux_is_reciprocal_and_passive_across_carriers(){
        let demux = Demultiplexer::new(grid(), 2.0, 30.0).unwrap();
        for lambda in [532.0, 600.0, 655.0, 1064.0] {
            let map = demux.scattering(lambda).unwrap();
            assert!(map.is_reciprocal(1.0e-12));
            assert!(map.is_passive(1.0e-9), "not passive at {lambda} nm");
        }
    }

    #[test]
    fn combiner_passes_each_channel_at_its_input() {
        let comb = Combiner::new(grid(), 2.0, 30.0).unwrap();
        let map = comb.scattering(586.96).unwrap();
        assert!(map.coeff("in1", "out").norm_sqr() > 0.99);
        assert!(map.coeff("in0", "out").norm_sqr() < 1.1e-3);
        assert!(map.is_passive(1.0e-9));
    }

    #[test]
    fn splitter_divides_power_evenly() {
        let split = Splitter::new(3, 0.0).unwrap();
        let map = split.scattering(1064.0).unwrap();
        for k in 0..3 {
            assert_relative_eq!(
                map.coeff("in", &format!("out{k}")).norm_sqr(),
                1.0 / 3.0,
                epsilon = 1.0e-12
            );
        }
        assert!(map.is_passive(1.0e-12));
        assert!(map.is_reciprocal(1.0e-12));
    }

    #[test]
    fn empty_grid_is_rejected() {
        assert!(Demultiplexer::new(vec![], 2.0, 30.0).is_err());
        assert!(Splitter::new(0, 0.0).is_err());
    }
}
