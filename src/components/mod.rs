//! Compact scattering models for the physical element library.

/// Scattering maps and the component model trait.
pub mod model;
/// Straight waveguides, bends, and dispersive effective-index models.
pub mod waveguide;
/// Calibrated nonlinear sum-frequency mixer.
pub mod mixer;
/// Interferometric encoder/modulator.
pub mod modulator;
/// Wavelength demultiplexer, combiner, and power splitter.
pub mod demux;
/// Detector / absorbing termination.
pub mod detector;

pub use demux::{Combiner, Demultiplexer, Splitter};
pub use detector::Detector;
pub use mixer::SumFrequencyMixer;
pub use model::{ComponentModel, SMap, Transfer};
pub use modulator::MziModulator;
pub use waveguide::{Bend, DispersionModel, LinearDispersion, Waveguide};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::CalibrationTable;
    use crate::channels::ChannelTable;

    fn library() -> Vec<Box<dyn ComponentModel>> {
        let index = LinearDispersion::new(2.0, -2.0e-5, 1310.0, (450.0, 1800.0)).unwrap();
        let calibration = CalibrationTable::parse("sfg_mixer 1064 1550 0.35 0.1").unwrap();
        let table = ChannelTable::reference();
        let grid: Vec<f64> = table
            .output_channels()
            .iter()
            .map(|c| c.wavelength_nm)
            .collect();
        vec![
            Box::new(Waveguide::new(500.0, 2.0, index).unwrap()),
            Box::new(Bend::new(50.0, 90.0, 0.05, index).unwrap()),
            Box::new(MziModulator::new(1.0, 0.1).unwrap()),
            Box::new(SumFrequencyMixer::from_calibration(&calibration, 1064.0, 1550.0).unwrap()),
            Box::new(Demultiplexer::new(grid.clone(), 2.0, 30.0).unwrap()),
            Box::new(Combiner::new(grid, 2.0, 30.0).unwrap()),
            Box::new(Splitter::new(3, 0.1).unwrap()),
            Box::new(Detector::ideal()),
        ]
    }

    /// No model in the library has gain: `Σ|coeff|² ≤ 1 + tol` for every
    /// driven port at every reference and derived carrier.
    #[test]
    fn every_library_model_is_passive() {
        let table = ChannelTable::reference();
        let carriers: Vec<f64> = table
            .input_channels()
            .iter()
            .map(|&(_, l)| l)
            .chain(table.output_channels().iter().map(|c| c.wavelength_nm))
            .collect();
        for model in library() {
            for &carrier in &carriers {
                let map = model.scattering(carrier).unwrap();
                assert!(
                    map.is_passive(1.0e-9),
                    "{} emits gain at {carrier} nm",
                    model.kind()
                );
            }
        }
    }

    /// Passive linear elements are reciprocal; the mixer and detector are
    /// the deliberate exceptions (directional conversion, pure absorption).
    #[test]
    fn linear_elements_are_reciprocal() {
        for model in library() {
            let map = model.scattering(1064.0).unwrap();
            match model.kind() {
                "sfg_mixer" => assert!(!map.is_reciprocal(1.0e-12)),
                "detector" => assert!(map.is_empty()),
                _ => assert!(map.is_reciprocal(1.0e-12), "{} not reciprocal", model.kind()),
            }
        }
    }
}
