//! Frequency-domain scattering solver over a flattened circuit.
//!
//! Every port of every primitive instance carries a directed wave amplitude
//! per active carrier wavelength. Component scattering maps relate outgoing
//! to incoming amplitudes; each connection identifies the incoming wave on
//! one side with the outgoing wave on the other. The resulting sparse
//! complex linear system is assembled densely (chip-scale circuits stay
//! small) and solved by LU decomposition.
//!
//! Sum-frequency couplings translate carriers, so the unknown space is the
//! product of ports and the active carrier set. Conversion strictly shortens
//! the carrier, which makes the system block-triangular over carriers sorted
//! by descending wavelength: the solve proceeds one carrier block at a time,
//! feeding converted amplitudes forward. The structural indexing is derived
//! once in [`Solver::new`], so evaluating a batch of wavelengths re-derives
//! only per-component coefficients.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};

use crate::components::{ComponentModel, SMap};
use crate::constants::same_channel;
use crate::errors::SimError;
use crate::flatten::FlattenedCircuit;
use crate::math::{CScalar, Scalar};
use crate::netlist::Endpoint;

/// Rounds of carrier-set expansion before the solver reports divergence;
/// bounds cascaded mixer chains.
const CARRIER_ROUNDS_MAX: usize = 32;
/// Hard cap on simultaneously active carriers.
const CARRIERS_MAX: usize = 64;
/// Any solved amplitude above this magnitude marks a non-physical
/// near-unity feedback loop.
const AMPLITUDE_BOUND: Scalar = 1.0e6;

struct Slot {
    name: String,
    model: Arc<dyn ComponentModel + Send + Sync>,
    ports: Vec<String>,
    offset: usize,
    local_index: HashMap<String, usize>,
}

struct Registry {
    circuit_name: String,
    slots: Vec<Slot>,
    port_count: usize,
    /// Global port index for every `(instance, port)`.
    port_index: HashMap<(String, String), usize>,
    /// Owning slot of each global port.
    slot_of_port: Vec<usize>,
    /// Connected peer of each global port, if any.
    peer: Vec<Option<usize>>,
    /// External port name to global port index.
    external: BTreeMap<String, usize>,
}

/// Frequency-domain solver bound to one flattened circuit.
///
/// Pure and stateless per call: identical inputs return identical outputs,
/// and the solver is `Send + Sync`, so independent evaluations parallelize
/// with no shared mutable state.
pub struct Solver {
    registry: Arc<Registry>,
}

impl Solver {
    /// Derives the structural indexing for a flattened circuit.
    pub fn new(circuit: &FlattenedCircuit) -> Result<Self, SimError> {
        let mut slots = Vec::with_capacity(circuit.instances().len());
        let mut port_index = HashMap::new();
        let mut slot_of_port = Vec::new();
        let mut offset = 0usize;
        for (name, model) in circuit.instances() {
            let ports = model.ports();
            let local_index: HashMap<String, usize> = ports
                .iter()
                .enumerate()
                .map(|(i, p)| (p.clone(), i))
                .collect();
            for (i, port) in ports.iter().enumerate() {
                port_index.insert((name.clone(), port.clone()), offset + i);
                slot_of_port.push(slots.len());
            }
            let next_offset = offset + ports.len();
            slots.push(Slot {
                name: name.clone(),
                model: Arc::clone(model),
                ports,
                offset,
                local_index,
            });
            offset = next_offset;
        }

        let lookup = |ep: &Endpoint| -> Result<usize, SimError> {
            port_index
                .get(&(ep.instance.clone(), ep.port.clone()))
                .copied()
                .ok_or_else(|| SimError::DanglingPort {
                    netlist: circuit.name().to_string(),
                    instance: ep.instance.clone(),
                    port: ep.port.clone(),
                })
        };

        let mut peer: Vec<Option<usize>> = vec![None; offset];
        for conn in circuit.connections() {
            let a = lookup(&conn.a)?;
            let b = lookup(&conn.b)?;
            for (here, there, ep) in [(a, b, &conn.a), (b, a, &conn.b)] {
                if peer[here].is_some() {
                    return Err(SimError::DuplicateConnection {
                        netlist: circuit.name().to_string(),
                        instance: ep.instance.clone(),
                        port: ep.port.clone(),
                    });
                }
                peer[here] = Some(there);
            }
        }

        let mut external = BTreeMap::new();
        for (name, ep) in circuit.ports() {
            let idx = lookup(ep)?;
            if peer[idx].is_some() || external.values().any(|&v| v == idx) {
                return Err(SimError::DuplicateConnection {
                    netlist: circuit.name().to_string(),
                    instance: ep.instance.clone(),
                    port: ep.port.clone(),
                });
            }
            external.insert(name.clone(), idx);
        }

        Ok(Self {
            registry: Arc::new(Registry {
                circuit_name: circuit.name().to_string(),
                slots,
                port_count: offset,
                port_index,
                slot_of_port,
                peer,
                external,
            }),
        })
    }

    /// External port names in deterministic order.
    pub fn external_ports(&self) -> impl Iterator<Item = &str> {
        self.registry.external.keys().map(String::as_str)
    }

    /// Name of the flattened circuit this solver is bound to.
    #[must_use]
    pub fn circuit_name(&self) -> &str {
        &self.registry.circuit_name
    }

    /// True when the flattened circuit contains the endpoint.
    #[must_use]
    pub fn has_endpoint(&self, instance: &str, port: &str) -> bool {
        self.registry
            .port_index
            .contains_key(&(instance.to_string(), port.to_string()))
    }

    /// Expands the active carrier set from the injection wavelength and
    /// evaluates every model at every carrier.
    ///
    /// Returned carriers are sorted by descending wavelength. Sum-frequency
    /// conversion strictly shortens the carrier, so this order makes every
    /// cross-carrier coupling point forward and the solve block-triangular.
    fn model_maps(
        &self,
        injection_nm: Scalar,
    ) -> Result<(Vec<Scalar>, Vec<Vec<SMap>>), SimError> {
        let reg = &self.registry;
        let mut carriers = vec![injection_nm];
        let mut maps: Vec<Vec<SMap>> = vec![Vec::new(); reg.slots.len()];
        let mut evaluated = 0usize;
        let mut converged = false;
        for _ in 0..CARRIER_ROUNDS_MAX {
            let new_carriers: Vec<Scalar> = carriers[evaluated..].to_vec();
            if new_carriers.is_empty() {
                converged = true;
                break;
            }
            evaluated = carriers.len();
            for &carrier in &new_carriers {
                for (slot, slot_maps) in reg.slots.iter().zip(maps.iter_mut()) {
                    let map = slot.model.scattering(carrier)?;
                    for (_, _, transfer) in map.iter() {
                        if let Some(translated) = transfer.translated_nm {
                            if translated >= carrier {
                                return Err(SimError::invalid_parameter(
                                    format!("instance `{}`", slot.name),
                                    "scattering",
                                    format!(
                                        "carrier translation {carrier} -> {translated} nm must \
                                         shorten the wavelength"
                                    ),
                                ));
                            }
                            if !carriers.iter().any(|&c| same_channel(c, translated)) {
                                carriers.push(translated);
                            }
                        }
                    }
                    slot_maps.push(map);
                }
            }
            if carriers.len() > CARRIERS_MAX {
                return Err(SimError::UnstableNetwork {
                    wavelength_nm: injection_nm,
                    detail: format!(
                        "carrier set exceeded {CARRIERS_MAX} wavelengths during expansion"
                    ),
                });
            }
        }
        if !converged {
            return Err(SimError::UnstableNetwork {
                wavelength_nm: injection_nm,
                detail: format!("carrier set did not converge within {CARRIER_ROUNDS_MAX} rounds"),
            });
        }

        // Sort by descending wavelength, carrying each slot's map along.
        let mut order: Vec<usize> = (0..carriers.len()).collect();
        order.sort_by(|&i, &j| carriers[j].total_cmp(&carriers[i]));
        let carriers: Vec<Scalar> = order.iter().map(|&i| carriers[i]).collect();
        let maps = maps
            .into_iter()
            .map(|slot_maps| order.iter().map(|&i| slot_maps[i].clone()).collect())
            .collect();
        Ok((carriers, maps))
    }

    /// Solves the circuit for a unit excitation at an external port.
    ///
    /// Returns the full wave solution: outgoing amplitudes at every external
    /// port and incident amplitudes at every internal endpoint, per carrier.
    pub fn excite(&self, port: &str, wavelength_nm: Scalar) -> Result<Solution, SimError> {
        let reg = &self.registry;
        let &source = reg
            .external
            .get(port)
            .ok_or_else(|| SimError::DanglingPort {
                netlist: reg.circuit_name.clone(),
                instance: "(external)".to_string(),
                port: port.to_string(),
            })?;

        let (carriers, maps) = self.model_maps(wavelength_nm)?;
        let n_carriers = carriers.len();
        let p_count = reg.port_count;

        // One linear system per carrier, longest first. Conversion only ever
        // shortens the carrier, so earlier blocks never depend on later ones
        // and cross-carrier terms move to the right-hand side.
        let mut incident = DVector::<CScalar>::zeros(p_count * n_carriers);
        for ci in 0..n_carriers {
            let mut a = DMatrix::<CScalar>::identity(p_count, p_count);
            let mut rhs = DVector::<CScalar>::zeros(p_count);
            for p in 0..p_count {
                let Some(q) = reg.peer[p] else {
                    // External or unterminated ports are matched boundaries.
                    if p == source && ci == 0 {
                        rhs[p] = CScalar::new(1.0, 0.0);
                    }
                    continue;
                };
                // a(p) equals the outgoing wave at the connected peer q.
                let slot_idx = reg.slot_of_port[q];
                let slot = &reg.slots[slot_idx];
                let q_port = slot.ports[q - slot.offset].as_str();
                for (c_src, map) in maps[slot_idx].iter().enumerate().take(ci + 1) {
                    for (from, to, transfer) in map.iter() {
                        if to != q_port {
                            continue;
                        }
                        let target = transfer.translated_nm.unwrap_or(carriers[c_src]);
                        if !same_channel(target, carriers[ci]) {
                            continue;
                        }
                        let local = *slot.local_index.get(from).ok_or_else(|| {
                            SimError::invalid_parameter(
                                format!("instance `{}`", slot.name),
                                "scattering",
                                format!("model coupled unknown port `{from}`"),
                            )
                        })?;
                        let col = slot.offset + local;
                        if c_src == ci {
                            a[(p, col)] -= transfer.coeff;
                        } else {
                            rhs[p] += transfer.coeff * incident[c_src * p_count + col];
                        }
                    }
                }
            }

            let x = a.lu().solve(&rhs).ok_or_else(|| SimError::UnstableNetwork {
                wavelength_nm,
                detail: format!(
                    "singular scattering system at carrier {} nm (non-physical feedback loop)",
                    carriers[ci]
                ),
            })?;
            let worst = x.iter().map(|c| c.norm()).fold(0.0, Scalar::max);
            if !worst.is_finite() || worst > AMPLITUDE_BOUND {
                return Err(SimError::UnstableNetwork {
                    wavelength_nm,
                    detail: format!("solution magnitude {worst:.3e} exceeds the stability bound"),
                });
            }
            incident.rows_mut(ci * p_count, p_count).copy_from(&x);
        }

        // Outgoing amplitudes at every external port, per carrier.
        let mut outgoing = BTreeMap::new();
        for (name, &p) in &reg.external {
            let slot_idx = reg.slot_of_port[p];
            let slot = &reg.slots[slot_idx];
            let p_port = slot.ports[p - slot.offset].as_str();
            let mut waves = vec![CScalar::default(); n_carriers];
            for (c_src, map) in maps[slot_idx].iter().enumerate() {
                for (from, to, transfer) in map.iter() {
                    if to != p_port {
                        continue;
                    }
                    let target = transfer.translated_nm.unwrap_or(carriers[c_src]);
                    let Some(ci) = carriers.iter().position(|&c| same_channel(c, target)) else {
                        continue;
                    };
                    let local = slot.local_index[from];
                    waves[ci] += transfer.coeff * incident[c_src * p_count + slot.offset + local];
                }
            }
            outgoing.insert(name.clone(), waves);
        }

        Ok(Solution {
            registry: Arc::clone(&self.registry),
            injection: (port.to_string(), wavelength_nm),
            carriers,
            incident,
            outgoing,
        })
    }

    /// End-to-end complex transmission between two external ports at one
    /// wavelength.
    pub fn evaluate(
        &self,
        wavelength_nm: Scalar,
        port_a: &str,
        port_b: &str,
    ) -> Result<CScalar, SimError> {
        let solution = self.excite(port_a, wavelength_nm)?;
        if !self.registry.external.contains_key(port_b) {
            return Err(SimError::DanglingPort {
                netlist: self.registry.circuit_name.clone(),
                instance: "(external)".to_string(),
                port: port_b.to_string(),
            });
        }
        Ok(solution
            .amplitude(port_b, wavelength_nm)
            .unwrap_or_default())
    }

    /// Evaluates a batch of wavelengths against the same structural graph;
    /// only per-component coefficients are re-derived between calls.
    pub fn evaluate_batch(
        &self,
        wavelengths_nm: &[Scalar],
        port_a: &str,
        port_b: &str,
    ) -> Result<Vec<CScalar>, SimError> {
        wavelengths_nm
            .iter()
            .map(|&l| self.evaluate(l, port_a, port_b))
            .collect()
    }
}

/// Wave solution of one excitation: transient per invocation.
pub struct Solution {
    registry: Arc<Registry>,
    injection: (String, Scalar),
    carriers: Vec<Scalar>,
    incident: DVector<CScalar>,
    outgoing: BTreeMap<String, Vec<CScalar>>,
}

impl Solution {
    /// The `(external port, wavelength)` excitation this solution is for.
    #[must_use]
    pub fn injection(&self) -> (&str, Scalar) {
        (&self.injection.0, self.injection.1)
    }

    /// Active carrier wavelengths, injection first.
    #[must_use]
    pub fn carriers(&self) -> &[Scalar] {
        &self.carriers
    }

    fn carrier_index(&self, wavelength_nm: Scalar) -> Option<usize> {
        self.carriers
            .iter()
            .position(|&c| same_channel(c, wavelength_nm))
    }

    /// Outgoing amplitude at an external port on one carrier.
    #[must_use]
    pub fn amplitude(&self, external: &str, wavelength_nm: Scalar) -> Option<CScalar> {
        let waves = self.outgoing.get(external)?;
        Some(waves[self.carrier_index(wavelength_nm)?])
    }

    /// Outgoing power at an external port on one carrier; zero when the
    /// carrier is not active there.
    #[must_use]
    pub fn power(&self, external: &str, wavelength_nm: Scalar) -> Scalar {
        self.amplitude(external, wavelength_nm)
            .map_or(0.0, |a| a.norm_sqr())
    }

    /// Incident amplitude at any internal endpoint on one carrier.
    #[must_use]
    pub fn incident(&self, instance: &str, port: &str, wavelength_nm: Scalar) -> Option<CScalar> {
        let &p = self
            .registry
            .port_index
            .get(&(instance.to_string(), port.to_string()))?;
        let ci = self.carrier_index(wavelength_nm)?;
        Some(self.incident[ci * self.registry.port_count + p])
    }

    /// Incident power per active carrier at an internal endpoint.
    ///
    /// Returns `(carrier, power)` pairs in carrier order; empty when the
    /// endpoint does not exist.
    #[must_use]
    pub fn channel_powers(&self, instance: &str, port: &str) -> Vec<(Scalar, Scalar)> {
        let Some(&p) = self
            .registry
            .port_index
            .get(&(instance.to_string(), port.to_string()))
        else {
            return Vec::new();
        };
        self.carriers
            .iter()
            .enumerate()
            .map(|(ci, &c)| {
                (
                    c,
                    self.incident[ci * self.registry.port_count + p].norm_sqr(),
                )
            })
            .collect()
    }

}
