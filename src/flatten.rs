//! Recursive expansion of hierarchical netlists into one flat graph.
//!
//! Sub-circuit instances expand depth-first; every inner instance is renamed
//! by hierarchical path concatenation (`row0.cell2.mixer`), so names stay
//! collision-free and deterministic. An explicit visited-path guard rejects
//! self-instantiating hierarchies instead of recursing unboundedly.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::components::ComponentModel;
use crate::errors::SimError;
use crate::netlist::{Connection, Endpoint, ModelRef, Netlist};

/// Hierarchy levels a design may nest before flattening refuses; a backstop
/// behind the visited-path cycle guard.
const MAX_DEPTH: usize = 64;

/// A single-level circuit: primitive instances, connections, exposed ports.
#[derive(Clone)]
pub struct FlattenedCircuit {
    name: String,
    instances: BTreeMap<String, Arc<dyn ComponentModel + Send + Sync>>,
    connections: Vec<Connection>,
    ports: BTreeMap<String, Endpoint>,
}

impl FlattenedCircuit {
    /// Name of the netlist this circuit was flattened from.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primitive instances by hierarchical path name.
    #[must_use]
    pub fn instances(&self) -> &BTreeMap<String, Arc<dyn ComponentModel + Send + Sync>> {
        &self.instances
    }

    /// Flat connection list.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// External ports, resolved to primitive endpoints.
    #[must_use]
    pub fn ports(&self) -> &BTreeMap<String, Endpoint> {
        &self.ports
    }
}

impl std::fmt::Debug for FlattenedCircuit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlattenedCircuit")
            .field("name", &self.name)
            .field("instances", &self.instances.len())
            .field("connections", &self.connections.len())
            .field("ports", &self.ports.len())
            .finish()
    }
}

/// Flattens a hierarchical netlist into a single instance/connection graph.
///
/// Fails with [`SimError::CyclicInstantiation`] when a sub-circuit directly
/// or indirectly instantiates itself.
pub fn flatten(netlist: &Netlist) -> Result<FlattenedCircuit, SimError> {
    let mut out = FlattenedCircuit {
        name: netlist.name().to_string(),
        instances: BTreeMap::new(),
        connections: Vec::new(),
        ports: BTreeMap::new(),
    };
    let mut path = Vec::new();
    expand(netlist, "", &mut path, &mut out)?;
    for (external, ep) in netlist.ports() {
        let resolved = resolve(netlist, "", ep, 0)?;
        out.ports.insert(external.clone(), resolved);
    }
    Ok(out)
}

fn expand(
    netlist: &Netlist,
    prefix: &str,
    path: &mut Vec<String>,
    out: &mut FlattenedCircuit,
) -> Result<(), SimError> {
    if path.iter().any(|seen| seen == netlist.name()) || path.len() >= MAX_DEPTH {
        let mut cycle = path.clone();
        cycle.push(netlist.name().to_string());
        return Err(SimError::CyclicInstantiation {
            path: cycle.join(" -> "),
        });
    }
    path.push(netlist.name().to_string());

    for (name, model) in netlist.instances() {
        match model {
            ModelRef::Primitive(model) => {
                out.instances
                    .insert(format!("{prefix}{name}"), Arc::clone(model));
            }
            ModelRef::Composite(sub) => {
                expand(sub, &format!("{prefix}{name}."), path, out)?;
            }
        }
    }
    for conn in netlist.connections() {
        out.connections.push(Connection {
            a: resolve(netlist, prefix, &conn.a, 0)?,
            b: resolve(netlist, prefix, &conn.b, 0)?,
        });
    }

    path.pop();
    Ok(())
}

/// Resolves an endpoint through nested sub-circuit port maps down to a
/// primitive instance, applying the hierarchical prefix.
fn resolve(
    netlist: &Netlist,
    prefix: &str,
    ep: &Endpoint,
    depth: usize,
) -> Result<Endpoint, SimError> {
    if depth >= MAX_DEPTH {
        return Err(SimError::CyclicInstantiation {
            path: format!("{prefix}{ep} (port resolution exceeded depth {MAX_DEPTH})"),
        });
    }
    let model = netlist
        .instances()
        .get(&ep.instance)
        .ok_or_else(|| SimError::DanglingPort {
            netlist: netlist.name().to_string(),
            instance: ep.instance.clone(),
            port: ep.port.clone(),
        })?;
    match model {
        ModelRef::Primitive(_) => Ok(Endpoint::new(
            format!("{prefix}{}", ep.instance),
            ep.port.clone(),
        )),
        ModelRef::Composite(sub) => {
            let inner = sub
                .ports()
                .get(&ep.port)
                .ok_or_else(|| SimError::DanglingPort {
                    netlist: sub.name().to_string(),
                    instance: ep.instance.clone(),
                    port: ep.port.clone(),
                })?;
            resolve(sub, &format!("{prefix}{}.", ep.instance), inner, depth + 1)
        }
    }
}
