//! Hierarchical circuit descriptions: instances, connections, exposed ports.
//!
//! A [`Netlist`] is immutable once built. All structural validation happens
//! in [`NetlistBuilder::build`], so a malformed graph is an early
//! construction error, never a late simulation surprise.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::components::ComponentModel;
use crate::errors::SimError;

/// One `(instance, port)` attachment point.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Endpoint {
    /// Instance name within the enclosing netlist.
    pub instance: String,
    /// Port name on that instance.
    pub port: String,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(instance: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            port: port.into(),
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.instance, self.port)
    }
}

/// An unordered pair of optically joined endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    /// First endpoint.
    pub a: Endpoint,
    /// Second endpoint.
    pub b: Endpoint,
}

/// What an instance places: a primitive model or a sub-circuit.
#[derive(Clone)]
pub enum ModelRef {
    /// A leaf component model.
    Primitive(Arc<dyn ComponentModel + Send + Sync>),
    /// A nested sub-circuit.
    Composite(Arc<Netlist>),
}

impl ModelRef {
    /// Port names this instance exposes to the enclosing netlist.
    #[must_use]
    pub fn port_names(&self) -> Vec<String> {
        match self {
            Self::Primitive(model) => model.ports(),
            Self::Composite(net) => net.ports().keys().cloned().collect(),
        }
    }
}

impl std::fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primitive(model) => write!(f, "Primitive({})", model.kind()),
            Self::Composite(net) => write!(f, "Composite({})", net.name()),
        }
    }
}

/// A validated, immutable circuit description at one hierarchy level.
#[derive(Debug, Clone)]
pub struct Netlist {
    name: String,
    instances: BTreeMap<String, ModelRef>,
    connections: Vec<Connection>,
    ports: BTreeMap<String, Endpoint>,
}

impl Netlist {
    /// Netlist name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Instances by name, in deterministic order.
    #[must_use]
    pub fn instances(&self) -> &BTreeMap<String, ModelRef> {
        &self.instances
    }

    /// Internal connections.
    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// External port map: exposed name to internal endpoint.
    #[must_use]
    pub fn ports(&self) -> &BTreeMap<String, Endpoint> {
        &self.ports
    }
}

/// Builder assembling a [`Netlist`], validating the structure on `build`.
pub struct NetlistBuilder {
    name: String,
    instances: Vec<(String, ModelRef)>,
    connections: Vec<Connection>,
    exposed: Vec<(String, Endpoint)>,
}

impl NetlistBuilder {
    /// Starts a netlist with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instances: Vec::new(),
            connections: Vec::new(),
            exposed: Vec::new(),
        }
    }

    /// Places a primitive component instance.
    pub fn add_primitive<M>(&mut self, name: impl Into<String>, model: M) -> &mut Self
    where
        M: ComponentModel + Send + Sync + 'static,
    {
        self.instances
            .push((name.into(), ModelRef::Primitive(Arc::new(model))));
        self
    }

    /// Places a sub-circuit instance.
    pub fn add_subcircuit(&mut self, name: impl Into<String>, netlist: Netlist) -> &mut Self {
        self.instances
            .push((name.into(), ModelRef::Composite(Arc::new(netlist))));
        self
    }

    /// Places a shared sub-circuit instance without cloning its definition.
    pub fn add_subcircuit_shared(
        &mut self,
        name: impl Into<String>,
        netlist: Arc<Netlist>,
    ) -> &mut Self {
        self.instances
            .push((name.into(), ModelRef::Composite(netlist)));
        self
    }

    /// Joins two ports optically.
    pub fn connect(
        &mut self,
        instance_a: impl Into<String>,
        port_a: impl Into<String>,
        instance_b: impl Into<String>,
        port_b: impl Into<String>,
    ) -> &mut Self {
        self.connections.push(Connection {
            a: Endpoint::new(instance_a, port_a),
            b: Endpoint::new(instance_b, port_b),
        });
        self
    }

    /// Exposes an internal port under an external name.
    pub fn expose(
        &mut self,
        external: impl Into<String>,
        instance: impl Into<String>,
        port: impl Into<String>,
    ) -> &mut Self {
        self.exposed
            .push((external.into(), Endpoint::new(instance, port)));
        self
    }

    /// Validates and freezes the netlist.
    ///
    /// Fails with [`SimError::DanglingPort`] when a referenced port does not
    /// exist, and [`SimError::DuplicateConnection`] when an endpoint is used
    /// more than once (across connections and exposures).
    pub fn build(self) -> Result<Netlist, SimError> {
        let mut instances = BTreeMap::new();
        for (name, model) in self.instances {
            if name.is_empty() || name.contains('.') {
                return Err(SimError::invalid_parameter(
                    format!("netlist `{}`", self.name),
                    "instance",
                    format!("name `{name}` must be non-empty and must not contain `.`"),
                ));
            }
            if instances.insert(name.clone(), model).is_some() {
                return Err(SimError::invalid_parameter(
                    format!("netlist `{}`", self.name),
                    "instance",
                    format!("name `{name}` placed twice"),
                ));
            }
        }

        {
            let port_sets: BTreeMap<&str, HashSet<String>> = instances
                .iter()
                .map(|(name, model)| (name.as_str(), model.port_names().into_iter().collect()))
                .collect();

            let mut endpoints: Vec<&Endpoint> = Vec::new();
            for conn in &self.connections {
                endpoints.push(&conn.a);
                endpoints.push(&conn.b);
            }
            for (_, ep) in &self.exposed {
                endpoints.push(ep);
            }
            let mut used: HashSet<&Endpoint> = HashSet::new();
            for ep in endpoints {
                let known = port_sets
                    .get(ep.instance.as_str())
                    .is_some_and(|ports| ports.contains(&ep.port));
                if !known {
                    return Err(SimError::DanglingPort {
                        netlist: self.name.clone(),
                        instance: ep.instance.clone(),
                        port: ep.port.clone(),
                    });
                }
                if !used.insert(ep) {
                    return Err(SimError::DuplicateConnection {
                        netlist: self.name.clone(),
                        instance: ep.instance.clone(),
                        port: ep.port.clone(),
                    });
                }
            }
        }

        let mut ports = BTreeMap::new();
        for (external, ep) in &self.exposed {
            if ports.insert(external.clone(), ep.clone()).is_some() {
                return Err(SimError::invalid_parameter(
                    format!("netlist `{}`", self.name),
                    "port",
                    format!("external name `{external}` exposed twice"),
                ));
            }
        }

        Ok(Netlist {
            name: self.name,
            instances,
            connections: self.connections,
            ports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Detector, LinearDispersion, Waveguide};

    fn guide() -> Waveguide {
        let index = LinearDispersion::new(2.0, -2.0e-5, 1310.0, (450.0, 1800.0)).unwrap();
        Waveguide::new(500.0, 2.0, index).unwrap()
    }

    #[test]
    fn a_valid_netlist_builds() {
        let mut b = NetlistBuilder::new("link");
        b.add_primitive("wg0", guide());
        b.add_primitive("wg1", guide());
        b.add_primitive("term", Detector::ideal());
        b.connect("wg0", "out", "wg1", "in");
        b.connect("wg1", "out", "term", "in");
        b.expose("in", "wg0", "in");
        let net = b.build().expect("valid");
        assert_eq!(net.instances().len(), 3);
        assert_eq!(net.connections().len(), 2);
        assert_eq!(net.ports()["in"], Endpoint::new("wg0", "in"));
    }

    #[test]
    fn unknown_port_is_dangling() {
        let mut b = NetlistBuilder::new("bad");
        b.add_primitive("wg0", guide());
        b.expose("in", "wg0", "north");
        let err = b.build().unwrap_err();
        assert!(matches!(err, SimError::DanglingPort { .. }));
    }

    #[test]
    fn unknown_instance_is_dangling() {
        let mut b = NetlistBuilder::new("bad");
        b.add_primitive("wg0", guide());
        b.connect("wg0", "out", "ghost", "in");
        let err = b.build().unwrap_err();
        assert!(matches!(err, SimError::DanglingPort { instance, .. } if instance == "ghost"));
    }

    #[test]
    fn double_use_of_an_endpoint_is_rejected() {
        let mut b = NetlistBuilder::new("bad");
        b.add_primitive("wg0", guide());
        b.add_primitive("wg1", guide());
        b.add_primitive("wg2", guide());
        b.connect("wg0", "out", "wg1", "in");
        b.connect("wg0", "out", "wg2", "in"); // fan-out without a splitter
        let err = b.build().unwrap_err();
        assert!(matches!(err, SimError::DuplicateConnection { .. }));
    }

    #[test]
    fn exposing_a_connected_endpoint_is_rejected() {
        let mut b = NetlistBuilder::new("bad");
        b.add_primitive("wg0", guide());
        b.add_primitive("wg1", guide());
        b.connect("wg0", "out", "wg1", "in");
        b.expose("tap", "wg0", "out");
        let err = b.build().unwrap_err();
        assert!(matches!(err, SimError::DuplicateConnection { .. }));
    }

    #[test]
    fn composite_ports_come_from_the_sub_netlist() {
        let mut inner = NetlistBuilder::new("inner");
        inner.add_primitive("wg", guide());
        inner.expose("west", "wg", "in");
        inner.expose("east", "wg", "out");
        let inner = inner.build().unwrap();

        let mut outer = NetlistBuilder::new("outer");
        outer.add_subcircuit("seg", inner);
        outer.add_primitive("term", Detector::ideal());
        outer.connect("seg", "east", "term", "in");
        outer.expose("in", "seg", "west");
        let outer = outer.build().expect("composite ports resolve");
        assert_eq!(outer.ports()["in"], Endpoint::new("seg", "west"));
    }
}
