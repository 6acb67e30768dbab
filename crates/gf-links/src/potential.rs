//! Electrical potential source: holds a node near a set potential.

use crate::common::{check_config_value, source_sink_ports, two_port_directions};
use gf_network::{BasicNode, Link, LinkStamp, NetworkResult, PortDirection, SolverNode};

/// A Norton-equivalent potential source: conductance `G` between the ports
/// with a source flux `G * V_source`, pulling port 0 toward `V_source` above
/// port 1 (the reference, usually Ground).
///
/// Port 0 is the driven node and may not map to Ground.
pub struct PotentialSource {
    name: String,
    node_map: Vec<usize>,
    stamp: LinkStamp,
    directions: [PortDirection; 2],
    source_potential: f64,
    conductance: f64,
    flux: f64,
}

impl PotentialSource {
    pub fn new(
        name: impl Into<String>,
        node: usize,
        reference: usize,
        source_potential: f64,
        conductance: f64,
    ) -> NetworkResult<Self> {
        let name = name.into();
        let conductance = check_config_value(&name, "conductance must be >= 0", conductance)?;
        Ok(Self {
            name,
            node_map: vec![node, reference],
            stamp: LinkStamp::new(2),
            directions: [PortDirection::None; 2],
            source_potential,
            conductance,
            flux: 0.0,
        })
    }

    pub fn set_source_potential(&mut self, potential: f64) {
        self.source_potential = potential;
    }

    /// Flux delivered into port 0 (positive when sourcing).
    pub fn flux(&self) -> f64 {
        self.flux
    }
}

impl Link<BasicNode> for PotentialSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_map(&self) -> &[usize] {
        &self.node_map
    }

    fn remap_port(&mut self, port: usize, node: usize) {
        self.node_map[port] = node;
    }

    fn stamp(&self) -> &LinkStamp {
        &self.stamp
    }

    fn stamp_mut(&mut self) -> &mut LinkStamp {
        &mut self.stamp
    }

    fn port_directions(&self) -> &[PortDirection] {
        &self.directions
    }

    fn check_port_rules(
        &self,
        port: usize,
        node: usize,
        ground: usize,
        _nodes: &[BasicNode],
    ) -> bool {
        // The driven port must reference a real node.
        !(port == 0 && node == ground)
    }

    fn step(&mut self, _nodes: &mut [BasicNode], _dt: f64) {
        let g = self.conductance;
        self.stamp.stamp_conductance(g);
        let source_flux = g * self.source_potential;
        self.stamp.set_source(0, source_flux);
        self.stamp.set_source(1, -source_flux);
    }

    fn compute_flows(&mut self, nodes: &mut [BasicNode], _dt: f64) {
        let p0 = nodes[self.node_map[0]].potential();
        let p1 = nodes[self.node_map[1]].potential();
        // Net flux into port 0: source minus what leaks back through G.
        self.flux = self.conductance * (self.source_potential - (p0 - p1));
        // Positive flux means the reference side feeds port 0.
        self.directions = two_port_directions(-self.flux);
        if let Some((source, _)) = source_sink_ports(-self.flux) {
            nodes[self.node_map[source]].schedule_outflux(self.flux.abs());
        }
    }

    fn transport_flows(&mut self, nodes: &mut [BasicNode], _dt: f64) {
        if let Some((source, sink)) = source_sink_ports(-self.flux) {
            let magnitude = self.flux.abs();
            nodes[self.node_map[source]].collect_outflux(magnitude);
            nodes[self.node_map[sink]].collect_influx(magnitude);
        }
    }
}
