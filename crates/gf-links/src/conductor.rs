//! Electrical conductor: a constant conductance between two nodes.

use crate::common::{check_config_value, clamp_blockage, source_sink_ports, two_port_directions};
use gf_network::{BasicNode, Link, LinkStamp, NetworkResult, PortDirection, SolverNode};

/// A two-port conductance (S) with an optional blockage malfunction that
/// derates it multiplicatively.
pub struct Conductor {
    name: String,
    node_map: Vec<usize>,
    stamp: LinkStamp,
    directions: [PortDirection; 2],
    default_conductance: f64,
    effective_conductance: f64,
    blockage: f64,
    potential_drop: f64,
    flux: f64,
    power: f64,
}

impl Conductor {
    pub fn new(
        name: impl Into<String>,
        node0: usize,
        node1: usize,
        conductance: f64,
    ) -> NetworkResult<Self> {
        let name = name.into();
        let conductance = check_config_value(&name, "conductance must be >= 0", conductance)?;
        Ok(Self {
            name,
            node_map: vec![node0, node1],
            stamp: LinkStamp::new(2),
            directions: [PortDirection::None; 2],
            default_conductance: conductance,
            effective_conductance: conductance,
            blockage: 0.0,
            potential_drop: 0.0,
            flux: 0.0,
            power: 0.0,
        })
    }

    /// Blockage malfunction in [0, 1]; 1 fully blocks the link.
    pub fn set_blockage(&mut self, blockage: f64) {
        self.blockage = clamp_blockage(blockage);
    }

    /// Signed flux through the link (positive from port 0 to port 1).
    pub fn flux(&self) -> f64 {
        self.flux
    }

    pub fn potential_drop(&self) -> f64 {
        self.potential_drop
    }

    /// Power dissipated in the link.
    pub fn power(&self) -> f64 {
        self.power
    }
}

impl Link<BasicNode> for Conductor {
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

    fn step(&mut self, _nodes: &mut [BasicNode], _dt: f64) {
        self.effective_conductance = self.default_conductance * (1.0 - self.blockage);
        let g = self.effective_conductance;
        self.stamp.stamp_conductance(g);
    }

    fn compute_flows(&mut self, nodes: &mut [BasicNode], _dt: f64) {
        let p0 = nodes[self.node_map[0]].potential();
        let p1 = nodes[self.node_map[1]].potential();
        self.potential_drop = p0 - p1;
        self.flux = self.potential_drop * self.effective_conductance;
        self.power = self.flux * self.potential_drop;
        self.directions = two_port_directions(self.flux);
        if let Some((source, _)) = source_sink_ports(self.flux) {
            nodes[self.node_map[source]].schedule_outflux(self.flux.abs());
        }
    }

    fn transport_flows(&mut self, nodes: &mut [BasicNode], _dt: f64) {
        if let Some((source, sink)) = source_sink_ports(self.flux) {
            let magnitude = self.flux.abs();
            nodes[self.node_map[source]].collect_outflux(magnitude);
            nodes[self.node_map[sink]].collect_influx(magnitude);
        }
    }
}
