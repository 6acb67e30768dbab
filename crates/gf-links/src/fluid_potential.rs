//! Fluid potential source: holds a node near a set pressure.

use crate::common::{check_config_value, source_sink_ports, two_port_directions};
use gf_fluids::transfer::compute_admittance;
use gf_network::{
    FluidNode, Link, LinkStamp, NetworkResult, PortDirection, SolverNode,
};

/// A pressure boundary: conductivity-linearized admittance between the
/// ports plus a source flux `A * P_source`, pulling port 0 toward
/// `P_source` above port 1 (usually Ground).
///
/// Port 0 is the driven node and may not map to Ground.
pub struct FluidPotentialSource {
    name: String,
    node_map: Vec<usize>,
    stamp: LinkStamp,
    directions: [PortDirection; 2],
    source_pressure: f64,
    max_conductivity: f64,
    min_linearization_potential: f64,
    admittance: f64,
    flux: f64,
    flow_rate: f64,
}

impl FluidPotentialSource {
    pub fn new(
        name: impl Into<String>,
        node: usize,
        reference: usize,
        source_pressure: f64,
        max_conductivity: f64,
    ) -> NetworkResult<Self> {
        let name = name.into();
        let max_conductivity =
            check_config_value(&name, "conductivity must be >= 0", max_conductivity)?;
        let source_pressure =
            check_config_value(&name, "source pressure must be >= 0", source_pressure)?;
        Ok(Self {
            name,
            node_map: vec![node, reference],
            stamp: LinkStamp::new(2),
            directions: [PortDirection::None; 2],
            source_pressure,
            max_conductivity,
            min_linearization_potential: 1e-2,
            admittance: 0.0,
            flux: 0.0,
            flow_rate: 0.0,
        })
    }

    pub fn set_source_pressure(&mut self, pressure: f64) {
        self.source_pressure = pressure.max(0.0);
    }

    pub fn source_pressure(&self) -> f64 {
        self.source_pressure
    }

    /// Molar flux delivered into port 0 (positive when sourcing).
    pub fn flux(&self) -> f64 {
        self.flux
    }

    pub fn flow_rate(&self) -> f64 {
        self.flow_rate
    }

    pub(crate) fn admittance(&self) -> f64 {
        self.admittance
    }

    pub(crate) fn stamp_with_source(&mut self, admittance: f64, source_pressure: f64) {
        self.admittance = admittance;
        self.stamp.stamp_conductance(admittance);
        let source_flux = admittance * source_pressure;
        self.stamp.set_source(0, source_flux);
        self.stamp.set_source(1, -source_flux);
    }

    pub(crate) fn compute_two_port_flows(
        &mut self,
        nodes: &mut [FluidNode],
        source_pressure: f64,
    ) {
        let p0 = nodes[self.node_map[0]].potential();
        let p1 = nodes[self.node_map[1]].potential();
        self.flux = self.admittance * (source_pressure - (p0 - p1));
        self.directions = two_port_directions(-self.flux);
        if let Some((source, _)) = source_sink_ports(-self.flux) {
            let mw = nodes[self.node_map[source]].outflow().molar_mass();
            self.flow_rate = self.flux.abs() * mw;
            nodes[self.node_map[source]].schedule_outflux(self.flux.abs());
        } else {
            self.flow_rate = 0.0;
        }
    }

    pub(crate) fn transport_two_port(&mut self, nodes: &mut [FluidNode]) {
        if let Some((source, sink)) = source_sink_ports(-self.flux) {
            let stream = nodes[self.node_map[source]].outflow().clone();
            nodes[self.node_map[source]].collect_outflux(self.flow_rate);
            nodes[self.node_map[sink]].collect_influx(self.flow_rate, &stream);
        }
    }
}

impl Link<FluidNode> for FluidPotentialSource {
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
        _nodes: &[FluidNode],
    ) -> bool {
        !(port == 0 && node == ground)
    }

    fn step(&mut self, nodes: &mut [FluidNode], _dt: f64) {
        let fluid0 = nodes[self.node_map[0]].content();
        let fluid1 = nodes[self.node_map[1]].content();
        let admittance = compute_admittance(
            self.max_conductivity,
            self.min_linearization_potential,
            fluid0,
            fluid1,
            0.5,
        );
        let source_pressure = self.source_pressure;
        self.stamp_with_source(admittance, source_pressure);
    }

    fn compute_flows(&mut self, nodes: &mut [FluidNode], _dt: f64) {
        let source_pressure = self.source_pressure;
        self.compute_two_port_flows(nodes, source_pressure);
    }

    fn transport_flows(&mut self, nodes: &mut [FluidNode], _dt: f64) {
        self.transport_two_port(nodes);
    }
}
