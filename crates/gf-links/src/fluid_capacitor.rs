//! Fluid capacitor: attaches volume to a node and stamps its capacitance.

use crate::common::check_config_value;
use gf_network::{
    FluidNode, Link, LinkStamp, NetworkResult, PortDirection, SolverNode,
};

/// Gives its port-0 node a volume and carries the node's capacitive terms
/// into the system each step.
///
/// The stamp is `C/dt` on the diagonal with source `C/dt * p + thermal +
/// compression`: the implicit-integration history term plus the node's
/// thermal-capacitance and compression contributions. Port 1 is the
/// reference (usually Ground) and carries nothing.
pub struct FluidCapacitor {
    name: String,
    node_map: Vec<usize>,
    stamp: LinkStamp,
    directions: [PortDirection; 2],
    volume: f64,
    capacitance: f64,
}

impl FluidCapacitor {
    pub fn new(
        name: impl Into<String>,
        node: usize,
        reference: usize,
        volume: f64,
    ) -> NetworkResult<Self> {
        let name = name.into();
        let volume = check_config_value(&name, "volume must be >= 0", volume)?;
        Ok(Self {
            name,
            node_map: vec![node, reference],
            stamp: LinkStamp::new(2),
            directions: [PortDirection::None; 2],
            volume,
            capacitance: 0.0,
        })
    }

    /// Node capacitance (kgmol/kPa) from the last step.
    pub fn capacitance(&self) -> f64 {
        self.capacitance
    }

    /// Change the attached volume at run time (e.g. a moving piston); the
    /// node's compression term reconciles the stored mass.
    pub fn set_volume(&mut self, nodes: &mut [FluidNode], volume: f64) -> NetworkResult<()> {
        let volume = check_config_value(&self.name, "volume must be >= 0", volume)?;
        nodes[self.node_map[0]].set_volume(volume)?;
        self.volume = volume;
        Ok(())
    }
}

impl Link<FluidNode> for FluidCapacitor {
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
        // The volume must live on a real node.
        !(port == 0 && node == ground)
    }

    fn initialize(&mut self, nodes: &mut [FluidNode]) -> NetworkResult<()> {
        nodes[self.node_map[0]].init_volume(self.volume)
    }

    fn step(&mut self, nodes: &mut [FluidNode], dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let node = &mut nodes[self.node_map[0]];
        self.capacitance = node.capacitance();
        let admittance = self.capacitance / dt;
        // History anchors to the last major step's solution so re-stamping
        // during minor steps cannot chase the in-flight potential.
        let history = admittance * node.previous_potential();
        let thermal = node.compute_thermal_capacitance();
        let compression = node.compute_compression();

        self.stamp.set_admittance(0, 0, admittance);
        self.stamp.set_source(0, history + thermal + compression);
    }

    fn minor_step(&mut self, _nodes: &mut [FluidNode], _dt: f64, _minor: usize) {
        // The stamp does not depend on the solver iterate, and re-running
        // `step` would re-latch the node's previous temperature and volume
        // mid-iteration.
    }

    fn compute_flows(&mut self, _nodes: &mut [FluidNode], _dt: f64) {
        // Stored fluid stays in the node; nothing crosses this link.
        self.directions = [PortDirection::None, PortDirection::None];
    }

    fn transport_flows(&mut self, _nodes: &mut [FluidNode], _dt: f64) {}
}
