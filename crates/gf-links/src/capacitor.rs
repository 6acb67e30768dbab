//! Electrical capacitor: stored charge against the reference node.

use crate::common::check_config_value;
use gf_network::{BasicNode, Link, LinkStamp, NetworkResult, PortDirection, SolverNode};

/// A capacitance (F) between port 0 and the reference at port 1 (usually
/// Ground).
///
/// Implicit integration stamps `C/dt` on the diagonal with a history source
/// `C/dt * p_prev`, so the solved potential carries the stored charge
/// forward: `C/dt * (p_new - p_prev) = net flux`.
pub struct Capacitor {
    name: String,
    node_map: Vec<usize>,
    stamp: LinkStamp,
    directions: [PortDirection; 2],
    capacitance: f64,
    flux: f64,
}

impl Capacitor {
    pub fn new(
        name: impl Into<String>,
        node: usize,
        reference: usize,
        capacitance: f64,
    ) -> NetworkResult<Self> {
        let name = name.into();
        let capacitance = check_config_value(&name, "capacitance must be >= 0", capacitance)?;
        Ok(Self {
            name,
            node_map: vec![node, reference],
            stamp: LinkStamp::new(2),
            directions: [PortDirection::None; 2],
            capacitance,
            flux: 0.0,
        })
    }

    pub fn capacitance(&self) -> f64 {
        self.capacitance
    }

    /// Charging flux from the last computed step.
    pub fn flux(&self) -> f64 {
        self.flux
    }
}

impl Link<BasicNode> for Capacitor {
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

    fn step(&mut self, nodes: &mut [BasicNode], dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let admittance = self.capacitance / dt;
        self.stamp.set_admittance(0, 0, admittance);
        // History anchors to the last major step's solution so re-stamping
        // during minor steps cannot chase the in-flight potential.
        let history = admittance * nodes[self.node_map[0]].previous_potential();
        self.stamp.set_source(0, history);
    }

    fn minor_step(&mut self, _nodes: &mut [BasicNode], _dt: f64, _minor: usize) {
        // The stamp does not depend on the solver iterate.
    }

    fn compute_flows(&mut self, nodes: &mut [BasicNode], dt: f64) {
        if dt <= 0.0 {
            return;
        }
        let node = &nodes[self.node_map[0]];
        self.flux =
            self.capacitance / dt * (node.potential() - node.previous_potential());
        self.directions = [PortDirection::None, PortDirection::None];
    }

    fn transport_flows(&mut self, nodes: &mut [BasicNode], _dt: f64) {
        // The stored charge stays in the capacitor; the node only sees the
        // charging flux.
        if self.flux > 0.0 {
            nodes[self.node_map[0]].collect_outflux(self.flux);
        } else if self.flux < 0.0 {
            nodes[self.node_map[0]].collect_influx(-self.flux);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_capacitance_over_dt_with_history() {
        let mut nodes = vec![BasicNode::new("n0", 124.5), BasicNode::new("gnd", 0.0)];
        let mut cap = Capacitor::new("cap", 0, 1, 1.0).unwrap();
        cap.step(&mut nodes, 0.1);
        assert!((cap.stamp().admittance_entry(0, 0) - 10.0).abs() < 1e-12);
        assert!((cap.stamp().source()[0] - 1245.0).abs() < 1e-12);
        // Reference port carries no stamp.
        assert_eq!(cap.stamp().admittance_entry(1, 1), 0.0);
    }

    #[test]
    fn rejects_negative_capacitance() {
        assert!(Capacitor::new("cap", 0, 1, -1.0).is_err());
    }

    #[test]
    fn charging_flux_follows_potential_change() {
        let mut nodes = vec![BasicNode::new("n0", 100.0), BasicNode::new("gnd", 0.0)];
        let mut cap = Capacitor::new("cap", 0, 1, 2.0).unwrap();
        for node in nodes.iter_mut() {
            node.reset_flows();
        }
        nodes[0].set_potential(101.0);
        cap.compute_flows(&mut nodes, 0.1);
        // C * dV / dt = 2 * 1 / 0.1.
        assert!((cap.flux() - 20.0).abs() < 1e-12);
    }
}
