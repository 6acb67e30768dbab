//! Multi-input power bus: a nonlinear supply that picks its feed.

use crate::common::check_config_value;
use gf_network::{
    BasicNode, Link, LinkStamp, NetworkResult, PortDirection, SolutionResult, SolverNode,
};
use tracing::warn;

/// Power bus configuration.
#[derive(Clone, Copy, Debug)]
pub struct PowerBusConfig {
    /// Inputs below this potential are invalid feeds.
    pub under_voltage_limit: f64,
    /// Inputs at or above this potential are primary and preferred over
    /// backup-range feeds.
    pub backup_voltage_threshold: f64,
    /// Power (W) drawn from the active input.
    pub load_power: f64,
    /// Conductance (S) stamped on the active input.
    pub load_conductance: f64,
    /// Input switches allowed per major step before the link stops
    /// rejecting solutions.
    pub max_switches_per_step: usize,
    /// Hysteresis on potential comparisons.
    pub tolerance: f64,
}

impl Default for PowerBusConfig {
    fn default() -> Self {
        Self {
            under_voltage_limit: 105.0,
            backup_voltage_threshold: 190.0,
            load_power: 100.0,
            load_conductance: 1e-4,
            max_switches_per_step: 5,
            tolerance: 0.1,
        }
    }
}

/// A supply fed from several input nodes, drawing its load from one of them
/// at a time.
///
/// The active input is chosen against the just-solved potentials inside
/// `confirm_solution_acceptable`: the highest input above the under-voltage
/// limit wins (primary-range inputs preferred), and a feed that sags below
/// the limit is deselected. Every flip re-stamps the link and rejects the
/// solution, bounded per major step to prevent thrash.
pub struct PowerBus {
    name: String,
    node_map: Vec<usize>,
    stamp: LinkStamp,
    directions: Vec<PortDirection>,
    config: PowerBusConfig,
    commanded_on: bool,
    active_input: Option<usize>,
    voltage_switches: usize,
    flux: f64,
}

impl PowerBus {
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<usize>,
        config: PowerBusConfig,
    ) -> NetworkResult<Self> {
        let name = name.into();
        check_config_value(&name, "load power must be >= 0", config.load_power)?;
        check_config_value(
            &name,
            "load conductance must be >= 0",
            config.load_conductance,
        )?;
        let num_ports = inputs.len();
        Ok(Self {
            name,
            node_map: inputs,
            stamp: LinkStamp::new(num_ports),
            directions: vec![PortDirection::None; num_ports],
            config,
            commanded_on: false,
            active_input: None,
            voltage_switches: 0,
            flux: 0.0,
        })
    }

    pub fn set_commanded_on(&mut self, on: bool) {
        self.commanded_on = on;
    }

    /// Currently selected input port, if any.
    pub fn active_input(&self) -> Option<usize> {
        self.active_input
    }

    /// Current drawn from the active input.
    pub fn input_current(&self) -> f64 {
        self.flux
    }

    /// True when the active feed is above the under-voltage limit.
    pub fn power_valid(&self, nodes: &[BasicNode]) -> bool {
        self.active_input
            .map(|port| {
                nodes[self.node_map[port]].potential() >= self.config.under_voltage_limit
            })
            .unwrap_or(false)
    }

    fn update_stamp(&mut self, nodes: &[BasicNode]) {
        for port in 0..self.node_map.len() {
            let active = self.commanded_on && self.active_input == Some(port);
            let admittance = if active {
                self.config.load_conductance
            } else {
                0.0
            };
            self.stamp.set_admittance(port, port, admittance);

            let source = if active {
                let potential = nodes[self.node_map[port]]
                    .potential()
                    .max(self.config.under_voltage_limit);
                -self.config.load_power / potential
            } else {
                0.0
            };
            self.stamp.set_source(port, source);
        }
    }

    /// Pick the best feed from the solved potentials: valid inputs only,
    /// primary-range inputs preferred, highest potential wins, ties going to
    /// the lowest port index.
    fn select_input(&self, nodes: &[BasicNode]) -> Option<usize> {
        let potential = |port: usize| nodes[self.node_map[port]].potential();

        let mut best: Option<usize> = None;
        let mut best_primary = false;
        for port in 0..self.node_map.len() {
            let v = potential(port);
            if v < self.config.under_voltage_limit {
                continue;
            }
            let primary = v >= self.config.backup_voltage_threshold;
            let better = match best {
                None => true,
                Some(b) => {
                    (primary && !best_primary)
                        || (primary == best_primary && v > potential(b) + self.config.tolerance)
                }
            };
            if better {
                best = Some(port);
                best_primary = primary;
            }
        }
        best
    }
}

impl Link<BasicNode> for PowerBus {
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

    fn is_non_linear(&self) -> bool {
        true
    }

    /// Inputs may share an upstream node.
    fn allows_duplicate_ports(&self) -> bool {
        true
    }

    fn step(&mut self, nodes: &mut [BasicNode], _dt: f64) {
        // The switch budget is per major step.
        self.voltage_switches = 0;
        self.update_stamp(nodes);
    }

    fn minor_step(&mut self, nodes: &mut [BasicNode], _dt: f64, _minor: usize) {
        self.update_stamp(nodes);
    }

    fn confirm_solution_acceptable(
        &mut self,
        nodes: &[BasicNode],
        _converged_step: usize,
        absolute_step: usize,
    ) -> SolutionResult {
        let desired = if self.commanded_on {
            self.select_input(nodes)
        } else {
            None
        };

        let need_switch = match (self.active_input, desired) {
            (None, None) => false,
            (None, Some(_)) | (Some(_), None) => true,
            (Some(active), Some(wanted)) => {
                if active == wanted {
                    false
                } else {
                    let active_v = nodes[self.node_map[active]].potential();
                    let wanted_v = nodes[self.node_map[wanted]].potential();
                    active_v < self.config.under_voltage_limit - self.config.tolerance
                        || wanted_v > active_v + self.config.tolerance
                }
            }
        };

        if !need_switch {
            return SolutionResult::Confirm;
        }
        if self.voltage_switches >= self.config.max_switches_per_step {
            warn!(
                link = %self.name,
                absolute_step,
                "input switch budget exhausted; accepting solution as-is"
            );
            return SolutionResult::Confirm;
        }

        self.active_input = desired;
        self.voltage_switches += 1;
        SolutionResult::Reject
    }

    fn compute_flows(&mut self, nodes: &mut [BasicNode], _dt: f64) {
        self.directions.iter_mut().for_each(|d| *d = PortDirection::None);
        self.flux = 0.0;
        if let Some(port) = self.active_input.filter(|_| self.commanded_on) {
            let potential = nodes[self.node_map[port]]
                .potential()
                .max(self.config.under_voltage_limit);
            self.flux = self.config.load_power / potential;
            self.directions[port] = PortDirection::Source;
            nodes[self.node_map[port]].schedule_outflux(self.flux);
        }
    }

    fn transport_flows(&mut self, nodes: &mut [BasicNode], _dt: f64) {
        if let Some(port) = self.active_input.filter(|_| self.commanded_on) {
            nodes[self.node_map[port]].collect_outflux(self.flux);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn four_inputs() -> Vec<BasicNode> {
        [124.5, 124.5, 124.5, 0.0]
            .iter()
            .enumerate()
            .map(|(i, &p)| BasicNode::new(format!("in{i}"), p))
            .chain(std::iter::once(BasicNode::new("ground", 0.0)))
            .collect()
    }

    fn bus() -> PowerBus {
        PowerBus::new("bus", vec![0, 1, 2, 3], PowerBusConfig::default()).unwrap()
    }

    #[test]
    fn stays_off_without_command() {
        let nodes = four_inputs();
        let mut bus = bus();
        let vote = bus.confirm_solution_acceptable(&nodes, 0, 1);
        assert_eq!(vote, SolutionResult::Confirm);
        assert_eq!(bus.active_input(), None);
    }

    #[test]
    fn commanded_on_selects_lowest_index_among_ties() {
        let mut nodes = four_inputs();
        let mut bus = bus();
        bus.set_commanded_on(true);
        bus.step(&mut nodes, 0.1);

        // First poll flips the state and rejects; the re-solve confirms.
        assert_eq!(
            bus.confirm_solution_acceptable(&nodes, 0, 1),
            SolutionResult::Reject
        );
        assert_eq!(bus.active_input(), Some(0));
        assert_eq!(
            bus.confirm_solution_acceptable(&nodes, 0, 2),
            SolutionResult::Confirm
        );
    }

    #[test]
    fn deselects_input_sagging_below_limit() {
        let mut nodes = four_inputs();
        let mut bus = bus();
        bus.set_commanded_on(true);
        bus.step(&mut nodes, 0.1);
        bus.confirm_solution_acceptable(&nodes, 0, 1);
        assert_eq!(bus.active_input(), Some(0));

        // Input 0 sags below the 105 V limit: the bus flips to input 1.
        nodes[0].set_potential(100.0);
        assert_eq!(
            bus.confirm_solution_acceptable(&nodes, 0, 2),
            SolutionResult::Reject
        );
        assert_eq!(bus.active_input(), Some(1));
    }

    #[test]
    fn prefers_primary_range_input() {
        let mut nodes = four_inputs();
        nodes[2].set_potential(195.0);
        let mut bus = bus();
        bus.set_commanded_on(true);
        bus.step(&mut nodes, 0.1);
        bus.confirm_solution_acceptable(&nodes, 0, 1);
        assert_eq!(bus.active_input(), Some(2));
    }

    #[test]
    fn switch_budget_bounds_rejections() {
        let mut nodes = four_inputs();
        let mut config = PowerBusConfig::default();
        config.max_switches_per_step = 0;
        let mut bus = PowerBus::new("bus", vec![0, 1, 2, 3], config).unwrap();
        bus.set_commanded_on(true);
        bus.step(&mut nodes, 0.1);

        // A switch is needed but the budget is exhausted: accept as-is.
        assert_eq!(
            bus.confirm_solution_acceptable(&nodes, 0, 1),
            SolutionResult::Confirm
        );
        assert_eq!(bus.active_input(), None);
    }

    #[test]
    fn draws_load_current_from_active_input() {
        let mut nodes = four_inputs();
        let mut bus = bus();
        bus.set_commanded_on(true);
        bus.step(&mut nodes, 0.1);
        bus.confirm_solution_acceptable(&nodes, 0, 1);
        bus.minor_step(&mut nodes, 0.1, 2);
        bus.compute_flows(&mut nodes, 0.1);

        assert!((bus.input_current() - 100.0 / 124.5).abs() < 1e-12);
        assert_eq!(bus.port_directions()[0], PortDirection::Source);
        assert!(bus.power_valid(&nodes));

        bus.transport_flows(&mut nodes, 0.1);
        nodes[0].integrate_flows(0.1);
        assert!((nodes[0].net_flux() + bus.input_current()).abs() < 1e-12);
    }
}
