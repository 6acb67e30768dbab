//! Integration test: a multi-input power bus selecting its feed in-network.

use gf_links::{PotentialSource, PowerBus, PowerBusConfig};
use gf_network::{BasicNode, SolverNode};
use gf_sim::Network;

fn supply_network(commanded_on: bool) -> (Network<BasicNode>, usize) {
    // Four feeder nodes held at (124.5, 124.5, 124.5, 0.0) plus Ground.
    let potentials = [124.5, 124.5, 124.5, 0.0];
    let mut nodes: Vec<BasicNode> = potentials
        .iter()
        .enumerate()
        .map(|(i, &p)| BasicNode::new(format!("feed{i}"), p))
        .collect();
    nodes.push(BasicNode::new("ground", 0.0));
    let ground = nodes.len() - 1;

    let mut network = Network::new("supply", nodes).unwrap();
    for (i, &p) in potentials.iter().enumerate() {
        network
            .add_link(Box::new(
                PotentialSource::new(format!("vs{i}"), i, ground, p, 1e4).unwrap(),
            ))
            .unwrap();
    }

    let config = PowerBusConfig {
        under_voltage_limit: 105.0,
        backup_voltage_threshold: 190.0,
        load_power: 100.0,
        ..PowerBusConfig::default()
    };
    let mut bus = PowerBus::new("bus", vec![0, 1, 2, 3], config).unwrap();
    bus.set_commanded_on(commanded_on);
    let index = network.add_link(Box::new(bus)).unwrap();
    (network, index)
}

#[test]
fn bus_stays_off_uncommanded() {
    let (mut network, _) = supply_network(false);
    let summary = network.step(0.1).unwrap();
    assert!(summary.converged);
    assert_eq!(summary.minor_steps, 1);
    // No load drawn from any feeder.
    for node in &network.nodes()[..4] {
        assert!(node.net_flux().abs() < 1e-9);
    }
}

#[test]
fn bus_selects_first_valid_input_when_commanded() {
    let (mut network, _) = supply_network(true);
    let summary = network.step(0.1).unwrap();

    assert!(summary.converged);
    // One rejection to flip the input on, then agreement.
    assert!(summary.minor_steps >= 2);

    // The selected feeder (index 0 among the 124.5 V ties) sags under the
    // load current while the unselected feeders sit at their sources.
    let p0 = network.nodes()[0].potential();
    let p1 = network.nodes()[1].potential();
    let expected_sag = (100.0 / 124.5) / 1e4;
    assert!(p0 < 124.5 - 0.1 * expected_sag, "p0 = {p0}");
    assert!((p1 - 124.5).abs() < 1e-6, "p1 = {p1}");
    assert!(network.nodes()[3].potential().abs() < 1e-6);
}

#[test]
fn rejection_count_stays_within_switch_budget() {
    let (mut network, _) = supply_network(true);
    let config = gf_solver::SolverConfig::default();
    let summary = network.step(0.1).unwrap();
    // The budgeted switches bound the re-solves well below the solver's
    // minor-step ceiling.
    assert!(summary.minor_steps <= config.max_minor_steps);
    assert!(summary.converged);
}
