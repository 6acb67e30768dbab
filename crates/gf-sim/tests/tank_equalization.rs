//! Integration test: two gas tanks equalizing through a restriction.

use gf_core::units::{k, kpa};
use gf_fluids::{Composition, FluidConfig, FluidState, Species};
use gf_links::{FluidCapacitor, FluidConductor};
use gf_network::{FluidNode, SolverNode};
use gf_sim::Network;
use std::sync::Arc;

fn tank_network() -> Network<FluidNode> {
    let config: Arc<FluidConfig> =
        FluidConfig::new(vec![Species::O2, Species::N2, Species::CO2]).unwrap();
    let state = |pressure: f64| {
        FluidState::new(
            Composition::new(config.clone(), &[0.2, 0.79, 0.01]).unwrap(),
            kpa(pressure),
            k(300.0),
        )
        .unwrap()
    };

    let nodes = vec![
        FluidNode::new("left", state(110.0)),
        FluidNode::new("right", state(100.0)),
        FluidNode::new("ground", state(1e-6)),
    ];
    let mut network = Network::new("tanks", nodes).unwrap();
    network
        .add_link(Box::new(FluidCapacitor::new("left_tank", 0, 2, 1.0).unwrap()))
        .unwrap();
    network
        .add_link(Box::new(
            FluidCapacitor::new("right_tank", 1, 2, 1.0).unwrap(),
        ))
        .unwrap();
    network
        .add_link(Box::new(FluidConductor::new("pipe", 0, 1, 1e-4).unwrap()))
        .unwrap();
    network
}

#[test]
fn tanks_equalize_and_conserve_mass() {
    let mut network = tank_network();
    let initial_mass = network.nodes()[0].mass() + network.nodes()[1].mass();
    let initial_diff =
        network.nodes()[0].potential() - network.nodes()[1].potential();
    assert!((initial_diff - 10.0).abs() < 1e-9);

    for _ in 0..200 {
        let summary = network.step(0.1).unwrap();
        assert!(summary.converged);

        // Mass conservation across the pair, every step.
        let total = network.nodes()[0].mass() + network.nodes()[1].mass();
        assert!(
            ((total - initial_mass) / initial_mass).abs() < 1e-9,
            "mass drifted: {total} vs {initial_mass}"
        );

        // Mixture invariant.
        for node in &network.nodes()[..2] {
            let sum: f64 = node.content().composition().mass_fractions().iter().sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    // Pressures have converged toward each other.
    let final_diff =
        (network.nodes()[0].potential() - network.nodes()[1].potential()).abs();
    assert!(final_diff < 0.5, "pressures did not equalize: {final_diff}");

    // High-pressure tank drained into the low-pressure one.
    assert!(network.nodes()[0].potential() < 110.0);
    assert!(network.nodes()[1].potential() > 100.0);
}

#[test]
fn steady_state_is_idempotent() {
    let mut network = tank_network();
    for _ in 0..400 {
        network.step(0.1).unwrap();
    }
    let p0 = network.nodes()[0].potential();
    let p1 = network.nodes()[1].potential();

    network.step(0.1).unwrap();
    assert!((network.nodes()[0].potential() - p0).abs() < 1e-6);
    assert!((network.nodes()[1].potential() - p1).abs() < 1e-6);
}

#[test]
fn perturbed_potential_is_corrected_within_twenty_steps() {
    let config: Arc<FluidConfig> =
        FluidConfig::new(vec![Species::O2, Species::N2, Species::CO2]).unwrap();
    let state = FluidState::new(
        Composition::new(config.clone(), &[0.2, 0.79, 0.01]).unwrap(),
        kpa(100.0),
        k(300.0),
    )
    .unwrap();
    let nodes = vec![
        FluidNode::new("tank", state.clone()),
        FluidNode::new("ground", state),
    ];
    let mut network = Network::new("single", nodes).unwrap();
    network
        .add_link(Box::new(FluidCapacitor::new("tank", 0, 1, 0.01).unwrap()))
        .unwrap();

    // Let the tank settle, then force the solver potential off the
    // state-equation pressure.
    for _ in 0..5 {
        network.step(0.1).unwrap();
    }
    let new_potential = network.nodes()[0].potential() + 1.0;
    network.nodes_mut()[0].set_potential(new_potential);

    for _ in 0..20 {
        network.step(0.1).unwrap();
    }
    let node = &network.nodes()[0];
    let error = (node.content().pressure() - node.potential()).abs();
    assert!(
        error < 0.05,
        "pressure correction did not reconverge: error = {error}"
    );
}
