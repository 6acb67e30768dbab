//! The network: nodes, links, and the major-step entry point.

use crate::error::{SimError, SimResult};
use gf_network::{check_port_remap, validate_link, Link, SolverNode};
use gf_solver::{FlowOrchestrator, NetworkSolver, SolverConfig};
use tracing::debug;

/// Summary of one major step.
#[derive(Clone, Copy, Debug)]
pub struct StepSummary {
    /// Simulation time after this step (s).
    pub time: f64,
    /// Major steps taken so far.
    pub step: u64,
    /// Minor steps the solver needed.
    pub minor_steps: usize,
    /// False when the solver warned and proceeded with an unconfirmed or
    /// last-good solution.
    pub converged: bool,
}

/// A lumped-parameter network: an ordered node list whose last entry is the
/// Ground node, and an ordered link list.
///
/// All determinism flows from registration order: links step, stamp, vote,
/// and transport in the order they were added, and nodes integrate in index
/// order subject to the orchestrator's readiness rule. One `step(dt)` call
/// is one atomic major step; nothing in the core suspends or blocks.
pub struct Network<N: SolverNode> {
    name: String,
    nodes: Vec<N>,
    links: Vec<Box<dyn Link<N>>>,
    solver: NetworkSolver,
    orchestrator: FlowOrchestrator,
    step_count: u64,
    time: f64,
}

impl<N: SolverNode> Network<N> {
    /// Create a network over the given nodes; the last node is Ground.
    pub fn new(name: impl Into<String>, nodes: Vec<N>) -> SimResult<Self> {
        if nodes.len() < 2 {
            return Err(SimError::InvalidArg {
                what: "a network needs at least one non-Ground node plus Ground",
            });
        }
        let num_nodes = nodes.len();
        Ok(Self {
            name: name.into(),
            nodes,
            links: Vec::new(),
            solver: NetworkSolver::new(num_nodes, SolverConfig::default())?,
            orchestrator: FlowOrchestrator::new(0, num_nodes),
            step_count: 0,
            time: 0.0,
        })
    }

    /// Replace the default solver configuration.
    pub fn with_solver_config(mut self, config: SolverConfig) -> SimResult<Self> {
        self.solver = NetworkSolver::new(self.nodes.len(), config)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the Ground node (always the last).
    pub fn ground(&self) -> usize {
        self.nodes.len() - 1
    }

    pub fn nodes(&self) -> &[N] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [N] {
        &mut self.nodes
    }

    pub fn links(&self) -> &[Box<dyn Link<N>>] {
        &self.links
    }

    pub fn link_mut(&mut self, index: usize) -> Option<&mut Box<dyn Link<N>>> {
        self.links.get_mut(index)
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Register a link: validate its port mapping, run its one-time
    /// initialization, and append it to the registration order. Returns the
    /// link's index.
    pub fn add_link(&mut self, mut link: Box<dyn Link<N>>) -> SimResult<usize> {
        validate_link(link.as_ref(), &self.nodes, self.ground())?;
        link.initialize(&mut self.nodes)?;
        self.links.push(link);
        self.orchestrator = FlowOrchestrator::new(self.links.len(), self.nodes.len());
        Ok(self.links.len() - 1)
    }

    /// User-driven port remap: validated against the same rules as
    /// initialization, then applied through the link.
    pub fn remap_port(&mut self, link: usize, port: usize, node: usize) -> SimResult<()> {
        let ground = self.ground();
        let the_link = self.links.get_mut(link).ok_or(SimError::InvalidArg {
            what: "link index out of range",
        })?;
        check_port_remap(the_link.as_ref(), port, node, &self.nodes, ground)?;
        the_link.remap_port(port, node);
        if the_link.node_map()[port] != node {
            return Err(SimError::InvalidArg {
                what: "link does not support port remapping",
            });
        }
        Ok(())
    }

    /// Advance the network one major step.
    ///
    /// The sequence is: reset node flow accumulators, let every link update
    /// its stamp, run the minor-step solution loop, transport and integrate
    /// flows in causal order, then recompute each node's potential
    /// correction for the next step's source vector.
    pub fn step(&mut self, dt: f64) -> SimResult<StepSummary> {
        if !(dt > 0.0) || !dt.is_finite() {
            return Err(SimError::InvalidArg {
                what: "dt must be positive and finite",
            });
        }

        for node in &mut self.nodes {
            node.reset_flows();
        }
        for link in &mut self.links {
            link.step(&mut self.nodes, dt);
        }

        let result = self.solver.solve(&mut self.nodes, &mut self.links, dt);

        self.orchestrator
            .update(&mut self.nodes, &mut self.links, dt)?;

        let ground = self.ground();
        for node in &mut self.nodes[..ground] {
            node.compute_potential_correction();
        }

        self.step_count += 1;
        self.time += dt;
        debug!(
            network = %self.name,
            step = self.step_count,
            minor_steps = result.minor_steps,
            converged = result.converged,
            "major step complete"
        );

        Ok(StepSummary {
            time: self.time,
            step: self.step_count,
            minor_steps: result.minor_steps,
            converged: result.converged,
        })
    }
}
