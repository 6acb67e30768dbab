//! Minor-step controller: drives nonlinear links to agreement.

use crate::error::SolverResult;
use crate::system::SolverSystem;
use gf_network::{Link, SolutionResult, SolverNode};
use tracing::warn;

/// Solver configuration.
#[derive(Clone, Copy, Debug)]
pub struct SolverConfig {
    /// Maximum minor steps per major step before warning and proceeding
    /// with the latest solution.
    pub max_minor_steps: usize,
    /// Tolerance on the residual max-norm of `Ap - b`, scaled by the
    /// source-vector magnitude.
    pub tolerance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_minor_steps: 15,
            tolerance: 1e-8,
        }
    }
}

/// Outcome of one major-step solution.
#[derive(Clone, Copy, Debug)]
pub struct StepResult {
    /// Minor steps taken (at least 1).
    pub minor_steps: usize,
    /// False when the minor-step limit expired with links still rejecting,
    /// or when the linear solve failed and the last good potentials were
    /// kept.
    pub converged: bool,
}

/// Owns the global system and runs the assemble-solve-confirm loop.
pub struct NetworkSolver {
    config: SolverConfig,
    system: SolverSystem,
    primed: bool,
}

impl NetworkSolver {
    pub fn new(num_nodes: usize, config: SolverConfig) -> SolverResult<Self> {
        Ok(Self {
            config,
            system: SolverSystem::new(num_nodes)?,
            primed: false,
        })
    }

    pub fn system(&self) -> &SolverSystem {
        &self.system
    }

    /// Solve one major step: every link has already run `step`; iterate
    /// assemble-solve-confirm until all links confirm or the minor-step
    /// limit expires.
    ///
    /// Rejection resets the converged-step count; a rejecting link has
    /// changed its stamp, so the system is re-assembled and re-solved.
    /// Delaying links keep the loop alive without invalidating the stamp.
    /// Votes are polled in link registration order against the
    /// just-computed solution.
    pub fn solve<N: SolverNode>(
        &mut self,
        nodes: &mut [N],
        links: &mut [Box<dyn Link<N>>],
        dt: f64,
    ) -> StepResult {
        if !self.primed {
            self.system.prime(nodes);
            self.primed = true;
        }

        let mut converged_step = 0;
        let mut absolute_step = 1;
        let converged = loop {
            let admittance_changed = self.system.assemble(nodes, links);
            if admittance_changed && !self.system.factor() {
                warn!("admittance matrix is not positive definite; keeping last good potentials");
                self.system.restore_last_good();
                self.write_potentials(nodes);
                break false;
            }
            if !self.system.solve(self.config.tolerance) {
                self.system.restore_last_good();
                self.write_potentials(nodes);
                break false;
            }
            self.write_potentials(nodes);

            let mut any_reject = false;
            let mut any_delay = false;
            for link in links.iter_mut() {
                let vote =
                    link.confirm_solution_acceptable(nodes, converged_step, absolute_step);
                if vote != SolutionResult::Confirm && !link.is_non_linear() {
                    warn!(link = link.name(), "linear link voted non-confirm; ignored");
                    continue;
                }
                match vote {
                    SolutionResult::Confirm => {}
                    SolutionResult::Reject => any_reject = true,
                    SolutionResult::Delay => any_delay = true,
                }
            }

            if !any_reject && !any_delay {
                break true;
            }
            if any_reject {
                converged_step = 0;
            } else {
                converged_step += 1;
            }

            if absolute_step >= self.config.max_minor_steps {
                warn!(
                    minor_steps = absolute_step,
                    "minor-step limit reached without agreement; proceeding with latest solution"
                );
                break false;
            }

            absolute_step += 1;
            for link in links.iter_mut() {
                link.minor_step(nodes, dt, absolute_step);
            }
        };

        self.probe_network_capacitance(nodes, dt);

        StepResult {
            minor_steps: absolute_step,
            converged,
        }
    }

    fn write_potentials<N: SolverNode>(&self, nodes: &mut [N]) {
        let potentials = self.system.potentials();
        for (i, node) in nodes.iter_mut().take(self.system.order()).enumerate() {
            node.set_potential(potentials[i]);
        }
    }

    /// For every node with a pending request, pulse the solved system with
    /// the requested flux and report the effective capacitance: the quantity
    /// added over a step per unit of potential rise.
    fn probe_network_capacitance<N: SolverNode>(&self, nodes: &mut [N], dt: f64) {
        for i in 0..self.system.order() {
            let flux = nodes[i].network_capacitance_request();
            if flux <= 0.0 {
                continue;
            }
            let capacitance = match self.system.pulse_response(i, flux) {
                Some(rise) if rise > f64::EPSILON => flux * dt / rise,
                _ => 0.0,
            };
            nodes[i].set_network_capacitance(capacitance);
            nodes[i].set_network_capacitance_request(0.0);
        }
    }
}
