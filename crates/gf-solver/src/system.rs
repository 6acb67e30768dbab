//! The global admittance system: assembly, factorization, and solution.

use crate::error::{SolverError, SolverResult};
use gf_network::{Link, SolverNode};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use tracing::warn;

/// The assembled `[A]{p} = {b}` system of order N-1, the Ground node's row
/// and column being excluded.
///
/// The factorization is cached between minor steps: as long as no link
/// raised its `admittance_update` flag, only the source vector is rebuilt
/// and the cached decomposition is reused for back-substitution.
pub struct SolverSystem {
    num_nodes: usize,
    a: DMatrix<f64>,
    b: DVector<f64>,
    potentials: DVector<f64>,
    last_good: DVector<f64>,
    factorization: Option<Cholesky<f64, Dyn>>,
    decompositions: usize,
}

impl SolverSystem {
    /// Create a system for `num_nodes` nodes including the Ground node.
    pub fn new(num_nodes: usize) -> SolverResult<Self> {
        if num_nodes < 2 {
            return Err(SolverError::InvalidArg {
                what: "a network needs at least one non-Ground node",
            });
        }
        let order = num_nodes - 1;
        Ok(Self {
            num_nodes,
            a: DMatrix::zeros(order, order),
            b: DVector::zeros(order),
            potentials: DVector::zeros(order),
            last_good: DVector::zeros(order),
            factorization: None,
            decompositions: 0,
        })
    }

    /// System order (number of solved potentials).
    pub fn order(&self) -> usize {
        self.num_nodes - 1
    }

    /// Total factorizations performed since construction.
    pub fn decompositions(&self) -> usize {
        self.decompositions
    }

    /// Assembled matrix (for residual checks and diagnostics).
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.a
    }

    /// Assembled source vector.
    pub fn source(&self) -> &DVector<f64> {
        &self.b
    }

    /// Last solved potential vector.
    pub fn potentials(&self) -> &DVector<f64> {
        &self.potentials
    }

    /// Build `[A]` and `{b}` from the link stamps and node corrections.
    ///
    /// A stamp entry touching the Ground node contributes nothing: a link
    /// referencing Ground only appears through its other ports' diagonal
    /// terms. Per-node potential corrections enter the source vector scaled
    /// by the node's diagonal admittance, converting a potential-units
    /// feedback into flux units.
    ///
    /// Returns true when any link reported an admittance change, in which
    /// case the caller must re-factor before solving. The links' flags are
    /// cleared here.
    pub fn assemble<N: SolverNode>(
        &mut self,
        nodes: &[N],
        links: &mut [Box<dyn Link<N>>],
    ) -> bool {
        let ground = self.num_nodes - 1;
        self.a.fill(0.0);
        self.b.fill(0.0);

        let mut admittance_changed = self.factorization.is_none();
        for link in links.iter_mut() {
            let map = link.node_map().to_vec();
            let num_ports = map.len();
            let stamp = link.stamp();
            let admittance = stamp.admittance();
            let source = stamp.source();

            for (i, &node_i) in map.iter().enumerate() {
                if node_i == ground {
                    continue;
                }
                self.b[node_i] += source[i];
                for (j, &node_j) in map.iter().enumerate() {
                    if node_j == ground {
                        continue;
                    }
                    self.a[(node_i, node_j)] += admittance[i * num_ports + j];
                }
            }

            if link.stamp().admittance_update() {
                admittance_changed = true;
                link.stamp_mut().clear_admittance_update();
            }
        }

        for (i, node) in nodes.iter().take(ground).enumerate() {
            let correction = node.potential_correction();
            if correction != 0.0 {
                self.b[i] += correction * self.a[(i, i)];
            }
        }

        admittance_changed
    }

    /// Factor the assembled matrix. Returns false when the matrix is not
    /// positive definite; the caller is expected to fall back to the last
    /// good potentials.
    pub fn factor(&mut self) -> bool {
        match Cholesky::new(self.a.clone()) {
            Some(decomposition) => {
                self.factorization = Some(decomposition);
                self.decompositions += 1;
                true
            }
            None => {
                self.factorization = None;
                false
            }
        }
    }

    /// Back-substitute for the potential vector using the cached
    /// factorization, verifying the max-norm of `Ap - b` against
    /// `tolerance` scaled by the source-vector magnitude (stiff boundary
    /// links push `b` to 1e8 and beyond; an unscaled threshold would reject
    /// solutions that are good to machine precision). On success the result
    /// becomes the new last-good vector.
    pub fn solve(&mut self, tolerance: f64) -> bool {
        let Some(factorization) = &self.factorization else {
            return false;
        };
        let candidate = factorization.solve(&self.b);
        if candidate.iter().any(|p| !p.is_finite()) {
            warn!("solver produced a non-finite potential; keeping last good solution");
            return false;
        }

        let residual = (&self.a * &candidate - &self.b).amax();
        let threshold = tolerance * self.b.amax().max(1.0);
        if residual > threshold {
            warn!(residual, threshold, "solver residual exceeds tolerance");
            return false;
        }

        self.potentials.copy_from(&candidate);
        self.last_good.copy_from(&candidate);
        true
    }

    /// Restore the last good potential vector after a failed factorization
    /// or solve.
    pub fn restore_last_good(&mut self) {
        self.potentials.copy_from(&self.last_good);
    }

    /// Seed the last-good vector (and current potentials) from the nodes'
    /// initial potentials so a first-step failure has something to fall
    /// back on.
    pub fn prime<N: SolverNode>(&mut self, nodes: &[N]) {
        for i in 0..self.order() {
            self.potentials[i] = nodes[i].potential();
            self.last_good[i] = nodes[i].potential();
        }
    }

    /// Solve `A x = flux * e_node` with the cached factorization: the
    /// potential response to a unit flux pulse, used by the
    /// network-capacitance probe. Returns the potential rise at `node`.
    pub fn pulse_response(&self, node: usize, flux: f64) -> Option<f64> {
        let factorization = self.factorization.as_ref()?;
        let mut rhs = DVector::zeros(self.order());
        rhs[node] = flux;
        let response = factorization.solve(&rhs);
        Some(response[node])
    }
}
