//! gf-solver: the network solution engine.
//!
//! Each major step the solver assembles the global admittance matrix and
//! source vector from every link's stamp, factors and solves the symmetric
//! system for node potentials, and polls nonlinear links until they all
//! confirm (the minor-step loop). The flow orchestrator then moves the
//! solved flows between links and nodes in an order that respects causality
//! under overflow.

pub mod error;
pub mod orchestrator;
pub mod solver;
pub mod system;

pub use error::{SolverError, SolverResult};
pub use orchestrator::FlowOrchestrator;
pub use solver::{NetworkSolver, SolverConfig, StepResult};
pub use system::SolverSystem;
