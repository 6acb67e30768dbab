//! gf-network: nodes, links, and the contract between them.
//!
//! A network is a list of nodes (the last one being the fixed-potential
//! Ground node) and an ordered list of links. Links stamp local admittance
//! and source contributions through [`LinkStamp`]; nodes accumulate the
//! transported flows and integrate them each major step. The solver crate
//! drives both sides through the [`SolverNode`] and [`Link`] traits defined
//! here.

pub mod error;
pub mod fluid_node;
pub mod link;
pub mod node;

pub use error::{NetworkError, NetworkResult};
pub use fluid_node::FluidNode;
pub use link::{
    Link, LinkStamp, PortDirection, SolutionResult, check_port_remap, validate_link,
};
pub use node::{BasicNode, SolverNode};
