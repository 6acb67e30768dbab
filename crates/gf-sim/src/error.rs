//! Error types for network construction and stepping.

use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    #[error("Config error: {what}")]
    Config { what: String },

    #[error(transparent)]
    Network(#[from] gf_network::NetworkError),

    #[error(transparent)]
    Solver(#[from] gf_solver::SolverError),

    #[error("Fluid error: {0}")]
    Fluid(#[from] gf_fluids::FluidError),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}
