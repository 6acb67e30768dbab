//! Error types for the solution engine.

use thiserror::Error;

pub type SolverResult<T> = Result<T, SolverError>;

#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },

    /// The flow transport loop could not make progress even with forced
    /// early transports. Indicates a framework bug, not a model problem.
    #[error("Flow transport stalled: {what}")]
    TransportStalled { what: &'static str },
}
