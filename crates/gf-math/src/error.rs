//! Error types for numerical routines.

use thiserror::Error;

pub type MathResult<T> = Result<T, MathError>;

#[derive(Error, Debug)]
pub enum MathError {
    #[error("Root not bracketed: {what}")]
    NotBracketed { what: &'static str },

    #[error("Convergence failed: {what} after {iterations} iterations")]
    ConvergenceFailed {
        what: &'static str,
        iterations: usize,
    },

    #[error("Invalid argument: {what}")]
    InvalidArg { what: &'static str },
}
