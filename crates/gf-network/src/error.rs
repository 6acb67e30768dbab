//! Error types for node and link operations.

use thiserror::Error;

pub type NetworkResult<T> = Result<T, NetworkError>;

#[derive(Error, Debug)]
pub enum NetworkError {
    /// Configuration or input violates a documented domain constraint.
    /// Fatal; the object is left uninitialized.
    #[error("Initialization invalid for {name}: {what} (value={value})")]
    InitInvalid {
        name: String,
        what: &'static str,
        value: f64,
    },

    /// A runtime argument is outside its legal range. Rethrown to the
    /// caller; never silently clamped.
    #[error("Bounds invalid for {name}: {what} (index={index}, len={len})")]
    BoundsInvalid {
        name: String,
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// A link port mapping violates a port rule.
    #[error("Port rule violated for {link}: port {port} cannot map to node {node}: {what}")]
    PortRule {
        link: String,
        port: usize,
        node: usize,
        what: &'static str,
    },
}
