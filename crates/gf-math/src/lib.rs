//! gf-math: numerical utilities shared by the network solver and link models.
//!
//! Contains:
//! - brent (bracketing scalar root finder)
//! - laguerre (complex polynomial root improvement)
//! - poly (real polynomial evaluation + root localization)
//! - quat (scalar-first quaternion / rotation-matrix conversions)

pub mod brent;
pub mod error;
pub mod laguerre;
pub mod poly;
pub mod quat;

pub use brent::brent_solve;
pub use error::{MathError, MathResult};
pub use laguerre::laguerre_improve;
pub use poly::Polynomial;
