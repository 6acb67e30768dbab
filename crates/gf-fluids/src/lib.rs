//! gf-fluids: fluid mixtures and property relations for the network core.
//!
//! A network shares one immutable [`FluidConfig`] (the defined species and
//! trace compounds). Node contents, inflow shadows, and link scratch fluids
//! are [`FluidState`] values aligned to that configuration. The `transfer`
//! module carries the linearizations that turn fluid properties into network
//! admittance terms.

pub mod composition;
pub mod error;
pub mod species;
pub mod state;
pub mod transfer;

pub use composition::{Composition, FluidConfig, TraceCompound};
pub use error::{FluidError, FluidResult};
pub use species::{Phase, Species};
pub use state::FluidState;
pub use transfer::{
    compute_admittance, compute_capacitance, compute_isentropic_temperature,
    predict_conductivity,
};
