//! gf-links: the link library exercised by the network core.
//!
//! Electrical links operate on [`gf_network::BasicNode`], fluid links on
//! [`gf_network::FluidNode`]. Each link realizes the contract in
//! `gf_network::link`: stamp admittance and source contributions, vote on
//! candidate solutions (nonlinear links only), and transport solved flows.

pub mod capacitor;
pub mod common;
pub mod conductor;
pub mod fluid_capacitor;
pub mod fluid_conductor;
pub mod fluid_potential;
pub mod gas_fan;
pub mod potential;
pub mod power_bus;

pub use capacitor::Capacitor;
pub use conductor::Conductor;
pub use fluid_capacitor::FluidCapacitor;
pub use fluid_conductor::FluidConductor;
pub use fluid_potential::FluidPotentialSource;
pub use gas_fan::{FanCurve, GasFan, GasFanConfig};
pub use potential::PotentialSource;
pub use power_bus::{PowerBus, PowerBusConfig};
