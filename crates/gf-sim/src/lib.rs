//! gf-sim: the network front door.
//!
//! A [`Network`] owns its nodes and links and exposes the single `step(dt)`
//! entry point an external simulation executive drives. The `config` module
//! loads a network from a YAML definition; `telemetry` records per-step
//! potentials for later inspection.

pub mod config;
pub mod error;
pub mod network;
pub mod telemetry;

pub use config::{BuiltNetwork, NetworkDef};
pub use error::{SimError, SimResult};
pub use network::{Network, StepSummary};
pub use telemetry::{Recorder, StepRecord};
