//! YAML network definitions.
//!
//! A definition file names its nodes; links reference nodes by name. The
//! loader appends the Ground node automatically, reachable from link
//! definitions under the reserved name `ground`.

use crate::error::{SimError, SimResult};
use crate::network::Network;
use gf_core::units::{k, kpa};
use gf_fluids::{Composition, FluidConfig, FluidState, Species, TraceCompound};
use gf_links::{
    Capacitor, Conductor, FluidCapacitor, FluidConductor, FluidPotentialSource, GasFan,
    GasFanConfig, PotentialSource, PowerBus, PowerBusConfig,
};
use gf_network::{BasicNode, FluidNode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Reserved node name resolving to the Ground node.
pub const GROUND_NAME: &str = "ground";

/// Top-level network definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkDef {
    pub version: u32,
    pub name: String,
    pub kind: NetworkKind,
    /// Required for fluid networks; ignored for electrical ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluid: Option<FluidDef>,
    pub nodes: Vec<NodeDef>,
    #[serde(default)]
    pub links: Vec<LinkDef>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NetworkKind {
    Electrical,
    Fluid,
}

/// Defined species and trace compounds of a fluid network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FluidDef {
    pub species: Vec<Species>,
    #[serde(default)]
    pub trace_compounds: Vec<TraceCompound>,
}

/// One node. Electrical nodes use `potential` (V); fluid nodes use
/// `potential` as pressure (kPa) plus `temperature` (K) and
/// `mass_fractions` in species order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeDef {
    pub name: String,
    #[serde(default)]
    pub potential: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mass_fractions: Option<Vec<f64>>,
}

/// One link, tagged by type. Node references are by name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LinkDef {
    Conductor {
        name: String,
        node0: String,
        node1: String,
        conductance: f64,
    },
    Capacitor {
        name: String,
        node: String,
        capacitance: f64,
    },
    PotentialSource {
        name: String,
        node: String,
        potential: f64,
        conductance: f64,
    },
    PowerBus {
        name: String,
        inputs: Vec<String>,
        under_voltage_limit: f64,
        backup_voltage_threshold: f64,
        load_power: f64,
    },
    FluidConductor {
        name: String,
        node0: String,
        node1: String,
        conductivity: f64,
        #[serde(default)]
        expansion_scale_factor: f64,
    },
    FluidCapacitor {
        name: String,
        node: String,
        volume: f64,
    },
    FluidPotentialSource {
        name: String,
        node: String,
        pressure: f64,
        conductivity: f64,
    },
    GasFan {
        name: String,
        inlet: String,
        outlet: String,
        coeffs: [f64; 6],
        reference_density: f64,
        reference_speed: f64,
        reference_flow: f64,
        #[serde(default = "default_filter_gain")]
        filter_gain: f64,
        conductivity: f64,
    },
}

fn default_filter_gain() -> f64 {
    0.5
}

/// A network built from a definition, typed by aspect.
pub enum BuiltNetwork {
    Electrical(Network<BasicNode>),
    Fluid(Network<FluidNode>),
}

impl NetworkDef {
    /// Parse a definition from YAML text.
    pub fn from_yaml(text: &str) -> SimResult<Self> {
        let def: NetworkDef = serde_yaml::from_str(text)?;
        def.validate()?;
        Ok(def)
    }

    pub fn to_yaml(&self) -> SimResult<String> {
        serde_yaml::to_string(self).map_err(SimError::from)
    }

    /// Structural validation independent of the aspect.
    pub fn validate(&self) -> SimResult<()> {
        if self.version != 1 {
            return Err(SimError::Config {
                what: format!("unsupported definition version {}", self.version),
            });
        }
        if self.nodes.is_empty() {
            return Err(SimError::Config {
                what: "a network needs at least one node".into(),
            });
        }
        let mut seen = HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if node.name == GROUND_NAME {
                return Err(SimError::Config {
                    what: format!("node {i} uses the reserved name \"{GROUND_NAME}\""),
                });
            }
            if seen.insert(node.name.clone(), i).is_some() {
                return Err(SimError::Config {
                    what: format!("duplicate node name \"{}\"", node.name),
                });
            }
        }
        if self.kind == NetworkKind::Fluid && self.fluid.is_none() {
            return Err(SimError::Config {
                what: "fluid networks must define their species".into(),
            });
        }
        Ok(())
    }

    fn node_index(&self, name: &str) -> SimResult<usize> {
        if name == GROUND_NAME {
            return Ok(self.nodes.len());
        }
        self.nodes
            .iter()
            .position(|n| n.name == name)
            .ok_or_else(|| SimError::Config {
                what: format!("unknown node \"{name}\""),
            })
    }

    /// Build the runnable network.
    pub fn build(&self) -> SimResult<BuiltNetwork> {
        self.validate()?;
        match self.kind {
            NetworkKind::Electrical => self.build_electrical().map(BuiltNetwork::Electrical),
            NetworkKind::Fluid => self.build_fluid().map(BuiltNetwork::Fluid),
        }
    }

    fn build_electrical(&self) -> SimResult<Network<BasicNode>> {
        let mut nodes: Vec<BasicNode> = self
            .nodes
            .iter()
            .map(|def| BasicNode::new(def.name.clone(), def.potential))
            .collect();
        nodes.push(BasicNode::new(GROUND_NAME, 0.0));

        let mut network = Network::new(self.name.clone(), nodes)?;
        for link in &self.links {
            let boxed: Box<dyn gf_network::Link<BasicNode>> = match link {
                LinkDef::Conductor {
                    name,
                    node0,
                    node1,
                    conductance,
                } => Box::new(Conductor::new(
                    name.clone(),
                    self.node_index(node0)?,
                    self.node_index(node1)?,
                    *conductance,
                )?),
                LinkDef::Capacitor {
                    name,
                    node,
                    capacitance,
                } => Box::new(Capacitor::new(
                    name.clone(),
                    self.node_index(node)?,
                    self.nodes.len(),
                    *capacitance,
                )?),
                LinkDef::PotentialSource {
                    name,
                    node,
                    potential,
                    conductance,
                } => Box::new(PotentialSource::new(
                    name.clone(),
                    self.node_index(node)?,
                    self.nodes.len(),
                    *potential,
                    *conductance,
                )?),
                LinkDef::PowerBus {
                    name,
                    inputs,
                    under_voltage_limit,
                    backup_voltage_threshold,
                    load_power,
                } => {
                    let ports = inputs
                        .iter()
                        .map(|n| self.node_index(n))
                        .collect::<SimResult<Vec<_>>>()?;
                    let config = PowerBusConfig {
                        under_voltage_limit: *under_voltage_limit,
                        backup_voltage_threshold: *backup_voltage_threshold,
                        load_power: *load_power,
                        ..PowerBusConfig::default()
                    };
                    Box::new(PowerBus::new(name.clone(), ports, config)?)
                }
                other => {
                    return Err(SimError::Config {
                        what: format!("{other:?} is not an electrical link"),
                    });
                }
            };
            network.add_link(boxed)?;
        }
        Ok(network)
    }

    fn build_fluid(&self) -> SimResult<Network<FluidNode>> {
        let Some(fluid_def) = self.fluid.as_ref() else {
            return Err(SimError::Config {
                what: "fluid networks must define their species".into(),
            });
        };
        let config: Arc<FluidConfig> = FluidConfig::with_trace_compounds(
            fluid_def.species.clone(),
            fluid_def.trace_compounds.clone(),
        )?;

        let mut nodes = Vec::with_capacity(self.nodes.len() + 1);
        for def in &self.nodes {
            let fractions = def.mass_fractions.clone().ok_or_else(|| SimError::Config {
                what: format!("fluid node \"{}\" needs mass_fractions", def.name),
            })?;
            let composition = Composition::new(config.clone(), &fractions)?;
            let temperature = def.temperature.unwrap_or(294.261);
            let state = FluidState::new(composition, kpa(def.potential), k(temperature))?;
            nodes.push(FluidNode::new(def.name.clone(), state));
        }
        // Ground holds a token state at negligible pressure.
        let ground_state = FluidState::new(
            Composition::pure(config.clone(), 0)?,
            kpa(1e-6),
            k(294.261),
        )?;
        nodes.push(FluidNode::new(GROUND_NAME, ground_state));

        let mut network = Network::new(self.name.clone(), nodes)?;
        for link in &self.links {
            let boxed: Box<dyn gf_network::Link<FluidNode>> = match link {
                LinkDef::FluidConductor {
                    name,
                    node0,
                    node1,
                    conductivity,
                    expansion_scale_factor,
                } => Box::new(
                    FluidConductor::new(
                        name.clone(),
                        self.node_index(node0)?,
                        self.node_index(node1)?,
                        *conductivity,
                    )?
                    .with_expansion_scale_factor(*expansion_scale_factor)?,
                ),
                LinkDef::FluidCapacitor { name, node, volume } => Box::new(FluidCapacitor::new(
                    name.clone(),
                    self.node_index(node)?,
                    self.nodes.len(),
                    *volume,
                )?),
                LinkDef::FluidPotentialSource {
                    name,
                    node,
                    pressure,
                    conductivity,
                } => Box::new(FluidPotentialSource::new(
                    name.clone(),
                    self.node_index(node)?,
                    self.nodes.len(),
                    *pressure,
                    *conductivity,
                )?),
                LinkDef::GasFan {
                    name,
                    inlet,
                    outlet,
                    coeffs,
                    reference_density,
                    reference_speed,
                    reference_flow,
                    filter_gain,
                    conductivity,
                } => Box::new(GasFan::new(
                    name.clone(),
                    self.node_index(inlet)?,
                    self.node_index(outlet)?,
                    GasFanConfig {
                        reference_coeffs: *coeffs,
                        reference_density: *reference_density,
                        reference_speed: *reference_speed,
                        reference_flow: *reference_flow,
                        filter_gain: *filter_gain,
                        max_conductivity: *conductivity,
                    },
                )?),
                other => {
                    return Err(SimError::Config {
                        what: format!("{other:?} is not a fluid link"),
                    });
                }
            };
            network.add_link(boxed)?;
        }
        Ok(network)
    }
}
