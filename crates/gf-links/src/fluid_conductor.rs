//! Fluid conductor: a flow restriction linearized into molar admittance.

use crate::common::{check_config_value, clamp_blockage, source_sink_ports, two_port_directions};
use gf_core::numeric::limit_range;
use gf_core::units::constants::PA_PER_KPA;
use gf_fluids::transfer::{compute_admittance, compute_isentropic_temperature};
use gf_fluids::Phase;
use gf_network::{FluidNode, Link, LinkStamp, NetworkError, NetworkResult, PortDirection, SolverNode};

/// A two-port restriction with effective conductivity (m2) whose mass flow
/// follows the momentum equation `mdot = G * (rho * dP)^x`.
///
/// The conductivity is linearized into a molar admittance about the current
/// operating point each step, with the delta-pressure floored at
/// `min_linearization_potential` to keep the admittance from collapsing at
/// flow onset.
pub struct FluidConductor {
    name: String,
    node_map: Vec<usize>,
    stamp: LinkStamp,
    directions: [PortDirection; 2],
    max_conductivity: f64,
    effective_conductivity: f64,
    flow_exponent: f64,
    min_linearization_potential: f64,
    expansion_scale_factor: f64,
    gas_only: bool,
    blockage: f64,
    admittance: f64,
    potential_drop: f64,
    flux: f64,
    flow_rate: f64,
    power: f64,
}

impl FluidConductor {
    pub fn new(
        name: impl Into<String>,
        node0: usize,
        node1: usize,
        max_conductivity: f64,
    ) -> NetworkResult<Self> {
        let name = name.into();
        let max_conductivity =
            check_config_value(&name, "conductivity must be >= 0", max_conductivity)?;
        Ok(Self {
            name,
            node_map: vec![node0, node1],
            stamp: LinkStamp::new(2),
            directions: [PortDirection::None; 2],
            max_conductivity,
            effective_conductivity: max_conductivity,
            flow_exponent: 0.5,
            min_linearization_potential: 1e-2,
            expansion_scale_factor: 0.0,
            gas_only: false,
            blockage: 0.0,
            admittance: 0.0,
            potential_drop: 0.0,
            flux: 0.0,
            flow_rate: 0.0,
            power: 0.0,
        })
    }

    /// Exponent on the `(rho * dP)` term; clamped into [1/2, 1] at use.
    /// 1/2 is the momentum-equation value, 1 models laminar flow.
    pub fn with_flow_exponent(mut self, exponent: f64) -> NetworkResult<Self> {
        if !(0.5..=1.0).contains(&exponent) {
            return Err(NetworkError::InitInvalid {
                name: self.name.clone(),
                what: "flow exponent must be in [0.5, 1.0]",
                value: exponent,
            });
        }
        self.flow_exponent = exponent;
        Ok(self)
    }

    /// Minimum delta-potential (kPa) used in the linearization.
    pub fn with_min_linearization_potential(mut self, potential: f64) -> NetworkResult<Self> {
        let potential = check_config_value(
            &self.name,
            "minimum linearization potential must be >= 0",
            potential,
        )?;
        self.min_linearization_potential = potential;
        Ok(self)
    }

    /// Isentropic cooling scale factor in [0, 1] applied to the stream in
    /// transit.
    pub fn with_expansion_scale_factor(mut self, factor: f64) -> NetworkResult<Self> {
        if !(0.0..=1.0).contains(&factor) {
            return Err(NetworkError::InitInvalid {
                name: self.name.clone(),
                what: "expansion scale factor must be in [0, 1]",
                value: factor,
            });
        }
        self.expansion_scale_factor = factor;
        Ok(self)
    }

    /// Restrict this link to gas-phase nodes.
    pub fn gas_only(mut self) -> Self {
        self.gas_only = true;
        self
    }

    pub fn set_blockage(&mut self, blockage: f64) {
        self.blockage = clamp_blockage(blockage);
    }

    /// Molar flux (kgmol/s), positive from port 0 to port 1.
    pub fn flux(&self) -> f64 {
        self.flux
    }

    /// Mass flow rate (kg/s), positive from port 0 to port 1.
    pub fn flow_rate(&self) -> f64 {
        self.flow_rate
    }

    /// Hydraulic power (W) delivered to the stream (negative across a
    /// passive restriction).
    pub fn power(&self) -> f64 {
        self.power
    }

    pub fn admittance(&self) -> f64 {
        self.admittance
    }
}

impl Link<FluidNode> for FluidConductor {
    fn name(&self) -> &str {
        &self.name
    }

    fn node_map(&self) -> &[usize] {
        &self.node_map
    }

    fn remap_port(&mut self, port: usize, node: usize) {
        self.node_map[port] = node;
    }

    fn stamp(&self) -> &LinkStamp {
        &self.stamp
    }

    fn stamp_mut(&mut self) -> &mut LinkStamp {
        &mut self.stamp
    }

    fn port_directions(&self) -> &[PortDirection] {
        &self.directions
    }

    fn check_port_rules(
        &self,
        _port: usize,
        node: usize,
        ground: usize,
        nodes: &[FluidNode],
    ) -> bool {
        // Gas-only links may not attach to liquid-phase nodes. Ground is
        // exempt: it carries whatever phase the network drains into it.
        if self.gas_only && node != ground {
            return nodes[node].content().phase() == Phase::Gas;
        }
        true
    }

    fn step(&mut self, nodes: &mut [FluidNode], _dt: f64) {
        self.effective_conductivity = self.max_conductivity * (1.0 - self.blockage);
        let fluid0 = nodes[self.node_map[0]].content();
        let fluid1 = nodes[self.node_map[1]].content();
        self.admittance = compute_admittance(
            self.effective_conductivity,
            self.min_linearization_potential,
            fluid0,
            fluid1,
            limit_range(0.5, self.flow_exponent, 1.0),
        );
        let a = self.admittance;
        self.stamp.stamp_conductance(a);
    }

    fn compute_flows(&mut self, nodes: &mut [FluidNode], _dt: f64) {
        let p0 = nodes[self.node_map[0]].potential();
        let p1 = nodes[self.node_map[1]].potential();
        self.potential_drop = p0 - p1;
        self.flux = self.potential_drop * self.admittance;
        self.directions = two_port_directions(self.flux);

        if let Some((source, _)) = source_sink_ports(self.flux) {
            let source_node = &nodes[self.node_map[source]];
            let mw = source_node.outflow().molar_mass();
            self.flow_rate = self.flux.abs() * mw * self.flux.signum();

            let density = source_node.outflow().density();
            let volumetric = if density > f64::EPSILON {
                self.flow_rate.abs() / density
            } else {
                0.0
            };
            self.power = -PA_PER_KPA * self.potential_drop.abs() * volumetric;

            nodes[self.node_map[source]].schedule_outflux(self.flux.abs());
        } else {
            self.flow_rate = 0.0;
            self.power = 0.0;
        }
    }

    fn transport_flows(&mut self, nodes: &mut [FluidNode], _dt: f64) {
        let Some((source, sink)) = source_sink_ports(self.flux) else {
            return;
        };
        let source_index = self.node_map[source];
        let sink_index = self.node_map[sink];
        let magnitude = self.flow_rate.abs();

        // The stream leaves at the source's outflow shadow, cooled by
        // isentropic expansion on the way down the pressure gradient.
        let mut stream = nodes[source_index].outflow().clone();
        if self.expansion_scale_factor > 0.0 {
            let t_out = compute_isentropic_temperature(
                self.expansion_scale_factor,
                nodes[source_index].potential(),
                nodes[sink_index].potential(),
                &stream,
            );
            stream.set_temperature(t_out);
        }

        nodes[source_index].collect_outflux(magnitude);
        nodes[sink_index].collect_influx(magnitude, &stream);
    }
}
