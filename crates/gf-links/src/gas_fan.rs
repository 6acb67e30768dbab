//! Gas fan: a pressure source following a polynomial fan curve.

use crate::common::check_config_value;
use crate::fluid_potential::FluidPotentialSource;
use gf_core::numeric::limit_range;
use gf_fluids::transfer::compute_admittance;
use gf_math::{MathResult, Polynomial};
use gf_network::{FluidNode, Link, LinkStamp, NetworkError, NetworkResult, PortDirection};
use tracing::warn;

/// A 5th-order fan performance curve: delta-pressure (kPa) as a polynomial
/// in volumetric flow (m3/s) at reference speed and density.
#[derive(Debug, Clone)]
pub struct FanCurve {
    poly: Polynomial,
}

impl FanCurve {
    pub fn new(coeffs: [f64; 6]) -> MathResult<Self> {
        Ok(Self {
            poly: Polynomial::new(coeffs.to_vec())?,
        })
    }

    /// Delta-pressure (kPa) at volumetric flow `q` (m3/s).
    pub fn evaluate(&self, q: f64) -> f64 {
        self.poly.evaluate(q)
    }

    /// Improve a flow-axis root estimate in `[0, upper]`: Laguerre's method
    /// from the guess, falling back to Brent's bracketing when Laguerre
    /// lands on a complex or out-of-range root.
    pub fn improve_root(&self, guess: f64, upper: f64) -> MathResult<(f64, usize)> {
        self.poly.improve_root(guess, upper)
    }

    pub fn coeffs(&self) -> &[f64] {
        self.poly.coeffs()
    }
}

/// Gas fan configuration.
#[derive(Clone, Copy, Debug)]
pub struct GasFanConfig {
    /// Fan curve coefficients at reference speed and density (kPa vs m3/s).
    pub reference_coeffs: [f64; 6],
    /// Reference fluid density (kg/m3) the curve was measured at.
    pub reference_density: f64,
    /// Reference shaft speed (rev/min or any consistent unit).
    pub reference_speed: f64,
    /// Volumetric flow (m3/s) where the reference curve crosses zero
    /// pressure; bounds the operating-point search.
    pub reference_flow: f64,
    /// First-order filter gain in [0, 1] on the system-curve constant. The
    /// tuning is empirical; there is no stability proof for this filter, so
    /// treat large gains with suspicion.
    pub filter_gain: f64,
    /// Effective conductivity (m2) for the admittance linearization.
    pub max_conductivity: f64,
}

/// A fan driving flow from port 1 (inlet) to port 0 (outlet).
///
/// Each step the reference curve is affinity-scaled to the current speed and
/// inlet density, intersected with a filtered system curve
/// `dp = (q / G_sys)^2` to find the operating flow, and the resulting
/// source pressure is stamped through the potential-source pattern. The
/// operating-point root comes from Laguerre's method seeded with last
/// step's flow, with Brent's method as the bracketing fallback.
pub struct GasFan {
    inner: FluidPotentialSource,
    config: GasFanConfig,
    curve: FanCurve,
    speed: f64,
    source_q: f64,
    source_pressure: f64,
    system_constant: f64,
}

impl GasFan {
    pub fn new(
        name: impl Into<String>,
        inlet: usize,
        outlet: usize,
        config: GasFanConfig,
    ) -> NetworkResult<Self> {
        let name = name.into();
        check_config_value(&name, "reference density must be >= 0", config.reference_density)?;
        check_config_value(&name, "reference speed must be >= 0", config.reference_speed)?;
        check_config_value(&name, "reference flow must be >= 0", config.reference_flow)?;
        if !(0.0..=1.0).contains(&config.filter_gain) {
            return Err(NetworkError::InitInvalid {
                name,
                what: "filter gain must be in [0, 1]",
                value: config.filter_gain,
            });
        }
        let curve = FanCurve::new(config.reference_coeffs).map_err(|_| {
            NetworkError::InitInvalid {
                name: name.clone(),
                what: "fan curve coefficients are not a valid polynomial",
                value: f64::NAN,
            }
        })?;

        let inner =
            FluidPotentialSource::new(name, outlet, inlet, 0.0, config.max_conductivity)?;
        let system_constant =
            config.reference_flow / config.reference_coeffs[0].max(f64::EPSILON).sqrt();
        Ok(Self {
            inner,
            config,
            curve,
            speed: config.reference_speed,
            source_q: 0.0,
            source_pressure: 0.0,
            system_constant,
        })
    }

    /// Commanded shaft speed, same unit as the reference speed.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed.max(0.0);
    }

    /// Produced delta-pressure (kPa) from the last step.
    pub fn source_pressure(&self) -> f64 {
        self.source_pressure
    }

    /// Operating volumetric flow (m3/s) from the last step.
    pub fn source_flow(&self) -> f64 {
        self.source_q
    }

    pub fn flow_rate(&self) -> f64 {
        self.inner.flow_rate()
    }

    fn compute_source_pressure(&mut self, nodes: &[FluidNode]) {
        let inlet = self.inner.node_map()[1];
        let density = nodes[inlet].content().density();
        if self.speed <= f64::EPSILON
            || density <= f64::EPSILON
            || self.config.reference_speed <= f64::EPSILON
        {
            self.source_pressure = 0.0;
            return;
        }

        // Affinity scaling of the reference curve to current speed and
        // density: pressure scales with density and speed squared, flow
        // scales with speed, so coefficient i picks up speed^(2-i).
        let density_factor = density / self.config.reference_density.max(f64::EPSILON);
        let speed_factor = self.speed / self.config.reference_speed;
        let mut affinity = [0.0; 6];
        for (order, coeff) in affinity.iter_mut().enumerate() {
            *coeff = self.config.reference_coeffs[order]
                * density_factor
                * speed_factor.powi(2 - order as i32);
        }

        // Filtered system-curve constant from last pass's operating point,
        // assuming the downstream network follows Q = Gsys * sqrt(dp). The
        // flow floor and the dead-head pressure clamp keep the estimate from
        // locking up at the zero-flow and free-flow extremes.
        let g_sys = self
            .source_q
            .max(self.config.reference_flow * speed_factor * 1.0e-4)
            / limit_range(f64::EPSILON, self.source_pressure, affinity[0]).sqrt();
        self.system_constant = self.config.filter_gain * g_sys
            + (1.0 - self.config.filter_gain) * self.system_constant;

        // Intersect the scaled fan curve with dp = (q/G_sys)^2 and evaluate
        // the produced pressure at the operating flow.
        let mut intersection = affinity;
        if self.system_constant > f64::EPSILON {
            intersection[2] -= 1.0 / (self.system_constant * self.system_constant);
        }
        let upper = (self.config.reference_flow * speed_factor).max(f64::EPSILON);
        let poly = match Polynomial::new(intersection.to_vec()) {
            Ok(poly) => poly,
            Err(_) => {
                self.source_pressure = 0.0;
                return;
            }
        };
        match poly.improve_root(self.source_q, upper) {
            Ok((root, _)) => self.source_q = root,
            Err(error) => {
                warn!(
                    link = self.inner.name(),
                    %error,
                    "fan operating point not found; holding previous flow"
                );
            }
        }

        self.source_pressure = match FanCurve::new(affinity) {
            Ok(affinity_curve) => affinity_curve.evaluate(self.source_q).max(0.0),
            Err(_) => 0.0,
        };
    }
}

impl Link<FluidNode> for GasFan {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn node_map(&self) -> &[usize] {
        self.inner.node_map()
    }

    fn remap_port(&mut self, port: usize, node: usize) {
        self.inner.remap_port(port, node);
    }

    fn stamp(&self) -> &LinkStamp {
        self.inner.stamp()
    }

    fn stamp_mut(&mut self) -> &mut LinkStamp {
        self.inner.stamp_mut()
    }

    fn port_directions(&self) -> &[PortDirection] {
        self.inner.port_directions()
    }

    fn check_port_rules(
        &self,
        port: usize,
        node: usize,
        ground: usize,
        nodes: &[FluidNode],
    ) -> bool {
        self.inner.check_port_rules(port, node, ground, nodes)
    }

    fn step(&mut self, nodes: &mut [FluidNode], _dt: f64) {
        self.compute_source_pressure(nodes);
        let outlet = self.inner.node_map()[0];
        let inlet = self.inner.node_map()[1];
        let admittance = compute_admittance(
            self.config.max_conductivity,
            1e-2,
            nodes[inlet].content(),
            nodes[outlet].content(),
            0.5,
        );
        let source_pressure = self.source_pressure;
        self.inner.stamp_with_source(admittance, source_pressure);
    }

    fn minor_step(&mut self, _nodes: &mut [FluidNode], _dt: f64, _minor: usize) {
        // Node contents do not move during minor steps, so the admittance
        // and fan pressure are already current; re-running `step` would
        // advance the system-curve filter mid-iteration.
    }

    fn compute_flows(&mut self, nodes: &mut [FluidNode], _dt: f64) {
        let source_pressure = self.source_pressure;
        self.inner.compute_two_port_flows(nodes, source_pressure);

        // Track the operating volumetric flow for next step's system curve.
        let inlet = self.inner.node_map()[1];
        let density = nodes[inlet].content().density();
        if density > f64::EPSILON {
            self.source_q = self.inner.flow_rate().abs() / density;
        }
    }

    fn transport_flows(&mut self, nodes: &mut [FluidNode], _dt: f64) {
        self.inner.transport_two_port(nodes);
    }
}
