//! Fluid-aspect node: stored mixture, flow accumulators, and integration.

use crate::error::{NetworkError, NetworkResult};
use crate::node::SolverNode;
use gf_fluids::transfer::{compute_capacitance, compute_isentropic_temperature};
use gf_fluids::FluidState;
use tracing::warn;

/// Suppress pressure corrections smaller than this fraction of the node
/// potential; below it the correction is chatter, not signal.
const CORRECTION_THRESHOLD: f64 = f32::EPSILON as f64;

/// A node holding a fluid mixture in a (possibly zero) volume.
///
/// Potentials are pressures in kPa. Links deposit mass, heat, and trace
/// compounds into the accumulators during flow transport; `integrate_flows`
/// turns them into a new content state once per major step.
///
/// The inflow shadow is the effective mixture carried by this step's inbound
/// flows. The outflow shadow — what outbound links actually remove — equals
/// the contents unless the node is overflowing, in which case inflow
/// replaces contents faster than it can drain and outbound links see the
/// inflow mixture instead.
#[derive(Debug, Clone)]
pub struct FluidNode {
    name: String,
    potential: f64,
    previous_potential: f64,

    volume: f64,
    previous_volume: f64,
    previous_temperature: f64,

    content: FluidState,
    inflow: FluidState,
    outflow_is_inflow: bool,

    // Flow accumulators, reset each major step.
    influx_rate: f64,
    outflux_rate: f64,
    scheduled_outflux: f64,
    heat_flux: f64,
    inflow_species_rates: Vec<f64>,
    inflow_enthalpy_rate: f64,
    tc_inflow_rates: Vec<f64>,

    // Integration results kept for insight and downstream terms.
    net_flux: f64,
    flux_through: f64,
    net_heat_flux: f64,
    mass_error: f64,
    expansion_delta_t: f64,
    thermal_capacitance: f64,
    thermal_damping_heat: f64,

    // Tuning.
    thermal_damping_mass: f64,
    undamped_heat_flux: f64,
    expansion_scale_factor: f64,

    // Pressure-correction state machine.
    correct_gain: f64,
    last_error: f64,
    pressure_correction: f64,

    network_capacitance_request: f64,
    network_capacitance: f64,
}

impl FluidNode {
    /// Construct a node holding the given initial fluid; the node potential
    /// starts at the fluid pressure. Volume starts at zero (non-capacitive)
    /// until [`Self::init_volume`] is called.
    pub fn new(name: impl Into<String>, initial: FluidState) -> Self {
        let potential = initial.pressure();
        let n_species = initial.composition().config().num_species();
        let n_tc = initial.composition().config().num_trace_compounds();
        let inflow = initial.clone();
        Self {
            name: name.into(),
            potential,
            previous_potential: potential,
            volume: 0.0,
            previous_volume: 0.0,
            previous_temperature: initial.temperature(),
            content: initial,
            inflow,
            outflow_is_inflow: false,
            influx_rate: 0.0,
            outflux_rate: 0.0,
            scheduled_outflux: 0.0,
            heat_flux: 0.0,
            inflow_species_rates: vec![0.0; n_species],
            inflow_enthalpy_rate: 0.0,
            tc_inflow_rates: vec![0.0; n_tc],
            net_flux: 0.0,
            flux_through: 0.0,
            net_heat_flux: 0.0,
            mass_error: 0.0,
            expansion_delta_t: 0.0,
            thermal_capacitance: 0.0,
            thermal_damping_heat: 0.0,
            thermal_damping_mass: 0.0,
            undamped_heat_flux: 0.0,
            expansion_scale_factor: 0.0,
            correct_gain: 1.0,
            last_error: 0.0,
            pressure_correction: 0.0,
            network_capacitance_request: 0.0,
            network_capacitance: 0.0,
        }
    }

    /// Set the volume from zero and derive the initial mass from the content
    /// density. Fails on negative volume.
    pub fn init_volume(&mut self, volume: f64) -> NetworkResult<()> {
        if !(volume >= 0.0) {
            return Err(NetworkError::InitInvalid {
                name: self.name.clone(),
                what: "volume must be non-negative",
                value: volume,
            });
        }
        self.volume = volume;
        self.previous_volume = volume;
        let mass = self.content.density() * volume;
        self.content.set_mass(mass);
        Ok(())
    }

    /// Adjust the volume after initialization. Seeds mass when the node was
    /// previously non-capacitive; otherwise mass is reconciled through the
    /// compression source term on the next step.
    pub fn set_volume(&mut self, volume: f64) -> NetworkResult<()> {
        if !(volume >= 0.0) {
            return Err(NetworkError::InitInvalid {
                name: self.name.clone(),
                what: "volume must be non-negative",
                value: volume,
            });
        }
        if self.volume <= 0.0 && volume > 0.0 {
            let mass = self.content.density() * volume;
            self.content.set_mass(mass);
            self.previous_volume = volume;
        }
        self.volume = volume;
        Ok(())
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// Stored content state.
    pub fn content(&self) -> &FluidState {
        &self.content
    }

    /// Mutable content access for initialization and tests.
    pub fn content_mut(&mut self) -> &mut FluidState {
        &mut self.content
    }

    /// The effective mixture carried by this step's inbound flows.
    pub fn inflow(&self) -> &FluidState {
        &self.inflow
    }

    /// The mixture seen by outbound flows this step.
    pub fn outflow(&self) -> &FluidState {
        if self.outflow_is_inflow {
            &self.inflow
        } else {
            &self.content
        }
    }

    pub fn mass(&self) -> f64 {
        self.content.mass()
    }

    pub fn net_flux(&self) -> f64 {
        self.net_flux
    }

    pub fn flux_through(&self) -> f64 {
        self.flux_through
    }

    pub fn net_heat_flux(&self) -> f64 {
        self.net_heat_flux
    }

    /// Measured minus state-equation-implied mass after the last integration.
    pub fn mass_error(&self) -> f64 {
        self.mass_error
    }

    pub fn expansion_delta_t(&self) -> f64 {
        self.expansion_delta_t
    }

    pub fn thermal_capacitance(&self) -> f64 {
        self.thermal_capacitance
    }

    pub fn thermal_damping_heat(&self) -> f64 {
        self.thermal_damping_heat
    }

    pub fn network_capacitance(&self) -> f64 {
        self.network_capacitance
    }

    /// Equivalent thermal mass (kg) damping content temperature changes.
    pub fn set_thermal_damping_mass(&mut self, mass: f64) {
        self.thermal_damping_mass = mass.max(0.0);
    }

    /// Portion of the collected heat flux (W) that bypasses thermal damping.
    pub fn set_undamped_heat_flux(&mut self, heat_flux: f64) {
        self.undamped_heat_flux = heat_flux;
    }

    /// Isentropic cooling scale factor in [0, 1] applied to the contents as
    /// the solved pressure moves.
    pub fn set_expansion_scale_factor(&mut self, factor: f64) {
        self.expansion_scale_factor = factor.clamp(0.0, 1.0);
    }

    /// Mix an incoming fluid stream into the inflow shadow, weighted by mass
    /// rate (kg/s). Negative rates model withdrawal of the stream mixture.
    /// Heat advection is accumulated alongside.
    pub fn collect_influx(&mut self, mdot: f64, fluid: &FluidState) {
        self.influx_rate += mdot;
        for (rate, w) in self
            .inflow_species_rates
            .iter_mut()
            .zip(fluid.composition().mass_fractions())
        {
            *rate += mdot * w;
        }
        self.inflow_enthalpy_rate += mdot * fluid.specific_enthalpy();

        let mw = fluid.molar_mass();
        if mw > f64::EPSILON {
            let ndot = mdot / mw;
            for (rate, x) in self
                .tc_inflow_rates
                .iter_mut()
                .zip(fluid.trace_mole_fractions())
            {
                *rate += ndot * x;
            }
        }
        self.materialize_inflow();
    }

    /// Accumulate an outgoing mass rate (kg/s).
    pub fn collect_outflux(&mut self, mdot: f64) {
        self.outflux_rate += mdot;
    }

    /// Accumulate a direct heat flux (W) into the contents.
    pub fn collect_heat_flux(&mut self, heat_flux: f64) {
        self.heat_flux += heat_flux;
    }

    /// Accumulate a trace-compound inflow (kgmol/s). Fails when the node's
    /// fluid config defines no compound at `index`.
    pub fn collect_tc(&mut self, index: usize, rate: f64) -> NetworkResult<()> {
        let len = self.tc_inflow_rates.len();
        match self.tc_inflow_rates.get_mut(index) {
            Some(slot) => {
                *slot += rate;
                Ok(())
            }
            None => Err(NetworkError::BoundsInvalid {
                name: self.name.clone(),
                what: "trace compound index",
                index,
                len,
            }),
        }
    }

    /// Fluid capacitance (kgmol/kPa) of the current contents in the node
    /// volume; the admittance-diagonal term stamped by capacitive links.
    pub fn capacitance(&self) -> f64 {
        compute_capacitance(&self.content, self.volume)
    }

    /// Thermal-capacitance source term: numerically differentiate density
    /// with respect to temperature at fixed pressure and scale by the
    /// temperature change since last pass. Zero-volume nodes contribute
    /// nothing. Latches the previous temperature for the next pass.
    pub fn compute_thermal_capacitance(&mut self) -> f64 {
        let temperature = self.content.temperature();
        let source = if self.volume > 0.0 {
            let t1 = 0.999 * temperature;
            let t2 = 1.001 * temperature;
            let mw = self.content.molar_mass();
            if mw > f64::EPSILON && t2 > t1 {
                let pressure = self.content.pressure();
                self.thermal_capacitance = (self.content.compute_density(t1, pressure)
                    - self.content.compute_density(t2, pressure))
                    * self.volume
                    / (mw * (t2 - t1));
            } else {
                self.thermal_capacitance = 0.0;
            }
            self.thermal_capacitance * (temperature - self.previous_temperature)
        } else {
            self.thermal_capacitance = 0.0;
            0.0
        };
        self.previous_temperature = temperature;
        source
    }

    /// Compression source term from volume change: moles displaced by the
    /// walls moving since last pass. Latches the previous volume.
    pub fn compute_compression(&mut self) -> f64 {
        let mw = self.content.molar_mass();
        let source = if mw > f64::EPSILON {
            self.content.density() * (self.previous_volume - self.volume) / mw
        } else {
            0.0
        };
        self.previous_volume = self.volume;
        source
    }

    fn materialize_inflow(&mut self) {
        let total = self
            .inflow_species_rates
            .iter()
            .map(|r| r.max(0.0))
            .sum::<f64>();
        if total > f64::EPSILON {
            let rates = self.inflow_species_rates.clone();
            self.inflow.composition_mut().set_from_masses(&rates);
            if self.influx_rate > f64::EPSILON {
                let h_in = self.inflow_enthalpy_rate / self.influx_rate;
                self.inflow.set_temperature_from_enthalpy(h_in);
            }
            self.inflow.set_pressure(self.potential);

            let mw_in = self.inflow.molar_mass();
            if mw_in > f64::EPSILON && self.influx_rate > f64::EPSILON {
                let ndot_in = self.influx_rate / mw_in;
                for (i, rate) in self.tc_inflow_rates.iter().enumerate() {
                    let fraction = (rate / ndot_in).max(0.0);
                    let _ = self.inflow.set_trace_mole_fraction(i, fraction);
                }
            }
        }
    }

    /// Validation of the content state invariants; nonphysical states left by
    /// runtime numerics are surfaced here rather than thrown mid-step.
    pub fn validate(&self) -> NetworkResult<()> {
        if self.content.mass() < 0.0 {
            return Err(NetworkError::InitInvalid {
                name: self.name.clone(),
                what: "content mass is negative",
                value: self.content.mass(),
            });
        }
        if self.content.mass() > 0.0 && self.content.temperature() <= 0.0 {
            return Err(NetworkError::InitInvalid {
                name: self.name.clone(),
                what: "content temperature must be positive",
                value: self.content.temperature(),
            });
        }
        let sum: f64 = self.content.composition().mass_fractions().iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(NetworkError::InitInvalid {
                name: self.name.clone(),
                what: "content mass fractions do not sum to 1",
                value: sum,
            });
        }
        Ok(())
    }

    fn integrate_capacitive(&mut self, dt: f64) {
        let old_mass = self.content.mass();
        let in_mass = self.influx_rate * dt;
        let out_mass = self.outflux_rate * dt;
        let h_old = self.content.specific_enthalpy();
        let mw_old = self.content.molar_mass();

        // Mass and composition: outflow leaves at the content mixture,
        // inflow arrives at the per-species collected rates.
        let mut species_masses = vec![0.0; self.inflow_species_rates.len()];
        for ((m, w), rate) in species_masses
            .iter_mut()
            .zip(self.content.composition().mass_fractions())
            .zip(&self.inflow_species_rates)
        {
            *m = w * (old_mass - out_mass) + rate * dt;
        }
        let new_mass = (old_mass + (self.influx_rate - self.outflux_rate) * dt).max(f64::EPSILON);
        self.content.composition_mut().set_from_masses(&species_masses);
        self.content.set_mass(new_mass);

        // Trace compounds ride the molar flows.
        if !self.tc_inflow_rates.is_empty() && mw_old > f64::EPSILON {
            let moles_remaining = (old_mass - out_mass).max(0.0) / mw_old;
            let mw_new = self.content.molar_mass();
            let moles_new = if mw_new > f64::EPSILON {
                new_mass / mw_new
            } else {
                0.0
            };
            for i in 0..self.tc_inflow_rates.len() {
                let x_old = self.content.trace_mole_fractions()[i];
                let tc_moles = (x_old * moles_remaining + self.tc_inflow_rates[i] * dt).max(0.0);
                let fraction = if moles_new > f64::EPSILON {
                    tc_moles / moles_new
                } else {
                    0.0
                };
                let _ = self.content.set_trace_mole_fraction(i, fraction);
            }
        }

        // Energy balance with thermal damping: the damped portion of the
        // enthalpy change is withheld by the equivalent thermal mass.
        let q_damped = self.heat_flux - self.undamped_heat_flux;
        let m_remaining = (old_mass - out_mass).max(0.0);
        let h_raw = (m_remaining * h_old + self.inflow_enthalpy_rate * dt + q_damped * dt)
            / new_mass;
        let damping = if self.thermal_damping_mass > 0.0 {
            self.thermal_damping_mass / (self.thermal_damping_mass + new_mass)
        } else {
            0.0
        };
        let h_new = h_old
            + (1.0 - damping) * (h_raw - h_old)
            + self.undamped_heat_flux * dt / new_mass;
        self.thermal_damping_heat = damping * (h_raw - h_old) * new_mass / dt;
        self.content.set_temperature_from_enthalpy(h_new);

        // Isentropic expansion of the contents as the solved pressure moved.
        if self.expansion_scale_factor > 0.0 {
            let t_before = self.content.temperature();
            let t_isen = compute_isentropic_temperature(
                self.expansion_scale_factor,
                self.previous_potential,
                self.potential,
                &self.content,
            );
            self.expansion_delta_t = t_isen - t_before;
            self.content.set_temperature(t_isen);
        } else {
            self.expansion_delta_t = 0.0;
        }

        // State equation: pressure consistent with the new mass in the fixed
        // volume, and the mass error against the solver potential that feeds
        // the pressure correction next step.
        let density = new_mass / self.volume;
        let p_state = self.content.pressure_from_density(density);
        self.content.set_pressure(p_state);
        let implied_mass =
            self.content.compute_density(self.content.temperature(), self.potential) * self.volume;
        self.mass_error = new_mass - implied_mass;

        self.net_heat_flux =
            self.heat_flux + self.inflow_enthalpy_rate - self.outflux_rate * h_old;
    }

    fn integrate_overflowing(&mut self, dt: f64) {
        // The scheduled outflow flushes the contents within the step: the
        // inflow mixture replaces the contents, and outbound links already
        // took the inflow mixture through the outflow shadow.
        if self.influx_rate > f64::EPSILON {
            self.content.set_state_from(&self.inflow);
        }
        let new_mass =
            (self.content.mass() + (self.influx_rate - self.outflux_rate) * dt).max(f64::EPSILON);
        self.content.set_mass(new_mass);

        let density = new_mass / self.volume;
        let p_state = self.content.pressure_from_density(density);
        self.content.set_pressure(p_state);
        let implied_mass =
            self.content.compute_density(self.content.temperature(), self.potential) * self.volume;
        self.mass_error = new_mass - implied_mass;
        self.expansion_delta_t = 0.0;
        self.thermal_damping_heat = 0.0;
        self.net_heat_flux = self.heat_flux + self.inflow_enthalpy_rate
            - self.outflux_rate * self.inflow.specific_enthalpy();
    }

    fn integrate_non_capacitive(&mut self) {
        // Pass-through: contents become the inflow mixture at the solved
        // potential, mass stays zero, and advection is conserved through the
        // node so only directly injected heat remains in the net.
        if self.influx_rate > f64::EPSILON {
            self.content.set_state_from(&self.inflow);
        }
        self.content.set_mass(0.0);
        self.content.set_pressure(self.potential);
        self.mass_error = 0.0;
        self.expansion_delta_t = 0.0;
        self.thermal_damping_heat = 0.0;
        self.net_heat_flux = self.heat_flux;
    }
}

impl SolverNode for FluidNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn potential(&self) -> f64 {
        self.potential
    }

    fn set_potential(&mut self, potential: f64) {
        self.potential = potential;
    }

    fn previous_potential(&self) -> f64 {
        self.previous_potential
    }

    fn potential_correction(&self) -> f64 {
        self.pressure_correction
    }

    /// Pressure-correction state machine: compare the content state-equation
    /// pressure against the solver potential and emit a damped feedback term.
    /// The gain halves when the error changes sign (oscillation) and creeps
    /// back up by 1 % per consistent step, capped at 1. Errors below the
    /// chatter threshold emit nothing but still train the gain.
    fn compute_potential_correction(&mut self) -> f64 {
        if self.volume <= 0.0 {
            self.pressure_correction = 0.0;
            return 0.0;
        }

        let error = self.content.pressure() - self.potential;
        if error * self.last_error < 0.0 {
            self.correct_gain *= 0.5;
        } else {
            self.correct_gain = (self.correct_gain * 1.01).min(1.0);
        }
        self.last_error = error;

        self.pressure_correction = if error.abs() > self.potential.abs() * CORRECTION_THRESHOLD {
            self.correct_gain * error
        } else {
            0.0
        };
        self.pressure_correction
    }

    fn schedule_outflux(&mut self, flux: f64) {
        self.scheduled_outflux += flux;
    }

    fn is_overflowing(&self, dt: f64) -> bool {
        self.scheduled_outflux * dt > self.content.moles()
    }

    fn integrate_flows(&mut self, dt: f64) {
        self.net_flux = self.influx_rate - self.outflux_rate;
        self.flux_through = self.influx_rate.min(self.outflux_rate);

        if self.volume > 0.0 {
            if self.is_overflowing(dt) {
                self.outflow_is_inflow = true;
                self.integrate_overflowing(dt);
            } else {
                self.integrate_capacitive(dt);
            }
        } else {
            self.integrate_non_capacitive();
        }

        if self.content.mass() > 0.0 && self.content.temperature() <= 0.0 {
            warn!(node = %self.name, temperature = self.content.temperature(),
                "content temperature non-physical after integration");
        }

        self.previous_potential = self.potential;
    }

    fn reset_flows(&mut self) {
        self.previous_potential = self.potential;
        self.influx_rate = 0.0;
        self.outflux_rate = 0.0;
        self.scheduled_outflux = 0.0;
        self.heat_flux = 0.0;
        self.inflow_enthalpy_rate = 0.0;
        self.inflow_species_rates.iter_mut().for_each(|r| *r = 0.0);
        self.tc_inflow_rates.iter_mut().for_each(|r| *r = 0.0);
        self.inflow.set_state_from(&self.content);
        self.outflow_is_inflow = false;
    }

    fn set_network_capacitance_request(&mut self, flux: f64) {
        self.network_capacitance_request = flux;
    }

    fn network_capacitance_request(&self) -> f64 {
        self.network_capacitance_request
    }

    fn set_network_capacitance(&mut self, capacitance: f64) {
        self.network_capacitance = capacitance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gf_core::units::{k, kpa};
    use gf_fluids::{Composition, FluidConfig, Species, TraceCompound};
    use std::sync::Arc;

    fn air_config() -> Arc<FluidConfig> {
        FluidConfig::new(vec![Species::O2, Species::N2, Species::CO2]).unwrap()
    }

    fn air_state(config: &Arc<FluidConfig>, pressure: f64, temperature: f64) -> FluidState {
        let comp = Composition::new(config.clone(), &[0.2, 0.79, 0.01]).unwrap();
        FluidState::new(comp, kpa(pressure), k(temperature)).unwrap()
    }

    fn capacitive_node(volume: f64) -> FluidNode {
        let config = air_config();
        let mut node = FluidNode::new("node", air_state(&config, 100.0, 300.0));
        node.init_volume(volume).unwrap();
        node
    }

    #[test]
    fn init_volume_seeds_mass_from_density() {
        let node = capacitive_node(1.0);
        let expected = node.content().density();
        assert!((node.mass() - expected).abs() < 1e-12);
    }

    #[test]
    fn init_volume_rejects_negative() {
        let config = air_config();
        let mut node = FluidNode::new("node", air_state(&config, 100.0, 300.0));
        let err = node.init_volume(-1.0).unwrap_err();
        assert!(matches!(err, NetworkError::InitInvalid { .. }));
    }

    #[test]
    fn thermal_capacitance_matches_density_derivative() {
        let mut node = capacitive_node(1.0);
        node.previous_temperature = 299.999;

        let content = node.content().clone();
        let mw = content.molar_mass();
        let rho1 = content.compute_density(300.0 * 0.999, 100.0);
        let rho2 = content.compute_density(300.0 * 1.001, 100.0);
        let capacitance = (rho1 - rho2) / (mw * 300.0 * 0.002);
        let expected_source = capacitance * (300.0 - 299.999);

        let source = node.compute_thermal_capacitance();
        assert!((source - expected_source).abs() < 1e-14);
        assert!((node.thermal_capacitance() - capacitance).abs() < 1e-14);
        // Previous temperature latched for the next pass.
        assert_eq!(node.previous_temperature, 300.0);
    }

    #[test]
    fn zero_volume_thermal_capacitance_is_zero() {
        let config = air_config();
        let mut node = FluidNode::new("node", air_state(&config, 100.0, 300.0));
        node.previous_temperature = 299.9;
        assert_eq!(node.compute_thermal_capacitance(), 0.0);
        assert_eq!(node.thermal_capacitance(), 0.0);
        assert_eq!(node.previous_temperature, 300.0);
    }

    #[test]
    fn compression_tracks_volume_change() {
        let mut node = capacitive_node(1.0);
        node.previous_volume = 0.999;
        let expected =
            node.content().density() * (0.999 - 1.0) / node.content().molar_mass();
        let source = node.compute_compression();
        assert!((source - expected).abs() < 1e-14);
        assert_eq!(node.previous_volume, 1.0);
    }

    #[test]
    fn pressure_correction_state_machine() {
        let mut node = capacitive_node(0.01);

        // -1 % error: full gain, correction opposes the solver potential.
        node.set_potential(101.0);
        let correction = node.compute_potential_correction();
        assert!((correction + 1.0).abs() < 1e-12);
        assert_eq!(node.correct_gain, 1.0);

        // Sign flip to +0.5 % error: gain halves.
        node.set_potential(99.5);
        let correction = node.compute_potential_correction();
        assert!((correction - 0.25).abs() < 1e-12);
        assert_eq!(node.correct_gain, 0.5);

        // Same sign, negligible error: gain creeps up but correction is
        // suppressed below the chatter threshold.
        node.set_potential(100.0 * 0.99999999999999);
        let correction = node.compute_potential_correction();
        assert_eq!(correction, 0.0);
        assert!((node.correct_gain - 0.505).abs() < 1e-12);
    }

    #[test]
    fn non_capacitive_node_never_corrects() {
        let config = air_config();
        let mut node = FluidNode::new("node", air_state(&config, 100.0, 300.0));
        node.set_potential(101.0);
        assert_eq!(node.compute_potential_correction(), 0.0);
        assert_eq!(node.potential_correction(), 0.0);
    }

    #[test]
    fn nominal_flows_conserve_mass_and_blend() {
        let config = air_config();
        let mut node = capacitive_node(1000.0);
        let init_mass = node.mass();
        let dt = 0.1;

        // Incoming stream rich in O2.
        let comp_in = Composition::new(config.clone(), &[0.99, 0.0, 0.01]).unwrap();
        let fluid_in = FluidState::new(comp_in, kpa(1.0), k(290.0)).unwrap();

        let in_rate = 0.0006;
        let out_rate = 0.0003;
        node.collect_influx(in_rate, &fluid_in);
        node.collect_outflux(out_rate);
        node.collect_heat_flux(100.0);
        node.schedule_outflux(out_rate / node.content().molar_mass());
        assert!(!node.is_overflowing(dt));

        node.integrate_flows(dt);

        let expected_mass = init_mass + (in_rate - out_rate) * dt;
        assert!((node.mass() - expected_mass).abs() < 1e-9 * init_mass);
        assert!((node.net_flux() - (in_rate - out_rate)).abs() < 1e-15);
        assert!((node.flux_through() - out_rate).abs() < 1e-15);

        // Mass-weighted blend of retained contents and the inflow stream.
        let expected_o2 =
            (0.2 * (init_mass - out_rate * dt) + 0.99 * in_rate * dt) / expected_mass;
        let fractions = node.content().composition().mass_fractions();
        assert!((fractions[0] - expected_o2).abs() < 1e-9);
        let sum: f64 = fractions.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);

        // State-equation pressure recorded on the contents.
        let rho = node.mass() / 1000.0;
        assert!(
            (node.content().pressure() - node.content().pressure_from_density(rho)).abs()
                < 1e-9
        );
    }

    #[test]
    fn withdrawal_clamps_constituents_at_zero() {
        let config = air_config();
        let mut node = capacitive_node(1000.0);
        let init_mass = node.mass();
        let dt = 0.1;

        // Withdraw pure CO2 far beyond the CO2 stored in the node.
        let comp_in = Composition::new(config.clone(), &[0.0, 0.0, 1.0]).unwrap();
        let fluid_in = FluidState::new(comp_in, kpa(1.0), k(290.0)).unwrap();
        node.collect_influx(-1000.0, &fluid_in);

        node.integrate_flows(dt);

        let expected_mass = init_mass - 1000.0 * dt;
        assert!((node.mass() - expected_mass).abs() < 1e-9 * init_mass);
        let fractions = node.content().composition().mass_fractions();
        assert_eq!(fractions[2], 0.0);
        assert!((fractions[0] + fractions[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn overflowing_node_takes_inflow_state() {
        let config = air_config();
        let mut node = capacitive_node(0.01);
        let dt = 0.1;

        let comp_in = Composition::new(config.clone(), &[1.0, 0.0, 0.0]).unwrap();
        let fluid_in = FluidState::new(comp_in, kpa(90.0), k(280.0)).unwrap();
        node.collect_influx(0.001, &fluid_in);

        // Schedule far more outflow than the node holds.
        let moles = node.content().moles();
        node.schedule_outflux(moles / dt * 10.0);
        node.collect_outflux(node.mass() / dt * 10.0);
        assert!(node.is_overflowing(dt));

        // Outflow shadow switches to the inflow mixture once integrated.
        node.integrate_flows(dt);
        assert_eq!(node.outflow().composition(), node.inflow().composition());
        assert_eq!(
            node.content().composition().mass_fractions(),
            node.inflow().composition().mass_fractions()
        );
        // Mass floors at epsilon instead of inverting sign.
        assert!(node.mass() >= f64::EPSILON);
        assert!(node.mass() < 1e-10);
    }

    #[test]
    fn non_capacitive_node_passes_inflow_through() {
        let config = air_config();
        let mut node = FluidNode::new("junction", air_state(&config, 100.0, 300.0));
        node.set_potential(95.0);

        let comp_in = Composition::new(config.clone(), &[1.0, 0.0, 0.0]).unwrap();
        let fluid_in = FluidState::new(comp_in, kpa(95.0), k(280.0)).unwrap();
        node.collect_influx(0.01, &fluid_in);
        node.collect_outflux(0.01);
        node.collect_heat_flux(50.0);

        node.integrate_flows(0.1);

        assert_eq!(node.mass(), 0.0);
        assert_eq!(node.content().composition().mass_fractions()[0], 1.0);
        assert!((node.content().temperature() - 280.0).abs() < 1e-9);
        assert_eq!(node.content().pressure(), 95.0);
        // Advection cancels through the node; only injected heat remains.
        assert_eq!(node.net_heat_flux(), 50.0);
    }

    #[test]
    fn trace_compounds_ride_molar_flows() {
        let config = FluidConfig::with_trace_compounds(
            vec![Species::O2, Species::N2, Species::CO2],
            vec![TraceCompound {
                name: "NH3".into(),
                molar_mass: 17.031,
            }],
        )
        .unwrap();
        let comp = Composition::new(config.clone(), &[0.2, 0.79, 0.01]).unwrap();
        let state = FluidState::new(comp, kpa(100.0), k(300.0)).unwrap();
        let mut node = FluidNode::new("node", state);
        node.init_volume(1.0).unwrap();

        let comp_in = Composition::new(config.clone(), &[0.2, 0.79, 0.01]).unwrap();
        let fluid_in = FluidState::new(comp_in, kpa(100.0), k(300.0)).unwrap();
        node.collect_influx(0.01, &fluid_in);
        node.collect_tc(0, 1e-8).unwrap();
        node.integrate_flows(0.1);

        assert!(node.content().trace_mole_fractions()[0] > 0.0);
    }

    #[test]
    fn collect_tc_rejects_unconfigured_index() {
        let mut node = capacitive_node(1.0);
        let err = node.collect_tc(0, 1e-9).unwrap_err();
        assert!(matches!(err, NetworkError::BoundsInvalid { .. }));
    }

    #[test]
    fn reset_clears_accumulators_and_latches_potential() {
        let config = air_config();
        let mut node = capacitive_node(1.0);
        let fluid_in = FluidState::new(
            Composition::new(config.clone(), &[1.0, 0.0, 0.0]).unwrap(),
            kpa(100.0),
            k(300.0),
        )
        .unwrap();
        node.collect_influx(0.5, &fluid_in);
        node.collect_outflux(0.25);
        node.collect_heat_flux(10.0);
        node.set_potential(123.0);

        node.reset_flows();

        assert_eq!(node.previous_potential(), 123.0);
        node.integrate_flows(0.1);
        assert_eq!(node.net_flux(), 0.0);
    }

    #[test]
    fn validate_accepts_nominal_state() {
        let node = capacitive_node(1.0);
        assert!(node.validate().is_ok());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use gf_core::units::{k, kpa};
    use gf_fluids::{Composition, FluidConfig, FluidState, Species};
    use proptest::prelude::*;

    proptest! {
        /// Whatever sequence of solver potentials arrives, the correction
        /// gain stays in (0, 1] and any emitted correction is the gained
        /// error, pushing the potential toward the content pressure.
        #[test]
        fn correction_gain_and_sign_invariants(
            potentials in prop::collection::vec(50.0_f64..150.0, 1..40)
        ) {
            let config =
                FluidConfig::new(vec![Species::O2, Species::N2, Species::CO2]).unwrap();
            let comp = Composition::new(config, &[0.2, 0.79, 0.01]).unwrap();
            let state = FluidState::new(comp, kpa(100.0), k(300.0)).unwrap();
            let mut node = FluidNode::new("node", state);
            node.init_volume(0.01).unwrap();

            for p in potentials {
                node.set_potential(p);
                let correction = node.compute_potential_correction();

                prop_assert!(node.correct_gain > 0.0 && node.correct_gain <= 1.0);
                prop_assert_eq!(correction, node.potential_correction());
                if correction != 0.0 {
                    let error = node.content().pressure() - p;
                    prop_assert!(
                        (correction - node.correct_gain * error).abs()
                            <= 1e-12 * error.abs().max(1.0)
                    );
                    prop_assert_eq!(correction.signum(), error.signum());
                }
            }
        }
    }
}
