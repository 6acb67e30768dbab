//! Node contract and the basic (non-fluid) node.

/// The node interface consumed by the solver and flow orchestrator.
///
/// A network's node list always ends with the Ground node, a sink of fixed
/// potential that never integrates flows; the solver excludes it from the
/// system by index, so node types carry no ground marker of their own.
pub trait SolverNode {
    /// Instance name used to tag warnings.
    fn name(&self) -> &str;

    /// Solved potential (V, kPa, K).
    fn potential(&self) -> f64;

    /// Overwrite the potential with a solver result.
    fn set_potential(&mut self, potential: f64);

    /// Potential at the end of the previous major step.
    fn previous_potential(&self) -> f64;

    /// Feedback source term nudging the solver potential toward the node's
    /// state-equation-consistent value. Zero for nodes without a state
    /// equation.
    fn potential_correction(&self) -> f64 {
        0.0
    }

    /// Recompute the potential correction after flow integration; the result
    /// enters the source vector on the next major step.
    fn compute_potential_correction(&mut self) -> f64 {
        0.0
    }

    /// Pre-declare outflow (molar or charge flux) used by overflow detection.
    fn schedule_outflux(&mut self, flux: f64);

    /// True iff the scheduled outflow over `dt` exceeds the stored quantity.
    fn is_overflowing(&self, dt: f64) -> bool {
        let _ = dt;
        false
    }

    /// Integrate accumulated flows over one major step.
    fn integrate_flows(&mut self, dt: f64);

    /// Clear flow accumulators and latch the previous potential. Called at
    /// the start of every major step.
    fn reset_flows(&mut self);

    /// Request a network-capacitance probe with the given flux magnitude.
    fn set_network_capacitance_request(&mut self, flux: f64);

    /// Pending probe flux (zero when no probe is requested).
    fn network_capacitance_request(&self) -> f64;

    /// Store the probe result.
    fn set_network_capacitance(&mut self, capacitance: f64);
}

/// A node carrying only a potential and flux accumulators, for aspects
/// (electrical, thermal) whose links need no transported content state.
#[derive(Debug, Clone)]
pub struct BasicNode {
    name: String,
    potential: f64,
    previous_potential: f64,
    influx: f64,
    outflux: f64,
    scheduled_outflux: f64,
    net_flux: f64,
    flux_through: f64,
    network_capacitance_request: f64,
    network_capacitance: f64,
}

impl BasicNode {
    pub fn new(name: impl Into<String>, potential: f64) -> Self {
        Self {
            name: name.into(),
            potential,
            previous_potential: potential,
            influx: 0.0,
            outflux: 0.0,
            scheduled_outflux: 0.0,
            net_flux: 0.0,
            flux_through: 0.0,
            network_capacitance_request: 0.0,
            network_capacitance: 0.0,
        }
    }

    /// Accumulate an incoming flux.
    pub fn collect_influx(&mut self, flux: f64) {
        self.influx += flux;
    }

    /// Accumulate an outgoing flux.
    pub fn collect_outflux(&mut self, flux: f64) {
        self.outflux += flux;
    }

    /// Net flux from the last integration.
    pub fn net_flux(&self) -> f64 {
        self.net_flux
    }

    /// Through-flow from the last integration.
    pub fn flux_through(&self) -> f64 {
        self.flux_through
    }

    pub fn network_capacitance(&self) -> f64 {
        self.network_capacitance
    }
}

impl SolverNode for BasicNode {
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

    fn schedule_outflux(&mut self, flux: f64) {
        self.scheduled_outflux += flux;
    }

    fn integrate_flows(&mut self, _dt: f64) {
        self.net_flux = self.influx - self.outflux;
        self.flux_through = self.influx.min(self.outflux);
    }

    fn reset_flows(&mut self) {
        self.previous_potential = self.potential;
        self.influx = 0.0;
        self.outflux = 0.0;
        self.scheduled_outflux = 0.0;
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
