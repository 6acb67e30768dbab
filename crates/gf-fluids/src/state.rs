//! Fluid state: a mixture at a pressure and temperature, with stored mass.

use crate::composition::Composition;
use crate::error::{FluidError, FluidResult};
use crate::species::{Phase, liquid};
use gf_core::units::constants::{PA_PER_KPA, UNIVERSAL_GAS_CONSTANT};
use gf_core::units::{Pressure, Temperature, kpa};

/// Minimum working pressure / temperature (kPa / K); state math below these
/// values is dominated by roundoff, so inputs are floored here.
pub const MIN_PRESSURE: f64 = f32::EPSILON as f64;
pub const MIN_TEMPERATURE: f64 = f32::EPSILON as f64;

/// A fluid state aligned to a shared [`crate::FluidConfig`].
///
/// Potential-side units follow the network convention: pressure in kPa,
/// temperature in K, mass in kg, specific enthalpy in J/kg. Derived
/// properties (density, molar mass, enthalpy) are computed on demand from
/// the composition.
#[derive(Debug, Clone, PartialEq)]
pub struct FluidState {
    composition: Composition,
    /// kPa
    pressure: f64,
    /// K
    temperature: f64,
    /// kg
    mass: f64,
    /// Mole fractions of the config's trace compounds.
    trace_mole_fractions: Vec<f64>,
}

impl FluidState {
    /// Create a state from a mixture, pressure, and temperature.
    ///
    /// Validates that pressure and temperature are positive and finite.
    pub fn new(
        composition: Composition,
        pressure: Pressure,
        temperature: Temperature,
    ) -> FluidResult<Self> {
        let p_kpa = pressure.get::<uom::si::pressure::kilopascal>();
        let t_k = temperature.get::<uom::si::thermodynamic_temperature::kelvin>();
        if !p_kpa.is_finite() || p_kpa <= 0.0 {
            return Err(FluidError::NonPhysical {
                what: "pressure must be positive and finite",
            });
        }
        if !t_k.is_finite() || t_k <= 0.0 {
            return Err(FluidError::NonPhysical {
                what: "temperature must be positive and finite",
            });
        }
        let n_tc = composition.config().num_trace_compounds();
        Ok(Self {
            composition,
            pressure: p_kpa,
            temperature: t_k,
            mass: 0.0,
            trace_mole_fractions: vec![0.0; n_tc],
        })
    }

    pub fn composition(&self) -> &Composition {
        &self.composition
    }

    pub fn composition_mut(&mut self) -> &mut Composition {
        &mut self.composition
    }

    /// Pressure (kPa).
    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    /// Pressure as a typed quantity.
    pub fn pressure_qty(&self) -> Pressure {
        kpa(self.pressure)
    }

    /// Temperature (K).
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Stored mass (kg).
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Stored moles (kgmol); zero when the mixture has no defined molar mass.
    pub fn moles(&self) -> f64 {
        let mw = self.molar_mass();
        if mw > f64::EPSILON {
            self.mass / mw
        } else {
            0.0
        }
    }

    /// Mixture molar mass (kg/kgmol).
    pub fn molar_mass(&self) -> f64 {
        self.composition.molar_mass()
    }

    /// Mixture specific heat (J/(kg*K)).
    pub fn specific_heat(&self) -> f64 {
        self.composition.specific_heat()
    }

    /// Specific enthalpy (J/kg), referenced to 0 K.
    pub fn specific_enthalpy(&self) -> f64 {
        self.composition.specific_heat() * self.temperature
    }

    /// Ratio of specific heats cp/cv for the mixture.
    pub fn adiabatic_index(&self) -> f64 {
        let cp = self.composition.specific_heat();
        let mw = self.molar_mass();
        if mw <= f64::EPSILON {
            return 1.0;
        }
        let r_specific = UNIVERSAL_GAS_CONSTANT / mw;
        if cp > r_specific {
            cp / (cp - r_specific)
        } else {
            1.0
        }
    }

    /// Phase of the dominant constituent.
    pub fn phase(&self) -> Phase {
        self.composition.phase()
    }

    /// Density (kg/m3) at the current state.
    pub fn density(&self) -> f64 {
        self.compute_density(self.temperature, self.pressure)
    }

    /// Density (kg/m3) of this mixture at an arbitrary temperature (K) and
    /// pressure (kPa).
    pub fn compute_density(&self, temperature: f64, pressure: f64) -> f64 {
        let t = temperature.max(MIN_TEMPERATURE);
        let p = pressure.max(MIN_PRESSURE);
        match self.phase() {
            Phase::Gas => {
                let mw = self.molar_mass();
                p * PA_PER_KPA * mw / (UNIVERSAL_GAS_CONSTANT * t)
            }
            Phase::Liquid => {
                liquid::RHO0
                    * (1.0 + (p - liquid::P0) / liquid::BULK_MODULUS
                        - liquid::THERMAL_EXPANSION * (t - liquid::T0))
            }
        }
    }

    /// Pressure (kPa) consistent with the given density (kg/m3) at the
    /// current temperature; the inverse of [`Self::compute_density`].
    pub fn pressure_from_density(&self, density: f64) -> f64 {
        match self.phase() {
            Phase::Gas => {
                let mw = self.molar_mass();
                if mw > f64::EPSILON {
                    density * UNIVERSAL_GAS_CONSTANT * self.temperature.max(MIN_TEMPERATURE)
                        / (mw * PA_PER_KPA)
                } else {
                    0.0
                }
            }
            Phase::Liquid => {
                liquid::P0
                    + liquid::BULK_MODULUS
                        * (density / liquid::RHO0 - 1.0
                            + liquid::THERMAL_EXPANSION
                                * (self.temperature - liquid::T0))
            }
        }
    }

    /// Set pressure (kPa), floored at the minimum working pressure.
    pub fn set_pressure(&mut self, pressure: f64) {
        self.pressure = pressure.max(MIN_PRESSURE);
    }

    /// Set temperature (K), floored at the minimum working temperature.
    pub fn set_temperature(&mut self, temperature: f64) {
        self.temperature = temperature.max(MIN_TEMPERATURE);
    }

    /// Set temperature from a specific enthalpy (J/kg).
    pub fn set_temperature_from_enthalpy(&mut self, enthalpy: f64) {
        let cp = self.composition.specific_heat();
        if cp > f64::EPSILON {
            self.set_temperature(enthalpy / cp);
        }
    }

    /// Set stored mass (kg), clamped non-negative.
    pub fn set_mass(&mut self, mass: f64) {
        self.mass = mass.max(0.0);
    }

    /// Copy another state's intensive properties (composition, pressure,
    /// temperature, trace compounds), keeping this state's mass.
    pub fn set_state_from(&mut self, other: &FluidState) {
        self.composition = other.composition.clone();
        self.pressure = other.pressure;
        self.temperature = other.temperature;
        self.trace_mole_fractions
            .clone_from(&other.trace_mole_fractions);
    }

    /// Trace-compound mole fractions in config order.
    pub fn trace_mole_fractions(&self) -> &[f64] {
        &self.trace_mole_fractions
    }

    /// Overwrite a trace-compound mole fraction.
    pub fn set_trace_mole_fraction(&mut self, index: usize, fraction: f64) -> FluidResult<()> {
        let len = self.trace_mole_fractions.len();
        match self.trace_mole_fractions.get_mut(index) {
            Some(slot) => {
                *slot = fraction.max(0.0);
                Ok(())
            }
            None => Err(FluidError::IndexOob {
                what: "trace compound index",
                index,
                len,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::FluidConfig;
    use crate::species::Species;
    use gf_core::units::k;

    fn air_state() -> FluidState {
        let config = FluidConfig::new(vec![Species::O2, Species::N2, Species::CO2]).unwrap();
        let comp = Composition::new(config, &[0.2, 0.79, 0.01]).unwrap();
        FluidState::new(comp, kpa(100.0), k(300.0)).unwrap()
    }

    #[test]
    fn create_valid_state() {
        let state = air_state();
        assert_eq!(state.pressure(), 100.0);
        assert_eq!(state.temperature(), 300.0);
        assert_eq!(state.mass(), 0.0);
    }

    #[test]
    fn reject_negative_pressure() {
        let config = FluidConfig::new(vec![Species::N2]).unwrap();
        let comp = Composition::pure(config, 0).unwrap();
        assert!(FluidState::new(comp, kpa(-100.0), k(300.0)).is_err());
    }

    #[test]
    fn reject_zero_temperature() {
        let config = FluidConfig::new(vec![Species::N2]).unwrap();
        let comp = Composition::pure(config, 0).unwrap();
        assert!(FluidState::new(comp, kpa(100.0), k(0.0)).is_err());
    }

    #[test]
    fn ideal_gas_density() {
        let state = air_state();
        let mw = state.molar_mass();
        let expected = 100.0 * 1000.0 * mw / (8_314.472 * 300.0);
        assert!((state.density() - expected).abs() < 1e-12);
    }

    #[test]
    fn density_pressure_round_trip() {
        let state = air_state();
        let rho = state.density();
        assert!((state.pressure_from_density(rho) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn enthalpy_temperature_round_trip() {
        let mut state = air_state();
        let h = state.specific_enthalpy();
        state.set_temperature_from_enthalpy(h);
        assert!((state.temperature() - 300.0).abs() < 1e-10);
    }

    #[test]
    fn adiabatic_index_in_physical_range() {
        let gamma = air_state().adiabatic_index();
        assert!(gamma > 1.0 && gamma < 1.7, "gamma = {gamma}");
    }

    #[test]
    fn liquid_density_weakly_compressible() {
        let config = FluidConfig::new(vec![Species::WaterLiquid]).unwrap();
        let comp = Composition::pure(config, 0).unwrap();
        let state = FluidState::new(comp, kpa(101.325), k(293.15)).unwrap();
        assert!((state.density() - 998.2).abs() < 1e-9);
        // Raising pressure by 1 MPa changes density well under 0.1 %.
        let rho_hi = state.compute_density(293.15, 1_101.325);
        assert!((rho_hi - 998.2) / 998.2 < 1e-3);
    }

    #[test]
    fn trace_fraction_bounds_error() {
        let mut state = air_state();
        let err = state.set_trace_mole_fraction(0, 0.5).unwrap_err();
        assert!(matches!(err, FluidError::IndexOob { .. }));
    }
}
