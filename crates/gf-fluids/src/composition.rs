//! Fluid configuration and mass-fraction mixtures.

use crate::error::{FluidError, FluidResult};
use crate::species::{Phase, Species};
use std::sync::Arc;

/// Mass fractions must sum to 1 within this tolerance before normalization.
pub const FRACTION_SUM_TOLERANCE: f64 = 1e-6;

/// Fractions below this floor are zeroed during normalization.
pub const FRACTION_FLOOR: f64 = 1e-15;

/// A trace compound tracked through the network in mole fractions, too dilute
/// to affect bulk properties.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceCompound {
    pub name: String,
    /// Molar mass (kg/kgmol).
    pub molar_mass: f64,
}

/// The defined fluids of a network: an immutable, shared configuration.
///
/// Every node content, inflow shadow, and link internal fluid in one network
/// is aligned to the same configuration; mass-fraction vectors are indexed by
/// position in `species`.
#[derive(Debug, Clone, PartialEq)]
pub struct FluidConfig {
    pub species: Vec<Species>,
    pub trace_compounds: Vec<TraceCompound>,
}

impl FluidConfig {
    /// Create a configuration with no trace compounds.
    pub fn new(species: Vec<Species>) -> FluidResult<Arc<Self>> {
        Self::with_trace_compounds(species, Vec::new())
    }

    /// Create a configuration with trace compounds.
    pub fn with_trace_compounds(
        species: Vec<Species>,
        trace_compounds: Vec<TraceCompound>,
    ) -> FluidResult<Arc<Self>> {
        if species.is_empty() {
            return Err(FluidError::InvalidArg {
                what: "fluid config must define at least one species",
            });
        }
        if trace_compounds
            .iter()
            .any(|tc| !(tc.molar_mass > 0.0) || !tc.molar_mass.is_finite())
        {
            return Err(FluidError::InvalidArg {
                what: "trace compound molar mass must be positive and finite",
            });
        }
        Ok(Arc::new(Self {
            species,
            trace_compounds,
        }))
    }

    pub fn num_species(&self) -> usize {
        self.species.len()
    }

    pub fn num_trace_compounds(&self) -> usize {
        self.trace_compounds.len()
    }
}

/// A normalized mass-fraction mixture aligned to a [`FluidConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    config: Arc<FluidConfig>,
    mass_fractions: Vec<f64>,
}

impl Composition {
    /// Create a mixture from mass fractions in config species order.
    ///
    /// The fractions must be finite, non-negative, and sum to 1 within
    /// [`FRACTION_SUM_TOLERANCE`]; they are then normalized exactly.
    pub fn new(config: Arc<FluidConfig>, mass_fractions: &[f64]) -> FluidResult<Self> {
        if mass_fractions.len() != config.num_species() {
            return Err(FluidError::InvalidArg {
                what: "mass fraction count does not match fluid config",
            });
        }
        let mut sum = 0.0;
        for &f in mass_fractions {
            if !f.is_finite() {
                return Err(FluidError::NonPhysical {
                    what: "non-finite mass fraction",
                });
            }
            if f < 0.0 {
                return Err(FluidError::NonPhysical {
                    what: "negative mass fraction",
                });
            }
            sum += f;
        }
        if (sum - 1.0).abs() > FRACTION_SUM_TOLERANCE {
            return Err(FluidError::NonPhysical {
                what: "mass fractions do not sum to 1",
            });
        }

        let mut comp = Self {
            config,
            mass_fractions: mass_fractions.to_vec(),
        };
        comp.normalize();
        Ok(comp)
    }

    /// Create a pure mixture of the species at `index` in the config.
    pub fn pure(config: Arc<FluidConfig>, index: usize) -> FluidResult<Self> {
        let n = config.num_species();
        if index >= n {
            return Err(FluidError::IndexOob {
                what: "species index",
                index,
                len: n,
            });
        }
        let mut fractions = vec![0.0; n];
        fractions[index] = 1.0;
        Ok(Self {
            config,
            mass_fractions: fractions,
        })
    }

    pub fn config(&self) -> &Arc<FluidConfig> {
        &self.config
    }

    pub fn mass_fractions(&self) -> &[f64] {
        &self.mass_fractions
    }

    /// Mixture molar mass (kg/kgmol): 1 / sum(w_i / M_i).
    pub fn molar_mass(&self) -> f64 {
        let inv: f64 = self
            .config
            .species
            .iter()
            .zip(&self.mass_fractions)
            .map(|(s, w)| w / s.molar_mass())
            .sum();
        if inv > 0.0 { 1.0 / inv } else { 0.0 }
    }

    /// Mixture specific heat (J/(kg*K)): mass-weighted average.
    pub fn specific_heat(&self) -> f64 {
        self.config
            .species
            .iter()
            .zip(&self.mass_fractions)
            .map(|(s, w)| w * s.specific_heat())
            .sum()
    }

    /// Phase of the dominant constituent by mass.
    pub fn phase(&self) -> Phase {
        self.config
            .species
            .iter()
            .zip(&self.mass_fractions)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(s, _)| s.phase())
            .unwrap_or(Phase::Gas)
    }

    /// Overwrite fractions from per-species masses, zeroing negatives.
    ///
    /// Returns the summed (clamped) mass so callers can reconcile totals.
    pub fn set_from_masses(&mut self, masses: &[f64]) -> f64 {
        debug_assert_eq!(masses.len(), self.mass_fractions.len());
        let total: f64 = masses.iter().map(|m| m.max(0.0)).sum();
        if total > 0.0 {
            for (w, m) in self.mass_fractions.iter_mut().zip(masses) {
                *w = m.max(0.0) / total;
            }
        }
        self.normalize();
        total
    }

    /// Zero out negligible fractions and rescale to an exact unit sum.
    pub fn normalize(&mut self) {
        for w in &mut self.mass_fractions {
            if *w < FRACTION_FLOOR {
                *w = 0.0;
            }
        }
        let sum: f64 = self.mass_fractions.iter().sum();
        if sum > 0.0 {
            for w in &mut self.mass_fractions {
                *w /= sum;
            }
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn set_from_masses_always_normalizes(
            masses in prop::collection::vec(0.0_f64..1e6_f64, 3)
        ) {
            let config =
                FluidConfig::new(vec![Species::O2, Species::N2, Species::CO2]).unwrap();
            let mut comp = Composition::new(config, &[0.2, 0.79, 0.01]).unwrap();
            let total = comp.set_from_masses(&masses);
            if total > 0.0 {
                let sum: f64 = comp.mass_fractions().iter().sum();
                prop_assert!((sum - 1.0).abs() < 1e-9);
            }
        }
    }
}
