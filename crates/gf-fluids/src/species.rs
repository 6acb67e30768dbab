//! Defined fluid species and their fixed properties.

/// Phase of a species at network conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    Gas,
    Liquid,
}

/// Supported fluid species.
///
/// Properties are fixed constants: molar mass, constant-pressure specific
/// heat, and phase. Gas densities come from the ideal gas law; liquids use a
/// linearized equation of state about a reference point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Species {
    O2,
    N2,
    CO2,
    H2O,
    H2,
    He,
    Ar,
    CH4,
    WaterLiquid,
}

impl Species {
    /// Molar mass (kg/kgmol).
    pub fn molar_mass(self) -> f64 {
        match self {
            Species::O2 => 31.9988,
            Species::N2 => 28.0134,
            Species::CO2 => 44.0095,
            Species::H2O | Species::WaterLiquid => 18.0153,
            Species::H2 => 2.01588,
            Species::He => 4.002602,
            Species::Ar => 39.948,
            Species::CH4 => 16.0425,
        }
    }

    /// Constant-pressure specific heat (J/(kg*K)).
    pub fn specific_heat(self) -> f64 {
        match self {
            Species::O2 => 918.0,
            Species::N2 => 1_040.0,
            Species::CO2 => 846.0,
            Species::H2O => 1_864.0,
            Species::H2 => 14_310.0,
            Species::He => 5_193.0,
            Species::Ar => 520.3,
            Species::CH4 => 2_220.0,
            Species::WaterLiquid => 4_186.0,
        }
    }

    /// Phase at network conditions.
    pub fn phase(self) -> Phase {
        match self {
            Species::WaterLiquid => Phase::Liquid,
            _ => Phase::Gas,
        }
    }

    /// Display name used in warnings and config files.
    pub fn name(self) -> &'static str {
        match self {
            Species::O2 => "O2",
            Species::N2 => "N2",
            Species::CO2 => "CO2",
            Species::H2O => "H2O",
            Species::H2 => "H2",
            Species::He => "He",
            Species::Ar => "Ar",
            Species::CH4 => "CH4",
            Species::WaterLiquid => "WATER_LIQUID",
        }
    }
}

/// Reference state and stiffness constants for the liquid density model:
/// rho = rho0 * (1 + (P - P0)/B - alpha*(T - T0)).
pub mod liquid {
    /// Reference density (kg/m3).
    pub const RHO0: f64 = 998.2;
    /// Reference temperature (K).
    pub const T0: f64 = 293.15;
    /// Reference pressure (kPa).
    pub const P0: f64 = 101.325;
    /// Bulk modulus (kPa).
    pub const BULK_MODULUS: f64 = 2.2e6;
    /// Volumetric thermal expansion coefficient (1/K).
    pub const THERMAL_EXPANSION: f64 = 2.07e-4;
}
