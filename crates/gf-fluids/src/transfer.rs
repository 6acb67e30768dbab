//! Linearizations that turn fluid properties into network admittance terms.

use crate::species::Phase;
use crate::state::FluidState;
use gf_core::numeric::limit_range;
use gf_core::units::constants::PA_PER_KPA;

/// Calculates the link admittance as a function of conductivity and the
/// fluids at the link's ports.
///
/// The underlying mass flow model is the momentum equation for steady
/// one-dimensional flow, `mdot = G * (avg_rho * dP)^x` with `dP` in Pa, and
/// exponent x limited to [1/2, 1]: 1/2 is the physical value, 1 is useful for
/// laminar regimes. The result is converted to a molar admittance
/// (kgmol/kPa/s) by linearizing about the current delta-pressure.
///
/// The delta-pressure is floored at `min_linearization_p` (kPa) so the
/// admittance does not collapse to zero as flow onset approaches, and to
/// keep noise out of the network solution at low delta-pressure. The ground
/// node carries no molecular weight; when one port is grounded the other
/// port's molecular weight is used alone.
pub fn compute_admittance(
    conductivity: f64,
    min_linearization_p: f64,
    fluid0: &FluidState,
    fluid1: &FluidState,
    exponent: f64,
) -> f64 {
    let avg_density = 0.5 * (fluid0.density() + fluid1.density());

    let mw0 = fluid0.molar_mass();
    let mw1 = fluid1.molar_mass();
    let use_mw = if mw0 < f64::EPSILON {
        mw1
    } else if mw1 < f64::EPSILON {
        mw0
    } else {
        0.5 * (mw0 + mw1)
    };

    // Limited delta-pressure (kPa), then in Pa for the flow equation.
    let dp_lin = min_linearization_p.max((fluid0.pressure() - fluid1.pressure()).abs());
    let dp_pa = PA_PER_KPA * dp_lin;

    if dp_lin > f64::EPSILON && use_mw > f64::EPSILON {
        let limit_exp = limit_range(0.5, exponent, 1.0);
        let mdot = if limit_exp == 0.5 {
            conductivity * (avg_density * dp_pa).sqrt()
        } else if limit_exp == 1.0 {
            conductivity * avg_density * dp_pa
        } else {
            conductivity * (avg_density * dp_pa).powf(limit_exp)
        };
        // Convert mdot (kg/s) to mole rate and linearize to kgmol/s/kPa.
        mdot / dp_lin / use_mw
    } else {
        0.0
    }
}

/// Predicts the effective conductivity needed to produce the desired mass
/// flow rate across a link at current network conditions; the inverse of
/// [`compute_admittance`]. Returns zero when the delta-pressure or average
/// density vanishes.
pub fn predict_conductivity(
    mdot: f64,
    min_linearization_p: f64,
    fluid0: &FluidState,
    fluid1: &FluidState,
    exponent: f64,
) -> f64 {
    let mut dp = (fluid0.pressure() - fluid1.pressure()).abs();
    if dp <= f64::EPSILON {
        return 0.0;
    }
    let avg_density = 0.5 * (fluid0.density() + fluid1.density());
    if dp < min_linearization_p {
        dp = min_linearization_p;
    }
    if avg_density <= f64::EPSILON {
        return 0.0;
    }

    let limit_exp = limit_range(0.5, exponent, 1.0);
    let flow_term = PA_PER_KPA * dp * avg_density;
    if limit_exp == 0.5 {
        mdot.abs() / flow_term.sqrt()
    } else if limit_exp == 1.0 {
        mdot.abs() / flow_term
    } else {
        mdot.abs() / flow_term.powf(limit_exp)
    }
}

/// Final temperature (K) of a fluid after isentropic expansion from `p1` to
/// `p2` (kPa), scaled by `expansion_scale_factor` in [0, 1].
///
/// Liquids pass through unchanged. For gases the isentropic pressure and
/// temperature relation `T2/T1 = (P2/P1)^((gamma-1)/gamma)` applies, with the
/// scale factor blending between no cooling (0) and the full ideal effect
/// (1).
pub fn compute_isentropic_temperature(
    expansion_scale_factor: f64,
    p1: f64,
    p2: f64,
    fluid: &FluidState,
) -> f64 {
    let supply_t = fluid.temperature();

    if fluid.phase() == Phase::Gas && p1 > 0.0 {
        let pressure_ratio = p2 / p1;
        let gamma = fluid.adiabatic_index();
        if pressure_ratio > f64::EPSILON && gamma > f64::EPSILON {
            let final_t = supply_t * pressure_ratio.powf((gamma - 1.0) / gamma);
            return supply_t + expansion_scale_factor * (final_t - supply_t);
        }
    }

    supply_t
}

/// Fluid capacitance (kgmol/kPa) of `volume` m3 of the given fluid: the
/// moles required to raise the pressure by 1 kPa at fixed temperature.
///
/// `c = (V/MW) * (del-rho / del-P)`, with density perturbed +/-0.1 % about
/// the current pressure. A pathological negative result is clamped to zero
/// because negative capacitance blows up the network solution.
pub fn compute_capacitance(fluid: &FluidState, volume: f64) -> f64 {
    let p = fluid.pressure().max(f32::EPSILON as f64);
    let p1 = p * 0.999;
    let p2 = p * 1.001;

    let mw = fluid.molar_mass();
    if mw <= f64::EPSILON {
        return 0.0;
    }

    let capacitance = (fluid.compute_density(fluid.temperature(), p2)
        - fluid.compute_density(fluid.temperature(), p1))
        * volume
        / (mw * (p2 - p1));

    capacitance.max(0.0)
}
