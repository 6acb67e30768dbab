//! Laguerre's method for finding zeroes of polynomial functions.

use crate::error::{MathError, MathResult};
use num_complex::Complex64;

/// Maximum limit cycles.
const MR: usize = 8;
/// Maximum iterations per limit cycle.
const MT: usize = 10;
/// Total maximum allowed iterations.
const MAX_ITERATIONS: usize = MR * MT;

/// Fractional step sizes used to break limit cycles.
const FRAC: [f64; MR + 1] = [0.0, 0.5, 0.25, 0.75, 0.13, 0.38, 0.62, 0.88, 1.0];

/// Improves a given estimate `x` of a complex root of the polynomial with the
/// given complex coefficients, `coeffs[0]` being the constant term.
///
/// Laguerre's method converges cubically near simple roots and is nearly
/// global for polynomials, which makes it a good first choice before falling
/// back to a bracketing method. Returns the number of iterations taken.
pub fn laguerre_improve(x: &mut Complex64, coeffs: &[Complex64]) -> MathResult<usize> {
    if coeffs.len() < 2 {
        return Err(MathError::InvalidArg {
            what: "polynomial must have order >= 1",
        });
    }
    let m = coeffs.len() - 1;

    for iter in 1..=MAX_ITERATIONS {
        let mut f = Complex64::new(0.0, 0.0);
        let mut d = Complex64::new(0.0, 0.0);
        let mut b = coeffs[m];
        let mut err = b.norm();
        let abx = x.norm();

        // Efficient computation of the polynomial and its first two
        // derivatives.  f stores P''/2.
        for j in (0..m).rev() {
            f = *x * f + d;
            d = *x * d + b;
            b = *x * b + coeffs[j];
            err = b.norm() + abx * err;
        }
        err *= f64::EPSILON;

        // Estimate of roundoff error in evaluating polynomial.
        if b.norm() <= err {
            return Ok(iter); // we are on the root
        }

        // Use Laguerre's formula to improve the root.
        let g = d / b;
        let g2 = g * g;
        let h = g2 - 2.0 * f / b;
        let sq = ((m as f64 - 1.0) * (m as f64 * h - g2)).sqrt();
        let gp = g + sq;
        let gm = g - sq;
        let abp = gp.norm();
        let abm = gm.norm();
        let denom = if abp < abm { gm } else { gp };
        let dx = if abp.max(abm) > 0.0 {
            Complex64::new(m as f64, 0.0) / denom
        } else {
            Complex64::from_polar(1.0 + abx, iter as f64)
        };
        let x1 = *x - dx;
        if *x == x1 {
            return Ok(iter); // converged
        }

        // Every so often we take a fractional step to break any limit cycle
        // (a rare occurrence).
        if iter % MT != 0 {
            *x = x1;
        } else {
            *x -= FRAC[iter / MT] * dx;
        }
    }

    Err(MathError::ConvergenceFailed {
        what: "could not find a zero of the polynomial",
        iterations: MAX_ITERATIONS,
    })
}
