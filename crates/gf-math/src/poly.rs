//! Real polynomial evaluation and root localization.

use crate::brent::brent_solve;
use crate::error::{MathError, MathResult};
use crate::laguerre::laguerre_improve;
use num_complex::Complex64;

/// A real polynomial with coefficients in ascending order of power
/// (`coeffs[0]` is the constant term).
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    /// Create a polynomial from ascending-power coefficients.
    pub fn new(coeffs: Vec<f64>) -> MathResult<Self> {
        if coeffs.len() < 2 {
            return Err(MathError::InvalidArg {
                what: "polynomial must have order >= 1",
            });
        }
        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(MathError::InvalidArg {
                what: "polynomial coefficients must be finite",
            });
        }
        Ok(Self { coeffs })
    }

    /// Coefficients in ascending order of power.
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// Evaluate at `x` by Horner's rule.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * x + c)
    }

    /// Improve a real root estimate, constrained to `[0, upper]`.
    ///
    /// Starts with Laguerre's method from `guess`. If Laguerre wanders onto a
    /// complex root or a real root outside the allowed interval, falls back to
    /// Brent's method between 0 and `upper`, which requires the polynomial to
    /// change sign over that interval.
    ///
    /// Returns the improved root and the number of iterations spent in the
    /// method that produced it.
    pub fn improve_root(&self, guess: f64, upper: f64) -> MathResult<(f64, usize)> {
        if !(upper > 0.0) {
            return Err(MathError::InvalidArg {
                what: "root search upper bound must be positive",
            });
        }

        let complex_coeffs: Vec<Complex64> = self
            .coeffs
            .iter()
            .map(|&c| Complex64::new(c, 0.0))
            .collect();

        let mut x = Complex64::new(guess.clamp(0.0, upper), 0.0);
        if let Ok(iters) = laguerre_improve(&mut x, &complex_coeffs) {
            let imag_ok = x.im.abs() <= 1e-9 * (x.re.abs() + f64::EPSILON);
            if imag_ok && x.re >= 0.0 && x.re <= upper {
                return Ok((x.re, iters));
            }
        }

        // Laguerre left the allowed interval or found a complex root; bracket
        // the real root between 0 and the upper bound instead.
        let tol = 1e-9 * upper.max(1.0);
        brent_solve(|q| self.evaluate(q), 0.0, upper, tol)
    }
}
