//! Brent's method for finding zeroes of a scalar function.

use crate::error::{MathError, MathResult};

/// Maximum allowed number of iterations.
const MAX_ITERATIONS: usize = 100;

/// Uses Brent's method to return a zero of `f` known to lie between `x1` and
/// `x2`, refined until its accuracy is within `tol`.
///
/// Combines bisection with inverse quadratic interpolation, falling back to
/// bisection whenever the interpolated step would leave the bracket or shrink
/// it too slowly.
///
/// Returns the root and the number of iterations taken. Fails if the root is
/// not bracketed by `x1` and `x2`, or if the iteration limit is reached.
pub fn brent_solve<F>(f: F, x1: f64, x2: f64, tol: f64) -> MathResult<(f64, usize)>
where
    F: Fn(f64) -> f64,
{
    let mut fa = f(x1);
    let mut fb = f(x2);

    if (fa > 0.0 && fb > 0.0) || (fa < 0.0 && fb < 0.0) {
        return Err(MathError::NotBracketed {
            what: "zero of function not bracketed by x1 & x2",
        });
    }

    let mut a = x1;
    let mut b = x2;
    let mut c = x2;
    let mut d = 0.0_f64;
    let mut e = 0.0_f64;
    let mut fc = fb;

    for iter in 1..=MAX_ITERATIONS {
        if (fb > 0.0 && fc > 0.0) || (fb < 0.0 && fc < 0.0) {
            // Rename a, b, c and adjust bounding interval d.
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        // Convergence check.
        let tol1 = 2.0 * f64::EPSILON * b.abs() + 0.5 * tol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0.0 {
            return Ok((b, iter));
        }

        // Attempt inverse quadratic interpolation.
        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            let s = fb / fa;
            let (mut p, mut q);
            if a == c {
                p = 2.0 * xm * s;
                q = 1.0 - s;
            } else {
                q = fa / fc;
                let r = fb / fc;
                p = s * (2.0 * xm * q * (q - r) - (b - a) * (r - 1.0));
                q = (q - 1.0) * (r - 1.0) * (s - 1.0);
            }

            // Check whether in bounds.
            if p > 0.0 {
                q = -q;
            }
            p = p.abs();
            let min1 = 3.0 * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();

            if 2.0 * p < min1.min(min2) {
                // Accept interpolation.
                e = d;
                d = p / q;
            } else {
                // Interpolation failed, use bisection.
                d = xm;
                e = d;
            }
        } else {
            // Bounds decreasing too slowly, use bisection.
            d = xm;
            e = d;
        }

        // Move last best guess to a, then evaluate the new trial root.
        a = b;
        fa = fb;
        if d.abs() > tol1 {
            b += d;
        } else {
            b += if xm >= 0.0 { tol1 } else { -tol1 };
        }
        fb = f(b);
    }

    Err(MathError::ConvergenceFailed {
        what: "could not find a zero of the function",
        iterations: MAX_ITERATIONS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_root_of_cubic() {
        // f(x) = x^3 - 2x - 5 has a root near 2.0945514815423265.
        let f = |x: f64| x * x * x - 2.0 * x - 5.0;
        let (root, iters) = brent_solve(f, 1.0, 3.0, 1e-12).unwrap();
        assert!((root - 2.0945514815423265).abs() < 1e-9);
        assert!(iters <= 20);
    }

    #[test]
    fn finds_root_of_transcendental() {
        // cos(x) = x near 0.7390851332151607.
        let f = |x: f64| x.cos() - x;
        let (root, _) = brent_solve(f, 0.0, 1.0, 1e-12).unwrap();
        assert!((root - 0.7390851332151607).abs() < 1e-9);
    }

    #[test]
    fn rejects_unbracketed_interval() {
        let f = |x: f64| x * x + 1.0;
        let err = brent_solve(f, -1.0, 1.0, 1e-12).unwrap_err();
        assert!(matches!(err, MathError::NotBracketed { .. }));
    }

    #[test]
    fn exact_root_at_endpoint() {
        let f = |x: f64| x;
        let (root, _) = brent_solve(f, -1.0, 1.0, 1e-14).unwrap();
        assert!(root.abs() < 1e-12);
    }
}
