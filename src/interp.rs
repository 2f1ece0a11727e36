//! Interpolation and quadrature primitives shared by the slant-path and
//! modulation integrators.

use crate::error::TransitError;

/// Index of the bin containing `x`: the largest `i` with `v[i] <= x`,
/// clamped to `[0, v.len()-2]` so the result always names a valid bin.
/// Assumes `v` ascending.
pub fn bin_search(v: &[f64], x: f64) -> usize {
    let n = v.len();
    if n < 2 || x <= v[0] {
        return 0;
    }
    if x >= v[n - 1] {
        return n - 2;
    }
    let mut lo = 0;
    let mut hi = n - 1;
    while hi - lo > 1 {
        let mid = (lo + hi) / 2;
        if v[mid] <= x {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Linear interpolation of `y` at `xi` over the ascending grid `x`.
/// Extrapolates linearly from the edge bins.
pub fn interp_linear(x: &[f64], y: &[f64], xi: f64) -> f64 {
    let i = bin_search(x, xi);
    let t = (xi - x[i]) / (x[i + 1] - x[i]);
    y[i] + t * (y[i + 1] - y[i])
}

/// Three-point parabolic (Lagrange) interpolation of `y` at `xi`.
/// `x` and `y` must hold exactly three samples with distinct abscissae.
pub fn interp_parab(x: &[f64], y: &[f64], xi: f64) -> f64 {
    ((xi - x[1]) * (xi - x[2]) * y[0]) / ((x[0] - x[1]) * (x[0] - x[2]))
        + ((xi - x[0]) * (xi - x[2]) * y[1]) / ((x[1] - x[0]) * (x[1] - x[2]))
        + ((xi - x[0]) * (xi - x[1]) * y[2]) / ((x[2] - x[0]) * (x[2] - x[1]))
}

/// Trapezoid/Simpson quadrature over an equispaced grid with spacing `h`.
///
/// Simpson's rule over pairs of intervals where possible; an even point
/// count leaves one interval over, handled by a trapezoid. Used where a
/// spline has too few knots to be built.
pub fn integ_trapz(h: f64, y: &[f64]) -> f64 {
    let n = y.len();
    match n {
        0 | 1 => 0.0,
        2 => h * (y[0] + y[1]) / 2.0,
        _ => {
            // Largest odd point count covered by Simpson pairs.
            let m = if n % 2 == 1 { n } else { n - 1 };
            let mut res = y[0] + y[m - 1];
            for (k, yk) in y.iter().enumerate().take(m - 1).skip(1) {
                res += if k % 2 == 1 { 4.0 * yk } else { 2.0 * yk };
            }
            res *= h / 3.0;
            if m < n {
                res += h * (y[n - 2] + y[n - 1]) / 2.0;
            }
            res
        }
    }
}

/// Natural cubic spline over a strictly increasing, possibly non-uniform
/// grid. Only the definite integral over the full grid is needed by the
/// transit computation; evaluation is exposed for tests and the bent-path
/// integrand.
#[derive(Debug)]
pub struct CubicSpline {
    x: Vec<f64>,
    y: Vec<f64>,
    /// Second derivatives at the knots; zero at both ends.
    d2: Vec<f64>,
}

impl CubicSpline {
    /// Fit a natural cubic spline. Needs at least three knots.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, TransitError> {
        let n = x.len();
        if n < 3 || y.len() != n {
            return Err(TransitError::TooFewPoints {
                have: n.min(y.len()),
                need: 3,
            });
        }

        // Thomas solve of the tridiagonal system for the interior second
        // derivatives, natural boundary conditions at both ends.
        let mut d2 = vec![0.0; n];
        let mut c = vec![0.0; n];
        let mut rhs = vec![0.0; n];
        for i in 1..n - 1 {
            let h0 = x[i] - x[i - 1];
            let h1 = x[i + 1] - x[i];
            let diag = 2.0 * (h0 + h1) - h0 * c[i - 1];
            c[i] = h1 / diag;
            let r = 6.0 * ((y[i + 1] - y[i]) / h1 - (y[i] - y[i - 1]) / h0);
            rhs[i] = (r - h0 * rhs[i - 1]) / diag;
        }
        for i in (1..n - 1).rev() {
            d2[i] = rhs[i] - c[i] * d2[i + 1];
        }

        Ok(CubicSpline { x, y, d2 })
    }

    /// Spline value at `xi` (clamped to the edge segments).
    pub fn eval(&self, xi: f64) -> f64 {
        let i = bin_search(&self.x, xi);
        let h = self.x[i + 1] - self.x[i];
        let a = (self.x[i + 1] - xi) / h;
        let b = (xi - self.x[i]) / h;
        a * self.y[i]
            + b * self.y[i + 1]
            + ((a * a * a - a) * self.d2[i] + (b * b * b - b) * self.d2[i + 1]) * h * h / 6.0
    }

    /// Definite integral over the full knot range. Per segment of width `h`:
    /// `h/2 (y_i + y_{i+1}) - h^3/24 (y''_i + y''_{i+1})`.
    pub fn integral(&self) -> f64 {
        let mut res = 0.0;
        for i in 0..self.x.len() - 1 {
            let h = self.x[i + 1] - self.x[i];
            res += h * (self.y[i] + self.y[i + 1]) / 2.0
                - h * h * h * (self.d2[i] + self.d2[i + 1]) / 24.0;
        }
        res
    }
}
