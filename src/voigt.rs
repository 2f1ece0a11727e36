//! Voigt line-shape synthesis.
//!
//! A single spectral line's footprint is the convolution of a Doppler
//! (Gaussian) and a pressure-broadening (Lorentzian) kernel, evaluated here
//! through the complex Faddeeva function `w(z)` with the Humlíček w4
//! rational approximation (relative accuracy ~1e-4 across the plane).

use num_complex::Complex64;

use std::f64::consts::{LN_2, PI};

/// Faddeeva function `w(z) = exp(-z^2) erfc(-iz)` for `Im(z) >= 0`,
/// Humlíček (1982) four-region rational approximation.
pub fn faddeeva(z: Complex64) -> Complex64 {
    let t = Complex64::new(z.im, -z.re);
    let s = z.re.abs() + z.im;

    if s >= 15.0 {
        // Region I: one-term asymptotic.
        t * 0.5641896 / (0.5 + t * t)
    } else if s >= 5.5 {
        // Region II: two-term asymptotic.
        let u = t * t;
        t * (1.410474 + u * 0.5641896) / (0.75 + u * (3.0 + u))
    } else if z.im >= 0.195 * z.re.abs() - 0.176 {
        // Region III: rational approximation.
        (16.4955 + t * (20.20933 + t * (11.96482 + t * (3.778987 + t * 0.5642236))))
            / (16.4955 + t * (38.82363 + t * (39.27121 + t * (21.69274 + t * (6.699398 + t)))))
    } else {
        // Region IV: near the real axis.
        let u = t * t;
        let num = t
            * (36183.31
                - u * (3321.9905
                    - u * (1540.787
                        - u * (219.0313 - u * (35.76683 - u * (1.320522 - u * 0.56419))))));
        let den = 32066.6
            - u * (24322.84
                - u * (9022.228
                    - u * (2186.181 - u * (364.2191 - u * (61.57037 - u * (1.841439 - u))))));
        u.exp() - num / den
    }
}

/// Voigt function at displacement `x` from the line center, for Lorentz
/// half-width `alpha_l` and Doppler half-width `alpha_d` (both HWHM, same
/// units as `x`). Normalized to unit area over the full line.
pub fn voigt(x: f64, alpha_l: f64, alpha_d: f64) -> f64 {
    let sqrt_ln2 = LN_2.sqrt();
    let z = Complex64::new(x, alpha_l) * (sqrt_ln2 / alpha_d);
    (LN_2 / PI).sqrt() / alpha_d * faddeeva(z).re
}

/// Synthesize a symmetric line profile over `nbins` samples (forced odd so
/// the center lands on a sample) spaced `dwn` apart, centered at index
/// `nbins/2`.
pub fn voigt_profile(nbins: usize, dwn: f64, alpha_l: f64, alpha_d: f64) -> Vec<f64> {
    let nbins = if nbins % 2 == 0 { nbins + 1 } else { nbins };
    let center = (nbins / 2) as isize;
    (0..nbins as isize)
        .map(|k| voigt((k - center) as f64 * dwn, alpha_l, alpha_d))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::integ_trapz;
    use approx::assert_relative_eq;

    #[test]
    fn profile_is_symmetric_about_center() {
        let p = voigt_profile(201, 0.05, 0.3, 0.2);
        assert_eq!(p.len(), 201);
        let c = p.len() / 2;
        for k in 1..=c {
            assert_relative_eq!(p[c - k], p[c + k], max_relative = 1e-12);
        }
        // Peak at the center.
        assert!(p[c] > p[c - 1] && p[c] > p[c + 1]);
    }

    #[test]
    fn even_bin_count_is_widened_to_odd() {
        let p = voigt_profile(200, 0.05, 0.3, 0.2);
        assert_eq!(p.len(), 201);
    }

    #[test]
    fn profile_has_unit_area() {
        // Wide grid relative to the widths so the wings are captured.
        let dwn = 0.02;
        let p = voigt_profile(20001, dwn, 0.1, 0.1);
        let area = integ_trapz(dwn, &p);
        assert_relative_eq!(area, 1.0, max_relative = 1e-3);
    }

    #[test]
    fn gaussian_limit() {
        // alpha_l -> 0 reduces to the Doppler kernel.
        let alpha_d = 0.7;
        let norm = (std::f64::consts::LN_2 / std::f64::consts::PI).sqrt() / alpha_d;
        for x in [0.0, 0.35, 0.7, 1.4] {
            let expect = norm * (-std::f64::consts::LN_2 * (x / alpha_d).powi(2)).exp();
            assert_relative_eq!(voigt(x, 0.0, alpha_d), expect, max_relative = 5e-4);
        }
    }

    #[test]
    fn faddeeva_at_origin() {
        // w(0) = 1.
        let w = faddeeva(Complex64::new(0.0, 0.0));
        assert_relative_eq!(w.re, 1.0, max_relative = 1e-3);
        assert_relative_eq!(w.im, 0.0, epsilon = 1e-6);
    }
}
