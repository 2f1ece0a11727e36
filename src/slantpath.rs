//! Ray solutions: optical depth along a slant path at a given impact
//! parameter, and the per-wavenumber in-transit/out-of-transit modulation
//! derived from a finished optical-depth row.
//!
//! Radii, impact parameters, and extinction enter in the radius axis' own
//! units; the returned optical depth must be multiplied by that axis' units
//! factor to be physical. The modulation routines work in cm throughout.

use log::warn;
use smallvec::{smallvec, SmallVec};

use crate::error::TransitError;
use crate::geometry::Geometry;
use crate::interp::{bin_search, integ_trapz, interp_linear, interp_parab, CubicSpline};
use crate::sample::SamplingAxis;

/// Fixed-point iteration cap for the bent-ray closest approach.
const MAX_TANGENT_ITERATIONS: usize = 50;

/// How a ray is traced through the atmosphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaySolution {
    /// Constant index of refraction, no bending.
    Straight,
    /// Radially varying index of refraction bends the ray.
    Bent,
}

impl RaySolution {
    /// Look a solution up by name.
    pub fn from_name(name: &str) -> Result<Self, TransitError> {
        match name {
            "straight" => Ok(RaySolution::Straight),
            "bent" => Ok(RaySolution::Bent),
            _ => Err(TransitError::UnknownSolution(name.to_owned())),
        }
    }

    /// Canonical name of the solution.
    pub fn name(&self) -> &'static str {
        match self {
            RaySolution::Straight => "straight",
            RaySolution::Bent => "bent",
        }
    }

    /// Optical depth at impact parameter `b`, divided by the radius units.
    ///
    /// `rad`, `refr`, and `ex` run from the deepest layer of interest to the
    /// outermost one; the straight solution uses `refr[0]` as the constant
    /// index of refraction. A tangent radius beyond the outermost layer
    /// yields zero; below the deepest layer it is fatal.
    pub fn optical_depth(
        &self,
        b: f64,
        rad: &[f64],
        refr: &[f64],
        ex: &[f64],
    ) -> Result<f64, TransitError> {
        if rad.len() < 2 || refr.len() != rad.len() || ex.len() != rad.len() {
            return Err(TransitError::InconsistentInputs);
        }
        match self {
            RaySolution::Straight => straight_tau(b, rad, refr[0], ex),
            RaySolution::Bent => bent_tau(b, rad, refr, ex),
        }
    }

    /// Per-wavenumber observable from a finished optical-depth row.
    ///
    /// `tau` is indexed in traversal order (entry 0 is the outermost impact
    /// parameter, `ip.v[ip.len()-1]`); `last` is the traversal index of the
    /// deepest computed layer. Level `1` is the full modulation integral,
    /// level `-1` the opaque-disk approximation at the radius where `tau`
    /// crosses `toomuch`.
    pub fn observable(
        &self,
        tau: &[f64],
        last: usize,
        toomuch: f64,
        ip: &SamplingAxis,
        geom: &Geometry,
        level: i32,
    ) -> Result<f64, TransitError> {
        match level {
            1 => modulation1(tau, last, toomuch, ip, geom),
            -1 => modulationm1(tau, last, toomuch, ip, geom),
            _ => Err(TransitError::UnknownLevel(level)),
        }
    }
}

/// Optical depth for a non-bending ray.
///
/// The integrand is the extinction as a function of the distance `s` along
/// the half-chord, with `s = sqrt(r^2 - r0^2)` and `r0 = b/n` the closest
/// approach. The extinction at `r0` itself comes from a parabolic
/// interpolation; when only two layers remain above the tangent point a
/// midpoint is synthesized so the spline quadrature has three knots.
fn straight_tau(b: f64, rad: &[f64], refr: f64, ex: &[f64]) -> Result<f64, TransitError> {
    let nrad = rad.len();
    let r0 = b / refr;

    if r0 > rad[nrad - 1] {
        // Grazing above the outermost layer.
        return Ok(0.0);
    }
    if r0 < rad[0] {
        return Err(TransitError::TangentOutsideGrid {
            r0,
            range: (rad[0], rad[nrad - 1]),
        });
    }

    let rs = bin_search(rad, r0);

    // Scratch knots from the tangent point outward, first entry replaced by
    // the tangent radius and the interpolated extinction there.
    let mut rr: SmallVec<[f64; 32]> = SmallVec::from_slice(&rad[rs..]);
    let mut ee: SmallVec<[f64; 32]> = SmallVec::from_slice(&ex[rs..]);
    rr[0] = r0;
    if rr.len() == 2 {
        ee[0] = interp_linear(&rad[rs..rs + 2], &ex[rs..rs + 2], r0);
        // Synthesize a midpoint so the spline has three knots.
        rr.insert(1, (rr[0] + rr[1]) / 2.0);
        ee.insert(1, (ee[0] + ee[1]) / 2.0);
    } else {
        ee[0] = interp_parab(&rad[rs..rs + 3], &ex[rs..rs + 3], r0);
    }

    // Distance along the half-chord.
    let mut s: SmallVec<[f64; 32]> = smallvec![0.0; rr.len()];
    for (si, &ri) in s.iter_mut().zip(rr.iter()).skip(1) {
        *si = ((ri - r0) * (ri + r0)).sqrt();
    }

    let spl = CubicSpline::new(s.to_vec(), ee.to_vec())?;
    Ok(2.0 * spl.integral())
}

/// Optical depth for a ray bent by a varying index of refraction.
///
/// The closest approach solves `r0 = b/n(r0)` by fixed-point iteration. The
/// segment next to the tangent point is handled analytically with the
/// extinction linearized there, since the integrand
/// `ex / sqrt(1 - (b/(n r))^2)` diverges at `r0`; the rest integrates
/// numerically over radius.
fn bent_tau(b: f64, rad: &[f64], refr: &[f64], ex: &[f64]) -> Result<f64, TransitError> {
    warn!("the bent-ray solution has not been thoroughly validated, be critical of the result");

    let nrad = rad.len();
    let mut r0a = b;
    let mut r0;
    let mut iterations = 0;
    loop {
        r0 = b / interp_linear(rad, refr, r0a);
        if r0 == r0a {
            break;
        }
        iterations += 1;
        if iterations > MAX_TANGENT_ITERATIONS {
            return Err(TransitError::ConvergenceFailure {
                iterations: MAX_TANGENT_ITERATIONS,
            });
        }
        r0a = r0;
    }

    if r0 > rad[nrad - 1] {
        return Ok(0.0);
    }
    if r0 < rad[0] {
        return Err(TransitError::TangentOutsideGrid {
            r0,
            range: (rad[0], rad[nrad - 1]),
        });
    }

    // First knot strictly above the tangent point.
    let rs = bin_search(rad, r0) + 1;
    let rm = rad[rs];

    // Analytic segment over [r0, rm].
    let mut res = if ex[rs - 1] == ex[rs] {
        ex[rs] * r0 * (rm * rm / (r0 * r0) - 1.0).sqrt()
    } else {
        let alpha = (ex[rs] - ex[rs - 1]) / (rm - rad[rs - 1]);
        let sq = (rm * rm - r0 * r0).sqrt();
        let lg = ((rm * rm / (r0 * r0) - 1.0).sqrt() + rm / r0).ln();
        if alpha < 0.0 {
            -alpha * (rm * sq - r0 * r0 * lg) / 2.0
        } else {
            alpha * (rm * sq + r0 * r0 * lg) / 2.0
        }
    };

    // Numerical remainder over [rm, rad[nrad-1]].
    let m = nrad - rs;
    let mut dt: SmallVec<[f64; 32]> = smallvec![0.0; m];
    for i in 0..m {
        let c = b / (refr[rs + i] * rad[rs + i]);
        if c > 1.0 {
            return Err(TransitError::InconsistentInputs);
        }
        dt[i] = ex[rs + i] / (1.0 - c * c).sqrt();
    }
    if m > 2 {
        res += CubicSpline::new(rad[rs..].to_vec(), dt.to_vec())?.integral();
    } else if m == 2 {
        res += integ_trapz(rad[rs + 1] - rad[rs], &dt);
    }

    Ok(2.0 * res)
}

/// Full modulation integral, no limb darkening and no planetary emission:
/// `M = (b_out^2 - 2 int exp(-tau) b db) / R*^2`, with the disk inside the
/// deepest computed layer treated as opaque unless the geometry says the
/// planet stays transparent at the optical-depth ceiling.
fn modulation1(
    tau: &[f64],
    last: usize,
    toomuch: f64,
    ip: &SamplingAxis,
    geom: &Geometry,
) -> Result<f64, TransitError> {
    let ipn1 = ip.len() - 1;
    let srad = geom.star_rad;
    let maxtau = tau[last].max(toomuch);

    // Knots in ascending impact parameter; traversal index k maps to the
    // ascending position nk-1-k. One opaque layer is appended below the
    // deepest computed one to give the spline a clean ending, when a deeper
    // grid point exists to put it on.
    let mut nk = last + 1;
    if last < ipn1 {
        nk += 1;
    }
    if nk < 3 {
        return Err(TransitError::TooFewPoints { have: nk, need: 3 });
    }

    let mut bx = vec![0.0; nk];
    let mut by = vec![0.0; nk];
    for (p, (x, y)) in bx.iter_mut().zip(by.iter_mut()).enumerate() {
        let k = nk - 1 - p;
        let bv = ip.v[ipn1 - k] * ip.fct;
        *x = bv;
        *y = if k > last { 0.0 } else { (-tau[k]).exp() * bv };
    }

    let b_in = bx[0];
    let b_out = bx[nk - 1];
    let integ = CubicSpline::new(bx, by)?.integral();

    let mut res = b_out * b_out - 2.0 * integ;
    if geom.transparent {
        res -= (-maxtau).exp() * b_in * b_in;
    }
    Ok(res / (srad * srad))
}

/// Opaque-disk modulation: the planet radius is where the optical depth
/// crosses the ceiling, found by linear interpolation between the two
/// bracketing layers. Fails when the ceiling was never reached.
fn modulationm1(
    tau: &[f64],
    last: usize,
    toomuch: f64,
    ip: &SamplingAxis,
    geom: &Geometry,
) -> Result<f64, TransitError> {
    if tau[last] < toomuch {
        return Err(TransitError::CeilingNotReached { max_tau: tau[last] });
    }

    let ipn1 = ip.len() - 1;
    let srad = geom.star_rad;
    let muchrad = if last == 0 {
        // Already opaque at the outermost layer.
        ip.v[ipn1] * ip.fct
    } else {
        let (t0, t1) = (tau[last - 1], tau[last]);
        let b0 = ip.v[ipn1 - (last - 1)] * ip.fct;
        let b1 = ip.v[ipn1 - last] * ip.fct;
        b0 + (toomuch - t0) * (b1 - b0) / (t1 - t0)
    };

    Ok(muchrad * muchrad / (srad * srad))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform_grid(n: usize) -> Vec<f64> {
        (0..n).map(|k| 1.0 + k as f64).collect()
    }

    #[test]
    fn solution_lookup() {
        assert_eq!(RaySolution::from_name("straight"), Ok(RaySolution::Straight));
        assert_eq!(RaySolution::from_name("bent"), Ok(RaySolution::Bent));
        assert!(matches!(
            RaySolution::from_name("curved"),
            Err(TransitError::UnknownSolution(_))
        ));
    }

    #[test]
    fn straight_constant_extinction_is_analytic() {
        // tau(b) = 2 a sqrt(R^2 - b^2) for constant extinction a.
        let rad = uniform_grid(100);
        let big_r = rad[99];
        let refr = vec![1.0; 100];
        let ex = vec![1.0; 100];

        for b in [big_r - 1.0, 0.75 * big_r, (rad[0] + big_r) / 2.0, rad[0]] {
            let tau = RaySolution::Straight
                .optical_depth(b, &rad, &refr, &ex)
                .unwrap();
            let expect = 2.0 * (big_r * big_r - b * b).sqrt();
            assert_relative_eq!(tau, expect, max_relative = 1e-4);
        }
    }

    #[test]
    fn straight_linear_extinction_is_analytic() {
        // ex(r) = c r along s = sqrt(r^2 - r0^2):
        // tau = c (S R + r0^2 ln((S + R)/r0)), S = sqrt(R^2 - r0^2).
        let rad = uniform_grid(100);
        let big_r = rad[99];
        let refr = vec![1.0; 100];
        let c = 0.01;
        let ex: Vec<f64> = rad.iter().map(|&r| c * r).collect();

        let b = 50.0;
        let s = (big_r * big_r - b * b).sqrt();
        let expect = c * (s * big_r + b * b * ((s + big_r) / b).ln());
        let tau = RaySolution::Straight
            .optical_depth(b, &rad, &refr, &ex)
            .unwrap();
        assert_relative_eq!(tau, expect, max_relative = 1e-4);

        // Inward-increasing counterpart, ex(r) = c (R - r).
        let ex: Vec<f64> = rad.iter().map(|&r| c * (big_r - r)).collect();
        let expect = c * (s * big_r - b * b * ((s + big_r) / b).ln());
        let tau = RaySolution::Straight
            .optical_depth(b, &rad, &refr, &ex)
            .unwrap();
        assert_relative_eq!(tau, expect, max_relative = 1e-4);
    }

    #[test]
    fn straight_above_outermost_is_transparent() {
        let rad = uniform_grid(10);
        let refr = vec![1.0; 10];
        let ex = vec![1.0; 10];
        let tau = RaySolution::Straight
            .optical_depth(20.0, &rad, &refr, &ex)
            .unwrap();
        assert_eq!(tau, 0.0);
    }

    #[test]
    fn straight_below_grid_is_fatal() {
        let rad = uniform_grid(10);
        let refr = vec![1.0; 10];
        let ex = vec![1.0; 10];
        let err = RaySolution::Straight
            .optical_depth(0.5, &rad, &refr, &ex)
            .unwrap_err();
        assert!(matches!(err, TransitError::TangentOutsideGrid { .. }));
    }

    #[test]
    fn bent_reduces_to_straight_for_unity_refraction() {
        let rad = uniform_grid(100);
        let big_r = rad[99];
        let refr = vec![1.0; 100];
        let ex = vec![1.0; 100];
        let b = 60.0;
        let tau = RaySolution::Bent.optical_depth(b, &rad, &refr, &ex).unwrap();
        assert_relative_eq!(
            tau,
            2.0 * (big_r * big_r - b * b).sqrt(),
            max_relative = 1e-3
        );
    }

    #[test]
    fn modulation_of_constant_tau_is_closed_form() {
        // All layers computed at the same depth p with a transparent planet:
        // M = (b1^2 - e^-p (b1^2 - b0^2) - e^-toomuch b0^2) / R*^2.
        let ip = SamplingAxis::equispaced(1.0, 1.0, 20, 1.0);
        let mut geom = Geometry::centered(100.0);
        geom.transparent = true;
        let p = 2.0;
        let toomuch = 50.0;
        let tau = vec![p; 20];

        let m = RaySolution::Straight
            .observable(&tau, 19, toomuch, &ip, &geom, 1)
            .unwrap();
        let (b0, b1) = (1.0, 20.0);
        let expect = (b1 * b1
            - (-p).exp() * (b1 * b1 - b0 * b0)
            - (-toomuch).exp() * b0 * b0)
            / (100.0 * 100.0);
        assert_relative_eq!(m, expect, max_relative = 1e-10);
    }

    #[test]
    fn opaque_disk_modulation_interpolates_the_crossing() {
        let ip = SamplingAxis::equispaced(1.0, 1.0, 10, 1.0);
        let geom = Geometry::centered(100.0);
        // tau crosses 50 exactly halfway between traversal layers 3 and 4,
        // i.e. between b = 7 and b = 6.
        let tau = vec![10.0, 20.0, 30.0, 40.0, 60.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let m = RaySolution::Straight
            .observable(&tau, 4, 50.0, &ip, &geom, -1)
            .unwrap();
        let muchrad = 6.5;
        assert_relative_eq!(m, muchrad * muchrad / 1e4, max_relative = 1e-12);
    }

    #[test]
    fn opaque_disk_needs_the_ceiling_reached() {
        let ip = SamplingAxis::equispaced(1.0, 1.0, 10, 1.0);
        let geom = Geometry::centered(100.0);
        let tau = vec![1.0; 10];
        let err = RaySolution::Straight
            .observable(&tau, 9, 50.0, &ip, &geom, -1)
            .unwrap_err();
        assert!(matches!(err, TransitError::CeilingNotReached { .. }));
    }

    #[test]
    fn unknown_observable_level_is_rejected() {
        let ip = SamplingAxis::equispaced(1.0, 1.0, 10, 1.0);
        let geom = Geometry::centered(100.0);
        let tau = vec![1.0; 10];
        let err = RaySolution::Straight
            .observable(&tau, 9, 50.0, &ip, &geom, 3)
            .unwrap_err();
        assert_eq!(err, TransitError::UnknownLevel(3));
    }
}
