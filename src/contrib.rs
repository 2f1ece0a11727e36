//! Additive extinction contributors beyond the line-by-line field: CIA,
//! clouds, and scattering. Each fills a per-radius extinction vector for one
//! wavenumber; the tau driver sums them on top of the line field.

use crate::error::TransitError;
use crate::sample::SamplingAxis;

/// An additive per-radius extinction source evaluated at one wavenumber
/// (`wn` in cm-1, temperatures in K, output in cm-1 per radius level).
pub trait ExtinctionContributor {
    /// Fill `out` (length of the radius axis) with this source's extinction.
    fn compute(
        &self,
        out: &mut [f64],
        rad: &SamplingAxis,
        temp: &[f64],
        wn: f64,
    ) -> Result<(), TransitError>;
}

/// Collision-induced absorption with zero configured pairs.
#[derive(Debug, Clone, Copy)]
pub struct NoCia;

impl ExtinctionContributor for NoCia {
    fn compute(
        &self,
        out: &mut [f64],
        _rad: &SamplingAxis,
        _temp: &[f64],
        _wn: f64,
    ) -> Result<(), TransitError> {
        out.fill(0.0);
        Ok(())
    }
}

/// Scattering extinction. Not modeled: contributes zeros.
#[derive(Debug, Clone, Copy)]
pub struct Scattering;

impl ExtinctionContributor for Scattering {
    fn compute(
        &self,
        out: &mut [f64],
        _rad: &SamplingAxis,
        _temp: &[f64],
        _wn: f64,
    ) -> Result<(), TransitError> {
        out.fill(0.0);
        Ok(())
    }
}

/// Grey cloud deck: zero extinction above the top radius, a linear ramp up
/// to `maxe` between the top and the full-opacity radius, and constant
/// `maxe` below that.
#[derive(Debug, Clone, Copy)]
pub struct CloudDeck {
    /// Cloud top radius, in units of `rfct` cm. Zero disables the deck.
    pub top: f64,
    /// Radius where the ramp reaches `maxe`, below `top`.
    pub full: f64,
    /// Maximum cloud extinction (cm-1).
    pub maxe: f64,
    /// Radius units factor to cm; zero defers to the radius axis factor.
    pub rfct: f64,
}

impl ExtinctionContributor for CloudDeck {
    fn compute(
        &self,
        out: &mut [f64],
        rad: &SamplingAxis,
        _temp: &[f64],
        _wn: f64,
    ) -> Result<(), TransitError> {
        if self.top == 0.0 {
            out.fill(0.0);
            return Ok(());
        }
        // The ramp prescription assumes an equispaced radius axis.
        if rad.d <= 0.0 {
            return Err(TransitError::InconsistentInputs);
        }
        let rfct = if self.rfct == 0.0 { rad.fct } else { self.rfct };
        let top = self.top * rfct;
        let full = self.full * rfct;
        let slope = self.maxe / (full - top);

        for (e, &r) in out.iter_mut().zip(&rad.v) {
            let r = r * rad.fct;
            *e = if r > top {
                0.0
            } else if r > full {
                slope * (r - top)
            } else {
                self.maxe
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn no_cia_is_all_zero() {
        let rad = SamplingAxis::equispaced(1.0, 1.0, 5, 1.0);
        let mut out = vec![1.0; 5];
        NoCia.compute(&mut out, &rad, &[100.0; 5], 2000.0).unwrap();
        assert!(out.iter().all(|&e| e == 0.0));
    }

    #[test]
    fn cloud_deck_ramp() {
        // Radii 1..=9, cloud top at 7, full opacity at 3.
        let rad = SamplingAxis::equispaced(1.0, 1.0, 9, 1.0);
        let cl = CloudDeck { top: 7.0, full: 3.0, maxe: 2.0, rfct: 1.0 };
        let mut out = vec![0.0; 9];
        cl.compute(&mut out, &rad, &[100.0; 9], 2000.0).unwrap();

        // Above the top: clear.
        assert_eq!(out[8], 0.0);
        assert_eq!(out[7], 0.0);
        // Ramp: e = maxe * (r - top)/(full - top).
        assert_relative_eq!(out[4], 2.0 * (5.0 - 7.0) / (3.0 - 7.0));
        // At and below full opacity.
        assert_relative_eq!(out[2], 2.0);
        assert_relative_eq!(out[0], 2.0);
    }

    #[test]
    fn disabled_cloud_deck_is_clear() {
        let rad = SamplingAxis::equispaced(1.0, 1.0, 5, 1.0);
        let cl = CloudDeck { top: 0.0, full: 0.0, maxe: 2.0, rfct: 1.0 };
        let mut out = vec![1.0; 5];
        cl.compute(&mut out, &rad, &[100.0; 5], 2000.0).unwrap();
        assert!(out.iter().all(|&e| e == 0.0));
    }
}
