//! Atmospheric and spectroscopic inputs, consumed as plain data from the
//! readers that live outside this crate.

use log::warn;

use crate::error::TransitError;

use std::f64::consts::PI;

/// Atomic mass unit (g).
pub const AMU: f64 = 1.66053886e-24;
/// Boltzmann constant (erg / K).
pub const KB: f64 = 1.380658e-16;
/// Speed of light (cm / s).
pub const LS: f64 = 2.99792458e10;
/// Planck's constant (erg s).
pub const H: f64 = 6.6260755e-27;
/// Electron charge (statcoulomb).
pub const EC: f64 = 4.8032068e-10;
/// Electron mass (g).
pub const ME: f64 = 9.1093897e-28;
/// Line cross-section constant (cm / g).
pub const SIGCTE: f64 = PI * EC * EC / (LS * LS * ME * AMU);
/// Boltzmann exponent constant (cm K).
pub const EXPCTE: f64 = H * LS / KB;

/// One absorbing species: mass, abundance, per-level collision cross-section,
/// and its partition-function table.
#[derive(Debug, Clone)]
pub struct Species {
    /// Display name, for diagnostics only.
    pub name: String,
    /// Mass in atomic mass units.
    pub mass: f64,
    /// Isotopic abundance ratio.
    pub ratio: f64,
    /// Collision cross-section per radius level (cm^2).
    pub cross_section: Vec<f64>,
    /// Temperatures of the partition-function table (K), ascending.
    pub part_temp: Vec<f64>,
    /// Partition-function values matching `part_temp`.
    pub part_z: Vec<f64>,
}

impl Species {
    /// Partition function at `temp`, linearly interpolated in the table.
    /// Out-of-table temperatures clamp to the nearest entry with a warning.
    pub fn partition(&self, temp: f64) -> f64 {
        let t = &self.part_temp;
        let z = &self.part_z;
        let n = t.len();
        if temp < t[0] || temp > t[n - 1] {
            warn!(
                "{}: temperature {temp} K outside partition table ({} - {} K), clamping",
                self.name,
                t[0],
                t[n - 1]
            );
            return if temp < t[0] { z[0] } else { z[n - 1] };
        }
        crate::interp::interp_linear(t, z, temp)
    }
}

/// Vertical profile of the atmosphere over the radius axis.
#[derive(Debug, Clone)]
pub struct AtmosphereProfile {
    /// Temperature per radius level (K).
    pub temp: Vec<f64>,
    /// Pressure per radius level (dyn / cm^2).
    pub press: Vec<f64>,
    /// Mean molecular mass per radius level (AMU).
    pub mean_mass: Vec<f64>,
    /// Mass density per species per radius level (g / cm^3), indexed
    /// `[species][level]`.
    pub density: Vec<Vec<f64>>,
}

impl AtmosphereProfile {
    /// Check profile shapes against the radius-axis length and the species
    /// count.
    pub fn check(&self, nrad: usize, nspecies: usize) -> Result<(), TransitError> {
        let per_level = [self.temp.len(), self.press.len(), self.mean_mass.len()];
        if per_level.iter().any(|&n| n != nrad)
            || self.density.len() != nspecies
            || self.density.iter().any(|d| d.len() != nrad)
        {
            return Err(TransitError::InconsistentInputs);
        }
        Ok(())
    }
}

/// A single line transition from the line database.
#[derive(Debug, Clone, Copy)]
pub struct LineTransition {
    /// Central wavelength, in units of `LineList::wfct` cm.
    pub wavelength: f64,
    /// Lower-state energy, in units of `LineList::efct` cm-1.
    pub elow: f64,
    /// Oscillator strength times statistical weight.
    pub gf: f64,
    /// Index into the species array.
    pub species: usize,
}

/// Line-transition list, sorted by wavelength, as handed over by the
/// database reader.
#[derive(Debug, Clone)]
pub struct LineList {
    /// Transitions in ascending wavelength order.
    pub lines: Vec<LineTransition>,
    /// Wavelength units factor to cm.
    pub wfct: f64,
    /// Lower-energy units factor to cm-1.
    pub efct: f64,
}

impl LineList {
    /// Central wavenumber of a line in cm-1.
    pub fn wavenumber(&self, line: &LineTransition) -> f64 {
        1.0 / (self.wfct * line.wavelength)
    }

    /// Validate the sort order and the species indices.
    pub fn check(&self, nspecies: usize) -> Result<(), TransitError> {
        if self
            .lines
            .windows(2)
            .any(|w| w[0].wavelength > w[1].wavelength)
            || self.lines.iter().any(|l| l.species >= nspecies)
        {
            return Err(TransitError::InconsistentInputs);
        }
        Ok(())
    }
}
