//! Transmission-spectroscopy radiative transfer for a transiting planet.
//!
//! The crate takes a one-dimensional atmosphere (temperature, pressure, and
//! per-species densities over a radius grid), a sorted line-transition list,
//! and a set of sampling grids, and produces the wavelength-dependent
//! in-transit/out-of-transit modulation of the stellar flux:
//!
//! 1. [`sample`] reconciles caller hints against reference samplings into
//!    the radius, wavenumber, and impact-parameter grids.
//! 2. [`extinction`] synthesizes line-by-line extinction spectra per radius
//!    level, lazily, as the driver asks for deeper layers.
//! 3. [`slantpath`] integrates extinction along a ray at a given impact
//!    parameter, straight or bent by refraction.
//! 4. [`tau`] drives the per-wavenumber optical-depth table, cutting each
//!    column at the opacity ceiling.
//! 5. The modulation integral over impact parameter turns the table into
//!    the observable spectrum, one wavenumber per worker thread.

pub mod atmosphere;
pub mod contrib;
pub mod error;
pub mod extinction;
pub mod geometry;
pub mod interp;
pub mod sample;
pub mod slantpath;
pub mod tau;
pub mod voigt;

use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{debug, info, warn};
use rayon::prelude::*;

pub use crate::atmosphere::{AtmosphereProfile, LineList, LineTransition, Species};
pub use crate::contrib::{CloudDeck, ExtinctionContributor, NoCia, Scattering};
pub use crate::error::TransitError;
pub use crate::extinction::ExtinctionField;
pub use crate::geometry::Geometry;
pub use crate::sample::{resolve_sampling, SamplingAxis, SamplingHint, SamplingReference};
pub use crate::slantpath::RaySolution;
pub use crate::tau::{OpticalDepthTable, DEFAULT_TOOMUCH};

/// Knobs of the whole computation, with the customary defaults.
#[derive(Debug, Clone)]
pub struct TransitConfig {
    /// Ray solution to integrate the optical depth with.
    pub solution: RaySolution,
    /// Modulation fidelity level: `1` full integral, `-1` opaque disk.
    pub mod_level: i32,
    /// Optical-depth ceiling; non-positive selects [`DEFAULT_TOOMUCH`].
    pub toomuch: f64,
    /// Line-extinction enhancement factor.
    pub blowex: f64,
    /// Voigt profile extent in units of the larger line width.
    pub timesalpha: f64,
    /// Tolerated relative line-width change before profiles are recomputed.
    pub maxratio: f64,
    /// Skip lines with a lower-state energy below this, when set.
    pub min_elow: Option<f64>,
    /// Worker threads for the modulation stage; `None` picks automatically.
    pub num_threads: Option<usize>,
}

impl Default for TransitConfig {
    fn default() -> Self {
        TransitConfig {
            solution: RaySolution::Straight,
            mod_level: 1,
            toomuch: DEFAULT_TOOMUCH,
            blowex: 1.0,
            timesalpha: 50.0,
            maxratio: 0.001,
            min_elow: None,
            num_threads: None,
        }
    }
}

/// Finished spectrum: the optical-depth table and the modulation per
/// wavenumber. A modulation of `-1.0` at the opaque-disk level marks a
/// wavenumber where the atmosphere never got opaque enough.
#[derive(Debug)]
pub struct TransitOutput {
    /// Optical depth per wavenumber and impact parameter.
    pub tau: OpticalDepthTable,
    /// In-transit/out-of-transit modulation per wavenumber.
    pub modulation: Vec<f64>,
}

impl TransitOutput {
    /// Write the modulation spectrum, one wavenumber per line.
    pub fn write_modulation<W: Write>(
        &self,
        out: &mut W,
        wn: &SamplingAxis,
    ) -> io::Result<()> {
        writeln!(out, "#Wavenumber (cm-1)  Wavelength (cm)  Modulation")?;
        for (wi, m) in self.modulation.iter().enumerate() {
            let wavn = wn.v[wi] * wn.fct;
            writeln!(out, "{:<16.10} {:.9e} {:.9e}", wavn, 1.0 / wavn, m)?;
        }
        Ok(())
    }
}

/// Run the whole pipeline: extinction, optical depth, and modulation.
///
/// `refr` is the per-level index of refraction over the radius axis and
/// `contributors` add extinction sources beyond the line field. The
/// optical-depth stage runs serially (each wavenumber may materialize new
/// extinction levels shared by the rest); the modulation integrals run on a
/// thread pool sized by the configuration.
#[allow(clippy::too_many_arguments)]
pub fn compute_transit(
    config: &TransitConfig,
    rad: &SamplingAxis,
    ip: &SamplingAxis,
    wn: &SamplingAxis,
    atm: &AtmosphereProfile,
    species: &[Species],
    lines: &LineList,
    refr: &[f64],
    contributors: &[&dyn ExtinctionContributor],
    geom: &Geometry,
) -> Result<TransitOutput, TransitError> {
    // Check shapes of all inputs.
    {
        if refr.len() != rad.len() || geom.star_rad <= 0.0 {
            return Err(TransitError::InconsistentInputs);
        }
        if ip.len() < 4 {
            return Err(TransitError::TooFewPoints { have: ip.len(), need: 4 });
        }
        let outermost = rad.v[rad.len() - 1] * rad.fct;
        if ip.v.iter().any(|&b| b * ip.fct > outermost) {
            return Err(TransitError::InconsistentInputs);
        }
    }
    debug!("input shapes are consistent");

    let mut ex = ExtinctionField::new(
        rad,
        wn,
        atm,
        species,
        lines,
        config.timesalpha,
        config.maxratio,
        config.min_elow,
    )?;

    let table = tau::optical_depth(
        config.solution,
        &mut ex,
        refr,
        rad,
        ip,
        wn,
        atm,
        contributors,
        config.blowex,
        config.toomuch,
    )?;

    let wnn = wn.len();
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.num_threads.unwrap_or(0))
        .build()
        .map_err(|e| TransitError::ThreadPool(e.to_string()))?;

    info!(
        "integrating modulation for {wnn} wavenumbers with the {} solution",
        config.solution.name()
    );
    let num_completed = AtomicUsize::new(0);
    let progress_step = (wnn / 10).max(1);

    let mut results = Vec::new();
    pool.install(|| {
        (0..wnn)
            .into_par_iter()
            .map(|wi| -> Result<f64, TransitError> {
                let row = table.t.row(wi);
                let row = row.as_slice().ok_or(TransitError::NotContiguous)?;
                match config.solution.observable(
                    row,
                    table.last[wi],
                    table.toomuch,
                    ip,
                    geom,
                    config.mod_level,
                ) {
                    Ok(m) => Ok(m),
                    Err(TransitError::CeilingNotReached { max_tau }) => {
                        warn!(
                            "wavenumber {:.6} cm-1: optical depth only reached {max_tau:.4}, \
                             no opaque-disk radius; recording -1",
                            wn.v[wi] * wn.fct
                        );
                        Ok(-1.0)
                    }
                    Err(e) => Err(e),
                }
            })
            .inspect(|_| {
                let done = num_completed.fetch_add(1, Ordering::Relaxed) + 1;
                if done % progress_step == 0 {
                    info!("modulation: {done}/{wnn} wavenumbers done");
                }
            })
            .collect_into_vec(&mut results);
    });
    let modulation = results.into_iter().collect::<Result<Vec<f64>, _>>()?;

    Ok(TransitOutput { tau: table, modulation })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NRAD: usize = 20;

    /// One weak water-like line in the middle of a narrow wavenumber window.
    fn inputs() -> (
        SamplingAxis,
        SamplingAxis,
        SamplingAxis,
        AtmosphereProfile,
        Vec<Species>,
        LineList,
        Vec<f64>,
        Geometry,
    ) {
        let rad = SamplingAxis::equispaced(6.0e9, 1.0e8, NRAD, 1.0);
        let ip = SamplingAxis::equispaced(6.1e9, 1.0e8, NRAD - 2, 1.0);
        // 21 bins over 0.04 cm-1; the line sits on the middle bin.
        let wn = SamplingAxis::equispaced(1500.0, 0.002, 21, 1.0);
        let atm = AtmosphereProfile {
            temp: vec![1200.0; NRAD],
            press: vec![1e4; NRAD],
            mean_mass: vec![2.3; NRAD],
            density: vec![vec![1e-18; NRAD]],
        };
        let species = vec![Species {
            name: "H2O".into(),
            mass: 18.0,
            ratio: 1.0,
            cross_section: vec![1e-15; NRAD],
            part_temp: vec![500.0, 1500.0],
            part_z: vec![100.0, 300.0],
        }];
        let lines = LineList {
            lines: vec![LineTransition {
                wavelength: 1.0 / 1500.02,
                elow: 300.0,
                gf: 1e-2,
                species: 0,
            }],
            wfct: 1.0,
            efct: 1.0,
        };
        let refr = vec![1.0; NRAD];
        let geom = Geometry::centered(7.0e10);
        (rad, ip, wn, atm, species, lines, refr, geom)
    }

    #[test]
    fn transit_is_deeper_at_the_line_center() {
        let (rad, ip, wn, atm, species, lines, refr, geom) = inputs();
        let config = TransitConfig { num_threads: Some(2), ..Default::default() };

        let out = compute_transit(
            &config, &rad, &ip, &wn, &atm, &species, &lines, &refr, &[], &geom,
        )
        .unwrap();

        assert_eq!(out.modulation.len(), 21);
        // Optical depth is largest at the central bin, so the planet blocks
        // the most light there.
        let center = out.modulation[10];
        assert!(center > out.modulation[0]);
        assert!(center > out.modulation[20]);
        // The continuum still shows the solid-disk baseline.
        let b0 = ip.v[0];
        let baseline = b0 * b0 / (7.0e10f64 * 7.0e10);
        assert!(out.modulation[0] >= baseline * 0.999);
    }

    #[test]
    fn opaque_disk_level_records_sentinels_when_never_opaque() {
        let (rad, ip, wn, atm, species, lines, refr, geom) = inputs();
        let config = TransitConfig {
            mod_level: -1,
            num_threads: Some(1),
            ..Default::default()
        };

        let out = compute_transit(
            &config, &rad, &ip, &wn, &atm, &species, &lines, &refr, &[], &geom,
        )
        .unwrap();
        // The line is far too weak to ever hit the ceiling.
        assert!(out.modulation.iter().all(|&m| m == -1.0));
    }

    #[test]
    fn cloud_deck_flattens_the_spectrum_floor() {
        let (rad, ip, wn, atm, species, lines, refr, geom) = inputs();
        let config = TransitConfig { num_threads: Some(1), ..Default::default() };

        // An optically thick grey deck well above the deepest layers.
        let cloud = CloudDeck { top: 7.5e9, full: 7.0e9, maxe: 1.0, rfct: 1.0 };
        let cloudy = compute_transit(
            &config, &rad, &ip, &wn, &atm, &species, &lines, &refr, &[&cloud], &geom,
        )
        .unwrap();
        let clear = compute_transit(
            &config, &rad, &ip, &wn, &atm, &species, &lines, &refr, &[], &geom,
        )
        .unwrap();

        // The deck blocks more light everywhere.
        for (c, k) in cloudy.modulation.iter().zip(&clear.modulation) {
            assert!(c > k);
        }
    }

    #[test]
    fn modulation_writer_emits_one_line_per_wavenumber() {
        let (rad, ip, wn, atm, species, lines, refr, geom) = inputs();
        let config = TransitConfig { num_threads: Some(1), ..Default::default() };
        let out = compute_transit(
            &config, &rad, &ip, &wn, &atm, &species, &lines, &refr, &[], &geom,
        )
        .unwrap();

        let mut buf = Vec::new();
        out.write_modulation(&mut buf, &wn).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 22);
        assert!(text.starts_with("#Wavenumber"));
    }

    #[test]
    fn mismatched_refraction_profile_is_rejected() {
        let (rad, ip, wn, atm, species, lines, _refr, geom) = inputs();
        let config = TransitConfig::default();
        let err = compute_transit(
            &config, &rad, &ip, &wn, &atm, &species, &lines, &[1.0; 3], &[], &geom,
        )
        .unwrap_err();
        assert_eq!(err, TransitError::InconsistentInputs);
    }
}
