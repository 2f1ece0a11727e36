//! Line-by-line extinction field.
//!
//! Holds one absorption-coefficient-vs-wavenumber row per (species, radius
//! level), filled lazily as the tau driver probes deeper layers. Synthesis
//! superposes every relevant line's Voigt footprint scaled by line strength,
//! level population, abundance, and partition function; a level whose
//! combined Doppler+Lorentz width barely differs from the last synthesized
//! one copies that profile instead of resynthesizing.

use log::debug;
use ndarray::{Array2, ArrayView1};
use smallvec::{smallvec, SmallVec};

use crate::atmosphere::{AtmosphereProfile, LineList, Species, AMU, EXPCTE, KB, LS, SIGCTE};
use crate::error::TransitError;
use crate::sample::SamplingAxis;
use crate::voigt::voigt_profile;

use std::f64::consts::{LN_2, PI};

/// Per-species reuse cache: the last synthesized row and the combined width
/// it was synthesized at.
#[derive(Debug)]
struct LevelCache {
    width: f64,
    row: Vec<f64>,
}

/// Lazily materialized per-level extinction coefficients (cm-1).
#[derive(Debug)]
pub struct ExtinctionField<'a> {
    rad: &'a SamplingAxis,
    wn: &'a SamplingAxis,
    atm: &'a AtmosphereProfile,
    species: &'a [Species],
    lines: &'a LineList,
    /// Number of max-widths covered by a synthesized profile.
    timesalpha: f64,
    /// Relative width change tolerated before a profile is recomputed.
    maxratio: f64,
    /// When set, lines with a lower-state energy below this are skipped.
    min_elow: Option<f64>,
    /// One (radius x wavenumber) matrix per species.
    e: Vec<Array2<f64>>,
    computed: Vec<bool>,
    cache: Vec<Option<LevelCache>>,
}

impl<'a> ExtinctionField<'a> {
    /// Set up an empty field. Fails on malformed inputs: too few wavenumber
    /// samples, an empty species list, an unsorted line list, profile shapes
    /// not matching the radius axis, or nonsensical synthesis parameters.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rad: &'a SamplingAxis,
        wn: &'a SamplingAxis,
        atm: &'a AtmosphereProfile,
        species: &'a [Species],
        lines: &'a LineList,
        timesalpha: f64,
        maxratio: f64,
        min_elow: Option<f64>,
    ) -> Result<Self, TransitError> {
        let nrad = rad.len();
        let nwn = wn.len();
        if nrad < 1 || species.is_empty() || timesalpha < 1.0 || maxratio < 0.0 {
            return Err(TransitError::InconsistentInputs);
        }
        if nwn < 2 {
            return Err(TransitError::TooFewPoints { have: nwn, need: 2 });
        }
        atm.check(nrad, species.len())?;
        lines.check(species.len())?;
        if species.iter().any(|sp| {
            sp.cross_section.len() != nrad
                || sp.part_temp.is_empty()
                || sp.part_temp.len() != sp.part_z.len()
        }) {
            return Err(TransitError::InconsistentInputs);
        }

        let ns = species.len();
        Ok(ExtinctionField {
            rad,
            wn,
            atm,
            species,
            lines,
            timesalpha,
            maxratio,
            min_elow,
            e: (0..ns).map(|_| Array2::zeros((nrad, nwn))).collect(),
            computed: vec![false; nrad],
            cache: (0..ns).map(|_| None).collect(),
        })
    }

    /// True when the level has been synthesized (or reused).
    pub fn computed(&self, r: usize) -> bool {
        self.computed[r]
    }

    /// Per-level computed mask.
    pub fn computed_mask(&self) -> &[bool] {
        &self.computed
    }

    /// Total extinction over all species at one (level, wavenumber) cell.
    /// Zero for levels not yet materialized.
    pub fn at(&self, r: usize, wi: usize) -> f64 {
        self.e.iter().map(|e| e[[r, wi]]).sum()
    }

    /// One species' extinction row at a level.
    pub fn species_row(&self, sp: usize, r: usize) -> ArrayView1<'_, f64> {
        self.e[sp].row(r)
    }

    /// Synthesize (or reuse) the extinction row of every species at radius
    /// level `r`. A no-op when the level is already computed.
    pub fn materialize(&mut self, r: usize) -> Result<(), TransitError> {
        if self.computed[r] {
            return Ok(());
        }

        let temp = self.atm.temp[r];
        let nwn = self.wn.len();
        let wnv = &self.wn.v;
        let iniwn = wnv[0];
        let dwn = wnv[1] - wnv[0];
        let ns = self.species.len();

        // Doppler width per central wavenumber: sqrt(2 kB T / m) sqrt(ln2)/c,
        // with the species mass divided out below.
        let propto_adop = (2.0 * KB * temp / AMU).sqrt() * LN_2.sqrt() / LS;
        // Lorentz width prefactor for the collisioner sum.
        let propto_alor = (temp * 2.0 * KB / PI / AMU).sqrt() / AMU / LS / PI;

        let mut alphal: SmallVec<[f64; 8]> = smallvec![0.0; ns];
        let mut adop: SmallVec<[f64; 8]> = smallvec![0.0; ns];
        let mut width: SmallVec<[f64; 8]> = smallvec![0.0; ns];
        let mut part: SmallVec<[f64; 8]> = smallvec![0.0; ns];
        for i in 0..ns {
            let sp = &self.species[i];
            let mut coll = 0.0;
            for (j, other) in self.species.iter().enumerate() {
                coll += self.atm.density[j][r] / other.mass
                    * (1.0 / sp.mass + 1.0 / other.mass).sqrt();
            }
            alphal[i] = sp.cross_section[r] * propto_alor * coll;
            adop[i] = propto_adop / sp.mass.sqrt();
            width[i] = iniwn * adop[i] + alphal[i];
            part[i] = sp.partition(temp);
        }

        // Decide reuse per species: a cached profile whose combined width is
        // within the tolerated relative change is copied verbatim.
        let mut fresh = vec![true; ns];
        for i in 0..ns {
            if let Some(cache) = &self.cache[i] {
                if (width[i] / cache.width - 1.0).abs() <= self.maxratio {
                    self.e[i]
                        .row_mut(r)
                        .assign(&ArrayView1::from(&cache.row[..]));
                    fresh[i] = false;
                }
            }
        }

        if fresh.iter().any(|&f| f) {
            let mut rows: Vec<Vec<f64>> = (0..ns)
                .map(|i| if fresh[i] { vec![0.0; nwn] } else { Vec::new() })
                .collect();

            // Per-species running profile while marching down the line list
            // (sorted ascending in wavelength, so descending in wavenumber).
            let mut prof: Vec<Vec<f64>> = vec![Vec::new(); ns];
            let mut half: Vec<usize> = vec![0; ns];
            let mut wrc: Vec<isize> = vec![0; ns];
            for i in 0..ns {
                if !fresh[i] {
                    continue;
                }
                prof[i] = new_profile(dwn, iniwn * adop[i], alphal[i], self.timesalpha)?;
                half[i] = prof[i].len() / 2;
                wrc[i] = recalc_index(nwn - 1, self.maxratio, wnv[nwn - 1], dwn);
            }

            for line in &self.lines.lines {
                if let Some(min_elow) = self.min_elow {
                    if line.elow < min_elow {
                        continue;
                    }
                }
                let i = line.species;
                if !fresh[i] {
                    continue;
                }

                // Locate the line center on the wavenumber grid; lines
                // falling off either end are skipped.
                let wavn = self.lines.wavenumber(line) / self.wn.fct;
                if wavn < iniwn {
                    continue;
                }
                let w = ((wavn - iniwn) / dwn) as usize;
                if w >= nwn {
                    continue;
                }

                // The line center moved past the recalculation mark: the
                // Doppler width changed enough that the profile is stale.
                if w as isize <= wrc[i] {
                    prof[i] = new_profile(dwn, wnv[w] * adop[i], alphal[i], self.timesalpha)?;
                    half[i] = prof[i].len() / 2;
                    wrc[i] = recalc_index(w, self.maxratio, wnv[w], dwn);
                }

                let sp = &self.species[i];
                let propto_k = self.atm.density[i][r] * sp.ratio * SIGCTE * line.gf
                    * (-EXPCTE * self.lines.efct * line.elow / temp).exp()
                    * (1.0 - (-EXPCTE * wavn / temp).exp())
                    / sp.mass
                    / part[i];

                // Spread the line strength over the Voigt footprint.
                let minj = w.saturating_sub(half[i]);
                let maxj = (w + half[i] + 1).min(nwn);
                let row = &mut rows[i];
                for (j, e) in row[minj..maxj].iter_mut().enumerate() {
                    *e += propto_k * prof[i][minj + j + half[i] - w];
                }
            }

            for i in 0..ns {
                if !fresh[i] {
                    continue;
                }
                let row = std::mem::take(&mut rows[i]);
                self.e[i].row_mut(r).assign(&ArrayView1::from(&row[..]));
                self.cache[i] = Some(LevelCache { width: width[i], row });
            }
        }

        self.computed[r] = true;
        debug!(
            "materialized extinction at level {r} (r = {:.6e}, T = {temp} K)",
            self.rad.v[r] * self.rad.fct
        );
        Ok(())
    }
}

/// Synthesize a Voigt profile covering `timesalpha` times the larger of the
/// two widths, with an odd sample count so the center lands on a bin.
fn new_profile(
    dwn: f64,
    dop: f64,
    lor: f64,
    timesalpha: f64,
) -> Result<Vec<f64>, TransitError> {
    let bigalpha = dop.max(lor);
    let wvgt = bigalpha * timesalpha;
    if !wvgt.is_finite() || wvgt <= 0.0 {
        return Err(TransitError::InconsistentInputs);
    }
    let nvgt = 2 * (wvgt / dwn + 0.5) as usize + 1;
    Ok(voigt_profile(nvgt, dwn, lor, dop))
}

/// Grid index below which the profile must be regenerated: `maxratio` times
/// the current wavenumber, expressed in grid bins, at least one.
fn recalc_index(w: usize, maxratio: f64, wn: f64, dwn: f64) -> isize {
    let stride = ((maxratio * wn / dwn + 0.5) as isize).max(1);
    w as isize - stride
}
