//! Optical depth driver.
//!
//! Walks the impact parameters from the outermost inward for every
//! wavenumber, materializing extinction levels on demand, and stops a
//! column as soon as the optical depth exceeds the ceiling. Layers below
//! the deepest one an earlier wavenumber needed stay uncomputed.

use log::{info, warn};
use ndarray::Array2;

use crate::atmosphere::AtmosphereProfile;
use crate::contrib::ExtinctionContributor;
use crate::error::TransitError;
use crate::extinction::ExtinctionField;
use crate::sample::SamplingAxis;
use crate::slantpath::RaySolution;

use std::io::{self, Write};

/// Default optical-depth ceiling.
pub const DEFAULT_TOOMUCH: f64 = 50.0;

/// Optical depth per wavenumber and impact parameter.
#[derive(Debug)]
pub struct OpticalDepthTable {
    /// `t[[wi, k]]` with `k` in traversal order: entry 0 is the outermost
    /// impact parameter, `ip.v[ip.len()-1]`. Entries past `last[wi]` are
    /// zero, the column stopped there.
    pub t: Array2<f64>,
    /// Traversal index of the deepest computed layer per wavenumber.
    pub last: Vec<usize>,
    /// Ceiling the columns were cut at.
    pub toomuch: f64,
}

/// Fill the optical-depth table for every wavenumber of the grid.
///
/// `refr` is the per-level index of refraction over the radius axis, and
/// `contributors` add their extinction (clouds, scattering, CIA) on top of
/// the line field, whose values are scaled by `blowex`. A non-positive
/// `toomuch` selects [`DEFAULT_TOOMUCH`].
#[allow(clippy::too_many_arguments)]
pub fn optical_depth(
    solution: RaySolution,
    ex: &mut ExtinctionField<'_>,
    refr: &[f64],
    rad: &SamplingAxis,
    ip: &SamplingAxis,
    wn: &SamplingAxis,
    atm: &AtmosphereProfile,
    contributors: &[&dyn ExtinctionContributor],
    blowex: f64,
    toomuch: f64,
) -> Result<OpticalDepthTable, TransitError> {
    let rnn = rad.len();
    let wnn = wn.len();
    let inn = ip.len();

    if refr.len() != rnn || atm.temp.len() != rnn || wnn == 0 || rnn < 2 {
        return Err(TransitError::InconsistentInputs);
    }
    // Three impact parameters for the spline and one for the segment next
    // to the tangent point.
    if inn < 4 {
        return Err(TransitError::TooFewPoints { have: inn, need: 4 });
    }

    let toomuch = if toomuch > 0.0 { toomuch } else { DEFAULT_TOOMUCH };
    let rfct = rad.fct;
    let riw = ip.fct / rfct;

    let mut t = Array2::zeros((wnn, inn));
    let mut last = vec![inn - 1; wnn];
    // Deepest materialized level, shared across wavenumbers.
    let mut lastr = rnn - 1;

    info!("computing extinction in the outermost layer");
    ex.materialize(rnn - 1)?;

    info!("calculating optical depth at various radii");
    let progress_step = (wnn / 10).max(1);

    let mut extra = vec![0.0; rnn];
    let mut buf = vec![0.0; rnn];
    let mut er = vec![0.0; rnn];

    for wi in 0..wnn {
        if wi > 0 && wi % progress_step == 0 {
            info!("optical depth: {}%", 100 * wi / wnn);
        }

        // Additive extinction beyond the line field at this wavenumber.
        let wn_cgs = wn.v[wi] * wn.fct;
        extra.fill(0.0);
        for contributor in contributors {
            contributor.compute(&mut buf, rad, &atm.temp, wn_cgs)?;
            for (x, &v) in extra.iter_mut().zip(&buf) {
                *x += v;
            }
        }
        for (ri, e) in er.iter_mut().enumerate() {
            *e = ex.at(ri, wi) * blowex + extra[ri];
        }

        let mut reached = false;
        for k in 0..inn {
            // Outermost impact parameter first.
            let b = ip.v[inn - 1 - k];

            // Materialize every level the ray now dips into, refreshing the
            // per-wavenumber extinction buffer at each new one.
            while lastr > 0 && b * ip.fct < rad.v[lastr] * rfct {
                lastr -= 1;
                if !ex.computed(lastr) {
                    info!("radius {}: {:.9e} cm", lastr + 1, rad.v[lastr] * rfct);
                    ex.materialize(lastr)?;
                    er[lastr] = ex.at(lastr, wi) * blowex + extra[lastr];
                }
            }

            let tau = rfct
                * solution.optical_depth(
                    b * riw,
                    &rad.v[lastr..],
                    &refr[lastr..],
                    &er[lastr..],
                )?;
            t[[wi, k]] = tau;

            if tau > toomuch {
                last[wi] = k;
                reached = true;
                if k < 3 {
                    warn!(
                        "at wavenumber {:.6} cm-1 the optical depth ceiling ({toomuch}) was \
                         exceeded with tau = {tau:.4} already at impact parameter level {k} \
                         ({:.6} km); check the impact parameter sampling or the atmosphere",
                        wn.v[wi] * wn.fct,
                        b * ip.fct / 1e5
                    );
                }
                break;
            }
        }
        if !reached {
            warn!(
                "at wavenumber {:.6} cm-1 the bottom of the atmosphere was reached before \
                 the optical depth ceiling ({toomuch}); maximum reached: {:.6}",
                wn.v[wi] * wn.fct,
                t[[wi, inn - 1]]
            );
            last[wi] = inn - 1;
        }
    }

    info!("optical depth calculated up to {toomuch}");
    Ok(OpticalDepthTable { t, last, toomuch })
}

/// Write, per wavenumber, the impact parameter where the optical depth
/// reached the ceiling.
pub fn write_toomuch<W: Write>(
    out: &mut W,
    tau: &OpticalDepthTable,
    wn: &SamplingAxis,
    ip: &SamplingAxis,
) -> io::Result<()> {
    writeln!(
        out,
        "#Wavenumber (cm-1)  Radius at max. calculated depth (cm)"
    )?;
    let ipn1 = ip.len() - 1;
    for (wi, &l) in tau.last.iter().enumerate() {
        writeln!(
            out,
            "{:<16.10} {:.12e}",
            wn.v[wi] * wn.fct,
            ip.v[ipn1 - l] * ip.fct
        )?;
    }
    Ok(())
}

/// Write the optical depth at one impact parameter (traversal index `k`)
/// for every wavenumber; columns that stopped above that layer print the
/// ceiling.
pub fn write_optdepth<W: Write>(
    out: &mut W,
    tau: &OpticalDepthTable,
    wn: &SamplingAxis,
    k: usize,
) -> io::Result<()> {
    writeln!(out, "#Wavenumber (cm-1)  Optical depth")?;
    for wi in 0..tau.last.len() {
        let v = if k > tau.last[wi] { tau.toomuch } else { tau.t[[wi, k]] };
        writeln!(out, "{:<16.10} {:.9e}", wn.v[wi] * wn.fct, v)?;
    }
    Ok(())
}
