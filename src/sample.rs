//! One-dimensional sampling grids.
//!
//! Every axis the transit computation runs over (radius, wavelength,
//! wavenumber, impact parameter) is resolved the same way: a caller hint, a
//! reference sampling that defines the outer bounds, and a margin eroded off
//! those bounds are reconciled into a finished, immutable grid.

use log::warn;

use crate::error::TransitError;

/// Tolerated overshoot of the final value before the last bin is truncated.
const OK_FINAL_EXCESS: f64 = 1e-8;

/// A resolved, monotonically increasing sampling grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingAxis {
    /// Grid values, `v[0] == initial`.
    pub v: Vec<f64>,
    /// First value.
    pub i: f64,
    /// Requested last value (the generated last sample may differ by a
    /// fraction of a spacing, see [`resolve_sampling`]).
    pub f: f64,
    /// Uniform spacing before oversampling, or -1.0 when the axis came from
    /// an explicit (possibly non-uniform) value array.
    pub d: f64,
    /// Oversampling factor already applied to `v`; 1 for explicit arrays.
    pub o: u32,
    /// Multiplicative factor converting `v` to cgs units.
    pub fct: f64,
    /// The hinted initial value was rejected and the reference bound used.
    pub initial_fell_back: bool,
    /// The hinted final value was rejected and the reference bound used.
    pub final_fell_back: bool,
}

impl SamplingAxis {
    /// Number of samples.
    pub fn len(&self) -> usize {
        self.v.len()
    }

    /// True when the axis holds no samples.
    pub fn is_empty(&self) -> bool {
        self.v.is_empty()
    }

    /// Convenience constructor for an already-resolved equispaced axis, used
    /// by tests and by callers that build derived axes (e.g. the impact
    /// parameter grid mirroring the radius grid).
    pub fn equispaced(initial: f64, spacing: f64, n: usize, fct: f64) -> Self {
        let v: Vec<f64> = (0..n).map(|k| initial + k as f64 * spacing).collect();
        let f = v.last().copied().unwrap_or(initial);
        SamplingAxis {
            v,
            i: initial,
            f,
            d: spacing,
            o: 1,
            fct,
            initial_fell_back: false,
            final_fell_back: false,
        }
    }
}

/// Caller request for an axis. Fields are honored only when the matching
/// `use_*` flag is set; unset fields fall back to the reference.
#[derive(Debug, Clone, Default)]
pub struct SamplingHint {
    /// Hinted first value.
    pub initial: f64,
    /// Hinted last value.
    pub final_: f64,
    /// Hinted uniform spacing.
    pub spacing: f64,
    /// Explicit value array, used when `use_values` is set.
    pub values: Vec<f64>,
    /// Hinted oversampling factor.
    pub oversample: u32,
    /// Hinted units factor; 0 or negative defers to the reference.
    pub fct: f64,
    /// Honor `initial`.
    pub use_initial: bool,
    /// Honor `final_`.
    pub use_final: bool,
    /// Honor `spacing`.
    pub use_spacing: bool,
    /// Honor `values` (mutually exclusive with `use_spacing`).
    pub use_values: bool,
    /// Honor `oversample`.
    pub use_oversample: bool,
}

/// Reference sampling an axis is resolved against. Its bounds are
/// authoritative (after margin erosion); its spacing or value array is the
/// fallback when the hint leaves them out.
#[derive(Debug, Clone, Default)]
pub struct SamplingReference {
    /// First value.
    pub i: f64,
    /// Last value.
    pub f: f64,
    /// Uniform spacing; 0 means "not defined, use `values`".
    pub d: f64,
    /// Explicit value array fallback.
    pub values: Vec<f64>,
    /// Fallback oversampling factor; 0 means undefined.
    pub o: u32,
    /// Units factor to cgs.
    pub fct: f64,
}

/// Resolve a sampling axis from a hint, a reference, and a bound margin.
///
/// The initial bound is the hinted value when flagged, positive, and inside
/// `[ref.i + margin, ref.f - margin]`; otherwise `ref.i + margin` with the
/// fallback recorded on the returned axis. The final bound is handled
/// symmetrically. A hint flagging both a spacing and an explicit array is
/// rejected, as is a reference that defines neither or both of spacing and
/// array. An explicit array (hinted or referenced) is returned as-is with
/// `d = -1`; an oversampling request on it is dropped with a warning since a
/// literal array cannot be oversampled.
///
/// For spacing-based axes the point count is `(f - i)/d + 1` (with a small
/// tolerance so `f` landing a hair past the last bin still counts), expanded
/// by the oversampling factor to `(n-1)*o + 1`, and the values are generated
/// from the initial bound with the oversampled spacing. A final sample that
/// does not land exactly on the requested final value is a warning, not an
/// error.
pub fn resolve_sampling(
    axis: &'static str,
    hint: &SamplingHint,
    reference: &SamplingReference,
    margin: f64,
) -> Result<SamplingAxis, TransitError> {
    let fct = if hint.fct > 0.0 { hint.fct } else { reference.fct };

    let mut initial_fell_back = false;
    let mut final_fell_back = false;

    // Initial bound.
    let lo = reference.i + margin;
    let hi = reference.f - margin;
    let initial = if !hint.use_initial || hint.initial <= 0.0 || (margin != 0.0 && hint.initial < lo)
    {
        if hint.use_initial {
            warn!("{axis}: hinted initial {} outside bounds, using {lo}", hint.initial);
        }
        initial_fell_back = true;
        lo
    } else if hint.initial > hi {
        return Err(TransitError::InitialAboveBound { axis });
    } else {
        hint.initial
    };

    // Final bound.
    let final_ = if !hint.use_final || hint.final_ <= 0.0 || (margin != 0.0 && hint.final_ > hi) {
        if hint.use_final {
            warn!("{axis}: hinted final {} outside bounds, using {hi}", hint.final_);
        }
        final_fell_back = true;
        hi
    } else if hint.final_ < lo {
        return Err(TransitError::FinalBelowBound { axis });
    } else {
        hint.final_
    };

    if final_ <= initial {
        return Err(TransitError::EmptyInterval { axis });
    }

    if hint.use_spacing && hint.use_values {
        return Err(TransitError::SpacingAndCountHinted { axis });
    }

    // Explicit array hinted: return it untouched, no oversampling possible.
    if hint.use_values {
        if hint.values.is_empty() {
            return Err(TransitError::InconsistentInputs);
        }
        if hint.use_oversample && hint.oversample > 1 {
            warn!(
                "{axis}: explicit {}-point array hinted, ignoring oversampling {}",
                hint.values.len(),
                hint.oversample
            );
        }
        return Ok(SamplingAxis {
            i: hint.values[0],
            f: *hint.values.last().ok_or(TransitError::InconsistentInputs)?,
            v: hint.values.clone(),
            d: -1.0,
            o: 1,
            fct,
            initial_fell_back,
            final_fell_back,
        });
    }

    let spacing = if hint.use_spacing {
        if hint.spacing <= 0.0 {
            return Err(TransitError::InconsistentInputs);
        }
        hint.spacing
    } else {
        // Fall back to the reference, which must define exactly one of
        // spacing or value array.
        let ref_has_d = reference.d != 0.0;
        let ref_has_v = !reference.values.is_empty();
        if ref_has_d == ref_has_v {
            return Err(TransitError::AmbiguousReference { axis });
        }
        if ref_has_v {
            if initial_fell_back || final_fell_back {
                warn!(
                    "{axis}: {}-point reference array used, but a bound fell back \
                     ({} - {} vs. reference {} - {})",
                    reference.values.len(),
                    initial,
                    final_,
                    reference.i,
                    reference.f
                );
            }
            if reference.o > 1 {
                warn!(
                    "{axis}: explicit {}-point reference array, ignoring oversampling {}",
                    reference.values.len(),
                    reference.o
                );
            }
            return Ok(SamplingAxis {
                i: reference.values[0],
                f: *reference
                    .values
                    .last()
                    .ok_or(TransitError::InconsistentInputs)?,
                v: reference.values.clone(),
                d: -1.0,
                o: 1,
                fct,
                initial_fell_back,
                final_fell_back,
            });
        }
        reference.d
    };

    // Pre-oversampling point count.
    let n = (((1.0 + OK_FINAL_EXCESS) * final_ - initial) / spacing + 1.0) as usize;
    if n < 2 {
        return Err(TransitError::EmptyInterval { axis });
    }

    let oversample = if hint.use_oversample && hint.oversample >= 1 {
        hint.oversample
    } else if reference.o >= 1 {
        reference.o
    } else {
        return Err(TransitError::InvalidOversampling { axis });
    };

    let n = (n - 1) * oversample as usize + 1;
    let osd = spacing / oversample as f64;

    // Generate from the initial bound so v[0] is exact.
    let v: Vec<f64> = (0..n).map(|k| initial + k as f64 * osd).collect();

    let last = v[n - 1];
    if (last - final_).abs() > OK_FINAL_EXCESS * final_.abs() {
        warn!(
            "{axis}: final sampled value {last} of {n} points does not coincide \
             with the requested {final_} (pre-oversampling spacing {spacing})"
        );
    }

    Ok(SamplingAxis {
        v,
        i: initial,
        f: final_,
        d: spacing,
        o: oversample,
        fct,
        initial_fell_back,
        final_fell_back,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn reference() -> SamplingReference {
        SamplingReference {
            i: 1.0,
            f: 10.0,
            d: 1.0,
            values: Vec::new(),
            o: 1,
            fct: 1.0,
        }
    }

    #[test]
    fn plain_reference_resolution() {
        let axis =
            resolve_sampling("radius", &SamplingHint::default(), &reference(), 0.0).unwrap();
        assert_eq!(axis.len(), 10);
        assert_eq!(axis.v[0], 1.0);
        assert_relative_eq!(axis.v[9], 10.0);
        assert!(axis.initial_fell_back && axis.final_fell_back);
    }

    #[test]
    fn resolution_is_idempotent() {
        let hint = SamplingHint {
            initial: 2.5,
            use_initial: true,
            oversample: 3,
            use_oversample: true,
            ..Default::default()
        };
        let a = resolve_sampling("radius", &hint, &reference(), 0.0).unwrap();
        let b = resolve_sampling("radius", &hint, &reference(), 0.0).unwrap();
        assert_eq!(a, b);
        // Bit-identical, not merely approximately equal.
        for (x, y) in a.v.iter().zip(&b.v) {
            assert_eq!(x.to_bits(), y.to_bits());
        }
    }

    #[test]
    fn grids_are_strictly_increasing() {
        for oversample in [1u32, 2, 5] {
            let hint = SamplingHint {
                oversample,
                use_oversample: true,
                ..Default::default()
            };
            let axis = resolve_sampling("wavenumber", &hint, &reference(), 0.0).unwrap();
            assert_eq!(axis.len(), 9 * oversample as usize + 1);
            for w in axis.v.windows(2) {
                assert!(w[0] < w[1]);
            }
            assert_eq!(axis.v[0], axis.i);
            assert_relative_eq!(axis.v[axis.len() - 1], axis.f, max_relative = 1e-12);
        }
    }

    #[test]
    fn spacing_and_array_hints_are_mutually_exclusive() {
        let hint = SamplingHint {
            spacing: 0.5,
            use_spacing: true,
            values: vec![1.0, 2.0, 3.0],
            use_values: true,
            ..Default::default()
        };
        let err = resolve_sampling("radius", &hint, &reference(), 0.0).unwrap_err();
        assert_eq!(err.code(), -4);
    }

    #[test]
    fn margin_erodes_bounds() {
        let hint = SamplingHint {
            initial: 1.2,
            use_initial: true,
            ..Default::default()
        };
        let axis = resolve_sampling("radius", &hint, &reference(), 0.5).unwrap();
        // 1.2 is below ref.i + margin, so the eroded bound wins.
        assert_eq!(axis.i, 1.5);
        assert!(axis.initial_fell_back);
        assert_relative_eq!(axis.f, 9.5);
    }

    #[test]
    fn hinted_initial_above_eroded_final_is_an_error() {
        let hint = SamplingHint {
            initial: 9.9,
            use_initial: true,
            ..Default::default()
        };
        let err = resolve_sampling("radius", &hint, &reference(), 0.5).unwrap_err();
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn hinted_final_below_eroded_initial_is_an_error() {
        let hint = SamplingHint {
            final_: 1.1,
            use_final: true,
            ..Default::default()
        };
        let err = resolve_sampling("radius", &hint, &reference(), 0.5).unwrap_err();
        assert_eq!(err.code(), -2);
    }

    #[test]
    fn collapsed_interval_is_an_error() {
        let mut reference = reference();
        reference.f = 1.5;
        let err = resolve_sampling("radius", &SamplingHint::default(), &reference, 0.4)
            .unwrap_err();
        assert_eq!(err.code(), -3);
    }

    #[test]
    fn ambiguous_reference_is_an_error() {
        let mut reference = reference();
        reference.d = 0.0;
        let err =
            resolve_sampling("radius", &SamplingHint::default(), &reference, 0.0).unwrap_err();
        assert_eq!(err.code(), -5);

        reference.values = vec![1.0, 4.0, 10.0];
        reference.d = 1.0;
        let err =
            resolve_sampling("radius", &SamplingHint::default(), &reference, 0.0).unwrap_err();
        assert_eq!(err.code(), -5);
    }

    #[test]
    fn missing_oversampling_is_an_error() {
        let mut reference = reference();
        reference.o = 0;
        let err =
            resolve_sampling("radius", &SamplingHint::default(), &reference, 0.0).unwrap_err();
        assert_eq!(err.code(), -6);
    }

    #[test]
    fn explicit_array_bypasses_generation() {
        let hint = SamplingHint {
            values: vec![1.0, 2.0, 4.5, 10.0],
            use_values: true,
            oversample: 4,
            use_oversample: true,
            ..Default::default()
        };
        let axis = resolve_sampling("radius", &hint, &reference(), 0.0).unwrap();
        assert_eq!(axis.v, vec![1.0, 2.0, 4.5, 10.0]);
        assert_eq!(axis.d, -1.0);
        // Oversampling is dropped for literal arrays.
        assert_eq!(axis.o, 1);
    }

    #[test]
    fn oversampling_expands_count() {
        let hint = SamplingHint {
            oversample: 4,
            use_oversample: true,
            ..Default::default()
        };
        let axis = resolve_sampling("wavenumber", &hint, &reference(), 0.0).unwrap();
        assert_eq!(axis.len(), (10 - 1) * 4 + 1);
        assert_relative_eq!(axis.v[1] - axis.v[0], 0.25);
    }
}
