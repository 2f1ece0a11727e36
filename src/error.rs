//! Error type shared by every stage of the pipeline.

/// Possible errors while setting up or running the transit computation.
///
/// Sampling errors are continuable at the caller's discretion and map to the
/// negative status codes of the original option-handling convention through
/// [`TransitError::code`]. The remaining variants are fatal: the run cannot
/// produce a meaningful spectrum once one occurs.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitError {
    /// The inputs don't have the expected shape(s) or lengths.
    InconsistentInputs,
    /// Hinted initial value lies above the eroded final reference bound.
    InitialAboveBound {
        /// Name of the axis being resolved.
        axis: &'static str,
    },
    /// Hinted final value lies below the eroded initial reference bound.
    FinalBelowBound {
        /// Name of the axis being resolved.
        axis: &'static str,
    },
    /// Accepted initial value is greater than or equal to the final one.
    EmptyInterval {
        /// Name of the axis being resolved.
        axis: &'static str,
    },
    /// Both spacing and point count were hinted for the same axis.
    SpacingAndCountHinted {
        /// Name of the axis being resolved.
        axis: &'static str,
    },
    /// The reference defines neither or both of spacing and count.
    AmbiguousReference {
        /// Name of the axis being resolved.
        axis: &'static str,
    },
    /// No valid oversampling factor in either hint or reference.
    InvalidOversampling {
        /// Name of the axis being resolved.
        axis: &'static str,
    },
    /// Closest-approach radius fell outside the sampled radius range.
    TangentOutsideGrid {
        /// Closest-approach radius in radius units.
        r0: f64,
        /// Sampled radius range.
        range: (f64, f64),
    },
    /// Fixed-point search for the closest-approach radius did not converge.
    ConvergenceFailure {
        /// Iterations performed before giving up.
        iterations: usize,
    },
    /// The requested ray-path or modulation fidelity level does not exist.
    UnknownLevel(i32),
    /// The named ray solution does not exist.
    UnknownSolution(String),
    /// Too few samples to run a spline quadrature where one is mandatory.
    TooFewPoints {
        /// Number of points available.
        have: usize,
        /// Minimum number required.
        need: usize,
    },
    /// Optical depth never reached the ceiling, so the opaque-disk radius
    /// (modulation level -1) is undefined.
    CeilingNotReached {
        /// Largest optical depth that was reached.
        max_tau: f64,
    },
    /// An interior array view was not contiguous in memory.
    NotContiguous,
    /// The worker thread pool could not be started.
    ThreadPool(String),
}

impl TransitError {
    /// Signed status code, one reserved negative value per sampling cause.
    ///
    /// Fatal variants share `-100`; they are never expected to be matched on
    /// by code, only reported.
    pub fn code(&self) -> i32 {
        match self {
            TransitError::InitialAboveBound { .. } => -1,
            TransitError::FinalBelowBound { .. } => -2,
            TransitError::EmptyInterval { .. } => -3,
            TransitError::SpacingAndCountHinted { .. } => -4,
            TransitError::AmbiguousReference { .. } => -5,
            TransitError::InvalidOversampling { .. } => -6,
            _ => -100,
        }
    }
}

impl std::fmt::Display for TransitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransitError::InconsistentInputs => {
                write!(f, "inputs have inconsistent shapes")
            }
            TransitError::InitialAboveBound { axis } => {
                write!(f, "{axis}: hinted initial value is above the eroded final bound")
            }
            TransitError::FinalBelowBound { axis } => {
                write!(f, "{axis}: hinted final value is below the eroded initial bound")
            }
            TransitError::EmptyInterval { axis } => {
                write!(f, "{axis}: accepted initial value is >= accepted final value")
            }
            TransitError::SpacingAndCountHinted { axis } => {
                write!(f, "{axis}: both spacing and point count were hinted")
            }
            TransitError::AmbiguousReference { axis } => {
                write!(f, "{axis}: reference defines neither or both of spacing and count")
            }
            TransitError::InvalidOversampling { axis } => {
                write!(f, "{axis}: no valid oversampling factor available")
            }
            TransitError::TangentOutsideGrid { r0, range } => {
                write!(
                    f,
                    "closest approach radius ({r0:.6e}) is outside the sampled \
                     radius range ({:.6e} - {:.6e})",
                    range.0, range.1
                )
            }
            TransitError::ConvergenceFailure { iterations } => {
                write!(
                    f,
                    "closest-approach iteration did not converge after {iterations} steps"
                )
            }
            TransitError::UnknownLevel(level) => {
                write!(f, "fidelity level {level} has not been implemented")
            }
            TransitError::UnknownSolution(name) => {
                write!(f, "ray solution '{name}' has not been implemented")
            }
            TransitError::TooFewPoints { have, need } => {
                write!(f, "need at least {need} samples for quadrature, have {have}")
            }
            TransitError::CeilingNotReached { max_tau } => {
                write!(
                    f,
                    "optical depth only reached {max_tau:.6}; opaque-disk radius undefined"
                )
            }
            TransitError::NotContiguous => {
                write!(f, "array is not contiguous in memory")
            }
            TransitError::ThreadPool(reason) => {
                write!(f, "could not start the worker thread pool: {reason}")
            }
        }
    }
}

impl std::error::Error for TransitError {}
