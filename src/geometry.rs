//! Planet-star system geometry.

/// Orbital and stellar parameters that project the planet onto the stellar
/// disk. The modulation integrator normalizes by the stellar radius and
/// honors the transparency flag; the orbital elements travel with the
/// system description for the outer observation layers.
#[derive(Debug, Clone)]
pub struct Geometry {
    /// Orbital semimajor axis (cm).
    pub smaxis: f64,
    /// Orbital eccentricity.
    pub ecc: f64,
    /// Orbital inclination (radians).
    pub incl: f64,
    /// Stellar mass (g).
    pub star_mass: f64,
    /// Stellar radius (cm).
    pub star_rad: f64,
    /// Time from mid-transit (s).
    pub time: f64,
    /// When set, layers below the opacity ceiling still transmit
    /// `exp(-tau_max)` instead of being treated as fully opaque.
    pub transparent: bool,
}

impl Geometry {
    /// A centered, circular transit geometry for the given stellar radius.
    pub fn centered(star_rad: f64) -> Self {
        Geometry {
            smaxis: 0.0,
            ecc: 0.0,
            incl: std::f64::consts::FRAC_PI_2,
            star_mass: 0.0,
            star_rad,
            time: 0.0,
            transparent: false,
        }
    }
}
