//! Four-vector kinematics in collider coordinates.

/// Conversion factor between the MeV stored in event files and GeV.
pub const MEV_PER_GEV: f64 = 1000.0;

/// Converts an energy or momentum from MeV to GeV.
#[inline]
#[must_use]
pub fn mev_to_gev(value: f64) -> f64 {
    value / MEV_PER_GEV
}

/// Transverse momentum of an object with energy `e`, mass `m` and
/// pseudorapidity `eta`: `sqrt(E^2 - m^2) / cosh(eta)`.
///
/// Returns NaN when `m > e`.
#[inline]
#[must_use]
pub fn pt_from_energy(e: f64, m: f64, eta: f64) -> f64 {
    (e * e - m * m).sqrt() / eta.cosh()
}

/// Lorentz vector stored as (pT, eta, phi, m).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PtEtaPhiMVector {
    pt: f64,
    eta: f64,
    phi: f64,
    m: f64,
}

impl PtEtaPhiMVector {
    /// Creates a new vector.
    #[must_use]
    pub fn new(pt: f64, eta: f64, phi: f64, m: f64) -> Self {
        Self { pt, eta, phi, m }
    }

    #[inline]
    #[must_use]
    pub fn pt(&self) -> f64 {
        self.pt
    }

    #[inline]
    #[must_use]
    pub fn eta(&self) -> f64 {
        self.eta
    }

    #[inline]
    #[must_use]
    pub fn phi(&self) -> f64 {
        self.phi
    }

    #[inline]
    #[must_use]
    pub fn m(&self) -> f64 {
        self.m
    }
}
