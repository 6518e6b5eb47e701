//! Event data types: calorimeter clusters and truth particles.
//!
//! Field names follow the xAOD accessors (`rawE`, `rawEta`, `pdgId`, ...)
//! when the `serde` feature is enabled, so event files written by the
//! reconstruction dump can be read without renaming.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A topological calorimeter cluster.
///
/// Energies and masses are in MeV. The `raw_*` fields are the uncalibrated
/// (EM scale) kinematics; `eta`, `phi` and `m` are the calibrated values.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Uncalibrated energy.
    #[cfg_attr(feature = "serde", serde(rename = "rawE"))]
    pub raw_e: f64,
    /// Uncalibrated mass.
    #[cfg_attr(feature = "serde", serde(rename = "rawM"))]
    pub raw_m: f64,
    /// Uncalibrated pseudorapidity.
    #[cfg_attr(feature = "serde", serde(rename = "rawEta"))]
    pub raw_eta: f64,
    /// Uncalibrated azimuthal angle.
    #[cfg_attr(feature = "serde", serde(rename = "rawPhi"))]
    pub raw_phi: f64,
    /// Calibrated pseudorapidity.
    pub eta: f64,
    /// Calibrated azimuthal angle.
    pub phi: f64,
    /// Calibrated mass.
    pub m: f64,
}

impl Cluster {
    /// Creates a cluster from its raw kinematics, with calibrated fields
    /// copied from the raw ones.
    #[must_use]
    pub fn from_raw(raw_e: f64, raw_m: f64, raw_eta: f64, raw_phi: f64) -> Self {
        Self {
            raw_e,
            raw_m,
            raw_eta,
            raw_phi,
            eta: raw_eta,
            phi: raw_phi,
            m: raw_m,
        }
    }

    /// Sets the calibrated angles and mass.
    #[must_use]
    pub fn with_calibrated(mut self, eta: f64, phi: f64, m: f64) -> Self {
        self.eta = eta;
        self.phi = phi;
        self.m = m;
        self
    }
}

/// A generator-level (truth) particle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Particle {
    /// Transverse momentum in MeV.
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// PDG Monte Carlo particle identifier.
    #[cfg_attr(feature = "serde", serde(rename = "pdgId"))]
    pub pdg_id: i32,
}

impl Particle {
    /// Creates a new particle.
    #[must_use]
    pub fn new(pt: f64, eta: f64, pdg_id: i32) -> Self {
        Self { pt, eta, pdg_id }
    }
}

/// One recorded collision: ordered clusters and ordered truth particles.
///
/// The first element of each collection is the leading object.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    pub clusters: Vec<Cluster>,
    pub particles: Vec<Particle>,
}

impl Event {
    /// Creates an event from its two collections.
    #[must_use]
    pub fn new(clusters: Vec<Cluster>, particles: Vec<Particle>) -> Self {
        Self {
            clusters,
            particles,
        }
    }

    /// Returns the number of clusters.
    #[must_use]
    pub fn n_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Returns the number of particles.
    #[must_use]
    pub fn n_particles(&self) -> usize {
        self.particles.len()
    }

    /// Returns the leading cluster, if any.
    #[must_use]
    pub fn leading_cluster(&self) -> Option<&Cluster> {
        self.clusters.first()
    }

    /// Returns the leading particle, if any.
    #[must_use]
    pub fn leading_particle(&self) -> Option<&Particle> {
        self.particles.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_leading_objects() {
        let event = Event::new(
            vec![
                Cluster::from_raw(5000.0, 0.0, 0.1, 0.2),
                Cluster::from_raw(1000.0, 0.0, -0.3, 1.0),
            ],
            vec![Particle::new(4000.0, 0.1, 211)],
        );

        assert_eq!(event.n_clusters(), 2);
        assert_eq!(event.n_particles(), 1);
        assert!((event.leading_cluster().unwrap().raw_e - 5000.0).abs() < f64::EPSILON);
        assert_eq!(event.leading_particle().unwrap().pdg_id, 211);
    }

    #[test]
    fn test_empty_event() {
        let event = Event::default();
        assert!(event.leading_cluster().is_none());
        assert!(event.leading_particle().is_none());
    }

    #[test]
    fn test_cluster_calibrated_fields() {
        let cluster = Cluster::from_raw(100.0, 10.0, 0.5, 1.5).with_calibrated(0.6, 1.4, 12.0);
        assert!((cluster.raw_eta - 0.5).abs() < f64::EPSILON);
        assert!((cluster.eta - 0.6).abs() < f64::EPSILON);
        assert!((cluster.phi - 1.4).abs() < f64::EPSILON);
        assert!((cluster.m - 12.0).abs() < f64::EPSILON);
    }
}
