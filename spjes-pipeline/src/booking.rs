//! Histogram booking: the six analysis histograms bound to pipeline stages.

use crate::selection::Outcome;
use spjes_core::{Axis, Hist1D, Hist3D, Histogram, Result};

pub const H_N_CLUSTERS: &str = "h_nClusters";
pub const H_N_PARTICLES: &str = "h_nParticles";
pub const H_PDG_IDS: &str = "h_PDGIDs";
pub const H_LEADING_CLUSTER_E: &str = "h_leading_cluster_e";
pub const H_INCLUSIVE_RESPONSE: &str = "h_inclusive_response";
pub const H_RESPONSE: &str = "h_response";

/// The booked analysis histograms.
///
/// - `h_nClusters`, `h_nParticles`: every event, before any filter.
/// - `h_PDGIDs`: events passing the pion filter.
/// - `h_leading_cluster_e`, `h_inclusive_response`, `h_response` (3-D):
///   events passing the whole chain.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBook {
    n_clusters: Hist1D,
    n_particles: Hist1D,
    pdg_ids: Hist1D,
    leading_cluster_e: Hist1D,
    inclusive_response: Hist1D,
    response: Hist3D,
}

impl HistogramBook {
    /// Books empty histograms.
    ///
    /// # Errors
    /// Returns an error if an axis definition is invalid.
    pub fn new() -> Result<Self> {
        Ok(Self {
            n_clusters: Hist1D::new(
                H_N_CLUSTERS,
                "Number of Clusters;N_{Clusters};Events",
                Axis::new(20, -0.5, 19.5)?,
            ),
            n_particles: Hist1D::new(
                H_N_PARTICLES,
                "Number of Particles;N_{Particles};Events",
                Axis::new(20, -0.5, 19.5)?,
            ),
            pdg_ids: Hist1D::new(
                H_PDG_IDS,
                "Leading Cluster PDGID;PDGID^{lead cluster};Events",
                Axis::new(1000, 0.0, 1000.0)?,
            ),
            leading_cluster_e: Hist1D::new(
                H_LEADING_CLUSTER_E,
                "Leading Cluster E;E^{lead cluster} [GeV];Events",
                Axis::new(100, 0.0, 500.0)?,
            ),
            inclusive_response: Hist1D::new(
                H_INCLUSIVE_RESPONSE,
                "Response (inclusive); p_{T,cluster}/p_{T,particle};Events",
                Axis::new(100, 0.0, 3.0)?,
            ),
            response: Hist3D::new(
                H_RESPONSE,
                "Response (binned); p_{T,cluster}/p_{T,particle},p_{T,particle},eta;Events",
                Axis::new(50, 0.0, 2.0)?,
                Axis::new(100, 0.0, 500.0)?,
                Axis::new(60, -3.0, 3.0)?,
            ),
        })
    }

    /// Fills every histogram whose stage `outcome` reached.
    #[allow(clippy::cast_precision_loss)]
    pub fn fill(&mut self, outcome: &Outcome) {
        let multiplicity = outcome.multiplicity();
        self.n_clusters.fill(multiplicity.n_clusters as f64);
        self.n_particles.fill(multiplicity.n_particles as f64);

        if let Outcome::Accepted {
            pdg_id_lead,
            derived,
            ..
        } = outcome
        {
            self.pdg_ids.fill(f64::from(*pdg_id_lead));
            self.leading_cluster_e.fill(derived.leading_cluster_e);
            self.inclusive_response.fill(derived.response);
            self.response.fill(
                derived.response,
                derived.lead_particle_pt,
                derived.lead_particle_eta,
            );
        }
    }

    /// Adds the contents of another book.
    ///
    /// # Errors
    /// Returns an error if the binnings differ.
    pub fn merge(&mut self, other: &HistogramBook) -> Result<()> {
        self.n_clusters.merge(&other.n_clusters)?;
        self.n_particles.merge(&other.n_particles)?;
        self.pdg_ids.merge(&other.pdg_ids)?;
        self.leading_cluster_e.merge(&other.leading_cluster_e)?;
        self.inclusive_response.merge(&other.inclusive_response)?;
        self.response.merge(&other.response)?;
        Ok(())
    }

    #[must_use]
    pub fn n_clusters(&self) -> &Hist1D {
        &self.n_clusters
    }

    #[must_use]
    pub fn n_particles(&self) -> &Hist1D {
        &self.n_particles
    }

    #[must_use]
    pub fn pdg_ids(&self) -> &Hist1D {
        &self.pdg_ids
    }

    #[must_use]
    pub fn leading_cluster_e(&self) -> &Hist1D {
        &self.leading_cluster_e
    }

    #[must_use]
    pub fn inclusive_response(&self) -> &Hist1D {
        &self.inclusive_response
    }

    #[must_use]
    pub fn response(&self) -> &Hist3D {
        &self.response
    }

    /// Consumes the book, returning the histograms in booking order.
    #[must_use]
    pub fn into_histograms(self) -> Vec<Histogram> {
        vec![
            self.n_clusters.into(),
            self.n_particles.into(),
            self.pdg_ids.into(),
            self.leading_cluster_e.into(),
            self.inclusive_response.into(),
            self.response.into(),
        ]
    }
}
