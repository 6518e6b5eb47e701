//! Event selection and derived per-event quantities.
//!
//! The pipeline is a fixed chain. Multiplicities are defined for every
//! event, then three short-circuiting filters run in order:
//!
//! 1. at least one cluster,
//! 2. at least one particle,
//! 3. the leading particle is a charged pion.
//!
//! Events passing all three get the leading-object quantities (cluster
//! energy, response, particle pT and eta).

use spjes_core::kinematics::{mev_to_gev, pt_from_energy, PtEtaPhiMVector};
use spjes_core::{Cluster, Event, Particle};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// PDG identifier of the positively charged pion.
pub const PION_PDG_ID: i32 = 211;

/// Response assigned to events with too few clusters.
pub const RESPONSE_SENTINEL: f64 = -1.0;

/// Minimum number of clusters for a computed response.
pub const RESPONSE_MIN_CLUSTERS: usize = 2;

/// Filters of the selection chain, in evaluation order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Filter {
    /// `nClusters >= 1`
    AtLeastOneCluster,
    /// `nParticles >= 1`
    AtLeastOneParticle,
    /// `pdgId_lead == 211`
    LeadingPion,
}

impl Filter {
    /// The full chain, in evaluation order.
    pub const CHAIN: [Filter; 3] = [
        Filter::AtLeastOneCluster,
        Filter::AtLeastOneParticle,
        Filter::LeadingPion,
    ];

    /// Name shown in the cut-flow report.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Filter::AtLeastOneCluster => "At least 1 cluster",
            Filter::AtLeastOneParticle => "At least 1 particle",
            Filter::LeadingPion => "At least 1 pion",
        }
    }

    /// Position of this filter in [`Filter::CHAIN`].
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Filter::AtLeastOneCluster => 0,
            Filter::AtLeastOneParticle => 1,
            Filter::LeadingPion => 2,
        }
    }

    /// Names of the whole chain.
    pub fn chain_names() -> impl Iterator<Item = &'static str> {
        Self::CHAIN.iter().map(|filter| filter.name())
    }
}

/// `nClusters` and `nParticles`, defined for every event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Multiplicity {
    pub n_clusters: usize,
    pub n_particles: usize,
}

impl Multiplicity {
    #[must_use]
    pub fn of(event: &Event) -> Self {
        Self {
            n_clusters: event.n_clusters(),
            n_particles: event.n_particles(),
        }
    }
}

/// Quantities defined for events passing the whole chain.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Derived {
    /// Leading cluster raw energy in GeV.
    pub leading_cluster_e: f64,
    /// Leading cluster pT over leading particle pT, or [`RESPONSE_SENTINEL`].
    pub response: f64,
    /// Leading particle pT in GeV.
    pub lead_particle_pt: f64,
    /// Leading particle pseudorapidity.
    pub lead_particle_eta: f64,
}

impl Derived {
    /// Computes the leading-object quantities of an event with
    /// `n_clusters` clusters led by `cluster`, and leading particle
    /// `particle`.
    #[must_use]
    pub fn compute(cluster: &Cluster, n_clusters: usize, particle: &Particle) -> Self {
        Self {
            leading_cluster_e: mev_to_gev(cluster.raw_e),
            response: response(cluster, n_clusters, particle),
            lead_particle_pt: mev_to_gev(particle.pt),
            lead_particle_eta: particle.eta,
        }
    }
}

/// Result of running one event through the chain.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Outcome {
    /// Rejected by `filter`; later filters never saw the event.
    Rejected {
        multiplicity: Multiplicity,
        filter: Filter,
    },
    /// Passed every filter.
    Accepted {
        multiplicity: Multiplicity,
        pdg_id_lead: i32,
        derived: Derived,
    },
}

impl Outcome {
    #[must_use]
    pub fn multiplicity(&self) -> Multiplicity {
        match self {
            Outcome::Rejected { multiplicity, .. } | Outcome::Accepted { multiplicity, .. } => {
                *multiplicity
            }
        }
    }

    /// Number of consecutive filters the event passed.
    #[must_use]
    pub fn filters_passed(&self) -> usize {
        match self {
            Outcome::Rejected { filter, .. } => filter.index(),
            Outcome::Accepted { .. } => Filter::CHAIN.len(),
        }
    }

    #[must_use]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }

    /// Derived quantities, if the event passed every filter.
    #[must_use]
    pub fn derived(&self) -> Option<&Derived> {
        match self {
            Outcome::Accepted { derived, .. } => Some(derived),
            Outcome::Rejected { .. } => None,
        }
    }
}

/// Runs `event` through the selection chain.
#[must_use]
pub fn evaluate(event: &Event) -> Outcome {
    let multiplicity = Multiplicity::of(event);

    let Some(cluster) = event.leading_cluster() else {
        return Outcome::Rejected {
            multiplicity,
            filter: Filter::AtLeastOneCluster,
        };
    };
    let Some(particle) = event.leading_particle() else {
        return Outcome::Rejected {
            multiplicity,
            filter: Filter::AtLeastOneParticle,
        };
    };

    let pdg_id_lead = particle.pdg_id;
    if pdg_id_lead != PION_PDG_ID {
        return Outcome::Rejected {
            multiplicity,
            filter: Filter::LeadingPion,
        };
    }

    Outcome::Accepted {
        multiplicity,
        pdg_id_lead,
        derived: Derived::compute(cluster, multiplicity.n_clusters, particle),
    }
}

/// pT response of the leading cluster `cluster` with respect to `particle`.
///
/// Fewer than [`RESPONSE_MIN_CLUSTERS`] clusters give [`RESPONSE_SENTINEL`].
/// The cluster pT comes from its raw energy, mass and eta. The particle
/// vector is built with the calibrated phi and mass of the leading cluster,
/// not the particle's own; only its pT enters the ratio.
///
/// Evaluated in `f64`. ROOT-based productions compute this ratio in single
/// precision, so a value sitting on a bin edge of the response histograms
/// can fall one bin apart from theirs.
#[must_use]
pub fn response(cluster: &Cluster, n_clusters: usize, particle: &Particle) -> f64 {
    if n_clusters < RESPONSE_MIN_CLUSTERS {
        return RESPONSE_SENTINEL;
    }

    let cluster_pt = pt_from_energy(cluster.raw_e, cluster.raw_m, cluster.raw_eta);
    let cluster_lv =
        PtEtaPhiMVector::new(cluster_pt, cluster.raw_eta, cluster.raw_phi, cluster.raw_m);
    let particle_lv = PtEtaPhiMVector::new(particle.pt, particle.eta, cluster.phi, cluster.m);

    cluster_lv.pt() / particle_lv.pt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pion(pt: f64) -> Particle {
        Particle::new(pt, 0.4, PION_PDG_ID)
    }

    #[test]
    fn test_rejects_event_without_clusters() {
        let event = Event::new(vec![], vec![pion(1000.0)]);
        let outcome = evaluate(&event);
        assert_eq!(
            outcome,
            Outcome::Rejected {
                multiplicity: Multiplicity {
                    n_clusters: 0,
                    n_particles: 1
                },
                filter: Filter::AtLeastOneCluster,
            }
        );
        assert_eq!(outcome.filters_passed(), 0);
    }

    #[test]
    fn test_rejects_event_without_particles() {
        let event = Event::new(vec![Cluster::from_raw(1000.0, 0.0, 0.0, 0.0)], vec![]);
        let outcome = evaluate(&event);
        assert!(matches!(
            outcome,
            Outcome::Rejected {
                filter: Filter::AtLeastOneParticle,
                ..
            }
        ));
        assert_eq!(outcome.filters_passed(), 1);
    }

    #[test]
    fn test_rejects_non_pion_leader() {
        let event = Event::new(
            vec![Cluster::from_raw(1000.0, 0.0, 0.0, 0.0)],
            vec![Particle::new(1000.0, 0.0, 22), pion(500.0)],
        );
        let outcome = evaluate(&event);
        assert!(matches!(
            outcome,
            Outcome::Rejected {
                filter: Filter::LeadingPion,
                ..
            }
        ));
        assert!(outcome.derived().is_none());
    }

    #[test]
    fn test_negative_pion_is_rejected() {
        let event = Event::new(
            vec![Cluster::from_raw(1000.0, 0.0, 0.0, 0.0)],
            vec![Particle::new(1000.0, 0.0, -211)],
        );
        assert!(!evaluate(&event).is_accepted());
    }

    #[test]
    fn test_single_cluster_gets_sentinel() {
        let event = Event::new(
            vec![Cluster::from_raw(20_000.0, 0.0, 0.0, 0.0)],
            vec![pion(20_000.0)],
        );
        let derived = *evaluate(&event).derived().unwrap();
        assert_eq!(derived.response, RESPONSE_SENTINEL);
        assert_relative_eq!(derived.leading_cluster_e, 20.0);
    }

    #[test]
    fn test_response_from_raw_cluster_kinematics() {
        let cluster = Cluster::from_raw(5000.0, 3000.0, 1.0, 0.5).with_calibrated(1.1, 2.0, 100.0);
        let particle = Particle::new(2000.0, 1.0, PION_PDG_ID);

        let expected = 4000.0 / 1.0_f64.cosh() / 2000.0;
        assert_relative_eq!(response(&cluster, 2, &particle), expected, max_relative = 1e-12);
        assert_eq!(response(&cluster, 1, &particle), RESPONSE_SENTINEL);
    }

    #[test]
    fn test_response_ignores_calibrated_fields_for_ratio() {
        let base = Cluster::from_raw(8000.0, 0.0, 0.2, 0.1);
        let particle = pion(4000.0);

        let a = response(&base, 2, &particle);
        let b = response(&base.with_calibrated(2.5, -3.0, 500.0), 2, &particle);
        assert_relative_eq!(a, b);
    }

    #[test]
    fn test_accepted_derived_quantities() {
        let event = Event::new(
            vec![
                Cluster::from_raw(30_000.0, 0.0, 0.0, 0.0),
                Cluster::from_raw(1_000.0, 0.0, 0.3, 1.0),
            ],
            vec![Particle::new(25_000.0, -1.2, PION_PDG_ID)],
        );
        let outcome = evaluate(&event);
        let Outcome::Accepted {
            multiplicity,
            pdg_id_lead,
            derived,
        } = outcome
        else {
            panic!("event should pass the chain");
        };

        assert_eq!(multiplicity.n_clusters, 2);
        assert_eq!(pdg_id_lead, PION_PDG_ID);
        assert_relative_eq!(derived.leading_cluster_e * 1000.0, 30_000.0);
        assert_relative_eq!(derived.lead_particle_pt, 25.0);
        assert_relative_eq!(derived.lead_particle_eta, -1.2);
        assert_relative_eq!(derived.response, 1.2, max_relative = 1e-12);
    }

    #[test]
    fn test_filters_passed_matches_rejecting_filter() {
        let cases = [
            (Event::new(vec![], vec![]), 0),
            (Event::new(vec![], vec![pion(1.0)]), 0),
            (
                Event::new(vec![Cluster::from_raw(1.0, 0.0, 0.0, 0.0)], vec![]),
                1,
            ),
            (
                Event::new(
                    vec![Cluster::from_raw(1.0, 0.0, 0.0, 0.0)],
                    vec![Particle::new(1.0, 0.0, 22)],
                ),
                2,
            ),
            (
                Event::new(vec![Cluster::from_raw(1.0, 0.0, 0.0, 0.0)], vec![pion(1.0)]),
                3,
            ),
        ];
        for (event, passed) in cases {
            assert_eq!(evaluate(&event).filters_passed(), passed);
        }
    }

    #[test]
    fn test_chain_names() {
        let names: Vec<&str> = Filter::chain_names().collect();
        assert_eq!(
            names,
            vec!["At least 1 cluster", "At least 1 particle", "At least 1 pion"]
        );
    }
}
