//! spjes-core: Core types for single-particle jet energy scale analysis.
//!
//! This crate provides the event model (calorimeter clusters and truth
//! particles), four-vector kinematics, fixed-binning histograms and the
//! cut-flow report shared by the pipeline and I/O crates.
//!

pub mod cutflow;
pub mod error;
pub mod event;
pub mod histogram;
pub mod kinematics;

pub use cutflow::{CutFlow, FilterCount};
pub use error::{Error, Result};
pub use event::{Cluster, Event, Particle};
pub use histogram::{Axis, Hist1D, Hist3D, Histogram};
pub use kinematics::{mev_to_gev, pt_from_energy, PtEtaPhiMVector, MEV_PER_GEV};
