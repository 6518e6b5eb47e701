//! spjes-pipeline: Per-event selection and histogram filling.
//!
//! This crate provides:
//! - **selection** - the filter chain and derived leading-object quantities
//! - **booking** - the six analysis histograms and the stage each one reads
//! - **processing** - rayon fold/reduce over a chunk of events
//!

pub mod booking;
pub mod processing;
pub mod selection;

pub use booking::HistogramBook;
pub use processing::{enable_implicit_mt, process_events, Accumulator};
pub use selection::{
    evaluate, response, Derived, Filter, Multiplicity, Outcome, PION_PDG_ID,
    RESPONSE_MIN_CLUSTERS, RESPONSE_SENTINEL,
};
