//! spjes-io: Event sources, histogram containers and the analysis run.
//!
//! Event files are memory-mapped JSON by default; HDF5 event groups and
//! histogram containers are available with the `hdf5` feature. The
//! [`Analyzer`] ties the readers, the parallel pipeline and the output
//! container together.
//!

mod analysis;
mod config;
mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
mod writer;

pub use analysis::{run_single_particle_jes_analysis, AnalysisSummary, Analyzer};
pub use config::{
    AnalysisConfig, DEFAULT_CHUNK_EVENTS, DEFAULT_CLUSTER_COLLECTION, DEFAULT_OUTPUT,
    DEFAULT_PARTICLE_COLLECTION, DEFAULT_TREE_NAME,
};
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{read_histogram_hdf5, write_events_hdf5, Hdf5EventFile, Hdf5HistogramWriter};
pub use reader::{CollectionNames, EventSource, FileFormat, JsonEventFile, MappedFileReader};
pub use writer::{
    read_histogram_file, AxisRecord, HistogramFile, HistogramRecord, HistogramSink,
    JsonHistogramWriter, FORMAT_VERSION,
};
