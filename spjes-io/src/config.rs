//! Run configuration.

use crate::{Error, Result};
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default output container.
pub const DEFAULT_OUTPUT: &str = "analysis_output.json";
/// Default tree holding the events.
pub const DEFAULT_TREE_NAME: &str = "CollectionTree";
/// Default calorimeter cluster collection.
pub const DEFAULT_CLUSTER_COLLECTION: &str = "CaloCalTopoClusters";
/// Default truth particle collection.
pub const DEFAULT_PARTICLE_COLLECTION: &str = "TruthParticles";
/// Default number of events decoded per chunk.
pub const DEFAULT_CHUNK_EVENTS: usize = 10_000;

/// Configuration for one analysis run.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisConfig {
    /// Event files, processed in order as one dataset.
    pub input_files: Vec<PathBuf>,
    /// Output container; the format follows the extension.
    pub output: PathBuf,
    /// Tree (top-level group) holding the events.
    pub tree_name: String,
    /// Name of the cluster collection inside each event.
    pub cluster_collection: String,
    /// Name of the truth particle collection inside each event.
    pub particle_collection: String,
    /// Events decoded per chunk.
    pub chunk_events: usize,
    /// Worker threads; `None` uses the rayon default.
    pub threads: Option<usize>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input_files: Vec::new(),
            output: PathBuf::from(DEFAULT_OUTPUT),
            tree_name: DEFAULT_TREE_NAME.to_string(),
            cluster_collection: DEFAULT_CLUSTER_COLLECTION.to_string(),
            particle_collection: DEFAULT_PARTICLE_COLLECTION.to_string(),
            chunk_events: DEFAULT_CHUNK_EVENTS,
            threads: None,
        }
    }
}

impl AnalysisConfig {
    /// Creates a configuration reading `input_files` with default settings.
    pub fn new<I, P>(input_files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            input_files: input_files.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    #[must_use]
    pub fn with_tree_name(mut self, tree_name: impl Into<String>) -> Self {
        self.tree_name = tree_name.into();
        self
    }

    /// Sets the cluster and particle collection names.
    #[must_use]
    pub fn with_collections(
        mut self,
        clusters: impl Into<String>,
        particles: impl Into<String>,
    ) -> Self {
        self.cluster_collection = clusters.into();
        self.particle_collection = particles.into();
        self
    }

    #[must_use]
    pub fn with_chunk_events(mut self, chunk_events: usize) -> Self {
        self.chunk_events = chunk_events;
        self
    }

    #[must_use]
    pub fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Checks that the configuration can drive a run.
    ///
    /// # Errors
    /// Returns an error if there are no inputs, the chunk size is zero, or
    /// a name is empty.
    pub fn validate(&self) -> Result<()> {
        if self.input_files.is_empty() {
            return Err(config_error("no input files"));
        }
        if self.chunk_events == 0 {
            return Err(config_error("chunk_events must be positive"));
        }
        if self.tree_name.is_empty() {
            return Err(config_error("tree name must not be empty"));
        }
        if self.cluster_collection.is_empty() || self.particle_collection.is_empty() {
            return Err(config_error("collection names must not be empty"));
        }
        Ok(())
    }
}

fn config_error(message: &str) -> Error {
    spjes_core::Error::ConfigError(message.to_string()).into()
}
