//! Event sources: memory-mapped JSON files and, with the `hdf5` feature,
//! HDF5 event groups.
//!

use crate::config::AnalysisConfig;
use crate::{Error, Result};
use memmap2::Mmap;
use serde::de::{self, DeserializeSeed, Deserializer, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::Deserialize;
use spjes_core::{Cluster, Event, Particle};
use std::fmt;
use std::fs::File;
use std::result::Result as StdResult;
use std::path::{Path, PathBuf};

/// On-disk format, chosen by file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Hdf5,
}

impl FileFormat {
    /// `.h5`/`.hdf5` select HDF5; anything else is read as JSON.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("h5" | "hdf5") => Self::Hdf5,
            _ => Self::Json,
        }
    }
}

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without copying the whole file
/// into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Names of the collections decoded from each event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollectionNames {
    pub clusters: String,
    pub particles: String,
}

impl CollectionNames {
    pub fn new(clusters: impl Into<String>, particles: impl Into<String>) -> Self {
        Self {
            clusters: clusters.into(),
            particles: particles.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(
            config.cluster_collection.as_str(),
            config.particle_collection.as_str(),
        )
    }
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Events stored as JSON.
///
/// The document maps tree names to arrays of events. Each event is an
/// object mapping collection names to arrays of objects:
///
/// ```json
/// {"CollectionTree": [
///   {"CaloCalTopoClusters": [{"rawE": 1.0, "rawM": 0.0, "rawEta": 0.1,
///                             "rawPhi": 0.2, "eta": 0.1, "phi": 0.2, "m": 0.0}],
///    "TruthParticles": [{"pt": 1.0, "eta": 0.1, "pdgId": 211}]}
/// ]}
/// ```
///
/// Only the requested tree is decoded. Other top-level values, and other
/// keys inside an event, may hold anything and are skipped unparsed. The
/// tree is streamed from the mapping, so at most one chunk of events is
/// decoded at any time.
pub struct JsonEventFile {
    reader: MappedFileReader,
    tree: String,
    collections: CollectionNames,
    n_events: usize,
}

impl JsonEventFile {
    /// Maps `path` and counts the events of `tree`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be mapped or parsed, or if it has
    /// no tree named `tree`.
    pub fn open<P: AsRef<Path>>(path: P, tree: &str, collections: CollectionNames) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        let n_events = stream_tree(reader.as_bytes(), tree, CountEvents)?.ok_or_else(|| {
            Error::MissingTree {
                tree: tree.to_string(),
                path: reader.path().to_path_buf(),
            }
        })?;

        log::debug!(
            "{}: {n_events} events in tree '{tree}' ({} bytes)",
            reader.path().display(),
            reader.len()
        );
        Ok(Self {
            reader,
            tree: tree.to_string(),
            collections,
            n_events,
        })
    }

    #[must_use]
    pub fn n_events(&self) -> usize {
        self.n_events
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.reader.path()
    }

    /// Decodes the events of the tree in order and hands them to `on_chunk`,
    /// at most `chunk_events` at a time.
    ///
    /// # Errors
    /// Returns [`Error::MissingCollection`] or [`Error::InvalidEvent`] for an
    /// undecodable event, [`Error::Json`] for a malformed document, and the
    /// first error returned by `on_chunk`, which stops the decoding.
    pub fn for_each_chunk<F>(&self, chunk_events: usize, on_chunk: F) -> Result<()>
    where
        F: FnMut(Vec<Event>) -> Result<()>,
    {
        let chunk_events = chunk_events.max(1);
        let mut failure = None;
        let seed = ChunkedEvents {
            collections: &self.collections,
            chunk_events,
            capacity: chunk_events.min(self.n_events),
            on_chunk,
            failure: &mut failure,
        };
        let streamed = stream_tree(self.reader.as_bytes(), &self.tree, seed);
        if let Some(err) = failure {
            return Err(err);
        }
        streamed?.ok_or_else(|| Error::MissingTree {
            tree: self.tree.clone(),
            path: self.path().to_path_buf(),
        })
    }
}

/// Deserializes the value under `tree` of the top-level object with `seed`.
/// Returns `None` if the object has no such key.
fn stream_tree<'de, S>(
    bytes: &'de [u8],
    tree: &str,
    seed: S,
) -> serde_json::Result<Option<S::Value>>
where
    S: DeserializeSeed<'de>,
{
    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = TreeSeed { tree, seed }.deserialize(&mut de)?;
    de.end()?;
    Ok(value)
}

/// Stores `err` for the caller and aborts deserialization.
fn abort<E: de::Error>(failure: &mut Option<Error>, err: Error) -> E {
    let aborted = E::custom(&err);
    *failure = Some(err);
    aborted
}

struct TreeSeed<'t, S> {
    tree: &'t str,
    seed: S,
}

impl<'de, S: DeserializeSeed<'de>> DeserializeSeed<'de> for TreeSeed<'_, S> {
    type Value = Option<S::Value>;

    fn deserialize<D>(self, deserializer: D) -> StdResult<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de, S: DeserializeSeed<'de>> Visitor<'de> for TreeSeed<'_, S> {
    type Value = Option<S::Value>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping tree names to event arrays")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> StdResult<Self::Value, A::Error> {
        let mut seed = Some(self.seed);
        let mut found = None;
        while let Some(key) = map.next_key::<String>()? {
            if key == self.tree {
                if let Some(seed) = seed.take() {
                    found = Some(map.next_value_seed(seed)?);
                    continue;
                }
            }
            map.next_value::<IgnoredAny>()?;
        }
        Ok(found)
    }
}

/// Counts the elements of an event array without decoding them.
struct CountEvents;

impl<'de> DeserializeSeed<'de> for CountEvents {
    type Value = usize;

    fn deserialize<D>(self, deserializer: D) -> StdResult<usize, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de> Visitor<'de> for CountEvents {
    type Value = usize;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of events")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> StdResult<usize, A::Error> {
        let mut n = 0;
        while seq.next_element::<IgnoredAny>()?.is_some() {
            n += 1;
        }
        Ok(n)
    }
}

/// Decodes an event array, flushing every `chunk_events` events to
/// `on_chunk`.
struct ChunkedEvents<'a, F> {
    collections: &'a CollectionNames,
    chunk_events: usize,
    capacity: usize,
    on_chunk: F,
    failure: &'a mut Option<Error>,
}

impl<'de, F> DeserializeSeed<'de> for ChunkedEvents<'_, F>
where
    F: FnMut(Vec<Event>) -> Result<()>,
{
    type Value = ();

    fn deserialize<D>(self, deserializer: D) -> StdResult<(), D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_seq(self)
    }
}

impl<'de, F> Visitor<'de> for ChunkedEvents<'_, F>
where
    F: FnMut(Vec<Event>) -> Result<()>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an array of events")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> StdResult<(), A::Error> {
        let Self {
            collections,
            chunk_events,
            capacity,
            mut on_chunk,
            failure,
        } = self;

        let mut chunk = Vec::with_capacity(capacity);
        let mut index = 0;
        loop {
            let seed = EventSeed {
                collections,
                index,
                failure: &mut *failure,
            };
            let Some(event) = seq.next_element_seed(seed)? else {
                break;
            };
            chunk.push(event);
            index += 1;
            if chunk.len() == chunk_events {
                let full = std::mem::replace(&mut chunk, Vec::with_capacity(capacity));
                on_chunk(full).map_err(|err| abort::<A::Error>(failure, err))?;
            }
        }
        if !chunk.is_empty() {
            on_chunk(chunk).map_err(|err| abort::<A::Error>(failure, err))?;
        }
        Ok(())
    }
}

/// Decodes the configured collections of one event object.
struct EventSeed<'a> {
    collections: &'a CollectionNames,
    index: usize,
    failure: &'a mut Option<Error>,
}

impl<'de> DeserializeSeed<'de> for EventSeed<'_> {
    type Value = Event;

    fn deserialize<D>(self, deserializer: D) -> StdResult<Event, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for EventSeed<'_> {
    type Value = Event;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "event {} as a JSON object", self.index)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> StdResult<Event, A::Error> {
        let Self {
            collections,
            index,
            failure,
        } = self;

        let mut clusters: Option<Vec<Cluster>> = None;
        let mut particles: Option<Vec<Particle>> = None;
        while let Some(key) = map.next_key::<String>()? {
            if clusters.is_none() && key == collections.clusters {
                clusters = Some(next_collection(&mut map, &key, index, failure)?);
            } else if particles.is_none() && key == collections.particles {
                particles = Some(next_collection(&mut map, &key, index, failure)?);
            } else {
                map.next_value::<IgnoredAny>()?;
            }
        }

        let missing = |name: &str| Error::MissingCollection {
            collection: name.to_string(),
            event: index,
        };
        let Some(clusters) = clusters else {
            return Err(abort(failure, missing(&collections.clusters)));
        };
        let Some(particles) = particles else {
            return Err(abort(failure, missing(&collections.particles)));
        };
        Ok(Event::new(clusters, particles))
    }
}

fn next_collection<'de, A, T>(
    map: &mut A,
    name: &str,
    event: usize,
    failure: &mut Option<Error>,
) -> StdResult<Vec<T>, A::Error>
where
    A: MapAccess<'de>,
    T: Deserialize<'de>,
{
    map.next_value().map_err(|err: A::Error| {
        let invalid = Error::InvalidEvent {
            event,
            collection: name.to_string(),
            message: err.to_string(),
        };
        abort(failure, invalid)
    })
}

/// An opened event file of any supported format.
pub enum EventSource {
    Json(JsonEventFile),
    #[cfg(feature = "hdf5")]
    Hdf5(crate::hdf5::Hdf5EventFile),
}

impl EventSource {
    /// Opens `path`, picking the reader from its extension.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, lacks `tree`, or needs
    /// a disabled feature.
    pub fn open<P: AsRef<Path>>(path: P, tree: &str, collections: CollectionNames) -> Result<Self> {
        let path = path.as_ref();
        match FileFormat::from_path(path) {
            FileFormat::Json => Ok(Self::Json(JsonEventFile::open(path, tree, collections)?)),
            #[cfg(feature = "hdf5")]
            FileFormat::Hdf5 => Ok(Self::Hdf5(crate::hdf5::Hdf5EventFile::open(
                path,
                tree,
                collections,
            )?)),
            #[cfg(not(feature = "hdf5"))]
            FileFormat::Hdf5 => Err(Error::UnsupportedFormat(format!(
                "{} needs the `hdf5` feature",
                path.display()
            ))),
        }
    }

    #[must_use]
    pub fn n_events(&self) -> usize {
        match self {
            Self::Json(file) => file.n_events(),
            #[cfg(feature = "hdf5")]
            Self::Hdf5(file) => file.n_events(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Json(file) => file.path(),
            #[cfg(feature = "hdf5")]
            Self::Hdf5(file) => file.path(),
        }
    }

    /// Hands the events to `on_chunk` in order, at most `chunk_events` at
    /// a time.
    ///
    /// # Errors
    /// Returns the first read or decode error, or the first error of
    /// `on_chunk`.
    pub fn for_each_chunk<F>(&self, chunk_events: usize, on_chunk: F) -> Result<()>
    where
        F: FnMut(Vec<Event>) -> Result<()>,
    {
        match self {
            Self::Json(file) => file.for_each_chunk(chunk_events, on_chunk),
            #[cfg(feature = "hdf5")]
            Self::Hdf5(file) => file.for_each_chunk(chunk_events, on_chunk),
        }
    }
}
