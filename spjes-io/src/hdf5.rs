//! HDF5 event sources and histogram containers.
//!
//! Events live in `/<tree>/<collection>/`, one 1-D dataset per object field
//! plus `event_index` holding the first object of each event (the
//! `NXevent_data` convention). Histograms are written under
//! `/histograms/<name>/` as `contents`, `sumw2` and `<axis>_edges`.

use crate::reader::CollectionNames;
use crate::writer::{AxisRecord, HistogramRecord, FORMAT_VERSION};
use crate::{Error, Result};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use ndarray::{s, ArrayView, ArrayView1, IxDyn};
use spjes_core::{Cluster, Event, Histogram, Particle};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const HISTOGRAM_GROUP: &str = "histograms";
const AXIS_NAMES: [&str; 3] = ["x", "y", "z"];

/// An open collection group with its event offsets.
struct CollectionGroup {
    name: String,
    group: Group,
    event_index: Vec<usize>,
    n_objects: usize,
}

impl CollectionGroup {
    fn open(tree: &Group, name: &str, sizing_field: &str) -> Result<Self> {
        let group = tree.group(name).map_err(|_| {
            Error::InvalidFormat(format!("collection '{name}' not found in HDF5 tree"))
        })?;
        let event_index = read_dataset_vec::<u64>(&group, "event_index")?
            .into_iter()
            .map(|offset| {
                usize::try_from(offset)
                    .map_err(|_| Error::InvalidFormat(format!("{name}: event_index overflow")))
            })
            .collect::<Result<Vec<_>>>()?;
        let n_objects = group.dataset(sizing_field)?.size();

        if event_index.windows(2).any(|w| w[0] > w[1])
            || event_index.last().is_some_and(|&last| last > n_objects)
        {
            return Err(Error::InvalidFormat(format!(
                "{name}: event_index must be non-decreasing and within {n_objects} objects"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            group,
            event_index,
            n_objects,
        })
    }

    fn n_events(&self) -> usize {
        self.event_index.len()
    }

    /// Object range `[first, last)` of event `index`.
    fn event_range(&self, index: usize) -> (usize, usize) {
        let first = self.event_index[index];
        let last = self
            .event_index
            .get(index + 1)
            .copied()
            .unwrap_or(self.n_objects);
        (first, last)
    }

    /// Object range covering events `[start, end)`.
    fn span(&self, start: usize, end: usize) -> (usize, usize) {
        let first = self.event_index[start];
        let last = self.event_index.get(end).copied().unwrap_or(self.n_objects);
        (first, last)
    }

    fn read_field<T: H5Type>(&self, field: &str, first: usize, last: usize) -> Result<Vec<T>> {
        if first == last {
            return Ok(Vec::new());
        }
        let dataset = self.group.dataset(field).map_err(|_| {
            Error::InvalidFormat(format!("{}: missing field dataset '{field}'", self.name))
        })?;
        Ok(dataset.read_slice_1d::<T, _>(s![first..last])?.to_vec())
    }
}

/// Cluster fields of one span, column-wise.
struct ClusterColumns {
    raw_e: Vec<f64>,
    raw_m: Vec<f64>,
    raw_eta: Vec<f64>,
    raw_phi: Vec<f64>,
    eta: Vec<f64>,
    phi: Vec<f64>,
    m: Vec<f64>,
}

impl ClusterColumns {
    fn read(group: &CollectionGroup, first: usize, last: usize) -> Result<Self> {
        Ok(Self {
            raw_e: group.read_field("rawE", first, last)?,
            raw_m: group.read_field("rawM", first, last)?,
            raw_eta: group.read_field("rawEta", first, last)?,
            raw_phi: group.read_field("rawPhi", first, last)?,
            eta: group.read_field("eta", first, last)?,
            phi: group.read_field("phi", first, last)?,
            m: group.read_field("m", first, last)?,
        })
    }

    fn get(&self, i: usize) -> Cluster {
        Cluster {
            raw_e: self.raw_e[i],
            raw_m: self.raw_m[i],
            raw_eta: self.raw_eta[i],
            raw_phi: self.raw_phi[i],
            eta: self.eta[i],
            phi: self.phi[i],
            m: self.m[i],
        }
    }
}

/// Particle fields of one span, column-wise.
struct ParticleColumns {
    pt: Vec<f64>,
    eta: Vec<f64>,
    pdg_id: Vec<i32>,
}

impl ParticleColumns {
    fn read(group: &CollectionGroup, first: usize, last: usize) -> Result<Self> {
        Ok(Self {
            pt: group.read_field("pt", first, last)?,
            eta: group.read_field("eta", first, last)?,
            pdg_id: group.read_field("pdgId", first, last)?,
        })
    }

    fn get(&self, i: usize) -> Particle {
        Particle::new(self.pt[i], self.eta[i], self.pdg_id[i])
    }
}

/// Events stored in an HDF5 file, read by hyperslab.
pub struct Hdf5EventFile {
    _file: File,
    path: PathBuf,
    clusters: CollectionGroup,
    particles: CollectionGroup,
}

impl Hdf5EventFile {
    /// Opens `path` and the two collection groups of `tree`.
    ///
    /// # Errors
    /// Returns an error if the file or tree is missing, or the collection
    /// groups are inconsistent.
    pub fn open<P: AsRef<Path>>(path: P, tree: &str, collections: CollectionNames) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let tree_group = file.group(tree).map_err(|_| Error::MissingTree {
            tree: tree.to_string(),
            path: path.clone(),
        })?;

        let clusters = CollectionGroup::open(&tree_group, &collections.clusters, "rawE")?;
        let particles = CollectionGroup::open(&tree_group, &collections.particles, "pt")?;
        if clusters.n_events() != particles.n_events() {
            return Err(Error::InvalidFormat(format!(
                "'{}' has {} events but '{}' has {}",
                clusters.name,
                clusters.n_events(),
                particles.name,
                particles.n_events()
            )));
        }

        log::debug!(
            "{}: {} events in tree '{tree}'",
            path.display(),
            clusters.n_events()
        );
        Ok(Self {
            _file: file,
            path,
            clusters,
            particles,
        })
    }

    #[must_use]
    pub fn n_events(&self) -> usize {
        self.clusters.n_events()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads events `[start, end)`.
    ///
    /// # Errors
    /// Returns an error if a field dataset is missing or HDF5 I/O fails.
    pub fn read_events(&self, start: usize, end: usize) -> Result<Vec<Event>> {
        let end = end.min(self.n_events());
        if start >= end {
            return Ok(Vec::new());
        }

        let (c_first, c_last) = self.clusters.span(start, end);
        let (p_first, p_last) = self.particles.span(start, end);
        let cluster_cols = ClusterColumns::read(&self.clusters, c_first, c_last)?;
        let particle_cols = ParticleColumns::read(&self.particles, p_first, p_last)?;

        Ok((start..end)
            .map(|index| {
                let (a, b) = self.clusters.event_range(index);
                let clusters = (a..b).map(|k| cluster_cols.get(k - c_first)).collect();
                let (a, b) = self.particles.event_range(index);
                let particles = (a..b).map(|k| particle_cols.get(k - p_first)).collect();
                Event::new(clusters, particles)
            })
            .collect())
    }

    /// Reads the events in order and hands them to `on_chunk`, at most
    /// `chunk_events` at a time. One hyperslab per collection is read for
    /// each chunk.
    ///
    /// # Errors
    /// Returns the first HDF5 error, or the first error of `on_chunk`.
    pub fn for_each_chunk<F>(&self, chunk_events: usize, mut on_chunk: F) -> Result<()>
    where
        F: FnMut(Vec<Event>) -> Result<()>,
    {
        let step = chunk_events.max(1);
        let mut start = 0;
        while start < self.n_events() {
            let end = start.saturating_add(step).min(self.n_events());
            on_chunk(self.read_events(start, end)?)?;
            start = end;
        }
        Ok(())
    }
}

/// Writes events to `/<tree>/<collection>/` of a new HDF5 file.
///
/// # Errors
/// Returns an error if HDF5 I/O fails.
pub fn write_events_hdf5<P: AsRef<Path>>(
    path: P,
    tree: &str,
    collections: &CollectionNames,
    events: &[Event],
) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str_file(&file, "spjes_format_version", FORMAT_VERSION)?;
    let tree_group = file.create_group(tree)?;

    let clusters = tree_group.create_group(&collections.clusters)?;
    let all_clusters: Vec<&Cluster> = events.iter().flat_map(|e| &e.clusters).collect();
    write_event_index(&clusters, events.iter().map(Event::n_clusters))?;
    let columns: [(&str, fn(&Cluster) -> f64); 7] = [
        ("rawE", |c| c.raw_e),
        ("rawM", |c| c.raw_m),
        ("rawEta", |c| c.raw_eta),
        ("rawPhi", |c| c.raw_phi),
        ("eta", |c| c.eta),
        ("phi", |c| c.phi),
        ("m", |c| c.m),
    ];
    for (name, field) in columns {
        let values: Vec<f64> = all_clusters.iter().map(|c| field(c)).collect();
        write_vec(&clusters, name, &values)?;
    }

    let particles = tree_group.create_group(&collections.particles)?;
    let all_particles: Vec<&Particle> = events.iter().flat_map(|e| &e.particles).collect();
    write_event_index(&particles, events.iter().map(Event::n_particles))?;
    let pt: Vec<f64> = all_particles.iter().map(|p| p.pt).collect();
    let eta: Vec<f64> = all_particles.iter().map(|p| p.eta).collect();
    let pdg_id: Vec<i32> = all_particles.iter().map(|p| p.pdg_id).collect();
    write_vec(&particles, "pt", &pt)?;
    write_vec(&particles, "eta", &eta)?;
    write_vec(&particles, "pdgId", &pdg_id)?;

    Ok(())
}

fn write_event_index(group: &Group, counts: impl Iterator<Item = usize>) -> Result<()> {
    let mut offset = 0u64;
    let index: Vec<u64> = counts
        .map(|count| {
            let first = offset;
            offset += count as u64;
            first
        })
        .collect();
    write_vec(group, "event_index", &index)
}

/// Streaming writer for HDF5 histogram containers.
pub struct Hdf5HistogramWriter {
    file: File,
    histograms: Group,
}

impl Hdf5HistogramWriter {
    /// Creates (truncates) the output file.
    ///
    /// # Errors
    /// Returns [`Error::OutputOpen`] if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::OutputOpen {
            path: path.to_path_buf(),
            source: e.to_string().into(),
        })?;
        set_attr_str_file(&file, "spjes_format_version", FORMAT_VERSION)?;
        let histograms = file.create_group(HISTOGRAM_GROUP)?;
        Ok(Self { file, histograms })
    }

    /// Writes one histogram group.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn write(&mut self, histogram: &Histogram) -> Result<()> {
        let group = self.histograms.create_group(histogram.name())?;
        set_attr_str_group(&group, "title", histogram.title())?;
        group
            .new_attr::<u64>()
            .create("entries")?
            .write_scalar(&histogram.entries())?;

        let axes = histogram.axes();
        // Slowest axis first, so x runs fastest like the flattened storage.
        let shape: Vec<usize> = axes.iter().rev().map(|axis| axis.n_cells()).collect();
        write_nd(&group, "contents", &shape, histogram.contents())?;
        write_nd(&group, "sumw2", &shape, histogram.sumw2())?;

        for (axis, name) in axes.iter().zip(AXIS_NAMES) {
            write_vec(&group, &format!("{name}_edges"), &axis.edges())?;
        }
        Ok(())
    }

    /// Flushes and closes the file.
    ///
    /// # Errors
    /// Returns an error if the flush fails.
    pub fn close(self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }
}

/// Reads histogram `name` back from an HDF5 container.
///
/// # Errors
/// Returns an error if the group or one of its datasets is missing.
pub fn read_histogram_hdf5<P: AsRef<Path>>(path: P, name: &str) -> Result<HistogramRecord> {
    let file = File::open(path)?;
    let group = file.group(HISTOGRAM_GROUP)?.group(name)?;

    let title: VarLenUnicode = group.attr("title")?.read_scalar()?;
    let entries: u64 = group.attr("entries")?.read_scalar()?;
    let contents = read_dataset_vec::<f64>(&group, "contents")?;
    let sumw2 = read_dataset_vec::<f64>(&group, "sumw2")?;

    let mut axes = Vec::new();
    for axis in AXIS_NAMES {
        let Ok(dataset) = group.dataset(&format!("{axis}_edges")) else {
            break;
        };
        let edges = dataset.read_raw::<f64>()?;
        let (Some(&min), Some(&max)) = (edges.first(), edges.last()) else {
            return Err(Error::InvalidFormat(format!("{name}: empty {axis} edges")));
        };
        axes.push(AxisRecord {
            n_bins: edges.len() - 1,
            min,
            max,
        });
    }

    Ok(HistogramRecord {
        name: name.to_string(),
        title: title.to_string(),
        axes,
        contents,
        sumw2,
        entries,
    })
}

fn write_nd(group: &Group, name: &str, shape: &[usize], data: &[f64]) -> Result<()> {
    let view = ArrayView::from_shape(IxDyn(shape), data)
        .map_err(|e| Error::InvalidFormat(format!("{name} shape mismatch: {e}")))?;
    let dataset = create_fixed_dataset::<f64, _>(group, name, shape.to_vec())?;
    dataset.write(view)?;
    Ok(())
}

fn write_vec<T: H5Type>(group: &Group, name: &str, data: &[T]) -> Result<()> {
    let dataset = create_fixed_dataset::<T, _>(group, name, (data.len(),))?;
    if !data.is_empty() {
        dataset.write(ArrayView1::from(data))?;
    }
    Ok(())
}

fn create_fixed_dataset<T: H5Type, S>(group: &Group, name: &str, shape: S) -> Result<Dataset>
where
    S: Into<hdf5::Extents>,
{
    Ok(group.new_dataset::<T>().shape(shape).create(name)?)
}

fn set_attr_str_file(file: &File, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    file.new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_group(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn read_dataset_vec<T: H5Type>(group: &Group, name: &str) -> Result<Vec<T>> {
    let dataset = group.dataset(name)?;
    Ok(dataset.read_raw::<T>()?)
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use spjes_core::{Axis, Hist1D, Hist3D};
    use tempfile::NamedTempFile;

    fn events() -> Vec<Event> {
        (0..5)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let clusters = (0..i)
                    .map(|k| Cluster::from_raw(1000.0 * (k + 1) as f64, 10.0, 0.1, 0.2))
                    .collect();
                let particles = if i == 2 {
                    vec![]
                } else {
                    vec![Particle::new(2000.0, -0.3, 211), Particle::new(10.0, 0.0, 22)]
                };
                Event::new(clusters, particles)
            })
            .collect()
    }

    #[test]
    fn test_hdf5_event_roundtrip_in_chunks() {
        let file = NamedTempFile::with_suffix(".h5").unwrap();
        let names = CollectionNames::default();
        let written = events();
        write_events_hdf5(file.path(), "CollectionTree", &names, &written).unwrap();

        let source = Hdf5EventFile::open(file.path(), "CollectionTree", names).unwrap();
        assert_eq!(source.n_events(), 5);

        let mut read = Vec::new();
        let mut sizes = Vec::new();
        source
            .for_each_chunk(2, |chunk| {
                sizes.push(chunk.len());
                read.extend(chunk);
                Ok(())
            })
            .unwrap();
        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(read, written);
    }

    #[test]
    fn test_hdf5_missing_tree() {
        let file = NamedTempFile::with_suffix(".h5").unwrap();
        let names = CollectionNames::default();
        write_events_hdf5(file.path(), "Events", &names, &events()).unwrap();

        let result = Hdf5EventFile::open(file.path(), "CollectionTree", names);
        assert!(matches!(result, Err(Error::MissingTree { .. })));
    }

    #[test]
    fn test_hdf5_histogram_container() {
        let file = NamedTempFile::with_suffix(".h5").unwrap();
        let mut h1 = Hist1D::new("h1", "One;x;Events", Axis::new(3, 0.0, 3.0).unwrap());
        h1.fill(1.5);
        h1.fill(-2.0);
        let axis = Axis::new(2, 0.0, 1.0).unwrap();
        let mut h3 = Hist3D::new("h3", "Three", axis.clone(), axis.clone(), axis);
        h3.fill(0.25, 0.75, 0.25);

        let mut writer = Hdf5HistogramWriter::create(file.path()).unwrap();
        writer.write(&h1.clone().into()).unwrap();
        writer.write(&h3.clone().into()).unwrap();
        writer.close().unwrap();

        let one = read_histogram_hdf5(file.path(), "h1").unwrap();
        assert_eq!(one.title, "One;x;Events");
        assert_eq!(one.entries, 2);
        assert_eq!(one.contents, h1.contents());
        assert_relative_eq!(one.integral(), 1.0);

        let three = read_histogram_hdf5(file.path(), "h3").unwrap();
        assert_eq!(three.axes.len(), 3);
        assert_eq!(three.contents, h3.contents());
        assert_relative_eq!(three.integral(), 1.0);
    }
}
