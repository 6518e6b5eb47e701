//! Histogram container writers.

use crate::reader::FileFormat;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use spjes_core::{Axis, Histogram};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Version tag written into every container.
pub const FORMAT_VERSION: &str = "0.1";

/// Binning of one histogram axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AxisRecord {
    pub n_bins: usize,
    pub min: f64,
    pub max: f64,
}

impl From<&Axis> for AxisRecord {
    fn from(axis: &Axis) -> Self {
        Self {
            n_bins: axis.n_bins(),
            min: axis.min(),
            max: axis.max(),
        }
    }
}

/// One stored histogram.
///
/// `contents` and `sumw2` include the under/overflow cells of every axis,
/// x varying fastest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramRecord {
    pub name: String,
    pub title: String,
    pub axes: Vec<AxisRecord>,
    pub contents: Vec<f64>,
    pub sumw2: Vec<f64>,
    pub entries: u64,
}

impl From<&Histogram> for HistogramRecord {
    fn from(histogram: &Histogram) -> Self {
        Self {
            name: histogram.name().to_string(),
            title: histogram.title().to_string(),
            axes: histogram.axes().into_iter().map(AxisRecord::from).collect(),
            contents: histogram.contents().to_vec(),
            sumw2: histogram.sumw2().to_vec(),
            entries: histogram.entries(),
        }
    }
}

impl HistogramRecord {
    /// Sum of the in-range cells.
    #[must_use]
    pub fn integral(&self) -> f64 {
        let strides: Vec<usize> = self
            .axes
            .iter()
            .scan(1, |stride, axis| {
                let current = *stride;
                *stride *= axis.n_bins + 2;
                Some(current)
            })
            .collect();
        self.contents
            .iter()
            .enumerate()
            .filter(|(index, _)| {
                self.axes.iter().zip(&strides).all(|(axis, stride)| {
                    let bin = (index / stride) % (axis.n_bins + 2);
                    (1..=axis.n_bins).contains(&bin)
                })
            })
            .map(|(_, content)| content)
            .sum()
    }
}

/// A whole histogram container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistogramFile {
    pub format_version: String,
    pub histograms: Vec<HistogramRecord>,
}

impl HistogramFile {
    /// Looks a histogram up by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HistogramRecord> {
        self.histograms.iter().find(|h| h.name == name)
    }

    /// Names in write order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.histograms.iter().map(|h| h.name.as_str())
    }
}

/// Writer for JSON histogram containers.
///
/// The file is created (and truncated) on [`JsonHistogramWriter::create`];
/// histograms are buffered and serialized on [`JsonHistogramWriter::close`].
/// A writer dropped without `close` leaves the file empty.
pub struct JsonHistogramWriter {
    writer: BufWriter<File>,
    path: PathBuf,
    histograms: Vec<HistogramRecord>,
}

impl JsonHistogramWriter {
    /// Creates the output file.
    ///
    /// # Errors
    /// Returns [`Error::OutputOpen`] if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| Error::OutputOpen {
            path: path.clone(),
            source: Box::new(source),
        })?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
            histograms: Vec::new(),
        })
    }

    /// Queues a histogram.
    pub fn write(&mut self, histogram: &Histogram) {
        self.histograms.push(HistogramRecord::from(histogram));
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes the container and flushes the file.
    ///
    /// # Errors
    /// Returns an error if serialization or I/O fails.
    pub fn close(mut self) -> Result<()> {
        let container = HistogramFile {
            format_version: FORMAT_VERSION.to_string(),
            histograms: std::mem::take(&mut self.histograms),
        };
        serde_json::to_writer(&mut self.writer, &container)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Reads a JSON histogram container.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn read_histogram_file<P: AsRef<Path>>(path: P) -> Result<HistogramFile> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// An open output container of any supported format.
pub enum HistogramSink {
    Json(JsonHistogramWriter),
    #[cfg(feature = "hdf5")]
    Hdf5(crate::hdf5::Hdf5HistogramWriter),
}

impl HistogramSink {
    /// Creates the output container at `path`, format by extension.
    ///
    /// # Errors
    /// Returns [`Error::OutputOpen`] if the container cannot be created, or
    /// [`Error::UnsupportedFormat`] if its format is not compiled in.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match FileFormat::from_path(path) {
            FileFormat::Json => Ok(Self::Json(JsonHistogramWriter::create(path)?)),
            #[cfg(feature = "hdf5")]
            FileFormat::Hdf5 => Ok(Self::Hdf5(crate::hdf5::Hdf5HistogramWriter::create(path)?)),
            #[cfg(not(feature = "hdf5"))]
            FileFormat::Hdf5 => Err(Error::UnsupportedFormat(format!(
                "{} needs the `hdf5` feature",
                path.display()
            ))),
        }
    }

    /// Writes one histogram.
    ///
    /// # Errors
    /// Returns an error if the backend fails to store it.
    pub fn write(&mut self, histogram: &Histogram) -> Result<()> {
        match self {
            Self::Json(writer) => {
                writer.write(histogram);
                Ok(())
            }
            #[cfg(feature = "hdf5")]
            Self::Hdf5(writer) => writer.write(histogram),
        }
    }

    /// Finalizes and closes the container.
    ///
    /// # Errors
    /// Returns an error if the final write or flush fails.
    pub fn close(self) -> Result<()> {
        match self {
            Self::Json(writer) => writer.close(),
            #[cfg(feature = "hdf5")]
            Self::Hdf5(writer) => writer.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use spjes_core::{Hist1D, Hist3D};
    use tempfile::{tempdir, NamedTempFile};

    fn sample_1d() -> Histogram {
        let mut h = Hist1D::new("h_x", "X;x;Events", Axis::new(4, 0.0, 4.0).unwrap());
        h.fill(0.5);
        h.fill(2.5);
        h.fill(9.0);
        h.into()
    }

    #[test]
    fn test_write_and_read_back() {
        let file = NamedTempFile::with_suffix(".json").unwrap();
        let mut writer = JsonHistogramWriter::create(file.path()).unwrap();
        writer.write(&sample_1d());
        writer.close().unwrap();

        let container = read_histogram_file(file.path()).unwrap();
        assert_eq!(container.format_version, FORMAT_VERSION);
        let h = container.get("h_x").unwrap();
        assert_eq!(h.title, "X;x;Events");
        assert_eq!(h.entries, 3);
        assert_eq!(h.contents.len(), 6);
        assert_relative_eq!(h.contents[5], 1.0);
        assert_relative_eq!(h.integral(), 2.0);
        assert_eq!(
            h.axes,
            vec![AxisRecord {
                n_bins: 4,
                min: 0.0,
                max: 4.0
            }]
        );
    }

    #[test]
    fn test_3d_integral_skips_flow_cells() {
        let axis = Axis::new(2, 0.0, 2.0).unwrap();
        let mut h = Hist3D::new("h3", "", axis.clone(), axis.clone(), axis);
        h.fill(0.5, 0.5, 0.5);
        h.fill(1.5, 0.5, 1.5);
        h.fill(-1.0, 0.5, 0.5);
        let record = HistogramRecord::from(&Histogram::from(h));

        assert_eq!(record.contents.len(), 64);
        assert_relative_eq!(record.integral(), 2.0);
        assert_eq!(record.entries, 3);
    }

    #[test]
    fn test_unclosed_writer_leaves_empty_file() {
        let file = NamedTempFile::with_suffix(".json").unwrap();
        {
            let mut writer = JsonHistogramWriter::create(file.path()).unwrap();
            writer.write(&sample_1d());
        }
        assert_eq!(std::fs::metadata(file.path()).unwrap().len(), 0);
    }

    #[test]
    fn test_output_open_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        let result = HistogramSink::create(&path);
        assert!(matches!(result, Err(Error::OutputOpen { path: p, .. }) if p == path));
    }
}
