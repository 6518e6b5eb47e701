//! Fixed-binning histograms with underflow/overflow bins.
//!
//! Bin numbering follows the ROOT convention: bin 0 is the underflow,
//! bins `1..=n_bins` cover the axis range, bin `n_bins + 1` is the overflow.
//! Multi-dimensional contents are stored flattened with the x index running
//! fastest, including the flow bins of every axis.

use crate::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Uniform binning over `[min, max)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Axis {
    n_bins: usize,
    min: f64,
    max: f64,
}

impl Axis {
    /// Creates a new axis.
    ///
    /// # Errors
    /// Returns an error if `n_bins` is zero or the range is empty or not finite.
    pub fn new(n_bins: usize, min: f64, max: f64) -> Result<Self> {
        if n_bins == 0 || !min.is_finite() || !max.is_finite() || min >= max {
            return Err(Error::InvalidAxis { n_bins, min, max });
        }
        Ok(Self { n_bins, min, max })
    }

    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    #[must_use]
    pub fn min(&self) -> f64 {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Number of stored cells including both flow bins.
    #[must_use]
    pub fn n_cells(&self) -> usize {
        self.n_bins + 2
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.n_bins as f64
    }

    /// Returns the bin holding `x`.
    ///
    /// Values below `min` go to the underflow; values at or above `max`, and
    /// NaN, go to the overflow.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn find_bin(&self, x: f64) -> usize {
        if x < self.min {
            return 0;
        }
        if x >= self.max || x.is_nan() {
            return self.n_bins + 1;
        }
        let bin = 1 + (self.n_bins as f64 * (x - self.min) / (self.max - self.min)) as usize;
        bin.min(self.n_bins)
    }

    /// Lower edge of `bin` (1-based).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_low_edge(&self, bin: usize) -> f64 {
        self.min + (bin as f64 - 1.0) * self.bin_width()
    }

    /// Centre of `bin` (1-based).
    #[must_use]
    pub fn bin_center(&self, bin: usize) -> f64 {
        self.bin_low_edge(bin) + 0.5 * self.bin_width()
    }

    /// All `n_bins + 1` bin edges.
    #[must_use]
    pub fn edges(&self) -> Vec<f64> {
        (1..=self.n_bins + 1).map(|bin| self.bin_low_edge(bin)).collect()
    }
}

/// One-dimensional histogram.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hist1D {
    name: String,
    title: String,
    x: Axis,
    contents: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
    /// In-range sum of weights, and of weight * x and weight * x^2.
    tsumw: f64,
    tsumwx: f64,
    tsumwx2: f64,
}

impl Hist1D {
    /// Creates an empty histogram.
    ///
    /// The title uses the ROOT `"title;x label;y label"` convention.
    #[must_use]
    pub fn new(name: impl Into<String>, title: impl Into<String>, x: Axis) -> Self {
        let cells = x.n_cells();
        Self {
            name: name.into(),
            title: title.into(),
            x,
            contents: vec![0.0; cells],
            sumw2: vec![0.0; cells],
            entries: 0,
            tsumw: 0.0,
            tsumwx: 0.0,
            tsumwx2: 0.0,
        }
    }

    /// Fills one entry with unit weight.
    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    /// Fills one entry with weight `w`.
    fn fill_weighted(&mut self, x: f64, w: f64) {
        let bin = self.x.find_bin(x);
        self.contents[bin] += w;
        self.sumw2[bin] += w * w;
        self.entries += 1;
        if bin >= 1 && bin <= self.x.n_bins() {
            self.tsumw += w;
            self.tsumwx += w * x;
            self.tsumwx2 += w * x * x;
        }
    }

    /// Adds the contents of `other` to this histogram.
    ///
    /// # Errors
    /// Returns an error if the binning differs.
    pub fn merge(&mut self, other: &Hist1D) -> Result<()> {
        if self.x != other.x {
            return Err(Error::IncompatibleHistograms {
                name: self.name.clone(),
                other: other.name.clone(),
            });
        }
        add_assign(&mut self.contents, &other.contents);
        add_assign(&mut self.sumw2, &other.sumw2);
        self.entries += other.entries;
        self.tsumw += other.tsumw;
        self.tsumwx += other.tsumwx;
        self.tsumwx2 += other.tsumwx2;
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn axis(&self) -> &Axis {
        &self.x
    }

    /// Content of `bin`, flow bins included (0 and `n_bins + 1`).
    #[must_use]
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    #[must_use]
    pub fn underflow(&self) -> f64 {
        self.contents[0]
    }

    #[must_use]
    pub fn overflow(&self) -> f64 {
        self.contents[self.x.n_bins() + 1]
    }

    /// Number of fill calls, flow bins included.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of in-range bin contents.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.contents[1..=self.x.n_bins()].iter().sum()
    }

    /// Weighted mean of the in-range fills.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        (self.tsumw != 0.0).then(|| self.tsumwx / self.tsumw)
    }

    /// Weighted standard deviation of the in-range fills.
    #[must_use]
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        Some((self.tsumwx2 / self.tsumw - mean * mean).max(0.0).sqrt())
    }

    #[must_use]
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    #[must_use]
    pub fn sumw2(&self) -> &[f64] {
        &self.sumw2
    }
}

/// Three-dimensional histogram.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hist3D {
    name: String,
    title: String,
    x: Axis,
    y: Axis,
    z: Axis,
    contents: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
}

impl Hist3D {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new(name: impl Into<String>, title: impl Into<String>, x: Axis, y: Axis, z: Axis) -> Self {
        let cells = x.n_cells() * y.n_cells() * z.n_cells();
        Self {
            name: name.into(),
            title: title.into(),
            x,
            y,
            z,
            contents: vec![0.0; cells],
            sumw2: vec![0.0; cells],
            entries: 0,
        }
    }

    /// Flattened index of the cell `(ix, iy, iz)`, flow bins included.
    #[must_use]
    pub fn global_bin(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + self.x.n_cells() * (iy + self.y.n_cells() * iz)
    }

    /// Fills one entry with unit weight.
    pub fn fill(&mut self, x: f64, y: f64, z: f64) {
        self.fill_weighted(x, y, z, 1.0);
    }

    /// Fills one entry with weight `w`.
    fn fill_weighted(&mut self, x: f64, y: f64, z: f64, w: f64) {
        let bin = self.global_bin(self.x.find_bin(x), self.y.find_bin(y), self.z.find_bin(z));
        self.contents[bin] += w;
        self.sumw2[bin] += w * w;
        self.entries += 1;
    }

    /// Adds the contents of `other` to this histogram.
    ///
    /// # Errors
    /// Returns an error if the binning differs.
    pub fn merge(&mut self, other: &Hist3D) -> Result<()> {
        if self.x != other.x || self.y != other.y || self.z != other.z {
            return Err(Error::IncompatibleHistograms {
                name: self.name.clone(),
                other: other.name.clone(),
            });
        }
        add_assign(&mut self.contents, &other.contents);
        add_assign(&mut self.sumw2, &other.sumw2);
        self.entries += other.entries;
        Ok(())
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The x, y and z axes.
    #[must_use]
    pub fn axes(&self) -> [&Axis; 3] {
        [&self.x, &self.y, &self.z]
    }

    #[must_use]
    pub fn bin_content(&self, ix: usize, iy: usize, iz: usize) -> f64 {
        self.contents
            .get(self.global_bin(ix, iy, iz))
            .copied()
            .unwrap_or(0.0)
    }

    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of contents over cells that are in range on every axis.
    #[must_use]
    pub fn integral(&self) -> f64 {
        let mut sum = 0.0;
        for iz in 1..=self.z.n_bins() {
            for iy in 1..=self.y.n_bins() {
                let start = self.global_bin(1, iy, iz);
                sum += self.contents[start..start + self.x.n_bins()]
                    .iter()
                    .sum::<f64>();
            }
        }
        sum
    }

    #[must_use]
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    #[must_use]
    pub fn sumw2(&self) -> &[f64] {
        &self.sumw2
    }
}

/// A histogram of any supported dimension.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Histogram {
    OneD(Hist1D),
    ThreeD(Hist3D),
}

impl Histogram {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Histogram::OneD(h) => h.name(),
            Histogram::ThreeD(h) => h.name(),
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Histogram::OneD(h) => h.title(),
            Histogram::ThreeD(h) => h.title(),
        }
    }

    /// Axes in storage order (x first).
    #[must_use]
    pub fn axes(&self) -> Vec<&Axis> {
        match self {
            Histogram::OneD(h) => vec![h.axis()],
            Histogram::ThreeD(h) => h.axes().to_vec(),
        }
    }

    #[must_use]
    pub fn entries(&self) -> u64 {
        match self {
            Histogram::OneD(h) => h.entries(),
            Histogram::ThreeD(h) => h.entries(),
        }
    }

    #[must_use]
    pub fn contents(&self) -> &[f64] {
        match self {
            Histogram::OneD(h) => h.contents(),
            Histogram::ThreeD(h) => h.contents(),
        }
    }

    #[must_use]
    pub fn sumw2(&self) -> &[f64] {
        match self {
            Histogram::OneD(h) => h.sumw2(),
            Histogram::ThreeD(h) => h.sumw2(),
        }
    }
}

impl From<Hist1D> for Histogram {
    fn from(h: Hist1D) -> Self {
        Histogram::OneD(h)
    }
}

impl From<Hist3D> for Histogram {
    fn from(h: Hist3D) -> Self {
        Histogram::ThreeD(h)
    }
}

fn add_assign(dst: &mut [f64], src: &[f64]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}
