//! Cut-flow bookkeeping for an ordered chain of filters.

use crate::{Error, Result};
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Pass/seen counters of a single named filter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FilterCount {
    pub name: String,
    /// Events that passed this filter.
    pub pass: u64,
    /// Events that reached this filter.
    pub all: u64,
}

impl FilterCount {
    /// Percentage of events reaching this filter that passed it.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn efficiency(&self) -> f64 {
        if self.all == 0 {
            0.0
        } else {
            100.0 * self.pass as f64 / self.all as f64
        }
    }
}

/// Counters for an ordered filter chain.
///
/// Filters short-circuit: an event rejected by filter `k` is never seen by
/// filters after `k`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CutFlow {
    filters: Vec<FilterCount>,
}

impl CutFlow {
    /// Creates a cut flow with zeroed counters for the given filter names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            filters: names
                .into_iter()
                .map(|name| FilterCount {
                    name: name.into(),
                    pass: 0,
                    all: 0,
                })
                .collect(),
        }
    }

    /// Records one event that passed the first `passed` filters.
    ///
    /// If `passed` is less than the number of filters, the event is counted
    /// as seen and rejected by filter `passed`.
    pub fn record(&mut self, passed: usize) {
        for (index, filter) in self.filters.iter_mut().enumerate() {
            if index > passed {
                break;
            }
            filter.all += 1;
            if index < passed {
                filter.pass += 1;
            }
        }
    }

    /// Adds the counters of `other`.
    ///
    /// # Errors
    /// Returns an error if the filter chains differ.
    pub fn merge(&mut self, other: &CutFlow) -> Result<()> {
        if self.filters.len() != other.filters.len()
            || self
                .filters
                .iter()
                .zip(&other.filters)
                .any(|(a, b)| a.name != b.name)
        {
            return Err(Error::IncompatibleCutFlows);
        }
        for (a, b) in self.filters.iter_mut().zip(&other.filters) {
            a.pass += b.pass;
            a.all += b.all;
        }
        Ok(())
    }

    /// Returns the counter of the named filter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FilterCount> {
        self.filters.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FilterCount> {
        self.filters.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Events that passed every filter.
    #[must_use]
    pub fn accepted(&self) -> u64 {
        self.filters.last().map_or(0, |f| f.pass)
    }
}

impl fmt::Display for CutFlow {
    /// One line per filter, in chain order:
    /// `name: pass=N all=M -- eff=E % cumulative eff=C %`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first_all = self.filters.first().map_or(0, |c| c.all);
        for (index, filter) in self.filters.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let cumulative = if first_all == 0 {
                0.0
            } else {
                100.0 * filter.pass as f64 / first_all as f64
            };
            if index > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:<10}: pass={:<10} all={:<10} -- eff={:.2} % cumulative eff={:.2} %",
                filter.name,
                filter.pass,
                filter.all,
                filter.efficiency(),
                cumulative
            )?;
        }
        Ok(())
    }
}
