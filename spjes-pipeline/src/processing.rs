//! Parallel event processing: one fused pass filling every booked histogram.

use crate::booking::HistogramBook;
use crate::selection::{evaluate, Filter};
use rayon::prelude::*;
use spjes_core::error::Result;
use spjes_core::{CutFlow, Event};
use std::sync::{Mutex, PoisonError};

static IMPLICIT_MT: Mutex<bool> = Mutex::new(false);

/// Enables parallel event processing for the whole process.
///
/// Configures the global rayon pool once with `threads` workers (`None` or
/// `Some(0)` keeps the rayon default, which honours `RAYON_NUM_THREADS`).
/// Later calls leave the pool untouched. Returns the pool size.
pub fn enable_implicit_mt(threads: Option<usize>) -> usize {
    let mut enabled = IMPLICIT_MT.lock().unwrap_or_else(PoisonError::into_inner);
    if !*enabled {
        let result = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .thread_name(|index| format!("spjes-worker-{index}"))
            .build_global();
        if let Err(err) = result {
            log::warn!("global thread pool already initialized, keeping it: {err}");
        }
        *enabled = true;
    }
    rayon::current_num_threads()
}

/// Histograms, cut flow and event count accumulated over a set of events.
#[derive(Debug, Clone)]
pub struct Accumulator {
    pub book: HistogramBook,
    pub cutflow: CutFlow,
    pub events: u64,
}

impl Accumulator {
    /// Creates an empty accumulator around freshly booked histograms.
    ///
    /// # Errors
    /// Returns an error if booking fails.
    pub fn new() -> Result<Self> {
        Ok(Self::with_book(HistogramBook::new()?))
    }

    /// Creates an empty accumulator around `book`.
    #[must_use]
    pub fn with_book(book: HistogramBook) -> Self {
        Self {
            book,
            cutflow: CutFlow::new(Filter::chain_names()),
            events: 0,
        }
    }

    /// Runs one event through the selection and fills what it reached.
    pub fn fill(&mut self, event: &Event) {
        let outcome = evaluate(event);
        self.cutflow.record(outcome.filters_passed());
        self.book.fill(&outcome);
        self.events += 1;
    }

    /// Adds another accumulator into this one.
    ///
    /// # Errors
    /// Returns an error if the books or cut flows are incompatible.
    pub fn merge(mut self, other: Accumulator) -> Result<Self> {
        self.merge_from(&other)?;
        Ok(self)
    }

    /// In-place form of [`Accumulator::merge`], for folding chunk results
    /// into a running total.
    ///
    /// # Errors
    /// Returns an error if the books or cut flows are incompatible.
    pub fn merge_from(&mut self, other: &Accumulator) -> Result<()> {
        self.book.merge(&other.book)?;
        self.cutflow.merge(&other.cutflow)?;
        self.events += other.events;
        Ok(())
    }
}

/// Processes `events` in parallel.
///
/// Each worker folds events into a clone of `template` (expected empty);
/// partial results are merged pairwise.
///
/// # Errors
/// Returns an error if partial results cannot be merged.
pub fn process_events(events: &[Event], template: &Accumulator) -> Result<Accumulator> {
    events
        .par_iter()
        .fold(
            || template.clone(),
            |mut acc, event| {
                acc.fill(event);
                acc
            },
        )
        .map(Ok)
        .try_reduce(|| template.clone(), Accumulator::merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spjes_core::{Cluster, Particle};

    fn events(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| {
                let clusters = (0..i % 3)
                    .map(|_| Cluster::from_raw(10_000.0, 0.0, 0.0, 0.0))
                    .collect();
                let pdg = if i % 2 == 0 { 211 } else { 22 };
                Event::new(clusters, vec![Particle::new(10_000.0, 0.0, pdg)])
            })
            .collect()
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let events = events(1000);
        let template = Accumulator::new().unwrap();

        let parallel = process_events(&events, &template).unwrap();

        let mut sequential = template.clone();
        for event in &events {
            sequential.fill(event);
        }

        assert_eq!(parallel.events, 1000);
        assert_eq!(parallel.cutflow, sequential.cutflow);
        assert_eq!(parallel.book, sequential.book);
    }

    #[test]
    fn test_chunked_totals_match_single_pass() {
        let events = events(90);
        let template = Accumulator::new().unwrap();

        let mut total = template.clone();
        for chunk in events.chunks(25) {
            let partial = process_events(chunk, &template).unwrap();
            total.merge_from(&partial).unwrap();
        }

        let whole = process_events(&events, &template).unwrap();
        assert_eq!(total.events, 90);
        assert_eq!(total.cutflow, whole.cutflow);
        assert_eq!(total.book, whole.book);
    }

    #[test]
    fn test_empty_input() {
        let template = Accumulator::new().unwrap();
        let acc = process_events(&[], &template).unwrap();
        assert_eq!(acc.events, 0);
        assert_eq!(acc.cutflow.accepted(), 0);
    }

    #[test]
    fn test_enable_implicit_mt_is_idempotent() {
        let first = enable_implicit_mt(None);
        let second = enable_implicit_mt(Some(3));
        assert!(first >= 1);
        assert_eq!(first, second);
    }
}
