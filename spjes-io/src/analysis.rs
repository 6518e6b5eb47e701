//! The single-particle JES run: open output, read events, fill, report, save.

use crate::config::AnalysisConfig;
use crate::reader::{CollectionNames, EventSource};
use crate::writer::HistogramSink;
use crate::{Error, Result};
use log::{debug, error, info};
use spjes_core::{CutFlow, Histogram};
use spjes_pipeline::{enable_implicit_mt, process_events, Accumulator};
use std::path::PathBuf;

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    /// Events read across all inputs.
    pub total_events: u64,
    pub cutflow: CutFlow,
    /// Histograms as written, in booking order.
    pub histograms: Vec<Histogram>,
    pub output: PathBuf,
}

impl AnalysisSummary {
    #[must_use]
    pub fn histogram(&self, name: &str) -> Option<&Histogram> {
        self.histograms.iter().find(|h| h.name() == name)
    }
}

/// Drives one analysis run over a set of event files.
pub struct Analyzer {
    config: AnalysisConfig,
    threads: usize,
}

impl Analyzer {
    /// Validates `config` and enables multi-threaded processing.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let threads = enable_implicit_mt(config.threads);
        info!("Implicit Multi-Threading enabled using {threads} threads.");
        Ok(Self { config, threads })
    }

    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Size of the worker pool.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs the analysis.
    ///
    /// The output container is created first; if the run fails afterwards
    /// it is left without histograms.
    ///
    /// # Errors
    /// Returns [`Error::OutputOpen`] if the output cannot be created,
    /// [`Error::NoEvents`] if the inputs hold no events, and any read or
    /// processing error.
    pub fn run(&self) -> Result<AnalysisSummary> {
        let mut sink = HistogramSink::create(&self.config.output)?;
        info!("Created output file: {}", self.config.output.display());

        let sources = self.open_sources()?;
        let total_events: usize = sources.iter().map(EventSource::n_events).sum();
        if total_events == 0 {
            return Err(Error::NoEvents {
                tree: self.config.tree_name.clone(),
            });
        }
        info!("Total events in tree: {total_events}");

        info!("Event loop running...");
        let template = Accumulator::new()?;
        let mut total = template.clone();
        for source in &sources {
            debug!(
                "reading {} ({} events)",
                source.path().display(),
                source.n_events()
            );
            source.for_each_chunk(self.config.chunk_events, |chunk| {
                debug!("processing chunk of {} events", chunk.len());
                let partial = process_events(&chunk, &template)?;
                total.merge_from(&partial)?;
                Ok(())
            })?;
        }

        info!("--- Analysis Report ---");
        for line in total.cutflow.to_string().lines() {
            info!("{line}");
        }
        info!("-----------------------");

        info!("Saving histograms to: {}", self.config.output.display());
        let Accumulator {
            book,
            cutflow,
            events,
        } = total;
        let histograms = book.into_histograms();
        for histogram in &histograms {
            match histogram {
                Histogram::OneD(h) => debug!(
                    "writing {} ({} entries, mean {}, std dev {})",
                    h.name(),
                    h.entries(),
                    format_stat(h.mean()),
                    format_stat(h.std_dev())
                ),
                Histogram::ThreeD(h) => debug!("writing {} ({} entries)", h.name(), h.entries()),
            }
            sink.write(histogram)?;
        }
        sink.close()?;
        info!("Histograms saved.");

        Ok(AnalysisSummary {
            total_events: events,
            cutflow,
            histograms,
            output: self.config.output.clone(),
        })
    }

    fn open_sources(&self) -> Result<Vec<EventSource>> {
        let names: Vec<String> = self
            .config
            .input_files
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        info!("Processing file(s): {}", names.join(", "));

        let collections = CollectionNames::from_config(&self.config);
        self.config
            .input_files
            .iter()
            .map(|path| EventSource::open(path, &self.config.tree_name, collections.clone()))
            .collect()
    }
}

fn format_stat(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}

/// Runs the whole analysis, reporting failure as `false`.
///
/// Any error is logged once; nothing is retried.
#[must_use]
pub fn run_single_particle_jes_analysis(config: &AnalysisConfig) -> bool {
    let result = Analyzer::new(config.clone()).and_then(|analyzer| analyzer.run());
    match result {
        Ok(summary) => {
            info!(
                "Analysis complete: {} events, {} accepted.",
                summary.total_events,
                summary.cutflow.accepted()
            );
            true
        }
        Err(err) => {
            error!("Analysis failed: {err}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn input(value: &serde_json::Value) -> NamedTempFile {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        file.write_all(value.to_string().as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_zero_events_fails_without_histograms() {
        let file = input(&json!({"CollectionTree": []}));
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.json");
        let config = AnalysisConfig::new([file.path()]).with_output(&output);

        let result = Analyzer::new(config.clone()).unwrap().run();
        assert!(matches!(result, Err(Error::NoEvents { ref tree }) if tree == "CollectionTree"));
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 0);
        assert!(!run_single_particle_jes_analysis(&config));
    }

    #[test]
    fn test_output_open_failure_is_fatal() {
        let file = input(&json!({"CollectionTree": [{}]}));
        let dir = tempdir().unwrap();
        let config = AnalysisConfig::new([file.path()])
            .with_output(dir.path().join("no_such_dir").join("out.json"));

        let result = Analyzer::new(config).unwrap().run();
        assert!(matches!(result, Err(Error::OutputOpen { .. })));
    }

    #[test]
    fn test_missing_tree_fails() {
        let file = input(&json!({"Events": []}));
        let dir = tempdir().unwrap();
        let config = AnalysisConfig::new([file.path()]).with_output(dir.path().join("out.json"));

        assert!(matches!(
            Analyzer::new(config.clone()).unwrap().run(),
            Err(Error::MissingTree { .. })
        ));
        assert!(!run_single_particle_jes_analysis(&config));
    }

    #[test]
    fn test_format_stat() {
        assert_eq!(format_stat(Some(1.234_56)), "1.2346");
        assert_eq!(format_stat(None), "n/a");
    }

    #[test]
    fn test_invalid_config_fails() {
        assert!(Analyzer::new(AnalysisConfig::default()).is_err());
        assert!(!run_single_particle_jes_analysis(&AnalysisConfig::default()));
    }
}
