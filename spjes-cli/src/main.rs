//! spjes CLI: single-particle jet energy scale analysis.
//!
//! Reads calorimeter cluster and truth particle events, runs the selection
//! chain, prints the cut-flow report and writes the response histograms.
#![allow(clippy::uninlined_format_args)]

use clap::Parser;
use log::{error, info, LevelFilter};
use spjes_io::{
    run_single_particle_jes_analysis, AnalysisConfig, DEFAULT_CHUNK_EVENTS,
    DEFAULT_CLUSTER_COLLECTION, DEFAULT_OUTPUT, DEFAULT_PARTICLE_COLLECTION, DEFAULT_TREE_NAME,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("Input file does not exist: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("Configuration error: {0}")]
    Config(#[from] spjes_io::Error),

    #[error("Analysis failed.")]
    AnalysisFailed,
}

/// SmartHEP SingleParticleJES - High Energy Physics Analysis Tool.
#[derive(Parser, Debug)]
#[command(name = "spjes")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input event file(s) (.json, or .h5 with the hdf5 feature)
    #[arg(required = true)]
    input_files: Vec<PathBuf>,

    /// Output file for histograms (.json, or .h5 with the hdf5 feature)
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Name of the tree in the input files
    #[arg(short, long, default_value = DEFAULT_TREE_NAME)]
    tree_name: String,

    /// Calorimeter cluster collection
    #[arg(long, default_value = DEFAULT_CLUSTER_COLLECTION)]
    clusters: String,

    /// Truth particle collection
    #[arg(long, default_value = DEFAULT_PARTICLE_COLLECTION)]
    particles: String,

    /// Worker threads (default: all cores, or RAYON_NUM_THREADS)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Events decoded per chunk
    #[arg(long, default_value_t = DEFAULT_CHUNK_EVENTS)]
    chunk_events: usize,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn to_config(&self) -> AnalysisConfig {
        AnalysisConfig::new(self.input_files.iter().cloned())
            .with_output(self.output.clone())
            .with_tree_name(self.tree_name.clone())
            .with_collections(self.clusters.clone(), self.particles.clone())
            .with_chunk_events(self.chunk_events)
            .with_threads(self.threads)
    }
}

/// `<timestamp> - <target> - <LEVEL> - <message>` on stdout. `RUST_LOG`
/// overrides the level picked from `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let result = env_logger::Builder::new()
        .target(env_logger::Target::Stdout)
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {} - {}",
                buf.timestamp_millis(),
                record.target(),
                record.level(),
                record.args()
            )
        })
        .try_init();
    if let Err(err) = result {
        eprintln!("logger already initialized: {err}");
    }
}

fn run(cli: &Cli) -> Result<()> {
    info!(
        "Starting SingleParticleJES analysis with {} input file(s)",
        cli.input_files.len()
    );

    if let Some(missing) = cli.input_files.iter().find(|path| !path.exists()) {
        return Err(CliError::MissingInput(missing.clone()));
    }

    let config = cli.to_config();
    config.validate()?;

    if !run_single_particle_jes_analysis(&config) {
        return Err(CliError::AnalysisFailed);
    }
    info!(
        "Analysis completed successfully. Output saved to: {}",
        cli.output.display()
    );
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_parse_args_defaults() {
        let cli = Cli::try_parse_from(["spjes", "input.json"]).unwrap();
        assert_eq!(cli.input_files, vec![PathBuf::from("input.json")]);
        assert_eq!(cli.output, PathBuf::from("analysis_output.json"));
        assert_eq!(cli.tree_name, "CollectionTree");
        assert_eq!(cli.clusters, "CaloCalTopoClusters");
        assert_eq!(cli.particles, "TruthParticles");
        assert_eq!(cli.chunk_events, 10_000);
        assert!(cli.threads.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_parse_args_custom() {
        let cli = Cli::try_parse_from([
            "spjes",
            "input1.json",
            "input2.json",
            "-o",
            "custom_output.json",
            "-t",
            "MyTree",
            "-j",
            "4",
            "-v",
        ])
        .unwrap();
        assert_eq!(
            cli.input_files,
            vec![PathBuf::from("input1.json"), PathBuf::from("input2.json")]
        );
        assert_eq!(cli.output, PathBuf::from("custom_output.json"));
        assert_eq!(cli.tree_name, "MyTree");
        assert_eq!(cli.threads, Some(4));
        assert!(cli.verbose);

        let config = cli.to_config();
        assert_eq!(config.input_files.len(), 2);
        assert_eq!(config.tree_name, "MyTree");
        assert_eq!(config.threads, Some(4));
    }

    #[test]
    fn test_input_is_required() {
        assert!(Cli::try_parse_from(["spjes"]).is_err());
    }

    #[test]
    fn test_missing_input_leaves_output_untouched() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("out.json");
        let cli = Cli::try_parse_from([
            "spjes",
            dir.path().join("missing.json").to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ])
        .unwrap();

        assert!(matches!(run(&cli), Err(CliError::MissingInput(_))));
        assert!(!output.exists());
    }

    #[test]
    fn test_run_success_and_failure() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("events.json");
        let output = dir.path().join("out.json");
        fs::write(
            &input,
            r#"{"CollectionTree": [{"CaloCalTopoClusters": [], "TruthParticles": []}]}"#,
        )
        .unwrap();

        let args = [
            "spjes",
            input.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
        ];
        assert!(run(&Cli::try_parse_from(args).unwrap()).is_ok());
        assert!(output.exists());

        let empty = dir.path().join("empty.json");
        fs::write(&empty, r#"{"CollectionTree": []}"#).unwrap();
        let cli = Cli::try_parse_from(["spjes", empty.to_str().unwrap(), "-o", output.to_str().unwrap()])
            .unwrap();
        assert!(matches!(run(&cli), Err(CliError::AnalysisFailed)));
    }
}
