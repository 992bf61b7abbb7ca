//! calopix CLI
//!
//! Runs the EMCAL re-clusterization and the light-nuclei flow analysis over
//! JSON-lines event files.
#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]

use clap::{Parser, Subcommand};

use calopix_algorithms::{
    clusterize_events, process_events, ClusterizeConfig, ClusterizerKind, NucleiFlowConfig,
    RecParam, Species, StaticCalibration,
};
use calopix_io::{load_json, read_events, write_cluster_output, DataFileWriter};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] calopix_io::Error),

    #[error("configuration error: {0}")]
    Core(#[from] calopix_core::Error),

    #[error("clusterization error: {0}")]
    Clusterize(#[from] calopix_algorithms::ClusterizeError),
}

/// Calorimeter clusterization and light-nuclei flow analysis.
#[derive(Parser)]
#[command(name = "calopix")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Re-cluster EMCAL cells and write the new clusters
    Clusterize {
        /// Input event file (JSON lines)
        input: PathBuf,

        /// Output file (.csv or .jsonl)
        #[arg(short, long)]
        output: PathBuf,

        /// Reconstruction parameters (JSON)
        #[arg(long)]
        rec_param: Option<PathBuf>,

        /// Calibration store (JSON); unit gains for every run if omitted
        #[arg(long)]
        calibration: Option<PathBuf>,

        /// Clusterizer flag: 0 = v1, 1 = NxN, 2 = NxN extended
        #[arg(long)]
        clusterizer: Option<u8>,

        /// Unfold the existing clusters instead of re-clustering
        #[arg(long)]
        just_unfold: bool,

        /// Name of the output cluster branch
        #[arg(long, default_value = calopix_algorithms::DEFAULT_OUTPUT_BRANCH)]
        output_branch: String,

        /// Run the clusterization without writing the output branch
        #[arg(long)]
        no_fill_aod: bool,
    },

    /// Select light nuclei and write flow candidates
    Flow {
        /// Input event file (JSON lines)
        input: PathBuf,

        /// Candidate output file (.csv or .jsonl)
        #[arg(short, long)]
        output: PathBuf,

        /// Event plane resolution output file (.csv or .jsonl)
        #[arg(long)]
        resolution: Option<PathBuf>,

        /// Species: 1 = deuteron, 2 = triton, 3 = helium-3
        #[arg(long, default_value = "1")]
        species: u8,

        /// Maximum |vz| (cm)
        #[arg(long, default_value = "10.0")]
        max_vertex_z: f64,
    },

    /// Show information about an event file
    Info {
        /// Input event file (JSON lines)
        input: PathBuf,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Clusterize {
            input,
            output,
            rec_param,
            calibration,
            clusterizer,
            just_unfold,
            output_branch,
            no_fill_aod,
        } => {
            let mut params: RecParam = match rec_param {
                Some(path) => load_json(path)?,
                None => RecParam::default(),
            };
            if let Some(flag) = clusterizer {
                params = params.with_clusterizer(ClusterizerKind::try_from(flag)?);
            }
            params.validate()?;

            let source: StaticCalibration = match calibration {
                Some(path) => load_json(path)?,
                None => StaticCalibration::uniform(calopix_algorithms::Calibration::default()),
            };
            let config = ClusterizeConfig::default()
                .with_rec_param(params)
                .with_just_unfold(just_unfold)
                .with_output_branch(output_branch)
                .with_fill_aod(!no_fill_aod);

            let events = read_events(&input)?;
            let start = Instant::now();
            let result = clusterize_events(&events, &config, &source)?;
            let elapsed = start.elapsed();

            let written = write_cluster_output(&output, &config, &result.clusters)?;

            let stats = result.statistics;
            println!(
                "Processed {} events in {:.2}s",
                stats.events,
                elapsed.as_secs_f64()
            );
            println!("Clusterizer: {}", config.rec_param.clusterizer.name());
            println!("Calibration loads: {}", stats.calibration_loads);
            println!("Digits: {}", stats.digits);
            println!("Invalid cells: {}", stats.invalid_cells);
            println!("Rec points: {}", stats.rec_points);
            println!("Unfolded clusters: {}", stats.unfolded_clusters);
            println!("Clusters: {}", stats.clusters);
            println!("Matched clusters: {}", stats.matched_clusters);
            if config.fill_aod {
                println!(
                    "Output: {} ({} clusters in {})",
                    output.display(),
                    written,
                    config.output_branch
                );
            }
        }

        Commands::Flow {
            input,
            output,
            resolution,
            species,
            max_vertex_z,
        } => {
            let config = NucleiFlowConfig::default()
                .with_species(Species::try_from(species)?)
                .with_max_vertex_z(max_vertex_z);

            let events = read_events(&input)?;
            let start = Instant::now();
            let result = process_events(&events, &config);
            let elapsed = start.elapsed();

            let mut writer = DataFileWriter::create(&output)?;
            writer.write_candidates(&result.candidates)?;
            writer.flush()?;
            log::info!("wrote {} candidates to {}", writer.records(), output.display());

            if let Some(path) = &resolution {
                let mut writer = DataFileWriter::create(path)?;
                writer.write_resolutions(&result.resolutions)?;
                writer.flush()?;
            }

            println!(
                "Processed {} events in {:.2}s ({:?})",
                events.len(),
                elapsed.as_secs_f64(),
                config.species
            );
            for (label, count) in result.counters.labeled() {
                println!("{label:<22} {count}");
            }
        }

        Commands::Info { input } => {
            let events = read_events(&input)?;
            let runs: BTreeSet<i32> = events.iter().map(|e| e.run_number).collect();
            let cells: usize = events.iter().map(|e| e.cells.len()).sum();
            let tracks: usize = events.iter().map(|e| e.tracks.len()).sum();
            let clusters: usize = events.iter().map(|e| e.clusters.len()).sum();
            let with_vertex = events
                .iter()
                .filter(|e| e.primary_vertex().is_some())
                .count();
            let with_event_plane = events.iter().filter(|e| e.event_plane.is_some()).count();

            println!("File: {}", input.display());
            println!("Events: {}", events.len());
            println!("Runs: {:?}", runs);
            println!("Events with vertex: {}", with_vertex);
            println!("Events with event plane: {}", with_event_plane);
            println!("Cells: {}", cells);
            println!("Tracks: {}", tracks);
            println!("Clusters: {}", clusters);

            if !events.is_empty() {
                let n = events.len() as f64;
                println!("Mean cells/event: {:.1}", cells as f64 / n);
                println!("Mean tracks/event: {:.1}", tracks as f64 / n);
            }
        }
    }

    Ok(())
}
