#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line front end for zone resource analysis.
//!
//! Reads a zone polygon as `GeoJSON` and, optionally, a JSON building
//! inventory, runs the analysis and prints the result as pretty JSON.
//! Set `RUST_LOG=debug` to follow the pipeline stage by stage.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use zone_resource_analysis::AnalysisOrchestrator;
use zone_resource_analysis_models::{AnalysisKind, AnalysisOptions, AnalysisRequest};
use zone_resource_calibration::all_regions;
use zone_resource_calibration::registry::DEFAULT_REGION;
use zone_resource_zone_models::{Building, ZoneEvent};

#[derive(Parser)]
#[command(name = "zone_resource", about = "Zone population and waste collection analysis")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one zone
    Analyze(AnalyzeArgs),
    /// List the available calibration regions
    Regions,
}

#[derive(clap::Args)]
struct AnalyzeArgs {
    /// `GeoJSON` file holding the zone polygon
    #[arg(long)]
    zone: PathBuf,

    /// JSON array of buildings inside the zone
    #[arg(long)]
    buildings: Option<PathBuf>,

    /// JSON array of entry/exit events observed at the zone boundary
    #[arg(long)]
    events: Option<PathBuf>,

    /// Externally sourced population total for dasymetric refinement
    #[arg(long)]
    baseline: Option<f64>,

    /// How much of the pipeline to run
    #[arg(long, default_value_t = AnalysisKind::Comprehensive)]
    kind: AnalysisKind,

    /// Calibration region id
    #[arg(long, default_value = DEFAULT_REGION)]
    region: String,

    /// Collections per week to prefer when feasible
    #[arg(long)]
    frequency: Option<u8>,

    /// Waste generation rate override in kg per person per day
    #[arg(long)]
    waste_rate: Option<f64>,

    /// Write the result here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze(args) => analyze(&args)?,
        Commands::Regions => {
            for region in all_regions() {
                println!("{}\t{}\t{}", region.id, region.name, region.currency);
            }
        }
    }

    Ok(())
}

fn analyze(args: &AnalyzeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let zone = fs::read_to_string(&args.zone)?;
    let request = build_request(args)?;

    log::info!("Analyzing zone from {}", args.zone.display());
    let result = AnalysisOrchestrator::new().analyze_geojson(&zone, request)?;
    let json = serde_json::to_string_pretty(&*result)?;

    match &args.output {
        Some(path) => {
            fs::write(path, json)?;
            log::info!("Result written to {}", path.display());
        }
        None => println!("{json}"),
    }

    for warning in &result.warnings {
        log::warn!("{warning}");
    }

    Ok(())
}

fn build_request(args: &AnalyzeArgs) -> Result<AnalysisRequest, Box<dyn std::error::Error>> {
    let buildings = args
        .buildings
        .as_deref()
        .map(read_json::<Vec<Building>>)
        .transpose()?;
    let events = args
        .events
        .as_deref()
        .map(read_json::<Vec<ZoneEvent>>)
        .transpose()?
        .unwrap_or_default();

    Ok(AnalysisRequest {
        geometry: Vec::new(),
        holes: Vec::new(),
        buildings,
        baseline_population: args.baseline,
        events,
        options: AnalysisOptions {
            kind: args.kind,
            region: args.region.clone(),
            waste_rate_kg_per_person_day: args.waste_rate,
            preferred_frequency: args.frequency,
            ..AnalysisOptions::default()
        },
    })
}

fn read_json<T: serde::de::DeserializeOwned>(
    path: &Path,
) -> Result<T, Box<dyn std::error::Error>> {
    let text = fs::read_to_string(path)?;
    serde_json::from_str(&text)
        .map_err(|e| format!("Failed to parse {}: {e}", path.display()).into())
}
