#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the wildfire risk pipeline.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use clap::{Parser, Subcommand};
use geoalert_cli_utils::{IndicatifProgress, MultiProgress, init_logger};
use geoalert_climate::{OpenMeteoClient, WeatherSource};
use geoalert_pipeline::{BatchPipeline, DEFAULT_PROBE_LIMIT, PipelineError, RunConfig, load_points};
use geoalert_remote::{connect, resolve_point};
use geoalert_risk::all_models;

#[derive(Parser)]
#[command(name = "geoalert", about = "Wildfire risk scoring for named points")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score every point and write the CSV (default)
    Run {
        /// GeoJSON point set (overrides `points_path`)
        #[arg(long)]
        points: Option<PathBuf>,
        /// CSV output path (overrides `output_path`)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Risk model identifier (e.g., "`v1-vegetation`")
        #[arg(long)]
        model: Option<String>,
        /// Skip weather augmentation
        #[arg(long)]
        no_weather: bool,
    },
    /// Evaluate the remote batch for the first few points and print the raw answer
    Probe {
        /// Number of points to send
        #[arg(long, default_value_t = DEFAULT_PROBE_LIMIT)]
        limit: usize,
        /// GeoJSON point set (overrides `points_path`)
        #[arg(long)]
        points: Option<PathBuf>,
    },
    /// List the available risk models and their weights
    Models,
}

#[tokio::main]
async fn main() {
    let multi = init_logger();
    let cli = Cli::parse();

    let command = cli.command.unwrap_or(Commands::Run {
        points: None,
        output: None,
        model: None,
        no_weather: false,
    });

    if let Err(e) = execute(command, &multi).await {
        log::error!("{e}");
        std::process::exit(1);
    }
}

async fn execute(command: Commands, multi: &MultiProgress) -> Result<(), PipelineError> {
    match command {
        Commands::Models => {
            for model in all_models() {
                println!("{} - {}", model.id, model.name);
                if let Some(description) = &model.description {
                    println!("  {description}");
                }
                println!(
                    "  {:<14} {:>8} {:>8} {:<10} {:>6}",
                    "FEATURE", "LO", "HI", "DIRECTION", "WEIGHT"
                );
                for fw in &model.features {
                    println!(
                        "  {:<14} {:>8} {:>8} {:<10} {:>6.2}",
                        fw.feature.as_ref(),
                        fw.lo,
                        fw.hi,
                        fw.direction.to_string(),
                        fw.weight
                    );
                }
                println!();
            }
        }
        Commands::Probe { limit, points } => {
            let config = RunConfig::load_from_env()?;
            let points = load_points(points.as_ref().unwrap_or(&config.points_path))?;
            let backend = connect(&config.backend).await?;

            let response =
                geoalert_pipeline::probe(backend.as_ref(), &config, &points, limit, Utc::now())
                    .await?;

            match serde_json::to_string_pretty(&response) {
                Ok(json) => println!("{json}"),
                Err(e) => log::warn!("Failed to render response: {e}"),
            }
            println!();
            for reduction in &response.points {
                let features = resolve_point(reduction);
                let fallbacks = features
                    .fallbacks
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<&str>>();
                println!(
                    "{:<24} ndvi={:.3} nbr={:.3} lst={:.1}C precip={:.1}mm fallback=[{}]",
                    reduction.name,
                    features.ndvi,
                    features.nbr,
                    features.lst_celsius,
                    features.precip_mm,
                    fallbacks.join(",")
                );
            }
        }
        Commands::Run {
            points,
            output,
            model,
            no_weather,
        } => {
            let mut config = RunConfig::load_from_env()?;
            if let Some(points) = points {
                config.points_path = points;
            }
            if let Some(output) = output {
                config.output_path = output;
            }
            if let Some(model) = model {
                config.model = model;
            }
            if no_weather {
                config.climate.enabled = false;
            }

            let model = config.risk_model()?;
            let points = load_points(&config.points_path)?;
            let backend = connect(&config.backend).await?;
            let weather = if config.climate.enabled {
                Some(OpenMeteoClient::new(&config.climate)?)
            } else {
                None
            };

            let start = Instant::now();
            let pipeline = BatchPipeline {
                config: &config,
                model: &model,
                backend: backend.as_ref(),
                weather: weather.as_ref().map(|w| w as &dyn WeatherSource),
                progress: IndicatifProgress::points_bar(multi, "weather"),
            };
            pipeline.run(&points, Utc::now()).await?;

            log::info!("Done in {:.1}s", start.elapsed().as_secs_f64());
        }
    }

    Ok(())
}
