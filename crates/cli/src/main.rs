//! lcfuse CLI - land-cover classification from optical and radar imagery

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use lcfuse_algorithms::acquisition::{CatalogCube, CubeQuery, LoadParams};
use lcfuse_algorithms::config::PipelineConfig;
use lcfuse_algorithms::output::write_results;
use lcfuse_algorithms::workflow::{self, TrainedModel};
use lcfuse_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use lcfuse_core::vector::{read_geojson, FeatureCollection};
use lcfuse_core::{Raster, TimeSeries, CRS};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "lcfuse")]
#[command(author, version, about = "Land-cover classification from optical and radar imagery", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Scene selection shared by `train` and `predict`
#[derive(Args)]
struct QueryArgs {
    /// Item-collection JSON describing the available scenes
    #[arg(long)]
    catalog: PathBuf,
    /// Product (collection) name
    #[arg(long, default_value = "s2_l2a")]
    product: String,
    /// Area of interest as min_lon,min_lat,max_lon,max_lat
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    bbox: (f64, f64, f64, f64),
    /// First acquisition date (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,
    /// Last acquisition date (YYYY-MM-DD)
    #[arg(long)]
    end: NaiveDate,
    /// Output CRS, e.g. EPSG:32648 (default: most common scene CRS)
    #[arg(long)]
    crs: Option<CRS>,
    /// Keep the raw reflectance offset of newer processing baselines
    #[arg(long)]
    no_harmonize: bool,
}

/// Radar bands fused with the optical index
#[derive(Args)]
struct RadarArgs {
    /// VH polarisation raster
    #[arg(long)]
    vh: PathBuf,
    /// VV polarisation raster
    #[arg(long)]
    vv: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Train a random forest on labelled ground points
    Train {
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        radar: RadarArgs,
        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Ground-truth points (GeoJSON)
        #[arg(long)]
        points: PathBuf,
        /// CRS of the points when the file does not declare one
        #[arg(long)]
        points_crs: Option<CRS>,
        /// File name of the saved model
        #[arg(long, default_value = "rf_model.json")]
        model_name: String,
        /// Directory for the saved model (overrides the configuration)
        #[arg(long)]
        model_dir: Option<PathBuf>,
    },
    /// Predict land cover over the area of interest
    Predict {
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        radar: RadarArgs,
        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Saved model file
        #[arg(long)]
        model: PathBuf,
        /// Output GeoTIFF
        #[arg(long)]
        output: PathBuf,
        /// Boundary polygon (GeoJSON); the prediction is clipped to it
        #[arg(long)]
        boundary: Option<PathBuf>,
        /// CRS of the boundary when the file does not declare one
        #[arg(long)]
        boundary_crs: Option<CRS>,
    },
    /// Compare a prediction with reference polygons, one raster per category
    Compare {
        /// Reference polygons (GeoJSON)
        #[arg(long)]
        reference: PathBuf,
        /// CRS of the reference when the file does not declare one
        #[arg(long)]
        reference_crs: Option<CRS>,
        /// Prediction GeoTIFF
        #[arg(long)]
        prediction: PathBuf,
        /// Pipeline configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Directory for the category rasters (overrides the configuration)
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging was already initialised");
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn parse_bbox(s: &str) -> std::result::Result<(f64, f64, f64, f64), String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>().map_err(|e| format!("{}: {}", p, e)))
        .collect::<std::result::Result<_, _>>()?;
    match parts.as_slice() {
        [min_x, min_y, max_x, max_y] if min_x < max_x && min_y < max_y => {
            Ok((*min_x, *min_y, *max_x, *max_y))
        }
        [_, _, _, _] => Err("expected min_lon < max_lon and min_lat < max_lat".into()),
        _ => Err(format!("expected 4 comma-separated numbers, got {}", parts.len())),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::load(p)
            .with_context(|| format!("Failed to read configuration {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner(&format!("Reading {}...", path.display()));
    let raster: Raster<f64> = read_geotiff(path, None)
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("{}: {} x {}", path.display(), raster.cols(), raster.rows());
    Ok(raster)
}

fn read_vector(path: &Path, crs: Option<CRS>) -> Result<FeatureCollection> {
    let collection = read_geojson(path, crs)
        .with_context(|| format!("Failed to read vector file {}", path.display()))?;
    info!("{}: {} feature(s)", path.display(), collection.len());
    Ok(collection)
}

fn write_raster(raster: &Raster<f64>, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let pb = spinner("Writing output...");
    write_geotiff(raster, path, Some(GeoTiffOptions::default())).context("Failed to write output")?;
    pb.finish_and_clear();
    Ok(())
}

fn index_series(query: &QueryArgs, config: &PipelineConfig) -> Result<TimeSeries> {
    let catalog = CatalogCube::open(&query.catalog)
        .with_context(|| format!("Failed to open catalog {}", query.catalog.display()))?;
    let cube_query = CubeQuery {
        product: query.product.clone(),
        x: (query.bbox.0, query.bbox.2),
        y: (query.bbox.1, query.bbox.3),
        time: (query.start, query.end),
    };
    let mut measurements: Vec<String> = config
        .index
        .required_bands()
        .iter()
        .map(|b| b.to_string())
        .collect();
    measurements.push(config.quality_band.clone());
    let params = LoadParams {
        measurements,
        output_crs: query.crs.clone(),
        harmonize: !query.no_harmonize,
        quality_band: config.quality_band.clone(),
        ..Default::default()
    };

    let pb = spinner("Loading scenes...");
    let series = workflow::build_index_series(&catalog, &cube_query, &params, config)
        .context("Failed to build the index series")?;
    pb.finish_and_clear();
    Ok(series)
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_raster(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Train ────────────────────────────────────────────────────
        Commands::Train {
            query,
            radar,
            config,
            points,
            points_crs,
            model_name,
            model_dir,
        } => {
            let config = load_config(config.as_deref())?;
            let start = Instant::now();
            let index = index_series(&query, &config)?;
            let points = read_vector(&points, points_crs)?;
            let vh = read_raster(&radar.vh)?;
            let vv = read_raster(&radar.vv)?;

            let outcome = workflow::train(&index, &points, &vh, &vv, &config)
                .context("Training failed")?;
            for skipped in &outcome.skipped {
                warn!("skipped {}", skipped);
            }
            println!("Best parameters: {}", outcome.model.search.best_params);
            if let Some(acc) = outcome.model.search.validation_accuracy {
                println!("Validation accuracy: {:.2} %", acc * 100.0);
            }
            println!("Test accuracy: {:.2} %", outcome.test_accuracy * 100.0);

            let dir = model_dir.unwrap_or(config.output.model_dir);
            let path = outcome
                .model
                .save(&dir, &model_name)
                .with_context(|| format!("Failed to save model to {}", dir.display()))?;
            done("Model", &path, start.elapsed());
        }

        // ── Predict ──────────────────────────────────────────────────
        Commands::Predict {
            query,
            radar,
            config,
            model,
            output,
            boundary,
            boundary_crs,
        } => {
            let config = load_config(config.as_deref())?;
            let trained = TrainedModel::load(&model)
                .with_context(|| format!("Failed to load model {}", model.display()))?;
            let start = Instant::now();
            let index = index_series(&query, &config)?;
            let vh = read_raster(&radar.vh)?;
            let vv = read_raster(&radar.vv)?;

            let boundary = match boundary {
                Some(path) => {
                    let collection = read_vector(&path, boundary_crs)?;
                    let Some(geometry) = collection.iter().find_map(|f| f.geometry.clone()) else {
                        bail!("Boundary file {} has no geometry", path.display());
                    };
                    Some((geometry, collection.crs))
                }
                None => None,
            };

            let pb = spinner("Predicting...");
            let prediction = workflow::predict(
                &trained,
                &index,
                &vh,
                &vv,
                boundary.as_ref().map(|(g, crs)| (g, crs.as_ref())),
            )
            .context("Prediction failed")?;
            pb.finish_and_clear();
            let elapsed = start.elapsed();
            write_raster(&prediction, &output)?;
            done("Prediction", &output, elapsed);
        }

        // ── Compare ──────────────────────────────────────────────────
        Commands::Compare {
            reference,
            reference_crs,
            prediction,
            config,
            output_dir,
        } => {
            let config = load_config(config.as_deref())?;
            let prediction = read_raster(&prediction)?;
            let reference = read_vector(&reference, reference_crs)?;

            let start = Instant::now();
            let outcome = workflow::compare_prediction(&prediction, &reference, &config)
                .context("Comparison failed")?;
            for skipped in &outcome.skipped {
                tracing::debug!("skipped {}", skipped);
            }

            let dir = output_dir.unwrap_or(config.output.result_dir);
            let pb = spinner("Writing category rasters...");
            let written = write_results(&outcome, &dir)
                .with_context(|| format!("Failed to write results to {}", dir.display()))?;
            pb.finish_and_clear();
            for path in &written {
                println!("save {}", path.display());
            }
            println!("  Processing time: {:.2?}", start.elapsed());
        }
    }

    Ok(())
}
