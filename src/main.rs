//! `ebat-inspect`: summarize a detection CSV the way the engine sees it.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use ebat::config::ConfigError;
use ebat::data::{parse_detections_csv, read_image_size};
use ebat::{BoundingBox, CellRegistry, DataError, EngineConfig, Size};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
enum InspectError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Data(#[from] DataError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Summarize a detection CSV the way the annotation engine loads it.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Engine config JSON. Defaults to the per-user config when present.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Detection CSV (`x0,y0,x1,y1,score,label,poly_x,poly_y`).
    detections: PathBuf,

    /// Slide image; when given, cells outside its bounds are counted.
    image: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Summary {
    detections: PathBuf,
    cells: usize,
    with_polygon: usize,
    dropped_rows: usize,
    extent: Option<BoundingBox>,
    image: Option<Size>,
    /// Cells whose centroid falls outside the image bounds
    outside_image: Option<usize>,
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, ConfigError> {
    match path {
        Some(path) => EngineConfig::load(path),
        None => Ok(EngineConfig::load_from_default_path().unwrap_or_default()),
    }
}

fn init_logging(config: &EngineConfig) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(config.log_level.to_level_filter());
    // RUST_LOG wins over the configured level
    builder.parse_default_env();
    builder.init();
}

fn summarize(args: &Args) -> Result<Summary, InspectError> {
    let text = std::fs::read_to_string(&args.detections).map_err(DataError::from)?;
    let rows = parse_detections_csv(&text)?;

    let mut registry = CellRegistry::new();
    registry.ingest(&rows);

    let extent = registry.iter().map(|c| c.bbox).reduce(|a, b| {
        BoundingBox::from_corners(a.x0.min(b.x0), a.y0.min(b.y0), a.x1.max(b.x1), a.y1.max(b.y1))
    });

    let image = args.image.as_deref().map(read_image_size).transpose()?;
    let outside_image = image.map(|size| {
        registry
            .iter()
            .filter(|c| {
                let p = c.centroid;
                p.x < 0.0 || p.y < 0.0 || p.x > size.width || p.y > size.height
            })
            .count()
    });

    Ok(Summary {
        detections: args.detections.clone(),
        cells: registry.len(),
        with_polygon: registry.iter().filter(|c| c.polygon.is_some()).count(),
        dropped_rows: registry.dropped_rows(),
        extent,
        image,
        outside_image,
    })
}

fn run() -> Result<(), InspectError> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;
    init_logging(&config);
    log::debug!("Inspecting {:?}", args.detections);

    let summary = summarize(&args)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ebat-inspect: {}", e);
            ExitCode::FAILURE
        }
    }
}
