//! cube-pyramid - Inspect tile grids and build pyramids from the command line.

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cube_pyramid::{
    config::{Cli, Command, DemoConfig, GridConfig, OutputFormat, TilesConfig},
    BaseMultiLevelDataset, ComputedMultiLevelDataset, Dataset, DatasetError, DatasetRegistry,
    GridError, MultiLevelDataset, Parameters, TileGrid, TransformRef, TransformRegistry, Variable,
    AGGREGATE_TIME,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Grid(config) => run_grid(config),
        Command::Tiles(config) => run_tiles(config),
        Command::Demo(config) => run_demo(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "cube_pyramid=debug"
    } else {
        "cube_pyramid=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Print a value as pretty JSON.
fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Grid Command
// =============================================================================

fn run_grid(config: GridConfig) -> ExitCode {
    if let Err(e) = config.grid.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let grid = match config.grid.tile_grid() {
        Ok(grid) => grid,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match config.format {
        OutputFormat::Json => print_json(&grid),
        OutputFormat::Text => match print_grid(&grid) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Failed to describe grid: {}", e);
                ExitCode::FAILURE
            }
        },
    }
}

fn print_grid(grid: &TileGrid) -> Result<(), GridError> {
    let extent = grid.geo_extent();
    let (nx, ny) = grid.num_level_zero_tiles();
    println!("num_levels:          {}", grid.num_levels());
    println!("tile_size:           {}x{}", grid.tile_width(), grid.tile_height());
    println!("num_level_zero_tiles: {}x{}", nx, ny);
    println!(
        "geo_extent:          {}, {}, {}, {}",
        extent.west, extent.south, extent.east, extent.north
    );
    println!("inv_y:               {}", grid.inv_y());
    println!();
    println!("level  zoom  size         tiles     resolution");
    for level in 0..grid.num_levels() {
        let zoom = grid.zoom_for_level(level)?;
        let (w, h) = grid.dataset_size(level)?;
        let (tx, ty) = grid.num_tiles(zoom)?;
        let (dx, dy) = grid.resolution(level)?;
        println!(
            "{:<6} {:<5} {:<12} {:<9} {:.6} x {:.6}",
            level,
            zoom,
            format!("{}x{}", w, h),
            format!("{}x{}", tx, ty),
            dx,
            dy
        );
    }
    Ok(())
}

// =============================================================================
// Tiles Command
// =============================================================================

fn run_tiles(config: TilesConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let (grid, window) = match (config.grid.tile_grid(), config.window()) {
        (Ok(grid), Ok(window)) => (grid, window),
        (Err(e), _) | (_, Err(e)) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if config.zoom >= grid.num_levels() {
        error!(
            "Zoom level {} out of range: grid has {} level(s)",
            config.zoom,
            grid.num_levels()
        );
        return ExitCode::FAILURE;
    }

    let range = grid.tiles_covering(config.zoom, &window);
    match config.format {
        OutputFormat::Json => print_json(&range),
        OutputFormat::Text => {
            match range {
                Some(range) => {
                    println!(
                        "zoom {}: x {}..={}, y {}..={} ({} tile(s))",
                        range.level,
                        range.x_min,
                        range.x_max,
                        range.y_min,
                        range.y_max,
                        range.len()
                    );
                    for (x, y) in range.iter() {
                        if let Some(extent) = grid.tile_extent(range.level, x, y) {
                            println!(
                                "  {}/{}/{}  {:.4}, {:.4}, {:.4}, {:.4}",
                                range.level,
                                x,
                                y,
                                extent.west,
                                extent.south,
                                extent.east,
                                extent.north
                            );
                        }
                    }
                }
                None => println!("no tiles cover the bounding box"),
            }
            ExitCode::SUCCESS
        }
    }
}

// =============================================================================
// Demo Command
// =============================================================================

/// Per-level summary printed by `demo`.
#[derive(Serialize)]
struct LevelSummary {
    ds_id: String,
    level: usize,
    dims: BTreeMap<String, usize>,
    variables: Vec<String>,
}

fn run_demo(config: DemoConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match build_demo(&config) {
        Ok(summaries) => match config.format {
            OutputFormat::Json => print_json(&summaries),
            OutputFormat::Text => {
                for s in &summaries {
                    let dims: Vec<String> =
                        s.dims.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    println!(
                        "{} level {}: {} [{}]",
                        s.ds_id,
                        s.level,
                        dims.join(", "),
                        s.variables.join(", ")
                    );
                }
                ExitCode::SUCCESS
            }
        },
        Err(e) => {
            error!("Demo failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_demo(config: &DemoConfig) -> Result<Vec<LevelSummary>, Box<dyn std::error::Error>> {
    let dataset = demo_dataset(config)?;
    let base = Arc::new(BaseMultiLevelDataset::with_options(
        dataset,
        Some("demo".to_string()),
        &config.tiling.options(),
    )?);
    info!(
        "Demo pyramid has {} level(s) over {:?}",
        base.num_levels(),
        base.tile_grid().geo_extent()
    );

    let registry = DatasetRegistry::new();
    registry.insert(base.clone());

    let mut pyramids: Vec<Arc<dyn MultiLevelDataset>> = Vec::new();
    pyramids.push(base);
    if let Some(period) = &config.aggregate {
        let mut params = Parameters::new();
        params.insert("period".to_string(), period.clone().into());
        let computed = ComputedMultiLevelDataset::from_ref(
            &TransformRegistry::with_builtins(),
            &TransformRef::builtin(AGGREGATE_TIME),
            ["demo"],
            &registry,
            params,
            Some(format!("demo_{period}")),
        )?;
        pyramids.push(Arc::new(computed));
    }

    let mut summaries = Vec::new();
    for pyramid in &pyramids {
        for (level, ds) in pyramid.datasets()?.into_iter().enumerate() {
            summaries.push(LevelSummary {
                ds_id: pyramid.ds_id().to_string(),
                level,
                dims: ds.dims(),
                variables: ds.data_var_names().into_iter().map(String::from).collect(),
            });
        }
    }

    // computed pyramids are not registered; the registry closes the base
    for pyramid in &pyramids[1..] {
        pyramid.close();
    }
    registry.close_all();
    Ok(summaries)
}

/// Global dataset of daily zero-filled variables starting 2019-01-01T12:00.
fn demo_dataset(config: &DemoConfig) -> Result<Dataset, DatasetError> {
    let (w, h, t) = (config.width, config.height, config.time_steps);
    let dx = 360.0 / w as f64;
    let dy = 180.0 / h as f64;

    let lon = (0..w).map(|i| -180.0 + (i as f64 + 0.5) * dx).collect();
    let lat = (0..h).map(|j| 90.0 - (j as f64 + 0.5) * dy).collect();
    let time = (0..t).map(|i| 17897.5 + i as f64).collect();

    let mut dataset = Dataset::new()
        .with_coord(
            "time",
            Variable::from_vec("time", time).with_attr("units", "days since 1970-01-01"),
        )?
        .with_coord("lat", Variable::from_vec("lat", lat))?
        .with_coord("lon", Variable::from_vec("lon", lon))?
        .with_attr("title", "cube-pyramid demo");

    for name in &config.variables {
        dataset.set_data_var(
            name.trim(),
            Variable::zeros(&[("time", t), ("lat", h), ("lon", w)]),
        )?;
    }
    Ok(dataset)
}
