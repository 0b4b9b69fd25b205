//! Configuration for pyramid construction and the `cube-pyramid` tool.
//!
//! Library callers use [`PyramidOptions`] directly. The binary parses the
//! same settings from the command line with clap, falling back to
//! environment variables with the `CUBE_` prefix.
//!
//! # Example
//!
//! ```ignore
//! use cube_pyramid::config::Cli;
//!
//! let cli = Cli::parse();
//! match cli.command {
//!     Command::Grid(config) => println!("{:?}", config.grid.tile_grid()),
//!     _ => {}
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `CUBE_MIN_TILE_SIZE` - Smallest derived tile size (default: 128)
//! - `CUBE_MAX_TILE_SIZE` - Largest derived tile size (default: 512)
//! - `CUBE_MAX_LEVELS` - Upper bound on the number of levels (default: none)
//! - `CUBE_DOWNSAMPLE` - Downsampling method, `nearest` or `mean` (default: nearest)
//! - `CUBE_FORMAT` - Output format, `text` or `json` (default: text)

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::dataset::DownsampleMethod;
use crate::error::GridError;
use crate::grid::{GeoExtent, TileGrid, TilingOptions, DEFAULT_MAX_TILE_SIZE, DEFAULT_MIN_TILE_SIZE};

// =============================================================================
// Default Values
// =============================================================================

/// Default raster width of the demo dataset (0.25° global grid).
pub const DEFAULT_DEMO_WIDTH: usize = 1440;

/// Default raster height of the demo dataset.
pub const DEFAULT_DEMO_HEIGHT: usize = 720;

/// Default number of daily time steps of the demo dataset.
pub const DEFAULT_DEMO_TIME_STEPS: usize = 14;

// =============================================================================
// Pyramid Options
// =============================================================================

/// Settings for deriving a pyramid from a base dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PyramidOptions {
    /// Smallest acceptable tile width/height
    pub min_tile_size: usize,

    /// Largest acceptable tile width/height
    pub max_tile_size: usize,

    /// Upper bound on the number of levels, if any
    pub max_levels: Option<usize>,

    /// How cells are aggregated for levels above 0
    pub downsample_method: DownsampleMethod,
}

impl Default for PyramidOptions {
    fn default() -> Self {
        Self {
            min_tile_size: DEFAULT_MIN_TILE_SIZE,
            max_tile_size: DEFAULT_MAX_TILE_SIZE,
            max_levels: None,
            downsample_method: DownsampleMethod::default(),
        }
    }
}

impl PyramidOptions {
    /// Tiling part of the options.
    pub fn tiling(&self) -> TilingOptions {
        TilingOptions {
            min_tile_size: self.min_tile_size,
            max_tile_size: self.max_tile_size,
            max_levels: self.max_levels,
        }
    }

    /// Validate the options.
    pub fn validate(&self) -> Result<(), GridError> {
        self.tiling().validate()
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// cube-pyramid - Multi-level pyramids for geospatial raster data cubes.
#[derive(Parser, Debug, Clone)]
#[command(name = "cube-pyramid")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Derive the tile grid of a raster.
    Grid(GridConfig),

    /// List the tiles covering a bounding box at a zoom level.
    Tiles(TilesConfig),

    /// Build a synthetic pyramid and print the shape of every level.
    Demo(DemoConfig),
}

/// Output format of the subcommands.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human readable text
    #[default]
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Tiling settings shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct TilingArgs {
    /// Smallest acceptable tile size in pixels.
    #[arg(long, default_value_t = DEFAULT_MIN_TILE_SIZE, env = "CUBE_MIN_TILE_SIZE")]
    pub min_tile_size: usize,

    /// Largest acceptable tile size in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_TILE_SIZE, env = "CUBE_MAX_TILE_SIZE")]
    pub max_tile_size: usize,

    /// Upper bound on the number of levels.
    #[arg(long, env = "CUBE_MAX_LEVELS")]
    pub max_levels: Option<usize>,

    /// Downsampling method for derived levels (nearest, mean).
    #[arg(long, default_value = "nearest", env = "CUBE_DOWNSAMPLE")]
    pub downsample: DownsampleMethod,
}

impl TilingArgs {
    /// Convert into library options.
    pub fn options(&self) -> PyramidOptions {
        PyramidOptions {
            min_tile_size: self.min_tile_size,
            max_tile_size: self.max_tile_size,
            max_levels: self.max_levels,
            downsample_method: self.downsample,
        }
    }
}

/// Raster geometry shared by `grid` and `tiles`.
#[derive(Args, Debug, Clone)]
pub struct GridArgs {
    /// Raster width in pixels at full resolution.
    #[arg(long)]
    pub width: usize,

    /// Raster height in pixels at full resolution.
    #[arg(long)]
    pub height: usize,

    /// Geographic extent as west,south,east,north.
    #[arg(
        long,
        value_delimiter = ',',
        allow_hyphen_values = true,
        default_values_t = [-180.0, -90.0, 180.0, 90.0]
    )]
    pub extent: Vec<f64>,

    /// Tile row 0 is at the southern edge.
    #[arg(long, default_value_t = false)]
    pub inv_y: bool,

    #[command(flatten)]
    pub tiling: TilingArgs,
}

impl GridArgs {
    /// Validate the arguments and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }
        parse_extent("extent", &self.extent)?;
        self.tiling.options().validate().map_err(|e| e.to_string())
    }

    /// Geographic extent, with 0..360 longitudes mapped to -180..180.
    pub fn geo_extent(&self) -> Result<GeoExtent, String> {
        parse_extent("extent", &self.extent).map(|e| e.normalize_lon())
    }

    /// Derive the tile grid.
    pub fn tile_grid(&self) -> Result<TileGrid, String> {
        let extent = self.geo_extent()?;
        TileGrid::create(
            self.width,
            self.height,
            &self.tiling.options().tiling(),
            extent,
            self.inv_y,
        )
        .map_err(|e| e.to_string())
    }
}

/// Arguments of `grid`.
#[derive(Args, Debug, Clone)]
pub struct GridConfig {
    #[command(flatten)]
    pub grid: GridArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "CUBE_FORMAT")]
    pub format: OutputFormat,
}

/// Arguments of `tiles`.
#[derive(Args, Debug, Clone)]
pub struct TilesConfig {
    #[command(flatten)]
    pub grid: GridArgs,

    /// Zoom level (0 is the coarsest).
    #[arg(long)]
    pub zoom: usize,

    /// Bounding box as west,south,east,north.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub bbox: Vec<f64>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "CUBE_FORMAT")]
    pub format: OutputFormat,
}

impl TilesConfig {
    /// Validate the arguments and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.grid.validate()?;
        parse_extent("bbox", &self.bbox)?;
        Ok(())
    }

    /// The bounding box.
    pub fn window(&self) -> Result<GeoExtent, String> {
        parse_extent("bbox", &self.bbox)
    }
}

/// Arguments of `demo`.
#[derive(Args, Debug, Clone)]
pub struct DemoConfig {
    /// Raster width in pixels.
    #[arg(long, default_value_t = DEFAULT_DEMO_WIDTH)]
    pub width: usize,

    /// Raster height in pixels.
    #[arg(long, default_value_t = DEFAULT_DEMO_HEIGHT)]
    pub height: usize,

    /// Number of daily time steps.
    #[arg(long, default_value_t = DEFAULT_DEMO_TIME_STEPS)]
    pub time_steps: usize,

    /// Data variable names (comma-separated).
    #[arg(long, value_delimiter = ',', default_value = "chl,tsm")]
    pub variables: Vec<String>,

    /// Also build a computed pyramid aggregating time over this period
    /// (e.g. 1W, 7D).
    #[arg(long)]
    pub aggregate: Option<String>,

    #[command(flatten)]
    pub tiling: TilingArgs,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, env = "CUBE_FORMAT")]
    pub format: OutputFormat,
}

impl DemoConfig {
    /// Validate the arguments and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be greater than 0".to_string());
        }
        if self.time_steps == 0 {
            return Err("time_steps must be greater than 0".to_string());
        }
        if self.variables.is_empty() || self.variables.iter().any(|v| v.trim().is_empty()) {
            return Err("variables must be a non-empty list of names".to_string());
        }
        self.tiling.options().validate().map_err(|e| e.to_string())
    }
}

fn parse_extent(name: &str, values: &[f64]) -> Result<GeoExtent, String> {
    match values {
        [west, south, east, north] => {
            GeoExtent::new(*west, *south, *east, *north).map_err(|e| format!("{name}: {e}"))
        }
        _ => Err(format!(
            "{name} must have 4 comma-separated values (west,south,east,north), got {}",
            values.len()
        )),
    }
}

// =============================================================================
// Tests
// =============================================================================
