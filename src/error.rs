use thiserror::Error;

/// Errors raised when a tile grid or its derivation parameters are invalid
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// A count or size field must be strictly positive
    #[error("Invalid tile grid: {field} must be greater than 0, got {value}")]
    NonPositive { field: &'static str, value: usize },

    /// Geographic extent bounds are inverted, empty, or not finite
    #[error("Invalid geographic extent: {reason} (west={west}, south={south}, east={east}, north={north})")]
    InvalidExtent {
        west: f64,
        south: f64,
        east: f64,
        north: f64,
        reason: &'static str,
    },

    /// Tile size bounds passed to grid derivation are inconsistent
    #[error("Invalid tile size bounds: min_tile_size={min} is greater than max_tile_size={max}")]
    InvalidTileSizeBounds { min: usize, max: usize },

    /// Requested level is not part of the grid
    #[error("Level {level} out of range: grid has {num_levels} level(s)")]
    LevelOutOfRange { level: usize, num_levels: usize },

    /// The finest level would be too large to address in pixels
    #[error("Invalid tile grid: {num_levels} levels overflow the pixel size of the finest level")]
    TooManyLevels { num_levels: usize },
}

/// Errors raised by operations on a single raster dataset
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DatasetError {
    /// A variable's dimension names and array rank disagree
    #[error("Variable has {names} dimension name(s) but its array has rank {rank}")]
    RankMismatch { names: usize, rank: usize },

    /// A dimension already exists with a different size
    #[error("Conflicting size for dimension '{dim}': dataset has {existing}, variable '{name}' has {actual}")]
    DimensionConflict {
        dim: String,
        name: String,
        existing: usize,
        actual: usize,
    },

    /// Data variable name present in both datasets being merged
    #[error("Data variable '{0}' is present in more than one dataset")]
    VariableConflict(String),

    /// Coordinates of the same name differ between datasets being merged
    #[error("Coordinate '{0}' differs between datasets")]
    CoordinateMismatch(String),

    /// The dataset has no recognizable spatial dimensions
    #[error("Dataset has no spatial dimensions (expected lat/lon or y/x)")]
    MissingSpatialDims,

    /// A required coordinate variable is missing
    #[error("Missing coordinate variable '{0}'")]
    MissingCoordinate(String),

    /// Array shapes could not be combined
    #[error("Shape error: {0}")]
    Shape(String),

    /// A level store has no entry for the requested level
    #[error("Level {0} is not stored")]
    MissingLevel(usize),

    /// A stored level does not have the pixel size its tile grid prescribes
    #[error("Level {level} has spatial size {actual:?}, expected {expected:?}")]
    UnexpectedSize {
        level: usize,
        expected: (usize, usize),
        actual: (usize, usize),
    },

    /// Downsampling factor must be at least 1
    #[error("Invalid downsampling factor {0}")]
    InvalidFactor(usize),
}

/// Coarse classification of pyramid errors.
///
/// Callers that only need to know which kind of failure happened (for
/// example to map it onto an HTTP status or an exit code) can match on this
/// instead of the full [`PyramidError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid or inconsistent construction parameters
    Config,
    /// Level argument outside `[0, num_levels)`
    Index,
    /// Transform invocation failed or produced an unusable result
    Computation,
    /// Variable name collision while combining datasets
    Conflict,
    /// Failure of an underlying dataset operation
    Dataset,
}

/// Errors raised by multi-level datasets
#[derive(Debug, Clone, Error)]
pub enum PyramidError {
    /// Tile grid is invalid
    #[error("Invalid tile grid: {0}")]
    Grid(#[from] GridError),

    /// Dataset identifier is empty
    #[error("Dataset identifier must not be empty")]
    EmptyId,

    /// A combined or computed dataset was given no inputs
    #[error("Dataset '{ds_id}' requires at least one input")]
    NoInputs { ds_id: String },

    /// The resolver does not know the requested identifier
    #[error("Unknown input dataset '{input_id}' requested by '{ds_id}'")]
    UnknownDataset { ds_id: String, input_id: String },

    /// Inputs disagree on their number of levels
    #[error("Input '{input_id}' of '{ds_id}' has {actual} level(s), expected {expected}")]
    LevelCountMismatch {
        ds_id: String,
        input_id: String,
        expected: usize,
        actual: usize,
    },

    /// Inputs disagree on their tile grid
    #[error("Input '{input_id}' of '{ds_id}' has a different tile grid")]
    TileGridMismatch { ds_id: String, input_id: String },

    /// Transform reference could not be resolved
    #[error("Unresolved transform '{function}' in '{location}'")]
    UnresolvedTransform { location: String, function: String },

    /// Level index outside `[0, num_levels)`
    #[error("Level {level} out of range for dataset '{ds_id}' with {num_levels} level(s)")]
    LevelOutOfRange {
        ds_id: String,
        level: usize,
        num_levels: usize,
    },

    /// Transform failed or returned an unusable dataset
    #[error("Computing level {level} of dataset '{ds_id}' failed: {reason}")]
    Computation {
        ds_id: String,
        level: usize,
        reason: String,
    },

    /// Data variable name collision while combining
    #[error("Variable '{name}' occurs in more than one input of '{ds_id}' at level {level}")]
    VariableConflict {
        ds_id: String,
        level: usize,
        name: String,
    },

    /// Underlying dataset operation failed
    #[error("Dataset error in '{ds_id}': {source}")]
    Dataset {
        ds_id: String,
        #[source]
        source: DatasetError,
    },
}

impl PyramidError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PyramidError::Grid(GridError::LevelOutOfRange { .. }) => ErrorKind::Index,
            PyramidError::Grid(_)
            | PyramidError::EmptyId
            | PyramidError::NoInputs { .. }
            | PyramidError::UnknownDataset { .. }
            | PyramidError::LevelCountMismatch { .. }
            | PyramidError::TileGridMismatch { .. }
            | PyramidError::UnresolvedTransform { .. } => ErrorKind::Config,
            PyramidError::LevelOutOfRange { .. } => ErrorKind::Index,
            PyramidError::Computation { .. } => ErrorKind::Computation,
            PyramidError::VariableConflict { .. } => ErrorKind::Conflict,
            PyramidError::Dataset { .. } => ErrorKind::Dataset,
        }
    }

    /// Wrap a dataset error with the identifier of the pyramid it occurred in.
    pub fn dataset(ds_id: impl Into<String>, source: DatasetError) -> Self {
        PyramidError::Dataset {
            ds_id: ds_id.into(),
            source,
        }
    }
}
