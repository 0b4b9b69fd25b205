//! Geographic bounding boxes.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Tolerance used when comparing longitudes against the 0..360 convention.
const LON_EPSILON: f64 = 1e-9;

/// A geographic bounding box `(west, south, east, north)`.
///
/// Construction through [`GeoExtent::new`] guarantees finite bounds with
/// `west < east` and `south < north`, which is what makes the value-based
/// `Eq` and `Hash` implementations sound. Deserialization validates the
/// same way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GeoExtentFields")]
pub struct GeoExtent {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl GeoExtent {
    /// Create a validated extent.
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Result<Self, GridError> {
        let invalid = |reason| GridError::InvalidExtent {
            west,
            south,
            east,
            north,
            reason,
        };

        if ![west, south, east, north].iter().all(|v| v.is_finite()) {
            return Err(invalid("bounds must be finite"));
        }
        if west >= east {
            return Err(invalid("west must be less than east"));
        }
        if south >= north {
            return Err(invalid("south must be less than north"));
        }

        Ok(Self {
            west,
            south,
            east,
            north,
        })
    }

    /// The whole globe in geographic coordinates.
    pub fn global() -> Self {
        Self {
            west: -180.0,
            south: -90.0,
            east: 180.0,
            north: 90.0,
        }
    }

    /// Extent in the x direction.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Extent in the y direction.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Whether the two extents overlap with a non-empty area.
    pub fn intersects(&self, other: &GeoExtent) -> bool {
        self.west < other.east
            && other.west < self.east
            && self.south < other.north
            && other.south < self.north
    }

    /// Map an extent given in the `[0, 360]` longitude convention onto
    /// `[-180, 180]`.
    ///
    /// Extents already inside `[-180, 180]` are returned unchanged. An extent
    /// that straddles the antimeridian after shifting cannot be expressed with
    /// `west < east` and is returned unchanged as well; only a full 0..360
    /// coverage is mapped to the full -180..180 range in that case.
    pub fn normalize_lon(&self) -> GeoExtent {
        if self.east <= 180.0 + LON_EPSILON {
            return *self;
        }

        if self.west >= 180.0 - LON_EPSILON {
            return GeoExtent {
                west: self.west - 360.0,
                east: self.east - 360.0,
                ..*self
            };
        }

        if self.width() >= 360.0 - LON_EPSILON {
            return GeoExtent {
                west: -180.0,
                east: 180.0,
                ..*self
            };
        }

        *self
    }

    fn bits(&self) -> [u64; 4] {
        // -0.0 and 0.0 compare equal and must hash equal
        let norm = |v: f64| if v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() };
        [
            norm(self.west),
            norm(self.south),
            norm(self.east),
            norm(self.north),
        ]
    }
}

/// Serialized form of a [`GeoExtent`], before validation.
#[derive(Deserialize)]
struct GeoExtentFields {
    west: f64,
    south: f64,
    east: f64,
    north: f64,
}

impl TryFrom<GeoExtentFields> for GeoExtent {
    type Error = GridError;

    fn try_from(f: GeoExtentFields) -> Result<Self, Self::Error> {
        GeoExtent::new(f.west, f.south, f.east, f.north)
    }
}

impl Eq for GeoExtent {}

impl Hash for GeoExtent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits().hash(state);
    }
}

impl From<GeoExtent> for (f64, f64, f64, f64) {
    fn from(e: GeoExtent) -> Self {
        (e.west, e.south, e.east, e.north)
    }
}
