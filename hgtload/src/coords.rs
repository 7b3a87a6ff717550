//! Geographic coordinates, pixel indices and the mapping between them.
//!
//! A grid of `R × R` samples covers one degree cell. Sample centres are
//! spaced `1 / (R - 1)` degrees apart, with row 0 on the northern edge and
//! column 0 on the western edge, so [`CoordinateMapper::to_pixel`] and
//! [`CoordinateMapper::to_geo`] use that step.
//!
//! For storage every sample also owns a box of `1 / R` degrees on each side.
//! Those boxes tile the cell exactly, which is what flat records and block
//! bounds are built from.

use crate::error::{HgtError, Result};
use crate::filename::Origin;

/// A position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Whether the point lies within `[-90, 90] × [-180, 180]`.
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Zero-based `(row, col)` location inside a grid. Row 0 is the north edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PixelIndex {
    pub row: usize,
    pub col: usize,
}

impl PixelIndex {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// A geographic bounding box.
///
/// Coordinates are in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// Minimum latitude (southern boundary).
    pub min_lat: f64,
    /// Minimum longitude (western boundary).
    pub min_lng: f64,
    /// Maximum latitude (northern boundary).
    pub max_lat: f64,
    /// Maximum longitude (eastern boundary).
    pub max_lng: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    ///
    /// # Arguments
    ///
    /// * `min_lat` - Southern boundary latitude
    /// * `min_lng` - Western boundary longitude
    /// * `max_lat` - Northern boundary latitude
    /// * `max_lng` - Eastern boundary longitude
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        }
    }

    /// Width in degrees of longitude.
    pub fn width(&self) -> f64 {
        self.max_lng - self.min_lng
    }

    /// Height in degrees of latitude.
    pub fn height(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    /// Check if the point is inside the box, edges included.
    pub fn contains(&self, point: GeoPoint) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.lat)
            && (self.min_lng..=self.max_lng).contains(&point.lng)
    }
}

/// Converts between geographic coordinates and pixel indices of one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinateMapper {
    origin: Origin,
    samples: usize,
}

impl CoordinateMapper {
    /// Create a mapper for a grid of `samples × samples` anchored at `origin`.
    ///
    /// `samples` must be at least 2; both standard resolutions are.
    pub fn new(origin: Origin, samples: usize) -> Self {
        debug_assert!(samples >= 2, "a grid needs at least two samples per side");
        Self { origin, samples }
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Degrees between neighbouring sample centres.
    pub fn step(&self) -> f64 {
        1.0 / (self.samples - 1) as f64
    }

    /// Map a point to the nearest sample.
    ///
    /// # Errors
    ///
    /// Returns [`HgtError::OutOfRange`] when the nearest sample would fall
    /// outside the grid. Points are never clamped.
    pub fn to_pixel(&self, point: GeoPoint) -> Result<PixelIndex> {
        let span = (self.samples - 1) as f64;
        let row = ((self.origin.lat_max() as f64 - point.lat) * span).round();
        let col = ((point.lng - self.origin.lng() as f64) * span).round();

        let limit = self.samples as f64;
        if !(row >= 0.0 && row < limit && col >= 0.0 && col < limit) {
            return Err(HgtError::OutOfRange {
                lat: point.lat,
                lng: point.lng,
                cell: Some(self.origin),
            });
        }

        Ok(PixelIndex::new(row as usize, col as usize))
    }

    /// Geographic position of a sample centre.
    pub fn to_geo(&self, pixel: PixelIndex) -> GeoPoint {
        let span = (self.samples - 1) as f64;
        GeoPoint::new(
            self.origin.lat_max() as f64 - pixel.row as f64 / span,
            self.origin.lng() as f64 + pixel.col as f64 / span,
        )
    }

    /// The box owned by a single sample.
    pub fn pixel_bounds(&self, pixel: PixelIndex) -> BoundingBox {
        self.block_bounds(pixel, 1, 1)
    }

    /// The box owned by a `width × height` block whose top-left sample is
    /// `top_left`.
    ///
    /// Edges are computed from absolute sample offsets so that adjacent
    /// blocks share identical edge values.
    pub fn block_bounds(&self, top_left: PixelIndex, width: usize, height: usize) -> BoundingBox {
        let r = self.samples as f64;
        let lat_max = self.origin.lat_max() as f64;
        let lng_min = self.origin.lng() as f64;

        BoundingBox {
            min_lat: lat_max - (top_left.row + height) as f64 / r,
            max_lat: lat_max - top_left.row as f64 / r,
            min_lng: lng_min + top_left.col as f64 / r,
            max_lng: lng_min + (top_left.col + width) as f64 / r,
        }
    }

    /// The whole one-degree cell.
    pub fn cell_bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.origin.lat() as f64,
            self.origin.lng() as f64,
            self.origin.lat_max() as f64,
            (self.origin.lng() + 1) as f64,
        )
    }
}
