//! Record shapes written to the store.
//!
//! Flat records index one elevation value by its bounding box, for stores
//! without raster support. Tile records carry a north-up raster payload with
//! its geographic placement, for stores with native raster types.

use crate::coords::{BoundingBox, GeoPoint, PixelIndex};
use crate::grid::GridFile;
use crate::sampler::{NoData, SampleBlock};

/// A bounding-box-indexed elevation value.
///
/// `value` is `None` where the grid has no data, so stores can write NULL.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FlatRecord {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lng_min: f64,
    pub lng_max: f64,
    pub value: Option<i16>,
}

impl FlatRecord {
    pub fn new(bounds: BoundingBox, value: Option<i16>) -> Self {
        Self {
            lat_min: bounds.min_lat,
            lat_max: bounds.max_lat,
            lng_min: bounds.min_lng,
            lng_max: bounds.max_lng,
            value,
        }
    }

    /// A record for a raw sample or block value; sentinels the rule
    /// excludes become `None`.
    pub fn with_no_data(bounds: BoundingBox, value: i16, no_data: NoData) -> Self {
        Self::new(bounds, no_data.counts(value).then_some(value))
    }

    /// A record for an aggregated block.
    pub fn from_block(block: &SampleBlock, no_data: NoData) -> Self {
        Self::with_no_data(block.bounds, block.value, no_data)
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.lat_min, self.lng_min, self.lat_max, self.lng_max)
    }
}

/// A raster-shaped elevation payload with its geographic placement.
///
/// Pixels are stored row-major from the north-west corner as big-endian
/// `i16`, the same layout as the grid files themselves.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileRecord {
    /// North-west corner of the tile.
    pub upper_left: GeoPoint,
    /// Degrees of longitude per pixel.
    pub scale_x: f64,
    /// Degrees of latitude per pixel (rows run southwards).
    pub scale_y: f64,
    /// Pixels per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
    /// Pixel value meaning "no data".
    pub no_data: i16,
    /// Big-endian samples, `width * height * 2` bytes.
    pub payload: Vec<u8>,
}

impl TileRecord {
    /// A tile holding every sample of a grid.
    ///
    /// The scale is `1 / samples` on both axes so the tile spans exactly the
    /// one-degree cell.
    pub fn full_grid(grid: &GridFile, no_data: NoData) -> Self {
        let samples = grid.samples();
        let bounds = grid.bounds();
        let scale = 1.0 / samples as f64;

        Self {
            upper_left: GeoPoint::new(bounds.max_lat, bounds.min_lng),
            scale_x: scale,
            scale_y: scale,
            width: samples,
            height: samples,
            no_data: no_data.value,
            payload: grid.as_bytes().to_vec(),
        }
    }

    /// A one-pixel tile holding a block's aggregated value.
    ///
    /// The pixel spans the whole block, so the scale is the block's extent:
    /// `width / samples` and `height / samples` degrees.
    pub fn from_block(block: &SampleBlock, no_data: NoData) -> Self {
        Self {
            upper_left: GeoPoint::new(block.bounds.max_lat, block.bounds.min_lng),
            scale_x: block.bounds.width(),
            scale_y: block.bounds.height(),
            width: 1,
            height: 1,
            no_data: no_data.value,
            payload: block.value.to_be_bytes().to_vec(),
        }
    }

    /// Geographic extent of the tile.
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(
            self.upper_left.lat - self.scale_y * self.height as f64,
            self.upper_left.lng,
            self.upper_left.lat,
            self.upper_left.lng + self.scale_x * self.width as f64,
        )
    }

    /// Decode the payload.
    pub fn samples(&self) -> Vec<i16> {
        self.payload
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
            .collect()
    }

    /// Pixel value at `(row, col)` of the tile.
    pub fn value_at(&self, pixel: PixelIndex) -> Option<i16> {
        if pixel.row >= self.height || pixel.col >= self.width {
            return None;
        }
        let offset = (pixel.row * self.width + pixel.col) * 2;
        let pair = self.payload.get(offset..offset + 2)?;
        Some(i16::from_be_bytes([pair[0], pair[1]]))
    }
}

/// One flat record per sample, in row-major scan order.
///
/// Holds `R²` records at once (about 520 MB for an SRTM1 grid).
pub fn flat_records(grid: &GridFile, no_data: NoData) -> Vec<FlatRecord> {
    let mapper = grid.mapper();
    let mut records = Vec::with_capacity(grid.samples() * grid.samples());

    for (row, samples) in grid.rows() {
        for (col, value) in samples.iter().enumerate() {
            let bounds = mapper.pixel_bounds(PixelIndex::new(row, col));
            records.push(FlatRecord::with_no_data(bounds, value, no_data));
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::VOID_VALUE;
    use crate::sampler::{BlockSize, TileSampler};
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    const SRTM3: usize = 1201;

    fn write_grid(dir: &std::path::Path, name: &str) -> GridFile {
        let mut data = Vec::with_capacity(SRTM3 * SRTM3 * 2);
        for row in 0..SRTM3 {
            for col in 0..SRTM3 {
                data.extend_from_slice(&((row * 3 + col) as i16).to_be_bytes());
            }
        }
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(&data).unwrap();
        GridFile::open(&path).unwrap()
    }

    #[test]
    fn test_flat_records_partition_cell() {
        let dir = TempDir::new().unwrap();
        let grid = write_grid(dir.path(), "S01W002.hgt");
        let records = flat_records(&grid, NoData::default());

        assert_eq!(records.len(), SRTM3 * SRTM3);

        // Scan order and values follow the grid.
        assert_eq!(records[0].value, Some(0));
        assert_eq!(records[1].value, Some(1));
        assert_eq!(records[SRTM3].value, Some(3));

        // Each row of boxes covers the full longitude span without gaps.
        for row in [0, 600, SRTM3 - 1] {
            let line = &records[row * SRTM3..(row + 1) * SRTM3];
            assert_eq!(line[0].lng_min, -2.0);
            assert_eq!(line[SRTM3 - 1].lng_max, -1.0);
            for pair in line.windows(2) {
                assert_eq!(pair[0].lng_max, pair[1].lng_min);
                assert_eq!(pair[0].lat_min, pair[1].lat_min);
            }
        }

        // Consecutive rows stack without gaps, top and bottom are the cell edges.
        assert_eq!(records[0].lat_max, 0.0);
        assert_eq!(records[SRTM3 * (SRTM3 - 1)].lat_min, -1.0);
        for row in 1..SRTM3 {
            assert_eq!(records[(row - 1) * SRTM3].lat_min, records[row * SRTM3].lat_max);
        }

        let area: f64 = records
            .iter()
            .map(|r| (r.lat_max - r.lat_min) * (r.lng_max - r.lng_min))
            .sum();
        assert!((area - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_full_grid_tile() {
        let dir = TempDir::new().unwrap();
        let grid = write_grid(dir.path(), "N00E010.hgt");
        let tile = TileRecord::full_grid(&grid, NoData::default());

        assert_eq!((tile.width, tile.height), (SRTM3, SRTM3));
        assert_eq!(tile.scale_x, 1.0 / SRTM3 as f64);
        assert_eq!(tile.scale_y, 1.0 / SRTM3 as f64);
        assert_eq!(tile.upper_left, GeoPoint::new(1.0, 10.0));
        assert_eq!(tile.payload.len(), SRTM3 * SRTM3 * 2);
        assert_eq!(tile.value_at(PixelIndex::new(2, 5)), Some(11));
        assert_eq!(tile.value_at(PixelIndex::new(SRTM3, 0)), None);

        let bounds = tile.bounds();
        assert!((bounds.min_lat - 0.0).abs() < 1e-9);
        assert!((bounds.max_lng - 11.0).abs() < 1e-9);
    }

    #[test]
    fn test_block_tile() {
        let dir = TempDir::new().unwrap();
        let grid = write_grid(dir.path(), "N00E010.hgt");
        let sampler = TileSampler::new(BlockSize::square(100).unwrap());
        let block = sampler.blocks(&grid).next().unwrap();
        let tile = TileRecord::from_block(&block, NoData::default());

        assert_eq!((tile.width, tile.height), (1, 1));
        assert_eq!(tile.samples(), vec![block.value]);
        assert!((tile.scale_x - 100.0 / SRTM3 as f64).abs() < 1e-12);
        assert!((tile.scale_y - 100.0 / SRTM3 as f64).abs() < 1e-12);
        assert_eq!(tile.upper_left, GeoPoint::new(1.0, 10.0));

        let flat = FlatRecord::from_block(&block, NoData::default());
        assert_eq!(flat.bounds(), block.bounds);
        assert_eq!(flat.value, Some(block.value));
    }

    #[test]
    fn test_void_samples_have_no_value() {
        let dir = TempDir::new().unwrap();
        let mut data = Vec::with_capacity(SRTM3 * SRTM3 * 2);
        for i in 0..SRTM3 * SRTM3 {
            let value = if i % 2 == 0 { VOID_VALUE } else { 7 };
            data.extend_from_slice(&value.to_be_bytes());
        }
        let path = dir.path().join("N00E010.hgt");
        File::create(&path).unwrap().write_all(&data).unwrap();
        let grid = GridFile::open(&path).unwrap();

        let records = flat_records(&grid, NoData::default());
        assert_eq!(records[0].value, None);
        assert_eq!(records[1].value, Some(7));

        // A rule that counts the sentinel keeps it as a value.
        let records = flat_records(&grid, NoData::default().included());
        assert_eq!(records[0].value, Some(VOID_VALUE));

        // An all-void block becomes a record without a value.
        let bounds = grid.bounds();
        let record = FlatRecord::with_no_data(bounds, VOID_VALUE, NoData::default());
        assert_eq!(record.value, None);
        let record = FlatRecord::with_no_data(bounds, -9999, NoData::new(-9999));
        assert_eq!(record.value, None);
    }
}
