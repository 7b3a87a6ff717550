//! Grid file decoding.
//!
//! This module provides [`GridFile`] for reading SRTM `.hgt` files: random
//! access to single samples and lazy iteration over rows.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::coords::{BoundingBox, CoordinateMapper, PixelIndex};
use crate::error::{HgtError, Result};
use crate::filename::{parse_origin, Origin};

/// File size for SRTM1 (1 arc-second, ~30m resolution): 3601 × 3601 × 2 bytes
const SRTM1_SIZE: usize = 3601 * 3601 * 2; // 25,934,402 bytes

/// File size for SRTM3 (3 arc-second, ~90m resolution): 1201 × 1201 × 2 bytes
const SRTM3_SIZE: usize = 1201 * 1201 * 2; // 2,884,802 bytes

/// Number of samples per row/column for SRTM1
const SRTM1_SAMPLES: usize = 3601;

/// Number of samples per row/column for SRTM3
const SRTM3_SAMPLES: usize = 1201;

/// Value indicating no data (void) in SRTM files
pub const VOID_VALUE: i16 = -32768;

/// Resolution type of a grid file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Resolution {
    /// SRTM1: 1 arc-second (~30m) resolution
    Srtm1,
    /// SRTM3: 3 arc-second (~90m) resolution
    Srtm3,
}

impl Resolution {
    /// Detect the resolution from a file length in bytes.
    pub fn from_byte_len(len: usize) -> Option<Self> {
        match len {
            SRTM1_SIZE => Some(Resolution::Srtm1),
            SRTM3_SIZE => Some(Resolution::Srtm3),
            _ => None,
        }
    }

    /// Returns the number of samples per row/column for this resolution.
    pub fn samples(&self) -> usize {
        match self {
            Resolution::Srtm1 => SRTM1_SAMPLES,
            Resolution::Srtm3 => SRTM3_SAMPLES,
        }
    }

    /// Returns the expected file length in bytes.
    pub fn byte_len(&self) -> usize {
        self.samples() * self.samples() * 2
    }

    /// Returns the approximate resolution in meters.
    pub fn meters(&self) -> f64 {
        match self {
            Resolution::Srtm1 => 30.0,
            Resolution::Srtm3 => 90.0,
        }
    }
}

/// A memory-mapped, read-only elevation grid for one one-degree cell.
///
/// # Example
///
/// ```ignore
/// use hgtload::{GridFile, PixelIndex};
///
/// let grid = GridFile::open("N35E138.hgt")?;
/// let elevation = grid.value_at(PixelIndex::new(600, 600))?;
/// println!("Elevation: {}m", elevation);
/// ```
pub struct GridFile {
    /// Memory-mapped file data
    data: Mmap,
    /// Path the grid was opened from
    path: PathBuf,
    /// Resolution type
    resolution: Resolution,
    /// Southwest corner of the cell
    origin: Origin,
}

impl std::fmt::Debug for GridFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridFile")
            .field("path", &self.path)
            .field("resolution", &self.resolution)
            .field("origin", &self.origin)
            .finish()
    }
}

impl GridFile {
    /// Open a grid file, reading its origin from the file name.
    ///
    /// The resolution (SRTM1 vs SRTM3) is detected from the file size.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The name does not encode a cell origin (e.g. `N35E138.hgt`)
    /// - The file cannot be opened or memory-mapped
    /// - The file size doesn't match SRTM1 or SRTM3 format
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let origin = parse_origin(path.as_ref())?;
        Self::open_with_origin(path, origin)
    }

    /// Open a grid file with an explicit origin.
    ///
    /// This is useful when the filename doesn't follow the naming convention.
    pub fn open_with_origin<P: AsRef<Path>>(path: P, origin: Origin) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| HgtError::io(path, e))?;

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. We open the file read-only and don't expose the mapping.
        let mmap = unsafe { Mmap::map(&file).map_err(|e| HgtError::io(path, e))? };

        let resolution =
            Resolution::from_byte_len(mmap.len()).ok_or_else(|| HgtError::InvalidFileSize {
                path: path.to_path_buf(),
                size: mmap.len(),
            })?;

        Ok(Self {
            data: mmap,
            path: path.to_path_buf(),
            resolution,
            origin,
        })
    }

    /// Get the sample at a row/column index.
    ///
    /// # Errors
    ///
    /// Returns [`HgtError::IndexOutOfBounds`] if the index is outside the grid.
    pub fn value_at(&self, pixel: PixelIndex) -> Result<i16> {
        let samples = self.samples();
        if pixel.row >= samples || pixel.col >= samples {
            return Err(HgtError::IndexOutOfBounds {
                row: pixel.row,
                col: pixel.col,
                samples,
            });
        }
        Ok(self.sample(pixel.row, pixel.col))
    }

    /// Unchecked read; callers guarantee the index is inside the grid.
    #[inline]
    pub(crate) fn sample(&self, row: usize, col: usize) -> i16 {
        // 2 bytes per sample, row-major order
        let offset = (row * self.samples() + col) * 2;
        i16::from_be_bytes([self.data[offset], self.data[offset + 1]])
    }

    /// Iterate over rows from north to south.
    ///
    /// Each call starts a fresh pass over the grid.
    pub fn rows(&self) -> Rows<'_> {
        Rows {
            grid: self,
            next: 0,
        }
    }

    /// Raw big-endian sample bytes of a whole row.
    pub(crate) fn row_bytes(&self, row: usize) -> &[u8] {
        let width = self.samples() * 2;
        &self.data[row * width..(row + 1) * width]
    }

    /// Raw big-endian sample bytes of the whole grid.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the resolution of this grid.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the number of samples per row/column.
    pub fn samples(&self) -> usize {
        self.resolution.samples()
    }

    /// Returns the southwest corner of the cell.
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Returns the path the grid was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Coordinate mapper for this grid.
    pub fn mapper(&self) -> CoordinateMapper {
        CoordinateMapper::new(self.origin, self.samples())
    }

    /// The one-degree cell covered by this grid.
    pub fn bounds(&self) -> BoundingBox {
        self.mapper().cell_bounds()
    }
}

/// Iterator over the rows of a [`GridFile`], north to south.
pub struct Rows<'a> {
    grid: &'a GridFile,
    next: usize,
}

impl<'a> Iterator for Rows<'a> {
    type Item = (usize, Row<'a>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.grid.samples() {
            return None;
        }
        let row = self.next;
        self.next += 1;
        Some((
            row,
            Row {
                bytes: self.grid.row_bytes(row),
            },
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.grid.samples() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Rows<'_> {}

/// One row of samples, west to east.
#[derive(Clone, Copy)]
pub struct Row<'a> {
    bytes: &'a [u8],
}

impl<'a> Row<'a> {
    /// Number of samples in the row.
    pub fn len(&self) -> usize {
        self.bytes.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Sample at `col`, if inside the row.
    pub fn get(&self, col: usize) -> Option<i16> {
        let offset = col.checked_mul(2)?;
        let pair = self.bytes.get(offset..offset + 2)?;
        Some(i16::from_be_bytes([pair[0], pair[1]]))
    }

    /// Decoded samples, west to east.
    pub fn iter(&self) -> impl Iterator<Item = i16> + 'a {
        self.bytes
            .chunks_exact(2)
            .map(|pair| i16::from_be_bytes([pair[0], pair[1]]))
    }

    /// Decode the row into a vector.
    pub fn to_vec(&self) -> Vec<i16> {
        self.iter().collect()
    }
}
