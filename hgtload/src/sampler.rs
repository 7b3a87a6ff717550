//! Block partitioning and down-sampling of grids.
//!
//! [`TileSampler`] walks a grid (or a window of it) in row-major block order
//! and yields one [`SampleBlock`] per block. Blocks on the eastern and
//! southern edges are truncated to the samples that remain, so the number of
//! blocks depends only on the grid size and the block size:
//!
//! ```text
//! ceil(rows / height) × ceil(cols / width)
//! ```

use crate::coords::{BoundingBox, PixelIndex};
use crate::error::{HgtError, Result};
use crate::grid::{GridFile, VOID_VALUE};

/// Target dimensions of a block, in samples. Both sides are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockSize {
    width: usize,
    height: usize,
}

impl BlockSize {
    /// # Errors
    ///
    /// Returns [`HgtError::InvalidConfig`] if either side is zero.
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(HgtError::InvalidConfig(format!(
                "block size must be non-zero, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    /// A square block.
    pub fn square(side: usize) -> Result<Self> {
        Self::new(side, side)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

impl std::str::FromStr for BlockSize {
    type Err = HgtError;

    /// Parse `WIDTHxHEIGHT` (e.g. `50x50`) or a single side (`50`).
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || HgtError::InvalidConfig(format!("invalid block size '{}'", s));
        let parse = |part: &str| part.trim().parse::<usize>().map_err(|_| invalid());

        match s.split_once(['x', 'X']) {
            Some((w, h)) => Self::new(parse(w)?, parse(h)?),
            None => Self::square(parse(s)?),
        }
    }
}

impl std::fmt::Display for BlockSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How "no data" samples are recognised and aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NoData {
    /// Sample value meaning "elevation unknown".
    pub value: i16,
    /// Leave sentinel samples out of block means.
    pub exclude: bool,
}

impl Default for NoData {
    fn default() -> Self {
        Self {
            value: VOID_VALUE,
            exclude: true,
        }
    }
}

impl NoData {
    pub fn new(value: i16) -> Self {
        Self {
            value,
            exclude: true,
        }
    }

    /// Treat the sentinel like any other sample when averaging.
    pub fn included(mut self) -> Self {
        self.exclude = false;
        self
    }

    /// Whether `sample` counts towards a mean.
    #[inline]
    pub fn counts(&self, sample: i16) -> bool {
        !(self.exclude && sample == self.value)
    }
}

/// A rectangular window of a grid, in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub top_left: PixelIndex,
    pub width: usize,
    pub height: usize,
}

impl PixelWindow {
    pub fn new(top_left: PixelIndex, width: usize, height: usize) -> Self {
        Self {
            top_left,
            width,
            height,
        }
    }

    /// The whole of a `samples × samples` grid.
    pub fn full(samples: usize) -> Self {
        Self::new(PixelIndex::new(0, 0), samples, samples)
    }
}

/// An aggregated rectangular group of samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleBlock {
    /// First sample of the block (north-west).
    pub top_left: PixelIndex,
    /// Width in samples; smaller than the target on the east edge.
    pub width: usize,
    /// Height in samples; smaller than the target on the south edge.
    pub height: usize,
    /// Rounded mean of the counted samples, or the sentinel.
    pub value: i16,
    /// Geographic extent of the block.
    pub bounds: BoundingBox,
}

impl SampleBlock {
    /// Number of samples in the block.
    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Partitions grids into blocks of a target size.
///
/// # Example
///
/// ```ignore
/// use hgtload::{BlockSize, GridFile, TileSampler};
///
/// let grid = GridFile::open("N35E138.hgt")?;
/// let sampler = TileSampler::new(BlockSize::square(50)?);
/// for block in sampler.blocks(&grid) {
///     println!("{:?} -> {}", block.top_left, block.value);
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TileSampler {
    block: BlockSize,
    no_data: NoData,
}

impl TileSampler {
    pub fn new(block: BlockSize) -> Self {
        Self {
            block,
            no_data: NoData::default(),
        }
    }

    /// Use a specific no-data rule when aggregating.
    pub fn with_no_data(mut self, no_data: NoData) -> Self {
        self.no_data = no_data;
        self
    }

    pub fn block_size(&self) -> BlockSize {
        self.block
    }

    /// Number of blocks per row and per column for a window.
    pub fn grid_dims(&self, window: PixelWindow) -> (usize, usize) {
        (
            window.width.div_ceil(self.block.width),
            window.height.div_ceil(self.block.height),
        )
    }

    /// Blocks covering the whole grid, in row-major order.
    pub fn blocks<'a>(&self, grid: &'a GridFile) -> Blocks<'a> {
        self.iter_window(grid, PixelWindow::full(grid.samples()))
    }

    /// Blocks covering a window of the grid, in row-major order.
    ///
    /// # Errors
    ///
    /// Returns [`HgtError::IndexOutOfBounds`] if the window is empty or
    /// extends past the grid.
    pub fn blocks_within<'a>(&self, grid: &'a GridFile, window: PixelWindow) -> Result<Blocks<'a>> {
        let samples = grid.samples();
        let bottom = window.top_left.row.checked_add(window.height);
        let right = window.top_left.col.checked_add(window.width);
        let fits = matches!((bottom, right), (Some(b), Some(r)) if b <= samples && r <= samples);

        if window.width == 0 || window.height == 0 || !fits {
            return Err(HgtError::IndexOutOfBounds {
                row: window.top_left.row.saturating_add(window.height),
                col: window.top_left.col.saturating_add(window.width),
                samples,
            });
        }
        Ok(self.iter_window(grid, window))
    }

    fn iter_window<'a>(&self, grid: &'a GridFile, window: PixelWindow) -> Blocks<'a> {
        let (cols, rows) = self.grid_dims(window);
        Blocks {
            grid,
            window,
            block: self.block,
            no_data: self.no_data,
            cols,
            total: cols * rows,
            next: 0,
        }
    }
}

/// Lazy iterator over the blocks of a grid window.
pub struct Blocks<'a> {
    grid: &'a GridFile,
    window: PixelWindow,
    block: BlockSize,
    no_data: NoData,
    cols: usize,
    total: usize,
    next: usize,
}

impl Blocks<'_> {
    fn aggregate(&self, top_left: PixelIndex, width: usize, height: usize) -> i16 {
        let mut sum: i64 = 0;
        let mut count: i64 = 0;

        for row in top_left.row..top_left.row + height {
            for col in top_left.col..top_left.col + width {
                let sample = self.grid.sample(row, col);
                if self.no_data.counts(sample) {
                    sum += sample as i64;
                    count += 1;
                }
            }
        }

        if count == 0 {
            return self.no_data.value;
        }
        // Mean of i16 values always fits back into i16.
        (sum as f64 / count as f64).round() as i16
    }
}

impl Iterator for Blocks<'_> {
    type Item = SampleBlock;

    fn next(&mut self) -> Option<SampleBlock> {
        if self.next >= self.total {
            return None;
        }
        let block_row = self.next / self.cols;
        let block_col = self.next % self.cols;
        self.next += 1;

        let row_offset = block_row * self.block.height;
        let col_offset = block_col * self.block.width;
        let top_left = PixelIndex::new(
            self.window.top_left.row + row_offset,
            self.window.top_left.col + col_offset,
        );
        let width = self.block.width.min(self.window.width - col_offset);
        let height = self.block.height.min(self.window.height - row_offset);

        Some(SampleBlock {
            top_left,
            width,
            height,
            value: self.aggregate(top_left, width, height),
            bounds: self.grid.mapper().block_bounds(top_left, width, height),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Blocks<'_> {}
