//! # hgtload - SRTM grid import library
//!
//! Decodes SRTM (Shuttle Radar Topography Mission) `.hgt` elevation grids and
//! bulk-loads them into a spatial store, either as one bounding-box record
//! per sample or as raster tiles, optionally down-sampled into blocks.
//!
//! ## Quick Start
//!
//! ```ignore
//! use hgtload::{ImportConfig, ImportMode, Importer, MemoryStore, BlockSize};
//!
//! let config = ImportConfig::new("/data/srtm")
//!     .mode(ImportMode::RasterSampled(BlockSize::square(100)?))
//!     .concurrency(4);
//!
//! let store = MemoryStore::new();
//! let report = Importer::new(config, &store).run()?;
//! println!("{} files loaded, {} failed", report.succeeded, report.failed);
//! ```
//!
//! ## SRTM Data Format
//!
//! - **SRTM1**: 3601×3601 samples, 1 arc-second (~30m) resolution
//! - **SRTM3**: 1201×1201 samples, 3 arc-second (~90m) resolution
//!
//! Each sample is a 16-bit big-endian signed integer representing elevation in meters,
//! stored row by row from the north-west corner. The special value -32768
//! indicates void (no data). A file covers the one-degree cell whose
//! south-west corner is encoded in its name, e.g. `N35E138.hgt`.

pub mod coords;
pub mod error;
pub mod fetch;
pub mod filename;
pub mod grid;
pub mod import;
pub mod reader;
pub mod record;
pub mod sampler;
pub mod store;

// Re-export main types at crate root for convenience
pub use coords::{BoundingBox, CoordinateMapper, GeoPoint, PixelIndex};
pub use error::{ErrorKind, HgtError, Result};
pub use fetch::{CellFetcher, ZipArchiveFetcher};
pub use filename::Origin;
pub use grid::{GridFile, Resolution, Row, Rows, VOID_VALUE};
pub use import::{
    scan_grid_files, FileFailure, FileOutcome, ImportConfig, ImportMode, ImportReport,
    ImportTask, Importer, DEFAULT_TABLE,
};
pub use reader::{lookup, CacheStats, ElevationReader, ElevationReaderBuilder, Lookup};
pub use record::{flat_records, FlatRecord, TileRecord};
pub use sampler::{BlockSize, Blocks, NoData, PixelWindow, SampleBlock, TileSampler};
pub use store::{MemoryStore, StoreWriter};

/// Serializes tests that touch process-wide environment variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
