//! Single-point elevation lookup.
//!
//! [`lookup`] answers a query against one open grid. [`ElevationReader`]
//! answers queries against a whole directory of grids: it locates the file
//! covering a point, keeps recently used grids open in an LRU cache and can
//! fall back to a [`CellFetcher`] for cells that are not on disk.
//!
//! ```ignore
//! use hgtload::{ElevationReaderBuilder, GeoPoint};
//!
//! let reader = ElevationReaderBuilder::new("/data/srtm")
//!     .cache_size(50)
//!     .build();
//!
//! let hit = reader.lookup(GeoPoint::new(35.3606, 138.7274))?;
//! println!("{}m at {:?} in {}", hit.value, hit.pixel, hit.path.display());
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;
use tracing::debug;

use crate::coords::{GeoPoint, PixelIndex};
use crate::error::{HgtError, Result};
use crate::fetch::{CellFetcher, ZipArchiveFetcher};
use crate::filename::{parse_origin, Origin};
use crate::grid::GridFile;
use crate::import::scan_grid_files;

const DEFAULT_CACHE_SIZE: u64 = 100;

/// Value and pixel index of the sample nearest to `point`.
///
/// # Errors
///
/// Returns [`HgtError::OutOfRange`] if the point lies outside the grid's
/// cell by more than half a sample.
pub fn lookup(grid: &GridFile, point: GeoPoint) -> Result<(i16, PixelIndex)> {
    let pixel = grid.mapper().to_pixel(point)?;
    let value = grid.value_at(pixel)?;
    Ok((value, pixel))
}

/// The answer to a point query.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Lookup {
    /// Raw sample value, which may be the no-data sentinel.
    pub value: i16,
    pub pixel: PixelIndex,
    pub origin: Origin,
    /// Grid file the value was read from.
    pub path: PathBuf,
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Number of grids currently in the cache.
    pub entry_count: u64,
    /// Number of lookups served from an already open grid.
    pub hit_count: u64,
    /// Number of lookups that had to open a grid.
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Point lookups across a directory of grid files.
pub struct ElevationReader {
    data_dir: PathBuf,
    /// Open grids keyed by cell origin.
    grid_cache: Cache<Origin, Arc<GridFile>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    fetcher: Option<Box<dyn CellFetcher>>,
}

impl ElevationReader {
    /// Create a reader with the default cache size and no fetcher.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        ElevationReaderBuilder::new(data_dir).build()
    }

    pub fn builder<P: AsRef<Path>>(data_dir: P) -> ElevationReaderBuilder {
        ElevationReaderBuilder::new(data_dir)
    }

    /// Look up the sample nearest to `point`.
    ///
    /// # Errors
    ///
    /// - [`HgtError::OutOfRange`] for coordinates outside `[-90, 90]` x `[-180, 180]`
    /// - [`HgtError::NotFound`] if no grid covers the point
    /// - [`HgtError::InvalidFileSize`] if the covering file is malformed
    pub fn lookup(&self, point: GeoPoint) -> Result<Lookup> {
        let origin = Origin::containing(point.lat, point.lng)
            .filter(|_| point.is_valid())
            .ok_or(HgtError::OutOfRange {
                lat: point.lat,
                lng: point.lng,
                cell: None,
            })?;

        let grid = self.load_grid(origin)?;
        let (value, pixel) = lookup(&grid, point)?;
        Ok(Lookup {
            value,
            pixel,
            origin,
            path: grid.path().to_path_buf(),
        })
    }

    /// Load a grid from cache, disk, or the fetcher.
    fn load_grid(&self, origin: Origin) -> Result<Arc<GridFile>> {
        if let Some(grid) = self.grid_cache.get(&origin) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(grid);
        }
        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let path = self.locate(origin)?;
        debug!(path = %path.display(), cell = %origin, "Opening grid");
        let grid = Arc::new(GridFile::open_with_origin(&path, origin)?);

        self.grid_cache.insert(origin, grid.clone());
        Ok(grid)
    }

    /// Find the file for a cell: canonical name first, then any file whose
    /// name parses to the same origin, then the fetcher.
    fn locate(&self, origin: Origin) -> Result<PathBuf> {
        let canonical = self.data_dir.join(origin.filename());
        if canonical.is_file() {
            return Ok(canonical);
        }

        if self.data_dir.is_dir() {
            let matched = scan_grid_files(&self.data_dir)?
                .into_iter()
                .find(|path| parse_origin(path).map_or(false, |o| o == origin));
            if let Some(path) = matched {
                return Ok(path);
            }
        }

        match &self.fetcher {
            Some(fetcher) => fetcher.fetch(origin, &self.data_dir),
            None => Err(HgtError::NotFound { origin }),
        }
    }

    /// Check if a fetcher is configured.
    pub fn has_fetcher(&self) -> bool {
        self.fetcher.is_some()
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.grid_cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the maximum cache size.
    pub fn cache_capacity(&self) -> u64 {
        self.grid_cache.policy().max_capacity().unwrap_or(0)
    }

    /// Drop every open grid.
    pub fn clear_cache(&self) {
        self.grid_cache.invalidate_all();
    }
}

/// Builder for [`ElevationReader`].
pub struct ElevationReaderBuilder {
    data_dir: PathBuf,
    cache_size: u64,
    fetcher: Option<Box<dyn CellFetcher>>,
}

impl ElevationReaderBuilder {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
            fetcher: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `HGTLOAD_DATA_DIR` | Directory containing .hgt files | Required |
    /// | `HGTLOAD_CACHE_SIZE` | Maximum grids kept open | 100 |
    /// | `HGTLOAD_ARCHIVE_DIR` | Directory of `.zip` archives to extract from | None |
    ///
    /// # Errors
    ///
    /// Returns an error if `HGTLOAD_DATA_DIR` is not set.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("HGTLOAD_DATA_DIR").map_err(|_| {
            HgtError::InvalidConfig("HGTLOAD_DATA_DIR environment variable not set".to_string())
        })?;

        let cache_size = std::env::var("HGTLOAD_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);

        let mut builder = Self::new(data_dir).cache_size(cache_size);
        if let Ok(archive_dir) = std::env::var("HGTLOAD_ARCHIVE_DIR") {
            builder = builder.fetcher(ZipArchiveFetcher::new(archive_dir));
        }
        Ok(builder)
    }

    /// Set the maximum number of grids to keep open.
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Fetch cells that are missing from the data directory.
    pub fn fetcher<F: CellFetcher + 'static>(mut self, fetcher: F) -> Self {
        self.fetcher = Some(Box::new(fetcher));
        self
    }

    pub fn build(self) -> ElevationReader {
        ElevationReader {
            data_dir: self.data_dir,
            grid_cache: Cache::builder().max_capacity(self.cache_size).build(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            fetcher: self.fetcher,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::TempDir;

    const SRTM3: usize = 1201;

    /// Sample value is `row * 10 + col % 10`, so lookups can be checked.
    fn write_grid(dir: &Path, name: &str) -> PathBuf {
        let mut data = Vec::with_capacity(SRTM3 * SRTM3 * 2);
        for row in 0..SRTM3 {
            for col in 0..SRTM3 {
                let value = (row * 10 + col % 10) as i16;
                data.extend_from_slice(&value.to_be_bytes());
            }
        }
        let path = dir.join(name);
        File::create(&path).unwrap().write_all(&data).unwrap();
        path
    }

    #[test]
    fn test_lookup_in_grid() {
        let dir = TempDir::new().unwrap();
        let grid = GridFile::open(write_grid(dir.path(), "N00E010.hgt")).unwrap();

        let (value, pixel) = lookup(&grid, GeoPoint::new(1.0001, 10.0001)).unwrap();
        assert_eq!(pixel, PixelIndex::new(0, 0));
        assert_eq!(value, 0);

        let (value, pixel) = lookup(&grid, GeoPoint::new(0.861295, 10.339703)).unwrap();
        assert_eq!(pixel, PixelIndex::new(166, 408));
        assert_eq!(value, 1668);

        let err = lookup(&grid, GeoPoint::new(2.5, 10.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn test_reader_lookup_and_cache() {
        let dir = TempDir::new().unwrap();
        let path = write_grid(dir.path(), "N00E010.hgt");
        let reader = ElevationReader::new(dir.path());

        let hit = reader.lookup(GeoPoint::new(0.5, 10.5)).unwrap();
        assert_eq!(hit.pixel, PixelIndex::new(600, 600));
        assert_eq!(hit.value, 6000);
        assert_eq!(hit.origin, Origin::new(0, 10).unwrap());
        assert_eq!(hit.path, path);

        reader.lookup(GeoPoint::new(0.25, 10.25)).unwrap();
        let stats = reader.cache_stats();
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.hit_count, 1);
        assert!((stats.hit_rate() - 0.5).abs() < f64::EPSILON);

        reader.clear_cache();
        reader.lookup(GeoPoint::new(0.25, 10.25)).unwrap();
        assert_eq!(reader.cache_stats().miss_count, 2);
    }

    #[test]
    fn test_reader_finds_non_canonical_names() {
        let dir = TempDir::new().unwrap();
        let path = write_grid(dir.path(), "s12w077.SRTMGL3.hgt");
        let reader = ElevationReader::new(dir.path());

        let hit = reader.lookup(GeoPoint::new(-11.5, -76.5)).unwrap();
        assert_eq!(hit.path, path);
        assert_eq!(hit.origin, Origin::new(-12, -77).unwrap());
    }

    #[test]
    fn test_reader_errors() {
        let dir = TempDir::new().unwrap();
        let reader = ElevationReader::new(dir.path());

        let err = reader.lookup(GeoPoint::new(91.0, 0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        let err = reader.lookup(GeoPoint::new(f64::NAN, 0.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);

        let err = reader.lookup(GeoPoint::new(45.5, 7.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        fs::write(dir.path().join("N45E007.hgt"), [0u8; 100]).unwrap();
        let err = reader.lookup(GeoPoint::new(45.5, 7.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_reader_uses_fetcher() {
        let data = TempDir::new().unwrap();
        let archives = TempDir::new().unwrap();
        let grid_path = write_grid(archives.path(), "N00E010.hgt");

        let zip_file = File::create(archives.path().join("N00E010.hgt.zip")).unwrap();
        let mut zip_writer = zip::ZipWriter::new(zip_file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        zip_writer.start_file("N00E010.hgt", options).unwrap();
        zip_writer.write_all(&fs::read(&grid_path).unwrap()).unwrap();
        zip_writer.finish().unwrap();

        let reader = ElevationReader::builder(data.path())
            .cache_size(4)
            .fetcher(ZipArchiveFetcher::new(archives.path()))
            .build();
        assert!(reader.has_fetcher());
        assert_eq!(reader.cache_capacity(), 4);

        let hit = reader.lookup(GeoPoint::new(0.5, 10.5)).unwrap();
        assert_eq!(hit.value, 6000);
        assert_eq!(hit.path, data.path().join("N00E010.hgt"));
    }

    #[test]
    fn test_builder_from_env() {
        let _guard = crate::ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        std::env::remove_var("HGTLOAD_DATA_DIR");
        assert!(ElevationReaderBuilder::from_env().is_err());

        std::env::set_var("HGTLOAD_DATA_DIR", "/data/srtm");
        std::env::set_var("HGTLOAD_CACHE_SIZE", "7");
        std::env::set_var("HGTLOAD_ARCHIVE_DIR", "/data/archives");
        let reader = ElevationReaderBuilder::from_env().unwrap().build();
        assert_eq!(reader.data_dir(), Path::new("/data/srtm"));
        assert_eq!(reader.cache_capacity(), 7);
        assert!(reader.has_fetcher());

        for key in ["HGTLOAD_DATA_DIR", "HGTLOAD_CACHE_SIZE", "HGTLOAD_ARCHIVE_DIR"] {
            std::env::remove_var(key);
        }
    }
}
