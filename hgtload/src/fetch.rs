//! Producing local grid files for cells that are not on disk yet.
//!
//! A [`CellFetcher`] turns a cell origin into the path of a decompressed
//! `.hgt` file. Network download is left to callers; this crate ships
//! [`ZipArchiveFetcher`], which extracts grids from a directory of `.zip`
//! archives as distributed by most SRTM mirrors.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::ZipArchive;

use crate::error::{HgtError, Result};
use crate::filename::Origin;

/// Produces a local grid file for a cell.
pub trait CellFetcher: Send + Sync {
    /// Make the grid for `origin` available under `dest_dir` and return its
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`HgtError::NotFound`] if the cell is not available.
    fn fetch(&self, origin: Origin, dest_dir: &Path) -> Result<PathBuf>;
}

/// Extracts grids from `N35E138.hgt.zip` or `N35E138.zip` archives.
#[derive(Debug, Clone)]
pub struct ZipArchiveFetcher {
    archive_dir: PathBuf,
}

impl ZipArchiveFetcher {
    pub fn new<P: AsRef<Path>>(archive_dir: P) -> Self {
        Self {
            archive_dir: archive_dir.as_ref().to_path_buf(),
        }
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    fn archive_for(&self, origin: Origin) -> Option<PathBuf> {
        let name = origin.to_string();
        [format!("{}.hgt.zip", name), format!("{}.zip", name)]
            .into_iter()
            .map(|candidate| self.archive_dir.join(candidate))
            .find(|path| path.is_file())
    }
}

impl CellFetcher for ZipArchiveFetcher {
    fn fetch(&self, origin: Origin, dest_dir: &Path) -> Result<PathBuf> {
        let dest_path = dest_dir.join(origin.filename());

        // Skip if file already exists
        if dest_path.exists() {
            return Ok(dest_path);
        }

        let zip_path = self
            .archive_for(origin)
            .ok_or(HgtError::NotFound { origin })?;
        debug!(archive = %zip_path.display(), cell = %origin, "Extracting grid");

        fs::create_dir_all(dest_dir).map_err(|e| HgtError::io(dest_dir, e))?;
        extract_grid(&zip_path, &dest_path)?;
        Ok(dest_path)
    }
}

/// Copy the first `.hgt` entry of an archive to `dest_path`.
///
/// The grid is written next to its destination and renamed into place, so a
/// concurrent reader never sees a partial file.
fn extract_grid(zip_path: &Path, dest_path: &Path) -> Result<()> {
    let invalid = |e: zip::result::ZipError| {
        HgtError::io(zip_path, io::Error::new(io::ErrorKind::InvalidData, e))
    };

    let file = File::open(zip_path).map_err(|e| HgtError::io(zip_path, e))?;
    let mut archive = ZipArchive::new(file).map_err(invalid)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(invalid)?;
        if !entry.is_file() || !entry.name().to_ascii_lowercase().ends_with(".hgt") {
            continue;
        }

        let part_path = dest_path.with_extension("hgt.part");
        let result = File::create(&part_path)
            .and_then(|mut out| io::copy(&mut entry, &mut out))
            .and_then(|_| fs::rename(&part_path, dest_path));
        if let Err(e) = result {
            let _ = fs::remove_file(&part_path);
            return Err(HgtError::io(dest_path, e));
        }
        return Ok(());
    }

    Err(HgtError::io(
        zip_path,
        io::Error::new(io::ErrorKind::NotFound, "no .hgt entry in archive"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
        let file = File::create(path).unwrap();
        let mut zip_writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, data) in entries {
            zip_writer.start_file(*name, options).unwrap();
            zip_writer.write_all(data).unwrap();
        }
        zip_writer.finish().unwrap();
    }

    #[test]
    fn test_extracts_hgt_entry() {
        let archives = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        write_zip(
            &archives.path().join("N40E010.hgt.zip"),
            &[
                ("readme.txt", b"hello".as_slice()),
                ("N40E010.hgt", [1u8, 2, 3, 4].as_slice()),
            ],
        );

        let fetcher = ZipArchiveFetcher::new(archives.path());
        let origin = Origin::new(40, 10).unwrap();
        let path = fetcher.fetch(origin, data.path()).unwrap();

        assert_eq!(path, data.path().join("N40E010.hgt"));
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
        assert!(!data.path().join("N40E010.hgt.part").exists());
    }

    #[test]
    fn test_plain_zip_name_and_existing_file() {
        let archives = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        write_zip(
            &archives.path().join("S12W077.zip"),
            &[("S12W077.HGT", [9u8, 9].as_slice())],
        );

        let fetcher = ZipArchiveFetcher::new(archives.path());
        let origin = Origin::new(-12, -77).unwrap();
        let path = fetcher.fetch(origin, data.path()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![9, 9]);

        // A file already in place is returned untouched.
        fs::write(&path, [7u8]).unwrap();
        let again = fetcher.fetch(origin, data.path()).unwrap();
        assert_eq!(fs::read(again).unwrap(), vec![7]);
    }

    #[test]
    fn test_missing_archive() {
        let archives = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let fetcher = ZipArchiveFetcher::new(archives.path());

        let err = fetcher
            .fetch(Origin::new(1, 1).unwrap(), data.path())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_archive_without_grid() {
        let archives = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        write_zip(&archives.path().join("N01E001.zip"), &[("notes.txt", b"x".as_slice())]);

        let fetcher = ZipArchiveFetcher::new(archives.path());
        let err = fetcher
            .fetch(Origin::new(1, 1).unwrap(), data.path())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!data.path().join("N01E001.hgt").exists());
    }

    #[test]
    fn test_corrupt_archive() {
        let archives = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        fs::write(archives.path().join("N01E001.hgt.zip"), b"not a zip").unwrap();

        let fetcher = ZipArchiveFetcher::new(archives.path());
        let err = fetcher
            .fetch(Origin::new(1, 1).unwrap(), data.path())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
