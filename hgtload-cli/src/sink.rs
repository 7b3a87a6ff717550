//! A store writer that appends records to files.
//!
//! Flat batches go to `<table>.csv`, tile batches to `<table>.ndjson` with
//! one JSON object per tile. Each batch is encoded in memory first and then
//! appended with one write under a lock, so an encoding error leaves the
//! file untouched and batches from concurrent workers never interleave.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use hgtload::{FlatRecord, HgtError, StoreWriter, TileRecord};
use serde::Serialize;

/// One line of a `.ndjson` tile file.
#[derive(Serialize)]
struct TileLine<'a> {
    upper_left_lat: f64,
    upper_left_lng: f64,
    scale_x: f64,
    scale_y: f64,
    width: usize,
    height: usize,
    no_data: i16,
    values: &'a [i16],
}

pub struct FileStore {
    out_dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    /// Create the output directory if needed.
    pub fn create<P: AsRef<Path>>(out_dir: P) -> std::io::Result<Self> {
        fs::create_dir_all(out_dir.as_ref())?;
        Ok(Self {
            out_dir: out_dir.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        })
    }

    pub fn flat_path(&self, table: &str) -> PathBuf {
        self.out_dir.join(format!("{}.csv", table))
    }

    pub fn raster_path(&self, table: &str) -> PathBuf {
        self.out_dir.join(format!("{}.ndjson", table))
    }

    fn open_append(&self, table: &str, path: &Path) -> hgtload::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| write_error(table, e))
    }
}

fn write_error(table: &str, err: impl std::fmt::Display) -> HgtError {
    HgtError::Write {
        table: table.to_string(),
        reason: err.to_string(),
    }
}

fn check_table(table: &str) -> hgtload::Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(write_error(table, "table names may only contain letters, digits, '_' and '-'"))
    }
}

/// Encode flat records as CSV rows, with a header line if asked.
fn encode_flat(table: &str, records: &[FlatRecord], header: bool) -> hgtload::Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(header)
        .from_writer(Vec::new());
    for record in records {
        writer
            .serialize(record)
            .map_err(|e| write_error(table, e))?;
    }
    writer.into_inner().map_err(|e| write_error(table, e.error()))
}

/// Encode tiles as newline-delimited JSON.
fn encode_tiles(table: &str, records: &[TileRecord]) -> hgtload::Result<Vec<u8>> {
    let mut buf = Vec::new();
    for record in records {
        let values = record.samples();
        let line = TileLine {
            upper_left_lat: record.upper_left.lat,
            upper_left_lng: record.upper_left.lng,
            scale_x: record.scale_x,
            scale_y: record.scale_y,
            width: record.width,
            height: record.height,
            no_data: record.no_data,
            values: &values,
        };
        serde_json::to_writer(&mut buf, &line).map_err(|e| write_error(table, e))?;
        buf.push(b'\n');
    }
    Ok(buf)
}

impl StoreWriter for FileStore {
    fn insert_flat_batch(&self, table: &str, records: &[FlatRecord]) -> hgtload::Result<()> {
        check_table(table)?;
        let path = self.flat_path(table);

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let needs_header = fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let buf = encode_flat(table, records, needs_header)?;
        self.open_append(table, &path)?
            .write_all(&buf)
            .map_err(|e| write_error(table, e))
    }

    fn insert_raster_batch(&self, table: &str, records: &[TileRecord]) -> hgtload::Result<()> {
        check_table(table)?;
        let path = self.raster_path(table);
        let buf = encode_tiles(table, records)?;

        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.open_append(table, &path)?
            .write_all(&buf)
            .map_err(|e| write_error(table, e))
    }
}
