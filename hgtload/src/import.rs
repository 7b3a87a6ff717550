//! Concurrent bulk import of a directory of grid files.
//!
//! [`Importer`] lists the grid files directly under a directory, then runs
//! one task per file on a fixed-size worker pool. Each task opens its grid,
//! shapes records according to the [`ImportMode`] and hands them to the
//! [`StoreWriter`] as a single batch. A task that fails is recorded in the
//! [`ImportReport`] and the remaining files carry on.
//!
//! ```ignore
//! use hgtload::{ImportConfig, ImportMode, Importer, MemoryStore, BlockSize};
//!
//! let config = ImportConfig::new("/data/srtm")
//!     .mode(ImportMode::RasterSampled(BlockSize::square(50)?))
//!     .concurrency(4)
//!     .table("elevation");
//! let report = Importer::new(config, MemoryStore::new()).run()?;
//! println!("{} ok, {} failed", report.succeeded, report.failed);
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use crate::error::{ErrorKind, HgtError, Result};
use crate::filename::is_grid_file;
use crate::grid::GridFile;
use crate::record::{flat_records, FlatRecord, TileRecord};
use crate::sampler::{BlockSize, NoData, TileSampler};
use crate::store::StoreWriter;

/// Default table records are written to.
pub const DEFAULT_TABLE: &str = "elevation";

/// How a grid file is turned into records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// One flat record per sample.
    Flat,
    /// One flat record per aggregated block.
    FlatSampled(BlockSize),
    /// A single tile record holding the whole grid.
    RasterFull,
    /// One tile record per aggregated block.
    RasterSampled(BlockSize),
}

impl ImportMode {
    /// Build a mode from its name (`flat` or `raster`) and an optional block
    /// size.
    ///
    /// # Errors
    ///
    /// Returns [`HgtError::InvalidConfig`] for an unknown name.
    pub fn from_parts(name: &str, block: Option<BlockSize>) -> Result<Self> {
        match (name.to_ascii_lowercase().as_str(), block) {
            ("flat", None) => Ok(ImportMode::Flat),
            ("flat", Some(block)) => Ok(ImportMode::FlatSampled(block)),
            ("raster", None) => Ok(ImportMode::RasterFull),
            ("raster", Some(block)) => Ok(ImportMode::RasterSampled(block)),
            (other, _) => Err(HgtError::InvalidConfig(format!(
                "unknown import mode '{}' (expected 'flat' or 'raster')",
                other
            ))),
        }
    }

    /// Whether records go through [`StoreWriter::insert_raster_batch`].
    pub fn is_raster(&self) -> bool {
        matches!(self, ImportMode::RasterFull | ImportMode::RasterSampled(_))
    }

    /// Block size for sampled modes.
    pub fn block_size(&self) -> Option<BlockSize> {
        match self {
            ImportMode::FlatSampled(block) | ImportMode::RasterSampled(block) => Some(*block),
            ImportMode::Flat | ImportMode::RasterFull => None,
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportMode::Flat => write!(f, "flat"),
            ImportMode::FlatSampled(block) => write!(f, "flat ({})", block),
            ImportMode::RasterFull => write!(f, "raster"),
            ImportMode::RasterSampled(block) => write!(f, "raster ({})", block),
        }
    }
}

/// Everything an import run needs besides the store.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    data_dir: PathBuf,
    mode: ImportMode,
    concurrency: usize,
    table: String,
    no_data: NoData,
}

impl ImportConfig {
    /// Create a configuration for the given directory.
    ///
    /// Defaults: flat mode, one worker, table `elevation`, SRTM void value
    /// excluded from means.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            mode: ImportMode::Flat,
            concurrency: 1,
            table: DEFAULT_TABLE.to_string(),
            no_data: NoData::default(),
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `HGTLOAD_DATA_DIR` | Directory containing .hgt files | Required |
    /// | `HGTLOAD_MODE` | `flat` or `raster` | `flat` |
    /// | `HGTLOAD_BLOCK` | Block size for sampling, e.g. `50x50` | None |
    /// | `HGTLOAD_CONCURRENCY` | Number of workers | 1 |
    /// | `HGTLOAD_TABLE` | Target table | `elevation` |
    ///
    /// # Errors
    ///
    /// Returns an error if `HGTLOAD_DATA_DIR` is not set or the mode or
    /// block size cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("HGTLOAD_DATA_DIR").map_err(|_| {
            HgtError::InvalidConfig("HGTLOAD_DATA_DIR environment variable not set".to_string())
        })?;

        let block = match std::env::var("HGTLOAD_BLOCK") {
            Ok(value) => Some(value.parse::<BlockSize>()?),
            Err(_) => None,
        };
        let mode_name = std::env::var("HGTLOAD_MODE").unwrap_or_else(|_| "flat".to_string());
        let mode = ImportMode::from_parts(&mode_name, block)?;

        let concurrency = std::env::var("HGTLOAD_CONCURRENCY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        let mut config = Self::new(data_dir).mode(mode).concurrency(concurrency);
        if let Ok(table) = std::env::var("HGTLOAD_TABLE") {
            config = config.table(table);
        }
        Ok(config)
    }

    /// Set the import mode.
    pub fn mode(mut self, mode: ImportMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the number of workers. Values below 1 are raised to 1.
    ///
    /// Each worker holds one file's records in memory until its batch is
    /// written. In flat mode that is `R²` records, roughly 520 MB per worker
    /// for SRTM1 grids, so peak memory grows linearly with this value.
    pub fn concurrency(mut self, workers: usize) -> Self {
        self.concurrency = workers.max(1);
        self
    }

    /// Set the table records are written to.
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the no-data rule used when aggregating blocks.
    pub fn no_data(mut self, no_data: NoData) -> Self {
        self.no_data = no_data;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn import_mode(&self) -> ImportMode {
        self.mode
    }

    pub fn workers(&self) -> usize {
        self.concurrency
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn no_data_rule(&self) -> NoData {
        self.no_data
    }
}

/// One file to import. Owned by the worker that picks it up.
#[derive(Debug, Clone)]
pub struct ImportTask {
    pub path: PathBuf,
    pub mode: ImportMode,
}

/// A file that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FileFailure {
    pub path: PathBuf,
    pub kind: ErrorKind,
    pub message: String,
}

/// Result of one finished task, handed to progress callbacks.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Imported { path: PathBuf, records: usize },
    Failed(FileFailure),
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FileOutcome::Imported { path, .. } => path,
            FileOutcome::Failed(failure) => &failure.path,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Imported { .. })
    }
}

/// Summary of an import run.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ImportReport {
    /// Files whose batch was accepted by the store.
    pub succeeded: usize,
    /// Files that failed to decode or write.
    pub failed: usize,
    /// Failures, sorted by path.
    pub failures: Vec<FileFailure>,
    /// Records accepted by the store across all files.
    pub records_written: u64,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

impl ImportReport {
    /// Whether every file was imported.
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Imported { records, .. } => {
                self.succeeded += 1;
                self.records_written += records as u64;
            }
            FileOutcome::Failed(failure) => {
                self.failed += 1;
                self.failures.push(failure);
            }
        }
    }
}

type ProgressFn = dyn Fn(&FileOutcome) + Send + Sync;

/// Loads every grid file of a directory into a store.
pub struct Importer<W> {
    config: ImportConfig,
    writer: W,
    progress: Option<Arc<ProgressFn>>,
}

impl<W: StoreWriter> Importer<W> {
    pub fn new(config: ImportConfig, writer: W) -> Self {
        Self {
            config,
            writer,
            progress: None,
        }
    }

    /// Register a callback invoked from worker threads after each file.
    pub fn on_file_done<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FileOutcome) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// List the grid files directly under the data directory, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`HgtError::Io`] if the directory cannot be read.
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        scan_grid_files(&self.config.data_dir)
    }

    /// Build one task per grid file.
    pub fn tasks(&self) -> Result<Vec<ImportTask>> {
        Ok(self
            .scan()?
            .into_iter()
            .map(|path| ImportTask {
                path,
                mode: self.config.mode,
            })
            .collect())
    }

    /// Import every grid file and block until all tasks have finished.
    ///
    /// # Errors
    ///
    /// Only listing the directory or starting the worker pool can fail the
    /// run; per-file errors end up in [`ImportReport::failures`].
    pub fn run(&self) -> Result<ImportReport> {
        self.run_tasks(self.tasks()?)
    }

    /// Import exactly the given tasks, without listing the directory again.
    ///
    /// A task whose worker panics is reported as an [`ErrorKind::Panic`]
    /// failure and does not stop the other tasks.
    pub fn run_tasks(&self, tasks: Vec<ImportTask>) -> Result<ImportReport> {
        let start = Instant::now();
        let total = tasks.len();

        info!(
            data_dir = %self.config.data_dir.display(),
            files = total,
            mode = %self.config.mode,
            workers = self.config.concurrency,
            table = %self.config.table,
            "Starting import"
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.concurrency)
            .thread_name(|i| format!("hgtload-worker-{}", i + 1))
            .build()
            .map_err(|e| HgtError::InvalidConfig(format!("cannot start worker pool: {}", e)))?;

        let counter = AtomicUsize::new(0);
        let outcomes: Vec<FileOutcome> = pool.install(|| {
            tasks
                .into_par_iter()
                .with_max_len(1)
                .map(|task| {
                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_task(&task)))
                        .unwrap_or_else(|payload| {
                            FileOutcome::Failed(FileFailure {
                                path: task.path.clone(),
                                kind: ErrorKind::Panic,
                                message: panic_message(payload.as_ref()),
                            })
                        });
                    let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
                    match &outcome {
                        FileOutcome::Imported { path, records } => info!(
                            file = %path.display(),
                            records = records,
                            "Imported file {}/{}",
                            done,
                            total
                        ),
                        FileOutcome::Failed(failure) => warn!(
                            file = %failure.path.display(),
                            kind = %failure.kind,
                            error = %failure.message,
                            "Failed file {}/{}",
                            done,
                            total
                        ),
                    }
                    if let Some(progress) = &self.progress {
                        progress(&outcome);
                    }
                    outcome
                })
                .collect()
        });

        let mut report = ImportReport::default();
        for outcome in outcomes {
            report.record(outcome);
        }
        report.failures.sort_by(|a, b| a.path.cmp(&b.path));
        report.elapsed_ms = start.elapsed().as_millis() as u64;

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            records = report.records_written,
            elapsed_ms = report.elapsed_ms,
            "Import finished"
        );

        Ok(report)
    }

    /// Import a single file, converting any error into a failure entry.
    pub fn run_task(&self, task: &ImportTask) -> FileOutcome {
        debug!(file = %task.path.display(), mode = %task.mode, "Importing");
        match self.import_file(task) {
            Ok(records) => FileOutcome::Imported {
                path: task.path.clone(),
                records,
            },
            Err(err) => FileOutcome::Failed(FileFailure {
                path: task.path.clone(),
                kind: err.kind(),
                message: err.to_string(),
            }),
        }
    }

    fn import_file(&self, task: &ImportTask) -> Result<usize> {
        let grid = GridFile::open(&task.path)?;
        let table = &self.config.table;
        let no_data = self.config.no_data;

        match task.mode {
            ImportMode::Flat => {
                let records = flat_records(&grid, no_data);
                self.writer.insert_flat_batch(table, &records)?;
                Ok(records.len())
            }
            ImportMode::FlatSampled(block) => {
                let records: Vec<FlatRecord> = TileSampler::new(block)
                    .with_no_data(no_data)
                    .blocks(&grid)
                    .map(|b| FlatRecord::from_block(&b, no_data))
                    .collect();
                self.writer.insert_flat_batch(table, &records)?;
                Ok(records.len())
            }
            ImportMode::RasterFull => {
                let records = [TileRecord::full_grid(&grid, no_data)];
                self.writer.insert_raster_batch(table, &records)?;
                Ok(records.len())
            }
            ImportMode::RasterSampled(block) => {
                let records: Vec<TileRecord> = TileSampler::new(block)
                    .with_no_data(no_data)
                    .blocks(&grid)
                    .map(|b| TileRecord::from_block(&b, no_data))
                    .collect();
                self.writer.insert_raster_batch(table, &records)?;
                Ok(records.len())
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", msg)
    } else {
        "worker panicked".to_string()
    }
}

/// List grid files (`.hgt`, any case) directly under `dir`, sorted by path.
pub fn scan_grid_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| HgtError::io(dir, e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_grid_file(path))
        .collect();
    files.sort();
    Ok(files)
}
