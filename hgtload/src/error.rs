//! Error types for the hgtload library.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::filename::Origin;

/// Errors that can occur while decoding, querying or loading elevation grids.
#[derive(Error, Debug)]
pub enum HgtError {
    /// IO error when opening or reading a file.
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File size doesn't match SRTM1 or SRTM3 format.
    #[error("Invalid file size for {path}: {size} bytes (expected 25934402 for SRTM1 or 2884802 for SRTM3)")]
    InvalidFileSize { path: PathBuf, size: usize },

    /// The file name does not encode a cell origin such as `N35E138`.
    #[error("Invalid grid filename: {name}")]
    InvalidFilename { name: String },

    /// Coordinates fall outside the valid range or outside the queried cell.
    #[error("Coordinates out of range: lat={lat}, lng={lng}{}", cell_suffix(.cell))]
    OutOfRange {
        lat: f64,
        lng: f64,
        cell: Option<Origin>,
    },

    /// Row or column index outside the grid.
    #[error("Pixel ({row}, {col}) outside a {samples}x{samples} grid")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        samples: usize,
    },

    /// No grid file covers the requested cell.
    #[error("No grid file covers cell {origin}")]
    NotFound { origin: Origin },

    /// The store rejected a batch.
    #[error("Store rejected batch for table '{table}': {reason}")]
    Write { table: String, reason: String },

    /// Configuration values that cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

fn cell_suffix(cell: &Option<Origin>) -> String {
    match cell {
        Some(origin) => format!(" (outside cell {})", origin),
        None => String::new(),
    }
}

impl HgtError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HgtError::Io {
            path: path.into(),
            source,
        }
    }

    /// Classify the error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HgtError::Io { .. } => ErrorKind::Io,
            HgtError::InvalidFileSize { .. } | HgtError::InvalidFilename { .. } => {
                ErrorKind::Decode
            }
            HgtError::OutOfRange { .. } => ErrorKind::Range,
            HgtError::IndexOutOfBounds { .. } => ErrorKind::Index,
            HgtError::NotFound { .. } => ErrorKind::NotFound,
            HgtError::Write { .. } => ErrorKind::Write,
            HgtError::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}

/// Coarse error classification recorded in import reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    /// Malformed grid: bad length or unparseable name.
    Decode,
    /// Coordinate outside the valid range or the queried cell.
    Range,
    /// Pixel index outside the grid.
    Index,
    /// No file covers the requested cell.
    NotFound,
    /// The store rejected a batch.
    Write,
    /// Filesystem failure.
    Io,
    /// Unusable configuration.
    Config,
    /// A worker panicked while handling the file.
    Panic,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Decode => "decode",
            ErrorKind::Range => "range",
            ErrorKind::Index => "index",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Write => "write",
            ErrorKind::Io => "io",
            ErrorKind::Config => "config",
            ErrorKind::Panic => "panic",
        };
        f.write_str(name)
    }
}

/// Result type alias using [`HgtError`].
pub type Result<T> = std::result::Result<T, HgtError>;
