use anyhow::{Context, Result};
use hgtload::Resolution;
use std::path::PathBuf;

pub mod info;
pub mod list;
pub mod load;
pub mod read;

/// The `--data-dir` argument, or `HGTLOAD_DATA_DIR`.
pub(crate) fn resolve_data_dir(data_dir: Option<PathBuf>) -> Result<PathBuf> {
    match data_dir {
        Some(dir) => Ok(dir),
        None => {
            let dir = std::env::var("HGTLOAD_DATA_DIR").context(
                "HGTLOAD_DATA_DIR environment variable not set. Use --data-dir or set HGTLOAD_DATA_DIR",
            )?;
            Ok(PathBuf::from(dir))
        }
    }
}

/// Short name of a resolution, e.g. `SRTM3`.
pub(crate) fn resolution_name(resolution: Resolution) -> &'static str {
    match resolution {
        Resolution::Srtm1 => "SRTM1",
        Resolution::Srtm3 => "SRTM3",
    }
}

/// Name with approximate ground spacing, e.g. `SRTM3 (~90m)`.
pub(crate) fn resolution_label(resolution: Resolution) -> String {
    format!(
        "{} (~{}m)",
        resolution_name(resolution),
        resolution.meters()
    )
}

pub(crate) fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(2_884_802), "2.75 MB");
        assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GB");
    }

    #[test]
    fn test_resolution_label_uses_grid_spacing() {
        assert_eq!(resolution_label(Resolution::Srtm1), "SRTM1 (~30m)");
        assert_eq!(resolution_label(Resolution::Srtm3), "SRTM3 (~90m)");
        assert_eq!(resolution_name(Resolution::Srtm3), "SRTM3");
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let dir = resolve_data_dir(Some(PathBuf::from("/data/srtm"))).unwrap();
        assert_eq!(dir, PathBuf::from("/data/srtm"));
    }
}
