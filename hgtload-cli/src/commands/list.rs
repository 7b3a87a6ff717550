use anyhow::{Context, Result};
use hgtload::{filename::parse_origin, scan_grid_files, Resolution};
use std::fs;
use std::path::PathBuf;

use super::{format_size, resolution_label, resolution_name, resolve_data_dir};

pub fn run(data_dir: Option<PathBuf>) -> Result<()> {
    let dir = resolve_data_dir(data_dir)?;

    if !dir.exists() {
        anyhow::bail!("Data directory does not exist: {}", dir.display());
    }

    let grids = scan_grid_files(&dir).context("Failed to read data directory")?;

    if grids.is_empty() {
        println!("No .hgt files found in: {}", dir.display());
        return Ok(());
    }

    let mut srtm1_count = 0;
    let mut srtm3_count = 0;
    let mut unknown_count = 0;
    let mut total_size: u64 = 0;

    println!("{:<20} {:>8} {:>28}", "FILE", "TYPE", "COVERAGE");
    println!("{}", "-".repeat(58));

    for path in &grids {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        total_size += size;

        let resolution = match Resolution::from_byte_len(size as usize) {
            Some(res) => {
                match res {
                    Resolution::Srtm1 => srtm1_count += 1,
                    Resolution::Srtm3 => srtm3_count += 1,
                }
                resolution_name(res)
            }
            None => {
                unknown_count += 1;
                "???"
            }
        };

        let coverage = match parse_origin(path) {
            Ok(origin) => format!(
                "lat {} to {}, lng {} to {}",
                origin.lat(),
                origin.lat_max(),
                origin.lng(),
                origin.lng() + 1
            ),
            Err(_) => "Unknown".to_string(),
        };

        println!("{:<20} {:>8} {:>28}", filename, resolution, coverage);
    }

    // Summary
    println!();
    println!("Summary:");
    println!("  Total files: {}", grids.len());
    if srtm1_count > 0 {
        println!("  {}: {}", resolution_label(Resolution::Srtm1), srtm1_count);
    }
    if srtm3_count > 0 {
        println!("  {}: {}", resolution_label(Resolution::Srtm3), srtm3_count);
    }
    if unknown_count > 0 {
        println!("  Unknown (will fail to import): {}", unknown_count);
    }
    println!("  Total size: {}", format_size(total_size));
    println!("  Data directory: {}", dir.display());

    Ok(())
}
