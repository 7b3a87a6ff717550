use anyhow::{bail, Context, Result};
use hgtload::{
    BlockSize, GeoPoint, GridFile, Origin, PixelWindow, TileSampler, VOID_VALUE,
};
use std::path::PathBuf;

use super::{format_size, resolution_label, resolve_data_dir};

pub fn run(
    data_dir: Option<PathBuf>,
    tile: Option<String>,
    lat: Option<f64>,
    lng: Option<f64>,
    block: Option<BlockSize>,
) -> Result<()> {
    // Determine grid path
    let grid_path = match (tile, lat, lng) {
        (_, Some(lat), Some(lng)) => {
            let origin = Origin::containing(lat, lng)
                .filter(|_| GeoPoint::new(lat, lng).is_valid())
                .with_context(|| format!("Coordinates out of range: lat={}, lng={}", lat, lng))?;
            resolve_data_dir(data_dir)?.join(origin.filename())
        }
        (Some(tile), _, _) if tile.to_ascii_lowercase().ends_with(".hgt") => PathBuf::from(tile),
        (Some(tile), _, _) => resolve_data_dir(data_dir)?.join(format!("{}.hgt", tile)),
        _ => bail!("Specify a grid file, a cell name, or --lat and --lng"),
    };

    if !grid_path.exists() {
        bail!("Grid not found: {}", grid_path.display());
    }

    let grid = GridFile::open(&grid_path).context("Failed to load grid")?;
    let file_size = std::fs::metadata(&grid_path)?.len();

    let (mut min_elev, mut max_elev) = (i16::MAX, i16::MIN);
    let mut void_count = 0u64;
    for (_, row) in grid.rows() {
        for elev in row.iter() {
            if elev == VOID_VALUE {
                void_count += 1;
            } else {
                min_elev = min_elev.min(elev);
                max_elev = max_elev.max(elev);
            }
        }
    }

    let resolution_str = resolution_label(grid.resolution());
    let samples = grid.samples();
    let origin = grid.origin();
    let bounds = grid.bounds();

    // Display information
    println!("Cell: {}", origin);
    println!("Path: {}", grid_path.display());
    println!();
    println!(
        "Resolution: {} ({}x{} samples)",
        resolution_str, samples, samples
    );
    println!(
        "Coverage: lat {} to {}, lng {} to {}",
        bounds.min_lat, bounds.max_lat, bounds.min_lng, bounds.max_lng
    );
    println!("File size: {}", format_size(file_size));
    println!();

    if min_elev <= max_elev {
        println!("Min elevation: {}m", min_elev);
        println!("Max elevation: {}m", max_elev);
    }

    let total_samples = (samples * samples) as u64;
    if void_count > 0 {
        let void_pct = (void_count as f64 / total_samples as f64) * 100.0;
        println!("Void samples: {} ({:.1}%)", void_count, void_pct);
    }

    println!();
    println!("Flat records: {}", total_samples);
    if let Some(block) = block {
        let (cols, rows) = TileSampler::new(block).grid_dims(PixelWindow::full(samples));
        println!(
            "Sampled records at {}: {} ({} x {} blocks)",
            block,
            cols * rows,
            cols,
            rows
        );
    }

    Ok(())
}
