use anyhow::{Context, Result};
use hgtload::{ElevationReaderBuilder, GeoPoint, ZipArchiveFetcher};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct ElevationResponse {
    lat: f64,
    lng: f64,
    elevation: Option<i16>,
    row: usize,
    col: usize,
    file: PathBuf,
}

pub fn run(
    data_dir: Option<PathBuf>,
    cache_size: u64,
    archive_dir: Option<PathBuf>,
    lat: f64,
    lng: f64,
    json: bool,
) -> Result<()> {
    let mut builder = match data_dir {
        Some(dir) => ElevationReaderBuilder::new(dir),
        None => ElevationReaderBuilder::from_env().context(
            "HGTLOAD_DATA_DIR environment variable not set. Use --data-dir or set HGTLOAD_DATA_DIR",
        )?,
    };

    builder = builder.cache_size(cache_size);

    if let Some(dir) = archive_dir {
        builder = builder.fetcher(ZipArchiveFetcher::new(dir));
    }

    let reader = builder.build();
    let hit = reader
        .lookup(GeoPoint::new(lat, lng))
        .context("Failed to get elevation")?;

    let elevation = (hit.value != hgtload::VOID_VALUE).then_some(hit.value);

    if json {
        let response = ElevationResponse {
            lat,
            lng,
            elevation,
            row: hit.pixel.row,
            col: hit.pixel.col,
            file: hit.path,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        match elevation {
            Some(elev) => println!("{}", elev),
            None => println!("void"),
        }
    }

    Ok(())
}
