use std::io::Write;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use hgtload::{
    BlockSize, GeoPoint, GridFile, ImportConfig, ImportMode, Importer, MemoryStore, TileSampler,
};
use tempfile::TempDir;

const SRTM3_SAMPLES: usize = 1201;
const SRTM3_SIZE: usize = SRTM3_SAMPLES * SRTM3_SAMPLES * 2;

/// Create a synthetic SRTM3 grid with a simple elevation gradient.
fn create_grid(dir: &std::path::Path, filename: &str) {
    let mut data = vec![0u8; SRTM3_SIZE];
    for row in 0..SRTM3_SAMPLES {
        for col in 0..SRTM3_SAMPLES {
            let elev = ((row + col) % 4000) as i16;
            let offset = (row * SRTM3_SAMPLES + col) * 2;
            let bytes = elev.to_be_bytes();
            data[offset] = bytes[0];
            data[offset + 1] = bytes[1];
        }
    }
    let path = dir.join(filename);
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(&data).unwrap();
}

fn bench_sample_blocks(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    create_grid(tmp.path(), "N35E138.hgt");
    let grid = GridFile::open(tmp.path().join("N35E138.hgt")).unwrap();

    let mut group = c.benchmark_group("sample_blocks");
    for side in [10, 50, 300] {
        let sampler = TileSampler::new(BlockSize::square(side).unwrap());
        group.bench_function(format!("{}x{}", side, side), |b| {
            b.iter(|| black_box(sampler.blocks(black_box(&grid)).count()));
        });
    }
    group.finish();
}

fn bench_point_lookup(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    create_grid(tmp.path(), "N35E138.hgt");
    let grid = GridFile::open(tmp.path().join("N35E138.hgt")).unwrap();

    c.bench_function("point_lookup", |b| {
        b.iter(|| {
            black_box(hgtload::lookup(&grid, black_box(GeoPoint::new(35.3606, 138.7274))).unwrap());
        });
    });
}

fn bench_import_in_memory(c: &mut Criterion) {
    let tmp = TempDir::new().unwrap();
    for name in ["N35E138.hgt", "N35E139.hgt", "N36E138.hgt", "N36E139.hgt"] {
        create_grid(tmp.path(), name);
    }

    let mut group = c.benchmark_group("import_4_files");
    group.sample_size(10);
    for (label, mode) in [
        ("raster_full", ImportMode::RasterFull),
        (
            "raster_50x50",
            ImportMode::RasterSampled(BlockSize::square(50).unwrap()),
        ),
        ("flat", ImportMode::Flat),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| {
                let store = MemoryStore::new();
                let config = ImportConfig::new(tmp.path()).mode(mode).concurrency(4);
                let report = Importer::new(config, &store).run().unwrap();
                black_box(report.records_written)
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_sample_blocks,
    bench_point_lookup,
    bench_import_in_memory
);
criterion_main!(benches);
