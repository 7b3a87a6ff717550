use anyhow::{bail, Context, Result};
use hgtload::{
    BlockSize, ImportConfig, ImportMode, ImportReport, Importer, MemoryStore, NoData, StoreWriter,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use tracing::info;

use super::resolve_data_dir;
use crate::sink::FileStore;

pub struct LoadOptions {
    pub data_dir: Option<PathBuf>,
    pub mode: String,
    pub block: Option<BlockSize>,
    pub concurrency: usize,
    pub table: String,
    pub out: Option<PathBuf>,
    pub dry_run: bool,
    pub no_data: i16,
    pub include_no_data: bool,
    pub json: bool,
}

pub fn run(opts: LoadOptions) -> Result<()> {
    let data_dir = resolve_data_dir(opts.data_dir)?;
    if !data_dir.exists() {
        bail!("Data directory does not exist: {}", data_dir.display());
    }

    let mode = ImportMode::from_parts(&opts.mode, opts.block)?;
    let mut no_data = NoData::new(opts.no_data);
    if opts.include_no_data {
        no_data = no_data.included();
    }

    let config = ImportConfig::new(&data_dir)
        .mode(mode)
        .concurrency(opts.concurrency)
        .table(opts.table)
        .no_data(no_data);

    let report = match (opts.dry_run, opts.out) {
        (true, _) => {
            info!("Dry run, records are shaped but not written");
            import(config, MemoryStore::new())?
        }
        (false, Some(out)) => {
            info!(out = %out.display(), "Writing records");
            let store = FileStore::create(&out)
                .with_context(|| format!("Failed to create output directory {}", out.display()))?;
            import(config, store)?
        }
        (false, None) => bail!("--out is required unless --dry-run is given"),
    };

    if opts.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, mode);
    }

    if !report.is_complete() {
        bail!(
            "{} of {} files failed to import",
            report.failed,
            report.failed + report.succeeded
        );
    }
    Ok(())
}

fn import<W: StoreWriter>(config: ImportConfig, writer: W) -> Result<ImportReport> {
    let importer = Importer::new(config, writer);
    let tasks = importer.tasks().context("Failed to read data directory")?;

    let pb = ProgressBar::new(tasks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let progress = pb.clone();
    let importer = importer.on_file_done(move |_| progress.inc(1));
    let report = importer.run_tasks(tasks).context("Import failed")?;

    pb.finish_with_message("done");
    Ok(report)
}

fn print_summary(report: &ImportReport, mode: ImportMode) {
    println!();
    println!("Summary:");
    println!("  Mode: {}", mode);
    println!("  Files imported: {}", report.succeeded);
    if report.failed > 0 {
        println!("  Files failed: {}", report.failed);
    }
    println!("  Records written: {}", report.records_written);
    println!("  Elapsed: {:.2}s", report.elapsed_ms as f64 / 1000.0);

    for failure in &report.failures {
        eprintln!(
            "  [{}] {}: {}",
            failure.kind,
            failure.path.display(),
            failure.message
        );
    }
}
