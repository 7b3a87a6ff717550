use anyhow::Result;
use clap::{Parser, Subcommand};
use hgtload::BlockSize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod sink;

/// Read and bulk-load SRTM elevation grids
#[derive(Parser)]
#[command(name = "hgtload")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory containing .hgt files
    #[arg(short, long, env = "HGTLOAD_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Maximum grids kept open by `read`
    #[arg(
        short,
        long,
        env = "HGTLOAD_CACHE_SIZE",
        default_value = "100",
        global = true
    )]
    cache_size: u64,

    /// Directory of .zip archives to extract missing cells from
    #[arg(long, env = "HGTLOAD_ARCHIVE_DIR", global = true)]
    archive_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the elevation sample nearest to a coordinate
    Read {
        /// Latitude in decimal degrees
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        /// Longitude in decimal degrees
        #[arg(long, alias = "lon", allow_negative_numbers = true)]
        lng: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Load every grid file of the data directory into a store
    Load {
        /// Record layout: one record per sample (flat) or raster tiles
        #[arg(
            short,
            long,
            env = "HGTLOAD_MODE",
            default_value = "flat",
            value_parser = ["flat", "raster"]
        )]
        mode: String,

        /// Aggregate samples into blocks, e.g. 50x50 or 50
        #[arg(short, long, env = "HGTLOAD_BLOCK")]
        block: Option<BlockSize>,

        /// Number of files processed in parallel
        #[arg(short = 'j', long, env = "HGTLOAD_CONCURRENCY", default_value = "1")]
        concurrency: usize,

        /// Table records are written to
        #[arg(short, long, env = "HGTLOAD_TABLE", default_value = hgtload::DEFAULT_TABLE)]
        table: String,

        /// Output directory for <table>.csv / <table>.ndjson
        #[arg(short, long, required_unless_present = "dry_run")]
        out: Option<PathBuf>,

        /// Decode and shape records without writing them
        #[arg(long)]
        dry_run: bool,

        /// Sample value meaning "no data"
        #[arg(long, default_value = "-32768", allow_negative_numbers = true)]
        no_data: i16,

        /// Count no-data samples in block means
        #[arg(long)]
        include_no_data: bool,

        /// Print the import report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Display information about a grid file
    Info {
        /// Path to .hgt file, or cell name (e.g., N35E138)
        tile: Option<String>,

        /// Specify the cell by latitude instead of filename
        #[arg(long, conflicts_with = "tile", requires = "lng", allow_negative_numbers = true)]
        lat: Option<f64>,

        /// Specify the cell by longitude instead of filename
        #[arg(
            long,
            alias = "lon",
            conflicts_with = "tile",
            requires = "lat",
            allow_negative_numbers = true
        )]
        lng: Option<f64>,

        /// Block size to report the sampled record count for
        #[arg(short, long)]
        block: Option<BlockSize>,
    },

    /// List available grid files
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hgtload=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Read { lat, lng, json } => commands::read::run(
            cli.data_dir,
            cli.cache_size,
            cli.archive_dir,
            lat,
            lng,
            json,
        ),
        Commands::Load {
            mode,
            block,
            concurrency,
            table,
            out,
            dry_run,
            no_data,
            include_no_data,
            json,
        } => commands::load::run(commands::load::LoadOptions {
            data_dir: cli.data_dir,
            mode,
            block,
            concurrency,
            table,
            out,
            dry_run,
            no_data,
            include_no_data,
            json,
        }),
        Commands::Info {
            tile,
            lat,
            lng,
            block,
        } => commands::info::run(cli.data_dir, tile, lat, lng, block),
        Commands::List => commands::list::run(cli.data_dir),
    }
}
