//! hydromerge CLI
//!
//! Merges one or more regional water overlays into a base water layer and
//! writes the result as a shapefile.

use clap::Parser;
use hydromerge::io::{IoError, shapefile};
use hydromerge::{Aabb, Dataset, MergeOptions, update_all};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hydromerge")]
#[command(about = "Merge regional water polygons into a base water layer", long_about = None)]
struct Args {
    /// Base water polygon shapefile
    base: PathBuf,

    /// Overlay shapefiles, merged in the order given
    #[arg(required = true)]
    overlays: Vec<PathBuf>,

    /// Output shapefile path
    #[arg(short, long)]
    output: PathBuf,

    /// Worker threads (0 uses every available core)
    #[arg(short = 'j', long, env = "HYDROMERGE_THREADS", default_value = "0")]
    threads: usize,

    /// Smallest input that is split across workers
    #[arg(long, default_value = "1")]
    min_chunk_size: usize,

    /// Clip box applied to every loaded dataset
    #[arg(long, num_args = 4, value_names = ["XMIN", "YMIN", "XMAX", "YMAX"], allow_negative_numbers = true)]
    bbox: Option<Vec<f64>>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> Result<(), IoError> {
    let clip = args
        .bbox
        .as_deref()
        .map(|b| Aabb::from_bounds(b[0], b[1], b[2], b[3]));
    if let Some(bbox) = &clip {
        info!(
            x_min = bbox.mins.x,
            y_min = bbox.mins.y,
            width = bbox.width(),
            height = bbox.height(),
            "clipping inputs"
        );
    }
    let options = MergeOptions::default()
        .with_num_threads(args.threads)
        .with_min_chunk_size(args.min_chunk_size);

    let mut base = Dataset::new(shapefile::load(&args.base, clip.as_ref())?);
    info!(path = %args.base.display(), polygons = base.len(), "base loaded");

    let mut overlays = Vec::with_capacity(args.overlays.len());
    for path in &args.overlays {
        let overlay = Dataset::new(shapefile::load(path, clip.as_ref())?);
        info!(path = %path.display(), polygons = overlay.len(), "overlay loaded");
        overlays.push(overlay);
    }

    let reports = update_all(&mut base, &mut overlays, &options)?;
    let claimed: usize = reports.iter().map(|report| report.claimed).sum();
    let chained: usize = reports.iter().map(|report| report.chained).sum();
    let standalone: usize = reports.iter().map(|report| report.standalone).sum();

    shapefile::save(base.polygons(), &args.output)?;
    shapefile::copy_projection(&args.base, &args.output)?;
    info!(
        path = %args.output.display(),
        polygons = base.len(),
        claimed,
        chained,
        standalone,
        "merged layer written"
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
        process::exit(1);
    }
}
