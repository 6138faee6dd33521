use clap::Parser;
use log::{debug, info, LevelFilter};
use std::error::Error;

mod args;
mod polis;

use crate::args::Args;
use crate::polis::config_reader::{read_config, GeoConfig};
use crate::polis::{region_counts, run_projection, PolisResult};

fn build_config(args: &Args) -> PolisResult<GeoConfig> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => GeoConfig::default(),
    };
    let source = &mut config.source;
    // A URL on the command line replaces any source of the file.
    if args.polis_url.is_some() {
        source.polis_url = args.polis_url.clone();
        source.polis_id = None;
        source.base_url = None;
    }
    if args.polis_id.is_some() {
        source.polis_id = args.polis_id.clone();
        if args.polis_url.is_none() {
            source.polis_url = None;
        }
    }
    if args.base_url.is_some() {
        source.base_url = args.base_url.clone();
    }
    if args.import_dir.is_some() {
        source.import_dir = args.import_dir.clone();
    }
    if args.min_votes.is_some() {
        config.min_votes_threshold = args.min_votes;
    }
    let geographic = &mut config.geographic;
    if args.geojson.is_some() {
        geographic.geojson_path = args.geojson.clone();
    }
    if args.out.is_some() {
        geographic.output_path = args.out.clone();
    }
    if args.seed.is_some() {
        geographic.seed = args.seed;
    }
    Ok(config)
}

fn run(args: &Args) -> PolisResult<()> {
    let config = build_config(args)?;
    debug!("run: config: {:?}", config);
    let summary = run_projection(&config, args.reference.clone())?;
    if summary.downgraded {
        info!("The data of {} was loaded over plain HTTP", summary.polis_id);
    }
    println!(
        "{} participants of {} in {} regions written to {}",
        summary.placements.len(),
        summary.polis_id,
        region_counts(&summary.placements).len(),
        summary.output_path
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if args.verbose {
        builder.filter_module("polisgeo", LevelFilter::Debug);
        builder.filter_module("geo_projection", LevelFilter::Debug);
    }
    builder.init();
    debug!("main: args: {:?}", args);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        let mut source = e.source();
        while let Some(s) = source {
            eprintln!("  caused by: {}", s);
            source = s.source();
        }
        std::process::exit(1);
    }
}
