use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};

use config::{Config, Settings};
use geocode::{Mapbox, RateLimited};
use pipeline::Resolution;

mod config;
mod dedup;
mod geocode;
mod geojson;
mod map;
mod overlay;
mod pipeline;
mod record;
mod utils;

#[derive(Debug, Parser)]
#[command(about = "Plot the home addresses of cycling dinner duos")]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Defaults to `all`
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Subcommand)]
enum Command {
    /// Write the duos as a GeoJSON point collection
    Geojson,
    /// Download static map images with a marker per address
    Map,
    /// Both of the above from a single round of geocoding
    All,
}

/// Only 0 and 1 leave the process: help and version are a normal exit, any
/// other argument error is treated like a bad configuration.
fn exit_code(error: &clap::Error) -> i32 {
    if error.use_stderr() {
        1
    } else {
        0
    }
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(x) => x,
        Err(e) => {
            e.print()?;
            process::exit(exit_code(&e));
        }
    };
    utils::init_tracing();

    let command = cli.command.unwrap_or(Command::All);
    let config = Config::load(cli.settings)?;
    let records = record::read_records(&config.csv)?;

    let agent = config.agent();
    let geocoder = RateLimited::new(
        Mapbox::new(agent.clone(), config.token.clone(), config.proximity),
        config.delay,
    );

    let resolution = pipeline::resolve(records, &config.locality, &geocoder);
    if resolution.addresses == 0 {
        println!("No addresses found.");
        return Ok(());
    }
    report(&resolution);

    if command != Command::Map {
        pipeline::export_geojson(&resolution.located, &config.geojson_out)?;
    }
    if command != Command::Geojson {
        pipeline::render_map(
            &resolution.located,
            &config.planner,
            &config.map,
            &agent,
            &config.map_out,
        )?;
    }

    Ok(())
}

fn report(resolution: &Resolution) {
    println!(
        "Resolved {} of {} addresses ({} duos).",
        resolution.resolved,
        resolution.addresses,
        resolution.located.len()
    );
}
