use std::{path::PathBuf, time::Duration};

use anyhow::{bail, Result};
use clap::Args;
use geo::Point;
use ureq::{Agent, AgentBuilder};

use crate::{
    map::{BatchPlanner, StaticMap},
    record::Locality,
    utils::USER_AGENT,
};

/// Lon/lat of Utrecht centre, used both to bias lookups and to center maps.
pub const UTRECHT_CENTER: (f64, f64) = (5.1214201, 52.0907374);

pub const MIN_DELAY_MS: u64 = 150;

#[derive(Debug, Clone, Args)]
pub struct Settings {
    /// Mapbox access token
    #[arg(long, env = "MAPBOX_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Sign-up sheet to read
    #[arg(long, env = "DUOS_CSV", default_value = "data/duos.csv", global = true)]
    pub csv: PathBuf,

    /// Where the GeoJSON point collection is written
    #[arg(
        long,
        env = "GEOJSON_OUT",
        default_value = "data/duos_points.geojson",
        global = true
    )]
    pub geojson_out: PathBuf,

    /// Map image; numbered `<stem>_<n>` when the markers need several images
    #[arg(long, env = "MAP_OUT", default_value = "utrecht_markers.png", global = true)]
    pub map_out: PathBuf,

    /// Minimum pause between geocoding requests, never below the provider's 150 ms
    #[arg(
        long,
        default_value_t = MIN_DELAY_MS,
        value_parser = clap::value_parser!(u64).range(MIN_DELAY_MS..),
        global = true
    )]
    pub delay_ms: u64,

    /// Timeout for each HTTP request
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub token: String,
    pub csv: PathBuf,
    pub geojson_out: PathBuf,
    pub map_out: PathBuf,
    pub locality: Locality,
    pub proximity: Point,
    pub delay: Duration,
    pub timeout: Duration,
    pub map: StaticMap,
    pub planner: BatchPlanner,
}

impl Config {
    /// Fails before any work is done if the token or the input is missing.
    pub fn load(settings: Settings) -> Result<Self> {
        let token = match settings.token.as_deref().map(str::trim) {
            Some(x) if !x.is_empty() => x.to_string(),
            _ => bail!("set MAPBOX_TOKEN in your environment"),
        };
        if !settings.csv.is_file() {
            bail!("CSV not found at {}", settings.csv.display());
        }

        let (lon, lat) = UTRECHT_CENTER;
        let center = Point::new(lon, lat);
        Ok(Self {
            map: StaticMap {
                token: token.clone(),
                style: "mapbox/streets-v12".to_string(),
                center,
                zoom: 12,
                width: 1280,
                height: 1280,
            },
            token,
            csv: settings.csv,
            geojson_out: settings.geojson_out,
            map_out: settings.map_out,
            locality: Locality::utrecht(),
            proximity: center,
            delay: Duration::from_millis(settings.delay_ms.max(MIN_DELAY_MS)),
            timeout: Duration::from_secs(settings.timeout_secs),
            planner: BatchPlanner::default(),
        })
    }

    pub fn agent(&self) -> Agent {
        AgentBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(self.timeout)
            .build()
    }
}
