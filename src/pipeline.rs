use std::{collections::HashMap, path::Path};

use anyhow::{bail, Result};
use geo::Point;
use tracing::{info, warn};

use crate::{
    dedup::dedup,
    geocode::Geocode,
    geojson::{Feature, FeatureCollection},
    map::{write_images, BatchPlanner, Fetch, StaticMap},
    record::{Locality, Record},
    utils::progress_bar,
};

#[derive(Debug, Clone, PartialEq)]
pub struct Located {
    pub record: Record,
    pub point: Point,
}

#[derive(Debug, Default)]
pub struct Resolution {
    /// Unique addresses that were looked up.
    pub addresses: usize,
    /// Of those, how many came back with a point.
    pub resolved: usize,
    /// Every record whose address resolved, in sheet order.
    pub located: Vec<Located>,
}

/// Geocodes each distinct address once and hands the point to every record
/// that produced it. Lookups that fail are logged and skipped.
pub fn resolve(records: Vec<Record>, locality: &Locality, geocoder: &impl Geocode) -> Resolution {
    let mut candidates = Vec::new();
    for record in records {
        if !locality.admits(&record) {
            info!(
                "Skipping row {}: {} is not {}",
                record.row,
                record.city.as_deref().unwrap_or_default(),
                locality.name
            );
            continue;
        }
        match locality.address(&record) {
            Some(address) => candidates.push((record, address)),
            None => info!("Skipping row {}: no address", record.row),
        }
    }

    let addresses = dedup(candidates.iter().map(|(_, x)| x.as_str()));
    if addresses.is_empty() {
        return Resolution::default();
    }
    println!(
        "Found {} {} addresses. Geocoding…",
        addresses.len(),
        locality.name
    );

    let pb = progress_bar(addresses.len() as u64);
    let mut points = HashMap::new();
    for address in &addresses {
        match geocoder.geocode(address) {
            Ok(Some(point)) => {
                points.insert(address.to_string(), point);
            }
            Ok(None) => pb.suspend(|| warn!("No result for '{address}'")),
            Err(e) => pb.suspend(|| warn!("Geocoding failed for '{address}': {e}")),
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    let total = addresses.len();
    let located = candidates
        .into_iter()
        .filter_map(|(record, address)| {
            let point = *points.get(&address)?;
            Some(Located { record, point })
        })
        .collect();

    Resolution {
        addresses: total,
        resolved: points.len(),
        located,
    }
}

pub fn export_geojson(located: &[Located], out: &Path) -> Result<()> {
    if located.is_empty() {
        println!("No features resolved; nothing to write.");
        return Ok(());
    }

    let collection = FeatureCollection {
        features: located
            .iter()
            .map(|x| Feature::new(&x.record, x.point))
            .collect(),
    };
    collection.write(out)?;
    println!("Wrote {} features to {}", collection.features.len(), out.display());

    Ok(())
}

pub fn render_map(
    located: &[Located],
    planner: &BatchPlanner,
    map: &StaticMap,
    fetcher: &impl Fetch,
    out: &Path,
) -> Result<()> {
    let points = dedup(located.iter().map(|x| x.point));
    println!("Resolved {} coordinate pairs.", points.len());

    let jobs = planner.plan(&points, map);
    if jobs.is_empty() {
        println!("No coordinates resolved; nothing to map.");
        return Ok(());
    }
    if jobs.len() > 1 {
        println!(
            "URL too long for a single image; splitting {} markers over {} images…",
            points.len(),
            jobs.len()
        );
    }

    let report = write_images(&jobs, fetcher, out);
    if report.saved.is_empty() {
        bail!("all {} map downloads failed", jobs.len());
    }
    println!("Saved {} of {} images.", report.saved.len(), jobs.len());

    Ok(())
}
