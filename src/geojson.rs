use std::{fs, path::Path};

use anyhow::{Context, Result};
use geo::Point;
use serde::Serialize;

use crate::record::Record;

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: Properties,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
}

/// The columns that are safe to publish, under short keys. Anything not
/// listed here (phone numbers, e-mail) never reaches the output.
#[derive(Debug, Serialize)]
pub struct Properties {
    #[serde(rename = "naamA")]
    pub name_a: String,
    #[serde(rename = "naamB")]
    pub name_b: String,
    #[serde(rename = "adres")]
    pub street: String,
    pub postcode: String,
    #[serde(rename = "stad")]
    pub city: String,
    #[serde(rename = "teamA")]
    pub team_a: String,
    #[serde(rename = "teamB")]
    pub team_b: String,
    #[serde(rename = "dieet")]
    pub diet: String,
    #[serde(rename = "allergie")]
    pub allergies: String,
    #[serde(rename = "opmerking")]
    pub remarks: String,
    pub row: usize,
}

impl From<&Record> for Properties {
    fn from(record: &Record) -> Self {
        let field = |x: &Option<String>| x.clone().unwrap_or_default();
        Self {
            name_a: field(&record.name_a),
            name_b: field(&record.name_b),
            street: field(&record.street),
            postcode: field(&record.postcode),
            city: field(&record.city),
            team_a: field(&record.team_a),
            team_b: field(&record.team_b),
            diet: field(&record.diet),
            allergies: field(&record.allergies),
            remarks: field(&record.remarks),
            row: record.row,
        }
    }
}

impl Feature {
    pub fn new(record: &Record, point: Point) -> Self {
        let (lon, lat) = point.x_y();
        Self {
            geometry: Geometry::Point {
                coordinates: [lon, lat],
            },
            properties: record.into(),
        }
    }
}

impl FeatureCollection {
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|x| !x.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, serde_json::to_string(self)?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}
