use std::{fs::File, io::Read, path::Path};

use anyhow::{Context, Result};
use itertools::Itertools;
use serde::{Deserialize, Deserializer};

/// One row of the sign-up sheet. Every cell is trimmed on the way in and
/// blank cells become `None`, so nothing downstream has to re-check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Record {
    #[serde(skip)]
    pub row: usize,
    #[serde(rename = "Naam persoon A", default, deserialize_with = "trimmed")]
    pub name_a: Option<String>,
    #[serde(rename = "Naam persoon B", default, deserialize_with = "trimmed")]
    pub name_b: Option<String>,
    #[serde(rename = "Adres", default, deserialize_with = "trimmed")]
    pub street: Option<String>,
    #[serde(rename = "Postcode", default, deserialize_with = "trimmed")]
    pub postcode: Option<String>,
    #[serde(rename = "Stad", default, deserialize_with = "trimmed")]
    pub city: Option<String>,
    #[serde(rename = "Team persoon A", default, deserialize_with = "trimmed")]
    pub team_a: Option<String>,
    #[serde(rename = "Team persoon B", default, deserialize_with = "trimmed")]
    pub team_b: Option<String>,
    #[serde(rename = "Dieetwensen", default, deserialize_with = "trimmed")]
    pub diet: Option<String>,
    #[serde(rename = "Allergieën", default, deserialize_with = "trimmed")]
    pub allergies: Option<String>,
    #[serde(rename = "Overige opmerkingen", default, deserialize_with = "trimmed")]
    pub remarks: Option<String>,
}

fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(|x| x.trim().to_string())
        .filter(|x| !x.is_empty()))
}

pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    parse_records(file)
}

pub fn parse_records(input: impl Read) -> Result<Vec<Record>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);

    let mut records = Vec::new();
    for (row, x) in reader.deserialize::<Record>().enumerate() {
        let mut record = x.with_context(|| format!("Failed to parse row {row}"))?;
        record.row = row;
        records.push(record);
    }

    Ok(records)
}

/// The town every duo is expected to live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locality {
    pub name: String,
    pub country: String,
}

impl Locality {
    pub fn utrecht() -> Self {
        Self {
            name: "Utrecht".to_string(),
            country: "Nederland".to_string(),
        }
    }

    /// A blank city is let through; a different city is not.
    pub fn admits(&self, record: &Record) -> bool {
        match &record.city {
            Some(city) => city.to_lowercase() == self.name.to_lowercase(),
            None => true,
        }
    }

    /// `None` when there is no street to look up.
    pub fn address(&self, record: &Record) -> Option<String> {
        let street = record.street.as_deref()?;
        let suffix = format!("{}, {}", self.name, self.country);
        let address = [Some(street), record.postcode.as_deref(), Some(suffix.as_str())]
            .into_iter()
            .flatten()
            .join(", ");
        Some(address)
    }
}
