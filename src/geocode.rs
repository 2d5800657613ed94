use std::{
    sync::{Mutex, PoisonError},
    thread::sleep,
    time::{Duration, Instant},
};

use geo::Point;
use serde::Deserialize;
use thiserror::Error;
use ureq::{Agent, Request};

use crate::utils::http_error;

const ENDPOINT: &str = "https://api.mapbox.com/geocoding/v5/mapbox.places";

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("{0}")]
    Transport(String),
    #[error("malformed response: {0}")]
    Malformed(#[from] std::io::Error),
}

impl From<ureq::Error> for GeocodeError {
    fn from(error: ureq::Error) -> Self {
        Self::Transport(http_error(&error))
    }
}

/// Forward geocoding of a single free-text address.
///
/// `Ok(None)` means the service had no match. Points are `(lon, lat)`.
pub trait Geocode {
    fn geocode(&self, address: &str) -> Result<Option<Point>, GeocodeError>;
}

pub struct Mapbox {
    agent: Agent,
    endpoint: String,
    token: String,
    proximity: Point,
}

impl Mapbox {
    pub fn new(agent: Agent, token: String, proximity: Point) -> Self {
        Self {
            agent,
            endpoint: ENDPOINT.to_string(),
            token,
            proximity,
        }
    }

    pub fn url(&self, address: &str) -> String {
        format!("{}/{}.json", self.endpoint, urlencoding::encode(address))
    }

    /// One candidate, biased towards `proximity`, Dutch results only.
    fn request(&self, address: &str) -> Request {
        let (x, y) = self.proximity.x_y();
        self.agent
            .get(&self.url(address))
            .query("access_token", &self.token)
            .query("limit", "1")
            .query("proximity", &format!("{x},{y}"))
            .query("language", "nl")
            .query("country", "nl")
    }
}

impl Geocode for Mapbox {
    fn geocode(&self, address: &str) -> Result<Option<Point>, GeocodeError> {
        let response: GeocodeResponse = self.request(address).call()?.into_json()?;

        Ok(response.top_candidate())
    }
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    features: Option<Vec<Candidate>>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    center: Option<Vec<f64>>,
}

impl GeocodeResponse {
    fn top_candidate(self) -> Option<Point> {
        let center = self.features?.into_iter().next()?.center?;
        match center[..] {
            [lon, lat] if lon.is_finite() && lat.is_finite() => Some(Point::new(lon, lat)),
            _ => None,
        }
    }
}

/// Serializes calls to the wrapped geocoder and keeps at least `interval`
/// between the end of one call and the start of the next, whether or not the
/// call succeeded. The lock is held for the whole call, so sharing one
/// instance between threads does not break the spacing.
pub struct RateLimited<G> {
    inner: G,
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl<G> RateLimited<G> {
    pub fn new(inner: G, interval: Duration) -> Self {
        Self {
            inner,
            interval,
            last: Mutex::new(None),
        }
    }
}

impl<G: Geocode> Geocode for RateLimited<G> {
    fn geocode(&self, address: &str) -> Result<Option<Point>, GeocodeError> {
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(x) = *last {
            let elapsed = x.elapsed();
            if elapsed < self.interval {
                sleep(self.interval - elapsed);
            }
        }

        let result = self.inner.geocode(address);
        *last = Some(Instant::now());
        result
    }
}
