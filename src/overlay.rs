use geo::Point;
use itertools::Itertools;

pub const MARKER: &str = "pin-s";
pub const MARKER_COLOR: &str = "ff2d20";

pub fn marker(point: &Point) -> String {
    let (lon, lat) = point.x_y();
    format!("{MARKER}+{MARKER_COLOR}({lon:.6},{lat:.6})")
}

/// Comma-joined marker tokens, in input order.
pub fn overlay(points: &[Point]) -> String {
    points.iter().map(marker).join(",")
}
