use geo_types::{Coord, LineString, Point};
use std::collections::HashMap;
use tracing::debug;

use crate::{Error, gtfs::models::RoutePoint};

/// Reject a table whose coordinates contain nulls. Runs before any
/// geometry is constructed so a bad table never produces a partial layer.
pub fn check_coordinates<I>(table: &str, coordinates: I) -> Result<(), Error>
where
    I: IntoIterator<Item = (Option<f64>, Option<f64>)>,
{
    for (lat, lon) in coordinates {
        if lat.is_none() || lon.is_none() {
            return Err(Error::NullCoordinate(table.to_string()));
        }
    }
    Ok(())
}

/// Assemble one polyline per shape_id from ordered route points.
///
/// Point order within a shape follows the slice order established by the
/// loader; no vertex deduplication or simplification happens here.
/// Shapes with fewer than two points cannot form a line and are dropped.
/// Output order follows the first appearance of each shape_id.
pub fn build_lines(
    table: &str,
    points: &[RoutePoint],
) -> Result<Vec<(String, LineString<f64>)>, Error> {
    check_coordinates(table, points.iter().map(|p| (p.lat, p.lon)))?;

    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<Coord<f64>>> = HashMap::new();
    for point in points {
        let coord = Coord {
            x: point.lon.unwrap_or_default(),
            y: point.lat.unwrap_or_default(),
        };
        let group = groups.entry(point.shape_id.as_str()).or_insert_with(|| {
            order.push(point.shape_id.as_str());
            Vec::new()
        });
        group.push(coord);
    }

    let mut dropped = 0usize;
    let mut lines = Vec::with_capacity(order.len());
    for shape_id in order {
        let coords = groups.remove(shape_id).unwrap_or_default();
        if coords.len() < 2 {
            dropped += 1;
            continue;
        }
        lines.push((shape_id.to_string(), LineString::new(coords)));
    }
    if dropped > 0 {
        debug!("Dropped {dropped} shape groups with fewer than 2 points");
    }
    Ok(lines)
}

/// Build a point from a nullable coordinate pair. Callers are expected to
/// have run [`check_coordinates`] over the whole table first.
pub fn build_point(table: &str, lat: Option<f64>, lon: Option<f64>) -> Result<Point<f64>, Error> {
    match (lat, lon) {
        (Some(lat), Some(lon)) => Ok(Point::new(lon, lat)),
        _ => Err(Error::NullCoordinate(table.to_string())),
    }
}
