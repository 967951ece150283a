//! Static correction tables for the rail and subway feeds, accumulated
//! over years of snapshots. Entries referencing ids absent from the
//! current snapshot are ignored; the lists are historical, not exhaustive.

use lazy_static::lazy_static;
use serde::Deserialize;
use std::{
    collections::HashMap,
    fs::File,
    io::Read,
    path::Path,
};
use tracing::debug;

use crate::{
    Error,
    gtfs::{Service, models::{RoutePoint, StopRecord}},
    layers::FeatureTable,
};

/// Subway shape_ids for rush-hour reroutes and similar service variants
/// that do not appear on the transit authority's map.
pub const SUBWAY_SEGMENTS_TO_REMOVE: [&str; 28] = [
    "E..N55R", "E..S56R", "E..S04R", "E..N05R", "N..N20R", "N..S20R", "2..N03R", "2..S03R",
    "4..S01R", "4..S02R", "4..S03R", "4..S13R", "4..N01R", "4..N02R", "4..N03R", "4..N13R",
    "4..S40R", "5..S18R", "5..N18R", "5..N13R", "5..N06R", "5..N07R", "5..N20R", "5..N22R",
    "5..S06R", "5..S07R", "5..S15R", "5..S21R",
];

/// Superseded generalized-route shape_ids in the Metro-North feed.
pub const METRO_NORTH_GENERALIZED_SHAPES: [&str; 4] = ["52", "51", "33", "34"];

/// Demolished or non-passenger subway stations. S10/S12 on the SIR were
/// torn down; 140 is the old South Ferry loop; H19 is the Broad Channel
/// maintenance track (the real station is H04).
pub const NON_EXISTENT_STOPS: [&str; 4] = ["140", "H19", "S10", "S12"];

const COLOR_OVERRIDES: [(&str, &str); 3] = [("FS", "808183"), ("H", "808183"), ("SI", "053159")];

lazy_static! {
    /// Route family groups matching the subway map's trunk-line coloring.
    pub static ref ROUTE_GROUPS: HashMap<&'static str, &'static str> = HashMap::from([
        ("FS", "S"),
        ("GS", "S"),
        ("1", "123"),
        ("2", "123"),
        ("3", "123"),
        ("4", "456"),
        ("5", "456"),
        ("6", "456"),
        ("7", "7"),
        ("A", "ACE"),
        ("C", "ACE"),
        ("E", "ACE"),
        ("B", "BDFM"),
        ("D", "BDFM"),
        ("F", "BDFM"),
        ("M", "BDFM"),
        ("G", "G"),
        ("H", "S"),
        ("J", "JZ"),
        ("L", "L"),
        ("N", "NQRW"),
        ("Q", "NQRW"),
        ("R", "NQRW"),
        ("W", "NQRW"),
        ("SI", "SIR"),
    ]);
}

/// The deny list of shape_ids for one service, empty for services with
/// nothing to exclude.
pub fn excluded_shape_ids(service: Service) -> &'static [&'static str] {
    match service {
        Service::NycSubway => &SUBWAY_SEGMENTS_TO_REMOVE,
        Service::MetroNorth => &METRO_NORTH_GENERALIZED_SHAPES,
        _ => &[],
    }
}

/// Subtract the service's shape deny list from a point table before any
/// lines are built.
pub fn remove_excluded_shapes(points: Vec<RoutePoint>, service: Service) -> Vec<RoutePoint> {
    let excluded = excluded_shape_ids(service);
    if excluded.is_empty() {
        return points;
    }
    let before = points.len();
    let points: Vec<RoutePoint> = points
        .into_iter()
        .filter(|point| !excluded.contains(&point.shape_id.as_str()))
        .collect();
    if points.len() != before {
        debug!(
            "Removed {} excluded shape points for {}",
            before - points.len(),
            service.dir_name()
        );
    }
    points
}

/// Derive the subway route_id from a shape_id (`2..N03R` belongs to
/// route `2`). The trips join cannot be trusted for the subway: one
/// route's trips are missing from the feed, and joining would silently
/// drop its geometry.
pub fn derive_route_id(shape_id: &str) -> &str {
    shape_id.split('.').next().unwrap_or(shape_id)
}

/// The map-coloring family for a subway route, if it has one.
pub fn route_group(route_id: &str) -> Option<&'static str> {
    ROUTE_GROUPS.get(route_id).copied()
}

/// Apply the subway attribute overrides after the routes join: the
/// shuttles and the SIR ship without a usable color, and the J runs
/// interlined with the Z so its display name is `JZ`.
pub fn apply_subway_overrides(table: &mut FeatureTable) {
    for feature in &mut table.features {
        let Some(route_id) = feature.attr_str("route_id").map(str::to_string) else {
            continue;
        };
        for (id, color) in COLOR_OVERRIDES {
            if route_id == id {
                feature.set_attr("color", color);
            }
        }
        if route_id == "J" {
            feature.set_attr("route_short", "JZ");
        }
    }
}

/// Keep only parent stations: subway stops whose id equals some id with
/// its N/S platform suffix stripped. Platform rows (`R01N`, `R01S`)
/// collapse into the parent (`R01`).
pub fn keep_parent_stations(stops: Vec<StopRecord>) -> Vec<StopRecord> {
    let parents: std::collections::HashSet<&str> = stops
        .iter()
        .map(|stop| stop.stop_id.trim_end_matches(['N', 'S']))
        .collect();
    stops
        .iter()
        .filter(|stop| parents.contains(stop.stop_id.as_str()))
        .cloned()
        .collect()
}

/// Correct the coordinates of relocated stations. H01 (Aqueduct) sits at
/// the wrong spot in the feed.
pub fn fix_relocated_stations(stops: &mut [StopRecord]) {
    for stop in stops {
        if stop.stop_id == "H01" {
            stop.lat = Some(40.672086);
            stop.lon = Some(-73.835914);
        }
    }
}

/// Drop the demolished/non-passenger stations.
pub fn drop_non_existent_stops(stops: Vec<StopRecord>) -> Vec<StopRecord> {
    stops
        .into_iter()
        .filter(|stop| !NON_EXISTENT_STOPS.contains(&stop.stop_id.as_str()))
        .collect()
}

/// True for the Metro-North stop_id range served by the shuttle bus
/// companion layer rather than trains.
pub fn is_metro_north_shuttle_stop(stop_id: &str) -> bool {
    match stop_id.parse::<i64>() {
        Ok(id) => (id > 500 && id != 622 && id < 1000) || id == 14 || id == 16,
        Err(_) => false,
    }
}

/// True for a regular Metro-North rail station id.
pub fn is_metro_north_station(stop_id: &str) -> bool {
    match stop_id.parse::<i64>() {
        Ok(id) => id < 500 || id == 622,
        Err(_) => false,
    }
}

/// Collapse stops sharing a coordinate pair to the first occurrence.
/// Returns the survivors plus, per coordinate, the id of the first
/// removed duplicate; the subway layer records it in a `stop_id2` column
/// so the merged station still references the platform it absorbed.
pub fn collapse_duplicate_coords(
    stops: Vec<StopRecord>,
) -> (Vec<StopRecord>, HashMap<(u64, u64), String>) {
    let mut seen: std::collections::HashSet<(u64, u64)> = std::collections::HashSet::new();
    let mut removed: HashMap<(u64, u64), String> = HashMap::new();
    let mut kept = Vec::with_capacity(stops.len());
    for stop in stops {
        let Some(key) = coord_key(&stop) else {
            kept.push(stop);
            continue;
        };
        if seen.insert(key) {
            kept.push(stop);
        } else {
            removed.entry(key).or_insert(stop.stop_id);
        }
    }
    (kept, removed)
}

pub fn coord_key(stop: &StopRecord) -> Option<(u64, u64)> {
    match (stop.lat, stop.lon) {
        (Some(lat), Some(lon)) => Some((lat.to_bits(), lon.to_bits())),
        _ => None,
    }
}

#[derive(Deserialize, Debug)]
struct StationRow {
    #[serde(rename = "GTFS Stop ID")]
    stop_id: String,
    #[serde(rename = "Daytime Routes")]
    trains: Option<String>,
    #[serde(rename = "Structure")]
    structure: Option<String>,
}

/// Which trains stop where, and what the station structure is.
#[derive(Debug, Clone, Default)]
pub struct Station {
    pub trains: Option<String>,
    pub structure: Option<String>,
}

/// The station reference table published alongside the subway feed,
/// keyed by GTFS stop_id. The caller fetches the CSV (it lives on the
/// feed publisher's site) and injects it here; this crate never reaches
/// out to the network on its own.
#[derive(Debug, Clone, Default)]
pub struct StationsTable {
    rows: HashMap<String, Station>,
}

impl StationsTable {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }
        Self::from_reader(File::open(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, Error> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        for column in ["GTFS Stop ID", "Daytime Routes", "Structure"] {
            if !headers.iter().any(|h| h == column) {
                return Err(Error::MissingColumn {
                    file: "stations".to_string(),
                    column: column.to_string(),
                });
            }
        }
        let mut rows = HashMap::new();
        for result in csv_reader.deserialize() {
            let row: StationRow = result?;
            rows.insert(
                row.stop_id,
                Station {
                    trains: row.trains,
                    structure: row.structure,
                },
            );
        }
        Ok(Self { rows })
    }

    pub fn get(&self, stop_id: &str) -> Option<&Station> {
        self.rows.get(stop_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop(id: &str, lat: f64, lon: f64) -> StopRecord {
        StopRecord {
            stop_id: id.to_string(),
            stop_name: Some(format!("{id} station")),
            lat: Some(lat),
            lon: Some(lon),
        }
    }

    #[test]
    fn derives_subway_route_from_shape() {
        assert_eq!(derive_route_id("2..N03R"), "2");
        assert_eq!(derive_route_id("FS.S01R"), "FS");
        assert_eq!(derive_route_id("SI.N20R"), "SI");
        assert_eq!(derive_route_id("52"), "52");
    }

    #[test]
    fn excluded_segments_are_removed() {
        let points = vec![
            RoutePoint {
                shape_id: "2..N03R".to_string(),
                sequence: 0,
                lat: Some(40.0),
                lon: Some(-73.0),
            },
            RoutePoint {
                shape_id: "2..N01R".to_string(),
                sequence: 0,
                lat: Some(40.0),
                lon: Some(-73.0),
            },
        ];
        let kept = remove_excluded_shapes(points, Service::NycSubway);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].shape_id, "2..N01R");
    }

    #[test]
    fn deny_lists_are_per_service() {
        assert!(excluded_shape_ids(Service::Lirr).is_empty());
        assert!(excluded_shape_ids(Service::MetroNorth).contains(&"52"));
        assert!(excluded_shape_ids(Service::QnBus).is_empty());
    }

    #[test]
    fn route_groups_cover_the_map() {
        assert_eq!(route_group("J"), Some("JZ"));
        assert_eq!(route_group("W"), Some("NQRW"));
        assert_eq!(route_group("FS"), Some("S"));
        assert_eq!(route_group("Z9"), None);
    }

    #[test]
    fn parent_station_filter() {
        let stops = vec![
            stop("R01", 40.0, -73.0),
            stop("R01N", 40.0, -73.0),
            stop("R01S", 40.0, -73.0),
            stop("R02", 40.1, -73.1),
        ];
        let parents = keep_parent_stations(stops);
        let ids: Vec<&str> = parents.iter().map(|s| s.stop_id.as_str()).collect();
        assert_eq!(ids, vec!["R01", "R02"]);
    }

    #[test]
    fn relocated_station_coordinates() {
        let mut stops = vec![stop("H01", 1.0, 1.0), stop("H02", 2.0, 2.0)];
        fix_relocated_stations(&mut stops);
        assert_eq!(stops[0].lat, Some(40.672086));
        assert_eq!(stops[0].lon, Some(-73.835914));
        assert_eq!(stops[1].lat, Some(2.0));
    }

    #[test]
    fn duplicate_coordinates_collapse_to_first() {
        let stops = vec![
            stop("A32", 40.0, -73.0),
            stop("D20", 40.0, -73.0),
            stop("E01", 40.5, -73.5),
        ];
        let (kept, removed) = collapse_duplicate_coords(stops);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].stop_id, "A32");
        let key = (40.0f64.to_bits(), (-73.0f64).to_bits());
        assert_eq!(removed.get(&key).map(String::as_str), Some("D20"));
    }

    #[test]
    fn metro_north_stop_partition() {
        assert!(is_metro_north_shuttle_stop("501"));
        assert!(is_metro_north_shuttle_stop("14"));
        assert!(is_metro_north_shuttle_stop("16"));
        assert!(!is_metro_north_shuttle_stop("622"));
        assert!(!is_metro_north_shuttle_stop("1000"));
        assert!(is_metro_north_station("1"));
        assert!(is_metro_north_station("622"));
        assert!(!is_metro_north_station("501"));
    }

    #[test]
    fn stations_table_from_csv() {
        let csv = "Station ID,GTFS Stop ID,Daytime Routes,Structure\n\
                   1,R01,N W,Elevated\n\
                   2,R03,N W,Open Cut\n";
        let table = StationsTable::from_reader(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        let station = table.get("R01").unwrap();
        assert_eq!(station.trains.as_deref(), Some("N W"));
        assert_eq!(station.structure.as_deref(), Some("Elevated"));
        assert!(table.get("R99").is_none());
    }

    #[test]
    fn stations_table_requires_columns() {
        let csv = "GTFS Stop ID,Daytime Routes\nR01,N W\n";
        let err = StationsTable::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { column, .. } if column == "Structure"));
    }
}
