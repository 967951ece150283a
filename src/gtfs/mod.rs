use serde::de::DeserializeOwned;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::debug;

use crate::Error;

mod config;
pub mod models;
pub use config::*;
use models::*;

/// One sub-folder of a monthly snapshot. The directory names follow the
/// feed publisher's layout and are part of the input contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    MnBus,
    SiBus,
    QnBus,
    BxBus,
    BkBus,
    BusCompany,
    Lirr,
    MetroNorth,
    NycSubway,
}

/// Which set of local/express identifier conventions a bus feed follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFamily {
    /// The bus-company feed (`Q12`, `BXM4`, `QM20` style ids).
    Company,
    /// The per-borough feeds, where `X`/`SIM` prefixes mark express runs.
    Borough,
}

impl Service {
    pub const BUSES: [Service; 6] = [
        Service::MnBus,
        Service::SiBus,
        Service::QnBus,
        Service::BxBus,
        Service::BkBus,
        Service::BusCompany,
    ];

    pub const RAILS: [Service; 3] = [Service::Lirr, Service::MetroNorth, Service::NycSubway];

    pub fn dir_name(&self) -> &'static str {
        match self {
            Service::MnBus => "mn_bus",
            Service::SiBus => "si_bus",
            Service::QnBus => "qn_bus",
            Service::BxBus => "bx_bus",
            Service::BkBus => "bk_bus",
            Service::BusCompany => "bus_company",
            Service::Lirr => "LIRR",
            Service::MetroNorth => "metro_north",
            Service::NycSubway => "nyc_subway",
        }
    }

    pub fn is_bus(&self) -> bool {
        Service::BUSES.contains(self)
    }

    pub fn is_rail(&self) -> bool {
        Service::RAILS.contains(self)
    }

    pub fn bus_family(&self) -> Option<BusFamily> {
        match self {
            Service::BusCompany => Some(BusFamily::Company),
            service if service.is_bus() => Some(BusFamily::Borough),
            _ => None,
        }
    }
}

/// Reads and normalizes the per-service tables of one snapshot folder.
///
/// Column names are renamed to the short output identifiers at this
/// boundary (`shape_pt_lat` becomes `lat` and so on); everything
/// downstream works on the normalized names only.
pub struct FeedLoader {
    root: PathBuf,
    config: Config,
}

impl FeedLoader {
    /// `root` is the snapshot folder containing one sub-folder per service.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config: Config::default(),
        }
    }

    pub fn with_config<P: AsRef<Path>>(root: P, config: Config) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load the routes, shapes and trips tables for one service.
    ///
    /// Shapes come back ordered: by (shape_id, shape_pt_sequence) when the
    /// feed carries an explicit sequence column, in file order otherwise.
    /// The file-order case is deliberately not re-sorted; the feed emits
    /// points in traversal order and a synthetic sequence pins that order
    /// down before any later join can disturb it.
    pub fn load_line_tables(&self, service: Service) -> Result<LineTables, Error> {
        debug!("Loading line tables for {}...", service.dir_name());
        let now = Instant::now();

        let routes: Vec<GtfsRoute> = self.read_table(
            service,
            &self.config.routes_file,
            &[
                "route_id",
                "route_short_name",
                "route_long_name",
                "route_color",
            ],
        )?;
        let routes = routes.into_iter().map(RouteAttrs::from).collect();

        let points = self.load_shape_points(service)?;

        let trips_required: &[&str] = if service.is_bus() {
            &["route_id", "direction_id", "shape_id"]
        } else {
            &["route_id", "shape_id"]
        };
        let raw_trips: Vec<GtfsTrip> =
            self.read_table(service, &self.config.trips_file, trips_required)?;
        let trips = dedup_trips(raw_trips);

        debug!(
            "Loading line tables for {} took {:?}",
            service.dir_name(),
            now.elapsed()
        );
        Ok(LineTables {
            routes,
            points,
            trips,
        })
    }

    /// Load the stops table for one service.
    pub fn load_stops(&self, service: Service) -> Result<Vec<StopRecord>, Error> {
        let stops: Vec<GtfsStop> = self.read_table(
            service,
            &self.config.stops_file,
            &["stop_id", "stop_name", "stop_lat", "stop_lon"],
        )?;
        Ok(stops.into_iter().map(StopRecord::from).collect())
    }

    /// Join stops to the routes serving them via stop_times and trips.
    ///
    /// Produces one row per distinct (stop, route) pair; a stop served by
    /// several routes appears once per route. Stop_times rows referencing
    /// unknown trips or stops are skipped.
    pub fn load_stop_routes(&self, service: Service) -> Result<Vec<StopRoute>, Error> {
        debug!("Loading stop associations for {}...", service.dir_name());
        let now = Instant::now();

        let stops = self.load_stops(service)?;
        let stop_times: Vec<GtfsStopTime> = self.read_table(
            service,
            &self.config.stop_times_file,
            &["trip_id", "stop_id"],
        )?;
        let trips: Vec<GtfsTrip> =
            self.read_table(service, &self.config.trips_file, &["trip_id", "route_id"])?;

        let trip_to_route: HashMap<&str, Option<&str>> = trips
            .iter()
            .map(|trip| (trip.trip_id.as_str(), trip.route_id.as_deref()))
            .collect();

        let mut seen: HashSet<(String, Option<String>)> = HashSet::new();
        let mut pairs: Vec<(String, Option<String>)> = Vec::new();
        for stop_time in &stop_times {
            let Some(route_id) = trip_to_route.get(stop_time.trip_id.as_str()) else {
                continue;
            };
            let pair = (stop_time.stop_id.clone(), route_id.map(str::to_string));
            if seen.insert(pair.clone()) {
                pairs.push(pair);
            }
        }

        let stop_lookup: HashMap<&str, &StopRecord> = stops
            .iter()
            .map(|stop| (stop.stop_id.as_str(), stop))
            .collect();

        let rows: Vec<StopRoute> = pairs
            .into_iter()
            .filter_map(|(stop_id, route_id)| {
                stop_lookup.get(stop_id.as_str()).map(|stop| StopRoute {
                    stop: (*stop).clone(),
                    route_id,
                })
            })
            .collect();

        debug!(
            "Loading stop associations for {} took {:?} ({} rows)",
            service.dir_name(),
            now.elapsed(),
            rows.len()
        );
        Ok(rows)
    }

    /// Load the raw trips table for one service. The census uses trips
    /// rather than routes: routes.txt lists routes with no service, trips
    /// only reference routes that actually run.
    pub fn load_trips(&self, service: Service) -> Result<Vec<GtfsTrip>, Error> {
        self.read_table(service, &self.config.trips_file, &["trip_id", "route_id"])
    }

    fn load_shape_points(&self, service: Service) -> Result<Vec<RoutePoint>, Error> {
        let path = self.service_dir(service).join(&self.config.shapes_file);
        let has_sequence = {
            let mut reader = self.open_table(&path)?;
            let headers = reader.headers()?;
            headers.iter().any(|h| h == "shape_pt_sequence")
        };

        let raw: Vec<GtfsShapePoint> = self.read_table(
            service,
            &self.config.shapes_file,
            &["shape_id", "shape_pt_lat", "shape_pt_lon"],
        )?;

        let mut points: Vec<RoutePoint> = raw
            .into_iter()
            .enumerate()
            .map(|(i, row)| RoutePoint {
                shape_id: row.shape_id,
                // File order stands in for the missing sequence column.
                sequence: row.shape_pt_sequence.unwrap_or(i as u32),
                lat: row.shape_pt_lat,
                lon: row.shape_pt_lon,
            })
            .collect();

        if has_sequence {
            points.sort_by(|a, b| {
                a.shape_id
                    .cmp(&b.shape_id)
                    .then(a.sequence.cmp(&b.sequence))
            });
        }
        Ok(points)
    }

    fn service_dir(&self, service: Service) -> PathBuf {
        self.root.join(service.dir_name())
    }

    fn open_table(&self, path: &Path) -> Result<csv::Reader<std::fs::File>, Error> {
        if !path.is_file() {
            return Err(Error::FileNotFound(path.display().to_string()));
        }
        Ok(csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?)
    }

    fn read_table<T: DeserializeOwned>(
        &self,
        service: Service,
        file_name: &str,
        required: &[&str],
    ) -> Result<Vec<T>, Error> {
        let path = self.service_dir(service).join(file_name);
        let mut reader = self.open_table(&path)?;
        let headers = reader.headers()?.clone();
        for column in required {
            if !headers.iter().any(|h| h == *column) {
                return Err(Error::MissingColumn {
                    file: path.display().to_string(),
                    column: column.to_string(),
                });
            }
        }
        let mut rows = Vec::new();
        for result in reader.deserialize() {
            rows.push(result?);
        }
        Ok(rows)
    }
}

/// Collapse trips to the distinct (route_id, direction_id, shape_id)
/// tuples, preserving first-seen order. Trips without a shape reference
/// cannot contribute geometry and are dropped here.
fn dedup_trips(trips: Vec<GtfsTrip>) -> Vec<TripShape> {
    let mut seen: HashSet<TripShape> = HashSet::new();
    let mut out: Vec<TripShape> = Vec::new();
    for trip in trips {
        let Some(shape_id) = trip.shape_id else {
            continue;
        };
        let entry = TripShape {
            route_id: trip.route_id,
            direction_id: trip.direction_id,
            shape_id,
        };
        if seen.insert(entry.clone()) {
            out.push(entry);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(route: &str, dir: u8, shape: &str) -> GtfsTrip {
        GtfsTrip {
            trip_id: format!("{route}-{dir}-{shape}"),
            route_id: Some(route.to_string()),
            direction_id: Some(dir),
            shape_id: Some(shape.to_string()),
        }
    }

    #[test]
    fn dedup_trips_collapses_duplicates() {
        let trips = vec![
            trip("Q12", 0, "Q12_0"),
            trip("Q12", 0, "Q12_0"),
            trip("Q12", 1, "Q12_1"),
            trip("Q12", 0, "Q12_0"),
        ];
        let deduped = dedup_trips(trips);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].shape_id, "Q12_0");
        assert_eq!(deduped[1].shape_id, "Q12_1");
    }

    #[test]
    fn dedup_trips_drops_shapeless_rows() {
        let mut shapeless = trip("X1", 0, "X1_0");
        shapeless.shape_id = None;
        assert!(dedup_trips(vec![shapeless]).is_empty());
    }

    #[test]
    fn service_families() {
        assert_eq!(Service::BusCompany.bus_family(), Some(BusFamily::Company));
        assert_eq!(Service::QnBus.bus_family(), Some(BusFamily::Borough));
        assert_eq!(Service::NycSubway.bus_family(), None);
        assert!(Service::Lirr.is_rail());
        assert!(!Service::Lirr.is_bus());
    }
}
