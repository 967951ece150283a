use serde::Deserialize;

/// Raw row of `routes.txt`. Extra feed columns are ignored.
#[derive(Deserialize, Debug, Clone)]
pub struct GtfsRoute {
    pub route_id: String,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_color: Option<String>,
}

/// Raw row of `shapes.txt`. The bus feeds ship without a
/// `shape_pt_sequence` column, hence the default.
#[derive(Deserialize, Debug, Clone)]
pub struct GtfsShapePoint {
    pub shape_id: String,
    pub shape_pt_lat: Option<f64>,
    pub shape_pt_lon: Option<f64>,
    #[serde(default)]
    pub shape_pt_sequence: Option<u32>,
}

/// Raw row of `trips.txt`.
#[derive(Deserialize, Debug, Clone)]
pub struct GtfsTrip {
    pub trip_id: String,
    pub route_id: Option<String>,
    #[serde(default)]
    pub direction_id: Option<u8>,
    #[serde(default)]
    pub shape_id: Option<String>,
}

/// Raw row of `stops.txt`.
#[derive(Deserialize, Debug, Clone)]
pub struct GtfsStop {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub stop_lat: Option<f64>,
    pub stop_lon: Option<f64>,
}

/// Raw row of `stop_times.txt`. Only the join keys matter here.
#[derive(Deserialize, Debug, Clone)]
pub struct GtfsStopTime {
    pub trip_id: String,
    pub stop_id: String,
}

/// One vertex of a route path, normalized from `shapes.txt`.
/// Coordinates stay optional until geometry construction so that a
/// null-coordinate table can be rejected as a whole.
#[derive(Debug, Clone)]
pub struct RoutePoint {
    pub shape_id: String,
    pub sequence: u32,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Route attributes carried onto the output layers, with the short
/// column names the layers use.
#[derive(Debug, Clone, Default)]
pub struct RouteAttrs {
    pub route_id: String,
    pub route_short: Option<String>,
    pub route_long: Option<String>,
    pub color: Option<String>,
}

impl From<GtfsRoute> for RouteAttrs {
    fn from(value: GtfsRoute) -> Self {
        Self {
            route_id: value.route_id,
            route_short: value.route_short_name,
            route_long: value.route_long_name,
            color: value.route_color,
        }
    }
}

/// A deduplicated (route, direction, shape) association from `trips.txt`.
/// Individual trip records do not matter for geometry, only which shapes
/// a route runs over.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TripShape {
    pub route_id: Option<String>,
    pub direction_id: Option<u8>,
    pub shape_id: String,
}

/// Normalized stop record.
#[derive(Debug, Clone)]
pub struct StopRecord {
    pub stop_id: String,
    pub stop_name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl From<GtfsStop> for StopRecord {
    fn from(value: GtfsStop) -> Self {
        Self {
            stop_id: value.stop_id,
            stop_name: value.stop_name,
            lat: value.stop_lat,
            lon: value.stop_lon,
        }
    }
}

/// A stop paired with one route that serves it. A stop served by three
/// routes appears three times; the stop pipelines deduplicate by
/// coordinate at the end.
#[derive(Debug, Clone)]
pub struct StopRoute {
    pub stop: StopRecord,
    pub route_id: Option<String>,
}

/// The three tables every line-building pass needs, already normalized:
/// shapes ordered, trips deduplicated.
#[derive(Debug, Default)]
pub struct LineTables {
    pub routes: Vec<RouteAttrs>,
    pub points: Vec<RoutePoint>,
    pub trips: Vec<TripShape>,
}
