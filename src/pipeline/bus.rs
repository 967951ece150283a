use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::{
    Error, classify, geometry,
    gtfs::{
        Service,
        models::{RouteAttrs, StopRoute},
    },
    layers::{self, Crs, Feature, FeatureTable},
    projection, writer,
};

use super::Pipeline;

const BUS_ROUTE_COLUMNS: [&str; 5] =
    ["route_id", "route_dir", "route_short", "route_long", "color"];

impl Pipeline {
    /// All six bus feeds, split by service class and merged into one
    /// local and one express layer covering the whole city.
    pub(super) fn build_bus_routes(&self) -> Result<(), Error> {
        let mut locals: Vec<FeatureTable> = Vec::new();
        let mut expresses: Vec<FeatureTable> = Vec::new();

        for service in Service::BUSES {
            let Some(family) = service.bus_family() else {
                continue;
            };
            let tables = self.loader.load_line_tables(service)?;
            let lines = geometry::build_lines("shapes", &tables.points)?;

            let mut shape_trips: HashMap<&str, Vec<(Option<&str>, Option<u8>)>> = HashMap::new();
            for trip in &tables.trips {
                let entry = shape_trips.entry(trip.shape_id.as_str()).or_default();
                let pair = (trip.route_id.as_deref(), trip.direction_id);
                if !entry.contains(&pair) {
                    entry.push(pair);
                }
            }
            let routes: HashMap<&str, &RouteAttrs> = tables
                .routes
                .iter()
                .map(|route| (route.route_id.as_str(), route))
                .collect();

            let mut segments = FeatureTable::new(Crs::Nad83);
            for (shape_id, line) in lines {
                // Left join: a shape no trip references still gets drawn,
                // with a null route and an empty-route dissolve key.
                let pairs = shape_trips
                    .get(shape_id.as_str())
                    .cloned()
                    .unwrap_or_else(|| vec![(None, None)]);
                for (route_id, direction_id) in pairs {
                    let mut feature = Feature::new(line.clone())
                        .with_attr("route_id", route_id)
                        .with_attr("dir_id", direction_id)
                        .with_attr("route_dir", layers::dissolve_key(route_id, direction_id));
                    if let Some(attrs) = route_id.and_then(|id| routes.get(id)) {
                        feature.set_attr("route_short", attrs.route_short.clone());
                        feature.set_attr("route_long", attrs.route_long.clone());
                        feature.set_attr("color", attrs.color.clone());
                    }
                    segments.features.push(feature);
                }
            }

            let mut dissolved = segments.dissolve("route_dir");
            dissolved.set_crs(Crs::Nad83);
            for feature in &mut dissolved.features {
                let color = feature.attr_str("color").map(str::to_string);
                feature.set_attr("color", layers::display_color(color.as_deref()));
            }

            let (local, express) = classify::split_local_express(dissolved, family);
            locals.push(local);
            expresses.push(express);
        }

        for (tables, name) in [(locals, "bus_routes_nyc"), (expresses, "express_bus_routes_nyc")] {
            let mut table = FeatureTable::concat(Crs::Nad83, tables);
            table.select_columns(&BUS_ROUTE_COLUMNS);
            let projected = projection::to_state_plane(table)?;
            self.writer
                .write(&projected, &format!("{name}_{}", self.label))?;
        }
        info!("Created local and express bus route layers");
        Ok(())
    }

    pub(super) fn build_bus_stops(&self) -> Result<(), Error> {
        let mut local_rows: Vec<StopRoute> = Vec::new();
        let mut express_rows: Vec<StopRoute> = Vec::new();

        for service in Service::BUSES {
            let Some(family) = service.bus_family() else {
                continue;
            };
            for row in self.loader.load_stop_routes(service)? {
                match classify::classify(family, row.route_id.as_deref()) {
                    classify::ServiceClass::Local => local_rows.push(row),
                    classify::ServiceClass::Express => express_rows.push(row),
                }
            }
        }

        for (rows, name) in [
            (local_rows, "bus_stops_nyc"),
            (express_rows, "express_bus_stops_nyc"),
        ] {
            geometry::check_coordinates("stops", rows.iter().map(|r| (r.stop.lat, r.stop.lon)))?;
            let mut table = FeatureTable::new(Crs::Nad83);
            for row in &rows {
                let point = geometry::build_point("stops", row.stop.lat, row.stop.lon)?;
                table.features.push(
                    Feature::new(point)
                        .with_attr("stop_id", row.stop.stop_id.as_str())
                        .with_attr("stop_name", row.stop.stop_name.clone())
                        .with_attr("stop_lat", row.stop.lat)
                        .with_attr("stop_lon", row.stop.lon)
                        .with_attr("route_id", row.route_id.clone()),
                );
            }
            let projected = projection::to_state_plane(table)?;
            let mut joined = writer::spatial_join(projected, &self.counties)?;
            // One point per stop in the output; the per-route rows only
            // existed so the classifier could see every serving route.
            joined.drop_columns(&["route_id"]);
            dedup_stops(&mut joined);
            self.writer
                .write(&joined, &format!("{name}_{}", self.label))?;
        }
        info!("Created local and express bus stop layers");
        Ok(())
    }
}

fn dedup_stops(table: &mut FeatureTable) {
    let mut seen: HashSet<(String, u64, u64)> = HashSet::new();
    table.features.retain(|feature| {
        let stop_id = feature.attr_str("stop_id").unwrap_or_default().to_string();
        let lat = feature
            .attr("stop_lat")
            .and_then(Value::as_f64)
            .unwrap_or_default();
        let lon = feature
            .attr("stop_lon")
            .and_then(Value::as_f64)
            .unwrap_or_default();
        seen.insert((stop_id, lat.to_bits(), lon.to_bits()))
    });
}
