use std::collections::HashMap;
use tracing::{info, warn};

use crate::{
    Error, corrections, geometry,
    gtfs::{
        Service,
        models::{RouteAttrs, StopRecord},
    },
    layers::{self, Crs, Feature, FeatureTable},
    projection, writer,
};

use super::Pipeline;

const SUBWAY_ROUTE_COLUMNS: [&str; 5] =
    ["route_id", "route_short", "route_long", "color", "group"];
const RAIL_ROUTE_COLUMNS: [&str; 3] = ["route_id", "route_long", "color"];

impl Pipeline {
    pub(super) fn build_rail_routes(&self, rail: Service) -> Result<(), Error> {
        let tables = self.loader.load_line_tables(rail)?;
        let points = corrections::remove_excluded_shapes(tables.points, rail);
        let lines = geometry::build_lines("shapes", &points)?;

        let mut segments = FeatureTable::new(Crs::Nad83);
        if rail == Service::NycSubway {
            // Route comes from the shape_id prefix, not the trips join:
            // some subway routes ship without trips and a join would
            // silently lose their geometry.
            for (shape_id, line) in lines {
                let route_id = corrections::derive_route_id(&shape_id).to_string();
                segments.features.push(
                    Feature::new(line)
                        .with_attr("route_id", route_id)
                        .with_attr("shape_id", shape_id.as_str()),
                );
            }
        } else {
            let mut shape_routes: HashMap<&str, Vec<&str>> = HashMap::new();
            for trip in &tables.trips {
                if let Some(route_id) = trip.route_id.as_deref() {
                    let routes = shape_routes.entry(trip.shape_id.as_str()).or_default();
                    if !routes.contains(&route_id) {
                        routes.push(route_id);
                    }
                }
            }
            for (shape_id, line) in lines {
                let Some(routes) = shape_routes.get(shape_id.as_str()) else {
                    continue;
                };
                for route_id in routes {
                    segments.features.push(
                        Feature::new(line.clone())
                            .with_attr("route_id", *route_id)
                            .with_attr("shape_id", shape_id.as_str()),
                    );
                }
            }
        }

        let mut table = segments.dissolve("route_id");
        table.set_crs(Crs::Nad83);

        let routes: HashMap<&str, &RouteAttrs> = tables
            .routes
            .iter()
            .map(|route| (route.route_id.as_str(), route))
            .collect();
        table.features.retain(|feature| {
            feature
                .attr_str("route_id")
                .is_some_and(|id| routes.contains_key(id))
        });
        for feature in &mut table.features {
            let Some(attrs) = feature
                .attr_str("route_id")
                .and_then(|id| routes.get(id).copied())
            else {
                continue;
            };
            feature.set_attr("route_short", attrs.route_short.clone());
            feature.set_attr("route_long", attrs.route_long.clone());
            feature.set_attr("color", attrs.color.clone());
        }

        if rail == Service::NycSubway {
            table.features.retain(|feature| {
                let Some(route_id) = feature.attr_str("route_id") else {
                    return false;
                };
                if corrections::route_group(route_id).is_none() {
                    warn!("Subway route {route_id} has no map group, dropping it");
                    return false;
                }
                true
            });
            for feature in &mut table.features {
                let group = feature
                    .attr_str("route_id")
                    .and_then(corrections::route_group);
                feature.set_attr("group", group);
            }
            corrections::apply_subway_overrides(&mut table);
        }

        for feature in &mut table.features {
            let color = feature.attr_str("color").map(str::to_string);
            feature.set_attr("color", layers::display_color(color.as_deref()));
        }

        let columns: &[&str] = if rail == Service::NycSubway {
            &SUBWAY_ROUTE_COLUMNS
        } else {
            &RAIL_ROUTE_COLUMNS
        };
        table.select_columns(columns);

        let projected = projection::to_state_plane(table)?;
        self.writer.write(
            &projected,
            &format!("routes_{}_{}", rail.dir_name(), self.label),
        )?;
        info!("Created route layer for {}", rail.dir_name());
        Ok(())
    }

    pub(super) fn build_rail_stops(&self, rail: Service) -> Result<(), Error> {
        let stops = self.loader.load_stops(rail)?;
        let table = match rail {
            Service::NycSubway => self.subway_stations(stops)?,
            Service::MetroNorth => self.metro_north_stations(stops)?,
            _ => {
                let (stops, _) = corrections::collapse_duplicate_coords(stops);
                stop_table(&stops)?
            }
        };

        let projected = projection::to_state_plane(table)?;
        let joined = writer::spatial_join(projected, &self.counties)?;
        self.writer.write(
            &joined,
            &format!("stops_{}_{}", rail.dir_name(), self.label),
        )?;
        info!("Created stop layer for {}", rail.dir_name());
        Ok(())
    }

    fn subway_stations(&self, stops: Vec<StopRecord>) -> Result<FeatureTable, Error> {
        let mut stops = corrections::keep_parent_stations(stops);
        corrections::fix_relocated_stations(&mut stops);
        let (stops, absorbed) = corrections::collapse_duplicate_coords(stops);
        let stops = corrections::drop_non_existent_stops(stops);

        geometry::check_coordinates("stops", stops.iter().map(|s| (s.lat, s.lon)))?;
        let mut table = FeatureTable::new(Crs::Nad83);
        for stop in &stops {
            let mut feature = stop_feature(stop)?;
            let station = self.stations.get(&stop.stop_id);
            feature.set_attr("trains", station.and_then(|s| s.trains.clone()));
            feature.set_attr("structure", station.and_then(|s| s.structure.clone()));
            let stop_id2 = corrections::coord_key(stop)
                .and_then(|key| absorbed.get(&key))
                .cloned();
            feature.set_attr("stop_id2", stop_id2);
            table.features.push(feature);
        }
        Ok(table)
    }

    /// Metro-North is two layers: the rail stations proper, and the
    /// shuttle-bus stops the feed carries in the same table. Stops 14 and
    /// 16 are served by both and appear in both layers.
    fn metro_north_stations(&self, stops: Vec<StopRecord>) -> Result<FeatureTable, Error> {
        let shuttle: Vec<StopRecord> = stops
            .iter()
            .filter(|stop| corrections::is_metro_north_shuttle_stop(&stop.stop_id))
            .cloned()
            .collect();
        let shuttle_table = stop_table(&shuttle)?;
        let projected = projection::to_state_plane(shuttle_table)?;
        let joined = writer::spatial_join(projected, &self.counties)?;
        self.writer
            .write(&joined, &format!("metro_north_bx_bus_{}", self.label))?;
        info!("Created Metro-North shuttle bus layer");

        let stations: Vec<StopRecord> = stops
            .into_iter()
            .filter(|stop| corrections::is_metro_north_station(&stop.stop_id))
            .collect();
        let (stations, _) = corrections::collapse_duplicate_coords(stations);
        stop_table(&stations)
    }
}

fn stop_feature(stop: &StopRecord) -> Result<Feature, Error> {
    let point = geometry::build_point("stops", stop.lat, stop.lon)?;
    Ok(Feature::new(point)
        .with_attr("stop_id", stop.stop_id.as_str())
        .with_attr("stop_name", stop.stop_name.clone())
        .with_attr("stop_lat", stop.lat)
        .with_attr("stop_lon", stop.lon))
}

fn stop_table(stops: &[StopRecord]) -> Result<FeatureTable, Error> {
    geometry::check_coordinates("stops", stops.iter().map(|s| (s.lat, s.lon)))?;
    let mut table = FeatureTable::new(Crs::Nad83);
    for stop in stops {
        table.features.push(stop_feature(stop)?);
    }
    Ok(table)
}
