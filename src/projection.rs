use geo::MapCoords;
use proj::Proj;

use crate::{
    Error,
    layers::{Crs, FeatureTable},
};

/// Reproject a geodetic (NAD83, EPSG:4269) table to the NY State Plane
/// Long Island frame (EPSG:2263, feet). Tables already in the planar
/// frame pass through untouched.
pub fn to_state_plane(table: FeatureTable) -> Result<FeatureTable, Error> {
    if table.crs == Crs::StatePlane {
        return Ok(table);
    }
    let transform = projector(Crs::Nad83, Crs::StatePlane)?;
    let features = table
        .features
        .into_iter()
        .map(|mut feature| {
            feature.geometry = feature.geometry.try_map_coords(|c| transform.convert(c))?;
            Ok(feature)
        })
        .collect::<Result<Vec<_>, Error>>()?;
    Ok(FeatureTable {
        crs: Crs::StatePlane,
        features,
    })
}

fn projector(from: Crs, to: Crs) -> Result<Proj, Error> {
    let from = format!("EPSG:{}", from.epsg());
    let to = format!("EPSG:{}", to.epsg());
    Ok(Proj::new_known_crs(&from, &to, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Feature;
    use geo_types::{Geometry, Point};

    #[test]
    fn reprojection_tags_planar_frame() {
        let mut table = FeatureTable::new(Crs::Nad83);
        // Union Square, roughly
        table
            .features
            .push(Feature::new(Point::new(-73.9904, 40.7359)));
        let projected = to_state_plane(table).unwrap();
        assert_eq!(projected.crs, Crs::StatePlane);
        let Geometry::Point(point) = &projected.features[0].geometry else {
            panic!("expected a point");
        };
        // State-plane feet for Manhattan land in the high 900k/200k range
        assert!(point.x() > 900_000.0 && point.x() < 1_100_000.0);
        assert!(point.y() > 150_000.0 && point.y() < 300_000.0);
    }

    #[test]
    fn projected_tables_pass_through() {
        let mut table = FeatureTable::new(Crs::StatePlane);
        table
            .features
            .push(Feature::new(Point::new(987_000.0, 210_000.0)));
        let projected = to_state_plane(table).unwrap();
        assert_eq!(projected.crs, Crs::StatePlane);
        let Geometry::Point(point) = &projected.features[0].geometry else {
            panic!("expected a point");
        };
        assert_eq!(point.x(), 987_000.0);
    }
}
