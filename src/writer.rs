use geo::Intersects;
use geojson::{FeatureCollection, GeoJson};
use serde_json::map::Map;
use std::{
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::debug;

use crate::{
    Error,
    gtfs::Config,
    layers::{Crs, Feature, FeatureTable},
    projection,
};

/// Read the county boundary reference layer and bring it into the planar
/// frame. Read once per run and shared across every spatial join.
pub fn read_counties<P: AsRef<Path>>(path: P) -> Result<FeatureTable, Error> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }
    let contents = fs::read_to_string(path)?;
    let geojson: GeoJson = contents.parse()?;
    let collection = FeatureCollection::try_from(geojson)?;

    let mut table = FeatureTable::new(Crs::Nad83);
    for feature in collection.features {
        let Some(geometry) = feature.geometry else {
            continue;
        };
        let geometry = geo_types::Geometry::<f64>::try_from(geometry)?;
        let mut out = Feature::new(geometry);
        if let Some(properties) = feature.properties {
            for (name, value) in properties {
                out.set_attr(&name, value);
            }
        }
        table.features.push(out);
    }
    debug!("Loaded {} county polygons", table.len());
    projection::to_state_plane(table)
}

/// Spatially join a point layer to the county polygons with an
/// intersects predicate. Inner join: features that land in no county are
/// dropped; matching features get the county's attribute columns
/// appended. Both layers must already be in the planar frame.
pub fn spatial_join(table: FeatureTable, counties: &FeatureTable) -> Result<FeatureTable, Error> {
    if table.crs != Crs::StatePlane {
        return Err(Error::UnprojectedLayer("spatial join input".to_string()));
    }
    if counties.crs != Crs::StatePlane {
        return Err(Error::UnprojectedLayer("counties".to_string()));
    }

    let mut joined = FeatureTable::new(Crs::StatePlane);
    for mut feature in table.features {
        let hit = counties
            .features
            .iter()
            .find(|county| county.geometry.intersects(&feature.geometry));
        let Some(county) = hit else {
            continue;
        };
        for (name, value) in county.attrs() {
            feature.set_attr(name, value.clone());
        }
        joined.features.push(feature);
    }
    Ok(joined)
}

/// Persists finished layers into the snapshot's `shapes` folder and keeps
/// the feature-count report up to date. The writer only accepts tables
/// already reprojected to the planar frame with a finalized schema.
pub struct LayerWriter {
    shapes_dir: PathBuf,
    report_path: PathBuf,
}

impl LayerWriter {
    pub fn new<P: AsRef<Path>>(snapshot_dir: P, config: &Config) -> Result<Self, Error> {
        let snapshot_dir = snapshot_dir.as_ref();
        let shapes_dir = snapshot_dir.join(&config.shapes_dir);
        fs::create_dir_all(&shapes_dir)?;
        Ok(Self {
            shapes_dir,
            report_path: snapshot_dir.join(&config.report_file),
        })
    }

    /// Write one layer as GeoJSON and append its row count to the report.
    /// Returns the feature count.
    pub fn write(&self, table: &FeatureTable, name: &str) -> Result<usize, Error> {
        if table.crs != Crs::StatePlane {
            return Err(Error::UnprojectedLayer(name.to_string()));
        }

        let collection = FeatureCollection {
            bbox: None,
            features: table.features.iter().map(to_geojson).collect(),
            foreign_members: None,
        };
        let path = self.shapes_dir.join(format!("{name}.geojson"));
        let file = File::create(&path)?;
        serde_json::to_writer(file, &collection)?;

        self.report(name, table.len())?;
        debug!("Wrote {} features to {}", table.len(), path.display());
        Ok(table.len())
    }

    fn report(&self, name: &str, count: usize) -> Result<(), Error> {
        let mut report = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.report_path)?;
        writeln!(report, "Feature count for {name} = {count}")?;
        Ok(())
    }
}

fn to_geojson(feature: &Feature) -> geojson::Feature {
    let geometry = geojson::Geometry::new(geojson::Value::from(&feature.geometry));
    let mut properties = Map::new();
    for (name, value) in feature.attrs() {
        properties.insert(name.clone(), value.clone());
    }
    geojson::Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
