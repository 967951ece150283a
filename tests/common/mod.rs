#![allow(dead_code)]

use serde_json::Value;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// A throwaway snapshot root under the system temp directory. Every test
/// gets its own so tests can run in parallel.
pub struct Fixture {
    pub root: PathBuf,
}

impl Fixture {
    pub fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!("transitmap_{name}_{}", std::process::id()));
        if root.exists() {
            fs::remove_dir_all(&root).unwrap();
        }
        fs::create_dir_all(&root).unwrap();
        Self { root }
    }

    pub fn write(&self, relative: &str, contents: &str) {
        let path = self.root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// A single NAD83 polygon covering the whole city, so every projected
    /// point joins to it.
    pub fn write_counties(&self) {
        self.write(
            "counties_bndry.geojson",
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"county":"Queens"},"geometry":{"type":"Polygon","coordinates":[[[-75.0,40.0],[-73.0,40.0],[-73.0,42.0],[-75.0,42.0],[-75.0,40.0]]]}}]}"#,
        );
    }
}

pub fn read_layer(path: &Path) -> Value {
    let contents = fs::read_to_string(path).unwrap();
    serde_json::from_str(&contents).unwrap()
}

pub fn layer_features(layer: &Value) -> &Vec<Value> {
    layer["features"].as_array().unwrap()
}

/// The feature (there must be exactly one) whose property matches.
pub fn feature_where<'a>(layer: &'a Value, key: &str, value: &str) -> &'a Value {
    let matches: Vec<&Value> = layer_features(layer)
        .iter()
        .filter(|f| f["properties"][key] == Value::String(value.to_string()))
        .collect();
    assert_eq!(matches.len(), 1, "expected one feature with {key}={value}");
    matches[0]
}
