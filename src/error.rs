use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("GeoJson error: {0}")]
    GeoJson(#[from] geojson::Error),
    #[error("Could not set up projection: {0}")]
    ProjCreate(#[from] proj::ProjCreateError),
    #[error("Projection error: {0}")]
    Proj(#[from] proj::ProjError),
    #[error("Table {file} is missing required column {column}")]
    MissingColumn { file: String, column: String },
    #[error("Table {0} contains null coordinates")]
    NullCoordinate(String),
    #[error("Could not find file with name: {0}")]
    FileNotFound(String),
    #[error("Layer {0} is still in the geodetic frame and cannot be written")]
    UnprojectedLayer(String),
}
