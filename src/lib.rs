//! A local-first pipeline for turning monthly GTFS snapshots into
//! projected vector layers.
//!
//! One snapshot folder in, one set of GeoJSON layers out: dissolved route
//! polylines per rail service, local and express bus routes and stops,
//! rail station points with the correction tables applied, and the subway
//! entrance layer. Everything is reprojected from geodetic NAD83 to the
//! NY State Plane Long Island frame before it is written.

pub mod census;
pub mod classify;
pub mod corrections;
pub mod entrances;
mod error;
pub mod geometry;
pub mod gtfs;
pub mod layers;
pub mod pipeline;
pub mod projection;
pub mod writer;

pub use error::Error;
pub use pipeline::{Pipeline, SnapshotLabel};
