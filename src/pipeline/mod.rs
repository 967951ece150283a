use chrono::NaiveDate;
use std::{
    fmt,
    path::Path,
};
use tracing::{error, info};

use crate::{
    Error, entrances,
    corrections::StationsTable,
    gtfs::{Config, FeedLoader, Service},
    layers::FeatureTable,
    projection,
    writer::{self, LayerWriter},
};

mod bus;
mod rail;

/// The `monthyear` label appended to every layer name (`june2026`).
/// Always passed in from the entry point; the library never consults the
/// wall clock, so a re-run of an old snapshot reproduces its names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotLabel(String);

impl SnapshotLabel {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self(label.into().to_lowercase())
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self(date.format("%B%Y").to_string().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One full processing run over a snapshot folder.
///
/// The snapshot layout follows the feed publisher's conventions: one
/// sub-folder per service under `<root>/<folder>`, the county boundary
/// layer at `<root>/counties_bndry.geojson`, outputs under
/// `<root>/<folder>/shapes`. The stations reference table is injected by
/// the caller (it is fetched from the publisher's site, which is outside
/// this crate's job).
pub struct Pipeline {
    loader: FeedLoader,
    writer: LayerWriter,
    counties: FeatureTable,
    stations: StationsTable,
    label: SnapshotLabel,
}

impl Pipeline {
    pub fn new<P: AsRef<Path>>(
        root: P,
        folder: &str,
        label: SnapshotLabel,
        stations: StationsTable,
    ) -> Result<Self, Error> {
        Self::with_config(root, folder, label, stations, Config::default())
    }

    pub fn with_config<P: AsRef<Path>>(
        root: P,
        folder: &str,
        label: SnapshotLabel,
        stations: StationsTable,
        config: Config,
    ) -> Result<Self, Error> {
        let root = root.as_ref();
        let counties = writer::read_counties(root.join(&config.counties_file))?;
        let snapshot_dir = root.join(folder);
        let writer = LayerWriter::new(&snapshot_dir, &config)?;
        let loader = FeedLoader::with_config(&snapshot_dir, config);
        Ok(Self {
            loader,
            writer,
            counties,
            stations,
            label,
        })
    }

    /// Build every GTFS-derived product of the snapshot. Layers written
    /// before a failure stay on disk; there is no rollback across layers.
    pub fn run(&self) -> Result<(), Error> {
        for rail in Service::RAILS {
            self.rail_routes(rail)?;
            self.rail_stops(rail)?;
        }
        self.bus_routes()?;
        self.bus_stops()?;
        Ok(())
    }

    /// Dissolved route lines for one rail service.
    pub fn rail_routes(&self, rail: Service) -> Result<(), Error> {
        self.build_rail_routes(rail).inspect_err(|err| {
            error!(
                "Failed to build rail routes for {}: {err}",
                rail.dir_name()
            )
        })
    }

    /// Station points for one rail service. Metro-North also emits its
    /// shuttle-bus companion layer as part of this product.
    pub fn rail_stops(&self, rail: Service) -> Result<(), Error> {
        self.build_rail_stops(rail).inspect_err(|err| {
            error!("Failed to build rail stops for {}: {err}", rail.dir_name())
        })
    }

    /// The unified local and express bus route layers across all borough
    /// feeds plus the bus-company feed.
    pub fn bus_routes(&self) -> Result<(), Error> {
        self.build_bus_routes()
            .inspect_err(|err| error!("Failed to build bus routes: {err}"))
    }

    /// The unified local and express bus stop layers.
    pub fn bus_stops(&self) -> Result<(), Error> {
        self.build_bus_stops()
            .inspect_err(|err| error!("Failed to build bus stops: {err}"))
    }

    /// Subway entrance points from the injected StationEntrances CSV.
    pub fn subway_entrances<P: AsRef<Path>>(&self, entrances_csv: P) -> Result<(), Error> {
        self.build_subway_entrances(entrances_csv.as_ref())
            .inspect_err(|err| error!("Failed to build subway entrances: {err}"))
    }

    fn build_subway_entrances(&self, entrances_csv: &Path) -> Result<(), Error> {
        let rows = entrances::load_entrances(entrances_csv)?;
        let table = entrances::entrances_table(&rows)?;
        let projected = projection::to_state_plane(table)?;
        let joined = writer::spatial_join(projected, &self.counties)?;
        self.writer
            .write(&joined, &format!("subway_entrances_{}", self.label))?;
        info!("Created subway entrances layer");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_lowercased() {
        assert_eq!(SnapshotLabel::new("June2026").as_str(), "june2026");
    }

    #[test]
    fn label_from_date() {
        let date = NaiveDate::from_ymd_opt(2026, 6, 15).unwrap();
        assert_eq!(SnapshotLabel::from_date(date).as_str(), "june2026");
    }
}
