pub struct Config {
    pub routes_file: String,
    pub shapes_file: String,
    pub trips_file: String,
    pub stops_file: String,
    pub stop_times_file: String,
    pub counties_file: String,
    pub shapes_dir: String,
    pub report_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            routes_file: "routes.txt".into(),
            shapes_file: "shapes.txt".into(),
            trips_file: "trips.txt".into(),
            stops_file: "stops.txt".into(),
            stop_times_file: "stop_times.txt".into(),
            counties_file: "counties_bndry.geojson".into(),
            shapes_dir: "shapes".into(),
            report_file: "feature_report.txt".into(),
        }
    }
}
