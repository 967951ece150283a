use serde::Deserialize;
use std::path::Path;

use crate::{
    Error, geometry,
    layers::{Crs, Feature, FeatureTable},
};

/// One subway entrance, read from the StationEntrances reference CSV.
/// The input headers are the publisher's long names; the fields carry the
/// short attribute names the output layer uses.
#[derive(Deserialize, Debug, Clone)]
pub struct EntranceRow {
    #[serde(rename = "Division")]
    pub division: Option<String>,
    #[serde(rename = "Line")]
    pub line: Option<String>,
    #[serde(rename = "Station Name")]
    pub stn_name: Option<String>,
    #[serde(rename = "Station Latitude")]
    pub stn_lat: Option<f64>,
    #[serde(rename = "Station Longitude")]
    pub stn_lon: Option<f64>,
    #[serde(rename = "Route1")]
    pub route_1: Option<String>,
    #[serde(rename = "Route2")]
    pub route_2: Option<String>,
    #[serde(rename = "Route3")]
    pub route_3: Option<String>,
    #[serde(rename = "Route4")]
    pub route_4: Option<String>,
    #[serde(rename = "Route5")]
    pub route_5: Option<String>,
    #[serde(rename = "Route6")]
    pub route_6: Option<String>,
    #[serde(rename = "Route7")]
    pub route_7: Option<String>,
    #[serde(rename = "Route8")]
    pub route_8: Option<String>,
    #[serde(rename = "Route9")]
    pub route_9: Option<String>,
    #[serde(rename = "Route10")]
    pub route_10: Option<String>,
    #[serde(rename = "Route11")]
    pub route_11: Option<String>,
    #[serde(rename = "Entrance Type")]
    pub entr_type: Option<String>,
    #[serde(rename = "Entry")]
    pub entry: Option<String>,
    #[serde(rename = "Exit Only")]
    pub exit_only: Option<String>,
    #[serde(rename = "Vending")]
    pub vending: Option<String>,
    #[serde(rename = "Staffing")]
    pub staffing: Option<String>,
    #[serde(rename = "Staff Hours")]
    pub staff_hour: Option<String>,
    #[serde(rename = "ADA")]
    pub ada: Option<String>,
    #[serde(rename = "ADA Notes")]
    pub ada_notes: Option<String>,
    #[serde(rename = "Free Crossover")]
    pub free_cross: Option<String>,
    #[serde(rename = "North South Street")]
    pub n_s_street: Option<String>,
    #[serde(rename = "East West Street")]
    pub e_w_street: Option<String>,
    #[serde(rename = "Corner")]
    pub corner: Option<String>,
    #[serde(rename = "Latitude")]
    pub lat: Option<f64>,
    #[serde(rename = "Longitude")]
    pub lon: Option<f64>,
}

/// Load the entrances table. One known data defect is corrected
/// on load: an entrance row carries a longitude missing its negative
/// sign, so positive longitudes are flipped (in this region a longitude
/// is always negative).
pub fn load_entrances<P: AsRef<Path>>(path: P) -> Result<Vec<EntranceRow>, Error> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    for column in ["Station Name", "Latitude", "Longitude"] {
        if !headers.iter().any(|h| h == column) {
            return Err(Error::MissingColumn {
                file: path.display().to_string(),
                column: column.to_string(),
            });
        }
    }
    let mut rows: Vec<EntranceRow> = Vec::new();
    for result in reader.deserialize() {
        let mut row: EntranceRow = result?;
        if let Some(lon) = row.lon {
            if lon > 0.0 {
                row.lon = Some(-lon);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Build the geodetic point table with the fixed entrance schema.
/// `ada` and `free_cross` are booleans upstream but come through as
/// strings; downstream formats cannot store booleans.
pub fn entrances_table(rows: &[EntranceRow]) -> Result<FeatureTable, Error> {
    geometry::check_coordinates("entrances", rows.iter().map(|row| (row.lat, row.lon)))?;

    let mut table = FeatureTable::new(Crs::Nad83);
    for row in rows {
        let point = geometry::build_point("entrances", row.lat, row.lon)?;
        let mut feature = Feature::new(point);
        feature.set_attr("division", opt(&row.division));
        feature.set_attr("line", opt(&row.line));
        feature.set_attr("stn_name", opt(&row.stn_name));
        feature.set_attr("stn_lat", num(row.stn_lat));
        feature.set_attr("stn_lon", num(row.stn_lon));
        let routes = [
            &row.route_1,
            &row.route_2,
            &row.route_3,
            &row.route_4,
            &row.route_5,
            &row.route_6,
            &row.route_7,
            &row.route_8,
            &row.route_9,
            &row.route_10,
            &row.route_11,
        ];
        for (i, route) in routes.iter().enumerate() {
            feature.set_attr(&format!("route_{}", i + 1), opt(route));
        }
        feature.set_attr("entr_type", opt(&row.entr_type));
        feature.set_attr("entry", opt(&row.entry));
        feature.set_attr("exit_only", opt(&row.exit_only));
        feature.set_attr("vending", opt(&row.vending));
        feature.set_attr("staffing", opt(&row.staffing));
        feature.set_attr("staff_hour", opt(&row.staff_hour));
        feature.set_attr("ada", stringified(&row.ada));
        feature.set_attr("ada_notes", opt(&row.ada_notes));
        feature.set_attr("free_cross", stringified(&row.free_cross));
        feature.set_attr("n_s_street", opt(&row.n_s_street));
        feature.set_attr("e_w_street", opt(&row.e_w_street));
        feature.set_attr("corner", opt(&row.corner));
        feature.set_attr("lat", num(row.lat));
        feature.set_attr("lon", num(row.lon));
        table.features.push(feature);
    }
    Ok(table)
}

fn opt(value: &Option<String>) -> serde_json::Value {
    match value {
        Some(v) => serde_json::Value::String(v.clone()),
        None => serde_json::Value::Null,
    }
}

fn num(value: Option<f64>) -> serde_json::Value {
    match value {
        Some(v) => serde_json::json!(v),
        None => serde_json::Value::Null,
    }
}

fn stringified(value: &Option<String>) -> serde_json::Value {
    serde_json::Value::String(value.clone().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "Division,Line,Station Name,Station Latitude,Station Longitude,Route1,Route2,Route3,Route4,Route5,Route6,Route7,Route8,Route9,Route10,Route11,Entrance Type,Entry,Exit Only,Vending,Staffing,Staff Hours,ADA,ADA Notes,Free Crossover,North South Street,East West Street,Corner,Latitude,Longitude";

    fn write_fixture(rows: &[&str]) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!(
            "transitmap_entrances_{}_{}.csv",
            std::process::id(),
            rows.len()
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "{HEADER}").unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        path
    }

    #[test]
    fn positive_longitudes_are_flipped() {
        let path = write_fixture(&[
            "BMT,Astoria,Ditmars Blvd,40.775036,-73.912034,N,W,,,,,,,,,,Stair,YES,,YES,NONE,,FALSE,,TRUE,31st St,23rd Ave,SW,40.775163,73.912890",
            "BMT,Astoria,Ditmars Blvd,40.775036,-73.912034,N,W,,,,,,,,,,Stair,YES,,YES,NONE,,FALSE,,TRUE,31st St,23rd Ave,NW,40.775500,-73.912600",
        ]);
        let rows = load_entrances(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].lon, Some(-73.912890));
        assert_eq!(rows[1].lon, Some(-73.912600));
    }

    #[test]
    fn table_carries_the_fixed_schema() {
        let path = write_fixture(&[
            "IRT,Lexington,Astor Pl,40.730054,-73.991070,4,6,,,,,,,,,,Stair,YES,,YES,FULL,,FALSE,,FALSE,4th Ave,Astor Pl,SE,40.72982,-73.990910",
        ]);
        let rows = load_entrances(&path).unwrap();
        std::fs::remove_file(&path).ok();
        let table = entrances_table(&rows).unwrap();
        assert_eq!(table.len(), 1);
        let feature = &table.features[0];
        assert_eq!(feature.attrs().len(), 29);
        assert_eq!(feature.attr_str("stn_name"), Some("Astor Pl"));
        assert_eq!(feature.attr_str("route_1"), Some("4"));
        // booleans are stringified
        assert_eq!(feature.attr_str("ada"), Some("FALSE"));
        assert_eq!(feature.attr_str("free_cross"), Some("FALSE"));
    }

    #[test]
    fn null_coordinates_reject_the_table() {
        let path = write_fixture(&[
            "IRT,Lexington,Astor Pl,40.730054,-73.991070,4,6,,,,,,,,,,Stair,YES,,YES,FULL,,FALSE,,FALSE,4th Ave,Astor Pl,SE,,-73.990910",
        ]);
        let rows = load_entrances(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            entrances_table(&rows).unwrap_err(),
            Error::NullCoordinate(_)
        ));
    }
}
